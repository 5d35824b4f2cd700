//! In-memory analytics store for testing.
//!
//! This module provides [`MemoryStore`], a simple in-memory implementation
//! of the [`AnalyticsStore`] trait suitable for testing and development.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: no durability, no cross-process
//!   coordination
//! - **Single-process only**: state is not shared across process boundaries
//!
//! ## Atomicity
//!
//! Each `commit_*` method takes the write lock once and applies every write
//! under it, matching the transactional contract of the trait.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{Error, Result};
use crate::id::{CourseKey, StudentId};
use crate::records::{
    EnrollmentDailySnapshot, EnrollmentStudentState, GradeRollupCheckpoint, GradeSnapshot,
};

use super::{AnalyticsStore, GradeRollupCommit};

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("lock poisoned")
}

#[derive(Debug, Default)]
struct Inner {
    daily: BTreeMap<(CourseKey, NaiveDate), EnrollmentDailySnapshot>,
    states: HashMap<(CourseKey, StudentId), EnrollmentStudentState>,
    grades: BTreeMap<(CourseKey, StudentId), GradeSnapshot>,
    checkpoints: Vec<GradeRollupCheckpoint>,
    forced: HashSet<(CourseKey, StudentId)>,
}

/// In-memory analytics store for testing.
///
/// Thread-safe via a single `RwLock` over all tables, which also gives the
/// commit methods their all-or-nothing behavior.
///
/// ## Example
///
/// ```rust
/// use coursepulse_core::store::memory::MemoryStore;
///
/// let store = MemoryStore::new();
/// // Use store in tests...
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of daily snapshot rows currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn daily_snapshot_count(&self) -> Result<usize> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.daily.len())
    }

    /// Returns all checkpoint rows, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn checkpoints(&self) -> Result<Vec<GradeRollupCheckpoint>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.checkpoints.clone())
    }

    /// Returns the daily snapshot for one (course, day), if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn daily_snapshot(
        &self,
        course: &CourseKey,
        day: NaiveDate,
    ) -> Result<Option<EnrollmentDailySnapshot>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.daily.get(&(course.clone(), day)).cloned())
    }

    /// Returns the stored grade snapshot for one (course, student).
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn grade_snapshot(
        &self,
        course: &CourseKey,
        student: StudentId,
    ) -> Result<Option<GradeSnapshot>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.grades.get(&(course.clone(), student)).cloned())
    }

    /// Seeds grade snapshots directly, bypassing the rollup path.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn seed_grade_snapshots(&self, snapshots: Vec<GradeSnapshot>) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        for snap in snapshots {
            inner
                .grades
                .insert((snap.course_id.clone(), snap.student_id), snap);
        }
        Ok(())
    }

    /// Seeds daily snapshots directly, bypassing the rollup path.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn seed_daily_snapshots(&self, snapshots: Vec<EnrollmentDailySnapshot>) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        for snap in snapshots {
            inner
                .daily
                .insert((snap.course_id.clone(), snap.day), snap);
        }
        Ok(())
    }
}

#[async_trait]
impl AnalyticsStore for MemoryStore {
    async fn enrollment_watermark(&self) -> Result<Option<DateTime<Utc>>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.states.values().map(|s| s.last_update).max())
    }

    async fn enrollment_states(&self) -> Result<Vec<EnrollmentStudentState>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.states.values().cloned().collect())
    }

    async fn latest_daily_snapshots(
        &self,
    ) -> Result<HashMap<CourseKey, EnrollmentDailySnapshot>> {
        let inner = self.inner.read().map_err(poison_err)?;
        // BTreeMap iteration is (course, day) ascending, so the last entry
        // per course wins.
        let mut latest = HashMap::new();
        for ((course, _), snap) in &inner.daily {
            latest.insert(course.clone(), snap.clone());
        }
        Ok(latest)
    }

    async fn daily_snapshots_in_range(
        &self,
        course: &CourseKey,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<EnrollmentDailySnapshot>> {
        let inner = self.inner.read().map_err(poison_err)?;
        let range = (course.clone(), from)..=(course.clone(), to);
        Ok(inner.daily.range(range).map(|(_, s)| s.clone()).collect())
    }

    async fn last_daily_before(
        &self,
        course: &CourseKey,
        day: NaiveDate,
    ) -> Result<Option<EnrollmentDailySnapshot>> {
        let inner = self.inner.read().map_err(poison_err)?;
        let range = (course.clone(), NaiveDate::MIN)..(course.clone(), day);
        Ok(inner.daily.range(range).next_back().map(|(_, s)| s.clone()))
    }

    async fn commit_enrollment_rollup(
        &self,
        states: Vec<EnrollmentStudentState>,
        snapshots: Vec<EnrollmentDailySnapshot>,
    ) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        for state in states {
            inner
                .states
                .insert((state.course_id.clone(), state.student_id), state);
        }
        for snap in snapshots {
            inner
                .daily
                .insert((snap.course_id.clone(), snap.day), snap);
        }
        Ok(())
    }

    async fn latest_grade_checkpoint(&self) -> Result<Option<GradeRollupCheckpoint>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.checkpoints.last().copied())
    }

    async fn grade_snapshots(&self, course: &CourseKey) -> Result<Vec<GradeSnapshot>> {
        let inner = self.inner.read().map_err(poison_err)?;
        let mut rows: Vec<GradeSnapshot> = inner
            .grades
            .values()
            .filter(|g| &g.course_id == course)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(rows)
    }

    async fn forced_grade_pairs(&self) -> Result<Vec<(CourseKey, StudentId)>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.forced.iter().cloned().collect())
    }

    async fn flag_for_regrade(&self, course: &CourseKey, student: StudentId) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner.forced.insert((course.clone(), student));
        Ok(())
    }

    async fn commit_grade_rollup(&self, commit: GradeRollupCommit) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        for snap in commit.upserts {
            inner
                .grades
                .insert((snap.course_id.clone(), snap.student_id), snap);
        }
        for (course, student) in commit.deletes {
            inner.grades.remove(&(course, student));
        }
        if let Some(checkpoint) = commit.checkpoint {
            inner.checkpoints.push(checkpoint);
            let excess = inner
                .checkpoints
                .len()
                .saturating_sub(commit.retain_checkpoints.max(1));
            inner.checkpoints.drain(..excess);
        }
        for pair in &commit.consumed_flags {
            inner.forced.remove(pair);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use indexmap::IndexMap;

    fn course(run: &str) -> CourseKey {
        format!("course-v1:RG+Analytics+{run}").parse().unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn daily(course_id: &CourseKey, d: u32, total: i64) -> EnrollmentDailySnapshot {
        EnrollmentDailySnapshot {
            course_id: course_id.clone(),
            day: day(d),
            enrolled: 0,
            unenrolled: 0,
            total,
        }
    }

    #[tokio::test]
    async fn watermark_is_none_on_empty_store() {
        let store = MemoryStore::new();
        assert_eq!(store.enrollment_watermark().await.unwrap(), None);
    }

    #[tokio::test]
    async fn watermark_is_max_last_update() {
        let store = MemoryStore::new();
        let c = course("2024");
        let t1 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap();
        let states = vec![
            EnrollmentStudentState {
                course_id: c.clone(),
                student_id: StudentId(1),
                last_update: t2,
                is_active: true,
            },
            EnrollmentStudentState {
                course_id: c,
                student_id: StudentId(2),
                last_update: t1,
                is_active: false,
            },
        ];
        store.commit_enrollment_rollup(states, vec![]).await.unwrap();
        assert_eq!(store.enrollment_watermark().await.unwrap(), Some(t2));
    }

    #[tokio::test]
    async fn latest_daily_snapshots_take_newest_day_per_course() {
        let store = MemoryStore::new();
        let (a, b) = (course("A"), course("B"));
        store
            .seed_daily_snapshots(vec![daily(&a, 1, 5), daily(&a, 3, 9), daily(&b, 2, 2)])
            .unwrap();
        let latest = store.latest_daily_snapshots().await.unwrap();
        assert_eq!(latest[&a].total, 9);
        assert_eq!(latest[&a].day, day(3));
        assert_eq!(latest[&b].total, 2);
    }

    #[tokio::test]
    async fn range_and_last_before_are_course_scoped() {
        let store = MemoryStore::new();
        let (a, b) = (course("A"), course("B"));
        store
            .seed_daily_snapshots(vec![daily(&a, 1, 1), daily(&a, 2, 2), daily(&b, 1, 7)])
            .unwrap();

        let rows = store
            .daily_snapshots_in_range(&a, day(1), day(31))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|s| s.course_id == a));

        let before = store.last_daily_before(&a, day(2)).await.unwrap().unwrap();
        assert_eq!(before.day, day(1));
        assert_eq!(before.total, 1);
        assert_eq!(store.last_daily_before(&a, day(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn grade_commit_prunes_checkpoints_and_clears_consumed_flags() {
        let store = MemoryStore::new();
        let c = course("2024");
        store.flag_for_regrade(&c, StudentId(5)).await.unwrap();
        assert_eq!(store.forced_grade_pairs().await.unwrap().len(), 1);

        for i in 0..5 {
            let t = Utc.with_ymd_and_hms(2024, 5, 1, i, 0, 0).unwrap();
            store
                .commit_grade_rollup(GradeRollupCommit {
                    checkpoint: Some(GradeRollupCheckpoint::at(t)),
                    retain_checkpoints: 3,
                    consumed_flags: vec![(c.clone(), StudentId(5))],
                    ..GradeRollupCommit::default()
                })
                .await
                .unwrap();
        }

        let checkpoints = store.checkpoints().unwrap();
        assert_eq!(checkpoints.len(), 3);
        assert_eq!(
            checkpoints.last().unwrap().last_update,
            Utc.with_ymd_and_hms(2024, 5, 1, 4, 0, 0).unwrap()
        );
        assert!(store.forced_grade_pairs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unconsumed_flags_survive_a_commit() {
        let store = MemoryStore::new();
        let c = course("2024");
        // One flag the pass read, one raised while it was running.
        store.flag_for_regrade(&c, StudentId(1)).await.unwrap();
        store.flag_for_regrade(&c, StudentId(2)).await.unwrap();

        store
            .commit_grade_rollup(GradeRollupCommit {
                checkpoint: Some(GradeRollupCheckpoint::at(
                    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
                )),
                retain_checkpoints: 3,
                consumed_flags: vec![(c.clone(), StudentId(1))],
                ..GradeRollupCommit::default()
            })
            .await
            .unwrap();

        let remaining = store.forced_grade_pairs().await.unwrap();
        assert_eq!(remaining, [(c, StudentId(2))]);
    }

    #[tokio::test]
    async fn grade_snapshots_sort_by_username() {
        let store = MemoryStore::new();
        let c = course("2024");
        let snap = |id: i64, name: &str| GradeSnapshot {
            course_id: c.clone(),
            student_id: StudentId(id),
            username: name.to_string(),
            exam_info: IndexMap::new(),
            total: 0.5,
        };
        store
            .seed_grade_snapshots(vec![snap(1, "zoe"), snap(2, "ana")])
            .unwrap();
        let rows = store.grade_snapshots(&c).await.unwrap();
        assert_eq!(rows[0].username, "ana");
        assert_eq!(rows[1].username, "zoe");
    }
}
