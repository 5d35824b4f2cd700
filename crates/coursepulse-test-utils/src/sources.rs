//! Stub implementations of the platform collaborator traits.
//!
//! Each stub is a plain data holder: tests construct it with the rows they
//! want the engine to see, then hand it to the engine behind the trait.
//! The email sender records instead of sending.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use coursepulse_core::error::Result;
use coursepulse_core::store::{
    ActivitySource, ContentSource, CoursePair, EmailSender, EnrollmentSource,
    EnrollmentTransition, GradeProvider, GradeSummary, ModuleActivityRecord, ModuleKind,
    StudentDirectory,
};
use coursepulse_core::{CourseBlock, CourseKey, StudentId};

/// Canned enrollment history.
#[derive(Debug, Default)]
pub struct StubEnrollmentSource {
    /// Transition log, any order; filtered and sorted per call.
    pub transitions: Vec<EnrollmentTransition>,
    /// Currently-active pairs.
    pub active: Vec<CoursePair>,
    /// Pairs with enrollment rows created after some time, with that time.
    pub enrollments_created: Vec<(DateTime<Utc>, CoursePair)>,
    /// Staff ids per course.
    pub staff: HashMap<CourseKey, Vec<StudentId>>,
}

#[async_trait]
impl EnrollmentSource for StubEnrollmentSource {
    async fn transitions_since(&self, since: DateTime<Utc>) -> Result<Vec<EnrollmentTransition>> {
        let mut rows: Vec<EnrollmentTransition> = self
            .transitions
            .iter()
            .filter(|t| t.timestamp > since)
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.timestamp);
        Ok(rows)
    }

    async fn active_pairs(&self) -> Result<Vec<CoursePair>> {
        Ok(self.active.clone())
    }

    async fn enrolled_since(&self, since: DateTime<Utc>) -> Result<Vec<CoursePair>> {
        Ok(self
            .enrollments_created
            .iter()
            .filter(|(created, _)| *created > since)
            .map(|(_, pair)| pair.clone())
            .collect())
    }

    async fn course_staff(&self, course: &CourseKey) -> Result<Vec<StudentId>> {
        Ok(self.staff.get(course).cloned().unwrap_or_default())
    }
}

/// Canned module interaction log.
#[derive(Debug, Default)]
pub struct StubActivitySource {
    /// Interaction rows; filtered by course and kind per call.
    pub records: Vec<ModuleActivityRecord>,
    /// Graded-activity pairs with their activity timestamps.
    pub graded_activity: Vec<(DateTime<Utc>, CoursePair)>,
}

#[async_trait]
impl ActivitySource for StubActivitySource {
    async fn module_records(
        &self,
        course: &CourseKey,
        kind: ModuleKind,
    ) -> Result<Vec<ModuleActivityRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.kind == kind && r.module_key.course_key() == course)
            .cloned()
            .collect())
    }

    async fn graded_pairs_since(&self, since: DateTime<Utc>) -> Result<Vec<CoursePair>> {
        let mut pairs: Vec<CoursePair> = self
            .graded_activity
            .iter()
            .filter(|(at, _)| *at > since)
            .map(|(_, pair)| pair.clone())
            .collect();
        pairs.dedup();
        Ok(pairs)
    }
}

/// Canned content trees.
#[derive(Debug, Default)]
pub struct StubContentSource {
    /// Trees per course; missing course yields `None`.
    pub trees: HashMap<CourseKey, CourseBlock>,
}

#[async_trait]
impl ContentSource for StubContentSource {
    async fn course_tree(&self, course: &CourseKey, _depth: u32) -> Result<Option<CourseBlock>> {
        Ok(self.trees.get(course).cloned())
    }
}

/// Canned grade summaries.
///
/// A pair absent from the map behaves like a permission-denied grade
/// computation: `Ok(None)`.
#[derive(Debug, Default)]
pub struct StubGradeProvider {
    /// Summaries per (course, student).
    pub summaries: HashMap<(CourseKey, StudentId), GradeSummary>,
}

#[async_trait]
impl GradeProvider for StubGradeProvider {
    async fn grade_summary(
        &self,
        student: StudentId,
        course: &CourseKey,
    ) -> Result<Option<GradeSummary>> {
        Ok(self.summaries.get(&(course.clone(), student)).cloned())
    }
}

/// Canned usernames and emails.
#[derive(Debug, Default)]
pub struct StubDirectory {
    /// Username per student.
    pub usernames: HashMap<StudentId, String>,
    /// Email per student.
    pub emails: HashMap<StudentId, String>,
}

#[async_trait]
impl StudentDirectory for StubDirectory {
    async fn username(&self, student: StudentId) -> Result<Option<String>> {
        Ok(self.usernames.get(&student).cloned())
    }

    async fn emails_for(&self, students: &[StudentId]) -> Result<Vec<String>> {
        Ok(students
            .iter()
            .filter_map(|s| self.emails.get(s).cloned())
            .collect())
    }
}

/// One message captured by [`RecordingEmailSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    /// Message subject.
    pub subject: String,
    /// Message body.
    pub body: String,
    /// Recipient addresses.
    pub recipients: Vec<String>,
}

/// Email sender that records messages instead of delivering them.
#[derive(Debug, Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingEmailSender {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all captured messages.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (test-only type).
    #[must_use]
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().expect("recorder lock").clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, subject: &str, body: &str, recipients: &[String]) -> Result<()> {
        self.sent
            .lock()
            .map_err(|_| coursepulse_core::Error::storage("recorder lock poisoned"))?
            .push(SentEmail {
                subject: subject.to_string(),
                body: body.to_string(),
                recipients: recipients.to_vec(),
            });
        Ok(())
    }
}
