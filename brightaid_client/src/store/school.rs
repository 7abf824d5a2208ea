use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{Cell, RefreshGuard, RefreshOutcome};
use crate::api::ApiClient;
use crate::error::Result;
use crate::filters::is_active_status;
use crate::models::{Donation, FundStats, School, SchoolProject, Student};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolSnapshot {
    pub school: Option<School>,
    pub students: Vec<Student>,
    pub projects: Vec<SchoolProject>,
    pub donations: Vec<Donation>,
    /// Message of the last failed fetch in the most recent refresh.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolSummary {
    pub total_students: usize,
    pub high_risk_students: usize,
    pub total_projects: usize,
    pub active_projects: usize,
    pub total_funds_received: f64,
    pub total_funds_utilized: f64,
}

pub struct SchoolStore {
    api: ApiClient,
    state: Cell<SchoolSnapshot>,
    loading: AtomicBool,
}

impl SchoolStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: Cell::default(),
            loading: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> SchoolSnapshot {
        self.state.snapshot()
    }

    pub fn loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub async fn refresh(&self, school_id: i64) -> RefreshOutcome {
        let Some(_guard) = RefreshGuard::try_acquire(&self.loading) else {
            debug!(school_id, "school refresh already in flight, skipping");
            return RefreshOutcome::AlreadyInFlight;
        };
        self.state.write().error = None;

        let (school, students, projects, donations) = tokio::join!(
            self.school_with_funds(school_id),
            self.api.students(),
            self.api.school_projects(),
            self.api.donations_by_school(school_id),
        );

        let mut error = None;
        let mut degrade = |what: &str, e: crate::error::Error| {
            warn!(school_id, error = %e, "failed to fetch {what}");
            error = Some(format!("failed to fetch {what}: {e}"));
        };

        let school = school.map_err(|e| degrade("school", e)).ok();
        let students: Vec<Student> = students
            .map(|all| all.into_iter().filter(|s| s.belongs_to_school(school_id)).collect())
            .unwrap_or_else(|e| {
                degrade("students", e);
                Vec::new()
            });
        let projects: Vec<SchoolProject> = projects
            .map(|all| all.into_iter().filter(|p| p.belongs_to_school(school_id)).collect())
            .unwrap_or_else(|e| {
                degrade("projects", e);
                Vec::new()
            });
        let donations = donations.unwrap_or_else(|e| {
            degrade("donations", e);
            Vec::new()
        });

        let snapshot = SchoolSnapshot {
            school,
            students,
            projects,
            donations,
            error,
        };
        info!(
            school_id,
            students = snapshot.students.len(),
            projects = snapshot.projects.len(),
            "school data refreshed"
        );
        *self.state.write() = snapshot;
        RefreshOutcome::Refreshed
    }

    pub fn summary(&self) -> SchoolSummary {
        let state = self.state.read();
        SchoolSummary {
            total_students: state.students.len(),
            high_risk_students: state.students.iter().filter(|s| s.is_high_risk()).count(),
            total_projects: state.projects.len(),
            active_projects: state
                .projects
                .iter()
                .filter(|p| is_active_status(p.status.as_deref()))
                .count(),
            total_funds_received: state
                .school
                .as_ref()
                .and_then(|s| s.total_funds_received)
                .unwrap_or(0.0),
            total_funds_utilized: state
                .projects
                .iter()
                .map(|p| p.raised_amount.unwrap_or(0.0))
                .sum(),
        }
    }

    pub async fn fund_stats(&self, school_id: i64) -> Result<FundStats> {
        self.api.school_fund_stats(school_id).await
    }

    /// The school record with `totalFundsReceived` filled in; `0` when the
    /// funds lookup fails.
    async fn school_with_funds(&self, school_id: i64) -> Result<School> {
        let (school, funds) = tokio::join!(
            self.api.school(school_id),
            self.api.school_total_funds(school_id),
        );
        let mut school = school?;
        school.total_funds_received = Some(funds.unwrap_or_else(|e| {
            debug!(school_id, error = %e, "total funds unavailable");
            0.0
        }));
        Ok(school)
    }
}
