use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{or_default, Cell, RefreshGuard, RefreshOutcome};
use crate::api::ApiClient;
use crate::error::Result;
use crate::filters;
use crate::models::{Donation, Ngo, NgoGamification, NgoProject, SchoolProject};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NgoSnapshot {
    pub ngo: Option<Ngo>,
    pub projects: Vec<NgoProject>,
    /// Student donations followed by project donations.
    pub donations: Vec<Donation>,
    pub gamification: Option<NgoGamification>,
    pub error: Option<String>,
}

pub struct NgoStore {
    api: ApiClient,
    state: Cell<NgoSnapshot>,
    loading: AtomicBool,
}

impl NgoStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: Cell::default(),
            loading: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> NgoSnapshot {
        self.state.snapshot()
    }

    pub fn loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub async fn refresh(&self, ngo_id: i64) -> RefreshOutcome {
        let Some(_guard) = RefreshGuard::try_acquire(&self.loading) else {
            debug!(ngo_id, "NGO refresh already in flight, skipping");
            return RefreshOutcome::AlreadyInFlight;
        };
        self.state.write().error = None;

        let (ngo, projects, donations, gamification) = tokio::join!(
            self.api.ngo(ngo_id),
            self.own_projects(ngo_id),
            self.combined_donations(ngo_id),
            self.gamification_or_starter(ngo_id),
        );

        let mut snapshot = NgoSnapshot {
            projects: or_default("NGO projects", projects),
            donations,
            gamification: Some(gamification),
            ..NgoSnapshot::default()
        };
        match ngo {
            Ok(ngo) => snapshot.ngo = Some(ngo),
            Err(e) => {
                warn!(ngo_id, error = %e, "failed to fetch NGO profile");
                snapshot.error = Some(e.to_string());
            }
        }
        info!(
            ngo_id,
            projects = snapshot.projects.len(),
            donations = snapshot.donations.len(),
            "NGO data refreshed"
        );
        *self.state.write() = snapshot;
        RefreshOutcome::Refreshed
    }

    /// Refreshes unless a refresh is already running.
    pub async fn initialize(&self, ngo_id: i64) -> RefreshOutcome {
        if self.loading() {
            return RefreshOutcome::AlreadyInFlight;
        }
        self.refresh(ngo_id).await
    }

    /// Re-fetches gamification only. A failure keeps the previous record.
    pub async fn refresh_gamification(&self, ngo_id: i64) {
        match self.api.ngo_gamification(ngo_id).await {
            Ok(g) => self.state.write().gamification = Some(g.with_level_progress()),
            Err(e) => warn!(ngo_id, error = %e, "failed to refresh NGO gamification"),
        }
    }

    pub fn set_projects(&self, projects: Vec<NgoProject>) {
        self.state.write().projects = projects;
    }

    pub fn set_donations(&self, donations: Vec<Donation>) {
        self.state.write().donations = donations;
    }

    /// School projects this NGO can still donate to.
    pub fn available_school_projects(&self, projects: &[SchoolProject]) -> Vec<SchoolProject> {
        filters::available_active_projects(projects, &self.state.read().donations)
    }

    async fn own_projects(&self, ngo_id: i64) -> Result<Vec<NgoProject>> {
        let all = self.api.ngo_projects().await?;
        Ok(all.into_iter().filter(|p| p.ngo_id == Some(ngo_id)).collect())
    }

    async fn combined_donations(&self, ngo_id: i64) -> Vec<Donation> {
        let (students, projects) = futures::join!(
            self.api.ngo_student_donations(ngo_id),
            self.api.ngo_project_donations(ngo_id),
        );
        let mut all = or_default("NGO student donations", students);
        all.extend(or_default("NGO project donations", projects));
        all
    }

    async fn gamification_or_starter(&self, ngo_id: i64) -> NgoGamification {
        match self.api.ngo_gamification(ngo_id).await {
            Ok(g) => g.with_level_progress(),
            Err(e) => {
                warn!(ngo_id, error = %e, "NGO gamification unavailable, using starter record");
                NgoGamification::starter(ngo_id)
            }
        }
    }
}
