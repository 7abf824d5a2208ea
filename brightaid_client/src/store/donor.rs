use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{or_default, or_none, Cell, RefreshGuard, RefreshOutcome};
use crate::api::{ApiClient, ProjectFilter};
use crate::filters;
use crate::identity::IdentityStorage;
use crate::models::{Donation, Donor, DonorGamification, DonorStats, School, SchoolProject, Student};

/// Used when the backend cannot list project types.
pub const FALLBACK_PROJECT_TYPES: [&str; 7] = [
    "Infrastructure",
    "Education",
    "Technology",
    "Health & Safety",
    "Sports & Recreation",
    "Arts & Culture",
    "Environment",
];

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorSnapshot {
    pub donor: Option<Donor>,
    pub donations: Vec<Donation>,
    pub projects: Vec<SchoolProject>,
    pub schools: Vec<School>,
    pub sponsored_students: Vec<Student>,
    pub high_risk_students: Vec<Student>,
    pub gamification: Option<DonorGamification>,
    pub stats: Option<DonorStats>,
    pub unique_schools_count: i64,
}

/// Figures derived from the snapshot for the dashboard header.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorSummary {
    pub total_donated: f64,
    pub unique_schools: i64,
    pub active_projects: usize,
}

/// What the payment window reports back when it closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

impl PaymentMessage {
    pub const PAYMENT_COMPLETE: &'static str = "PAYMENT_COMPLETE";

    pub fn complete(status: &str, transaction_id: Option<&str>) -> Self {
        Self {
            kind: Self::PAYMENT_COMPLETE.to_string(),
            status: Some(status.to_string()),
            transaction_id: transaction_id.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum PaymentNotice {
    Success { refresh: RefreshOutcome },
    Failed,
    Cancelled,
    Ignored,
}

impl PaymentNotice {
    pub fn title(&self) -> &'static str {
        match self {
            PaymentNotice::Success { .. } => "Payment Successful!",
            PaymentNotice::Failed => "Payment Failed",
            PaymentNotice::Cancelled => "Payment Cancelled",
            PaymentNotice::Ignored => "",
        }
    }
}

/// Everything a donor's dashboard shows.
pub struct DonorStore {
    api: ApiClient,
    identity: IdentityStorage,
    state: Cell<DonorSnapshot>,
    loading: AtomicBool,
}

impl DonorStore {
    pub fn new(api: ApiClient, identity: IdentityStorage) -> Self {
        Self {
            api,
            identity,
            state: Cell::default(),
            loading: AtomicBool::new(false),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn identity(&self) -> &IdentityStorage {
        &self.identity
    }

    pub fn snapshot(&self) -> DonorSnapshot {
        self.state.snapshot()
    }

    pub fn loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Re-fetches everything for `user_id`, or for the stored user when
    /// `None`, and replaces the snapshot.
    pub async fn refresh(&self, user_id: Option<&str>) -> RefreshOutcome {
        let Some(user_id) = user_id.map(str::to_string).or_else(|| self.identity.user_id()) else {
            info!("no donor user id given or stored");
            return RefreshOutcome::NoIdentity;
        };

        let Some(_guard) = RefreshGuard::try_acquire(&self.loading) else {
            debug!(%user_id, "donor refresh already in flight, skipping");
            return RefreshOutcome::AlreadyInFlight;
        };

        let donor = or_none("donor profile", self.api.donor_by_user(&user_id).await);
        let Some(donor_id) = donor.as_ref().and_then(Donor::effective_id) else {
            info!(%user_id, "no donor profile for user");
            self.state.write().donor = donor;
            return RefreshOutcome::NoProfile;
        };

        let (donations, projects, schools, sponsored, high_risk, gamification, unique, stats) = tokio::join!(
            self.api.donations_by_donor(donor_id),
            self.api.school_projects(),
            self.api.schools(),
            self.api.sponsored_students(donor_id),
            self.api.high_risk_students(),
            self.api.donor_gamification(donor_id),
            self.api.unique_schools_count(donor_id),
            self.api.donor_stats(donor_id),
        );

        let snapshot = DonorSnapshot {
            donor,
            donations: or_default("donations", donations),
            projects: or_default("school projects", projects),
            schools: or_default("schools", schools),
            sponsored_students: or_default("sponsored students", sponsored),
            high_risk_students: or_default("high-risk students", high_risk),
            gamification: or_none("donor gamification", gamification),
            unique_schools_count: or_default("unique schools count", unique),
            stats: or_none("donor stats", stats),
        };
        info!(
            donor_id,
            donations = snapshot.donations.len(),
            projects = snapshot.projects.len(),
            "donor data refreshed"
        );
        *self.state.write() = snapshot;
        RefreshOutcome::Refreshed
    }

    /// Loads the donor-independent lists before anyone has logged in.
    pub async fn initialize(&self) {
        let (projects, schools, donations) = tokio::join!(
            self.api.school_projects(),
            self.api.schools(),
            self.api.all_donations(),
        );
        let mut state = self.state.write();
        state.projects = or_default("school projects", projects);
        state.schools = or_default("schools", schools);
        state.donations = or_default("donations", donations);
        state.gamification = None;
    }

    pub async fn fetch_filtered_projects(&self, filter: &ProjectFilter) -> Vec<SchoolProject> {
        or_default(
            "filtered projects",
            self.api.filter_school_projects(filter).await,
        )
    }

    pub async fn fetch_project_types(&self) -> Vec<String> {
        match self.api.project_type_names().await {
            Ok(types) => types,
            Err(e) => {
                warn!(error = %e, "project types unavailable, using built-in list");
                FALLBACK_PROJECT_TYPES.iter().map(|t| t.to_string()).collect()
            }
        }
    }

    /// Records a donation and, on success, refreshes the stored donor.
    pub async fn create_donation<B: Serialize + ?Sized>(&self, donation: &B) -> Option<Donation> {
        match self.api.create_donation(donation).await {
            Ok(created) => {
                self.refresh(None).await;
                Some(created)
            }
            Err(e) => {
                warn!(error = %e, "failed to create donation");
                None
            }
        }
    }

    pub fn summary(&self) -> DonorSummary {
        let state = self.state.read();
        DonorSummary {
            total_donated: filters::total_amount(&state.donations),
            unique_schools: state
                .gamification
                .as_ref()
                .and_then(|g| g.schools_supported)
                .unwrap_or(0),
            active_projects: state
                .projects
                .iter()
                .filter(|p| p.status.as_deref() == Some("ACTIVE"))
                .count(),
        }
    }

    /// Projects the donor has not donated to yet.
    pub fn available_projects(&self) -> Vec<SchoolProject> {
        let state = self.state.read();
        filters::exclude_donated_projects(&state.projects, &state.donations)
    }

    /// Reacts to the payment window's completion message. A valid payment
    /// refreshes the stored donor so totals include it.
    pub async fn handle_payment_message(&self, message: &PaymentMessage) -> PaymentNotice {
        if message.kind != PaymentMessage::PAYMENT_COMPLETE {
            return PaymentNotice::Ignored;
        }
        match message.status.as_deref() {
            Some("VALID") => {
                info!(transaction_id = ?message.transaction_id, "payment completed");
                let refresh = self.refresh(None).await;
                PaymentNotice::Success { refresh }
            }
            Some("FAILED") => {
                warn!(transaction_id = ?message.transaction_id, "payment failed");
                PaymentNotice::Failed
            }
            Some("CANCELLED") => {
                info!(transaction_id = ?message.transaction_id, "payment cancelled");
                PaymentNotice::Cancelled
            }
            _ => PaymentNotice::Ignored,
        }
    }
}
