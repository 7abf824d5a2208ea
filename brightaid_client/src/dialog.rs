//! Form submissions that upload files and post JSON on the user's behalf.
//!
//! Each flow drives a [`DialogState`]: it must be opened before it can be
//! submitted, is `Submitting` while requests are in flight, and ends either
//! `Closed` (success) or `Error` with the message to show.

use rand::seq::SliceRandom;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::api::{ApiClient, UploadFile};
use crate::error::{Error, Result};
use crate::models::{AvailableDonation, FundUtilization, PaymentInitiation};

/// Fixed amount for a student sponsorship.
pub const STUDENT_SPONSORSHIP_AMOUNT: &str = "3000";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DialogState {
    #[default]
    Closed,
    Open,
    Submitting,
    Error(String),
}

impl DialogState {
    pub fn open(&mut self) {
        *self = DialogState::Open;
    }

    pub fn close(&mut self) {
        *self = DialogState::Closed;
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            DialogState::Error(msg) => Some(msg.as_str()),
            _ => None,
        }
    }

    /// Runs `submit` if the dialog is open or showing an error, and records
    /// the outcome. If the returned future is dropped before it completes,
    /// the dialog goes back to `Open`.
    pub async fn submit<T, F>(&mut self, submit: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        match self {
            DialogState::Open | DialogState::Error(_) => {}
            DialogState::Closed => return Err(Error::InvalidState("dialog is not open")),
            DialogState::Submitting => return Err(Error::InvalidState("already submitting")),
        }
        let guard = SubmitGuard::new(self);
        let result = submit.await;
        *guard.state = match &result {
            Ok(_) => DialogState::Closed,
            Err(e) => DialogState::Error(e.to_string()),
        };
        result
    }
}

/// Holds a dialog in `Submitting` and reopens it if dropped mid-submit.
struct SubmitGuard<'a> {
    state: &'a mut DialogState,
}

impl<'a> SubmitGuard<'a> {
    fn new(state: &'a mut DialogState) -> Self {
        *state = DialogState::Submitting;
        Self { state }
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        if matches!(self.state, DialogState::Submitting) {
            *self.state = DialogState::Open;
        }
    }
}

// Post update

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdateDraft {
    pub project_id: i64,
    pub update_title: String,
    pub update_description: String,
    pub progress_percentage: Option<f64>,
    pub amount_utilized: Option<f64>,
    pub images_urls: Vec<String>,
}

impl ApiClient {
    pub async fn create_project_update(&self, draft: &ProjectUpdateDraft) -> Result<Value> {
        self.post_json("project-updates", draft).await
    }

    pub async fn project_updates(&self, project_id: i64) -> Result<Vec<Value>> {
        self.get_list(&format!("project-updates/project/{project_id}"))
            .await
    }

    /// Uploads `images` (if any) and posts the update. A failed upload
    /// aborts before anything is posted.
    pub async fn post_project_update(
        &self,
        mut draft: ProjectUpdateDraft,
        images: Vec<UploadFile>,
    ) -> Result<Value> {
        if !images.is_empty() {
            draft.images_urls = self
                .upload_project_images(draft.project_id, images)
                .await?;
        }
        let created = self.create_project_update(&draft).await?;
        info!(project_id = draft.project_id, "project update posted");
        Ok(created)
    }
}

// Record expense

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransparencyDraft {
    pub additional_notes: Option<String>,
    pub before_photos: Vec<String>,
    pub after_photos: Vec<String>,
    pub beneficiary_feedback: Option<String>,
    pub is_public: bool,
    pub quantity_purchased: Option<f64>,
    pub unit_cost: Option<f64>,
    pub unit_measurement: Option<String>,
}

impl Default for TransparencyDraft {
    fn default() -> Self {
        Self {
            additional_notes: None,
            before_photos: Vec::new(),
            after_photos: Vec::new(),
            beneficiary_feedback: None,
            is_public: true,
            quantity_purchased: None,
            unit_cost: None,
            unit_measurement: None,
        }
    }
}

impl TransparencyDraft {
    /// True when any field differs from an untouched form.
    pub fn has_content(&self) -> bool {
        let filled = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.trim().is_empty());
        filled(&self.additional_notes)
            || filled(&self.beneficiary_feedback)
            || filled(&self.unit_measurement)
            || !self.before_photos.is_empty()
            || !self.after_photos.is_empty()
            || !self.is_public
            || self.quantity_purchased.is_some()
            || self.unit_cost.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundUtilizationDraft {
    pub project_id: i64,
    pub donation_id: Option<i64>,
    pub amount_used: f64,
    pub specific_purpose: String,
    pub detailed_description: Option<String>,
    pub vendor_name: Option<String>,
    pub bill_invoice_number: Option<String>,
    pub receipt_image_url: Option<String>,
    pub utilization_date: String,
    pub utilization_status: String,
}

impl FundUtilizationDraft {
    /// A draft dated today, approved on submission like every expense the
    /// school records itself.
    pub fn new(project_id: i64, amount_used: f64, specific_purpose: impl Into<String>) -> Self {
        Self {
            project_id,
            amount_used,
            specific_purpose: specific_purpose.into(),
            utilization_date: chrono::Local::now().format("%Y-%m-%d").to_string(),
            utilization_status: "APPROVED".to_string(),
            ..Self::default()
        }
    }
}

/// Everything the record-expense form collects.
#[derive(Debug, Clone, Default)]
pub struct ExpenseForm {
    pub utilization: FundUtilizationDraft,
    pub transparency: TransparencyDraft,
    pub receipt: Option<UploadFile>,
    pub before_photos: Vec<UploadFile>,
    pub after_photos: Vec<UploadFile>,
}

impl ApiClient {
    pub async fn available_donations(&self, project_id: i64) -> Result<Vec<AvailableDonation>> {
        self.get_list(&format!("donations/project/{project_id}/available"))
            .await
    }

    pub async fn create_basic_fund_utilization(
        &self,
        draft: &FundUtilizationDraft,
    ) -> Result<FundUtilization> {
        self.post_json("fund-utilization/basic", draft).await
    }

    pub async fn add_transparency(
        &self,
        utilization_id: i64,
        draft: &TransparencyDraft,
    ) -> Result<Value> {
        self.post_json(
            &format!("fund-utilization/{utilization_id}/transparency"),
            draft,
        )
        .await
    }

    /// Records an expense against a project: uploads the receipt and
    /// before/after photos, creates the utilization, then attaches
    /// transparency data if the form has any or photos were selected.
    ///
    /// Image upload failures and a failed transparency post are logged and
    /// do not fail the expense.
    pub async fn record_expense(
        &self,
        form: ExpenseForm,
        available: &[AvailableDonation],
    ) -> Result<FundUtilization> {
        let ExpenseForm {
            mut utilization,
            mut transparency,
            receipt,
            before_photos,
            after_photos,
        } = form;
        let project_id = utilization.project_id;

        validate_amount(&utilization, available)?;

        // Selected photos count as transparency data even if their upload fails.
        let attach_transparency =
            transparency.has_content() || !before_photos.is_empty() || !after_photos.is_empty();

        if let Some(receipt) = receipt {
            utilization.receipt_image_url = self
                .upload_or_empty(self.upload_project_images(project_id, vec![receipt]), "receipt")
                .await
                .into_iter()
                .next();
        }
        if !before_photos.is_empty() {
            transparency.before_photos = self
                .upload_or_empty(
                    self.upload_transparency_images(project_id, "before", before_photos),
                    "before",
                )
                .await;
        }
        if !after_photos.is_empty() {
            transparency.after_photos = self
                .upload_or_empty(
                    self.upload_transparency_images(project_id, "after", after_photos),
                    "after",
                )
                .await;
        }

        if utilization.donation_id.is_none() {
            utilization.donation_id = available
                .choose(&mut rand::thread_rng())
                .and_then(|d| d.donation_id);
        }

        let created = self.create_basic_fund_utilization(&utilization).await?;
        info!(project_id, utilization_id = ?created.utilization_id, "expense recorded");

        if attach_transparency {
            match created.utilization_id {
                Some(id) => {
                    if let Err(e) = self.add_transparency(id, &transparency).await {
                        warn!(utilization_id = id, error = %e, "transparency creation failed");
                    }
                }
                None => warn!("utilization has no id, transparency not attached"),
            }
        }
        Ok(created)
    }

    async fn upload_or_empty<F>(&self, upload: F, what: &str) -> Vec<String>
    where
        F: std::future::Future<Output = Result<Vec<String>>>,
    {
        match upload.await {
            Ok(urls) => urls,
            Err(e) => {
                warn!(error = %e, "failed to upload {what} images");
                Vec::new()
            }
        }
    }
}

/// The amount may not exceed what is left of the selected donation.
pub fn validate_amount(draft: &FundUtilizationDraft, available: &[AvailableDonation]) -> Result<()> {
    if draft.amount_used <= 0.0 {
        return Err(Error::Validation("amount used must be positive".into()));
    }
    let Some(selected) = draft
        .donation_id
        .and_then(|id| available.iter().find(|d| d.donation_id == Some(id)))
    else {
        return Ok(());
    };
    match selected.remaining_amount {
        Some(remaining) if draft.amount_used > remaining => Err(Error::Validation(format!(
            "amount exceeds available funds, maximum is {remaining}"
        ))),
        _ => Ok(()),
    }
}

// Donate

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Donator {
    Donor(i64),
    Ngo(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DonationTarget {
    Student { student_id: Option<i64> },
    Project { project_id: Option<i64>, title: Option<String> },
    General,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub donator: Donator,
    pub target: DonationTarget,
    /// Ignored for student sponsorships, which have a fixed amount.
    pub amount: String,
}

impl PaymentRequest {
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let amount = match self.target {
            DonationTarget::Student { .. } => STUDENT_SPONSORSHIP_AMOUNT.to_string(),
            _ => self.amount.clone(),
        };
        let mut query = vec![("amount", amount)];
        match self.donator {
            Donator::Donor(id) => query.push(("donorId", id.to_string())),
            Donator::Ngo(id) => query.push(("ngoId", id.to_string())),
        }
        let (product_name, category) = match &self.target {
            DonationTarget::Student { student_id } => {
                if let Some(id) = student_id {
                    query.push(("studentId", id.to_string()));
                }
                ("Student Sponsorship".to_string(), "Sponsorship")
            }
            DonationTarget::Project { project_id, title } => {
                if let Some(id) = project_id {
                    query.push(("projectId", id.to_string()));
                }
                (
                    title.clone().unwrap_or_else(|| "Project Donation".to_string()),
                    "Project",
                )
            }
            DonationTarget::General => ("General Donation".to_string(), "Donation"),
        };
        query.push(("productName", product_name));
        query.push(("productCategory", category.to_string()));
        query
    }
}

impl ApiClient {
    /// Starts a hosted payment and returns the URL the user must visit.
    pub async fn initiate_payment(&self, request: &PaymentRequest) -> Result<String> {
        if request.amount.trim().is_empty() && !matches!(request.target, DonationTarget::Student { .. }) {
            return Err(Error::Validation("donation amount is required".into()));
        }
        let result: PaymentInitiation = self
            .post_query("payment-transactions/sslcommerz/initiate", &request.query())
            .await?;
        match (result.status.as_deref(), result.payment_url) {
            (Some("SUCCESS"), Some(url)) => Ok(url),
            (status, _) => Err(Error::Payment(format!(
                "gateway answered with status {}",
                status.unwrap_or("unknown")
            ))),
        }
    }
}
