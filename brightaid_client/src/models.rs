//! Backend resources as the client sees them.
//!
//! The backend owns these shapes. Every field the client reads is optional
//! or defaulted, ids and amounts accept numbers or numeric strings, and
//! anything else is kept verbatim in `extra` so snapshots can be re-served
//! without loss.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn value_as_i64(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn value_as_f64(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn opt_id<'de, D>(d: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Value>::deserialize(d)?.as_ref().and_then(value_as_i64))
    }

    pub fn opt_amount<'de, D>(d: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Value>::deserialize(d)?.as_ref().and_then(value_as_f64))
    }

    /// `null` and missing both become `T::default()`.
    pub fn nullable<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donor {
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub donor_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub id: Option<i64>,
    #[serde(default)]
    pub donor_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Donor {
    /// Older payloads only carry `id`.
    pub fn effective_id(&self) -> Option<i64> {
        self.donor_id.or(self.id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ngo {
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub ngo_id: Option<i64>,
    #[serde(default)]
    pub ngo_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct School {
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub school_id: Option<i64>,
    #[serde(default)]
    pub school_name: Option<String>,
    /// Filled in by the client from `/schools/{id}/total-funds-received`.
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub total_funds_received: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolRef {
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub school_id: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropoutPrediction {
    #[serde(default)]
    pub risk_status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub student_id: Option<i64>,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub school_id: Option<i64>,
    #[serde(default)]
    pub school: Option<SchoolRef>,
    #[serde(default)]
    pub risk_status: Option<String>,
    #[serde(default, deserialize_with = "lenient::nullable")]
    pub dropout_predictions: Vec<DropoutPrediction>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Student {
    pub fn belongs_to_school(&self, school_id: i64) -> bool {
        self.school.as_ref().and_then(|s| s.school_id) == Some(school_id)
            || self.school_id == Some(school_id)
    }

    pub fn is_high_risk(&self) -> bool {
        self.risk_status.as_deref() == Some("HIGH")
            || self
                .dropout_predictions
                .iter()
                .any(|p| p.risk_status.as_deref() == Some("HIGH"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolProject {
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub project_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub school_id: Option<i64>,
    #[serde(default)]
    pub school: Option<SchoolRef>,
    #[serde(default)]
    pub project_title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub required_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub raised_amount: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SchoolProject {
    pub fn belongs_to_school(&self, school_id: i64) -> bool {
        self.school.as_ref().and_then(|s| s.school_id) == Some(school_id)
            || self.school_id == Some(school_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NgoProject {
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub ngo_project_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub ngo_id: Option<i64>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub budget: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRef {
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub project_id: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub donation_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub donor_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub project: Option<ProjectRef>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub student_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub amount: Option<f64>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub project_title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Donation {
    /// `projectId`, or the nested `project.projectId`.
    pub fn target_project_id(&self) -> Option<i64> {
        self.project_id
            .or_else(|| self.project.as_ref().and_then(|p| p.project_id))
    }

    pub fn is_completed(&self) -> bool {
        self.payment_status.as_deref() == Some("COMPLETED")
    }

    pub fn amount_or_zero(&self) -> f64 {
        self.amount.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorGamification {
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub donor_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub total_points: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub schools_supported: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Backend-computed donor statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorStats {
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub total_donated: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub total_projects_donated: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub total_schools_supported: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NgoGamification {
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub ngo_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub total_points: Option<i64>,
    #[serde(default)]
    pub badges_earned: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub points_to_next_level: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub progress_percentage: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundStats {
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub total_funds_received: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub total_funds_utilized: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FundStats {
    /// Whole-number share of received funds already utilized.
    pub fn utilization_percent(&self) -> i64 {
        let received = self.total_funds_received.unwrap_or(0.0);
        if received > 0.0 {
            ((self.total_funds_utilized.unwrap_or(0.0) / received) * 100.0).round() as i64
        } else {
            0
        }
    }
}

/// A donation that still has funds left to allocate to expenses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableDonation {
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub donation_id: Option<i64>,
    #[serde(default)]
    pub donor_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub utilized_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub remaining_amount: Option<f64>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundUtilization {
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub utilization_id: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub conversation_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub ngo_project_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub unread_count: Option<i64>,
    #[serde(default)]
    pub other_user_name: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub message_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub conversation_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub sender_id: Option<i64>,
    #[serde(default)]
    pub message_text: Option<String>,
    #[serde(default)]
    pub sent_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequest {
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub request_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub ngo_project_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub school_id: Option<i64>,
    #[serde(default)]
    pub request_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitiation {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
