//! Pure derivations over snapshot data, shared by the role stores and views.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::models::{Donation, SchoolProject};

/// Display category of a donation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationPurpose {
    StudentSponsorship,
    SchoolProject,
    NgoProject,
    NgoStudentSupport,
}

impl DonationPurpose {
    pub fn label(self) -> &'static str {
        match self {
            DonationPurpose::StudentSponsorship => "Student Sponsorship",
            DonationPurpose::SchoolProject => "School Project",
            DonationPurpose::NgoProject => "NGO Project",
            DonationPurpose::NgoStudentSupport => "NGO Student Support",
        }
    }

    /// The backend's `purpose` wins; otherwise NGO-sourced rows are told
    /// apart by what they name, and anything with a student is a sponsorship.
    pub fn of(donation: &Donation) -> Self {
        match donation.purpose.as_deref() {
            Some("STUDENT_SPONSORSHIP") => return DonationPurpose::StudentSponsorship,
            Some("SCHOOL_PROJECT") => return DonationPurpose::SchoolProject,
            Some("NGO_PROJECT") => return DonationPurpose::NgoProject,
            _ => {}
        }
        if donation.source.as_deref() == Some("ngo") {
            if donation.student_name.is_some() {
                return DonationPurpose::NgoStudentSupport;
            }
            if donation.project_title.is_some() {
                return DonationPurpose::NgoProject;
            }
        }
        if donation.student_id.is_some() {
            DonationPurpose::StudentSponsorship
        } else {
            DonationPurpose::SchoolProject
        }
    }
}

impl fmt::Display for DonationPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// `None` or `"active"` in any case.
pub fn is_active_status(status: Option<&str>) -> bool {
    status.map_or(true, |s| s.eq_ignore_ascii_case("active"))
}

/// Distinct project ids the donations were made to.
pub fn donated_project_ids(donations: &[Donation]) -> BTreeSet<i64> {
    donations
        .iter()
        .filter_map(Donation::target_project_id)
        .collect()
}

/// Projects minus those already donated to. Projects without an id are kept.
pub fn exclude_donated_projects(
    projects: &[SchoolProject],
    donations: &[Donation],
) -> Vec<SchoolProject> {
    let donated = donated_project_ids(donations);
    projects
        .iter()
        .filter(|p| p.project_id.map_or(true, |id| !donated.contains(&id)))
        .cloned()
        .collect()
}

/// Active projects not yet donated to.
pub fn available_active_projects(
    projects: &[SchoolProject],
    donations: &[Donation],
) -> Vec<SchoolProject> {
    exclude_donated_projects(projects, donations)
        .into_iter()
        .filter(|p| is_active_status(p.status.as_deref()))
        .collect()
}

pub fn total_amount(donations: &[Donation]) -> f64 {
    donations.iter().map(Donation::amount_or_zero).sum()
}

pub fn completed_total(donations: &[Donation]) -> f64 {
    donations
        .iter()
        .filter(|d| d.is_completed())
        .map(Donation::amount_or_zero)
        .sum()
}

pub fn totals_by_purpose(donations: &[Donation]) -> BTreeMap<DonationPurpose, f64> {
    let mut totals = BTreeMap::new();
    for donation in donations {
        *totals.entry(DonationPurpose::of(donation)).or_insert(0.0) += donation.amount_or_zero();
    }
    totals
}
