//! Construction projects owned by client companies.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::{check_amount, require_text};
use crate::domain::record::{EntityKind, LiveRecord};
use crate::domain::{CompanyId, ContactId, Error, ProjectId, UserId};

/// Construction phase of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectStatus {
    /// Scoping and design.
    Planning,
    /// Waiting on permits.
    Permitting,
    /// Demolition.
    Demo,
    /// Foundation work.
    Foundation,
    /// Framing.
    Framing,
    /// Mechanical rough-in.
    Mechanical,
    /// Electrical rough-in.
    Electrical,
    /// Plumbing rough-in.
    Plumbing,
    /// Drywall.
    Drywall,
    /// Interior finishing.
    Finishing,
    /// Exterior and landscaping.
    Landscaping,
    /// Deficiency walk-through.
    #[serde(rename = "Punch List")]
    PunchList,
    /// Handed over.
    Complete,
}

impl ProjectStatus {
    /// Every status in workflow order.
    pub const ALL: [Self; 13] = [
        Self::Planning,
        Self::Permitting,
        Self::Demo,
        Self::Foundation,
        Self::Framing,
        Self::Mechanical,
        Self::Electrical,
        Self::Plumbing,
        Self::Drywall,
        Self::Finishing,
        Self::Landscaping,
        Self::PunchList,
        Self::Complete,
    ];

    /// Label stored in the `status` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "Planning",
            Self::Permitting => "Permitting",
            Self::Demo => "Demo",
            Self::Foundation => "Foundation",
            Self::Framing => "Framing",
            Self::Mechanical => "Mechanical",
            Self::Electrical => "Electrical",
            Self::Plumbing => "Plumbing",
            Self::Drywall => "Drywall",
            Self::Finishing => "Finishing",
            Self::Landscaping => "Landscaping",
            Self::PunchList => "Punch List",
            Self::Complete => "Complete",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| {
                Error::invalid_request(format!("unknown project status `{raw}`"))
                    .with_details(json!({ "field": "status", "code": "unknown_status" }))
            })
    }
}

/// A row of `projects`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Primary key.
    pub id: ProjectId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Street address.
    pub address: String,
    /// City.
    #[serde(default)]
    pub city: Option<String>,
    /// Province or state.
    #[serde(default)]
    pub province: Option<String>,
    /// Postal code.
    #[serde(default)]
    pub postal_code: Option<String>,
    /// Internal project code.
    #[serde(default)]
    pub project_code: Option<String>,
    /// Company the work is for.
    pub client_company_id: CompanyId,
    /// The client's main contact for this project.
    #[serde(default)]
    pub primary_contact_id: Option<ContactId>,
    /// Lifecycle stage.
    pub status: ProjectStatus,
    /// Latest status note shown to the client.
    #[serde(default)]
    pub last_update: Option<String>,
    /// Date of `last_update`.
    #[serde(default)]
    pub last_update_date: Option<NaiveDate>,
    /// Scheduled start.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Scheduled completion; never before `start_date`.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Estimate in dollars; never negative.
    #[serde(default)]
    pub estimated_value: Option<f64>,
    /// Signed contract value in dollars; never negative.
    #[serde(default)]
    pub contract_value: Option<f64>,
    /// Percentage of each payment held back until completion.
    #[serde(default)]
    pub holdback_percentage: Option<f64>,
    /// Client purchase order number.
    #[serde(default)]
    pub po_number: Option<String>,
    /// Building permit number.
    #[serde(default)]
    pub permit_number: Option<String>,
    /// Foreman on site.
    #[serde(default)]
    pub site_foreman: Option<String>,
    /// Foreman's phone number.
    #[serde(default)]
    pub foreman_phone: Option<String>,
    /// Staff member who created the row.
    #[serde(default)]
    pub created_by: Option<UserId>,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl LiveRecord for Project {
    const KIND: EntityKind = EntityKind::Project;

    fn record_id(&self) -> Uuid {
        *self.id.as_uuid()
    }

    /// Most recent status update first; projects never updated sink to
    /// the bottom. Ties fall back to the row's modification time.
    fn collection_order(&self, other: &Self) -> Ordering {
        match (self.last_update_date, other.last_update_date) {
            (Some(mine), Some(theirs)) => theirs.cmp(&mine),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| other.updated_at.cmp(&self.updated_at))
    }
}

/// Input for creating a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Street address.
    pub address: String,
    /// City.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Province or state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    /// Postal code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// Internal project code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_code: Option<String>,
    /// Company the work is for.
    pub client_company_id: CompanyId,
    /// The client's main contact for this project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_contact_id: Option<ContactId>,
    /// Lifecycle stage.
    pub status: ProjectStatus,
    /// Scheduled start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// Scheduled completion; never before `start_date`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Estimate in dollars; never negative.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_value: Option<f64>,
    /// Signed contract value in dollars; never negative.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_value: Option<f64>,
}

impl NewProject {
    /// Minimal input; optional columns start empty.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        client_company_id: CompanyId,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            address: address.into(),
            city: None,
            province: None,
            postal_code: None,
            project_code: None,
            client_company_id,
            primary_contact_id: None,
            status: ProjectStatus::Planning,
            start_date: None,
            end_date: None,
            estimated_value: None,
            contract_value: None,
        }
    }

    /// Reject malformed input before any I/O.
    pub fn validate(&self) -> Result<(), Error> {
        require_text("name", &self.name)?;
        require_text("address", &self.address)?;
        check_amount("estimated_value", self.estimated_value)?;
        check_amount("contract_value", self.contract_value)?;
        check_schedule(self.start_date, self.end_date)
    }
}

/// Partial update for a project. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectPatch {
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Street address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Lifecycle stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    /// Latest status note shown to the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,
    /// The client's main contact for this project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_contact_id: Option<ContactId>,
    /// Scheduled start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// Scheduled completion; never before `start_date`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Estimate in dollars; never negative.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_value: Option<f64>,
    /// Signed contract value in dollars; never negative.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_value: Option<f64>,
    /// Client purchase order number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub po_number: Option<String>,
    /// Building permit number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permit_number: Option<String>,
    /// Foreman on site.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_foreman: Option<String>,
    /// Foreman's phone number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreman_phone: Option<String>,
}

impl ProjectPatch {
    /// Reject malformed input before any I/O.
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(address) = &self.address {
            require_text("address", address)?;
        }
        check_amount("estimated_value", self.estimated_value)?;
        check_amount("contract_value", self.contract_value)?;
        check_schedule(self.start_date, self.end_date)
    }
}

fn check_schedule(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<(), Error> {
    match (start, end) {
        (Some(from), Some(to)) if to < from => Err(Error::invalid_request(
            "end_date must not precede start_date",
        )
        .with_details(json!({ "field": "end_date", "code": "before_start" }))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::record::{from_row, to_row};

    fn project(last_update_date: Option<&str>, updated_at: &str) -> Project {
        let row = to_row(&json!({
            "id": Uuid::new_v4().to_string(),
            "name": "Kitchen",
            "address": "1 Main St",
            "client_company_id": Uuid::new_v4().to_string(),
            "status": "Punch List",
            "last_update_date": last_update_date,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": updated_at,
        }))
        .expect("object row");
        from_row(row).expect("project row")
    }

    #[rstest]
    fn decodes_punch_list_label() {
        let p = project(None, "2024-01-01T00:00:00Z");
        assert_eq!(p.status, ProjectStatus::PunchList);
    }

    #[rstest]
    fn recent_updates_sort_first_and_undated_last() {
        let older = project(Some("2024-02-01"), "2024-03-01T00:00:00Z");
        let newer = project(Some("2024-02-10"), "2024-02-10T00:00:00Z");
        let undated = project(None, "2024-05-01T00:00:00Z");
        assert_eq!(newer.collection_order(&older), Ordering::Less);
        assert_eq!(older.collection_order(&undated), Ordering::Less);
    }

    #[rstest]
    fn ties_break_on_updated_at() {
        let a = project(Some("2024-02-01"), "2024-02-01T10:00:00Z");
        let b = project(Some("2024-02-01"), "2024-02-01T12:00:00Z");
        assert_eq!(b.collection_order(&a), Ordering::Less);
    }

    #[rstest]
    #[case("punch list", ProjectStatus::PunchList)]
    #[case(" Complete ", ProjectStatus::Complete)]
    fn parses_status_labels(#[case] raw: &str, #[case] expected: ProjectStatus) {
        assert_eq!(raw.parse::<ProjectStatus>().expect("status"), expected);
    }

    #[rstest]
    fn rejects_end_before_start() {
        let mut input = NewProject::new("Deck", "2 Side Rd", CompanyId::random());
        input.start_date = NaiveDate::from_ymd_opt(2024, 5, 1);
        input.end_date = NaiveDate::from_ymd_opt(2024, 4, 1);
        let err = input.validate().expect_err("invalid schedule");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[rstest]
    fn patch_serialises_only_set_columns() {
        let patch = ProjectPatch {
            status: Some(ProjectStatus::Framing),
            ..ProjectPatch::default()
        };
        let row = to_row(&patch).expect("object row");
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("status"), Some(&json!("Framing")));
    }
}
