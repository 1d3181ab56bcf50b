use std::fmt;

use serde::Serialize;

use crate::dates::{DateField, MonthYear};

#[derive(Debug, Clone, Default)]
pub struct Fellow {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub fellow_type: Option<String>,
    pub party: Option<String>,
    pub office: Option<String>,
    pub chamber: Option<String>,
    pub linkedin: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub cohort: Option<String>,
    pub status: FellowStatus,
    pub last_check_in: Option<String>,
    pub prior_role: Option<String>,
    pub education: Option<String>,
    pub notes: Option<String>,
    pub requires_monthly_reports: bool,
    pub report_start_date: Option<String>,
    pub report_end_month: Option<String>,
}

impl Fellow {
    pub fn report_obligation(&self) -> ReportObligation {
        ReportObligation {
            requires_monthly_reports: self.requires_monthly_reports,
            report_start_date: DateField::parse(self.report_start_date.as_deref()),
            fellow_type: self.fellow_type.clone().unwrap_or_default(),
            report_end_month: self.report_end_month.clone(),
        }
    }
}

/// The slice of a fellow that decides which months they owe a report for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportObligation {
    pub requires_monthly_reports: bool,
    pub report_start_date: DateField,
    pub fellow_type: String,
    pub report_end_month: Option<String>,
}

/// Placement status. Older rows carry "Active" or the kebab-case labels from
/// the first dashboard; all of them are folded in here.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FellowStatus {
    #[default]
    OnTrack,
    Flagged,
    EndingSoon,
    Other(String),
}

impl FellowStatus {
    pub fn from_label(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "active" | "on track" | "on-track" => FellowStatus::OnTrack,
            "flagged" => FellowStatus::Flagged,
            "ending soon" | "ending-soon" => FellowStatus::EndingSoon,
            _ => FellowStatus::Other(raw.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            FellowStatus::OnTrack => "On Track",
            FellowStatus::Flagged => "Flagged",
            FellowStatus::EndingSoon => "Ending Soon",
            FellowStatus::Other(label) => label,
        }
    }

    /// Lower sorts first on the roster.
    pub fn priority(&self) -> u8 {
        match self {
            FellowStatus::Flagged => 0,
            FellowStatus::EndingSoon => 1,
            FellowStatus::OnTrack => 2,
            FellowStatus::Other(_) => 99,
        }
    }
}

impl fmt::Display for FellowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub id: String,
    pub fellow_ids: Vec<String>,
    pub month: String,
    pub submitted: bool,
    pub date_submitted: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewStatusReport {
    pub fellow_id: String,
    pub month: MonthYear,
    pub submitted: bool,
    pub date_submitted: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckIn {
    pub id: String,
    pub fellow_ids: Vec<String>,
    pub date: Option<String>,
    pub check_in_type: Option<String>,
    pub notes: Option<String>,
    pub staff_member: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCheckIn {
    pub fellow_id: String,
    pub date: String,
    pub check_in_type: String,
    pub notes: Option<String>,
    pub staff_member: Option<String>,
}

/// A former fellow. `fellow_types` is a multi-select: some alumni served in
/// more than one program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alumnus {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub cohort: Option<String>,
    pub fellow_types: Vec<String>,
    pub office_served: Option<String>,
    pub chamber: Option<String>,
    pub party: Option<String>,
    pub current_role: Option<String>,
    pub current_organization: Option<String>,
    pub sector: Option<String>,
    pub location: Option<String>,
    pub linkedin: Option<String>,
    pub last_engaged: Option<String>,
    pub engagement_notes: Option<String>,
    pub notes: Option<String>,
    pub prior_role: Option<String>,
    pub education: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ComplianceSummary {
    pub streak: u32,
    pub gift_card_eligible: bool,
    pub at_risk: bool,
    pub reimbursements_paused: bool,
    pub missed_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthState {
    Submitted,
    Missed,
    NotYetDue,
}

#[derive(Debug, Clone)]
pub struct FellowCompliance {
    pub fellow_id: String,
    pub fellow_name: String,
    pub months: Vec<MonthYear>,
    pub summary: ComplianceSummary,
}
