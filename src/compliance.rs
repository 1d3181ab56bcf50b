use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDateTime;

use crate::dates::{DateField, MonthYear};
use crate::models::{
    ComplianceSummary, Fellow, FellowCompliance, MonthState, ReportObligation, StatusReport,
};

pub const SENIOR_END_MONTH: &str = "Nov 2026";
pub const STANDARD_END_MONTH: &str = "Sep 2026";

/// End-month tokens the program recognises. Anything else yields no calendar.
pub const KNOWN_END_MONTHS: [&str; 11] = [
    "Feb 2026", "Mar 2026", "Apr 2026", "May 2026", "Jun 2026", "Jul 2026", "Aug 2026",
    "Sep 2026", "Oct 2026", "Nov 2026", "Dec 2026",
];

pub const GIFT_CARD_STREAK: u32 = 3;
pub const PAUSE_AFTER_MISSES: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarIssue {
    MissingStartDate,
    MalformedStartDate(String),
    UnknownEndMonth(String),
}

impl fmt::Display for CalendarIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalendarIssue::MissingStartDate => write!(f, "report start date is not set"),
            CalendarIssue::MalformedStartDate(raw) => {
                write!(f, "report start date {raw:?} is not a YYYY-MM-DD date")
            }
            CalendarIssue::UnknownEndMonth(raw) => {
                write!(f, "report end month {raw:?} is not a recognised month")
            }
        }
    }
}

pub fn resolve_end_month<'a>(fellow_type: &str, end_override: Option<&'a str>) -> &'a str {
    match end_override {
        Some(token) if !token.is_empty() => token,
        _ if fellow_type.contains("Senior") => SENIOR_END_MONTH,
        _ => STANDARD_END_MONTH,
    }
}

pub fn known_end_month(token: &str) -> Option<MonthYear> {
    if KNOWN_END_MONTHS.contains(&token) {
        token.parse().ok()
    } else {
        None
    }
}

pub fn required_report_months(obligation: &ReportObligation) -> Vec<MonthYear> {
    if !obligation.requires_monthly_reports {
        return Vec::new();
    }
    let start = match &obligation.report_start_date {
        DateField::Valid(date) => MonthYear::from_date(*date),
        DateField::Absent | DateField::Malformed(_) => return Vec::new(),
    };
    let end_token = resolve_end_month(
        &obligation.fellow_type,
        obligation.report_end_month.as_deref(),
    );
    match known_end_month(end_token) {
        Some(end) => start.through(end),
        None => Vec::new(),
    }
}

/// Explains an empty calendar for a fellow who is supposed to be reporting.
pub fn calendar_issue(obligation: &ReportObligation) -> Option<CalendarIssue> {
    if !obligation.requires_monthly_reports {
        return None;
    }
    match &obligation.report_start_date {
        DateField::Absent => return Some(CalendarIssue::MissingStartDate),
        DateField::Malformed(raw) => return Some(CalendarIssue::MalformedStartDate(raw.clone())),
        DateField::Valid(_) => {}
    }
    let end_token = resolve_end_month(
        &obligation.fellow_type,
        obligation.report_end_month.as_deref(),
    );
    if known_end_month(end_token).is_none() {
        return Some(CalendarIssue::UnknownEndMonth(end_token.to_string()));
    }
    None
}

/// A month is past due once its last day has fully elapsed.
pub fn is_past_due(month: MonthYear, now: NaiveDateTime) -> bool {
    now > month.due_at()
}

pub fn past_due_months(required: &[MonthYear], now: NaiveDateTime) -> Vec<MonthYear> {
    required
        .iter()
        .copied()
        .filter(|month| is_past_due(*month, now))
        .collect()
}

fn submitted_months(reports: &[StatusReport]) -> HashSet<&str> {
    reports
        .iter()
        .filter(|report| report.submitted)
        .map(|report| report.month.as_str())
        .collect()
}

pub fn calculate_report_streak(
    reports: &[StatusReport],
    required: &[MonthYear],
    now: NaiveDateTime,
) -> ComplianceSummary {
    if required.is_empty() {
        return ComplianceSummary::default();
    }

    let submitted = submitted_months(reports);
    let past_due: Vec<bool> = past_due_months(required, now)
        .iter()
        .map(|month| submitted.contains(month.to_string().as_str()))
        .collect();

    let streak = past_due.iter().rev().take_while(|done| **done).count() as u32;
    let missed_count = past_due.iter().rev().take_while(|done| !**done).count() as u32;

    ComplianceSummary {
        streak,
        gift_card_eligible: streak >= GIFT_CARD_STREAK,
        at_risk: missed_count == 1,
        reimbursements_paused: missed_count >= PAUSE_AFTER_MISSES,
        missed_count,
    }
}

pub fn assess(fellow: &Fellow, reports: &[StatusReport], now: NaiveDateTime) -> FellowCompliance {
    let months = required_report_months(&fellow.report_obligation());
    let summary = calculate_report_streak(reports, &months, now);
    FellowCompliance {
        fellow_id: fellow.id.clone(),
        fellow_name: fellow.name.clone(),
        months,
        summary,
    }
}

pub fn month_states(
    reports: &[StatusReport],
    required: &[MonthYear],
    now: NaiveDateTime,
) -> Vec<(MonthYear, MonthState)> {
    let submitted = submitted_months(reports);
    required
        .iter()
        .map(|month| {
            let state = if submitted.contains(month.to_string().as_str()) {
                MonthState::Submitted
            } else if is_past_due(*month, now) {
                MonthState::Missed
            } else {
                MonthState::NotYetDue
            };
            (*month, state)
        })
        .collect()
}
