use std::cmp::Reverse;
use std::collections::BTreeSet;

use chrono::NaiveDateTime;

use crate::dates::{days_since_at, days_until_at};
use crate::models::{Alumnus, Fellow, FellowStatus};

pub const CHECK_IN_INTERVAL_DAYS: i64 = 30;
pub const ENDING_SOON_DAYS: i64 = 90;

fn days_since_check_in(fellow: &Fellow, now: NaiveDateTime) -> i64 {
    days_since_at(fellow.last_check_in.as_deref().unwrap_or_default(), now)
}

/// No contact in the last month, or never.
pub fn needs_check_in(fellow: &Fellow, now: NaiveDateTime) -> bool {
    days_since_check_in(fellow, now) > CHECK_IN_INTERVAL_DAYS
}

/// Placement ends within the next 90 days.
pub fn ending_soon(fellow: &Fellow, now: NaiveDateTime) -> Option<i64> {
    let days = days_until_at(fellow.end_date.as_deref().unwrap_or_default(), now);
    (days > 0 && days <= ENDING_SOON_DAYS).then_some(days)
}

#[derive(Debug, Clone, Default)]
pub struct RosterFilter {
    pub status: Option<FellowStatus>,
    pub cohort: Option<String>,
    pub chamber: Option<String>,
    pub party: Option<String>,
    pub fellow_type: Option<String>,
    pub search: Option<String>,
}

fn field_is(value: &Option<String>, wanted: &Option<String>) -> bool {
    match wanted {
        Some(wanted) => value
            .as_deref()
            .is_some_and(|value| value.eq_ignore_ascii_case(wanted)),
        None => true,
    }
}

impl RosterFilter {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.cohort.is_none()
            && self.chamber.is_none()
            && self.party.is_none()
            && self.fellow_type.is_none()
            && self.search.is_none()
    }

    pub fn matches(&self, fellow: &Fellow) -> bool {
        if let Some(status) = &self.status {
            if &fellow.status != status {
                return false;
            }
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            let hit = [Some(&fellow.name), fellow.office.as_ref(), fellow.email.as_ref()]
                .into_iter()
                .flatten()
                .any(|text| text.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }
        field_is(&fellow.cohort, &self.cohort)
            && field_is(&fellow.chamber, &self.chamber)
            && field_is(&fellow.party, &self.party)
            && field_is(&fellow.fellow_type, &self.fellow_type)
    }

    pub fn apply(&self, fellows: Vec<Fellow>) -> Vec<Fellow> {
        fellows.into_iter().filter(|fellow| self.matches(fellow)).collect()
    }
}

/// Flagged first, then ending soon, then on track; within a status the
/// longest-uncontacted fellow comes first.
pub fn sort_roster(fellows: &mut [Fellow], now: NaiveDateTime) {
    fellows.sort_by_key(|fellow| {
        (
            fellow.status.priority(),
            Reverse(days_since_check_in(fellow, now)),
        )
    });
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterStats {
    pub total: usize,
    pub on_track: usize,
    pub flagged: usize,
    pub ending_soon: usize,
    pub needs_check_in: usize,
}

impl RosterStats {
    pub fn collect(fellows: &[Fellow], now: NaiveDateTime) -> Self {
        let mut stats = RosterStats {
            total: fellows.len(),
            ..RosterStats::default()
        };
        for fellow in fellows {
            match fellow.status {
                FellowStatus::OnTrack => {
                    stats.on_track += 1;
                    if needs_check_in(fellow, now) {
                        stats.needs_check_in += 1;
                    }
                }
                FellowStatus::Flagged => stats.flagged += 1,
                FellowStatus::EndingSoon => stats.ending_soon += 1,
                FellowStatus::Other(_) => {}
            }
        }
        stats
    }
}

#[derive(Debug, Clone, Default)]
pub struct AlumniFilter {
    pub search: Option<String>,
    pub cohort: Option<String>,
    pub fellow_type: Option<String>,
    pub chamber: Option<String>,
    pub party: Option<String>,
    pub sector: Option<String>,
}

impl AlumniFilter {
    pub fn matches(&self, alumnus: &Alumnus) -> bool {
        if let Some(term) = &self.search {
            if !alumnus.name.to_lowercase().contains(&term.to_lowercase()) {
                return false;
            }
        }
        if let Some(wanted) = &self.fellow_type {
            if !alumnus
                .fellow_types
                .iter()
                .any(|kind| kind.eq_ignore_ascii_case(wanted))
            {
                return false;
            }
        }
        field_is(&alumnus.cohort, &self.cohort)
            && field_is(&alumnus.chamber, &self.chamber)
            && field_is(&alumnus.party, &self.party)
            && field_is(&alumnus.sector, &self.sector)
    }

    pub fn apply(&self, alumni: Vec<Alumnus>) -> Vec<Alumnus> {
        alumni.into_iter().filter(|alumnus| self.matches(alumnus)).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum AlumniSort {
    #[default]
    CohortNewest,
    CohortOldest,
    NameAz,
    NameZa,
    /// Least recently engaged first; never-engaged alumni lead.
    LastEngaged,
}

pub fn sort_alumni(alumni: &mut [Alumnus], order: AlumniSort) {
    fn text(value: &Option<String>) -> &str {
        value.as_deref().unwrap_or_default()
    }
    match order {
        AlumniSort::CohortNewest => alumni.sort_by(|a, b| text(&b.cohort).cmp(text(&a.cohort))),
        AlumniSort::CohortOldest => alumni.sort_by(|a, b| text(&a.cohort).cmp(text(&b.cohort))),
        AlumniSort::NameAz => alumni.sort_by(|a, b| a.name.cmp(&b.name)),
        AlumniSort::NameZa => alumni.sort_by(|a, b| b.name.cmp(&a.name)),
        AlumniSort::LastEngaged => {
            alumni.sort_by(|a, b| text(&a.last_engaged).cmp(text(&b.last_engaged)))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlumniStats {
    pub total: usize,
    pub sectors: usize,
    pub cohorts: usize,
}

impl AlumniStats {
    pub fn collect(alumni: &[Alumnus]) -> Self {
        let sectors: BTreeSet<&str> = alumni.iter().filter_map(|a| a.sector.as_deref()).collect();
        let cohorts: BTreeSet<&str> = alumni.iter().filter_map(|a| a.cohort.as_deref()).collect();
        AlumniStats {
            total: alumni.len(),
            sectors: sectors.len(),
            cohorts: cohorts.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 17)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn fellow(name: &str, status: &str, last_check_in: Option<&str>) -> Fellow {
        Fellow {
            id: format!("rec{name}"),
            name: name.to_string(),
            status: FellowStatus::from_label(status),
            last_check_in: last_check_in.map(str::to_string),
            ..Fellow::default()
        }
    }

    #[test]
    fn check_in_is_due_after_thirty_days() {
        assert!(!needs_check_in(&fellow("a", "Active", Some("2026-09-20")), now()));
        assert!(needs_check_in(&fellow("b", "Active", Some("2026-09-01")), now()));
        assert!(needs_check_in(&fellow("c", "Active", None), now()));
    }

    #[test]
    fn ending_soon_window() {
        let mut f = fellow("a", "Active", None);
        f.end_date = Some("2026-12-31".to_string());
        assert_eq!(ending_soon(&f, now()), Some(74));
        f.end_date = Some("2027-06-30".to_string());
        assert_eq!(ending_soon(&f, now()), None);
        f.end_date = Some("2026-10-01".to_string());
        assert_eq!(ending_soon(&f, now()), None);
        f.end_date = None;
        assert_eq!(ending_soon(&f, now()), None);
    }

    #[test]
    fn filters_combine() {
        let mut ada = fellow("Ada", "Active", None);
        ada.chamber = Some("Senate".to_string());
        ada.office = Some("Sen. Lovelace".to_string());
        let mut bo = fellow("Bo", "flagged", None);
        bo.chamber = Some("House".to_string());

        let filter = RosterFilter {
            chamber: Some("senate".to_string()),
            ..RosterFilter::default()
        };
        assert!(filter.matches(&ada));
        assert!(!filter.matches(&bo));

        let search = RosterFilter {
            search: Some("lovelace".to_string()),
            ..RosterFilter::default()
        };
        assert_eq!(search.apply(vec![ada.clone(), bo.clone()]).len(), 1);

        let flagged = RosterFilter {
            status: Some(FellowStatus::Flagged),
            ..RosterFilter::default()
        };
        assert_eq!(flagged.apply(vec![ada, bo])[0].name, "Bo");
        assert!(RosterFilter::default().is_empty());
    }

    #[test]
    fn roster_sorts_by_priority_then_staleness() {
        let mut fellows = vec![
            fellow("recent", "on-track", Some("2026-10-10")),
            fellow("stale", "Active", Some("2026-06-01")),
            fellow("ending", "Ending Soon", Some("2026-10-15")),
            fellow("flagged", "Flagged", Some("2026-10-16")),
            fellow("other", "On Leave", None),
        ];
        sort_roster(&mut fellows, now());
        let order: Vec<&str> = fellows.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(order, ["flagged", "ending", "stale", "recent", "other"]);
    }

    #[test]
    fn stats_count_check_ins_only_for_on_track() {
        let fellows = vec![
            fellow("a", "Active", None),
            fellow("b", "Active", Some("2026-10-10")),
            fellow("c", "Flagged", None),
            fellow("d", "ending-soon", Some("2026-10-10")),
        ];
        let stats = RosterStats::collect(&fellows, now());
        assert_eq!(
            stats,
            RosterStats {
                total: 4,
                on_track: 2,
                flagged: 1,
                ending_soon: 1,
                needs_check_in: 1,
            }
        );
    }

    fn alumnus(name: &str, cohort: &str, sector: Option<&str>, engaged: Option<&str>) -> Alumnus {
        Alumnus {
            name: name.to_string(),
            cohort: Some(cohort.to_string()),
            sector: sector.map(str::to_string),
            last_engaged: engaged.map(str::to_string),
            ..Alumnus::default()
        }
    }

    #[test]
    fn alumni_filters_match_any_fellow_type() {
        let mut jo = alumnus("Jo Park", "2022", Some("Nonprofit"), None);
        jo.fellow_types = vec!["Innovation Fellow".to_string(), "Senior Fellow".to_string()];
        jo.party = Some("Independent".to_string());
        let al = alumnus("Al Reyes", "2023", Some("Private"), None);

        let senior = AlumniFilter {
            fellow_type: Some("senior fellow".to_string()),
            ..AlumniFilter::default()
        };
        assert!(senior.matches(&jo));
        assert!(!senior.matches(&al));

        let search = AlumniFilter {
            search: Some("REY".to_string()),
            sector: Some("private".to_string()),
            ..AlumniFilter::default()
        };
        assert_eq!(search.apply(vec![jo.clone(), al.clone()])[0].name, "Al Reyes");

        let party = AlumniFilter {
            party: Some("Democrat".to_string()),
            ..AlumniFilter::default()
        };
        assert!(party.apply(vec![jo, al]).is_empty());
    }

    #[test]
    fn alumni_sort_orders() {
        let mut alumni = vec![
            alumnus("Bo", "2021", None, Some("2026-03-01")),
            alumnus("Cy", "2023", None, None),
            alumnus("Al", "2022", None, Some("2025-11-20")),
        ];
        fn names(alumni: &[Alumnus]) -> Vec<&str> {
            alumni.iter().map(|a| a.name.as_str()).collect()
        }

        sort_alumni(&mut alumni, AlumniSort::default());
        assert_eq!(names(&alumni), ["Cy", "Al", "Bo"]);
        sort_alumni(&mut alumni, AlumniSort::CohortOldest);
        assert_eq!(names(&alumni), ["Bo", "Al", "Cy"]);
        sort_alumni(&mut alumni, AlumniSort::NameZa);
        assert_eq!(names(&alumni), ["Cy", "Bo", "Al"]);
        sort_alumni(&mut alumni, AlumniSort::LastEngaged);
        assert_eq!(names(&alumni), ["Cy", "Al", "Bo"]);
    }

    #[test]
    fn alumni_stats_count_distinct_values() {
        let alumni = vec![
            alumnus("a", "2022", Some("Nonprofit"), None),
            alumnus("b", "2022", Some("Private"), None),
            alumnus("c", "2023", Some("Nonprofit"), None),
            alumnus("d", "2023", None, None),
        ];
        assert_eq!(
            AlumniStats::collect(&alumni),
            AlumniStats {
                total: 4,
                sectors: 2,
                cohorts: 2,
            }
        );
    }
}
