use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{Fellow, FellowCompliance};
use crate::roster::RosterStats;

fn flags(compliance: &FellowCompliance) -> String {
    let summary = &compliance.summary;
    let mut flags = Vec::new();
    if summary.gift_card_eligible {
        flags.push("gift card eligible");
    }
    if summary.at_risk {
        flags.push("at risk");
    }
    if summary.reimbursements_paused {
        flags.push("reimbursements paused");
    }
    if flags.is_empty() {
        "-".to_string()
    } else {
        flags.join(", ")
    }
}

pub fn build_report(
    generated_on: NaiveDate,
    stats: &RosterStats,
    compliance: &[FellowCompliance],
    needs_check_in: &[&Fellow],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Fellowship Report Compliance");
    let _ = writeln!(output, "Generated {}", generated_on);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Roster");
    let _ = writeln!(
        output,
        "- {} fellows: {} on track, {} flagged, {} ending soon",
        stats.total, stats.on_track, stats.flagged, stats.ending_soon
    );
    let _ = writeln!(output, "- {} need a check-in (30+ days)", stats.needs_check_in);

    let mut tracked: Vec<&FellowCompliance> =
        compliance.iter().filter(|c| !c.months.is_empty()).collect();
    tracked.sort_by(|a, b| {
        b.summary
            .missed_count
            .cmp(&a.summary.missed_count)
            .then_with(|| a.fellow_name.cmp(&b.fellow_name))
    });

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Status Reports");
    if tracked.is_empty() {
        let _ = writeln!(output, "No fellows have a reporting calendar.");
    } else {
        let _ = writeln!(output, "| Fellow | Months | Streak | Missed | Flags |");
        let _ = writeln!(output, "|---|---|---|---|---|");
        for entry in &tracked {
            let first = entry.months.first().map(|m| m.to_string()).unwrap_or_default();
            let last = entry.months.last().map(|m| m.to_string()).unwrap_or_default();
            let _ = writeln!(
                output,
                "| {} | {} - {} | {} | {} | {} |",
                entry.fellow_name,
                first,
                last,
                entry.summary.streak,
                entry.summary.missed_count,
                flags(entry)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Reimbursements Paused");
    let paused: Vec<&&FellowCompliance> = tracked
        .iter()
        .filter(|c| c.summary.reimbursements_paused)
        .collect();
    if paused.is_empty() {
        let _ = writeln!(output, "None.");
    } else {
        for entry in paused {
            let _ = writeln!(
                output,
                "- {} ({} months missed in a row)",
                entry.fellow_name, entry.summary.missed_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Gift Card Eligible");
    let eligible: Vec<&&FellowCompliance> = tracked
        .iter()
        .filter(|c| c.summary.gift_card_eligible)
        .collect();
    if eligible.is_empty() {
        let _ = writeln!(output, "None.");
    } else {
        for entry in eligible {
            let _ = writeln!(
                output,
                "- {} ({}-month streak)",
                entry.fellow_name, entry.summary.streak
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Needs Check-in");
    if needs_check_in.is_empty() {
        let _ = writeln!(output, "Everyone has been contacted in the last 30 days.");
    } else {
        for fellow in needs_check_in {
            let _ = writeln!(
                output,
                "- {} (last check-in {})",
                fellow.name,
                fellow.last_check_in.as_deref().unwrap_or("never")
            );
        }
    }

    output
}
