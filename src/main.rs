use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod compliance;
mod config;
mod dates;
mod models;
mod records;
mod report;
mod roster;
mod store;

use config::{Config, DEFAULT_FELLOWS_TABLE};
use dates::{DateField, MonthYear};
use models::{
    Alumnus, ComplianceSummary, Fellow, FellowStatus, MonthState, NewCheckIn, NewStatusReport,
    ReportObligation,
};
use roster::{AlumniFilter, AlumniSort, AlumniStats, RosterFilter, RosterStats};
use store::{AirtableStore, MemoryStore, RecordsStore};

#[derive(Parser)]
#[command(name = "fellowship-dashboard")]
#[command(about = "Fellowship placement tracker and monthly report compliance", long_about = None)]
struct Cli {
    /// Run against an in-memory demo roster instead of the records service
    #[arg(long, global = true)]
    offline: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List fellows, most urgent first
    Fellows {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        cohort: Option<String>,
        #[arg(long)]
        chamber: Option<String>,
        #[arg(long)]
        party: Option<String>,
        #[arg(long)]
        fellow_type: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Add a fellow to the roster
    AddFellow {
        #[command(flatten)]
        details: FellowArgs,
    },
    /// Change a fellow's details; omitted fields are left as they are
    EditFellow {
        /// Record id or email
        #[arg(long)]
        fellow: String,
        #[command(flatten)]
        details: FellowArgs,
    },
    /// List alumni
    Alumni {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        cohort: Option<String>,
        #[arg(long)]
        fellow_type: Option<String>,
        #[arg(long)]
        chamber: Option<String>,
        #[arg(long)]
        party: Option<String>,
        #[arg(long)]
        sector: Option<String>,
        #[arg(long, value_enum, default_value_t = AlumniSort::CohortNewest)]
        sort: AlumniSort,
    },
    /// Add an alumni record
    AddAlumnus {
        #[command(flatten)]
        details: AlumnusArgs,
    },
    /// Change an alumni record; omitted fields are left as they are
    EditAlumnus {
        #[arg(long)]
        id: String,
        #[command(flatten)]
        details: AlumnusArgs,
    },
    /// Show a fellow's reporting calendar and compliance
    Compliance {
        /// Record id or email
        #[arg(long)]
        fellow: String,
        #[arg(long)]
        json: bool,
    },
    /// Print the reporting calendar for a start date
    Months {
        #[arg(long)]
        start: String,
        #[arg(long, default_value = "")]
        fellow_type: String,
        #[arg(long)]
        end_month: Option<String>,
    },
    /// Record a monthly status report
    SubmitReport {
        #[arg(long)]
        fellow: String,
        #[arg(long)]
        month: MonthYear,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        notes: Option<String>,
        /// Create the report row without marking it submitted
        #[arg(long)]
        pending: bool,
    },
    /// Mark an existing status report as submitted
    MarkSubmitted {
        #[arg(long)]
        report: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Import status reports from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List a fellow's check-ins, newest first
    CheckIns {
        #[arg(long)]
        fellow: String,
    },
    /// Log a check-in with a fellow
    CheckIn {
        #[arg(long)]
        fellow: String,
        #[arg(long)]
        kind: String,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        staff: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete a check-in
    DeleteCheckIn {
        #[arg(long)]
        id: String,
    },
    /// Change a fellow's placement status
    SetStatus {
        #[arg(long)]
        fellow: String,
        #[arg(long)]
        status: String,
    },
    /// Generate a markdown compliance report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Args)]
struct FellowArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    fellow_type: Option<String>,
    #[arg(long)]
    party: Option<String>,
    #[arg(long)]
    office: Option<String>,
    #[arg(long)]
    chamber: Option<String>,
    #[arg(long)]
    linkedin: Option<String>,
    #[arg(long)]
    start_date: Option<NaiveDate>,
    #[arg(long)]
    end_date: Option<NaiveDate>,
    #[arg(long)]
    cohort: Option<String>,
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    prior_role: Option<String>,
    #[arg(long)]
    education: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    requires_reports: Option<bool>,
    #[arg(long)]
    report_start_date: Option<NaiveDate>,
    #[arg(long)]
    report_end_month: Option<MonthYear>,
}

impl FellowArgs {
    fn apply(self, fellow: &mut Fellow) {
        if let Some(name) = self.name {
            fellow.name = name;
        }
        if let Some(status) = self.status {
            fellow.status = FellowStatus::from_label(&status);
        }
        if let Some(required) = self.requires_reports {
            fellow.requires_monthly_reports = required;
        }
        let text = [
            (&mut fellow.email, self.email),
            (&mut fellow.phone, self.phone),
            (&mut fellow.fellow_type, self.fellow_type),
            (&mut fellow.party, self.party),
            (&mut fellow.office, self.office),
            (&mut fellow.chamber, self.chamber),
            (&mut fellow.linkedin, self.linkedin),
            (&mut fellow.start_date, self.start_date.map(dates::format_date)),
            (&mut fellow.end_date, self.end_date.map(dates::format_date)),
            (&mut fellow.cohort, self.cohort),
            (&mut fellow.prior_role, self.prior_role),
            (&mut fellow.education, self.education),
            (&mut fellow.notes, self.notes),
            (
                &mut fellow.report_start_date,
                self.report_start_date.map(dates::format_date),
            ),
            (
                &mut fellow.report_end_month,
                self.report_end_month.map(|month| month.to_string()),
            ),
        ];
        for (slot, value) in text {
            if value.is_some() {
                *slot = value;
            }
        }
    }
}

#[derive(Args)]
struct AlumnusArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    cohort: Option<String>,
    /// Repeat for alumni who served in more than one program
    #[arg(long)]
    fellow_type: Vec<String>,
    #[arg(long, conflicts_with = "fellow_type")]
    clear_fellow_types: bool,
    #[arg(long)]
    office_served: Option<String>,
    #[arg(long)]
    chamber: Option<String>,
    #[arg(long)]
    party: Option<String>,
    #[arg(long)]
    current_role: Option<String>,
    #[arg(long)]
    current_organization: Option<String>,
    #[arg(long)]
    sector: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    linkedin: Option<String>,
    #[arg(long)]
    last_engaged: Option<NaiveDate>,
    #[arg(long)]
    engagement_notes: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    prior_role: Option<String>,
    #[arg(long)]
    education: Option<String>,
}

impl AlumnusArgs {
    fn apply(self, alumnus: &mut Alumnus) {
        if let Some(name) = self.name {
            alumnus.name = name;
        }
        if self.clear_fellow_types {
            alumnus.fellow_types.clear();
        } else if !self.fellow_type.is_empty() {
            alumnus.fellow_types = self.fellow_type;
        }
        let text = [
            (&mut alumnus.email, self.email),
            (&mut alumnus.phone, self.phone),
            (&mut alumnus.cohort, self.cohort),
            (&mut alumnus.office_served, self.office_served),
            (&mut alumnus.chamber, self.chamber),
            (&mut alumnus.party, self.party),
            (&mut alumnus.current_role, self.current_role),
            (&mut alumnus.current_organization, self.current_organization),
            (&mut alumnus.sector, self.sector),
            (&mut alumnus.location, self.location),
            (&mut alumnus.linkedin, self.linkedin),
            (&mut alumnus.last_engaged, self.last_engaged.map(dates::format_date)),
            (&mut alumnus.engagement_notes, self.engagement_notes),
            (&mut alumnus.notes, self.notes),
            (&mut alumnus.prior_role, self.prior_role),
            (&mut alumnus.education, self.education),
        ];
        for (slot, value) in text {
            if value.is_some() {
                *slot = value;
            }
        }
    }
}

#[derive(Serialize)]
struct MonthLine {
    month: String,
    state: MonthState,
}

#[derive(Serialize)]
struct ComplianceView<'a> {
    fellow_id: &'a str,
    fellow_name: &'a str,
    months: Vec<MonthLine>,
    summary: ComplianceSummary,
}

fn state_label(state: MonthState) -> &'static str {
    match state {
        MonthState::Submitted => "submitted",
        MonthState::Missed => "missed",
        MonthState::NotYetDue => "not yet due",
    }
}

fn warn_on_calendar_issue(fellow: &Fellow) {
    if let Some(issue) = compliance::calendar_issue(&fellow.report_obligation()) {
        warn!(fellow = %fellow.name, "no reporting calendar: {issue}");
    }
}

async fn run<S: RecordsStore>(
    store: &S,
    fellows_table: &str,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Fellows {
            status,
            cohort,
            chamber,
            party,
            fellow_type,
            search,
        } => {
            let now = dates::now();
            let filter = RosterFilter {
                status: status.as_deref().map(FellowStatus::from_label),
                cohort,
                chamber,
                party,
                fellow_type,
                search,
            };
            let all = records::fetch_fellows(store, fellows_table)
                .await
                .context("failed to fetch fellows")?;
            let stats = RosterStats::collect(&all, now);
            let mut fellows = filter.apply(all);
            roster::sort_roster(&mut fellows, now);

            println!(
                "{} fellows ({} on track, {} flagged, {} ending soon, {} need a check-in)",
                stats.total, stats.on_track, stats.flagged, stats.ending_soon, stats.needs_check_in
            );
            if !filter.is_empty() {
                println!("{} match the filters.", fellows.len());
            }
            if fellows.is_empty() {
                println!("No fellows match these filters.");
                return Ok(());
            }
            for fellow in &fellows {
                let mut badges = Vec::new();
                if fellow.status == FellowStatus::OnTrack && roster::needs_check_in(fellow, now) {
                    badges.push("needs check-in".to_string());
                }
                if let Some(days) = roster::ending_soon(fellow, now) {
                    badges.push(format!("{days} days left"));
                }
                println!(
                    "- {} [{}] {} / {} / last check-in {}{}",
                    fellow.name,
                    fellow.status,
                    fellow.office.as_deref().unwrap_or("no office"),
                    fellow.cohort.as_deref().unwrap_or("no cohort"),
                    fellow.last_check_in.as_deref().unwrap_or("never"),
                    if badges.is_empty() {
                        String::new()
                    } else {
                        format!(" ({})", badges.join(", "))
                    }
                );
            }
        }
        Commands::AddFellow { details } => {
            let mut fellow = Fellow::default();
            details.apply(&mut fellow);
            anyhow::ensure!(!fellow.name.trim().is_empty(), "a new fellow needs --name");
            warn_on_calendar_issue(&fellow);
            let created = records::create_fellow(store, fellows_table, &fellow)
                .await
                .context("failed to add fellow")?;
            println!("Added {} ({}).", created.name, created.id);
        }
        Commands::EditFellow { fellow, details } => {
            let mut fellow = records::resolve_fellow(store, fellows_table, &fellow).await?;
            details.apply(&mut fellow);
            warn_on_calendar_issue(&fellow);
            let updated = records::update_fellow(store, fellows_table, &fellow.id, &fellow)
                .await
                .context("failed to update fellow")?;
            println!("Updated {} ({}).", updated.name, updated.id);
        }
        Commands::Alumni {
            search,
            cohort,
            fellow_type,
            chamber,
            party,
            sector,
            sort,
        } => {
            let filter = AlumniFilter {
                search,
                cohort,
                fellow_type,
                chamber,
                party,
                sector,
            };
            let all = records::fetch_alumni(store)
                .await
                .context("failed to fetch alumni")?;
            let stats = AlumniStats::collect(&all);
            let mut alumni = filter.apply(all);
            roster::sort_alumni(&mut alumni, sort);

            println!(
                "{} alumni across {} sectors and {} cohorts",
                stats.total, stats.sectors, stats.cohorts
            );
            if alumni.is_empty() {
                println!("No alumni match these filters.");
                return Ok(());
            }
            for alumnus in &alumni {
                let role = match (&alumnus.current_role, &alumnus.current_organization) {
                    (Some(role), Some(org)) => format!("{role} at {org}"),
                    (Some(role), None) => role.clone(),
                    (None, Some(org)) => org.clone(),
                    (None, None) => "role unknown".to_string(),
                };
                println!(
                    "- {} ({}) {} / {} / {} / last engaged {}",
                    alumnus.name,
                    alumnus.cohort.as_deref().unwrap_or("no cohort"),
                    if alumnus.fellow_types.is_empty() {
                        "no program".to_string()
                    } else {
                        alumnus.fellow_types.join(", ")
                    },
                    role,
                    alumnus.sector.as_deref().unwrap_or("no sector"),
                    alumnus.last_engaged.as_deref().unwrap_or("never")
                );
            }
        }
        Commands::AddAlumnus { details } => {
            let mut alumnus = Alumnus::default();
            details.apply(&mut alumnus);
            anyhow::ensure!(!alumnus.name.trim().is_empty(), "a new alumni record needs --name");
            let created = records::create_alumnus(store, &alumnus)
                .await
                .context("failed to add alumni record")?;
            println!("Added {} ({}).", created.name, created.id);
        }
        Commands::EditAlumnus { id, details } => {
            let mut alumnus = records::fetch_alumnus(store, &id)
                .await
                .with_context(|| format!("failed to load alumni record {id}"))?;
            details.apply(&mut alumnus);
            let updated = records::update_alumnus(store, &id, &alumnus)
                .await
                .context("failed to update alumni record")?;
            println!("Updated {} ({}).", updated.name, updated.id);
        }
        Commands::Compliance { fellow, json } => {
            let fellow = records::resolve_fellow(store, fellows_table, &fellow).await?;
            warn_on_calendar_issue(&fellow);
            let reports = records::fetch_status_reports(store, &fellow.id)
                .await
                .context("failed to fetch status reports")?;
            let now = dates::now();
            let assessed = compliance::assess(&fellow, &reports, now);
            let states = compliance::month_states(&reports, &assessed.months, now);

            if json {
                let view = ComplianceView {
                    fellow_id: &assessed.fellow_id,
                    fellow_name: &assessed.fellow_name,
                    months: states
                        .iter()
                        .map(|(month, state)| MonthLine {
                            month: month.to_string(),
                            state: *state,
                        })
                        .collect(),
                    summary: assessed.summary,
                };
                println!("{}", serde_json::to_string_pretty(&view)?);
                return Ok(());
            }

            println!("{}", assessed.fellow_name);
            if let Some(end_date) = &fellow.end_date {
                let days = dates::days_until(end_date);
                if days != dates::NO_DATE_DAYS && days >= 0 {
                    println!("Placement ends {end_date} ({days} days left)");
                }
            }
            if states.is_empty() {
                println!("No monthly reports required.");
            }
            for (month, state) in &states {
                println!("- {}: {}", month, state_label(*state));
            }
            let summary = assessed.summary;
            println!(
                "Streak {} | missed in a row {} | gift card {} | at risk {} | reimbursements paused {}",
                summary.streak,
                summary.missed_count,
                if summary.gift_card_eligible { "yes" } else { "no" },
                if summary.at_risk { "yes" } else { "no" },
                if summary.reimbursements_paused { "yes" } else { "no" }
            );
        }
        Commands::Months {
            start,
            fellow_type,
            end_month,
        } => {
            let obligation = ReportObligation {
                requires_monthly_reports: true,
                report_start_date: DateField::parse(Some(start.as_str())),
                fellow_type,
                report_end_month: end_month,
            };
            if let Some(issue) = compliance::calendar_issue(&obligation) {
                warn!("no reporting calendar: {issue}");
            }
            for month in compliance::required_report_months(&obligation) {
                println!("{month}");
            }
        }
        Commands::SubmitReport {
            fellow,
            month,
            date,
            notes,
            pending,
        } => {
            let fellow = records::resolve_fellow(store, fellows_table, &fellow).await?;
            let submitted = !pending;
            let date_submitted = if submitted {
                Some(dates::format_date(date.unwrap_or_else(dates::today)))
            } else {
                None
            };
            let report = records::add_status_report(
                store,
                &NewStatusReport {
                    fellow_id: fellow.id.clone(),
                    month,
                    submitted,
                    date_submitted,
                    notes,
                },
            )
            .await
            .context("failed to save status report")?;
            println!("Recorded {} report for {} ({}).", report.month, fellow.name, report.id);
        }
        Commands::MarkSubmitted { report, date } => {
            let date = dates::format_date(date.unwrap_or_else(dates::today));
            let updated = records::update_status_report(store, &report, true, Some(date.as_str()))
                .await
                .context("failed to update status report")?;
            println!("Marked {} report submitted on {}.", updated.month, date);
        }
        Commands::Import { csv } => {
            let inserted = records::import_reports_csv(store, &csv).await?;
            println!("Inserted {inserted} status reports from {}.", csv.display());
        }
        Commands::CheckIns { fellow } => {
            let fellow = records::resolve_fellow(store, fellows_table, &fellow).await?;
            let checkins = records::fetch_checkins(store, &fellow.id)
                .await
                .context("failed to fetch check-ins")?;
            if checkins.is_empty() {
                println!("No check-ins recorded for {}.", fellow.name);
                return Ok(());
            }
            for checkin in checkins {
                let date = checkin.date.as_deref().unwrap_or("undated");
                let ago = match dates::days_since(date) {
                    dates::NO_DATE_DAYS => String::new(),
                    days => format!(", {days} days ago"),
                };
                println!(
                    "- {}{} {} by {}: {} ({})",
                    date,
                    ago,
                    checkin.check_in_type.as_deref().unwrap_or("check-in"),
                    checkin.staff_member.as_deref().unwrap_or("staff"),
                    checkin.notes.as_deref().unwrap_or(""),
                    checkin.id
                );
            }
        }
        Commands::CheckIn {
            fellow,
            kind,
            notes,
            staff,
            date,
        } => {
            let fellow = records::resolve_fellow(store, fellows_table, &fellow).await?;
            let date = dates::format_date(date.unwrap_or_else(dates::today));
            let checkin = records::add_checkin(
                store,
                &NewCheckIn {
                    fellow_id: fellow.id.clone(),
                    date: date.clone(),
                    check_in_type: kind,
                    notes,
                    staff_member: staff,
                },
            )
            .await
            .context("failed to save check-in")?;
            println!("Logged check-in {} for {}.", checkin.id, fellow.name);
            records::update_fellow_checkin(store, fellows_table, &fellow.id, &date)
                .await
                .context("check-in saved but Last Check-in not updated")?;
        }
        Commands::DeleteCheckIn { id } => {
            records::delete_checkin(store, &id)
                .await
                .context("failed to delete check-in")?;
            println!("Deleted check-in {id}.");
        }
        Commands::SetStatus { fellow, status } => {
            let fellow = records::resolve_fellow(store, fellows_table, &fellow).await?;
            let status = FellowStatus::from_label(&status);
            records::update_fellow_status(store, fellows_table, &fellow.id, &status)
                .await
                .context("failed to update status")?;
            println!("{} is now {}.", fellow.name, status);
        }
        Commands::Report { out } => {
            let now = dates::now();
            let fellows = records::fetch_fellows(store, fellows_table)
                .await
                .context("failed to fetch fellows")?;

            let mut assessed = Vec::new();
            for fellow in fellows.iter().filter(|f| f.requires_monthly_reports) {
                warn_on_calendar_issue(fellow);
                let reports = records::fetch_status_reports(store, &fellow.id)
                    .await
                    .with_context(|| format!("failed to fetch status reports for {}", fellow.name))?;
                assessed.push(compliance::assess(fellow, &reports, now));
            }

            let stats = RosterStats::collect(&fellows, now);
            let stale: Vec<&Fellow> = fellows
                .iter()
                .filter(|f| f.status == FellowStatus::OnTrack && roster::needs_check_in(f, now))
                .collect();
            let report = report::build_report(now.date(), &stats, &assessed, &stale);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(fellows = assessed.len(), "compliance report built");
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.offline {
        let store = MemoryStore::new();
        records::seed(&store, DEFAULT_FELLOWS_TABLE).await?;
        info!("running against the in-memory demo roster");
        run(&store, DEFAULT_FELLOWS_TABLE, cli.command).await
    } else {
        let config = Config::from_env()?;
        let store = AirtableStore::new(&config);
        run(&store, &config.fellows_table, cli.command).await
    }
}
