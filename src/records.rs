use std::collections::{HashMap, HashSet};

use anyhow::Context;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::dates::MonthYear;
use crate::models::{
    Alumnus, CheckIn, Fellow, FellowStatus, NewCheckIn, NewStatusReport, StatusReport,
};
use crate::store::{Fields, Query, Record, RecordsStore, SortDirection, StoreError};

pub const ALUMNI_TABLE: &str = "Alumni";
pub const CHECKINS_TABLE: &str = "Check-ins";
pub const STATUS_REPORTS_TABLE: &str = "Status Reports";

const FELLOW_LINK: &str = "Fellow";

fn put_text(fields: &mut Fields, name: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
        fields.insert(name.to_string(), Value::String(value.to_string()));
    }
}

pub fn fellow_from_record(record: &Record) -> Fellow {
    Fellow {
        id: record.id.clone(),
        name: record.str_field("Name").unwrap_or_default(),
        email: record.str_field("Email"),
        phone: record.str_field("Phone Number"),
        fellow_type: record.str_field("Fellow Type"),
        party: record.str_field("Party"),
        office: record.str_field("Office"),
        chamber: record.str_field("Chamber"),
        linkedin: record.str_field("LinkedIn"),
        start_date: record.str_field("Start Date"),
        end_date: record.str_field("End Date"),
        cohort: record.str_field("Cohort"),
        status: FellowStatus::from_label(&record.str_field("Status").unwrap_or_default()),
        last_check_in: record.str_field("Last Check-in"),
        prior_role: record.str_field("Prior Role"),
        education: record.str_field("Education"),
        notes: record.str_field("Notes"),
        requires_monthly_reports: record.bool_field("Requires Monthly Reports"),
        report_start_date: record.str_field("Report Start Date"),
        report_end_month: record.str_field("Report End Month"),
    }
}

pub fn fellow_fields(fellow: &Fellow) -> Fields {
    let mut fields = Fields::new();
    put_text(&mut fields, "Name", Some(fellow.name.as_str()));
    put_text(&mut fields, "Email", fellow.email.as_deref());
    put_text(&mut fields, "Phone Number", fellow.phone.as_deref());
    put_text(&mut fields, "Fellow Type", fellow.fellow_type.as_deref());
    put_text(&mut fields, "Party", fellow.party.as_deref());
    put_text(&mut fields, "Office", fellow.office.as_deref());
    put_text(&mut fields, "Chamber", fellow.chamber.as_deref());
    put_text(&mut fields, "LinkedIn", fellow.linkedin.as_deref());
    put_text(&mut fields, "Start Date", fellow.start_date.as_deref());
    put_text(&mut fields, "End Date", fellow.end_date.as_deref());
    put_text(&mut fields, "Cohort", fellow.cohort.as_deref());
    put_text(&mut fields, "Status", Some(fellow.status.label()));
    put_text(&mut fields, "Last Check-in", fellow.last_check_in.as_deref());
    put_text(&mut fields, "Prior Role", fellow.prior_role.as_deref());
    put_text(&mut fields, "Education", fellow.education.as_deref());
    put_text(&mut fields, "Notes", fellow.notes.as_deref());
    fields.insert(
        "Requires Monthly Reports".to_string(),
        Value::Bool(fellow.requires_monthly_reports),
    );
    put_text(&mut fields, "Report Start Date", fellow.report_start_date.as_deref());
    put_text(&mut fields, "Report End Month", fellow.report_end_month.as_deref());
    fields
}

pub fn report_from_record(record: &Record) -> StatusReport {
    StatusReport {
        id: record.id.clone(),
        fellow_ids: record.list_field(FELLOW_LINK),
        month: record.str_field("Month").unwrap_or_default(),
        submitted: record.bool_field("Submitted"),
        date_submitted: record.str_field("Date Submitted"),
        notes: record.str_field("Notes"),
    }
}

pub fn report_fields(report: &NewStatusReport) -> Fields {
    let mut fields = Fields::new();
    fields.insert(FELLOW_LINK.to_string(), json!([report.fellow_id]));
    fields.insert("Month".to_string(), Value::String(report.month.to_string()));
    fields.insert("Submitted".to_string(), Value::Bool(report.submitted));
    put_text(&mut fields, "Date Submitted", report.date_submitted.as_deref());
    put_text(&mut fields, "Notes", report.notes.as_deref());
    fields
}

pub fn checkin_from_record(record: &Record) -> CheckIn {
    CheckIn {
        id: record.id.clone(),
        fellow_ids: record.list_field(FELLOW_LINK),
        date: record.str_field("Date"),
        check_in_type: record.str_field("Check-in Type"),
        notes: record.str_field("Notes"),
        staff_member: record.str_field("Staff Member"),
    }
}

pub fn checkin_fields(checkin: &NewCheckIn) -> Fields {
    let mut fields = Fields::new();
    fields.insert(FELLOW_LINK.to_string(), json!([checkin.fellow_id]));
    put_text(&mut fields, "Date", Some(checkin.date.as_str()));
    put_text(&mut fields, "Check-in Type", Some(checkin.check_in_type.as_str()));
    put_text(&mut fields, "Notes", checkin.notes.as_deref());
    put_text(&mut fields, "Staff Member", checkin.staff_member.as_deref());
    fields
}

pub fn alumnus_from_record(record: &Record) -> Alumnus {
    let mut fellow_types = record.list_field("Fellow Type");
    if fellow_types.is_empty() {
        fellow_types.extend(record.str_field("Fellow Type"));
    }
    Alumnus {
        id: record.id.clone(),
        name: record.str_field("Name").unwrap_or_default(),
        email: record.str_field("Email"),
        phone: record.str_field("Phone Number"),
        cohort: record.str_field("Cohort"),
        fellow_types,
        office_served: record.str_field("Office Served"),
        chamber: record.str_field("Chamber"),
        party: record.str_field("Party"),
        current_role: record.str_field("Current Role"),
        current_organization: record.str_field("Current Organization"),
        sector: record.str_field("Sector"),
        location: record.str_field("Location"),
        linkedin: record.str_field("LinkedIn"),
        last_engaged: record.str_field("Last Engaged"),
        engagement_notes: record.str_field("Engagement Notes"),
        notes: record.str_field("Notes"),
        prior_role: record.str_field("Prior Role"),
        education: record.str_field("Education"),
    }
}

/// Same blank-dropping rule as the other writers, except Fellow Type, which
/// is always sent so an edit can clear it.
pub fn alumnus_fields(alumnus: &Alumnus) -> Fields {
    let mut fields = Fields::new();
    put_text(&mut fields, "Name", Some(alumnus.name.as_str()));
    put_text(&mut fields, "Email", alumnus.email.as_deref());
    put_text(&mut fields, "Phone Number", alumnus.phone.as_deref());
    put_text(&mut fields, "Cohort", alumnus.cohort.as_deref());
    fields.insert("Fellow Type".to_string(), json!(alumnus.fellow_types));
    put_text(&mut fields, "Office Served", alumnus.office_served.as_deref());
    put_text(&mut fields, "Chamber", alumnus.chamber.as_deref());
    put_text(&mut fields, "Party", alumnus.party.as_deref());
    put_text(&mut fields, "Current Role", alumnus.current_role.as_deref());
    put_text(&mut fields, "Current Organization", alumnus.current_organization.as_deref());
    put_text(&mut fields, "Sector", alumnus.sector.as_deref());
    put_text(&mut fields, "Location", alumnus.location.as_deref());
    put_text(&mut fields, "LinkedIn", alumnus.linkedin.as_deref());
    put_text(&mut fields, "Last Engaged", alumnus.last_engaged.as_deref());
    put_text(&mut fields, "Engagement Notes", alumnus.engagement_notes.as_deref());
    put_text(&mut fields, "Notes", alumnus.notes.as_deref());
    put_text(&mut fields, "Prior Role", alumnus.prior_role.as_deref());
    put_text(&mut fields, "Education", alumnus.education.as_deref());
    fields
}

pub async fn fetch_fellows<S: RecordsStore>(
    store: &S,
    fellows_table: &str,
) -> Result<Vec<Fellow>, StoreError> {
    let records = store.fetch(fellows_table, &Query::all()).await?;
    Ok(records.iter().map(fellow_from_record).collect())
}

pub async fn fetch_fellow<S: RecordsStore>(
    store: &S,
    fellows_table: &str,
    id: &str,
) -> Result<Fellow, StoreError> {
    let record = store.fetch_by_id(fellows_table, id).await?;
    Ok(fellow_from_record(&record))
}

pub async fn find_fellow_by_email<S: RecordsStore>(
    store: &S,
    fellows_table: &str,
    email: &str,
) -> Result<Option<Fellow>, StoreError> {
    let records = store
        .fetch(fellows_table, &Query::field_equals("Email", email))
        .await?;
    Ok(records.first().map(fellow_from_record))
}

/// Looks a fellow up by email when `key` looks like one, by record id otherwise.
pub async fn resolve_fellow<S: RecordsStore>(
    store: &S,
    fellows_table: &str,
    key: &str,
) -> anyhow::Result<Fellow> {
    if key.contains('@') {
        find_fellow_by_email(store, fellows_table, key)
            .await?
            .with_context(|| format!("no fellow with email {key}"))
    } else {
        fetch_fellow(store, fellows_table, key)
            .await
            .with_context(|| format!("failed to load fellow {key}"))
    }
}

pub async fn create_fellow<S: RecordsStore>(
    store: &S,
    fellows_table: &str,
    fellow: &Fellow,
) -> Result<Fellow, StoreError> {
    let record = store.create(fellows_table, fellow_fields(fellow)).await?;
    Ok(fellow_from_record(&record))
}

/// Writes every non-empty field of `fellow`. Blank fields are left as they
/// are on the service rather than cleared.
pub async fn update_fellow<S: RecordsStore>(
    store: &S,
    fellows_table: &str,
    fellow_id: &str,
    fellow: &Fellow,
) -> Result<Fellow, StoreError> {
    let record = store
        .update(fellows_table, fellow_id, fellow_fields(fellow))
        .await?;
    Ok(fellow_from_record(&record))
}

pub async fn update_fellow_status<S: RecordsStore>(
    store: &S,
    fellows_table: &str,
    fellow_id: &str,
    status: &FellowStatus,
) -> Result<(), StoreError> {
    let mut fields = Fields::new();
    fields.insert("Status".to_string(), Value::String(status.label().to_string()));
    store.update(fellows_table, fellow_id, fields).await?;
    Ok(())
}

pub async fn update_fellow_checkin<S: RecordsStore>(
    store: &S,
    fellows_table: &str,
    fellow_id: &str,
    checkin_date: &str,
) -> Result<(), StoreError> {
    let mut fields = Fields::new();
    fields.insert(
        "Last Check-in".to_string(),
        Value::String(checkin_date.to_string()),
    );
    store.update(fellows_table, fellow_id, fields).await?;
    Ok(())
}

pub async fn fetch_status_reports<S: RecordsStore>(
    store: &S,
    fellow_id: &str,
) -> Result<Vec<StatusReport>, StoreError> {
    let query = Query::all().sorted("Month", SortDirection::Asc);
    let records = store
        .fetch_linked(STATUS_REPORTS_TABLE, FELLOW_LINK, fellow_id, &query)
        .await?;
    Ok(records.iter().map(report_from_record).collect())
}

pub async fn add_status_report<S: RecordsStore>(
    store: &S,
    report: &NewStatusReport,
) -> Result<StatusReport, StoreError> {
    let record = store
        .create(STATUS_REPORTS_TABLE, report_fields(report))
        .await?;
    Ok(report_from_record(&record))
}

pub async fn update_status_report<S: RecordsStore>(
    store: &S,
    report_id: &str,
    submitted: bool,
    date_submitted: Option<&str>,
) -> Result<StatusReport, StoreError> {
    let mut fields = Fields::new();
    fields.insert("Submitted".to_string(), Value::Bool(submitted));
    put_text(&mut fields, "Date Submitted", date_submitted);
    let record = store.update(STATUS_REPORTS_TABLE, report_id, fields).await?;
    Ok(report_from_record(&record))
}

pub async fn fetch_checkins<S: RecordsStore>(
    store: &S,
    fellow_id: &str,
) -> Result<Vec<CheckIn>, StoreError> {
    let query = Query::all().sorted("Date", SortDirection::Desc);
    let records = store
        .fetch_linked(CHECKINS_TABLE, FELLOW_LINK, fellow_id, &query)
        .await?;
    Ok(records.iter().map(checkin_from_record).collect())
}

/// Does not touch the fellow's Last Check-in; see `update_fellow_checkin`.
pub async fn add_checkin<S: RecordsStore>(
    store: &S,
    checkin: &NewCheckIn,
) -> Result<CheckIn, StoreError> {
    let record = store.create(CHECKINS_TABLE, checkin_fields(checkin)).await?;
    Ok(checkin_from_record(&record))
}

pub async fn delete_checkin<S: RecordsStore>(store: &S, checkin_id: &str) -> Result<(), StoreError> {
    store.delete(CHECKINS_TABLE, checkin_id).await
}

pub async fn fetch_alumni<S: RecordsStore>(store: &S) -> Result<Vec<Alumnus>, StoreError> {
    let records = store.fetch(ALUMNI_TABLE, &Query::all()).await?;
    Ok(records.iter().map(alumnus_from_record).collect())
}

pub async fn fetch_alumnus<S: RecordsStore>(store: &S, id: &str) -> Result<Alumnus, StoreError> {
    let record = store.fetch_by_id(ALUMNI_TABLE, id).await?;
    Ok(alumnus_from_record(&record))
}

pub async fn create_alumnus<S: RecordsStore>(
    store: &S,
    alumnus: &Alumnus,
) -> Result<Alumnus, StoreError> {
    let record = store.create(ALUMNI_TABLE, alumnus_fields(alumnus)).await?;
    Ok(alumnus_from_record(&record))
}

pub async fn update_alumnus<S: RecordsStore>(
    store: &S,
    id: &str,
    alumnus: &Alumnus,
) -> Result<Alumnus, StoreError> {
    let record = store.update(ALUMNI_TABLE, id, alumnus_fields(alumnus)).await?;
    Ok(alumnus_from_record(&record))
}

/// Skips rows for a (fellow, month) that already has a report.
pub async fn import_reports_csv<S: RecordsStore>(
    store: &S,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        fellow_id: String,
        month: String,
        submitted: bool,
        date_submitted: Option<String>,
        notes: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut existing: HashMap<String, HashSet<String>> = HashMap::new();
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV row {}", line + 1))?;
        let month: MonthYear = match row.month.parse() {
            Ok(month) => month,
            Err(err) => {
                warn!(row = line + 1, fellow = %row.fellow_id, "skipping row: {err}");
                continue;
            }
        };

        if !existing.contains_key(&row.fellow_id) {
            let months = fetch_status_reports(store, &row.fellow_id)
                .await?
                .into_iter()
                .map(|report| report.month)
                .collect();
            existing.insert(row.fellow_id.clone(), months);
        }
        let known = existing.entry(row.fellow_id.clone()).or_default();
        if !known.insert(month.to_string()) {
            continue;
        }

        add_status_report(
            store,
            &NewStatusReport {
                fellow_id: row.fellow_id,
                month,
                submitted: row.submitted,
                date_submitted: row.date_submitted,
                notes: row.notes,
            },
        )
        .await?;
        inserted += 1;
    }

    info!(inserted, path = %csv_path.display(), "imported status reports");
    Ok(inserted)
}

pub async fn seed<S: RecordsStore>(store: &S, fellows_table: &str) -> Result<(), StoreError> {
    let fellows = [
        Fellow {
            name: "Sarah Chen".to_string(),
            email: Some("schen@example.org".to_string()),
            fellow_type: Some("Congressional Innovation Fellow".to_string()),
            party: Some("Democrat".to_string()),
            office: Some("Sen. Example (D-WA)".to_string()),
            chamber: Some("Senate".to_string()),
            start_date: Some("2025-09-01".to_string()),
            end_date: Some("2026-08-31".to_string()),
            cohort: Some("2025".to_string()),
            last_check_in: Some("2026-09-28".to_string()),
            requires_monthly_reports: true,
            report_start_date: Some("2026-02-01".to_string()),
            ..Fellow::default()
        },
        Fellow {
            name: "Marcus Johnson".to_string(),
            email: Some("mjohnson@example.org".to_string()),
            fellow_type: Some("Senior Congressional Innovation Fellow".to_string()),
            party: Some("Republican".to_string()),
            office: Some("Rep. Example (R-TX)".to_string()),
            chamber: Some("House".to_string()),
            start_date: Some("2026-01-05".to_string()),
            end_date: Some("2026-12-18".to_string()),
            cohort: Some("2026".to_string()),
            status: FellowStatus::from_label("flagged"),
            last_check_in: Some("2026-07-02".to_string()),
            requires_monthly_reports: true,
            report_start_date: Some("2026-03-01".to_string()),
            ..Fellow::default()
        },
        Fellow {
            name: "Priya Raman".to_string(),
            email: Some("praman@example.org".to_string()),
            fellow_type: Some("Congressional Digital Service Fellow".to_string()),
            party: Some("Independent".to_string()),
            office: Some("Committee on Example Affairs".to_string()),
            chamber: Some("Senate".to_string()),
            start_date: Some("2026-01-12".to_string()),
            end_date: Some("2026-12-31".to_string()),
            cohort: Some("2026".to_string()),
            status: FellowStatus::from_label("Active"),
            requires_monthly_reports: true,
            report_start_date: Some("2026-04-01".to_string()),
            report_end_month: Some("Dec 2026".to_string()),
            ..Fellow::default()
        },
    ];

    let mut ids = Vec::new();
    for fellow in &fellows {
        ids.push(create_fellow(store, fellows_table, fellow).await?.id);
    }

    let reports: [(usize, &[(&str, bool)]); 3] = [
        (
            0,
            &[
                ("Feb 2026", true),
                ("Mar 2026", true),
                ("Apr 2026", true),
                ("May 2026", true),
                ("Jun 2026", true),
                ("Jul 2026", true),
                ("Aug 2026", true),
                ("Sep 2026", true),
            ],
        ),
        (1, &[("Mar 2026", true), ("Apr 2026", true), ("May 2026", false)]),
        (
            2,
            &[
                ("Apr 2026", true),
                ("May 2026", true),
                ("Jun 2026", true),
                ("Jul 2026", true),
                ("Aug 2026", true),
            ],
        ),
    ];

    for (fellow, months) in reports {
        for (month, submitted) in months {
            let Ok(month) = month.parse::<MonthYear>() else {
                continue;
            };
            let report = NewStatusReport {
                fellow_id: ids[fellow].clone(),
                month,
                submitted: *submitted,
                date_submitted: submitted.then(|| crate::dates::format_date(month.last_day())),
                notes: None,
            };
            add_status_report(store, &report).await?;
        }
    }

    let checkins = [
        (0, "2026-09-28", "Monthly call", "Going well"),
        (1, "2026-07-02", "Office visit", "Workload concerns"),
    ];
    for (fellow, date, kind, notes) in checkins {
        store
            .create(
                CHECKINS_TABLE,
                checkin_fields(&NewCheckIn {
                    fellow_id: ids[fellow].clone(),
                    date: date.to_string(),
                    check_in_type: kind.to_string(),
                    notes: Some(notes.to_string()),
                    staff_member: Some("Program Staff".to_string()),
                }),
            )
            .await?;
    }

    let alumni = [
        Alumnus {
            name: "Jordan Ellis".to_string(),
            email: Some("jellis@example.org".to_string()),
            cohort: Some("2022".to_string()),
            fellow_types: vec!["Congressional Innovation Fellow".to_string()],
            office_served: Some("Sen. Example (D-CA)".to_string()),
            chamber: Some("Senate".to_string()),
            party: Some("Democrat".to_string()),
            current_role: Some("Policy Director".to_string()),
            current_organization: Some("Example Institute".to_string()),
            sector: Some("Nonprofit".to_string()),
            location: Some("Washington, DC".to_string()),
            last_engaged: Some("2026-05-14".to_string()),
            ..Alumnus::default()
        },
        Alumnus {
            name: "Avery Park".to_string(),
            email: Some("apark@example.org".to_string()),
            cohort: Some("2023".to_string()),
            fellow_types: vec![
                "Congressional Innovation Fellow".to_string(),
                "Senior Congressional Innovation Fellow".to_string(),
            ],
            office_served: Some("House Committee on Example".to_string()),
            chamber: Some("House".to_string()),
            party: Some("Republican".to_string()),
            current_role: Some("Senior Engineer".to_string()),
            current_organization: Some("Example Digital Service".to_string()),
            sector: Some("Government".to_string()),
            location: Some("Austin, TX".to_string()),
            ..Alumnus::default()
        },
    ];
    for alumnus in &alumni {
        create_alumnus(store, alumnus).await?;
    }

    info!(fellows = ids.len(), alumni = alumni.len(), "seeded demo records");
    Ok(())
}
