use crate::infra::{InMemoryStack, MemoryComplianceService};
use chrono::{Duration, NaiveDate, Utc};
use clap::Args;
use renay::compliance::{
    classify, status_label, ComplianceService, Dashboard, FixedClock, NewDocument,
    ReevaluationReport, UserId, WarningWindow,
};
use renay::config::{ComplianceConfig, StorageConfig};
use renay::error::AppError;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct ClassifyArgs {
    /// Document expiry date (YYYY-MM-DD). Omit to classify an undated document.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) valid_until: Option<NaiveDate>,
    /// Evaluation date (defaults to today).
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Warning window in days (defaults to 20).
    #[arg(long)]
    pub(crate) warning_days: Option<u32>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the reporting date (defaults to today).
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct SweepArgs {
    /// Day the demo documents are recorded (defaults to 30 days before --today).
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) seeded_on: Option<NaiveDate>,
    /// Day the stored statuses are re-evaluated (defaults to today).
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

pub(crate) fn run_classify(args: ClassifyArgs) {
    let today = args.today.unwrap_or_else(|| Utc::now().date_naive());
    let window = args
        .warning_days
        .map(WarningWindow::days)
        .unwrap_or_default();
    let status = classify(args.valid_until, today, window);

    println!("AVS validity check");
    println!("- today: {today}");
    println!("- warning window: {} days", window.as_days());
    match args.valid_until {
        Some(valid_until) => {
            println!("- valid until: {valid_until}");
            println!("- warning starts: {}", window.warn_date(valid_until));
        }
        None => println!("- valid until: not set"),
    }
    println!("- status: {}", status_label(status));
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Utc::now().date_naive());
    let stack = demo_stack(today);
    let user = UserId::new();

    seed_demo_data(&stack.service, user, today)?;
    let dashboard = stack.service.dashboard(user)?;

    println!("AVS compliance demo");
    render_dashboard(&dashboard);
    Ok(())
}

pub(crate) fn run_sweep(args: SweepArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Utc::now().date_naive());
    let seeded_on = args.seeded_on.unwrap_or(today - Duration::days(30));
    let stack = demo_stack(seeded_on);
    let user = UserId::new();
    seed_demo_data(&stack.service, user, seeded_on)?;

    let later = ComplianceService::with_clock(
        stack.repository.clone(),
        stack.blobs.clone(),
        ComplianceConfig::default(),
        &StorageConfig::default(),
        Arc::new(FixedClock::on(today)),
    );
    let report = later.reevaluate()?;

    println!("AVS status sweep");
    println!("- seeded on: {seeded_on}");
    println!("- evaluated on: {today}");
    render_sweep(&report);
    Ok(())
}

fn demo_stack(today: NaiveDate) -> InMemoryStack {
    InMemoryStack::with_clock(
        ComplianceConfig::default(),
        &StorageConfig::default(),
        Arc::new(FixedClock::on(today)),
    )
}

/// Three projects, one left empty, with valid, expiring, expired, and missing paperwork.
fn seed_demo_data(
    service: &MemoryComplianceService,
    user: UserId,
    today: NaiveDate,
) -> Result<(), AppError> {
    let harbour = service.create_project(user, "Harbour Tower")?;
    let depot = service.create_project(user, "Depot Refit")?;
    service.create_project(user, "Riverside Lot")?;

    let scaffolding =
        service.create_subcontractor("Nordbau Scaffolding", &[harbour.id, depot.id])?;
    let electrics = service.create_subcontractor("Kessler Electrics", &[harbour.id])?;
    let plumbing = service.create_subcontractor("Ortmann Plumbing", &[harbour.id])?;
    service.create_subcontractor("Vogt Drywall", &[depot.id])?;
    let roofing = service.create_subcontractor("Lindner Roofing", &[])?;

    service.add_document(
        scaffolding.id,
        document("AVS 2026", today - Duration::days(60), today + Duration::days(180)),
    )?;
    service.add_document(
        electrics.id,
        document("AVS 2025", today - Duration::days(375), today - Duration::days(10)),
    )?;
    service.add_document(
        electrics.id,
        document("AVS 2026", today - Duration::days(9), today + Duration::days(90)),
    )?;
    service.add_document(
        plumbing.id,
        document("AVS 2026", today - Duration::days(355), today + Duration::days(10)),
    )?;
    let superseded = service.add_document(
        roofing.id,
        document("AVS 2024", today - Duration::days(730), today - Duration::days(365)),
    )?;
    service.archive_document(superseded.id)?;

    Ok(())
}

fn document(description: &str, valid_from: NaiveDate, valid_until: NaiveDate) -> NewDocument {
    NewDocument {
        file_key: None,
        description: Some(description.to_string()),
        valid_from: Some(valid_from),
        valid_until: Some(valid_until),
    }
}

fn render_dashboard(dashboard: &Dashboard) {
    println!("- today: {}", dashboard.today);
    println!(
        "- {} projects, {} subcontractors, {} fully compliant",
        dashboard.project_count, dashboard.subcontractor_count, dashboard.compliant_projects
    );

    println!("\nProject compliance");
    for overview in &dashboard.projects {
        println!("- {}: {}", overview.project.name, overview.summary);
    }

    println!("\nAlerts");
    if dashboard.alerts.is_empty() {
        println!("- none");
    }
    for alert in &dashboard.alerts {
        match alert.valid_until {
            Some(valid_until) => println!(
                "- [{}] {} (valid until {valid_until})",
                alert.kind.label(),
                alert.subcontractor_name
            ),
            None => println!("- [{}] {}", alert.kind.label(), alert.subcontractor_name),
        }
    }
}

fn render_sweep(report: &ReevaluationReport) {
    println!(
        "- examined {} documents, {} changed",
        report.examined,
        report.changes.len()
    );
    for change in &report.changes {
        println!(
            "- {}: {} -> {}",
            change.document_id,
            status_label(change.from),
            status_label(change.to)
        );
    }
}
