use std::path::PathBuf;
use std::sync::Arc;

use chrono::Datelike;
use clap::Args;
use washplan::error::AppError;
use washplan::workflows::intake::{provision_allowances, RosterImporter};
use washplan::workflows::laundry::requests::{RequestStatus, WashRequestService};
use washplan::workflows::laundry::{
    AllowanceStore, Batch, BatchId, BatchRepository, BatchYear, PolicyDraft, PolicyRegistry,
    PromotionCoordinator, PromotionOptions,
};

use crate::infra::{
    parse_date, InMemoryAllowanceStore, InMemoryBatchRepository, InMemoryPolicyStore,
    InMemoryRequestRepository, InMemoryStudentRepository,
};

const SAMPLE_ROSTER: &str = "\
Register No,Name,Status
21ME101,Priya Raman,
21ME102,Arun Kumar,
21ME103,Devi S,
21ME104,Farhan A,left
21ME105,Joseph K,
";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Roster CSV to enroll; a built-in sample roster is used when omitted.
    #[arg(long)]
    pub(crate) roster_csv: Option<PathBuf>,
    /// Measured weight for the demo weigh-in, in kilograms.
    #[arg(long, default_value_t = 20.0)]
    pub(crate) weight_kg: f64,
    /// First day of the academic year (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date, default_value = "2024-06-01")]
    pub(crate) year_start: chrono::NaiveDate,
}

#[derive(Args, Debug)]
pub(crate) struct RosterCheckArgs {
    /// Roster CSV export to inspect
    #[arg(long)]
    pub(crate) file: PathBuf,
}

pub(crate) fn run_roster_check(args: RosterCheckArgs) -> Result<(), AppError> {
    let students = InMemoryStudentRepository::default();
    let batch_id = BatchId("roster-check".to_string());
    let summary = RosterImporter::from_path(&args.file, &batch_id, &students)?;

    println!(
        "Roster check: {} student(s) would enroll, {} skipped",
        summary.enrolled.len(),
        summary.skipped.len()
    );
    for student in &summary.enrolled {
        println!(
            "- {} {} [{}]",
            student.register_no,
            student.name,
            student.hostel_status.label()
        );
    }
    if !summary.skipped.is_empty() {
        println!("Skipped register numbers: {}", summary.skipped.join(", "));
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    println!("Hostel wash-service demo");

    let policies = Arc::new(InMemoryPolicyStore::default());
    let batches = Arc::new(InMemoryBatchRepository::default());
    let students = Arc::new(InMemoryStudentRepository::default());
    let allowances = Arc::new(InMemoryAllowanceStore::default());
    let requests = Arc::new(InMemoryRequestRepository::default());

    let registry = PolicyRegistry::new(policies.clone());
    let policy = registry
        .create(PolicyDraft {
            name: "standard".to_string(),
            total_washes: 30,
            max_weight_per_wash: 7.0,
        })
        .expect("demo policy creates");
    registry.activate(&policy.id).expect("demo policy activates");
    println!(
        "Activated policy '{}' ({} washes, {} kg cap per wash)",
        policy.name, policy.total_washes, policy.max_weight_per_wash
    );

    let year_end = args.year_start + chrono::Duration::days(333);
    let batch = Batch {
        id: BatchId("batch-2023-mech".to_string()),
        department_id: "mech".to_string(),
        start_year: args.year_start.year(),
        end_year: args.year_start.year() + 4,
        current_year: 1,
        archived: false,
        years: vec![
            BatchYear {
                year_no: 1,
                start_date: Some(args.year_start),
                end_date: Some(year_end),
            },
            BatchYear {
                year_no: 2,
                start_date: Some(args.year_start + chrono::Duration::days(365)),
                end_date: Some(year_end + chrono::Duration::days(365)),
            },
        ],
    };
    batches.insert(batch.clone()).expect("demo batch stores");

    let summary = match &args.roster_csv {
        Some(path) => RosterImporter::from_path(path, &batch.id, students.as_ref())?,
        None => {
            RosterImporter::from_reader(SAMPLE_ROSTER.as_bytes(), &batch.id, students.as_ref())?
        }
    };
    let window = batch
        .year(1)
        .map(|year| (year.start_date, year.end_date))
        .unwrap_or((None, None));
    let provisioned = provision_allowances(
        &summary.enrolled,
        1,
        window,
        policies.as_ref(),
        allowances.as_ref(),
    )?;
    println!(
        "Enrolled {} student(s) ({} skipped), provisioned {} year-1 allowance(s)",
        summary.enrolled.len(),
        summary.skipped.len(),
        provisioned
    );

    let service = WashRequestService::new(requests, students.clone(), allowances.clone());
    let first = summary
        .enrolled
        .iter()
        .find(|student| student.hostel_status.is_active())
        .expect("sample roster has an active student");

    let request = service
        .create(first.id.clone(), Some(16), Some("demo drop-off".to_string()))
        .expect("demo request opens");
    let outcome = service
        .record_weight(&request.id, args.weight_kg)
        .expect("demo weigh-in runs");
    println!(
        "Weighed {} kg for {} -> {} wash(es), status {}",
        args.weight_kg,
        first.register_no,
        outcome.request.wash_count,
        outcome.request.status.label()
    );
    if !outcome.auto_cancelled {
        service
            .set_status(&request.id, RequestStatus::Completed, None)
            .expect("demo wash completes");
        let returned = service
            .set_status(&request.id, RequestStatus::Returned, None)
            .expect("demo bag returns");
        println!(
            "Request {} returned on {}",
            returned.id.0,
            returned
                .returned_date
                .map(|date| date.to_string())
                .unwrap_or_default()
        );
    }

    // An oversized second drop-off shows the auto-cancellation path.
    if let Some(second) = summary
        .enrolled
        .iter()
        .filter(|student| student.hostel_status.is_active())
        .nth(1)
    {
        let request = service
            .create(second.id.clone(), None, None)
            .expect("demo request opens");
        let outcome = service
            .record_weight(&request.id, 250.0)
            .expect("demo weigh-in runs");
        println!(
            "Weighed 250 kg for {} -> auto_cancelled = {} ({})",
            second.register_no,
            outcome.auto_cancelled,
            outcome
                .request
                .cancellation_reason
                .as_deref()
                .unwrap_or("no reason")
        );
    }

    let coordinator =
        PromotionCoordinator::new(batches.clone(), students, allowances.clone(), policies);
    let outcome = coordinator
        .promote(&batch.id, &PromotionOptions::default())
        .expect("demo promotion runs");
    println!(
        "Promoted batch {} from year {} to year {} (graduated: {}, promoted: {}, failed: {})",
        outcome.batch_id.0,
        outcome.from_year,
        outcome.to_year,
        outcome.graduated,
        outcome.promoted.len(),
        outcome.failed.len()
    );

    let plans: Vec<_> = summary
        .enrolled
        .iter()
        .filter_map(|student| {
            allowances
                .find_open(&student.id)
                .expect("ledger available")
                .map(|allowance| allowance.status_view())
        })
        .collect();
    println!(
        "Open allowances after promotion:\n{}",
        serde_json::to_string_pretty(&plans).expect("views serialize")
    );

    Ok(())
}
