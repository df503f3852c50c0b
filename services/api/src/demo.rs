use crate::infra::{in_memory_service, MemoryEngagementService};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use outreach_engine::engagement::{
    CancellationToken, EngagementEvent, EngagementEventType, NewProspect, ProspectId,
    ScoringEngine, ScoringPolicy, ScoringState,
};
use outreach_engine::error::AppError;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Timeline start (RFC 3339). Defaults to 30 days ago.
    #[arg(long, value_parser = crate::infra::parse_timestamp)]
    pub(crate) start: Option<DateTime<Utc>>,
    /// Print the final prospect views as JSON.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct PolicyCheckArgs {
    /// Policy JSON file. The built-in policy is checked when omitted.
    #[arg(long)]
    pub(crate) path: Option<PathBuf>,
}

pub(crate) fn check_policy(args: PolicyCheckArgs) -> Result<(), AppError> {
    let policy = match &args.path {
        Some(path) => ScoringPolicy::from_path(path)?,
        None => ScoringPolicy::default(),
    };
    let engine = ScoringEngine::new(policy)?;
    let policy = engine.policy();

    println!("Scoring policy {}", policy.version);
    println!(
        "  Score range {}..={}, decay {} point(s) after {} quiet day(s)",
        policy.min_score, policy.max_score, policy.decay_amount, policy.decay_after_days
    );
    println!("  Points:");
    for (event_type, points) in &policy.points {
        println!("    {:<18} {:+}", event_type.as_str(), points);
    }
    println!("  Groups:");
    for threshold in &policy.groups {
        println!(
            "    {} {:<14} {:>2}..={:<2} -> {}",
            threshold.group,
            threshold.label,
            threshold.min_score,
            threshold.max_score,
            threshold.status.label()
        );
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let start = args.start.unwrap_or_else(|| Utc::now() - Duration::days(30));
    let at = |offset: i64| start + Duration::days(offset);
    let service = in_memory_service(ScoringEngine::new(ScoringPolicy::default())?, 5);

    println!("Outreach engagement demo");
    println!("Timeline starts {}", start.to_rfc3339());

    println!("\nOpen, then reply");
    let acme = enroll(&service, "acme-ops", start)?;
    record(&service, &acme, "acme-1", EngagementEventType::EmailOpened, at(1))?;
    record(&service, &acme, "acme-2", EngagementEventType::EmailReplied, at(2))?;

    println!("\nThree replies hit the ceiling");
    let globex = enroll(&service, "globex-cfo", start)?;
    for (index, offset) in [1, 3, 4].into_iter().enumerate() {
        let event_id = format!("globex-{index}");
        record(&service, &globex, &event_id, EngagementEventType::EmailReplied, at(offset))?;
    }

    println!("\nBounce freezes the prospect");
    let initech = enroll(&service, "initech-it", start)?;
    record(&service, &initech, "initech-1", EngagementEventType::EmailReplied, at(1))?;
    record(&service, &initech, "initech-2", EngagementEventType::EmailBounced, at(2))?;
    record(&service, &initech, "initech-3", EngagementEventType::EmailClicked, at(3))?;

    println!("\nSame webhook delivered twice");
    let hooli = enroll(&service, "hooli-vp", start)?;
    record(&service, &hooli, "hooli-1", EngagementEventType::EmailOpened, at(2))?;
    record(&service, &hooli, "hooli-1", EngagementEventType::EmailOpened, at(2))?;

    println!("\nDecay sweeps");
    let cancel = CancellationToken::new();
    for offset in [12, 12, 22] {
        let report = service.run_decay_sweep(at(offset), &cancel)?;
        println!(
            "  day {:>2}: examined {}, decayed {}, skipped {}",
            offset,
            report.examined,
            report.decayed.len(),
            report.skipped
        );
    }

    println!("\nFinal standings");
    let mut views = Vec::new();
    for prospect_id in [&acme, &globex, &initech, &hooli] {
        let state = service.get(prospect_id)?;
        print_state(&service, &state);
        views.push(service.engine().view(&state));
    }

    if args.json {
        match serde_json::to_string_pretty(&views) {
            Ok(json) => println!("\n{json}"),
            Err(err) => println!("\nJSON view unavailable: {err}"),
        }
    }

    Ok(())
}

fn enroll(
    service: &MemoryEngagementService,
    raw_id: &str,
    created_at: DateTime<Utc>,
) -> Result<ProspectId, AppError> {
    let prospect_id = ProspectId(raw_id.to_string());
    service.create_prospect(NewProspect {
        prospect_id: prospect_id.clone(),
        created_at,
        current_stage: 1,
    })?;
    Ok(prospect_id)
}

fn record(
    service: &MemoryEngagementService,
    prospect_id: &ProspectId,
    event_id: &str,
    event_type: EngagementEventType,
    at: DateTime<Utc>,
) -> Result<(), AppError> {
    let event = EngagementEvent::new(event_id, prospect_id.clone(), event_type.clone(), at);
    let receipt = service.record_event(event)?;
    let state = &receipt.outcome.state;

    if receipt.duplicate {
        println!("  {prospect_id} {event_type}: duplicate delivery, ignored");
        return Ok(());
    }
    println!(
        "  {} {}: {:+} -> score {} ({}), status {}",
        prospect_id,
        event_type,
        receipt.outcome.delta,
        state.score,
        service.engine().group_label(state.group),
        state.status.label()
    );
    Ok(())
}

fn print_state(service: &MemoryEngagementService, state: &ScoringState) {
    println!(
        "  {:<12} score {} group {} {:<14} status {:<10} opens {} clicks {} replies {}",
        state.prospect_id.0,
        state.score,
        state.group,
        service.engine().group_label(state.group),
        state.status.label(),
        state.opens,
        state.clicks,
        state.replies
    );
}
