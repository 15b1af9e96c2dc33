use crate::cli::RunArgs;
use crate::config::Config;
use crate::constraint::session_constraints;
use crate::domain::Domain;
use crate::error::WellsyncError;
use crate::output::report::{headline, write_plan_report};
use crate::output::summary::{exit_code, write_summary};
use crate::state::UserData;
use crate::workflow::{Engine, SessionState};
use tracing::{error, info, warn};
use uuid::Uuid;

pub async fn execute(args: RunArgs) -> anyhow::Result<()> {
    let (config, data) = load_inputs(&args)?;

    if config.dry_run {
        info!("DRY RUN - no reasoning calls will be made");
        print_execution_plan(&config, &data);
        return Ok(());
    }

    let engine = Engine::from_config(config.clone());
    let session_id = Uuid::new_v4();
    let outcome = engine.run_session(session_id, data).await;

    let session_dir = write_plan_report(&config.report_dir, &outcome)?;
    if let Err(e) = write_summary(&session_dir, &outcome) {
        warn!("Failed to write session summary: {}", e);
    }
    info!("Report written to {:?}", session_dir);

    println!("session: {}", session_id);
    println!("state: {}", outcome.state);
    println!("plan: {}", outcome.plan.short_fingerprint());
    println!("{}", headline(&outcome.plan));
    println!("report: {}", session_dir.display());

    if outcome.state != SessionState::Committed {
        error!(
            "Session ended in {}: {}",
            outcome.state,
            outcome.reason.as_deref().unwrap_or("unknown")
        );
        std::process::exit(exit_code(outcome.state));
    }

    Ok(())
}

fn load_inputs(args: &RunArgs) -> Result<(Config, UserData), WellsyncError> {
    info!("Loading config from {:?}", args.config);
    let mut config = Config::load(&args.config)?;

    // Apply CLI overrides
    if let Some(report_dir) = &args.report_dir {
        config.report_dir = report_dir.clone();
    }
    if args.dry_run {
        config.dry_run = true;
    }

    config.validate()?;

    info!("Loading user data from {:?}", args.input);
    let data = UserData::load(&args.input)?;
    Ok((config, data))
}

fn print_execution_plan(config: &Config, data: &UserData) {
    println!("\n=== Execution Plan ===\n");
    println!("Report dir: {:?}", config.report_dir);
    println!("Store dir: {:?}", config.store.dir);
    println!("Session deadline: {}s", config.session_deadline_sec);
    println!(
        "Retry: {} attempts, {}ms base backoff",
        config.retry.max_attempts, config.retry.backoff_base_ms
    );

    println!("\nDomains (priority order):");
    for domain in Domain::ALL {
        let settings = config.domain(domain);
        let status = if settings.enabled {
            ""
        } else {
            " [DISABLED - fallback only]"
        };
        println!(
            "  - {} ({}) -> timeout {:?}{}",
            domain,
            settings.provider,
            config.timeout_for(domain),
            status
        );
    }

    match (config.coordinator.reasoned_merge, config.coordinator.provider) {
        (true, Some(provider)) => println!("\nMerge: reasoned via {}, deterministic fallback", provider),
        _ => println!("\nMerge: deterministic"),
    }

    let constraints = session_constraints(&data.user_profile, &data.recent_data, &config.safety);
    println!("\nSession constraints:");
    for c in constraints.iter() {
        let owner = c
            .owner
            .map(|d| d.to_string())
            .unwrap_or_else(|| "user".to_string());
        println!(
            "  - {} [{}, priority {}, owner {}]",
            c.name,
            c.kind.label(),
            c.priority,
            owner
        );
    }
    println!();
}
