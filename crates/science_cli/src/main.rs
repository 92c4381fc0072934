use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use science_control::{CommandSource, FlightPlanController, OperatorController};
use science_core::{
    ChannelPreference, ConditionRegistry, Event, EventLevel, ExperimentStatus, GameContent,
    GameState,
};
use science_world::{
    build_initial_state, load_content, load_content_report, load_flight_plan, load_vessels,
    read_save, validate_world, write_save,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "science_cli", about = "Vessel science experiment simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation for a fixed number of ticks.
    Run {
        #[arg(long)]
        ticks: u64,
        /// Build the world from vessels.json with this seed. Mutually exclusive with --state.
        #[arg(long, conflicts_with = "state_file")]
        seed: Option<u64>,
        /// Resume from a save file. Mutually exclusive with --seed.
        #[arg(long = "state", conflicts_with = "seed")]
        state_file: Option<PathBuf>,
        /// Write a save file after the last tick.
        #[arg(long)]
        save: Option<PathBuf>,
        #[arg(long, default_value = "./content")]
        content_dir: String,
        #[arg(long, default_value_t = 10)]
        print_every: u64,
        #[arg(long, default_value = "normal", value_parser = ["normal", "debug"])]
        event_level: String,
        /// Sample metrics every N ticks.
        #[arg(long, default_value_t = 10)]
        metrics_every: u64,
        /// Disable automatic metrics collection to runs/ directory.
        #[arg(long)]
        no_metrics: bool,
        /// Prefer the fastest free channel over the cheapest.
        #[arg(long)]
        favor_rate: bool,
    },
    /// Load and cross-check the content directory without running.
    Validate {
        #[arg(long, default_value = "./content")]
        content_dir: String,
    },
}

struct RunOptions {
    ticks: u64,
    seed: Option<u64>,
    state_file: Option<PathBuf>,
    save: Option<PathBuf>,
    content_dir: String,
    print_every: u64,
    event_level: EventLevel,
    metrics_every: u64,
    metrics: bool,
}

// ---------------------------------------------------------------------------
// Run directory
// ---------------------------------------------------------------------------

fn generate_run_id(seed: u64) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = now.as_secs();
    let days = secs / 86400;
    let time_of_day = secs % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;
    let (year, month, day) = epoch_days_to_date(days);

    format!("{year:04}{month:02}{day:02}_{hours:02}{minutes:02}{seconds:02}_seed{seed}")
}

/// Civil date from days since 1970-01-01 (proleptic Gregorian).
fn epoch_days_to_date(mut days: u64) -> (u64, u64, u64) {
    days += 719_468;
    let era = days / 146_097;
    let day_of_era = days % 146_097;
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36524 - day_of_era / 146_096) / 365;
    let year = year_of_era + era * 400;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let mp = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { year + 1 } else { year };
    (year, month, day)
}

fn create_run_dir(run_id: &str) -> Result<PathBuf> {
    let dir = PathBuf::from("runs").join(run_id);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating run directory: {}", dir.display()))?;
    Ok(dir)
}

fn write_run_info(dir: &Path, run_id: &str, state: &GameState, opts: &RunOptions) -> Result<()> {
    let info = serde_json::json!({
        "run_id": run_id,
        "seed": state.meta.seed,
        "start_time": run_id.split('_').take(2).collect::<Vec<_>>().join("_"),
        "content_version": state.meta.content_version,
        "metrics_every": opts.metrics_every,
        "runner": "science_cli",
        "args": {
            "ticks": opts.ticks,
            "print_every": opts.print_every,
            "resumed_from": opts.state_file.as_ref().map(|p| p.display().to_string()),
        }
    });
    let path = dir.join("run_info.json");
    let file =
        std::fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, &info)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

fn initial_state(content: &GameContent, opts: &RunOptions) -> Result<GameState> {
    if let Some(path) = &opts.state_file {
        let state = read_save(path, content)?;
        info!(path = %path.display(), tick = state.meta.tick, "resumed from save");
        return Ok(state);
    }
    let vessels = load_vessels(&opts.content_dir)?;
    let seed = opts.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Ok(build_initial_state(content, &vessels, seed, &mut rng))
}

fn report_event(tick: u64, event: &Event) {
    match event {
        Event::ExperimentStateChanged {
            experiment_id, to, ..
        } if to.is_terminal() => {
            println!("*** {experiment_id}: {} at tick={tick:04} ***", to.label());
        }
        Event::TransmissionCompleted { title, .. } => {
            println!("*** TRANSMITTED: {title} at tick={tick:04} ***");
        }
        Event::ConnectionLost { experiment_id, .. } => {
            println!("*** CONNECTION LOST: {experiment_id} at tick={tick:04} ***");
        }
        Event::ScienceRecovered {
            experiment_id, value, ..
        } => {
            println!("*** RECOVERED: {experiment_id} worth {value:.2} at tick={tick:04} ***");
        }
        _ => debug!(tick, ?event, "event"),
    }
}

fn run(content: &GameContent, opts: &RunOptions) -> Result<()> {
    let mut state = initial_state(content, opts)?;
    let plan = load_flight_plan(&opts.content_dir)?;
    let vessels = load_vessels(&opts.content_dir)?;
    validate_world(content, &vessels, &plan);

    let mut metrics_writer: Option<science_core::MetricsFileWriter> = None;
    if opts.metrics {
        let run_id = generate_run_id(state.meta.seed);
        let run_dir = create_run_dir(&run_id)?;
        write_run_info(&run_dir, &run_id, &state, opts)?;
        let writer = science_core::MetricsFileWriter::new(run_dir.clone())
            .with_context(|| format!("opening metrics CSV in {}", run_dir.display()))?;
        metrics_writer = Some(writer);
        println!("Run directory: {}", run_dir.display());
    }

    let mut operator = OperatorController::default();
    let mut flight_plan = FlightPlanController::new(plan);
    let mut next_command_id = state.counters.next_command_id;

    println!(
        "Starting simulation: ticks={} seed={} vessels={} content_version={}",
        opts.ticks,
        state.meta.seed,
        state.vessels.len(),
        content.content_version,
    );
    println!("{}", "-".repeat(80));

    for _ in 0..opts.ticks {
        let mut commands = flight_plan.generate_commands(&state, content, &mut next_command_id);
        commands.extend(operator.generate_commands(&state, content, &mut next_command_id));

        let events = science_core::tick(&mut state, &commands, content, opts.event_level);
        for envelope in &events {
            report_event(envelope.tick, &envelope.event);
        }

        if state.meta.tick % opts.print_every.max(1) == 0 {
            print_status(&state);
        }

        if let Some(ref mut writer) = metrics_writer {
            if state.meta.tick % opts.metrics_every.max(1) == 0 {
                let snapshot = science_core::compute_metrics(&state);
                writer.write_row(&snapshot).context("writing metrics row")?;
            }
        }
    }
    state.counters.next_command_id = next_command_id;

    println!("{}", "-".repeat(80));
    println!("Done. Final state at tick {}:", state.meta.tick);
    print_status(&state);

    if let Some(ref mut writer) = metrics_writer {
        writer.flush().context("final metrics flush")?;
        println!("Metrics written to runs/ directory.");
    }
    if let Some(path) = &opts.save {
        write_save(path, &state)?;
        println!("Saved to {}", path.display());
    }
    Ok(())
}

fn print_status(state: &GameState) {
    println!(
        "[tick={:04}  t={:7.1}s]  transmitted={:.2}  recovered={:.2}",
        state.meta.tick, state.meta.time, state.ledger.transmitted, state.ledger.recovered,
    );
    let mut vessels: Vec<_> = state.vessels.values().collect();
    vessels.sort_by(|a, b| a.id.cmp(&b.id));
    for vessel in vessels {
        for experiment in &vessel.experiments {
            let runtime = &experiment.runtime;
            println!(
                "    {vessel:<18} {def:<22} {status:<24} data={data:6.2}  sent={sent:6.2}",
                vessel = vessel.id.0,
                def = experiment.def_id,
                status = runtime.status.label(),
                data = runtime.current_data,
                sent = runtime.transmitted_packets,
            );
            if matches!(
                runtime.status,
                ExperimentStatus::ConditionsNotMet | ExperimentStatus::ResearchPausedConditionsNotMet
            ) {
                println!("        needs: {}", experiment.conditions.describe());
            }
        }
    }
}

/// Stricter than loading: any dropped condition block fails validation.
fn validate(content_dir: &str) -> Result<()> {
    let (content, skipped) = load_content_report(content_dir, &ConditionRegistry::builtin())?;
    if !skipped.is_empty() {
        for block in &skipped {
            println!("  {}: {}", block.experiment, block.error);
        }
        bail!("{} condition block(s) failed to load", skipped.len());
    }
    let vessels = load_vessels(content_dir)?;
    let plan = load_flight_plan(content_dir)?;
    validate_world(&content, &vessels, &plan);
    println!(
        "content_version={} experiments={} vessels={} flight_plan_steps={}",
        content.content_version,
        content.experiments.len(),
        vessels.len(),
        plan.len(),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            ticks,
            seed,
            state_file,
            save,
            content_dir,
            print_every,
            event_level,
            metrics_every,
            no_metrics,
            favor_rate,
        } => {
            let mut content = load_content(&content_dir)?;
            if favor_rate {
                content.constants.channel_preference = ChannelPreference::HighestRate;
            }
            let opts = RunOptions {
                ticks,
                seed,
                state_file,
                save,
                content_dir,
                print_every,
                event_level: match event_level.as_str() {
                    "debug" => EventLevel::Debug,
                    _ => EventLevel::Normal,
                },
                metrics_every,
                metrics: !no_metrics,
            };
            run(&content, &opts)?;
        }
        Commands::Validate { content_dir } => validate(&content_dir)?,
    }
    Ok(())
}
