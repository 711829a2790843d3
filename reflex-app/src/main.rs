use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use reflex_experiment::{SessionConfig, SessionFile};
use reflex_timing::{HighPrecisionTimer, ManualTimer};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod app;
mod participant;
pub use app::App;
use participant::Participant;

#[derive(Parser)]
#[command(name = "reflex", about = "Detection-task trial engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a session file and print the trials it resolves to
    Validate {
        session: PathBuf,
        /// Seed for generated positions
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Play a session against a scripted participant on a simulated clock
    Simulate(SimulateArgs),
    /// Run a session in real time, responding with ENTER
    Run(RunArgs),
}

#[derive(Args)]
struct SimulateArgs {
    session: PathBuf,
    /// Seed for generated positions and participant behaviour
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Fastest simulated reaction, in seconds
    #[arg(long, default_value_t = 0.15)]
    min_rt: f64,
    /// Slowest simulated reaction, in seconds
    #[arg(long, default_value_t = 0.6)]
    max_rt: f64,
    /// Probability of missing a normal stimulus
    #[arg(long, default_value_t = 0.05)]
    miss_rate: f64,
    /// Probability of responding to a distractor
    #[arg(long, default_value_t = 0.1)]
    false_alarm_rate: f64,
    /// Write the session report as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    session: PathBuf,
    /// Seed for generated positions (random when omitted)
    #[arg(long)]
    seed: Option<u64>,
    /// Write the session report as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn load_session(path: &Path) -> Result<SessionConfig> {
    let file =
        File::open(path).with_context(|| format!("cannot open session {}", path.display()))?;
    let config = SessionFile::from_reader(BufReader::new(file))
        .and_then(SessionFile::into_config)
        .with_context(|| format!("invalid session {}", path.display()))?;
    Ok(config)
}

fn validate(path: &Path, seed: u64) -> Result<()> {
    let config = load_session(path)?;
    let mut rng = StdRng::seed_from_u64(seed);

    println!("Session {} is valid.", path.display());
    println!("  {}", config.instructions());
    println!(
        "  guess limit {:.3}s, response limit {:.3}s, generated duration {:.3}s",
        config.guess_time_limit, config.response_time_limit, config.generated_duration
    );
    for (index, spec) in config.trials.iter().enumerate() {
        let trial = spec.resolve(index, &config, &mut rng);
        let kind = trial.effective_kind(config.include_distractor);
        println!(
            "  trial {:>3}: delay {:.3}s, duration {:.3}s, window {:.3}s, at ({:.1}, {:.1}), {}",
            index,
            trial.delay,
            trial.duration,
            config.input_window(trial.duration),
            trial.position.0,
            trial.position.1,
            kind
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Validate { session, seed } => validate(&session, seed),
        Commands::Simulate(args) => {
            let config = load_session(&args.session)?;
            let mut participant = Participant::new(
                args.seed,
                (args.min_rt, args.max_rt),
                args.miss_rate,
                args.false_alarm_rate,
            );
            let mut app = App::new(config, ManualTimer::new(), Some(args.seed))?;
            app.run_simulated(&mut participant)?;
            app.print_summary();
            if let Some(path) = args.output {
                app.save_report(&path)?;
            }
            Ok(())
        }
        Commands::Run(args) => {
            let config = load_session(&args.session)?;
            let mut app = App::new(config, HighPrecisionTimer::new(), args.seed)?;
            app.run_interactive()?;
            app.print_summary();
            if let Some(path) = args.output {
                app.save_report(&path)?;
            }
            Ok(())
        }
    }
}
