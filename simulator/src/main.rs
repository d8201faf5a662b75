use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use moneymatters_simulator::{run_multi, run_solo, Disconnect, MatchPlan, Summary};
use moneymatters_types::{GameConfig, GameMode};
use tracing::info;

fn init_tracing(level: &str) -> Result<()> {
    let level: tracing::Level = level
        .parse()
        .with_context(|| format!("invalid log level `{level}`"))?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// One local orchestrator.
    Solo,
    /// One replica task per participant; replica 0 is the authority.
    Multi,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of bot participants.
    #[arg(short, long, default_value_t = 2)]
    players: usize,

    #[arg(short, long, value_enum, default_value_t = Mode::Solo)]
    mode: Mode,

    /// YAML game configuration (defaults apply when omitted).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for event draws and bot choices (overrides the config file).
    #[arg(long)]
    seed: Option<u64>,

    /// Round limit (overrides the config file).
    #[arg(long)]
    rounds: Option<u32>,

    /// Participant leaves before a round, as ROUND:INDEX. Repeatable.
    #[arg(long)]
    disconnect: Vec<Disconnect>,

    /// Participant whose bot never answers decisions. Repeatable.
    #[arg(long)]
    idle: Vec<usize>,

    /// Resolve a stalled decision after this many milliseconds.
    #[arg(long)]
    decision_timeout_ms: Option<u64>,

    /// Log level: error, warn, info, debug or trace.
    #[arg(long)]
    log_level: Option<String>,

    /// Print the final standings as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn load_config(args: &Args) -> Result<GameConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            GameConfig::from_yaml(&source)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => GameConfig::default(),
    };
    if let Some(rounds) = args.rounds {
        config.round_limit = rounds;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(ms) = args.decision_timeout_ms {
        config.decision_timeout_ms = Some(ms);
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn build_plan(args: &Args, config: &GameConfig) -> Result<MatchPlan> {
    if args.players < config.min_players || args.players > config.max_players {
        anyhow::bail!(
            "players must be within {}..={} (got {})",
            config.min_players,
            config.max_players,
            args.players
        );
    }
    let mode = match args.mode {
        Mode::Solo => GameMode::Solo,
        Mode::Multi => GameMode::MultiReplica,
    };
    if mode == GameMode::MultiReplica && args.players < 2 {
        anyhow::bail!("multi mode needs at least two players");
    }
    if let Some(0) = config.decision_timeout_ms {
        anyhow::bail!("decision_timeout_ms must be > 0 when set");
    }
    let plan = MatchPlan {
        players: args.players,
        mode,
        seed: config.seed.unwrap_or_else(rand::random),
        disconnects: args.disconnect.clone(),
        idle: args.idle.clone(),
        decision_timeout: config.decision_timeout_ms.map(Duration::from_millis),
    };
    plan.validate()?;
    Ok(plan)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_tracing(&config.log_level)?;
    let plan = build_plan(&args, &config)?;
    info!(
        players = plan.players,
        mode = ?plan.mode,
        seed = plan.seed,
        rounds = config.round_limit,
        "starting match"
    );

    let session = match plan.mode {
        GameMode::Solo => run_solo(&config, &plan)?,
        GameMode::MultiReplica => run_multi(&config, &plan).await?,
    };
    let summary = Summary::new(&session, plan.seed);
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("failed to encode summary")?
        );
    } else {
        println!("{summary}");
    }
    Ok(())
}
