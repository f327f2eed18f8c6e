//! swingfx CLI: analysis, paper trading and config commands.
//!
//! Commands:
//! - `analyze`: run the market-structure analysis on candles from a CSV file
//! - `paper`: run a bot group for N ticks against the in-process paper service
//! - `check-config`: validate a group config and print its fingerprint

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use swingfx_core::analysis::{CandleAnalysis, MarketAnalysis, TrendClassifier};
use swingfx_core::data::{CandleSeries, SeriesOptions};
use swingfx_core::domain::RawBar;
use swingfx_core::engine::{AlwaysOpen, Bot, BotGroup, ForexCalendar, GroupState, MarketCalendar};
use swingfx_core::indicators::{IndicatorSettings, ATR, RSI};
use swingfx_core::repository::{BotRepository, JsonFileRepository, MemoryRepository};
use swingfx_core::service::{PaperConfig, PaperService};
use swingfx_core::GroupConfig;

#[derive(Parser)]
#[command(name = "swingfx", about = "swingfx: market-structure forex bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze candles from a CSV file (timestamp,open,high,low,close).
    Analyze {
        /// Fine timeframe candles.
        csv: PathBuf,

        /// Coarse timeframe candles; enables the combined signal.
        #[arg(long)]
        long: Option<PathBuf>,

        /// Group config supplying indicator and normalization settings.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print JSON instead of text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run a bot group against the paper service.
    Paper {
        /// Path to a TOML group config.
        #[arg(long)]
        config: PathBuf,

        /// Number of ticks to run.
        #[arg(long, default_value_t = 100)]
        ticks: u32,

        /// Minutes between ticks. Defaults to the config's short interval.
        #[arg(long)]
        step_minutes: Option<i64>,

        /// First tick time (RFC 3339). Defaults to 2024-01-02T00:00:00Z.
        #[arg(long)]
        start: Option<String>,

        /// Paper service seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Persist and restore state in this directory.
        #[arg(long)]
        state_dir: Option<PathBuf>,

        /// Ignore market hours.
        #[arg(long, default_value_t = false)]
        always_open: bool,
    },
    /// Validate a group config and print its fingerprint.
    CheckConfig {
        /// Path to a TOML group config.
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            csv,
            long,
            config,
            json,
        } => run_analyze(&csv, long.as_deref(), config.as_deref(), json),
        Commands::Paper {
            config,
            ticks,
            step_minutes,
            start,
            seed,
            state_dir,
            always_open,
        } => run_paper(
            &config,
            ticks,
            step_minutes,
            start.as_deref(),
            seed,
            state_dir.as_deref(),
            always_open,
        ),
        Commands::CheckConfig { config } => run_check_config(&config),
    }
}

fn load_bars(path: &Path) -> Result<Vec<RawBar>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let mut bars = Vec::new();
    for (i, row) in reader.deserialize().enumerate() {
        let bar: RawBar = row.with_context(|| format!("{}: row {}", path.display(), i + 1))?;
        bars.push(bar);
    }
    Ok(bars)
}

fn analyze_file(
    path: &Path,
    options: SeriesOptions,
    settings: &IndicatorSettings,
) -> Result<MarketAnalysis> {
    let bars = load_bars(path)?;
    let series = CandleSeries::from_raw(&bars, options)
        .with_context(|| format!("normalizing {}", path.display()))?;
    Ok(MarketAnalysis::run(series, settings))
}

fn run_analyze(
    csv: &Path,
    long: Option<&Path>,
    config: Option<&Path>,
    json: bool,
) -> Result<()> {
    let config = match config {
        Some(path) => GroupConfig::load(path)?,
        None => GroupConfig::default(),
    };
    let options = config.series_options();

    let short = analyze_file(csv, options, &config.indicators)?;
    let long = long
        .map(|path| analyze_file(path, options, &config.indicators))
        .transpose()?;

    let short_horizon = TrendClassifier::short_horizon(&short);
    let long_horizon = long.as_ref().and_then(TrendClassifier::long_horizon);
    let signal = long
        .as_ref()
        .and_then(|l| TrendClassifier::evaluate(l, &short));
    let candle = CandleAnalysis::last(short.series.candles());

    if json {
        let report = serde_json::json!({
            "candles": short.series.len(),
            "swings": short.swings.swings,
            "breaks": short.swings.breaks,
            "zones": short.zones,
            "mean_atr": short.mean_atr,
            "pattern": format!("{:?}", short.pattern()),
            "candle": candle,
            "short_horizon": short_horizon,
            "long_horizon": long_horizon,
            "signal": signal,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Candles:      {}", short.series.len());
    println!("Swings:       {}", short.swings.swings.len());
    for b in &short.swings.breaks {
        println!("  break {:?} at #{} ({})", b.direction, b.index(), b.price());
    }
    println!("Zones:        {}", short.zones.len());
    for z in &short.zones {
        println!("  [{:.5}, {:.5}]", z.bottom, z.top);
    }
    if let Some(atr) = short.indicators.last(ATR) {
        println!("ATR:          {atr:.5}");
    }
    if let Some(rsi) = short.indicators.last(RSI) {
        println!("RSI:          {rsi:.1}");
    }
    println!("Pattern:      {:?}", short.pattern());
    if let Some(c) = candle {
        println!(
            "Last candle:  engulf {:?}, closed beyond {:?}, hammer {:?}",
            c.engulf, c.closed_beyond, c.hammer
        );
    }
    println!("Short trend:  {}", fmt_direction(short_horizon));
    if long.is_some() {
        println!("Long trend:   {}", fmt_direction(long_horizon));
        match signal {
            Some(s) => println!("Signal:       {}", s.direction),
            None => println!("Signal:       none"),
        }
    }
    Ok(())
}

fn fmt_direction(direction: Option<swingfx_core::domain::Direction>) -> String {
    direction.map_or_else(|| "none".to_string(), |d| d.to_string())
}

/// Restore bots and counters persisted under `repo`, if any.
fn restore_group(config: GroupConfig, repo: &JsonFileRepository) -> Result<BotGroup> {
    let Some(snapshot) = repo.load_group()? else {
        return Ok(BotGroup::new(config));
    };
    if snapshot.fingerprint != config.fingerprint() {
        log::warn!(
            "state in {} was written under a different config",
            repo.root().display()
        );
    }
    let mut bots = Vec::with_capacity(config.pairs.len());
    for pair in &config.pairs {
        let bot = match repo.load_bot(&pair.name)? {
            Some(mut bot) => {
                bot.pair = pair.clone();
                bot
            }
            None => Bot::new(pair.clone()),
        };
        bots.push(bot);
    }
    let state = GroupState {
        enabled: snapshot.enabled,
        consecutive_losses: snapshot.consecutive_losses,
        balance: snapshot.balance,
        ready: snapshot.ready,
    };
    log::info!(
        "restored {} bots, balance {:.2}, {} consecutive losses",
        bots.len(),
        state.balance,
        state.consecutive_losses
    );
    Ok(BotGroup::from_parts(config, bots, state))
}

#[allow(clippy::too_many_arguments)]
fn run_paper(
    config_path: &Path,
    ticks: u32,
    step_minutes: Option<i64>,
    start: Option<&str>,
    seed: u64,
    state_dir: Option<&Path>,
    always_open: bool,
) -> Result<()> {
    let config = GroupConfig::load(config_path)?;
    if config.pairs.is_empty() {
        bail!("config lists no pairs");
    }
    let step = Duration::minutes(step_minutes.unwrap_or_else(|| config.interval_short.minutes()));
    if step <= Duration::zero() {
        bail!("--step-minutes must be positive");
    }
    let start: DateTime<Utc> = match start {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("parsing --start {s}"))?
            .with_timezone(&Utc),
        None => DateTime::parse_from_rfc3339("2024-01-02T00:00:00Z")?.with_timezone(&Utc),
    };

    let (mut group, mut repo): (BotGroup, Box<dyn BotRepository>) = match state_dir {
        Some(dir) => {
            let repo = JsonFileRepository::open(dir)?;
            (restore_group(config, &repo)?, Box::new(repo))
        }
        None => (BotGroup::new(config), Box::new(MemoryRepository::new())),
    };
    let calendar: Box<dyn MarketCalendar> = if always_open {
        Box::new(AlwaysOpen)
    } else {
        Box::new(ForexCalendar::default())
    };
    let mut service = PaperService::new(PaperConfig {
        seed,
        ..PaperConfig::default()
    })
    .starting_at(start);

    let mut now = start;
    for _ in 0..ticks {
        service.advance_to(now);
        let report = group.tick(now, &mut service, repo.as_mut(), calendar.as_ref());
        for order in report.opened() {
            println!("{now}  opened {order}");
        }
        for order in report.closed() {
            println!("{now}  closed {order}");
        }
        for turn in report.failures() {
            println!("{now}  {} failed: {:?}", turn.pair, turn.outcome);
        }
        now += step;
    }

    println!();
    println!("{:<10} {:<13} {:>8} {:>7}", "Pair", "Health", "R", "Losses");
    println!("{}", "-".repeat(41));
    for bot in group.bots() {
        println!(
            "{:<10} {:<13} {:>8.1} {:>7}",
            bot.pair.label(),
            bot.health().to_string(),
            bot.relative_balance,
            bot.consecutive_losses
        );
    }
    let state = group.state();
    println!();
    println!("Group balance:      {:.2}", state.balance);
    println!("Consecutive losses: {}", state.consecutive_losses);
    println!("Enabled:            {}", state.enabled);
    Ok(())
}

fn run_check_config(path: &Path) -> Result<()> {
    let config = GroupConfig::load(path)?;
    println!("Config:      {}", path.display());
    println!("Group:       {}", config.name);
    println!(
        "Timeframes:  {} / {}",
        config.interval_short, config.interval_long
    );
    println!("Pairs:       {}", config.pairs.len());
    println!("Fingerprint: {}", config.fingerprint());
    Ok(())
}
