//! Runs a dashboard without a UI and prints what it saw.
//!
//! ```text
//! cargo run -p shiptrack-dashboard --example headless_runner -- --mode 24h --seconds 60 --seed 7
//! ```
//!
//! By default time is simulated: the session is stepped in 100 ms slices on
//! a manual clock and finishes instantly. `--realtime` runs the async driver
//! against the wall clock instead.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{TimeDelta, Utc};
use clap::Parser;
use shiptrack_core::clock::ManualClock;
use shiptrack_core::generator::TimeRange;
use shiptrack_core::rng::SimRng;
use shiptrack_dashboard::{
    Command, Dashboard, DashboardEvent, LoggedEffects, LoggedSound, Services, logging, spawn,
};
use shiptrack_data::{TrackerConfig, load_config_dir, load_config_file};

const STEP: Duration = Duration::from_millis(100);

#[derive(Debug, Parser)]
#[command(about = "Run the order tracker dashboard headless")]
struct Args {
    /// Config file, or a directory containing `tracker.{ron,toml,json}`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Time range: live, 1h, 24h, 7d or 30d.
    #[arg(long, default_value = "live")]
    mode: TimeRange,

    /// Viewport width in pixels.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Session length in dashboard seconds.
    #[arg(long, default_value_t = 30)]
    seconds: u64,

    /// RNG seed. Overrides the config file.
    #[arg(long)]
    seed: Option<u64>,

    /// Replay speed multiplier.
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Run on the wall clock through the async driver.
    #[arg(long)]
    realtime: bool,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<TrackerConfig> {
    let Some(path) = path else {
        return Ok(TrackerConfig::default());
    };
    let config = if path.is_dir() {
        load_config_dir(path)
    } else {
        load_config_file(path)
    }
    .with_context(|| format!("loading config from {}", path.display()))?;
    Ok(config)
}

fn seeded_rng(seed: Option<u64>) -> SimRng {
    seed.map_or_else(SimRng::from_entropy, SimRng::new)
}

/// Apply the session controls shared by both modes.
fn configure(dashboard: &mut Dashboard, args: &Args) -> anyhow::Result<()> {
    dashboard.set_viewport_width(args.width)?;
    if !args.mode.is_live() {
        dashboard.set_mode(args.mode)?;
        dashboard.set_speed(args.speed)?;
        dashboard.play()?;
    }
    Ok(())
}

fn run_virtual(config: TrackerConfig, args: &Args) -> anyhow::Result<Dashboard> {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let services = Services {
        clock: clock.clone(),
        rng: Box::new(seeded_rng(config.seed)),
        sound: Box::new(LoggedSound::new()),
        effects: Box::new(LoggedEffects::new()),
    };
    let mut dashboard = Dashboard::new(config, services)?;
    dashboard.mount()?;
    configure(&mut dashboard, args)?;

    let step = TimeDelta::from_std(STEP)?;
    let end = Duration::from_secs(args.seconds);
    while dashboard.elapsed() < end {
        clock.advance(step);
        dashboard.advance(STEP)?;
    }
    dashboard.dispose();
    Ok(dashboard)
}

async fn run_realtime(config: TrackerConfig, args: &Args) -> anyhow::Result<Dashboard> {
    let mut dashboard = Dashboard::new(config.clone(), Services::logged(config.seed))?;
    dashboard.mount()?;
    configure(&mut dashboard, args)?;

    let handle = spawn(dashboard, shiptrack_dashboard::driver::DEFAULT_RESOLUTION)?;
    let mut events = handle.subscribe();
    let watcher = tokio::spawn(async move {
        let mut milestones = 0u64;
        while let Ok(event) = events.recv().await {
            if let DashboardEvent::MilestoneReached(m) = &event.event {
                milestones += 1;
                println!("  {} {}: {}", m.def.emoji, m.def.title, m.def.description);
            }
        }
        milestones
    });

    tokio::time::sleep(Duration::from_secs(args.seconds)).await;
    if args.mode.is_live() {
        // Exercise the control channel once before stopping.
        handle.send(Command::ToggleMute).await?;
    }
    let dashboard = handle.unmount().await?;
    let announced = watcher.await?;
    tracing::debug!(announced, "event watcher finished");
    Ok(dashboard)
}

fn print_summary(dashboard: &Dashboard) {
    let frame = dashboard.frame();
    println!("mode:            {}", frame.mode.label());
    println!("elapsed:         {:.1}s", frame.elapsed.as_secs_f64());
    println!(
        "orders:          {} ({} units, ${:.2})",
        frame.stats.total_orders, frame.stats.total_units, frame.stats.total_value
    );
    println!(
        "on screen:       {} of {} (capacity {})",
        frame.active_orders.len(),
        frame.active_unfiltered,
        frame.capacity
    );
    for region in &frame.stats.top_regions {
        println!("  {:<20} {}", region.region, region.count);
    }
    for share in &frame.stats.top_categories {
        println!("  {:<20} {}%", share.category.to_string(), share.percentage);
    }
    if let Some(warehouse) = frame.hottest_warehouse() {
        println!("hottest:         {} ({:.2})", warehouse.name, warehouse.intensity);
    }
    if let Some(replay) = &frame.replay {
        println!(
            "replay:          {}/{} ({:.0}%){}",
            replay.cursor,
            replay.total,
            replay.progress,
            if replay.finished { " finished" } else { "" }
        );
    }

    let goal = frame.daily_goal;
    println!(
        "daily goal:      {}/{} ({:.1}%, {:?})",
        goal.current, goal.target, goal.percentage, goal.trend
    );
    println!("milestones:      {}", dashboard.reached_milestones().len());
    for m in dashboard.reached_milestones() {
        println!("  {} {}", m.def.emoji, m.def.title);
    }

    let metrics = dashboard.operational_metrics();
    println!("throughput:      {:.1}/h", metrics.throughput_per_hour);
    println!("peak hour util:  {:.0}%", metrics.peak_hour_utilization);
    for warning in &metrics.capacity_warnings {
        println!("  warning: {warning}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_ref())?;
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    logging::init(&config.logging)?;
    tracing::info!(mode = %args.mode, seconds = args.seconds, realtime = args.realtime, "starting");

    let dashboard = if args.realtime {
        run_realtime(config, &args).await?
    } else {
        run_virtual(config, &args)?
    };
    print_summary(&dashboard);
    Ok(())
}
