//! The mounted dashboard session.
//!
//! A [`Dashboard`] owns every piece of mutable state: the generator, the
//! live window, the history log, the replay timeline, the aggregator and
//! the milestone tracker. One [`Scheduler`] drives three named timers, and
//! [`Dashboard::advance`] dispatches their ticks in a deterministic order:
//! by due time, then Generation, ReplayAdvance, Aggregation.
//!
//! # Lifecycle
//!
//! `new` -> [`mount`](Dashboard::mount) -> controls and `advance` ->
//! [`dispose`](Dashboard::dispose). Dispose cancels every timer and
//! releases the injected services. It is idempotent and also runs on drop,
//! so services are released on every exit path.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use shiptrack_core::buffer::{HistoryLog, LiveWindow, ReplayTimeline};
use shiptrack_core::catalog::{Catalog, Warehouse};
use shiptrack_core::clock::Clock;
use shiptrack_core::filter::OrderFilter;
use shiptrack_core::generator::{OrderGenerator, TimeRange};
use shiptrack_core::order::{Order, SharedOrder};
use shiptrack_core::sim::{ScheduledTick, Scheduler, TimerKind};
use shiptrack_data::TrackerConfig;
use shiptrack_milestones::{
    DailyGoal, GoalSettings, Milestone, MilestoneTracker, PeriodGoals, calculate_daily_goal_at,
};
use shiptrack_stats::report::{
    HeatCell, OperationalMetrics, Report, ReportRange, WarehouseDetail, build_report, hex_bins,
    operational_metrics, warehouse_detail,
};
use shiptrack_stats::{Snapshot, Stats, StatsAggregator};

use crate::error::DashboardError;
use crate::event::{DashboardEvent, EventLog, TimedEvent};
use crate::frame::{Frame, ReplayStatus};
use crate::services::{EffectsEngine, Services, Sound, SoundEngine};

/// Orders above this value get the high-value cue.
pub const HIGH_VALUE_THRESHOLD: f64 = 500.0;

/// Fastest accepted replay speed multiplier.
pub const MAX_SPEED: f64 = 100.0;

/// Speeds offered by the replay controls.
pub const SPEED_PRESETS: [f64; 4] = [1.0, 2.0, 5.0, 10.0];

/// Viewport width assumed until the host reports one.
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Mounted,
    Disposed,
}

pub struct Dashboard {
    config: TrackerConfig,
    catalog: Arc<Catalog>,
    clock: Arc<dyn Clock>,
    generator: OrderGenerator,
    sound: Box<dyn SoundEngine>,
    effects: Box<dyn EffectsEngine>,
    scheduler: Scheduler,
    lifecycle: Lifecycle,

    mode: TimeRange,
    viewport_width: u32,
    visible: bool,
    filter: OrderFilter,

    live: LiveWindow,
    history: HistoryLog,
    replay: ReplayTimeline,
    playing: bool,
    speed: f64,

    aggregator: StatsAggregator,
    snapshot: Snapshot,
    goal_announced: bool,
    milestones: MilestoneTracker,
    events: EventLog,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("lifecycle", &self.lifecycle)
            .field("mode", &self.mode)
            .field("elapsed", &self.scheduler.now())
            .field("live", &self.live.len())
            .field("history", &self.history.len())
            .field("replay_cursor", &self.replay.cursor())
            .finish_non_exhaustive()
    }
}

impl Dashboard {
    /// Validate `config` and assemble an unmounted dashboard.
    pub fn new(config: TrackerConfig, services: Services) -> Result<Self, DashboardError> {
        config.validate()?;
        let catalog = Arc::new(config.catalog()?);
        let milestones = MilestoneTracker::new(config.milestone_table())?;
        let Services {
            clock,
            rng,
            sound,
            effects,
        } = services;
        let generator = OrderGenerator::new(
            Arc::clone(&catalog),
            config.generator.clone(),
            rng,
            Arc::clone(&clock),
        );

        let viewport_width = DEFAULT_VIEWPORT_WIDTH;
        let capacity = config.capacity.max_active(viewport_width);
        let live = LiveWindow::new(capacity, config.timing.order_lifetime());
        let history = HistoryLog::new(config.history_capacity);
        let snapshot = Snapshot {
            stats: Stats::default(),
            warehouses: catalog.warehouses().into(),
        };

        Ok(Self {
            aggregator: StatsAggregator::new(config.stats.clone()),
            config,
            catalog,
            clock,
            generator,
            sound,
            effects,
            scheduler: Scheduler::new(),
            lifecycle: Lifecycle::Created,
            mode: TimeRange::Live,
            viewport_width,
            visible: true,
            filter: OrderFilter::default(),
            live,
            history,
            replay: ReplayTimeline::default(),
            playing: false,
            speed: 1.0,
            snapshot,
            goal_announced: false,
            milestones,
            events: EventLog::default(),
        })
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Initialise services, seed the initial batch, arm the live timers and
    /// run one aggregation.
    pub fn mount(&mut self) -> Result<(), DashboardError> {
        self.expect(Lifecycle::Created)?;
        self.sound.init();
        self.effects.init();
        self.lifecycle = Lifecycle::Mounted;

        let now = self.scheduler.now();
        let batch = self.generator.generate_batch(self.config.initial_batch);
        for order in batch.into_iter().map(Order::into_shared) {
            self.live.push(Arc::clone(&order), now);
            self.history.push(order);
        }

        self.scheduler
            .arm(TimerKind::Generation, self.config.timing.generation_period());
        self.scheduler
            .arm(TimerKind::Aggregation, self.config.timing.aggregation_period());
        self.emit(DashboardEvent::Mounted);
        tracing::info!(
            initial_orders = self.history.len(),
            capacity = self.live.capacity(),
            "dashboard mounted"
        );
        self.run_aggregation();
        Ok(())
    }

    /// Cancel every timer and release services. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        match self.lifecycle {
            Lifecycle::Disposed => return,
            Lifecycle::Mounted => {
                self.scheduler.disarm_all();
                self.playing = false;
                self.effects.clear_all();
                self.effects.dispose();
                self.sound.dispose();
                self.emit(DashboardEvent::Disposed);
                tracing::info!(
                    elapsed_ms = self.scheduler.now().as_millis() as u64,
                    ticks = self.scheduler.fired(),
                    "dashboard disposed"
                );
            }
            Lifecycle::Created => {}
        }
        self.lifecycle = Lifecycle::Disposed;
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_mounted(&self) -> bool {
        self.lifecycle == Lifecycle::Mounted
    }

    fn expect(&self, expected: Lifecycle) -> Result<(), DashboardError> {
        if self.lifecycle == expected {
            Ok(())
        } else {
            Err(DashboardError::Lifecycle {
                state: self.lifecycle,
                expected,
            })
        }
    }

    fn expect_replay(&self, control: &'static str) -> Result<(), DashboardError> {
        self.expect(Lifecycle::Mounted)?;
        if self.mode.is_live() {
            tracing::warn!(control, "replay control rejected in live mode");
            return Err(DashboardError::ReplayOnly {
                control,
                mode: self.mode,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Ticks
    // -----------------------------------------------------------------------

    /// Move dashboard time forward by `dt`, dispatching every tick that
    /// falls due. Returns the number of ticks dispatched.
    pub fn advance(&mut self, dt: Duration) -> Result<usize, DashboardError> {
        self.expect(Lifecycle::Mounted)?;
        let until = self.scheduler.now() + dt;
        let mut dispatched = 0;
        while let Some(tick) = self.scheduler.pop_due(until) {
            self.live.expire(tick.at);
            self.dispatch(tick);
            dispatched += 1;
        }
        self.scheduler.settle(until);
        self.live.expire(until);
        Ok(dispatched)
    }

    fn dispatch(&mut self, tick: ScheduledTick) {
        // Hidden pages skip the work; the timer has already been rescheduled.
        if !self.visible {
            return;
        }
        match tick.kind {
            TimerKind::Generation => self.on_generation(tick.at),
            TimerKind::ReplayAdvance => self.on_replay_advance(tick.at),
            TimerKind::Aggregation => self.run_aggregation(),
        }
    }

    fn on_generation(&mut self, at: Duration) {
        if !self.mode.is_live() {
            return;
        }
        let order = self.generator.generate_order().into_shared();
        self.live.push(Arc::clone(&order), at);
        self.history.push(Arc::clone(&order));
        self.cue_order(&order, at);
        self.emit(DashboardEvent::OrderGenerated {
            id: order.id,
            warehouse: order.origin.name.clone(),
            value: order.value,
        });
    }

    fn on_replay_advance(&mut self, at: Duration) {
        if self.mode.is_live() || !self.playing {
            return;
        }
        if let Some(order) = self.replay.advance().cloned() {
            self.cue_order(&order, at);
            self.emit(DashboardEvent::OrderRevealed {
                id: order.id,
                cursor: self.replay.cursor(),
            });
        }
        if self.replay.is_finished() {
            self.playing = false;
            self.scheduler.disarm(TimerKind::ReplayAdvance);
            self.emit(DashboardEvent::ReplayFinished);
            tracing::info!(orders = self.replay.len(), "replay finished");
        }
    }

    fn cue_order(&mut self, order: &SharedOrder, at: Duration) {
        let sound = if order.value > HIGH_VALUE_THRESHOLD {
            Sound::HighValueOrder
        } else {
            Sound::OrderShipped(order.category)
        };
        self.sound.play(sound, at);
        self.effects.pulse(&order.origin, at);
    }

    fn run_aggregation(&mut self) {
        if !self.visible {
            return;
        }
        let warehouses = self.catalog.warehouses();
        self.snapshot = if self.mode.is_live() {
            self.aggregator.aggregate(self.history.iter(), warehouses)
        } else {
            self.aggregator.aggregate(self.replay.revealed(), warehouses)
        };

        let stats = &self.snapshot.stats;
        let goals = &self.config.goals;
        let at = self.scheduler.now();
        if let Some(milestone) = self.milestones.check(stats, self.clock.now()) {
            if goals.celebrations_enabled {
                self.effects.celebrate(&milestone);
                self.sound.play(Sound::Milestone(milestone.key()), at);
            }
            self.emit(DashboardEvent::MilestoneReached(milestone));
        }

        let goal = self.daily_goal();
        if goal.is_complete && !self.goal_announced {
            self.goal_announced = true;
            if self.config.goals.celebrations_enabled {
                self.sound.play(Sound::GoalCompleted, at);
            }
            self.emit(DashboardEvent::GoalCompleted {
                target: goal.target,
            });
            tracing::info!(goal = goal.target, "daily goal completed");
        }
    }

    fn emit(&mut self, event: DashboardEvent) {
        self.events.push(self.scheduler.now(), event);
    }

    // -----------------------------------------------------------------------
    // Controls
    // -----------------------------------------------------------------------

    /// Switch between live generation and a replay of `mode`'s window.
    ///
    /// Entering replay builds a fresh backlog and leaves playback paused at
    /// the start. Returning to live drops the replay. Both clear the active
    /// window. Reached milestones carry over.
    pub fn set_mode(&mut self, mode: TimeRange) -> Result<(), DashboardError> {
        self.expect(Lifecycle::Mounted)?;
        if mode == self.mode {
            return Ok(());
        }
        self.mode = mode;
        self.playing = false;
        self.live.clear();
        self.aggregator.reset_trend();
        self.scheduler.disarm(TimerKind::ReplayAdvance);

        match mode.window_ending(self.clock.now()) {
            None => {
                self.replay = ReplayTimeline::default();
                self.scheduler
                    .arm(TimerKind::Generation, self.config.timing.generation_period());
            }
            Some((start, end)) => {
                self.scheduler.disarm(TimerKind::Generation);
                let backlog = self
                    .generator
                    .generate_historical_backlog(start, end, mode.orders_per_hour())
                    .into_iter()
                    .map(Order::into_shared)
                    .collect();
                self.replay = ReplayTimeline::new(backlog, self.replay_window_size());
            }
        }

        self.emit(DashboardEvent::ModeChanged {
            mode,
            backlog: self.replay.len(),
        });
        tracing::info!(mode = %mode, backlog = self.replay.len(), "mode changed");
        self.run_aggregation();
        Ok(())
    }

    /// Resize both windows for a new viewport width.
    pub fn set_viewport_width(&mut self, width: u32) -> Result<(), DashboardError> {
        self.expect_not_disposed()?;
        self.viewport_width = width;
        let capacity = self.config.capacity.max_active(width);
        if capacity == self.live.capacity() {
            return Ok(());
        }
        let evicted = self.live.set_capacity(capacity);
        self.replay.set_window_size(self.replay_window_size());
        self.emit(DashboardEvent::CapacityChanged { capacity, evicted });
        tracing::debug!(width, capacity, evicted, "viewport resized");
        Ok(())
    }

    pub fn set_visible(&mut self, visible: bool) -> Result<(), DashboardError> {
        self.expect_not_disposed()?;
        if visible != self.visible {
            self.visible = visible;
            self.emit(DashboardEvent::VisibilityChanged { visible });
            tracing::debug!(visible, "visibility changed");
        }
        Ok(())
    }

    pub fn set_muted(&mut self, muted: bool) -> Result<(), DashboardError> {
        self.expect_not_disposed()?;
        if muted != self.sound.is_muted() {
            self.sound.set_muted(muted);
            self.emit(DashboardEvent::MuteChanged { muted });
        }
        Ok(())
    }

    /// Flip mute and return the new state.
    pub fn toggle_mute(&mut self) -> Result<bool, DashboardError> {
        let muted = !self.sound.is_muted();
        self.set_muted(muted)?;
        Ok(muted)
    }

    /// Start or resume replay. A finished replay restarts from the beginning.
    pub fn play(&mut self) -> Result<(), DashboardError> {
        self.expect_replay("play")?;
        if self.playing {
            return Ok(());
        }
        if self.replay.is_finished() {
            self.replay.reset();
        }
        self.playing = true;
        self.scheduler.arm(
            TimerKind::ReplayAdvance,
            self.config.timing.replay_period(self.speed),
        );
        self.emit(DashboardEvent::ReplayStarted);
        tracing::info!(speed = self.speed, cursor = self.replay.cursor(), "replay started");
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), DashboardError> {
        self.expect_replay("pause")?;
        if self.playing {
            self.playing = false;
            self.scheduler.disarm(TimerKind::ReplayAdvance);
            self.emit(DashboardEvent::ReplayPaused);
        }
        Ok(())
    }

    /// Play if paused, pause if playing. Returns whether replay is now playing.
    pub fn toggle_play(&mut self) -> Result<bool, DashboardError> {
        if self.playing {
            self.pause()?;
        } else {
            self.play()?;
        }
        Ok(self.playing)
    }

    /// Set the replay speed multiplier. Takes effect immediately when playing.
    pub fn set_speed(&mut self, speed: f64) -> Result<(), DashboardError> {
        self.expect_not_disposed()?;
        if !(speed.is_finite() && speed > 0.0 && speed <= MAX_SPEED) {
            tracing::warn!(speed, "rejected replay speed");
            return Err(DashboardError::InvalidSpeed {
                speed,
                max: MAX_SPEED,
            });
        }
        self.speed = speed;
        if self.playing {
            self.scheduler.set_period(
                TimerKind::ReplayAdvance,
                self.config.timing.replay_period(speed),
            );
        }
        self.emit(DashboardEvent::SpeedChanged { speed });
        Ok(())
    }

    /// Jump to `pct` percent of the backlog. Returns the new cursor.
    pub fn scrub(&mut self, pct: f64) -> Result<usize, DashboardError> {
        self.expect_replay("scrub")?;
        let cursor = self.replay.seek_progress(pct);
        self.emit(DashboardEvent::Scrubbed { cursor });
        Ok(cursor)
    }

    /// Rewind to the start and pause.
    pub fn reset_replay(&mut self) -> Result<(), DashboardError> {
        self.expect_replay("reset")?;
        self.pause()?;
        self.replay.reset();
        self.emit(DashboardEvent::Scrubbed { cursor: 0 });
        Ok(())
    }

    /// Restrict what the active window shows. Statistics are unaffected.
    pub fn set_filter(&mut self, filter: OrderFilter) -> Result<(), DashboardError> {
        self.expect_not_disposed()?;
        if filter != self.filter {
            self.filter = filter;
            self.emit(DashboardEvent::FilterChanged);
        }
        Ok(())
    }

    /// Replace the goal targets. A new daily target may be announced again.
    pub fn set_goal_settings(&mut self, goals: GoalSettings) -> Result<(), DashboardError> {
        self.expect_not_disposed()?;
        if goals.daily_orders == 0 {
            return Err(shiptrack_data::ConfigError::Zero {
                field: "goals.daily_orders",
            }
            .into());
        }
        if goals.daily_orders != self.config.goals.daily_orders {
            self.goal_announced = false;
        }
        self.config.goals = goals;
        Ok(())
    }

    fn expect_not_disposed(&self) -> Result<(), DashboardError> {
        if self.lifecycle == Lifecycle::Disposed {
            Err(DashboardError::Lifecycle {
                state: Lifecycle::Disposed,
                expected: Lifecycle::Mounted,
            })
        } else {
            Ok(())
        }
    }

    fn replay_window_size(&self) -> usize {
        self.live.capacity().min(self.config.replay_window_cap)
    }

    // -----------------------------------------------------------------------
    // Outputs
    // -----------------------------------------------------------------------

    /// Orders currently eligible for rendering, before the filter.
    pub fn active_orders(&self) -> Vec<SharedOrder> {
        if self.mode.is_live() {
            self.live.to_vec()
        } else {
            self.replay.window().to_vec()
        }
    }

    pub fn frame(&self) -> Frame {
        let (active_orders, active_unfiltered) = if self.mode.is_live() {
            (self.filter.apply(self.live.iter()), self.live.len())
        } else {
            let window = self.replay.window();
            (self.filter.apply(window), window.len())
        };
        let replay = (!self.mode.is_live()).then(|| ReplayStatus {
            playing: self.playing,
            speed: self.speed,
            cursor: self.replay.cursor(),
            total: self.replay.len(),
            progress: self.replay.progress(),
            finished: self.replay.is_finished(),
        });
        Frame {
            mode: self.mode,
            elapsed: self.scheduler.now(),
            visible: self.visible,
            muted: self.sound.is_muted(),
            active_orders,
            active_unfiltered,
            capacity: self.live.capacity(),
            stats: self.snapshot.stats.clone(),
            warehouses: Arc::clone(&self.snapshot.warehouses),
            daily_goal: self.daily_goal(),
            order_trend: self.aggregator.trend(),
            replay,
            filter: self.filter.clone(),
            latest_milestone: self.milestones.reached().last().cloned(),
        }
    }

    /// Milestones in the order they fired this session.
    pub fn reached_milestones(&self) -> &[Milestone] {
        self.milestones.reached()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// The last `n` events, oldest first.
    pub fn recent_events(&self, n: usize) -> Vec<TimedEvent> {
        self.events.recent(n).cloned().collect()
    }

    pub fn stats(&self) -> &Stats {
        &self.snapshot.stats
    }

    pub fn warehouses(&self) -> Arc<[Warehouse]> {
        Arc::clone(&self.snapshot.warehouses)
    }

    /// Progress toward today's target, paced against the clock as of this call.
    pub fn daily_goal(&self) -> DailyGoal {
        calculate_daily_goal_at(
            self.snapshot.stats.total_orders,
            self.config.goals.daily_orders,
            local_time(&*self.clock),
        )
    }

    /// Weekly and monthly progress for the current statistics.
    pub fn period_goals(&self) -> PeriodGoals {
        let stats = &self.snapshot.stats;
        let now = self.clock.now().with_timezone(&Local).naive_local();
        self.config
            .goals
            .period_goals(stats.total_orders, stats.total_units, stats.total_value, now)
    }

    /// Report over the orders that feed statistics in the current mode.
    pub fn report(&self, range: ReportRange) -> Report {
        let now = self.clock.now();
        if self.mode.is_live() {
            build_report(self.history.iter(), range, now)
        } else {
            build_report(self.replay.revealed(), range, now)
        }
    }

    /// Drill-down for one warehouse, or `None` if the catalog lacks it.
    pub fn warehouse_detail(&self, name: &str) -> Option<WarehouseDetail> {
        self.catalog.warehouse(name)?;
        let now = self.clock.now();
        Some(if self.mode.is_live() {
            warehouse_detail(self.history.iter(), name, now)
        } else {
            warehouse_detail(self.replay.revealed(), name, now)
        })
    }

    /// Destination heat map over the current source.
    pub fn heat_map(&self) -> Vec<HeatCell> {
        if self.mode.is_live() {
            hex_bins(self.history.iter())
        } else {
            hex_bins(self.replay.revealed())
        }
    }

    pub fn operational_metrics(&self) -> OperationalMetrics {
        let now = self.clock.now();
        if self.mode.is_live() {
            operational_metrics(self.history.iter(), now)
        } else {
            operational_metrics(self.replay.revealed(), now)
        }
    }

    pub fn mode(&self) -> TimeRange {
        self.mode
    }

    pub fn elapsed(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_muted(&self) -> bool {
        self.sound.is_muted()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn viewport_width(&self) -> u32 {
        self.viewport_width
    }

    pub fn filter(&self) -> &OrderFilter {
        &self.filter
    }

    pub fn live_window(&self) -> &LiveWindow {
        &self.live
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn replay(&self) -> &ReplayTimeline {
        &self.replay
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn local_time(clock: &dyn Clock) -> chrono::NaiveTime {
    clock.now().with_timezone(&Local).time()
}
