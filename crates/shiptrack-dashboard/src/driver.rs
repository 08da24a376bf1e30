//! Runs a [`Dashboard`] on a tokio task.
//!
//! The task owns the dashboard outright. One `interval` advances it by the
//! real time elapsed between ticks; controls arrive over an mpsc channel
//! and are applied between ticks, so the dashboard itself stays
//! single-threaded. After every step the task publishes a fresh
//! `Arc<Frame>` on a `watch` channel and forwards new events on a
//! `broadcast` channel.

use std::sync::Arc;
use std::time::Duration;

use shiptrack_core::filter::OrderFilter;
use shiptrack_core::generator::TimeRange;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::dashboard::{Dashboard, Lifecycle};
use crate::error::DashboardError;
use crate::event::TimedEvent;
use crate::frame::Frame;

/// Default tick resolution for a spawned dashboard.
pub const DEFAULT_RESOLUTION: Duration = Duration::from_millis(50);

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 256;

/// A control sent to a running dashboard.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetMode(TimeRange),
    SetViewportWidth(u32),
    SetVisible(bool),
    SetMuted(bool),
    ToggleMute,
    Play,
    Pause,
    TogglePlay,
    SetSpeed(f64),
    Scrub(f64),
    ResetReplay,
    SetFilter(OrderFilter),
}

impl Command {
    fn apply(self, dashboard: &mut Dashboard) -> Result<(), DashboardError> {
        match self {
            Command::SetMode(mode) => dashboard.set_mode(mode),
            Command::SetViewportWidth(width) => dashboard.set_viewport_width(width),
            Command::SetVisible(visible) => dashboard.set_visible(visible),
            Command::SetMuted(muted) => dashboard.set_muted(muted),
            Command::ToggleMute => dashboard.toggle_mute().map(|_| ()),
            Command::Play => dashboard.play(),
            Command::Pause => dashboard.pause(),
            Command::TogglePlay => dashboard.toggle_play().map(|_| ()),
            Command::SetSpeed(speed) => dashboard.set_speed(speed),
            Command::Scrub(pct) => dashboard.scrub(pct).map(|_| ()),
            Command::ResetReplay => dashboard.reset_replay(),
            Command::SetFilter(filter) => dashboard.set_filter(filter),
        }
    }
}

#[derive(Debug)]
struct Request {
    command: Command,
    reply: oneshot::Sender<Result<(), DashboardError>>,
}

/// Handle to a spawned dashboard.
///
/// [`unmount`](Self::unmount) stops the task and hands back the disposed
/// dashboard. Dropping the handle aborts the task instead; the dashboard is
/// dropped with it, which disposes its services.
#[derive(Debug)]
pub struct DashboardHandle {
    commands: mpsc::Sender<Request>,
    frames: watch::Receiver<Arc<Frame>>,
    events: broadcast::Sender<TimedEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Dashboard>>,
}

impl DashboardHandle {
    /// Apply `command` and wait for its result.
    pub async fn send(&self, command: Command) -> Result<(), DashboardError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Request { command, reply })
            .await
            .map_err(|_| DashboardError::Stopped)?;
        rx.await.map_err(|_| DashboardError::Stopped)?
    }

    /// The most recently published frame.
    pub fn frame(&self) -> Arc<Frame> {
        Arc::clone(&self.frames.borrow())
    }

    /// A receiver that is notified whenever a new frame is published.
    pub fn frames(&self) -> watch::Receiver<Arc<Frame>> {
        self.frames.clone()
    }

    /// Events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<TimedEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the loop, dispose the dashboard and return it.
    pub async fn unmount(mut self) -> Result<Dashboard, DashboardError> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let task = self.task.take().ok_or(DashboardError::Stopped)?;
        task.await.map_err(|e| DashboardError::Task(e.to_string()))
    }
}

impl Drop for DashboardHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Mount `dashboard` if needed and run it on a new task, stepping every
/// `resolution`. Must be called from within a tokio runtime.
pub fn spawn(mut dashboard: Dashboard, resolution: Duration) -> Result<DashboardHandle, DashboardError> {
    if dashboard.lifecycle() == Lifecycle::Created {
        dashboard.mount()?;
    }
    if !dashboard.is_mounted() {
        return Err(DashboardError::Lifecycle {
            state: dashboard.lifecycle(),
            expected: Lifecycle::Mounted,
        });
    }

    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (frame_tx, frame_rx) = watch::channel(Arc::new(dashboard.frame()));
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let publisher = Publisher {
        frames: frame_tx,
        events: event_tx.clone(),
        next_seq: dashboard.events().total_written(),
    };
    let task = tokio::spawn(run(dashboard, resolution, command_rx, shutdown_rx, publisher));

    Ok(DashboardHandle {
        commands: command_tx,
        frames: frame_rx,
        events: event_tx,
        shutdown: Some(shutdown_tx),
        task: Some(task),
    })
}

struct Publisher {
    frames: watch::Sender<Arc<Frame>>,
    events: broadcast::Sender<TimedEvent>,
    next_seq: u64,
}

impl Publisher {
    fn publish(&mut self, dashboard: &Dashboard) {
        for event in dashboard.events().since(self.next_seq) {
            // No subscribers is fine.
            let _ = self.events.send(event.clone());
        }
        self.next_seq = dashboard.events().total_written();
        self.frames.send_replace(Arc::new(dashboard.frame()));
    }
}

async fn run(
    mut dashboard: Dashboard,
    resolution: Duration,
    mut commands: mpsc::Receiver<Request>,
    mut shutdown: oneshot::Receiver<()>,
    mut publisher: Publisher,
) -> Dashboard {
    let mut ticker = tokio::time::interval(resolution.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();
    tracing::debug!(resolution_ms = resolution.as_millis() as u64, "dashboard task started");

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            Some(request) = commands.recv() => {
                // Controls take effect at the moment they arrive.
                if let Err(err) = catch_up(&mut dashboard, &mut last) {
                    tracing::warn!(%err, "dashboard stopped advancing");
                    let _ = request.reply.send(Err(err));
                    break;
                }
                let result = request.command.apply(&mut dashboard);
                if let Err(err) = &result {
                    tracing::debug!(%err, "control rejected");
                }
                publisher.publish(&dashboard);
                let _ = request.reply.send(result);
            }
            _ = ticker.tick() => {
                if let Err(err) = catch_up(&mut dashboard, &mut last) {
                    tracing::warn!(%err, "dashboard stopped advancing");
                    break;
                }
                publisher.publish(&dashboard);
            }
        }
    }

    dashboard.dispose();
    publisher.publish(&dashboard);
    dashboard
}

/// Advance `dashboard` by the wall time since `last`.
fn catch_up(dashboard: &mut Dashboard, last: &mut Instant) -> Result<(), DashboardError> {
    let now = Instant::now();
    let dt = now.saturating_duration_since(*last);
    *last = now;
    dashboard.advance(dt).map(|_| ())
}
