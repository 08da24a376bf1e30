//! Integration tests: historical replay.
//!
//! Switches a dashboard into each replay range and walks the backlog with
//! the transport controls, checking the window, the statistics over the
//! revealed prefix and the reports built from it.

use std::time::Duration;

use shiptrack_core::generator::TimeRange;
use shiptrack_core::rng::SimRng;
use shiptrack_core::test_utils::{fixed_clock, noon};
use shiptrack_dashboard::driver::DEFAULT_RESOLUTION;
use shiptrack_dashboard::{
    Command, Dashboard, DashboardError, DashboardEvent, Recorder, Services, spawn,
};
use shiptrack_data::TrackerConfig;
use shiptrack_stats::report::ReportRange;

// ===========================================================================
// Helpers
// ===========================================================================

fn mounted(seed: u64) -> Dashboard {
    let services = Services::recorded(fixed_clock(), Box::new(SimRng::new(seed)), &Recorder::new());
    let mut dashboard = Dashboard::new(TrackerConfig::default(), services).unwrap();
    dashboard.mount().unwrap();
    dashboard
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
fn every_range_builds_a_sorted_backlog_inside_its_window() {
    let mut d = mounted(21);
    for (mode, expected) in [
        (TimeRange::LastHour, 120),
        (TimeRange::Last24Hours, 1440),
        (TimeRange::Last7Days, 5040),
        (TimeRange::Last30Days, 10_800),
    ] {
        d.set_mode(mode).unwrap();
        let backlog = d.replay().backlog();
        assert_eq!(backlog.len(), expected, "{mode}");

        let (start, end) = mode.window_ending(noon()).unwrap();
        assert!(backlog.iter().all(|o| o.created_at >= start && o.created_at < end));
        assert!(backlog.windows(2).all(|w| w[0].created_at <= w[1].created_at));

        let frame = d.frame();
        let replay = frame.replay.unwrap();
        assert_eq!(replay.cursor, 0);
        assert!(!replay.playing);
        assert!(frame.active_orders.is_empty());
        assert_eq!(frame.stats.total_orders, 0);
    }
}

#[test]
fn full_playback_of_the_last_hour() {
    let mut d = mounted(4);
    d.set_mode(TimeRange::LastHour).unwrap();
    d.play().unwrap();

    // 120 orders at 50 ms each.
    let mut last_cursor = 0;
    for _ in 0..70 {
        d.advance(ms(100)).unwrap();
        let cursor = d.replay().cursor();
        assert!(cursor >= last_cursor);
        assert!(d.frame().active_orders.len() <= 50);
        last_cursor = cursor;
    }
    assert!(d.replay().is_finished());
    assert!(!d.is_playing());
    assert_eq!(d.stats().total_orders, 120);

    let revealed = d
        .events()
        .iter()
        .filter(|e| matches!(e.event, DashboardEvent::OrderRevealed { .. }))
        .count();
    assert_eq!(revealed, 120);

    let report = d.report(ReportRange::Last7Days);
    assert_eq!(report.summary.total_orders, 120);
    let by_warehouse: u64 = report.by_warehouse.iter().map(|w| w.count).sum();
    assert_eq!(by_warehouse, 120);
}

#[test]
fn scrub_then_resume() {
    let mut d = mounted(6);
    d.set_mode(TimeRange::Last24Hours).unwrap();
    assert_eq!(d.scrub(25.0).unwrap(), 360);
    let window: Vec<_> = d.frame().active_orders.iter().map(|o| o.id).collect();
    assert_eq!(window.len(), 50);
    assert_eq!(window[49], d.replay().backlog()[359].id);

    d.play().unwrap();
    d.advance(ms(500)).unwrap();
    assert_eq!(d.replay().cursor(), 370);

    d.pause().unwrap();
    d.advance(ms(500)).unwrap();
    assert_eq!(d.replay().cursor(), 370);
}

#[test]
fn narrow_viewport_shrinks_the_replay_window() {
    let mut d = mounted(12);
    d.set_viewport_width(300).unwrap();
    d.set_mode(TimeRange::LastHour).unwrap();
    d.scrub(100.0).unwrap();
    assert_eq!(d.frame().active_orders.len(), 30);

    d.set_viewport_width(1400).unwrap();
    assert_eq!(d.frame().active_orders.len(), 50);
}

#[test]
fn switching_ranges_discards_progress_but_keeps_milestones() {
    let mut d = mounted(17);
    d.set_mode(TimeRange::Last24Hours).unwrap();
    d.scrub(50.0).unwrap();
    // Let aggregation passes work through the revealed prefix.
    d.advance(ms(30_000)).unwrap();
    let reached = d.reached_milestones().len();
    assert!(reached > 0);

    d.set_mode(TimeRange::LastHour).unwrap();
    assert_eq!(d.replay().cursor(), 0);
    assert_eq!(d.replay().len(), 120);
    assert_eq!(d.reached_milestones().len(), reached);

    d.set_mode(TimeRange::Live).unwrap();
    assert!(d.frame().replay.is_none());
    assert_eq!(d.reached_milestones().len(), reached);
    assert!(matches!(d.scrub(10.0), Err(DashboardError::ReplayOnly { .. })));
}

#[test]
fn high_speed_finishes_quickly() {
    let mut d = mounted(2);
    d.set_mode(TimeRange::LastHour).unwrap();
    d.set_speed(100.0).unwrap();
    d.play().unwrap();
    // 0.5 ms per order clamps to 1 ms.
    d.advance(ms(120)).unwrap();
    assert!(d.replay().is_finished());

    let finished = d
        .events()
        .iter()
        .filter(|e| e.event == DashboardEvent::ReplayFinished)
        .count();
    assert_eq!(finished, 1);
}

#[tokio::test(start_paused = true)]
async fn driver_plays_a_replay() {
    let services = Services::recorded(fixed_clock(), Box::new(SimRng::new(30)), &Recorder::new());
    let d = Dashboard::new(TrackerConfig::default(), services).unwrap();
    let handle = spawn(d, DEFAULT_RESOLUTION).unwrap();

    handle.send(Command::SetMode(TimeRange::LastHour)).await.unwrap();
    handle.send(Command::SetSpeed(10.0)).await.unwrap();
    handle.send(Command::Play).await.unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    let replay = handle.frame().replay.unwrap();
    assert!(replay.finished);
    assert!(!replay.playing);
    assert_eq!(replay.progress, 100.0);

    handle.send(Command::TogglePlay).await.unwrap();
    let replay = handle.frame().replay.unwrap();
    assert!(replay.playing);
    assert_eq!(replay.cursor, 0);

    handle.unmount().await.unwrap();
}
