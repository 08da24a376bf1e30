//! Dashboard error type.

use shiptrack_core::generator::TimeRange;
use shiptrack_data::ConfigError;
use shiptrack_milestones::MilestoneError;

use crate::dashboard::Lifecycle;

/// Errors returned by dashboard lifecycle calls and controls.
///
/// Ticks themselves never fail; only calls that make no sense in the
/// current lifecycle state or mode are rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DashboardError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid milestone table: {0}")]
    Milestones(#[from] MilestoneError),

    #[error("dashboard is {state:?}, expected {expected:?}")]
    Lifecycle {
        state: Lifecycle,
        expected: Lifecycle,
    },

    #[error("{control} is only available in replay mode (current mode: {mode})")]
    ReplayOnly {
        control: &'static str,
        mode: TimeRange,
    },

    #[error("speed must be a finite value in (0, {max}], got {speed}")]
    InvalidSpeed { speed: f64, max: f64 },

    #[error("logging already initialised or invalid: {0}")]
    Logging(String),

    #[error("dashboard task has stopped")]
    Stopped,

    #[error("dashboard task failed: {0}")]
    Task(String),
}
