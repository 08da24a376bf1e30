//! The order-tracker dashboard session.
//!
//! [`Dashboard`] wires the generator, buffers, aggregator and milestone
//! tracker to one explicit scheduler and to injected sound and effects
//! services. It can be stepped by hand (`advance`) or run on a tokio task
//! through [`driver::spawn`].

pub mod dashboard;
pub mod driver;
pub mod error;
pub mod event;
pub mod frame;
pub mod logging;
pub mod services;

pub use dashboard::{Dashboard, Lifecycle};
pub use driver::{Command, DashboardHandle, spawn};
pub use error::DashboardError;
pub use event::{DashboardEvent, EventLog, TimedEvent};
pub use frame::{Frame, ReplayStatus};
pub use services::{
    EffectsEngine, LoggedEffects, LoggedSound, Recorder, ServiceCall, Services, Silent, Sound,
    SoundEngine,
};
