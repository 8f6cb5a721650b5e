/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Health monitoring for board synchronization.
//!
//! A [`Monitor`] aggregates the [events](crate::events) published by the board store and by
//! observers into counters, sample windows, and a log of desync events, and raises [alerts](Alert)
//! when aggregates cross static [thresholds](Thresholds). Components reach the monitor through a
//! cloneable [`MonitorHandle`], usually wrapped in an
//! [`EventPublisher`](crate::events::EventPublisher).
//!
//! ## Evaluation
//!
//! Critical alerts about desync frequency are checked every time a desync event is recorded, and
//! again on every periodic evaluation. Threshold alerts over sample windows are only checked on
//! periodic evaluation, which runs on the monitor's own thread between [`Monitor::start`] and
//! [`Monitor::stop`].

pub mod alerts;

pub mod desync_log;

pub mod metric_window;

pub mod monitor;

pub use alerts::{Alert, AlertKind, Thresholds};
pub use desync_log::{DesyncEvent, DesyncKind};
pub use metric_window::{MetricWindow, WindowStats};
pub use monitor::{Counters, Monitor, MonitorConfiguration, MonitorHandle, MonitorReport, Signal};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}
