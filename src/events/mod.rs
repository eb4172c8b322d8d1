//! Supervision events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by supervisors and their workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: supervisor control loops, task workers, `SubscriberSet`
//!   workers (overflow/panic).
//! - **Consumers**: one listener per supervisor that owns subscribers; it fans
//!   events out to its `SubscriberSet`. Nested supervisors without their own
//!   subscribers publish on the nearest ancestor's bus.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
