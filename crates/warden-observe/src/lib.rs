//! Warden Observability
//!
//! This crate provides observability for the Warden authorization engine:
//!
//! - [`EventDispatcher`]: fan-out of [`AuthzEvent`]s to subscribers
//! - [`LoggingSubscriber`]: forwards events to `tracing`
//! - [`MetricsCollector`] and [`MetricsSubscriber`]: compile, decision and
//!   cache counters
//!
//! # Event Subscription
//!
//! ```ignore
//! use std::sync::Arc;
//! use warden_observe::{EventDispatcher, LoggingSubscriber, MetricsCollector, MetricsSubscriber};
//!
//! let metrics = Arc::new(MetricsCollector::new());
//! let dispatcher = EventDispatcher::new();
//! dispatcher.subscribe(Arc::new(LoggingSubscriber::new()));
//! dispatcher.subscribe(Arc::new(MetricsSubscriber::new(Arc::clone(&metrics))));
//!
//! // ... hand the dispatcher to the compiler ...
//!
//! println!("{:?}", metrics.snapshot().decisions);
//! ```

pub mod events;
pub mod metrics;

// Re-export main types
pub use events::{
    AbilityId, AuthzEvent, CollectingSubscriber, EventDispatcher, EventSubscriber,
    LoggingSubscriber,
};
pub use metrics::{
    ActionDecisions, CacheMetrics, CompileMetrics, DecisionMetrics, MetricsCollector,
    MetricsSnapshot, MetricsSubscriber,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::events::{AbilityId, AuthzEvent, EventDispatcher, EventSubscriber};
    pub use crate::metrics::{MetricsCollector, MetricsSnapshot, MetricsSubscriber};
}
