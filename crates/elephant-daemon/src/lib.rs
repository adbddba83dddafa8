//! The elephant service backbone.
//!
//! One long-running process multiplexes heterogeneous providers behind a
//! framed Unix-domain-socket protocol. Front-ends query, activate,
//! inspect state, and subscribe; providers only implement the
//! [`Provider`](elephant_core::Provider) contract.
//!
//! # Task model
//!
//! ```text
//! accept loop ──► connection reader task (one per connection)
//!                     │  per decoded frame
//!                     ▼
//!                handler task (query / activate / state / subscribe / menu)
//!
//! Subscriptions ──► interval ticker task (one per interval subscription)
//!               └─► event router task (exactly one)
//! ```
//!
//! All response writes funnel through the connection's
//! [`ConnectionWriter`](elephant_proto::ConnectionWriter), so concurrent
//! handlers never interleave frame bytes.

use std::sync::Arc;

use elephant_core::Registry;

pub mod handlers;
pub mod providers;
pub mod server;
pub mod subscriptions;

pub use server::{Server, ServerConfig};
pub use subscriptions::Subscriptions;

/// The service root: everything handlers need, owned in one place.
///
/// Built once in `main` (or a test harness) and shared immutably; there
/// are no process-wide singletons.
pub struct Service {
    pub registry: Arc<Registry>,
    pub subscriptions: Arc<Subscriptions>,
}

impl Service {
    #[must_use]
    pub fn new(registry: Arc<Registry>, subscriptions: Arc<Subscriptions>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            subscriptions,
        })
    }
}
