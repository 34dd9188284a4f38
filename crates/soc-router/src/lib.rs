//! # soc-router
//!
//! Task-to-tier LLM routing: a fixed task-type table, a five-step
//! override chain (time budget, severity, context size, low-confidence
//! escalation), a capability guard that demotes or promotes the
//! selected model, and an hourly-budgeted escalation manager.
//!
//! ## Quick Start
//!
//! ```rust
//! use soc_router::{route, TaskContext, TaskType};
//!
//! let ctx = TaskContext::new(TaskType::Investigation);
//! let decision = route(&ctx).unwrap();
//! println!("routed to {:?}: {}", decision.tier, decision.reason);
//! ```

pub mod error;
pub mod escalation;
pub mod router;

pub use error::RouterError;
pub use escalation::{EscalationManager, EscalationPolicy};
pub use router::{route, route_with_health, tier_rank, Capability, RoutingDecision, TaskContext, TaskType};
pub use soc_core::ModelTier;
