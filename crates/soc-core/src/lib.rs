//! # soc-core
//!
//! Shared types for the SOC platform's tamper-evident audit chain and
//! LLM tier model: [`AuditRecord`], [`ChainState`], hashing primitives,
//! and the static [`ModelTier`] capability registry.
//!
//! ## Quick Start
//!
//! ```rust
//! use soc_core::{AuditRecord, ChainState, chain_event, verify_chain};
//!
//! let genesis = AuditRecord::genesis("tenant-a");
//! let chain = ChainState::from_genesis(&genesis);
//! let (valid, errors) = verify_chain(&[genesis]);
//! assert!(valid);
//! assert!(errors.is_empty());
//! ```

pub mod chain;
pub mod error;
pub mod record;
pub mod tier;

pub use chain::{chain_event, compute_record_hash, verify_chain, ChainState};
pub use error::ChainError;
pub use record::{ActorType, AuditRecord, EventCategory, Severity, Signature, GENESIS_HASH};
pub use tier::{ModelConfig, ModelTier};
