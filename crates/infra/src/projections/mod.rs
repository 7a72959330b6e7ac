//! Projection implementations (read model builders).
//!
//! Projections consume published envelopes and build query-optimized read
//! models. All projections are:
//! - **Rebuildable**: can be reconstructed by replaying published events
//! - **Idempotent**: safe for at-least-once delivery

pub mod account_activity;

pub use account_activity::{AccountActivity, AccountActivityProjection, ActivityProjectionError};
