//! # campus-core
//!
//! Foundation types for the Campus real-time sync layer.
//!
//! This crate provides the shared vocabulary the sync crates depend on:
//!
//! - **Messages**: [`SyncMessage`] — the tagged push-message union, plus
//!   [`parse_frame`] for the inbound wire boundary
//! - **Records**: [`ActivityRecord`] — the REST shape of an active lesson
//!   activity, with its [`ActiveEnvelope`] wrapper
//! - **Backoff**: [`ReconnectConfig`] and the exponential-delay math used
//!   by the reconnect policy
//!
//! Everything here is portable and sync-only; the async machinery lives in
//! `campus-sync`.

#![deny(unsafe_code)]

pub mod backoff;
pub mod messages;
pub mod records;

pub use backoff::{ReconnectConfig, calculate_backoff_delay, calculate_backoff_delay_with_random};
pub use messages::{MessageParseError, PlanStatus, SyncMessage, parse_frame};
pub use records::{ActiveEnvelope, ActivityRecord};
