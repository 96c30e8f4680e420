//! `matchpoint-store` — SQLite persistence for booking templates and their
//! dated instances.
//!
//! # Overview
//!
//! Two tables: `booking_templates` (a user's reservation intent, one-shot or
//! recurring) and `booking_instances` (one row per concrete date, carrying
//! the execution lifecycle). The store is the single source of truth for
//! instance status; the execution engine mutates it exclusively through the
//! guarded transitions exposed here.
//!
//! # Lifecycle
//!
//! ```text
//! pending → processing → confirmed
//!                      → failed → pending   (retry)
//! pending → cancelled                        (user action)
//! ```
//!
//! `confirmed` and `cancelled` are terminal. The `pending → processing`
//! transition is a conditional UPDATE whose affected-row count is the only
//! concurrency guard — safe even with several engine processes polling the
//! same database.

pub mod db;
pub mod error;
pub mod instances;
pub mod store;
pub mod templates;
pub mod types;

pub use error::{Result, StoreError};
pub use store::BookingStore;
pub use types::{BookingInstance, BookingTemplate, InstanceStatus, Recurrence};
