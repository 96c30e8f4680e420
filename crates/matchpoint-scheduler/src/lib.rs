//! `matchpoint-scheduler` — recurrence expansion, execute-time calculation
//! and the polling execution engine.
//!
//! # Overview
//!
//! Templates arrive through [`intake::register_template`], which validates
//! them, expands the recurrence rule into dated instances and computes when
//! each instance becomes eligible — the portal only opens bookings `W` days
//! ahead, so an instance for date `D` is scheduled at `(D − W)` at the
//! window-open time.
//!
//! The [`engine::ExecutionEngine`] then polls the store on a fixed interval
//! and, for every due instance, performs the atomic `pending → processing`
//! claim before handing it to a [`engine::SubmissionExecutor`] (the portal
//! client in production, fakes in tests). Outcomes are reconciled back into
//! the store with a capped exponential retry policy.
//!
//! # Recurrence rules
//!
//! | Rule       | Stride                                            |
//! |------------|---------------------------------------------------|
//! | `once`     | single instance                                   |
//! | `weekly`   | +7 days                                           |
//! | `biweekly` | +14 days                                          |
//! | `monthly`  | +30 days (fixed stride, not calendar-month aware) |

pub mod engine;
pub mod error;
pub mod intake;
pub mod recurrence;
pub mod retry;
pub mod window;

pub use engine::{ExecutionEngine, SubmissionExecutor, SubmissionOutcome};
pub use error::{EngineError, Result, ValidationError};
pub use intake::TemplateIntake;
pub use retry::RetryPolicy;
pub use window::{BookingWindow, ExecuteTime};
