use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// How often a template repeats.
///
/// `Monthly` is a fixed 30-day stride, not calendar-month arithmetic — the
/// upstream product behaviour, kept as-is pending product confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    Once,
    Weekly,
    Biweekly,
    Monthly,
}

impl Recurrence {
    /// Days between consecutive instances; `None` for one-shot templates.
    pub fn stride_days(&self) -> Option<i64> {
        match self {
            Recurrence::Once => None,
            Recurrence::Weekly => Some(7),
            Recurrence::Biweekly => Some(14),
            Recurrence::Monthly => Some(30),
        }
    }
}

impl std::fmt::Display for Recurrence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Recurrence::Once => "once",
            Recurrence::Weekly => "weekly",
            Recurrence::Biweekly => "biweekly",
            Recurrence::Monthly => "monthly",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Recurrence {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "once" => Ok(Recurrence::Once),
            "weekly" => Ok(Recurrence::Weekly),
            "biweekly" => Ok(Recurrence::Biweekly),
            "monthly" => Ok(Recurrence::Monthly),
            other => Err(format!("unknown recurrence: {other}")),
        }
    }
}

/// Execution lifecycle state of a booking instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Waiting for its scheduled execute time.
    Pending,
    /// Claimed by an engine; submission in flight.
    Processing,
    /// Portal accepted the reservation.
    Confirmed,
    /// Gave up — permanent error or retry cap reached.
    Failed,
    /// Withdrawn by the user (or via template cancellation). Terminal.
    Cancelled,
}

impl InstanceStatus {
    /// Terminal states never re-enter the scheduling loop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstanceStatus::Confirmed | InstanceStatus::Cancelled)
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InstanceStatus::Pending => "pending",
            InstanceStatus::Processing => "processing",
            InstanceStatus::Confirmed => "confirmed",
            InstanceStatus::Failed => "failed",
            InstanceStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for InstanceStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InstanceStatus::Pending),
            "processing" => Ok(InstanceStatus::Processing),
            "confirmed" => Ok(InstanceStatus::Confirmed),
            "failed" => Ok(InstanceStatus::Failed),
            "cancelled" => Ok(InstanceStatus::Cancelled),
            other => Err(format!("unknown instance status: {other}")),
        }
    }
}

/// A user's reservation intent: book this slot once, or on a cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingTemplate {
    /// UUID v4 string — primary key.
    pub id: String,
    /// Owning user (opaque to this engine).
    pub owner_id: String,
    /// Court the user wants, e.g. `"court-2"`. `None` means no preference.
    pub preferred_unit: Option<String>,
    /// Substitute an equivalent free court when the preferred one is taken.
    pub accept_any_unit: bool,
    /// First (or only) target date.
    pub date: NaiveDate,
    /// Desired start time, portal-local.
    pub time_of_day: NaiveTime,
    /// Party composition the portal asks for, e.g. `"doubles"`.
    pub party_type: String,
    pub party_size: u32,
    pub duration_minutes: u32,
    pub recurrence: Recurrence,
    /// Last date a recurring template may generate; open-ended when `None`
    /// (expansion then stops at the safety cap).
    pub recurrence_end: Option<NaiveDate>,
    /// Cleared when the user cancels the template.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One concrete, dated occurrence derived from a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingInstance {
    /// UUID v4 string — primary key.
    pub id: String,
    /// Parent template; `None` for instances created outside expansion.
    pub template_id: Option<String>,
    /// The date being reserved.
    pub date: NaiveDate,
    /// When the engine should attempt the submission (UTC). Always before
    /// `date` itself — the portal's booking window opens `W` days ahead.
    pub scheduled_execute_time: DateTime<Utc>,
    pub status: InstanceStatus,
    /// Transient-failure attempts so far. Monotone; reset only by an
    /// explicit user retry.
    pub retry_count: u32,
    /// Portal confirmation id, set on success.
    pub confirmation_id: Option<String>,
    /// Most specific failure reason recorded so far, for user display.
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
