//! Concrete record types for the domain: typed structs rather than dynamic,
//! dict-shaped rows. The persistence layer (`cadence-store`) maps columns
//! onto these fields.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account. Core never deletes these; verification happens
/// exactly once; subscription sub-state is externally driven (billing
/// webhooks live outside the core).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,

    pub verified: bool,
    pub verification_code: Option<String>,
    pub code_expires_at: Option<DateTime<Utc>>,
    pub last_code_sent_at: Option<DateTime<Utc>>,

    /// Opaque per-user transport credential. `None` means "not connected";
    /// the Scheduler Loop treats this as `TransportNotConnected`.
    pub mail_token: Option<String>,

    pub subscription_status: SubscriptionStatus,
    pub plan: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,

    pub brand_logo: String,
    pub brand_color: String,
    pub company_name: Option<String>,
    pub support_email: Option<String>,
    pub footer: Option<String>,

    pub trial_start: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,

    pub auth_provider: Option<String>,
    pub google_sub: Option<String>,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    None,
    Trialing,
    Active,
    PastDue,
    Canceled,
    Inactive,
}

impl Default for SubscriptionStatus {
    fn default() -> Self {
        Self::None
    }
}

/// Branding fields surfaced read-only to the Template Renderer's data bag.
/// Core never writes these; the branding configuration UI is out of scope.
#[derive(Debug, Clone, Default)]
pub struct Branding {
    pub company_name: Option<String>,
    pub support_email: Option<String>,
    pub footer: Option<String>,
    pub logo: Option<String>,
}

impl From<&User> for Branding {
    fn from(user: &User) -> Self {
        Self {
            company_name: user.company_name.clone(),
            support_email: user.support_email.clone(),
            footer: user.footer.clone(),
            logo: Some(user.brand_logo.clone()).filter(|s| !s.is_empty()),
        }
    }
}

/// A durable record representing one intent-to-contact a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Followup {
    pub id: i64,
    pub user_id: i64,

    pub client_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,

    pub followup_type: String,
    pub description: Option<String>,
    /// When present, bypasses templating (§4.4 override path).
    pub message_override: Option<String>,

    pub status: FollowupStatus,

    /// Unrelated manual-chase counter carried for schema compatibility. The
    /// scheduler never reads or writes it.
    pub chase_stage: i64,
    /// Carried for schema compatibility; only `"email"` is ever dispatched
    /// by this core (non-email channels are out of scope).
    pub preferred_channel: String,

    pub due_date: Option<NaiveDate>,

    pub schedule: Option<ScheduleRule>,
    /// Materialized UTC instant of the next planned send.
    pub next_send_at: Option<DateTime<Utc>>,

    pub sent_count: i64,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub replied_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Followup {
    /// Invariant: a followup in `{sent, done, deleted}`, or with
    /// `sent_count > 0`, rejects new schedule rule installs.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        matches!(
            self.status,
            FollowupStatus::Sent | FollowupStatus::Done | FollowupStatus::Deleted
        ) || self.has_ever_sent()
    }

    #[must_use]
    pub fn has_ever_sent(&self) -> bool {
        self.sent_count > 0 || self.last_sent_at.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowupStatus {
    Draft,
    Pending,
    Scheduled,
    Running,
    Sent,
    Passed,
    Failed,
    Done,
    Replied,
    Deleted,
}

impl FollowupStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Sent => "sent",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Done => "done",
            Self::Replied => "replied",
            Self::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for FollowupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FollowupStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "draft" => Self::Draft,
            "pending" => Self::Pending,
            "scheduled" => Self::Scheduled,
            "running" => Self::Running,
            "sent" => Self::Sent,
            "passed" => Self::Passed,
            "failed" => Self::Failed,
            "done" => Self::Done,
            "replied" => Self::Replied,
            "deleted" => Self::Deleted,
            other => return Err(format!("unknown followup status: {other}")),
        })
    }
}

/// The only schedule source of truth for a followup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRule {
    pub enabled: bool,
    pub repeat: Repeat,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub send_time: NaiveTime,
    /// Required iff `repeat == TwiceDaily`.
    pub send_time_2: Option<NaiveTime>,
    /// Used by `EveryNDays`; must be `>= 1`.
    pub interval: i64,
    /// Required iff `repeat == Weekday`.
    pub byweekday: Vec<Weekday>,
    /// Required iff `repeat == Relative`.
    pub rel_value: Option<i64>,
    pub rel_unit: Option<RelUnit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Repeat {
    Once,
    Daily,
    TwiceDaily,
    Weekly,
    EveryNDays,
    Weekday,
    Relative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelUnit {
    Minutes,
    Hours,
    Days,
}

/// `MO`..`SU` token set for `byweekday`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Weekday {
    Mo,
    Tu,
    We,
    Th,
    Fr,
    Sa,
    Su,
}

impl Weekday {
    #[must_use]
    pub fn from_chrono(wd: chrono::Weekday) -> Self {
        match wd {
            chrono::Weekday::Mon => Self::Mo,
            chrono::Weekday::Tue => Self::Tu,
            chrono::Weekday::Wed => Self::We,
            chrono::Weekday::Thu => Self::Th,
            chrono::Weekday::Fri => Self::Fr,
            chrono::Weekday::Sat => Self::Sa,
            chrono::Weekday::Sun => Self::Su,
        }
    }

    #[must_use]
    pub fn num_from_monday(self) -> u32 {
        match self {
            Self::Mo => 0,
            Self::Tu => 1,
            Self::We => 2,
            Self::Th => 3,
            Self::Fr => 4,
            Self::Sa => 5,
            Self::Su => 6,
        }
    }

    pub fn parse(token: &str) -> Result<Self, String> {
        Ok(match token.trim().to_uppercase().as_str() {
            "MO" => Self::Mo,
            "TU" => Self::Tu,
            "WE" => Self::We,
            "TH" => Self::Th,
            "FR" => Self::Fr,
            "SA" => Self::Sa,
            "SU" => Self::Su,
            other => return Err(format!("invalid weekday: {other:?} (use MO..SU)")),
        })
    }
}

/// Append-only activity record; used for idempotence markers and audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: i64,
    pub user_id: i64,
    pub followup_id: Option<i64>,
    pub action: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Surfaced to the user shell; never mutated except `read`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Per-user scheduler-fallback HTML template with the restricted grammar
/// from §4.4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub subject: Option<String>,
    pub html_content: String,
    pub created_at: DateTime<Utc>,
}
