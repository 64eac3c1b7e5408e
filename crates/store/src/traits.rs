use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::StoreResult;
use crate::model::{Followup, FollowupStatus, ScheduleRule, SubscriptionStatus, Template, User};

/// Fields for a fresh user row. The full signup/verification flow lives in
/// the outer shell; the core only needs enough of a `User` to exercise the
/// Write API and Scheduler Loop in tests and in the conformance suite.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub mail_token: Option<String>,
    pub subscription_status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields for a fresh followup row. `created_at` is supplied by the caller
/// (the Clock component) rather than taken from the backend's own clock, so
/// tests can drive deterministic timestamps.
#[derive(Debug, Clone)]
pub struct NewFollowup {
    pub user_id: i64,
    pub client_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub followup_type: String,
    pub description: Option<String>,
    pub status: FollowupStatus,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewActivityLogEntry {
    pub user_id: i64,
    pub followup_id: Option<i64>,
    pub action: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Partial update for a followup row. Every field is `Option<Option<T>>`
/// where the outer `Option` means "touch this column" and the inner one is
/// the new value (so a column can be explicitly nulled).
#[derive(Debug, Clone, Default)]
pub struct FollowupUpdate {
    pub client_name: Option<String>,
    pub email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub followup_type: Option<String>,
    pub description: Option<Option<String>>,
    pub message_override: Option<Option<String>>,
    pub status: Option<FollowupStatus>,
    pub due_date: Option<Option<NaiveDate>>,
    pub schedule: Option<Option<ScheduleRule>>,
    pub next_send_at: Option<Option<DateTime<Utc>>>,
    pub replied_at: Option<Option<DateTime<Utc>>>,
}

/// Durable persistence contract for the domain. Implementations must keep
/// the "has ever sent" guard on rule installs atomic within the backend
/// (single statement, not read-then-write from the caller's side), and
/// commit multi-column transitions (status + counters + timestamps
/// together) as one unit.
#[async_trait]
pub trait FollowupStore: Send + Sync {
    async fn insert_user(&self, new: NewUser) -> StoreResult<i64>;
    async fn get_user(&self, user_id: i64) -> StoreResult<User>;
    async fn set_user_mail_token(&self, user_id: i64, token: Option<String>) -> StoreResult<bool>;
    async fn list_user_ids(&self) -> StoreResult<Vec<i64>>;
    async fn get_user_template(&self, user_id: i64) -> StoreResult<Option<Template>>;

    async fn insert_followup(&self, new: NewFollowup) -> StoreResult<i64>;
    async fn get_followup(&self, id: i64, user_id: i64) -> StoreResult<Followup>;
    async fn find_followup_by_email(&self, user_id: i64, email: &str) -> StoreResult<Followup>;
    async fn find_followup_by_phone(&self, user_id: i64, phone: &str) -> StoreResult<Followup>;
    async fn update_followup(
        &self,
        id: i64,
        user_id: i64,
        patch: FollowupUpdate,
    ) -> StoreResult<bool>;
    /// Deletes child `activity_logs` rows for this followup before the row
    /// itself, satisfying referential integrity without relying on
    /// `ON DELETE CASCADE`.
    async fn delete_followup(&self, id: i64, user_id: i64) -> StoreResult<bool>;

    /// Installs a rule only if the row is neither finalized nor has ever
    /// sent, in one atomic statement. Returns `false` (no rows affected)
    /// if the guard fails — the caller maps that to `AlreadyFinalized`.
    async fn set_schedule_rule_guarded(
        &self,
        id: i64,
        user_id: i64,
        rule: ScheduleRule,
        next_send_at: DateTime<Utc>,
        due_date: Option<NaiveDate>,
    ) -> StoreResult<bool>;

    /// Same guard, applied to a set of ids; returns the count actually
    /// affected (finalized/ever-sent ids among `ids` are silently skipped).
    async fn bulk_set_schedule_rule_guarded(
        &self,
        user_id: i64,
        ids: &[i64],
        rule: ScheduleRule,
        next_send_at: DateTime<Utc>,
        due_date: Option<NaiveDate>,
    ) -> StoreResult<i64>;

    /// `enabled=1 AND next_send_at <= now AND status IN (pending, scheduled)`,
    /// ordered `next_send_at ASC`, capped at `limit`.
    async fn get_due_scheduled(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<Followup>>;

    async fn set_status_running(
        &self,
        id: i64,
        user_id: i64,
        attempted_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn mark_send_success_once(
        &self,
        id: i64,
        user_id: i64,
        sent_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn mark_send_success_repeat(
        &self,
        id: i64,
        user_id: i64,
        next_send_at: DateTime<Utc>,
        sent_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn mark_send_failed(
        &self,
        id: i64,
        user_id: i64,
        error: &str,
        attempted_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Sweeps `once` items past the grace cutoff into `passed`. Returns the
    /// count swept.
    async fn mark_schedule_passed(
        &self,
        user_id: i64,
        grace_cutoff: DateTime<Utc>,
    ) -> StoreResult<i64>;

    /// Sweeps crash-orphaned `running` rows (`last_attempt_at < older_than`)
    /// to `failed`. Global, not per-user — orphans outlive any one tick's
    /// user loop.
    async fn sweep_crash_orphans(&self, older_than: DateTime<Utc>) -> StoreResult<i64>;

    async fn insert_activity_log(&self, entry: NewActivityLogEntry) -> StoreResult<i64>;
    async fn insert_notification(
        &self,
        user_id: i64,
        message: &str,
        created_at: DateTime<Utc>,
    ) -> StoreResult<i64>;
}
