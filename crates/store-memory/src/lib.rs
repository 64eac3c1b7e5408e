//! In-process `FollowupStore` over `dashmap`. Used for unit tests, scheduler
//! integration tests, and the server's `--no-db` dev mode. Data does not
//! survive process restart.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use cadence_store::model::{Followup, FollowupStatus, ScheduleRule, Template, User};
use cadence_store::traits::{FollowupUpdate, NewActivityLogEntry, NewFollowup, NewUser};
use cadence_store::{FollowupStore, StoreError, StoreResult};
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;

#[derive(Debug, Clone)]
struct ActivityLogRow {
    id: i64,
    user_id: i64,
    followup_id: Option<i64>,
    #[allow(dead_code)]
    action: String,
    #[allow(dead_code)]
    message: Option<String>,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<i64, User>,
    followups: DashMap<i64, Followup>,
    scheduler_templates: DashMap<i64, Template>,
    activity_logs: DashMap<i64, ActivityLogRow>,
    next_user_id: AtomicI64,
    next_followup_id: AtomicI64,
    next_activity_id: AtomicI64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_user_id(&self) -> i64 {
        self.next_user_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn next_followup_id(&self) -> i64 {
        self.next_followup_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn next_activity_id(&self) -> i64 {
        self.next_activity_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn owned_followup(&self, id: i64, user_id: i64) -> StoreResult<Followup> {
        self.followups
            .get(&id)
            .filter(|f| f.user_id == user_id)
            .map(|f| f.clone())
            .ok_or(StoreError::NotFound)
    }
}

fn apply_patch(f: &mut Followup, patch: FollowupUpdate) {
    if let Some(v) = patch.client_name {
        f.client_name = v;
    }
    if let Some(v) = patch.email {
        f.email = v;
    }
    if let Some(v) = patch.phone {
        f.phone = v;
    }
    if let Some(v) = patch.followup_type {
        f.followup_type = v;
    }
    if let Some(v) = patch.description {
        f.description = v;
    }
    if let Some(v) = patch.message_override {
        f.message_override = v;
    }
    if let Some(v) = patch.status {
        f.status = v;
    }
    if let Some(v) = patch.due_date {
        f.due_date = v;
    }
    if let Some(v) = patch.schedule {
        f.schedule = v;
    }
    if let Some(v) = patch.next_send_at {
        f.next_send_at = v;
    }
    if let Some(v) = patch.replied_at {
        f.replied_at = v;
    }
}

#[async_trait]
impl FollowupStore for MemoryStore {
    async fn insert_user(&self, new: NewUser) -> StoreResult<i64> {
        let id = self.next_user_id();
        let user = User {
            id,
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            verified: false,
            verification_code: None,
            code_expires_at: None,
            last_code_sent_at: None,
            mail_token: new.mail_token,
            subscription_status: new.subscription_status,
            plan: None,
            current_period_end: None,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            brand_logo: String::new(),
            brand_color: "#36A2EB".into(),
            company_name: None,
            support_email: None,
            footer: None,
            trial_start: None,
            trial_end: None,
            auth_provider: None,
            google_sub: None,
            created_at: new.created_at,
        };
        self.users.insert(id, user);
        Ok(id)
    }

    async fn get_user(&self, user_id: i64) -> StoreResult<User> {
        self.users
            .get(&user_id)
            .map(|u| u.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn set_user_mail_token(&self, user_id: i64, token: Option<String>) -> StoreResult<bool> {
        match self.users.get_mut(&user_id) {
            Some(mut u) => {
                u.mail_token = token;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_user_ids(&self) -> StoreResult<Vec<i64>> {
        Ok(self.users.iter().map(|e| *e.key()).collect())
    }

    async fn get_user_template(&self, user_id: i64) -> StoreResult<Option<Template>> {
        Ok(self.scheduler_templates.get(&user_id).map(|t| t.clone()))
    }

    async fn insert_followup(&self, new: NewFollowup) -> StoreResult<i64> {
        let id = self.next_followup_id();
        let followup = Followup {
            id,
            user_id: new.user_id,
            client_name: new.client_name,
            email: new.email,
            phone: new.phone,
            followup_type: new.followup_type,
            description: new.description,
            message_override: None,
            status: new.status,
            chase_stage: 0,
            preferred_channel: "email".into(),
            due_date: new.due_date,
            schedule: None,
            next_send_at: None,
            sent_count: 0,
            last_sent_at: None,
            last_attempt_at: None,
            last_error: None,
            replied_at: None,
            created_at: new.created_at,
        };
        self.followups.insert(id, followup);
        Ok(id)
    }

    async fn get_followup(&self, id: i64, user_id: i64) -> StoreResult<Followup> {
        self.owned_followup(id, user_id)
    }

    async fn find_followup_by_email(&self, user_id: i64, email: &str) -> StoreResult<Followup> {
        self.followups
            .iter()
            .find(|e| e.user_id == user_id && e.email.as_deref() == Some(email))
            .map(|e| e.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn find_followup_by_phone(&self, user_id: i64, phone: &str) -> StoreResult<Followup> {
        self.followups
            .iter()
            .find(|e| e.user_id == user_id && e.phone.as_deref() == Some(phone))
            .map(|e| e.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn update_followup(
        &self,
        id: i64,
        user_id: i64,
        patch: FollowupUpdate,
    ) -> StoreResult<bool> {
        match self.followups.get_mut(&id) {
            Some(mut f) if f.user_id == user_id => {
                apply_patch(&mut f, patch);
                Ok(true)
            }
            Some(_) | None => Ok(false),
        }
    }

    async fn delete_followup(&self, id: i64, user_id: i64) -> StoreResult<bool> {
        let owned = self
            .followups
            .get(&id)
            .is_some_and(|f| f.user_id == user_id);
        if !owned {
            return Ok(false);
        }
        let orphan_ids: Vec<i64> = self
            .activity_logs
            .iter()
            .filter(|e| e.followup_id == Some(id))
            .map(|e| e.id)
            .collect();
        for log_id in orphan_ids {
            self.activity_logs.remove(&log_id);
        }
        self.followups.remove(&id);
        Ok(true)
    }

    async fn set_schedule_rule_guarded(
        &self,
        id: i64,
        user_id: i64,
        rule: ScheduleRule,
        next_send_at: DateTime<Utc>,
        due_date: Option<NaiveDate>,
    ) -> StoreResult<bool> {
        match self.followups.get_mut(&id) {
            Some(mut f) if f.user_id == user_id => {
                if f.is_finalized() {
                    return Ok(false);
                }
                f.schedule = Some(rule);
                f.next_send_at = Some(next_send_at);
                f.status = FollowupStatus::Scheduled;
                if f.due_date.is_none() {
                    f.due_date = due_date;
                }
                Ok(true)
            }
            Some(_) | None => Ok(false),
        }
    }

    async fn bulk_set_schedule_rule_guarded(
        &self,
        user_id: i64,
        ids: &[i64],
        rule: ScheduleRule,
        next_send_at: DateTime<Utc>,
        due_date: Option<NaiveDate>,
    ) -> StoreResult<i64> {
        let mut affected = 0;
        for &id in ids {
            if self
                .set_schedule_rule_guarded(id, user_id, rule.clone(), next_send_at, due_date)
                .await?
            {
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn get_due_scheduled(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<Followup>> {
        let mut due: Vec<Followup> = self
            .followups
            .iter()
            .filter(|e| {
                e.user_id == user_id
                    && matches!(e.status, FollowupStatus::Pending | FollowupStatus::Scheduled)
                    && e.schedule.as_ref().is_some_and(|r| r.enabled)
                    && e.next_send_at.is_some_and(|t| t <= now)
            })
            .map(|e| e.clone())
            .collect();
        due.sort_by_key(|f| f.next_send_at);
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn set_status_running(
        &self,
        id: i64,
        user_id: i64,
        attempted_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        match self.followups.get_mut(&id) {
            Some(mut f) if f.user_id == user_id => {
                f.status = FollowupStatus::Running;
                f.last_attempt_at = Some(attempted_at);
                Ok(true)
            }
            Some(_) | None => Ok(false),
        }
    }

    async fn mark_send_success_once(
        &self,
        id: i64,
        user_id: i64,
        sent_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        match self.followups.get_mut(&id) {
            Some(mut f) if f.user_id == user_id => {
                f.status = FollowupStatus::Sent;
                f.sent_count += 1;
                f.last_sent_at = Some(sent_at);
                f.next_send_at = None;
                if let Some(rule) = f.schedule.as_mut() {
                    rule.enabled = false;
                }
                Ok(true)
            }
            Some(_) | None => Ok(false),
        }
    }

    async fn mark_send_success_repeat(
        &self,
        id: i64,
        user_id: i64,
        next_send_at: DateTime<Utc>,
        sent_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        match self.followups.get_mut(&id) {
            Some(mut f) if f.user_id == user_id => {
                f.status = FollowupStatus::Scheduled;
                f.sent_count += 1;
                f.last_sent_at = Some(sent_at);
                f.next_send_at = Some(next_send_at);
                Ok(true)
            }
            Some(_) | None => Ok(false),
        }
    }

    async fn mark_send_failed(
        &self,
        id: i64,
        user_id: i64,
        error: &str,
        attempted_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        match self.followups.get_mut(&id) {
            Some(mut f) if f.user_id == user_id => {
                f.status = FollowupStatus::Failed;
                f.last_error = Some(error.to_string());
                f.last_attempt_at = Some(attempted_at);
                Ok(true)
            }
            Some(_) | None => Ok(false),
        }
    }

    async fn mark_schedule_passed(
        &self,
        user_id: i64,
        grace_cutoff: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let mut swept = 0;
        for mut entry in self.followups.iter_mut() {
            let f = entry.value_mut();
            if f.user_id != user_id {
                continue;
            }
            let once = f
                .schedule
                .as_ref()
                .is_some_and(|r| r.repeat == cadence_store::model::Repeat::Once);
            if f.status == FollowupStatus::Scheduled
                && once
                && !f.has_ever_sent()
                && f.next_send_at.is_some_and(|t| t < grace_cutoff)
            {
                f.status = FollowupStatus::Passed;
                swept += 1;
            }
        }
        Ok(swept)
    }

    async fn sweep_crash_orphans(&self, older_than: DateTime<Utc>) -> StoreResult<i64> {
        let mut swept = 0;
        for mut entry in self.followups.iter_mut() {
            let f = entry.value_mut();
            if f.status == FollowupStatus::Running
                && f.last_attempt_at.is_some_and(|t| t < older_than)
            {
                f.status = FollowupStatus::Failed;
                f.last_error =
                    Some("recovered: running longer than 2x tick interval".to_string());
                swept += 1;
            }
        }
        Ok(swept)
    }

    async fn insert_activity_log(&self, entry: NewActivityLogEntry) -> StoreResult<i64> {
        let id = self.next_activity_id();
        self.activity_logs.insert(
            id,
            ActivityLogRow {
                id,
                user_id: entry.user_id,
                followup_id: entry.followup_id,
                action: entry.action,
                message: entry.message,
                created_at: entry.created_at,
            },
        );
        Ok(id)
    }

    async fn insert_notification(
        &self,
        _user_id: i64,
        _message: &str,
        _created_at: DateTime<Utc>,
    ) -> StoreResult<i64> {
        // Notifications are a UI-facing side-channel the core never reads
        // back; the memory backend accepts writes without materializing a
        // queryable table, matching this crate's test/dev-mode scope.
        Ok(self.next_activity_id())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use cadence_store::testing::run_store_conformance_tests;

    #[tokio::test]
    async fn conforms_to_the_shared_store_suite() {
        let store = MemoryStore::new();
        run_store_conformance_tests(&store).await.unwrap();
    }
}
