//! One execution of the scheduler loop: crash-orphan sweep, per-user due-item
//! processing, then a per-user `passed` sweep.

use cadence_core::compiler;
use cadence_core::model::{Followup, Repeat, ScheduleRule, User};
use cadence_core::state_machine;
use cadence_email::EmailBackend;
use cadence_store::traits::FollowupStore;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use cadence_template::{render_override, render_template, TemplateData, DEFAULT_SCHEDULER_TEMPLATE};

use crate::config::SchedulerConfig;

/// Per-tick tally, returned so callers (tests, the runner's logging) can
/// observe what happened without re-querying the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub sent: u64,
    pub failed: u64,
    pub passed: u64,
    pub crash_orphans_recovered: u64,
}

/// Runs one tick: crash-orphan sweep, then per-user due-item processing,
/// then per-user `passed` sweep. A `StoreError` while listing users or
/// fetching a user's due items aborts that user's slice only; the tick
/// continues with the next user.
pub async fn run_tick(
    store: &dyn FollowupStore,
    transport: &dyn EmailBackend,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> TickReport {
    let mut report = TickReport::default();

    match store
        .sweep_crash_orphans(now - config.crash_orphan_threshold())
        .await
    {
        Ok(n) if n > 0 => {
            warn!(count = n, "recovered crash-orphaned running followups");
            report.crash_orphans_recovered = n as u64;
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "crash-orphan sweep failed"),
    }

    let user_ids = match store.list_user_ids().await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!(error = %e, "tick aborted: could not list users");
            return report;
        }
    };

    for user_id in user_ids {
        let user = match store.get_user(user_id).await {
            Ok(u) => u,
            Err(e) => {
                warn!(user_id, error = %e, "skipping user: could not load user row");
                continue;
            }
        };

        let due = match store
            .get_due_scheduled(user_id, now, config.due_item_cap())
            .await
        {
            Ok(items) => items,
            Err(e) => {
                warn!(user_id, error = %e, "skipping user: could not fetch due items");
                continue;
            }
        };

        if !due.is_empty() {
            debug!(user_id, count = due.len(), "processing due followups");
        }

        for followup in due {
            match process_one(store, transport, &user, &followup, now, config).await {
                Outcome::Sent => report.sent += 1,
                Outcome::Failed => report.failed += 1,
            }
        }

        let grace_cutoff = now - config.passed_sweep_grace();
        match store.mark_schedule_passed(user_id, grace_cutoff).await {
            Ok(n) if n > 0 => {
                info!(user_id, count = n, "swept stale once-schedules to passed");
                report.passed += n as u64;
            }
            Ok(_) => {}
            Err(e) => warn!(user_id, error = %e, "passed sweep failed"),
        }
    }

    report
}

enum Outcome {
    Sent,
    Failed,
}

async fn process_one(
    store: &dyn FollowupStore,
    transport: &dyn EmailBackend,
    user: &User,
    followup: &Followup,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> Outcome {
    let fid = followup.id;
    let uid = user.id;

    let credential = user.mail_token.as_deref().filter(|t| !t.trim().is_empty());
    if credential.is_none() {
        if let Err(e) = store
            .mark_send_failed(fid, uid, "Transport not connected", now)
            .await
        {
            warn!(followup_id = fid, user_id = uid, error = %e, "failed to record TransportNotConnected");
        }
        return Outcome::Failed;
    }

    // Best-effort scheduled -> running transition. Guard failure is logged,
    // never fatal: a send attempt still proceeds.
    if let Err(e) = state_machine::pickup(followup, now) {
        debug!(followup_id = fid, user_id = uid, error = %e, "pickup guard did not hold");
    }
    if let Err(e) = store.set_status_running(fid, uid, now).await {
        warn!(followup_id = fid, user_id = uid, error = %e, "set_status_running failed");
    }

    let Some(to_email) = followup.email.as_deref().filter(|e| !e.trim().is_empty()) else {
        record_failure(store, fid, uid, "Missing recipient email", now).await;
        return Outcome::Failed;
    };

    let html = render_body(store, user, followup).await;
    let subject = format!(
        "Follow-up: {}",
        if followup.followup_type.trim().is_empty() {
            "follow-up"
        } else {
            followup.followup_type.trim()
        }
    );

    let send_result = transport.send(credential, to_email, &subject, &html).await;

    match send_result {
        Ok(_message_id) => {
            finish_success(store, followup, now, config).await;
            Outcome::Sent
        }
        Err(e) => {
            record_failure(store, fid, uid, &e.to_string(), now).await;
            Outcome::Failed
        }
    }
}

async fn render_body(store: &dyn FollowupStore, user: &User, followup: &Followup) -> String {
    if let Some(override_text) = followup.message_override.as_deref() {
        if !override_text.trim().is_empty() {
            return render_override(override_text);
        }
    }

    let template_source = match store.get_user_template(user.id).await {
        Ok(Some(t)) => t.html_content,
        Ok(None) => DEFAULT_SCHEDULER_TEMPLATE.to_string(),
        Err(e) => {
            warn!(user_id = user.id, error = %e, "could not load user template, using default");
            DEFAULT_SCHEDULER_TEMPLATE.to_string()
        }
    };

    let data = TemplateData {
        name: Some(followup.client_name.clone()),
        r#type: Some(followup.followup_type.clone()),
        description: followup.description.clone(),
        sender: user.company_name.clone(),
        company_name: user.company_name.clone(),
        due_date: followup.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
        brand_logo: Some(user.brand_logo.clone()).filter(|s| !s.is_empty()),
        support_email: user.support_email.clone(),
        footer: user.footer.clone(),
        content: None,
    };

    render_template(&template_source, data)
}

async fn finish_success(
    store: &dyn FollowupStore,
    followup: &Followup,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) {
    let fid = followup.id;
    let uid = followup.user_id;

    let Some(rule) = followup.schedule.clone() else {
        warn!(followup_id = fid, user_id = uid, "sent followup had no schedule rule");
        let _ = store.mark_send_failed(fid, uid, "missing schedule rule after send", now).await;
        return;
    };

    if rule.repeat == Repeat::Once {
        if let Err(e) = store.mark_send_success_once(fid, uid, now).await {
            warn!(followup_id = fid, user_id = uid, error = %e, "mark_send_success_once failed");
        }
        return;
    }

    let next_send_at = recompute_next(&rule, followup, now, config.input_tz);
    let next_send_at = clamp_loop_level(next_send_at, now);

    if let Err(e) = store
        .mark_send_success_repeat(fid, uid, next_send_at, now)
        .await
    {
        warn!(followup_id = fid, user_id = uid, error = %e, "mark_send_success_repeat failed");
    }
}

/// Re-arm floor date: `start_date` or `next_send_at`'s date or today, in
/// that order. `next_send_at`'s date is read back through `input_tz` since
/// the civil day it falls on is what matters for the next occurrence, not
/// the UTC instant's date.
fn recompute_next(
    rule: &ScheduleRule,
    followup: &Followup,
    now: DateTime<Utc>,
    input_tz: Tz,
) -> DateTime<Utc> {
    let floor_date = rule.start_date.or_else(|| {
        followup
            .next_send_at
            .map(|t| t.with_timezone(&input_tz).date_naive())
    });
    let floor_date = floor_date.unwrap_or_else(|| now.with_timezone(&input_tz).date_naive());

    let mut rearmed = rule.clone();
    rearmed.start_date = Some(floor_date);

    match compiler::compile(&rearmed, now, input_tz) {
        Ok(dt) => dt,
        Err(e) => {
            warn!(error = %e, "re-arm compile failed, falling back to now + 60s");
            now + chrono::Duration::seconds(60)
        }
    }
}

/// Independent 60-second safety net applied on top of whatever the compiler
/// already guaranteed — belt and suspenders, not a correctness dependency.
fn clamp_loop_level(next_send_at: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if next_send_at <= now {
        now + chrono::Duration::seconds(60)
    } else {
        next_send_at
    }
}

async fn record_failure(store: &dyn FollowupStore, fid: i64, uid: i64, error: &str, now: DateTime<Utc>) {
    if let Err(e) = store.mark_send_failed(fid, uid, error, now).await {
        warn!(followup_id = fid, user_id = uid, error = %e, "mark_send_failed failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cadence_email::TransportError;
    use cadence_store::model::{FollowupStatus, RelUnit, SubscriptionStatus, Weekday};
    use cadence_store::traits::{NewFollowup, NewUser};
    use cadence_store_memory::MemoryStore;
    use chrono::{NaiveTime, TimeZone};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct FakeTransport {
        succeed: AtomicBool,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl FakeTransport {
        fn new(succeed: bool) -> Self {
            Self {
                succeed: AtomicBool::new(succeed),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EmailBackend for FakeTransport {
        async fn send(
            &self,
            _credential: Option<&str>,
            to: &str,
            subject: &str,
            _html_body: &str,
        ) -> Result<String, TransportError> {
            self.calls
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string()));
            if self.succeed.load(Ordering::SeqCst) {
                Ok("msg-1".into())
            } else {
                Err(TransportError::new("simulated failure"))
            }
        }
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig::new(30, "UTC".parse().unwrap()).unwrap()
    }

    async fn seed_user(store: &MemoryStore, token: Option<&str>) -> i64 {
        store
            .insert_user(NewUser {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                password_hash: "x".into(),
                mail_token: token.map(str::to_string),
                subscription_status: SubscriptionStatus::Active,
                created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            })
            .await
            .unwrap()
    }

    fn once_rule(hour: u32) -> ScheduleRule {
        ScheduleRule {
            enabled: true,
            repeat: Repeat::Once,
            start_date: Some(chrono::NaiveDate::from_ymd_opt(2026, 2, 17).unwrap()),
            end_date: None,
            send_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            send_time_2: None,
            interval: 1,
            byweekday: Vec::<Weekday>::new(),
            rel_value: None,
            rel_unit: None,
        }
    }

    #[tokio::test]
    async fn missing_transport_credential_fails_without_sending() {
        let store = MemoryStore::new();
        let uid = seed_user(&store, None).await;
        let now = Utc.with_ymd_and_hms(2026, 2, 17, 9, 0, 0).unwrap();
        let fid = store
            .insert_followup(NewFollowup {
                user_id: uid,
                client_name: "Bo".into(),
                email: Some("bo@example.com".into()),
                phone: None,
                followup_type: "checkup".into(),
                description: None,
                status: FollowupStatus::Pending,
                due_date: None,
                created_at: now,
            })
            .await
            .unwrap();
        store
            .set_schedule_rule_guarded(fid, uid, once_rule(8), now - chrono::Duration::minutes(5), None)
            .await
            .unwrap();

        let transport = FakeTransport::new(true);
        let report = run_tick(&store, &transport, now, &config()).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.sent, 0);
        assert!(transport.calls.lock().unwrap().is_empty());

        let f = store.get_followup(fid, uid).await.unwrap();
        assert_eq!(f.status, FollowupStatus::Failed);
        assert_eq!(f.last_error.as_deref(), Some("Transport not connected"));
    }

    #[tokio::test]
    async fn successful_once_send_finalizes_the_followup() {
        let store = MemoryStore::new();
        let uid = seed_user(&store, Some("tok")).await;
        let now = Utc.with_ymd_and_hms(2026, 2, 17, 9, 0, 0).unwrap();
        let fid = store
            .insert_followup(NewFollowup {
                user_id: uid,
                client_name: "Cy".into(),
                email: Some("cy@example.com".into()),
                phone: None,
                followup_type: "checkup".into(),
                description: None,
                status: FollowupStatus::Pending,
                due_date: None,
                created_at: now,
            })
            .await
            .unwrap();
        store
            .set_schedule_rule_guarded(fid, uid, once_rule(8), now - chrono::Duration::minutes(5), None)
            .await
            .unwrap();

        let transport = FakeTransport::new(true);
        let report = run_tick(&store, &transport, now, &config()).await;
        assert_eq!(report.sent, 1);

        let f = store.get_followup(fid, uid).await.unwrap();
        assert_eq!(f.status, FollowupStatus::Sent);
        assert_eq!(f.sent_count, 1);
        assert!(f.next_send_at.is_none());
        assert_eq!(transport.calls.lock().unwrap()[0].1, "Follow-up: checkup");
    }

    #[tokio::test]
    async fn successful_repeat_send_rearms_in_the_future() {
        let store = MemoryStore::new();
        let uid = seed_user(&store, Some("tok")).await;
        let now = Utc.with_ymd_and_hms(2026, 2, 17, 9, 0, 0).unwrap();
        let fid = store
            .insert_followup(NewFollowup {
                user_id: uid,
                client_name: "Dee".into(),
                email: Some("dee@example.com".into()),
                phone: None,
                followup_type: "checkup".into(),
                description: None,
                status: FollowupStatus::Pending,
                due_date: None,
                created_at: now,
            })
            .await
            .unwrap();
        let mut rule = once_rule(8);
        rule.repeat = Repeat::Daily;
        store
            .set_schedule_rule_guarded(fid, uid, rule, now - chrono::Duration::minutes(5), None)
            .await
            .unwrap();

        let transport = FakeTransport::new(true);
        run_tick(&store, &transport, now, &config()).await;

        let f = store.get_followup(fid, uid).await.unwrap();
        assert_eq!(f.status, FollowupStatus::Scheduled);
        assert_eq!(f.sent_count, 1);
        assert!(f.next_send_at.unwrap() > now);
    }

    #[tokio::test]
    async fn transport_failure_marks_failed_and_leaves_next_send_at_untouched() {
        let store = MemoryStore::new();
        let uid = seed_user(&store, Some("tok")).await;
        let now = Utc.with_ymd_and_hms(2026, 2, 17, 9, 0, 0).unwrap();
        let fid = store
            .insert_followup(NewFollowup {
                user_id: uid,
                client_name: "Eve".into(),
                email: Some("eve@example.com".into()),
                phone: None,
                followup_type: "checkup".into(),
                description: None,
                status: FollowupStatus::Pending,
                due_date: None,
                created_at: now,
            })
            .await
            .unwrap();
        let original_send_at = now - chrono::Duration::minutes(5);
        store
            .set_schedule_rule_guarded(fid, uid, once_rule(8), original_send_at, None)
            .await
            .unwrap();

        let transport = FakeTransport::new(false);
        let report = run_tick(&store, &transport, now, &config()).await;
        assert_eq!(report.failed, 1);

        let f = store.get_followup(fid, uid).await.unwrap();
        assert_eq!(f.status, FollowupStatus::Failed);
        assert_eq!(f.next_send_at, Some(original_send_at));
        assert!(f.last_error.is_some());
    }

    #[tokio::test]
    async fn relative_rule_ignores_rel_unit_validation_on_rearm_when_daily() {
        // Guards against a regression where `recompute_next` forwarded a
        // stale `rel_value`/`rel_unit` into a non-relative re-arm.
        let store = MemoryStore::new();
        let uid = seed_user(&store, Some("tok")).await;
        let now = Utc.with_ymd_and_hms(2026, 2, 17, 9, 0, 0).unwrap();
        let fid = store
            .insert_followup(NewFollowup {
                user_id: uid,
                client_name: "Fay".into(),
                email: Some("fay@example.com".into()),
                phone: None,
                followup_type: "checkup".into(),
                description: None,
                status: FollowupStatus::Pending,
                due_date: None,
                created_at: now,
            })
            .await
            .unwrap();
        let mut rule = once_rule(8);
        rule.repeat = Repeat::Relative;
        rule.rel_value = Some(30);
        rule.rel_unit = Some(RelUnit::Minutes);
        let send_at = now - chrono::Duration::minutes(1);
        store
            .set_schedule_rule_guarded(fid, uid, rule, send_at, None)
            .await
            .unwrap();

        let transport = FakeTransport::new(true);
        run_tick(&store, &transport, now, &config()).await;

        let f = store.get_followup(fid, uid).await.unwrap();
        assert_eq!(f.status, FollowupStatus::Scheduled);
        assert!(f.next_send_at.unwrap() > now);
    }
}
