//! Shared conformance battery run against every `FollowupStore` backend so
//! they cannot silently diverge: small `test_*` async helpers composed into
//! one entry point.

use chrono::{TimeZone, Utc};

use crate::error::StoreResult;
use crate::model::{FollowupStatus, Repeat, ScheduleRule, SubscriptionStatus};
use crate::traits::{FollowupStore, FollowupUpdate, NewFollowup, NewUser};

/// Runs the full suite against `store`. Call this from each backend crate's
/// own `#[tokio::test]` so failures are attributed to the right crate.
pub async fn run_store_conformance_tests(store: &dyn FollowupStore) -> StoreResult<()> {
    test_user_roundtrip(store).await?;
    test_followup_crud(store).await?;
    test_schedule_rule_guard_rejects_finalized(store).await?;
    test_due_scheduled_ordering_and_cap(store).await?;
    test_send_success_once_finalizes(store).await?;
    test_send_success_repeat_rearms(store).await?;
    test_passed_sweep(store).await?;
    test_crash_orphan_sweep(store).await?;
    Ok(())
}

async fn new_user(store: &dyn FollowupStore, email: &str) -> StoreResult<i64> {
    store
        .insert_user(NewUser {
            name: "Test User".into(),
            email: email.into(),
            password_hash: "x".into(),
            mail_token: Some("token".into()),
            subscription_status: SubscriptionStatus::Active,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        })
        .await
}

fn once_rule(send_at_hour: u32) -> ScheduleRule {
    ScheduleRule {
        enabled: true,
        repeat: Repeat::Once,
        start_date: None,
        end_date: None,
        send_time: chrono::NaiveTime::from_hms_opt(send_at_hour, 0, 0).unwrap(),
        send_time_2: None,
        interval: 1,
        byweekday: vec![],
        rel_value: None,
        rel_unit: None,
    }
}

async fn test_user_roundtrip(store: &dyn FollowupStore) -> StoreResult<()> {
    let uid = new_user(store, "roundtrip@example.com").await?;
    let user = store.get_user(uid).await?;
    assert_eq!(user.email, "roundtrip@example.com", "email must round-trip");
    assert!(user.mail_token.is_some(), "mail_token must round-trip");

    store.set_user_mail_token(uid, None).await?;
    let user = store.get_user(uid).await?;
    assert!(user.mail_token.is_none(), "mail_token must clear to None");

    let ids = store.list_user_ids().await?;
    assert!(ids.contains(&uid), "list_user_ids must include newly created users");
    Ok(())
}

async fn test_followup_crud(store: &dyn FollowupStore) -> StoreResult<()> {
    let uid = new_user(store, "crud@example.com").await?;
    let created_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let id = store
        .insert_followup(NewFollowup {
            user_id: uid,
            client_name: "Ada".into(),
            email: Some("ada@example.com".into()),
            phone: None,
            followup_type: "checkup".into(),
            description: None,
            status: FollowupStatus::Pending,
            due_date: None,
            created_at,
        })
        .await?;

    let f = store.get_followup(id, uid).await?;
    assert_eq!(f.status, FollowupStatus::Pending);
    assert_eq!(f.client_name, "Ada");

    let ok = store
        .update_followup(
            id,
            uid,
            FollowupUpdate {
                client_name: Some("Ada Lovelace".into()),
                ..Default::default()
            },
        )
        .await?;
    assert!(ok, "update must affect the row");
    let f = store.get_followup(id, uid).await?;
    assert_eq!(f.client_name, "Ada Lovelace");

    let found = store.find_followup_by_email(uid, "ada@example.com").await?;
    assert_eq!(found.id, id);

    let deleted = store.delete_followup(id, uid).await?;
    assert!(deleted);
    assert!(store.get_followup(id, uid).await.is_err());
    Ok(())
}

async fn test_schedule_rule_guard_rejects_finalized(store: &dyn FollowupStore) -> StoreResult<()> {
    let uid = new_user(store, "guard@example.com").await?;
    let created_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let id = store
        .insert_followup(NewFollowup {
            user_id: uid,
            client_name: "Bo".into(),
            email: Some("bo@example.com".into()),
            phone: None,
            followup_type: "checkup".into(),
            description: None,
            status: FollowupStatus::Pending,
            due_date: None,
            created_at,
        })
        .await?;

    let next = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap();
    let ok = store
        .set_schedule_rule_guarded(id, uid, once_rule(9), next, None)
        .await?;
    assert!(ok, "first install on a fresh row must succeed");

    store
        .mark_send_success_once(id, uid, Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap())
        .await?;

    let rejected = store
        .set_schedule_rule_guarded(id, uid, once_rule(10), next, None)
        .await?;
    assert!(!rejected, "a finalized/ever-sent row must reject a new rule install");
    Ok(())
}

async fn test_due_scheduled_ordering_and_cap(store: &dyn FollowupStore) -> StoreResult<()> {
    let uid = new_user(store, "due@example.com").await?;
    let created_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let now = Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap();

    let mut ids = Vec::new();
    for i in 0..5 {
        let id = store
            .insert_followup(NewFollowup {
                user_id: uid,
                client_name: format!("Client {i}"),
                email: Some(format!("c{i}@example.com")),
                phone: None,
                followup_type: "checkup".into(),
                description: None,
                status: FollowupStatus::Pending,
                due_date: None,
                created_at,
            })
            .await?;
        let send_at = now - chrono::Duration::minutes(5 * (5 - i));
        store
            .set_schedule_rule_guarded(id, uid, once_rule(9), send_at, None)
            .await?;
        ids.push((id, send_at));
    }

    let due = store.get_due_scheduled(uid, now, 3).await?;
    assert_eq!(due.len(), 3, "must respect the cap");
    for pair in due.windows(2) {
        assert!(
            pair[0].next_send_at <= pair[1].next_send_at,
            "due items must be ordered next_send_at ascending"
        );
    }
    Ok(())
}

async fn test_send_success_once_finalizes(store: &dyn FollowupStore) -> StoreResult<()> {
    let uid = new_user(store, "once@example.com").await?;
    let created_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let id = store
        .insert_followup(NewFollowup {
            user_id: uid,
            client_name: "Cy".into(),
            email: Some("cy@example.com".into()),
            phone: None,
            followup_type: "checkup".into(),
            description: None,
            status: FollowupStatus::Pending,
            due_date: None,
            created_at,
        })
        .await?;
    let send_at = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap();
    store
        .set_schedule_rule_guarded(id, uid, once_rule(9), send_at, None)
        .await?;

    store.mark_send_success_once(id, uid, send_at).await?;
    let f = store.get_followup(id, uid).await?;
    assert_eq!(f.status, FollowupStatus::Sent);
    assert_eq!(f.sent_count, 1);
    assert!(f.next_send_at.is_none());
    Ok(())
}

async fn test_send_success_repeat_rearms(store: &dyn FollowupStore) -> StoreResult<()> {
    let uid = new_user(store, "repeat@example.com").await?;
    let created_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let id = store
        .insert_followup(NewFollowup {
            user_id: uid,
            client_name: "Dee".into(),
            email: Some("dee@example.com".into()),
            phone: None,
            followup_type: "checkup".into(),
            description: None,
            status: FollowupStatus::Pending,
            due_date: None,
            created_at,
        })
        .await?;
    let mut rule = once_rule(9);
    rule.repeat = Repeat::Daily;
    let first_send = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap();
    store
        .set_schedule_rule_guarded(id, uid, rule, first_send, None)
        .await?;

    let next_send = Utc.with_ymd_and_hms(2026, 2, 2, 9, 0, 0).unwrap();
    store
        .mark_send_success_repeat(id, uid, next_send, first_send)
        .await?;

    let f = store.get_followup(id, uid).await?;
    assert_eq!(f.status, FollowupStatus::Scheduled);
    assert_eq!(f.sent_count, 1);
    assert_eq!(f.next_send_at, Some(next_send));
    assert!(f.next_send_at > f.last_sent_at, "re-armed instant must be after the last send");
    Ok(())
}

async fn test_passed_sweep(store: &dyn FollowupStore) -> StoreResult<()> {
    let uid = new_user(store, "passed@example.com").await?;
    let created_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let id = store
        .insert_followup(NewFollowup {
            user_id: uid,
            client_name: "Eve".into(),
            email: Some("eve@example.com".into()),
            phone: None,
            followup_type: "checkup".into(),
            description: None,
            status: FollowupStatus::Pending,
            due_date: None,
            created_at,
        })
        .await?;
    let stale = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap();
    store
        .set_schedule_rule_guarded(id, uid, once_rule(9), stale, None)
        .await?;

    let grace_cutoff = stale + chrono::Duration::minutes(10);
    let swept = store.mark_schedule_passed(uid, grace_cutoff).await?;
    assert_eq!(swept, 1);
    let f = store.get_followup(id, uid).await?;
    assert_eq!(f.status, FollowupStatus::Passed);
    Ok(())
}

async fn test_crash_orphan_sweep(store: &dyn FollowupStore) -> StoreResult<()> {
    let uid = new_user(store, "orphan@example.com").await?;
    let created_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let id = store
        .insert_followup(NewFollowup {
            user_id: uid,
            client_name: "Fay".into(),
            email: Some("fay@example.com".into()),
            phone: None,
            followup_type: "checkup".into(),
            description: None,
            status: FollowupStatus::Pending,
            due_date: None,
            created_at,
        })
        .await?;
    let attempted_at = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap();
    store.set_status_running(id, uid, attempted_at).await?;

    let older_than = attempted_at + chrono::Duration::minutes(5);
    let swept = store.sweep_crash_orphans(older_than).await?;
    assert_eq!(swept, 1);
    let f = store.get_followup(id, uid).await?;
    assert_eq!(f.status, FollowupStatus::Failed);
    Ok(())
}
