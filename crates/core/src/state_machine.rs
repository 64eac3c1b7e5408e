//! Followup lifecycle transitions and their guards. The transition table is
//! fixed business logic, not user configuration, so this is a concrete
//! `FollowupStatus` match rather than a generic, data-driven state-machine
//! config type.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::model::{Followup, FollowupStatus};

/// `true` for statuses that reject a new schedule-rule install outright.
/// Distinct from [`has_ever_sent`], which layers an additional rejection on
/// top of this set.
#[must_use]
pub fn is_finalized_status(status: FollowupStatus) -> bool {
    matches!(
        status,
        FollowupStatus::Sent | FollowupStatus::Done | FollowupStatus::Deleted
    )
}

#[must_use]
pub fn has_ever_sent(followup: &Followup) -> bool {
    followup.has_ever_sent()
}

/// Guard shared by `set_schedule_rule`/`bulk_set_schedule_rule`: a followup
/// may only accept a new rule if it is neither in a finalized status nor has
/// ever recorded a send.
pub fn require_not_finalized(followup: &Followup) -> CoreResult<()> {
    if is_finalized_status(followup.status) || has_ever_sent(followup) {
        return Err(CoreError::AlreadyFinalized);
    }
    Ok(())
}

/// `draft`/`pending` → `scheduled`. Caller has already validated and
/// compiled the rule; this only enforces the status guard.
pub fn set_rule(followup: &Followup) -> CoreResult<FollowupStatus> {
    require_not_finalized(followup)?;
    match followup.status {
        FollowupStatus::Draft | FollowupStatus::Pending => Ok(FollowupStatus::Scheduled),
        other => Err(CoreError::InvalidRule(format!(
            "cannot install a schedule rule from status {other}"
        ))),
    }
}

/// `clear_rule`: preserves `sent` when `sent_count > 0`, otherwise reverts
/// to `pending`. Never errors; "no status change" for an already-sent item
/// is itself the correct outcome, not a guard failure.
#[must_use]
pub fn clear_rule(followup: &Followup) -> FollowupStatus {
    if followup.has_ever_sent() {
        followup.status
    } else {
        FollowupStatus::Pending
    }
}

/// Loop pickup: `scheduled` → `running`. Guard: `enabled && next_send_at <=
/// now`. Best-effort at the call site — failure to persist this transition
/// is logged, not fatal.
pub fn pickup(followup: &Followup, now: DateTime<Utc>) -> CoreResult<FollowupStatus> {
    if followup.status != FollowupStatus::Scheduled {
        return Err(CoreError::InvalidRule(format!(
            "loop pickup requires status=scheduled, got {}",
            followup.status
        )));
    }
    let rule = followup
        .schedule
        .as_ref()
        .filter(|r| r.enabled)
        .ok_or(CoreError::InvalidRule(
            "scheduled followup missing an enabled rule".into(),
        ))?;
    let _ = rule;
    let due = followup.next_send_at.is_some_and(|t| t <= now);
    if !due {
        return Err(CoreError::InvalidRule("followup is not yet due".into()));
    }
    Ok(FollowupStatus::Running)
}

/// Transport success, `repeat = once`: terminal `sent`.
#[must_use]
pub fn transport_success_once() -> FollowupStatus {
    FollowupStatus::Sent
}

/// Transport success, `repeat != once`: re-arms to `scheduled`.
#[must_use]
pub fn transport_success_repeat() -> FollowupStatus {
    FollowupStatus::Scheduled
}

/// Transport failure (or missing credential): `failed`, `last_error` set by
/// the caller, `next_send_at` left untouched so the next tick retries.
#[must_use]
pub fn transport_failure() -> FollowupStatus {
    FollowupStatus::Failed
}

/// Passed sweep guard: only `scheduled`, `repeat = once`, unsent items whose
/// `next_send_at` is older than `grace_cutoff` qualify.
#[must_use]
pub fn passes_grace_sweep(followup: &Followup, grace_cutoff: DateTime<Utc>) -> bool {
    followup.status == FollowupStatus::Scheduled
        && followup
            .schedule
            .as_ref()
            .is_some_and(|r| r.repeat == crate::model::Repeat::Once)
        && !followup.has_ever_sent()
        && followup.next_send_at.is_some_and(|t| t < grace_cutoff)
}

/// `mark_done`: any non-final status may transition to `done`. "Non-final"
/// here means not already one of the terminal-like statuses.
pub fn mark_done(followup: &Followup) -> CoreResult<FollowupStatus> {
    if matches!(
        followup.status,
        FollowupStatus::Done | FollowupStatus::Deleted
    ) {
        return Err(CoreError::InvalidRule(format!(
            "cannot mark done from status {}",
            followup.status
        )));
    }
    Ok(FollowupStatus::Done)
}

/// `mark_replied`: only from `sent`, `pending`, or `failed`.
pub fn mark_replied(followup: &Followup) -> CoreResult<FollowupStatus> {
    match followup.status {
        FollowupStatus::Sent | FollowupStatus::Pending | FollowupStatus::Failed => {
            Ok(FollowupStatus::Replied)
        }
        other => Err(CoreError::InvalidRule(format!(
            "cannot mark replied from status {other}"
        ))),
    }
}

/// `delete`: always legal; the caller is responsible for deleting child log
/// rows first to satisfy referential integrity.
#[must_use]
pub fn delete() -> FollowupStatus {
    FollowupStatus::Deleted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Repeat, ScheduleRule};
    use chrono::{NaiveTime, TimeZone};

    fn followup(status: FollowupStatus) -> Followup {
        Followup {
            id: 1,
            user_id: 1,
            client_name: "Ada".into(),
            email: Some("ada@example.com".into()),
            phone: None,
            followup_type: "checkup".into(),
            description: None,
            message_override: None,
            status,
            chase_stage: 0,
            preferred_channel: "email".into(),
            due_date: None,
            schedule: None,
            next_send_at: None,
            sent_count: 0,
            last_sent_at: None,
            last_attempt_at: None,
            last_error: None,
            replied_at: None,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn once_rule() -> ScheduleRule {
        ScheduleRule {
            enabled: true,
            repeat: Repeat::Once,
            start_date: None,
            end_date: None,
            send_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            send_time_2: None,
            interval: 1,
            byweekday: vec![],
            rel_value: None,
            rel_unit: None,
        }
    }

    #[test]
    fn set_rule_from_draft_and_pending_succeeds() {
        assert_eq!(
            set_rule(&followup(FollowupStatus::Draft)).unwrap(),
            FollowupStatus::Scheduled
        );
        assert_eq!(
            set_rule(&followup(FollowupStatus::Pending)).unwrap(),
            FollowupStatus::Scheduled
        );
    }

    #[test]
    fn set_rule_rejects_finalized_statuses() {
        for status in [FollowupStatus::Sent, FollowupStatus::Done, FollowupStatus::Deleted] {
            let err = set_rule(&followup(status)).unwrap_err();
            assert!(matches!(err, CoreError::AlreadyFinalized));
        }
    }

    #[test]
    fn set_rule_rejects_when_ever_sent_even_if_status_not_finalized() {
        let mut f = followup(FollowupStatus::Pending);
        f.sent_count = 1;
        let err = set_rule(&f).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyFinalized));
    }

    #[test]
    fn clear_rule_preserves_sent_when_ever_sent() {
        let mut f = followup(FollowupStatus::Sent);
        f.sent_count = 1;
        assert_eq!(clear_rule(&f), FollowupStatus::Sent);
    }

    #[test]
    fn clear_rule_reverts_to_pending_when_never_sent() {
        let f = followup(FollowupStatus::Scheduled);
        assert_eq!(clear_rule(&f), FollowupStatus::Pending);
    }

    #[test]
    fn pickup_requires_due_and_enabled_rule() {
        let now = Utc.with_ymd_and_hms(2026, 2, 17, 8, 0, 0).unwrap();
        let mut f = followup(FollowupStatus::Scheduled);
        f.schedule = Some(once_rule());
        f.next_send_at = Some(now);
        assert_eq!(pickup(&f, now).unwrap(), FollowupStatus::Running);

        f.next_send_at = Some(now + chrono::Duration::seconds(1));
        assert!(pickup(&f, now).is_err());
    }

    #[test]
    fn passes_grace_sweep_only_for_stale_unsent_once_items() {
        let grace_cutoff = Utc.with_ymd_and_hms(2026, 2, 17, 8, 0, 0).unwrap();
        let mut f = followup(FollowupStatus::Scheduled);
        f.schedule = Some(once_rule());
        f.next_send_at = Some(grace_cutoff - chrono::Duration::minutes(5));
        assert!(passes_grace_sweep(&f, grace_cutoff));

        f.sent_count = 1;
        assert!(!passes_grace_sweep(&f, grace_cutoff));
    }

    #[test]
    fn mark_replied_only_from_allowed_statuses() {
        assert!(mark_replied(&followup(FollowupStatus::Sent)).is_ok());
        assert!(mark_replied(&followup(FollowupStatus::Scheduled)).is_err());
    }

    #[test]
    fn mark_done_rejects_done_and_deleted() {
        assert!(mark_done(&followup(FollowupStatus::Scheduled)).is_ok());
        assert!(mark_done(&followup(FollowupStatus::Done)).is_err());
        assert!(mark_done(&followup(FollowupStatus::Deleted)).is_err());
    }
}
