//! The mutation surface every outer shell operation funnels through. A thin
//! façade over `Arc<dyn FollowupStore>` that enforces the state-machine
//! guards and runs the schedule compiler before anything touches the store,
//! so the store itself never has to know about compilation or transition
//! legality beyond its own atomic "has ever sent" guard.

use std::sync::Arc;

use cadence_store::model::{Followup, FollowupStatus, ScheduleRule};
use cadence_store::traits::{FollowupStore, FollowupUpdate, NewFollowup};
use chrono_tz::Tz;

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::{compiler, state_machine};

/// Fields a caller supplies for a new or updated followup. Channel is
/// implicitly `email` — the only contact field this validates is `email`.
#[derive(Debug, Clone, Default)]
pub struct FollowupFields {
    pub client_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub followup_type: String,
    pub description: Option<String>,
}

fn require_email(fields: &FollowupFields) -> CoreResult<()> {
    if fields.email.as_deref().unwrap_or("").trim().is_empty() {
        return Err(CoreError::ContactMissing("email".into()));
    }
    Ok(())
}

/// The Write API. Generic over [`Clock`] so production wires [`crate::clock::SystemClock`]
/// and tests wire [`crate::clock::FakeClock`].
pub struct Core<C: Clock> {
    store: Arc<dyn FollowupStore>,
    clock: C,
    input_tz: Tz,
}

impl<C: Clock> Core<C> {
    pub fn new(store: Arc<dyn FollowupStore>, clock: C, input_tz: Tz) -> Self {
        Self {
            store,
            clock,
            input_tz,
        }
    }

    async fn load(&self, id: i64, user_id: i64) -> CoreResult<Followup> {
        self.store.get_followup(id, user_id).await.map_err(Into::into)
    }

    /// Creates a fully-formed followup: `status = pending`, an optional
    /// `due_date`, channel+contact validated.
    pub async fn create_followup(
        &self,
        user_id: i64,
        fields: FollowupFields,
        due_date: Option<chrono::NaiveDate>,
    ) -> CoreResult<i64> {
        require_email(&fields)?;
        let id = self
            .store
            .insert_followup(NewFollowup {
                user_id,
                client_name: fields.client_name,
                email: fields.email,
                phone: fields.phone,
                followup_type: fields.followup_type,
                description: fields.description,
                status: FollowupStatus::Pending,
                due_date,
                created_at: self.clock.now(),
            })
            .await?;
        Ok(id)
    }

    /// Creates a draft: `status = draft`, no due date, no schedule. Email is
    /// still required so the row is schedulable once the user fills in a
    /// rule later.
    pub async fn create_draft(&self, user_id: i64, fields: FollowupFields) -> CoreResult<i64> {
        require_email(&fields)?;
        let id = self
            .store
            .insert_followup(NewFollowup {
                user_id,
                client_name: fields.client_name,
                email: fields.email,
                phone: fields.phone,
                followup_type: fields.followup_type,
                description: fields.description,
                status: FollowupStatus::Draft,
                due_date: None,
                created_at: self.clock.now(),
            })
            .await?;
        Ok(id)
    }

    /// Patches arbitrary fields on an existing followup. Does not touch
    /// `status`/`schedule`/`next_send_at` — those go through the dedicated
    /// operations below so the state machine stays the single source of
    /// truth for transitions.
    pub async fn update_followup(
        &self,
        id: i64,
        user_id: i64,
        patch: FollowupUpdate,
    ) -> CoreResult<bool> {
        if let Some(new_email) = &patch.email {
            if new_email.as_deref().unwrap_or("").trim().is_empty() {
                return Err(CoreError::ContactMissing("email".into()));
            }
        }
        self.store
            .update_followup(id, user_id, patch)
            .await
            .map_err(Into::into)
    }

    /// Compiles `rule` and installs it, guarded by [`state_machine::set_rule`].
    pub async fn set_schedule_rule(
        &self,
        id: i64,
        user_id: i64,
        rule: ScheduleRule,
    ) -> CoreResult<()> {
        let followup = self.load(id, user_id).await?;
        state_machine::set_rule(&followup)?;
        let now = self.clock.now();
        let next_send_at = compiler::compile(&rule, now, self.input_tz)?;
        let due_date = followup.due_date.or(rule.start_date);
        let affected = self
            .store
            .set_schedule_rule_guarded(id, user_id, rule, next_send_at, due_date)
            .await?;
        if !affected {
            return Err(CoreError::AlreadyFinalized);
        }
        Ok(())
    }

    /// Same as [`Self::set_schedule_rule`] applied to many ids at once.
    /// Ids that fail the guard are silently skipped, matching the store's
    /// bulk semantics; returns how many rows were actually updated.
    pub async fn bulk_set_schedule_rule(
        &self,
        user_id: i64,
        ids: &[i64],
        rule: ScheduleRule,
    ) -> CoreResult<i64> {
        let now = self.clock.now();
        let next_send_at = compiler::compile(&rule, now, self.input_tz)?;
        self.store
            .bulk_set_schedule_rule_guarded(user_id, ids, rule, next_send_at, None)
            .await
            .map_err(Into::into)
    }

    /// Clears a followup's schedule rule, preserving `sent` when the row
    /// has ever sent, otherwise reverting to `pending`.
    pub async fn clear_schedule(&self, id: i64, user_id: i64) -> CoreResult<()> {
        let followup = self.load(id, user_id).await?;
        let new_status = state_machine::clear_rule(&followup);
        self.store
            .update_followup(
                id,
                user_id,
                FollowupUpdate {
                    schedule: Some(None),
                    next_send_at: Some(None),
                    status: Some(new_status),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    async fn finish_mark_done(&self, followup: Followup) -> CoreResult<()> {
        let status = state_machine::mark_done(&followup)?;
        self.store
            .update_followup(
                followup.id,
                followup.user_id,
                FollowupUpdate {
                    status: Some(status),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    pub async fn mark_done_by_id(&self, id: i64, user_id: i64) -> CoreResult<()> {
        let followup = self.load(id, user_id).await?;
        self.finish_mark_done(followup).await
    }

    pub async fn mark_done_by_email(&self, user_id: i64, email: &str) -> CoreResult<()> {
        let followup = self
            .store
            .find_followup_by_email(user_id, email)
            .await?;
        self.finish_mark_done(followup).await
    }

    pub async fn mark_done_by_phone(&self, user_id: i64, phone: &str) -> CoreResult<()> {
        let followup = self
            .store
            .find_followup_by_phone(user_id, phone)
            .await?;
        self.finish_mark_done(followup).await
    }

    /// `sent`/`pending`/`failed` → `replied`, stamping `replied_at`.
    pub async fn mark_replied(&self, id: i64, user_id: i64) -> CoreResult<()> {
        let followup = self.load(id, user_id).await?;
        let status = state_machine::mark_replied(&followup)?;
        self.store
            .update_followup(
                id,
                user_id,
                FollowupUpdate {
                    status: Some(status),
                    replied_at: Some(Some(self.clock.now())),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Always legal; removes the row (and its activity log rows, at the
    /// store's discretion) rather than merely flagging it.
    pub async fn delete_followup(&self, id: i64, user_id: i64) -> CoreResult<()> {
        let deleted = self.store.delete_followup(id, user_id).await?;
        if !deleted {
            return Err(CoreError::NotFound(format!("followup {id}")));
        }
        Ok(())
    }

    /// Sets or clears the per-send message override, which bypasses
    /// template rendering in the renderer's override path.
    pub async fn update_message_override(
        &self,
        id: i64,
        user_id: i64,
        text: Option<String>,
    ) -> CoreResult<()> {
        self.store
            .update_followup(
                id,
                user_id,
                FollowupUpdate {
                    message_override: Some(text),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use cadence_store::model::{Repeat, Weekday};
    use cadence_store_memory::MemoryStore;
    use chrono::{NaiveTime, TimeZone, Utc};

    fn core_with_fake_clock() -> (Core<FakeClock>, FakeClock) {
        let clock = FakeClock::new(Utc.with_ymd_and_hms(2026, 2, 17, 8, 0, 0).unwrap());
        let store: Arc<dyn FollowupStore> = Arc::new(MemoryStore::new());
        let tz: Tz = "Africa/Lagos".parse().unwrap();
        (Core::new(store, clock.clone(), tz), clock)
    }

    fn fields() -> FollowupFields {
        FollowupFields {
            client_name: "Ada".into(),
            email: Some("ada@example.com".into()),
            phone: None,
            followup_type: "checkup".into(),
            description: None,
        }
    }

    fn daily_rule() -> ScheduleRule {
        ScheduleRule {
            enabled: true,
            repeat: Repeat::Daily,
            start_date: None,
            end_date: None,
            send_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            send_time_2: None,
            interval: 1,
            byweekday: Vec::<Weekday>::new(),
            rel_value: None,
            rel_unit: None,
        }
    }

    #[tokio::test]
    async fn create_followup_requires_email() {
        let (core, _clock) = core_with_fake_clock();
        let mut f = fields();
        f.email = None;
        let err = core.create_followup(1, f, None).await.unwrap_err();
        assert!(matches!(err, CoreError::ContactMissing(_)));
    }

    #[tokio::test]
    async fn create_followup_then_set_schedule_rule_moves_to_scheduled() {
        let (core, _clock) = core_with_fake_clock();
        let id = core.create_followup(1, fields(), None).await.unwrap();
        core.set_schedule_rule(id, 1, daily_rule()).await.unwrap();
    }

    #[tokio::test]
    async fn set_schedule_rule_twice_on_a_sent_item_is_rejected() {
        let (core, _clock) = core_with_fake_clock();
        let id = core.create_followup(1, fields(), None).await.unwrap();
        core.set_schedule_rule(id, 1, daily_rule()).await.unwrap();

        core.mark_done_by_id(id, 1).await.unwrap();
        let err = core
            .set_schedule_rule(id, 1, daily_rule())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AlreadyFinalized));
    }

    #[tokio::test]
    async fn clear_schedule_reverts_to_pending_when_never_sent() {
        let (core, _clock) = core_with_fake_clock();
        let id = core.create_followup(1, fields(), None).await.unwrap();
        core.set_schedule_rule(id, 1, daily_rule()).await.unwrap();
        core.clear_schedule(id, 1).await.unwrap();
    }

    #[tokio::test]
    async fn mark_replied_rejects_from_draft() {
        let (core, _clock) = core_with_fake_clock();
        let id = core.create_draft(1, fields()).await.unwrap();
        let err = core.mark_replied(id, 1).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidRule(_)));
    }

    #[tokio::test]
    async fn delete_followup_is_idempotent_failure_on_second_call() {
        let (core, _clock) = core_with_fake_clock();
        let id = core.create_followup(1, fields(), None).await.unwrap();
        core.delete_followup(id, 1).await.unwrap();
        let err = core.delete_followup(id, 1).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_message_override_round_trips() {
        let (core, _clock) = core_with_fake_clock();
        let id = core.create_followup(1, fields(), None).await.unwrap();
        core.update_message_override(id, 1, Some("custom text".into()))
            .await
            .unwrap();
        core.update_message_override(id, 1, None).await.unwrap();
    }
}
