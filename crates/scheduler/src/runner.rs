//! The long-lived scheduler loop. One periodic ticker, a non-reentrant
//! tick guard via an async mutex, and
//! [`tokio::time::MissedTickBehavior::Delay`] to coalesce a tick that fires
//! while the previous one is still running. Built as an explicit value with
//! `new`/`run` rather than a module-level singleton, so it can be
//! constructed once in `main` and shut down cleanly.

use std::sync::Arc;

use cadence_core::Clock;
use cadence_email::EmailBackend;
use cadence_store::traits::FollowupStore;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::tick::{run_tick, TickReport};

/// Owns the dependencies the tick needs and drives it on a timer until
/// shutdown. Constructed once per process; `run` consumes `self`.
pub struct Scheduler<C: Clock> {
    store: Arc<dyn FollowupStore>,
    transport: Arc<dyn EmailBackend>,
    clock: C,
    config: SchedulerConfig,
    tick_guard: Arc<Mutex<()>>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl<C: Clock + Clone + 'static> Scheduler<C> {
    /// Returns the scheduler and a sender; send `()` (or drop the sender) to
    /// request shutdown.
    pub fn new(
        store: Arc<dyn FollowupStore>,
        transport: Arc<dyn EmailBackend>,
        clock: C,
        config: SchedulerConfig,
    ) -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel(1);
        (
            Self {
                store,
                transport,
                clock,
                config,
                tick_guard: Arc::new(Mutex::new(())),
                shutdown_rx: rx,
            },
            tx,
        )
    }

    /// Runs until a shutdown signal arrives. An in-flight transport call
    /// observed at shutdown is allowed to finish naturally — this loop does
    /// not abort a tick mid-flight, it only stops scheduling new ones.
    pub async fn run(mut self) {
        info!(tick_seconds = self.config.tick_seconds, "scheduler loop starting");

        // Crash-orphan recovery on startup: any `running` row left over from
        // a process that died mid-tick is presumed abandoned once it's older
        // than the threshold.
        self.recover_crash_orphans().await;

        let mut interval = tokio::time::interval(self.config.tick_duration());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("scheduler loop received shutdown signal");
                    break;
                }
                _ = interval.tick() => {
                    self.fire_tick().await;
                }
            }
        }

        info!("scheduler loop stopped");
    }

    async fn recover_crash_orphans(&self) {
        let now = self.clock.now();
        match self
            .store
            .sweep_crash_orphans(now - self.config.crash_orphan_threshold())
            .await
        {
            Ok(n) if n > 0 => {
                tracing::warn!(count = n, "recovered crash-orphaned running followups on startup");
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "startup crash-orphan sweep failed"),
        }
    }

    /// Acquires the tick guard via `try_lock`; a tick that's still running
    /// when the next one fires is a coalesced no-op, enforcing at most one
    /// concurrent tick.
    async fn fire_tick(&self) {
        let Ok(_permit) = self.tick_guard.clone().try_lock_owned() else {
            tracing::debug!("tick skipped: previous tick still in flight");
            return;
        };
        let now = self.clock.now();
        let report: TickReport =
            run_tick(self.store.as_ref(), self.transport.as_ref(), now, &self.config).await;
        if report.sent > 0 || report.failed > 0 || report.passed > 0 {
            info!(
                sent = report.sent,
                failed = report.failed,
                passed = report.passed,
                crash_orphans = report.crash_orphans_recovered,
                "tick complete"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cadence_core::FakeClock;
    use cadence_email::TransportError;
    use cadence_store::model::{FollowupStatus, Repeat, ScheduleRule, SubscriptionStatus, Weekday};
    use cadence_store::traits::{NewFollowup, NewUser};
    use cadence_store_memory::MemoryStore;
    use chrono::{NaiveTime, TimeZone, Utc};

    struct AlwaysOkTransport;

    #[async_trait]
    impl EmailBackend for AlwaysOkTransport {
        async fn send(
            &self,
            _credential: Option<&str>,
            _to: &str,
            _subject: &str,
            _html_body: &str,
        ) -> Result<String, TransportError> {
            Ok("msg".into())
        }
    }

    #[tokio::test]
    async fn run_stops_promptly_on_shutdown_signal() {
        let store: Arc<dyn FollowupStore> = Arc::new(MemoryStore::new());
        let transport: Arc<dyn EmailBackend> = Arc::new(AlwaysOkTransport);
        let clock = FakeClock::new(Utc.with_ymd_and_hms(2026, 2, 17, 8, 0, 0).unwrap());
        let config = SchedulerConfig::new(30, "UTC".parse().unwrap()).unwrap();
        let (scheduler, shutdown_tx) = Scheduler::new(store, transport, clock, config);

        let handle = tokio::spawn(scheduler.run());
        shutdown_tx.send(()).await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop within timeout")
            .unwrap();
    }

    #[tokio::test]
    async fn a_due_item_is_sent_once_the_ticker_fires() {
        let store = Arc::new(MemoryStore::new());
        let uid = store
            .insert_user(NewUser {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                password_hash: "x".into(),
                mail_token: Some("tok".into()),
                subscription_status: SubscriptionStatus::Active,
                created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            })
            .await
            .unwrap();
        let now = Utc.with_ymd_and_hms(2026, 2, 17, 8, 0, 0).unwrap();
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
        let rule = ScheduleRule {
            enabled: true,
            repeat: Repeat::Once,
            start_date: Some(chrono::NaiveDate::from_ymd_opt(2026, 2, 17).unwrap()),
            end_date: None,
            send_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            send_time_2: None,
            interval: 1,
            byweekday: Vec::<Weekday>::new(),
            rel_value: None,
            rel_unit: None,
        };
        store
            .set_schedule_rule_guarded(fid, uid, rule, now - chrono::Duration::minutes(1), None)
            .await
            .unwrap();

        let store_dyn: Arc<dyn FollowupStore> = store.clone();
        let transport: Arc<dyn EmailBackend> = Arc::new(AlwaysOkTransport);
        let clock = FakeClock::new(now);
        let config = SchedulerConfig::new(30, "UTC".parse().unwrap()).unwrap();
        let (scheduler, shutdown_tx) = Scheduler::new(store_dyn, transport, clock, config);

        let handle = tokio::spawn(scheduler.run());
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        shutdown_tx.send(()).await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop within timeout")
            .unwrap();

        let f = store.get_followup(fid, uid).await.unwrap();
        assert_eq!(f.status, FollowupStatus::Sent);
    }
}
