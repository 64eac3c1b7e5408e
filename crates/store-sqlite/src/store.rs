use async_trait::async_trait;
use cadence_store::model::{Followup, ScheduleRule, Template, User};
use cadence_store::traits::{FollowupUpdate, NewActivityLogEntry, NewFollowup, NewUser};
use cadence_store::{FollowupStore, StoreError, StoreResult};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use crate::codec;
use crate::config::SqliteConfig;
use crate::migrations::run_migrations;
use crate::row::{followup_from_row, user_from_row, FOLLOWUP_COLUMNS, USER_COLUMNS};

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// SQLite-backed `FollowupStore`, built on `sqlx-sqlite` with the pool
/// configured for WAL mode, foreign keys, and a busy timeout.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if absent) the database at `config.db_path`, applies
    /// WAL + foreign-key + busy-timeout pragmas, and runs migrations.
    pub async fn connect(config: &SqliteConfig) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", config.db_path))
            .map_err(backend)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(backend)?;

        run_migrations(&pool).await.map_err(backend)?;
        Ok(Self { pool })
    }

    /// Wraps an already-open pool, running migrations against it. Used by
    /// the conformance suite against an in-memory database.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        run_migrations(&pool).await.map_err(backend)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl FollowupStore for SqliteStore {
    async fn insert_user(&self, new: NewUser) -> StoreResult<i64> {
        let row = sqlx::query(
            "INSERT INTO users
                (name, email, password_hash, mail_token, subscription_status, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.mail_token)
        .bind(codec::subscription_status_to_str(new.subscription_status))
        .bind(new.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        row.try_get("id").map_err(backend)
    }

    async fn get_user(&self, user_id: i64) -> StoreResult<User> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?;
        user_from_row(&row)
    }

    async fn set_user_mail_token(&self, user_id: i64, token: Option<String>) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET mail_token = ? WHERE id = ?")
            .bind(token)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_user_ids(&self) -> StoreResult<Vec<i64>> {
        let rows = sqlx::query("SELECT id FROM users")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.iter()
            .map(|r| r.try_get::<i64, _>("id").map_err(backend))
            .collect()
    }

    async fn get_user_template(&self, user_id: i64) -> StoreResult<Option<Template>> {
        let row = sqlx::query(
            "SELECT id, user_id, name, subject, html_content, created_at
             FROM email_templates WHERE user_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(|r| {
            Ok(Template {
                id: r.try_get("id").map_err(backend)?,
                user_id: r.try_get("user_id").map_err(backend)?,
                name: r.try_get::<Option<String>, _>("name").map_err(backend)?.unwrap_or_default(),
                subject: r.try_get("subject").map_err(backend)?,
                html_content: r
                    .try_get::<Option<String>, _>("html_content")
                    .map_err(backend)?
                    .unwrap_or_default(),
                created_at: r.try_get("created_at").map_err(backend)?,
            })
        })
        .transpose()
    }

    async fn insert_followup(&self, new: NewFollowup) -> StoreResult<i64> {
        let row = sqlx::query(
            "INSERT INTO followups
                (user_id, client_name, email, phone, followup_type, description, status,
                 due_date, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(new.user_id)
        .bind(&new.client_name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(&new.followup_type)
        .bind(&new.description)
        .bind(new.status.as_str())
        .bind(new.due_date)
        .bind(new.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        row.try_get("id").map_err(backend)
    }

    async fn get_followup(&self, id: i64, user_id: i64) -> StoreResult<Followup> {
        let row = sqlx::query(&format!(
            "SELECT {FOLLOWUP_COLUMNS} FROM followups WHERE id = ? AND user_id = ?"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;
        followup_from_row(&row)
    }

    async fn find_followup_by_email(&self, user_id: i64, email: &str) -> StoreResult<Followup> {
        let row = sqlx::query(&format!(
            "SELECT {FOLLOWUP_COLUMNS} FROM followups WHERE user_id = ? AND email = ?
             ORDER BY id DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;
        followup_from_row(&row)
    }

    async fn find_followup_by_phone(&self, user_id: i64, phone: &str) -> StoreResult<Followup> {
        let row = sqlx::query(&format!(
            "SELECT {FOLLOWUP_COLUMNS} FROM followups WHERE user_id = ? AND phone = ?
             ORDER BY id DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;
        followup_from_row(&row)
    }

    async fn update_followup(
        &self,
        id: i64,
        user_id: i64,
        patch: FollowupUpdate,
    ) -> StoreResult<bool> {
        // Partial updates are rare enough (write-API edits, not the hot
        // scheduler path) that building one statement per touched column is
        // clearer than a dynamic SET-clause builder.
        let mut affected = false;
        macro_rules! set_field {
            ($col:literal, $val:expr) => {{
                let result = sqlx::query(concat!("UPDATE followups SET ", $col, " = ? WHERE id = ? AND user_id = ?"))
                    .bind($val)
                    .bind(id)
                    .bind(user_id)
                    .execute(&self.pool)
                    .await
                    .map_err(backend)?;
                affected = affected || result.rows_affected() > 0;
            }};
        }

        if let Some(v) = patch.client_name {
            set_field!("client_name", v);
        }
        if let Some(v) = patch.email {
            set_field!("email", v);
        }
        if let Some(v) = patch.phone {
            set_field!("phone", v);
        }
        if let Some(v) = patch.followup_type {
            set_field!("followup_type", v);
        }
        if let Some(v) = patch.description {
            set_field!("description", v);
        }
        if let Some(v) = patch.message_override {
            set_field!("message_override", v);
        }
        if let Some(v) = patch.status {
            set_field!("status", v.as_str());
        }
        if let Some(v) = patch.due_date {
            set_field!("due_date", v);
        }
        if let Some(v) = patch.next_send_at {
            set_field!("next_send_at", v);
        }
        if let Some(v) = patch.replied_at {
            set_field!("replied_at", v);
        }
        if let Some(rule_opt) = patch.schedule {
            self.write_schedule_columns(id, user_id, rule_opt).await?;
            affected = true;
        }
        Ok(affected)
    }

    async fn delete_followup(&self, id: i64, user_id: i64) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        sqlx::query("DELETE FROM activity_logs WHERE followup_id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        let result = sqlx::query("DELETE FROM followups WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        tx.commit().await.map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_schedule_rule_guarded(
        &self,
        id: i64,
        user_id: i64,
        rule: ScheduleRule,
        next_send_at: DateTime<Utc>,
        due_date: Option<NaiveDate>,
    ) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        // Atomic "has ever sent" guard: the WHERE clause itself is the
        // TOCTOU-proof check, not a preceding SELECT.
        let result = sqlx::query(
            "UPDATE followups
             SET schedule_enabled = 1,
                 schedule_repeat = ?,
                 schedule_start_date = ?,
                 schedule_end_date = ?,
                 schedule_send_time = ?,
                 schedule_send_time_2 = ?,
                 schedule_interval = ?,
                 schedule_byweekday = ?,
                 schedule_rel_value = ?,
                 schedule_rel_unit = ?,
                 next_send_at = ?,
                 status = 'scheduled',
                 due_date = COALESCE(due_date, ?)
             WHERE id = ? AND user_id = ?
               AND sent_count = 0
               AND status NOT IN ('sent', 'done', 'deleted')",
        )
        .bind(codec::repeat_to_str(rule.repeat))
        .bind(rule.start_date)
        .bind(rule.end_date)
        .bind(rule.send_time)
        .bind(rule.send_time_2)
        .bind(rule.interval)
        .bind(codec::weekdays_to_str(&rule.byweekday))
        .bind(rule.rel_value)
        .bind(rule.rel_unit.map(codec::rel_unit_to_str))
        .bind(next_send_at)
        .bind(due_date)
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;
        tx.commit().await.map_err(backend)?;
        Ok(result.rows_affected() > 0)
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
        let rows = sqlx::query(&format!(
            "SELECT {FOLLOWUP_COLUMNS} FROM followups
             WHERE user_id = ? AND schedule_enabled = 1 AND next_send_at <= ?
               AND status IN ('pending', 'scheduled')
             ORDER BY next_send_at ASC
             LIMIT ?"
        ))
        .bind(user_id)
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter().map(followup_from_row).collect()
    }

    async fn set_status_running(
        &self,
        id: i64,
        user_id: i64,
        attempted_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE followups SET status = 'running', last_attempt_at = ?
             WHERE id = ? AND user_id = ?",
        )
        .bind(attempted_at)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_send_success_once(
        &self,
        id: i64,
        user_id: i64,
        sent_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE followups
             SET status = 'sent', schedule_enabled = 0, next_send_at = NULL,
                 sent_count = sent_count + 1, last_sent_at = ?
             WHERE id = ? AND user_id = ?",
        )
        .bind(sent_at)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_send_success_repeat(
        &self,
        id: i64,
        user_id: i64,
        next_send_at: DateTime<Utc>,
        sent_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE followups
             SET status = 'scheduled', next_send_at = ?,
                 sent_count = sent_count + 1, last_sent_at = ?
             WHERE id = ? AND user_id = ?",
        )
        .bind(next_send_at)
        .bind(sent_at)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_send_failed(
        &self,
        id: i64,
        user_id: i64,
        error: &str,
        attempted_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE followups SET status = 'failed', last_error = ?, last_attempt_at = ?
             WHERE id = ? AND user_id = ?",
        )
        .bind(error)
        .bind(attempted_at)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_schedule_passed(
        &self,
        user_id: i64,
        grace_cutoff: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let result = sqlx::query(
            "UPDATE followups
             SET status = 'passed'
             WHERE user_id = ? AND status = 'scheduled' AND schedule_repeat = 'once'
               AND sent_count = 0 AND next_send_at < ?",
        )
        .bind(user_id)
        .bind(grace_cutoff)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(i64::try_from(result.rows_affected()).unwrap_or(i64::MAX))
    }

    async fn sweep_crash_orphans(&self, older_than: DateTime<Utc>) -> StoreResult<i64> {
        let result = sqlx::query(
            "UPDATE followups
             SET status = 'failed',
                 last_error = 'recovered: running longer than 2x tick interval'
             WHERE status = 'running' AND last_attempt_at < ?",
        )
        .bind(older_than)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(i64::try_from(result.rows_affected()).unwrap_or(i64::MAX))
    }

    async fn insert_activity_log(&self, entry: NewActivityLogEntry) -> StoreResult<i64> {
        let row = sqlx::query(
            "INSERT INTO activity_logs (user_id, followup_id, action, message, created_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(entry.user_id)
        .bind(entry.followup_id)
        .bind(&entry.action)
        .bind(&entry.message)
        .bind(entry.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        row.try_get("id").map_err(backend)
    }

    async fn insert_notification(
        &self,
        user_id: i64,
        message: &str,
        created_at: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let row = sqlx::query(
            "INSERT INTO notifications (user_id, message, read, created_at)
             VALUES (?, ?, 0, ?)
             RETURNING id",
        )
        .bind(user_id)
        .bind(message)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        row.try_get("id").map_err(backend)
    }
}

impl SqliteStore {
    async fn write_schedule_columns(
        &self,
        id: i64,
        user_id: i64,
        rule: Option<ScheduleRule>,
    ) -> StoreResult<()> {
        match rule {
            None => {
                sqlx::query(
                    "UPDATE followups SET schedule_enabled = 0, schedule_repeat = NULL,
                        schedule_start_date = NULL, schedule_end_date = NULL,
                        schedule_send_time_2 = NULL, schedule_byweekday = NULL,
                        schedule_rel_value = NULL, schedule_rel_unit = NULL,
                        next_send_at = NULL
                     WHERE id = ? AND user_id = ?",
                )
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(backend)?;
            }
            Some(rule) => {
                sqlx::query(
                    "UPDATE followups SET
                        schedule_enabled = ?, schedule_repeat = ?, schedule_start_date = ?,
                        schedule_end_date = ?, schedule_send_time = ?, schedule_send_time_2 = ?,
                        schedule_interval = ?, schedule_byweekday = ?, schedule_rel_value = ?,
                        schedule_rel_unit = ?
                     WHERE id = ? AND user_id = ?",
                )
                .bind(rule.enabled)
                .bind(codec::repeat_to_str(rule.repeat))
                .bind(rule.start_date)
                .bind(rule.end_date)
                .bind(rule.send_time)
                .bind(rule.send_time_2)
                .bind(rule.interval)
                .bind(codec::weekdays_to_str(&rule.byweekday))
                .bind(rule.rel_value)
                .bind(rule.rel_unit.map(codec::rel_unit_to_str))
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(backend)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_store::testing::run_store_conformance_tests;

    async fn open_test_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite pool");
        SqliteStore::from_pool(pool).await.expect("migrations")
    }

    #[tokio::test]
    async fn conforms_to_the_shared_store_suite() {
        let store = open_test_store().await;
        run_store_conformance_tests(&store).await.unwrap();
    }
}
