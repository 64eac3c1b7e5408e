//! Schema bootstrap via `CREATE TABLE IF NOT EXISTS` statements, with the
//! typed `ScheduleRule`/branding columns folded directly into the initial
//! table definitions since this is a fresh schema, not an evolving one.

use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            mail_token TEXT,
            created_at TEXT NOT NULL,
            verified INTEGER NOT NULL DEFAULT 0,
            verification_code TEXT,
            code_expires_at TEXT,
            last_code_sent_at TEXT,
            subscription_status TEXT NOT NULL DEFAULT 'none',
            plan TEXT,
            current_period_end TEXT,
            stripe_customer_id TEXT,
            stripe_subscription_id TEXT,
            brand_logo TEXT NOT NULL DEFAULT '',
            brand_color TEXT NOT NULL DEFAULT '#36A2EB',
            company_name TEXT,
            support_email TEXT,
            footer TEXT,
            trial_start TEXT,
            trial_end TEXT,
            auth_provider TEXT,
            google_sub TEXT
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS followups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            client_name TEXT NOT NULL,
            phone TEXT,
            email TEXT,
            followup_type TEXT NOT NULL,
            description TEXT,
            message_override TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            chase_stage INTEGER NOT NULL DEFAULT 0,
            preferred_channel TEXT NOT NULL DEFAULT 'email',
            due_date TEXT,
            created_at TEXT NOT NULL,
            last_error TEXT,
            last_attempt_at TEXT,
            sent_count INTEGER NOT NULL DEFAULT 0,
            last_sent_at TEXT,
            replied_at TEXT,
            schedule_enabled INTEGER NOT NULL DEFAULT 0,
            schedule_repeat TEXT DEFAULT 'once',
            schedule_start_date TEXT,
            schedule_end_date TEXT,
            schedule_send_time TEXT DEFAULT '09:00',
            schedule_send_time_2 TEXT,
            schedule_interval INTEGER DEFAULT 1,
            schedule_byweekday TEXT,
            schedule_rel_value INTEGER,
            schedule_rel_unit TEXT,
            next_send_at TEXT,
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS whatsapp_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            followup_id INTEGER,
            user_id INTEGER,
            message TEXT,
            sent_at TEXT,
            FOREIGN KEY(followup_id) REFERENCES followups(id),
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER,
            message TEXT,
            read INTEGER DEFAULT 0,
            created_at TEXT,
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS email_templates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER,
            name TEXT,
            subject TEXT,
            html_content TEXT,
            created_at TEXT,
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS scheduler_settings (
            user_id INTEGER PRIMARY KEY,
            enabled INTEGER DEFAULT 0,
            start_date TEXT,
            end_date TEXT,
            send_time TEXT DEFAULT '09:00',
            mode TEXT DEFAULT 'both',
            last_bulk_run_date TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS activity_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            followup_id INTEGER,
            action TEXT NOT NULL,
            message TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id),
            FOREIGN KEY(followup_id) REFERENCES followups(id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_followups_user_status_due
            ON followups(user_id, status, due_date)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_followups_user_next_send
            ON followups(user_id, schedule_enabled, next_send_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_whatsapp_logs_user_followup
            ON whatsapp_logs(user_id, followup_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_email_templates_user ON email_templates(user_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_activity_logs_user ON activity_logs(user_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
