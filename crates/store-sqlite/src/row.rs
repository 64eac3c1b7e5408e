//! Row <-> domain-type mapping. SQLite has no native enum/date/array types,
//! so every non-trivial column round-trips through the `codec` module's
//! text encodings; `chrono`-typed columns (`DateTime<Utc>`, `NaiveDate`,
//! `NaiveTime`) decode directly via `sqlx`'s `chrono` feature.

use cadence_store::model::{Followup, FollowupStatus, ScheduleRule, SubscriptionStatus, User};
use cadence_store::StoreError;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::codec;

fn map_parse_err(field: &str, err: String) -> StoreError {
    StoreError::Serialization(format!("column {field}: {err}"))
}

pub fn user_from_row(row: &SqliteRow) -> Result<User, StoreError> {
    let status_str: String = row
        .try_get("subscription_status")
        .map_err(|e| StoreError::Backend(e.to_string()))?;
    Ok(User {
        id: row.try_get("id").map_err(|e| StoreError::Backend(e.to_string()))?,
        name: row.try_get("name").map_err(|e| StoreError::Backend(e.to_string()))?,
        email: row.try_get("email").map_err(|e| StoreError::Backend(e.to_string()))?,
        password_hash: row
            .try_get("password_hash")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        verified: row
            .try_get::<i64, _>("verified")
            .map_err(|e| StoreError::Backend(e.to_string()))?
            != 0,
        verification_code: row
            .try_get("verification_code")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        code_expires_at: row
            .try_get("code_expires_at")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        last_code_sent_at: row
            .try_get("last_code_sent_at")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        mail_token: row
            .try_get("mail_token")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        subscription_status: codec::subscription_status_from_str(&status_str)
            .map_err(|e| map_parse_err("subscription_status", e))?,
        plan: row.try_get("plan").map_err(|e| StoreError::Backend(e.to_string()))?,
        current_period_end: row
            .try_get("current_period_end")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        stripe_customer_id: row
            .try_get("stripe_customer_id")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        stripe_subscription_id: row
            .try_get("stripe_subscription_id")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        brand_logo: row
            .try_get("brand_logo")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        brand_color: row
            .try_get("brand_color")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        company_name: row
            .try_get("company_name")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        support_email: row
            .try_get("support_email")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        footer: row.try_get("footer").map_err(|e| StoreError::Backend(e.to_string()))?,
        trial_start: row
            .try_get("trial_start")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        trial_end: row
            .try_get("trial_end")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        auth_provider: row
            .try_get("auth_provider")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        google_sub: row
            .try_get("google_sub")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
    })
}

pub fn followup_from_row(row: &SqliteRow) -> Result<Followup, StoreError> {
    let backend = |e: sqlx::Error| StoreError::Backend(e.to_string());

    let status_str: String = row.try_get("status").map_err(backend)?;
    let status: FollowupStatus = status_str
        .parse()
        .map_err(|e: String| map_parse_err("status", e))?;

    let schedule_enabled: i64 = row.try_get("schedule_enabled").map_err(backend)?;
    let schedule = if schedule_enabled != 0 {
        let repeat_str: Option<String> = row.try_get("schedule_repeat").map_err(backend)?;
        let repeat_str = repeat_str.unwrap_or_else(|| "once".to_string());
        let byweekday_str: Option<String> = row.try_get("schedule_byweekday").map_err(backend)?;
        let rel_unit_str: Option<String> = row.try_get("schedule_rel_unit").map_err(backend)?;
        Some(ScheduleRule {
            enabled: true,
            repeat: codec::repeat_from_str(&repeat_str)
                .map_err(|e| map_parse_err("schedule_repeat", e))?,
            start_date: row.try_get("schedule_start_date").map_err(backend)?,
            end_date: row.try_get("schedule_end_date").map_err(backend)?,
            send_time: row.try_get("schedule_send_time").map_err(backend)?,
            send_time_2: row.try_get("schedule_send_time_2").map_err(backend)?,
            interval: row.try_get("schedule_interval").map_err(backend)?,
            byweekday: codec::weekdays_from_str(&byweekday_str.unwrap_or_default())
                .map_err(|e| map_parse_err("schedule_byweekday", e))?,
            rel_value: row.try_get("schedule_rel_value").map_err(backend)?,
            rel_unit: rel_unit_str
                .map(|s| codec::rel_unit_from_str(&s))
                .transpose()
                .map_err(|e| map_parse_err("schedule_rel_unit", e))?,
        })
    } else {
        None
    };

    Ok(Followup {
        id: row.try_get("id").map_err(backend)?,
        user_id: row.try_get("user_id").map_err(backend)?,
        client_name: row.try_get("client_name").map_err(backend)?,
        email: row.try_get("email").map_err(backend)?,
        phone: row.try_get("phone").map_err(backend)?,
        followup_type: row.try_get("followup_type").map_err(backend)?,
        description: row.try_get("description").map_err(backend)?,
        message_override: row.try_get("message_override").map_err(backend)?,
        status,
        chase_stage: row.try_get("chase_stage").map_err(backend)?,
        preferred_channel: row.try_get("preferred_channel").map_err(backend)?,
        due_date: row.try_get("due_date").map_err(backend)?,
        schedule,
        next_send_at: row.try_get("next_send_at").map_err(backend)?,
        sent_count: row.try_get("sent_count").map_err(backend)?,
        last_sent_at: row.try_get("last_sent_at").map_err(backend)?,
        last_attempt_at: row.try_get("last_attempt_at").map_err(backend)?,
        last_error: row.try_get("last_error").map_err(backend)?,
        replied_at: row.try_get("replied_at").map_err(backend)?,
        created_at: row.try_get("created_at").map_err(backend)?,
    })
}

pub const FOLLOWUP_COLUMNS: &str = "id, user_id, client_name, phone, email, followup_type, \
    description, message_override, status, chase_stage, preferred_channel, due_date, \
    created_at, last_error, last_attempt_at, sent_count, last_sent_at, replied_at, \
    schedule_enabled, schedule_repeat, schedule_start_date, schedule_end_date, \
    schedule_send_time, schedule_send_time_2, schedule_interval, schedule_byweekday, \
    schedule_rel_value, schedule_rel_unit, next_send_at";

pub const USER_COLUMNS: &str = "id, name, email, password_hash, verified, verification_code, \
    code_expires_at, last_code_sent_at, mail_token, subscription_status, plan, \
    current_period_end, stripe_customer_id, stripe_subscription_id, brand_logo, brand_color, \
    company_name, support_email, footer, trial_start, trial_end, auth_provider, google_sub, \
    created_at";

pub fn ensure_default_subscription(status: SubscriptionStatus) -> &'static str {
    codec::subscription_status_to_str(status)
}
