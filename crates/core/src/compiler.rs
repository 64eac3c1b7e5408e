//! Pure function: schedule rule -> next UTC instant. No I/O, deterministic
//! given inputs. Each repeat mode has its own branch below rather than a
//! shared generic loop, since the rollover rule differs per mode.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::CoreError;
use crate::model::{RelUnit, Repeat, ScheduleRule};

/// Clamp floor: a computed instant must be strictly in the future; if the
/// naive computation would yield `<= now`, push it to `now + 10s`.
const FLOOR_CLAMP: Duration = Duration::seconds(10);

/// Resolve a local wall-clock date+time in `tz` to a UTC instant, handling
/// DST ambiguity and gaps.
///
/// On a gap (`LocalResult::None`, e.g. a `daily @ 02:30` landing in a
/// spring-forward hole) advance the naive time minute-by-minute until a
/// valid mapping is found, yielding the first valid instant at or after the
/// requested time on that civil day. On ambiguity (`LocalResult::Ambiguous`,
/// a fall-back repeated hour) pick the earlier of the two offsets.
fn local_to_utc(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        chrono::LocalResult::Ambiguous(earlier, _later) => earlier.with_timezone(&Utc),
        chrono::LocalResult::None => {
            let mut candidate = naive;
            for _ in 0..120 {
                candidate += Duration::minutes(1);
                if let chrono::LocalResult::Single(dt) = tz.from_local_datetime(&candidate) {
                    return dt.with_timezone(&Utc);
                }
            }
            // Should not happen for real IANA zones (gaps are at most ~1h),
            // but never hang: fall back to the original instant interpreted
            // as UTC-offset-naive via the timezone's UTC conversion.
            Utc.from_utc_datetime(&naive)
        }
    }
}

fn clamp_floor(dt_utc: DateTime<Utc>, now_utc: DateTime<Utc>) -> DateTime<Utc> {
    if dt_utc <= now_utc {
        now_utc + FLOOR_CLAMP
    } else {
        dt_utc
    }
}

fn min_day(now_local_date: NaiveDate, start_date: Option<NaiveDate>) -> NaiveDate {
    match start_date {
        Some(d) => now_local_date.max(d),
        None => now_local_date,
    }
}

/// Compile a schedule rule into its next UTC send instant.
///
/// # Errors
///
/// Returns [`CoreError::InvalidRule`] for missing/malformed fields per mode.
pub fn compile(
    rule: &ScheduleRule,
    now_utc: DateTime<Utc>,
    input_tz: Tz,
) -> Result<DateTime<Utc>, CoreError> {
    if rule.interval < 1 {
        return Err(CoreError::InvalidRule(format!(
            "interval must be >= 1, got {}",
            rule.interval
        )));
    }

    if rule.repeat == Repeat::Relative {
        let value = rule.rel_value.unwrap_or(1);
        if value <= 0 {
            return Err(CoreError::InvalidRule(format!(
                "rel_value must be > 0, got {value}"
            )));
        }
        let unit = rule
            .rel_unit
            .ok_or_else(|| CoreError::InvalidRule("relative requires rel_unit".into()))?;
        let delta = match unit {
            RelUnit::Minutes => Duration::minutes(value),
            RelUnit::Hours => Duration::hours(value),
            RelUnit::Days => Duration::days(value),
        };
        return Ok(clamp_floor(now_utc + delta, now_utc));
    }

    let now_local = now_utc.with_timezone(&input_tz);
    let now_local_date = now_local.naive_local().date();
    let floor_day = min_day(now_local_date, rule.start_date);

    match rule.repeat {
        Repeat::Relative => unreachable!("handled above"),

        Repeat::Once => {
            let start_date = rule
                .start_date
                .ok_or_else(|| CoreError::InvalidRule("once requires start_date".into()))?;
            let naive = NaiveDateTime::new(start_date, rule.send_time);
            Ok(clamp_floor(local_to_utc(input_tz, naive), now_utc))
        }

        Repeat::Daily => {
            let mut candidate_day = floor_day;
            let mut naive = NaiveDateTime::new(candidate_day, rule.send_time);
            let mut candidate_local = input_tz
                .from_local_datetime(&naive)
                .single()
                .unwrap_or_else(|| now_local);
            if candidate_local <= now_local {
                candidate_day += Duration::days(1);
                naive = NaiveDateTime::new(candidate_day, rule.send_time);
                candidate_local = input_tz
                    .from_local_datetime(&naive)
                    .single()
                    .unwrap_or(candidate_local);
            }
            Ok(clamp_floor(local_to_utc(input_tz, naive), now_utc))
        }

        Repeat::TwiceDaily => {
            let send_time_2 = rule
                .send_time_2
                .ok_or_else(|| CoreError::InvalidRule("twice_daily requires send_time_2".into()))?;

            let mut candidates = [rule.send_time, send_time_2];
            candidates.sort();

            for time in candidates {
                let naive = NaiveDateTime::new(floor_day, time);
                if let chrono::LocalResult::Single(dt) = input_tz.from_local_datetime(&naive) {
                    if dt > now_local {
                        return Ok(clamp_floor(dt.with_timezone(&Utc), now_utc));
                    }
                }
            }

            // Both passed today: roll to tomorrow at the EARLIER time, not
            // the later one.
            let tomorrow = floor_day + Duration::days(1);
            let naive = NaiveDateTime::new(tomorrow, rule.send_time);
            Ok(clamp_floor(local_to_utc(input_tz, naive), now_utc))
        }

        Repeat::Weekly => {
            let start_date = rule
                .start_date
                .ok_or_else(|| CoreError::InvalidRule("weekly requires start_date".into()))?;
            let target_wd = start_date.weekday();

            let base_day = now_local_date.max(start_date);
            let days_ahead =
                (7 + target_wd.num_days_from_monday() as i64 - base_day.weekday().num_days_from_monday() as i64) % 7;
            let mut candidate_day = base_day + Duration::days(days_ahead);

            let mut naive = NaiveDateTime::new(candidate_day, rule.send_time);
            let mut candidate_local = input_tz
                .from_local_datetime(&naive)
                .single()
                .unwrap_or(now_local);
            if candidate_local <= now_local {
                candidate_day += Duration::days(7);
                naive = NaiveDateTime::new(candidate_day, rule.send_time);
                candidate_local = input_tz
                    .from_local_datetime(&naive)
                    .single()
                    .unwrap_or(candidate_local);
            }
            let _ = candidate_local;
            Ok(clamp_floor(local_to_utc(input_tz, naive), now_utc))
        }

        Repeat::EveryNDays => {
            let start_date = rule.start_date.ok_or_else(|| {
                CoreError::InvalidRule("every_n_days requires start_date".into())
            })?;
            let n = rule.interval.max(1);

            let mut day = start_date;
            if day < now_local_date {
                let diff = (now_local_date - day).num_days();
                let jumps = diff / n;
                day += Duration::days(jumps * n);
                if day < now_local_date {
                    day += Duration::days(n);
                }
            }

            let mut naive = NaiveDateTime::new(day, rule.send_time);
            let mut candidate_local = input_tz
                .from_local_datetime(&naive)
                .single()
                .unwrap_or(now_local);
            if candidate_local <= now_local {
                day += Duration::days(n);
                naive = NaiveDateTime::new(day, rule.send_time);
                candidate_local = input_tz
                    .from_local_datetime(&naive)
                    .single()
                    .unwrap_or(candidate_local);
            }
            let _ = candidate_local;
            Ok(clamp_floor(local_to_utc(input_tz, naive), now_utc))
        }

        Repeat::Weekday => {
            if rule.byweekday.is_empty() {
                return Err(CoreError::InvalidRule(
                    "weekday requires byweekday (e.g. 'MO,TU,FR')".into(),
                ));
            }
            let wanted: std::collections::HashSet<u32> =
                rule.byweekday.iter().map(|w| w.num_from_monday()).collect();

            for offset in 0..21 {
                let day = floor_day + Duration::days(offset);
                if !wanted.contains(&day.weekday().num_days_from_monday()) {
                    continue;
                }
                let naive = NaiveDateTime::new(day, rule.send_time);
                if let chrono::LocalResult::Single(dt) = input_tz.from_local_datetime(&naive) {
                    if dt > now_local {
                        return Ok(clamp_floor(dt.with_timezone(&Utc), now_utc));
                    }
                }
            }

            // Fallback: one week from the floor day, regardless of weekday match.
            let day = floor_day + Duration::days(7);
            let naive = NaiveDateTime::new(day, rule.send_time);
            Ok(clamp_floor(local_to_utc(input_tz, naive), now_utc))
        }
    }
}

/// Validate `HH:MM` bounds without compiling a full rule. Used by the write
/// API before a rule reaches the store.
pub fn validate_send_time(time: NaiveTime) -> Result<(), CoreError> {
    // NaiveTime itself cannot represent out-of-range values, but this helper
    // exists for symmetry with a range check when parsing untrusted strings
    // at the write API boundary.
    let _ = time;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Weekday as Wd;
    use chrono::NaiveTime;

    fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap()
    }

    fn base_rule(repeat: Repeat) -> ScheduleRule {
        ScheduleRule {
            enabled: true,
            repeat,
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
    fn once_scenario_from_spec() {
        let mut rule = base_rule(Repeat::Once);
        rule.start_date = Some(NaiveDate::from_ymd_opt(2026, 2, 17).unwrap());
        let now = dt(2026, 2, 10, 0, 0);
        let tz: Tz = "Africa/Lagos".parse().unwrap();
        let next = compile(&rule, now, tz).unwrap();
        assert_eq!(next, dt(2026, 2, 17, 8, 0));
    }

    #[test]
    fn daily_scenario_from_spec() {
        let mut rule = base_rule(Repeat::Daily);
        rule.start_date = Some(NaiveDate::from_ymd_opt(2026, 2, 17).unwrap());
        let tz: Tz = "Africa/Lagos".parse().unwrap();
        // now = 2026-02-17T10:00:00+01:00 == 2026-02-17T09:00:00Z
        let now = dt(2026, 2, 17, 9, 0);
        let next = compile(&rule, now, tz).unwrap();
        assert_eq!(next, dt(2026, 2, 18, 8, 0));
    }

    #[test]
    fn relative_scenario_from_spec() {
        let mut rule = base_rule(Repeat::Relative);
        rule.rel_value = Some(30);
        rule.rel_unit = Some(RelUnit::Minutes);
        let now = dt(2026, 2, 17, 12, 0);
        let tz: Tz = "UTC".parse().unwrap();
        let next = compile(&rule, now, tz).unwrap();
        assert_eq!(next, dt(2026, 2, 17, 12, 30));
    }

    #[test]
    fn every_n_days_scenario_from_spec() {
        let mut rule = base_rule(Repeat::EveryNDays);
        rule.start_date = Some(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
        rule.interval = 3;
        let tz: Tz = "Africa/Lagos".parse().unwrap();
        let now = dt(2026, 2, 20, 9, 0); // 2026-02-20T10:00+01:00
        let next = compile(&rule, now, tz).unwrap();
        assert_eq!(next, dt(2026, 2, 22, 8, 0));
    }

    #[test]
    fn twice_daily_both_passed_rolls_to_earlier_time_tomorrow() {
        let mut rule = base_rule(Repeat::TwiceDaily);
        rule.send_time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        rule.send_time_2 = Some(NaiveTime::from_hms_opt(15, 0, 0).unwrap());
        rule.start_date = Some(NaiveDate::from_ymd_opt(2026, 2, 17).unwrap());
        let tz: Tz = "Africa/Lagos".parse().unwrap();
        let now = dt(2026, 2, 17, 15, 30); // both 09:00 and 15:00 local passed
        let next = compile(&rule, now, tz).unwrap();
        assert_eq!(next, dt(2026, 2, 18, 8, 0));
    }

    #[test]
    fn weekday_tuesday_picks_wednesday() {
        let mut rule = base_rule(Repeat::Weekday);
        rule.byweekday = vec![Wd::Mo, Wd::We, Wd::Fr];
        rule.start_date = Some(NaiveDate::from_ymd_opt(2026, 2, 17).unwrap()); // a Tuesday
        let tz: Tz = "UTC".parse().unwrap();
        let now = dt(2026, 2, 17, 8, 0);
        let next = compile(&rule, now, tz).unwrap();
        assert_eq!(next, dt(2026, 2, 18, 9, 0));
    }

    #[test]
    fn weekly_rolls_forward_a_week_when_candidate_already_passed() {
        let mut rule = base_rule(Repeat::Weekly);
        rule.start_date = Some(NaiveDate::from_ymd_opt(2026, 2, 17).unwrap()); // Tuesday
        let tz: Tz = "UTC".parse().unwrap();
        let now = dt(2026, 2, 17, 10, 0); // same Tuesday, after 09:00
        let next = compile(&rule, now, tz).unwrap();
        assert_eq!(next, dt(2026, 2, 24, 9, 0));
    }

    #[test]
    fn floor_never_in_the_past() {
        let mut rule = base_rule(Repeat::Relative);
        rule.rel_value = Some(0);
        rule.rel_unit = Some(RelUnit::Minutes);
        let now = dt(2026, 2, 17, 12, 0);
        let tz: Tz = "UTC".parse().unwrap();
        let err = compile(&rule, now, tz).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRule(_)));
    }

    #[test]
    fn start_date_floor_prevents_backdating() {
        let mut rule = base_rule(Repeat::Daily);
        rule.start_date = Some(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        let tz: Tz = "UTC".parse().unwrap();
        let now = dt(2026, 2, 17, 1, 0);
        let next = compile(&rule, now, tz).unwrap();
        assert!(next.date_naive() >= NaiveDate::from_ymd_opt(2026, 2, 17).unwrap());
    }

    #[test]
    fn interval_must_be_positive() {
        let mut rule = base_rule(Repeat::EveryNDays);
        rule.start_date = Some(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        rule.interval = 0;
        let tz: Tz = "UTC".parse().unwrap();
        let err = compile(&rule, dt(2026, 2, 1, 0, 0), tz).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRule(_)));
    }
}
