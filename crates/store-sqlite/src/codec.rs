//! Text encodings for enum/list columns. SQLite has no native enum or array
//! type, so these round-trip through plain `TEXT` columns.

use cadence_store::model::{RelUnit, Repeat, Weekday};

pub fn repeat_to_str(repeat: Repeat) -> &'static str {
    match repeat {
        Repeat::Once => "once",
        Repeat::Daily => "daily",
        Repeat::TwiceDaily => "twice_daily",
        Repeat::Weekly => "weekly",
        Repeat::EveryNDays => "every_n_days",
        Repeat::Weekday => "weekday",
        Repeat::Relative => "relative",
    }
}

pub fn repeat_from_str(s: &str) -> Result<Repeat, String> {
    Ok(match s {
        "once" => Repeat::Once,
        "daily" => Repeat::Daily,
        "twice_daily" => Repeat::TwiceDaily,
        "weekly" => Repeat::Weekly,
        "every_n_days" => Repeat::EveryNDays,
        "weekday" => Repeat::Weekday,
        "relative" => Repeat::Relative,
        other => return Err(format!("unknown schedule_repeat: {other:?}")),
    })
}

pub fn rel_unit_to_str(unit: RelUnit) -> &'static str {
    match unit {
        RelUnit::Minutes => "minutes",
        RelUnit::Hours => "hours",
        RelUnit::Days => "days",
    }
}

pub fn rel_unit_from_str(s: &str) -> Result<RelUnit, String> {
    Ok(match s {
        "minutes" => RelUnit::Minutes,
        "hours" => RelUnit::Hours,
        "days" => RelUnit::Days,
        other => return Err(format!("unknown schedule_rel_unit: {other:?}")),
    })
}

pub fn weekdays_to_str(days: &[Weekday]) -> String {
    days.iter()
        .map(|d| match d {
            Weekday::Mo => "MO",
            Weekday::Tu => "TU",
            Weekday::We => "WE",
            Weekday::Th => "TH",
            Weekday::Fr => "FR",
            Weekday::Sa => "SA",
            Weekday::Su => "SU",
        })
        .collect::<Vec<_>>()
        .join(",")
}

pub fn weekdays_from_str(s: &str) -> Result<Vec<Weekday>, String> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(',').map(Weekday::parse).collect()
}

pub fn subscription_status_to_str(
    status: cadence_store::model::SubscriptionStatus,
) -> &'static str {
    use cadence_store::model::SubscriptionStatus as S;
    match status {
        S::None => "none",
        S::Trialing => "trialing",
        S::Active => "active",
        S::PastDue => "past_due",
        S::Canceled => "canceled",
        S::Inactive => "inactive",
    }
}

pub fn subscription_status_from_str(
    s: &str,
) -> Result<cadence_store::model::SubscriptionStatus, String> {
    use cadence_store::model::SubscriptionStatus as S;
    Ok(match s {
        "none" => S::None,
        "trialing" => S::Trialing,
        "active" => S::Active,
        "past_due" => S::PastDue,
        "canceled" => S::Canceled,
        "inactive" => S::Inactive,
        other => return Err(format!("unknown subscription_status: {other:?}")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_round_trips_through_its_text_encoding() {
        for repeat in [
            Repeat::Once,
            Repeat::Daily,
            Repeat::TwiceDaily,
            Repeat::Weekly,
            Repeat::EveryNDays,
            Repeat::Weekday,
            Repeat::Relative,
        ] {
            let s = repeat_to_str(repeat);
            assert_eq!(repeat_from_str(s).unwrap(), repeat);
        }
    }

    #[test]
    fn weekdays_round_trip_through_comma_joined_tokens() {
        let days = vec![Weekday::Mo, Weekday::We, Weekday::Fr];
        let s = weekdays_to_str(&days);
        assert_eq!(s, "MO,WE,FR");
        assert_eq!(weekdays_from_str(&s).unwrap(), days);
    }

    #[test]
    fn empty_weekday_string_parses_to_empty_vec() {
        assert!(weekdays_from_str("").unwrap().is_empty());
    }
}
