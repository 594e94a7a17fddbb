use time::{format_description::FormatItem, macros::format_description, Duration, OffsetDateTime};

const DISPLAY_FORMAT: &[FormatItem<'static>] = format_description!(
    "[month]/[day]/[year repr:last_two] [hour repr:12 padding:zero]:[minute]:[second] [period] UTC"
);

/// Current UTC time with sub-second precision dropped, so issued-at and
/// expiry claims round-trip exactly through epoch seconds.
pub fn utc_now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_microsecond(0).unwrap_or(now)
}

/// Timezone-aware datetime from a unix timestamp claim.
pub fn from_timestamp(timestamp: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(timestamp).ok()
}

/// Time left until the given unix timestamp, floored at zero.
pub fn remaining_until(timestamp: i64) -> Duration {
    let Some(expires) = from_timestamp(timestamp) else {
        return Duration::ZERO;
    };
    let remaining = expires - OffsetDateTime::now_utc();
    if remaining < Duration::ZERO {
        Duration::ZERO
    } else {
        remaining
    }
}

/// Readable duration string, e.g. "1 hours 4 minutes 10 seconds".
pub fn format_duration(duration: Duration) -> String {
    let total = duration.whole_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    if days > 0 {
        let unit = if days > 1 { "days" } else { "day" };
        format!("{days} {unit} {hours} hours {minutes} minutes {seconds} seconds")
    } else if hours > 0 {
        format!("{hours} hours {minutes} minutes {seconds} seconds")
    } else if minutes > 0 {
        format!("{minutes} minutes {seconds} seconds")
    } else {
        format!("{seconds} seconds")
    }
}

/// Display form of a stored timestamp, e.g. "01/01/20 12:00:00 AM UTC".
pub fn format_datetime(dt: OffsetDateTime) -> String {
    let utc = dt.to_offset(time::UtcOffset::UTC);
    utc.format(&DISPLAY_FORMAT)
        .unwrap_or_else(|_| utc.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utc_now_has_no_subsecond_component() {
        assert_eq!(utc_now().microsecond(), 0);
    }

    #[test]
    fn format_duration_cascades_units() {
        assert_eq!(format_duration(Duration::seconds(0)), "0 seconds");
        assert_eq!(format_duration(Duration::seconds(42)), "42 seconds");
        assert_eq!(
            format_duration(Duration::seconds(3 * 60 + 5)),
            "3 minutes 5 seconds"
        );
        assert_eq!(
            format_duration(Duration::seconds(3_600 + 4 * 60 + 10)),
            "1 hours 4 minutes 10 seconds"
        );
        assert_eq!(
            format_duration(Duration::seconds(2 * 86_400 + 3_600)),
            "2 days 1 hours 0 minutes 0 seconds"
        );
    }

    #[test]
    fn format_duration_clamps_negative() {
        assert_eq!(format_duration(Duration::seconds(-30)), "0 seconds");
    }

    #[test]
    fn remaining_until_past_timestamp_is_zero() {
        let past = OffsetDateTime::now_utc().unix_timestamp() - 60;
        assert_eq!(remaining_until(past), Duration::ZERO);
    }

    #[test]
    fn remaining_until_future_timestamp_is_positive() {
        let future = OffsetDateTime::now_utc().unix_timestamp() + 3_600;
        let remaining = remaining_until(future);
        assert!(remaining > Duration::minutes(59));
        assert!(remaining <= Duration::hours(1));
    }

    #[test]
    fn format_datetime_display_form() {
        // 2020-01-01 00:00:00 UTC
        let dt = OffsetDateTime::from_unix_timestamp(1_577_836_800).unwrap();
        assert_eq!(format_datetime(dt), "01/01/20 12:00:00 AM UTC");
    }
}
