use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::America::New_York;

/// Regular session open, minutes since midnight exchange-local (09:30).
const SESSION_OPEN_MINUTE: u32 = 9 * 60 + 30;
/// Session close, exclusive (16:00).
const SESSION_CLOSE_MINUTE: u32 = 16 * 60;

/// Whether the exchange is open at an already-localized timestamp:
/// a weekday, within [09:30, 16:00). Pure; holidays are not modelled.
pub fn is_market_open_at<Tz: TimeZone>(local: &DateTime<Tz>) -> bool {
    let weekday = local.weekday();
    if weekday == Weekday::Sat || weekday == Weekday::Sun {
        return false;
    }
    let minute_of_day = local.hour() * 60 + local.minute();
    (SESSION_OPEN_MINUTE..SESSION_CLOSE_MINUTE).contains(&minute_of_day)
}

/// Whether the exchange is open at a UTC instant, localized to New York.
pub fn is_market_open(now: DateTime<Utc>) -> bool {
    is_market_open_at(&now.with_timezone(&New_York))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;

    fn et(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<chrono_tz::Tz> {
        New_York.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn closed_on_saturday_mid_morning() {
        // 2026-01-03 is a Saturday
        assert!(!is_market_open_at(&et(2026, 1, 3, 10, 0)));
    }

    #[test]
    fn closed_just_before_the_bell() {
        // 2026-01-06 is a Tuesday
        assert!(!is_market_open_at(&et(2026, 1, 6, 9, 29)));
    }

    #[test]
    fn open_at_the_bell_and_through_the_close_minus_one() {
        assert!(is_market_open_at(&et(2026, 1, 6, 9, 30)));
        assert!(is_market_open_at(&et(2026, 1, 6, 15, 59)));
    }

    #[test]
    fn closed_at_four_sharp() {
        assert!(!is_market_open_at(&et(2026, 1, 6, 16, 0)));
    }

    #[test]
    fn utc_wrapper_localizes_to_new_york() {
        // 14:30 UTC on a January Tuesday is 09:30 ET (EST, UTC-5).
        let utc = Utc.with_ymd_and_hms(2026, 1, 6, 14, 30, 0).unwrap();
        assert!(is_market_open(utc));
        let utc = Utc.with_ymd_and_hms(2026, 1, 6, 14, 29, 0).unwrap();
        assert!(!is_market_open(utc));
    }
}
