/// Exchange session boundaries in Moscow time
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use chrono_tz::Europe::Moscow;

/// Hour (MSK) after which the previous day's history is final
pub const SESSION_BOUNDARY_HOUR: u32 = 6;

/// Next 06:00 MSK strictly after `now`, in UTC
pub fn next_session_boundary(now: DateTime<Utc>) -> DateTime<Utc> {
    let now_msk = now.with_timezone(&Moscow);

    // Moscow has no DST, so the local time always exists
    let today_boundary = Moscow
        .with_ymd_and_hms(
            now_msk.year(),
            now_msk.month(),
            now_msk.day(),
            SESSION_BOUNDARY_HOUR,
            0,
            0,
        )
        .single()
        .unwrap_or(now_msk);

    if now_msk < today_boundary {
        today_boundary.with_timezone(&Utc)
    } else {
        (today_boundary + Duration::days(1)).with_timezone(&Utc)
    }
}
