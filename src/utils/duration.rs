use jiff::SignedDuration;

/// Number of 100ns ticks in one second.
pub const TICKS_PER_SECOND: u64 = 10_000_000;

const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_HOUR: i64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;

/// Number of 100ns ticks in one microsecond.
const TICKS_PER_MICROSECOND: u128 = 10;
const MICROS_PER_SECOND: u128 = 1_000_000;

/// Largest day count a duration may reach.
pub const MAX_DAYS: i64 = 999_999_999;

/// Converts a count of 100ns ticks into a whole-second duration.
///
/// Ticks are rounded to the nearest microsecond, then floored to whole seconds.
/// Returns `None` if `ticks` is not a plain run of ASCII digits, or spans more than [`MAX_DAYS`].
pub fn ticks_to_duration(ticks: &str) -> Option<SignedDuration> {
    if ticks.is_empty() || !ticks.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let ticks: u128 = ticks.parse().ok()?;
    let micros = ticks.checked_add(TICKS_PER_MICROSECOND / 2)? / TICKS_PER_MICROSECOND;
    let secs = i64::try_from(micros / MICROS_PER_SECOND).ok()?;

    if secs / SECS_PER_DAY > MAX_DAYS {
        return None;
    }

    Some(SignedDuration::from_secs(secs))
}

/// Renders a tick count as `{days}g {hh}:{mm}:{ss}`.
///
/// Anything that isn't a non-negative integer is handed back verbatim, this never fails.
///
/// ```
/// use wdi_trace::decode_tick_duration;
///
/// assert_eq!(decode_tick_duration("36610000000"), "0g 01:01:01");
/// assert_eq!(decode_tick_duration("abc"), "abc");
/// ```
pub fn decode_tick_duration(ticks: &str) -> String {
    match ticks_to_duration(ticks) {
        Some(duration) => format_duration(duration),
        None => ticks.to_owned(),
    }
}

fn format_duration(duration: SignedDuration) -> String {
    let total = duration.as_secs();

    let days = total / SECS_PER_DAY;
    let hours = (total % SECS_PER_DAY) / SECS_PER_HOUR;
    let minutes = (total % SECS_PER_HOUR) / SECS_PER_MINUTE;
    let seconds = total % SECS_PER_MINUTE;

    format!("{days}g {hours:02}:{minutes:02}:{seconds:02}")
}
