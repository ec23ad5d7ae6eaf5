//! Time source and ASN.1 time formatting for issued tokens.
//!
//! The self-issued authority trusts the host clock. Tokens carry
//! second-precision GeneralizedTime, matching a one-second accuracy.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the time attested in a token.
pub trait Clock {
    /// Seconds since the Unix epoch.
    fn unix_secs(&self) -> u64;
}

/// Host system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_else(|_| {
                log::warn!("system clock is before the Unix epoch");
                0
            })
    }
}

/// A clock frozen at one instant, for reproducible tokens.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn unix_secs(&self) -> u64 {
        self.0
    }
}

/// Format a Unix timestamp (seconds) as a GeneralizedTime string.
///
/// Output format: "YYYYMMDDHHMMSSZ" (exactly 15 bytes).
pub fn format_generalized_time(unix_secs: u64) -> [u8; 15] {
    let (year, month, day, hour, minute, second) = unix_secs_to_datetime(unix_secs);

    let mut buf = [0u8; 15];
    write_decimal(&mut buf[0..4], year as u32, 4);
    write_decimal(&mut buf[4..6], month as u32, 2);
    write_decimal(&mut buf[6..8], day as u32, 2);
    write_decimal(&mut buf[8..10], hour as u32, 2);
    write_decimal(&mut buf[10..12], minute as u32, 2);
    write_decimal(&mut buf[12..14], second as u32, 2);
    buf[14] = b'Z';
    buf
}

/// Format a Unix timestamp (seconds) as a UTCTime string.
///
/// Output format: "YYMMDDHHMMSSZ" (exactly 13 bytes). Returns `None`
/// outside 1950..=2049, where RFC 5280 requires GeneralizedTime instead.
pub fn format_utc_time(unix_secs: u64) -> Option<[u8; 13]> {
    let generalized = format_generalized_time(unix_secs);
    let (year, ..) = unix_secs_to_datetime(unix_secs);
    if year >= 2050 {
        return None;
    }
    let mut buf = [0u8; 13];
    buf.copy_from_slice(&generalized[2..]);
    Some(buf)
}

/// Write a decimal number into a fixed-width ASCII buffer (zero-padded).
fn write_decimal(buf: &mut [u8], mut value: u32, width: usize) {
    for i in (0..width).rev() {
        buf[i] = b'0' + (value % 10) as u8;
        value /= 10;
    }
}

/// Convert Unix seconds to (year, month, day, hour, minute, second).
///
/// No leap-second awareness (standard for GeneralizedTime).
fn unix_secs_to_datetime(secs: u64) -> (u16, u8, u8, u8, u8, u8) {
    let second = (secs % 60) as u8;
    let mins_total = secs / 60;
    let minute = (mins_total % 60) as u8;
    let hours_total = mins_total / 60;
    let hour = (hours_total % 24) as u8;
    let mut days = hours_total / 24;

    // Calculate year and remaining days
    let mut year: u16 = 1970;
    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if days < days_in_year || year == 9999 {
            break;
        }
        days -= days_in_year;
        year += 1;
    }

    // Calculate month and day
    let months_days: [u64; 12] = if is_leap_year(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };

    let mut month: u8 = 1;
    for &md in &months_days {
        if days < md || month == 12 {
            break;
        }
        days -= md;
        month += 1;
    }

    let day = (days + 1).min(31) as u8; // days are 1-based

    (year, month, day, hour, minute, second)
}

fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
