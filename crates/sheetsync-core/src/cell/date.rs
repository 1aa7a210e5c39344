//! Excel date serials and date number formats

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

/// Check if a built-in number format id is a date/time format
pub fn is_builtin_date_format(id: u32) -> bool {
    matches!(id, 14..=22 | 27..=36 | 45..=47 | 50..=58)
}

/// Check if a custom number format code renders a date or time
///
/// Quoted literals, backslash escapes and bracketed sections (colors,
/// conditions, locales) are ignored before looking for date tokens, so
/// `[Red]0.00` or `0 "days"` are not dates while `[$-409]d-mmm-yy` is.
pub fn is_date_format_code(code: &str) -> bool {
    let mut in_quotes = false;
    let mut in_brackets = false;
    let mut escaped = false;

    for c in code.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '"' => in_quotes = !in_quotes,
            _ if in_quotes => {}
            '\\' | '_' | '*' => escaped = true,
            '[' => in_brackets = true,
            ']' => in_brackets = false,
            _ if in_brackets => {}
            'y' | 'Y' | 'm' | 'M' | 'd' | 'D' | 'h' | 'H' | 's' | 'S' => return true,
            _ => {}
        }
    }
    false
}

/// Check if a number format (built-in id plus optional custom code) is a date
pub fn is_date_format(id: u32, code: Option<&str>) -> bool {
    match code {
        Some(code) => is_date_format_code(code),
        None => is_builtin_date_format(id),
    }
}

/// Convert an Excel serial number to a date-time.
///
/// In the 1900 system serial 1 is 1900-01-01 and serial 60 is the
/// non-existent 1900-02-29, which lands on 1900-02-28. In the 1904
/// system serial 0 is 1904-01-01. The time part is rounded to the nearest
/// second.
pub fn serial_to_datetime(serial: f64, date_1904: bool) -> Option<NaiveDateTime> {
    // 2958465 is 9999-12-31, the last date Excel can display
    if !serial.is_finite() || !(0.0..2_958_466.0).contains(&serial) {
        return None;
    }

    let days = serial.trunc() as i64;
    let seconds = ((serial - serial.trunc()) * 86_400.0).round() as i64;

    let date = if date_1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)?.checked_add_signed(Duration::days(days))?
    } else if days >= 60 {
        // Skip the phantom leap day
        NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(days))?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 31)?.checked_add_signed(Duration::days(days))?
    };

    date.and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::seconds(seconds))
}

/// Convert a date-time to an Excel serial number (inverse of [`serial_to_datetime`])
pub fn datetime_to_serial(dt: NaiveDateTime, date_1904: bool) -> f64 {
    let epoch = if date_1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)
    };
    let Some(epoch) = epoch else {
        return 0.0;
    };

    let mut days = (dt.date() - epoch).num_days();
    if !date_1904 && days < 61 {
        days -= 1;
    }
    let seconds = dt.time().num_seconds_from_midnight() as f64;
    days as f64 + seconds / 86_400.0
}
