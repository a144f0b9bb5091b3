//! `AT+CCLK?` response parsing (spec.md §4.7 "CCLK").

use crate::at::lexer::{remove_all_quotes, split_all, strtoi};
use crate::error::{AtError, AtResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockResult {
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Timezone offset in units of 15 minutes, signed.
    pub tz_quarter_hours: i8,
}

fn bounded(v: i64, lo: i64, hi: i64) -> AtResult<i64> {
    if (lo..=hi).contains(&v) {
        Ok(v)
    } else {
        Err(AtError::InvalidData)
    }
}

/// Parses a `"yy/MM/dd,hh:mm:ss±zz"` payload.
pub fn parse_cclk(payload: &[u8]) -> AtResult<ClockResult> {
    let unquoted = remove_all_quotes(payload);
    let parts = split_all(&unquoted, b',');
    let date = parts.first().ok_or(AtError::InvalidData)?;
    let time_tz = parts.get(1).ok_or(AtError::InvalidData)?;

    let date_fields = split_all(date, b'/');
    if date_fields.len() != 3 {
        return Err(AtError::InvalidData);
    }
    let year = bounded(strtoi(date_fields[0], 10)?, 0, 99)? as u8;
    let month = bounded(strtoi(date_fields[1], 10)?, 1, 12)? as u8;
    let day = bounded(strtoi(date_fields[2], 10)?, 1, 31)? as u8;

    let sign_pos = time_tz
        .iter()
        .skip(1)
        .position(|&b| b == b'+' || b == b'-')
        .map(|p| p + 1)
        .ok_or(AtError::InvalidData)?;
    let (time, tz) = time_tz.split_at(sign_pos);

    let time_fields = split_all(time, b':');
    if time_fields.len() != 3 {
        return Err(AtError::InvalidData);
    }
    let hour = bounded(strtoi(time_fields[0], 10)?, 0, 23)? as u8;
    let minute = bounded(strtoi(time_fields[1], 10)?, 0, 59)? as u8;
    let second = bounded(strtoi(time_fields[2], 10)?, 0, 59)? as u8;

    let tz_quarter_hours = bounded(strtoi(tz, 10)?, -96, 96)? as i8;

    Ok(ClockResult { year, month, day, hour, minute, second, tz_quarter_hours })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positive_timezone() {
        let r = parse_cclk(b"\"23/05/17,10:20:30+08\"").unwrap();
        assert_eq!(r, ClockResult { year: 23, month: 5, day: 17, hour: 10, minute: 20, second: 30, tz_quarter_hours: 8 });
    }

    #[test]
    fn parses_negative_timezone() {
        let r = parse_cclk(b"\"23/05/17,10:20:30-04\"").unwrap();
        assert_eq!(r.tz_quarter_hours, -4);
    }

    #[test]
    fn month_out_of_range_is_rejected() {
        assert_eq!(parse_cclk(b"\"23/13/17,10:20:30+08\"").unwrap_err(), AtError::InvalidData);
    }
}
