//! Conversions from raw NMEA field text to typed values.
//!
//! All arithmetic is integer; no value passes through a float on its way
//! into the fix.

use chrono::NaiveDate;

use crate::fix::{Date, FixMode, FixQuality, RawDegrees, Time, YEAR_EPOCH};

#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FieldError {
    #[error("field is empty")]
    Empty,
    #[error("unexpected character in numeric field")]
    InvalidDigit,
    #[error("value out of range")]
    OutOfRange,
    #[error("bad hemisphere indicator")]
    InvalidHemisphere,
    #[error("unknown indicator")]
    InvalidIndicator,
}

type Result<T> = core::result::Result<T, FieldError>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

pub fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Unsigned decimal integer made only of digits.
pub fn parse_u32(field: &[u8]) -> Result<u32> {
    if field.is_empty() {
        return Err(FieldError::Empty);
    }
    field.iter().try_fold(0u32, |acc, &b| {
        if !b.is_ascii_digit() {
            return Err(FieldError::InvalidDigit);
        }
        acc.checked_mul(10)
            .and_then(|acc| acc.checked_add((b - b'0') as u32))
            .ok_or(FieldError::OutOfRange)
    })
}

pub fn parse_u8(field: &[u8]) -> Result<u8> {
    u8::try_from(parse_u32(field)?).map_err(|_| FieldError::OutOfRange)
}

/// Decimal number as hundredths, e.g. `-12.345` is `-1234`. Fraction digits
/// past the second are checked but dropped.
pub fn parse_hundredths(field: &[u8]) -> Result<i32> {
    let (negative, digits) = match field.first() {
        None => return Err(FieldError::Empty),
        Some(b'-') => (true, &field[1..]),
        Some(b'+') => (false, &field[1..]),
        Some(_) => (false, field),
    };
    let (int, frac) = split_decimal(digits);
    if int.is_empty() && frac.is_empty() {
        return Err(FieldError::InvalidDigit);
    }

    let whole = if int.is_empty() { 0 } else { parse_u32(int)? };
    let hundredths = fraction(frac, 2)?;
    let magnitude = whole
        .checked_mul(100)
        .and_then(|w| w.checked_add(hundredths))
        .and_then(|m| i32::try_from(m).ok())
        .ok_or(FieldError::OutOfRange)?;
    Ok(if negative { -magnitude } else { magnitude })
}

pub fn parse_unsigned_hundredths(field: &[u8]) -> Result<u32> {
    let v = parse_hundredths(field)?;
    u32::try_from(v).map_err(|_| FieldError::OutOfRange)
}

/// `DDMM.MMMMM` (latitude) or `DDDMM.MMMMM` (longitude) plus hemisphere.
///
/// The minutes are carried as ten-millionths and turned into billionths of a
/// degree with `(5 * m + 1) / 3`, which is `m * 100 / 60` rounded.
pub fn parse_degrees(field: &[u8], hemisphere: &[u8], axis: Axis) -> Result<RawDegrees> {
    if field.is_empty() || hemisphere.is_empty() {
        return Err(FieldError::Empty);
    }
    let negative = match (axis, hemisphere) {
        (Axis::Latitude, b"N") | (Axis::Longitude, b"E") => false,
        (Axis::Latitude, b"S") | (Axis::Longitude, b"W") => true,
        _ => return Err(FieldError::InvalidHemisphere),
    };

    let (int, frac) = split_decimal(field);
    if int.len() < 3 {
        return Err(FieldError::InvalidDigit);
    }
    let int = parse_u32(int)?;
    let deg = int / 100;
    let minutes = int % 100;
    let limit = match axis {
        Axis::Latitude => 90,
        Axis::Longitude => 180,
    };
    if minutes >= 60 || deg > limit {
        return Err(FieldError::OutOfRange);
    }

    let ten_millionths = minutes as u64 * 10_000_000 + fraction(frac, 7)? as u64;
    let billionths = ((5 * ten_millionths + 1) / 3) as u32;
    if deg == limit && billionths > 0 {
        return Err(FieldError::OutOfRange);
    }

    Ok(RawDegrees {
        deg: deg as u16,
        billionths,
        negative,
    })
}

/// `HHMMSS` with an optional `.ss` fraction.
pub fn parse_time(field: &[u8]) -> Result<Time> {
    let (int, frac) = split_decimal(field);
    if int.is_empty() {
        return Err(FieldError::Empty);
    }
    if int.len() != 6 {
        return Err(FieldError::InvalidDigit);
    }
    let hour = parse_u8(&int[0..2])?;
    let minute = parse_u8(&int[2..4])?;
    let second = parse_u8(&int[4..6])?;
    if hour > 23 || minute > 59 || second > 60 {
        return Err(FieldError::OutOfRange);
    }
    Ok(Time {
        hour,
        minute,
        second,
        centisecond: fraction(frac, 2)? as u8,
    })
}

/// `DDMMYY`, with the year placed in the fixed 2000-2099 window.
pub fn parse_date(field: &[u8]) -> Result<Date> {
    if field.is_empty() {
        return Err(FieldError::Empty);
    }
    if field.len() != 6 {
        return Err(FieldError::InvalidDigit);
    }
    let day = parse_u8(&field[0..2])?;
    let month = parse_u8(&field[2..4])?;
    let year = parse_u8(&field[4..6])?;
    checked_date(YEAR_EPOCH + year as u16, month, day)
}

/// Separate day, month and four digit year fields, as in ZDA.
pub fn parse_date_parts(day: &[u8], month: &[u8], year: &[u8]) -> Result<Date> {
    if year.len() != 4 {
        return Err(if year.is_empty() {
            FieldError::Empty
        } else {
            FieldError::InvalidDigit
        });
    }
    let year = parse_u32(year)? as u16;
    checked_date(year, parse_u8(month)?, parse_u8(day)?)
}

pub fn parse_fix_quality(field: &[u8]) -> Result<FixQuality> {
    match field {
        [] => Err(FieldError::Empty),
        [b] => FixQuality::from_digit(*b).ok_or(FieldError::InvalidIndicator),
        _ => Err(FieldError::InvalidIndicator),
    }
}

/// Single mode character; GNS carries one per constellation and the first
/// one is used.
pub fn parse_fix_mode(field: &[u8]) -> Result<FixMode> {
    match field.first() {
        None => Err(FieldError::Empty),
        Some(&b) => FixMode::from_char(b).ok_or(FieldError::InvalidIndicator),
    }
}

/// Rejects dates that do not exist on the calendar, such as 31 February.
fn checked_date(year: u16, month: u8, day: u8) -> Result<Date> {
    NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .map(|_| Date { year, month, day })
        .ok_or(FieldError::OutOfRange)
}

fn split_decimal(field: &[u8]) -> (&[u8], &[u8]) {
    match field.iter().position(|&b| b == b'.') {
        Some(dot) => (&field[..dot], &field[dot + 1..]),
        None => (field, &[]),
    }
}

/// The first `places` fraction digits as an integer scaled to `places`
/// digits (`"5"` with two places is 50). Remaining digits are validated and
/// dropped.
fn fraction(frac: &[u8], places: u32) -> Result<u32> {
    if !frac.iter().all(u8::is_ascii_digit) {
        return Err(FieldError::InvalidDigit);
    }
    let mut value = 0;
    for i in 0..places as usize {
        let digit = frac.get(i).map_or(0, |b| (b - b'0') as u32);
        value = value * 10 + digit;
    }
    Ok(value)
}
