//! Text renditions of the fix: fixed-width fields for the status page and
//! CSV rows for the log.
//!
//! Fixed-width fields follow the receiver-demo convention: a missing value is
//! drawn as `len - 1` asterisks and a space, so columns keep their width
//! whether or not the receiver has reported yet.

use core::fmt::{self, Write};

use crate::{
    fix::{Date, Fix, Time, TrackedValue},
    FmtBuf,
};

pub const CSV_HEADER: &str = "sats_valid,sats,hdop,lat,lng,fix_age_ms,date,time,alt_m,course_deg,speed_kmph,chars,sentences_with_fix,failed_checksum\r\n";

/// When a tracked value is recent enough to show.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Freshness {
    pub now_ms: u32,
    pub stale_after_ms: Option<u32>,
}

impl Freshness {
    /// Any valid value is shown, however old.
    pub fn at(now_ms: u32) -> Self {
        Self {
            now_ms,
            stale_after_ms: None,
        }
    }

    /// Values older than `stale_after_ms` are shown as missing.
    pub fn with_limit(now_ms: u32, stale_after_ms: u32) -> Self {
        Self {
            now_ms,
            stale_after_ms: Some(stale_after_ms),
        }
    }

    pub fn current<T: Copy>(&self, v: &TrackedValue<T>) -> Option<T> {
        let age = v.age(self.now_ms)?;
        match self.stale_after_ms {
            Some(limit) if age > limit => None,
            _ => Some(v.value()),
        }
    }

    pub fn age<T: Copy>(&self, v: &TrackedValue<T>) -> Option<u32> {
        self.current(v).and(v.age(self.now_ms))
    }
}

fn write_missing<W: Write>(w: &mut W, len: usize) -> fmt::Result {
    for _ in 1..len {
        w.write_char('*')?;
    }
    if len > 0 {
        w.write_char(' ')?;
    }
    Ok(())
}

fn pad<W: Write>(w: &mut W, written: usize, len: usize) -> fmt::Result {
    for _ in written..len {
        w.write_char(' ')?;
    }
    Ok(())
}

/// Integer in exactly `len` columns, the last of which is always a space.
/// Digits that do not fit are cut off.
pub fn write_int<W: Write>(w: &mut W, val: Option<u32>, len: usize) -> fmt::Result {
    let Some(val) = val else {
        return write_missing(w, len);
    };
    if len == 0 {
        return Ok(());
    }
    let mut digits = FmtBuf::<12>::new();
    write!(digits, "{}", val)?;
    let digits = digits.as_str().unwrap_or_default();
    let shown = &digits[..digits.len().min(len - 1)];
    w.write_str(shown)?;
    pad(w, shown.len(), len)
}

/// Float with `prec` decimals, padded to at least `len` columns.
pub fn write_float<W: Write>(w: &mut W, val: Option<f64>, len: usize, prec: usize) -> fmt::Result {
    let Some(val) = val else {
        return write_missing(w, len);
    };
    let mut text = FmtBuf::<32>::new();
    write!(text, "{:.*}", prec, val)?;
    w.write_str(text.as_str().unwrap_or_default())?;
    pad(w, text.len(), len)
}

/// `MM/DD/YYYY ` followed by the age in a five column field.
pub fn write_date<W: Write>(w: &mut W, date: &TrackedValue<Date>, fresh: Freshness) -> fmt::Result {
    match fresh.current(date) {
        Some(d) => write!(w, "{:02}/{:02}/{:04} ", d.month, d.day, d.year)?,
        None => w.write_str("********** ")?,
    }
    write_int(w, fresh.age(date), 5)
}

/// `HH:MM:SS ` followed by the age in a five column field.
pub fn write_time<W: Write>(w: &mut W, time: &TrackedValue<Time>, fresh: Freshness) -> fmt::Result {
    match fresh.current(time) {
        Some(t) => write!(w, "{:02}:{:02}:{:02} ", t.hour, t.minute, t.second)?,
        None => w.write_str("******** ")?,
    }
    write_int(w, fresh.age(time), 5)
}

pub fn write_csv_header<W: Write>(w: &mut W) -> fmt::Result {
    w.write_str(CSV_HEADER)
}

/// One log line matching [`CSV_HEADER`]. Quantities the receiver has not
/// reported yet are left empty.
pub fn write_csv_row<W: Write>(w: &mut W, fix: &Fix, now_ms: u32) -> fmt::Result {
    write!(
        w,
        "{},{},",
        fix.satellites.is_valid() as u8,
        fix.satellites.value()
    )?;
    if let Some(hdop) = fix.hdop.get() {
        write!(w, "{:.2}", hdop.hdop())?;
    }
    w.write_char(',')?;
    match fix.location.get() {
        Some(pos) => write!(w, "{:.6},{:.6},", pos.lat_degrees(), pos.lon_degrees())?,
        None => w.write_str(",,")?,
    }
    if let Some(age) = fix.location.age(now_ms) {
        write!(w, "{}", age)?;
    }
    w.write_char(',')?;
    if let Some(d) = fix.date.get() {
        write!(w, "{}/{}/{}", d.month, d.day, d.year)?;
    }
    w.write_char(',')?;
    if let Some(t) = fix.time.get() {
        write!(w, "{:02}:{:02}:{:02}", t.hour, t.minute, t.second)?;
    }
    w.write_char(',')?;
    if let Some(alt) = fix.altitude.get() {
        write!(w, "{:.2}", alt.meters())?;
    }
    w.write_char(',')?;
    if let Some(course) = fix.course.get() {
        write!(w, "{:.2}", course.degrees())?;
    }
    w.write_char(',')?;
    if let Some(speed) = fix.speed.get() {
        write!(w, "{:.2}", speed.kmph())?;
    }
    write!(
        w,
        ",{},{},{}\r\n",
        fix.stats.chars_processed, fix.stats.sentences_with_fix, fix.stats.failed_checksum
    )
}

/// One log file per UTC day: `/DDMMYYYY.csv`, or `/NULLFiles.csv` until the
/// receiver has reported a date.
pub fn log_file_name(date: Option<Date>) -> FmtBuf<16> {
    let mut name = FmtBuf::new();
    // Both names fit in 16 bytes
    let _ = match date {
        Some(d) => write!(name, "/{:02}{:02}{:04}.csv", d.day, d.month, d.year),
        None => name.write_str("/NULLFiles.csv"),
    };
    name
}
