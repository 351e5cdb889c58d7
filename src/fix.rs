//! The aggregated GPS fix.
//!
//! Every decoded quantity is wrapped in a [`TrackedValue`], which remembers
//! whether it has ever been decoded and when it was last refreshed. Values are
//! never retracted: a receiver that stops reporting a quantity simply lets its
//! age grow, and consumers decide what counts as stale.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::nmea::ParsedSentence;

/// Two-digit years from the `DDMMYY` date field are taken to be in
/// `YEAR_EPOCH..YEAR_EPOCH + 100`, i.e. 2000-2099.
pub const YEAR_EPOCH: u16 = 2000;

const MPH_PER_KNOT: f64 = 1.150_779_45;
const MPS_PER_KNOT: f64 = 0.514_444_44;
const KMPH_PER_KNOT: f64 = 1.852;
const MILES_PER_METER: f64 = 0.000_621_371_12;
const FEET_PER_METER: f64 = 3.280_839_9;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct TrackedValue<T> {
    value: T,
    valid: bool,
    updated: bool,
    updated_at_ms: u32,
}

impl<T: Copy> TrackedValue<T> {
    pub const fn new(value: T) -> Self {
        Self {
            value,
            valid: false,
            updated: false,
            updated_at_ms: 0,
        }
    }

    /// Last decoded value. Meaningless (the initial default) until
    /// [`is_valid`](Self::is_valid) is true.
    pub fn value(&self) -> T {
        self.value
    }

    /// The value, if it has been decoded at least once.
    pub fn get(&self) -> Option<T> {
        self.valid.then_some(self.value)
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// True if the value was refreshed since the last
    /// [`Gps::clear_updated`](crate::Gps::clear_updated).
    pub fn is_updated(&self) -> bool {
        self.updated
    }

    pub fn updated_at_ms(&self) -> u32 {
        self.updated_at_ms
    }

    /// Milliseconds since the last update, `None` while invalid.
    pub fn age(&self, now_ms: u32) -> Option<u32> {
        self.valid.then(|| now_ms.wrapping_sub(self.updated_at_ms))
    }

    pub(crate) fn update(&mut self, value: T, now_ms: u32) {
        self.value = value;
        self.valid = true;
        self.updated = true;
        self.updated_at_ms = now_ms;
    }

    /// Updates from an optional decoded value; `None` means "not reported".
    pub(crate) fn apply(&mut self, value: Option<T>, now_ms: u32) -> bool {
        match value {
            Some(v) => {
                self.update(v, now_ms);
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear_updated(&mut self) {
        self.updated = false;
    }
}

/// One coordinate axis in fixed point: whole degrees plus billionths.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct RawDegrees {
    pub deg: u16,
    pub billionths: u32,
    pub negative: bool,
}

impl RawDegrees {
    /// Signed billionths of a degree.
    pub fn nanodegrees(&self) -> i64 {
        let n = self.deg as i64 * 1_000_000_000 + self.billionths as i64;
        if self.negative {
            -n
        } else {
            n
        }
    }

    pub fn degrees(&self) -> f64 {
        let d = self.deg as f64 + self.billionths as f64 / 1_000_000_000.0;
        if self.negative {
            -d
        } else {
            d
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Position {
    pub lat: RawDegrees,
    pub lon: RawDegrees,
}

impl Position {
    pub fn lat_degrees(&self) -> f64 {
        self.lat.degrees()
    }

    pub fn lon_degrees(&self) -> f64 {
        self.lon.degrees()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Date {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl Date {
    pub fn to_naive(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Time {
    pub hour: u8,
    pub minute: u8,
    /// Up to 60 during a leap second.
    pub second: u8,
    pub centisecond: u8,
}

impl Time {
    pub fn to_naive(&self) -> Option<NaiveTime> {
        let milli = self.centisecond as u32 * 10;
        if self.second == 60 {
            // chrono encodes a leap second as second 59 with an overlong fraction
            NaiveTime::from_hms_milli_opt(self.hour as u32, self.minute as u32, 59, 1000 + milli)
        } else {
            NaiveTime::from_hms_milli_opt(
                self.hour as u32,
                self.minute as u32,
                self.second as u32,
                milli,
            )
        }
    }
}

/// Altitude above mean sea level in hundredths of a meter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Altitude(pub i32);

impl Altitude {
    pub fn meters(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn kilometers(&self) -> f64 {
        self.meters() / 1000.0
    }

    pub fn feet(&self) -> f64 {
        self.meters() * FEET_PER_METER
    }

    pub fn miles(&self) -> f64 {
        self.meters() * MILES_PER_METER
    }
}

/// Speed over ground in hundredths of a knot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Speed(pub i32);

impl Speed {
    pub fn knots(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn mph(&self) -> f64 {
        self.knots() * MPH_PER_KNOT
    }

    pub fn mps(&self) -> f64 {
        self.knots() * MPS_PER_KNOT
    }

    pub fn kmph(&self) -> f64 {
        self.knots() * KMPH_PER_KNOT
    }
}

/// Course over ground in hundredths of a degree from true north.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Course(pub i32);

impl Course {
    pub fn degrees(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

/// Horizontal dilution of precision in hundredths.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Hdop(pub u32);

impl Hdop {
    pub fn hdop(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

/// GGA fix quality indicator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FixQuality {
    #[default]
    Invalid,
    Gps,
    Dgps,
    Pps,
    Rtk,
    FloatRtk,
    Estimated,
    Manual,
    Simulated,
}

impl FixQuality {
    pub fn from_digit(b: u8) -> Option<Self> {
        Some(match b {
            b'0' => Self::Invalid,
            b'1' => Self::Gps,
            b'2' => Self::Dgps,
            b'3' => Self::Pps,
            b'4' => Self::Rtk,
            b'5' => Self::FloatRtk,
            b'6' => Self::Estimated,
            b'7' => Self::Manual,
            b'8' => Self::Simulated,
            _ => return None,
        })
    }

    pub fn has_fix(&self) -> bool {
        *self != Self::Invalid
    }
}

/// Positioning mode indicator of RMC, VTG and GNS.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FixMode {
    #[default]
    NotValid,
    Autonomous,
    Differential,
    Estimated,
    Manual,
    Simulated,
    Precise,
    Rtk,
    FloatRtk,
}

impl FixMode {
    pub fn from_char(b: u8) -> Option<Self> {
        Some(match b {
            b'N' => Self::NotValid,
            b'A' => Self::Autonomous,
            b'D' => Self::Differential,
            b'E' => Self::Estimated,
            b'M' => Self::Manual,
            b'S' => Self::Simulated,
            b'P' => Self::Precise,
            b'R' => Self::Rtk,
            b'F' => Self::FloatRtk,
            _ => return None,
        })
    }

    pub fn has_fix(&self) -> bool {
        *self != Self::NotValid
    }
}

/// Running decoder counters. All of them only ever grow.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stats {
    pub chars_processed: u32,
    pub sentences_with_fix: u32,
    pub passed_checksum: u32,
    pub failed_checksum: u32,
    /// Sentences dropped by the framer (oversized or malformed checksum field).
    pub discarded_sentences: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Fix {
    pub location: TrackedValue<Position>,
    pub date: TrackedValue<Date>,
    pub time: TrackedValue<Time>,
    pub altitude: TrackedValue<Altitude>,
    pub speed: TrackedValue<Speed>,
    pub course: TrackedValue<Course>,
    pub satellites: TrackedValue<u8>,
    pub hdop: TrackedValue<Hdop>,
    pub fix_quality: TrackedValue<FixQuality>,
    pub fix_mode: TrackedValue<FixMode>,
    pub stats: Stats,
}

impl Fix {
    pub const fn new() -> Self {
        Self {
            location: TrackedValue::new(Position {
                lat: RawDegrees {
                    deg: 0,
                    billionths: 0,
                    negative: false,
                },
                lon: RawDegrees {
                    deg: 0,
                    billionths: 0,
                    negative: false,
                },
            }),
            date: TrackedValue::new(Date {
                year: 0,
                month: 0,
                day: 0,
            }),
            time: TrackedValue::new(Time {
                hour: 0,
                minute: 0,
                second: 0,
                centisecond: 0,
            }),
            altitude: TrackedValue::new(Altitude(0)),
            speed: TrackedValue::new(Speed(0)),
            course: TrackedValue::new(Course(0)),
            satellites: TrackedValue::new(0),
            hdop: TrackedValue::new(Hdop(0)),
            fix_quality: TrackedValue::new(FixQuality::Invalid),
            fix_mode: TrackedValue::new(FixMode::NotValid),
            stats: Stats {
                chars_processed: 0,
                sentences_with_fix: 0,
                passed_checksum: 0,
                failed_checksum: 0,
                discarded_sentences: 0,
            },
        }
    }

    /// UTC date and time, once both have been decoded.
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        let date = self.date.get()?.to_naive()?;
        let time = self.time.get()?.to_naive()?;
        Some(NaiveDateTime::new(date, time))
    }

    /// Applies every quantity a checksum-verified sentence reported.
    /// Returns true if anything was updated.
    pub(crate) fn apply(&mut self, s: &ParsedSentence, now_ms: u32) -> bool {
        let mut changed = false;
        changed |= self.time.apply(s.time, now_ms);
        changed |= self.date.apply(s.date, now_ms);
        changed |= self.location.apply(s.position, now_ms);
        changed |= self.altitude.apply(s.altitude, now_ms);
        changed |= self.speed.apply(s.speed, now_ms);
        changed |= self.course.apply(s.course, now_ms);
        changed |= self.satellites.apply(s.satellites, now_ms);
        changed |= self.hdop.apply(s.hdop, now_ms);
        changed |= self.fix_quality.apply(s.quality, now_ms);
        changed |= self.fix_mode.apply(s.mode, now_ms);
        changed
    }

    pub(crate) fn clear_updated(&mut self) {
        self.location.clear_updated();
        self.date.clear_updated();
        self.time.clear_updated();
        self.altitude.clear_updated();
        self.speed.clear_updated();
        self.course.clear_updated();
        self.satellites.clear_updated();
        self.hdop.clear_updated();
        self.fix_quality.clear_updated();
        self.fix_mode.clear_updated();
    }
}
