use tinyvec::ArrayVec;

use super::{
    fields::{
        parse_date, parse_date_parts, parse_degrees, parse_fix_mode, parse_fix_quality,
        parse_hundredths, parse_time, parse_u8, parse_unsigned_hundredths, Axis, FieldError,
    },
    parse_address, SentenceKind, Talker,
};
use crate::fix::{Altitude, Course, Date, FixMode, FixQuality, Hdop, Position, Speed, Time};

/// Fields past this index are ignored; no recognised sentence uses them.
pub const MAX_FIELDS: usize = 24;

/// Comma separated fields of a sentence body. Index 0 is the address.
pub struct Fields<'a>(ArrayVec<[&'a [u8]; MAX_FIELDS]>);

impl<'a> Fields<'a> {
    pub fn split(body: &'a [u8]) -> Self {
        let mut fields = ArrayVec::new();
        for f in body.split(|&b| b == b',') {
            if fields.try_push(f).is_some() {
                break;
            }
        }
        Self(fields)
    }

    /// Field `i`, empty if the sentence stopped short of it.
    pub fn get(&self, i: usize) -> &'a [u8] {
        self.0.get(i).copied().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything one verified sentence reported, staged before it is applied to
/// the fix. `None` means the sentence did not report that quantity, either
/// because the field was empty or because it could not be parsed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ParsedSentence {
    pub talker: Talker,
    pub kind: SentenceKind,
    pub time: Option<Time>,
    pub date: Option<Date>,
    pub position: Option<Position>,
    pub altitude: Option<Altitude>,
    pub speed: Option<Speed>,
    pub course: Option<Course>,
    pub satellites: Option<u8>,
    pub hdop: Option<Hdop>,
    pub quality: Option<FixQuality>,
    pub mode: Option<FixMode>,
    /// The sentence says the receiver has a position fix.
    pub has_fix: bool,
}

impl ParsedSentence {
    /// Decodes a checksum-verified sentence body. Sentences of unknown or
    /// proprietary type give `None`.
    pub fn parse(body: &[u8]) -> Option<Self> {
        let fields = Fields::split(body);
        let (talker, kind) = parse_address(fields.get(0))?;
        let mut s = Self {
            talker,
            kind,
            ..Default::default()
        };
        match kind {
            SentenceKind::Gga => s.gga(&fields),
            SentenceKind::Rmc => s.rmc(&fields),
            SentenceKind::Vtg => s.vtg(&fields),
            SentenceKind::Zda => s.zda(&fields),
            SentenceKind::Gns => s.gns(&fields),
            SentenceKind::Unknown => return None,
        }
        Some(s)
    }

    // $--GGA,time,lat,N,lon,E,quality,sats,hdop,alt,M,sep,M,age,station
    fn gga(&mut self, f: &Fields) {
        self.time = field("time", f.get(1), parse_time);
        self.quality = field("quality", f.get(6), parse_fix_quality);
        self.satellites = field("satellites", f.get(7), parse_u8);
        self.hdop = field("hdop", f.get(8), parse_unsigned_hundredths).map(Hdop);
        self.has_fix = self.quality.is_some_and(|q| q.has_fix());
        if self.has_fix {
            self.position = position(f, 2);
            self.altitude = field("altitude", f.get(9), parse_hundredths).map(Altitude);
        }
    }

    // $--RMC,time,status,lat,N,lon,E,knots,course,ddmmyy,magvar,E,mode
    fn rmc(&mut self, f: &Fields) {
        self.time = field("time", f.get(1), parse_time);
        self.date = field("date", f.get(9), parse_date);
        self.mode = field("mode", f.get(12), parse_fix_mode);
        self.has_fix = f.get(2) == b"A" && self.mode.map_or(true, |m| m.has_fix());
        if self.has_fix {
            self.position = position(f, 3);
            self.speed = field("speed", f.get(7), parse_hundredths).map(Speed);
            self.course = field("course", f.get(8), parse_hundredths).map(Course);
        }
    }

    // $--VTG,course,T,magnetic,M,knots,N,kmh,K,mode
    // NMEA 2.0 and older omit the unit letters: $--VTG,course,magnetic,knots,kmh
    fn vtg(&mut self, f: &Fields) {
        let (course, knots) = if f.get(2) == b"T" {
            self.mode = field("mode", f.get(9), parse_fix_mode);
            (f.get(1), f.get(5))
        } else {
            (f.get(1), f.get(3))
        };
        if self.mode.map_or(true, |m| m.has_fix()) {
            self.course = field("course", course, parse_hundredths).map(Course);
            self.speed = field("speed", knots, parse_hundredths).map(Speed);
        }
    }

    // $--ZDA,time,day,month,year,zone hours,zone minutes
    fn zda(&mut self, f: &Fields) {
        self.time = field("time", f.get(1), parse_time);
        self.date = field("date", f.get(4), |year| {
            parse_date_parts(f.get(2), f.get(3), year)
        });
    }

    // $--GNS,time,lat,N,lon,E,modes,sats,hdop,alt,sep,age,station,status
    fn gns(&mut self, f: &Fields) {
        let modes = f.get(6);
        self.time = field("time", f.get(1), parse_time);
        self.mode = field("mode", modes, parse_fix_mode);
        self.satellites = field("satellites", f.get(7), parse_u8);
        self.hdop = field("hdop", f.get(8), parse_unsigned_hundredths).map(Hdop);
        self.has_fix = modes
            .iter()
            .any(|&m| FixMode::from_char(m).is_some_and(|m| m.has_fix()));
        if self.has_fix {
            self.position = position(f, 2);
            self.altitude = field("altitude", f.get(9), parse_hundredths).map(Altitude);
        }
    }
}

/// Parses one field. Empty fields are "not reported" and stay quiet; a field
/// that is present but unparseable is dropped on its own.
fn field<T>(
    name: &'static str,
    raw: &[u8],
    parse: impl FnOnce(&[u8]) -> Result<T, FieldError>,
) -> Option<T> {
    match parse(raw) {
        Ok(v) => Some(v),
        Err(FieldError::Empty) => None,
        Err(e) => {
            debug!("dropping {} field: {}", name, e);
            None
        }
    }
}

/// Latitude and longitude starting at field `first`; both are needed.
fn position(f: &Fields, first: usize) -> Option<Position> {
    let lat = field("latitude", f.get(first), |v| {
        parse_degrees(v, f.get(first + 1), Axis::Latitude)
    })?;
    let lon = field("longitude", f.get(first + 2), |v| {
        parse_degrees(v, f.get(first + 3), Axis::Longitude)
    })?;
    Some(Position { lat, lon })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &[u8]) -> ParsedSentence {
        ParsedSentence::parse(body).expect("recognised sentence")
    }

    #[test]
    fn gga_with_fix() {
        let s = parse(b"GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,");
        assert_eq!(s.talker, Talker::Gps);
        assert_eq!(s.kind, SentenceKind::Gga);
        assert!(s.has_fix);
        assert_eq!(s.satellites, Some(8));
        assert_eq!(s.hdop, Some(Hdop(90)));
        assert_eq!(s.altitude, Some(Altitude(54540)));
        assert_eq!(s.quality, Some(FixQuality::Gps));
        let pos = s.position.unwrap();
        assert_eq!(pos.lat.nanodegrees(), 48_117_300_000);
        assert_eq!(pos.lon.nanodegrees(), 11_516_666_667);
        assert_eq!(s.time.map(|t| (t.hour, t.minute, t.second)), Some((12, 35, 19)));
        assert_eq!(s.date, None);
    }

    #[test]
    fn gga_without_fix_still_reports_time_and_satellites() {
        let s = parse(b"GPGGA,002153.000,,,,,0,03,,,M,,M,,");
        assert!(!s.has_fix);
        assert_eq!(s.quality, Some(FixQuality::Invalid));
        assert_eq!(s.satellites, Some(3));
        assert_eq!(s.hdop, None);
        assert_eq!(s.position, None);
        assert_eq!(s.altitude, None);
        assert!(s.time.is_some());
    }

    #[test]
    fn rmc_active_and_void() {
        let s = parse(b"GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W");
        assert!(s.has_fix);
        assert_eq!(s.speed, Some(Speed(2240)));
        assert_eq!(s.course, Some(Course(8440)));
        assert_eq!(
            s.date,
            Some(Date {
                year: 2094,
                month: 3,
                day: 23
            })
        );
        assert!(s.position.is_some());

        let s = parse(b"GNRMC,001031.00,V,,,,,,,060180,,,N");
        assert!(!s.has_fix);
        assert_eq!(s.mode, Some(FixMode::NotValid));
        assert_eq!(s.speed, None);
        assert_eq!(s.position, None);
        assert_eq!(s.date.map(|d| d.year), Some(2080));
    }

    #[test]
    fn vtg_current_and_legacy_layouts() {
        let s = parse(b"GPVTG,054.7,T,034.4,M,005.5,N,010.2,K,A");
        assert_eq!(s.course, Some(Course(5470)));
        assert_eq!(s.speed, Some(Speed(550)));
        assert_eq!(s.mode, Some(FixMode::Autonomous));
        assert!(!s.has_fix);

        let s = parse(b"GPVTG,054.7,034.4,005.5,010.2");
        assert_eq!(s.course, Some(Course(5470)));
        assert_eq!(s.speed, Some(Speed(550)));

        let s = parse(b"GPVTG,,T,,M,0.0,N,0.0,K,N");
        assert_eq!(s.course, None);
        assert_eq!(s.speed, None);
    }

    #[test]
    fn zda_reports_full_date() {
        let s = parse(b"GPZDA,201530.00,04,07,2002,00,00");
        assert_eq!(
            s.date,
            Some(Date {
                year: 2002,
                month: 7,
                day: 4
            })
        );
        assert_eq!(
            s.time,
            Some(Time {
                hour: 20,
                minute: 15,
                second: 30,
                centisecond: 0
            })
        );
    }

    #[test]
    fn gns_multi_constellation() {
        let s = parse(b"GNGNS,014035.00,4332.69262,S,17235.48549,E,RR,13,0.9,25.63,11.24,,");
        assert!(s.has_fix);
        assert_eq!(s.mode, Some(FixMode::Rtk));
        assert_eq!(s.satellites, Some(13));
        assert_eq!(s.altitude, Some(Altitude(2563)));
        assert!(s.position.unwrap().lat.negative);

        let s = parse(b"GNGNS,014035.00,,,,,NN,00,,,,,");
        assert!(!s.has_fix);
        assert_eq!(s.satellites, Some(0));
    }

    #[test]
    fn unparseable_field_does_not_spoil_the_rest() {
        let s = parse(b"GPGGA,123519,4807.038,N,01131.000,E,1,x8,0.9,545.4,M,46.9,M,,");
        assert_eq!(s.satellites, None);
        assert_eq!(s.hdop, Some(Hdop(90)));
        assert!(s.position.is_some());

        // A latitude without its longitude is not a position
        let s = parse(b"GPGGA,123519,4807.038,N,,E,1,08,0.9,545.4,M,46.9,M,,");
        assert_eq!(s.position, None);
        assert_eq!(s.altitude, Some(Altitude(54540)));
    }

    #[test]
    fn short_sentences_are_padded_with_empty_fields() {
        let s = parse(b"GPGGA,123519");
        assert!(s.time.is_some());
        assert_eq!(s.satellites, None);
        assert!(!s.has_fix);
    }

    #[test]
    fn unknown_and_proprietary_sentences_are_ignored() {
        assert_eq!(ParsedSentence::parse(b"GPGSV,3,1,11,03,03,111,00"), None);
        assert_eq!(ParsedSentence::parse(b"PUBX,00,081350.00"), None);
        assert_eq!(ParsedSentence::parse(b""), None);
    }
}
