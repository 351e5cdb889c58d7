//! Status page: a large UTC clock over a table of everything the receiver
//! has reported, drawn onto any monochrome `DrawTarget`.

use core::fmt::Write;

use embedded_graphics::{
    mono_font::{iso_8859_3::FONT_6X12, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    text::Text,
};
use tinyvec::ArrayVec;
use u8g2_fonts::{
    fonts,
    types::{FontColor, HorizontalAlignment, VerticalPosition},
    FontRenderer,
};

use crate::{
    config::{NO_DATA_MIN_CHARS, NO_DATA_TIMEOUT_MS, STALE_AFTER_MS},
    geo,
    report::{write_date, write_float, write_int, write_time, Freshness},
    Fix, FmtBuf,
};

pub const LINE_CAPACITY: usize = 72;
pub const MAX_LINES: usize = 10;

const CLOCK_ORIGIN: Point = Point::new(200, 4);
const TABLE_ORIGIN: Point = Point::new(6, 76);
const LINE_HEIGHT: i32 = 15;

pub type Line = FmtBuf<LINE_CAPACITY>;

/// State of the CSV log sink, shown on the last line of the page.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogStatus {
    Writing,
    Attempting,
    Unavailable,
}

impl LogStatus {
    /// Status after one poll of the log link. `Unavailable` means the log
    /// stream itself is gone and is kept; a failed write only drops back to
    /// `Attempting` until a later write goes through.
    pub fn next(self, link_up: bool, last_write_ok: bool) -> Self {
        match self {
            LogStatus::Unavailable => LogStatus::Unavailable,
            _ if link_up && last_write_ok => LogStatus::Writing,
            _ => LogStatus::Attempting,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LogStatus::Writing => "Log: writing",
            LogStatus::Attempting => "Log: attempting to open",
            LogStatus::Unavailable => "Log: unavailable",
        }
    }
}

pub struct StatusScreen {
    clock_font: FontRenderer,
    stale_after_ms: u32,
}

impl Default for StatusScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusScreen {
    pub fn new() -> Self {
        Self {
            clock_font: FontRenderer::new::<fonts::u8g2_font_logisoso42_tr>(),
            stale_after_ms: STALE_AFTER_MS,
        }
    }

    pub fn with_stale_after(mut self, ms: u32) -> Self {
        self.stale_after_ms = ms;
        self
    }

    /// Draws the page. The target is not cleared first.
    pub fn draw<D>(
        &self,
        fix: &Fix,
        now_ms: u32,
        log: LogStatus,
        target: &mut D,
    ) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        let fresh = Freshness::with_limit(now_ms, self.stale_after_ms);

        let mut clock = FmtBuf::<16>::new();
        let _ = match fresh.current(&fix.time) {
            Some(t) => write!(clock, "{:02}:{:02}:{:02}", t.hour, t.minute, t.second),
            None => clock.write_str("--:--:--"),
        };
        match self.clock_font.render_aligned(
            clock.as_str().unwrap_or_default(),
            CLOCK_ORIGIN,
            VerticalPosition::Top,
            HorizontalAlignment::Center,
            FontColor::Transparent(BinaryColor::On),
            target,
        ) {
            Ok(_) => {}
            Err(u8g2_fonts::Error::DisplayError(e)) => return Err(e),
            // The font covers every character a clock string can hold
            Err(_) => {}
        }

        let style = MonoTextStyle::new(&FONT_6X12, BinaryColor::On);
        let mut pos = TABLE_ORIGIN;
        for line in self.lines(fix, now_ms, log) {
            Text::new(line.as_str().unwrap_or_default(), pos, style).draw(target)?;
            pos.y += LINE_HEIGHT;
        }
        Ok(())
    }

    /// Text rows of the field table, top to bottom.
    pub fn lines(&self, fix: &Fix, now_ms: u32, log: LogStatus) -> ArrayVec<[Line; MAX_LINES]> {
        let fresh = Freshness::with_limit(now_ms, self.stale_after_ms);
        let mut lines = ArrayVec::new();

        lines.push(line(|w| {
            w.write_str("Sats  ")?;
            write_int(w, fresh.current(&fix.satellites).map(u32::from), 5)?;
            w.write_str("HDOP  ")?;
            write_float(w, fresh.current(&fix.hdop).map(|h| h.hdop()), 6, 1)
        }));
        lines.push(line(|w| {
            let pos = fresh.current(&fix.location);
            w.write_str("Lat   ")?;
            write_float(w, pos.map(|p| p.lat_degrees()), 12, 6)?;
            w.write_str("Lon ")?;
            write_float(w, pos.map(|p| p.lon_degrees()), 12, 6)?;
            w.write_str("Age ")?;
            write_int(w, fresh.age(&fix.location), 6)
        }));
        lines.push(line(|w| {
            w.write_str("Date  ")?;
            write_date(w, &fix.date, fresh)
        }));
        lines.push(line(|w| {
            w.write_str("Time  ")?;
            write_time(w, &fix.time, fresh)
        }));
        lines.push(line(|w| {
            w.write_str("Alt   ")?;
            write_float(w, fresh.current(&fix.altitude).map(|a| a.meters()), 9, 2)?;
            w.write_str("m")
        }));
        lines.push(line(|w| {
            let course = fresh.current(&fix.course).map(|c| c.degrees());
            w.write_str("Speed ")?;
            write_float(w, fresh.current(&fix.speed).map(|s| s.kmph()), 8, 2)?;
            w.write_str("km/h  Course ")?;
            write_float(w, course, 7, 2)?;
            w.write_str(course.map_or("***", geo::cardinal))
        }));
        lines.push(line(|w| {
            w.write_str("Chars ")?;
            write_int(w, Some(fix.stats.chars_processed), 9)?;
            w.write_str("Fix ")?;
            write_int(w, Some(fix.stats.sentences_with_fix), 7)?;
            w.write_str("Bad ")?;
            write_int(w, Some(fix.stats.failed_checksum), 7)
        }));
        lines.push(line(|w| w.write_str(log.label())));
        if now_ms > NO_DATA_TIMEOUT_MS && fix.stats.chars_processed < NO_DATA_MIN_CHARS {
            lines.push(line(|w| w.write_str("No GPS data received: check wiring")));
        }
        lines
    }
}

/// Every row fits in a [`Line`]; one that somehow does not is kept truncated.
fn line(f: impl FnOnce(&mut Line) -> core::fmt::Result) -> Line {
    let mut line = Line::new();
    let _ = f(&mut line);
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::{Course, Hdop, Position, RawDegrees, Speed, Time};
    use embedded_graphics::mock_display::MockDisplay;

    fn text(lines: &ArrayVec<[Line; MAX_LINES]>) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.as_str().unwrap().trim_end().to_string())
            .collect()
    }

    fn fix_at(now: u32) -> Fix {
        let mut fix = Fix::new();
        fix.satellites.update(8, now);
        fix.hdop.update(Hdop(90), now);
        fix.location.update(
            Position {
                lat: RawDegrees {
                    deg: 48,
                    billionths: 117_300_000,
                    negative: false,
                },
                lon: RawDegrees {
                    deg: 11,
                    billionths: 516_666_667,
                    negative: false,
                },
            },
            now,
        );
        fix.time.update(
            Time {
                hour: 12,
                minute: 35,
                second: 19,
                centisecond: 0,
            },
            now,
        );
        fix.speed.update(Speed(1000), now);
        fix.course.update(Course(8440), now);
        fix.stats.chars_processed = 500;
        fix
    }

    #[test]
    fn table_with_fix() {
        let screen = StatusScreen::new();
        let lines = text(&screen.lines(&fix_at(1000), 1200, LogStatus::Writing));
        assert_eq!(lines[0], "Sats  8    HDOP  0.9");
        assert_eq!(lines[1], "Lat   48.117300   Lon 11.516667   Age 200");
        assert_eq!(lines[2], "Date  ********** ****");
        assert_eq!(lines[3], "Time  12:35:19 200");
        assert_eq!(lines[4], "Alt   ******** m");
        assert_eq!(lines[5], "Speed 18.52   km/h  Course 84.40  E");
        assert_eq!(lines[6], "Chars 500      Fix 0      Bad 0");
        assert_eq!(lines[7], "Log: writing");
        assert_eq!(lines.len(), 8);
    }

    #[test]
    fn stale_fields_are_shown_as_missing() {
        let screen = StatusScreen::new().with_stale_after(1000);
        let lines = text(&screen.lines(&fix_at(0), 5000, LogStatus::Attempting));
        assert_eq!(lines[0], "Sats  **** HDOP  *****");
        assert_eq!(lines[3], "Time  ******** ****");
        assert_eq!(lines[7], "Log: attempting to open");
    }

    #[test]
    fn warns_when_nothing_arrives() {
        let screen = StatusScreen::new();
        let fix = Fix::new();
        let early = text(&screen.lines(&fix, NO_DATA_TIMEOUT_MS, LogStatus::Unavailable));
        assert_eq!(early.last().unwrap(), "Log: unavailable");

        let late = text(&screen.lines(&fix, NO_DATA_TIMEOUT_MS + 1, LogStatus::Unavailable));
        assert_eq!(late.last().unwrap(), "No GPS data received: check wiring");

        let mut fix = Fix::new();
        fix.stats.chars_processed = NO_DATA_MIN_CHARS;
        let wired = text(&screen.lines(&fix, 60_000, LogStatus::Unavailable));
        assert_eq!(wired.len(), 8);
    }

    #[test]
    fn log_status_recovers_from_write_errors() {
        let status = LogStatus::Attempting.next(true, true);
        assert_eq!(status, LogStatus::Writing);
        let status = status.next(true, false);
        assert_eq!(status, LogStatus::Attempting);
        assert_eq!(status.next(true, true), LogStatus::Writing);
        // Unplugged
        assert_eq!(LogStatus::Writing.next(false, true), LogStatus::Attempting);
        // Only a closed log stream is permanent
        assert_eq!(LogStatus::Unavailable.next(true, true), LogStatus::Unavailable);
    }

    #[test]
    fn draws_onto_a_mock_display() {
        let mut display = MockDisplay::<BinaryColor>::new();
        display.set_allow_overdraw(true);
        display.set_allow_out_of_bounds_drawing(true);
        StatusScreen::new()
            .draw(
                &fix_at(0),
                0,
                LogStatus::Writing,
                &mut display.translated(Point::new(-6, -60)),
            )
            .unwrap();
        assert!(!display.affected_area().is_zero_sized());
    }
}
