use embedded_hal::serial;
use tinyvec::ArrayVec;

use crate::{
    fix::{Fix, Stats, TrackedValue},
    nmea::{sentences::Fields, NmeaError, NmeaParser, ParsedSentence},
};

/// Monotonic millisecond clock. Wraps around after ~49 days; ages are
/// computed with wrapping arithmetic.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

impl<F: Fn() -> u32> Clock for F {
    fn now_ms(&self) -> u32 {
        self()
    }
}

pub const MAX_WATCHES: usize = 4;
pub const TERM_CAPACITY: usize = 16;

/// Raw text of a watched term, truncated to [`TERM_CAPACITY`] bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct TermText(ArrayVec<[u8; TERM_CAPACITY]>);

impl TermText {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(self.0.as_slice()).ok()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WatchId(u8);

#[derive(Debug, Copy, Clone, Default)]
struct Watch {
    address: [u8; 5],
    term: u8,
    value: TrackedValue<TermText>,
}

#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpsError {
    #[error("all watch slots are in use")]
    TooManyWatches,
    #[error("sentence address must be five characters")]
    InvalidAddress,
    #[error("term 0 is the sentence address")]
    InvalidTerm,
}

/// The NMEA decoder: feed it receiver bytes, read the [`Fix`].
///
/// One instance is owned by whatever drains the UART. It is not meant to be
/// shared; hand out copies of the fix instead.
pub struct Gps<C> {
    clock: C,
    parser: NmeaParser,
    fix: Fix,
    watches: ArrayVec<[Watch; MAX_WATCHES]>,
}

impl<C: Clock> Gps<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            parser: NmeaParser::new(),
            fix: Fix::new(),
            watches: ArrayVec::new(),
        }
    }

    pub fn fix(&self) -> &Fix {
        &self.fix
    }

    pub fn stats(&self) -> &Stats {
        &self.fix.stats
    }

    pub fn now_ms(&self) -> u32 {
        self.clock.now_ms()
    }

    /// Clears the `is_updated` flag of every fix field and watched term.
    pub fn clear_updated(&mut self) {
        self.fix.clear_updated();
        for w in self.watches.iter_mut() {
            w.value.clear_updated();
        }
    }

    /// Tracks the raw text of term `term` of every sentence with the given
    /// address, e.g. `watch("GPGSV", 3)` for satellites in view.
    pub fn watch(&mut self, address: &str, term: u8) -> Result<WatchId, GpsError> {
        let address: [u8; 5] = address
            .as_bytes()
            .try_into()
            .map_err(|_| GpsError::InvalidAddress)?;
        if term == 0 {
            return Err(GpsError::InvalidTerm);
        }
        let id = WatchId(self.watches.len() as u8);
        self.watches
            .try_push(Watch {
                address,
                term,
                value: TrackedValue::default(),
            })
            .map_or(Ok(id), |_| Err(GpsError::TooManyWatches))
    }

    pub fn watched(&self, id: WatchId) -> Option<&TrackedValue<TermText>> {
        self.watches.get(id.0 as usize).map(|w| &w.value)
    }

    /// Consumes one byte from the receiver. Returns true if the byte completed
    /// a sentence that updated at least one field.
    pub fn encode(&mut self, b: u8) -> bool {
        self.fix.stats.chars_processed = self.fix.stats.chars_processed.saturating_add(1);

        let frame = match self.parser.feed(b) {
            None => return false,
            Some(Ok(frame)) => frame,
            Some(Err(NmeaError::TruncatedChecksum)) => {
                warn!("sentence with truncated checksum");
                self.fix.stats.failed_checksum = self.fix.stats.failed_checksum.saturating_add(1);
                return false;
            }
            Some(Err(e)) => {
                warn!("discarding sentence: {}", e);
                self.fix.stats.discarded_sentences =
                    self.fix.stats.discarded_sentences.saturating_add(1);
                return false;
            }
        };

        let body = match frame.verify() {
            Ok(body) => body,
            Err(e) => {
                warn!("{}", e);
                self.fix.stats.failed_checksum = self.fix.stats.failed_checksum.saturating_add(1);
                return false;
            }
        };
        self.fix.stats.passed_checksum = self.fix.stats.passed_checksum.saturating_add(1);

        let now = self.clock.now_ms();
        let mut changed = update_watches(&mut self.watches, body, now);
        match ParsedSentence::parse(body) {
            Some(sentence) => {
                trace!("{} {} fix={}", sentence.talker, sentence.kind, sentence.has_fix);
                if sentence.has_fix {
                    self.fix.stats.sentences_with_fix =
                        self.fix.stats.sentences_with_fix.saturating_add(1);
                }
                changed |= self.fix.apply(&sentence, now);
            }
            None => trace!("ignoring sentence {=[u8]}", body),
        }
        changed
    }

    /// Feeds every byte the serial port has ready. Returns how many were read.
    pub fn drain<S: serial::Read<u8>>(&mut self, serial: &mut S) -> usize {
        let mut count = 0;
        loop {
            match serial.read() {
                Ok(b) => {
                    self.encode(b);
                    count += 1;
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(_)) => {
                    warn!("serial read error");
                    break;
                }
            }
        }
        count
    }

    /// Keeps draining the serial port until `ms` milliseconds have passed.
    /// Drains at least once, so `smart_delay(serial, 0)` is a plain drain.
    pub fn smart_delay<S: serial::Read<u8>>(&mut self, serial: &mut S, ms: u32) {
        let start = self.clock.now_ms();
        loop {
            self.drain(serial);
            if self.clock.now_ms().wrapping_sub(start) >= ms {
                break;
            }
        }
    }
}

fn update_watches(watches: &mut [Watch], body: &[u8], now_ms: u32) -> bool {
    if watches.is_empty() {
        return false;
    }
    let fields = Fields::split(body);
    let mut changed = false;
    for w in watches
        .iter_mut()
        .filter(|w| fields.get(0) == &w.address[..])
    {
        let raw = fields.get(w.term as usize);
        if raw.is_empty() {
            continue;
        }
        let mut text = TermText::default();
        text.0.extend_from_slice(&raw[..raw.len().min(TERM_CAPACITY)]);
        w.value.update(text, now_ms);
        changed = true;
    }
    changed
}
