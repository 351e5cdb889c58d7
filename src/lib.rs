#![cfg_attr(not(test), no_std)]

//! NMEA GPS logger: a streaming NMEA 0183 decoder that aggregates sentences
//! into a [`Fix`], plus the formatting and rendering used by the logger
//! firmware to show and record it.

use core::fmt::{self, Write};
use tinyvec::ArrayVec;

#[macro_use]
mod logging;

pub mod config;
pub mod display;
pub mod fix;
pub mod geo;
pub mod gps;
pub mod nmea;
pub mod report;
pub mod screen;

pub use fix::{Fix, Stats, TrackedValue};
pub use gps::{Clock, Gps};

/// Fixed-capacity `core::fmt::Write` sink.
///
/// A write that does not fit is rejected as a whole, so the buffer always
/// holds valid UTF-8.
#[derive(Clone)]
pub struct FmtBuf<const N: usize = 256>(pub ArrayVec<[u8; N]>);

impl<const N: usize> Write for FmtBuf<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.0.len() + s.len() > N {
            return Err(fmt::Error);
        }
        self.0.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

impl<const N: usize> FmtBuf<N> {
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(self.0.as_slice()).ok()
    }

    pub fn new() -> Self {
        Self(Default::default())
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> Default for FmtBuf<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for FmtBuf<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FmtBuf").field(&self.as_str()).finish()
    }
}
