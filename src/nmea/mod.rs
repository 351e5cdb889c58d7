use tinyvec::ArrayVec;

pub mod fields;
pub mod parser;
pub mod sentences;

pub use parser::{Frame, NmeaParser, TransmittedChecksum};
pub use sentences::ParsedSentence;

/// Longest sentence body (between `$` and `*`) the framer accepts. NMEA 0183
/// limits a whole line to 82 characters; receivers' proprietary sentences
/// sometimes run longer.
pub const MAX_SENTENCE_LEN: usize = 120;

pub type SentenceBuf = ArrayVec<[u8; MAX_SENTENCE_LEN]>;

/// XOR of every byte between `$` and `*`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct NmeaChecksum(pub u8);

impl NmeaChecksum {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn next(self, byte: u8) -> Self {
        Self(self.0 ^ byte)
    }

    pub fn over(bytes: &[u8]) -> Self {
        bytes.iter().fold(Self::new(), |c, &b| c.next(b))
    }
}

impl PartialEq<u8> for NmeaChecksum {
    fn eq(&self, other: &u8) -> bool {
        self.0 == *other
    }
}

#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NmeaError {
    #[error("sentence exceeds the frame buffer")]
    Overflow,
    #[error("malformed checksum field")]
    Framing,
    #[error("checksum field cut short")]
    TruncatedChecksum,
    #[error("bad checksum: sentence says {expect:#04x}, computed {saw:#04x}")]
    BadChecksum { expect: u8, saw: u8 },
}

/// Source system named by the first two address characters.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Talker {
    Gps,
    Glonass,
    Galileo,
    Beidou,
    Qzss,
    Navic,
    /// Multi-constellation solution (`GN`).
    Gnss,
    #[default]
    Other,
}

impl Talker {
    pub fn from_id(id: [u8; 2]) -> Self {
        match &id {
            b"GP" => Self::Gps,
            b"GL" => Self::Glonass,
            b"GA" => Self::Galileo,
            b"GB" | b"BD" => Self::Beidou,
            b"GQ" | b"QZ" => Self::Qzss,
            b"GI" => Self::Navic,
            b"GN" => Self::Gnss,
            _ => Self::Other,
        }
    }
}

/// Sentence formatter, the last three address characters.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SentenceKind {
    /// Position fix data.
    Gga,
    /// Recommended minimum: time, date, position, speed, course.
    Rmc,
    /// Course and speed over ground.
    Vtg,
    /// Date and time.
    Zda,
    /// Multi-constellation position fix data.
    Gns,
    #[default]
    Unknown,
}

impl SentenceKind {
    pub fn from_formatter(f: [u8; 3]) -> Self {
        match &f {
            b"GGA" => Self::Gga,
            b"RMC" => Self::Rmc,
            b"VTG" => Self::Vtg,
            b"ZDA" => Self::Zda,
            b"GNS" => Self::Gns,
            _ => Self::Unknown,
        }
    }
}

/// Splits a five character address into talker and sentence kind.
/// Proprietary (`P...`) and malformed addresses are `None`.
pub fn parse_address(address: &[u8]) -> Option<(Talker, SentenceKind)> {
    if address.len() != 5
        || address[0] == b'P'
        || !address.iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    {
        return None;
    }
    Some((
        Talker::from_id([address[0], address[1]]),
        SentenceKind::from_formatter([address[2], address[3], address[4]]),
    ))
}
