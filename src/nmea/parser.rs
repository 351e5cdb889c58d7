use super::{fields::hex_value, NmeaChecksum, NmeaError, SentenceBuf};

/// Checksum as transmitted after the `*`, if the sentence carried one.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransmittedChecksum {
    Absent,
    Present(u8),
}

/// A completed sentence: the body between `$` and `*` (or the line end).
#[derive(Debug, Copy, Clone)]
pub struct Frame<'a> {
    pub body: &'a [u8],
    pub computed: NmeaChecksum,
    pub transmitted: TransmittedChecksum,
}

impl<'a> Frame<'a> {
    /// Checks the transmitted checksum. Sentences without one are accepted.
    pub fn verify(&self) -> Result<&'a [u8], NmeaError> {
        match self.transmitted {
            TransmittedChecksum::Absent => Ok(self.body),
            TransmittedChecksum::Present(expect) if self.computed == expect => Ok(self.body),
            TransmittedChecksum::Present(expect) => Err(NmeaError::BadChecksum {
                expect,
                saw: self.computed.0,
            }),
        }
    }
}

// States are named for the portion of the sentence which is being received
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ParserState {
    Idle,
    Body {
        checksum: NmeaChecksum,
    },
    Checksum {
        computed: NmeaChecksum,
        digits: u8,
        value: u8,
    },
}
use ParserState::*;

/// Byte-at-a-time sentence framer.
///
/// `$` always starts a fresh sentence, throwing away anything half received.
/// A line terminator hands the buffered body out as a [`Frame`]. Anything that
/// cannot be a well-formed sentence (too long, junk after `*`) is reported
/// once and the framer goes back to waiting for `$`.
pub struct NmeaParser {
    state: ParserState,
    buf: SentenceBuf,
}

impl NmeaParser {
    pub fn new() -> Self {
        Self {
            state: Idle,
            buf: SentenceBuf::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == Idle
    }

    pub fn feed(&mut self, b: u8) -> Option<Result<Frame<'_>, NmeaError>> {
        if b == b'$' {
            if self.state != Idle {
                trace!("sentence restarted after {} bytes", self.buf.len());
            }
            self.buf.clear();
            self.state = Body {
                checksum: NmeaChecksum::new(),
            };
            return None;
        }

        match self.state {
            // Noise and the line ending after a sentence land here
            Idle => None,
            Body { checksum } => match b {
                b'\r' | b'\n' => {
                    self.state = Idle;
                    Some(Ok(Frame {
                        body: &self.buf,
                        computed: checksum,
                        transmitted: TransmittedChecksum::Absent,
                    }))
                }
                b'*' => {
                    self.state = Checksum {
                        computed: checksum,
                        digits: 0,
                        value: 0,
                    };
                    None
                }
                _ => {
                    if self.buf.try_push(b).is_some() {
                        self.state = Idle;
                        Some(Err(NmeaError::Overflow))
                    } else {
                        self.state = Body {
                            checksum: checksum.next(b),
                        };
                        None
                    }
                }
            },
            Checksum {
                computed,
                digits,
                value,
            } => match b {
                b'\r' | b'\n' => {
                    self.state = Idle;
                    if digits == 2 {
                        Some(Ok(Frame {
                            body: &self.buf,
                            computed,
                            transmitted: TransmittedChecksum::Present(value),
                        }))
                    } else {
                        Some(Err(NmeaError::TruncatedChecksum))
                    }
                }
                _ => match hex_value(b) {
                    Some(v) if digits < 2 => {
                        self.state = Checksum {
                            computed,
                            digits: digits + 1,
                            value: value << 4 | v,
                        };
                        None
                    }
                    _ => {
                        self.state = Idle;
                        Some(Err(NmeaError::Framing))
                    }
                },
            },
        }
    }
}

impl Default for NmeaParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nmea::MAX_SENTENCE_LEN;

    #[derive(Debug, PartialEq)]
    enum Event {
        Frame(Vec<u8>, Result<(), NmeaError>),
        Error(NmeaError),
    }

    fn run(input: &[u8]) -> Vec<Event> {
        let mut parser = NmeaParser::new();
        let mut events = Vec::new();
        for &b in input {
            match parser.feed(b) {
                Some(Ok(frame)) => events.push(Event::Frame(
                    frame.body.to_vec(),
                    frame.verify().map(|_| ()),
                )),
                Some(Err(e)) => events.push(Event::Error(e)),
                None => (),
            }
        }
        events
    }

    #[test]
    fn frames_sentence_with_checksum() {
        let events = run(b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n");
        assert_eq!(
            events,
            vec![Event::Frame(
                b"GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,".to_vec(),
                Ok(())
            )]
        );
    }

    #[test]
    fn lowercase_checksum_digits_are_accepted() {
        let events = run(b"$GPZDA,201530.00,04,07,2002,00,00*60\n");
        assert_eq!(events.len(), 1);
        let events = run(b"$GPXTE,A,A,0.67,L,N*6f\n");
        assert_eq!(
            events,
            vec![Event::Frame(b"GPXTE,A,A,0.67,L,N".to_vec(), Ok(()))]
        );
    }

    #[test]
    fn wrong_checksum_is_reported_by_verify() {
        let events = run(b"$GPXTE,A,A,0.67,L,N*6E\n");
        assert_eq!(
            events,
            vec![Event::Frame(
                b"GPXTE,A,A,0.67,L,N".to_vec(),
                Err(NmeaError::BadChecksum {
                    expect: 0x6E,
                    saw: 0x6F
                })
            )]
        );
    }

    #[test]
    fn missing_checksum_passes() {
        let events = run(b"$GPXTE,A,A,0.67,L,N\r\n");
        assert_eq!(
            events,
            vec![Event::Frame(b"GPXTE,A,A,0.67,L,N".to_vec(), Ok(()))]
        );
    }

    #[test]
    fn dollar_restarts_an_interrupted_sentence() {
        let events = run(b"$GPGGA,1235$GPXTE,A,A,0.67,L,N*6F\r\n");
        assert_eq!(
            events,
            vec![Event::Frame(b"GPXTE,A,A,0.67,L,N".to_vec(), Ok(()))]
        );
    }

    #[test]
    fn overflow_discards_and_recovers() {
        let mut input = b"$GPGGA,".to_vec();
        input.extend(std::iter::repeat(b'9').take(MAX_SENTENCE_LEN));
        input.extend_from_slice(b"\r\n$GPXTE,A,A,0.67,L,N*6F\r\n");
        let events = run(&input);
        assert_eq!(
            events,
            vec![
                Event::Error(NmeaError::Overflow),
                Event::Frame(b"GPXTE,A,A,0.67,L,N".to_vec(), Ok(())),
            ]
        );
    }

    #[test]
    fn malformed_checksum_fields() {
        assert_eq!(
            run(b"$GPXTE,A,A,0.67,L,N*6F0\r\n"),
            vec![Event::Error(NmeaError::Framing)]
        );
        assert_eq!(
            run(b"$GPXTE,A,A,0.67,L,N*G1\r\n"),
            vec![Event::Error(NmeaError::Framing)]
        );
        assert_eq!(
            run(b"$GPXTE,A,A,0.67,L,N*6\r\n"),
            vec![Event::Error(NmeaError::TruncatedChecksum)]
        );
    }

    #[test]
    fn noise_outside_sentences_is_ignored() {
        let mut parser = NmeaParser::new();
        for &b in b"\r\n\r\ngarbage,*12\n" {
            assert!(parser.feed(b).is_none());
            assert!(parser.is_idle());
        }
    }
}
