use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_hal::{
    digital::v2::OutputPin,
    blocking::spi::Write as SpiWrite,
};

pub const WIDTH: usize = 400;
pub const HEIGHT: usize = 240;
const WIDTH_BYTES: usize = WIDTH.div_ceil(8);
const HEIGHT_BYTES: usize = HEIGHT.div_ceil(8);

const UPDATE_BIT: u8 = 0b0000_0001;
const VCOM_BIT: u8 = 0b0000_0010;
const CLEAR_BIT: u8 = 0b0000_0100;

#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayError {
    #[error("SPI write failed")]
    Spi,
    #[error("chip select failed")]
    Pin,
}

type Result<T> = core::result::Result<T, DisplayError>;

struct SpiTransaction<'a, SPI, CS> {
    spi: &'a mut SPI,
    cs: &'a mut CS
}

impl<'a, SPI, CS> SpiTransaction<'a, SPI, CS>
    where SPI: SpiWrite<u8>,
          CS:  OutputPin
{
    // The panel latches on a rising chip select, and every command must
    // toggle VCOM to keep the liquid crystal from polarizing.
    fn start(disp: &'a mut SharpMemDisplayDriver<SPI, CS>, command: u8) -> Result<Self> {
        disp.vcom = !disp.vcom;
        let command = command | if disp.vcom { VCOM_BIT } else { 0 };
        disp.cs.set_high().map_err(|_| DisplayError::Pin)?;
        Self {
            spi: &mut disp.spi,
            cs: &mut disp.cs
        }.send(&[command])
    }

    fn send(self, data: &[u8]) -> Result<Self> {
        self.spi.write(data).map_err(|_| DisplayError::Spi)?;
        Ok(self)
    }

    fn finish(self) -> Result<()> {
        self.cs.set_low().map_err(|_| DisplayError::Pin)
    }
}


pub struct SharpMemDisplayDriver<SPI, CS> {
    spi: SPI,
    cs: CS,
    vcom: bool
}

impl<SPI, CS> SharpMemDisplayDriver<SPI, CS>
    where SPI: SpiWrite<u8>,
          CS:  OutputPin
{
    pub fn new(spi: SPI, cs: CS) -> Self {
        Self {
            spi,
            cs,
            vcom: false
        }
    }

    fn start(&mut self, command: u8) -> Result<SpiTransaction<SPI, CS>> {
        SpiTransaction::start(self, command)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.start(CLEAR_BIT)?.send(&[0x00])?.finish()
    }

    pub fn release(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }
}

/// Frame buffer for a 400x240 Sharp memory LCD. Drawing only touches the
/// buffer; [`flush`](Self::flush) sends the rows that changed.
pub struct SharpMemDisplay<SPI, CS> {
    buf: [[u8; WIDTH_BYTES]; HEIGHT],
    dirty: [u8; HEIGHT_BYTES],
    dirty_any: bool,
    driver: SharpMemDisplayDriver<SPI, CS>
}

impl<SPI, CS> SharpMemDisplay<SPI, CS>
    where SPI: SpiWrite<u8>,
          CS:  OutputPin
{
    pub fn new(spi: SPI, cs: CS) -> Self {
        Self {
            buf: [[0xFF; WIDTH_BYTES]; HEIGHT],
            dirty: [0; HEIGHT_BYTES],
            dirty_any: false,
            driver: SharpMemDisplayDriver::new(spi, cs)
        }
    }

    /// `state` is the raw panel bit: set is white.
    pub fn draw_pixel(&mut self, x: usize, y: usize, state: bool) {
        if x >= WIDTH || y >= HEIGHT { return }
        let before = self.buf[y][x / 8];
        if state {
            self.buf[y][x / 8] |= 1u8 << (x % 8);
        } else {
            self.buf[y][x / 8] &= !(1u8 << (x % 8));
        }
        if self.buf[y][x / 8] != before {
            self.dirty[y / 8] |= 1u8 << (y % 8);
            self.dirty_any = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_any
    }

    /// Blanks the frame buffer without touching the panel.
    pub fn clear_buffer(&mut self) {
        for (y, row) in self.buf.iter_mut().enumerate() {
            if row.iter().any(|&b| b != 0xFF) {
                *row = [0xFF; WIDTH_BYTES];
                self.dirty[y / 8] |= 1u8 << (y % 8);
                self.dirty_any = true;
            }
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        // Don't send anything if there's nothing to flush
        if !self.dirty_any {
            return Ok(())
        }
        let dirty = self.dirty;
        // For each line
        self.buf.iter().enumerate()
            // If the line is dirty
            .filter(|(y, _)| (dirty[y / 8] & (1u8 << (y % 8))) != 0u8)
            // Send it
            .try_fold(
                self.driver.start(UPDATE_BIT)?, // command byte
                |trn, (y, row)|
                    trn.send(&[y as u8 + 1])? // address byte, rows count from 1
                        .send(row)? // row data
                        .send(&[0x00]) // spacing byte
            )?
            .send(&[0x00])? // termination byte
            .finish()?;

        // Clear dirty bits
        self.dirty = [0; HEIGHT_BYTES];
        self.dirty_any = false;
        Ok(())
    }

    /// Clears the panel itself and the frame buffer to match.
    pub fn clear_flush(&mut self) -> Result<()> {
        self.driver.clear()?;
        self.buf = [[0xFF; WIDTH_BYTES]; HEIGHT];
        self.dirty = [0; HEIGHT_BYTES];
        self.dirty_any = false;
        Ok(())
    }

    pub fn release(self) -> (SPI, CS) {
        self.driver.release()
    }
}

impl<SPI, CS> DrawTarget for SharpMemDisplay<SPI, CS>
    where SPI: SpiWrite<u8>,
          CS:  OutputPin
{
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> core::result::Result<(), Self::Error> where I: IntoIterator<Item=Pixel<Self::Color>> {
        for Pixel(pos, color) in pixels {
            if pos.x < 0 || pos.y < 0 { continue }
            self.draw_pixel(pos.x as usize, pos.y as usize, match color {
                BinaryColor::Off => true,
                BinaryColor::On => false
            });
        }
        Ok(())
    }
}

impl<SPI, CS> OriginDimensions for SharpMemDisplay<SPI, CS> {
    fn size(&self) -> Size {
        Size {width: WIDTH as u32, height: HEIGHT as u32}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

    #[derive(Default)]
    struct FakeSpi {
        written: Vec<u8>,
        fail: bool,
    }

    impl SpiWrite<u8> for FakeSpi {
        type Error = ();

        fn write(&mut self, words: &[u8]) -> core::result::Result<(), ()> {
            if self.fail {
                return Err(());
            }
            self.written.extend_from_slice(words);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakePin {
        high: bool,
        rises: usize,
    }

    impl OutputPin for FakePin {
        type Error = Infallible;

        fn set_low(&mut self) -> core::result::Result<(), Infallible> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> core::result::Result<(), Infallible> {
            self.high = true;
            self.rises += 1;
            Ok(())
        }
    }

    fn display() -> SharpMemDisplay<FakeSpi, FakePin> {
        SharpMemDisplay::new(FakeSpi::default(), FakePin::default())
    }

    #[test]
    fn nothing_to_flush_sends_nothing() {
        let mut d = display();
        d.flush().unwrap();
        // Drawing white on a white panel changes nothing
        d.draw_pixel(3, 3, true);
        d.flush().unwrap();
        let (spi, cs) = d.release();
        assert!(spi.written.is_empty());
        assert_eq!(cs.rises, 0);
    }

    #[test]
    fn flush_sends_only_dirty_rows() {
        let mut d = display();
        Pixel(Point::new(9, 2), BinaryColor::On).draw(&mut d).unwrap();
        assert!(d.is_dirty());
        d.flush().unwrap();
        assert!(!d.is_dirty());

        let (spi, cs) = d.release();
        // command, address, row, spacing, termination
        assert_eq!(spi.written.len(), 1 + 1 + WIDTH_BYTES + 1 + 1);
        assert_eq!(spi.written[0] & UPDATE_BIT, UPDATE_BIT);
        assert_eq!(spi.written[1], 3);
        assert_eq!(spi.written[2 + 1], !(1u8 << 1));
        assert!(spi.written[2..2 + WIDTH_BYTES]
            .iter()
            .enumerate()
            .all(|(i, &b)| i == 1 || b == 0xFF));
        assert_eq!(cs.rises, 1);
        assert!(!cs.high);
    }

    #[test]
    fn vcom_toggles_between_commands() {
        let mut d = display();
        d.clear_flush().unwrap();
        d.clear_flush().unwrap();
        let (spi, _) = d.release();
        assert_eq!(spi.written.len(), 4);
        assert_ne!(spi.written[0] & VCOM_BIT, spi.written[2] & VCOM_BIT);
        assert_eq!(spi.written[0] & CLEAR_BIT, CLEAR_BIT);
    }

    #[test]
    fn draws_through_embedded_graphics() {
        let mut d = display();
        Rectangle::new(Point::new(-5, -5), Size::new(10, 10))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut d)
            .unwrap();
        assert_eq!(d.buf[0][0], !0b0001_1111);
        assert_eq!(d.buf[5][0], 0xFF);
        assert_eq!(d.bounding_box().size, Size::new(400, 240));

        d.clear_buffer();
        assert!(d.buf.iter().all(|row| row.iter().all(|&b| b == 0xFF)));
    }

    #[test]
    fn spi_errors_are_reported() {
        let mut d = SharpMemDisplay::new(
            FakeSpi {
                fail: true,
                ..Default::default()
            },
            FakePin::default(),
        );
        d.draw_pixel(0, 0, false);
        assert_eq!(d.flush(), Err(DisplayError::Spi));
        assert!(d.is_dirty());
    }
}
