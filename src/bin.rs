#![no_main]
#![no_std]
#![feature(type_alias_impl_trait)]

use gps_logger::{
    config::{
        GPS_BAUD, LOG_INTERVAL_MS, REFRESH_INTERVAL_MS, UART_RX_BUFSIZE, USB_BUFSIZE,
        CSV_ROW_CAPACITY,
    },
    report,
    screen::{LogStatus, StatusScreen},
    Fix, FmtBuf, Gps,
};

use core::fmt::Write as _;
use defmt::{debug, error, info, trace, warn};
use defmt_brtt as _; // global logger
use embedded_hal::serial::Read as _;
use panic_probe as _;
use rtic_monotonics::{create_systick_token, systick::Systick, Monotonic};
use rtic_sync::{
    channel::{Receiver, Sender},
    make_channel,
};
use stm32_usbd::UsbBus;
use stm32l4xx_hal::{
    self as hal,
    gpio::{Alternate, Output, PushPull, PA2, PA3, PA4, PA5, PA6, PA7},
    hal::spi::{Mode, Phase, Polarity},
    pac,
    pac::{LPUART1, SPI1},
    prelude::*,
    rcc::{ClockSecuritySystem, CrystalBypass},
    serial,
    serial::{Config, Serial},
    spi::Spi,
};
use tinyvec::ArrayVec;
use usb_device::device::{UsbDeviceBuilder, UsbDeviceState, UsbVidPid};
use usb_device::UsbError;
use usbd_serial::{SerialPort, USB_CLASS_CDC};

type SharpMemDisplay = gps_logger::display::SharpMemDisplay<
    Spi<
        SPI1,
        (
            PA5<Alternate<PushPull, 5>>,
            PA6<Alternate<PushPull, 5>>,
            PA7<Alternate<PushPull, 5>>,
        ),
    >,
    PA4<Output<PushPull>>,
>;

type LpUart1 = Serial<LPUART1, (PA2<Alternate<PushPull, 8>>, PA3<Alternate<PushPull, 8>>)>;

// same panicking *behavior* as `panic-probe` but doesn't print a panic message
// this prevents the panic message being printed *twice* when `defmt::panic` is invoked
#[defmt::panic_handler]
fn panic() -> ! {
    cortex_m::asm::udf()
}

defmt::timestamp!("{=u32:ms}", now_ms());

fn now_ms() -> u32 {
    Systick::now().duration_since_epoch().to_millis()
}

/// False once the receiving end is gone.
async fn send_all(tx: &mut Sender<'static, u8, USB_BUFSIZE>, bytes: &[u8]) -> bool {
    for &b in bytes {
        if tx.send(b).await.is_err() {
            return false;
        }
    }
    true
}

#[rtic::app(
    device = stm32l4xx_hal::pac,
    dispatchers = [EXTI2, EXTI3],
)]
mod app {
    use super::*;

    // Shared resources go here
    #[shared]
    struct Shared {
        display: SharpMemDisplay,
        fix: Fix,
        log_status: LogStatus,
    }

    // Local resources go here
    #[local]
    struct Local {
        uart: LpUart1,
        rx_send: Sender<'static, u8, UART_RX_BUFSIZE>,
    }

    ////////////////////////////////////////////////////////////////////////////
    // Main thread tasks ///////////////////////////////////////////////////////
    ////////////////////////////////////////////////////////////////////////////

    #[init]
    fn init(cx: init::Context) -> (Shared, Local) {
        trace!("init enter");

        let mut flash = cx.device.FLASH.constrain();
        let mut rcc = cx.device.RCC.constrain();
        let mut pwr = cx.device.PWR.constrain(&mut rcc.apb1r1);
        let clocks = rcc
            .cfgr
            .lse(CrystalBypass::Disable, ClockSecuritySystem::Disable)
            .freeze(&mut flash.acr, &mut pwr);

        let mut gpioa = cx.device.GPIOA.split(&mut rcc.ahb2);

        // Create SysTick monotonic for task scheduling
        Systick::start(cx.core.SYST, clocks.sysclk().raw(), create_systick_token!());

        // Initialize SPI and display
        let mut cs = gpioa
            .pa4
            .into_push_pull_output(&mut gpioa.moder, &mut gpioa.otyper);
        cs.set_low();
        let sck = gpioa
            .pa5
            .into_alternate(&mut gpioa.moder, &mut gpioa.otyper, &mut gpioa.afrl);
        let miso = gpioa
            .pa6
            .into_alternate(&mut gpioa.moder, &mut gpioa.otyper, &mut gpioa.afrl);
        let mosi = gpioa
            .pa7
            .into_alternate(&mut gpioa.moder, &mut gpioa.otyper, &mut gpioa.afrl);
        let spi1 = Spi::spi1(
            cx.device.SPI1,
            (sck, miso, mosi),
            Mode {
                phase: Phase::CaptureOnFirstTransition,
                polarity: Polarity::IdleLow,
            },
            false,
            2.MHz(),
            clocks,
            &mut rcc.apb2,
        );

        // Initialize UART for GPS
        let tx = gpioa
            .pa2
            .into_alternate(&mut gpioa.moder, &mut gpioa.otyper, &mut gpioa.afrl);
        let rx = gpioa
            .pa3
            .into_alternate(&mut gpioa.moder, &mut gpioa.otyper, &mut gpioa.afrl);

        let mut uart = Serial::lpuart1(
            cx.device.LPUART1,
            (tx, rx),
            Config::default().baudrate(GPS_BAUD.bps()),
            clocks,
            &mut rcc.apb1r2,
        );
        uart.listen(serial::Event::Rxne);

        // Initialize USB Serial
        let dm = gpioa
            .pa11
            .into_alternate(&mut gpioa.moder, &mut gpioa.otyper, &mut gpioa.afrh);
        let dp = gpioa
            .pa12
            .into_alternate(&mut gpioa.moder, &mut gpioa.otyper, &mut gpioa.afrh);

        // Turn on USB power
        unsafe {
            pac::Peripherals::steal()
                .PWR
                .cr2
                .modify(|_, w| w.usv().set_bit())
        };

        // Create USB peripheral object
        let usb = hal::usb::Peripheral {
            usb: cx.device.USB,
            pin_dm: dm,
            pin_dp: dp,
        };

        // Create channels for communicating between tasks and the UART interrupt
        let (rx_send, rx_recv) = make_channel!(u8, UART_RX_BUFSIZE);
        let (usb_send, usb_recv) = make_channel!(u8, USB_BUFSIZE);

        // Spawn tasks
        usb_poll::spawn(usb, usb_recv).map_err(|_| ()).unwrap();
        gps_task::spawn(rx_recv).map_err(|_| ()).unwrap();
        display_task::spawn().unwrap();
        log_task::spawn(usb_send).map_err(|_| ()).unwrap();

        info!("done initializing!");
        trace!("init exit");
        (
            Shared {
                display: SharpMemDisplay::new(spi1, cs),
                fix: Fix::new(),
                log_status: LogStatus::Attempting,
            },
            Local { uart, rx_send },
        )
    }

    #[idle]
    fn idle(_: idle::Context) -> ! {
        trace!("idle enter");

        loop {
            // Only sleep in release mode, since the debugger doesn't interact with sleep very nicely
            #[cfg(debug_assertions)]
            cortex_m::asm::nop();
            #[cfg(not(debug_assertions))]
            cortex_m::asm::wfi();
        }
    }

    ////////////////////////////////////////////////////////////////////////////
    // Hardware interrupt handlers /////////////////////////////////////////////
    ////////////////////////////////////////////////////////////////////////////

    // Move received GPS bytes into the decoder channel
    #[task(binds = LPUART1, priority = 10, local = [uart, rx_send])]
    fn on_uart(cx: on_uart::Context) {
        loop {
            match cx.local.uart.read() {
                // If the channel is full, then drop the received value
                Ok(b) => {
                    let _ = cx.local.rx_send.try_send(b);
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(_)) => {
                    warn!("GPS UART error");
                    break;
                }
            }
        }
    }

    ////////////////////////////////////////////////////////////////////////////
    // Async tasks /////////////////////////////////////////////////////////////
    ////////////////////////////////////////////////////////////////////////////

    // Decode NMEA and publish the fix
    #[task(priority = 2, shared = [fix])]
    async fn gps_task(
        mut cx: gps_task::Context,
        mut rx_recv: Receiver<'static, u8, UART_RX_BUFSIZE>,
    ) {
        trace!("gps_task enter");

        let mut gps = Gps::new(now_ms as fn() -> u32);
        while let Ok(b) = rx_recv.recv().await {
            let mut sentences = u32::from(gps.encode(b));
            // Drain whatever else arrived before publishing once
            while let Ok(b) = rx_recv.try_recv() {
                sentences += u32::from(gps.encode(b));
            }
            cx.shared.fix.lock(|f| *f = *gps.fix());
            if sentences > 0 {
                trace!("{} sentences, {} chars total", sentences, gps.stats().chars_processed);
                gps.clear_updated();
            }
        }
        error!("GPS channel closed");
    }

    // Redraw the status page
    #[task(priority = 1, shared = [display, fix, log_status])]
    async fn display_task(mut cx: display_task::Context) {
        if let Err(e) = cx.shared.display.lock(|display| display.clear_flush()) {
            error!("display init failed: {}", e);
        }

        let screen = StatusScreen::new();

        loop {
            let fix = cx.shared.fix.lock(|f| *f);
            let status = cx.shared.log_status.lock(|s| *s);
            let now = now_ms();
            debug!("redraw at {}, status {}", now, status);

            cx.shared.display.lock(|display| {
                display.clear_buffer();
                // Drawing into the frame buffer cannot fail
                let _ = screen.draw(&fix, now, status, display);
                if let Err(e) = display.flush() {
                    warn!("display flush failed: {}", e);
                }
            });

            Systick::delay(REFRESH_INTERVAL_MS.millis()).await;
        }
    }

    // Append a CSV row to the log stream
    #[task(priority = 1, shared = [fix, log_status])]
    async fn log_task(
        mut cx: log_task::Context,
        mut usb_send: Sender<'static, u8, USB_BUFSIZE>,
    ) {
        trace!("log_task enter");

        let mut file = FmtBuf::<16>::new();
        loop {
            Systick::delay(LOG_INTERVAL_MS.millis()).await;

            let fix = cx.shared.fix.lock(|f| *f);
            let now = now_ms();

            // A new day (or the first date) starts a new log
            let name = report::log_file_name(fix.date.get());
            if name.0 != file.0 {
                info!("starting log {}", name.as_str().unwrap_or_default());
                let mut header = FmtBuf::<CSV_ROW_CAPACITY>::new();
                let ok = write!(header, "# {}\r\n", name.as_str().unwrap_or_default()).is_ok()
                    && report::write_csv_header(&mut header).is_ok();
                if !ok || !send_all(&mut usb_send, header.0.as_slice()).await {
                    break;
                }
                file = name;
            }

            let mut row = FmtBuf::<CSV_ROW_CAPACITY>::new();
            if report::write_csv_row(&mut row, &fix, now).is_err() {
                warn!("CSV row does not fit in {} bytes", CSV_ROW_CAPACITY);
                continue;
            }
            if !send_all(&mut usb_send, row.0.as_slice()).await {
                break;
            }
        }

        error!("log stream closed");
        cx.shared.log_status.lock(|s| *s = LogStatus::Unavailable);
    }

    // Poll USB
    #[task(priority = 1, shared = [log_status])]
    async fn usb_poll(
        mut cx: usb_poll::Context,
        usb: hal::usb::Peripheral,
        mut tx_recv: Receiver<'static, u8, USB_BUFSIZE>,
    ) {
        trace!("usb_poll enter");

        let usb_bus = UsbBus::new(usb);

        let mut serial = SerialPort::new(&usb_bus);

        let mut usb_dev = UsbDeviceBuilder::new(&usb_bus, UsbVidPid(0x16c0, 0x27dd))
            .manufacturer("ECE500")
            .product("GPS Logger")
            .serial_number("TEST")
            .device_class(USB_CLASS_CDC)
            .build();

        let mut tx_buf = ArrayVec::<[u8; USB_BUFSIZE]>::new();
        let mut write_ok = true;

        loop {
            Systick::delay(10.millis()).await;

            while tx_buf.len() < tx_buf.capacity() {
                if let Ok(b) = tx_recv.try_recv() {
                    tx_buf.push(b);
                } else {
                    break;
                }
            }
            trace!("usb state: {}", usb_dev.state());

            let polled = usb_dev.poll(&mut [&mut serial]);

            // Re-derived every pass so an unplug shows up even without events
            let configured = usb_dev.state() == UsbDeviceState::Configured;
            cx.shared
                .log_status
                .lock(|s| *s = s.next(configured, write_ok));

            if !polled || tx_buf.is_empty() {
                continue;
            }
            match serial.write(&tx_buf) {
                Ok(count) => {
                    trace!("sent {} bytes to usb", count);
                    tx_buf.drain(0..count).for_each(|_| ());
                    write_ok = true;
                }
                Err(UsbError::WouldBlock) => (),
                Err(_) => {
                    // Retried on the next pass
                    warn!("usb write failed");
                    write_ok = false;
                }
            }
        }
    }
}
