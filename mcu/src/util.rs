use alloc::string::String;
use log::{Metadata, Record};

use core::fmt::Write;

use rtt_target::rprintln;

#[macro_export]
macro_rules! error_with_location {
    ($msg:expr) => {
        anyhow!("{} at {}:{}", $msg, file!(), line!())
    };
    ($fmt:expr, $($arg:tt)*) => {
        anyhow!("{} at {}:{}", format!($fmt, $($arg)*), file!(), line!())
    };
}

/// Writes every record to RTT and to the UART console, prefixed with the
/// uptime and the core that logged it.
pub struct MultiLogger;

impl log::Log for MultiLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // format once
        let mut buf = String::new();
        let _ = write!(
            &mut buf,
            "{:>8} [{}] core{} {}: {}",
            embassy_time::Instant::now().as_millis(),
            record.level(),
            esp_hal::system::Cpu::current() as u8,
            record.target(),
            record.args()
        );

        rprintln!("{}", buf);

        // esp_println writes straight to the UART, log! here would recurse
        esp_println::println!("{}", buf);
    }

    fn flush(&self) {}
}

/// `&'static mut` zeroed buffer, one per call site.
#[macro_export]
macro_rules! static_buf {
    ($ty:ty, $size:expr) => {{
        {
            static mut BUF: [$ty; $size] = [0 as $ty; $size];
            #[allow(static_mut_refs)]
            #[allow(unsafe_code)]
            unsafe {
                &mut BUF
            }
        }
    }};
}
