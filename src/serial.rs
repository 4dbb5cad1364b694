use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

#[cfg(all(target_arch = "x86_64", not(test)))]
use lazy_static::lazy_static;
#[cfg(all(target_arch = "x86_64", not(test)))]
use spin::Mutex;
#[cfg(all(target_arch = "x86_64", not(test)))]
use x86_64::instructions::port::Port;

// ──────────────────────────────────────────────────────────────
//  Log levels
// ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Error => "[ERROR] ",
            Level::Warn  => "[WARN] ",
            Level::Info  => "[INFO] ",
            Level::Debug => "[DEBUG] ",
        }
    }
}

static MAX_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

pub fn set_max_level(level: Level) {
    MAX_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn enabled(level: Level) -> bool {
    level as u8 <= MAX_LEVEL.load(Ordering::Relaxed)
}

// ──────────────────────────────────────────────────────────────
//  COM1 UART
// ──────────────────────────────────────────────────────────────

#[cfg(all(target_arch = "x86_64", not(test)))]
pub struct SerialPort {
    data: Port<u8>,
    int_en: Port<u8>,
    fifo_ctrl: Port<u8>,
    line_ctrl: Port<u8>,
    modem_ctrl: Port<u8>,
    line_sts: Port<u8>,
}

#[cfg(all(target_arch = "x86_64", not(test)))]
impl SerialPort {
    pub const unsafe fn new(base: u16) -> SerialPort {
        SerialPort {
            data: Port::new(base),
            int_en: Port::new(base + 1),
            fifo_ctrl: Port::new(base + 2),
            line_ctrl: Port::new(base + 3),
            modem_ctrl: Port::new(base + 4),
            line_sts: Port::new(base + 5),
        }
    }

    /// 38400 baud, 8N1, FIFO enabled. Receive interrupts stay off: nothing
    /// in the storage stack reads from the line.
    pub fn init(&mut self) {
        unsafe {
            self.int_en.write(0x00);
            self.line_ctrl.write(0x80);
            self.data.write(0x03);
            self.int_en.write(0x00);
            self.line_ctrl.write(0x03);
            self.fifo_ctrl.write(0xC7);
            self.modem_ctrl.write(0x0B);
        }
    }

    fn wait_for_tx_empty(&mut self) {
        unsafe {
            while (self.line_sts.read() & 0x20) == 0 {
                core::hint::spin_loop();
            }
        }
    }

    pub fn send(&mut self, data: u8) {
        self.wait_for_tx_empty();
        unsafe {
            self.data.write(data);
        }
    }
}

#[cfg(all(target_arch = "x86_64", not(test)))]
impl fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            self.send(byte);
        }
        Ok(())
    }
}

#[cfg(all(target_arch = "x86_64", not(test)))]
lazy_static! {
    pub static ref SERIAL1: Mutex<SerialPort> = {
        let mut serial_port = unsafe { SerialPort::new(0x3F8) };
        serial_port.init();
        Mutex::new(serial_port)
    };
}

// ──────────────────────────────────────────────────────────────
//  Sinks
// ──────────────────────────────────────────────────────────────

#[cfg(all(target_arch = "x86_64", not(test)))]
fn emit(level: Level, args: fmt::Arguments) {
    use core::fmt::Write;
    let mut port = SERIAL1.lock();
    // A wedged UART has nowhere to report to.
    let _ = port.write_str(level.tag());
    let _ = port.write_fmt(args);
    let _ = port.write_str("\n");
}

#[cfg(test)]
fn emit(level: Level, args: fmt::Arguments) {
    std::eprintln!("{}{}", level.tag(), args);
}

#[cfg(all(not(target_arch = "x86_64"), not(test)))]
fn emit(_level: Level, _args: fmt::Arguments) {}

#[doc(hidden)]
pub fn _log(level: Level, args: fmt::Arguments) {
    if enabled(level) {
        emit(level, args);
    }
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::serial::_log($crate::serial::Level::Error, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::serial::_log($crate::serial::Level::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::serial::_log($crate::serial::Level::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::serial::_log($crate::serial::Level::Debug, format_args!($($arg)*))
    };
}

/// Bring up the UART and apply the configured level.
pub fn init(level: Level) {
    set_max_level(level);
    #[cfg(all(target_arch = "x86_64", not(test)))]
    {
        let _ = SERIAL1.lock();
    }
}
