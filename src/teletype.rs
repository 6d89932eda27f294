//! The console transport and formatted output over it.
//!
//! This module defines the [`Teletype`] trait, the byte-granular console
//! the monitor talks through. The embedding kernel implements it over its
//! serial port or terminal driver; tests implement it over scripted
//! buffers. On top of the raw transport sit the [`cprint!`](crate::cprint)
//! and [`cprintln!`](crate::cprintln) macros for formatted output and
//! [`read_line`] for blocking, echoed line input.

use core::fmt;

/// The console transport failed.
///
/// Output is fire-and-forget, so write failures are swallowed by the print
/// macros; this error surfaces only from input, where it means the
/// transport is gone and the monitor loop cannot continue.
#[derive(Debug, PartialEq, Eq)]
pub struct TtyError;

impl fmt::Display for TtyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "console transport failed")
    }
}

/// The `Teletype` trait represents a generic character-based input/output
/// device.
///
/// Implementations of this trait define methods for:
/// - Writing data to the teletype (`write`)
/// - Reading data from the teletype (`read`)
///
/// Reads block until at least one byte is available; a read that returns
/// `Ok(0)` means the transport has closed.
pub trait Teletype {
    /// Writes data to the teletype.
    ///
    /// # Returns
    /// - `Ok(usize)`: The number of bytes successfully written.
    /// - `Err(TtyError)`: If the write operation failed.
    fn write(&mut self, data: &[u8]) -> Result<usize, TtyError>;

    /// Reads data from the teletype, blocking until input arrives.
    ///
    /// # Returns
    /// - `Ok(usize)`: The number of bytes successfully read.
    /// - `Err(TtyError)`: If the read operation failed.
    fn read(&mut self, data: &mut [u8]) -> Result<usize, TtyError>;
}

/// Size of the monitor's line buffer; enough for one terminal line.
pub const CMDBUF_SIZE: usize = 80;

#[doc(hidden)]
pub fn _print(tty: &mut dyn Teletype, args: fmt::Arguments<'_>) {
    struct Sink<'a>(&'a mut dyn Teletype);

    impl fmt::Write for Sink<'_> {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            self.0.write(s.as_bytes()).map(|_| ()).map_err(|_| fmt::Error)
        }
    }

    // Output is fire-and-forget; a dead console cannot be reported anywhere.
    let _ = fmt::Write::write_fmt(&mut Sink(tty), args);
}

/// Prints out the message to the given [`Teletype`].
///
/// Use the `format!` syntax to write data to the console handle.
#[macro_export]
macro_rules! cprint {
    ($tty:expr, $($arg:tt)*) => ($crate::teletype::_print($tty, format_args!($($arg)*)));
}

/// Prints out the message with a newline to the given [`Teletype`].
///
/// Use the `format!` syntax to write data to the console handle.
#[macro_export]
macro_rules! cprintln {
    ($tty:expr) => ($crate::cprint!($tty, "\n"));
    ($tty:expr, $($arg:tt)*) => ($crate::cprint!($tty, "{}\n", format_args!($($arg)*)));
}

/// Read one line from the console, blocking until it is terminated.
///
/// Writes `prompt` first, then accumulates bytes into `buf` until a
/// carriage return, newline, or end-of-transmission (Ctrl-D) arrives.
/// Printable characters are echoed back; backspace (and DEL) rubs out the
/// previous character. Input beyond the buffer capacity is dropped.
///
/// # Returns
/// - `Ok(len)`: The number of bytes of the line now in `buf`.
/// - `Err(TtyError)`: The transport failed or closed mid-line.
pub fn read_line(
    tty: &mut dyn Teletype,
    prompt: &str,
    buf: &mut [u8],
) -> Result<usize, TtyError> {
    let _ = tty.write(prompt.as_bytes());
    let mut len = 0;
    loop {
        let mut byte = [0u8; 1];
        if tty.read(&mut byte)? == 0 {
            return Err(TtyError);
        }
        match byte[0] {
            b'\r' | b'\n' => {
                let _ = tty.write(b"\n");
                return Ok(len);
            }
            // Ctrl+D = EOT. Stop reading immediately.
            0x04 => return Ok(len),
            0x08 | 0x7f => {
                if len > 0 {
                    len -= 1;
                    let _ = tty.write(b"\x08 \x08");
                }
            }
            b @ 0x20..=0x7e => {
                if len < buf.len() {
                    buf[len] = b;
                    len += 1;
                    let _ = tty.write(&byte);
                }
            }
            _ => {}
        }
    }
}
