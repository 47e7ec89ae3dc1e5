//! Opens line-oriented meter connections: stdin, regular files, serial ttys.

use std::fs::File;
use std::io::{BufReader, IsTerminal, Read};
use std::time::Duration;
use torque_traits::{FeedConnector, SensorFeed};

use crate::error::{FeedError, Result};
use crate::line_feed::LineFeed;

/// Connection id that reads from standard input.
pub const STDIN: &str = "-";

#[derive(Debug, Clone)]
pub struct SerialConnector {
    read_timeout: Duration,
}

impl Default for SerialConnector {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(1000),
        }
    }
}

impl SerialConnector {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }

    pub fn open_feed(&self, connection: &str, baud: u32) -> Result<LineFeed> {
        if connection == STDIN {
            tracing::info!("reading torque values from stdin");
            return Ok(LineFeed::spawn("stdin", BufReader::new(std::io::stdin())));
        }
        let file = File::open(connection).map_err(|source| FeedError::Open {
            path: connection.to_string(),
            source,
        })?;
        if file.is_terminal() {
            configure_tty(&file, baud, self.read_timeout)?;
            tracing::info!(port = %connection, baud, "serial port opened");
            let reader = BufReader::new(TimeoutReader(file));
            Ok(LineFeed::spawn(connection, reader))
        } else {
            tracing::info!(path = %connection, "replaying torque values from file");
            Ok(LineFeed::spawn(connection, BufReader::new(file)))
        }
    }
}

impl FeedConnector for SerialConnector {
    fn open(
        &self,
        connection: &str,
        baud: u32,
    ) -> std::result::Result<Box<dyn SensorFeed + Send>, Box<dyn std::error::Error + Send + Sync>>
    {
        Ok(Box::new(self.open_feed(connection, baud)?))
    }
}

/// A tty in non-canonical mode returns 0 bytes on read timeout; report that as
/// `TimedOut` so it is not mistaken for end of input.
struct TimeoutReader(File);

impl Read for TimeoutReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.0.read(buf)? {
            0 if !buf.is_empty() => Err(std::io::ErrorKind::TimedOut.into()),
            n => Ok(n),
        }
    }
}

#[cfg(feature = "serial")]
fn configure_tty(file: &File, baud: u32, read_timeout: Duration) -> Result<()> {
    use nix::sys::termios::{self, BaudRate, SetArg, SpecialCharacterIndices};

    let rate = match baud {
        1200 => BaudRate::B1200,
        2400 => BaudRate::B2400,
        4800 => BaudRate::B4800,
        9600 => BaudRate::B9600,
        19200 => BaudRate::B19200,
        38400 => BaudRate::B38400,
        57600 => BaudRate::B57600,
        115_200 => BaudRate::B115200,
        other => return Err(FeedError::UnsupportedBaud(other)),
    };
    let mut tio = termios::tcgetattr(file).map_err(|e| FeedError::Termios(e.to_string()))?;
    termios::cfmakeraw(&mut tio);
    termios::cfsetspeed(&mut tio, rate).map_err(|e| FeedError::Termios(e.to_string()))?;
    // VTIME is in tenths of a second, capped at 255.
    let deciseconds = u8::try_from((read_timeout.as_millis() / 100).clamp(1, 255)).unwrap_or(255);
    tio.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
    tio.control_chars[SpecialCharacterIndices::VTIME as usize] = deciseconds;
    termios::tcsetattr(file, SetArg::TCSANOW, &tio)
        .map_err(|e| FeedError::Termios(e.to_string()))?;
    Ok(())
}

#[cfg(not(feature = "serial"))]
fn configure_tty(_file: &File, baud: u32, _read_timeout: Duration) -> Result<()> {
    tracing::warn!(baud, "built without `serial`; using the tty's current line settings");
    Ok(())
}
