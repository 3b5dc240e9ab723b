//! Standard stream capture
//!
//! While an experiment is live, every byte written through the engine's
//! stdout/stderr handles is copied into the experiment's `stdout` and
//! `stderr` files while still reaching the console. Each live experiment
//! contributes one tee layer wrapping the sink that was installed before
//! it, so nested experiments see each other's bytes exactly as the outer
//! sink chain dictates.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Which standard stream a capture slot shadows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stdout,
    Stderr,
}

/// A sink installed in a capture slot: the console at the bottom, one tee
/// layer per live experiment above it.
enum Sink {
    Console(Channel),
    Tee(TeeLayer),
}

struct TeeLayer {
    token: u64,
    /// Unbuffered on purpose: capture files are readable while the
    /// experiment is still live.
    file: File,
    inner: Box<Sink>,
}

impl Sink {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Sink::Console(Channel::Stdout) => io::stdout().write_all(buf),
            Sink::Console(Channel::Stderr) => io::stderr().write_all(buf),
            Sink::Tee(layer) => {
                layer.file.write_all(buf)?;
                layer.inner.write_all(buf)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Console(Channel::Stdout) => io::stdout().flush(),
            Sink::Console(Channel::Stderr) => io::stderr().flush(),
            Sink::Tee(layer) => {
                layer.file.flush()?;
                layer.inner.flush()
            }
        }
    }
}

static STDOUT_SLOT: Mutex<Option<Sink>> = Mutex::new(None);
static STDERR_SLOT: Mutex<Option<Sink>> = Mutex::new(None);
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

fn slot(channel: Channel) -> MutexGuard<'static, Option<Sink>> {
    let mutex = match channel {
        Channel::Stdout => &STDOUT_SLOT,
        Channel::Stderr => &STDERR_SLOT,
    };
    // Finalization must proceed even when a panic poisoned the slot.
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Install a tee layer copying `channel` into the file at `path`,
/// wrapping whatever sink is currently installed. Returns a token
/// identifying the layer for [`remove_layer`].
pub(crate) fn install_layer(channel: Channel, path: &Path) -> io::Result<u64> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
    let mut guard = slot(channel);
    let prior = guard.take().unwrap_or(Sink::Console(channel));
    *guard = Some(Sink::Tee(TeeLayer {
        token,
        file,
        inner: Box::new(prior),
    }));
    Ok(token)
}

/// Remove the layer identified by `token`, flushing and closing its file
/// and restoring the sink it replaced. Layers stacked above it are kept
/// intact, so out-of-order removal is safe.
pub(crate) fn remove_layer(channel: Channel, token: u64) -> io::Result<()> {
    let removed = {
        let mut guard = slot(channel);
        let current = guard.take().unwrap_or(Sink::Console(channel));
        let (rest, removed) = detach(current, token);
        *guard = Some(rest);
        removed
    };
    match removed {
        Some(mut file) => file.flush(),
        None => Ok(()),
    }
}

/// Walk the layer chain, detaching the layer carrying `token`.
fn detach(sink: Sink, token: u64) -> (Sink, Option<File>) {
    match sink {
        console @ Sink::Console(_) => (console, None),
        Sink::Tee(layer) if layer.token == token => (*layer.inner, Some(layer.file)),
        Sink::Tee(mut layer) => {
            let (inner, removed) = detach(*layer.inner, token);
            layer.inner = Box::new(inner);
            (Sink::Tee(layer), removed)
        }
    }
}

fn write_channel(channel: Channel, buf: &[u8]) -> io::Result<()> {
    match slot(channel).as_mut() {
        Some(sink) => sink.write_all(buf),
        None => match channel {
            Channel::Stdout => io::stdout().write_all(buf),
            Channel::Stderr => io::stderr().write_all(buf),
        },
    }
}

fn flush_channel(channel: Channel) -> io::Result<()> {
    match slot(channel).as_mut() {
        Some(sink) => sink.flush(),
        None => match channel {
            Channel::Stdout => io::stdout().flush(),
            Channel::Stderr => io::stderr().flush(),
        },
    }
}

/// Writer routing through the capture slot of one channel.
///
/// Obtain with [`stdout`] or [`stderr`]. When no experiment is live this
/// writes straight to the console.
pub struct CaptureWriter {
    channel: Channel,
}

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        write_channel(self.channel, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        flush_channel(self.channel)
    }
}

/// The recorded standard output.
pub fn stdout() -> CaptureWriter {
    CaptureWriter {
        channel: Channel::Stdout,
    }
}

/// The recorded standard error.
pub fn stderr() -> CaptureWriter {
    CaptureWriter {
        channel: Channel::Stderr,
    }
}

/// Print a line to the recorded standard output.
#[macro_export]
macro_rules! outln {
    () => { $crate::outln!("") };
    ($($arg:tt)*) => {{
        use ::std::io::Write as _;
        let _ = ::std::writeln!($crate::capture::stdout(), $($arg)*);
    }};
}

/// Print a line to the recorded standard error.
#[macro_export]
macro_rules! errln {
    () => { $crate::errln!("") };
    ($($arg:tt)*) => {{
        use ::std::io::Write as _;
        let _ = ::std::writeln!($crate::capture::stderr(), $($arg)*);
    }};
}
