/*!
Scratch-buffer primitives shared by the encoders.
*/

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

const HEX: &[u8; 16] = b"0123456789abcdef";

/**
Append `s` with conservative escaping: quote, backslash, and bytes below
0x20 become `\uXXXX`; printable ASCII and non-ASCII pass through.
*/
pub fn append_safe(buf: &mut Vec<u8>, s: &[u8]) {
    for &b in s {
        match b {
            b'"' => buf.extend_from_slice(b"\\\""),
            b'\\' => buf.extend_from_slice(b"\\\\"),
            0x00..=0x1f => {
                buf.extend_from_slice(b"\\u00");
                buf.push(HEX[(b >> 4) as usize]);
                buf.push(HEX[(b & 0x0f) as usize]);
            }
            _ => buf.push(b),
        }
    }
}

/**
Terminate `buf` with a newline unless it already ends with one.
*/
pub fn append_newline(buf: &mut Vec<u8>) {
    if buf.last() != Some(&b'\n') {
        buf.push(b'\n');
    }
}

// Numbers and such go straight into the byte buffer, no intermediate
// string.
pub(crate) fn append_display(buf: &mut Vec<u8>, value: impl core::fmt::Display) {
    use core::fmt::Write;

    struct W<'a>(&'a mut Vec<u8>);

    impl core::fmt::Write for W<'_> {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            self.0.extend_from_slice(s.as_bytes());
            Ok(())
        }
    }

    let _ = write!(W(buf), "{}", value);
}

// One record, one write. A sink that accepts only part of a record would
// tear it for concurrent readers, so a short write is an error rather
// than a retry.
pub(crate) fn write_once(w: &mut impl io::Write, buf: &[u8]) -> Result<()> {
    let written = w.write(buf).map_err(Error::Io)?;

    if written != buf.len() {
        return Err(Error::ShortWrite {
            written,
            len: buf.len(),
        });
    }

    Ok(())
}

/**
An `io::Write` that discards data but counts calls and bytes.

Useful for asserting the single-write-per-event discipline.
*/
#[derive(Debug, Default)]
pub struct CountingSink {
    writes: AtomicU64,
    bytes: AtomicU64,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

impl io::Write for CountingSink {
    fn write(&mut self, p: &[u8]) -> io::Result<usize> {
        (&*self).write(p)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for &CountingSink {
    fn write(&mut self, p: &[u8]) -> io::Result<usize> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(p.len() as u64, Ordering::Relaxed);

        Ok(p.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
