/*!
The crate [`Error`] type.

Encoding is total on well-formed input, so encoders only fail when the
underlying byte sink does. The error they return is the sink's error,
wrapped but otherwise untouched.
*/

use std::io;

/**
An error writing an event to a sink.
*/
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /**
    The byte sink refused the record.
    */
    #[error("write failed: {0}")]
    Io(#[from] io::Error),

    /**
    The byte sink accepted only part of the record.

    A partial record would be torn for any concurrent reader, so the
    remainder is not retried.
    */
    #[error("short write: {written} of {len} bytes")]
    ShortWrite { written: usize, len: usize },

    /**
    A rotating file sink failed to open a fresh file.
    */
    #[error("rotate failed after {tries} attempts: {source}")]
    Rotate { tries: u32, source: io::Error },
}

/**
A `Result` alias defaulting to the crate [`Error`].
*/
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn into_io(self) -> io::Error {
        match self {
            Error::Io(err) => err,
            err => io::Error::new(io::ErrorKind::Other, err),
        }
    }
}
