//! Error taxonomy shared by the resolver, the registry and the converter.
//!
//! Container probing never produces an error of its own: a location that is
//! not a container is a classification result (see
//! [`Probe`](crate::container::Probe)), not a failure.

use std::io;
use thiserror::Error;

use crate::codec::CodecError;
use crate::container::bundle::BundleError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid mode, missing location, or a bad plugin option.
    #[error("Configuration error: {0}")]
    Config(String),
    /// No matching plugin, no fonts found, or a pack shape a saver can't hold.
    #[error("Format error: {0}")]
    Format(String),
    #[error("Bundle error: {0}")]
    Bundle(#[from] BundleError),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    /// The downstream consumer closed its end (e.g. `bitfont ... | head`).
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == io::ErrorKind::BrokenPipe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broken_pipe_is_recognised() {
        let err = Error::from(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
        assert!(err.is_broken_pipe());
        assert!(!Error::format("nope").is_broken_pipe());
    }
}
