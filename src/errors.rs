//! Typed error cases the core can report distinctly from a generic
//! `anyhow` bail, for callers that want to match on *why* something failed
//! rather than just log the message.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("FRESTORE malformed frame: version {version:#04x} size {size:#04x}")]
    InvalidFrame { version: u8, size: u8 },
    #[error("FRESTORE unrecognised frame version {version:#04x}")]
    InvalidVersion { version: u8 },
}
