//! Chimera error taxonomy, following §7 Error Handling Design.

use thiserror::Error;

/// Top-level error type. Per §7, nothing below ever unwinds out of the Core
/// worker loop — these are constructed, logged, and handled in place; this
/// type exists for the pieces of the crate that *do* return `Result` (profile
/// validation, ECC adapters, audio-host trait methods) so callers outside the
/// worker (tests, `chimera-cli`) get a typed error.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("profile configuration error: {0}")]
    Profile(#[from] ProfileError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// (i) Device errors — open/read/write/pause on the audio host. Logged as
/// fatal by the core loop; the offending iteration is skipped and the loop
/// continues (§7.i).
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to open audio device: {reason}")]
    OpenFailed { reason: String },

    #[error("failed to capture {requested} samples: {reason}")]
    CaptureFailed { requested: usize, reason: String },

    #[error("failed to write {requested} samples to playback: {reason}")]
    PlaybackFailed { requested: usize, reason: String },

    #[error("failed to toggle playback pause: {reason}")]
    PauseFailed { reason: String },
}

/// (ii) Configuration errors — ECC bytes ≥ payload width, or overlapping
/// frequency bands. Logged as a warning; ECC is silently disabled or the
/// profile activation is rejected (§7.ii).
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error(
        "ECC bytes ({ecc_bytes}) leave no payload in a {codeword_bytes}-byte codeword"
    )]
    EccExceedsCodeword {
        ecc_bytes: usize,
        codeword_bytes: usize,
    },

    #[error(
        "data band [{data_lo_hz:.1}, {data_hi_hz:.1}] Hz overlaps checksum band [{check_lo_hz:.1}, {check_hi_hz:.1}] Hz"
    )]
    OverlappingBands {
        data_lo_hz: f64,
        data_hi_hz: f64,
        check_lo_hz: f64,
        check_hi_hz: f64,
    },

    #[error(
        "declared bands reach {data_hi_hz:.1}/{check_hi_hz:.1} Hz, at or above Nyquist {nyquist_hz:.1} Hz"
    )]
    NyquistViolation {
        data_hi_hz: f64,
        check_hi_hz: f64,
        nyquist_hz: f64,
    },
}

/// (iii) Decode failures — non-fatal, the frame is discarded (§7.iii).
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Reed-Solomon decode failed: syndrome indicates uncorrectable codeword")]
    Uncorrectable,

    #[error("codec construction failed: {reason}")]
    CodecConstructionFailed { reason: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
