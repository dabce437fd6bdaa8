//! Protocol profiles (C1).
//!
//! A profile is a pure function returning a fully populated [`ProtocolParams`].
//! Selecting a profile never mutates the Core worker's state directly — the
//! UI-side caller installs the returned params into a [`crate::state::StateInput`]
//! and enqueues an `Init`/`DataOn` event to publish them to the worker.

use serde::{Deserialize, Serialize};

/// Compile-time-small constant mirroring the reference implementation's
/// `kSubFrames`. Left as `1` (one sub-frame per spectral frame); kept as a
/// named constant rather than inlined because several invariants reference it.
pub const K_SUB_FRAMES: usize = 1;
pub const K_MAX_BITS_PER_CHECKSUM: usize = 10;
pub const K_MAX_SPECTRUM_HISTORY: usize = 2 * K_SUB_FRAMES;
pub const K_MAX_DATA_SIZE: usize = 1024;
pub const K_MAX_DATA_BITS: usize = 256;

/// Immutable parameter set for one activation of the modem.
///
/// All frequencies are nominal; [`ProtocolParams::round_frequencies_to_bins`]
/// snaps them onto bin centers once `sample_rate`/`samples_per_frame` are final.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolParams {
    pub sample_rate: u32,
    pub samples_per_frame: usize,
    pub samples_per_sub_frame: usize,

    pub n_ramp_frames_begin: usize,
    pub n_ramp_frames_end: usize,
    pub n_ramp_frames_blend: usize,
    pub n_confirm_frames: usize,
    pub sub_frames_per_tx: usize,
    pub n_data_bits_per_tx: usize,
    pub n_ecc_bytes_per_tx: usize,

    pub encode_id_parity: bool,
    pub use_checksum: bool,

    pub send_volume: f32,

    pub freq_delta_hz: f32,
    pub freq_start_hz: f32,
    pub freq_check_hz: f32,

    pub initial_data_bits: Vec<bool>,
}

impl ProtocolParams {
    pub fn hz_per_frame(&self) -> f32 {
        self.sample_rate as f32 / self.samples_per_frame as f32
    }

    /// Payload bytes carried by a single transmission: `nDataBitsPerTx/8 -
    /// nECCBytesPerTx`.
    pub fn payload_width_bytes(&self) -> usize {
        (self.n_data_bits_per_tx / 8).saturating_sub(self.n_ecc_bytes_per_tx)
    }

    pub fn codeword_width_bytes(&self) -> usize {
        self.n_data_bits_per_tx / 8
    }

    /// ECC is enabled iff `0 < nECCBytesPerTx < nDataBitsPerTx/8` (§3 Invariants).
    pub fn ecc_enabled(&self) -> bool {
        self.n_ecc_bytes_per_tx > 0 && self.n_ecc_bytes_per_tx < self.codeword_width_bytes()
    }

    /// `bin(f) = round(f / hzPerFrame)` — canonical rounding per §9(c).
    pub fn bin(&self, freq_hz: f32) -> usize {
        (freq_hz / self.hz_per_frame()).round() as usize
    }

    /// Snap the three declared frequencies onto bin centers.
    pub fn round_frequencies_to_bins(&mut self) {
        let hz = self.hz_per_frame();
        self.freq_delta_hz = (self.freq_delta_hz / hz).round() * hz;
        self.freq_start_hz = (self.freq_start_hz / hz).round() * hz;
        self.freq_check_hz = (self.freq_check_hz / hz).round() * hz;
    }

    /// Validate the §3 frequency-range invariant: the data band and the
    /// checksum band must not overlap, and both must sit below Nyquist.
    pub fn validate_frequency_ranges(&self) -> Result<(), crate::errors::ProfileError> {
        let hz = self.hz_per_frame();
        let nyquist = self.sample_rate as f32 / 2.0;

        let data_lo = self.freq_start_hz;
        let data_hi = self.freq_start_hz + (self.n_data_bits_per_tx.max(1) - 1) as f32 * self.freq_delta_hz;
        let chk_lo = self.freq_check_hz;
        let chk_hi = self.freq_check_hz + (K_MAX_BITS_PER_CHECKSUM - 1) as f32 * self.freq_delta_hz;

        if data_hi + hz >= nyquist || chk_hi + hz >= nyquist {
            return Err(crate::errors::ProfileError::NyquistViolation {
                data_hi_hz: data_hi as f64,
                check_hi_hz: chk_hi as f64,
                nyquist_hz: nyquist as f64,
            });
        }

        let overlap = data_lo <= chk_hi && chk_lo <= data_hi;
        if overlap {
            return Err(crate::errors::ProfileError::OverlappingBands {
                data_lo_hz: data_lo as f64,
                data_hi_hz: data_hi as f64,
                check_lo_hz: chk_lo as f64,
                check_hi_hz: chk_hi as f64,
            });
        }

        Ok(())
    }
}

/// Closed enumeration of named profiles, ported from the thirteen concrete
/// presets of the reference implementation this spec was distilled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Profile {
    Bw11LowFreq,
    Bw11MedFreq,
    Bw11HighFreq,
    Bw16Stable,
    Bw22MedFreq,
    Bw43Protocol1,
    Bw43Protocol2,
    Bw64Protocol1,
    Bw64Protocol2,
    Bw86Protocol1,
    Bw86Protocol2,
    Bw172Protocol1,
    Bw258Protocol1,
}

impl Profile {
    pub const ALL: [Profile; 13] = [
        Profile::Bw11LowFreq,
        Profile::Bw11MedFreq,
        Profile::Bw11HighFreq,
        Profile::Bw16Stable,
        Profile::Bw22MedFreq,
        Profile::Bw43Protocol1,
        Profile::Bw43Protocol2,
        Profile::Bw64Protocol1,
        Profile::Bw64Protocol2,
        Profile::Bw86Protocol1,
        Profile::Bw86Protocol2,
        Profile::Bw172Protocol1,
        Profile::Bw258Protocol1,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Profile::Bw11LowFreq => "11 B/s, Low Freq",
            Profile::Bw11MedFreq => "11 B/s, Med Freq",
            Profile::Bw11HighFreq => "11 B/s, High Freq",
            Profile::Bw16Stable => "16 B/s, Stable",
            Profile::Bw22MedFreq => "22 B/s, Med Freq",
            Profile::Bw43Protocol1 => "43 B/s, Protocol 1",
            Profile::Bw43Protocol2 => "43 B/s, Protocol 2",
            Profile::Bw64Protocol1 => "64 B/s, Protocol 1",
            Profile::Bw64Protocol2 => "64 B/s, Protocol 2",
            Profile::Bw86Protocol1 => "86 B/s, Protocol 1",
            Profile::Bw86Protocol2 => "86 B/s, Protocol 2",
            Profile::Bw172Protocol1 => "172 B/s, Protocol 1",
            Profile::Bw258Protocol1 => "258 B/s, Protocol 1",
        }
    }

    /// Build the fully populated parameter struct for this profile.
    pub fn params(&self) -> ProtocolParams {
        let sample_rate = 48_000u32;
        let samples_per_frame = 1024usize;
        let samples_per_sub_frame = samples_per_frame / K_SUB_FRAMES;
        let hz_per_frame = sample_rate as f32 / samples_per_frame as f32;

        // (ramp_begin, ramp_end, ramp_blend, confirm_frames, sub_frames_per_tx,
        //  n_data_bits_per_tx, freq_delta_bins, freq_start_bins, freq_check_bins)
        #[allow(clippy::type_complexity)]
        let (ramp, confirm, sub_frames_per_tx, n_bits, delta_bins, start_bins, check_bins): (
            usize,
            usize,
            usize,
            usize,
            f32,
            f32,
            f32,
        ) = match self {
            Profile::Bw11LowFreq => (16, 4, 32, 8, 8.0, 60.0, 130.0),
            Profile::Bw11MedFreq => (16, 4, 32, 8, 12.0, 144.0, 250.0),
            Profile::Bw11HighFreq => (16, 4, 32, 8, 8.0, 280.0, 350.0),
            Profile::Bw16Stable => (8, 16, 64, 16, 2.0, 60.0, 126.0),
            Profile::Bw22MedFreq => (16, 12, 64, 32, 6.0, 140.0, 342.0),
            Profile::Bw43Protocol1 => (8, 4, 32, 32, 6.0, 140.0, 342.0),
            Profile::Bw43Protocol2 => (16, 8, 48, 48, 4.0, 140.0, 342.0),
            Profile::Bw64Protocol1 => (16, 12, 48, 72, 4.0, 92.0, 386.0),
            Profile::Bw64Protocol2 => (16, 12, 32, 48, 5.0, 93.0, 342.0),
            Profile::Bw86Protocol1 => (16, 4, 32, 64, 3.0, 140.0, 342.0),
            Profile::Bw86Protocol2 => (16, 8, 48, 96, 3.0, 105.0, 400.0),
            Profile::Bw172Protocol1 => (16, 4, 32, 128, 2.0, 140.0, 400.0),
            Profile::Bw258Protocol1 => (16, 4, 32, 192, 2.0, 52.0, 440.0),
        };

        let mut params = ProtocolParams {
            sample_rate,
            samples_per_frame,
            samples_per_sub_frame,
            n_ramp_frames_begin: ramp,
            n_ramp_frames_end: ramp,
            n_ramp_frames_blend: ramp,
            n_confirm_frames: confirm.max(1),
            sub_frames_per_tx,
            n_data_bits_per_tx: n_bits,
            n_ecc_bytes_per_tx: 0,
            encode_id_parity: true,
            use_checksum: false,
            send_volume: 0.1,
            freq_delta_hz: delta_bins * hz_per_frame,
            freq_start_hz: start_bins * hz_per_frame,
            freq_check_hz: check_bins * hz_per_frame,
            initial_data_bits: vec![false; K_MAX_DATA_BITS],
        };

        params.round_frequencies_to_bins();
        params
    }
}
