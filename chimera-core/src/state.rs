//! Data model (§3) underlying the Core worker loop.
//!
//! The reference this protocol was distilled from kept several of these
//! buffers as function-local `static` variables inside its main loop. Rust
//! has no equivalent that plays well with a worker thread and a dedicated
//! test harness, so every one of them becomes an explicit field here, owned
//! by the struct whose lifetime matches the original static's lifetime:
//! per-activation buffers live on [`TransmissionState`] / [`ReceptionState`],
//! per-frame scratch space lives on [`RingState`].

use crate::profile::{ProtocolParams, K_MAX_SPECTRUM_HISTORY};
use crate::waveform::WaveformBank;

/// Per-frame capture/analysis scratch space. One instance lives inside the
/// Core worker and is mutated in place every tick; it never crosses the
/// triple-buffer boundary directly (summaries derived from it do).
#[derive(Debug, Clone)]
pub struct RingState {
    /// Raw samples captured this frame, length `samples_per_frame`.
    pub sample_amplitude: Vec<f32>,
    /// Folded power spectrum for this frame, length `samples_per_frame / 2`.
    pub sample_spectrum: Vec<f32>,
    /// Ring of the last `K_MAX_SPECTRUM_HISTORY` spectra, oldest overwritten.
    pub spectrum_history: Vec<Vec<f32>>,
    /// Exponential running average merged from `spectrum_history`.
    pub history_average: Vec<f32>,
    /// Next slot in `spectrum_history` to overwrite.
    pub history_id: usize,
    /// Samples of silence (no carrier) observed consecutively, in sub-frames.
    pub silence_sub_frames: usize,
    /// Mixed, ramp-enveloped output samples for the current frame, ready for
    /// playback.
    pub output_block: Vec<f32>,
}

impl RingState {
    pub fn new(params: &ProtocolParams) -> Self {
        let half = params.samples_per_frame / 2;
        Self {
            sample_amplitude: vec![0.0; params.samples_per_frame],
            sample_spectrum: vec![0.0; half],
            spectrum_history: vec![vec![0.0; half]; K_MAX_SPECTRUM_HISTORY],
            history_average: vec![0.0; half],
            history_id: 0,
            silence_sub_frames: 0,
            output_block: vec![0.0; params.samples_per_frame],
        }
    }

    /// Fold a freshly computed spectrum into the incremental running
    /// average, replacing the oldest sample in the ring in the same pass
    /// (`avg = (avg*K - oldest + new) / K`) rather than recomputing the mean
    /// from scratch over the whole ring every tick.
    pub fn update_history(&mut self, spectrum: &[f32]) {
        let k = self.spectrum_history.len() as f32;
        for i in 0..self.history_average.len() {
            self.history_average[i] = self.history_average[i] * k
                - self.spectrum_history[self.history_id][i]
                + spectrum[i];
            self.history_average[i] /= k;
        }
        self.spectrum_history[self.history_id].copy_from_slice(spectrum);
        self.history_id = (self.history_id + 1) % self.spectrum_history.len();
    }

    /// Clear the history average after sustained silence, per §4's "periodic
    /// clearing after 8 sub-frames of no carrier" rule.
    pub fn clear_history(&mut self) {
        for row in &mut self.spectrum_history {
            row.iter_mut().for_each(|v| *v = 0.0);
        }
        self.history_average.iter_mut().for_each(|v| *v = 0.0);
        self.history_id = 0;
    }
}

/// Everything needed to keep transmitting a single activation's worth of
/// tones across many frames and, for a buffered `DataSend`, across many
/// back-to-back transmissions (Tx) of a multi-byte payload: a fixed static
/// bit pattern (`DataOn`) just mixes one unchanging chord forever, while an
/// ECC-encoded-or-copied payload (`DataSend`) cycles `send_data` through
/// `payload_width_bytes()`-sized chunks, one Tx at a time, until a null byte
/// (or the end of the buffer) is reached — matching §3's "`sendData`,
/// null-terminated payload" and §4.3's source-advance/commit bookkeeping.
/// Both modes ramp up from the begin ramp and, once `stop()` is called or
/// the buffered payload runs out, ramp back down to silence.
#[derive(Debug, Clone)]
pub struct TransmissionState {
    /// Raw payload bytes for a buffered send, `payload_width_bytes()`-sized
    /// chunks at a time, terminated by a trailing `0` byte (§3 `sendData`).
    /// Empty and unused for a continuous (`DataOn`) activation.
    pub send_data: Vec<u8>,
    /// Byte cursor into `send_data` for the chunk currently being encoded.
    pub send_id: usize,
    /// This activation's monotone identifier, folded into the parity
    /// checksum bit per §3/§4.3 (`dataId`).
    pub data_id: u32,
    /// Frames elapsed since the start of the *current* Tx (resets to 0 at
    /// every Tx commit, not just at activation start).
    pub frame_id: usize,
    /// Mirrors `frame_id` at the point the current chunk was decoded; reset
    /// to `0` alongside `frame_id` at each Tx commit (§4.3 `curTxSubFrameId`).
    pub cur_tx_sub_frame_id: usize,
    /// Current ramp length in frames: starts at `n_ramp_frames_begin`,
    /// switches to `n_ramp_frames_blend` after the first Tx's ramp window
    /// elapses, and to `n_ramp_frames_end` once the buffer is exhausted or
    /// `stop()` is called.
    pub n_ramp_frames: usize,
    /// Whether tones are still being mixed at all (cleared once the end
    /// ramp finishes).
    pub sending_data: bool,
    /// Whether `send_data` is still being cycled through (false for a
    /// continuous `DataOn` activation, and false once the last chunk of a
    /// buffered send has been consumed — even while its end ramp lingers).
    pub sending_data_buffer: bool,
    /// Set once by `stop()` or by the source advance reaching a null byte;
    /// once set, `interp` counts down to `0` instead of up, and `next_frame`
    /// reports completion once it gets there.
    pub halting: bool,
    /// Ramp envelope position in `[0, 1]`, carried across frames and across
    /// Tx boundaries within one activation.
    pub interp: f32,
    /// The `n_data_bits_per_tx` bits currently being mixed, LSB-first within
    /// each byte.
    pub data_bits: Vec<bool>,
    /// Per-bit sine tables rolled fresh for this activation (§4.2).
    pub waveforms: WaveformBank,
    /// Pre-ramp mixing scratch, reused every frame to avoid a realloc.
    pub tmp: Vec<f32>,
    /// Scratch codeword buffer, reused every Tx commit to avoid a realloc.
    pub codeword_scratch: Vec<u8>,
}

/// Receiver-side accumulation state, persistent across the whole lifetime of
/// a profile activation (not reset per candidate the way a simpler
/// one-shot-per-message design would do it — see `Demodulator::process`).
#[derive(Debug, Clone)]
pub struct ReceptionState {
    /// Running log of every confirmed Tx-worth chunk received so far.
    pub received_data: Vec<u8>,
    /// Write offset into `received_data` for the next confirmed chunk.
    pub received_id: usize,
    /// Whether the carrier gate is currently open.
    pub receiving_data: bool,
    /// Last chunk actually appended, used to suppress re-delivering an
    /// unchanged reading.
    pub received_data_last: Vec<u8>,
    /// Parity bit of the last delivered chunk (`None` before anything has
    /// been delivered).
    pub last_parity: Option<bool>,
    /// Checksum last seen as a stable candidate (`None` means "none yet" —
    /// the sentinel the original spells as `(uint16_t)-1`).
    pub last_checksum: Option<u16>,
    /// Consecutive frames the current checksum candidate has held steady.
    pub n_times_received: u32,
    /// Wall-clock time of the last successful append, for the 500ms
    /// "new message" reset rule.
    pub last_append_time: Option<std::time::Instant>,
}

impl ReceptionState {
    pub fn idle() -> Self {
        Self {
            received_data: Vec::new(),
            received_id: 0,
            receiving_data: false,
            received_data_last: Vec::new(),
            last_parity: None,
            last_checksum: None,
            n_times_received: 0,
            last_append_time: None,
        }
    }

    /// Full reset, for `Init` / a new profile activation.
    pub fn reset(&mut self) {
        *self = Self::idle();
    }

    /// `DataClear`'s narrower reset: only the delivered-bytes log is
    /// cleared, matching the original (the dedup/confirm bookkeeping below
    /// survives a clear so an in-flight reception isn't perturbed by it).
    pub fn clear_received_buffer(&mut self) {
        self.received_id = 0;
        self.received_data.clear();
    }
}

/// Snapshot pushed from the UI thread into the Core worker (the ACTIVE slot
/// of the triple buffer, from the input side).
#[derive(Debug, Clone)]
pub struct StateInput {
    pub params: ProtocolParams,
    pub payload: Vec<u8>,
}

/// Snapshot published from the Core worker back to the UI thread (the
/// CACHED/UI slots of the triple buffer, from the output side).
#[derive(Debug, Clone, Default)]
pub struct StateData {
    pub spectrum: Vec<f32>,
    pub received_payload: Option<Vec<u8>>,
    pub is_transmitting: bool,
    pub is_receiving: bool,
}
