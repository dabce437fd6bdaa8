//! Modulator (C3): turns one activation's worth of bits into a continuous
//! stream of audio frames.
//!
//! Every bit a transmission carries — all `n_data_bits_per_tx` of them, plus
//! the ten checksum/parity tones — is mixed *simultaneously* into each
//! frame for as long as that activation is in effect; this is a genuine
//! multi-tone chord, not a cycling single-tone scheme. [`Modulator::start`]
//! installs a (possibly multi-byte) payload — ECC-encoded or copied into a
//! codeword one Tx at a time — and [`Modulator::start_continuous`] installs
//! a fixed bit pattern directly (used for `DataOn`'s test-tone / calibration
//! carrier); both produce the same [`TransmissionState`] and are driven
//! identically by [`Modulator::next_frame`] and [`Modulator::stop`].
//!
//! A buffered send (`Modulator::start`) is not one Tx — it is `send_data`
//! cycled through `payload_width_bytes()`-sized chunks, one per Tx, until a
//! null byte ends the message (§3/§4.3's source-advance/commit bookkeeping).
//! The begin/blend/end ramp is a single continuously-interpolated envelope
//! scalar (`TransmissionState::interp`): it rises for `n_ramp_frames_begin`
//! frames at the very start of the activation, blends briefly between
//! successive Tx of a multi-Tx message, and falls over `n_ramp_frames_end`
//! frames once the buffer is exhausted or [`Modulator::stop`] is called —
//! `next_frame` reports completion the frame it reaches silence.

use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::ecc::EccCodec;
use crate::profile::{ProtocolParams, K_MAX_BITS_PER_CHECKSUM};
use crate::state::TransmissionState;
use crate::waveform::WaveformBank;

/// Backs `TransmissionState::data_id`: a process-wide monotone counter of
/// send activations (§3's `dataId`), folded into the parity checksum bit so
/// the receiver can tell two back-to-back activations apart from one
/// sustained one (see `crate::demodulator`).
static NEXT_DATA_ID: AtomicU32 = AtomicU32::new(0);

pub struct Modulator;

impl Modulator {
    /// Begin mixing a fixed bit pattern that never advances on its own.
    /// Used for `DataOn`'s continuous test-tone carrier.
    pub fn start_continuous<R: Rng + ?Sized>(
        params: &ProtocolParams,
        bits: &[bool],
        rng: &mut R,
    ) -> TransmissionState {
        let mut data_bits = bits.to_vec();
        data_bits.resize(params.n_data_bits_per_tx, false);

        let mut waveforms = WaveformBank::new();
        waveforms.rebuild_data(params, rng);
        waveforms.rebuild_checksum(params, rng);

        TransmissionState {
            send_data: Vec::new(),
            send_id: 0,
            data_id: NEXT_DATA_ID.fetch_add(1, Ordering::Relaxed),
            frame_id: 0,
            cur_tx_sub_frame_id: 0,
            n_ramp_frames: params.n_ramp_frames_begin,
            sending_data: true,
            sending_data_buffer: false,
            halting: false,
            interp: 0.0,
            data_bits,
            waveforms,
            tmp: vec![0.0; params.samples_per_frame],
            codeword_scratch: vec![0u8; params.codeword_width_bytes().max(1)],
        }
    }

    /// Begin transmitting `payload`: a null byte is appended as the §3
    /// end-of-message marker and the buffer is cycled through in
    /// `payload_width_bytes()`-sized chunks, one per Tx, each ECC-encoded
    /// (when the profile calls for it) or copied straight into a
    /// codeword-sized buffer and unpacked LSB-first into `data_bits`. A
    /// payload longer than one Tx's width spans several Tx within this one
    /// activation, each blended into the next by the ramp (§4.3 steps 2/4).
    pub fn start<R: Rng + ?Sized>(
        params: &ProtocolParams,
        payload: &[u8],
        _codec: Option<&dyn EccCodec>,
        rng: &mut R,
    ) -> TransmissionState {
        let mut tx = Self::start_continuous(params, &vec![false; params.n_data_bits_per_tx], rng);
        tx.sending_data_buffer = true;
        tx.send_data = payload.to_vec();
        tx.send_data.push(0);
        tx
    }

    /// `DataOff`: arm the end ramp. The caller should keep calling
    /// [`Modulator::next_frame`] until it returns `false` to drain the
    /// ramp-down, then drop `tx`.
    pub fn stop(tx: &mut TransmissionState, params: &ProtocolParams) {
        tx.halting = true;
        tx.sending_data_buffer = false;
        tx.n_ramp_frames = params.n_ramp_frames_end;
    }

    /// Render one frame into `out` (length `samples_per_frame`). Returns
    /// `false` once the end ramp has reached silence (armed either by
    /// [`Modulator::stop`] or by the buffered payload running out); the
    /// caller should drop `tx` at that point.
    pub fn next_frame(
        tx: &mut TransmissionState,
        params: &ProtocolParams,
        codec: Option<&dyn EccCodec>,
        out: &mut [f32],
    ) -> bool {
        if tx.halting && tx.interp <= 0.0 && tx.frame_id > 0 {
            out.iter_mut().for_each(|s| *s = 0.0);
            return false;
        }

        // §4.3 step 2: source advance. Only a buffered send cycles through
        // `send_data`; a continuous activation keeps mixing the same bits
        // forever until `stop()` sets `halting`.
        if tx.sending_data_buffer && !tx.halting {
            if tx.cur_tx_sub_frame_id >= params.sub_frames_per_tx {
                // Commit: this Tx is done, advance to the next chunk.
                tx.cur_tx_sub_frame_id = 0;
                tx.frame_id = 0;
                tx.send_id += params.payload_width_bytes().max(1);
            } else if tx.cur_tx_sub_frame_id >= tx.n_ramp_frames {
                tx.n_ramp_frames = params.n_ramp_frames_blend;
            }

            if tx.send_id >= tx.send_data.len() || tx.send_data[tx.send_id] == 0 {
                tx.sending_data_buffer = false;
                tx.halting = true;
                tx.n_ramp_frames = params.n_ramp_frames_end;
            } else {
                tx.cur_tx_sub_frame_id = tx.frame_id;
                decode_chunk(tx, params, codec);
            }
        }

        tx.tmp.iter_mut().for_each(|s| *s = 0.0);

        if tx.sending_data {
            mix_chord(tx, params);
        }

        apply_ramp(tx, params, out);
        tx.frame_id += 1;
        true
    }
}

/// §4.3 step 2 (continued): ECC-encode (or copy) the chunk at `tx.send_id`
/// into a codeword and unpack it LSB-first into `tx.data_bits`. A short
/// trailing chunk (payload length not a multiple of the Tx width) is
/// zero-padded before encoding so the codec always sees a full-width input.
fn decode_chunk(tx: &mut TransmissionState, params: &ProtocolParams, codec: Option<&dyn EccCodec>) {
    let width = params.payload_width_bytes().max(1);
    let codeword_width = params.codeword_width_bytes();

    let mut chunk = vec![0u8; width];
    let start = tx.send_id.min(tx.send_data.len());
    let end = (tx.send_id + width).min(tx.send_data.len());
    chunk[..end - start].copy_from_slice(&tx.send_data[start..end]);

    match codec {
        Some(c) if params.ecc_enabled() => c.encode(&chunk, &mut tx.codeword_scratch),
        _ => {
            let n = chunk.len().min(codeword_width);
            tx.codeword_scratch[..n].copy_from_slice(&chunk[..n]);
        }
    }

    for (j, byte) in tx.codeword_scratch.iter().enumerate() {
        for i in 0..8 {
            let idx = j * 8 + i;
            if idx < tx.data_bits.len() {
                tx.data_bits[idx] = byte & (1 << i) != 0;
            }
        }
    }
}

/// §4.3 step 3: mix the data chord plus the checksum/parity tones into
/// `tx.tmp`, scaled by `send_volume / n_freq`.
fn mix_chord(tx: &mut TransmissionState, params: &ProtocolParams) {
    let mut checksum: u16 = 1; // bit 0: always-on carrier marker
    if params.encode_id_parity {
        let width = params.payload_width_bytes().max(1);
        let tx_index = tx.send_id / width;
        if (tx.data_id as usize + tx_index) & 1 == 1 {
            checksum |= 1 << 1;
        }
    }

    let mut n_freq = 0usize;
    for k in 0..params.n_data_bits_per_tx {
        n_freq += 1;
        if tx.data_bits[k] {
            mix(&tx.waveforms.data_one[k], &mut tx.tmp, params.send_volume);
        } else {
            checksum = checksum.wrapping_add(1u16.wrapping_shl(((k % 8) + 2) as u32));
            mix(&tx.waveforms.data_zero[k], &mut tx.tmp, params.send_volume);
        }
    }

    // §4.3 step 3: with ECC enabled only the two protocol bits (carrier
    // marker, parity) are mixed; the remaining checksum tones carry no
    // information the receiver would otherwise validate.
    let checksum_bits = if params.ecc_enabled() { 2 } else { K_MAX_BITS_PER_CHECKSUM };
    for k in 0..checksum_bits {
        n_freq += 1;
        if (checksum & (1 << k)) != 0 || k == 0 {
            mix(&tx.waveforms.checksum_one[k], &mut tx.tmp, params.send_volume);
        } else {
            mix(&tx.waveforms.checksum_zero[k], &mut tx.tmp, params.send_volume);
        }
    }
    let scale = 1.0 / n_freq.max(1) as f32;
    tx.tmp.iter_mut().for_each(|s| *s *= scale);
}

fn mix(table: &[f32], out: &mut [f32], volume: f32) {
    for (o, s) in out.iter_mut().zip(table.iter()) {
        *o += volume * s;
    }
}

/// Apply the single continuously-interpolated envelope scalar to `tx.tmp`,
/// writing the result into `out`. Ramps up for `n_ramp_frames` frames at the
/// start of the activation, holds at `1.0`, ramps back down over the last
/// `n_ramp_frames` frames of each Tx window (§4.3 step 4's
/// `frame_id >= sub_frames_per_tx - n_ramp_frames` blend, shared by every Tx
/// boundary of a multi-Tx send), and (once halting) ramps back down over
/// `n_ramp_frames_end` frames to silence and stays there.
fn apply_ramp(tx: &mut TransmissionState, params: &ProtocolParams, out: &mut [f32]) {
    if tx.frame_id == 0 && tx.send_id == 0 {
        tx.interp = 0.0;
    }

    let ramp_frames = tx.n_ramp_frames.max(1);
    let d_interp = 1.0 / (ramp_frames * params.samples_per_sub_frame) as f32;

    let blending_down = !tx.halting
        && params.sub_frames_per_tx > 0
        && tx.frame_id + tx.n_ramp_frames >= params.sub_frames_per_tx;

    if tx.halting {
        for (o, &s) in out.iter_mut().zip(tx.tmp.iter()) {
            tx.interp = (tx.interp - d_interp).max(0.0);
            *o = tx.interp * s;
        }
    } else if tx.frame_id < tx.n_ramp_frames {
        for (o, &s) in out.iter_mut().zip(tx.tmp.iter()) {
            tx.interp = (tx.interp + d_interp).min(1.0);
            *o = tx.interp * s;
        }
    } else if blending_down {
        for (o, &s) in out.iter_mut().zip(tx.tmp.iter()) {
            tx.interp = (tx.interp - d_interp).max(0.0);
            *o = tx.interp * s;
        }
    } else {
        tx.interp = 1.0;
        out.copy_from_slice(&tx.tmp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Profile;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn first_frame_of_a_transmission_starts_near_silence() {
        let params = Profile::Bw64Protocol1.params();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut tx = Modulator::start(&params, &[0xAA; 5], None, &mut rng);
        let mut out = vec![0.0; params.samples_per_frame];
        Modulator::next_frame(&mut tx, &params, None, &mut out);
        let peak = out.iter().cloned().fold(0.0f32, f32::max);
        assert!(peak < params.send_volume, "begin ramp should attenuate the first frame");
    }

    #[test]
    fn stop_eventually_drains_to_silence() {
        let params = Profile::Bw16Stable.params();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let payload = vec![0u8; params.payload_width_bytes()];
        let mut tx = Modulator::start(&params, &payload, None, &mut rng);
        let mut out = vec![0.0; params.samples_per_frame];
        for _ in 0..20 {
            assert!(Modulator::next_frame(&mut tx, &params, None, &mut out));
        }
        Modulator::stop(&mut tx, &params);
        let mut frames = 0;
        while Modulator::next_frame(&mut tx, &params, None, &mut out) {
            frames += 1;
            assert!(frames < 10_000, "ramp-down never completed");
        }
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn explicit_stop_ends_a_continuous_transmission() {
        let params = Profile::Bw16Stable.params();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut tx = Modulator::start_continuous(&params, &[true; 16], &mut rng);
        let mut out = vec![0.0; params.samples_per_frame];
        for _ in 0..20 {
            assert!(Modulator::next_frame(&mut tx, &params, None, &mut out));
        }
        Modulator::stop(&mut tx, &params);
        let mut frames = 0;
        while Modulator::next_frame(&mut tx, &params, None, &mut out) {
            frames += 1;
            assert!(frames < 10_000, "ramp-down never completed");
        }
    }

    #[test]
    fn successive_activations_get_distinct_data_ids() {
        let params = Profile::Bw16Stable.params();
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let payload = vec![0u8; params.payload_width_bytes()];
        let a = Modulator::start(&params, &payload, None, &mut rng);
        let b = Modulator::start(&params, &payload, None, &mut rng);
        assert_ne!(a.data_id, b.data_id);
    }

    #[test]
    fn empty_payload_ends_on_the_first_sub_frame() {
        let params = Profile::Bw16Stable.params();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut tx = Modulator::start(&params, &[], None, &mut rng);
        let mut out = vec![0.0; params.samples_per_frame];
        Modulator::next_frame(&mut tx, &params, None, &mut out);
        assert!(!tx.sending_data_buffer, "empty payload should end source-advance on the first sub-frame");
        assert!(tx.halting);
    }

    #[test]
    fn multi_byte_payload_spans_multiple_tx_before_halting() {
        let params = Profile::Bw11LowFreq.params();
        assert_eq!(params.payload_width_bytes(), 1);
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let payload = vec![1u8, 2, 3];
        let mut tx = Modulator::start(&params, &payload, None, &mut rng);
        let mut out = vec![0.0; params.samples_per_frame];

        let mut saw_send_id_advance = false;
        for _ in 0..(params.sub_frames_per_tx * (payload.len() + 1) + 4) {
            if !Modulator::next_frame(&mut tx, &params, None, &mut out) {
                break;
            }
            if tx.send_id >= payload.len() {
                saw_send_id_advance = true;
                break;
            }
        }
        assert!(saw_send_id_advance, "multi-byte payload never advanced past its first chunk");
    }

    #[test]
    fn envelope_blends_down_before_each_tx_boundary() {
        let params = Profile::Bw16Stable.params();
        assert_eq!(params.payload_width_bytes(), 2);
        let mut rng = ChaCha8Rng::seed_from_u64(14);
        let payload = vec![1u8, 2, 3, 4];
        let mut tx = Modulator::start(&params, &payload, None, &mut rng);
        let mut out = vec![0.0; params.samples_per_frame];

        // Drive up to the frame just before the first Tx commits; §4.3 step 4
        // says the envelope should already be blending down by then.
        for _ in 0..(params.sub_frames_per_tx - 1) {
            assert!(Modulator::next_frame(&mut tx, &params, None, &mut out));
        }
        assert!(
            tx.interp < 1.0,
            "envelope should have started blending down before the Tx boundary, got {}",
            tx.interp
        );
    }
}
