//! Waveform bank (C2).
//!
//! Each data bit and each checksum bit owns a pair of precomputed sine
//! tables: a "one" tone at its nominal frequency, and a "zero" tone one
//! `hzPerFrame` bin above it. The tables are unit-amplitude; the modulator
//! applies `sendVolume` and the `1/nFreq` mixing normalization when it sums
//! whichever tones are active in a given sub-frame.
//!
//! Tables are rebuilt wholesale whenever a transmission starts (`DataOn` /
//! `DataSend`), each with an independent random phase offset, so that
//! successive transmissions on the same bit index don't phase-align and
//! produce audible discontinuities when ramped in.

use rand::Rng;
use std::f32::consts::TAU;

use crate::profile::{ProtocolParams, K_MAX_BITS_PER_CHECKSUM};

#[derive(Debug, Clone, Default)]
pub struct WaveformBank {
    pub data_one: Vec<Vec<f32>>,
    pub data_zero: Vec<Vec<f32>>,
    pub checksum_one: Vec<Vec<f32>>,
    pub checksum_zero: Vec<Vec<f32>>,
}

impl WaveformBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the `n_data_bits_per_tx` data-bit tables.
    pub fn rebuild_data(&mut self, params: &ProtocolParams, rng: &mut impl Rng) {
        let n = params.n_data_bits_per_tx;
        self.data_one = Vec::with_capacity(n);
        self.data_zero = Vec::with_capacity(n);
        for k in 0..n {
            let freq_one = params.freq_start_hz + k as f32 * params.freq_delta_hz;
            let freq_zero = freq_one + params.hz_per_frame();
            self.data_one.push(sine_table(params, freq_one, rng));
            self.data_zero.push(sine_table(params, freq_zero, rng));
        }
    }

    /// Rebuild the `K_MAX_BITS_PER_CHECKSUM` checksum-bit tables. Called on
    /// every `DataSend` (unlike the data tables, which only change on
    /// `DataOn`), so consecutive sends never phase-align on the checksum
    /// tones either.
    pub fn rebuild_checksum(&mut self, params: &ProtocolParams, rng: &mut impl Rng) {
        let n = K_MAX_BITS_PER_CHECKSUM;
        self.checksum_one = Vec::with_capacity(n);
        self.checksum_zero = Vec::with_capacity(n);
        for k in 0..n {
            let freq_one = params.freq_check_hz + k as f32 * params.freq_delta_hz;
            let freq_zero = freq_one + params.hz_per_frame();
            self.checksum_one.push(sine_table(params, freq_one, rng));
            self.checksum_zero.push(sine_table(params, freq_zero, rng));
        }
    }

}

fn sine_table(params: &ProtocolParams, freq_hz: f32, rng: &mut impl Rng) -> Vec<f32> {
    let phase0: f32 = rng.gen_range(0.0..TAU);
    let w = TAU * freq_hz / params.sample_rate as f32;
    (0..params.samples_per_frame)
        .map(|i| (w * i as f32 + phase0).sin())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Profile;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn rebuild_data_produces_one_pair_per_bit() {
        let params = Profile::Bw64Protocol1.params();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut bank = WaveformBank::new();
        bank.rebuild_data(&params, &mut rng);
        assert_eq!(bank.data_one.len(), params.n_data_bits_per_tx);
        assert_eq!(bank.data_zero.len(), params.n_data_bits_per_tx);
        for row in bank.data_one.iter().chain(bank.data_zero.iter()) {
            assert_eq!(row.len(), params.samples_per_frame);
        }
    }

    #[test]
    fn rebuild_checksum_produces_fixed_width_bank() {
        let params = Profile::Bw64Protocol1.params();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut bank = WaveformBank::new();
        bank.rebuild_checksum(&params, &mut rng);
        assert_eq!(bank.checksum_one.len(), K_MAX_BITS_PER_CHECKSUM);
        assert_eq!(bank.checksum_zero.len(), K_MAX_BITS_PER_CHECKSUM);
    }

    #[test]
    fn successive_rebuilds_change_phase() {
        let params = Profile::Bw16Stable.params();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut bank = WaveformBank::new();
        bank.rebuild_data(&params, &mut rng);
        let first = bank.data_one[0].clone();
        bank.rebuild_data(&params, &mut rng);
        assert_ne!(first, bank.data_one[0]);
    }
}
