//! Spectral analysis (§4), backed by `rustfft` in place of the reference
//! implementation's real-to-complex FFTW plan.
//!
//! `rustfft` only offers complex-to-complex transforms, so real input is
//! packed into the real component of a complex buffer before the forward
//! transform. The resulting spectrum is Hermitian-symmetric; rather than
//! carry the redundant upper half around, [`SpectrumAnalyzer::compute`]
//! folds it back onto the lower half (`P[i] += P[N-i]` for `i` in
//! `[1, N/2)`), matching the folding the reference performs on its
//! real-transform output.

use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex32>,
    n: usize,
}

impl SpectrumAnalyzer {
    pub fn new(n: usize) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(n);
        Self {
            fft,
            scratch: vec![Complex32::default(); n],
            n,
        }
    }

    /// Compute the folded power spectrum of `samples` (length `n`) into
    /// `out` (length `n / 2`).
    pub fn compute(&mut self, samples: &[f32], out: &mut [f32]) {
        debug_assert_eq!(samples.len(), self.n);
        debug_assert_eq!(out.len(), self.n / 2);

        for (dst, &src) in self.scratch.iter_mut().zip(samples.iter()) {
            *dst = Complex32::new(src, 0.0);
        }
        self.fft.process(&mut self.scratch);

        let half = self.n / 2;
        for i in 0..half {
            out[i] = self.scratch[i].norm_sqr();
        }
        for i in 1..half {
            out[i] += self.scratch[self.n - i].norm_sqr();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    #[test]
    fn pure_tone_peaks_at_its_bin() {
        let n = 1024;
        let bin = 40;
        let mut analyzer = SpectrumAnalyzer::new(n);
        let samples: Vec<f32> = (0..n)
            .map(|i| (TAU * bin as f32 * i as f32 / n as f32).sin())
            .collect();
        let mut out = vec![0.0; n / 2];
        analyzer.compute(&samples, &mut out);

        let peak_bin = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak_bin, bin);
    }

    #[test]
    fn silence_has_negligible_power() {
        let n = 256;
        let mut analyzer = SpectrumAnalyzer::new(n);
        let samples = vec![0.0f32; n];
        let mut out = vec![0.0; n / 2];
        analyzer.compute(&samples, &mut out);
        assert!(out.iter().all(|&p| p < 1e-6));
    }
}
