//! Round trip with Reed-Solomon error correction enabled on the profile.

use chimera_core::demodulator::Demodulator;
use chimera_core::ecc::{EccCodec, ReedSolomonCodec};
use chimera_core::modulator::Modulator;
use chimera_core::profile::Profile;
use chimera_core::spectrum::SpectrumAnalyzer;
use chimera_core::state::{ReceptionState, RingState};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[test]
fn payload_round_trips_through_an_ecc_enabled_profile() {
    let mut params = Profile::Bw64Protocol1.params();
    params.n_ecc_bytes_per_tx = 4;
    assert!(params.ecc_enabled());

    let codec: Box<dyn EccCodec> = Box::new(ReedSolomonCodec::new(params.n_ecc_bytes_per_tx).unwrap());
    let payload = vec![0x11u8, 0x22, 0x33, 0x44, 0x55];
    assert_eq!(payload.len(), params.payload_width_bytes());

    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let mut tx = Modulator::start(&params, &payload, Some(codec.as_ref()), &mut rng);

    let mut ring = RingState::new(&params);
    let mut analyzer = SpectrumAnalyzer::new(params.samples_per_frame);
    let mut reception = ReceptionState::idle();

    let max_frames = params.n_data_bits_per_tx * params.sub_frames_per_tx * 3;
    let mut received = None;
    for _ in 0..max_frames {
        Modulator::next_frame(&mut tx, &params, Some(codec.as_ref()), &mut ring.output_block);
        ring.sample_amplitude.copy_from_slice(&ring.output_block);

        if let Some(payload) = Demodulator::process(&ring, &mut reception, &params, Some(codec.as_ref())) {
            received = Some(payload);
            break;
        }

        analyzer.compute(&ring.sample_amplitude, &mut ring.sample_spectrum);
        let spectrum_snapshot = ring.sample_spectrum.clone();
        ring.update_history(&spectrum_snapshot);
    }

    assert_eq!(received, Some(payload));
}
