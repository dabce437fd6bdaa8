use chimera_core::modulator::Modulator;
use chimera_core::profile::Profile;
use chimera_core::spectrum::SpectrumAnalyzer;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn modulate_one_frame(c: &mut Criterion) {
    let params = Profile::Bw258Protocol1.params();
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let payload = vec![0xAAu8; params.payload_width_bytes()];
    let mut tx = Modulator::start(&params, &payload, None, &mut rng);
    let mut out = vec![0.0f32; params.samples_per_frame];

    c.bench_function("modulator_next_frame_bw258", |b| {
        b.iter(|| {
            Modulator::next_frame(&mut tx, &params, None, &mut out);
            black_box(&out);
        })
    });
}

fn spectrum_analysis(c: &mut Criterion) {
    let n = 1024;
    let mut analyzer = SpectrumAnalyzer::new(n);
    let samples = vec![0.1f32; n];
    let mut out = vec![0.0f32; n / 2];

    c.bench_function("spectrum_compute_1024", |b| {
        b.iter(|| {
            analyzer.compute(black_box(&samples), &mut out);
            black_box(&out);
        })
    });
}

criterion_group!(benches, modulate_one_frame, spectrum_analysis);
criterion_main!(benches);
