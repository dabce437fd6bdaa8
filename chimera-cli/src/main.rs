mod config;
mod logging;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Context, Result};
use std::path::PathBuf;

use chimera_core::demodulator::Demodulator;
use chimera_core::ecc::{EccCodec, ReedSolomonCodec};
use chimera_core::modulator::Modulator;
use chimera_core::profile::{Profile, ProtocolParams};
use chimera_core::spectrum::SpectrumAnalyzer;
use chimera_core::state::{ReceptionState, RingState};
use config::CliConfig;
use indicatif::{ProgressBar, ProgressStyle};
use logging::{DemodulateEvent, LogEvent, ModulateEvent, StructuredLogger};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Parser, Debug)]
#[command(author, version, about = "Chimera acoustic modem command-line demo", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Modulate a message into a WAV file
    Send {
        #[arg(short, long)]
        message: String,
        #[arg(short, long)]
        output: PathBuf,
        /// Named protocol profile, e.g. "64 B/s, Protocol 1"
        #[arg(short, long)]
        profile: Option<String>,
        /// Number of Reed-Solomon parity bytes (0 disables ECC)
        #[arg(long, default_value_t = 0)]
        ecc_bytes: usize,
        /// Number of times to repeat the message before the end ramp (each
        /// repetition is its own run of Tx within the same activation)
        #[arg(short, long, default_value_t = 3)]
        repeats: usize,
    },
    /// Demodulate a WAV file back into a message
    Receive {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        profile: Option<String>,
        #[arg(long, default_value_t = 0)]
        ecc_bytes: usize,
    },
    /// List the named protocol profiles available
    ListProfiles,
}

fn resolve_profile(name: &str) -> Result<Profile> {
    Profile::ALL
        .into_iter()
        .find(|p| p.name() == name)
        .ok_or_else(|| eyre!("unknown profile \"{name}\" (see `list-profiles`)"))
}

fn build_params(profile: Profile, ecc_bytes: usize) -> Result<ProtocolParams> {
    let mut params = profile.params();
    params.n_ecc_bytes_per_tx = ecc_bytes;
    params
        .validate_frequency_ranges()
        .map_err(|e| eyre!("profile \"{}\" is misconfigured: {e}", profile.name()))?;
    Ok(params)
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    let config = match &args.config {
        Some(path) => CliConfig::from_file(path)
            .wrap_err_with(|| format!("failed to load config from {}", path.display()))?,
        None => CliConfig::default(),
    };

    let mut logger = StructuredLogger::new(config.logging.clone())?;

    match args.command {
        Command::ListProfiles => {
            for p in Profile::ALL {
                let params = p.params();
                println!(
                    "{:<22} data_band=[{:.1}, {:.1}] Hz  checksum_band_start={:.1} Hz  payload={}B",
                    p.name(),
                    params.freq_start_hz,
                    params.freq_start_hz + (params.n_data_bits_per_tx - 1) as f32 * params.freq_delta_hz,
                    params.freq_check_hz,
                    params.payload_width_bytes(),
                );
            }
            Ok(())
        }
        Command::Send {
            message,
            output,
            profile,
            ecc_bytes,
            repeats,
        } => {
            let profile = resolve_profile(profile.as_deref().unwrap_or(&config.default_profile))?;
            let params = build_params(profile, ecc_bytes)?;

            // §3's `sendData` is a null-terminated byte buffer capped at
            // `K_MAX_DATA_SIZE`; one byte is reserved for the terminator the
            // modulator appends.
            let mut payload = message.into_bytes().repeat(repeats.max(1));
            let max_len = chimera_core::profile::K_MAX_DATA_SIZE - 1;
            if payload.len() > max_len {
                logger.log(LogEvent::Warn {
                    message: format!(
                        "message (repeated {repeats} time(s)) is {} bytes, exceeding the {max_len}-byte send buffer; truncating",
                        payload.len()
                    ),
                })?;
                payload.truncate(max_len);
            }

            let codec: Option<Box<dyn EccCodec>> = if params.ecc_enabled() {
                Some(Box::new(ReedSolomonCodec::new(params.n_ecc_bytes_per_tx)?))
            } else {
                None
            };

            let mut rng = StdRng::seed_from_u64(0);
            let mut tx = Modulator::start(&params, &payload, codec.as_deref(), &mut rng);

            // The modulator cycles `payload` across as many Tx as it takes
            // (§4.3 step 2) and arms its own end ramp once the buffer is
            // exhausted, so driving it to completion is just "keep calling
            // `next_frame` until it reports done" — no manual frame-count
            // bookkeeping needed on this side.
            let mut samples = Vec::new();
            let mut frame = vec![0.0f32; params.samples_per_frame];
            let max_frames = params.sub_frames_per_tx * (payload.len().max(1) + 2)
                + params.n_ramp_frames_begin
                + params.n_ramp_frames_end
                + 16;
            for _ in 0..max_frames {
                if !Modulator::next_frame(&mut tx, &params, codec.as_deref(), &mut frame) {
                    break;
                }
                samples.extend_from_slice(&frame);
            }

            let spec = hound::WavSpec {
                channels: 1,
                sample_rate: params.sample_rate,
                bits_per_sample: 32,
                sample_format: hound::SampleFormat::Float,
            };
            let mut writer = hound::WavWriter::create(&output, spec)
                .wrap_err_with(|| format!("failed to create {}", output.display()))?;
            for &sample in &samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;

            logger.log(LogEvent::Modulate(ModulateEvent {
                timestamp: chrono::Utc::now(),
                profile: profile.name().to_string(),
                payload_bytes: payload.len(),
                frames_rendered: samples.len() / params.samples_per_frame,
                duration_secs: logger.elapsed(),
            }))?;
            Ok(())
        }
        Command::Receive {
            input,
            profile,
            ecc_bytes,
        } => {
            let profile = resolve_profile(profile.as_deref().unwrap_or(&config.default_profile))?;
            let params = build_params(profile, ecc_bytes)?;

            let codec: Option<Box<dyn EccCodec>> = if params.ecc_enabled() {
                Some(Box::new(ReedSolomonCodec::new(params.n_ecc_bytes_per_tx)?))
            } else {
                None
            };

            let mut reader = hound::WavReader::open(&input)
                .wrap_err_with(|| format!("failed to open {}", input.display()))?;
            if reader.spec().sample_rate != params.sample_rate {
                logger.log(LogEvent::Warn {
                    message: format!(
                        "WAV sample rate {} differs from profile's {} Hz; results may not decode",
                        reader.spec().sample_rate, params.sample_rate
                    ),
                })?;
            }
            let samples: Vec<f32> = reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .wrap_err("failed to read WAV samples")?;

            let mut ring = RingState::new(&params);
            let mut analyzer = SpectrumAnalyzer::new(params.samples_per_frame);
            let mut reception = ReceptionState::idle();

            let total_frames = samples.len() / params.samples_per_frame;
            let progress = ProgressBar::new(total_frames as u64);
            progress.set_style(
                ProgressStyle::with_template("{bar:40} {pos}/{len} frames scanned")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );

            // Each confirmed Tx chunk is delivered as soon as it validates
            // (§4.4 step 7); a multi-Tx message is reassembled by scanning
            // the whole recording and reading back `reception.received_data`
            // at the end rather than stopping at the first chunk.
            let mut frames_scanned = 0usize;
            let mut chunks_recovered = 0usize;
            for chunk in samples.chunks(params.samples_per_frame) {
                if chunk.len() < params.samples_per_frame {
                    break;
                }
                ring.sample_amplitude.copy_from_slice(chunk);
                frames_scanned += 1;
                progress.inc(1);

                if Demodulator::process(&ring, &mut reception, &params, codec.as_deref()).is_some() {
                    chunks_recovered += 1;
                }

                analyzer.compute(&ring.sample_amplitude, &mut ring.sample_spectrum);
                let spectrum_snapshot = ring.sample_spectrum.clone();
                ring.update_history(&spectrum_snapshot);
            }
            progress.finish_and_clear();

            let recovered = if chunks_recovered > 0 {
                Some(reception.received_data.clone())
            } else {
                None
            };

            logger.log(LogEvent::Demodulate(DemodulateEvent {
                timestamp: chrono::Utc::now(),
                profile: profile.name().to_string(),
                frames_scanned,
                payload_recovered: recovered.is_some(),
            }))?;

            match recovered {
                Some(payload) => {
                    println!("{}", String::from_utf8_lossy(&payload));
                    Ok(())
                }
                None => Err(eyre!("no payload recovered from {}", input.display())),
            }
        }
    }
}
