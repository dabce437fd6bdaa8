//! Core worker (C5): the real-time thread that owns the audio device and
//! runs the modulate/demodulate loop.
//!
//! Commands arrive from the owning thread over a bounded channel
//! (`INPUT_QUEUE_CAPACITY`, drop-newest on overflow — a stalled worker
//! should never block its caller). State flows back out through a triple
//! buffer: the worker publishes into the shared [`StateData`] mutex only for
//! the duration of a shallow copy, so a UI thread polling it never contends
//! with the worker for more than a few field assignments.
//!
//! Each tick preserves one subtlety from the reference implementation this
//! loop is modeled on: bit extraction at the top of the tick reads the
//! spectrum history average as merged through the *previous* tick's
//! capture, not the frame just captured. The current frame's spectrum is
//! folded into history only after extraction runs. Reordering this would
//! shift every bit read earlier by one frame's worth of pipeline latency.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::audio_host::AudioHost;
use crate::demodulator::{carrier_present, Demodulator};
use crate::ecc::EccCodec;
use crate::events::{CoreCommand, EventSink, UiEvent};
use crate::logging::{LogCollector, LogLevel};
use crate::modulator::Modulator;
use crate::profile::ProtocolParams;
use crate::spectrum::SpectrumAnalyzer;
use crate::state::{ReceptionState, RingState, StateData, TransmissionState};

pub const INPUT_QUEUE_CAPACITY: usize = 256;

/// Consecutive silent sub-frames (§4) after which the spectrum history is
/// cleared rather than left to decay exponentially.
const SILENCE_CLEAR_THRESHOLD: usize = 8 * crate::profile::K_SUB_FRAMES;

/// Capture back-pressure threshold (§6): once the device's queued capture
/// exceeds `32 * samples_per_frame` floats, the core flushes it and resumes
/// rather than working through the backlog frame by frame.
const CAPTURE_BACKPRESSURE_FRAMES: usize = 32;

/// Handle to a running worker thread. Dropping it requests shutdown and
/// joins the thread.
pub struct Core {
    command_tx: Sender<CoreCommand>,
    state: Arc<Mutex<StateData>>,
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Core {
    pub fn spawn(
        audio: Box<dyn AudioHost>,
        codec: Option<Box<dyn EccCodec>>,
        sink: Box<dyn EventSink>,
        seed: u64,
    ) -> Self {
        let (command_tx, command_rx) = bounded(INPUT_QUEUE_CAPACITY);
        let (stop_tx, stop_rx) = bounded(1);
        let state = Arc::new(Mutex::new(StateData::default()));
        let worker_state = Arc::clone(&state);

        let handle = std::thread::Builder::new()
            .name("chimera-core".into())
            .spawn(move || {
                run(audio, codec, sink, seed, command_rx, worker_state, stop_rx);
            })
            .expect("failed to spawn chimera-core worker thread");

        Self {
            command_tx,
            state,
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Enqueue a command. Drops the command (returning `false`) if the
    /// queue is full rather than blocking the caller — per §5, a stalled
    /// worker must never back-pressure its UI thread.
    pub fn send(&self, command: CoreCommand) -> bool {
        match self.command_tx.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Shallow copy of the most recently published state.
    pub fn state(&self) -> StateData {
        self.state.lock().expect("core state mutex poisoned").clone()
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(
    mut audio: Box<dyn AudioHost>,
    codec: Option<Box<dyn EccCodec>>,
    mut sink: Box<dyn EventSink>,
    seed: u64,
    command_rx: Receiver<CoreCommand>,
    state: Arc<Mutex<StateData>>,
    stop_rx: Receiver<()>,
) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut log = LogCollector::default();

    let mut params: Option<ProtocolParams> = None;
    let mut ring: Option<RingState> = None;
    let mut analyzer: Option<SpectrumAnalyzer> = None;
    let mut tx: Option<TransmissionState> = None;
    let mut reception = ReceptionState::idle();

    loop {
        if stop_rx.try_recv().is_ok() {
            break;
        }

        while let Ok(command) = command_rx.try_recv() {
            handle_command(
                command,
                &mut audio,
                &mut params,
                &mut ring,
                &mut analyzer,
                &mut tx,
                &mut reception,
                codec.as_deref(),
                &mut rng,
                &mut sink,
                &mut log,
            );
        }

        let (Some(p), Some(ring_state), Some(spec)) =
            (params.as_ref(), ring.as_mut(), analyzer.as_mut())
        else {
            continue;
        };

        // §6/§7.iv back-pressure: a capture queue that's run far ahead of
        // the worker is flushed and resumed rather than drained frame by
        // frame, so the demodulator sees one discontinuity instead of
        // slowly catching up to real time.
        if audio.queued_capture_len() > CAPTURE_BACKPRESSURE_FRAMES * p.samples_per_frame {
            log.log(LogLevel::Warn, "capture backlog exceeded threshold; flushing".to_string());
            let mut drain = vec![0.0f32; p.samples_per_frame];
            while audio.queued_capture_len() > p.samples_per_frame {
                if audio.capture(&mut drain).is_err() {
                    break;
                }
            }
        }

        if let Err(err) = audio.capture(&mut ring_state.sample_amplitude) {
            log.log(LogLevel::Error, format!("capture failed: {err}"));
            sink.handle(UiEvent::DeviceError(err.to_string()));
            continue;
        }

        if let Some(payload) = Demodulator::process(ring_state, &mut reception, p, codec.as_deref()) {
            log.log(LogLevel::Info, format!("received {} byte payload", payload.len()));
            sink.handle(UiEvent::PayloadReceived(payload.clone()));
            let mut s = state.lock().expect("core state mutex poisoned");
            s.received_payload = Some(payload);
        }

        spec.compute(&ring_state.sample_amplitude, &mut ring_state.sample_spectrum);
        let spectrum_snapshot = ring_state.sample_spectrum.clone();
        ring_state.update_history(&spectrum_snapshot);

        if carrier_present(&ring_state.history_average, p) {
            ring_state.silence_sub_frames = 0;
        } else {
            ring_state.silence_sub_frames += 1;
            if ring_state.silence_sub_frames >= SILENCE_CLEAR_THRESHOLD {
                ring_state.clear_history();
            }
        }

        match tx.as_mut() {
            Some(t) => {
                let still_active =
                    Modulator::next_frame(t, p, codec.as_deref(), &mut ring_state.output_block);
                if !still_active {
                    tx = None;
                    log.log(LogLevel::Debug, "transmission complete".to_string());
                    sink.handle(UiEvent::TransmissionComplete);
                }
            }
            None => ring_state.output_block.iter_mut().for_each(|s| *s = 0.0),
        }

        if let Err(err) = audio.playback(&ring_state.output_block) {
            log.log(LogLevel::Error, format!("playback failed: {err}"));
            sink.handle(UiEvent::DeviceError(err.to_string()));
        }

        {
            let mut s = state.lock().expect("core state mutex poisoned");
            s.spectrum = ring_state.history_average.clone();
            s.is_transmitting = tx.is_some();
            s.is_receiving = reception.receiving_data;
        }

        for entry in log.drain() {
            sink.handle(UiEvent::LogEmitted(entry));
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_command(
    command: CoreCommand,
    audio: &mut Box<dyn AudioHost>,
    params: &mut Option<ProtocolParams>,
    ring: &mut Option<RingState>,
    analyzer: &mut Option<SpectrumAnalyzer>,
    tx: &mut Option<TransmissionState>,
    reception: &mut ReceptionState,
    codec: Option<&dyn EccCodec>,
    rng: &mut StdRng,
    sink: &mut Box<dyn EventSink>,
    log: &mut LogCollector,
) {
    match command {
        CoreCommand::Init(new_params) => {
            if let Err(err) = new_params.validate_frequency_ranges() {
                log.log(LogLevel::Warn, format!("rejected profile: {err}"));
                return;
            }
            *ring = Some(RingState::new(&new_params));
            *analyzer = Some(SpectrumAnalyzer::new(new_params.samples_per_frame));
            reception.reset();
            *tx = None;
            *params = Some(new_params);
        }
        CoreCommand::DataOn => {
            if let Some(p) = params.as_ref() {
                match audio.open(p.sample_rate) {
                    Ok(()) => {
                        *tx = Some(Modulator::start_continuous(p, &p.initial_data_bits, rng));
                        sink.handle(UiEvent::Started);
                    }
                    Err(err) => {
                        log.log(LogLevel::Error, format!("device open failed: {err}"));
                        sink.handle(UiEvent::DeviceError(err.to_string()));
                    }
                }
            }
        }
        CoreCommand::DataSend(payload) => {
            if let Some(p) = params.as_ref() {
                if p.ecc_enabled() && codec.is_none() {
                    log.log(LogLevel::Warn, "ECC requested but no codec installed; sending uncoded".to_string());
                }
                *tx = Some(Modulator::start(p, &payload, codec, rng));
            }
        }
        CoreCommand::DataOff => {
            match (tx.as_mut(), params.as_ref()) {
                (Some(t), Some(p)) => Modulator::stop(t, p),
                _ => {
                    let _ = audio.set_playback_paused(true);
                    sink.handle(UiEvent::Stopped);
                }
            }
        }
        CoreCommand::DataClear => {
            reception.clear_received_buffer();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_host::LoopbackAudioHost;
    use crate::events::CollectingSink;
    use crate::profile::Profile;
    use std::time::Duration;

    #[test]
    fn init_then_send_eventually_reports_transmission_complete() {
        let core = Core::spawn(
            Box::new(LoopbackAudioHost::new()),
            None,
            Box::new(CollectingSink::default()),
            42,
        );
        let params = Profile::Bw11LowFreq.params();
        assert!(core.send(CoreCommand::Init(params.clone())));
        assert!(core.send(CoreCommand::DataOn));
        assert!(core.send(CoreCommand::DataSend(vec![0u8; params.payload_width_bytes()])));
        assert!(core.send(CoreCommand::DataOff));
        std::thread::sleep(Duration::from_millis(50));
        let snapshot = core.state();
        assert!(!snapshot.spectrum.is_empty());
    }

    #[test]
    fn queue_drops_newest_command_once_full() {
        let core = Core::spawn(
            Box::new(LoopbackAudioHost::new()),
            None,
            Box::new(CollectingSink::default()),
            1,
        );
        // Don't let the worker drain the queue: fill it immediately.
        let mut accepted = 0;
        for _ in 0..(INPUT_QUEUE_CAPACITY * 2) {
            if core.send(CoreCommand::DataClear) {
                accepted += 1;
            }
        }
        assert!(accepted <= INPUT_QUEUE_CAPACITY * 2);
    }
}
