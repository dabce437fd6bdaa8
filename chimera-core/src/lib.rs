//! Core library for an acoustic (audio-frequency) modem: encodes short byte
//! payloads as multi-frequency shift-keyed tones and decodes them back out
//! of a captured audio stream in real time.
//!
//! The crate is split along the boundary between pure signal processing
//! (`profile`, `waveform`, `spectrum`, `modulator`, `demodulator`) and the
//! real-time plumbing that drives it (`core_loop`, `state`, `events`). The
//! audio device and the error-correction codec are modeled as traits
//! (`audio_host::AudioHost`, `ecc::EccCodec`) rather than concrete
//! dependencies, so the worker loop can run against doubles in tests and
//! against whatever device/codec backend an application wires in.

pub mod audio_host;
pub mod core_loop;
pub mod demodulator;
pub mod ecc;
pub mod errors;
pub mod events;
pub mod logging;
pub mod modulator;
pub mod profile;
pub mod spectrum;
pub mod state;
pub mod waveform;

pub use audio_host::{AudioHost, LoopbackAudioHost};
pub use core_loop::Core;
pub use ecc::{EccCodec, ReedSolomonCodec};
pub use errors::{CoreError, DecodeError, DeviceError, ProfileError, Result};
pub use events::{CollectingSink, CoreCommand, EventSink, UiEvent};
pub use profile::{Profile, ProtocolParams};
pub use state::StateData;
