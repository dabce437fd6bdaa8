//! UI-facing event types (§6: "UI/windowing layer (external, not modeled)").
//!
//! The Core worker doesn't know what's on the other end of these events — a
//! CLI printing to stdout, a GUI updating a waveform view, a test harness
//! collecting them into a `Vec`. It only knows about [`EventSink`].

use crate::logging::LogEntry;

/// Commands flowing from the UI thread into the Core worker, carried over
/// the bounded input queue (`crate::core_loop::INPUT_QUEUE_CAPACITY`).
#[derive(Debug, Clone)]
pub enum CoreCommand {
    Init(crate::profile::ProtocolParams),
    DataOn,
    DataSend(Vec<u8>),
    DataOff,
    DataClear,
}

/// Events flowing from the Core worker back out to whatever owns it.
#[derive(Debug, Clone)]
pub enum UiEvent {
    Started,
    Stopped,
    PayloadReceived(Vec<u8>),
    TransmissionComplete,
    DeviceError(String),
    LogEmitted(LogEntry),
}

/// Receiver for [`UiEvent`]s. Registering a new sink on the Core replaces
/// any previously registered one — "last registered wins", since only one
/// consumer drives a given Core instance at a time.
pub trait EventSink: Send {
    fn handle(&mut self, event: UiEvent);
}

/// Test/embedding-friendly sink that just remembers everything it's handed.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub events: Vec<UiEvent>,
}

impl EventSink for CollectingSink {
    fn handle(&mut self, event: UiEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_sink_preserves_order() {
        let mut sink = CollectingSink::default();
        sink.handle(UiEvent::Started);
        sink.handle(UiEvent::TransmissionComplete);
        assert_eq!(sink.events.len(), 2);
        matches!(sink.events[0], UiEvent::Started);
    }
}
