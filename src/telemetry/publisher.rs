//! Telemetry publishers.

use super::snapshot::{ActiveStateChanged, MachineStructure, TelemetryEvent};
use std::io::Write;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Telemetry receiver disconnected")]
    Disconnected,

    #[error("Telemetry encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Telemetry write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Sink for machine structure and active-state changes.
///
/// Publishing is best-effort. Machines log and discard any error returned
/// here, so implementations should return quickly and never block on a slow
/// consumer.
pub trait Publisher: Send + Sync {
    /// Called once at the start of every run of the machine.
    fn publish_structure(
        &self,
        run_id: Uuid,
        structure: &MachineStructure,
    ) -> Result<(), PublishError>;

    fn publish_active(&self, event: &ActiveStateChanged) -> Result<(), PublishError>;
}

/// Forwards every event over an unbounded channel.
///
/// # Example
///
/// ```rust
/// use waypoint::telemetry::ChannelPublisher;
///
/// let (publisher, events) = ChannelPublisher::new();
/// drop(publisher);
/// assert!(events.recv().is_err());
/// ```
pub struct ChannelPublisher {
    sender: Sender<TelemetryEvent>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, Receiver<TelemetryEvent>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }

    fn send(&self, event: TelemetryEvent) -> Result<(), PublishError> {
        self.sender
            .send(event)
            .map_err(|_| PublishError::Disconnected)
    }
}

impl Publisher for ChannelPublisher {
    fn publish_structure(
        &self,
        run_id: Uuid,
        structure: &MachineStructure,
    ) -> Result<(), PublishError> {
        self.send(TelemetryEvent::Structure {
            run_id,
            structure: structure.clone(),
        })
    }

    fn publish_active(&self, event: &ActiveStateChanged) -> Result<(), PublishError> {
        self.send(TelemetryEvent::Active(event.clone()))
    }
}

/// Writes one JSON document per event to `writer`.
pub struct JsonLinesPublisher<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesPublisher<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, event: &TelemetryEvent) -> Result<(), PublishError> {
        let line = serde_json::to_string(event)?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> Publisher for JsonLinesPublisher<W> {
    fn publish_structure(
        &self,
        run_id: Uuid,
        structure: &MachineStructure,
    ) -> Result<(), PublishError> {
        self.write(&TelemetryEvent::Structure {
            run_id,
            structure: structure.clone(),
        })
    }

    fn publish_active(&self, event: &ActiveStateChanged) -> Result<(), PublishError> {
        self.write(&TelemetryEvent::Active(event.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(active: Option<&str>) -> ActiveStateChanged {
        ActiveStateChanged {
            run_id: Uuid::new_v4(),
            machine: "demo".to_string(),
            active: active.map(str::to_string),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn channel_publisher_forwards_events() {
        let (publisher, events) = ChannelPublisher::new();
        publisher.publish_active(&event(Some("FOO"))).unwrap();

        match events.try_recv().unwrap() {
            TelemetryEvent::Active(e) => assert_eq!(e.active.as_deref(), Some("FOO")),
            other => panic!("Expected active event, got {other:?}"),
        }
    }

    #[test]
    fn channel_publisher_reports_disconnect() {
        let (publisher, events) = ChannelPublisher::new();
        drop(events);

        let result = publisher.publish_active(&event(None));
        assert!(matches!(result, Err(PublishError::Disconnected)));
    }

    #[test]
    fn json_lines_publisher_writes_one_line_per_event() {
        let publisher = JsonLinesPublisher::new(Vec::new());
        publisher.publish_active(&event(Some("FOO"))).unwrap();
        publisher.publish_active(&event(None)).unwrap();

        let output = String::from_utf8(publisher.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: TelemetryEvent = serde_json::from_str(lines[0]).unwrap();
        assert!(matches!(first, TelemetryEvent::Active(ref e) if e.active.as_deref() == Some("FOO")));
    }
}
