/// MIDI boundary - destination discovery and raw 3-byte message sending
///
/// The core only ever depends on the two traits here; the midir-backed
/// implementations live alongside them so nothing above this module knows
/// about the device protocol.
use log::warn;
use midir::MidiOutput;
use thiserror::Error;

pub mod channel;

pub use channel::OutputChannel;

#[derive(Debug, Error)]
pub enum OutputError {
    /// No transport capability could be opened. The output channel cannot
    /// function until a destination is (re)selected, but this is never
    /// process-fatal.
    #[error("MIDI device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Soft condition: sends are skipped and logged, the caller continues.
    #[error("no MIDI destination selected")]
    NoDestinationSelected,

    /// A registry lookup for a stale or removed destination id.
    #[error("MIDI destination not found: {0}")]
    NotFound(String),

    /// The transport rejected one message; the next tick retries naturally.
    #[error("failed to send MIDI message: {0}")]
    SendFailure(String),
}

/// An available output destination: stable identity key plus display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub id: String,
    pub name: String,
}

/// A send capability bound to one destination at open time.
pub trait SendPort: Send {
    /// Send a single 3-byte channel-voice message.
    fn send(&mut self, message: [u8; 3]) -> Result<(), OutputError>;
}

/// Enumerates destinations and opens send ports to them. Discovery cadence
/// is caller-driven; `list` reflects whatever is plugged in right now.
pub trait DestinationRegistry: Send {
    fn list(&self) -> Vec<Destination>;

    fn open(&self, id: &str) -> Result<Box<dyn SendPort>, OutputError>;
}

/// Destination registry over midir output ports.
pub struct MidirRegistry {
    client_name: String,
}

impl MidirRegistry {
    pub fn new(client_name: &str) -> Self {
        Self {
            client_name: client_name.to_string(),
        }
    }

    fn output(&self) -> Result<MidiOutput, OutputError> {
        MidiOutput::new(&self.client_name)
            .map_err(|e| OutputError::DeviceUnavailable(e.to_string()))
    }

    fn port_id(index: usize) -> String {
        format!("out-{}", index)
    }
}

impl DestinationRegistry for MidirRegistry {
    fn list(&self) -> Vec<Destination> {
        let midi_out = match self.output() {
            Ok(out) => out,
            Err(e) => {
                warn!("could not enumerate MIDI destinations: {}", e);
                return Vec::new();
            }
        };

        midi_out
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(index, port)| {
                midi_out.port_name(port).ok().map(|name| Destination {
                    id: Self::port_id(index),
                    name,
                })
            })
            .collect()
    }

    fn open(&self, id: &str) -> Result<Box<dyn SendPort>, OutputError> {
        let midi_out = self.output()?;
        let ports = midi_out.ports();
        let index = (0..ports.len())
            .position(|index| Self::port_id(index) == id)
            .ok_or_else(|| OutputError::NotFound(id.to_string()))?;

        let connection = midi_out
            .connect(&ports[index], "genseq-out")
            .map_err(|e| OutputError::DeviceUnavailable(e.to_string()))?;
        Ok(Box::new(MidirPort { connection }))
    }
}

struct MidirPort {
    connection: midir::MidiOutputConnection,
}

impl SendPort for MidirPort {
    fn send(&mut self, message: [u8; 3]) -> Result<(), OutputError> {
        self.connection
            .send(&message)
            .map_err(|e| OutputError::SendFailure(e.to_string()))
    }
}

pub fn midi_note_name(note: u8) -> String {
    let note_names = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    let octave = (note / 12) as i32 - 1;
    let note_index = (note % 12) as usize;
    format!("{}{}", note_names[note_index], octave)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    pub(crate) type SendLog = Arc<Mutex<Vec<[u8; 3]>>>;

    /// In-memory registry that records every byte sent per destination.
    pub(crate) struct MockRegistry {
        destinations: Vec<Destination>,
        logs: HashMap<String, SendLog>,
        fail_sends: bool,
    }

    impl MockRegistry {
        pub fn with_ports(names: &[&str]) -> Self {
            let mut destinations = Vec::new();
            let mut logs = HashMap::new();
            for (index, name) in names.iter().enumerate() {
                let id = format!("mock-{}", index);
                destinations.push(Destination {
                    id: id.clone(),
                    name: name.to_string(),
                });
                logs.insert(id, Arc::new(Mutex::new(Vec::new())));
            }
            Self {
                destinations,
                logs,
                fail_sends: false,
            }
        }

        pub fn failing(mut self) -> Self {
            self.fail_sends = true;
            self
        }

        pub fn log(&self, id: &str) -> SendLog {
            Arc::clone(&self.logs[id])
        }
    }

    impl DestinationRegistry for MockRegistry {
        fn list(&self) -> Vec<Destination> {
            self.destinations.clone()
        }

        fn open(&self, id: &str) -> Result<Box<dyn SendPort>, OutputError> {
            let log = self
                .logs
                .get(id)
                .ok_or_else(|| OutputError::NotFound(id.to_string()))?;
            Ok(Box::new(MockPort {
                log: Arc::clone(log),
                fail_sends: self.fail_sends,
            }))
        }
    }

    struct MockPort {
        log: SendLog,
        fail_sends: bool,
    }

    impl SendPort for MockPort {
        fn send(&mut self, message: [u8; 3]) -> Result<(), OutputError> {
            if self.fail_sends {
                return Err(OutputError::SendFailure("mock transport down".into()));
            }
            self.log.lock().unwrap().push(message);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midi_note_name() {
        assert_eq!(midi_note_name(60), "C4");
        assert_eq!(midi_note_name(36), "C2");
        assert_eq!(midi_note_name(69), "A4");
    }

    #[test]
    fn test_output_error_messages() {
        let err = OutputError::NotFound("out-3".to_string());
        assert_eq!(err.to_string(), "MIDI destination not found: out-3");
    }
}
