// MIDI output devices - Sink backed by a midir output port

use crate::config::MidiOutputConfig;
use crate::midi::DeviceError;
use crate::midi::message::MidiMessage;
use crate::midi::sink::OutputSink;
use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MidiPortInfo {
    pub index: usize,
    pub name: String,
    pub is_default: bool,
}

/// List every MIDI output port visible to `client_name`
pub fn list_output_ports(client_name: &str) -> Result<Vec<MidiPortInfo>, DeviceError> {
    let midi_out = MidiOutput::new(client_name).map_err(|e| DeviceError::Init(e.to_string()))?;

    let ports = midi_out
        .ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            midi_out.port_name(port).ok().map(|name| MidiPortInfo {
                index,
                name,
                is_default: index == 0, // The first port is the default
            })
        })
        .collect();

    Ok(ports)
}

/// Output sink writing to a hardware or virtual MIDI port
pub struct MidirOutputSink {
    connection: Option<MidiOutputConnection>,
    port_name: String,
}

impl MidirOutputSink {
    /// Connect to the configured port, or to the first one if none is named
    pub fn connect(config: &MidiOutputConfig) -> Result<Self, DeviceError> {
        let midi_out = MidiOutput::new(&config.client_name)
            .map_err(|e| DeviceError::Init(e.to_string()))?;

        let (port, port_name) = match &config.port_name {
            Some(wanted) => find_port(&midi_out, wanted)
                .ok_or_else(|| DeviceError::PortNotFound(wanted.clone()))?,
            None => {
                let port = midi_out
                    .ports()
                    .into_iter()
                    .next()
                    .ok_or_else(|| DeviceError::PortNotFound("<default>".to_string()))?;
                let name = midi_out
                    .port_name(&port)
                    .unwrap_or_else(|_| "Unknown".to_string());
                (port, name)
            }
        };

        let connection = midi_out
            .connect(&port, &config.client_name)
            .map_err(|e| DeviceError::Connect(e.to_string()))?;

        log::info!("MIDI output connected: {}", port_name);

        Ok(Self {
            connection: Some(connection),
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Release the port. Later sends fail with [`DeviceError::Closed`].
    pub fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            log::debug!("MIDI output closed: {}", self.port_name);
        }
    }
}

impl OutputSink for MidirOutputSink {
    fn send(&mut self, message: &MidiMessage) -> Result<(), DeviceError> {
        let connection = self.connection.as_mut().ok_or(DeviceError::Closed)?;
        message.validate()?;
        connection
            .send(&message.to_bytes())
            .map_err(|e| DeviceError::Send(e.to_string()))
    }
}

impl Drop for MidirOutputSink {
    fn drop(&mut self) {
        self.close();
    }
}

fn find_port(midi_out: &MidiOutput, wanted: &str) -> Option<(MidiOutputPort, String)> {
    midi_out.ports().into_iter().find_map(|port| {
        let name = midi_out.port_name(&port).ok()?;
        (name == wanted).then_some((port, name))
    })
}
