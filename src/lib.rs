//! Bridge between a panel of MCP3008-wired controls and an OSC receiver.
//!
//! Potentiometers, toggle switches and push-buttons are sampled over SPI at
//! a fixed cadence. Pots are forwarded every cycle as `/POT{i}`; toggles and
//! buttons are thresholded, debounced, and forwarded on change as
//! `/TOGGLE{i}` and `/BUTTON{i}`.

pub mod adc;
pub mod config;
pub mod debounce;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod transport;

#[cfg(test)]
mod mock;

pub use adc::{AnalogInput, AnalogSource, Mcp3008Bus};
pub use config::{Config, Overrides};
pub use debounce::{ChannelState, DigitalClassifier, Level};
pub use dispatch::{CycleReport, DispatchLoop, LoopSettings, LoopState};
pub use error::{BusError, ChannelFault, ConfigError, TransportError};
pub use registry::{Channel, ChannelGroup, ChannelRegistry, STANDARD_LAYOUT};
pub use transport::{OscSender, UdpOscClient};
