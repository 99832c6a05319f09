use thiserror::Error;

pub type Result<T, E = BusError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("SPI error: {0}")]
    Spi(#[from] rppal::spi::Error),
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),
    #[error("no chip-select line for chip {0}")]
    NoSuchChip(usize),
    #[error("pin {pin} out of range on chip {chip} (must be 0-7)")]
    InvalidPin { chip: usize, pin: u8 },
    #[error("short SPI transfer: {0} of 3 bytes")]
    ShortTransfer(usize),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot resolve {0}")]
    Resolve(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("OSC encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single channel's failure within one cycle.
#[derive(Debug, Error)]
pub enum ChannelFault {
    #[error("read failed on {address}: {source}")]
    Read {
        address: String,
        #[source]
        source: BusError,
    },
    #[error("send failed on {address}: {source}")]
    Send {
        address: String,
        #[source]
        source: TransportError,
    },
}

impl ChannelFault {
    pub fn address(&self) -> &str {
        match self {
            ChannelFault::Read { address, .. } | ChannelFault::Send { address, .. } => address,
        }
    }
}
