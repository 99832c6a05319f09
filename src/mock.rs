//! In-process stand-ins for the SPI bus and the OSC socket.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::adc::{AnalogInput, AnalogSource};
use crate::error::{BusError, Result, TransportError};
use crate::transport::OscSender;

/// Replays queued samples per (chip, pin); an empty queue reads as 0.
pub struct ScriptedSource {
    chips: usize,
    queued: HashMap<(usize, u8), VecDeque<Option<u16>>>,
    steady: HashMap<(usize, u8), u16>,
}

impl ScriptedSource {
    pub fn new(chips: usize) -> Self {
        ScriptedSource {
            chips,
            queued: HashMap::new(),
            steady: HashMap::new(),
        }
    }

    /// Value returned whenever nothing is queued for this input.
    pub fn set(&mut self, chip: usize, pin: u8, raw: u16) {
        self.steady.insert((chip, pin), raw);
    }

    pub fn push(&mut self, chip: usize, pin: u8, raw: u16) {
        self.queued.entry((chip, pin)).or_default().push_back(Some(raw));
    }

    /// Next read of this input fails.
    pub fn push_failure(&mut self, chip: usize, pin: u8) {
        self.queued.entry((chip, pin)).or_default().push_back(None);
    }
}

impl AnalogSource for ScriptedSource {
    fn chip_count(&self) -> usize {
        self.chips
    }

    fn read(&mut self, input: &AnalogInput) -> Result<u16> {
        let key = (input.chip(), input.pin());
        match self.queued.get_mut(&key).and_then(|q| q.pop_front()) {
            Some(Some(raw)) => Ok(raw),
            Some(None) => Err(BusError::ShortTransfer(0)),
            None => Ok(self.steady.get(&key).copied().unwrap_or(0)),
        }
    }
}

/// Records every message; sends to addresses in `failing` return an error.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Vec<(String, i32)>,
    pub attempts: Vec<String>,
    pub failing: HashSet<String>,
}

impl RecordingSender {
    pub fn new() -> Self {
        RecordingSender::default()
    }

    pub fn fail_on(&mut self, address: &str) {
        self.failing.insert(address.to_string());
    }

    pub fn take(&mut self) -> Vec<(String, i32)> {
        std::mem::take(&mut self.sent)
    }
}

impl OscSender for RecordingSender {
    fn send(&mut self, address: &str, value: i32) -> std::result::Result<(), TransportError> {
        self.attempts.push(address.to_string());
        if self.failing.contains(address) {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        self.sent.push((address.to_string(), value));
        Ok(())
    }
}
