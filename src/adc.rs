use rppal::gpio::{Gpio, OutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use tracing::info;

use crate::error::{BusError, Result};

/// Single-ended inputs per MCP3008.
pub const PINS_PER_CHIP: u8 = 8;

/// Readings are normalized to 16 bits regardless of converter resolution.
pub const FULL_SCALE_RAW: u16 = u16::MAX;

/// A bound input: one pin on one chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalogInput {
    chip: usize,
    pin: u8,
}

impl AnalogInput {
    pub fn chip(&self) -> usize {
        self.chip
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }
}

/// Anything that can hand out raw samples for (chip, pin) pairs.
pub trait AnalogSource {
    /// Number of chips reachable through this source.
    fn chip_count(&self) -> usize;

    /// Bind a pin on a chip, validating both against the bus layout.
    fn bind(&self, chip: usize, pin: u8) -> Result<AnalogInput> {
        if chip >= self.chip_count() {
            return Err(BusError::NoSuchChip(chip));
        }
        if pin >= PINS_PER_CHIP {
            return Err(BusError::InvalidPin { chip, pin });
        }
        Ok(AnalogInput { chip, pin })
    }

    /// Raw sample in `[0, FULL_SCALE_RAW]`.
    fn read(&mut self, input: &AnalogInput) -> Result<u16>;
}

/// Voltage for a raw sample, given the converter's reference voltage.
pub fn voltage(raw: u16, reference_voltage: f32) -> f32 {
    raw as f32 / FULL_SCALE_RAW as f32 * reference_voltage
}

/// Several MCP3008 chips sharing SPI0, each selected by its own GPIO line.
pub struct Mcp3008Bus {
    spi: Spi,
    chip_selects: Vec<OutputPin>,
}

impl Mcp3008Bus {
    pub fn new(clock_hz: u32, chip_select_pins: &[u8]) -> Result<Self> {
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, clock_hz, Mode::Mode0)?;
        let gpio = Gpio::new()?;

        let mut chip_selects = Vec::with_capacity(chip_select_pins.len());
        for &pin_num in chip_select_pins {
            // idle high: a chip only answers while its line is held low
            let pin = gpio.get(pin_num)?.into_output_high();
            info!(gpio = pin_num, "chip select initialized");
            chip_selects.push(pin);
        }

        info!(chips = chip_selects.len(), clock_hz, "MCP3008 bus initialized on SPI0");
        Ok(Mcp3008Bus { spi, chip_selects })
    }

    fn transfer(&mut self, chip: usize, pin: u8) -> Result<u16> {
        let tx_buffer = [0x01, (0x08 | pin) << 4, 0x00];
        let mut rx_buffer = [0u8; 3];

        let cs = self
            .chip_selects
            .get_mut(chip)
            .ok_or(BusError::NoSuchChip(chip))?;
        cs.set_low();
        let transferred = self.spi.transfer(&mut rx_buffer, &tx_buffer);
        cs.set_high();

        let transferred = transferred?;
        if transferred != rx_buffer.len() {
            return Err(BusError::ShortTransfer(transferred));
        }

        Ok((((rx_buffer[1] & 0x03) as u16) << 8) | (rx_buffer[2] as u16))
    }
}

impl AnalogSource for Mcp3008Bus {
    fn chip_count(&self) -> usize {
        self.chip_selects.len()
    }

    fn read(&mut self, input: &AnalogInput) -> Result<u16> {
        let value = self.transfer(input.chip, input.pin)?;
        Ok(scale_10bit(value))
    }
}

fn scale_10bit(value: u16) -> u16 {
    (value & 0x03FF) << 6
}
