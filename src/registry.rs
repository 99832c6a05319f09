use std::ops::Range;

use crate::adc::{AnalogInput, AnalogSource};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelGroup {
    Continuous,
    Toggle,
    Momentary,
}

impl ChannelGroup {
    pub fn address_prefix(self) -> &'static str {
        match self {
            ChannelGroup::Continuous => "/POT",
            ChannelGroup::Toggle => "/TOGGLE",
            ChannelGroup::Momentary => "/BUTTON",
        }
    }

    fn plural(self) -> &'static str {
        match self {
            ChannelGroup::Continuous => "potentiometers",
            ChannelGroup::Toggle => "toggle switches",
            ChannelGroup::Momentary => "push-buttons",
        }
    }
}

/// A contiguous run of pins on one chip assigned to a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipSpan {
    pub chip: usize,
    pub pins: Range<u8>,
    pub group: ChannelGroup,
}

const fn span(chip: usize, pins: Range<u8>, group: ChannelGroup) -> ChipSpan {
    ChipSpan { chip, pins, group }
}

/// Panel wiring. Order matters: it fixes the OSC index of every control.
pub const STANDARD_LAYOUT: [ChipSpan; 5] = [
    span(0, 0..6, ChannelGroup::Continuous),
    span(1, 0..8, ChannelGroup::Toggle),
    span(2, 0..8, ChannelGroup::Toggle),
    span(3, 0..4, ChannelGroup::Toggle),
    span(3, 4..8, ChannelGroup::Momentary),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    group: ChannelGroup,
    index: usize,
    input: AnalogInput,
    address: String,
}

impl Channel {
    fn new(group: ChannelGroup, index: usize, input: AnalogInput) -> Self {
        let address = format!("{}{}", group.address_prefix(), index);
        Channel { group, index, input, address }
    }

    pub fn group(&self) -> ChannelGroup {
        self.group
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn input(&self) -> &AnalogInput {
        &self.input
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Every channel of the panel, split by group, built once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelRegistry {
    continuous: Vec<Channel>,
    toggles: Vec<Channel>,
    momentary: Vec<Channel>,
}

impl ChannelRegistry {
    pub fn from_layout<S: AnalogSource + ?Sized>(source: &S, layout: &[ChipSpan]) -> Result<Self> {
        let mut registry = ChannelRegistry::default();
        for span in layout {
            for pin in span.pins.clone() {
                let input = source.bind(span.chip, pin)?;
                let channels = registry.group_mut(span.group);
                let index = channels.len();
                channels.push(Channel::new(span.group, index, input));
            }
        }
        Ok(registry)
    }

    pub fn standard<S: AnalogSource + ?Sized>(source: &S) -> Result<Self> {
        Self::from_layout(source, &STANDARD_LAYOUT)
    }

    pub fn group(&self, group: ChannelGroup) -> &[Channel] {
        match group {
            ChannelGroup::Continuous => &self.continuous,
            ChannelGroup::Toggle => &self.toggles,
            ChannelGroup::Momentary => &self.momentary,
        }
    }

    fn group_mut(&mut self, group: ChannelGroup) -> &mut Vec<Channel> {
        match group {
            ChannelGroup::Continuous => &mut self.continuous,
            ChannelGroup::Toggle => &mut self.toggles,
            ChannelGroup::Momentary => &mut self.momentary,
        }
    }

    pub fn continuous(&self) -> &[Channel] {
        &self.continuous
    }

    pub fn toggles(&self) -> &[Channel] {
        &self.toggles
    }

    pub fn momentary(&self) -> &[Channel] {
        &self.momentary
    }
}

/// Human-readable layout, one line per chip.
pub fn banner(layout: &[ChipSpan], chip_select_pins: &[u8]) -> Vec<String> {
    let mut chips: Vec<usize> = layout.iter().map(|s| s.chip).collect();
    chips.sort_unstable();
    chips.dedup();

    chips
        .into_iter()
        .map(|chip| {
            let parts: Vec<String> = layout
                .iter()
                .filter(|s| s.chip == chip && !s.pins.is_empty())
                .map(|s| {
                    format!(
                        "{} {} (P{}-P{})",
                        s.pins.len(),
                        s.group.plural(),
                        s.pins.start,
                        s.pins.end - 1
                    )
                })
                .collect();
            let label = match chip_select_pins.get(chip) {
                Some(gpio) => format!("Chip {} (D{}):", chip + 1, gpio),
                None => format!("Chip {}:", chip + 1),
            };
            format!("{:<13} {}", label, parts.join(" + "))
        })
        .collect()
}
