//! The polling loop: read every channel, debounce digital ones, send OSC.
//!
//! Pots are forwarded every cycle. Toggles and buttons go through
//! [`DigitalClassifier`] and their [`ChannelState`] and are only forwarded
//! when the debouncer accepts a change. Every read and every send is its
//! own failure boundary: a bad channel is logged and the cycle moves on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::adc::{AnalogSource, voltage};
use crate::config::Config;
use crate::debounce::{ChannelState, DigitalClassifier, Level};
use crate::error::ChannelFault;
use crate::registry::{Channel, ChannelGroup, ChannelRegistry};
use crate::transport::OscSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSettings {
    pub classifier: DigitalClassifier,
    pub debounce: Duration,
    pub period: Duration,
    pub reference_voltage: f32,
}

impl From<&Config> for LoopSettings {
    fn from(config: &Config) -> Self {
        LoopSettings {
            classifier: DigitalClassifier::new(config.digital_threshold),
            debounce: config.debounce_interval(),
            period: config.loop_delay(),
            reference_voltage: config.reference_voltage,
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        LoopSettings::from(&Config::default())
    }
}

/// What one pass over the registry produced.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub sent: usize,
    pub faults: Vec<ChannelFault>,
}

impl CycleReport {
    fn record(&mut self, outcome: Result<bool, ChannelFault>) {
        match outcome {
            Ok(true) => self.sent += 1,
            Ok(false) => {}
            Err(fault) => {
                warn!(address = fault.address(), error = %fault, "channel skipped this cycle");
                self.faults.push(fault);
            }
        }
    }
}

pub struct DispatchLoop<S, T> {
    source: S,
    sender: T,
    registry: ChannelRegistry,
    toggle_states: Vec<ChannelState>,
    button_states: Vec<ChannelState>,
    settings: LoopSettings,
    state: LoopState,
    cycles: u64,
}

impl<S: AnalogSource, T: OscSender> DispatchLoop<S, T> {
    pub fn new(source: S, sender: T, registry: ChannelRegistry, settings: LoopSettings) -> Self {
        let toggle_states = vec![ChannelState::new(); registry.toggles().len()];
        let button_states = vec![ChannelState::new(); registry.momentary().len()];
        DispatchLoop {
            source,
            sender,
            registry,
            toggle_states,
            button_states,
            settings,
            state: LoopState::Stopped,
            cycles: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn channel_state(&self, group: ChannelGroup, index: usize) -> Option<&ChannelState> {
        match group {
            ChannelGroup::Continuous => None,
            ChannelGroup::Toggle => self.toggle_states.get(index),
            ChannelGroup::Momentary => self.button_states.get(index),
        }
    }

    pub fn sender(&self) -> &T {
        &self.sender
    }

    pub fn sender_mut(&mut self) -> &mut T {
        &mut self.sender
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Poll every channel once, using `now` as the debounce clock.
    pub fn run_cycle(&mut self, now: Instant) -> CycleReport {
        let mut report = CycleReport::default();
        let settings = self.settings;

        for channel in self.registry.continuous() {
            let outcome = read(&mut self.source, channel).and_then(|raw| {
                debug!(
                    address = channel.address(),
                    raw,
                    "Pot {} at {:.3}V",
                    channel.index(),
                    voltage(raw, settings.reference_voltage)
                );
                send(&mut self.sender, channel, i32::from(raw)).map(|_| true)
            });
            report.record(outcome);
        }

        for (channel, state) in self.registry.toggles().iter().zip(self.toggle_states.iter_mut()) {
            let outcome = poll_digital(&mut self.source, &mut self.sender, &settings, channel, state, now);
            if let Ok(true) = outcome {
                info!("Toggle {}: {}", channel.index(), on_off(state.last_value()));
            }
            report.record(outcome);
        }

        for (channel, state) in self.registry.momentary().iter().zip(self.button_states.iter_mut()) {
            let outcome = poll_digital(&mut self.source, &mut self.sender, &settings, channel, state, now);
            if let Ok(true) = outcome {
                info!("Pushbutton {}: {}", channel.index(), pressed_released(state.last_value()));
            }
            report.record(outcome);
        }

        self.cycles += 1;
        report
    }

    /// Run until `running` is cleared. The flag is only checked between cycles.
    pub fn run(&mut self, running: &AtomicBool) {
        self.state = LoopState::Running;
        info!(
            period_ms = self.settings.period.as_millis() as u64,
            debounce_ms = self.settings.debounce.as_millis() as u64,
            threshold = self.settings.classifier.threshold(),
            "dispatch loop running"
        );

        while self.state == LoopState::Running {
            if !running.load(Ordering::SeqCst) {
                self.state = LoopState::Stopped;
                break;
            }

            let report = self.run_cycle(Instant::now());
            if !report.faults.is_empty() {
                debug!(cycle = self.cycles, faults = report.faults.len(), "cycle finished with faults");
            }

            thread::sleep(self.settings.period);
        }

        info!(cycles = self.cycles, "Shutting down...");
    }
}

fn read<S: AnalogSource>(source: &mut S, channel: &Channel) -> Result<u16, ChannelFault> {
    source.read(channel.input()).map_err(|source| ChannelFault::Read {
        address: channel.address().to_string(),
        source,
    })
}

fn send<T: OscSender>(sender: &mut T, channel: &Channel, value: i32) -> Result<(), ChannelFault> {
    sender
        .send(channel.address(), value)
        .map_err(|source| ChannelFault::Send {
            address: channel.address().to_string(),
            source,
        })
}

/// Ok(true) when a debounced change was accepted and sent.
fn poll_digital<S: AnalogSource, T: OscSender>(
    source: &mut S,
    sender: &mut T,
    settings: &LoopSettings,
    channel: &Channel,
    state: &mut ChannelState,
    now: Instant,
) -> Result<bool, ChannelFault> {
    let raw = read(source, channel)?;
    let level = settings.classifier.classify(raw);
    if !state.accept(level, now, settings.debounce) {
        return Ok(false);
    }
    send(sender, channel, level.value())?;
    Ok(true)
}

fn on_off(level: Option<Level>) -> &'static str {
    match level {
        Some(Level::High) => "ON",
        _ => "OFF",
    }
}

fn pressed_released(level: Option<Level>) -> &'static str {
    match level {
        Some(Level::High) => "PRESSED",
        _ => "RELEASED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::mock::{RecordingSender, ScriptedSource};
    use std::sync::Arc;

    const HIGH: u16 = 40000;
    const LOW: u16 = 5000;

    fn panel() -> DispatchLoop<ScriptedSource, RecordingSender> {
        let source = ScriptedSource::new(4);
        let registry = ChannelRegistry::standard(&source).unwrap();
        DispatchLoop::new(source, RecordingSender::new(), registry, LoopSettings::default())
    }

    fn at(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    fn sent_to(sent: &[(String, i32)], prefix: &str) -> Vec<(String, i32)> {
        sent.iter()
            .filter(|(addr, _)| addr.starts_with(prefix))
            .cloned()
            .collect()
    }

    #[test]
    fn settings_follow_config() {
        let config = Config {
            digital_threshold: 20000,
            debounce_ms: 30,
            loop_delay_ms: 4,
            ..Config::default()
        };
        let settings = LoopSettings::from(&config);
        assert_eq!(settings.classifier.threshold(), 20000);
        assert_eq!(settings.classifier.classify(20001), Level::High);
        assert_eq!(settings.debounce, Duration::from_millis(30));
        assert_eq!(settings.period, Duration::from_millis(4));
    }

    #[test]
    fn one_state_per_digital_channel() {
        let dispatch = panel();
        assert_eq!(dispatch.toggle_states.len(), dispatch.registry().toggles().len());
        assert_eq!(dispatch.button_states.len(), dispatch.registry().momentary().len());
        assert!(dispatch.channel_state(ChannelGroup::Toggle, 19).is_some());
        assert!(dispatch.channel_state(ChannelGroup::Toggle, 20).is_none());
        assert!(dispatch.channel_state(ChannelGroup::Continuous, 0).is_none());
    }

    #[test]
    fn first_cycle_reports_every_channel() {
        let mut dispatch = panel();
        dispatch.source_mut().set(0, 2, 12345);
        dispatch.source_mut().set(1, 0, HIGH);

        let report = dispatch.run_cycle(Instant::now());
        assert!(report.faults.is_empty());
        assert_eq!(report.sent, 30);

        let sent = dispatch.sender_mut().take();
        assert!(sent.contains(&("/POT2".to_string(), 12345)));
        assert!(sent.contains(&("/TOGGLE0".to_string(), 1)));
        assert!(sent.contains(&("/TOGGLE1".to_string(), 0)));
        assert!(sent.contains(&("/BUTTON3".to_string(), 0)));
        assert_eq!(sent_to(&sent, "/TOGGLE").len(), 20);
        assert_eq!(sent_to(&sent, "/BUTTON").len(), 4);
    }

    #[test]
    fn pots_sent_every_cycle_unchanged_or_not() {
        let mut dispatch = panel();
        dispatch.source_mut().set(0, 0, 777);
        let t0 = Instant::now();

        for cycle in 0..5 {
            dispatch.run_cycle(at(t0, cycle * 10));
            let sent = dispatch.sender_mut().take();
            let pots = sent_to(&sent, "/POT");
            assert_eq!(pots.len(), 6, "cycle {}", cycle);
            assert_eq!(pots[0], ("/POT0".to_string(), 777));
        }
    }

    #[test]
    fn steady_digital_inputs_are_quiet_after_first_cycle() {
        let mut dispatch = panel();
        let t0 = Instant::now();
        dispatch.run_cycle(t0);
        dispatch.sender_mut().take();

        for cycle in 1..20 {
            let report = dispatch.run_cycle(at(t0, cycle * 10));
            assert_eq!(report.sent, 6);
        }
        assert!(sent_to(&dispatch.sender().sent, "/TOGGLE").is_empty());
        assert!(sent_to(&dispatch.sender().sent, "/BUTTON").is_empty());
    }

    #[test]
    fn toggle_debounce_scenario() {
        let mut dispatch = panel();
        // toggle 8 lives on chip 2, pin 0
        for raw in [HIGH, HIGH, LOW, LOW] {
            dispatch.source_mut().push(2, 0, raw);
        }
        let t0 = Instant::now();

        let mut events = Vec::new();
        for ms in [0, 10, 20, 80] {
            dispatch.run_cycle(at(t0, ms));
            for (_, value) in sent_to(&dispatch.sender_mut().take(), "/TOGGLE8") {
                events.push((ms, value));
            }
        }

        assert_eq!(events, vec![(0, 1), (80, 0)]);
        let state = dispatch.channel_state(ChannelGroup::Toggle, 8).unwrap();
        assert_eq!(state.last_value(), Some(Level::Low));
        assert_eq!(state.last_change(), Some(at(t0, 80)));
    }

    #[test]
    fn buttons_use_their_own_namespace() {
        let mut dispatch = panel();
        let t0 = Instant::now();
        dispatch.run_cycle(t0);
        dispatch.sender_mut().take();

        // button 1 is chip 3, pin 5; toggle 17 is chip 3, pin 1
        dispatch.source_mut().set(3, 5, HIGH);
        dispatch.run_cycle(at(t0, 100));
        let sent = dispatch.sender_mut().take();
        assert!(sent.contains(&("/BUTTON1".to_string(), 1)));
        assert!(sent_to(&sent, "/TOGGLE").is_empty());

        dispatch.source_mut().set(3, 5, LOW);
        dispatch.run_cycle(at(t0, 130));
        assert!(sent_to(&dispatch.sender_mut().take(), "/BUTTON").is_empty());
        dispatch.run_cycle(at(t0, 151));
        assert_eq!(
            sent_to(&dispatch.sender_mut().take(), "/BUTTON"),
            vec![("/BUTTON1".to_string(), 0)]
        );
    }

    #[test]
    fn send_failure_does_not_block_next_channel() {
        let mut dispatch = panel();
        dispatch.sender_mut().fail_on("/TOGGLE4");

        let report = dispatch.run_cycle(Instant::now());
        assert_eq!(report.faults.len(), 1);
        assert!(matches!(
            &report.faults[0],
            ChannelFault::Send { address, source: TransportError::Io(_) } if address == "/TOGGLE4"
        ));

        let attempts = &dispatch.sender().attempts;
        let failed_at = attempts.iter().position(|a| a == "/TOGGLE4").unwrap();
        assert_eq!(attempts[failed_at + 1], "/TOGGLE5");
        assert_eq!(report.sent, 29);
    }

    #[test]
    fn read_failure_is_isolated_to_its_channel() {
        let mut dispatch = panel();
        dispatch.source_mut().push_failure(0, 1);
        dispatch.source_mut().push_failure(1, 3);

        let report = dispatch.run_cycle(Instant::now());
        let failed: Vec<&str> = report.faults.iter().map(|f| f.address()).collect();
        assert_eq!(failed, vec!["/POT1", "/TOGGLE3"]);
        assert!(report.faults.iter().all(|f| matches!(f, ChannelFault::Read { .. })));
        assert_eq!(report.sent, 28);

        // the toggle was never seeded, so the next good read is a cold start
        let state = dispatch.channel_state(ChannelGroup::Toggle, 3).unwrap();
        assert_eq!(state.last_value(), None);
        dispatch.sender_mut().take();
        dispatch.run_cycle(Instant::now());
        assert!(dispatch.sender().sent.contains(&("/TOGGLE3".to_string(), 0)));
    }

    #[test]
    fn cleared_flag_stops_before_first_cycle() {
        let mut dispatch = panel();
        let running = AtomicBool::new(false);
        dispatch.run(&running);
        assert_eq!(dispatch.state(), LoopState::Stopped);
        assert_eq!(dispatch.cycles(), 0);
        assert!(dispatch.sender().sent.is_empty());
    }

    struct StopAfter {
        running: Arc<AtomicBool>,
        cycles_left: usize,
    }

    impl OscSender for StopAfter {
        fn send(&mut self, address: &str, _value: i32) -> Result<(), TransportError> {
            if address == "/POT0" {
                self.cycles_left -= 1;
                if self.cycles_left == 0 {
                    self.running.store(false, Ordering::SeqCst);
                }
            }
            Ok(())
        }
    }

    #[test]
    fn interruption_finishes_current_cycle_then_stops() {
        let running = Arc::new(AtomicBool::new(true));
        let source = ScriptedSource::new(4);
        let registry = ChannelRegistry::standard(&source).unwrap();
        let sender = StopAfter { running: Arc::clone(&running), cycles_left: 3 };
        let settings = LoopSettings { period: Duration::from_millis(1), ..LoopSettings::default() };

        let mut dispatch = DispatchLoop::new(source, sender, registry, settings);
        dispatch.run(&running);

        assert_eq!(dispatch.cycles(), 3);
        assert_eq!(dispatch.state(), LoopState::Stopped);
    }
}
