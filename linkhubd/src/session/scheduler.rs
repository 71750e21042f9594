//! Cooperative polling scheduler
//!
//! A stack of poll states. Only the top state runs, at most once per
//! [`StateStack::process`] call and only after its interval has elapsed
//! since the previous run. States hand back a [`Transition`] instead of
//! mutating the stack themselves.
//!
//! Recurring states rotate with [`Transition::Shift`], which moves the
//! running state to the bottom. Guard states pushed on top interrupt the
//! rotation until they pop.

use std::time::{Duration, Instant};
use tracing::{debug, info};

const MONITORING_DISABLED_INTERVAL: Duration = Duration::from_millis(5000);
const ENUMERATE_INTERVAL: Duration = Duration::from_millis(1000);
const ENUMERATE_RETRY_INTERVAL: Duration = Duration::from_millis(5000);
const POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Operations the poll states drive
pub trait PollContext {
    fn monitoring_enabled(&self) -> bool;
    /// Whether any fan control is registered
    fn has_fans(&self) -> bool;
    /// Register fan controls and sensors from the registry; true if any fan
    fn create_sensors(&mut self) -> bool;
    /// Unregister every fan control and sensor
    fn remove_sensors(&mut self);
    fn poll_fan_speeds(&mut self);
    fn poll_temperatures(&mut self);
    fn set_fan_speeds(&mut self);
}

/// Stack mutation requested by a state
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Stay,
    Push(PollState),
    Pop,
    Replace(PollState),
    Shift,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    /// Fan control is off; holds until it comes back
    MonitoringDisabled,
    /// Builds the fan and sensor lists
    EnumerateConnectedFans { interval: Duration },
    PollFanSpeeds,
    PollTempProbes,
    SetFanSpeeds,
}

impl PollState {
    pub fn enumerate() -> Self {
        PollState::EnumerateConnectedFans {
            interval: ENUMERATE_INTERVAL,
        }
    }

    pub fn interval(&self) -> Duration {
        match self {
            PollState::MonitoringDisabled => MONITORING_DISABLED_INTERVAL,
            PollState::EnumerateConnectedFans { interval } => *interval,
            PollState::PollFanSpeeds | PollState::PollTempProbes | PollState::SetFanSpeeds => {
                POLL_INTERVAL
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PollState::MonitoringDisabled => "MonitoringDisabled",
            PollState::EnumerateConnectedFans { .. } => "EnumerateConnectedFans",
            PollState::PollFanSpeeds => "PollFanSpeeds",
            PollState::PollTempProbes => "PollTempProbes",
            PollState::SetFanSpeeds => "SetFanSpeeds",
        }
    }

    pub fn run<C: PollContext>(&mut self, ctx: &mut C) -> Transition {
        match self {
            PollState::MonitoringDisabled => {
                ctx.remove_sensors();

                if ctx.monitoring_enabled() {
                    info!("Fan control enabled, fetching connected fans...");
                    return Transition::Replace(PollState::enumerate());
                }
                Transition::Stay
            }
            PollState::EnumerateConnectedFans { interval } => {
                if !ctx.monitoring_enabled() {
                    info!("Fan control disabled...");
                    return Transition::Push(PollState::MonitoringDisabled);
                }

                if ctx.create_sensors() {
                    info!("Found connected fans. Starting polling loop...");
                    Transition::Pop
                } else {
                    info!("Connected fans are still being initialized by the controller. Delaying detection");
                    *interval = ENUMERATE_RETRY_INTERVAL;
                    Transition::Stay
                }
            }
            PollState::PollFanSpeeds => Self::recurring(ctx, C::poll_fan_speeds),
            PollState::PollTempProbes => Self::recurring(ctx, C::poll_temperatures),
            PollState::SetFanSpeeds => Self::recurring(ctx, C::set_fan_speeds),
        }
    }

    fn recurring<C: PollContext>(ctx: &mut C, job: fn(&mut C)) -> Transition {
        if !ctx.monitoring_enabled() {
            info!("Fan control disabled...");
            return Transition::Push(PollState::MonitoringDisabled);
        }

        if !ctx.has_fans() {
            info!("No connected fans known. Fetching connected fans...");
            return Transition::Push(PollState::enumerate());
        }

        job(ctx);
        Transition::Shift
    }
}

#[derive(Debug)]
pub struct StateStack {
    states: Vec<PollState>,
    last_process: Option<Instant>,
}

impl Default for StateStack {
    /// SetFanSpeeds at the bottom, PollFanSpeeds on top
    fn default() -> Self {
        let mut stack = Self::empty();
        stack.push(PollState::SetFanSpeeds);
        stack.push(PollState::PollTempProbes);
        stack.push(PollState::PollFanSpeeds);
        stack
    }
}

impl StateStack {
    pub fn empty() -> Self {
        Self {
            states: Vec::new(),
            last_process: None,
        }
    }

    pub fn push(&mut self, state: PollState) {
        debug!("Scheduler push {}", state.name());
        self.states.push(state);
    }

    pub fn pop(&mut self) -> Option<PollState> {
        self.states.pop()
    }

    pub fn replace(&mut self, state: PollState) {
        self.states.pop();
        self.push(state);
    }

    /// Move the current state to the bottom of the stack
    pub fn shift(&mut self) {
        if let Some(state) = self.states.pop() {
            self.states.insert(0, state);
        }
    }

    pub fn current(&self) -> Option<&PollState> {
        self.states.last()
    }

    /// Interval of the current state
    pub fn interval(&self) -> Option<Duration> {
        self.current().map(PollState::interval)
    }

    pub fn states(&self) -> &[PollState] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Run the current state if its interval has elapsed
    ///
    /// Returns the name of the state that ran.
    pub fn process<C: PollContext>(&mut self, now: Instant, ctx: &mut C) -> Option<&'static str> {
        let interval = self.interval()?;
        if let Some(last) = self.last_process {
            if now.saturating_duration_since(last) < interval {
                return None;
            }
        }

        let state = self.states.last_mut()?;
        let name = state.name();
        let transition = state.run(ctx);
        self.apply(transition);
        self.last_process = Some(now);

        Some(name)
    }

    fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::Stay => {}
            Transition::Push(state) => self.push(state),
            Transition::Pop => {
                self.pop();
            }
            Transition::Replace(state) => self.replace(state),
            Transition::Shift => self.shift(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingContext {
        monitoring: bool,
        fans_ready: bool,
        has_fans: bool,
        log: Vec<&'static str>,
    }

    impl RecordingContext {
        fn ready() -> Self {
            Self {
                monitoring: true,
                fans_ready: true,
                ..Default::default()
            }
        }
    }

    impl PollContext for RecordingContext {
        fn monitoring_enabled(&self) -> bool {
            self.monitoring
        }

        fn has_fans(&self) -> bool {
            self.has_fans
        }

        fn create_sensors(&mut self) -> bool {
            self.log.push("create_sensors");
            self.has_fans = self.fans_ready;
            self.fans_ready
        }

        fn remove_sensors(&mut self) {
            self.log.push("remove_sensors");
            self.has_fans = false;
        }

        fn poll_fan_speeds(&mut self) {
            self.log.push("fan");
        }

        fn poll_temperatures(&mut self) {
            self.log.push("temp");
        }

        fn set_fan_speeds(&mut self) {
            self.log.push("set");
        }
    }

    fn run_ticks(stack: &mut StateStack, ctx: &mut RecordingContext, start: Instant, count: u64) {
        for step in 0..count {
            stack.process(start + Duration::from_secs(step * 5), ctx);
        }
    }

    #[test]
    fn test_initial_stack() {
        let stack = StateStack::default();
        assert_eq!(
            stack.states(),
            &[
                PollState::SetFanSpeeds,
                PollState::PollTempProbes,
                PollState::PollFanSpeeds
            ]
        );
        assert_eq!(stack.interval(), Some(POLL_INTERVAL));
    }

    #[test]
    fn test_round_robin_order() {
        let mut stack = StateStack::default();
        let mut ctx = RecordingContext::ready();
        ctx.has_fans = true;

        run_ticks(&mut stack, &mut ctx, Instant::now(), 9);

        assert_eq!(
            ctx.log,
            vec!["fan", "temp", "set", "fan", "temp", "set", "fan", "temp", "set"]
        );
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn test_enumerates_before_polling() {
        let mut stack = StateStack::default();
        let mut ctx = RecordingContext::ready();

        run_ticks(&mut stack, &mut ctx, Instant::now(), 5);

        assert_eq!(ctx.log, vec!["create_sensors", "fan", "temp", "set"]);
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn test_enumerate_backs_off_while_booting() {
        let mut stack = StateStack::default();
        let mut ctx = RecordingContext {
            monitoring: true,
            ..Default::default()
        };
        let start = Instant::now();

        stack.process(start, &mut ctx);
        stack.process(start + Duration::from_secs(1), &mut ctx);
        assert_eq!(ctx.log, vec!["create_sensors"]);
        assert_eq!(stack.interval(), Some(ENUMERATE_RETRY_INTERVAL));

        // Not yet five seconds since the failed attempt
        assert!(stack
            .process(start + Duration::from_secs(3), &mut ctx)
            .is_none());

        ctx.fans_ready = true;
        assert_eq!(
            stack.process(start + Duration::from_secs(6), &mut ctx),
            Some("EnumerateConnectedFans")
        );
        assert_eq!(stack.current(), Some(&PollState::PollFanSpeeds));
    }

    #[test]
    fn test_interval_gates_processing() {
        let mut stack = StateStack::default();
        let mut ctx = RecordingContext::ready();
        ctx.has_fans = true;
        let start = Instant::now();

        assert_eq!(stack.process(start, &mut ctx), Some("PollFanSpeeds"));
        assert!(stack
            .process(start + Duration::from_millis(1999), &mut ctx)
            .is_none());
        assert_eq!(
            stack.process(start + Duration::from_millis(2000), &mut ctx),
            Some("PollTempProbes")
        );
    }

    #[test]
    fn test_monitoring_disabled_suspends_and_resumes() {
        let mut stack = StateStack::default();
        let mut ctx = RecordingContext::ready();
        ctx.has_fans = true;
        let start = Instant::now();

        stack.process(start, &mut ctx);
        ctx.monitoring = false;

        // Temp state notices and pushes the guard
        stack.process(start + Duration::from_secs(2), &mut ctx);
        assert_eq!(stack.current(), Some(&PollState::MonitoringDisabled));

        // Guard tears down and holds
        stack.process(start + Duration::from_secs(7), &mut ctx);
        stack.process(start + Duration::from_secs(12), &mut ctx);
        assert_eq!(stack.current(), Some(&PollState::MonitoringDisabled));
        assert!(!ctx.has_fans);

        ctx.monitoring = true;
        stack.process(start + Duration::from_secs(17), &mut ctx);
        assert_eq!(stack.current(), Some(&PollState::enumerate()));

        stack.process(start + Duration::from_secs(18), &mut ctx);
        assert_eq!(stack.current(), Some(&PollState::PollTempProbes));
        stack.process(start + Duration::from_secs(20), &mut ctx);

        assert_eq!(
            ctx.log,
            vec![
                "fan",
                "remove_sensors",
                "remove_sensors",
                "remove_sensors",
                "create_sensors",
                "temp"
            ]
        );
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn test_temp_probes_enumerate_without_fans() {
        let mut stack = StateStack::empty();
        stack.push(PollState::PollTempProbes);
        let mut ctx = RecordingContext::ready();
        let start = Instant::now();

        assert_eq!(stack.process(start, &mut ctx), Some("PollTempProbes"));
        assert!(ctx.log.is_empty());
        assert_eq!(stack.current(), Some(&PollState::enumerate()));

        stack.process(start + Duration::from_secs(1), &mut ctx);
        assert_eq!(stack.current(), Some(&PollState::PollTempProbes));

        stack.process(start + Duration::from_secs(3), &mut ctx);
        assert_eq!(ctx.log, vec!["create_sensors", "temp"]);
    }

    #[test]
    fn test_stack_operations() {
        let mut stack = StateStack::empty();
        assert!(stack.is_empty());
        assert_eq!(stack.interval(), None);
        assert!(stack
            .process(Instant::now(), &mut RecordingContext::ready())
            .is_none());

        stack.push(PollState::PollFanSpeeds);
        stack.push(PollState::SetFanSpeeds);
        stack.replace(PollState::MonitoringDisabled);
        assert_eq!(
            stack.states(),
            &[PollState::PollFanSpeeds, PollState::MonitoringDisabled]
        );

        stack.shift();
        assert_eq!(
            stack.states(),
            &[PollState::MonitoringDisabled, PollState::PollFanSpeeds]
        );

        assert_eq!(stack.pop(), Some(PollState::PollFanSpeeds));
        assert_eq!(stack.current(), Some(&PollState::MonitoringDisabled));
    }
}
