use super::config::SessionConfig;
use super::log::ResultLog;
use super::report::SessionReport;
use super::trial::TrialTimestamps;
use rand::Rng;
use reflex_core::{
    FeedbackCategory, Outcome, SequencerState, SessionError, StimulusKind, Trial, TrialResult,
};
use reflex_timing::{Timer, ns_to_secs, secs_to_ns};

/// Identifies one scheduled wakeup. A token is retired as soon as the
/// deadline it guards is consumed or cancelled, so late deliveries are inert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WakeToken(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The pre-stimulus delay is over.
    DelayElapsed(WakeToken),
    /// The input window closed without a response.
    WindowElapsed(WakeToken),
    /// The participant responded `time` seconds after the window opened.
    Response { time: f64 },
    /// The participant responded just now, as measured by the session timer.
    ResponseNow,
}

/// Output for the presentation layer, drained with
/// [`SessionStateMachine::drain_signals`].
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    StimulusShown {
        trial: usize,
        position: (f32, f32),
        kind: StimulusKind,
    },
    StimulusHidden {
        trial: usize,
    },
    Feedback {
        trial: usize,
        outcome: Outcome,
        category: FeedbackCategory,
        label: &'static str,
    },
    SessionFinished,
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    token: WakeToken,
    at_ns: u64,
}

#[derive(Debug, Clone)]
struct ActiveTrial {
    trial: Trial,
    timestamps: TrialTimestamps<u64>,
    deadline: Option<Deadline>,
}

/// Drives a session one trial at a time.
///
/// The host calls [`update`](Self::update) from its loop, feeds the returned
/// events and any participant responses to
/// [`handle_event`](Self::handle_event), and presents the signals it drains.
/// Nothing here blocks.
pub struct SessionStateMachine<T, R>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    pub timer: T,
    rng: R,
    config: SessionConfig,
    state: SequencerState,
    current: Option<ActiveTrial>,
    next_index: usize,
    next_token: u64,
    results: ResultLog,
    signals: Vec<Signal>,
    finish_signalled: bool,
}

impl<T, R> SessionStateMachine<T, R>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    pub fn new(config: SessionConfig, timer: T, rng: R) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            timer,
            rng,
            config,
            state: SequencerState::Idle,
            current: None,
            next_index: 0,
            next_token: 0,
            results: ResultLog::new(),
            signals: Vec::new(),
            finish_signalled: false,
        })
    }

    /// Leaves `Idle` and schedules the first trial.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state != SequencerState::Idle {
            return Err(SessionError::AlreadyStarted);
        }
        tracing::info!(trials = self.config.trials.len(), "session started");
        self.start_trial();
        Ok(())
    }

    /// Reports deadlines that have passed. Events carry the token of the
    /// deadline they fire, so handing the same event in twice is harmless.
    pub fn update(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let now_ns = self.timer.now();

        if let Some(deadline) = self.current.as_ref().and_then(|t| t.deadline) {
            if now_ns >= deadline.at_ns {
                match self.state {
                    SequencerState::PresentingDelay => {
                        events.push(SessionEvent::DelayElapsed(deadline.token))
                    }
                    SequencerState::InputWindowOpen => {
                        events.push(SessionEvent::WindowElapsed(deadline.token))
                    }
                    _ => {}
                }
            }
        }

        events
    }

    /// Applies one event. `Ok(false)` means the event was ignored: a stale
    /// deadline, or a response while no input window is open. A response
    /// landing at or after the window deadline counts as no response, even
    /// when `update()` has not reported the timeout yet.
    pub fn handle_event(&mut self, event: SessionEvent) -> Result<bool, SessionError> {
        match (self.state, &event) {
            (SequencerState::PresentingDelay, SessionEvent::DelayElapsed(token))
                if self.is_live(*token) =>
            {
                self.open_window();
                Ok(true)
            }

            (SequencerState::InputWindowOpen, SessionEvent::WindowElapsed(token))
                if self.is_live(*token) =>
            {
                self.complete_current_trial(0.0, self.timer.now())?;
                Ok(true)
            }

            (SequencerState::InputWindowOpen, SessionEvent::Response { time })
                if time.is_finite() && *time > 0.0 =>
            {
                let at_ns = self.stimulus_start().saturating_add(secs_to_ns(*time));
                self.respond(*time, at_ns)?;
                Ok(true)
            }

            (SequencerState::InputWindowOpen, SessionEvent::ResponseNow) => {
                let now_ns = self.timer.now();
                // A response on the very tick the window opened still counts.
                let elapsed_ns = now_ns.saturating_sub(self.stimulus_start()).max(1);
                self.respond(ns_to_secs(elapsed_ns), now_ns)?;
                Ok(true)
            }

            (state, event) => {
                tracing::debug!(%state, ?event, "event ignored");
                Ok(false)
            }
        }
    }

    /// Takes every signal emitted since the last call.
    pub fn drain_signals(&mut self) -> Vec<Signal> {
        std::mem::take(&mut self.signals)
    }

    fn is_live(&self, token: WakeToken) -> bool {
        self.current
            .as_ref()
            .and_then(|t| t.deadline)
            .is_some_and(|d| d.token == token)
    }

    fn schedule(&mut self, after_secs: f64) -> Deadline {
        let token = WakeToken(self.next_token);
        self.next_token += 1;
        Deadline {
            token,
            at_ns: self.timer.now().saturating_add(secs_to_ns(after_secs)),
        }
    }

    fn stimulus_start(&self) -> u64 {
        self.current
            .as_ref()
            .and_then(|t| t.timestamps.stimulus_start)
            .unwrap_or_else(|| self.timer.now())
    }

    /// Resolves the next declared trial and schedules its onset, or finishes
    /// the session when the sequence is exhausted.
    fn start_trial(&mut self) {
        let has_more = self.next_index < self.config.trials.len();
        let next = self
            .state
            .next(has_more)
            .unwrap_or(SequencerState::Finished);

        if next == SequencerState::Finished {
            self.finish();
            return;
        }

        let index = self.next_index;
        let trial = self.config.trials[index].resolve(index, &self.config, &mut self.rng);
        let deadline = self.schedule(trial.delay);
        let now_ns = self.timer.now();

        tracing::info!(
            trial = index,
            delay = trial.delay,
            duration = trial.duration,
            kind = %trial.kind,
            "trial started"
        );

        self.current = Some(ActiveTrial {
            trial,
            timestamps: TrialTimestamps {
                start: now_ns,
                stimulus_start: None,
            },
            deadline: Some(deadline),
        });
        self.state = next;
    }

    /// Shows the stimulus and starts listening for a response.
    fn open_window(&mut self) {
        let Some(window) = self
            .current
            .as_ref()
            .map(|t| self.config.input_window(t.trial.duration))
        else {
            return;
        };
        let deadline = self.schedule(window);
        let now_ns = self.timer.now();

        if let Some(active) = &mut self.current {
            active.timestamps.stimulus_start = Some(now_ns);
            active.deadline = Some(deadline);
            self.signals.push(Signal::StimulusShown {
                trial: active.trial.index,
                position: active.trial.position,
                kind: active.trial.effective_kind(self.config.include_distractor),
            });
            tracing::debug!(trial = active.trial.index, window, "input window opened");
        }
        self.state = SequencerState::InputWindowOpen;
    }

    /// Records a response `response_time` seconds after onset, read at
    /// `at_ns`. The window closes at its deadline, so anything later is a
    /// miss stamped with the deadline itself.
    fn respond(&mut self, response_time: f64, at_ns: u64) -> Result<(), SessionError> {
        match self.next_deadline() {
            Some(deadline) if at_ns >= deadline => {
                tracing::debug!(response_time, "response after the window closed");
                self.complete_current_trial(0.0, deadline)
            }
            _ => self.complete_current_trial(response_time, at_ns),
        }
    }

    /// Classifies the current trial, logs the result and moves on. On a
    /// classifier error the trial stays active with its deadline armed.
    fn complete_current_trial(
        &mut self,
        response_time: f64,
        timestamp_ns: u64,
    ) -> Result<(), SessionError> {
        let Some(active) = self.current.as_ref() else {
            return Ok(());
        };
        let kind = active.trial.effective_kind(self.config.include_distractor);
        let classification = self
            .config
            .params()
            .classify(active.trial.duration, kind, response_time)
            .inspect_err(|err| tracing::error!(trial = active.trial.index, "{err}"))?;

        // Dropping the active trial retires its deadline and cancels the
        // pending timeout.
        let Some(ActiveTrial { trial, .. }) = self.current.take() else {
            return Ok(());
        };
        self.state = SequencerState::Classifying;

        tracing::info!(
            trial = trial.index,
            response_time,
            outcome = %classification.outcome,
            accuracy = classification.accuracy,
            "trial classified"
        );

        self.signals.push(Signal::StimulusHidden { trial: trial.index });
        self.signals.push(Signal::Feedback {
            trial: trial.index,
            outcome: classification.outcome,
            category: classification.outcome.category(),
            label: classification.outcome.label(),
        });
        self.results.push(TrialResult {
            trial,
            response_time,
            outcome: classification.outcome,
            success: classification.success,
            accuracy: classification.accuracy,
            timestamp_ns,
        });

        self.next_index += 1;
        self.start_trial();
        Ok(())
    }

    fn finish(&mut self) {
        self.current = None;
        self.state = SequencerState::Finished;
        if !self.finish_signalled {
            self.finish_signalled = true;
            self.signals.push(Signal::SessionFinished);
            tracing::info!(trials = self.results.len(), "session finished");
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    pub fn is_awaiting_input(&self) -> bool {
        self.state.allows_input()
    }

    pub fn current_trial(&self) -> Option<&Trial> {
        self.current.as_ref().map(|t| &t.trial)
    }

    pub fn current_timestamps(&self) -> Option<&TrialTimestamps<u64>> {
        self.current.as_ref().map(|t| &t.timestamps)
    }

    /// The visible stimulus, if the input window is open.
    pub fn current_stimulus(&self) -> Option<(StimulusKind, (f32, f32))> {
        if !self.state.allows_input() {
            return None;
        }
        self.current
            .as_ref()
            .map(|t| {
                let kind = t.trial.effective_kind(self.config.include_distractor);
                (kind, t.trial.position)
            })
    }

    /// Timer reading at which the next deadline falls due.
    pub fn next_deadline(&self) -> Option<u64> {
        self.current
            .as_ref()
            .and_then(|t| t.deadline)
            .map(|d| d.at_ns)
    }

    /// Experiment results
    pub fn results(&self) -> &ResultLog {
        &self.results
    }

    /// `(current trial number, total)`, counting from one.
    pub fn trial_progress(&self) -> (usize, usize) {
        let total = self.config.trials.len();
        ((self.next_index + 1).min(total), total)
    }

    pub fn report(&self) -> SessionReport {
        SessionReport::new(&self.config, &self.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::TrialSpec;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use reflex_timing::ManualTimer;

    fn machine(config: SessionConfig) -> (SessionStateMachine<ManualTimer, StdRng>, ManualTimer) {
        let timer = ManualTimer::new();
        let sm = SessionStateMachine::new(config, timer.clone(), StdRng::seed_from_u64(5))
            .expect("valid session");
        (sm, timer)
    }

    fn one_trial(delay: f64, duration: f64) -> SessionConfig {
        SessionConfig {
            trials: vec![TrialSpec {
                delay: Some(delay),
                duration: Some(duration),
                ..TrialSpec::default()
            }],
            ..SessionConfig::default()
        }
    }

    fn pump(sm: &mut SessionStateMachine<ManualTimer, StdRng>) -> usize {
        let mut handled = 0;
        for event in sm.update() {
            if sm.handle_event(event).unwrap() {
                handled += 1;
            }
        }
        handled
    }

    #[test]
    fn delay_then_window_then_timeout() {
        let (mut sm, clock) = machine(one_trial(0.5, 1.0));
        sm.start().unwrap();
        assert_eq!(sm.state(), SequencerState::PresentingDelay);

        clock.advance_secs(0.499);
        assert_eq!(pump(&mut sm), 0);
        assert_eq!(sm.state(), SequencerState::PresentingDelay);

        clock.advance_secs(0.001);
        assert_eq!(pump(&mut sm), 1);
        assert_eq!(sm.state(), SequencerState::InputWindowOpen);
        assert_eq!(
            sm.drain_signals(),
            vec![Signal::StimulusShown {
                trial: 0,
                position: (0.0, 0.0),
                kind: StimulusKind::Normal,
            }]
        );

        clock.advance_secs(1.0);
        assert_eq!(pump(&mut sm), 1);
        assert!(sm.is_finished());
        let result = sm.results().last().unwrap();
        assert_eq!(result.outcome, Outcome::Timeout);
        assert_eq!(result.response_time, 0.0);
    }

    #[test]
    fn response_cancels_the_pending_timeout() {
        let (mut sm, clock) = machine(SessionConfig {
            trials: vec![TrialSpec::default(), TrialSpec::default()],
            generated_duration: 1.0,
            ..SessionConfig::default()
        });
        sm.start().unwrap();
        pump(&mut sm);
        assert!(sm.is_awaiting_input());

        // Grab the window timeout before responding, then deliver it late.
        clock.advance_secs(1.0);
        let stale = sm.update();
        assert!(matches!(stale.as_slice(), [SessionEvent::WindowElapsed(_)]));

        assert!(sm.handle_event(SessionEvent::Response { time: 0.4 }).unwrap());
        assert_eq!(sm.results().len(), 1);
        assert_eq!(sm.results().last().unwrap().outcome, Outcome::Correct);

        // Trial 1 is now presenting; the old timeout must not touch it.
        for event in stale {
            assert!(!sm.handle_event(event).unwrap());
        }
        assert_eq!(sm.results().len(), 1);
        assert_eq!(sm.current_trial().map(|t| t.index), Some(1));
    }

    #[test]
    fn responses_outside_the_window_are_ignored() {
        let (mut sm, _clock) = machine(one_trial(0.5, 1.0));
        assert!(!sm.handle_event(SessionEvent::ResponseNow).unwrap());
        sm.start().unwrap();
        assert!(!sm.handle_event(SessionEvent::ResponseNow).unwrap());
        assert!(!sm.handle_event(SessionEvent::Response { time: 0.2 }).unwrap());
        assert!(sm.results().is_empty());
        assert_eq!(sm.state(), SequencerState::PresentingDelay);
    }

    #[test]
    fn non_positive_response_times_are_ignored() {
        let (mut sm, clock) = machine(one_trial(0.0, 1.0));
        sm.start().unwrap();
        clock.advance_secs(0.0);
        pump(&mut sm);
        assert!(sm.is_awaiting_input());
        assert!(!sm.handle_event(SessionEvent::Response { time: 0.0 }).unwrap());
        assert!(!sm.handle_event(SessionEvent::Response { time: -1.0 }).unwrap());
        assert!(!sm.handle_event(SessionEvent::Response { time: f64::NAN }).unwrap());
        assert!(sm.is_awaiting_input());
    }

    #[test]
    fn response_now_measures_from_onset() {
        let (mut sm, clock) = machine(one_trial(0.25, 1.0));
        sm.start().unwrap();
        clock.advance_secs(0.25);
        pump(&mut sm);
        clock.advance_secs(0.2);
        assert!(sm.handle_event(SessionEvent::ResponseNow).unwrap());

        let result = sm.results().last().unwrap();
        assert!((result.response_time - 0.2).abs() < 1e-9);
        assert!((result.accuracy - 0.8).abs() < 1e-9);
        assert_eq!(result.timestamp_ns, secs_to_ns(0.45));
    }

    fn open_window_at_zero(
        duration: f64,
    ) -> (SessionStateMachine<ManualTimer, StdRng>, ManualTimer) {
        let (mut sm, clock) = machine(one_trial(0.0, duration));
        sm.start().unwrap();
        pump(&mut sm);
        assert!(sm.is_awaiting_input());
        (sm, clock)
    }

    #[test]
    fn response_at_the_deadline_is_a_timeout() {
        let (mut sm, _clock) = open_window_at_zero(1.0);
        assert!(sm.handle_event(SessionEvent::Response { time: 1.0 }).unwrap());

        let result = sm.results().last().unwrap();
        assert_eq!(result.outcome, Outcome::Timeout);
        assert_eq!(result.response_time, 0.0);
        assert_eq!(result.accuracy, 0.0);
        assert_eq!(result.timestamp_ns, secs_to_ns(1.0));
    }

    #[test]
    fn response_longer_than_the_window_is_a_timeout() {
        let (mut sm, _clock) = open_window_at_zero(1.0);
        assert!(sm.handle_event(SessionEvent::Response { time: 1.5 }).unwrap());

        let result = sm.results().last().unwrap();
        assert_eq!(result.outcome, Outcome::Timeout);
        assert!(!result.success);
        assert_eq!(result.accuracy, 0.0);
        assert_eq!(result.timestamp_ns, secs_to_ns(1.0));
        assert!(sm.is_finished());
    }

    #[test]
    fn late_response_now_before_update_is_a_timeout() {
        let (mut sm, clock) = open_window_at_zero(1.0);
        clock.advance_secs(3.0);
        assert!(sm.handle_event(SessionEvent::ResponseNow).unwrap());

        let result = sm.results().last().unwrap();
        assert_eq!(result.outcome, Outcome::Timeout);
        assert_eq!(result.response_time, 0.0);
        assert_eq!(result.accuracy, 0.0);
        assert_eq!(result.timestamp_ns, secs_to_ns(1.0));

        // The timeout was consumed by the late response.
        assert_eq!(pump(&mut sm), 0);
        assert_eq!(sm.results().len(), 1);
    }

    #[test]
    fn response_just_inside_the_window_still_counts() {
        let (mut sm, clock) = open_window_at_zero(1.0);
        clock.advance_secs(0.999);
        assert!(sm.handle_event(SessionEvent::ResponseNow).unwrap());

        let result = sm.results().last().unwrap();
        assert_eq!(result.outcome, Outcome::Correct);
        assert!(result.accuracy > 0.0);
    }

    #[test]
    fn classifier_error_keeps_the_trial_active() {
        let (mut sm, clock) = open_window_at_zero(1.0);
        // Only reachable by bypassing validation: a non-finite accuracy span.
        sm.config.guess_time_limit = f64::NEG_INFINITY;

        let err = sm
            .handle_event(SessionEvent::Response { time: 0.5 })
            .unwrap_err();
        assert!(matches!(err, SessionError::Classify(_)));
        assert_eq!(sm.state(), SequencerState::InputWindowOpen);
        assert_eq!(sm.current_trial().map(|t| t.index), Some(0));
        assert!(sm.results().is_empty());

        // The armed timeout still closes the trial.
        clock.advance_secs(1.0);
        assert_eq!(pump(&mut sm), 1);
        assert_eq!(sm.results().last().unwrap().outcome, Outcome::Timeout);
        assert!(sm.is_finished());
    }

    #[test]
    fn empty_session_finishes_once() {
        let (mut sm, _clock) = machine(SessionConfig::default());
        sm.start().unwrap();
        assert!(sm.is_finished());
        assert_eq!(sm.drain_signals(), vec![Signal::SessionFinished]);
        assert!(pump(&mut sm) == 0);
        assert!(sm.drain_signals().is_empty());
        assert!(matches!(sm.start(), Err(SessionError::AlreadyStarted)));
    }

    #[test]
    fn zero_duration_window_uses_response_limit() {
        let (mut sm, clock) = machine(SessionConfig {
            response_time_limit: 0.6,
            trials: vec![TrialSpec::default()],
            ..SessionConfig::default()
        });
        sm.start().unwrap();
        pump(&mut sm);
        assert!(sm.is_awaiting_input());
        clock.advance_secs(0.59);
        assert_eq!(pump(&mut sm), 0);
        clock.advance_secs(0.01);
        assert_eq!(pump(&mut sm), 1);
        assert_eq!(sm.results().last().unwrap().outcome, Outcome::Timeout);
    }

    #[test]
    fn progress_counts_from_one() {
        let (mut sm, _clock) = machine(SessionConfig {
            trials: vec![TrialSpec::default(); 3],
            generated_duration: 1.0,
            ..SessionConfig::default()
        });
        assert_eq!(sm.trial_progress(), (1, 3));
        sm.start().unwrap();
        pump(&mut sm);
        sm.handle_event(SessionEvent::Response { time: 0.3 }).unwrap();
        assert_eq!(sm.trial_progress(), (2, 3));
    }
}
