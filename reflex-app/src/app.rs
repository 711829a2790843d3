use anyhow::{Context, Result};
use colored::Colorize;
use rand::SeedableRng;
use rand::rngs::StdRng;
use reflex_core::{FeedbackCategory, StimulusKind};
use reflex_experiment::config::FINISHED;
use reflex_experiment::{SessionConfig, SessionEvent, SessionReport, SessionStateMachine, Signal};
use reflex_timing::{HighPrecisionTimer, ManualTimer, Timer, ns_to_secs, secs_to_ns};
use std::fs::File;
use std::io::{self, BufRead, BufWriter};
use std::path::Path;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::participant::Participant;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Terminal host for one session: feeds events into the state machine and
/// presents the signals it emits.
pub struct App<T: Timer<Timestamp = u64>> {
    experiment: SessionStateMachine<T, StdRng>,
}

impl<T: Timer<Timestamp = u64>> App<T> {
    pub fn new(config: SessionConfig, timer: T, seed: Option<u64>) -> Result<Self> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let experiment = SessionStateMachine::new(config, timer, rng)?;
        Ok(Self { experiment })
    }

    fn present(&self, signal: &Signal) {
        match signal {
            Signal::StimulusShown {
                trial,
                position,
                kind,
            } => {
                let marker = match kind {
                    StimulusKind::Normal => "■".white().bold(),
                    StimulusKind::Distractor => "■".red().bold(),
                };
                let (n, total) = self.experiment.trial_progress();
                println!(
                    "[{n}/{total}] {marker} trial {trial} at ({:.0}, {:.0})",
                    position.0, position.1
                );
            }
            Signal::StimulusHidden { trial } => {
                tracing::debug!(trial, "stimulus hidden");
            }
            Signal::Feedback {
                label, category, ..
            } => {
                let text = match category {
                    FeedbackCategory::Good => label.green(),
                    FeedbackCategory::Bad => label.red(),
                };
                println!("        {text}");
            }
            Signal::SessionFinished => println!("\n{}", FINISHED.bold()),
        }
    }

    fn flush_signals(&mut self) {
        for signal in self.experiment.drain_signals() {
            self.present(&signal);
        }
    }

    fn pump(&mut self) -> Result<()> {
        for event in self.experiment.update() {
            self.experiment.handle_event(event)?;
        }
        Ok(())
    }

    pub fn report(&self) -> SessionReport {
        self.experiment.report()
    }

    pub fn print_summary(&self) {
        let summary = self.experiment.results().summary();
        println!("Session Results:");
        println!(
            "Trials: {}, Successes: {}, Response rate: {:.1}%",
            summary.trials, summary.successes, summary.response_rate
        );
        if let Some(acc) = summary.mean_accuracy {
            println!("Mean accuracy: {:.3}", acc);
        }
        if let (Some(mean), Some(min), Some(max)) = (
            summary.mean_response_time,
            summary.min_response_time,
            summary.max_response_time,
        ) {
            println!(
                "Response times: mean {:.3} ms, min {:.3} ms, max {:.3} ms",
                mean * 1e3,
                min * 1e3,
                max * 1e3
            );
        }
        for (outcome, count) in &summary.outcomes {
            println!("  {outcome:<8} {count}");
        }
    }

    pub fn save_report(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("cannot create result file {}", path.display()))?;
        self.report()
            .write_json(BufWriter::new(file))
            .with_context(|| format!("failed to write results to {}", path.display()))?;
        println!("Results saved to {}", path.display());
        Ok(())
    }
}

impl App<ManualTimer> {
    /// Plays the whole session against `participant`, jumping the clock from
    /// one deadline or planned response to the next.
    pub fn run_simulated(&mut self, participant: &mut Participant) -> Result<()> {
        let clock = self.experiment.timer.clone();
        println!("{}\n", self.experiment.config().instructions());
        self.experiment.start()?;

        let mut planned: Option<u64> = None;
        loop {
            for signal in self.experiment.drain_signals() {
                match &signal {
                    Signal::StimulusShown { kind, .. } => {
                        planned = participant
                            .plan(*kind)
                            .map(|rt| clock.now() + secs_to_ns(rt));
                    }
                    Signal::Feedback { .. } => planned = None,
                    _ => {}
                }
                self.present(&signal);
            }
            if self.experiment.is_finished() {
                break;
            }

            let deadline = self
                .experiment
                .next_deadline()
                .context("session stalled without a pending deadline")?;
            match planned.take() {
                Some(at) if at < deadline => {
                    clock.set(at);
                    self.experiment.handle_event(SessionEvent::ResponseNow)?;
                }
                _ => {
                    clock.set(deadline);
                    self.pump()?;
                }
            }
        }
        Ok(())
    }
}

impl App<HighPrecisionTimer> {
    /// Runs the session in real time. Every line on stdin (ENTER) is one
    /// response, stamped when it arrives.
    pub fn run_interactive(&mut self) -> Result<()> {
        let (tx, rx) = mpsc::channel::<u64>();
        let stamp = self.experiment.timer.clone();
        std::thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                if line.is_err() || tx.send(stamp.now()).is_err() {
                    break;
                }
            }
        });

        println!("{}", self.experiment.config().instructions());
        println!("(press ENTER to respond)\n");
        self.experiment.start()?;

        while !self.experiment.is_finished() {
            let frame_start = Instant::now();

            while let Ok(pressed_at) = rx.try_recv() {
                self.respond_at(pressed_at)?;
            }
            self.pump()?;
            self.flush_signals();

            self.experiment.timer.sleep(POLL_INTERVAL);
            self.experiment.timer.record_frame(frame_start.elapsed());
        }
        self.flush_signals();

        let stats = self.experiment.timer.calibration_stats();
        tracing::info!(
            loops = self.experiment.timer.frame_count(),
            avg_ms = stats.average_frame_time_ns / 1e6,
            jitter_ms = stats.jitter_ns / 1e6,
            max_ms = stats.max_frame_time_ns / 1e6,
            "polling loop timing"
        );
        Ok(())
    }

    fn respond_at(&mut self, pressed_at: u64) -> Result<()> {
        let onset = self
            .experiment
            .current_timestamps()
            .and_then(|t| t.stimulus_start);
        match onset {
            Some(onset) if self.experiment.is_awaiting_input() && pressed_at >= onset => {
                let time = ns_to_secs((pressed_at - onset).max(1));
                self.experiment
                    .handle_event(SessionEvent::Response { time })?;
            }
            _ => tracing::debug!(pressed_at, "response outside the input window ignored"),
        }
        Ok(())
    }
}
