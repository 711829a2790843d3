use reflex_core::{Outcome, TrialResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Append-only record of classified trials, in presentation order.
///
/// Only the state machine appends; everyone else gets a shared reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultLog {
    results: Vec<TrialResult>,
}

/// Aggregates over a finished (or partial) session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub trials: usize,
    pub successes: usize,
    pub responses: usize,
    /// Share of trials with any response, in percent.
    pub response_rate: f64,
    /// Mean accuracy over successful trials.
    pub mean_accuracy: Option<f64>,
    pub mean_response_time: Option<f64>,
    pub min_response_time: Option<f64>,
    pub max_response_time: Option<f64>,
    pub outcomes: BTreeMap<String, usize>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, result: TrialResult) {
        self.results.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn last(&self) -> Option<&TrialResult> {
        self.results.last()
    }

    pub fn as_slice(&self) -> &[TrialResult] {
        &self.results
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrialResult> {
        self.results.iter()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn summary(&self) -> SessionSummary {
        if self.results.is_empty() {
            return SessionSummary::default();
        }

        let times: Vec<f64> = self
            .results
            .iter()
            .filter(|r| r.responded())
            .map(|r| r.response_time)
            .collect();
        let accuracies: Vec<f64> = self
            .results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.accuracy)
            .collect();

        let mean = |xs: &[f64]| (!xs.is_empty()).then(|| xs.iter().sum::<f64>() / xs.len() as f64);

        let outcomes = Outcome::ALL
            .iter()
            .map(|o| (o.as_str().to_string(), self.count(*o)))
            .filter(|(_, n)| *n > 0)
            .collect();

        SessionSummary {
            trials: self.results.len(),
            successes: accuracies.len(),
            responses: times.len(),
            response_rate: times.len() as f64 / self.results.len() as f64 * 100.0,
            mean_accuracy: mean(&accuracies),
            mean_response_time: mean(&times),
            min_response_time: times.iter().copied().reduce(f64::min),
            max_response_time: times.iter().copied().reduce(f64::max),
            outcomes,
        }
    }
}

impl<'a> IntoIterator for &'a ResultLog {
    type Item = &'a TrialResult;
    type IntoIter = std::slice::Iter<'a, TrialResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflex_core::{StimulusKind, Trial};

    fn result(index: usize, response_time: f64, outcome: Outcome, accuracy: f64) -> TrialResult {
        TrialResult {
            trial: Trial {
                index,
                delay: 0.0,
                duration: 1.0,
                position: (0.0, 0.0),
                kind: StimulusKind::Normal,
            },
            response_time,
            outcome,
            success: outcome == Outcome::Correct,
            accuracy,
            timestamp_ns: index as u64,
        }
    }

    #[test]
    fn empty_summary() {
        assert_eq!(ResultLog::new().summary(), SessionSummary::default());
    }

    #[test]
    fn summary_over_mixed_outcomes() {
        let mut log = ResultLog::new();
        log.push(result(0, 0.2, Outcome::Correct, 0.8));
        log.push(result(1, 0.0, Outcome::Timeout, 0.0));
        log.push(result(2, 0.05, Outcome::Guess, 0.0));
        log.push(result(3, 0.4, Outcome::Correct, 0.6));

        let summary = log.summary();
        assert_eq!(summary.trials, 4);
        assert_eq!(summary.successes, 2);
        assert_eq!(summary.responses, 3);
        assert!((summary.response_rate - 75.0).abs() < 1e-9);
        assert!((summary.mean_accuracy.unwrap() - 0.7).abs() < 1e-9);
        assert_eq!(summary.min_response_time, Some(0.05));
        assert_eq!(summary.max_response_time, Some(0.4));
        assert_eq!(summary.outcomes.get("CORRECT"), Some(&2));
        assert_eq!(summary.outcomes.get("SLOW"), None);
    }

    #[test]
    fn preserves_insertion_order() {
        let mut log = ResultLog::new();
        for i in 0..5 {
            log.push(result(i, 0.0, Outcome::Timeout, 0.0));
        }
        let order: Vec<usize> = log.iter().map(|r| r.trial.index).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
        assert_eq!(log.last().map(|r| r.trial.index), Some(4));
    }
}
