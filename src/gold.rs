//! Total-gold estimation from summed credit payloads.
//!
//! Model selection is an offline step: every combination of candidate action
//! bytes is fitted with ordinary least squares and scored by
//! leave-one-match-out cross-validation. Decoding a replay only applies an
//! already selected [`GoldModel`].

use serde::Serialize;
use std::collections::BTreeMap;

use crate::confidence::{Confidence, ConfidenceLevel};
use crate::entity::EntityId;
use crate::events::ClassifiedEvents;
use crate::settings::GoldSettings;

/// Summed positive credit values per entity and action byte.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditLedger {
    sums: BTreeMap<EntityId, BTreeMap<u8, f64>>,
}

impl CreditLedger {
    pub fn from_events(events: &ClassifiedEvents) -> Self {
        let mut ledger = Self::default();
        for (header, value, action) in events.credits() {
            ledger.add(header.entity_id, action, f64::from(value));
        }
        ledger
    }

    pub fn add(&mut self, entity_id: EntityId, action: u8, value: f64) {
        if value <= 0.0 {
            return;
        }
        *self
            .sums
            .entry(entity_id)
            .or_default()
            .entry(action)
            .or_default() += value;
    }

    pub fn sum_for(&self, entity_id: EntityId, actions: &[u8]) -> f64 {
        self.sums.get(&entity_id).map_or(0.0, |by_action| {
            actions
                .iter()
                .filter_map(|action| by_action.get(action))
                .sum()
        })
    }

    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.sums.keys().copied()
    }
}

/// Ground-truth gold alongside the credits decoded from the same replay.
#[derive(Clone, Debug, Default)]
pub struct TrainingReplay {
    pub replay_name: String,
    pub ledger: CreditLedger,
    pub truth_gold: BTreeMap<EntityId, f64>,
}

impl TrainingReplay {
    fn samples(&self, actions: &[u8]) -> impl Iterator<Item = (f64, f64)> + '_ {
        let actions = actions.to_vec();
        self.truth_gold
            .iter()
            .map(move |(entity_id, gold)| (self.ledger.sum_for(*entity_id, &actions), *gold))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub const IDENTITY: LinearFit = LinearFit {
        slope: 1.0,
        intercept: 0.0,
    };

    /// Ordinary least squares. Falls back to the identity when fewer than two
    /// samples exist or every x is equal.
    pub fn fit(samples: &[(f64, f64)]) -> Self {
        if samples.len() < 2 {
            return Self::IDENTITY;
        }

        let count = samples.len() as f64;
        let mean_x = samples.iter().map(|(x, _)| x).sum::<f64>() / count;
        let mean_y = samples.iter().map(|(_, y)| y).sum::<f64>() / count;
        let spread_xx = samples
            .iter()
            .map(|(x, _)| (x - mean_x).powi(2))
            .sum::<f64>();
        let spread_xy = samples
            .iter()
            .map(|(x, y)| (x - mean_x) * (y - mean_y))
            .sum::<f64>();

        if spread_xx == 0.0 {
            return Self::IDENTITY;
        }

        let slope = spread_xy / spread_xx;
        Self {
            slope,
            intercept: mean_y - slope * mean_x,
        }
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum GoldModelError {
    #[error("Only {samples} training samples across {replays} replays (need {required_samples} samples and 2 replays)")]
    InsufficientTrainingSamples {
        samples: usize,
        replays: usize,
        required_samples: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldModel {
    pub actions: Vec<u8>,
    pub fit: LinearFit,
    /// Share of held-out estimates within tolerance. `None` when
    /// cross-validation was impossible.
    pub cv_accuracy: Option<f64>,
    pub cv_mean_absolute_error: Option<f64>,
    pub sample_count: usize,
    pub replay_count: usize,
    pub tolerance: f64,
    pub estimate_rounding: f64,
    pub confidence: Confidence,
    pub limitation: Option<GoldModelError>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldEstimate {
    pub value: f64,
    pub raw_value: f64,
    pub credit_sum: f64,
    /// Cross-validated accuracy of the model that produced this estimate,
    /// `None` when the model could not be cross-validated.
    pub cv_accuracy: Option<f64>,
    /// Absolute error the accuracy above is measured against.
    pub tolerance: f64,
    pub confidence: Confidence,
}

impl GoldModel {
    pub fn estimate(&self, ledger: &CreditLedger, entity_id: EntityId) -> GoldEstimate {
        let credit_sum = ledger.sum_for(entity_id, &self.actions);
        let raw_value = self.fit.predict(credit_sum);
        GoldEstimate {
            value: round_estimate(raw_value, self.estimate_rounding).max(0.0),
            raw_value,
            credit_sum,
            cv_accuracy: self.cv_accuracy,
            tolerance: self.tolerance,
            confidence: self.confidence,
        }
    }

    pub fn is_reliable(&self) -> bool {
        self.limitation.is_none()
    }
}

fn round_estimate(value: f64, rounding: f64) -> f64 {
    if rounding > 0.0 {
        (value / rounding).round() * rounding
    } else {
        value
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CrossValidation {
    pub accuracy: f64,
    pub mean_absolute_error: f64,
    /// Held-out predictions, replay by replay in training order.
    pub predictions: Vec<f64>,
}

/// Leave-one-match-out: each replay is predicted by a fit over all others.
pub(crate) fn cross_validate(
    training: &[TrainingReplay],
    actions: &[u8],
    settings: &GoldSettings,
) -> Option<CrossValidation> {
    if training.len() < 2 {
        return None;
    }

    let per_replay = training
        .iter()
        .map(|replay| replay.samples(actions).collect::<Vec<(f64, f64)>>())
        .collect::<Vec<Vec<(f64, f64)>>>();

    let mut predictions = Vec::new();
    let mut hits = 0_usize;
    let mut absolute_error = 0.0;

    for (held_out, held_out_samples) in per_replay.iter().enumerate() {
        let fitting_samples = per_replay
            .iter()
            .enumerate()
            .filter(|(position, _)| *position != held_out)
            .flat_map(|(_, samples)| samples.iter().copied())
            .collect::<Vec<(f64, f64)>>();
        let fit = LinearFit::fit(&fitting_samples);

        for (credit_sum, truth) in held_out_samples {
            let estimate = round_estimate(fit.predict(*credit_sum), settings.estimate_rounding);
            let error = (estimate - truth).abs();
            if error <= settings.tolerance {
                hits += 1;
            }
            absolute_error += error;
            predictions.push(estimate);
        }
    }

    if predictions.is_empty() {
        return None;
    }

    let total = predictions.len() as f64;
    Some(CrossValidation {
        accuracy: hits as f64 / total,
        mean_absolute_error: absolute_error / total,
        predictions,
    })
}

fn training_mean_absolute_error(samples: &[(f64, f64)], fit: &LinearFit) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples
        .iter()
        .map(|(x, y)| (fit.predict(*x) - y).abs())
        .sum::<f64>()
        / samples.len() as f64
}

/// Every combination of `candidates` with 1..=`max_size` elements, smaller
/// combinations first.
pub fn action_combinations(candidates: &[u8], max_size: usize) -> Vec<Vec<u8>> {
    let mut sorted = candidates.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut combinations = Vec::new();
    for size in 1..=max_size.min(sorted.len()) {
        let mut indices = (0..size).collect::<Vec<usize>>();
        loop {
            combinations.push(indices.iter().map(|index| sorted[*index]).collect());

            let last_start = sorted.len() - size;
            let Some(pivot) = (0..size)
                .rev()
                .find(|position| indices[*position] != position + last_start)
            else {
                break;
            };
            indices[pivot] += 1;
            for position in pivot + 1..size {
                indices[position] = indices[position - 1] + 1;
            }
        }
    }
    combinations
}

/// Fits and scores one action combination.
pub fn evaluate_combination(
    training: &[TrainingReplay],
    actions: &[u8],
    settings: &GoldSettings,
) -> GoldModel {
    let samples = training
        .iter()
        .flat_map(|replay| replay.samples(actions))
        .collect::<Vec<(f64, f64)>>();
    let fit = LinearFit::fit(&samples);
    let cross_validation = cross_validate(training, actions, settings);

    let limitation = (samples.len() < settings.min_training_samples || training.len() < 2)
        .then_some(GoldModelError::InsufficientTrainingSamples {
            samples: samples.len(),
            replays: training.len(),
            required_samples: settings.min_training_samples,
        });

    let mut confidence = match &cross_validation {
        Some(cross_validation) => Confidence::inferred(cross_validation.accuracy),
        None => Confidence::inferred(0.0),
    };
    if limitation.is_some() {
        confidence = confidence.capped_at(ConfidenceLevel::Low);
    }

    GoldModel {
        actions: actions.to_vec(),
        fit,
        cv_accuracy: cross_validation.as_ref().map(|result| result.accuracy),
        cv_mean_absolute_error: cross_validation
            .as_ref()
            .map(|result| result.mean_absolute_error),
        sample_count: samples.len(),
        replay_count: training.len(),
        tolerance: settings.tolerance,
        estimate_rounding: settings.estimate_rounding,
        confidence,
        limitation,
    }
}

/// Ranking key: higher CV accuracy, then fewer actions, then lower error.
/// Without CV the training error stands in so a model is still chosen.
fn is_better(candidate: &GoldModel, incumbent: &GoldModel, training: &[TrainingReplay]) -> bool {
    let candidate_accuracy = candidate.cv_accuracy.unwrap_or(0.0);
    let incumbent_accuracy = incumbent.cv_accuracy.unwrap_or(0.0);
    if candidate_accuracy != incumbent_accuracy {
        return candidate_accuracy > incumbent_accuracy;
    }
    if candidate.actions.len() != incumbent.actions.len() {
        return candidate.actions.len() < incumbent.actions.len();
    }
    ranking_error(candidate, training) < ranking_error(incumbent, training)
}

fn ranking_error(model: &GoldModel, training: &[TrainingReplay]) -> f64 {
    model.cv_mean_absolute_error.unwrap_or_else(|| {
        let samples = training
            .iter()
            .flat_map(|replay| replay.samples(&model.actions))
            .collect::<Vec<(f64, f64)>>();
        training_mean_absolute_error(&samples, &model.fit)
    })
}

/// Evaluates every candidate combination in enumeration order.
pub fn search_models(training: &[TrainingReplay], settings: &GoldSettings) -> Vec<GoldModel> {
    action_combinations(&settings.candidate_actions, settings.max_combination_size)
        .iter()
        .map(|actions| evaluate_combination(training, actions, settings))
        .collect()
}

fn best_of<'a>(models: &'a [GoldModel], training: &[TrainingReplay]) -> Option<&'a GoldModel> {
    models.iter().fold(None, |best, candidate| match best {
        Some(incumbent) if !is_better(candidate, incumbent, training) => Some(incumbent),
        _ => Some(candidate),
    })
}

pub fn select_model(training: &[TrainingReplay], settings: &GoldSettings) -> Option<GoldModel> {
    let models = search_models(training, settings);
    let selected = best_of(&models, training).cloned();

    if let Some(model) = &selected {
        log_selection(model);
    }
    selected
}

fn log_selection(model: &GoldModel) {
    match &model.limitation {
        Some(limitation) => tracing::warn!(
            actions = ?model.actions,
            error = %limitation,
            "Selected gold model from insufficient training data"
        ),
        None => tracing::info!(
            actions = ?model.actions,
            cv_accuracy = model.cv_accuracy.unwrap_or_default(),
            slope = model.fit.slope,
            intercept = model.fit.intercept,
            "Selected gold model"
        ),
    }
}

/// Fitted models keyed by action combination, plus the best one seen so far.
#[derive(Clone, Debug, Default)]
pub struct GoldModelRegistry {
    models: BTreeMap<Vec<u8>, GoldModel>,
    best: Option<Vec<u8>>,
}

impl GoldModelRegistry {
    /// Runs the full search and caches every evaluated model.
    pub fn search(
        &mut self,
        training: &[TrainingReplay],
        settings: &GoldSettings,
    ) -> Option<&GoldModel> {
        let models = search_models(training, settings);
        let best_actions = best_of(&models, training).map(|model| model.actions.clone());

        for model in models {
            self.models.insert(model.actions.clone(), model);
        }
        self.best = best_actions;

        let best = self.best_known();
        if let Some(model) = best {
            log_selection(model);
        }
        best
    }

    pub fn insert(&mut self, model: GoldModel) {
        let replaces_best = self.best_known().map_or(true, |best| {
            model.cv_accuracy.unwrap_or(0.0) > best.cv_accuracy.unwrap_or(0.0)
        });
        if replaces_best {
            self.best = Some(model.actions.clone());
        }
        self.models.insert(model.actions.clone(), model);
    }

    pub fn get(&self, actions: &[u8]) -> Option<&GoldModel> {
        let mut key = actions.to_vec();
        key.sort_unstable();
        self.models.get(&key)
    }

    pub fn best_known(&self) -> Option<&GoldModel> {
        self.best.as_ref().and_then(|actions| self.models.get(actions))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
