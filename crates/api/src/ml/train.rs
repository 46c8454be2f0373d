use rand::{Rng, seq::SliceRandom};
use serde::Deserialize;

use super::adam::{Adam, AdamConfig};
use super::model::{HIDDEN_SIZE, Model, relu, sigmoid};
use super::store::ModelStore;
use crate::error::{EngineError, Result};

/// Hyperparameters accepted by `/train`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    /// Visit batches in a fresh random order every epoch.
    #[serde(default)]
    pub shuffle: bool,
}

impl TrainConfig {
    pub fn new(epochs: usize, batch_size: usize) -> Self {
        Self {
            epochs,
            batch_size,
            shuffle: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(EngineError::InvalidTrainingInput(
                "epochs must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(EngineError::InvalidTrainingInput(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub model: Model,
    /// Mean batch loss of the last epoch.
    pub final_loss: f32,
}

pub fn train(features: &[Vec<f32>], labels: &[f32], cfg: &TrainConfig) -> Result<TrainOutcome> {
    train_with_rng(features, labels, cfg, &mut rand::thread_rng())
}

pub fn train_with_rng<R: Rng + ?Sized>(
    features: &[Vec<f32>],
    labels: &[f32],
    cfg: &TrainConfig,
    rng: &mut R,
) -> Result<TrainOutcome> {
    cfg.validate()?;
    let width = validate_examples(features, labels)?;

    let mut model = Model::with_rng(width, rng);
    let adam = AdamConfig::default();
    let mut opt_w1 = Adam::new(model.fc1.weight.len(), adam);
    let mut opt_b1 = Adam::new(model.fc1.bias.len(), adam);
    let mut opt_w2 = Adam::new(model.fc2.weight.len(), adam);
    let mut opt_b2 = Adam::new(model.fc2.bias.len(), adam);

    let mut grads = Gradients::zeros(width);
    let mut order: Vec<usize> = (0..features.len()).collect();
    let mut final_loss = f32::NAN;

    for epoch in 1..=cfg.epochs {
        if cfg.shuffle {
            order.shuffle(rng);
        }

        let mut loss_sum = 0.0_f32;
        let mut batches = 0_usize;
        for batch in order.chunks(cfg.batch_size) {
            grads.clear();
            let loss = accumulate_batch(&model, features, labels, batch, &mut grads);
            if !loss.is_finite() {
                tracing::warn!(epoch, loss, "training diverged");
                return Err(EngineError::TrainingDiverged { epoch });
            }

            let stepped = opt_w1.step(&grads.w1, &mut model.fc1.weight)
                && opt_b1.step(&grads.b1, &mut model.fc1.bias)
                && opt_w2.step(&grads.w2, &mut model.fc2.weight)
                && opt_b2.step(&grads.b2, &mut model.fc2.bias);
            if !stepped {
                tracing::warn!(epoch, "parameters are no longer finite");
                return Err(EngineError::TrainingDiverged { epoch });
            }

            loss_sum += loss;
            batches += 1;
        }

        final_loss = loss_sum / batches as f32;
        tracing::debug!(epoch, loss = final_loss, "epoch finished");
    }

    tracing::info!(
        samples = features.len(),
        input_size = width,
        epochs = cfg.epochs,
        batch_size = cfg.batch_size,
        final_loss,
        "training finished"
    );

    Ok(TrainOutcome { model, final_loss })
}

/// Trains on a blocking worker and persists the result as the only model.
/// The store's lifecycle lock is held throughout, so concurrent trainings
/// and deletes are serialised; on any failure the previous model stays.
pub async fn train_and_store(
    store: &ModelStore,
    features: Vec<Vec<f32>>,
    labels: Vec<f32>,
    cfg: TrainConfig,
) -> Result<f32> {
    cfg.validate()?;
    let _guard = store.lifecycle().await;

    let outcome = tokio::task::spawn_blocking(move || train(&features, &labels, &cfg))
        .await
        .map_err(|e| EngineError::Worker(e.to_string()))??;

    store.save(outcome.model)?;
    Ok(outcome.final_loss)
}

/// Returns the common feature width.
fn validate_examples(features: &[Vec<f32>], labels: &[f32]) -> Result<usize> {
    if features.is_empty() {
        return Err(EngineError::InvalidTrainingInput(
            "training set is empty".to_string(),
        ));
    }
    if features.len() != labels.len() {
        return Err(EngineError::InvalidTrainingInput(format!(
            "{} feature rows but {} labels",
            features.len(),
            labels.len()
        )));
    }

    let width = features[0].len();
    if width == 0 {
        return Err(EngineError::InvalidTrainingInput(
            "feature vectors are empty".to_string(),
        ));
    }
    if let Some(i) = features.iter().position(|row| row.len() != width) {
        return Err(EngineError::InvalidTrainingInput(format!(
            "row {i} has {} features, expected {width}",
            features[i].len()
        )));
    }
    if features.iter().flatten().any(|v| !v.is_finite()) {
        return Err(EngineError::InvalidTrainingInput(
            "features contain NaN or infinite values".to_string(),
        ));
    }
    if let Some(i) = labels
        .iter()
        .position(|y| !y.is_finite() || !(0.0..=1.0).contains(y))
    {
        return Err(EngineError::InvalidTrainingInput(format!(
            "label {i} is {}, labels must lie in [0, 1]",
            labels[i]
        )));
    }

    Ok(width)
}

struct Gradients {
    w1: Vec<f32>,
    b1: Vec<f32>,
    w2: Vec<f32>,
    b2: Vec<f32>,
}

impl Gradients {
    fn zeros(width: usize) -> Self {
        Self {
            w1: vec![0.0; width * HIDDEN_SIZE],
            b1: vec![0.0; HIDDEN_SIZE],
            w2: vec![0.0; HIDDEN_SIZE],
            b2: vec![0.0; 1],
        }
    }

    fn clear(&mut self) {
        for g in [&mut self.w1, &mut self.b1, &mut self.w2, &mut self.b2] {
            g.iter_mut().for_each(|v| *v = 0.0);
        }
    }
}

/// Adds the mean-loss gradients of one batch into `grads` and returns the
/// batch's mean binary cross-entropy, or NaN if any activation overflowed.
fn accumulate_batch(
    model: &Model,
    features: &[Vec<f32>],
    labels: &[f32],
    batch: &[usize],
    grads: &mut Gradients,
) -> f32 {
    let n = batch.len() as f32;
    let width = model.input_size();
    let w2 = &model.fc2.weight;
    let mut loss = 0.0_f32;

    for &idx in batch {
        let x = &features[idx];
        let y = labels[idx];

        let z1 = model.fc1.forward(x);
        let hidden: Vec<f32> = z1.iter().copied().map(relu).collect();
        let z2 = model.fc2.forward(&hidden)[0];
        // relu and the clamped log would hide an overflowed activation
        if !z2.is_finite() || z1.iter().any(|z| !z.is_finite()) {
            return f32::NAN;
        }
        let p = sigmoid(z2);

        loss += binary_cross_entropy(p, y);

        // sigmoid + BCE: dL/dz2 = p - y
        let dz2 = (p - y) / n;
        grads.b2[0] += dz2;
        for j in 0..HIDDEN_SIZE {
            grads.w2[j] += dz2 * hidden[j];
            if z1[j] > 0.0 {
                let dh = dz2 * w2[j];
                grads.b1[j] += dh;
                let row = &mut grads.w1[j * width..(j + 1) * width];
                for (g, xi) in row.iter_mut().zip(x) {
                    *g += dh * xi;
                }
            }
        }
    }

    loss / n
}

/// Log terms are clamped at -100 so saturated outputs stay finite.
fn binary_cross_entropy(p: f32, y: f32) -> f32 {
    let log_p = p.ln().max(-100.0);
    let log_not_p = (1.0 - p).ln().max(-100.0);
    -(y * log_p + (1.0 - y) * log_not_p)
}
