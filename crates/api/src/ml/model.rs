use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

pub const HIDDEN_SIZE: usize = 64;

/// Fully-connected layer. `weight` is `out_features × in_features`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Dense {
    pub(crate) in_features: usize,
    pub(crate) out_features: usize,
    pub(crate) weight: Vec<f32>,
    pub(crate) bias: Vec<f32>,
}

impl Dense {
    /// Uniform `(-1/sqrt(fan_in), 1/sqrt(fan_in))` for weights and biases.
    pub fn with_rng<R: Rng + ?Sized>(in_features: usize, out_features: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (in_features.max(1) as f32).sqrt();
        let weight = (0..in_features * out_features)
            .map(|_| rng.gen_range(-bound..bound))
            .collect();
        let bias = (0..out_features)
            .map(|_| rng.gen_range(-bound..bound))
            .collect();
        Self {
            in_features,
            out_features,
            weight,
            bias,
        }
    }

    pub(crate) fn row(&self, out: usize) -> &[f32] {
        &self.weight[out * self.in_features..(out + 1) * self.in_features]
    }

    /// `W x + b` for a single sample.
    pub fn forward(&self, x: &[f32]) -> Vec<f32> {
        debug_assert_eq!(x.len(), self.in_features);
        (0..self.out_features)
            .map(|o| {
                let mut z = self.bias[o];
                for (w, xi) in self.row(o).iter().zip(x) {
                    z += w * xi;
                }
                z
            })
            .collect()
    }

    fn to_record(&self) -> LayerRecord {
        LayerRecord {
            weight: self
                .weight
                .chunks(self.in_features.max(1))
                .map(<[f32]>::to_vec)
                .collect(),
            bias: self.bias.clone(),
        }
    }

    fn from_record(
        name: &str,
        record: LayerRecord,
        expected_out: usize,
        expected_in: Option<usize>,
    ) -> Result<Self> {
        let out_features = record.weight.len();
        if out_features != expected_out {
            return Err(EngineError::MalformedRecord(format!(
                "{name}.weight has {out_features} rows, expected {expected_out}"
            )));
        }
        let in_features = record.weight.first().map(Vec::len).unwrap_or(0);
        if in_features == 0 {
            return Err(EngineError::MalformedRecord(format!(
                "{name}.weight has no columns"
            )));
        }
        if let Some(expected) = expected_in
            && in_features != expected
        {
            return Err(EngineError::MalformedRecord(format!(
                "{name}.weight has {in_features} columns, expected {expected}"
            )));
        }
        if record.weight.iter().any(|row| row.len() != in_features) {
            return Err(EngineError::MalformedRecord(format!(
                "{name}.weight is not rectangular"
            )));
        }
        if record.bias.len() != out_features {
            return Err(EngineError::MalformedRecord(format!(
                "{name}.bias has {} values, expected {out_features}",
                record.bias.len()
            )));
        }

        Ok(Self {
            in_features,
            out_features,
            weight: record.weight.into_iter().flatten().collect(),
            bias: record.bias,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub weight: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

/// On-disk form of a [`Model`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub fc1: LayerRecord,
    pub fc2: LayerRecord,
}

impl ModelRecord {
    /// Feature width implied by the first layer's weight shape.
    pub fn input_size(&self) -> Option<usize> {
        self.fc1.weight.first().map(Vec::len)
    }
}

/// `Linear(input_size, 64) -> ReLU -> Linear(64, 1) -> Sigmoid`
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub(crate) fc1: Dense,
    pub(crate) fc2: Dense,
}

impl Model {
    pub fn new(input_size: usize) -> Self {
        Self::with_rng(input_size, &mut rand::thread_rng())
    }

    pub fn with_rng<R: Rng + ?Sized>(input_size: usize, rng: &mut R) -> Self {
        Self {
            fc1: Dense::with_rng(input_size, HIDDEN_SIZE, rng),
            fc2: Dense::with_rng(HIDDEN_SIZE, 1, rng),
        }
    }

    pub fn input_size(&self) -> usize {
        self.fc1.in_features
    }

    /// Probability for every sample in `batch`.
    pub fn forward(&self, batch: &[Vec<f32>]) -> Vec<f32> {
        batch.iter().map(|x| self.forward_one(x)).collect()
    }

    pub fn forward_one(&self, x: &[f32]) -> f32 {
        let hidden: Vec<f32> = self.fc1.forward(x).into_iter().map(relu).collect();
        sigmoid(self.fc2.forward(&hidden)[0])
    }

    pub fn to_record(&self) -> ModelRecord {
        ModelRecord {
            fc1: self.fc1.to_record(),
            fc2: self.fc2.to_record(),
        }
    }

    pub fn from_record(record: ModelRecord) -> Result<Self> {
        let fc1 = Dense::from_record("fc1", record.fc1, HIDDEN_SIZE, None)?;
        let fc2 = Dense::from_record("fc2", record.fc2, 1, Some(HIDDEN_SIZE))?;
        Ok(Self { fc1, fc2 })
    }
}

pub(crate) fn relu(z: f32) -> f32 {
    z.max(0.0)
}

pub(crate) fn sigmoid(z: f32) -> f32 {
    if z >= 0.0 {
        let ez = (-z).exp();
        1.0 / (1.0 + ez)
    } else {
        let ez = z.exp();
        ez / (1.0 + ez)
    }
}
