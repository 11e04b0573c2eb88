//! Neural attraction ranker.
//!
//! A small feed-forward network scoring (query, user context, candidate)
//! embedding triples. Layout is 3D -> H -> H/2 -> 1 with ReLU activations
//! and a sigmoid head, evaluated in inference mode only. Weights come from
//! a versioned JSON blob; without one the network is initialized from a
//! fixed seed so scores stay deterministic, and a warning notes that they
//! are uncalibrated.

use std::fs;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Serialized network parameters.
///
/// Row-major matrices: `w1` is `hidden x 3*embedding_dim`, `w2` is
/// `hidden/2 x hidden`, `w3` is the `hidden/2` output row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankerWeights {
    pub embedding_dim: usize,
    pub hidden_dim: usize,
    pub w1: Vec<Vec<f32>>,
    pub b1: Vec<f32>,
    pub w2: Vec<Vec<f32>>,
    pub b2: Vec<f32>,
    pub w3: Vec<f32>,
    pub b3: f32,
}

impl RankerWeights {
    fn validate(&self) -> Result<(), String> {
        let input_dim = self.embedding_dim * 3;
        let half = self.hidden_dim / 2;

        if self.w1.len() != self.hidden_dim || self.b1.len() != self.hidden_dim {
            return Err(format!("layer 1 expects {} rows", self.hidden_dim));
        }
        if self.w1.iter().any(|row| row.len() != input_dim) {
            return Err(format!("layer 1 rows must have {} columns", input_dim));
        }
        if self.w2.len() != half || self.b2.len() != half {
            return Err(format!("layer 2 expects {} rows", half));
        }
        if self.w2.iter().any(|row| row.len() != self.hidden_dim) {
            return Err(format!("layer 2 rows must have {} columns", self.hidden_dim));
        }
        if self.w3.len() != half {
            return Err(format!("output layer expects {} weights", half));
        }
        Ok(())
    }

    /// Seeded uniform init with Kaiming-style bounds per layer.
    pub fn seeded(embedding_dim: usize, hidden_dim: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let input_dim = embedding_dim * 3;
        let half = hidden_dim / 2;

        let w1 = random_matrix(&mut rng, hidden_dim, input_dim);
        let b1 = vec![0.0; hidden_dim];
        let w2 = random_matrix(&mut rng, half, hidden_dim);
        let b2 = vec![0.0; half];
        let bound = (6.0 / half as f32).sqrt();
        let w3 = (0..half).map(|_| rng.gen_range(-bound..bound)).collect();

        Self {
            embedding_dim,
            hidden_dim,
            w1,
            b1,
            w2,
            b2,
            w3,
            b3: 0.0,
        }
    }
}

fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> Vec<Vec<f32>> {
    let bound = (6.0 / cols as f32).sqrt();
    (0..rows)
        .map(|_| (0..cols).map(|_| rng.gen_range(-bound..bound)).collect())
        .collect()
}

/// Inference-only scorer over embedding triples. Read-only after
/// construction, safe to share across requests.
pub struct PlaceRanker {
    weights: RankerWeights,
}

impl PlaceRanker {
    /// Load pretrained weights, or fall back to a deterministic seeded
    /// initialization when the blob is missing or malformed.
    pub fn load_or_init(
        weights_path: Option<&str>,
        embedding_dim: usize,
        hidden_dim: usize,
        seed: u64,
    ) -> Self {
        if let Some(path) = weights_path {
            match Self::load_from_file(path, embedding_dim, hidden_dim) {
                Ok(ranker) => {
                    info!("Loaded pretrained ranker weights from {}", path);
                    return ranker;
                }
                Err(reason) => {
                    warn!("Could not load ranker weights from {}: {}", path, reason);
                }
            }
        }

        warn!("Using seeded ranker initialization; relevance scores are uncalibrated");
        Self {
            weights: RankerWeights::seeded(embedding_dim, hidden_dim, seed),
        }
    }

    fn load_from_file(
        path: &str,
        embedding_dim: usize,
        hidden_dim: usize,
    ) -> Result<Self, String> {
        let raw = fs::read_to_string(path).map_err(|e| e.to_string())?;
        let weights: RankerWeights = serde_json::from_str(&raw).map_err(|e| e.to_string())?;

        if weights.embedding_dim != embedding_dim || weights.hidden_dim != hidden_dim {
            return Err(format!(
                "dimension mismatch: blob is {}x{}, configured {}x{}",
                weights.embedding_dim, weights.hidden_dim, embedding_dim, hidden_dim
            ));
        }
        weights.validate()?;

        Ok(Self { weights })
    }

    pub fn from_weights(weights: RankerWeights) -> Result<Self, String> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn embedding_dim(&self) -> usize {
        self.weights.embedding_dim
    }

    /// Score a (query, context, candidate) triple. Returns `None` when any
    /// input does not match the configured embedding dimension.
    pub fn score(&self, query: &[f32], context: &[f32], candidate: &[f32]) -> Option<f32> {
        let dim = self.weights.embedding_dim;
        if query.len() != dim || context.len() != dim || candidate.len() != dim {
            return None;
        }

        let mut input = Vec::with_capacity(dim * 3);
        input.extend_from_slice(query);
        input.extend_from_slice(context);
        input.extend_from_slice(candidate);

        let h1 = dense_relu(&self.weights.w1, &self.weights.b1, &input);
        let h2 = dense_relu(&self.weights.w2, &self.weights.b2, &h1);

        let mut logit = self.weights.b3;
        for (weight, value) in self.weights.w3.iter().zip(h2.iter()) {
            logit += weight * value;
        }

        Some(sigmoid(logit))
    }
}

fn dense_relu(weights: &[Vec<f32>], biases: &[f32], input: &[f32]) -> Vec<f32> {
    weights
        .iter()
        .zip(biases.iter())
        .map(|(row, bias)| {
            let mut sum = *bias;
            for (weight, value) in row.iter().zip(input.iter()) {
                sum += weight * value;
            }
            sum.max(0.0)
        })
        .collect()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Fuse the neural score with the vector similarity into the PEAR score,
/// clipped to [0, 1].
pub fn fuse_scores(
    neural_score: f64,
    similarity_score: f64,
    neural_weight: f64,
    similarity_weight: f64,
) -> f64 {
    (neural_weight * neural_score + similarity_weight * similarity_score).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_ranker() -> PlaceRanker {
        PlaceRanker {
            weights: RankerWeights::seeded(8, 4, 42),
        }
    }

    #[test]
    fn score_is_in_unit_interval() {
        let ranker = small_ranker();
        let q = vec![0.5; 8];
        let c = vec![-0.25; 8];
        let p = vec![0.1; 8];
        let score = ranker.score(&q, &c, &p).unwrap();
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn score_is_deterministic() {
        let first = small_ranker();
        let second = small_ranker();
        let q = vec![0.3; 8];
        let c = vec![0.7; 8];
        let p = vec![-0.2; 8];
        assert_eq!(first.score(&q, &c, &p), second.score(&q, &c, &p));
    }

    #[test]
    fn mismatched_dimension_returns_none() {
        let ranker = small_ranker();
        let q = vec![0.3; 8];
        let c = vec![0.7; 8];
        let short = vec![0.1; 4];
        assert!(ranker.score(&q, &c, &short).is_none());
    }

    #[test]
    fn fusion_matches_weighted_sum() {
        let fused = fuse_scores(0.8, 0.6, 0.7, 0.3);
        assert!((fused - (0.7 * 0.8 + 0.3 * 0.6)).abs() < 1e-12);
    }

    #[test]
    fn fusion_clips_to_unit_interval() {
        assert_eq!(fuse_scores(1.0, 1.0, 0.9, 0.9), 1.0);
        assert_eq!(fuse_scores(-1.0, 0.0, 0.7, 0.3), 0.0);
    }

    #[test]
    fn seeded_weights_validate() {
        let weights = RankerWeights::seeded(8, 4, 7);
        assert!(weights.validate().is_ok());
        assert_eq!(weights.w1.len(), 4);
        assert_eq!(weights.w1[0].len(), 24);
        assert_eq!(weights.w2.len(), 2);
        assert_eq!(weights.w3.len(), 2);
    }

    #[test]
    fn malformed_blob_is_rejected() {
        let mut weights = RankerWeights::seeded(8, 4, 7);
        weights.w3.pop();
        assert!(PlaceRanker::from_weights(weights).is_err());
    }
}
