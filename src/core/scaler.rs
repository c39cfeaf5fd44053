//! Running observation scaler.
//!
//! Keeps a per-dimension running mean and variance of raw observations and
//! standardizes observations with the statistics as they currently stand.
//! Batches are folded in with the parallel (Chan et al.) combination of the
//! batch moments and the running moments, weighted by their counts.

use serde::{Deserialize, Serialize};

use crate::error::{PpoError, Result};

/// Running mean/variance scaler for observation vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunningScaler {
    /// Running mean per dimension
    mean: Vec<f64>,
    /// Running population variance per dimension
    var: Vec<f64>,
    /// Number of observations folded in
    count: f64,
    /// Added to the variance before the square root
    epsilon: f64,
}

impl RunningScaler {
    /// Scaler for `dim`-dimensional observations with unit initial variance.
    pub fn new(dim: usize, epsilon: f64) -> Self {
        Self {
            mean: vec![0.0; dim],
            var: vec![1.0; dim],
            count: 0.0,
            epsilon,
        }
    }

    /// Fold a batch of raw observations into the running statistics.
    pub fn update(&mut self, batch: &[Vec<f32>]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        for obs in batch {
            self.check_dim(obs)?;
        }

        let n = batch.len() as f64;
        let dim = self.mean.len();
        let mut batch_mean = vec![0.0f64; dim];
        for obs in batch {
            for (acc, &x) in batch_mean.iter_mut().zip(obs) {
                *acc += x as f64;
            }
        }
        for acc in &mut batch_mean {
            *acc /= n;
        }

        let mut batch_var = vec![0.0f64; dim];
        for obs in batch {
            for i in 0..dim {
                let d = obs[i] as f64 - batch_mean[i];
                batch_var[i] += d * d;
            }
        }
        for acc in &mut batch_var {
            *acc /= n;
        }

        let total = self.count + n;
        for i in 0..dim {
            let delta = batch_mean[i] - self.mean[i];
            let m2 = self.var[i] * self.count
                + batch_var[i] * n
                + delta * delta * self.count * n / total;
            self.mean[i] += delta * n / total;
            self.var[i] = m2 / total;
        }
        self.count = total;

        Ok(())
    }

    /// Standardize one observation with the current statistics.
    pub fn process(&self, obs: &[f32]) -> Result<Vec<f32>> {
        self.check_dim(obs)?;
        Ok(obs
            .iter()
            .enumerate()
            .map(|(i, &x)| ((x as f64 - self.mean[i]) / (self.var[i] + self.epsilon).sqrt()) as f32)
            .collect())
    }

    /// Standardize a batch of observations with the current statistics.
    pub fn process_batch(&self, batch: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        batch.iter().map(|obs| self.process(obs)).collect()
    }

    fn check_dim(&self, obs: &[f32]) -> Result<()> {
        if obs.len() != self.mean.len() {
            return Err(PpoError::shape("observation", self.mean.len(), obs.len()));
        }
        Ok(())
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn variance(&self) -> &[f64] {
        &self.var
    }

    pub fn count(&self) -> f64 {
        self.count
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_first_batch_sets_moments() {
        let mut scaler = RunningScaler::new(2, 1e-8);
        scaler
            .update(&[vec![1.0, 10.0], vec![3.0, 20.0]])
            .unwrap();

        assert_close(scaler.mean()[0], 2.0);
        assert_close(scaler.mean()[1], 15.0);
        assert_close(scaler.variance()[0], 1.0);
        assert_close(scaler.variance()[1], 25.0);
        assert_eq!(scaler.count(), 2.0);
    }

    #[test]
    fn test_batches_combine_like_one_batch() {
        let data: Vec<Vec<f32>> = (0..10).map(|i| vec![i as f32, (i * i) as f32]).collect();

        let mut split = RunningScaler::new(2, 1e-8);
        split.update(&data[..3]).unwrap();
        split.update(&data[3..]).unwrap();

        let mut whole = RunningScaler::new(2, 1e-8);
        whole.update(&data).unwrap();

        for i in 0..2 {
            assert!((split.mean()[i] - whole.mean()[i]).abs() < 1e-9);
            assert!((split.variance()[i] - whole.variance()[i]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_process_uses_current_statistics() {
        let mut scaler = RunningScaler::new(1, 0.0);
        let batch = vec![vec![2.0], vec![4.0]];

        let before = scaler.process_batch(&batch).unwrap();
        scaler.update(&batch).unwrap();
        let after = scaler.process_batch(&batch).unwrap();

        // Pre-update statistics are mean 0, variance 1
        assert_eq!(before, vec![vec![2.0], vec![4.0]]);
        // Post-update statistics are mean 3, variance 1
        assert_eq!(after, vec![vec![-1.0], vec![1.0]]);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut scaler = RunningScaler::new(3, 1e-8);
        assert!(scaler.process(&[1.0, 2.0]).is_err());
        assert!(scaler.update(&[vec![1.0]]).is_err());
        assert_eq!(scaler.count(), 0.0);
    }

    #[test]
    fn test_empty_update_is_noop() {
        let mut scaler = RunningScaler::new(2, 1e-8);
        scaler.update(&[]).unwrap();
        assert_eq!(scaler.count(), 0.0);
        assert_eq!(scaler.variance(), &[1.0, 1.0]);
    }
}
