//! Training Loop
//!
//! Collects whole episodes from an environment with the engine's current
//! policy, feeds them through `append_to_memory` and runs one `train` call
//! per round.

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use tracing::info;

use super::checkpointing::Checkpointer;
use crate::algorithms::{TrainMetrics, TrustRegionOptimizer};
use crate::config::TrainingConfig;
use crate::core::SampleBatch;
use crate::environment::Environment;
use crate::error::Result;
use crate::networks::{StochasticPolicy, ValueFunction};

/// Outcome of a single episode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeResult {
    /// Total reward for episode
    pub total_reward: f32,
    /// Episode length in steps
    pub length: usize,
    /// Whether the step limit ended the episode
    pub truncated: bool,
}

/// Report of one training round
#[derive(Debug, Clone)]
pub struct RoundReport {
    pub round: usize,
    pub episodes: Vec<EpisodeResult>,
    pub metrics: TrainMetrics,
}

/// Training summary statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSummary {
    /// Number of episodes
    pub num_episodes: usize,
    /// Average reward per episode
    pub avg_reward: f32,
    /// Best episode reward
    pub best_reward: f32,
    /// Average episode length
    pub avg_episode_length: f32,
    /// Fraction of episodes ended by the step limit
    pub truncation_rate: f32,
}

/// Run one episode with sampled actions and return its raw samples
pub fn collect_episode<B, P, V>(
    engine: &mut TrustRegionOptimizer<B, P, V>,
    env: &mut dyn Environment,
) -> Result<(SampleBatch, EpisodeResult)>
where
    B: AutodiffBackend,
    P: StochasticPolicy<B> + AutodiffModule<B> + 'static,
    V: ValueFunction<B> + AutodiffModule<B> + 'static,
{
    let mut samples = SampleBatch::new();
    let mut obs = env.reset();
    let mut total_reward = 0.0f32;

    loop {
        let action = engine.predict(&obs)?;
        let result = env.step(&action)?;
        total_reward += result.reward;
        samples.append(obs, action, result.reward, result.observation.clone(), result.done);
        obs = result.observation;

        if result.done {
            let episode = EpisodeResult {
                total_reward,
                length: samples.len(),
                truncated: result.truncated,
            };
            return Ok((samples, episode));
        }
    }
}

/// Run episodes with the most likely action and no learning
pub fn evaluate<B, P, V>(
    engine: &TrustRegionOptimizer<B, P, V>,
    env: &mut dyn Environment,
    episodes: usize,
) -> Result<Vec<EpisodeResult>>
where
    B: AutodiffBackend,
    P: StochasticPolicy<B> + AutodiffModule<B> + 'static,
    V: ValueFunction<B> + AutodiffModule<B> + 'static,
{
    let mut results = Vec::with_capacity(episodes);

    for _ in 0..episodes {
        let mut obs = env.reset();
        let mut total_reward = 0.0f32;
        let mut length = 0;

        loop {
            let action = engine.predict_deterministic(&obs)?;
            let result = env.step(&action)?;
            total_reward += result.reward;
            length += 1;
            obs = result.observation;

            if result.done {
                results.push(EpisodeResult {
                    total_reward,
                    length,
                    truncated: result.truncated,
                });
                break;
            }
        }
    }

    Ok(results)
}

/// Training loop for an engine and an environment
pub struct TrainingLoop {
    config: TrainingConfig,
    checkpointer: Option<Checkpointer>,
    run_name: String,
}

impl TrainingLoop {
    /// Create a new training loop
    pub fn new(config: TrainingConfig, run_name: impl Into<String>) -> Self {
        Self {
            config,
            checkpointer: None,
            run_name: run_name.into(),
        }
    }

    /// Save checkpoints every `checkpoint_frequency` rounds
    pub fn with_checkpointer(mut self, checkpointer: Checkpointer) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    pub fn checkpointer(&self) -> Option<&Checkpointer> {
        self.checkpointer.as_ref()
    }

    /// Train for the configured number of rounds, numbering rounds from
    /// `start_round + 1`.
    pub fn run<B, P, V>(
        &self,
        engine: &mut TrustRegionOptimizer<B, P, V>,
        env: &mut dyn Environment,
        start_round: usize,
    ) -> Result<Vec<RoundReport>>
    where
        B: AutodiffBackend,
        P: StochasticPolicy<B> + AutodiffModule<B> + 'static,
        V: ValueFunction<B> + AutodiffModule<B> + 'static,
    {
        let mut reports = Vec::with_capacity(self.config.rounds);

        for round in start_round + 1..=start_round + self.config.rounds {
            let mut episodes = Vec::with_capacity(self.config.episodes_per_round);
            for _ in 0..self.config.episodes_per_round {
                let (samples, episode) = collect_episode(engine, env)?;
                engine.append_to_memory(&samples)?;
                episodes.push(episode);
            }

            let metrics = engine.train(None, None)?;
            let summary = summarize_results(&episodes);
            info!(
                "Round {}/{}: avg_reward={:.3}, best={:.3}, avg_len={:.1}, kl={:.5}, exp_var={:.3}",
                round,
                start_round + self.config.rounds,
                summary.avg_reward,
                summary.best_reward,
                summary.avg_episode_length,
                metrics.policy.average_kl,
                metrics.value.exp_var
            );

            if let Some(checkpointer) = &self.checkpointer {
                let frequency = self.config.checkpoint_frequency;
                if frequency > 0 && round % frequency == 0 {
                    checkpointer.save(engine, round as u64, &self.run_name)?;
                }
            }

            reports.push(RoundReport {
                round,
                episodes,
                metrics,
            });
        }

        Ok(reports)
    }
}

/// Calculate training summary statistics
pub fn summarize_results(results: &[EpisodeResult]) -> TrainingSummary {
    if results.is_empty() {
        return TrainingSummary::default();
    }

    let n = results.len() as f32;
    let avg_reward = results.iter().map(|r| r.total_reward).sum::<f32>() / n;
    let best_reward = results
        .iter()
        .map(|r| r.total_reward)
        .fold(f32::NEG_INFINITY, f32::max);
    let avg_length = results.iter().map(|r| r.length as f32).sum::<f32>() / n;
    let truncated = results.iter().filter(|r| r.truncated).count() as f32;

    TrainingSummary {
        num_episodes: results.len(),
        avg_reward,
        best_reward,
        avg_episode_length: avg_length,
        truncation_rate: truncated / n,
    }
}
