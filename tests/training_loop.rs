use std::env::temp_dir;
use std::fs;

use burn::backend::Autodiff;
use burn_ndarray::NdArray;
use ppo_engine::algorithms::TrustRegionOptimizer;
use ppo_engine::config::{EnvKind, PpoConfig, TrainingConfig};
use ppo_engine::environment::make_env;
use ppo_engine::networks::{
    CategoricalMlpPolicy, CategoricalMlpPolicyConfig, MlpValueFunction, MlpValueFunctionConfig,
};
use ppo_engine::training::{collect_episode, evaluate, Checkpointer, TrainingLoop};

type TestBackend = Autodiff<NdArray<f32>>;
type Engine = TrustRegionOptimizer<
    TestBackend,
    CategoricalMlpPolicy<TestBackend>,
    MlpValueFunction<TestBackend>,
>;

/// Engine sized for the corridor environment
fn corridor_engine() -> Engine {
    let device = Default::default();
    let policy = CategoricalMlpPolicyConfig::new(2, 3)
        .with_hidden_dim(8)
        .init(&device);
    let value_fn = MlpValueFunctionConfig::new(2).with_hidden_dim(8).init(&device);
    let config = PpoConfig {
        policy_train_iter: 3,
        value_func_train_iter: 2,
        value_func_train_batch_size: 16,
        ..PpoConfig::default()
    };
    TrustRegionOptimizer::new(config, policy, value_fn, device).unwrap()
}

fn scratch_dir(tag: &str) -> std::path::PathBuf {
    let dir = temp_dir().join(format!("ppo_engine_{}_{}", tag, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

#[test]
fn collect_episode_respects_step_limit() {
    let mut engine = corridor_engine();
    let mut env = make_env(EnvKind::Corridor, 12, 3);

    let (samples, episode) = collect_episode(&mut engine, env.as_mut()).unwrap();
    assert_eq!(samples.len(), episode.length);
    assert!(episode.length <= 12);
    assert!(samples.iter().last().unwrap().done);
    assert_eq!(engine.counters().predict as usize, episode.length);
}

#[test]
fn training_loop_runs_and_checkpoints() {
    let dir = scratch_dir("loop");
    let config = TrainingConfig {
        env: EnvKind::Corridor,
        rounds: 3,
        episodes_per_round: 2,
        max_episode_steps: 15,
        checkpoint_frequency: 1,
        checkpoint_dir: dir.to_string_lossy().into_owned(),
        max_checkpoints: 2,
        ..TrainingConfig::default()
    };

    let mut engine = corridor_engine();
    let mut env = make_env(EnvKind::Corridor, config.max_episode_steps, 7);
    let training = TrainingLoop::new(config, "corridor").with_checkpointer(Checkpointer::new(&dir, 2));

    let reports = training.run(&mut engine, env.as_mut(), 0).unwrap();
    assert_eq!(reports.len(), 3);
    assert_eq!(
        reports.iter().map(|r| r.round).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    for report in &reports {
        assert_eq!(report.episodes.len(), 2);
        assert!(report.episodes.iter().all(|e| e.length <= 15));
        assert!(report.metrics.samples >= 2);
    }
    assert_eq!(engine.counters().train, 3);

    // Only the newest checkpoints survive cleanup
    let checkpointer = Checkpointer::new(&dir, 2);
    assert_eq!(checkpointer.list_steps("corridor"), vec![2, 3]);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn checkpoint_round_trip_restores_engine() {
    let dir = scratch_dir("roundtrip");
    let checkpointer = Checkpointer::new(&dir, 5);

    let mut trained = corridor_engine();
    let mut env = make_env(EnvKind::Corridor, 10, 11);
    for _ in 0..2 {
        let (samples, _) = collect_episode(&mut trained, env.as_mut()).unwrap();
        trained.append_to_memory(&samples).unwrap();
    }
    trained.train(None, None).unwrap();
    trained.set_parameter("beta", 4.5).unwrap();

    let saved = checkpointer.save(&trained, 7, "run").unwrap();
    assert_eq!(saved.step, 7);
    assert!(checkpointer.exists("run", 7));

    let mut restored = corridor_engine();
    let step = checkpointer.load(&mut restored, "run", None).unwrap();
    assert_eq!(step, 7);

    assert_eq!(restored.coefficients(), trained.coefficients());
    assert_eq!(restored.counters(), trained.counters());
    assert_eq!(restored.scaler().count(), trained.scaler().count());
    assert_eq!(restored.scaler().mean(), trained.scaler().mean());

    // Same weights and statistics give the same greedy actions
    for obs in [[0.0, 0.0], [3.0, 5.0], [-2.0, 9.0]] {
        assert_eq!(
            restored.predict_deterministic(&obs).unwrap(),
            trained.predict_deterministic(&obs).unwrap()
        );
    }

    let results = evaluate(&restored, env.as_mut(), 2).unwrap();
    assert_eq!(results.len(), 2);

    assert!(checkpointer.load(&mut restored, "missing", None).is_err());
    assert!(checkpointer.load(&mut restored, "run", Some(8)).is_err());

    fs::remove_dir_all(&dir).unwrap();
}
