use burn::backend::Autodiff;
use burn::module::AutodiffModule;
use burn::tensor::backend::Backend;
use burn_ndarray::NdArray;
use clap::Parser;
use ppo_engine::algorithms::TrustRegionOptimizer;
use ppo_engine::cli::{Cli, Commands};
use ppo_engine::config::{EngineConfig, LoggingConfig};
use ppo_engine::core::ActionSpace;
use ppo_engine::environment::{make_env, Environment};
use ppo_engine::error::{PpoError, Result};
use ppo_engine::networks::{
    CategoricalMlpPolicyConfig, GaussianMlpPolicyConfig, MlpValueFunction, MlpValueFunctionConfig,
    StochasticPolicy,
};
use ppo_engine::training::{evaluate, summarize_results, Checkpointer, TrainingLoop};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

type TrainBackend = Autodiff<NdArray<f32>>;
type ValueNet = MlpValueFunction<TrainBackend>;

/// What to do with a freshly built engine
enum Job {
    Train { name: String, resume: bool },
    Eval { name: String, step: Option<u64>, episodes: usize },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from(path)?,
        None => EngineConfig::load_defaults()?,
    };
    if cli.json_logs {
        config.logging.json = true;
    }

    match cli.command {
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&EngineConfig::default())?);
        }
        Commands::Train {
            env,
            rounds,
            seed,
            checkpoint_dir,
            name,
            resume,
        } => {
            if let Some(env) = env {
                config.training.env = env;
            }
            if let Some(rounds) = rounds {
                config.training.rounds = rounds;
            }
            if let Some(seed) = seed {
                config.training.seed = seed;
            }
            if let Some(dir) = checkpoint_dir {
                config.training.checkpoint_dir = dir;
            }
            let _guard = init_logging(&config.logging);
            run(&config, Job::Train { name, resume })?;
        }
        Commands::Eval {
            name,
            step,
            episodes,
            env,
            checkpoint_dir,
        } => {
            if let Some(env) = env {
                config.training.env = env;
            }
            if let Some(dir) = checkpoint_dir {
                config.training.checkpoint_dir = dir;
            }
            let _guard = init_logging(&config.logging);
            run(&config, Job::Eval { name, step, episodes })?;
        }
    }

    Ok(())
}

/// Install the tracing subscriber; the returned guard flushes the file sink
/// on drop.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},ppo_engine=debug", logging.level)));

    let (file_layer, guard) = match &logging.directory {
        Some(dir) => match std::fs::create_dir_all(dir) {
            Ok(()) => {
                let file_appender = tracing_appender::rolling::daily(dir, "ppo-engine.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true);
                (Some(layer), Some(guard))
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not create log directory {} ({}), file logging disabled",
                    dir, e
                );
                (None, None)
            }
        },
        None => (None, None),
    };

    let json_layer = logging
        .json
        .then(|| tracing_subscriber::fmt::layer().json().with_target(true));
    let console_layer = (!logging.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .with(file_layer)
        .init();

    guard
}

/// Build the environment and the engine matching its action space
fn run(config: &EngineConfig, job: Job) -> Result<()> {
    config
        .validate()
        .map_err(|errors| PpoError::InvalidConfig(errors.join("; ")))?;

    let device = Default::default();
    TrainBackend::seed(config.training.seed);

    let mut env = make_env(
        config.training.env,
        config.training.max_episode_steps,
        config.training.seed,
    );
    let obs_dim = env.observation_dim();
    let value_fn: ValueNet = MlpValueFunctionConfig::new(obs_dim)
        .with_hidden_dim(config.networks.value_hidden_dim)
        .init(&device);

    match env.action_space() {
        ActionSpace::Continuous { dim } => {
            let policy = GaussianMlpPolicyConfig::new(obs_dim, dim)
                .with_hidden_dim(config.networks.policy_hidden_dim)
                .with_init_log_var(config.networks.init_log_var)
                .init(&device);
            let engine = TrustRegionOptimizer::new(config.ppo.clone(), policy, value_fn, device)?;
            run_job(engine, env.as_mut(), config, job)
        }
        ActionSpace::Discrete { n } => {
            let policy = CategoricalMlpPolicyConfig::new(obs_dim, n)
                .with_hidden_dim(config.networks.policy_hidden_dim)
                .init(&device);
            let engine = TrustRegionOptimizer::new(config.ppo.clone(), policy, value_fn, device)?;
            run_job(engine, env.as_mut(), config, job)
        }
    }
}

fn run_job<P>(
    mut engine: TrustRegionOptimizer<TrainBackend, P, ValueNet>,
    env: &mut dyn Environment,
    config: &EngineConfig,
    job: Job,
) -> Result<()>
where
    P: StochasticPolicy<TrainBackend> + AutodiffModule<TrainBackend> + 'static,
{
    let checkpointer = Checkpointer::new(
        &config.training.checkpoint_dir,
        config.training.max_checkpoints,
    );

    match job {
        Job::Train { name, resume } => {
            let mut start_round = 0;
            if resume {
                match checkpointer.latest_step(&name) {
                    Some(step) => {
                        start_round = checkpointer.load(&mut engine, &name, Some(step))? as usize;
                        info!("Resuming run {} from round {}", name, start_round);
                    }
                    None => warn!("No checkpoint for run {}, starting fresh", name),
                }
            }

            info!(
                "Training on {:?} for {} rounds of {} episodes",
                config.training.env, config.training.rounds, config.training.episodes_per_round
            );

            let training = TrainingLoop::new(config.training.clone(), name.clone())
                .with_checkpointer(checkpointer);
            let reports = training.run(&mut engine, env, start_round)?;

            let last_round: Vec<_> = reports
                .last()
                .map(|r| r.episodes.clone())
                .unwrap_or_default();
            let summary = summarize_results(&last_round);

            let final_round = start_round + reports.len();
            let saved = match training.checkpointer() {
                Some(checkpointer) => Some(checkpointer.save(&engine, final_round as u64, &name)?),
                None => None,
            };

            println!("Training complete");
            println!("  rounds:          {}", reports.len());
            println!("  avg reward:      {:.3}", summary.avg_reward);
            println!("  avg length:      {:.1}", summary.avg_episode_length);
            println!("  beta:            {:.4}", engine.coefficients().beta);
            println!("  lr multiplier:   {:.4}", engine.coefficients().lr_multiplier);
            if let Some(saved) = saved {
                println!("  checkpoint:      {:?} (step {})", saved.path, saved.step);
            }
        }
        Job::Eval {
            name,
            step,
            episodes,
        } => {
            let step = checkpointer.load(&mut engine, &name, step)?;
            let results = evaluate(&engine, env, episodes)?;
            let summary = summarize_results(&results);

            println!("Evaluation of {} at step {}", name, step);
            println!("  episodes:        {}", summary.num_episodes);
            println!("  mean return:     {:.3}", summary.avg_reward);
            println!("  best return:     {:.3}", summary.best_reward);
            println!("  avg length:      {:.1}", summary.avg_episode_length);
            println!("  truncated:       {:.1}%", summary.truncation_rate * 100.0);
        }
    }

    Ok(())
}
