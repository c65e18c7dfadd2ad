use anyhow::Result;
use ndarray::Array2;
use steer_candle_agent::{opt::OptimizerConfig, QNet, QNetConfig};
use steer_core::{
    episode::EpisodeConfig,
    record::BufferedRecorder,
    replay_buffer::{PerConfig, ReplayBufferConfig},
    AgentReading, ExplorerConfig, GoalInfo, Learner, Trainer, TrainerConfig, VehicleEnv,
};
use tempdir::TempDir;

const N_AGENTS: usize = 4;
const N_SENSORS: usize = 3;
const N_ACTIONS: usize = 3;

/// Vehicles on a line: action 1 drives towards the goal, the others away from it.
struct Corridor {
    distance: Vec<f32>,
}

impl Corridor {
    fn reading(&self, agent: usize) -> AgentReading {
        AgentReading {
            position: [self.distance[agent], 0.0],
            heading: 0.0,
            sensors: vec![1.0; N_SENSORS],
            goal: GoalInfo {
                angle: 0.0,
                distance: self.distance[agent],
            },
        }
    }
}

impl VehicleEnv for Corridor {
    fn n_agents(&self) -> usize {
        self.distance.len()
    }

    fn n_sensors(&self) -> usize {
        N_SENSORS
    }

    fn step(&mut self, actions: &[usize]) -> Result<Vec<AgentReading>> {
        for (d, &a) in self.distance.iter_mut().zip(actions.iter()) {
            *d = match a {
                1 => (*d - 0.1).max(0.0),
                _ => *d + 0.05,
            };
        }
        Ok((0..self.distance.len()).map(|i| self.reading(i)).collect())
    }

    fn reset(&mut self, agents: &[usize]) -> Result<Vec<AgentReading>> {
        for &i in agents {
            self.distance[i] = 0.3 + 0.1 * i as f32;
        }
        Ok(agents.iter().map(|&i| self.reading(i)).collect())
    }
}

fn qnet(obs_dim: usize) -> Result<QNet> {
    let config = QNetConfig::default()
        .in_dim(obs_dim)
        .units(vec![16, 16])
        .out_dim(N_ACTIONS)
        .dueling(true)
        .opt_config(OptimizerConfig::Adam { lr: 1e-3 });
    QNet::build(config)
}

#[test_log::test]
fn test_train_on_corridor() -> Result<()> {
    let dir = TempDir::new("qnet_trainer")?;
    let episode_config = EpisodeConfig::default().max_steps(20).goal_reward(10.0).fail_reward(-10.0);
    let obs_dim = episode_config.obs_dim(N_SENSORS);
    let trainer_config = TrainerConfig::default()
        .batch_size(8)
        .warmup(16)
        .sync_interval(8)
        .flush_record_interval(4)
        .max_episodes(10)
        .save_interval(5)
        .model_dir(dir.path().to_string_lossy())
        .explorer(ExplorerConfig::default().anneal_interval(4).eps_decay(0.9));
    let replay_buffer_config = ReplayBufferConfig::default()
        .capacity(256)
        .obs_dim(obs_dim)
        .n_actions(N_ACTIONS)
        .per_config(Some(PerConfig::default()));
    let env = Corridor {
        distance: vec![0.5; N_AGENTS],
    };

    let mut trainer: Trainer<Corridor, QNet> = Trainer::build(
        trainer_config,
        episode_config,
        replay_buffer_config,
        env,
        qnet(obs_dim)?,
        qnet(obs_dim)?,
    )?;
    let mut recorder = BufferedRecorder::new();

    // Online and target agree after construction
    let obs = Array2::from_shape_fn((2, obs_dim), |(i, j)| (i + j) as f32 * 0.1);
    assert_eq!(trainer.online().predict(&obs)?, trainer.target().predict(&obs)?);

    let mut n_ticks = 0;
    while trainer.context().episodes <= 10 && n_ticks < 2000 {
        let report = trainer.train_step(&mut recorder)?;
        if let Some(loss) = report.loss {
            assert!(loss.is_finite());
        }
        if report.synced {
            assert_eq!(trainer.online().predict(&obs)?, trainer.target().predict(&obs)?);
        }
        n_ticks += 1;
    }

    let context = trainer.context();
    assert!(context.episodes > 10);
    assert!(context.n_opts > 0);
    assert!(context.epsilon < 1.0);
    assert!(recorder.with_key("loss").count() > 0);
    assert!(std::fs::read_dir(dir.path())?.count() >= 1);
    Ok(())
}
