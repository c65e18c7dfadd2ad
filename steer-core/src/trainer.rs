//! Train a Q-network on many vehicles stepped in lockstep.
mod config;
mod context;
mod explorer;
mod stats;
mod target;
use crate::{
    episode::{EpisodeConfig, EpisodeScheduler, FinishedEpisode, RewardShaper, Tick},
    error::SteerError,
    record::{Record, RecordValue::Scalar, Recorder},
    replay_buffer::{PrioritizedReplayBuffer, Transition, TransitionBatch},
    ExperienceBufferBase, Learner, ReplayBufferBase, VehicleEnv,
};
use anyhow::Result;
pub use config::TrainerConfig;
pub use context::TrainingContext;
pub use explorer::{argmax, EpsilonGreedy, ExplorerConfig};
use log::{debug, info};
use ndarray::Array2;
pub use stats::RunningStats;
pub use target::{compute_targets, td_errors};
use std::path::Path;

/// What happened on a tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    /// Episodes finished on this tick.
    pub finished: Vec<FinishedEpisode>,

    /// Loss of the optimization step, `None` during the warm-up.
    pub loss: Option<f32>,

    /// `true` if the target network was synced.
    pub synced: bool,
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages the training loop and the objects it owns.
///
/// # Training loop
///
/// Every call of [`Trainer::train_step()`] runs one tick:
///
/// 1. Update epsilon with the global step of the previous tick, then
///    `global_step += n_agents`.
/// 2. Select one action per vehicle with [`EpsilonGreedy`] on the online
///    Q-values of the current observations.
/// 3. Step the environment.
/// 4. Push the new frames into the observation windows and classify every
///    vehicle with [`EpisodeScheduler`].
/// 5. Insert the transitions of all vehicles into the replay buffer. The
///    finished-episode counter grows by the number of terminated vehicles.
/// 6. If at least `warmup` transitions were inserted, sample a batch,
///    compute targets, train the online network once and write the TD errors
///    back as priorities. Otherwise the finished-episode counter is held at 0.
/// 7. If `global_step % sync_interval == 0`, copy the online parameters into
///    the target network.
/// 8. Reset the terminated vehicles, record their episodes and save the
///    online network every `save_interval` episodes.
///
/// [`Trainer::train()`] repeats ticks until more than `max_episodes` episodes
/// have finished.
///
/// # Interaction of objects
///
/// ```mermaid
/// graph LR
///     A[Learner]-->|actions|B[VehicleEnv]
///     B -->|AgentReading|C[EpisodeScheduler]
///     C -->|Transition|D[ReplayBufferBase]
///     D -->|TransitionBatch|A
///     A -->|TD errors|D
/// ```
///
/// [`Trainer::train_step()`]: Trainer::train_step
/// [`Trainer::train()`]: Trainer::train
pub struct Trainer<E, L, R = PrioritizedReplayBuffer>
where
    E: VehicleEnv,
    L: Learner,
    R: ExperienceBufferBase<Item = Transition> + ReplayBufferBase<Batch = TransitionBatch>,
{
    config: TrainerConfig,
    env: E,
    online: L,
    target: L,
    buffer: R,
    scheduler: EpisodeScheduler,
    explorer: EpsilonGreedy,
    context: TrainingContext,
    stats: RunningStats,
    n_agents: usize,
    obs_dim: usize,
}

impl<E, L, R> Trainer<E, L, R>
where
    E: VehicleEnv,
    L: Learner,
    R: ExperienceBufferBase<Item = Transition> + ReplayBufferBase<Batch = TransitionBatch>,
{
    /// Constructs a trainer.
    ///
    /// Validates the configurations, checks that the networks and the replay
    /// buffer match the observation and action spaces and each other, copies the online
    /// parameters into the target network and resets every vehicle.
    pub fn build(
        config: TrainerConfig,
        episode_config: EpisodeConfig,
        replay_buffer_config: R::Config,
        mut env: E,
        online: L,
        mut target: L,
    ) -> Result<Self> {
        let n_agents = env.n_agents();
        let n_sensors = env.n_sensors();
        config.validate(n_agents)?;
        episode_config.validate()?;

        let obs_dim = episode_config.obs_dim(n_sensors);
        for (what, expected, actual) in [
            ("online obs_dim", obs_dim, online.obs_dim()),
            ("target obs_dim", obs_dim, target.obs_dim()),
            ("target n_actions", online.n_actions(), target.n_actions()),
        ] {
            if expected != actual {
                return Err(SteerError::ShapeMismatch {
                    what: what.into(),
                    expected,
                    actual,
                }
                .into());
            }
        }
        online.param_layout().check_parity(&target.param_layout())?;
        target.set_parameters(&online.get_parameters()?)?;

        let buffer = R::build(&replay_buffer_config)?;
        for (what, expected, actual) in [
            ("replay buffer obs_dim", obs_dim, buffer.obs_dim()),
            ("replay buffer n_actions", online.n_actions(), buffer.n_actions()),
        ] {
            if expected != actual {
                return Err(SteerError::ShapeMismatch {
                    what: what.into(),
                    expected,
                    actual,
                }
                .into());
            }
        }
        if buffer.capacity() < config.batch_size {
            return Err(SteerError::InvalidConfig(format!(
                "replay buffer capacity ({}) must not be smaller than batch_size ({})",
                buffer.capacity(),
                config.batch_size
            ))
            .into());
        }
        let mut scheduler = EpisodeScheduler::new(&episode_config, n_agents, n_sensors)?;
        let all = (0..n_agents).collect::<Vec<_>>();
        scheduler.initialize(&env.reset(&all)?)?;

        info!(
            "Built trainer: {} vehicles, obs_dim = {}, n_actions = {}",
            n_agents,
            obs_dim,
            online.n_actions()
        );

        Ok(Self {
            explorer: EpsilonGreedy::new(&config.explorer),
            context: TrainingContext::new(config.explorer.eps_init),
            stats: RunningStats::new(config.running_avg_window),
            config,
            env,
            online,
            target,
            buffer,
            scheduler,
            n_agents,
            obs_dim,
        })
    }

    /// Replaces the reward shaping of non-terminal steps.
    pub fn with_reward_shaper(mut self, shaper: Box<dyn RewardShaper>) -> Self {
        self.scheduler.set_shaper(shaper);
        self
    }

    /// Counters of the run.
    pub fn context(&self) -> &TrainingContext {
        &self.context
    }

    /// Episode scheduler.
    pub fn scheduler(&self) -> &EpisodeScheduler {
        &self.scheduler
    }

    /// Replay buffer.
    pub fn buffer(&self) -> &R {
        &self.buffer
    }

    /// Online network.
    pub fn online(&self) -> &L {
        &self.online
    }

    /// Target network.
    pub fn target(&self) -> &L {
        &self.target
    }

    /// Environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Copies the online parameters into the target network.
    pub fn sync_target(&mut self) -> Result<()> {
        self.target.set_parameters(&self.online.get_parameters()?)?;
        self.context.last_sync_step = self.context.global_step;
        info!("Synced target network at global step {}", self.context.global_step);
        Ok(())
    }

    fn select_actions(&mut self) -> Result<Vec<usize>> {
        let obs = Array2::from_shape_vec((self.n_agents, self.obs_dim), self.scheduler.current_obs())?;
        let q = self.online.predict(&obs)?;
        Ok(self.explorer.select(&q, self.context.epsilon))
    }

    /// Samples a batch, trains the online network and updates priorities.
    ///
    /// Returns the loss.
    fn optimize(&mut self) -> Result<f32> {
        let batch = self.buffer.batch(self.config.batch_size)?;
        let q_next_target = self.target.predict(&batch.next_obs)?;
        let q_next_online = match self.config.double_dqn {
            true => Some(self.online.predict(&batch.next_obs)?),
            false => None,
        };
        let targets = compute_targets(
            &batch.reward,
            &batch.is_done,
            &q_next_target,
            q_next_online.as_ref(),
            self.config.gamma,
        )?;

        let q = self.online.predict(&batch.obs)?;
        let td_errs = td_errors(&q, &batch.act, &targets);
        let loss = self
            .online
            .train_on_batch(&batch.obs, &batch.act, &targets, &batch.weight)?;
        self.buffer.update_priority(&batch.ix_sample, &td_errs)?;
        self.context.n_opts += 1;

        Ok(loss)
    }

    fn record_episode(&mut self, episode: &FinishedEpisode, recorder: &mut dyn Recorder) {
        let reward = episode.episode_reward + episode.terminal_reward;
        self.stats.push(reward, episode.success);
        info!(
            "Episode {} (vehicle {}): {:?} after {} steps, reward = {:.2}, eps = {:.3}",
            self.context.episodes,
            episode.agent,
            episode.outcome,
            episode.steps,
            reward,
            self.context.epsilon
        );

        recorder.write(Record::from_slice(&[
            ("reward", Scalar(reward)),
            ("episode_reward", Scalar(episode.episode_reward)),
            ("terminal_reward", Scalar(episode.terminal_reward)),
            ("epsilon", Scalar(self.context.epsilon)),
            ("success", Scalar(if episode.success { 1.0 } else { 0.0 })),
            ("agent", Scalar(episode.agent as f32)),
            ("steps", Scalar(episode.steps as f32)),
            ("episode", Scalar(self.context.episodes as f32)),
            ("global_step", Scalar(self.context.global_step as f32)),
            ("reward_avg", Scalar(self.stats.mean_reward())),
            ("success_rate", Scalar(self.stats.success_rate())),
        ]));
    }

    fn save_model(&mut self) -> Result<()> {
        let model_dir = match &self.config.model_dir {
            Some(model_dir) => model_dir,
            None => return Ok(()),
        };
        if self.context.episodes < self.context.last_saved_episode + self.config.save_interval {
            return Ok(());
        }
        let path = Path::new(model_dir).join(format!(
            "e{}_gs{}",
            self.context.episodes, self.context.global_step
        ));
        self.online.save_params(&path)?;
        self.context.last_saved_episode = self.context.episodes;
        info!("Saved the model in {:?}", &path);
        Ok(())
    }

    /// Performs a tick.
    pub fn train_step(&mut self, recorder: &mut dyn Recorder) -> Result<TickReport> {
        // Exploration
        self.context.epsilon = self
            .explorer
            .decay(self.context.epsilon, self.context.global_step);
        self.context.global_step += self.n_agents;
        let actions = self.select_actions()?;

        // Environment step and classification
        let readings = self.env.step(&actions)?;
        let Tick {
            transitions,
            terminated,
            ..
        } = self.scheduler.observe(&actions, &readings)?;

        for tr in transitions {
            self.buffer.push(tr)?;
            self.context.total_inserted += 1;
        }
        self.context.episodes += terminated.len();

        // Optimization
        let loss = if self.context.is_warm(self.config.warmup) {
            if self.context.n_opts == 0 {
                info!(
                    "Warm-up finished with {} transitions, starts optimization",
                    self.context.total_inserted
                );
            }
            let loss = self.optimize()?;
            recorder.write(Record::from_slice(&[
                ("loss", Scalar(loss)),
                ("global_step", Scalar(self.context.global_step as f32)),
            ]));
            Some(loss)
        } else {
            self.context.episodes = 0;
            None
        };

        // Target sync
        let synced = self.context.global_step % self.config.sync_interval == 0;
        if synced {
            self.sync_target()?;
        }

        // Reset terminated vehicles
        let mut finished = vec![];
        if !terminated.is_empty() {
            let readings = self.env.reset(&terminated)?;
            finished = self.scheduler.reset(&terminated, &readings)?;
            for episode in finished.iter() {
                self.record_episode(episode, recorder);
            }
            self.save_model()?;
        }
        debug!(
            "global_step = {}, episodes = {}, inserted = {}",
            self.context.global_step, self.context.episodes, self.context.total_inserted
        );

        if self.context.global_step % self.config.flush_record_interval == 0 {
            recorder.flush(self.context.global_step);
        }

        Ok(TickReport {
            finished,
            loss,
            synced,
        })
    }

    /// Trains until more than `max_episodes` episodes have finished.
    pub fn train(&mut self, recorder: &mut dyn Recorder) -> Result<()> {
        while self.context.episodes <= self.config.max_episodes {
            self.train_step(recorder)?;
        }
        recorder.flush(self.context.global_step);
        info!(
            "Finished training: {} episodes, {} global steps, {} optimization steps",
            self.context.episodes, self.context.global_step, self.context.n_opts
        );
        Ok(())
    }
}
