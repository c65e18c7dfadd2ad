//! Per-vehicle episode bookkeeping.
use super::{EpisodeConfig, Lifecycle, Outcome, RewardShaper, RuleInput, RuleSet};
use crate::{error::SteerError, obs_window::ObservationWindow, replay_buffer::Transition, AgentReading};
use anyhow::Result;
use log::trace;

/// State of a single vehicle.
#[derive(Clone, Debug)]
pub struct AgentState {
    window: ObservationWindow,
    episode_reward: f32,
    step: usize,
    lifecycle: Lifecycle,
    prev_goal_distance: f32,
    terminal_reward: f32,
}

impl AgentState {
    fn new(frame_count: usize, frame_dim: usize) -> Result<Self> {
        Ok(Self {
            window: ObservationWindow::new(frame_count, frame_dim)?,
            episode_reward: 0.0,
            step: 0,
            lifecycle: Lifecycle::Active,
            prev_goal_distance: 0.0,
            terminal_reward: 0.0,
        })
    }

    /// Takes the bookkeeping of the ended episode and enters [`Lifecycle::Resetting`].
    fn finalize(&mut self, agent: usize) -> Result<FinishedEpisode, SteerError> {
        let outcome = self
            .lifecycle
            .outcome()
            .ok_or(SteerError::AgentNotTerminal(agent))?;
        self.lifecycle = Lifecycle::Resetting;
        Ok(FinishedEpisode {
            agent,
            outcome,
            episode_reward: self.episode_reward,
            steps: self.step,
            terminal_reward: self.terminal_reward,
            success: outcome.is_success(),
        })
    }

    fn restart(&mut self, reading: &AgentReading) -> Result<()> {
        self.episode_reward = 0.0;
        self.step = 0;
        self.terminal_reward = 0.0;
        self.window.reset(&reading.frame())?;
        self.prev_goal_distance = reading.goal.distance;
        self.lifecycle = Lifecycle::Active;
        Ok(())
    }

    /// Observation window.
    pub fn window(&self) -> &ObservationWindow {
        &self.window
    }

    /// Discounted sum of non-terminal rewards in the current episode.
    pub fn episode_reward(&self) -> f32 {
        self.episode_reward
    }

    /// Non-terminal steps taken in the current episode.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }
}

/// Bookkeeping of an episode, taken just before the vehicle is reset.
#[derive(Clone, Debug, PartialEq)]
pub struct FinishedEpisode {
    /// Vehicle index.
    pub agent: usize,

    /// How the episode ended.
    pub outcome: Outcome,

    /// Discounted sum of non-terminal rewards.
    pub episode_reward: f32,

    /// Non-terminal steps taken.
    pub steps: usize,

    /// Reward of the terminating step.
    pub terminal_reward: f32,

    /// `true` if the goal was reached.
    pub success: bool,
}

/// Result of classifying every vehicle on a tick.
#[derive(Clone, Debug, PartialEq)]
pub struct Tick {
    /// One transition per vehicle, in vehicle order.
    pub transitions: Vec<Transition>,

    /// One outcome per vehicle, in vehicle order.
    pub outcomes: Vec<Outcome>,

    /// Vehicles whose episode ended on this tick, in increasing order.
    pub terminated: Vec<usize>,
}

/// Classifies vehicles, assigns rewards and manages resets.
pub struct EpisodeScheduler {
    agents: Vec<AgentState>,
    rules: RuleSet,
    shaper: Box<dyn RewardShaper>,
    discount: f32,
    goal_reward: f32,
    fail_reward: f32,
}

impl EpisodeScheduler {
    /// Creates a scheduler with the standard rules and distance-based shaping.
    pub fn new(config: &EpisodeConfig, n_agents: usize, n_sensors: usize) -> Result<Self> {
        Self::with_parts(
            config,
            n_agents,
            n_sensors,
            RuleSet::standard(config),
            Box::new(config.shaping.clone()),
        )
    }

    /// Creates a scheduler with custom rules and reward shaping.
    pub fn with_parts(
        config: &EpisodeConfig,
        n_agents: usize,
        n_sensors: usize,
        rules: RuleSet,
        shaper: Box<dyn RewardShaper>,
    ) -> Result<Self> {
        let agents = (0..n_agents)
            .map(|_| AgentState::new(config.frame_count, n_sensors + 2))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            agents,
            rules,
            shaper,
            discount: config.discount,
            goal_reward: config.goal_reward,
            fail_reward: config.fail_reward,
        })
    }

    /// Replaces the reward shaping.
    pub fn set_shaper(&mut self, shaper: Box<dyn RewardShaper>) {
        self.shaper = shaper;
    }

    /// Number of vehicles.
    pub fn n_agents(&self) -> usize {
        self.agents.len()
    }

    /// State of vehicle `agent`.
    pub fn agent(&self, agent: usize) -> Option<&AgentState> {
        self.agents.get(agent)
    }

    /// States of all vehicles.
    pub fn agents(&self) -> &[AgentState] {
        &self.agents
    }

    /// Current observations of all vehicles, concatenated in vehicle order.
    pub fn current_obs(&self) -> Vec<f32> {
        self.agents
            .iter()
            .flat_map(|s| s.window.current())
            .collect()
    }

    fn check_len(what: &str, expected: usize, actual: usize) -> Result<(), SteerError> {
        if expected != actual {
            return Err(SteerError::ShapeMismatch {
                what: what.into(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Starts a fresh episode for every vehicle from initial readings.
    pub fn initialize(&mut self, readings: &[AgentReading]) -> Result<()> {
        Self::check_len("initial readings", self.agents.len(), readings.len())?;
        for (state, reading) in self.agents.iter_mut().zip(readings.iter()) {
            state.restart(reading)?;
        }
        Ok(())
    }

    /// Classifies every vehicle after an environment step.
    ///
    /// The rules see the step count before this tick. A terminal vehicle gets
    /// `done = 1` and the collision or goal constant as reward (timeouts get
    /// the shaped reward) and stays terminal until [`EpisodeScheduler::reset`].
    /// An active vehicle adds `reward * discount^step` to its episode reward
    /// and increments its step count.
    pub fn observe(&mut self, actions: &[usize], readings: &[AgentReading]) -> Result<Tick> {
        let n = self.agents.len();
        Self::check_len("actions", n, actions.len())?;
        Self::check_len("readings", n, readings.len())?;

        let mut transitions = Vec::with_capacity(n);
        let mut outcomes = Vec::with_capacity(n);
        let mut terminated = vec![];

        for (agent, state) in self.agents.iter_mut().enumerate() {
            if state.lifecycle != Lifecycle::Active {
                return Err(SteerError::AgentNotActive(agent).into());
            }
            let reading = &readings[agent];
            let act = actions[agent];
            state.window.push(&reading.frame())?;

            let input = RuleInput {
                min_sensor: reading.min_sensor(),
                goal: reading.goal,
                step: state.step,
            };
            let outcome = self.rules.classify(&input);
            let reward = match outcome {
                Outcome::Collided => self.fail_reward,
                Outcome::GoalReached => self.goal_reward,
                Outcome::TimedOut | Outcome::Active => {
                    self.shaper.reward(state.prev_goal_distance, reading, act)
                }
            };
            state.prev_goal_distance = reading.goal.distance;

            let is_done = if outcome.is_terminal() {
                state.lifecycle = outcome.into();
                state.terminal_reward = reward;
                terminated.push(agent);
                1
            } else {
                state.episode_reward += reward * self.discount.powi(state.step as i32);
                state.step += 1;
                0
            };
            trace!("agent {}: {:?}, reward = {}", agent, outcome, reward);

            transitions.push(Transition::new(
                state.window.previous(),
                act,
                reward,
                state.window.current(),
                is_done,
            ));
            outcomes.push(outcome);
        }

        Ok(Tick {
            transitions,
            outcomes,
            terminated,
        })
    }

    /// Vehicles in a terminal state.
    pub fn terminated(&self) -> Vec<usize> {
        self.agents
            .iter()
            .enumerate()
            .filter(|(_, s)| s.lifecycle.outcome().is_some())
            .map(|(i, _)| i)
            .collect()
    }

    /// Checks a reset request before any vehicle is touched.
    fn check_reset(&self, agents: &[usize], readings: &[AgentReading]) -> Result<(), SteerError> {
        Self::check_len("reset readings", agents.len(), readings.len())?;
        let n = self.agents.len();
        let mut seen = vec![false; n];
        for (&agent, reading) in agents.iter().zip(readings.iter()) {
            let state = self
                .agents
                .get(agent)
                .ok_or(SteerError::IndexOutOfRange { index: agent, len: n })?;
            if seen[agent] {
                return Err(SteerError::DuplicateAgent(agent));
            }
            seen[agent] = true;
            if state.lifecycle.outcome().is_none() {
                return Err(SteerError::AgentNotTerminal(agent));
            }
            Self::check_len("reset reading frame", state.window.frame_dim(), reading.frame().len())?;
        }
        Ok(())
    }

    /// Finalizes the episodes of terminated vehicles and restarts them.
    ///
    /// `readings` are the fresh readings of `agents`, in the same order. The
    /// whole request is checked first; on error no vehicle is modified.
    /// [`Lifecycle::Resetting`] is held between finalizing every requested
    /// vehicle and restarting them, within this call.
    pub fn reset(&mut self, agents: &[usize], readings: &[AgentReading]) -> Result<Vec<FinishedEpisode>> {
        self.check_reset(agents, readings)?;

        let finished = agents
            .iter()
            .map(|&agent| self.agents[agent].finalize(agent))
            .collect::<Result<Vec<_>, _>>()?;
        for (&agent, reading) in agents.iter().zip(readings.iter()) {
            self.agents[agent].restart(reading)?;
        }

        Ok(finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GoalInfo;

    fn reading(min_sensor: f32, goal_distance: f32) -> AgentReading {
        AgentReading {
            position: [0.0, 0.0],
            heading: 0.0,
            sensors: vec![min_sensor, 1.0],
            goal: GoalInfo {
                angle: 0.0,
                distance: goal_distance,
            },
        }
    }

    fn scheduler(n_agents: usize, config: &EpisodeConfig) -> EpisodeScheduler {
        let mut s = EpisodeScheduler::new(config, n_agents, 2).unwrap();
        s.initialize(&vec![reading(1.0, 0.5); n_agents]).unwrap();
        s
    }

    #[test]
    fn test_classify_and_reset() {
        let config = EpisodeConfig::default();
        let mut s = scheduler(3, &config);

        let readings = vec![reading(0.05, 0.5), reading(1.0, 0.01), reading(1.0, 0.4)];
        let tick = s.observe(&[0, 1, 2], &readings).unwrap();
        assert_eq!(
            tick.outcomes,
            vec![Outcome::Collided, Outcome::GoalReached, Outcome::Active]
        );
        assert_eq!(tick.terminated, vec![0, 1]);
        assert_eq!(s.terminated(), vec![0, 1]);
        assert_eq!(
            tick.transitions.iter().map(|t| t.is_done).collect::<Vec<_>>(),
            vec![1, 1, 0]
        );
        assert_eq!(tick.transitions[0].reward, -2000.0);
        assert_eq!(tick.transitions[1].reward, 6000.0);
        assert_eq!(tick.transitions[1].obs, vec![1.0, 1.0, 0.0, 0.5]);
        assert_eq!(tick.transitions[1].next_obs, vec![1.0, 1.0, 0.0, 0.01]);
        assert_eq!(s.agent(2).unwrap().step(), 1);

        // A terminal vehicle must be reset before the next step
        assert!(s.observe(&[0, 1, 2], &readings).is_err());

        let finished = s
            .reset(&[0, 1], &[reading(1.0, 0.9), reading(1.0, 0.8)])
            .unwrap();
        assert_eq!(finished[0].outcome, Outcome::Collided);
        assert!(!finished[0].success);
        assert_eq!(finished[0].terminal_reward, -2000.0);
        assert_eq!(finished[0].episode_reward, 0.0);
        assert!(finished[1].success);
        assert_eq!(s.agent(0).unwrap().lifecycle(), Lifecycle::Active);
        assert_eq!(s.agent(0).unwrap().window().current(), vec![1.0, 1.0, 0.0, 0.9]);
        assert!(s.terminated().is_empty());
    }

    #[test]
    fn test_discounted_episode_reward() {
        let config = EpisodeConfig::default().discount(0.5);
        let mut s = EpisodeScheduler::with_parts(
            &config,
            1,
            2,
            RuleSet::standard(&config),
            Box::new(ConstShaper(2.0)),
        )
        .unwrap();
        s.initialize(&[reading(1.0, 0.5)]).unwrap();
        for _ in 0..3 {
            s.observe(&[0], &[reading(1.0, 0.5)]).unwrap();
        }
        // 2 + 2 * 0.5 + 2 * 0.25
        assert_eq!(s.agent(0).unwrap().episode_reward(), 3.5);
        assert_eq!(s.agent(0).unwrap().step(), 3);
    }

    #[test]
    fn test_timeout() {
        let config = EpisodeConfig::default().max_steps(2);
        let mut s = scheduler(1, &config);
        for _ in 0..3 {
            let tick = s.observe(&[0], &[reading(1.0, 0.5)]).unwrap();
            assert_eq!(tick.outcomes, vec![Outcome::Active]);
        }
        let tick = s.observe(&[0], &[reading(1.0, 0.5)]).unwrap();
        assert_eq!(tick.outcomes, vec![Outcome::TimedOut]);
        let finished = s.reset(&[0], &[reading(1.0, 0.5)]).unwrap();
        assert_eq!(finished[0].steps, 3);
        assert_eq!(finished[0].outcome, Outcome::TimedOut);
    }

    #[test]
    fn test_reset_of_active_agent_fails() {
        let mut s = scheduler(2, &EpisodeConfig::default());
        assert!(s.reset(&[1], &[reading(1.0, 0.5)]).is_err());
        assert!(s.reset(&[5], &[reading(1.0, 0.5)]).is_err());
        assert!(s.observe(&[0], &[reading(1.0, 0.5)]).is_err());
    }

    fn reset_error(s: &mut EpisodeScheduler, agents: &[usize]) -> SteerError {
        let readings = vec![reading(1.0, 0.9); agents.len()];
        let err = s.reset(agents, &readings).unwrap_err();
        err.downcast_ref::<SteerError>().unwrap().clone()
    }

    #[test]
    fn test_rejected_reset_keeps_terminal_agents() {
        let mut s = scheduler(3, &EpisodeConfig::default());
        let readings = vec![reading(0.05, 0.5), reading(1.0, 0.4), reading(0.05, 0.5)];
        s.observe(&[0, 1, 2], &readings).unwrap();
        assert_eq!(s.terminated(), vec![0, 2]);

        assert_eq!(reset_error(&mut s, &[0, 1]), SteerError::AgentNotTerminal(1));
        assert_eq!(reset_error(&mut s, &[0, 0]), SteerError::DuplicateAgent(0));
        assert!(matches!(
            reset_error(&mut s, &[2, 7]),
            SteerError::IndexOutOfRange { index: 7, len: 3 }
        ));
        let err = s.reset(&[0], &[reading(1.0, 0.5), reading(1.0, 0.5)]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SteerError>(),
            Some(SteerError::ShapeMismatch { .. })
        ));

        // Nothing was finalized by the rejected requests
        assert_eq!(s.terminated(), vec![0, 2]);
        assert_eq!(s.agent(0).unwrap().lifecycle(), Lifecycle::Collided);
        assert_eq!(s.agent(1).unwrap().step(), 1);

        let finished = s.reset(&[2, 0], &[reading(1.0, 0.9), reading(1.0, 0.8)]).unwrap();
        assert_eq!(
            finished.iter().map(|f| (f.agent, f.outcome)).collect::<Vec<_>>(),
            vec![(2, Outcome::Collided), (0, Outcome::Collided)]
        );
        assert!(s.terminated().is_empty());
    }

    #[test]
    fn test_finalize_enters_resetting() {
        let mut state = AgentState::new(1, 4).unwrap();
        assert!(state.finalize(0).is_err());

        state.lifecycle = Lifecycle::GoalReached;
        state.terminal_reward = 6000.0;
        let episode = state.finalize(0).unwrap();
        assert!(episode.success);
        assert_eq!(state.lifecycle(), Lifecycle::Resetting);

        state.restart(&reading(1.0, 0.5)).unwrap();
        assert_eq!(state.lifecycle(), Lifecycle::Active);
        assert_eq!(state.window().current(), vec![1.0, 1.0, 0.0, 0.5]);
    }

    #[test]
    fn test_empty_frames_are_rejected() {
        let config = EpisodeConfig::default().frame_count(0);
        assert!(EpisodeScheduler::new(&config, 2, 3).is_err());
    }

    struct ConstShaper(f32);

    impl RewardShaper for ConstShaper {
        fn reward(&self, _: f32, _: &AgentReading, _: usize) -> f32 {
            self.0
        }
    }
}
