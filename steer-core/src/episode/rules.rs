//! Ordered classification rules.
use super::EpisodeConfig;
use crate::GoalInfo;
use serde::{Deserialize, Serialize};

/// Result of classifying a vehicle on a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Outcome {
    /// The episode continues.
    Active,

    /// The vehicle hit an obstacle.
    Collided,

    /// The vehicle reached its goal.
    GoalReached,

    /// The vehicle ran out of steps.
    TimedOut,
}

impl Outcome {
    /// Returns `true` for every outcome but [`Outcome::Active`].
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Active)
    }

    /// Returns `true` if the goal was reached.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::GoalReached)
    }
}

/// Lifecycle state of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Running an episode.
    Active,

    /// Hit an obstacle on the last tick.
    Collided,

    /// Reached the goal on the last tick.
    GoalReached,

    /// Ran out of steps on the last tick.
    TimedOut,

    /// Episode finalized, waiting for the fresh reading.
    ///
    /// Held only inside [`EpisodeScheduler::reset`](super::EpisodeScheduler::reset),
    /// so it is never seen between ticks.
    Resetting,
}

impl From<Outcome> for Lifecycle {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Active => Lifecycle::Active,
            Outcome::Collided => Lifecycle::Collided,
            Outcome::GoalReached => Lifecycle::GoalReached,
            Outcome::TimedOut => Lifecycle::TimedOut,
        }
    }
}

impl Lifecycle {
    /// Returns the terminal outcome, `None` for non-terminal states.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Lifecycle::Collided => Some(Outcome::Collided),
            Lifecycle::GoalReached => Some(Outcome::GoalReached),
            Lifecycle::TimedOut => Some(Outcome::TimedOut),
            Lifecycle::Active | Lifecycle::Resetting => None,
        }
    }
}

/// What a rule looks at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RuleInput {
    /// Smallest sensor reading.
    pub min_sensor: f32,

    /// Relative goal.
    pub goal: GoalInfo,

    /// Steps taken in the current episode before this tick.
    pub step: usize,
}

/// A predicate paired with the outcome it produces.
pub struct Rule {
    name: String,
    outcome: Outcome,
    predicate: Box<dyn Fn(&RuleInput) -> bool>,
}

impl Rule {
    /// Creates a rule.
    pub fn new(
        name: impl Into<String>,
        outcome: Outcome,
        predicate: impl Fn(&RuleInput) -> bool + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            outcome,
            predicate: Box::new(predicate),
        }
    }

    /// Name of the rule.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Outcome produced when the predicate holds.
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Evaluates the predicate.
    pub fn matches(&self, input: &RuleInput) -> bool {
        (self.predicate)(input)
    }
}

/// Rules evaluated in order; the first match wins.
///
/// An input matching no rule is [`Outcome::Active`].
#[derive(Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Creates an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule with the lowest precedence so far.
    pub fn push(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Collision, then goal, then timeout.
    pub fn standard(config: &EpisodeConfig) -> Self {
        let collision_threshold = config.collision_threshold;
        let goal_tolerance = config.goal_tolerance;
        let heading_tolerance = config.heading_tolerance;
        let max_steps = config.max_steps;

        Self::new()
            .push(Rule::new("collision", Outcome::Collided, move |x| {
                x.min_sensor < collision_threshold
            }))
            .push(Rule::new("goal", Outcome::GoalReached, move |x| {
                x.goal.distance <= goal_tolerance && x.goal.angle.abs() <= heading_tolerance
            }))
            .push(Rule::new("timeout", Outcome::TimedOut, move |x| {
                x.step > max_steps
            }))
    }

    /// Names of the rules in order.
    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Returns the outcome of the first matching rule.
    pub fn classify(&self, input: &RuleInput) -> Outcome {
        self.rules
            .iter()
            .find(|r| r.matches(input))
            .map_or(Outcome::Active, |r| r.outcome())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(min_sensor: f32, distance: f32, angle: f32, step: usize) -> RuleInput {
        RuleInput {
            min_sensor,
            goal: GoalInfo { angle, distance },
            step,
        }
    }

    #[test]
    fn test_standard_rules() {
        let rules = RuleSet::standard(&EpisodeConfig::default());
        assert_eq!(rules.names(), vec!["collision", "goal", "timeout"]);

        assert_eq!(rules.classify(&input(0.5, 0.5, 0.0, 0)), Outcome::Active);
        assert_eq!(rules.classify(&input(0.05, 0.5, 0.0, 0)), Outcome::Collided);
        assert_eq!(rules.classify(&input(0.5, 0.01, 0.0, 0)), Outcome::GoalReached);
        assert_eq!(rules.classify(&input(0.5, 0.5, 0.0, 200)), Outcome::Active);
        assert_eq!(rules.classify(&input(0.5, 0.5, 0.0, 201)), Outcome::TimedOut);
    }

    #[test]
    fn test_collision_takes_precedence() {
        let rules = RuleSet::standard(&EpisodeConfig::default());
        assert_eq!(rules.classify(&input(0.05, 0.01, 0.0, 500)), Outcome::Collided);
        assert_eq!(rules.classify(&input(0.5, 0.01, 0.0, 500)), Outcome::GoalReached);
    }

    #[test]
    fn test_heading_tolerance() {
        let config = EpisodeConfig::default().heading_tolerance(0.1);
        let rules = RuleSet::standard(&config);
        assert_eq!(rules.classify(&input(0.5, 0.01, 0.3, 0)), Outcome::Active);
        assert_eq!(rules.classify(&input(0.5, 0.01, -0.05, 0)), Outcome::GoalReached);
    }

    #[test]
    fn test_custom_rule_order() {
        let rules = RuleSet::new()
            .push(Rule::new("always", Outcome::TimedOut, |_| true))
            .push(Rule::new("collision", Outcome::Collided, |x| x.min_sensor < 0.1));
        assert_eq!(rules.classify(&input(0.0, 1.0, 0.0, 0)), Outcome::TimedOut);
        assert_eq!(RuleSet::new().classify(&input(0.0, 0.0, 0.0, 0)), Outcome::Active);
    }
}
