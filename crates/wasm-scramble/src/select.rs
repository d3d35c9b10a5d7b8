//! Node/level selection policies.
//!
//! Each fuzz iteration picks one granularity tier, then one node within it.
//! Tier choice is pluggable: uniform by default, weighted roulette for
//! manually tuned distributions, or an adaptive multi-armed bandit when the
//! embedding harness wires a fitness signal into
//! [`report_reward`][crate::WasmScramble::report_reward]. The bandit types
//! are process-lifetime state machines over per-arm pull counts and reward
//! accumulators; they never terminate.

use rand::rngs::SmallRng;
use rand::Rng;
use rand_distr::{Beta, Distribution};

/// How a tier is chosen on each iteration.
#[derive(Debug, Clone)]
pub enum TierStrategy {
    /// Uniform-random over tiers.
    Uniform,
    /// Weighted roulette with fixed, manually assigned weights, one per
    /// tier in depth order.
    Roulette(Vec<f64>),
    /// Explore with probability epsilon, otherwise exploit the arm with the
    /// highest running-average reward. The adaptive variant shrinks epsilon
    /// proportionally to `1 / sqrt(t)`.
    EpsilonGreedy {
        /// Initial exploration probability.
        epsilon: f64,
        /// Shrink epsilon as rounds accumulate.
        adaptive: bool,
    },
    /// Sample a Beta posterior per arm and pick the max. The base variant
    /// takes binary rewards; the adaptive variant accepts fractional ones.
    Thompson {
        /// Accept fractional rewards.
        adaptive: bool,
    },
}

impl Default for TierStrategy {
    fn default() -> Self {
        TierStrategy::Uniform
    }
}

/// Roulette-wheel selection over `(item, weight)` pairs: draw uniformly
/// over the total weight and return the first item whose cumulative weight
/// meets the draw.
pub fn weighted_choice<'a, T>(choices: &'a [(T, f64)], rng: &mut SmallRng) -> Option<&'a T> {
    let total: f64 = choices.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return None;
    }
    let draw = rng.random_range(0.0..total);
    let mut cumulative = 0.0;
    for (item, weight) in choices {
        cumulative += weight;
        if cumulative >= draw {
            return Some(item);
        }
    }
    choices.last().map(|(item, _)| item)
}

/// Roulette wheel with precomputed cumulative weights, for repeated draws:
/// a binary search instead of a linear scan per draw.
#[derive(Debug, Clone)]
pub struct WeightedIndexTable {
    cumulative: Vec<f64>,
}

impl WeightedIndexTable {
    /// Precompute the cumulative weight table.
    pub fn new(weights: &[f64]) -> WeightedIndexTable {
        let mut total = 0.0;
        let cumulative = weights
            .iter()
            .map(|w| {
                total += w.max(0.0);
                total
            })
            .collect();
        WeightedIndexTable { cumulative }
    }

    /// Draw one index according to the weights.
    pub fn sample(&self, rng: &mut SmallRng) -> usize {
        let total = self.cumulative.last().copied().unwrap_or(0.0);
        if total <= 0.0 {
            return 0;
        }
        let draw = rng.random_range(0.0..total);
        self.cumulative.partition_point(|&c| c <= draw)
    }
}

/// Epsilon-greedy bandit over a fixed arm count.
#[derive(Debug, Clone)]
pub struct EpsilonGreedy {
    epsilon: f64,
    adaptive: bool,
    q_values: Vec<f64>,
    arm_pulls: Vec<u64>,
    rounds: u64,
}

impl EpsilonGreedy {
    /// A bandit with the given arm count and initial exploration rate.
    pub fn new(num_arms: usize, epsilon: f64, adaptive: bool) -> EpsilonGreedy {
        EpsilonGreedy {
            epsilon,
            adaptive,
            q_values: vec![0.0; num_arms],
            arm_pulls: vec![0; num_arms],
            rounds: 0,
        }
    }

    /// Pick an arm: explore uniformly with probability epsilon, otherwise
    /// exploit the best running average.
    pub fn choose_arm(&self, rng: &mut SmallRng) -> usize {
        if rng.random_range(0.0..1.0) < self.epsilon {
            return rng.random_range(0..self.q_values.len());
        }
        self.best_arm()
    }

    fn best_arm(&self) -> usize {
        let mut best = 0;
        for (arm, q) in self.q_values.iter().enumerate() {
            if *q > self.q_values[best] {
                best = arm;
            }
        }
        best
    }

    /// Fold a reward into the chosen arm's running average.
    pub fn update(&mut self, arm: usize, reward: f64) {
        self.rounds += 1;
        self.arm_pulls[arm] += 1;
        let pulls = self.arm_pulls[arm] as f64;
        let current = self.q_values[arm];
        self.q_values[arm] = (current * (pulls - 1.0) + reward) / pulls;
        if self.adaptive {
            self.epsilon = 1.0 / (self.rounds as f64).sqrt();
        }
    }
}

/// Thompson-sampling bandit: a Beta posterior per arm.
#[derive(Debug, Clone)]
pub struct ThompsonSampler {
    alpha: Vec<f64>,
    beta: Vec<f64>,
    adaptive: bool,
}

impl ThompsonSampler {
    /// A sampler with uninformative Beta(1, 1) priors on every arm.
    pub fn new(num_arms: usize, adaptive: bool) -> ThompsonSampler {
        ThompsonSampler {
            alpha: vec![1.0; num_arms],
            beta: vec![1.0; num_arms],
            adaptive,
        }
    }

    /// Sample every posterior and pick the arm with the largest draw.
    pub fn choose_arm(&self, rng: &mut SmallRng) -> usize {
        let mut best = 0;
        let mut best_sample = f64::MIN;
        for arm in 0..self.alpha.len() {
            // Parameters stay >= 1, so construction cannot fail.
            let sample = Beta::new(self.alpha[arm], self.beta[arm])
                .map(|dist| dist.sample(rng))
                .unwrap_or(0.0);
            if sample > best_sample {
                best = arm;
                best_sample = sample;
            }
        }
        best
    }

    /// Update the chosen arm's posterior. The base variant counts a reward
    /// of at least 0.5 as a success; the adaptive variant credits the
    /// fraction directly.
    pub fn update(&mut self, arm: usize, reward: f64) {
        let reward = reward.clamp(0.0, 1.0);
        if self.adaptive {
            self.alpha[arm] += reward;
            self.beta[arm] += 1.0 - reward;
        } else if reward >= 0.5 {
            self.alpha[arm] += 1.0;
        } else {
            self.beta[arm] += 1.0;
        }
    }
}

/// The instantiated tier picker held by the engine for its lifetime.
#[derive(Debug, Clone)]
pub(crate) enum TierPicker {
    Uniform,
    Roulette(WeightedIndexTable),
    EpsilonGreedy(EpsilonGreedy),
    Thompson(ThompsonSampler),
}

impl TierPicker {
    pub(crate) fn new(strategy: &TierStrategy, num_arms: usize) -> TierPicker {
        match strategy {
            TierStrategy::Uniform => TierPicker::Uniform,
            TierStrategy::Roulette(weights) => {
                let mut weights = weights.clone();
                weights.resize(num_arms, 1.0);
                TierPicker::Roulette(WeightedIndexTable::new(&weights))
            }
            TierStrategy::EpsilonGreedy { epsilon, adaptive } => {
                TierPicker::EpsilonGreedy(EpsilonGreedy::new(num_arms, *epsilon, *adaptive))
            }
            TierStrategy::Thompson { adaptive } => {
                TierPicker::Thompson(ThompsonSampler::new(num_arms, *adaptive))
            }
        }
    }

    pub(crate) fn choose(&self, num_arms: usize, rng: &mut SmallRng) -> usize {
        match self {
            TierPicker::Uniform => rng.random_range(0..num_arms),
            TierPicker::Roulette(table) => table.sample(rng),
            TierPicker::EpsilonGreedy(bandit) => bandit.choose_arm(rng),
            TierPicker::Thompson(sampler) => sampler.choose_arm(rng),
        }
    }

    pub(crate) fn update(&mut self, arm: usize, reward: f64) {
        match self {
            TierPicker::Uniform | TierPicker::Roulette(_) => {}
            TierPicker::EpsilonGreedy(bandit) => bandit.update(arm, reward),
            TierPicker::Thompson(sampler) => sampler.update(arm, reward),
        }
    }
}
