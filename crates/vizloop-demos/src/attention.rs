//! A single attention head tracking a rotating query.
//!
//! Keys are unit vectors spread evenly around the circle. Each tick the
//! query rotates by a fixed angle and the head recomputes its softmax
//! weights over the scaled dot products `q . k / temperature`. For unit
//! vectors the dot product is `cos(query - key)`, so only angles are kept.
//! The visualization shows focus sweeping from key to key. The run never
//! reaches a terminal state.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vizloop_core::config::{SchedulerSettings, SimulationConfig};

use crate::error::DemoError;

/// Upper bound on the number of keys.
pub const MAX_KEYS: usize = 256;

/// Smallest accepted softmax temperature. Scores are bounded by
/// `1 / temperature`, which must stay finite.
pub const MIN_TEMPERATURE: f64 = 1e-6;

/// Settings for the attention demo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionSettings {
    /// Number of keys around the circle.
    #[serde(default = "default_keys")]
    pub keys: usize,

    /// Radians the query rotates per tick.
    #[serde(default = "default_angular_speed")]
    pub angular_speed: f64,

    /// Softmax temperature. Lower is sharper.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for AttentionSettings {
    fn default() -> Self {
        Self {
            keys: default_keys(),
            angular_speed: default_angular_speed(),
            temperature: default_temperature(),
        }
    }
}

const fn default_keys() -> usize {
    8
}

const fn default_angular_speed() -> f64 {
    0.15
}

const fn default_temperature() -> f64 {
    0.25
}

/// Fixed key layout and scoring parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AttentionHead {
    key_angles: Vec<f64>,
    angular_speed: f64,
    temperature: f64,
}

impl AttentionHead {
    /// Lay out keys evenly around the circle.
    ///
    /// # Errors
    ///
    /// Returns [`DemoError::InvalidSetting`] when the key count is zero or
    /// above [`MAX_KEYS`], or the speed or temperature is not usable.
    pub fn new(settings: &AttentionSettings) -> Result<Self, DemoError> {
        if settings.keys == 0 || settings.keys > MAX_KEYS {
            return Err(DemoError::invalid(
                "keys",
                format!("{} is outside 1..={MAX_KEYS}", settings.keys),
            ));
        }
        if !settings.angular_speed.is_finite() {
            return Err(DemoError::invalid("angular_speed", "must be finite"));
        }
        if !(settings.temperature.is_finite() && settings.temperature >= MIN_TEMPERATURE) {
            return Err(DemoError::invalid(
                "temperature",
                format!("{} is below {MIN_TEMPERATURE}", settings.temperature),
            ));
        }

        let count = u32::try_from(settings.keys)
            .map_err(|e| DemoError::invalid("keys", e.to_string()))?;
        let key_angles = (0..count)
            .map(|i| TAU * f64::from(i) / f64::from(count))
            .collect();

        Ok(Self {
            key_angles,
            angular_speed: settings.angular_speed,
            temperature: settings.temperature,
        })
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.key_angles.len()
    }

    /// Always false; a head has at least one key.
    pub fn is_empty(&self) -> bool {
        self.key_angles.is_empty()
    }

    /// Softmax attention weights for a query at `query_angle`.
    pub fn weights(&self, query_angle: f64) -> Vec<f64> {
        let scores: Vec<f64> = self
            .key_angles
            .iter()
            .map(|key| (query_angle - key).cos() / self.temperature)
            .collect();
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
        let total: f64 = exps.iter().sum();
        exps.into_iter().map(|e| e / total).collect()
    }

    /// Rotate the query one step and recompute weights.
    pub fn step(&self, prev: &AttentionState) -> AttentionState {
        let query_angle = (prev.query_angle + self.angular_speed).rem_euclid(TAU);
        AttentionState {
            step: prev.step.saturating_add(1),
            query_angle,
            weights: self.weights(query_angle),
        }
    }

    /// State before the first tick, with the query at angle zero.
    pub fn initial_state(&self) -> AttentionState {
        AttentionState {
            step: 0,
            query_angle: 0.0,
            weights: self.weights(0.0),
        }
    }
}

/// Query position and the resulting weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionState {
    /// Ticks applied so far.
    pub step: u64,
    /// Query angle in `0..TAU`.
    pub query_angle: f64,
    /// One weight per key, summing to one.
    pub weights: Vec<f64>,
}

impl AttentionState {
    /// Index and weight of the most attended key.
    pub fn focus(&self) -> Option<(usize, f64)> {
        self.weights
            .iter()
            .copied()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
    }
}

/// One history entry per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionLog {
    /// Tick number.
    pub step: u64,
    /// Most attended key.
    pub focus: usize,
    /// Its weight.
    pub weight: f64,
}

impl AttentionLog {
    /// Summarize a state.
    pub fn from_state(state: &AttentionState) -> Self {
        let (focus, weight) = state.focus().unwrap_or((0, 0.0));
        Self {
            step: state.step,
            focus,
            weight,
        }
    }
}

/// Build the scheduler configuration for an attention run.
///
/// # Errors
///
/// Returns [`DemoError`] for invalid head or scheduler settings.
pub fn simulation(
    settings: &AttentionSettings,
    scheduler: &SchedulerSettings,
) -> Result<SimulationConfig<AttentionState, AttentionLog>, DemoError> {
    let head = AttentionHead::new(settings)?;
    debug!(keys = head.len(), temperature = settings.temperature, "Attention head built");

    let config = SimulationConfig::builder(head.initial_state())
        .settings(scheduler)
        .on_tick(move |prev, _, _| head.step(prev))
        .on_log(AttentionLog::from_state)
        .build()?;
    Ok(config)
}
