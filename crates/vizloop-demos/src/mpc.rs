//! Model-predictive control of a cart on a bounded track.
//!
//! The cart is a double integrator: the controller picks an acceleration,
//! velocity integrates acceleration, position integrates velocity. Every
//! tick the controller looks `horizon` steps ahead, chooses the constant
//! acceleration that minimizes a quadratic cost over that window, applies
//! only the first step, and re-plans on the next tick (receding horizon).
//!
//! Because the predicted positions and velocities are affine in the chosen
//! acceleration, the cost is a quadratic in one variable and its minimizer
//! is a fixed linear feedback `u = -(kp * e + kv * v)` on the position
//! error `e` and velocity `v`, clamped to the actuator limit. The gains are
//! computed once from the horizon and weights.
//!
//! The run ends on a terminal state: the cart settles at the goal, or it
//! leaves the track.

use serde::{Deserialize, Serialize};
use tracing::debug;
use vizloop_core::config::{SchedulerSettings, SimulationConfig};
use vizloop_core::tick::TickContext;

use crate::error::DemoError;

/// Whether the cart is still under control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartStatus {
    /// Still moving toward the goal.
    Driving,
    /// Settled within tolerance of the goal.
    GoalReached,
    /// Left the track.
    Crashed,
}

/// Cart state after a control step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartState {
    /// Control steps applied so far.
    pub step: u64,
    /// Position along the track.
    pub position: f64,
    /// Signed velocity.
    pub velocity: f64,
    /// Acceleration applied on the last step.
    pub control: f64,
    /// Terminal classification.
    pub status: CartStatus,
}

impl CartState {
    /// Whether no further control steps will change this state.
    pub fn is_terminal(&self) -> bool {
        self.status != CartStatus::Driving
    }
}

/// Tuning and scenario for the cart controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpcSettings {
    /// Initial position.
    #[serde(default)]
    pub start_position: f64,

    /// Initial velocity.
    #[serde(default)]
    pub start_velocity: f64,

    /// Target position.
    #[serde(default = "default_goal")]
    pub goal: f64,

    /// The track spans `-track_limit..=track_limit`.
    #[serde(default = "default_track_limit")]
    pub track_limit: f64,

    /// Simulated seconds per control step.
    #[serde(default = "default_dt")]
    pub dt: f64,

    /// Number of steps in the prediction window.
    #[serde(default = "default_horizon")]
    pub horizon: u32,

    /// Actuator limit on absolute acceleration.
    #[serde(default = "default_max_accel")]
    pub max_accel: f64,

    /// Cost weight on predicted velocity.
    #[serde(default = "default_velocity_weight")]
    pub velocity_weight: f64,

    /// Cost weight on control effort.
    #[serde(default = "default_control_weight")]
    pub control_weight: f64,

    /// Distance from the goal that counts as arrived.
    #[serde(default = "default_tolerance")]
    pub goal_tolerance: f64,

    /// Speed below which an arrived cart counts as settled.
    #[serde(default = "default_tolerance")]
    pub velocity_tolerance: f64,
}

impl Default for MpcSettings {
    fn default() -> Self {
        Self {
            start_position: 0.0,
            start_velocity: 0.0,
            goal: default_goal(),
            track_limit: default_track_limit(),
            dt: default_dt(),
            horizon: default_horizon(),
            max_accel: default_max_accel(),
            velocity_weight: default_velocity_weight(),
            control_weight: default_control_weight(),
            goal_tolerance: default_tolerance(),
            velocity_tolerance: default_tolerance(),
        }
    }
}

const fn default_goal() -> f64 {
    10.0
}

const fn default_track_limit() -> f64 {
    15.0
}

const fn default_dt() -> f64 {
    0.1
}

const fn default_horizon() -> u32 {
    12
}

const fn default_max_accel() -> f64 {
    2.0
}

const fn default_velocity_weight() -> f64 {
    0.5
}

const fn default_control_weight() -> f64 {
    0.01
}

const fn default_tolerance() -> f64 {
    0.05
}

/// Receding-horizon controller with precomputed feedback gains.
#[derive(Debug, Clone, PartialEq)]
pub struct MpcController {
    goal: f64,
    track_limit: f64,
    dt: f64,
    max_accel: f64,
    goal_tolerance: f64,
    velocity_tolerance: f64,
    /// Gain on position error.
    kp: f64,
    /// Gain on velocity.
    kv: f64,
}

impl MpcController {
    /// Validate settings and derive the feedback gains.
    ///
    /// # Errors
    ///
    /// Returns [`DemoError::InvalidSetting`] for non-positive step size,
    /// horizon, actuator limit, or track, negative weights, or a start or
    /// goal off the track.
    pub fn new(settings: &MpcSettings) -> Result<Self, DemoError> {
        positive("dt", settings.dt)?;
        positive("max_accel", settings.max_accel)?;
        positive("track_limit", settings.track_limit)?;
        positive("goal_tolerance", settings.goal_tolerance)?;
        positive("velocity_tolerance", settings.velocity_tolerance)?;
        non_negative("velocity_weight", settings.velocity_weight)?;
        non_negative("control_weight", settings.control_weight)?;
        if settings.horizon == 0 {
            return Err(DemoError::invalid("horizon", "must be at least 1 step"));
        }
        if settings.goal.abs() >= settings.track_limit {
            return Err(DemoError::invalid("goal", "must lie inside the track"));
        }
        if settings.start_position.abs() > settings.track_limit {
            return Err(DemoError::invalid("start_position", "must lie on the track"));
        }
        if !settings.start_velocity.is_finite() {
            return Err(DemoError::invalid("start_velocity", "must be finite"));
        }

        // Over the window, with t_k = k * dt:
        //   e_k = e + v t_k + u t_k^2 / 2,   v_k = v + u t_k
        //   J(u) = sum e_k^2 + wv * v_k^2 + wu * u^2
        // and dJ/du = 0 gives u = -(kp e + kv v).
        let (mut s1, mut s2, mut s3, mut s4) = (0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64);
        for k in 1..=settings.horizon {
            let t = f64::from(k) * settings.dt;
            s1 += t;
            s2 += t.powi(2);
            s3 += t.powi(3);
            s4 += t.powi(4);
        }
        let wv = settings.velocity_weight;
        let wu = settings.control_weight;
        let denominator = wv.mul_add(s2, 0.25_f64.mul_add(s4, wu));
        let kp = 0.5 * s2 / denominator;
        let kv = wv.mul_add(s1, 0.5 * s3) / denominator;

        Ok(Self {
            goal: settings.goal,
            track_limit: settings.track_limit,
            dt: settings.dt,
            max_accel: settings.max_accel,
            goal_tolerance: settings.goal_tolerance,
            velocity_tolerance: settings.velocity_tolerance,
            kp,
            kv,
        })
    }

    /// Feedback gains `(kp, kv)`.
    pub const fn gains(&self) -> (f64, f64) {
        (self.kp, self.kv)
    }

    /// Optimal first-step acceleration for the given state, clamped to the
    /// actuator limit.
    pub fn plan(&self, position: f64, velocity: f64) -> f64 {
        let error = position - self.goal;
        let feedback = self.kp.mul_add(error, self.kv * velocity);
        (-feedback).clamp(-self.max_accel, self.max_accel)
    }

    /// Apply one control step. Terminal states are returned unchanged.
    pub fn step(&self, prev: &CartState, ctx: &mut TickContext) -> CartState {
        if prev.is_terminal() {
            ctx.stop();
            return prev.clone();
        }

        let control = self.plan(prev.position, prev.velocity);
        let velocity = control.mul_add(self.dt, prev.velocity);
        let position = velocity.mul_add(self.dt, prev.position);

        let status = if position.abs() > self.track_limit {
            CartStatus::Crashed
        } else if (position - self.goal).abs() <= self.goal_tolerance
            && velocity.abs() <= self.velocity_tolerance
        {
            CartStatus::GoalReached
        } else {
            CartStatus::Driving
        };
        if status != CartStatus::Driving {
            ctx.stop();
        }

        CartState {
            step: prev.step.saturating_add(1),
            position,
            velocity,
            control,
            status,
        }
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), DemoError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DemoError::invalid(name, format!("{value} must be positive")))
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), DemoError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(DemoError::invalid(name, format!("{value} must not be negative")))
    }
}

/// One history entry per control step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLog {
    /// Control step number.
    pub step: u64,
    /// Position after the step.
    pub position: f64,
    /// Velocity after the step.
    pub velocity: f64,
    /// Applied acceleration.
    pub control: f64,
    /// Terminal classification.
    pub status: CartStatus,
}

impl CartLog {
    /// Summarize a state.
    pub const fn from_state(state: &CartState) -> Self {
        Self {
            step: state.step,
            position: state.position,
            velocity: state.velocity,
            control: state.control,
            status: state.status,
        }
    }
}

/// Build the scheduler configuration for a cart run.
///
/// # Errors
///
/// Returns [`DemoError`] for invalid controller or scheduler settings.
pub fn simulation(
    settings: &MpcSettings,
    scheduler: &SchedulerSettings,
) -> Result<SimulationConfig<CartState, CartLog>, DemoError> {
    let controller = MpcController::new(settings)?;
    let (kp, kv) = controller.gains();
    debug!(kp, kv, goal = settings.goal, "Cart controller tuned");

    let initial = CartState {
        step: 0,
        position: settings.start_position,
        velocity: settings.start_velocity,
        control: 0.0,
        status: CartStatus::Driving,
    };
    let config = SimulationConfig::builder(initial)
        .settings(scheduler)
        .on_tick(move |prev, _, ctx| controller.step(prev, ctx))
        .on_log(CartLog::from_state)
        .build()?;
    Ok(config)
}
