//! Headless state machines behind the Vizloop visualizations.
//!
//! Each demo is a pure transition function plus a log summary, packaged
//! as a [`SimulationConfig`] ready for a scheduler. Rendering lives
//! elsewhere; these modules only own state.
//!
//! # Modules
//!
//! - [`attention`] -- Softmax attention head following a rotating query.
//! - [`error`] -- [`DemoError`] for rejected settings.
//! - [`life`] -- Conway's Game of Life on a torus.
//! - [`mpc`] -- Receding-horizon control of a cart on a track.
//!
//! [`SimulationConfig`]: vizloop_core::config::SimulationConfig
//! [`DemoError`]: error::DemoError

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod attention;
pub mod error;
pub mod life;
pub mod mpc;

use crate::error::DemoError;

/// Which demo to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemoKind {
    /// [`life`]
    #[default]
    Life,
    /// [`mpc`]
    Mpc,
    /// [`attention`]
    Attention,
}

impl fmt::Display for DemoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Life => "life",
            Self::Mpc => "mpc",
            Self::Attention => "attention",
        };
        f.write_str(name)
    }
}

impl FromStr for DemoKind {
    type Err = DemoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "life" => Ok(Self::Life),
            "mpc" => Ok(Self::Mpc),
            "attention" => Ok(Self::Attention),
            _ => Err(DemoError::UnknownDemo {
                name: s.to_owned(),
            }),
        }
    }
}
