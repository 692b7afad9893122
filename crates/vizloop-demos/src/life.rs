//! Conway's Game of Life on a toroidal grid.
//!
//! This is the cellular-automaton background: each tick computes the next
//! generation under the B3/S23 rule with edges wrapping around. The run
//! ends on its own when the grid dies out or settles into a still life,
//! since further generations would be identical.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;
use vizloop_core::config::{SchedulerSettings, SimulationConfig};
use vizloop_core::tick::TickContext;

use crate::error::DemoError;

/// Neighbor offsets along one axis.
const OFFSETS: [i8; 3] = [-1, 0, 1];

/// Rectangular grid of live and dead cells with wrapping edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifeGrid {
    width: usize,
    height: usize,
    /// Row-major cell states.
    cells: Vec<bool>,
}

impl LifeGrid {
    /// Create an all-dead grid.
    ///
    /// # Errors
    ///
    /// Returns [`DemoError::InvalidSetting`] if either dimension is zero or
    /// the cell count overflows.
    pub fn empty(width: usize, height: usize) -> Result<Self, DemoError> {
        if width == 0 || height == 0 {
            return Err(DemoError::invalid(
                "grid size",
                format!("{width}x{height} has no cells"),
            ));
        }
        let len = width
            .checked_mul(height)
            .ok_or_else(|| DemoError::invalid("grid size", "cell count overflows"))?;
        Ok(Self {
            width,
            height,
            cells: vec![false; len],
        })
    }

    /// Create a grid where each cell is alive with probability `density`,
    /// drawn from a generator seeded with `seed`.
    ///
    /// # Errors
    ///
    /// Returns [`DemoError::InvalidSetting`] for an empty grid or a density
    /// outside `0.0..=1.0`.
    pub fn random(width: usize, height: usize, density: f64, seed: u64) -> Result<Self, DemoError> {
        if !(0.0..=1.0).contains(&density) {
            return Err(DemoError::invalid(
                "density",
                format!("{density} is not a probability"),
            ));
        }
        let mut grid = Self::empty(width, height)?;
        let mut rng = StdRng::seed_from_u64(seed);
        for cell in &mut grid.cells {
            *cell = rng.random_bool(density);
        }
        Ok(grid)
    }

    /// Parse a grid from rows of `#` (alive) and `.` (dead).
    ///
    /// # Errors
    ///
    /// Returns [`DemoError::InvalidSetting`] for empty input or rows of
    /// different lengths.
    pub fn from_rows(rows: &[&str]) -> Result<Self, DemoError> {
        let width = rows.first().map_or(0, |row| row.chars().count());
        let mut grid = Self::empty(width, rows.len())?;
        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                return Err(DemoError::invalid(
                    "grid rows",
                    format!("row {y} does not have {width} cells"),
                ));
            }
            for (x, cell) in row.chars().enumerate() {
                grid.set(x, y, cell == '#');
            }
        }
        Ok(grid)
    }

    /// Number of columns.
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub const fn height(&self) -> usize {
        self.height
    }

    const fn index(&self, x: usize, y: usize) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        match y.checked_mul(self.width) {
            Some(row) => row.checked_add(x),
            None => None,
        }
    }

    /// Whether the cell at `(x, y)` is alive. Out-of-range cells are dead.
    pub fn is_alive(&self, x: usize, y: usize) -> bool {
        self.index(x, y)
            .and_then(|i| self.cells.get(i))
            .copied()
            .unwrap_or(false)
    }

    /// Set the cell at `(x, y)`. Out-of-range writes are ignored.
    pub fn set(&mut self, x: usize, y: usize, alive: bool) {
        if let Some(cell) = self.index(x, y).and_then(|i| self.cells.get_mut(i)) {
            *cell = alive;
        }
    }

    /// Number of live cells.
    pub fn population(&self) -> usize {
        self.cells.iter().filter(|alive| **alive).count()
    }

    fn live_neighbors(&self, x: usize, y: usize) -> u8 {
        let mut count = 0_u8;
        for dy in OFFSETS {
            for dx in OFFSETS {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = wrap(x, dx, self.width);
                let ny = wrap(y, dy, self.height);
                if self.is_alive(nx, ny) {
                    count = count.saturating_add(1);
                }
            }
        }
        count
    }

    /// Compute the next generation.
    #[must_use]
    pub fn step(&self) -> Self {
        let mut next = self.clone();
        for y in 0..self.height {
            for x in 0..self.width {
                let alive = matches!(
                    (self.is_alive(x, y), self.live_neighbors(x, y)),
                    (true, 2 | 3) | (false, 3)
                );
                next.set(x, y, alive);
            }
        }
        next
    }

    /// Render as rows of `#` and `.`, one line per row.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.cells.len().saturating_add(self.height));
        for y in 0..self.height {
            if y > 0 {
                out.push('\n');
            }
            for x in 0..self.width {
                out.push(if self.is_alive(x, y) { '#' } else { '.' });
            }
        }
        out
    }
}

/// Move `coord` by `delta` (-1, 0, or 1) on a ring of length `len`.
const fn wrap(coord: usize, delta: i8, len: usize) -> usize {
    if delta < 0 {
        if coord == 0 {
            len.saturating_sub(1)
        } else {
            coord.saturating_sub(1)
        }
    } else if delta == 0 {
        coord
    } else {
        let next = coord.saturating_add(1);
        if next >= len { 0 } else { next }
    }
}

/// Simulation state: the grid plus its generation number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifeState {
    /// Generations computed since the seed grid.
    pub generation: u64,
    /// Current cells.
    pub grid: LifeGrid,
}

impl LifeState {
    /// Wrap a seed grid as generation 0.
    pub const fn new(grid: LifeGrid) -> Self {
        Self {
            generation: 0,
            grid,
        }
    }
}

/// One history entry per generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifeLog {
    /// Generation number.
    pub generation: u64,
    /// Live cells in that generation.
    pub population: usize,
}

impl LifeLog {
    /// Summarize a state.
    pub fn from_state(state: &LifeState) -> Self {
        Self {
            generation: state.generation,
            population: state.grid.population(),
        }
    }
}

/// Advance one generation; stop once the grid is empty or unchanging.
pub fn tick(prev: &LifeState, _tick_index: u64, ctx: &mut TickContext) -> LifeState {
    if prev.grid.population() == 0 {
        ctx.stop();
        return prev.clone();
    }
    let grid = prev.grid.step();
    if grid == prev.grid {
        ctx.stop();
        return prev.clone();
    }
    if grid.population() == 0 {
        ctx.stop();
    }
    LifeState {
        generation: prev.generation.saturating_add(1),
        grid,
    }
}

/// Grid parameters for the background automaton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeSettings {
    /// Number of columns.
    #[serde(default = "default_width")]
    pub width: usize,

    /// Number of rows.
    #[serde(default = "default_height")]
    pub height: usize,

    /// Probability that a seed cell starts alive.
    #[serde(default = "default_density")]
    pub density: f64,

    /// Seed for the initial grid.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for LifeSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            density: default_density(),
            seed: default_seed(),
        }
    }
}

const fn default_width() -> usize {
    48
}

const fn default_height() -> usize {
    32
}

const fn default_density() -> f64 {
    0.3
}

const fn default_seed() -> u64 {
    7
}

/// Build the scheduler configuration for a seeded Life run.
///
/// # Errors
///
/// Returns [`DemoError`] for invalid grid settings or scheduler settings.
pub fn simulation(
    settings: &LifeSettings,
    scheduler: &SchedulerSettings,
) -> Result<SimulationConfig<LifeState, LifeLog>, DemoError> {
    let grid = LifeGrid::random(settings.width, settings.height, settings.density, settings.seed)?;
    debug!(
        width = grid.width(),
        height = grid.height(),
        population = grid.population(),
        seed = settings.seed,
        "Life grid seeded"
    );
    let config = SimulationConfig::builder(LifeState::new(grid))
        .settings(scheduler)
        .on_tick(tick)
        .on_log(LifeLog::from_state)
        .build()?;
    Ok(config)
}
