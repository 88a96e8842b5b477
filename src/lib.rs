pub mod console_log;
pub mod divider;
pub mod error;
pub mod finder;
pub mod matchmaker;
pub mod outcome;
pub mod seed;
pub mod simulation;
pub mod types;

pub use error::{ConfigError, SimError};
pub use simulation::Simulation;

use std::fmt::Display;
use types::*;
use wasm_bindgen::prelude::*;

/// Install panic hook and console logging
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    #[cfg(target_arch = "wasm32")]
    {
        // a second init keeps the logger that is already installed
        let _ = console_log::install();
    }
}

fn js_error(context: &str, e: impl Display) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, e))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| js_error("Serialization error", e))
}

/// WASM-exposed simulation wrapper
#[wasm_bindgen]
pub struct SimulationEngine {
    sim: Simulation,
}

#[wasm_bindgen]
impl SimulationEngine {
    /// Create a new simulation with default config
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64) -> Result<SimulationEngine, JsValue> {
        let sim = Simulation::new(SimulationConfig::default(), seed).map_err(|e| js_error("Config error", e))?;
        Ok(SimulationEngine { sim })
    }

    /// Create with custom config
    pub fn new_with_config(seed: u64, config_json: &str) -> Result<SimulationEngine, JsValue> {
        let config: SimulationConfig =
            serde_json::from_str(config_json).map_err(|e| js_error("Config parse error", e))?;
        let sim = Simulation::new(config, seed).map_err(|e| js_error("Config error", e))?;
        Ok(SimulationEngine { sim })
    }

    /// Generate player population
    pub fn generate_population(&mut self, count: usize) -> Result<(), JsValue> {
        self.sim
            .generate_population(count)
            .map_err(|e| js_error("Population error", e))
    }

    /// Play one round, returning its summary as JSON
    pub fn play_round(&mut self) -> Result<String, JsValue> {
        let summary = self.sim.play_round().map_err(|e| js_error("Round error", e))?;
        to_json(&summary)
    }

    /// Play several rounds, returning every summary as JSON
    pub fn run(&mut self, rounds: u64) -> Result<String, JsValue> {
        let summaries = self.sim.run(rounds).map_err(|e| js_error("Round error", e))?;
        to_json(&summaries)
    }

    /// Per-player records as JSON
    pub fn get_players(&self) -> Result<String, JsValue> {
        to_json(&self.sim.player_records())
    }

    /// Rating histogram; a zero bin size uses the configured one
    pub fn get_histogram(&self, bin_size: i32) -> Result<String, JsValue> {
        let bin_size = if bin_size == 0 {
            self.sim.config().histogram_bin_size
        } else {
            bin_size
        };
        let bins = self
            .sim
            .rating_histogram(bin_size)
            .map_err(|e| js_error("Histogram error", e))?;
        to_json(&bins)
    }

    pub fn get_rating_diffs(&self) -> Result<String, JsValue> {
        to_json(&self.sim.rating_diffs())
    }

    /// Get statistics JSON
    pub fn get_stats(&self) -> String {
        self.sim.get_state_json()
    }

    /// Get default config as JSON
    pub fn get_default_config() -> String {
        serde_json::to_string(&SimulationConfig::default()).unwrap_or_default()
    }

    /// Update config, keeping the population
    pub fn update_config(&mut self, config_json: &str) -> Result<(), JsValue> {
        let config: SimulationConfig =
            serde_json::from_str(config_json).map_err(|e| js_error("Config parse error", e))?;
        self.sim.update_config(config).map_err(|e| js_error("Config error", e))
    }

    /// Reset statistics (keep population)
    pub fn reset_stats(&mut self) {
        self.sim.reset_stats();
    }
}

fn set_parameter(config: &mut SimulationConfig, parameter: &str, value: f64) -> Result<(), ConfigError> {
    match parameter {
        "initial_window" => config.initial_window = value.round() as i32,
        "k_factor" => config.k_factor = value,
        "num_close" => config.num_close = value.round().max(0.0) as usize,
        "players_per_team" => config.players_per_team = value.round().max(0.0) as usize,
        "true_skill_std_dev" => config.true_skill_std_dev = value,
        _ => return Err(ConfigError::UnknownParameter(parameter.to_string())),
    }
    Ok(())
}

fn run_config(config: SimulationConfig, population: usize, rounds: u64, seed: u64) -> Result<Simulation, SimError> {
    let mut sim = Simulation::new(config, seed)?;
    sim.generate_population(population)?;
    sim.run(rounds)?;
    Ok(sim)
}

fn sweep(
    base: &SimulationConfig,
    parameter: &str,
    values: &[f64],
    population: usize,
    rounds: u64,
    seed: u64,
) -> Result<Vec<serde_json::Value>, SimError> {
    let mut results = Vec::with_capacity(values.len());
    for (i, &value) in values.iter().enumerate() {
        let mut config = base.clone();
        set_parameter(&mut config, parameter, value)?;
        let sim = run_config(config, population, rounds, seed + i as u64)?;
        let stats = sim.stats();
        results.push(serde_json::json!({
            "parameter_value": value,
            "total_games": stats.total_games,
            "failed_attempts": stats.failed_attempts,
            "mean_abs_rating_error": stats.mean_abs_rating_error,
            "lowest_rating": stats.lowest_rating,
            "highest_rating": stats.highest_rating,
            "avg_games_per_player": stats.avg_games_per_player,
        }));
    }
    Ok(results)
}

/// Run a parameter sweep experiment
#[wasm_bindgen]
pub fn run_experiment(
    base_config_json: &str,
    parameter: &str,
    values_json: &str,
    population: usize,
    rounds_per_run: u64,
    seed: u64,
) -> Result<String, JsValue> {
    let base_config: SimulationConfig =
        serde_json::from_str(base_config_json).map_err(|e| js_error("Config parse error", e))?;
    let values: Vec<f64> = serde_json::from_str(values_json).map_err(|e| js_error("Values parse error", e))?;

    let results = sweep(&base_config, parameter, &values, population, rounds_per_run, seed)
        .map_err(|e| js_error("Experiment error", e))?;
    to_json(&results)
}

/// Compare two configs on the same seed
#[wasm_bindgen]
pub fn compare_configs(
    config_a_json: &str,
    config_b_json: &str,
    population: usize,
    rounds: u64,
    seed: u64,
) -> Result<String, JsValue> {
    let config_a: SimulationConfig =
        serde_json::from_str(config_a_json).map_err(|e| js_error("Config A parse error", e))?;
    let config_b: SimulationConfig =
        serde_json::from_str(config_b_json).map_err(|e| js_error("Config B parse error", e))?;

    let sim_a = run_config(config_a, population, rounds, seed).map_err(|e| js_error("Config A error", e))?;
    let sim_b = run_config(config_b, population, rounds, seed).map_err(|e| js_error("Config B error", e))?;

    let comparison = serde_json::json!({
        "config_a": {
            "stats": sim_a.stats(),
            "histogram": sim_a.rating_histogram(sim_a.config().histogram_bin_size).unwrap_or_default(),
        },
        "config_b": {
            "stats": sim_b.stats(),
            "histogram": sim_b.rating_histogram(sim_b.config().histogram_bin_size).unwrap_or_default(),
        }
    });
    to_json(&comparison)
}
