use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use derive_builder::Builder;
use log::info;
use serde::{Deserialize, Serialize};

use crate::behavior::BehaviorSet;
use crate::error::SirError;
use crate::generators::NetworkConfig;

/// Scalar model parameters. Missing fields in a config file take the defaults
/// below.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Builder)]
#[serde(default)]
pub struct Parameters {
    #[builder(default = "0.1")]
    pub infection_probability: f64,

    #[builder(default = "0.01")]
    pub recovery_probability: f64,

    /// Chance per turn of S -> I or R -> S.
    #[builder(default = "0.0")]
    pub mutation_probability: f64,

    #[builder(default = "1.0")]
    pub quarantine_probability: f64,

    /// Fraction of transmission a mask blocks.
    #[builder(default = "0.95")]
    pub mask_effectiveness: f64,

    #[builder(default = "0.05")]
    pub social_distance_sensitivity: f64,

    /// Uniform social distancing runs after every step when this is positive.
    #[builder(default = "0.0")]
    pub social_limit: f64,

    #[builder(default = "1")]
    pub initial_infected: usize,

    /// Step at which the vaccine becomes available, if ever.
    #[builder(default, setter(strip_option))]
    pub vaccine_discovery_step: Option<usize>,
}

impl Default for Parameters {
    fn default() -> Self {
        ParametersBuilder::default().build().unwrap()
    }
}

impl Parameters {
    /// Checks that every probability lies in `[0, 1]`.
    pub fn validate(&self) -> Result<(), SirError> {
        let probabilities = [
            ("infection_probability", self.infection_probability),
            ("recovery_probability", self.recovery_probability),
            ("mutation_probability", self.mutation_probability),
            ("quarantine_probability", self.quarantine_probability),
            ("mask_effectiveness", self.mask_effectiveness),
            ("social_distance_sensitivity", self.social_distance_sensitivity),
            ("social_limit", self.social_limit),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(SirError::ConfigurationError(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Everything needed to set up and run one simulation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub max_steps: usize,
    pub network: NetworkConfig,
    pub parameters: Parameters,
    pub behaviors: BehaviorSet,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            seed: 0,
            max_steps: 100,
            network: NetworkConfig::RandomTree { nodes: 100 },
            parameters: Parameters::default(),
            behaviors: BehaviorSet::empty(),
        }
    }
}

/// Reads a `SimulationConfig` from a JSON file and validates its parameters.
pub fn load_config(path: &Path) -> Result<SimulationConfig, SirError> {
    info!("Loading simulation config from: {}", path.display());
    let file = File::open(path)?;
    let config: SimulationConfig = serde_json::from_reader(BufReader::new(file))?;
    config.parameters.validate()?;
    Ok(config)
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use super::*;
    use crate::behavior::Behavior;

    #[test]
    fn defaults_match_edge_dynamics_model() {
        let parameters = Parameters::default();
        assert_eq!(parameters.initial_infected, 1);
        assert!((parameters.infection_probability - 0.1).abs() < f64::EPSILON);
        assert!((parameters.mask_effectiveness - 0.95).abs() < f64::EPSILON);
        assert_eq!(parameters.vaccine_discovery_step, None);
        parameters.validate().unwrap();
    }

    #[test]
    fn builder_overrides() {
        let parameters = ParametersBuilder::default()
            .infection_probability(1.0)
            .vaccine_discovery_step(3)
            .build()
            .unwrap();
        assert!((parameters.infection_probability - 1.0).abs() < f64::EPSILON);
        assert_eq!(parameters.vaccine_discovery_step, Some(3));
    }

    #[test]
    fn out_of_range_probability_fails() {
        for bad in [-0.1, 1.5, f64::NAN] {
            let parameters = ParametersBuilder::default()
                .recovery_probability(bad)
                .build()
                .unwrap();
            assert!(matches!(
                parameters.validate(),
                Err(SirError::ConfigurationError(_))
            ));
        }
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{"seed": 7, "parameters": {"infection_probability": 0.5}}"#)
                .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.max_steps, 100);
        assert!((config.parameters.infection_probability - 0.5).abs() < f64::EPSILON);
        assert!((config.parameters.recovery_probability - 0.01).abs() < f64::EPSILON);
        assert!(config.behaviors.is_empty());
    }

    #[test]
    fn load_config_from_file() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/edge_dynamics.json");
        let config = load_config(&path).unwrap();
        assert_eq!(config.seed, 1991);
        assert_eq!(config.network, NetworkConfig::RandomTree { nodes: 100 });
        assert_eq!(config.parameters.initial_infected, 10);
        assert!(config.behaviors.contains(Behavior::Quarantine));
    }

    #[test]
    fn load_config_rejects_bad_probability() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/bad_probability.json");
        assert!(matches!(
            load_config(&path),
            Err(SirError::ConfigurationError(_))
        ));
    }

    #[test]
    fn load_config_missing_file() {
        let path = PathBuf::from("does/not/exist.json");
        assert!(matches!(load_config(&path), Err(SirError::IoError(_))));
    }
}
