use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EvolveError;
use crate::scene::MAX_MUTATION_STRENGTH;

/// Tunables for one evolution run. Loadable from a YAML file; every field
/// falls back to its default when absent.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolveSettings {
    /// scenes per pool, fixed for the lifetime of a generation
    pub population_size: usize,
    /// selection window over the best-ranked remainder
    pub tournament_size: usize,
    /// repeat probability (percent) of the per-child mutation loop, 0-99
    pub mutation_strength: u8,
    /// base iteration budget per culture; doubled every age
    pub generation_count: u64,
    /// the terminal age; its single culture runs until externally stopped
    pub max_age: u32,
    /// triangles per polygon-soup scene
    pub triangle_count: usize,
    /// error multiplier for pixels inside the weight mask
    pub face_weight: u32,
    /// emit a progress update every N iterations
    pub update_frequency: u64,
    /// scene background color, RGBA
    pub background: [u8; 4],
    /// master seed; a random one is drawn when absent
    pub seed: Option<u64>,
}

impl Default for EvolveSettings {
    fn default() -> Self {
        Self {
            population_size: 10,
            tournament_size: 2,
            mutation_strength: 0,
            generation_count: 10_000,
            max_age: 1,
            triangle_count: 20,
            face_weight: 10,
            update_frequency: 1,
            background: [255, 255, 255, 255],
            seed: None,
        }
    }
}

impl EvolveSettings {
    pub fn load(path: &Path) -> Result<Self, EvolveError> {
        let text = fs::read_to_string(path)?;
        let settings: Self = serde_yaml::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), EvolveError> {
        if self.population_size < 2 {
            return Err(EvolveError::InvalidSettings(
                "population_size must be at least 2".to_owned(),
            ));
        }
        if self.tournament_size < 1 {
            return Err(EvolveError::InvalidSettings(
                "tournament_size must be at least 1".to_owned(),
            ));
        }
        if self.mutation_strength > MAX_MUTATION_STRENGTH {
            return Err(EvolveError::InvalidSettings(format!(
                "mutation_strength must be at most {MAX_MUTATION_STRENGTH} \
                 (100 would repeat the mutation loop forever)"
            )));
        }
        if self.triangle_count == 0 {
            return Err(EvolveError::InvalidSettings(
                "triangle_count must be at least 1".to_owned(),
            ));
        }
        if self.generation_count == 0 {
            return Err(EvolveError::InvalidSettings(
                "generation_count must be at least 1".to_owned(),
            ));
        }
        if self.update_frequency == 0 {
            return Err(EvolveError::InvalidSettings(
                "update_frequency must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EvolveSettings::default().validate().unwrap();
    }

    #[test]
    fn strength_cap_is_enforced() {
        let settings = EvolveSettings {
            mutation_strength: 100,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = EvolveSettings {
            mutation_strength: 99,
            ..Default::default()
        };
        settings.validate().unwrap();
    }

    #[test]
    fn tiny_population_is_rejected() {
        let settings = EvolveSettings {
            population_size: 1,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let settings: EvolveSettings =
            serde_yaml::from_str("population_size: 6\nmutation_strength: 25\n").unwrap();
        assert_eq!(settings.population_size, 6);
        assert_eq!(settings.mutation_strength, 25);
        assert_eq!(settings.tournament_size, 2);
        assert_eq!(settings.generation_count, 10_000);
    }
}
