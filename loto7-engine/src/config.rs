use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filters::Filter;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("plage de somme invalide : {min} > {max}")]
    SumRange { min: u32, max: u32 },
    #[error("poids {name} invalide : {value}")]
    Weight { name: &'static str, value: f64 },
    #[error("au moins un poids doit être strictement positif")]
    NoWeight,
}

/// Paramètres des filtres et poids du score. Les champs absents prennent leur valeur par défaut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Conservé pour compatibilité : le filtre de continuité ne teste que l'existence d'une paire.
    pub continuous_max: u32,
    pub sum_min: u32,
    pub sum_max: u32,
    pub continuous_weight: f64,
    pub zone3_weight: f64,
    pub zone4_weight: f64,
    pub odd_even_weight: f64,
    pub sum_weight: f64,
    pub last_digit_weight: f64,
    pub pull_weight: f64,
    pub frequency_weight: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            continuous_max: 1,
            sum_min: 100,
            sum_max: 170,
            continuous_weight: 10.0,
            zone3_weight: 15.0,
            zone4_weight: 15.0,
            odd_even_weight: 10.0,
            sum_weight: 15.0,
            last_digit_weight: 10.0,
            pull_weight: 10.0,
            frequency_weight: 15.0,
        }
    }
}

impl FilterConfig {
    pub fn weight(&self, filter: Filter) -> f64 {
        match filter {
            Filter::Continuous => self.continuous_weight,
            Filter::Zone3 => self.zone3_weight,
            Filter::Zone4 => self.zone4_weight,
            Filter::OddEven => self.odd_even_weight,
            Filter::Sum => self.sum_weight,
            Filter::LastDigits => self.last_digit_weight,
            Filter::Pull => self.pull_weight,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sum_min > self.sum_max {
            return Err(ConfigError::SumRange {
                min: self.sum_min,
                max: self.sum_max,
            });
        }

        let weights = Filter::ALL
            .iter()
            .map(|f| (f.name(), self.weight(*f)))
            .chain(std::iter::once(("frequency", self.frequency_weight)));

        let mut any_positive = false;
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Weight { name, value });
            }
            any_positive |= value > 0.0;
        }
        if !any_positive {
            return Err(ConfigError::NoWeight);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = FilterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!((config.sum_min, config.sum_max), (100, 170));
        assert_eq!(config.weight(Filter::Zone3), 15.0);
        assert_eq!(config.weight(Filter::Pull), 10.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: FilterConfig = serde_json::from_str(r#"{"sum_min": 110, "pull_weight": 20}"#).unwrap();
        assert_eq!(config.sum_min, 110);
        assert_eq!(config.sum_max, 170);
        assert_eq!(config.pull_weight, 20.0);
        assert_eq!(config.frequency_weight, 15.0);
    }

    #[test]
    fn test_invalid_sum_range() {
        let config = FilterConfig {
            sum_min: 180,
            sum_max: 170,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::SumRange { min: 180, max: 170 }));
    }

    #[test]
    fn test_negative_weight() {
        let config = FilterConfig {
            zone4_weight: -1.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Weight { name: "zone4", .. })));
    }

    #[test]
    fn test_all_zero_weights() {
        let config = FilterConfig {
            continuous_weight: 0.0,
            zone3_weight: 0.0,
            zone4_weight: 0.0,
            odd_even_weight: 0.0,
            sum_weight: 0.0,
            last_digit_weight: 0.0,
            pull_weight: 0.0,
            frequency_weight: 0.0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoWeight));
    }
}
