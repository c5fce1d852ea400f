use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analyzer::{HistoricalAnalyzer, NumberStatistic};
use crate::config::FilterConfig;
use crate::filters::{Combination, Evaluation, Filter};

pub const FREQUENCY: &str = "frequency";

const HOT_TARGET: f64 = 40.0;
const BALANCED_WEIGHT: f64 = 0.4;
const OVERDUE_TARGET: f64 = 20.0;
const NEUTRAL_COLD: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scoring {
    pub scores: BTreeMap<String, f64>,
    /// Moyenne pondérée dans [0, 100], arrondie à 2 décimales.
    pub final_score: f64,
    /// Poids effectivement appliqués ; `frequency` vaut 0 sans historique.
    pub weights: BTreeMap<String, f64>,
}

/// Récompense un mélange de numéros modérément chauds, de fréquence médiane et en retard.
pub fn frequency_score(combo: &Combination, analyzer: &HistoricalAnalyzer) -> f64 {
    let n = combo.len() as f64;
    let avg = |f: fn(&NumberStatistic) -> f64| {
        combo
            .iter()
            .filter_map(|&num| analyzer.stat(num))
            .map(f)
            .sum::<f64>()
            / n
    };
    let hot_avg = avg(|s| s.hot_score);
    let cold_avg = avg(|s| s.cold_score);
    let overdue_avg = avg(|s| s.overdue_score);

    let score = (hot_avg / HOT_TARGET).min(1.0) * HOT_TARGET
        + (100.0 - (NEUTRAL_COLD - cold_avg).abs()) * BALANCED_WEIGHT
        + (overdue_avg / OVERDUE_TARGET).min(1.0) * OVERDUE_TARGET;
    score.min(100.0)
}

/// Score 100/0 par filtre, plus le score de fréquence quand un historique est disponible.
pub fn score_candidate(
    combo: &Combination,
    evaluation: &Evaluation,
    config: &FilterConfig,
    analyzer: Option<&HistoricalAnalyzer>,
) -> Scoring {
    let mut scores = BTreeMap::new();
    let mut weights = BTreeMap::new();
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;

    for filter in Filter::ALL {
        let score = if evaluation.passed(filter) { 100.0 } else { 0.0 };
        let weight = config.weight(filter);
        scores.insert(filter.name().to_string(), score);
        weights.insert(filter.name().to_string(), weight);
        weighted_sum += score * weight;
        total_weight += weight;
    }

    match analyzer.filter(|a| a.has_history()) {
        Some(analyzer) => {
            let score = frequency_score(combo, analyzer);
            scores.insert(FREQUENCY.to_string(), score);
            weights.insert(FREQUENCY.to_string(), config.frequency_weight);
            weighted_sum += score * config.frequency_weight;
            total_weight += config.frequency_weight;
        }
        None => {
            weights.insert(FREQUENCY.to_string(), 0.0);
        }
    }

    let final_score = if total_weight > 0.0 {
        weighted_sum / total_weight
    } else {
        0.0
    };

    Scoring {
        scores,
        final_score: (final_score * 100.0).round() / 100.0,
        weights,
    }
}
