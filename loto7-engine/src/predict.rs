//! Point d'entrée du moteur : prédiction, évaluation d'une combinaison et analyse de l'historique.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use loto7_db::models::{Draw, ValidationError};

use crate::analyzer::{DEFAULT_RECENT_WINDOW, HistoricalAnalyzer, Insights, Pattern};
use crate::config::{ConfigError, FilterConfig};
use crate::filters::{Evaluation, FilterSet, to_combination};
use crate::generator::{DEFAULT_MAX_ATTEMPTS, MAX_COUNT, generate_candidates};
use crate::ranking::{assemble_draws, rank_candidates};
use crate::scoring::score_candidate;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("le nombre de prédictions doit être compris entre 1 et {MAX_COUNT} (reçu {0})")]
    InvalidCount(usize),
    #[error("configuration invalide : {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub count: usize,
    pub next_draw_number: u32,
    pub filter_config: FilterConfig,
    pub include_scoring: bool,
    pub include_patterns: bool,
    pub max_attempts: u64,
    pub recent_window: usize,
}

impl Default for PredictionRequest {
    fn default() -> Self {
        Self {
            count: 10,
            next_draw_number: 1,
            filter_config: FilterConfig::default(),
            include_scoring: true,
            include_patterns: false,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            recent_window: DEFAULT_RECENT_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub draws: Vec<Draw>,
    pub requested: usize,
    pub attempts: u64,
    pub next_draw_number: u32,
    /// Budget épuisé avant d'atteindre `requested` : relâcher les filtres.
    pub short: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<Pattern>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<Insights>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryAnalysis {
    pub total_draws: usize,
    pub insights: Insights,
    pub patterns: Vec<Pattern>,
}

/// Numéro du prochain tirage : dernier identifiant `第N回` + 1, ou 1.
pub fn next_draw_number(history: &[Draw]) -> u32 {
    history
        .first()
        .and_then(Draw::draw_number)
        .and_then(|n| n.checked_add(1))
        .unwrap_or(1)
}

/// Date du prochain tirage : aujourd'hui + 7 jours.
pub fn next_draw_date() -> String {
    (chrono::Local::now().date_naive() + chrono::Days::new(7))
        .format("%Y-%m-%d")
        .to_string()
}

/// Génère, note et classe des grilles pour le tirage `next_draw_number`.
/// `history[0]` est le tirage le plus récent ; `previous` alimente le filtre de « pull ».
pub fn generate_predictions<R: Rng + ?Sized>(
    request: &PredictionRequest,
    history: &[Draw],
    previous: Option<&Draw>,
    date: &str,
    rng: &mut R,
) -> Result<Prediction, PredictError> {
    if !(1..=MAX_COUNT).contains(&request.count) {
        return Err(PredictError::InvalidCount(request.count));
    }
    let config = &request.filter_config;
    config.validate()?;

    let mut analyzer = HistoricalAnalyzer::from_draws(history, request.recent_window);
    let patterns = request
        .include_patterns
        .then(|| analyzer.identify_patterns(history));

    let filters = FilterSet::new(config, previous);
    let generation = generate_candidates(&filters, request.count, request.max_attempts, rng);

    let evaluated: Vec<_> = generation
        .candidates
        .iter()
        .map(|combo| {
            let mut evaluation = filters.evaluate(combo);
            if request.include_scoring {
                evaluation.scoring = Some(score_candidate(combo, &evaluation, config, Some(&analyzer)));
            }
            (*combo, evaluation)
        })
        .collect();

    let ranked = rank_candidates(evaluated);
    let draws = assemble_draws(&ranked, request.next_draw_number, date, rng);

    let insights = (request.include_scoring && analyzer.has_history()).then(|| analyzer.insights());

    Ok(Prediction {
        short: generation.is_short(),
        requested: generation.requested,
        attempts: generation.attempts,
        next_draw_number: request.next_draw_number,
        draws,
        patterns,
        insights,
    })
}

/// Rapport détaillé d'une combinaison libre face au tirage précédent.
pub fn evaluate_combination(
    numbers: &[u8],
    previous: Option<&Draw>,
    config: &FilterConfig,
) -> Result<Evaluation, ValidationError> {
    let combo = to_combination(numbers)?;
    Ok(FilterSet::new(config, previous).evaluate(&combo))
}

/// Chaque tirage évalué contre le tirage qui le précède dans le temps.
pub fn evaluate_history(history: &[Draw], config: &FilterConfig) -> Vec<Draw> {
    history
        .iter()
        .enumerate()
        .map(|(i, draw)| {
            let mut draw = draw.clone();
            match evaluate_combination(&draw.main, history.get(i + 1), config) {
                Ok(evaluation) => match serde_json::to_value(evaluation) {
                    Ok(value) => draw.evaluation = Some(value),
                    Err(e) => tracing::warn!(id = %draw.id, error = %e, "évaluation non sérialisable"),
                },
                Err(e) => tracing::warn!(id = %draw.id, error = %e, "tirage stocké invalide, non évalué"),
            }
            draw
        })
        .collect()
}

pub fn analyze_history(history: &[Draw], recent_window: usize) -> HistoryAnalysis {
    let mut analyzer = HistoricalAnalyzer::from_draws(history, recent_window);
    let patterns = analyzer.identify_patterns(history);
    HistoryAnalysis {
        total_draws: analyzer.total_draws(),
        insights: analyzer.insights(),
        patterns,
    }
}
