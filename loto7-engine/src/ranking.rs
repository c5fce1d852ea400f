use rand::Rng;
use rand::seq::IndexedRandom;

use loto7_db::models::{BONUS_COUNT, Draw, MAX_NUMBER};

use crate::filters::{Combination, Evaluation};

/// Candidat évalué, éventuellement noté (`evaluation.scoring`).
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub combination: Combination,
    pub evaluation: Evaluation,
    /// Rang (1 = meilleur score) ou position de génération sans notation.
    pub rank: usize,
}

impl ScoredCandidate {
    pub fn final_score(&self) -> Option<f64> {
        self.evaluation.scoring.as_ref().map(|s| s.final_score)
    }
}

/// Trie par score décroissant (stable sur les égalités) si tous les candidats sont notés,
/// sinon conserve l'ordre de génération.
pub fn rank_candidates(candidates: Vec<(Combination, Evaluation)>) -> Vec<ScoredCandidate> {
    let mut candidates = candidates;
    let scored = !candidates.is_empty() && candidates.iter().all(|(_, e)| e.scoring.is_some());
    if scored {
        let score = |e: &Evaluation| e.scoring.as_ref().map_or(0.0, |s| s.final_score);
        candidates.sort_by(|(_, a), (_, b)| {
            score(b)
                .partial_cmp(&score(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    candidates
        .into_iter()
        .enumerate()
        .map(|(i, (combination, evaluation))| ScoredCandidate {
            combination,
            evaluation,
            rank: i + 1,
        })
        .collect()
}

/// 2 numéros bonus tirés uniformément hors des 7 principaux, triés.
pub fn bonus_numbers<R: Rng + ?Sized>(main: &[u8], rng: &mut R) -> [u8; BONUS_COUNT] {
    let available: Vec<u8> = (1..=MAX_NUMBER).filter(|n| !main.contains(n)).collect();
    let mut bonus = [0u8; BONUS_COUNT];
    for (slot, &n) in bonus
        .iter_mut()
        .zip(available.choose_multiple(rng, BONUS_COUNT))
    {
        *slot = n;
    }
    bonus.sort_unstable();
    bonus
}

pub fn candidate_id(next_draw_number: u32, candidate: &ScoredCandidate) -> String {
    if candidate.final_score().is_some() {
        format!("第{}回 予測{}位", next_draw_number, candidate.rank)
    } else {
        format!("第{}回 候補{}", next_draw_number, candidate.rank)
    }
}

/// Un `Draw` par candidat, avec bonus et évaluation (notation incluse) attachés.
pub fn assemble_draws<R: Rng + ?Sized>(
    ranked: &[ScoredCandidate],
    next_draw_number: u32,
    date: &str,
    rng: &mut R,
) -> Vec<Draw> {
    ranked
        .iter()
        .map(|candidate| {
            let bonus = bonus_numbers(&candidate.combination, rng);
            let mut draw = Draw::new(
                candidate_id(next_draw_number, candidate),
                date,
                candidate.combination.to_vec(),
                bonus.to_vec(),
            );
            match serde_json::to_value(&candidate.evaluation) {
                Ok(value) => draw.evaluation = Some(value),
                Err(e) => tracing::warn!(id = %draw.id, error = %e, "évaluation non sérialisable"),
            }
            draw
        })
        .collect()
}
