use std::collections::HashSet;

use rand::Rng;
use rand::seq::index;

use loto7_db::models::{MAIN_COUNT, MAX_NUMBER};

use crate::filters::{Combination, FilterSet};

pub const DEFAULT_MAX_ATTEMPTS: u64 = 1_000_000;
pub const MAX_COUNT: usize = 100;

/// Résultat d'une génération. Moins de candidats que demandé signifie
/// que les filtres sont trop stricts pour le budget d'essais.
#[derive(Debug, Clone)]
pub struct Generation {
    pub candidates: Vec<Combination>,
    pub requested: usize,
    pub attempts: u64,
}

impl Generation {
    pub fn is_short(&self) -> bool {
        self.candidates.len() < self.requested
    }
}

/// Tirage uniforme de 7 numéros distincts dans 1-37, triés.
pub fn random_combination<R: Rng + ?Sized>(rng: &mut R) -> Combination {
    let mut combo = [0u8; MAIN_COUNT];
    for (slot, idx) in combo
        .iter_mut()
        .zip(index::sample(rng, MAX_NUMBER as usize, MAIN_COUNT))
    {
        *slot = idx as u8 + 1;
    }
    combo.sort_unstable();
    combo
}

pub fn generate_candidates<R: Rng + ?Sized>(
    filters: &FilterSet,
    count: usize,
    max_attempts: u64,
    rng: &mut R,
) -> Generation {
    let mut seen: HashSet<Combination> = HashSet::with_capacity(count);
    let mut candidates = Vec::with_capacity(count);
    let mut attempts = 0u64;

    while candidates.len() < count && attempts < max_attempts {
        attempts += 1;
        let combo = random_combination(rng);
        if !seen.contains(&combo) && filters.accepts(&combo) {
            seen.insert(combo);
            candidates.push(combo);
        }
    }

    let generation = Generation {
        candidates,
        requested: count,
        attempts,
    };
    if generation.is_short() {
        tracing::warn!(
            requested = count,
            found = generation.candidates.len(),
            attempts,
            "budget d'essais épuisé, filtres trop stricts"
        );
    } else {
        tracing::debug!(count, attempts, "génération terminée");
    }
    generation
}
