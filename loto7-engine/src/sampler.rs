use rand::SeedableRng;
use rand::rngs::StdRng;

/// Générateur reproductible si un seed est fourni, sinon initialisé par l'entropie système.
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}
