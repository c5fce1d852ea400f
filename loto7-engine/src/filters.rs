//! Les sept filtres appliqués à une combinaison triée de 7 numéros.
//!
//! Deux chemins partagent les mêmes mesures brutes ([`Measurements`]) :
//! [`FilterSet::accepts`] pour la boucle de génération et
//! [`FilterSet::evaluate`] pour le rapport détaillé.

use serde::{Deserialize, Serialize};

use loto7_db::models::{Draw, MAIN_COUNT, MAX_NUMBER, ValidationError, validate_main};

use crate::config::FilterConfig;
use crate::scoring::Scoring;

/// 7 numéros distincts, triés par ordre croissant.
pub type Combination = [u8; MAIN_COUNT];

pub const ZONES3: [(u8, u8); 3] = [(1, 12), (13, 25), (26, 37)];
pub const ZONES4: [(u8, u8); 4] = [(1, 9), (10, 18), (19, 27), (28, 37)];
const ZONE3_LABELS: [&str; 3] = ["low (1-12)", "mid (13-25)", "high (26-37)"];
const ZONE4_LABELS: [&str; 4] = ["A (1-9)", "B (10-18)", "C (19-27)", "D (28-37)"];

const ODD_COUNTS: [u8; 2] = [3, 4];
const LAST_DIGIT_LIMIT: u8 = 3;
const PULL_MAX: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Continuous,
    Zone3,
    Zone4,
    OddEven,
    Sum,
    LastDigits,
    Pull,
}

impl Filter {
    pub const ALL: [Filter; 7] = [
        Filter::Continuous,
        Filter::Zone3,
        Filter::Zone4,
        Filter::OddEven,
        Filter::Sum,
        Filter::LastDigits,
        Filter::Pull,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Filter::Continuous => "continuous",
            Filter::Zone3 => "zone3",
            Filter::Zone4 => "zone4",
            Filter::OddEven => "odd_even",
            Filter::Sum => "sum",
            Filter::LastDigits => "last_digits",
            Filter::Pull => "pull",
        }
    }

    fn passes(&self, m: &Measurements, set: &FilterSet) -> bool {
        match self {
            // Existence d'une paire seulement, `continuous_max` n'est pas un plafond.
            Filter::Continuous => m.consecutive > 0,
            Filter::Zone3 => m.zone3.iter().all(|&c| c > 0),
            Filter::Zone4 => m.zone4.iter().all(|&c| c > 0),
            Filter::OddEven => ODD_COUNTS.contains(&m.odd),
            Filter::Sum => (set.sum_min..=set.sum_max).contains(&m.sum),
            Filter::LastDigits => m.max_digit_count() < LAST_DIGIT_LIMIT,
            Filter::Pull => m.pull.is_none_or(|count| count <= PULL_MAX),
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Mesures brutes calculées une seule fois par combinaison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurements {
    pub consecutive: u8,
    pub zone3: [u8; 3],
    pub zone4: [u8; 4],
    pub odd: u8,
    pub sum: u32,
    pub digits: [u8; 10],
    /// `None` sans tirage précédent.
    pub pull: Option<usize>,
}

impl Measurements {
    fn max_digit_count(&self) -> u8 {
        self.digits.iter().copied().max().unwrap_or(0)
    }
}

fn zone_index(n: u8, zones: &[(u8, u8)]) -> Option<usize> {
    zones.iter().position(|&(lo, hi)| (lo..=hi).contains(&n))
}

/// Transforme une saisie libre en combinaison triée, après validation.
pub fn to_combination(numbers: &[u8]) -> Result<Combination, ValidationError> {
    validate_main(numbers)?;
    let mut combo = [0u8; MAIN_COUNT];
    combo.copy_from_slice(numbers);
    combo.sort_unstable();
    Ok(combo)
}

#[derive(Debug, Clone)]
pub struct FilterSet {
    sum_min: u32,
    sum_max: u32,
    previous: Option<[bool; MAX_NUMBER as usize + 1]>,
}

impl FilterSet {
    pub fn new(config: &FilterConfig, previous: Option<&Draw>) -> Self {
        let previous = previous.and_then(|draw| {
            let mut mask = [false; MAX_NUMBER as usize + 1];
            let mut any = false;
            for n in draw.all_numbers().filter(|&n| n <= MAX_NUMBER) {
                mask[n as usize] = true;
                any = true;
            }
            any.then_some(mask)
        });
        Self {
            sum_min: config.sum_min,
            sum_max: config.sum_max,
            previous,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }

    pub fn measure(&self, combo: &Combination) -> Measurements {
        let mut m = Measurements {
            consecutive: 0,
            zone3: [0; 3],
            zone4: [0; 4],
            odd: 0,
            sum: 0,
            digits: [0; 10],
            pull: None,
        };

        for (i, &n) in combo.iter().enumerate() {
            if i > 0 && combo[i - 1] + 1 == n {
                m.consecutive += 1;
            }
            if let Some(z) = zone_index(n, &ZONES3) {
                m.zone3[z] += 1;
            }
            if let Some(z) = zone_index(n, &ZONES4) {
                m.zone4[z] += 1;
            }
            if n % 2 == 1 {
                m.odd += 1;
            }
            m.sum += n as u32;
            m.digits[(n % 10) as usize] += 1;
        }

        m.pull = self
            .previous
            .map(|mask| combo.iter().filter(|&&n| mask[n as usize]).count());
        m
    }

    /// Chemin rapide utilisé pendant la génération.
    pub fn accepts(&self, combo: &Combination) -> bool {
        let m = self.measure(combo);
        Filter::ALL.iter().all(|f| f.passes(&m, self))
    }

    /// Rapport détaillé, filtre par filtre.
    pub fn evaluate(&self, combo: &Combination) -> Evaluation {
        let m = self.measure(combo);
        let pass = |f: Filter| f.passes(&m, self);

        let pairs = combo
            .windows(2)
            .filter(|w| w[0] + 1 == w[1])
            .map(|w| format!("{}-{}", w[0], w[1]))
            .collect();

        let zone3 = ZoneDetail::new(&ZONE3_LABELS, &m.zone3, pass(Filter::Zone3));
        let zone4 = ZoneDetail::new(&ZONE4_LABELS, &m.zone4, pass(Filter::Zone4));

        let digits = m
            .digits
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .map(|(digit, &count)| DigitCount { digit: digit as u8, count })
            .collect();

        let even = MAIN_COUNT as u8 - m.odd;
        let overall_pass = Filter::ALL.iter().all(|&f| pass(f));

        Evaluation {
            continuous: ContinuousDetail {
                has_continuous: m.consecutive > 0,
                pairs,
                pass: pass(Filter::Continuous),
            },
            zone3,
            zone4,
            odd_even: OddEvenDetail {
                odd: m.odd,
                even,
                balance: format!("{}:{}", m.odd, even),
                pass: pass(Filter::OddEven),
            },
            sum: SumDetail {
                total: m.sum,
                range: format!("{}-{}", self.sum_min, self.sum_max),
                in_range: (self.sum_min..=self.sum_max).contains(&m.sum),
                pass: pass(Filter::Sum),
            },
            last_digits: LastDigitDetail {
                distribution: digits,
                max_count: m.max_digit_count(),
                pass: pass(Filter::LastDigits),
            },
            pull: PullDetail {
                count: m.pull.unwrap_or(0),
                valid_range: format!("0-{PULL_MAX}"),
                pass: pass(Filter::Pull),
            },
            overall_pass,
            scoring: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousDetail {
    pub has_continuous: bool,
    pub pairs: Vec<String>,
    pub pass: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneCount {
    pub zone: String,
    pub count: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDetail {
    pub distribution: Vec<ZoneCount>,
    pub all_zones_covered: bool,
    pub pass: bool,
}

impl ZoneDetail {
    fn new(labels: &[&str], counts: &[u8], pass: bool) -> Self {
        Self {
            distribution: labels
                .iter()
                .zip(counts)
                .map(|(label, &count)| ZoneCount { zone: label.to_string(), count })
                .collect(),
            all_zones_covered: counts.iter().all(|&c| c > 0),
            pass,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddEvenDetail {
    pub odd: u8,
    pub even: u8,
    pub balance: String,
    pub pass: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SumDetail {
    pub total: u32,
    pub range: String,
    pub in_range: bool,
    pub pass: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigitCount {
    pub digit: u8,
    pub count: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastDigitDetail {
    pub distribution: Vec<DigitCount>,
    pub max_count: u8,
    pub pass: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullDetail {
    pub count: usize,
    pub valid_range: String,
    pub pass: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub continuous: ContinuousDetail,
    pub zone3: ZoneDetail,
    pub zone4: ZoneDetail,
    pub odd_even: OddEvenDetail,
    pub sum: SumDetail,
    pub last_digits: LastDigitDetail,
    pub pull: PullDetail,
    pub overall_pass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoring: Option<Scoring>,
}

impl Evaluation {
    pub fn passed(&self, filter: Filter) -> bool {
        match filter {
            Filter::Continuous => self.continuous.pass,
            Filter::Zone3 => self.zone3.pass,
            Filter::Zone4 => self.zone4.pass,
            Filter::OddEven => self.odd_even.pass,
            Filter::Sum => self.sum.pass,
            Filter::LastDigits => self.last_digits.pass,
            Filter::Pull => self.pull.pass,
        }
    }
}
