use serde::{Deserialize, Serialize};

use loto7_db::models::{Draw, MAX_NUMBER, Pool};

use crate::filters::ZONES3;

pub const DEFAULT_RECENT_WINDOW: usize = 10;
pub const PATTERN_WINDOW: usize = 10;
pub const MIN_PATTERN_DRAWS: usize = 3;
pub const INSIGHT_TOP: usize = 10;
pub const TOP_PATTERNS: usize = 3;

const OVERDUE_MULTIPLIER: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberStatistic {
    pub number: u8,
    pub frequency: u32,
    pub recent_frequency: u32,
    /// Index du tirage le plus récent contenant le numéro (0 = dernier tirage), `None` si jamais sorti.
    pub last_appearance: Option<usize>,
    pub hot_score: f64,
    pub cold_score: f64,
    pub overdue_score: f64,
}

impl NumberStatistic {
    fn new(number: u8) -> Self {
        Self {
            number,
            frequency: 0,
            recent_frequency: 0,
            last_appearance: None,
            hot_score: 0.0,
            cold_score: 0.0,
            overdue_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Consecutive,
    ZoneDistribution,
    OddEvenRatio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneShare {
    pub low: f64,
    pub mid: f64,
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternValue {
    Average(f64),
    Zones(ZoneShare),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    #[serde(rename = "type")]
    pub kind: PatternKind,
    pub description: String,
    pub value: PatternValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberScore {
    pub number: u8,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub hot_numbers: Vec<NumberScore>,
    pub cold_numbers: Vec<NumberScore>,
    pub overdue_numbers: Vec<NumberScore>,
    pub patterns: Vec<Pattern>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberCount {
    pub number: u8,
    pub count: u32,
}

/// Statistiques par numéro, reconstruites entièrement à chaque analyse.
#[derive(Debug, Clone)]
pub struct HistoricalAnalyzer {
    recent_window: usize,
    total_draws: usize,
    stats: Vec<NumberStatistic>,
    patterns: Vec<Pattern>,
}

impl Default for HistoricalAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_WINDOW)
    }
}

impl HistoricalAnalyzer {
    pub fn new(recent_window: usize) -> Self {
        Self {
            recent_window: recent_window.max(1),
            total_draws: 0,
            stats: (1..=MAX_NUMBER).map(NumberStatistic::new).collect(),
            patterns: Vec::new(),
        }
    }

    /// `draws[0]` = tirage le plus récent.
    pub fn from_draws(draws: &[Draw], recent_window: usize) -> Self {
        let mut analyzer = Self::new(recent_window);
        analyzer.analyze(draws);
        analyzer
    }

    pub fn analyze(&mut self, draws: &[Draw]) {
        self.stats = (1..=MAX_NUMBER).map(NumberStatistic::new).collect();
        self.total_draws = draws.len();
        let recent_window = self.recent_window;

        for (i, draw) in draws.iter().enumerate() {
            for &n in Pool::Main.numbers_from(draw) {
                let Some(stat) = self.stat_mut(n) else {
                    continue;
                };
                stat.frequency += 1;
                if i < recent_window {
                    stat.recent_frequency += 1;
                }
                if stat.last_appearance.is_none() {
                    stat.last_appearance = Some(i);
                }
            }
        }

        if self.total_draws == 0 {
            return;
        }

        let total = self.total_draws as f64;
        let window = self.recent_window.min(self.total_draws) as f64;
        let avg_frequency =
            self.stats.iter().map(|s| s.frequency as f64).sum::<f64>() / MAX_NUMBER as f64;

        for stat in &mut self.stats {
            stat.hot_score = stat.recent_frequency as f64 / window * 100.0;
            stat.cold_score = if avg_frequency > 0.0 {
                ((avg_frequency - stat.frequency as f64) / avg_frequency * 100.0).max(0.0)
            } else {
                0.0
            };
            stat.overdue_score = match stat.last_appearance {
                Some(gap) => {
                    let expected_gap = total / stat.frequency.max(1) as f64;
                    (gap as f64 / expected_gap * OVERDUE_MULTIPLIER).min(100.0)
                }
                None => 100.0,
            };
        }
    }

    fn stat_mut(&mut self, number: u8) -> Option<&mut NumberStatistic> {
        let idx = (number as usize).checked_sub(1)?;
        self.stats.get_mut(idx)
    }

    pub fn stat(&self, number: u8) -> Option<&NumberStatistic> {
        let idx = (number as usize).checked_sub(1)?;
        self.stats.get(idx)
    }

    pub fn stats(&self) -> &[NumberStatistic] {
        &self.stats
    }

    pub fn total_draws(&self) -> usize {
        self.total_draws
    }

    pub fn has_history(&self) -> bool {
        self.total_draws > 0
    }

    /// Motifs agrégés sur les 10 derniers tirages. Moins de 3 tirages : aucun motif.
    pub fn identify_patterns(&mut self, draws: &[Draw]) -> Vec<Pattern> {
        self.patterns = mine_patterns(draws);
        self.patterns.clone()
    }

    pub fn top_patterns(&self, n: usize) -> &[Pattern] {
        &self.patterns[..n.min(self.patterns.len())]
    }

    fn top_by(&self, n: usize, score: impl Fn(&NumberStatistic) -> f64) -> Vec<NumberScore> {
        let mut ranked: Vec<NumberScore> = self
            .stats
            .iter()
            .map(|s| NumberScore {
                number: s.number,
                score: score(s),
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.number.cmp(&b.number))
        });
        ranked.truncate(n);
        ranked
    }

    pub fn hot_numbers(&self, n: usize) -> Vec<NumberScore> {
        self.top_by(n, |s| s.hot_score)
    }

    pub fn cold_numbers(&self, n: usize) -> Vec<NumberScore> {
        self.top_by(n, |s| s.cold_score)
    }

    pub fn overdue_numbers(&self, n: usize) -> Vec<NumberScore> {
        self.top_by(n, |s| s.overdue_score)
    }

    pub fn insights(&self) -> Insights {
        if !self.has_history() {
            return Insights {
                hot_numbers: Vec::new(),
                cold_numbers: Vec::new(),
                overdue_numbers: Vec::new(),
                patterns: self.top_patterns(TOP_PATTERNS).to_vec(),
            };
        }
        Insights {
            hot_numbers: self.hot_numbers(INSIGHT_TOP),
            cold_numbers: self.cold_numbers(INSIGHT_TOP),
            overdue_numbers: self.overdue_numbers(INSIGHT_TOP),
            patterns: self.top_patterns(TOP_PATTERNS).to_vec(),
        }
    }
}

/// Les `n` numéros les plus sortis dans un pool, par fréquence décroissante puis numéro croissant.
/// Les numéros jamais sortis sont exclus.
pub fn most_common(draws: &[Draw], pool: Pool, n: usize) -> Vec<NumberCount> {
    let mut counts = vec![0u32; MAX_NUMBER as usize + 1];
    for &num in draws.iter().flat_map(|d| pool.numbers_from(d)) {
        if let Some(c) = counts.get_mut(num as usize) {
            *c += 1;
        }
    }
    let mut ranked: Vec<NumberCount> = counts
        .iter()
        .enumerate()
        .skip(1)
        .filter(|&(_, &count)| count > 0)
        .map(|(number, &count)| NumberCount {
            number: number as u8,
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then(a.number.cmp(&b.number)));
    ranked.truncate(n);
    ranked
}

fn consecutive_pairs(numbers: &[u8]) -> usize {
    let mut sorted = numbers.to_vec();
    sorted.sort_unstable();
    sorted.windows(2).filter(|w| w[0] + 1 == w[1]).count()
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn mine_patterns(draws: &[Draw]) -> Vec<Pattern> {
    if draws.len() < MIN_PATTERN_DRAWS {
        return Vec::new();
    }
    let recent = &draws[..draws.len().min(PATTERN_WINDOW)];
    let n = recent.len() as f64;

    let avg_consecutive = recent
        .iter()
        .map(|d| consecutive_pairs(&d.main) as f64)
        .sum::<f64>()
        / n;

    let mut zones = [0usize; 3];
    for &num in recent.iter().flat_map(|d| d.main.iter()) {
        if let Some(z) = ZONES3.iter().position(|&(lo, hi)| (lo..=hi).contains(&num)) {
            zones[z] += 1;
        }
    }
    let placed = zones.iter().sum::<usize>().max(1) as f64;
    let share = |count: usize| round1(count as f64 / placed * 100.0);

    let avg_odd = recent
        .iter()
        .map(|d| d.main.iter().filter(|&&x| x % 2 == 1).count() as f64)
        .sum::<f64>()
        / n;

    vec![
        Pattern {
            kind: PatternKind::Consecutive,
            description: format!("Moyenne de {avg_consecutive:.1} paires consécutives sur les derniers tirages"),
            value: PatternValue::Average(avg_consecutive),
        },
        Pattern {
            kind: PatternKind::ZoneDistribution,
            description: "Répartition par zone sur les derniers tirages".to_string(),
            value: PatternValue::Zones(ZoneShare {
                low: share(zones[0]),
                mid: share(zones[1]),
                high: share(zones[2]),
            }),
        },
        Pattern {
            kind: PatternKind::OddEvenRatio,
            description: format!("Moyenne de {avg_odd:.1} numéros impairs sur les derniers tirages"),
            value: PatternValue::Average(avg_odd),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(id: &str, main: [u8; 7], bonus: [u8; 2]) -> Draw {
        Draw::new(id, "2025-01-01", main.to_vec(), bonus.to_vec())
    }

    fn three_draws() -> Vec<Draw> {
        vec![
            draw("第3回", [1, 2, 10, 15, 20, 30, 35], [3, 4]),
            draw("第2回", [5, 6, 7, 12, 22, 33, 35], [8, 9]),
            draw("第1回", [3, 9, 14, 18, 27, 31, 35], [1, 2]),
        ]
    }

    #[test]
    fn test_most_common_per_pool() {
        let draws = three_draws();
        let main = most_common(&draws, Pool::Main, 3);
        assert_eq!(main[0], NumberCount { number: 35, count: 3 });
        assert_eq!(main[1], NumberCount { number: 1, count: 1 });
        assert_eq!(main[2].number, 2);

        let bonus = most_common(&draws, Pool::Bonus, 10);
        assert_eq!(bonus.len(), 6);
        assert_eq!(bonus[0], NumberCount { number: 1, count: 1 });
        assert!(most_common(&[], Pool::Bonus, 10).is_empty());
    }

    #[test]
    fn test_frequency_and_last_appearance() {
        let analyzer = HistoricalAnalyzer::from_draws(&three_draws(), DEFAULT_RECENT_WINDOW);
        let s35 = analyzer.stat(35).unwrap();
        assert_eq!(s35.frequency, 3);
        assert_eq!(s35.recent_frequency, 3);
        assert_eq!(s35.last_appearance, Some(0));

        let s3 = analyzer.stat(3).unwrap();
        assert_eq!(s3.frequency, 1);
        assert_eq!(s3.last_appearance, Some(2));
    }

    #[test]
    fn test_never_seen_is_overdue() {
        let analyzer = HistoricalAnalyzer::from_draws(&three_draws(), DEFAULT_RECENT_WINDOW);
        let s37 = analyzer.stat(37).unwrap();
        assert_eq!(s37.frequency, 0);
        assert_eq!(s37.last_appearance, None);
        assert_eq!(s37.overdue_score, 100.0);
    }

    #[test]
    fn test_derived_scores() {
        let analyzer = HistoricalAnalyzer::from_draws(&three_draws(), DEFAULT_RECENT_WINDOW);

        let s35 = analyzer.stat(35).unwrap();
        assert!((s35.hot_score - 100.0).abs() < 1e-9);
        assert_eq!(s35.cold_score, 0.0);
        assert_eq!(s35.overdue_score, 0.0);

        let s37 = analyzer.stat(37).unwrap();
        assert!((s37.cold_score - 100.0).abs() < 1e-9);

        // Vu une fois, il y a 2 tirages : écart attendu 3, score 2/3*50.
        let s3 = analyzer.stat(3).unwrap();
        assert!((s3.overdue_score - 2.0 / 3.0 * 50.0).abs() < 1e-9);
        assert_eq!(s3.cold_score, 0.0);
        assert!((s3.hot_score - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_recent_window_limits_hot() {
        let analyzer = HistoricalAnalyzer::from_draws(&three_draws(), 1);
        let s35 = analyzer.stat(35).unwrap();
        assert_eq!(s35.recent_frequency, 1);
        assert!((s35.hot_score - 100.0).abs() < 1e-9);
        assert_eq!(analyzer.stat(5).unwrap().recent_frequency, 0);
    }

    #[test]
    fn test_empty_history() {
        let analyzer = HistoricalAnalyzer::from_draws(&[], DEFAULT_RECENT_WINDOW);
        assert!(!analyzer.has_history());
        assert_eq!(analyzer.stats().len(), 37);
        assert!(analyzer.stats().iter().all(|s| s.overdue_score == 0.0));
        assert!(analyzer.insights().hot_numbers.is_empty());
    }

    #[test]
    fn test_patterns_need_three_draws() {
        let mut analyzer = HistoricalAnalyzer::default();
        let draws = three_draws();
        assert!(analyzer.identify_patterns(&draws[..2]).is_empty());
        assert!(analyzer.top_patterns(3).is_empty());
    }

    #[test]
    fn test_patterns() {
        let mut analyzer = HistoricalAnalyzer::default();
        let patterns = analyzer.identify_patterns(&three_draws());
        assert_eq!(patterns.len(), 3);

        // Paires : 1 (1-2), 2 (5-6, 6-7), 0.
        assert_eq!(patterns[0].kind, PatternKind::Consecutive);
        assert_eq!(patterns[0].value, PatternValue::Average(1.0));

        let PatternValue::Zones(zones) = &patterns[1].value else {
            panic!("répartition attendue");
        };
        assert!((zones.low + zones.mid + zones.high - 100.0).abs() < 0.2);

        // Impairs : 3 (1,15,35), 4 (5,7,33,35), 5 (3,9,27,31,35).
        assert_eq!(patterns[2].value, PatternValue::Average(4.0));

        assert_eq!(analyzer.top_patterns(2).len(), 2);
        assert_eq!(analyzer.top_patterns(10).len(), 3);
    }

    #[test]
    fn test_patterns_use_ten_latest_draws() {
        let mut draws: Vec<Draw> = (3..=12)
            .rev()
            .map(|i| draw(&format!("第{i}回"), [1, 2, 10, 15, 20, 30, 35], [3, 4]))
            .collect();
        draws.push(draw("第2回", [5, 7, 9, 11, 13, 31, 33], [1, 2]));
        draws.push(draw("第1回", [5, 7, 9, 11, 13, 31, 33], [1, 2]));

        let patterns = mine_patterns(&draws);
        // Les deux plus anciens (aucune paire, sept impairs) ne comptent pas.
        assert_eq!(patterns[0].value, PatternValue::Average(1.0));
        assert_eq!(
            patterns[1].value,
            PatternValue::Zones(ZoneShare {
                low: 42.9,
                mid: 28.6,
                high: 28.6,
            })
        );
        assert_eq!(patterns[2].value, PatternValue::Average(3.0));
    }

    #[test]
    fn test_insights_ordering() {
        let analyzer = HistoricalAnalyzer::from_draws(&three_draws(), DEFAULT_RECENT_WINDOW);
        let insights = analyzer.insights();
        assert_eq!(insights.hot_numbers.len(), 10);
        assert_eq!(insights.hot_numbers[0].number, 35);
        assert!(insights.hot_numbers.windows(2).all(|w| w[0].score >= w[1].score));
        // Les jamais sortis ont le retard maximal ; départage par numéro croissant.
        assert_eq!(insights.overdue_numbers[0].score, 100.0);
        assert!(insights
            .overdue_numbers
            .windows(2)
            .all(|w| w[0].score > w[1].score || w[0].number < w[1].number));
    }

    #[test]
    fn test_pattern_json_shape() {
        let mut analyzer = HistoricalAnalyzer::default();
        analyzer.identify_patterns(&three_draws());
        let json = serde_json::to_value(analyzer.top_patterns(3)).unwrap();
        assert_eq!(json[0]["type"], "consecutive");
        assert!(json[1]["value"]["low"].as_f64().is_some());
    }
}
