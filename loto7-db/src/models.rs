use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Plus grand numéro tirable (1-37).
pub const MAX_NUMBER: u8 = 37;
pub const MAIN_COUNT: usize = 7;
pub const BONUS_COUNT: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draw {
    pub id: String,
    pub date: String,
    pub main: Vec<u8>,
    pub bonus: Vec<u8>,
    /// Diagnostic attaché après coup, opaque pour le stockage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<serde_json::Value>,
}

impl Draw {
    pub fn new(id: impl Into<String>, date: impl Into<String>, main: Vec<u8>, bonus: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            date: date.into(),
            main,
            bonus,
            evaluation: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id"));
        }
        if self.date.trim().is_empty() {
            return Err(ValidationError::MissingField("date"));
        }
        validate_draw(&self.main, &self.bonus)
    }

    /// Numéros principaux + bonus, utilisés par le filtre de « pull ».
    pub fn all_numbers(&self) -> impl Iterator<Item = u8> + '_ {
        self.main.iter().chain(self.bonus.iter()).copied()
    }

    /// Numéro de tirage extrait d'un identifiant `第<N>回...`.
    pub fn draw_number(&self) -> Option<u32> {
        draw_number(&self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pool {
    Main,
    Bonus,
}

impl Pool {
    pub fn numbers_from<'a>(&self, draw: &'a Draw) -> &'a [u8] {
        match self {
            Pool::Main => &draw.main,
            Pool::Bonus => &draw.bonus,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("champ obligatoire manquant : {0}")]
    MissingField(&'static str),
    #[error("{expected} numéros principaux attendus, {actual} reçus")]
    MainCount { expected: usize, actual: usize },
    #[error("{expected} numéros bonus attendus, {actual} reçus")]
    BonusCount { expected: usize, actual: usize },
    #[error("numéro {0} hors limites (1-37)")]
    OutOfRange(u8),
    #[error("numéro principal en double : {0}")]
    DuplicateMain(u8),
    #[error("numéro bonus en double : {0}")]
    DuplicateBonus(u8),
    #[error("le numéro {0} est à la fois principal et bonus")]
    MainBonusOverlap(u8),
}

fn check_numbers(numbers: &[u8], on_duplicate: fn(u8) -> ValidationError) -> Result<(), ValidationError> {
    let mut seen = [false; MAX_NUMBER as usize + 1];
    for &n in numbers {
        if !(1..=MAX_NUMBER).contains(&n) {
            return Err(ValidationError::OutOfRange(n));
        }
        if seen[n as usize] {
            return Err(on_duplicate(n));
        }
        seen[n as usize] = true;
    }
    Ok(())
}

/// 7 numéros distincts dans 1-37.
pub fn validate_main(main: &[u8]) -> Result<(), ValidationError> {
    if main.len() != MAIN_COUNT {
        return Err(ValidationError::MainCount {
            expected: MAIN_COUNT,
            actual: main.len(),
        });
    }
    check_numbers(main, ValidationError::DuplicateMain)
}

pub fn validate_draw(main: &[u8], bonus: &[u8]) -> Result<(), ValidationError> {
    validate_main(main)?;
    if bonus.len() != BONUS_COUNT {
        return Err(ValidationError::BonusCount {
            expected: BONUS_COUNT,
            actual: bonus.len(),
        });
    }
    check_numbers(bonus, ValidationError::DuplicateBonus)?;
    if let Some(&n) = bonus.iter().find(|b| main.contains(b)) {
        return Err(ValidationError::MainBonusOverlap(n));
    }
    Ok(())
}

pub fn draw_number(id: &str) -> Option<u32> {
    let (_, rest) = id.split_once('第')?;
    let (digits, _) = rest.split_once('回')?;
    digits.trim().parse().ok()
}

/// Format d'échange `{"draws": [...]}`, du plus récent au plus ancien.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawFile {
    pub draws: Vec<Draw>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_draw() -> Draw {
        Draw::new("第650回", "2025-10-10", vec![1, 8, 10, 14, 25, 33, 35], vec![12, 21])
    }

    #[test]
    fn test_validate_draw_ok() {
        assert!(sample_draw().validate().is_ok());
        assert!(validate_draw(&[31, 32, 33, 34, 35, 36, 37], &[1, 2]).is_ok());
    }

    #[test]
    fn test_validate_main_count() {
        let err = validate_draw(&[1, 8, 10, 14, 25, 33], &[12, 21]).unwrap_err();
        assert_eq!(err, ValidationError::MainCount { expected: 7, actual: 6 });
    }

    #[test]
    fn test_validate_duplicate_main() {
        let err = validate_draw(&[1, 8, 10, 10, 25, 33, 35], &[12, 21]).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateMain(10));
    }

    #[test]
    fn test_validate_bonus_overlap() {
        let err = validate_draw(&[1, 8, 10, 14, 25, 33, 35], &[8, 21]).unwrap_err();
        assert_eq!(err, ValidationError::MainBonusOverlap(8));
    }

    #[test]
    fn test_validate_out_of_range() {
        assert_eq!(
            validate_draw(&[0, 8, 10, 14, 25, 33, 35], &[12, 21]).unwrap_err(),
            ValidationError::OutOfRange(0)
        );
        assert_eq!(
            validate_draw(&[1, 8, 10, 14, 25, 33, 35], &[12, 38]).unwrap_err(),
            ValidationError::OutOfRange(38)
        );
    }

    #[test]
    fn test_validate_bonus_count_and_duplicates() {
        assert!(matches!(
            validate_draw(&[1, 8, 10, 14, 25, 33, 35], &[12]),
            Err(ValidationError::BonusCount { actual: 1, .. })
        ));
        assert_eq!(
            validate_draw(&[1, 8, 10, 14, 25, 33, 35], &[12, 12]).unwrap_err(),
            ValidationError::DuplicateBonus(12)
        );
    }

    #[test]
    fn test_validate_missing_id() {
        let mut draw = sample_draw();
        draw.id = "  ".to_string();
        assert_eq!(draw.validate().unwrap_err(), ValidationError::MissingField("id"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let draw = sample_draw();
        let json = serde_json::to_string(&draw).unwrap();
        assert!(!json.contains("evaluation"));
        let back: Draw = serde_json::from_str(&json).unwrap();
        assert_eq!(back, draw);
        assert_eq!(back.id, "第650回");
        assert_eq!(back.main, vec![1, 8, 10, 14, 25, 33, 35]);
        assert_eq!(back.bonus, vec![12, 21]);
    }

    #[test]
    fn test_missing_field_rejected_by_serde() {
        let json = r#"{"id": "第1回", "main": [1,2,3,4,5,6,7], "bonus": [8,9]}"#;
        assert!(serde_json::from_str::<Draw>(json).is_err());
    }

    #[test]
    fn test_draw_number() {
        assert_eq!(draw_number("第649回"), Some(649));
        assert_eq!(draw_number("第650回 候補3"), Some(650));
        assert_eq!(draw_number("650"), None);
        assert_eq!(draw_number("第x回"), None);
    }

    #[test]
    fn test_pool_numbers_from() {
        let draw = sample_draw();
        assert_eq!(Pool::Main.numbers_from(&draw), &[1, 8, 10, 14, 25, 33, 35]);
        assert_eq!(Pool::Bonus.numbers_from(&draw), &[12, 21]);
    }
}
