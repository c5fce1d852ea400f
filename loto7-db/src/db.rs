use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use thiserror::Error;

use crate::models::{Draw, DrawFile, ValidationError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS draws (
    seq         INTEGER PRIMARY KEY,
    id          TEXT NOT NULL UNIQUE,
    date        TEXT NOT NULL,
    main_1      INTEGER NOT NULL,
    main_2      INTEGER NOT NULL,
    main_3      INTEGER NOT NULL,
    main_4      INTEGER NOT NULL,
    main_5      INTEGER NOT NULL,
    main_6      INTEGER NOT NULL,
    main_7      INTEGER NOT NULL,
    bonus_1     INTEGER NOT NULL,
    bonus_2     INTEGER NOT NULL,
    evaluation  TEXT
);
";

const SELECT_DRAWS: &str = "
SELECT id, date, main_1, main_2, main_3, main_4, main_5, main_6, main_7, bonus_1, bonus_2, evaluation
FROM draws ORDER BY seq DESC";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("tirage {id} invalide : {source}")]
    Invalid {
        id: String,
        #[source]
        source: ValidationError,
    },
    #[error("le tirage {0} existe déjà")]
    DuplicateId(String),
    #[error("format de fichier invalide : {0}")]
    Format(String),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub fn db_path() -> PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("loto7.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossible d'ouvrir la base {:?}", path))?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Échec de la migration")?;
    Ok(())
}

fn row_to_draw(row: &Row<'_>) -> rusqlite::Result<Draw> {
    let mut main = Vec::with_capacity(7);
    for idx in 2..9 {
        main.push(row.get::<_, u8>(idx)?);
    }
    let bonus = vec![row.get::<_, u8>(9)?, row.get::<_, u8>(10)?];
    let evaluation: Option<String> = row.get(11)?;
    let evaluation = evaluation
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, Box::new(e)))?;
    Ok(Draw {
        id: row.get(0)?,
        date: row.get(1)?,
        main,
        bonus,
        evaluation,
    })
}

fn insert_at(conn: &Connection, seq: i64, draw: &Draw) -> rusqlite::Result<()> {
    let evaluation = draw.evaluation.as_ref().map(|v| v.to_string());
    conn.execute(
        "INSERT INTO draws (seq, id, date, main_1, main_2, main_3, main_4, main_5, main_6, main_7, bonus_1, bonus_2, evaluation)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        rusqlite::params![
            seq,
            draw.id,
            draw.date,
            draw.main[0],
            draw.main[1],
            draw.main[2],
            draw.main[3],
            draw.main[4],
            draw.main[5],
            draw.main[6],
            draw.bonus[0],
            draw.bonus[1],
            evaluation,
        ],
    )?;
    Ok(())
}

fn checked(draw: &Draw) -> Result<(), StoreError> {
    draw.validate().map_err(|source| StoreError::Invalid {
        id: draw.id.clone(),
        source,
    })
}

/// Tous les tirages, du plus récent au plus ancien.
pub fn load_draws(conn: &Connection) -> Result<Vec<Draw>> {
    let mut stmt = conn.prepare(SELECT_DRAWS)?;
    let draws = stmt
        .query_map([], row_to_draw)?
        .collect::<Result<Vec<_>, _>>()
        .context("Lecture des tirages impossible")?;
    Ok(draws)
}

/// Comme `load_draws`, mais une base illisible ou corrompue donne une liste vide.
pub fn load_draws_or_empty(conn: &Connection) -> Vec<Draw> {
    match load_draws(conn) {
        Ok(draws) => draws,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "historique illisible, analyse sur une base vide");
            Vec::new()
        }
    }
}

/// Ouvre et migre la base. Un fichier illisible ou corrompu est remplacé par
/// une base vide en mémoire, avec un avertissement : l'historique est alors vide.
pub fn open_db_or_memory(path: &Path) -> Result<Connection> {
    match open_db(path).and_then(|conn| migrate(&conn).map(|_| conn)) {
        Ok(conn) => Ok(conn),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %format!("{e:#}"), "base inaccessible, historique vide");
            let conn = Connection::open_in_memory().context("Impossible d'ouvrir une base en mémoire")?;
            migrate(&conn)?;
            Ok(conn)
        }
    }
}

pub fn fetch_last_draws(conn: &Connection, limit: u32) -> Result<Vec<Draw>> {
    let sql = format!("{SELECT_DRAWS} LIMIT ?1");
    let mut stmt = conn.prepare(&sql)?;
    let draws = stmt
        .query_map([limit], row_to_draw)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(draws)
}

pub fn latest_draw(conn: &Connection) -> Result<Option<Draw>> {
    let sql = format!("{SELECT_DRAWS} LIMIT 1");
    let draw = conn.query_row(&sql, [], row_to_draw).optional()?;
    Ok(draw)
}

pub fn count_draws(conn: &Connection) -> Result<u32> {
    let count: u32 = conn.query_row("SELECT COUNT(*) FROM draws", [], |row| row.get(0))?;
    Ok(count)
}

/// Réécrit entièrement l'historique. `draws[0]` devient le plus récent.
pub fn save_draws(conn: &Connection, draws: &[Draw]) -> Result<(), StoreError> {
    let mut seen = HashSet::new();
    for draw in draws {
        checked(draw)?;
        if !seen.insert(draw.id.as_str()) {
            return Err(StoreError::DuplicateId(draw.id.clone()));
        }
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM draws", [])?;
    let total = draws.len() as i64;
    for (i, draw) in draws.iter().enumerate() {
        insert_at(&tx, total - i as i64, draw)?;
    }
    tx.commit()?;
    Ok(())
}

/// Ajoute un tirage en tête de l'historique après validation.
pub fn add_draw(conn: &Connection, draw: &Draw) -> Result<(), StoreError> {
    checked(draw)?;

    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM draws WHERE id = ?1)",
        [&draw.id],
        |row| row.get(0),
    )?;
    if exists {
        return Err(StoreError::DuplicateId(draw.id.clone()));
    }

    let next_seq: i64 = conn.query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM draws", [], |row| row.get(0))?;
    insert_at(conn, next_seq, draw)?;
    tracing::debug!(id = %draw.id, seq = next_seq, "tirage ajouté");
    Ok(())
}

/// Parse et valide un fichier `{"draws": [...]}`. Le premier tirage invalide interrompt le parsing.
pub fn parse_draw_file(json: &str) -> Result<Vec<Draw>, StoreError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| StoreError::Format(e.to_string()))?;
    if !value.get("draws").is_some_and(|d| d.is_array()) {
        return Err(StoreError::Format("tableau \"draws\" obligatoire".to_string()));
    }
    let file: DrawFile =
        serde_json::from_value(value).map_err(|e| StoreError::Format(e.to_string()))?;
    for draw in &file.draws {
        checked(draw)?;
    }
    Ok(file.draws)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_draw(id: &str, main: [u8; 7], bonus: [u8; 2]) -> Draw {
        Draw::new(id, "2024-01-05", main.to_vec(), bonus.to_vec())
    }

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn test_add_and_count() {
        let conn = memory_db();
        assert_eq!(count_draws(&conn).unwrap(), 0);

        add_draw(&conn, &test_draw("第1回", [1, 2, 3, 4, 5, 6, 7], [8, 9])).unwrap();
        assert_eq!(count_draws(&conn).unwrap(), 1);
    }

    #[test]
    fn test_add_prepends() {
        let conn = memory_db();
        add_draw(&conn, &test_draw("第1回", [1, 2, 3, 4, 5, 6, 7], [8, 9])).unwrap();
        add_draw(&conn, &test_draw("第2回", [11, 12, 13, 14, 15, 16, 17], [18, 19])).unwrap();

        let draws = load_draws(&conn).unwrap();
        assert_eq!(draws[0].id, "第2回");
        assert_eq!(draws[1].id, "第1回");
        assert_eq!(latest_draw(&conn).unwrap().unwrap().id, "第2回");
    }

    #[test]
    fn test_duplicate_rejected() {
        let conn = memory_db();
        add_draw(&conn, &test_draw("第1回", [1, 2, 3, 4, 5, 6, 7], [8, 9])).unwrap();
        let err = add_draw(&conn, &test_draw("第1回", [11, 12, 13, 14, 15, 16, 17], [18, 19])).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(id) if id == "第1回"));
        assert_eq!(count_draws(&conn).unwrap(), 1);
    }

    #[test]
    fn test_invalid_rejected() {
        let conn = memory_db();
        let err = add_draw(&conn, &test_draw("第1回", [1, 2, 3, 4, 5, 6, 7], [7, 9])).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Invalid { source: ValidationError::MainBonusOverlap(7), .. }
        ));
        assert_eq!(count_draws(&conn).unwrap(), 0);
    }

    #[test]
    fn test_save_overwrites_in_order() {
        let conn = memory_db();
        add_draw(&conn, &test_draw("第9回", [1, 2, 3, 4, 5, 6, 7], [8, 9])).unwrap();

        let draws = vec![
            test_draw("第3回", [1, 2, 3, 4, 5, 6, 7], [8, 9]),
            test_draw("第2回", [11, 12, 13, 14, 15, 16, 17], [18, 19]),
            test_draw("第1回", [21, 22, 23, 24, 25, 26, 27], [28, 29]),
        ];
        save_draws(&conn, &draws).unwrap();

        let loaded = load_draws(&conn).unwrap();
        let ids: Vec<&str> = loaded.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["第3回", "第2回", "第1回"]);
        assert_eq!(fetch_last_draws(&conn, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_save_rejects_duplicate_batch() {
        let conn = memory_db();
        let draws = vec![
            test_draw("第1回", [1, 2, 3, 4, 5, 6, 7], [8, 9]),
            test_draw("第1回", [11, 12, 13, 14, 15, 16, 17], [18, 19]),
        ];
        assert!(matches!(save_draws(&conn, &draws), Err(StoreError::DuplicateId(_))));
    }

    #[test]
    fn test_evaluation_persisted() {
        let conn = memory_db();
        let mut draw = test_draw("第1回", [1, 2, 3, 4, 5, 6, 7], [8, 9]);
        draw.evaluation = Some(serde_json::json!({"overall_pass": false}));
        add_draw(&conn, &draw).unwrap();

        let loaded = latest_draw(&conn).unwrap().unwrap();
        assert_eq!(loaded, draw);
    }

    #[test]
    fn test_corrupt_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loto7.db");
        std::fs::write(&path, b"ceci n'est pas une base sqlite, vraiment pas").unwrap();
        assert!(open_db(&path).and_then(|conn| migrate(&conn)).is_err());

        let conn = open_db_or_memory(&path).unwrap();
        assert!(load_draws(&conn).unwrap().is_empty());
        assert_eq!(count_draws(&conn).unwrap(), 0);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("loto7.db");
        let conn = open_db_or_memory(&path).unwrap();
        assert!(load_draws(&conn).unwrap().is_empty());
        assert!(path.exists());
    }

    #[test]
    fn test_parse_draw_file() {
        let json = r#"{"draws": [
            {"id": "第650回", "date": "2025-10-10", "main": [1, 8, 10, 14, 25, 33, 35], "bonus": [12, 21]}
        ]}"#;
        let draws = parse_draw_file(json).unwrap();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].draw_number(), Some(650));
    }

    #[test]
    fn test_parse_draw_file_errors() {
        assert!(matches!(parse_draw_file("{}"), Err(StoreError::Format(_))));
        assert!(matches!(parse_draw_file("pas du json"), Err(StoreError::Format(_))));
        let json = r#"{"draws": [
            {"id": "第650回", "date": "2025-10-10", "main": [1, 8, 10, 14, 25, 33], "bonus": [12, 21]}
        ]}"#;
        assert!(matches!(parse_draw_file(json), Err(StoreError::Invalid { .. })));
    }
}
