use anyhow::{Context, Result};
use loto7_db::rusqlite::Connection;
use std::path::Path;

use loto7_db::db::{StoreError, add_draw, load_draws, parse_draw_file, save_draws};
use loto7_db::models::DrawFile;

pub struct ImportResult {
    pub total_records: u32,
    pub inserted: u32,
    pub skipped: u32,
    pub replaced: bool,
}

/// Importe un fichier `{"draws": [...]}` (plus récent en tête).
/// Sans `replace`, les tirages déjà connus sont ignorés et les nouveaux ajoutés
/// du plus ancien au plus récent, ce qui préserve l'ordre du fichier.
pub fn import_json(conn: &Connection, path: &Path, replace: bool) -> Result<ImportResult> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible d'ouvrir {:?}", path))?;
    let draws = parse_draw_file(&content).with_context(|| format!("Fichier {:?} rejeté", path))?;

    let mut result = ImportResult {
        total_records: draws.len() as u32,
        inserted: 0,
        skipped: 0,
        replaced: replace,
    };

    if replace {
        save_draws(conn, &draws).context("Échec de la réécriture de l'historique")?;
        result.inserted = result.total_records;
        return Ok(result);
    }

    let tx = conn
        .unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;
    for draw in draws.iter().rev() {
        match add_draw(&tx, draw) {
            Ok(()) => result.inserted += 1,
            Err(StoreError::DuplicateId(id)) => {
                tracing::debug!(%id, "doublon ignoré");
                result.skipped += 1;
            }
            Err(e) => return Err(e).with_context(|| format!("Insertion de {} impossible", draw.id)),
        }
    }
    tx.commit().context("Échec du commit")?;
    Ok(result)
}

pub fn export_json(conn: &Connection, path: &Path) -> Result<usize> {
    let file = DrawFile {
        draws: load_draws(conn)?,
    };
    let json = serde_json::to_string_pretty(&file)?;
    std::fs::write(path, json).with_context(|| format!("Impossible d'écrire {:?}", path))?;
    Ok(file.draws.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loto7_db::db::migrate;

    const FILE: &str = r#"{"draws": [
        {"id": "第649回", "date": "2025-10-03", "main": [12, 22, 23, 26, 33, 35, 37], "bonus": [2, 21]},
        {"id": "第648回", "date": "2025-09-26", "main": [5, 6, 7, 12, 22, 33, 35], "bonus": [8, 9]}
    ]}"#;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    fn write_file(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("draws.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_import_merge_keeps_order_and_skips_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, FILE);
        let conn = memory_db();

        let first = import_json(&conn, &path, false).unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(first.skipped, 0);

        let second = import_json(&conn, &path, false).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, 2);

        let draws = load_draws(&conn).unwrap();
        assert_eq!(draws[0].id, "第649回");
        assert_eq!(draws[1].id, "第648回");
    }

    #[test]
    fn test_import_replace() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, FILE);
        let conn = memory_db();
        import_json(&conn, &path, false).unwrap();

        let result = import_json(&conn, &path, true).unwrap();
        assert!(result.replaced);
        assert_eq!(result.inserted, 2);
        assert_eq!(load_draws(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_import_invalid_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            r#"{"draws": [{"id": "第1回", "date": "2025-01-01", "main": [1, 2, 3], "bonus": [4, 5]}]}"#,
        );
        let conn = memory_db();
        assert!(import_json(&conn, &path, false).is_err());
        assert_eq!(load_draws(&conn).unwrap().len(), 0);
    }

    #[test]
    fn test_export_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, FILE);
        let conn = memory_db();
        import_json(&conn, &path, false).unwrap();

        let out = dir.path().join("export.json");
        assert_eq!(export_json(&conn, &out).unwrap(), 2);
        let exported = parse_draw_file(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(exported, load_draws(&conn).unwrap());
    }
}
