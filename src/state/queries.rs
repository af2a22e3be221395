// Database CRUD operations
use chrono::SecondsFormat;
use rusqlite::{params, Row};
use uuid::Uuid;

use super::db::{DbConnection, DbError, DbResult};
use super::models::Disease;

const DISEASE_COLUMNS: &str =
    "id, tree_disease_name, date_taken, image_path, image_sha256, image_bytes";

fn disease_from_row(row: &Row<'_>) -> rusqlite::Result<Disease> {
    let id: String = row.get(0)?;
    let date_taken: String = row.get(2)?;

    Ok(Disease {
        id: Uuid::parse_str(&id).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?,
        tree_disease_name: row.get(1)?,
        date_taken: date_taken.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?,
        image_path: row.get(3)?,
        image_sha256: row.get(4)?,
        image_bytes: row.get(5)?,
    })
}

// Conversion failures inside a row mean the file was written by something else
fn map_row_error(e: rusqlite::Error) -> DbError {
    match e {
        rusqlite::Error::FromSqlConversionFailure(index, _, source) => DbError::InvalidRow {
            column: match index {
                0 => "id",
                2 => "date_taken",
                _ => "unknown",
            },
            message: source.to_string(),
        },
        other => DbError::Sqlite(other),
    }
}

/// Insert a disease inside its own transaction
pub fn insert_disease(db: &DbConnection, disease: &Disease) -> DbResult<()> {
    db.transaction(|tx| {
        tx.execute(
            "INSERT INTO diseases (id, tree_disease_name, date_taken, image_path, image_sha256, image_bytes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                disease.id.to_string(),
                disease.tree_disease_name,
                disease.date_taken.to_rfc3339_opts(SecondsFormat::Nanos, true),
                disease.image_path,
                disease.image_sha256,
                disease.image_bytes,
            ],
        )?;
        Ok(())
    })
}

/// Get a disease by ID
pub fn get_disease(db: &DbConnection, id: &Uuid) -> DbResult<Option<Disease>> {
    let conn = db.lock()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {DISEASE_COLUMNS} FROM diseases WHERE id = ?1"
    ))?;

    match stmt.query_row([id.to_string()], disease_from_row) {
        Ok(disease) => Ok(Some(disease)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(map_row_error(e)),
    }
}

/// List every disease in the order they were taken
pub fn list_diseases(db: &DbConnection) -> DbResult<Vec<Disease>> {
    let conn = db.lock()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {DISEASE_COLUMNS} FROM diseases ORDER BY date_taken ASC, rowid ASC"
    ))?;

    let diseases = stmt
        .query_map([], disease_from_row)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(map_row_error)?;

    Ok(diseases)
}

/// Delete a disease, returning whether a row was removed
pub fn delete_disease(db: &DbConnection, id: &Uuid) -> DbResult<bool> {
    let removed = db.transaction(|tx| {
        Ok(tx.execute("DELETE FROM diseases WHERE id = ?1", params![id.to_string()])?)
    })?;
    Ok(removed > 0)
}

/// Delete every disease, returning how many rows were removed
pub fn delete_all_diseases(db: &DbConnection) -> DbResult<usize> {
    db.transaction(|tx| Ok(tx.execute("DELETE FROM diseases", [])?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::db::open_in_memory;
    use crate::state::models::StoredImage;

    fn sample(name: &str) -> Disease {
        Disease::new(
            name.to_string(),
            StoredImage {
                path: format!("/data/images/{name}.jpg"),
                sha256: "00".repeat(32),
                bytes: 42,
            },
        )
    }

    #[test]
    fn test_insert_and_get() {
        let db = open_in_memory().unwrap();
        let disease = sample("panama");
        insert_disease(&db, &disease).unwrap();

        let fetched = get_disease(&db, &disease.id).unwrap();
        assert_eq!(fetched, Some(disease));
    }

    #[test]
    fn test_get_missing_is_none() {
        let db = open_in_memory().unwrap();
        assert_eq!(get_disease(&db, &Uuid::new_v4()).unwrap(), None);
    }

    #[test]
    fn test_list_in_insertion_order() {
        let db = open_in_memory().unwrap();
        let first = sample("sigatoka");
        let second = sample("bunchy-top");
        insert_disease(&db, &first).unwrap();
        insert_disease(&db, &second).unwrap();

        let ids: Vec<Uuid> = list_diseases(&db).unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let db = open_in_memory().unwrap();
        let disease = sample("moko");
        insert_disease(&db, &disease).unwrap();
        assert!(insert_disease(&db, &disease).is_err());
        assert_eq!(list_diseases(&db).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_disease() {
        let db = open_in_memory().unwrap();
        let keep = sample("keep");
        let gone = sample("gone");
        insert_disease(&db, &keep).unwrap();
        insert_disease(&db, &gone).unwrap();

        assert!(delete_disease(&db, &gone.id).unwrap());
        assert!(!delete_disease(&db, &gone.id).unwrap());
        assert_eq!(list_diseases(&db).unwrap(), vec![keep]);
    }

    #[test]
    fn test_delete_all_diseases() {
        let db = open_in_memory().unwrap();
        insert_disease(&db, &sample("a")).unwrap();
        insert_disease(&db, &sample("b")).unwrap();

        assert_eq!(delete_all_diseases(&db).unwrap(), 2);
        assert!(list_diseases(&db).unwrap().is_empty());
        assert_eq!(delete_all_diseases(&db).unwrap(), 0);
    }

    #[test]
    fn test_corrupt_id_reported() {
        let db = open_in_memory().unwrap();
        db.lock()
            .unwrap()
            .execute(
                "INSERT INTO diseases (id, tree_disease_name, date_taken, image_path, image_sha256, image_bytes)
                 VALUES ('not-a-uuid', 'x', '2024-01-01T00:00:00Z', '/x.jpg', '', 0)",
                [],
            )
            .unwrap();

        assert!(matches!(
            list_diseases(&db),
            Err(DbError::InvalidRow { column: "id", .. })
        ));
    }
}
