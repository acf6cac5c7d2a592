//! Forward-only schema migration framework.
//!
//! Tracks the schema version in `schema_meta` and runs sequential migrations
//! to bring the database up to [`CURRENT_SCHEMA_VERSION`].

use rusqlite::{params, Connection, OptionalExtension};

use super::schema;

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Get the current schema version from the database.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

fn update_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
        [version.to_string()],
    )?;
    Ok(())
}

fn get_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = ?1",
        [key],
        |row| row.get::<_, String>(0),
    )
    .optional()
}

fn set_meta(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}

/// Get the stored embedding model identifier, if any.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    get_meta(conn, "embedding_model")
}

/// Set the stored embedding model identifier.
pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    set_meta(conn, "embedding_model", model)
}

/// Get the embedding dimensionality the vector table was created with.
pub fn get_embedding_dim(conn: &Connection) -> rusqlite::Result<Option<usize>> {
    Ok(get_meta(conn, "embedding_dim")?.and_then(|v| v.parse().ok()))
}

pub fn set_embedding_dim(conn: &Connection, dimensions: usize) -> rusqlite::Result<()> {
    set_meta(conn, "embedding_dim", &dimensions.to_string())
}

/// Run any pending forward-only migrations.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    let mut version = get_schema_version(conn)?;
    tracing::debug!(schema_version = version, target = CURRENT_SCHEMA_VERSION, "checking migrations");

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        tracing::info!(from = version, to = next, "running migration");

        match next {
            2 => migrate_v1_to_v2(conn)?,
            3 => migrate_v2_to_v3(conn)?,
            _ => {
                tracing::error!(version = next, "unknown migration target");
                break;
            }
        }

        update_schema_version(conn, next)?;
        version = next;
    }

    Ok(())
}

/// Migration v1 → v2: index the entry kind stored in metadata, since every
/// scan and filtered query narrows on it.
fn migrate_v1_to_v2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_entries_type ON entries(json_extract(metadata, '$.type'));",
    )
}

/// Migration v2 → v3: index `(collection, type)` together, and partition the
/// vector table by collection so KNN never ranks another collection's rows.
fn migrate_v2_to_v3(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "DROP INDEX IF EXISTS idx_entries_type;
         CREATE INDEX IF NOT EXISTS idx_entries_collection_type
             ON entries(collection, json_extract(metadata, '$.type'));",
    )?;

    let ddl: String = conn.query_row(
        "SELECT sql FROM sqlite_master WHERE name = 'entries_vec'",
        [],
        |row| row.get(0),
    )?;
    if ddl.to_lowercase().contains("partition key") {
        return Ok(());
    }
    let dimensions = vec_dimensions(&ddl).ok_or_else(|| {
        rusqlite::Error::ModuleError(format!("cannot read vector width from: {ddl}"))
    })?;

    let rows: Vec<(String, String, Vec<u8>)> = {
        let mut stmt = conn.prepare(
            "SELECT v.id, e.collection, v.embedding \
             FROM entries_vec v JOIN entries e ON e.id = v.id",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch("DROP TABLE entries_vec;")?;
    tx.execute_batch(&schema::vec_table_sql(dimensions))?;
    for (id, collection, embedding) in &rows {
        tx.execute(
            "INSERT INTO entries_vec (id, collection, embedding) VALUES (?1, ?2, ?3)",
            params![id, collection, embedding],
        )?;
    }
    tx.commit()?;

    tracing::info!(vectors = rows.len(), dimensions, "vector table partitioned by collection");
    Ok(())
}

/// The `N` in `FLOAT[N]` of a vec0 table definition.
fn vec_dimensions(ddl: &str) -> Option<usize> {
    let upper = ddl.to_uppercase();
    let start = upper.find("FLOAT[")? + "FLOAT[".len();
    let len = upper[start..].find(']')?;
    upper[start..start + len].trim().parse().ok()
}
