//! SQLite storage backend

use super::traits::{GraphStore, OpenStore, StoreError, StoreResult};
use crate::graph::{
    EdgeId, Entity, EntityKey, EntityType, ExternalId, RelationKind, Relationship,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

/// SQLite-backed graph store
///
/// Uses a single database file with tables for entities, external
/// identifiers, and relationships. Thread-safe via internal mutex on
/// the connection. The graph's uniqueness invariants are enforced by
/// unique indexes, so a concurrent writer that loses a race gets a
/// [`StoreError::Conflict`] back instead of a silent duplicate.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            r#"
            -- Entities table
            CREATE TABLE IF NOT EXISTS entities (
                key TEXT PRIMARY KEY,
                entity_type TEXT NOT NULL,
                canonical_name TEXT NOT NULL,
                aliases_json TEXT NOT NULL,
                confidence REAL NOT NULL,
                sources_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- One entity per canonical identity
            CREATE UNIQUE INDEX IF NOT EXISTS idx_entities_identity
                ON entities(entity_type, canonical_name);

            -- External identifiers, one owner per (namespace, id)
            CREATE TABLE IF NOT EXISTS external_ids (
                namespace TEXT NOT NULL,
                external_id TEXT NOT NULL,
                entity_key TEXT NOT NULL,
                PRIMARY KEY (namespace, external_id),
                FOREIGN KEY (entity_key) REFERENCES entities(key) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_external_ids_entity
                ON external_ids(entity_key);

            -- Relationships table
            CREATE TABLE IF NOT EXISTS relationships (
                id TEXT PRIMARY KEY,
                source_key TEXT NOT NULL,
                target_key TEXT NOT NULL,
                kind TEXT NOT NULL,
                confidence REAL NOT NULL,
                sources_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (source_key) REFERENCES entities(key),
                FOREIGN KEY (target_key) REFERENCES entities(key)
            );

            -- One relationship per endpoint pair and kind
            CREATE UNIQUE INDEX IF NOT EXISTS idx_relationships_pair
                ON relationships(source_key, target_key, kind);
            CREATE INDEX IF NOT EXISTS idx_relationships_source
                ON relationships(source_key);
            CREATE INDEX IF NOT EXISTS idx_relationships_target
                ON relationships(target_key);

            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- Enable WAL mode for concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )
        .map_err(sql_err)?;
        Ok(())
    }

    /// Load the external identifiers attached to an entity, in
    /// insertion order.
    fn load_external_ids(conn: &Connection, key: &str) -> StoreResult<Vec<ExternalId>> {
        let mut stmt = conn
            .prepare(
                "SELECT namespace, external_id FROM external_ids
                 WHERE entity_key = ?1 ORDER BY rowid",
            )
            .map_err(sql_err)?;
        let rows = stmt
            .query_map(params![key], |row| {
                Ok(ExternalId::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                ))
            })
            .map_err(sql_err)?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row.map_err(sql_err)?);
        }
        Ok(ids)
    }

    /// Deserialize an entity row (without external identifiers)
    #[allow(clippy::too_many_arguments)]
    fn row_to_entity(
        key: String,
        entity_type: String,
        canonical_name: String,
        aliases_json: String,
        confidence: f64,
        sources_json: String,
        created_at: String,
        updated_at: String,
    ) -> StoreResult<Entity> {
        Ok(Entity {
            key: parse_key(&key)?,
            entity_type: EntityType::from_label(&entity_type)
                .ok_or_else(|| StoreError::Corrupt(format!("entity type {entity_type}")))?,
            canonical_name,
            aliases: serde_json::from_str(&aliases_json)?,
            external_ids: Vec::new(),
            confidence,
            sources: serde_json::from_str(&sources_json)?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    /// Deserialize a relationship row
    #[allow(clippy::too_many_arguments)]
    fn row_to_relationship(
        id: String,
        source_key: String,
        target_key: String,
        kind: String,
        confidence: f64,
        sources_json: String,
        created_at: String,
        updated_at: String,
    ) -> StoreResult<Relationship> {
        Ok(Relationship {
            id: EdgeId::from_uuid(parse_uuid(&id)?),
            source: parse_key(&source_key)?,
            target: parse_key(&target_key)?,
            kind: RelationKind::from_label(&kind)
                .ok_or_else(|| StoreError::Corrupt(format!("relation kind {kind}")))?,
            confidence,
            sources: serde_json::from_str(&sources_json)?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    fn find_node_row(
        conn: &Connection,
        entity_type: EntityType,
        canonical_name: &str,
    ) -> StoreResult<Option<Entity>> {
        let row = conn
            .query_row(
                "SELECT key, entity_type, canonical_name, aliases_json, confidence,
                        sources_json, created_at, updated_at
                 FROM entities WHERE entity_type = ?1 AND canonical_name = ?2",
                params![entity_type.as_label(), canonical_name],
                entity_row_columns,
            )
            .optional()
            .map_err(sql_err)?;

        match row {
            Some(columns) => {
                let mut entity = Self::entity_from_columns(columns)?;
                entity.external_ids = Self::load_external_ids(conn, &entity.key.to_string())?;
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    fn entity_from_columns(columns: EntityColumns) -> StoreResult<Entity> {
        let (key, entity_type, canonical_name, aliases, confidence, sources, created, updated) =
            columns;
        Self::row_to_entity(
            key,
            entity_type,
            canonical_name,
            aliases,
            confidence,
            sources,
            created,
            updated,
        )
    }
}

type EntityColumns = (String, String, String, String, f64, String, String, String);

fn entity_row_columns(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntityColumns> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

/// Map a rusqlite error onto the store taxonomy: constraint violations
/// are conflicts, unreachable-database codes are unavailability,
/// everything else passes through.
fn sql_err(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, message) => match e.code {
            rusqlite::ErrorCode::ConstraintViolation => StoreError::Conflict(
                message
                    .clone()
                    .unwrap_or_else(|| "constraint violation".to_string()),
            ),
            rusqlite::ErrorCode::CannotOpen
            | rusqlite::ErrorCode::NotADatabase
            | rusqlite::ErrorCode::DiskFull
            | rusqlite::ErrorCode::SystemIoFailure => StoreError::Unavailable(err.to_string()),
            _ => StoreError::Database(err),
        },
        _ => StoreError::Database(err),
    }
}

fn parse_uuid(text: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(text).map_err(|e| StoreError::Corrupt(format!("uuid {text}: {e}")))
}

fn parse_key(text: &str) -> StoreResult<EntityKey> {
    Ok(EntityKey::from_uuid(parse_uuid(text)?))
}

fn parse_timestamp(text: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp {text}: {e}")))
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(sql_err)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(sql_err)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl GraphStore for SqliteStore {
    async fn find_node(
        &self,
        entity_type: EntityType,
        canonical_name: &str,
    ) -> StoreResult<Option<Entity>> {
        let conn = self.conn.lock().unwrap();
        Self::find_node_row(&conn, entity_type, canonical_name)
    }

    async fn find_node_by_external_id(
        &self,
        namespace: &str,
        id: &str,
    ) -> StoreResult<Option<Entity>> {
        let conn = self.conn.lock().unwrap();
        let owner: Option<String> = conn
            .query_row(
                "SELECT entity_key FROM external_ids
                 WHERE namespace = ?1 AND external_id = ?2",
                params![namespace, id],
                |row| row.get(0),
            )
            .optional()
            .map_err(sql_err)?;

        let Some(key) = owner else {
            return Ok(None);
        };
        let row = conn
            .query_row(
                "SELECT key, entity_type, canonical_name, aliases_json, confidence,
                        sources_json, created_at, updated_at
                 FROM entities WHERE key = ?1",
                params![key],
                entity_row_columns,
            )
            .optional()
            .map_err(sql_err)?;

        match row {
            Some(columns) => {
                let mut entity = Self::entity_from_columns(columns)?;
                entity.external_ids = Self::load_external_ids(&conn, &entity.key.to_string())?;
                Ok(Some(entity))
            }
            None => Err(StoreError::Corrupt(format!(
                "external id row points at missing entity {key}"
            ))),
        }
    }

    async fn find_edge(
        &self,
        source: &EntityKey,
        target: &EntityKey,
        kind: RelationKind,
    ) -> StoreResult<Option<Relationship>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, source_key, target_key, kind, confidence, sources_json,
                        created_at, updated_at
                 FROM relationships
                 WHERE source_key = ?1 AND target_key = ?2 AND kind = ?3",
                params![source.to_string(), target.to_string(), kind.as_label()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()
            .map_err(sql_err)?;

        match row {
            Some((id, s, t, k, confidence, sources, created, updated)) => Ok(Some(
                Self::row_to_relationship(id, s, t, k, confidence, sources, created, updated)?,
            )),
            None => Ok(None),
        }
    }

    async fn upsert_node(&self, entity: &Entity) -> StoreResult<EntityKey> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(sql_err)?;
        let key = entity.key.to_string();

        tx.execute(
            r#"
            INSERT INTO entities (key, entity_type, canonical_name, aliases_json,
                                  confidence, sources_json, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(key) DO UPDATE SET
                aliases_json = excluded.aliases_json,
                confidence = excluded.confidence,
                sources_json = excluded.sources_json,
                updated_at = excluded.updated_at
            "#,
            params![
                key,
                entity.entity_type.as_label(),
                entity.canonical_name,
                serde_json::to_string(&entity.aliases)?,
                entity.confidence,
                serde_json::to_string(&entity.sources)?,
                entity.created_at.to_rfc3339(),
                entity.updated_at.to_rfc3339(),
            ],
        )
        .map_err(sql_err)?;

        for x in &entity.external_ids {
            let owner: Option<String> = tx
                .query_row(
                    "SELECT entity_key FROM external_ids
                     WHERE namespace = ?1 AND external_id = ?2",
                    params![x.namespace, x.id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_err)?;

            match owner {
                Some(k) if k != key => {
                    // Transaction rolls back on drop
                    return Err(StoreError::Conflict(format!(
                        "external id {x} already owned by {k}"
                    )));
                }
                Some(_) => {}
                None => {
                    tx.execute(
                        "INSERT INTO external_ids (namespace, external_id, entity_key)
                         VALUES (?1, ?2, ?3)",
                        params![x.namespace, x.id, key],
                    )
                    .map_err(sql_err)?;
                }
            }
        }

        tx.commit().map_err(sql_err)?;
        Ok(entity.key)
    }

    async fn upsert_edge(&self, relationship: &Relationship) -> StoreResult<EdgeId> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO relationships (id, source_key, target_key, kind, confidence,
                                       sources_json, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                confidence = excluded.confidence,
                sources_json = excluded.sources_json,
                updated_at = excluded.updated_at
            "#,
            params![
                relationship.id.to_string(),
                relationship.source.to_string(),
                relationship.target.to_string(),
                relationship.kind.as_label(),
                relationship.confidence,
                serde_json::to_string(&relationship.sources)?,
                relationship.created_at.to_rfc3339(),
                relationship.updated_at.to_rfc3339(),
            ],
        )
        .map_err(sql_err)?;
        Ok(relationship.id)
    }

    async fn count_nodes(&self) -> StoreResult<Vec<(EntityType, u64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT entity_type, COUNT(*) FROM entities
                 GROUP BY entity_type ORDER BY entity_type",
            )
            .map_err(sql_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(sql_err)?;

        let mut counts = Vec::new();
        for row in rows {
            let (label, count) = row.map_err(sql_err)?;
            let entity_type = EntityType::from_label(&label)
                .ok_or_else(|| StoreError::Corrupt(format!("entity type {label}")))?;
            counts.push((entity_type, count as u64));
        }
        Ok(counts)
    }

    async fn count_edges(&self) -> StoreResult<Vec<(RelationKind, u64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT kind, COUNT(*) FROM relationships
                 GROUP BY kind ORDER BY kind",
            )
            .map_err(sql_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(sql_err)?;

        let mut counts = Vec::new();
        for row in rows {
            let (label, count) = row.map_err(sql_err)?;
            let kind = RelationKind::from_label(&label)
                .ok_or_else(|| StoreError::Corrupt(format!("relation kind {label}")))?;
            counts.push((kind, count as u64));
        }
        Ok(counts)
    }
}
