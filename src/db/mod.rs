mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::*;

/// Everything the ledger persists when a publish lands.
///
/// Applied in a single transaction by [`Database::commit_publish`].
pub struct PublishCommit<'a> {
    pub publish: &'a Publish,
    /// Work file the item moves to once its version is bumped.
    pub next_location: &'a str,
    /// Renders published alongside, with `published_path` and `record_id` set.
    pub renders: &'a [RenderOutput],
}

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "shot-ledger")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().join("ledger.db"))
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Work item operations
    // ============================================================

    pub fn get_all_work_items(&self) -> Result<Vec<WorkItem>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, name, version, location, created_at, updated_at
             FROM work_items ORDER BY name",
        )?;

        let items = stmt
            .query_map([], work_item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    pub fn get_work_item(&self, name: &str) -> Result<Option<WorkItem>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let item = conn
            .query_row(
                "SELECT id, name, version, location, created_at, updated_at
                 FROM work_items WHERE name = ?",
                [name],
                work_item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    /// Register a work item at version 1.
    pub fn create_work_item(&self, input: CreateWorkItemInput) -> Result<WorkItem> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO work_items (id, name, version, location, created_at, updated_at)
             VALUES (?, ?, 1, ?, ?, ?)",
            (
                id.to_string(),
                &input.name,
                &input.location,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        Ok(WorkItem {
            id,
            name: input.name,
            version: 1,
            location: input.location,
            created_at: now,
            updated_at: now,
        })
    }

    /// Record a content save. The version is left alone.
    pub fn touch_work_item(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE work_items SET updated_at = ? WHERE id = ?",
            (Utc::now().to_rfc3339(), id.to_string()),
        )?;
        Ok(rows > 0)
    }

    pub fn get_work_item_history(&self, name: &str) -> Result<Option<WorkItemHistory>> {
        let Some(work_item) = self.get_work_item(name)? else {
            return Ok(None);
        };

        let snapshots = self.get_snapshots(work_item.id)?;
        let publishes = self.get_publishes(work_item.id)?;

        Ok(Some(WorkItemHistory {
            work_item,
            snapshots,
            publishes,
        }))
    }

    // ============================================================
    // Snapshot operations
    // ============================================================

    pub fn create_snapshot(
        &self,
        work_item_id: Uuid,
        source_version: u32,
        path: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Snapshot> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();

        conn.execute(
            "INSERT INTO snapshots (id, work_item_id, source_version, path, timestamp)
             VALUES (?, ?, ?, ?, ?)",
            (
                id.to_string(),
                work_item_id.to_string(),
                source_version,
                path,
                timestamp.to_rfc3339(),
            ),
        )?;

        Ok(Snapshot {
            id,
            work_item_id,
            source_version,
            path: path.to_string(),
            timestamp,
        })
    }

    pub fn get_snapshots(&self, work_item_id: Uuid) -> Result<Vec<Snapshot>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, work_item_id, source_version, path, timestamp
             FROM snapshots WHERE work_item_id = ? ORDER BY rowid",
        )?;

        let snapshots = stmt
            .query_map([work_item_id.to_string()], |row| {
                Ok(Snapshot {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    work_item_id: parse_uuid(row.get::<_, String>(1)?),
                    source_version: row.get(2)?,
                    path: row.get(3)?,
                    timestamp: parse_datetime(row.get::<_, String>(4)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(snapshots)
    }

    /// Whether a registered snapshot already occupies `path`.
    pub fn snapshot_exists_at(&self, path: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM snapshots WHERE path = ?",
            [path],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // ============================================================
    // Publish operations
    // ============================================================

    pub fn get_publishes(&self, work_item_id: Uuid) -> Result<Vec<Publish>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, work_item_id, name, version, path, entity_type, entity_code, task,
                    description, publish_type, dependency_paths, record_id, created_at
             FROM publishes WHERE work_item_id = ? ORDER BY version",
        )?;

        let publishes = stmt
            .query_map([work_item_id.to_string()], |row| {
                let deps_json: String = row.get(10)?;
                Ok(Publish {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    work_item_id: parse_uuid(row.get::<_, String>(1)?),
                    name: row.get(2)?,
                    version: row.get(3)?,
                    path: row.get(4)?,
                    entity: EntityRef::new(row.get::<_, String>(5)?, row.get::<_, String>(6)?),
                    task: row.get(7)?,
                    description: row.get(8)?,
                    publish_type: row.get(9)?,
                    dependency_paths: serde_json::from_str(&deps_json).unwrap_or_default(),
                    record_id: parse_uuid(row.get::<_, String>(11)?),
                    created_at: parse_datetime(row.get::<_, String>(12)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(publishes)
    }

    /// Store a publish and bump the work item version in one transaction.
    ///
    /// The version bump is guarded by the publish version, so a commit against
    /// a stale work item fails without touching anything.
    pub fn commit_publish(&self, commit: PublishCommit<'_>) -> Result<WorkItem> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        let publish = commit.publish;
        let now = Utc::now();

        let rows = tx.execute(
            "UPDATE work_items SET version = version + 1, location = ?, updated_at = ?
             WHERE id = ? AND version = ?",
            (
                commit.next_location,
                now.to_rfc3339(),
                publish.work_item_id.to_string(),
                publish.version,
            ),
        )?;
        if rows == 0 {
            anyhow::bail!(
                "Work item {} is no longer at version {}",
                publish.name,
                publish.version
            );
        }

        tx.execute(
            "INSERT INTO publishes (id, work_item_id, name, version, path, entity_type, entity_code,
                                    task, description, publish_type, dependency_paths, record_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                publish.id.to_string(),
                publish.work_item_id.to_string(),
                &publish.name,
                publish.version,
                &publish.path,
                &publish.entity.entity_type,
                &publish.entity.code,
                &publish.task,
                &publish.description,
                &publish.publish_type,
                serde_json::to_string(&publish.dependency_paths)?,
                publish.record_id.to_string(),
                publish.created_at.to_rfc3339(),
            ],
        )?;

        for render in commit.renders {
            tx.execute(
                "UPDATE render_outputs SET published_path = ?, record_id = ? WHERE id = ?",
                (
                    &render.published_path,
                    render.record_id.map(|u| u.to_string()),
                    render.id.to_string(),
                ),
            )?;
        }

        let item = tx.query_row(
            "SELECT id, name, version, location, created_at, updated_at
             FROM work_items WHERE id = ?",
            [publish.work_item_id.to_string()],
            work_item_from_row,
        )?;

        tx.commit()?;
        Ok(item)
    }

    // ============================================================
    // Render output operations
    // ============================================================

    pub fn create_render_output(
        &self,
        work_item_id: Uuid,
        version: u32,
        input: &RegisterRenderInput,
        channel: &str,
        path_pattern: &str,
    ) -> Result<RenderOutput> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO render_outputs (id, work_item_id, node, channel, version, path_pattern, comment, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                work_item_id.to_string(),
                &input.node,
                channel,
                version,
                path_pattern,
                &input.comment,
                now.to_rfc3339(),
            ),
        )?;

        Ok(RenderOutput {
            id,
            work_item_id,
            node: input.node.clone(),
            channel: channel.to_string(),
            version,
            path_pattern: path_pattern.to_string(),
            comment: input.comment.clone(),
            published_path: None,
            record_id: None,
            created_at: now,
        })
    }

    pub fn get_render_outputs(&self, work_item_id: Uuid) -> Result<Vec<RenderOutput>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, work_item_id, node, channel, version, path_pattern, comment,
                    published_path, record_id, created_at
             FROM render_outputs WHERE work_item_id = ? ORDER BY version, channel",
        )?;

        let renders = stmt
            .query_map([work_item_id.to_string()], render_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(renders)
    }

    /// Renders captured at one version of a work item.
    pub fn get_render_outputs_at(
        &self,
        work_item_id: Uuid,
        version: u32,
    ) -> Result<Vec<RenderOutput>> {
        Ok(self
            .get_render_outputs(work_item_id)?
            .into_iter()
            .filter(|r| r.version == version)
            .collect())
    }

    // ============================================================
    // Tracking record operations
    // ============================================================

    pub fn create_record(&self, input: NewRecord) -> Result<Record> {
        if input.entity_type.trim().is_empty() || input.code.trim().is_empty() {
            anyhow::bail!("Record entity type and code must not be empty");
        }

        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO tracking_records (id, entity_type, code, fields, created_at)
             VALUES (?, ?, ?, ?, ?)",
            (
                id.to_string(),
                &input.entity_type,
                &input.code,
                serde_json::to_string(&input.fields)?,
                now.to_rfc3339(),
            ),
        )?;

        Ok(Record {
            id,
            entity_type: input.entity_type,
            code: input.code,
            fields: input.fields,
            created_at: now,
        })
    }

    /// Most recent record of a type with the given code.
    pub fn find_record(&self, entity_type: &str, code: &str) -> Result<Option<Record>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let record = conn
            .query_row(
                "SELECT id, entity_type, code, fields, created_at
                 FROM tracking_records WHERE entity_type = ? AND code = ?
                 ORDER BY rowid DESC LIMIT 1",
                [entity_type, code],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn get_records(&self, entity_type: &str) -> Result<Vec<Record>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, entity_type, code, fields, created_at
             FROM tracking_records WHERE entity_type = ? ORDER BY code, rowid",
        )?;

        let records = stmt
            .query_map([entity_type], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    pub fn delete_record(&self, entity_type: &str, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "DELETE FROM tracking_records WHERE entity_type = ? AND id = ?",
            (entity_type, id.to_string()),
        )?;
        Ok(rows > 0)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn work_item_from_row(row: &Row<'_>) -> rusqlite::Result<WorkItem> {
    Ok(WorkItem {
        id: parse_uuid(row.get::<_, String>(0)?),
        name: row.get(1)?,
        version: row.get(2)?,
        location: row.get(3)?,
        created_at: parse_datetime(row.get::<_, String>(4)?),
        updated_at: parse_datetime(row.get::<_, String>(5)?),
    })
}

fn render_from_row(row: &Row<'_>) -> rusqlite::Result<RenderOutput> {
    Ok(RenderOutput {
        id: parse_uuid(row.get::<_, String>(0)?),
        work_item_id: parse_uuid(row.get::<_, String>(1)?),
        node: row.get(2)?,
        channel: row.get(3)?,
        version: row.get(4)?,
        path_pattern: row.get(5)?,
        comment: row.get(6)?,
        published_path: row.get(7)?,
        record_id: row.get::<_, Option<String>>(8)?.map(parse_uuid),
        created_at: parse_datetime(row.get::<_, String>(9)?),
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    let fields_json: String = row.get(3)?;
    Ok(Record {
        id: parse_uuid(row.get::<_, String>(0)?),
        entity_type: row.get(1)?,
        code: row.get(2)?,
        fields: serde_json::from_str::<Map<String, Value>>(&fields_json).unwrap_or_default(),
        created_at: parse_datetime(row.get::<_, String>(4)?),
    })
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
