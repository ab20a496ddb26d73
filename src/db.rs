use anyhow::{bail, Context};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Transaction};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;

pub const DB_FILE: &str = "enrolld.sqlite3";

/// Largest number of write ops committed in one transaction. Writes that
/// exceed this are split into sequential transactions, so cross-batch
/// atomicity is not guaranteed; callers get one outcome per batch.
pub const MAX_BATCH_OPS: usize = 500;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents(
            path TEXT PRIMARY KEY,
            parent TEXT NOT NULL,
            group_name TEXT NOT NULL,
            doc_id TEXT NOT NULL,
            data TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_parent ON documents(parent)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_group ON documents(group_name)",
        [],
    )?;

    // Existing workspaces may predate the updated_at column. Add if needed.
    ensure_documents_updated_at(&conn)?;

    Ok(conn)
}

fn ensure_documents_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "documents", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE documents ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[derive(Debug, Clone)]
pub struct Doc {
    pub id: String,
    pub path: String,
    pub data: Value,
}

/// Splits a document path into (parent collection, collection group name,
/// document id). Document paths always have an even segment count:
/// `collection/id[/subcollection/id]...`.
fn split_doc_path(path: &str) -> anyhow::Result<(String, String, String)> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 2 || segments.len() % 2 != 0 {
        bail!("not a document path: {}", path);
    }
    let doc_id = segments[segments.len() - 1].to_string();
    let group_name = segments[segments.len() - 2].to_string();
    let parent = segments[..segments.len() - 1].join("/");
    Ok((parent, group_name, doc_id))
}

pub fn get_doc(conn: &Connection, path: &str) -> anyhow::Result<Option<Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT data FROM documents WHERE path = ?", [path], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(text) => {
            let value = serde_json::from_str(&text)
                .with_context(|| format!("corrupt document at {}", path))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

pub fn list_collection(conn: &Connection, parent: &str) -> anyhow::Result<Vec<Doc>> {
    let mut stmt = conn
        .prepare("SELECT doc_id, path, data FROM documents WHERE parent = ? ORDER BY doc_id")?;
    let rows = stmt.query_map([parent], |row| {
        let id: String = row.get(0)?;
        let path: String = row.get(1)?;
        let data: String = row.get(2)?;
        Ok((id, path, data))
    })?;
    let mut docs = Vec::new();
    for row in rows {
        let (id, path, data) = row?;
        let data = serde_json::from_str(&data)
            .with_context(|| format!("corrupt document at {}", path))?;
        docs.push(Doc { id, path, data });
    }
    Ok(docs)
}

/// All documents whose immediate collection is named `group`, regardless of
/// where that collection lives. This is the expensive cross-collection scan
/// used by last-resort course lookup and by assignment listing.
pub fn collection_group(conn: &Connection, group: &str) -> anyhow::Result<Vec<Doc>> {
    let mut stmt = conn
        .prepare("SELECT doc_id, path, data FROM documents WHERE group_name = ? ORDER BY path")?;
    let rows = stmt.query_map([group], |row| {
        let id: String = row.get(0)?;
        let path: String = row.get(1)?;
        let data: String = row.get(2)?;
        Ok((id, path, data))
    })?;
    let mut docs = Vec::new();
    for row in rows {
        let (id, path, data) = row?;
        let data = serde_json::from_str(&data)
            .with_context(|| format!("corrupt document at {}", path))?;
        docs.push(Doc { id, path, data });
    }
    Ok(docs)
}

#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Replace the document wholesale (upsert).
    Set { path: String, data: Value },
    /// Deep-merge objects into the document; arrays and scalars replace
    /// (upsert).
    SetMerge { path: String, data: Value },
    /// Append values not already present to an array field (upsert; a
    /// non-array value at the field is replaced).
    ArrayUnion {
        path: String,
        field: String,
        values: Vec<Value>,
    },
    /// Remove values from an array field. Fails when the document does not
    /// exist; a missing field is a no-op.
    ArrayRemove {
        path: String,
        field: String,
        values: Vec<Value>,
    },
    /// Remove a (possibly dotted) field, e.g. `teaching.III_B`. Fails when
    /// the document does not exist; a missing field is a no-op.
    DeleteField { path: String, field: String },
    /// Delete the document; absent documents are a no-op.
    DeleteDoc { path: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub index: usize,
    pub ops: usize,
    pub committed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Commits `ops` in chunks of at most MAX_BATCH_OPS, each chunk in its own
/// transaction. Stops at the first failed chunk; previously committed chunks
/// are NOT rolled back. The outcome list tells the caller exactly which
/// chunks made it.
pub fn commit(conn: &mut Connection, ops: &[WriteOp]) -> Vec<BatchOutcome> {
    let mut outcomes = Vec::new();
    for (index, chunk) in ops.chunks(MAX_BATCH_OPS).enumerate() {
        let result = commit_chunk(conn, chunk);
        match result {
            Ok(()) => outcomes.push(BatchOutcome {
                index,
                ops: chunk.len(),
                committed: true,
                error: None,
            }),
            Err(e) => {
                outcomes.push(BatchOutcome {
                    index,
                    ops: chunk.len(),
                    committed: false,
                    error: Some(e.to_string()),
                });
                break;
            }
        }
    }
    outcomes
}

fn commit_chunk(conn: &mut Connection, chunk: &[WriteOp]) -> anyhow::Result<()> {
    let tx = conn.transaction()?;
    for op in chunk {
        apply_op(&tx, op)?;
    }
    tx.commit()?;
    Ok(())
}

fn apply_op(tx: &Transaction, op: &WriteOp) -> anyhow::Result<()> {
    match op {
        WriteOp::Set { path, data } => {
            if !data.is_object() {
                bail!("document data must be a JSON object: {}", path);
            }
            upsert(tx, path, data)
        }
        WriteOp::SetMerge { path, data } => {
            if !data.is_object() {
                bail!("document data must be a JSON object: {}", path);
            }
            let mut doc = read_in_tx(tx, path)?.unwrap_or_else(|| json!({}));
            deep_merge(&mut doc, data);
            upsert(tx, path, &doc)
        }
        WriteOp::ArrayUnion {
            path,
            field,
            values,
        } => {
            let mut doc = read_in_tx(tx, path)?.unwrap_or_else(|| json!({}));
            let mut arr = match get_field(&doc, field) {
                Some(Value::Array(existing)) => existing.clone(),
                _ => Vec::new(),
            };
            for v in values {
                if !arr.contains(v) {
                    arr.push(v.clone());
                }
            }
            set_field(&mut doc, field, Value::Array(arr));
            upsert(tx, path, &doc)
        }
        WriteOp::ArrayRemove {
            path,
            field,
            values,
        } => {
            let Some(mut doc) = read_in_tx(tx, path)? else {
                bail!("document not found: {}", path);
            };
            if let Some(Value::Array(existing)) = get_field(&doc, field) {
                let remaining: Vec<Value> = existing
                    .iter()
                    .filter(|v| !values.contains(v))
                    .cloned()
                    .collect();
                set_field(&mut doc, field, Value::Array(remaining));
                upsert(tx, path, &doc)?;
            }
            Ok(())
        }
        WriteOp::DeleteField { path, field } => {
            let Some(mut doc) = read_in_tx(tx, path)? else {
                bail!("document not found: {}", path);
            };
            if remove_field(&mut doc, field) {
                upsert(tx, path, &doc)?;
            }
            Ok(())
        }
        WriteOp::DeleteDoc { path } => {
            tx.execute("DELETE FROM documents WHERE path = ?", [path.as_str()])?;
            Ok(())
        }
    }
}

fn read_in_tx(tx: &Transaction, path: &str) -> anyhow::Result<Option<Value>> {
    let raw: Option<String> = tx
        .query_row("SELECT data FROM documents WHERE path = ?", [path], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(text) => {
            let value = serde_json::from_str(&text)
                .with_context(|| format!("corrupt document at {}", path))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn upsert(tx: &Transaction, path: &str, data: &Value) -> anyhow::Result<()> {
    let (parent, group_name, doc_id) = split_doc_path(path)?;
    let text = serde_json::to_string(data)?;
    let now = Utc::now().to_rfc3339();
    tx.execute(
        "INSERT INTO documents(path, parent, group_name, doc_id, data, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(path) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
        (path, &parent, &group_name, &doc_id, &text, &now),
    )?;
    Ok(())
}

/// Objects merge key-by-key, recursively; anything else replaces.
fn deep_merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (k, v) in patch_map {
                match base_map.get_mut(k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        base_map.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

fn get_field<'a>(doc: &'a Value, field: &str) -> Option<&'a Value> {
    let mut cur = doc;
    for part in field.split('.') {
        cur = cur.get(part)?;
    }
    Some(cur)
}

fn set_field(doc: &mut Value, field: &str, value: Value) {
    let parts: Vec<&str> = field.split('.').collect();
    let mut cur = doc;
    for part in &parts[..parts.len() - 1] {
        if !cur.get(*part).map(Value::is_object).unwrap_or(false) {
            if let Value::Object(map) = cur {
                map.insert(part.to_string(), json!({}));
            }
        }
        match cur.get_mut(*part) {
            Some(next) => cur = next,
            None => return,
        }
    }
    if let Value::Object(map) = cur {
        map.insert(parts[parts.len() - 1].to_string(), value);
    }
}

fn remove_field(doc: &mut Value, field: &str) -> bool {
    let parts: Vec<&str> = field.split('.').collect();
    let mut cur = doc;
    for part in &parts[..parts.len() - 1] {
        match cur.get_mut(*part) {
            Some(next) => cur = next,
            None => return false,
        }
    }
    match cur {
        Value::Object(map) => map.remove(parts[parts.len() - 1]).is_some(),
        _ => false,
    }
}
