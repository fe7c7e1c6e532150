use super::traits::Storage;
use crate::common::error::{Result, RevizeError};
use crate::domain::{Project, RegistryStatusRecord, Revision, User, VvDoc};
use crate::numbering::DocumentClass;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const SCHEMA: &str = r#"
PRAGMA journal_mode=WAL;
PRAGMA foreign_keys=ON;
CREATE TABLE IF NOT EXISTS users (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    name                 TEXT NOT NULL,
    email                TEXT NOT NULL UNIQUE,
    is_admin             INTEGER NOT NULL DEFAULT 0,
    certificate_number   TEXT,
    authorization_number TEXT,
    phone                TEXT,
    address              TEXT,
    rt_status            TEXT,
    rt_register_id       TEXT,
    rt_scope             TEXT,
    rt_valid_until       TEXT,
    rt_source_snapshot   TEXT,
    rt_last_checked_at   TEXT
);
CREATE TABLE IF NOT EXISTS projects (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    address   TEXT NOT NULL,
    client    TEXT NOT NULL,
    owner_id  INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS project_shares (
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    user_id    INTEGER NOT NULL,
    PRIMARY KEY (project_id, user_id)
);
CREATE TABLE IF NOT EXISTS revisions (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id     INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    number         TEXT NOT NULL UNIQUE,
    revision_type  TEXT NOT NULL,
    date_done      TEXT NOT NULL,
    valid_until    TEXT,
    status         TEXT NOT NULL,
    data_json      TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS vv_docs (
    id          TEXT PRIMARY KEY,
    number      TEXT NOT NULL UNIQUE,
    project_id  INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    data_json   TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_revisions_project ON revisions(project_id);
CREATE INDEX IF NOT EXISTS idx_vv_docs_project ON vv_docs(project_id);
"#;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite-backed storage. One connection, serialized behind a mutex.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        info!("Opened database at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RevizeError::Storage("database connection lock poisoned".to_string()))
    }
}

/// Message of a violated UNIQUE/PRIMARY KEY constraint, if that is what `err` is.
fn constraint_violation(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
            Some(msg.as_deref().unwrap_or(""))
        }
        _ => None,
    }
}

fn violates(err: &rusqlite::Error, column: &str) -> bool {
    constraint_violation(err).map_or(false, |msg| msg.contains(column))
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| RevizeError::Storage(format!("invalid stored date '{}': {}", value, e)))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RevizeError::Storage(format!("invalid stored timestamp '{}': {}", value, e)))
}

fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

const USER_COLUMNS: &str = "id, name, email, is_admin, certificate_number, authorization_number, \
     phone, address, rt_status, rt_register_id, rt_scope, rt_valid_until, rt_source_snapshot, \
     rt_last_checked_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let rt_status: Option<String> = row.get(8)?;
    let registry = match rt_status {
        Some(rt_status) => Some(RegistryStatusRecord {
            rt_status,
            rt_register_id: row.get(9)?,
            rt_scope: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
            rt_valid_until: row.get(11)?,
            rt_source_snapshot: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
            rt_last_checked_at: row.get::<_, Option<String>>(13)?.unwrap_or_default(),
        }),
        None => None,
    };
    Ok(User {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        is_admin: row.get(3)?,
        certificate_number: row.get(4)?,
        authorization_number: row.get(5)?,
        phone: row.get(6)?,
        address: row.get(7)?,
        registry,
    })
}

struct RevisionRow {
    id: i64,
    project_id: i64,
    number: String,
    revision_type: String,
    date_done: String,
    valid_until: Option<String>,
    status: String,
    data_json: String,
}

const REVISION_COLUMNS: &str =
    "id, project_id, number, revision_type, date_done, valid_until, status, data_json";

impl RevisionRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            number: row.get(2)?,
            revision_type: row.get(3)?,
            date_done: row.get(4)?,
            valid_until: row.get(5)?,
            status: row.get(6)?,
            data_json: row.get(7)?,
        })
    }

    fn into_revision(self) -> Result<Revision> {
        Ok(Revision {
            id: Some(self.id),
            project_id: self.project_id,
            number: self.number,
            revision_type: self.revision_type,
            date_done: parse_date(&self.date_done)?,
            valid_until: self.valid_until.as_deref().map(parse_date).transpose()?,
            status: self.status,
            data_json: serde_json::from_str(&self.data_json)?,
        })
    }
}

struct VvDocRow {
    id: String,
    number: String,
    project_id: i64,
    data_json: String,
    created_at: String,
    updated_at: String,
}

const VV_COLUMNS: &str = "id, number, project_id, data_json, created_at, updated_at";

impl VvDocRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            number: row.get(1)?,
            project_id: row.get(2)?,
            data_json: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn into_doc(self) -> Result<VvDoc> {
        Ok(VvDoc {
            id: self.id,
            number: self.number,
            project_id: self.project_id,
            data_json: serde_json::from_str(&self.data_json)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn project_shares(conn: &Connection, project_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn
        .prepare("SELECT user_id FROM project_shares WHERE project_id = ?1 ORDER BY user_id")?;
    let ids = stmt
        .query_map(params![project_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_user(&self, user: &mut User) -> Result<()> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO users (name, email, is_admin, certificate_number, authorization_number, phone, address)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.name,
                user.email,
                user.is_admin,
                user.certificate_number,
                user.authorization_number,
                user.phone,
                user.address
            ],
        );
        if let Err(e) = inserted {
            if constraint_violation(&e).is_some() {
                return Err(RevizeError::Conflict(format!(
                    "user with email {} already exists",
                    user.email
                )));
            }
            return Err(e.into());
        }
        let id = conn.last_insert_rowid();
        user.id = Some(id);
        if let Some(record) = &user.registry {
            write_registry_status(&conn, id, record)?;
        }

        debug!("Created user: {} with id {}", user.email, id);
        Ok(())
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                params![email],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn update_user_registry_status(
        &self,
        user_id: i64,
        record: &RegistryStatusRecord,
    ) -> Result<()> {
        let conn = self.conn()?;
        write_registry_status(&conn, user_id, record)?;
        debug!("Updated registry status of user {} to {}", user_id, record.rt_status);
        Ok(())
    }

    async fn create_project(&self, project: &mut Project) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO projects (address, client, owner_id) VALUES (?1, ?2, ?3)",
            params![project.address, project.client, project.owner_id],
        )?;
        let id = tx.last_insert_rowid();
        for user_id in &project.shared_with_user_ids {
            tx.execute(
                "INSERT OR IGNORE INTO project_shares (project_id, user_id) VALUES (?1, ?2)",
                params![id, user_id],
            )?;
        }
        tx.commit()?;
        project.id = Some(id);

        debug!("Created project: {} with id {}", project.address, id);
        Ok(())
    }

    async fn get_project(&self, id: i64) -> Result<Option<Project>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, address, client, owner_id FROM projects WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Project {
                        id: Some(row.get(0)?),
                        address: row.get(1)?,
                        client: row.get(2)?,
                        owner_id: row.get(3)?,
                        shared_with_user_ids: Vec::new(),
                    })
                },
            )
            .optional()?;
        match row {
            Some(mut project) => {
                project.shared_with_user_ids = project_shares(&conn, id)?;
                Ok(Some(project))
            }
            None => Ok(None),
        }
    }

    async fn list_projects_for_user(&self, user_id: i64) -> Result<Vec<Project>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, address, client, owner_id FROM projects
             WHERE owner_id = ?1
                OR id IN (SELECT project_id FROM project_shares WHERE user_id = ?1)
             ORDER BY id",
        )?;
        let mut projects = stmt
            .query_map(params![user_id], |row| {
                Ok(Project {
                    id: Some(row.get(0)?),
                    address: row.get(1)?,
                    client: row.get(2)?,
                    owner_id: row.get(3)?,
                    shared_with_user_ids: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<Project>>>()?;
        for project in &mut projects {
            if let Some(id) = project.id {
                project.shared_with_user_ids = project_shares(&conn, id)?;
            }
        }
        Ok(projects)
    }

    async fn insert_revision(&self, revision: &mut Revision) -> Result<()> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO revisions (project_id, number, revision_type, date_done, valid_until, status, data_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                revision.project_id,
                revision.number,
                revision.revision_type,
                revision.date_done.format(DATE_FORMAT).to_string(),
                revision
                    .valid_until
                    .map(|d| d.format(DATE_FORMAT).to_string()),
                revision.status,
                serde_json::to_string(&revision.data_json)?
            ],
        );
        if let Err(e) = inserted {
            if violates(&e, "revisions.number") {
                return Err(RevizeError::SequenceConflict {
                    number: revision.number.clone(),
                });
            }
            return Err(e.into());
        }
        let id = conn.last_insert_rowid();
        revision.id = Some(id);

        debug!("Created revision: {} with id {}", revision.number, id);
        Ok(())
    }

    async fn get_revision(&self, id: i64) -> Result<Option<Revision>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM revisions WHERE id = ?1", REVISION_COLUMNS),
                params![id],
                RevisionRow::read,
            )
            .optional()?;
        row.map(RevisionRow::into_revision).transpose()
    }

    async fn list_revisions(&self, project_id: i64) -> Result<Vec<Revision>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM revisions WHERE project_id = ?1 ORDER BY id",
            REVISION_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![project_id], RevisionRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RevisionRow::into_revision).collect()
    }

    async fn insert_vv_doc(&self, doc: &VvDoc) -> Result<()> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO vv_docs (id, number, project_id, data_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                doc.id,
                doc.number,
                doc.project_id,
                serde_json::to_string(&doc.data_json)?,
                format_timestamp(&doc.created_at),
                format_timestamp(&doc.updated_at)
            ],
        );
        if let Err(e) = inserted {
            if violates(&e, "vv_docs.number") {
                return Err(RevizeError::SequenceConflict {
                    number: doc.number.clone(),
                });
            }
            if violates(&e, "vv_docs.id") {
                return Err(RevizeError::Conflict(format!(
                    "VV document {} already exists",
                    doc.id
                )));
            }
            return Err(e.into());
        }

        debug!("Created VV document: {} with id {}", doc.number, doc.id);
        Ok(())
    }

    async fn get_vv_doc(&self, id: &str) -> Result<Option<VvDoc>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM vv_docs WHERE id = ?1", VV_COLUMNS),
                params![id],
                VvDocRow::read,
            )
            .optional()?;
        row.map(VvDocRow::into_doc).transpose()
    }

    async fn update_vv_doc(&self, doc: &VvDoc) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE vv_docs SET data_json = ?2, updated_at = ?3 WHERE id = ?1",
            params![
                doc.id,
                serde_json::to_string(&doc.data_json)?,
                format_timestamp(&doc.updated_at)
            ],
        )?;
        if changed == 0 {
            return Err(RevizeError::NotFound(format!("VV document {}", doc.id)));
        }
        debug!("Updated VV document {}", doc.id);
        Ok(())
    }

    async fn list_vv_docs(&self, project_id: i64) -> Result<Vec<VvDoc>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM vv_docs WHERE project_id = ?1 ORDER BY created_at DESC, number DESC",
            VV_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![project_id], VvDocRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(VvDocRow::into_doc).collect()
    }

    async fn delete_vv_doc(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM vv_docs WHERE id = ?1", params![id])? > 0;
        if removed {
            debug!("Deleted VV document {}", id);
        }
        Ok(removed)
    }

    async fn evidence_numbers(
        &self,
        class: DocumentClass,
        project_id: i64,
        prefix: &str,
        suffix: Option<&str>,
    ) -> Result<Vec<String>> {
        let table = match class {
            DocumentClass::Revision => "revisions",
            DocumentClass::VerificationProtocol => "vv_docs",
        };
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT number FROM {} WHERE project_id = ?1 AND substr(number, 1, length(?2)) = ?2",
            table
        ))?;
        let numbers = stmt
            .query_map(params![project_id, prefix], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(numbers
            .into_iter()
            .filter(|n| suffix.map_or(true, |s| n.ends_with(s)))
            .collect())
    }
}

fn write_registry_status(conn: &Connection, user_id: i64, record: &RegistryStatusRecord) -> Result<()> {
    let changed = conn.execute(
        "UPDATE users SET rt_status = ?2, rt_register_id = ?3, rt_scope = ?4, rt_valid_until = ?5,
             rt_source_snapshot = ?6, rt_last_checked_at = ?7
         WHERE id = ?1",
        params![
            user_id,
            record.rt_status,
            record.rt_register_id,
            record.rt_scope,
            record.rt_valid_until,
            record.rt_source_snapshot,
            record.rt_last_checked_at
        ],
    )?;
    if changed == 0 {
        return Err(RevizeError::NotFound(format!("User {}", user_id)));
    }
    Ok(())
}
