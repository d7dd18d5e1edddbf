//! SQLite-backed row store for the routing audit trail.
//!
//! Every write goes through one connection guarded by a mutex, and the
//! multi-row writes (routing commitment, run append) run inside a
//! transaction so readers never observe a decision without its task or a
//! run without its decision.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::{debug, info};

use crate::schema::{INGEST_SCHEMA_SQL, ROUTING_SCHEMA_SQL};
use crate::types::*;
use taskroute_core::{
    now_millis, ArtifactStatus, Error, Result, TaskOrigin, TaskStatus, TranscriptStatus,
};

/// SQLite store for artifacts, transcripts, tasks, decisions and model runs.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create the SQLite store.
    ///
    /// `db_dir` is the directory (e.g., `data/db/`). The file will be `db_dir/taskroute.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("taskroute.db");

        let conn = Self::create_connection(&db_path)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        let stats = store.stats()?;
        info!(
            "SqliteStore initialized: {} tasks, {} decisions, {} runs, path={}",
            stats.tasks,
            stats.routing_decisions,
            stats.model_runs,
            store.db_path.display()
        );

        Ok(store)
    }

    /// Store backed by a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_err)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(db_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(db_err)?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        let full_schema = format!("{}\n{}", INGEST_SCHEMA_SQL, ROUTING_SCHEMA_SQL);
        conn.execute_batch(&full_schema)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // ---------------------------------------------------------------
    // Artifacts
    // ---------------------------------------------------------------

    /// Insert an artifact in `uploaded` status.
    pub fn insert_artifact(
        &self,
        original_name: &str,
        media_type: &str,
        storage_locator: &str,
        size_bytes: i64,
    ) -> Result<Artifact> {
        let id = new_id();
        let now = now_millis();
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO artifacts (id, original_name, media_type, storage_locator, size_bytes, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .map_err(db_err)?
        .execute(params![
            id,
            original_name,
            media_type,
            storage_locator,
            size_bytes,
            ArtifactStatus::Uploaded.as_str(),
            now
        ])
        .map_err(db_err)?;
        debug!("Inserted artifact {} ({})", id, original_name);
        query_artifact(&conn, &id)?.ok_or_else(|| Error::Internal(format!("artifact {} vanished", id)))
    }

    pub fn get_artifact(&self, id: &str) -> Result<Option<Artifact>> {
        let conn = self.conn.lock();
        query_artifact(&conn, id)
    }

    /// Set artifact status and error message. Returns false if the row is missing.
    pub fn set_artifact_status(
        &self,
        id: &str,
        status: ArtifactStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "UPDATE artifacts SET status = ?1, error_message = ?2, updated_at = ?3 WHERE id = ?4",
                params![status.as_str(), error_message, now_millis(), id],
            )
            .map_err(db_err)?;
        Ok(count > 0)
    }

    /// Move an artifact into `processing` unless it has already been
    /// finalised. Returns whether the row changed.
    pub fn mark_artifact_processing(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "UPDATE artifacts SET status = ?1, updated_at = ?2
                 WHERE id = ?3 AND status IN ('uploaded', 'processing')",
                params![ArtifactStatus::Processing.as_str(), now_millis(), id],
            )
            .map_err(db_err)?;
        Ok(count > 0)
    }

    // ---------------------------------------------------------------
    // Transcripts
    // ---------------------------------------------------------------

    /// Insert an empty transcript in `processing` status for an artifact.
    pub fn insert_transcript(&self, artifact_id: &str) -> Result<Transcript> {
        let id = new_id();
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO transcripts (id, artifact_id, status, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(db_err)?
        .execute(params![
            id,
            artifact_id,
            TranscriptStatus::Processing.as_str(),
            now_millis()
        ])
        .map_err(|e| {
            if e.to_string().contains("FOREIGN KEY") {
                Error::NotFound(format!("artifact {}", artifact_id))
            } else {
                db_err(e)
            }
        })?;
        query_transcript(&conn, &id)?
            .ok_or_else(|| Error::Internal(format!("transcript {} vanished", id)))
    }

    pub fn get_transcript(&self, id: &str) -> Result<Option<Transcript>> {
        let conn = self.conn.lock();
        query_transcript(&conn, id)
    }

    /// Fill a transcript. Only a `processing` transcript is written, so the
    /// fill happens at most once; returns whether this call performed it.
    pub fn complete_transcript(&self, id: &str, update: &TranscriptUpdate) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "UPDATE transcripts
                 SET text = ?1, language = ?2, duration_ms = ?3, is_placeholder = ?4,
                     status = 'ready', completed_at = ?5
                 WHERE id = ?6 AND status = 'processing'",
                params![
                    update.text,
                    update.language,
                    update.duration_ms,
                    update.is_placeholder,
                    now_millis(),
                    id
                ],
            )
            .map_err(db_err)?;
        Ok(count > 0)
    }

    /// Mark a `processing` transcript as failed.
    pub fn fail_transcript(&self, id: &str, error_message: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "UPDATE transcripts SET status = 'failed', error_message = ?1, completed_at = ?2
                 WHERE id = ?3 AND status = 'processing'",
                params![error_message, now_millis(), id],
            )
            .map_err(db_err)?;
        Ok(count > 0)
    }

    // ---------------------------------------------------------------
    // Tasks
    // ---------------------------------------------------------------

    /// Insert a task in `pending` status.
    pub fn insert_task(&self, row: &NewTaskRow) -> Result<Task> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let task = insert_task_tx(&tx, row)?;
        tx.commit().map_err(db_err)?;
        Ok(task)
    }

    /// Insert the resume task for a piece of content, or return the one that
    /// already exists. The boolean is true when this call created it.
    pub fn insert_resume_task(&self, row: &NewTaskRow) -> Result<(Task, bool)> {
        let content_id = row
            .content_id
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("resume task requires a content reference".into()))?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        if let Some(existing) = query_resume_task(&tx, content_id)? {
            return Ok((existing, false));
        }
        let task = insert_task_tx(
            &tx,
            &NewTaskRow {
                origin: TaskOrigin::Resume,
                ..row.clone()
            },
        )?;
        tx.commit().map_err(db_err)?;
        Ok((task, true))
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let conn = self.conn.lock();
        query_task(&conn, id)
    }

    pub fn find_resume_task(&self, content_id: &str) -> Result<Option<Task>> {
        let conn = self.conn.lock();
        query_resume_task(&conn, content_id)
    }

    /// Move a task to `next`, enforcing forward-only transitions against the
    /// status currently stored. `error_message` replaces the stored one.
    pub fn transition_task(
        &self,
        id: &str,
        next: TaskStatus,
        error_message: Option<&str>,
    ) -> Result<Task> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let current = query_task(&tx, id)?.ok_or_else(|| Error::NotFound(format!("task {}", id)))?;
        if !current.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: current.status.to_string(),
                to: next.to_string(),
            });
        }
        tx.execute(
            "UPDATE tasks SET status = ?1, error_message = ?2, updated_at = ?3 WHERE id = ?4",
            params![next.as_str(), error_message, now_millis(), id],
        )
        .map_err(db_err)?;
        let task = query_task(&tx, id)?.ok_or_else(|| Error::NotFound(format!("task {}", id)))?;
        tx.commit().map_err(db_err)?;
        debug!("Task {}: {} -> {}", id, current.status, next);
        Ok(task)
    }

    // ---------------------------------------------------------------
    // Routing decisions
    // ---------------------------------------------------------------

    /// Persist the routing decision and advance the task `pending → routed`
    /// in one transaction. A second decision for the same task is rejected
    /// with `AlreadyRouted`, whether it is caught by the pre-check or by the
    /// unique constraint.
    pub fn record_routing(&self, task_id: &str, decision: &NewDecision) -> Result<(Task, RoutingDecision)> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;

        let task = query_task(&tx, task_id)?
            .ok_or_else(|| Error::NotFound(format!("task {}", task_id)))?;
        if query_decision(&tx, task_id)?.is_some() {
            return Err(Error::AlreadyRouted {
                task_id: task_id.to_string(),
            });
        }
        if !task.status.can_transition_to(TaskStatus::Routed) {
            return Err(Error::InvalidTransition {
                from: task.status.to_string(),
                to: TaskStatus::Routed.to_string(),
            });
        }

        let id = new_id();
        let now = now_millis();
        tx.execute(
            "INSERT INTO routing_decisions
                (id, task_id, chosen_backend, preferred_backend, justification,
                 estimated_cost, estimated_latency_ms, over_budget, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                task_id,
                decision.chosen_backend,
                decision.preferred_backend,
                decision.justification,
                decision.estimated_cost,
                decision.estimated_latency_ms,
                decision.over_budget,
                now
            ],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                Error::AlreadyRouted {
                    task_id: task_id.to_string(),
                }
            } else {
                db_err(e)
            }
        })?;
        tx.execute(
            "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![TaskStatus::Routed.as_str(), now, task_id],
        )
        .map_err(db_err)?;

        let task = query_task(&tx, task_id)?
            .ok_or_else(|| Error::NotFound(format!("task {}", task_id)))?;
        let stored = query_decision(&tx, task_id)?
            .ok_or_else(|| Error::Internal(format!("decision for {} vanished", task_id)))?;
        tx.commit().map_err(db_err)?;
        Ok((task, stored))
    }

    pub fn get_decision_for_task(&self, task_id: &str) -> Result<Option<RoutingDecision>> {
        let conn = self.conn.lock();
        query_decision(&conn, task_id)
    }

    /// Decisions joined with their tasks, newest first.
    pub fn list_decisions_with_tasks(&self, limit: usize) -> Result<Vec<DecisionWithTask>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT d.id AS d_id, d.task_id, d.chosen_backend, d.preferred_backend, d.justification,
                        d.estimated_cost, d.estimated_latency_ms, d.over_budget, d.created_at AS d_created_at,
                        t.id, t.kind, t.sla_tier, t.budget_ceiling, t.input_text, t.content_id, t.origin,
                        t.status, t.error_message, t.created_at, t.updated_at
                 FROM routing_decisions d
                 JOIN tasks t ON t.id = d.task_id
                 ORDER BY d.created_at DESC, d.rowid DESC
                 LIMIT ?1",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(DecisionWithTask {
                    decision: RoutingDecision {
                        id: row.get("d_id")?,
                        task_id: row.get("task_id")?,
                        chosen_backend: row.get("chosen_backend")?,
                        preferred_backend: row.get("preferred_backend")?,
                        justification: row.get("justification")?,
                        estimated_cost: row.get("estimated_cost")?,
                        estimated_latency_ms: row.get("estimated_latency_ms")?,
                        over_budget: row.get("over_budget")?,
                        created_at: row.get("d_created_at")?,
                    },
                    task: row_to_task(row)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    // ---------------------------------------------------------------
    // Model runs
    // ---------------------------------------------------------------

    /// Append a model run for a routed task. The run is linked to the task's
    /// decision and numbered after the previous attempts; a task without a
    /// decision cannot receive runs.
    pub fn append_model_run(&self, task_id: &str, run: &NewModelRun) -> Result<ModelRun> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;

        let decision = query_decision(&tx, task_id)?
            .ok_or_else(|| Error::NotFound(format!("routing decision for task {}", task_id)))?;
        let attempt: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(attempt), 0) + 1 FROM model_runs WHERE task_id = ?1",
                params![task_id],
                |row| row.get(0),
            )
            .map_err(db_err)?;

        let id = new_id();
        tx.execute(
            "INSERT INTO model_runs
                (id, task_id, decision_id, attempt, backend, input_tokens, output_tokens,
                 latency_ms, cost, success, failure_reason, output_text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                id,
                task_id,
                decision.id,
                attempt,
                run.backend,
                run.input_tokens,
                run.output_tokens,
                run.latency_ms,
                run.cost,
                run.success,
                run.failure_reason,
                run.output_text,
                now_millis()
            ],
        )
        .map_err(db_err)?;
        let stored = tx
            .query_row("SELECT * FROM model_runs WHERE id = ?1", params![id], row_to_run)
            .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(stored)
    }

    pub fn list_runs_for_task(&self, task_id: &str) -> Result<Vec<ModelRun>> {
        let conn = self.conn.lock();
        query_runs(&conn, task_id)
    }

    // ---------------------------------------------------------------
    // Aggregates
    // ---------------------------------------------------------------

    /// Task, decision and runs read inside one transaction.
    pub fn audit_trail(&self, task_id: &str) -> Result<AuditTrail> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let task = query_task(&tx, task_id)?
            .ok_or_else(|| Error::NotFound(format!("task {}", task_id)))?;
        let decision = query_decision(&tx, task_id)?;
        let runs = query_runs(&tx, task_id)?;
        tx.commit().map_err(db_err)?;
        Ok(AuditTrail { task, decision, runs })
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock();
        let count = |sql: &str| -> Result<i64> { conn.query_row(sql, [], |row| row.get(0)).map_err(db_err) };

        let mut stats = StoreStats {
            artifacts: count("SELECT COUNT(*) FROM artifacts")?,
            transcripts: count("SELECT COUNT(*) FROM transcripts")?,
            tasks: count("SELECT COUNT(*) FROM tasks")?,
            routing_decisions: count("SELECT COUNT(*) FROM routing_decisions")?,
            model_runs: count("SELECT COUNT(*) FROM model_runs")?,
            failed_runs: count("SELECT COUNT(*) FROM model_runs WHERE success = 0")?,
            total_cost: count("SELECT COALESCE(SUM(cost), 0) FROM model_runs")?,
            db_path: self.db_path.to_string_lossy().to_string(),
            ..Default::default()
        };

        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM tasks GROUP BY status")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(db_err)?;
        for row in rows {
            let (status, n) = row.map_err(db_err)?;
            stats.tasks_by_status.insert(status, n);
        }
        Ok(stats)
    }
}

// ---------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

/// Parse a TEXT column into one of the core enums.
fn parse_col<T>(row: &Row<'_>, col: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = Error>,
{
    let raw: String = row.get(col)?;
    raw.parse().map_err(|e: Error| {
        let idx = row.as_ref().column_index(col).unwrap_or(0);
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

fn insert_task_tx(tx: &Transaction<'_>, row: &NewTaskRow) -> Result<Task> {
    let id = new_id();
    tx.execute(
        "INSERT INTO tasks
            (id, kind, sla_tier, budget_ceiling, input_text, content_id, origin, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id,
            row.kind.as_str(),
            row.sla_tier.as_str(),
            row.budget_ceiling,
            row.input_text,
            row.content_id,
            row.origin.as_str(),
            TaskStatus::Pending.as_str(),
            now_millis()
        ],
    )
    .map_err(|e| {
        let msg = e.to_string();
        if msg.contains("FOREIGN KEY") {
            Error::NotFound(format!(
                "content {}",
                row.content_id.as_deref().unwrap_or_default()
            ))
        } else if msg.contains("CHECK constraint") {
            Error::InvalidInput(msg)
        } else {
            db_err(e)
        }
    })?;
    query_task(tx, &id)?.ok_or_else(|| Error::Internal(format!("task {} vanished", id)))
}

fn query_artifact(conn: &Connection, id: &str) -> Result<Option<Artifact>> {
    conn.prepare_cached("SELECT * FROM artifacts WHERE id = ?1")
        .map_err(db_err)?
        .query_row(params![id], |row| {
            Ok(Artifact {
                id: row.get("id")?,
                original_name: row.get("original_name")?,
                media_type: row.get("media_type")?,
                storage_locator: row.get("storage_locator")?,
                size_bytes: row.get("size_bytes")?,
                status: parse_col(row, "status")?,
                error_message: row.get("error_message")?,
                created_at: row.get("created_at")?,
                updated_at: row.get("updated_at")?,
            })
        })
        .optional()
        .map_err(db_err)
}

fn query_transcript(conn: &Connection, id: &str) -> Result<Option<Transcript>> {
    conn.prepare_cached("SELECT * FROM transcripts WHERE id = ?1")
        .map_err(db_err)?
        .query_row(params![id], |row| {
            Ok(Transcript {
                id: row.get("id")?,
                artifact_id: row.get("artifact_id")?,
                text: row.get("text")?,
                language: row.get("language")?,
                duration_ms: row.get("duration_ms")?,
                is_placeholder: row.get("is_placeholder")?,
                status: parse_col(row, "status")?,
                error_message: row.get("error_message")?,
                created_at: row.get("created_at")?,
                completed_at: row.get("completed_at")?,
            })
        })
        .optional()
        .map_err(db_err)
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        kind: parse_col(row, "kind")?,
        sla_tier: parse_col(row, "sla_tier")?,
        budget_ceiling: row.get("budget_ceiling")?,
        input_text: row.get("input_text")?,
        content_id: row.get("content_id")?,
        origin: parse_col(row, "origin")?,
        status: parse_col(row, "status")?,
        error_message: row.get("error_message")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn query_task(conn: &Connection, id: &str) -> Result<Option<Task>> {
    conn.prepare_cached("SELECT * FROM tasks WHERE id = ?1")
        .map_err(db_err)?
        .query_row(params![id], row_to_task)
        .optional()
        .map_err(db_err)
}

fn query_resume_task(conn: &Connection, content_id: &str) -> Result<Option<Task>> {
    conn.prepare_cached("SELECT * FROM tasks WHERE content_id = ?1 AND origin = 'resume'")
        .map_err(db_err)?
        .query_row(params![content_id], row_to_task)
        .optional()
        .map_err(db_err)
}

fn query_decision(conn: &Connection, task_id: &str) -> Result<Option<RoutingDecision>> {
    conn.prepare_cached("SELECT * FROM routing_decisions WHERE task_id = ?1")
        .map_err(db_err)?
        .query_row(params![task_id], |row| {
            Ok(RoutingDecision {
                id: row.get("id")?,
                task_id: row.get("task_id")?,
                chosen_backend: row.get("chosen_backend")?,
                preferred_backend: row.get("preferred_backend")?,
                justification: row.get("justification")?,
                estimated_cost: row.get("estimated_cost")?,
                estimated_latency_ms: row.get("estimated_latency_ms")?,
                over_budget: row.get("over_budget")?,
                created_at: row.get("created_at")?,
            })
        })
        .optional()
        .map_err(db_err)
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<ModelRun> {
    Ok(ModelRun {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        decision_id: row.get("decision_id")?,
        attempt: row.get("attempt")?,
        backend: row.get("backend")?,
        input_tokens: row.get("input_tokens")?,
        output_tokens: row.get("output_tokens")?,
        latency_ms: row.get("latency_ms")?,
        cost: row.get("cost")?,
        success: row.get("success")?,
        failure_reason: row.get("failure_reason")?,
        output_text: row.get("output_text")?,
        created_at: row.get("created_at")?,
    })
}

fn query_runs(conn: &Connection, task_id: &str) -> Result<Vec<ModelRun>> {
    let mut stmt = conn
        .prepare_cached("SELECT * FROM model_runs WHERE task_id = ?1 ORDER BY attempt ASC")
        .map_err(db_err)?;
    let rows = stmt.query_map(params![task_id], row_to_run).map_err(db_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
}
