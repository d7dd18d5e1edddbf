//! Database schema SQL.

/// Ingestion tables: artifacts and their extracted transcripts.
pub const INGEST_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS artifacts (
    id TEXT PRIMARY KEY,
    original_name TEXT NOT NULL,
    media_type TEXT NOT NULL,
    storage_locator TEXT NOT NULL,
    size_bytes INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL CHECK (status IN ('uploaded', 'processing', 'ready', 'failed')),
    error_message TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER
);

CREATE TABLE IF NOT EXISTS transcripts (
    id TEXT PRIMARY KEY,
    artifact_id TEXT NOT NULL UNIQUE REFERENCES artifacts(id),
    text TEXT NOT NULL DEFAULT '',
    language TEXT,
    duration_ms INTEGER,
    is_placeholder INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL CHECK (status IN ('processing', 'ready', 'failed')),
    error_message TEXT,
    created_at INTEGER NOT NULL,
    completed_at INTEGER
);
"#;

/// Routing tables. A decision is unique per task and every model run must
/// reference its task's decision, so no run can be written before it.
pub const ROUTING_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL CHECK (kind IN ('summary', 'classification', 'extraction')),
    sla_tier TEXT NOT NULL CHECK (sla_tier IN ('low_latency', 'low_cost', 'high_quality')),
    budget_ceiling INTEGER NOT NULL CHECK (budget_ceiling >= 0),
    input_text TEXT NOT NULL,
    content_id TEXT REFERENCES transcripts(id),
    origin TEXT NOT NULL DEFAULT 'api',
    status TEXT NOT NULL CHECK (status IN ('pending', 'routed', 'running', 'completed', 'failed')),
    error_message TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_resume_content
    ON tasks(content_id) WHERE origin = 'resume';
CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);

CREATE TABLE IF NOT EXISTS routing_decisions (
    id TEXT PRIMARY KEY,
    task_id TEXT NOT NULL UNIQUE REFERENCES tasks(id),
    chosen_backend TEXT NOT NULL,
    preferred_backend TEXT NOT NULL,
    justification TEXT NOT NULL,
    estimated_cost INTEGER NOT NULL,
    estimated_latency_ms INTEGER NOT NULL,
    over_budget INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_decisions_created ON routing_decisions(created_at);

CREATE TABLE IF NOT EXISTS model_runs (
    id TEXT PRIMARY KEY,
    task_id TEXT NOT NULL REFERENCES tasks(id),
    decision_id TEXT NOT NULL REFERENCES routing_decisions(id),
    attempt INTEGER NOT NULL,
    backend TEXT NOT NULL,
    input_tokens INTEGER NOT NULL,
    output_tokens INTEGER NOT NULL,
    latency_ms INTEGER NOT NULL,
    cost INTEGER NOT NULL,
    success INTEGER NOT NULL,
    failure_reason TEXT,
    output_text TEXT,
    created_at INTEGER NOT NULL,
    UNIQUE (task_id, attempt)
);

CREATE INDEX IF NOT EXISTS idx_runs_task ON model_runs(task_id);
"#;
