use std::path::Path;

use rusqlite::{Connection, params};

use super::Reporter;
use crate::assertion::StepOutcome;
use crate::error::ReporterError;
use crate::runner::{RunStart, ScenarioRun};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS runs (
     id INTEGER PRIMARY KEY AUTOINCREMENT,
     scenario TEXT NOT NULL,
     step_count INTEGER NOT NULL,
     started_at_ms INTEGER NOT NULL,
     ended_at_ms INTEGER,
     passed_count INTEGER,
     failed_count INTEGER,
     error_count INTEGER
   );
   CREATE TABLE IF NOT EXISTS step_outcomes (
     run_id INTEGER NOT NULL REFERENCES runs(id),
     position INTEGER NOT NULL,
     step_name TEXT NOT NULL,
     status TEXT NOT NULL,
     method TEXT NOT NULL,
     url TEXT,
     status_code INTEGER,
     elapsed_ms INTEGER,
     outcome_json TEXT NOT NULL,
     PRIMARY KEY (run_id, position)
   );";

/// Appends every run to a SQLite database: one `runs` row per run and one
/// `step_outcomes` row per step, written as events arrive.
pub struct SqliteReporter {
    conn: Connection,
    run_id: Option<i64>,
    position: i64,
}

impl SqliteReporter {
    pub fn open(path: &Path) -> Result<Self, ReporterError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, ReporterError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, ReporterError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            run_id: None,
            position: 0,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn current_run(&self) -> Result<i64, ReporterError> {
        self.run_id
            .ok_or_else(|| ReporterError::NotReady("no run started".to_string()))
    }
}

impl Reporter for SqliteReporter {
    fn on_run_start(&mut self, start: &RunStart) -> Result<(), ReporterError> {
        self.conn.execute(
            "INSERT INTO runs (scenario, step_count, started_at_ms) VALUES (?1, ?2, ?3);",
            params![start.scenario, start.step_count as i64, start.started_at_ms as i64],
        )?;
        self.run_id = Some(self.conn.last_insert_rowid());
        self.position = 0;
        Ok(())
    }

    fn on_step_outcome(&mut self, outcome: &StepOutcome) -> Result<(), ReporterError> {
        let run_id = self.current_run()?;
        let status = serde_json::to_value(outcome.status())?;
        let outcome_json = serde_json::to_string(outcome)?;
        self.conn.execute(
            "INSERT INTO step_outcomes
               (run_id, position, step_name, status, method, url, status_code, elapsed_ms, outcome_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                run_id,
                self.position,
                outcome.step_name,
                status.as_str().unwrap_or_default(),
                outcome.method.to_string(),
                outcome.url,
                outcome.status_code,
                outcome.elapsed_ms.map(|ms| ms as i64),
                outcome_json,
            ],
        )?;
        self.position += 1;
        Ok(())
    }

    fn on_run_end(&mut self, run: &ScenarioRun) -> Result<(), ReporterError> {
        let run_id = self.current_run()?;
        let summary = &run.summary;
        self.conn.execute(
            "UPDATE runs
             SET ended_at_ms = ?2, passed_count = ?3, failed_count = ?4, error_count = ?5
             WHERE id = ?1;",
            params![
                run_id,
                summary.ended_at_ms as i64,
                summary.passed_count as i64,
                summary.failed_count as i64,
                summary.error_count as i64,
            ],
        )?;
        self.run_id = None;
        Ok(())
    }
}
