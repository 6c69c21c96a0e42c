//! The production `ProblemStore`, backed by a `sqlx::MySqlPool`.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{FromRow, MySqlPool};

use judgecore_core::config::DatabaseConfig;
use judgecore_core::{Error, Problem, Result, TestCase, Verdict};

use crate::ProblemStore;

#[derive(FromRow)]
struct ProblemRow {
    pid: i64,
    timelimit: String,
    memorylimit: String,
}

#[derive(FromRow)]
struct TestCaseRow {
    input_data: Vec<u8>,
    output_data: Vec<u8>,
}

/// A connection pool to the `problems`/`test_cases`/`submit_records`
/// schema `spec.md` §6 fixes.
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Build the pool from the `database` config section. `max_open_conns`
    /// and `max_idle_conns` map to `max_connections`/`min_connections`,
    /// `max_life_time` (seconds) to `.max_lifetime`, exactly as
    /// `ConnectSql`'s `SetMaxOpenConns`/`SetMaxIdleConns`/
    /// `SetConnMaxLifetime` do.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let dsn = format!(
            "mysql://{}:{}@{}/{}",
            config.user,
            config.password.expose_secret(),
            config.address,
            config.name,
        );

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_open_conns)
            .min_connections(config.max_idle_conns)
            .max_lifetime(std::time::Duration::from_secs(config.max_life_time))
            .connect(&dsn)
            .await
            .map_err(|e| Error::storage(format!("failed to connect to MySQL: {e}")))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProblemStore for MySqlStore {
    async fn load_problem(&self, pid: i64) -> Result<Problem> {
        let row: ProblemRow = sqlx::query_as(
            "SELECT pid, timelimit, memorylimit FROM problems WHERE pid = ?",
        )
        .bind(pid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::storage(format!("failed to load problem {pid}: {e}")))?
        .ok_or(Error::ProblemNotFound(pid))?;

        Ok(Problem {
            pid: row.pid,
            time_limit: row.timelimit,
            memory_limit: row.memorylimit,
        })
    }

    async fn load_test_cases(&self, pid: i64) -> Result<Vec<TestCase>> {
        let rows: Vec<TestCaseRow> = sqlx::query_as(
            "SELECT input_data, output_data FROM test_cases WHERE pid = ? ORDER BY id",
        )
        .bind(pid)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::storage(format!("failed to load test cases for {pid}: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|row| TestCase {
                input_data: row.input_data,
                expected_output: row.output_data,
            })
            .collect())
    }

    async fn mark_running(&self, uid: i64, pid: i64) -> Result<()> {
        sqlx::query("INSERT INTO submit_records (uid, pid, result) VALUES (?, ?, 'Running...')")
            .bind(uid)
            .bind(pid)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::storage(format!("failed to mark {uid}/{pid} running: {e}")))?;
        Ok(())
    }

    async fn update_verdict(&self, uid: i64, pid: i64, verdict: Verdict) -> Result<()> {
        sqlx::query(
            "UPDATE submit_records SET result = ? \
             WHERE uid = ? AND pid = ? AND result = 'Running...' \
             ORDER BY id DESC LIMIT 1",
        )
        .bind(verdict.as_label())
        .bind(uid)
        .bind(pid)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::storage(format!("failed to update verdict for {uid}/{pid}: {e}")))?;
        Ok(())
    }
}
