use crate::error::SurveyError;
use crate::pricing::config::{validate_pricing, PricingConfiguration};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const SCOPE: &str = "global";
const CURRENT_KEY: &str = "pricing/current";
const VERSION_PREFIX: &str = "pricing/v";
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
)
"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingVersionInfo {
    pub version: u32,
    pub name: String,
    pub updated_at: String,
    pub current: bool,
}

/// Versioned pricing configurations in a SQLite `config_kv` table.
///
/// Each save writes a new immutable `pricing/v{n}` entry and moves the
/// `pricing/current` pointer in one transaction.
pub struct PricingStore {
    conn: Mutex<Connection>,
}

impl PricingStore {
    pub fn open(path: &Path) -> Result<Self, SurveyError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, SurveyError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, SurveyError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SurveyError> {
        self.conn
            .lock()
            .map_err(|e| SurveyError::Store(format!("lock poisoned: {e}")))
    }

    /// Validate and store a configuration as the next version, making it
    /// current. Returns the configuration with its assigned version.
    pub fn save(&self, config: PricingConfiguration) -> Result<PricingConfiguration, SurveyError> {
        validate_pricing(&config)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let latest: Option<u32> = tx
            .query_row(
                "SELECT MAX(CAST(substr(key, ?2) AS INTEGER)) FROM config_kv
                 WHERE scope_id = ?1 AND key LIKE 'pricing/v%'",
                params![SCOPE, VERSION_PREFIX.len() as i64 + 1],
                |row| row.get(0),
            )?;
        let version = latest.unwrap_or(0) + 1;

        let stored = PricingConfiguration { version, ..config };
        let json = serde_json::to_string(&stored)?;

        tx.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)",
            params![SCOPE, version_key(version), json],
        )?;
        tx.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![SCOPE, CURRENT_KEY, version.to_string()],
        )?;
        tx.commit()?;

        tracing::info!(version, name = %stored.name, "pricing configuration saved");
        Ok(stored)
    }

    /// The configuration `pricing/current` points at, if any.
    pub fn current(&self) -> Result<Option<PricingConfiguration>, SurveyError> {
        let Some(version) = self.current_version()? else {
            return Ok(None);
        };
        self.get_version(version)
    }

    pub fn current_version(&self) -> Result<Option<u32>, SurveyError> {
        let Some(value) = self.get_value(CURRENT_KEY)? else {
            return Ok(None);
        };
        value
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|e| SurveyError::Store(format!("invalid {CURRENT_KEY} value '{value}': {e}")))
    }

    pub fn get_version(&self, version: u32) -> Result<Option<PricingConfiguration>, SurveyError> {
        let Some(json) = self.get_value(&version_key(version))? else {
            return Ok(None);
        };
        let config: PricingConfiguration = serde_json::from_str(&json)?;
        validate_pricing(&config)?;
        Ok(Some(config))
    }

    /// Point `pricing/current` at an existing version.
    pub fn set_current(&self, version: u32) -> Result<(), SurveyError> {
        let conn = self.lock()?;
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![SCOPE, version_key(version)],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(SurveyError::Store(format!(
                "pricing version {version} does not exist"
            )));
        }
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![SCOPE, CURRENT_KEY, version.to_string()],
        )?;
        tracing::info!(version, "pricing current version changed");
        Ok(())
    }

    /// All stored versions, oldest first.
    pub fn list_versions(&self) -> Result<Vec<PricingVersionInfo>, SurveyError> {
        let current = self.current_version()?;
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key, value, updated_at FROM config_kv
             WHERE scope_id = ?1 AND key LIKE 'pricing/v%'",
        )?;
        let rows = stmt.query_map(params![SCOPE], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut versions = Vec::new();
        for row in rows {
            let (key, value, updated_at) = row?;
            let Some(version) = key
                .strip_prefix(VERSION_PREFIX)
                .and_then(|v| v.parse::<u32>().ok())
            else {
                continue;
            };
            let config: PricingConfiguration = serde_json::from_str(&value)?;
            versions.push(PricingVersionInfo {
                version,
                name: config.name,
                updated_at,
                current: current == Some(version),
            });
        }
        versions.sort_by_key(|v| v.version);
        Ok(versions)
    }

    fn get_value(&self, key: &str) -> Result<Option<String>, SurveyError> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }
}

fn version_key(version: u32) -> String {
    format!("{VERSION_PREFIX}{version}")
}
