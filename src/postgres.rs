//! PostgreSQL metadata store.
use crate::config::DatabaseSettings;
use crate::error::PersistError;
use crate::model::ImageRecord;
use crate::persistence::{InsertOutcome, MetadataStore};
use crate::secrets::DatabaseCredentials;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

const INSERT_METADATA: &str = "INSERT INTO satellite_images_metadata \
    (satellite_type, location_name, image_date, min_lat, min_lon, max_lat, max_lon, image_path) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
    ON CONFLICT (image_date, min_lon, min_lat, max_lon, max_lat) DO NOTHING";

fn schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// Connections are opened on first use, so an unreachable database fails individual
/// inserts rather than the whole run.
pub struct PostgresStore {
    pool: Pool<Postgres>,
    schema: OnceCell<()>,
}

fn connect_options(
    creds: &DatabaseCredentials,
    settings: &DatabaseSettings,
    timeout: Duration,
) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&creds.hostname)
        .port(settings.port)
        .username(&creds.username)
        .password(&creds.password)
        .database(&settings.name)
        .options([("statement_timeout", timeout.as_millis())])
}

impl PostgresStore {
    /// `timeout` bounds both waiting for a connection and each statement.
    pub fn connect_lazy(creds: &DatabaseCredentials, settings: &DatabaseSettings, timeout: Duration) -> Self {
        Self::with_options(connect_options(creds, settings, timeout), timeout)
    }

    pub fn from_url(url: &str, timeout: Duration) -> Result<Self, PersistError> {
        let opts = PgConnectOptions::from_str(url)?;
        Ok(Self::with_options(opts, timeout))
    }

    fn with_options(opts: PgConnectOptions, timeout: Duration) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(timeout)
            .connect_lazy_with(opts);
        Self {
            pool,
            schema: OnceCell::new(),
        }
    }

    /// Applies the embedded schema. Every statement is idempotent.
    pub async fn migrate(&self) -> Result<(), PersistError> {
        for statement in schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Metadata schema applied");
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<(), PersistError> {
        self.schema.get_or_try_init(|| self.migrate()).await?;
        Ok(())
    }
}

impl MetadataStore for PostgresStore {
    async fn insert_metadata(self: &Self, record: &ImageRecord) -> Result<InsertOutcome, PersistError> {
        self.ensure_schema().await?;

        let result = sqlx::query(INSERT_METADATA)
            .bind(&record.collection_id)
            .bind(&record.location_name)
            .bind(record.acquisition_timestamp)
            .bind(record.bbox.min_lat())
            .bind(record.bbox.min_lon())
            .bind(record.bbox.max_lat())
            .bind(record.bbox.max_lon())
            .bind(&record.storage_key)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Ok(InsertOutcome::AlreadyExists),
            Ok(_) => {
                info!(key = %record.storage_key, "Satellite image metadata saved");
                Ok(InsertOutcome::Inserted)
            }
            // 23505 unique_violation, e.g. a concurrent writer between check and insert
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Ok(InsertOutcome::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }
}
