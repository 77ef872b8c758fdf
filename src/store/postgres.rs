use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

use super::RecordBackend;
use crate::error::StoreError;
use crate::record::{Record, RecordFilters, RecordKey, RecordPatch};

const COLUMNS: &str =
    "partition_key, sort_key, title, director, year, rating, description, is_available, translations";

#[derive(Debug, FromRow)]
struct RecordRow {
    partition_key: String,
    sort_key: String,
    title: String,
    director: String,
    year: i64,
    rating: f64,
    description: String,
    is_available: bool,
    translations: Json<HashMap<String, String>>,
}

impl From<RecordRow> for Record {
    fn from(row: RecordRow) -> Self {
        Record {
            partition_key: row.partition_key,
            sort_key: row.sort_key,
            title: row.title,
            director: row.director,
            year: row.year,
            rating: row.rating,
            description: row.description,
            is_available: row.is_available,
            translations: row.translations.0,
        }
    }
}

/// PostgreSQL backend. One table, composite primary key on
/// (partition_key, sort_key), translations stored as JSONB.
#[derive(Clone)]
pub struct PostgresBackend {
    pool: PgPool,
    table: String,
}

impl PostgresBackend {
    /// Connect and make sure the table and its sort-key index exist
    pub async fn connect(database_url: &str, table: &str) -> Result<Self> {
        validate_table_name(table)?;

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        let backend = Self {
            pool,
            table: table.to_string(),
        };
        backend.ensure_schema().await?;

        info!("Connected to PostgreSQL table '{}'", table);
        Ok(backend)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                partition_key TEXT NOT NULL,
                sort_key TEXT NOT NULL,
                title TEXT NOT NULL,
                director TEXT NOT NULL DEFAULT '',
                year BIGINT NOT NULL DEFAULT 0,
                rating DOUBLE PRECISION NOT NULL DEFAULT 0,
                description TEXT NOT NULL DEFAULT '',
                is_available BOOLEAN NOT NULL DEFAULT TRUE,
                translations JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                PRIMARY KEY (partition_key, sort_key)
            )",
            self.table
        ))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to create table {}", self.table))?;

        // Secondary index so lookups by sort key alone avoid a full scan
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {0}_sort_key_idx ON {0} (sort_key)",
            self.table
        ))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to create sort key index on {}", self.table))?;

        Ok(())
    }

    fn select<'args>(&self) -> QueryBuilder<'args, Postgres> {
        QueryBuilder::new(format!("SELECT {} FROM {} WHERE TRUE", COLUMNS, self.table))
    }
}

/// Table names are interpolated into SQL, so only plain identifiers are allowed
fn validate_table_name(table: &str) -> Result<()> {
    let pattern = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$")?;
    if !pattern.is_match(table) {
        bail!("Invalid table name '{}'", table);
    }
    Ok(())
}

fn escape_like(pattern: &str) -> String {
    pattern
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &RecordFilters) {
    if let Some(year) = filters.year {
        qb.push(" AND year = ").push_bind(year);
    }
    if let Some(director) = &filters.director {
        qb.push(" AND director ILIKE ")
            .push_bind(format!("%{}%", escape_like(director)));
    }
    if let Some(available) = filters.is_available {
        qb.push(" AND is_available = ").push_bind(available);
    }
}

#[async_trait]
impl RecordBackend for PostgresBackend {
    async fn get(&self, key: &RecordKey) -> Result<Option<Record>, StoreError> {
        let mut qb = self.select();
        qb.push(" AND partition_key = ")
            .push_bind(&key.partition_key)
            .push(" AND sort_key = ")
            .push_bind(&key.sort_key);

        let row = qb
            .build_query_as::<RecordRow>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Record::from))
    }

    async fn find_by_sort_key(&self, sort_key: &str) -> Result<Option<Record>, StoreError> {
        let mut qb = self.select();
        qb.push(" AND sort_key = ")
            .push_bind(sort_key)
            .push(" ORDER BY partition_key LIMIT 1");

        let row = qb
            .build_query_as::<RecordRow>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Record::from))
    }

    async fn query_partition(
        &self,
        partition_key: &str,
        filters: &RecordFilters,
        limit: u32,
    ) -> Result<Vec<Record>, StoreError> {
        let mut qb = self.select();
        qb.push(" AND partition_key = ").push_bind(partition_key);
        push_filters(&mut qb, filters);
        qb.push(" ORDER BY sort_key LIMIT ").push_bind(i64::from(limit));

        let rows = qb
            .build_query_as::<RecordRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Record::from).collect())
    }

    async fn scan(&self, filters: &RecordFilters, limit: u32) -> Result<Vec<Record>, StoreError> {
        let mut qb = self.select();
        push_filters(&mut qb, filters);
        qb.push(" ORDER BY partition_key, sort_key LIMIT ")
            .push_bind(i64::from(limit));

        let rows = qb
            .build_query_as::<RecordRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Record::from).collect())
    }

    async fn put(&self, record: &Record) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO {} ({})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (partition_key, sort_key) DO UPDATE SET
                title = EXCLUDED.title,
                director = EXCLUDED.director,
                year = EXCLUDED.year,
                rating = EXCLUDED.rating,
                description = EXCLUDED.description,
                is_available = EXCLUDED.is_available,
                translations = EXCLUDED.translations",
            self.table, COLUMNS
        ))
        .bind(&record.partition_key)
        .bind(&record.sort_key)
        .bind(&record.title)
        .bind(&record.director)
        .bind(record.year)
        .bind(record.rating)
        .bind(&record.description)
        .bind(record.is_available)
        .bind(Json(&record.translations))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(
        &self,
        key: &RecordKey,
        patch: &RecordPatch,
    ) -> Result<Option<Record>, StoreError> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("UPDATE {} SET ", self.table));
        {
            let mut set = qb.separated(", ");
            if let Some(title) = &patch.title {
                set.push("title = ").push_bind_unseparated(title);
            }
            if let Some(director) = &patch.director {
                set.push("director = ").push_bind_unseparated(director);
            }
            if let Some(year) = patch.year {
                set.push("year = ").push_bind_unseparated(year);
            }
            if let Some(rating) = patch.rating {
                set.push("rating = ").push_bind_unseparated(rating);
            }
            if let Some(description) = &patch.description {
                set.push("description = ").push_bind_unseparated(description);
            }
            if let Some(available) = patch.is_available {
                set.push("is_available = ").push_bind_unseparated(available);
            }
            if let Some(translations) = &patch.translations {
                set.push("translations = ")
                    .push_bind_unseparated(Json(translations.clone()));
            }
        }
        qb.push(" WHERE partition_key = ")
            .push_bind(&key.partition_key)
            .push(" AND sort_key = ")
            .push_bind(&key.sort_key)
            .push(format!(" RETURNING {}", COLUMNS));

        let row = qb
            .build_query_as::<RecordRow>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Record::from))
    }
}
