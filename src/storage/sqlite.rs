use crate::models::{
    CreateOrganisationRequest, Organisation, PreparedRecord, UpdateOrganisationRequest,
};
use crate::reporting::{BindValue, Dialect, MetricQuery, MetricRow, MetricTable};
use crate::storage::schema::metric_table_statements;
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

fn metric_row(row: &SqliteRow, columns: usize) -> Result<MetricRow, sqlx::Error> {
    let entry_date: NaiveDate = row.try_get(0)?;
    let shift: Option<i64> = row.try_get(1)?;
    let values = (0..columns)
        .map(|index| row.try_get::<Option<String>, _>(index + 2))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(MetricRow {
        entry_date,
        shift,
        values,
    })
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS organisations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                organisation_id TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                address TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        for statement in metric_table_statements(Dialect::Sqlite) {
            sqlx::query(&statement)
                .execute(self.pool.as_ref())
                .await?;
        }

        Ok(())
    }

    async fn create_organisation(
        &self,
        request: &CreateOrganisationRequest,
    ) -> StorageResult<Organisation> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO organisations (organisation_id, name, address, is_active, created_at, updated_at)
            VALUES (?, ?, ?, 1, ?, ?)
            ON CONFLICT(organisation_id) DO NOTHING
            "#,
        )
        .bind(&request.organisation_id)
        .bind(&request.name)
        .bind(&request.address)
        .bind(now)
        .bind(now)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        self.get_organisation(&request.organisation_id)
            .await?
            .ok_or_else(|| {
                StorageError::Other(anyhow::anyhow!("organisation vanished after insert"))
            })
    }

    async fn get_organisation(&self, organisation_id: &str) -> Result<Option<Organisation>> {
        let organisation = sqlx::query_as::<_, Organisation>(
            r#"
            SELECT id, organisation_id, name, address, is_active, created_at, updated_at
            FROM organisations
            WHERE organisation_id = ?
            "#,
        )
        .bind(organisation_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(organisation)
    }

    async fn list_organisations(&self, limit: i64, offset: i64) -> Result<Vec<Organisation>> {
        let organisations = sqlx::query_as::<_, Organisation>(
            r#"
            SELECT id, organisation_id, name, address, is_active, created_at, updated_at
            FROM organisations
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(organisations)
    }

    async fn update_organisation(
        &self,
        organisation_id: &str,
        update: &UpdateOrganisationRequest,
    ) -> Result<Option<Organisation>> {
        let result = sqlx::query(
            r#"
            UPDATE organisations
            SET name = COALESCE(?, name),
                address = COALESCE(?, address),
                is_active = COALESCE(?, is_active),
                updated_at = ?
            WHERE organisation_id = ?
            "#,
        )
        .bind(&update.name)
        .bind(&update.address)
        .bind(update.is_active)
        .bind(Utc::now().timestamp())
        .bind(organisation_id)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_organisation(organisation_id).await
    }

    async fn delete_organisation(&self, organisation_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM organisations
            WHERE organisation_id = ?
            "#,
        )
        .bind(organisation_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_metric_records(
        &self,
        organisation_id: &str,
        table: &MetricTable,
        records: &[PreparedRecord],
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for record in records {
            let sql = record.insert_sql(table, Dialect::Sqlite);
            let mut query = sqlx::query(&sql)
                .bind(organisation_id)
                .bind(record.entry_date)
                .bind(record.shift);
            for (_, value) in &record.values {
                query = query.bind(value.clone());
            }
            inserted += query.execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn fetch_metric_rows(&self, query: &MetricQuery) -> Result<Vec<MetricRow>> {
        let (sql, binds) = query.to_sql(Dialect::Sqlite);

        let mut statement = sqlx::query(&sql);
        for value in binds {
            statement = match value {
                BindValue::Text(text) => statement.bind(text),
                BindValue::Int(number) => statement.bind(number),
                BindValue::Date(day) => statement.bind(day),
            };
        }

        let rows = statement.fetch_all(self.pool.as_ref()).await?;
        let rows = rows
            .iter()
            .map(|row| metric_row(row, query.columns.len()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}
