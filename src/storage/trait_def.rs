use crate::models::{
    CreateOrganisationRequest, Organisation, PreparedRecord, UpdateOrganisationRequest,
};
use crate::reporting::{MetricQuery, MetricRow, MetricTable};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("organisation already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    /// Create an organisation; fails with `Conflict` if the code is taken
    async fn create_organisation(
        &self,
        request: &CreateOrganisationRequest,
    ) -> StorageResult<Organisation>;

    /// Get an organisation by its code
    async fn get_organisation(&self, organisation_id: &str) -> Result<Option<Organisation>>;

    /// List organisations, newest first
    async fn list_organisations(&self, limit: i64, offset: i64) -> Result<Vec<Organisation>>;

    /// Apply the provided fields; `None` if the organisation does not exist
    async fn update_organisation(
        &self,
        organisation_id: &str,
        update: &UpdateOrganisationRequest,
    ) -> Result<Option<Organisation>>;

    /// Delete an organisation. Its metric rows are left in place.
    async fn delete_organisation(&self, organisation_id: &str) -> Result<bool>;

    /// Insert validated metric records in one transaction
    async fn insert_metric_records(
        &self,
        organisation_id: &str,
        table: &MetricTable,
        records: &[PreparedRecord],
    ) -> Result<u64>;

    /// Run a filtered read against a metric table, ordered by date
    async fn fetch_metric_rows(&self, query: &MetricQuery) -> Result<Vec<MetricRow>>;
}
