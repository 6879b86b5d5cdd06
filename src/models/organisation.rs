use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organisation {
    pub id: i64,
    pub organisation_id: String,
    pub name: String,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrganisationRequest {
    pub organisation_id: String,
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateOrganisationRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}
