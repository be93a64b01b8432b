//! Visitor row, read by credential rendering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Visitor {
    pub id: i64,
    pub name: String,
    pub doc: String,
    pub doc_type_id: i64,
    pub phone: Option<String>,
    pub destination_id: Option<i64>,
    pub photo: Option<String>,
    pub other: Option<String>,
    pub has_restrictions: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
