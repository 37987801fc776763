use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const PRESCRIPTION_STATUS_PENDING: &str = "PENDING";
pub const PRESCRIPTION_STATUS_APPROVED: &str = "APPROVED";
pub const PRESCRIPTION_STATUS_REJECTED: &str = "REJECTED";

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::prescriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PrescriptionEntity {
    pub id: Uuid,
    pub customer_id: i32,
    pub image_url: String,
    pub status: String,
    pub reviewed_by: Option<i32>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize, Debug)]
#[diesel(table_name = crate::schema::prescriptions)]
pub struct CreatePrescriptionEntity {
    pub customer_id: i32,
    pub image_url: String,
    pub status: String,
}
