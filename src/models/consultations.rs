use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const CONSULTATION_STATUS_OPEN: &str = "OPEN";
pub const CONSULTATION_STATUS_ASSIGNED: &str = "ASSIGNED";
pub const CONSULTATION_STATUS_CLOSED: &str = "CLOSED";

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::consultation_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ConsultationRequestEntity {
    pub id: i32,
    pub customer_id: i32,
    pub staff_id: Option<i32>,
    pub topic: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::consultation_requests)]
pub struct CreateConsultationRequestEntity {
    pub customer_id: i32,
    pub topic: String,
    pub status: String,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MessageEntity {
    pub id: i32,
    pub consultation_id: i32,
    pub sender_user_id: i32,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::messages)]
pub struct CreateMessageEntity {
    pub consultation_id: i32,
    pub sender_user_id: i32,
    pub body: String,
}
