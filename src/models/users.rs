use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{AsChangeset, Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// Users

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserEntity {
    pub id: i32,
    pub email: String,
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::users)]
pub struct CreateUserEntity {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
}

#[derive(AsChangeset, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::users)]
pub struct UpdateProfileChangeset {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

// Staff

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::staff)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StaffEntity {
    pub id: i32,
    pub user_id: i32,
    pub branch_id: Option<i32>,
    pub position: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::staff)]
pub struct CreateStaffEntity {
    pub user_id: i32,
    pub branch_id: Option<i32>,
    pub position: String,
}

#[derive(AsChangeset, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::staff)]
pub struct UpdateStaffChangeset {
    pub branch_id: Option<i32>,
    pub position: Option<String>,
}
