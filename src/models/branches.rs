use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{AsChangeset, Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// Branches

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::branches)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BranchEntity {
    pub id: i32,
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::branches)]
pub struct CreateBranchEntity {
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
}

#[derive(AsChangeset, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::branches)]
pub struct UpdateBranchChangeset {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

// Branch inventory

#[derive(Queryable, Selectable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::branch_inventory)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BranchInventoryEntity {
    pub branch_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::branch_inventory)]
pub struct UpsertBranchInventoryEntity {
    pub branch_id: i32,
    pub product_id: i32,
    pub quantity: i32,
}
