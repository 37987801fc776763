use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{AsChangeset, Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::promotions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PromotionEntity {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub discount_percent: f32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromotionEntity {
    pub fn is_running_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.starts_at <= now && now < self.ends_at
    }
}

#[derive(Insertable, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::promotions)]
pub struct CreatePromotionEntity {
    pub name: String,
    pub description: Option<String>,
    pub discount_percent: f32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(AsChangeset, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::promotions)]
pub struct UpdatePromotionChangeset {
    pub name: Option<String>,
    pub description: Option<String>,
    pub discount_percent: Option<f32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Queryable, Selectable, Insertable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::promotion_products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PromotionProductEntity {
    pub promotion_id: i32,
    pub product_id: i32,
}

#[derive(Queryable, Selectable, Insertable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::promotion_categories)]
pub struct PromotionCategoryEntity {
    pub promotion_id: i32,
    pub category_id: i32,
}
