use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{AsChangeset, Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// Countries

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::countries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CountryEntity {
    pub id: i32,
    pub name: String,
    pub iso_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::countries)]
pub struct CreateCountryEntity {
    pub name: String,
    pub iso_code: String,
}

// Manufacturers

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::manufacturers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ManufacturerEntity {
    pub id: i32,
    pub name: String,
    pub country_id: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::manufacturers)]
pub struct CreateManufacturerEntity {
    pub name: String,
    pub country_id: i32,
}

#[derive(AsChangeset, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::manufacturers)]
pub struct UpdateManufacturerChangeset {
    pub name: Option<String>,
    pub country_id: Option<i32>,
}

// Brands

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::brands)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BrandEntity {
    pub id: i32,
    pub name: String,
    pub manufacturer_id: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::brands)]
pub struct CreateBrandEntity {
    pub name: String,
    pub manufacturer_id: i32,
}

#[derive(AsChangeset, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::brands)]
pub struct UpdateBrandChangeset {
    pub name: Option<String>,
    pub manufacturer_id: Option<i32>,
}

// Categories

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CategoryEntity {
    pub id: i32,
    pub name: String,
    pub parent_id: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::categories)]
pub struct CreateCategoryEntity {
    pub name: String,
    pub parent_id: Option<i32>,
}

#[derive(AsChangeset, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::categories)]
pub struct UpdateCategoryChangeset {
    pub name: Option<String>,
    pub parent_id: Option<i32>,
}

// Products

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductEntity {
    pub id: i32,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: i32,
    pub brand_id: i32,
    pub unit_price: f32,
    pub requires_prescription: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::products)]
pub struct CreateProductEntity {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: i32,
    pub brand_id: i32,
    pub unit_price: f32,
    pub requires_prescription: bool,
}

#[derive(AsChangeset, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::products)]
pub struct UpdateProductChangeset {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    pub brand_id: Option<i32>,
    pub unit_price: Option<f32>,
    pub requires_prescription: Option<bool>,
}

// Banners

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::banners)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BannerEntity {
    pub id: i32,
    pub title: String,
    pub image_url: String,
    pub link_url: Option<String>,
    pub position: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BannerEntity {
    /// A banner is shown when it is active and the current time falls inside
    /// its optional display window.
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.starts_at.is_none_or(|starts| starts <= now)
            && self.ends_at.is_none_or(|ends| now < ends)
    }
}

#[derive(Insertable, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::banners)]
pub struct CreateBannerEntity {
    pub title: String,
    pub image_url: String,
    pub link_url: Option<String>,
    pub position: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(AsChangeset, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::banners)]
pub struct UpdateBannerChangeset {
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    pub position: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn banner(starts: Option<i64>, ends: Option<i64>, is_active: bool) -> BannerEntity {
        let at = |secs: i64| Utc.timestamp_opt(secs, 0).unwrap();
        BannerEntity {
            id: 1,
            title: "Flu season".into(),
            image_url: "https://cdn.example.com/flu.png".into(),
            link_url: None,
            position: 0,
            starts_at: starts.map(at),
            ends_at: ends.map(at),
            is_active,
            created_at: at(0),
            updated_at: at(0),
        }
    }

    #[test]
    fn banner_without_window_is_always_visible() {
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        assert!(banner(None, None, true).is_visible_at(now));
        assert!(!banner(None, None, false).is_visible_at(now));
    }

    #[test]
    fn banner_window_bounds_are_half_open() {
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        assert!(banner(Some(1_000), Some(2_000), true).is_visible_at(now));
        assert!(!banner(Some(1_001), None, true).is_visible_at(now));
        assert!(!banner(None, Some(1_000), true).is_visible_at(now));
    }
}
