use std::collections::{HashMap, HashSet};

use anyhow::Context;
use chrono::Utc;
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;

use crate::{
    core::{app_error::AppError, db::PooledConn},
    models::{catalog::ProductEntity, promotions::PromotionEntity},
    pricing,
    schema::{products, promotion_categories, promotion_products, promotions},
};

pub mod carts;
pub mod orders;

/// A product's price after promotion resolution, plus the catalog flags the
/// cart and checkout flows need.
pub(crate) struct ResolvedPrice {
    pub product_name: String,
    pub unit_price: f32,
    pub discount_percent: f32,
    pub requires_prescription: bool,
    pub is_active: bool,
}

/// Resolve current prices for a set of products: catalog price plus the best
/// promotion running right now for each product.
pub(crate) async fn resolve_prices(
    conn: &mut PooledConn<'_>,
    product_ids: &[i32],
) -> Result<HashMap<i32, ResolvedPrice>, AppError> {
    if product_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let products: Vec<ProductEntity> = products::table
        .filter(products::id.eq_any(product_ids))
        .get_results(conn)
        .await
        .context("Failed to get products for pricing")?;

    let now = Utc::now();
    let running: Vec<PromotionEntity> = promotions::table
        .filter(promotions::is_active.eq(true))
        .filter(promotions::starts_at.le(now))
        .filter(promotions::ends_at.gt(now))
        .get_results(conn)
        .await
        .context("Failed to get running promotions")?;

    let promotion_ids: Vec<i32> = running.iter().map(|promo| promo.id).collect();

    let product_scope: HashSet<(i32, i32)> = promotion_products::table
        .filter(promotion_products::promotion_id.eq_any(&promotion_ids))
        .select((
            promotion_products::promotion_id,
            promotion_products::product_id,
        ))
        .get_results::<(i32, i32)>(conn)
        .await
        .context("Failed to get promotion product scope")?
        .into_iter()
        .collect();

    let category_scope: HashSet<(i32, i32)> = promotion_categories::table
        .filter(promotion_categories::promotion_id.eq_any(&promotion_ids))
        .select((
            promotion_categories::promotion_id,
            promotion_categories::category_id,
        ))
        .get_results::<(i32, i32)>(conn)
        .await
        .context("Failed to get promotion category scope")?
        .into_iter()
        .collect();

    let resolved = products
        .into_iter()
        .map(|product| {
            let discount_percent = pricing::best_discount_percent(
                product.id,
                product.category_id,
                now,
                &running,
                &product_scope,
                &category_scope,
            );
            (
                product.id,
                ResolvedPrice {
                    product_name: product.name,
                    unit_price: product.unit_price,
                    discount_percent,
                    requires_prescription: product.requires_prescription,
                    is_active: product.is_active,
                },
            )
        })
        .collect();

    Ok(resolved)
}
