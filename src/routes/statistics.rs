use std::collections::HashMap;

use anyhow::Context;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use diesel::{
    ExpressionMethods, QueryDsl,
    dsl::{count_star, sum},
};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware,
    },
    models::orders::OrderStatus,
    pricing::PricedLine,
    schema::{branches, order_items, orders, products},
};

/// Sales reporting over non-cancelled orders. Staff only.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/statistics/sales",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_sales_summary))
            .routes(utoipa_axum::routes!(get_top_products))
            .routes(utoipa_axum::routes!(get_sales_by_branch))
            .route_layer(axum::middleware::from_fn(middleware::staff_authorization)),
    )
}

#[derive(Deserialize, IntoParams)]
struct SalesSummaryQuery {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    branch_id: Option<i32>,
}

#[derive(Serialize, ToSchema)]
struct SalesSummaryRes {
    order_count: i64,
    gross_revenue: f32,
    discount_given: f32,
    average_order_value: f32,
}

/// Aggregate sales figures for a reporting window.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Statistics"],
    security(("bearerAuth" = [])),
    params(SalesSummaryQuery),
    responses(
        (status = 200, description = "Sales summary", body = StdResponse<SalesSummaryRes, String>)
    )
)]
async fn get_sales_summary(
    Query(window): Query<SalesSummaryQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut query = orders::table
        .filter(orders::status.ne(OrderStatus::Cancelled.as_str()))
        .select((
            count_star(),
            sum(orders::grand_total),
            sum(orders::discount_total),
        ))
        .into_boxed();
    if let Some(from) = window.from {
        query = query.filter(orders::created_at.ge(from));
    }
    if let Some(to) = window.to {
        query = query.filter(orders::created_at.lt(to));
    }
    if let Some(branch_id) = window.branch_id {
        query = query.filter(orders::branch_id.eq(branch_id));
    }

    let (order_count, gross_revenue, discount_given): (i64, Option<f32>, Option<f32>) = query
        .get_result(conn)
        .await
        .context("Failed to aggregate sales")?;

    let gross_revenue = gross_revenue.unwrap_or(0.0);
    let average_order_value = if order_count == 0 {
        0.0
    } else {
        gross_revenue / order_count as f32
    };

    Ok(StdResponse {
        data: Some(SalesSummaryRes {
            order_count,
            gross_revenue,
            discount_given: discount_given.unwrap_or(0.0),
            average_order_value,
        }),
        message: Some("Get sales summary successfully"),
    })
}

#[derive(Deserialize, IntoParams)]
struct TopProductsQuery {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    limit: Option<i64>,
}

#[derive(Serialize, Debug, PartialEq, ToSchema)]
struct TopProductRow {
    product_id: i32,
    product_name: String,
    units_sold: i64,
    revenue: f32,
}

/// Best sellers by quantity, with the revenue each brought in.
#[utoipa::path(
    get,
    path = "/top-products",
    tags = ["Statistics"],
    security(("bearerAuth" = [])),
    params(TopProductsQuery),
    responses(
        (status = 200, description = "Best-selling products", body = StdResponse<Vec<TopProductRow>, String>)
    )
)]
async fn get_top_products(
    Query(window): Query<TopProductsQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut listing = order_items::table
        .inner_join(orders::table)
        .inner_join(products::table)
        .filter(orders::status.ne(OrderStatus::Cancelled.as_str()))
        .select((
            order_items::product_id,
            products::name,
            order_items::quantity,
            order_items::unit_price,
            order_items::discount_percent,
        ))
        .into_boxed();
    if let Some(from) = window.from {
        listing = listing.filter(orders::created_at.ge(from));
    }
    if let Some(to) = window.to {
        listing = listing.filter(orders::created_at.lt(to));
    }

    let rows: Vec<(i32, String, i32, f32, f32)> = listing
        .get_results(conn)
        .await
        .context("Failed to get sold lines")?;

    let limit = window.limit.unwrap_or(10).clamp(1, 100) as usize;

    Ok(StdResponse {
        data: Some(rank_products(rows, limit)),
        message: Some("Get top products successfully"),
    })
}

/// Fold sold lines into per-product totals, ranked by units sold. Revenue uses
/// the price snapshot taken at placement, not the current catalog price.
fn rank_products(rows: Vec<(i32, String, i32, f32, f32)>, limit: usize) -> Vec<TopProductRow> {
    let mut by_product: HashMap<i32, TopProductRow> = HashMap::new();
    for (product_id, product_name, quantity, unit_price, discount_percent) in rows {
        let line = PricedLine {
            product_id,
            quantity,
            unit_price,
            discount_percent,
        };
        let entry = by_product.entry(product_id).or_insert_with(|| TopProductRow {
            product_id,
            product_name,
            units_sold: 0,
            revenue: 0.0,
        });
        entry.units_sold += quantity as i64;
        entry.revenue += line.line_total();
    }

    let mut ranked: Vec<TopProductRow> = by_product.into_values().collect();
    ranked.sort_by(|a, b| {
        b.units_sold
            .cmp(&a.units_sold)
            .then(b.revenue.total_cmp(&a.revenue))
            .then(a.product_id.cmp(&b.product_id))
    });
    ranked.truncate(limit);
    ranked
}

#[derive(Deserialize, IntoParams)]
struct SalesByBranchQuery {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
struct BranchSalesRow {
    branch_id: i32,
    branch_name: String,
    order_count: i64,
    revenue: f32,
}

/// Order count and revenue per branch.
#[utoipa::path(
    get,
    path = "/by-branch",
    tags = ["Statistics"],
    security(("bearerAuth" = [])),
    params(SalesByBranchQuery),
    responses(
        (status = 200, description = "Per-branch sales", body = StdResponse<Vec<BranchSalesRow>, String>)
    )
)]
async fn get_sales_by_branch(
    Query(window): Query<SalesByBranchQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut query = orders::table
        .inner_join(branches::table)
        .group_by((orders::branch_id, branches::name))
        .select((
            orders::branch_id,
            branches::name,
            count_star(),
            sum(orders::grand_total),
        ))
        .filter(orders::status.ne(OrderStatus::Cancelled.as_str()))
        .into_boxed();
    if let Some(from) = window.from {
        query = query.filter(orders::created_at.ge(from));
    }
    if let Some(to) = window.to {
        query = query.filter(orders::created_at.lt(to));
    }

    let rows: Vec<(i32, String, i64, Option<f32>)> = query
        .get_results(conn)
        .await
        .context("Failed to aggregate branch sales")?;

    let mut branch_sales: Vec<BranchSalesRow> = rows
        .into_iter()
        .map(|(branch_id, branch_name, order_count, revenue)| BranchSalesRow {
            branch_id,
            branch_name,
            order_count,
            revenue: revenue.unwrap_or(0.0),
        })
        .collect();
    branch_sales.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));

    Ok(StdResponse {
        data: Some(branch_sales),
        message: Some("Get branch sales successfully"),
    })
}

#[cfg(test)]
mod tests {
    use super::rank_products;

    fn sold(product_id: i32, name: &str, quantity: i32, unit_price: f32, discount: f32) -> (i32, String, i32, f32, f32) {
        (product_id, name.to_string(), quantity, unit_price, discount)
    }

    #[test]
    fn lines_of_the_same_product_are_folded_together() {
        let ranked = rank_products(
            vec![
                sold(1, "Aspirin", 2, 10.0, 0.0),
                sold(1, "Aspirin", 3, 10.0, 50.0),
            ],
            10,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].units_sold, 5);
        // 2 * 10 at full price + 3 * 10 at half price
        assert_eq!(ranked[0].revenue, 35.0);
    }

    #[test]
    fn ranking_is_by_units_sold_and_respects_the_limit() {
        let ranked = rank_products(
            vec![
                sold(1, "Aspirin", 1, 100.0, 0.0),
                sold(2, "Ibuprofen", 5, 2.0, 0.0),
                sold(3, "Paracetamol", 3, 4.0, 0.0),
            ],
            2,
        );
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].product_id, 2);
        assert_eq!(ranked[1].product_id, 3);
    }

    #[test]
    fn equal_units_break_ties_by_revenue() {
        let ranked = rank_products(
            vec![
                sold(1, "Aspirin", 2, 1.0, 0.0),
                sold(2, "Ibuprofen", 2, 9.0, 0.0),
            ],
            10,
        );
        assert_eq!(ranked[0].product_id, 2);
        assert_eq!(ranked[1].product_id, 1);
    }

    #[test]
    fn empty_window_ranks_nothing() {
        assert!(rank_products(vec![], 5).is_empty());
    }
}
