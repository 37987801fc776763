use anyhow::Context;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        aliases::DieselError,
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware,
    },
    models::promotions::{
        CreatePromotionEntity, PromotionCategoryEntity, PromotionEntity, PromotionProductEntity,
        UpdatePromotionChangeset,
    },
    schema::{categories, products, promotion_categories, promotion_products, promotions},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let public = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_promotions))
        .routes(utoipa_axum::routes!(get_promotion));

    let staff = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_promotion))
        .routes(utoipa_axum::routes!(update_promotion))
        .routes(utoipa_axum::routes!(delete_promotion))
        .routes(utoipa_axum::routes!(set_promotion_products))
        .routes(utoipa_axum::routes!(set_promotion_categories))
        .route_layer(axum::middleware::from_fn(middleware::staff_authorization));

    OpenApiRouter::new().nest("/promotions", public.merge(staff))
}

#[derive(Deserialize, IntoParams)]
struct ListPromotionsQuery {
    /// Only promotions running right now.
    active_now: Option<bool>,
}

/// List promotions.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Promotions"],
    params(ListPromotionsQuery),
    responses(
        (status = 200, description = "List promotions", body = StdResponse<Vec<PromotionEntity>, String>)
    )
)]
async fn get_promotions(
    Query(query): Query<ListPromotionsQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut listing = promotions::table
        .order_by(promotions::starts_at.desc())
        .into_boxed();
    if query.active_now.unwrap_or(false) {
        let now = Utc::now();
        listing = listing
            .filter(promotions::is_active.eq(true))
            .filter(promotions::starts_at.le(now))
            .filter(promotions::ends_at.gt(now));
    }

    let promotions: Vec<PromotionEntity> = listing
        .get_results(conn)
        .await
        .context("Failed to get promotions")?;

    Ok(StdResponse {
        data: Some(promotions),
        message: Some("Get promotions successfully"),
    })
}

#[derive(Serialize, ToSchema)]
struct PromotionDetailRes {
    promotion: PromotionEntity,
    product_ids: Vec<i32>,
    category_ids: Vec<i32>,
}

/// Fetch one promotion with its product and category scope.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Promotions"],
    params(("id" = i32, Path, description = "Promotion ID")),
    responses(
        (status = 200, description = "Get promotion", body = StdResponse<PromotionDetailRes, String>)
    )
)]
async fn get_promotion(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let promotion: PromotionEntity =
        promotions::table
            .find(id)
            .get_result(conn)
            .await
            .map_err(|err| match err {
                DieselError::NotFound => AppError::NotFound,
                _ => AppError::Other(err.into()),
            })?;

    let product_ids: Vec<i32> = promotion_products::table
        .filter(promotion_products::promotion_id.eq(id))
        .select(promotion_products::product_id)
        .get_results(conn)
        .await
        .context("Failed to get promotion products")?;

    let category_ids: Vec<i32> = promotion_categories::table
        .filter(promotion_categories::promotion_id.eq(id))
        .select(promotion_categories::category_id)
        .get_results(conn)
        .await
        .context("Failed to get promotion categories")?;

    Ok(StdResponse {
        data: Some(PromotionDetailRes {
            promotion,
            product_ids,
            category_ids,
        }),
        message: Some("Get promotion successfully"),
    })
}

fn validate_discount_percent(percent: f32) -> Result<(), AppError> {
    if percent <= 0.0 || percent > 100.0 {
        return Err(AppError::BadRequest(
            "Discount percent must be within (0, 100]".into(),
        ));
    }
    Ok(())
}

/// Create a promotion. Scope is attached separately.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Promotions"],
    security(("bearerAuth" = [])),
    request_body = CreatePromotionEntity,
    responses(
        (status = 200, description = "Promotion created", body = StdResponse<PromotionEntity, String>)
    )
)]
async fn create_promotion(
    State(state): State<AppState>,
    Json(body): Json<CreatePromotionEntity>,
) -> Result<impl IntoResponse, AppError> {
    validate_discount_percent(body.discount_percent)?;
    if body.ends_at <= body.starts_at {
        return Err(AppError::BadRequest(
            "Promotion must end after it starts".into(),
        ));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let promotion = diesel::insert_into(promotions::table)
        .values(body)
        .returning(PromotionEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create promotion")?;

    Ok(StdResponse {
        data: Some(promotion),
        message: Some("Promotion created successfully"),
    })
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Promotions"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Promotion ID")),
    request_body = UpdatePromotionChangeset,
    responses(
        (status = 200, description = "Promotion updated", body = StdResponse<PromotionEntity, String>)
    )
)]
async fn update_promotion(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdatePromotionChangeset>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(percent) = body.discount_percent {
        validate_discount_percent(percent)?;
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let promotion = diesel::update(promotions::table.find(id))
        .set(body)
        .returning(PromotionEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            DieselError::QueryBuilderError(_) => {
                AppError::BadRequest("No fields provided to update".into())
            }
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(promotion),
        message: Some("Promotion updated successfully"),
    })
}

/// Deactivate a promotion.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Promotions"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Promotion ID")),
    responses(
        (status = 200, description = "Promotion deactivated", body = StdResponse<PromotionEntity, String>)
    )
)]
async fn delete_promotion(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let promotion = diesel::update(promotions::table.find(id))
        .set(promotions::is_active.eq(false))
        .returning(PromotionEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(promotion),
        message: Some("Promotion deactivated successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct SetPromotionProductsReq {
    product_ids: Vec<i32>,
}

/// Replace the set of products a promotion applies to.
#[utoipa::path(
    put,
    path = "/{id}/products",
    tags = ["Promotions"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Promotion ID")),
    request_body = SetPromotionProductsReq,
    responses(
        (status = 200, description = "Scope replaced", body = StdResponse<Vec<PromotionProductEntity>, String>)
    )
)]
async fn set_promotion_products(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(mut body): Json<SetPromotionProductsReq>,
) -> Result<impl IntoResponse, AppError> {
    body.product_ids.sort_unstable();
    body.product_ids.dedup();

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let scope = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let promotion_count: i64 = promotions::table
                    .find(id)
                    .count()
                    .get_result(conn)
                    .await
                    .context("Failed to check promotion")?;
                if promotion_count == 0 {
                    return Err(AppError::NotFound);
                }

                let known_products: i64 = products::table
                    .filter(products::id.eq_any(&body.product_ids))
                    .count()
                    .get_result(conn)
                    .await
                    .context("Failed to check products")?;
                if known_products != body.product_ids.len() as i64 {
                    return Err(AppError::BadRequest(
                        "Scope contains unknown products".into(),
                    ));
                }

                diesel::delete(
                    promotion_products::table.filter(promotion_products::promotion_id.eq(id)),
                )
                .execute(conn)
                .await
                .context("Failed to clear product scope")?;

                let rows: Vec<PromotionProductEntity> = body
                    .product_ids
                    .iter()
                    .map(|&product_id| PromotionProductEntity {
                        promotion_id: id,
                        product_id,
                    })
                    .collect();

                let scope = diesel::insert_into(promotion_products::table)
                    .values(rows)
                    .on_conflict_do_nothing()
                    .returning(PromotionProductEntity::as_returning())
                    .get_results(conn)
                    .await
                    .context("Failed to insert product scope")?;

                Ok::<Vec<PromotionProductEntity>, AppError>(scope)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(scope),
        message: Some("Promotion product scope replaced successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct SetPromotionCategoriesReq {
    category_ids: Vec<i32>,
}

/// Replace the set of categories a promotion applies to.
#[utoipa::path(
    put,
    path = "/{id}/categories",
    tags = ["Promotions"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Promotion ID")),
    request_body = SetPromotionCategoriesReq,
    responses(
        (status = 200, description = "Scope replaced", body = StdResponse<Vec<PromotionCategoryEntity>, String>)
    )
)]
async fn set_promotion_categories(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(mut body): Json<SetPromotionCategoriesReq>,
) -> Result<impl IntoResponse, AppError> {
    body.category_ids.sort_unstable();
    body.category_ids.dedup();

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let scope = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let promotion_count: i64 = promotions::table
                    .find(id)
                    .count()
                    .get_result(conn)
                    .await
                    .context("Failed to check promotion")?;
                if promotion_count == 0 {
                    return Err(AppError::NotFound);
                }

                let known_categories: i64 = categories::table
                    .filter(categories::id.eq_any(&body.category_ids))
                    .count()
                    .get_result(conn)
                    .await
                    .context("Failed to check categories")?;
                if known_categories != body.category_ids.len() as i64 {
                    return Err(AppError::BadRequest(
                        "Scope contains unknown categories".into(),
                    ));
                }

                diesel::delete(
                    promotion_categories::table.filter(promotion_categories::promotion_id.eq(id)),
                )
                .execute(conn)
                .await
                .context("Failed to clear category scope")?;

                let rows: Vec<PromotionCategoryEntity> = body
                    .category_ids
                    .iter()
                    .map(|&category_id| PromotionCategoryEntity {
                        promotion_id: id,
                        category_id,
                    })
                    .collect();

                let scope = diesel::insert_into(promotion_categories::table)
                    .values(rows)
                    .on_conflict_do_nothing()
                    .returning(PromotionCategoryEntity::as_returning())
                    .get_results(conn)
                    .await
                    .context("Failed to insert category scope")?;

                Ok::<Vec<PromotionCategoryEntity>, AppError>(scope)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(scope),
        message: Some("Promotion category scope replaced successfully"),
    })
}
