use anyhow::Context;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use diesel::{
    ExpressionMethods, PgTextExpressionMethods, QueryDsl, SelectableHelper,
    result::DatabaseErrorKind,
};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        aliases::DieselError,
        app_error::{AppError, StdResponse},
        app_state::AppState,
        db::PooledConn,
        middleware,
    },
    models::catalog::{CreateProductEntity, ProductEntity, UpdateProductChangeset},
    schema::{branch_inventory, branches, brands, categories, products, reviews},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let public = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_products))
        .routes(utoipa_axum::routes!(get_product))
        .routes(utoipa_axum::routes!(get_product_availability));

    let staff = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_product))
        .routes(utoipa_axum::routes!(update_product))
        .routes(utoipa_axum::routes!(delete_product))
        .route_layer(axum::middleware::from_fn(middleware::staff_authorization));

    OpenApiRouter::new().nest("/products", public.merge(staff))
}

#[derive(Deserialize, IntoParams)]
struct ListProductsQuery {
    category_id: Option<i32>,
    brand_id: Option<i32>,
    /// Case-insensitive substring match on the product name.
    search: Option<String>,
    requires_prescription: Option<bool>,
    include_inactive: Option<bool>,
}

/// Browse the catalog with optional filters.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Products"],
    params(ListProductsQuery),
    responses(
        (status = 200, description = "List products", body = StdResponse<Vec<ProductEntity>, String>)
    )
)]
async fn get_products(
    Query(query): Query<ListProductsQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut listing = products::table.order_by(products::name.asc()).into_boxed();
    if !query.include_inactive.unwrap_or(false) {
        listing = listing.filter(products::is_active.eq(true));
    }
    if let Some(category_id) = query.category_id {
        listing = listing.filter(products::category_id.eq(category_id));
    }
    if let Some(brand_id) = query.brand_id {
        listing = listing.filter(products::brand_id.eq(brand_id));
    }
    if let Some(requires_prescription) = query.requires_prescription {
        listing = listing.filter(products::requires_prescription.eq(requires_prescription));
    }
    if let Some(search) = &query.search {
        listing = listing.filter(products::name.ilike(format!("%{search}%")));
    }

    let products: Vec<ProductEntity> = listing
        .get_results(conn)
        .await
        .context("Failed to get products")?;

    Ok(StdResponse {
        data: Some(products),
        message: Some("Get products successfully"),
    })
}

#[derive(Serialize, ToSchema)]
struct ProductDetailRes {
    product: ProductEntity,
    average_rating: Option<f32>,
    review_count: i64,
}

/// Fetch one product with its review summary.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Products"],
    params(("id" = i32, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Get product", body = StdResponse<ProductDetailRes, String>)
    )
)]
async fn get_product(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product: ProductEntity =
        products::table
            .find(id)
            .get_result(conn)
            .await
            .map_err(|err| match err {
                DieselError::NotFound => AppError::NotFound,
                _ => AppError::Other(err.into()),
            })?;

    let (rating_sum, review_count): (Option<i64>, i64) = reviews::table
        .filter(reviews::product_id.eq(id))
        .select((diesel::dsl::sum(reviews::rating), diesel::dsl::count_star()))
        .first(conn)
        .await
        .context("Failed to get review summary")?;

    let average_rating = rating_sum
        .filter(|_| review_count > 0)
        .map(|sum| sum as f32 / review_count as f32);

    Ok(StdResponse {
        data: Some(ProductDetailRes {
            product,
            average_rating,
            review_count,
        }),
        message: Some("Get product successfully"),
    })
}

#[derive(Serialize, ToSchema)]
struct ProductAvailabilityRes {
    branch_id: i32,
    branch_name: String,
    quantity: i32,
}

/// Stock on hand for one product across all active branches.
#[utoipa::path(
    get,
    path = "/{id}/availability",
    tags = ["Products"],
    params(("id" = i32, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Per-branch availability", body = StdResponse<Vec<ProductAvailabilityRes>, String>)
    )
)]
async fn get_product_availability(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product_count: i64 = products::table
        .find(id)
        .count()
        .get_result(conn)
        .await
        .context("Failed to check product")?;
    if product_count == 0 {
        return Err(AppError::NotFound);
    }

    let rows: Vec<(i32, String, i32)> = branch_inventory::table
        .inner_join(branches::table)
        .filter(branch_inventory::product_id.eq(id))
        .filter(branches::is_active.eq(true))
        .select((
            branch_inventory::branch_id,
            branches::name,
            branch_inventory::quantity,
        ))
        .get_results(conn)
        .await
        .context("Failed to get availability")?;

    let availability = rows
        .into_iter()
        .map(|(branch_id, branch_name, quantity)| ProductAvailabilityRes {
            branch_id,
            branch_name,
            quantity,
        })
        .collect::<Vec<_>>();

    Ok(StdResponse {
        data: Some(availability),
        message: Some("Get availability successfully"),
    })
}

async fn ensure_category_and_brand(
    conn: &mut PooledConn<'_>,
    category_id: Option<i32>,
    brand_id: Option<i32>,
) -> Result<(), AppError> {
    if let Some(category_id) = category_id {
        let count: i64 = categories::table
            .find(category_id)
            .filter(categories::is_active.eq(true))
            .count()
            .get_result(conn)
            .await
            .context("Failed to check category")?;
        if count == 0 {
            return Err(AppError::BadRequest("Category does not exist".into()));
        }
    }
    if let Some(brand_id) = brand_id {
        let count: i64 = brands::table
            .find(brand_id)
            .filter(brands::is_active.eq(true))
            .count()
            .get_result(conn)
            .await
            .context("Failed to check brand")?;
        if count == 0 {
            return Err(AppError::BadRequest("Brand does not exist".into()));
        }
    }
    Ok(())
}

/// Add a product to the catalog.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Products"],
    security(("bearerAuth" = [])),
    request_body = CreateProductEntity,
    responses(
        (status = 200, description = "Product created", body = StdResponse<ProductEntity, String>),
        (status = 400, description = "Unknown category or brand"),
        (status = 409, description = "SKU already exists")
    )
)]
async fn create_product(
    State(state): State<AppState>,
    Json(body): Json<CreateProductEntity>,
) -> Result<impl IntoResponse, AppError> {
    if body.unit_price < 0.0 {
        return Err(AppError::BadRequest("Unit price cannot be negative".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    ensure_category_and_brand(conn, Some(body.category_id), Some(body.brand_id)).await?;

    let product = diesel::insert_into(products::table)
        .values(body)
        .returning(ProductEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Conflict("SKU already exists".into())
            }
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(product),
        message: Some("Product created successfully"),
    })
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Products"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Product ID")),
    request_body = UpdateProductChangeset,
    responses(
        (status = 200, description = "Product updated", body = StdResponse<ProductEntity, String>)
    )
)]
async fn update_product(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdateProductChangeset>,
) -> Result<impl IntoResponse, AppError> {
    if body.unit_price.is_some_and(|price| price < 0.0) {
        return Err(AppError::BadRequest("Unit price cannot be negative".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    ensure_category_and_brand(conn, body.category_id, body.brand_id).await?;

    let product = diesel::update(products::table.find(id))
        .set(body)
        .returning(ProductEntity::as_returning())
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
        data: Some(product),
        message: Some("Product updated successfully"),
    })
}

/// Retire a product from the catalog. Existing orders keep their snapshots.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Products"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product deactivated", body = StdResponse<ProductEntity, String>)
    )
)]
async fn delete_product(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product = diesel::update(products::table.find(id))
        .set(products::is_active.eq(false))
        .returning(ProductEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(product),
        message: Some("Product deactivated successfully"),
    })
}
