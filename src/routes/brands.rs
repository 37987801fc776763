use anyhow::Context;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper, result::DatabaseErrorKind};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use utoipa::IntoParams;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        aliases::DieselError,
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware,
    },
    models::catalog::{BrandEntity, CreateBrandEntity, UpdateBrandChangeset},
    schema::{brands, manufacturers},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let public = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_brands))
        .routes(utoipa_axum::routes!(get_brand));

    let staff = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_brand))
        .routes(utoipa_axum::routes!(update_brand))
        .routes(utoipa_axum::routes!(delete_brand))
        .route_layer(axum::middleware::from_fn(middleware::staff_authorization));

    OpenApiRouter::new().nest("/brands", public.merge(staff))
}

#[derive(Deserialize, IntoParams)]
struct ListBrandsQuery {
    include_inactive: Option<bool>,
    manufacturer_id: Option<i32>,
}

/// List brands, optionally narrowed to one manufacturer.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Brands"],
    params(ListBrandsQuery),
    responses(
        (status = 200, description = "List brands", body = StdResponse<Vec<BrandEntity>, String>)
    )
)]
async fn get_brands(
    Query(query): Query<ListBrandsQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut listing = brands::table.order_by(brands::name.asc()).into_boxed();
    if !query.include_inactive.unwrap_or(false) {
        listing = listing.filter(brands::is_active.eq(true));
    }
    if let Some(manufacturer_id) = query.manufacturer_id {
        listing = listing.filter(brands::manufacturer_id.eq(manufacturer_id));
    }

    let brands: Vec<BrandEntity> = listing
        .get_results(conn)
        .await
        .context("Failed to get brands")?;

    Ok(StdResponse {
        data: Some(brands),
        message: Some("Get brands successfully"),
    })
}

#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Brands"],
    params(("id" = i32, Path, description = "Brand ID")),
    responses(
        (status = 200, description = "Get brand", body = StdResponse<BrandEntity, String>)
    )
)]
async fn get_brand(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let brand: BrandEntity = brands::table
        .find(id)
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(brand),
        message: Some("Get brand successfully"),
    })
}

/// Create a brand under an existing manufacturer.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Brands"],
    security(("bearerAuth" = [])),
    request_body = CreateBrandEntity,
    responses(
        (status = 200, description = "Brand created", body = StdResponse<BrandEntity, String>),
        (status = 400, description = "Unknown manufacturer"),
        (status = 409, description = "Name already exists")
    )
)]
async fn create_brand(
    State(state): State<AppState>,
    Json(body): Json<CreateBrandEntity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let manufacturer_count: i64 = manufacturers::table
        .find(body.manufacturer_id)
        .filter(manufacturers::is_active.eq(true))
        .count()
        .get_result(conn)
        .await
        .context("Failed to check manufacturer")?;
    if manufacturer_count == 0 {
        return Err(AppError::BadRequest("Manufacturer does not exist".into()));
    }

    let brand = diesel::insert_into(brands::table)
        .values(body)
        .returning(BrandEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Conflict("Brand name already exists".into())
            }
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(brand),
        message: Some("Brand created successfully"),
    })
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Brands"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Brand ID")),
    request_body = UpdateBrandChangeset,
    responses(
        (status = 200, description = "Brand updated", body = StdResponse<BrandEntity, String>)
    )
)]
async fn update_brand(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdateBrandChangeset>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    if let Some(manufacturer_id) = body.manufacturer_id {
        let manufacturer_count: i64 = manufacturers::table
            .find(manufacturer_id)
            .filter(manufacturers::is_active.eq(true))
            .count()
            .get_result(conn)
            .await
            .context("Failed to check manufacturer")?;
        if manufacturer_count == 0 {
            return Err(AppError::BadRequest("Manufacturer does not exist".into()));
        }
    }

    let brand = diesel::update(brands::table.find(id))
        .set(body)
        .returning(BrandEntity::as_returning())
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
        data: Some(brand),
        message: Some("Brand updated successfully"),
    })
}

/// Deactivate a brand.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Brands"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Brand ID")),
    responses(
        (status = 200, description = "Brand deactivated", body = StdResponse<BrandEntity, String>)
    )
)]
async fn delete_brand(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let brand = diesel::update(brands::table.find(id))
        .set(brands::is_active.eq(false))
        .returning(BrandEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(brand),
        message: Some("Brand deactivated successfully"),
    })
}
