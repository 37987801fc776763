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
    models::catalog::{CreateManufacturerEntity, ManufacturerEntity, UpdateManufacturerChangeset},
    schema::{countries, manufacturers},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let public = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_manufacturers))
        .routes(utoipa_axum::routes!(get_manufacturer));

    let staff = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_manufacturer))
        .routes(utoipa_axum::routes!(update_manufacturer))
        .routes(utoipa_axum::routes!(delete_manufacturer))
        .route_layer(axum::middleware::from_fn(middleware::staff_authorization));

    OpenApiRouter::new().nest("/manufacturers", public.merge(staff))
}

#[derive(Deserialize, IntoParams)]
struct ListManufacturersQuery {
    /// Include deactivated manufacturers in the listing.
    include_inactive: Option<bool>,
}

/// List manufacturers, active ones by default.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Manufacturers"],
    params(ListManufacturersQuery),
    responses(
        (status = 200, description = "List manufacturers", body = StdResponse<Vec<ManufacturerEntity>, String>)
    )
)]
async fn get_manufacturers(
    Query(query): Query<ListManufacturersQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut listing = manufacturers::table
        .order_by(manufacturers::name.asc())
        .into_boxed();
    if !query.include_inactive.unwrap_or(false) {
        listing = listing.filter(manufacturers::is_active.eq(true));
    }

    let manufacturers: Vec<ManufacturerEntity> = listing
        .get_results(conn)
        .await
        .context("Failed to get manufacturers")?;

    Ok(StdResponse {
        data: Some(manufacturers),
        message: Some("Get manufacturers successfully"),
    })
}

#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Manufacturers"],
    params(("id" = i32, Path, description = "Manufacturer ID")),
    responses(
        (status = 200, description = "Get manufacturer", body = StdResponse<ManufacturerEntity, String>)
    )
)]
async fn get_manufacturer(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let manufacturer: ManufacturerEntity = manufacturers::table
        .find(id)
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(manufacturer),
        message: Some("Get manufacturer successfully"),
    })
}

/// Create a manufacturer. The referenced country must exist.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Manufacturers"],
    security(("bearerAuth" = [])),
    request_body = CreateManufacturerEntity,
    responses(
        (status = 200, description = "Manufacturer created", body = StdResponse<ManufacturerEntity, String>),
        (status = 400, description = "Unknown country"),
        (status = 409, description = "Name already exists")
    )
)]
async fn create_manufacturer(
    State(state): State<AppState>,
    Json(body): Json<CreateManufacturerEntity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let country_count: i64 = countries::table
        .find(body.country_id)
        .count()
        .get_result(conn)
        .await
        .context("Failed to check country")?;
    if country_count == 0 {
        return Err(AppError::BadRequest("Country does not exist".into()));
    }

    let manufacturer = diesel::insert_into(manufacturers::table)
        .values(body)
        .returning(ManufacturerEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Conflict("Manufacturer name already exists".into())
            }
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(manufacturer),
        message: Some("Manufacturer created successfully"),
    })
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Manufacturers"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Manufacturer ID")),
    request_body = UpdateManufacturerChangeset,
    responses(
        (status = 200, description = "Manufacturer updated", body = StdResponse<ManufacturerEntity, String>)
    )
)]
async fn update_manufacturer(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdateManufacturerChangeset>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    if let Some(country_id) = body.country_id {
        let country_count: i64 = countries::table
            .find(country_id)
            .count()
            .get_result(conn)
            .await
            .context("Failed to check country")?;
        if country_count == 0 {
            return Err(AppError::BadRequest("Country does not exist".into()));
        }
    }

    let manufacturer = diesel::update(manufacturers::table.find(id))
        .set(body)
        .returning(ManufacturerEntity::as_returning())
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
        data: Some(manufacturer),
        message: Some("Manufacturer updated successfully"),
    })
}

/// Deactivate a manufacturer.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Manufacturers"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Manufacturer ID")),
    responses(
        (status = 200, description = "Manufacturer deactivated", body = StdResponse<ManufacturerEntity, String>)
    )
)]
async fn delete_manufacturer(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let manufacturer = diesel::update(manufacturers::table.find(id))
        .set(manufacturers::is_active.eq(false))
        .returning(ManufacturerEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(manufacturer),
        message: Some("Manufacturer deactivated successfully"),
    })
}
