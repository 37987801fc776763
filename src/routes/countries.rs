use anyhow::Context;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper, result::DatabaseErrorKind};
use diesel_async::RunQueryDsl;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        aliases::DieselError,
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware,
    },
    models::catalog::{CountryEntity, CreateCountryEntity},
    schema::countries,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let public = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_countries))
        .routes(utoipa_axum::routes!(get_country));

    let staff = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_country))
        .routes(utoipa_axum::routes!(delete_country))
        .route_layer(axum::middleware::from_fn(middleware::staff_authorization));

    OpenApiRouter::new().nest("/countries", public.merge(staff))
}

/// List all countries.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Countries"],
    responses(
        (status = 200, description = "List countries", body = StdResponse<Vec<CountryEntity>, String>)
    )
)]
async fn get_countries(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let countries: Vec<CountryEntity> = countries::table
        .order_by(countries::name.asc())
        .get_results(conn)
        .await
        .context("Failed to get countries")?;

    Ok(StdResponse {
        data: Some(countries),
        message: Some("Get countries successfully"),
    })
}

#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Countries"],
    params(("id" = i32, Path, description = "Country ID")),
    responses(
        (status = 200, description = "Get country", body = StdResponse<CountryEntity, String>)
    )
)]
async fn get_country(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let country: CountryEntity =
        countries::table
            .find(id)
            .get_result(conn)
            .await
            .map_err(|err| match err {
                DieselError::NotFound => AppError::NotFound,
                _ => AppError::Other(err.into()),
            })?;

    Ok(StdResponse {
        data: Some(country),
        message: Some("Get country successfully"),
    })
}

/// Create a country.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Countries"],
    security(("bearerAuth" = [])),
    request_body = CreateCountryEntity,
    responses(
        (status = 200, description = "Country created", body = StdResponse<CountryEntity, String>),
        (status = 409, description = "Name or ISO code already exists")
    )
)]
async fn create_country(
    State(state): State<AppState>,
    Json(body): Json<CreateCountryEntity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let country = diesel::insert_into(countries::table)
        .values(body)
        .returning(CountryEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Conflict("Country name or ISO code already exists".into())
            }
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(country),
        message: Some("Country created successfully"),
    })
}

/// Delete a country. Countries referenced by manufacturers cannot be removed.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Countries"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Country ID")),
    responses(
        (status = 200, description = "Country deleted", body = StdResponse<CountryEntity, String>),
        (status = 409, description = "Country is referenced by manufacturers")
    )
)]
async fn delete_country(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let country = diesel::delete(countries::table.find(id))
        .returning(CountryEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                AppError::Conflict("Country is referenced by manufacturers".into())
            }
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(country),
        message: Some("Country deleted successfully"),
    })
}
