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
    models::orders::{
        CreateShippingMethodEntity, ShippingMethodEntity, UpdateShippingMethodChangeset,
    },
    schema::shipping_methods,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let public = OpenApiRouter::new().routes(utoipa_axum::routes!(get_shipping_methods));

    let staff = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_shipping_method))
        .routes(utoipa_axum::routes!(update_shipping_method))
        .routes(utoipa_axum::routes!(delete_shipping_method))
        .route_layer(axum::middleware::from_fn(middleware::staff_authorization));

    OpenApiRouter::new().nest("/shipping-methods", public.merge(staff))
}

/// Shipping methods available at checkout.
#[utoipa::path(
    get,
    path = "/",
    tags = ["ShippingMethods"],
    responses(
        (status = 200, description = "List shipping methods", body = StdResponse<Vec<ShippingMethodEntity>, String>)
    )
)]
async fn get_shipping_methods(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let methods: Vec<ShippingMethodEntity> = shipping_methods::table
        .filter(shipping_methods::is_active.eq(true))
        .order_by(shipping_methods::fee.asc())
        .get_results(conn)
        .await
        .context("Failed to get shipping methods")?;

    Ok(StdResponse {
        data: Some(methods),
        message: Some("Get shipping methods successfully"),
    })
}

#[utoipa::path(
    post,
    path = "/",
    tags = ["ShippingMethods"],
    security(("bearerAuth" = [])),
    request_body = CreateShippingMethodEntity,
    responses(
        (status = 200, description = "Shipping method created", body = StdResponse<ShippingMethodEntity, String>),
        (status = 409, description = "Name already exists")
    )
)]
async fn create_shipping_method(
    State(state): State<AppState>,
    Json(body): Json<CreateShippingMethodEntity>,
) -> Result<impl IntoResponse, AppError> {
    if body.fee < 0.0 {
        return Err(AppError::BadRequest("Fee cannot be negative".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let method = diesel::insert_into(shipping_methods::table)
        .values(body)
        .returning(ShippingMethodEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Conflict("Shipping method name already exists".into())
            }
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(method),
        message: Some("Shipping method created successfully"),
    })
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["ShippingMethods"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Shipping method ID")),
    request_body = UpdateShippingMethodChangeset,
    responses(
        (status = 200, description = "Shipping method updated", body = StdResponse<ShippingMethodEntity, String>)
    )
)]
async fn update_shipping_method(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdateShippingMethodChangeset>,
) -> Result<impl IntoResponse, AppError> {
    if body.fee.is_some_and(|fee| fee < 0.0) {
        return Err(AppError::BadRequest("Fee cannot be negative".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let method = diesel::update(shipping_methods::table.find(id))
        .set(body)
        .returning(ShippingMethodEntity::as_returning())
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
        data: Some(method),
        message: Some("Shipping method updated successfully"),
    })
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["ShippingMethods"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Shipping method ID")),
    responses(
        (status = 200, description = "Shipping method deactivated", body = StdResponse<ShippingMethodEntity, String>)
    )
)]
async fn delete_shipping_method(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let method = diesel::update(shipping_methods::table.find(id))
        .set(shipping_methods::is_active.eq(false))
        .returning(ShippingMethodEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(method),
        message: Some("Shipping method deactivated successfully"),
    })
}
