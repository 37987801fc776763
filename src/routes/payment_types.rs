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
    models::orders::{CreatePaymentTypeEntity, PaymentTypeEntity},
    schema::payment_types,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let public = OpenApiRouter::new().routes(utoipa_axum::routes!(get_payment_types));

    let staff = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_payment_type))
        .routes(utoipa_axum::routes!(delete_payment_type))
        .route_layer(axum::middleware::from_fn(middleware::staff_authorization));

    OpenApiRouter::new().nest("/payment-types", public.merge(staff))
}

/// Payment types accepted at checkout.
#[utoipa::path(
    get,
    path = "/",
    tags = ["PaymentTypes"],
    responses(
        (status = 200, description = "List payment types", body = StdResponse<Vec<PaymentTypeEntity>, String>)
    )
)]
async fn get_payment_types(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let payment_types: Vec<PaymentTypeEntity> = payment_types::table
        .filter(payment_types::is_active.eq(true))
        .order_by(payment_types::name.asc())
        .get_results(conn)
        .await
        .context("Failed to get payment types")?;

    Ok(StdResponse {
        data: Some(payment_types),
        message: Some("Get payment types successfully"),
    })
}

#[utoipa::path(
    post,
    path = "/",
    tags = ["PaymentTypes"],
    security(("bearerAuth" = [])),
    request_body = CreatePaymentTypeEntity,
    responses(
        (status = 200, description = "Payment type created", body = StdResponse<PaymentTypeEntity, String>),
        (status = 409, description = "Name already exists")
    )
)]
async fn create_payment_type(
    State(state): State<AppState>,
    Json(body): Json<CreatePaymentTypeEntity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let payment_type = diesel::insert_into(payment_types::table)
        .values(body)
        .returning(PaymentTypeEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Conflict("Payment type name already exists".into())
            }
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(payment_type),
        message: Some("Payment type created successfully"),
    })
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["PaymentTypes"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Payment type ID")),
    responses(
        (status = 200, description = "Payment type deactivated", body = StdResponse<PaymentTypeEntity, String>)
    )
)]
async fn delete_payment_type(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let payment_type = diesel::update(payment_types::table.find(id))
        .set(payment_types::is_active.eq(false))
        .returning(PaymentTypeEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(payment_type),
        message: Some("Payment type deactivated successfully"),
    })
}
