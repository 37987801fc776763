use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    core::{
        aliases::DieselError,
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware::{self, CustomerId, StaffId},
    },
    models::prescriptions::{
        CreatePrescriptionEntity, PRESCRIPTION_STATUS_APPROVED, PRESCRIPTION_STATUS_PENDING,
        PRESCRIPTION_STATUS_REJECTED, PrescriptionEntity,
    },
    schema::prescriptions,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let customer = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(submit_prescription))
        .routes(utoipa_axum::routes!(get_my_prescriptions))
        .route_layer(axum::middleware::from_fn(
            middleware::customers_authorization,
        ));

    let staff = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_prescriptions))
        .routes(utoipa_axum::routes!(review_prescription))
        .route_layer(axum::middleware::from_fn(middleware::staff_authorization));

    OpenApiRouter::new().nest("/prescriptions", customer.merge(staff))
}

#[derive(Deserialize, ToSchema)]
struct SubmitPrescriptionReq {
    image_url: String,
}

/// Submit a prescription document for pharmacist review.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Prescriptions"],
    security(("bearerAuth" = [])),
    request_body = SubmitPrescriptionReq,
    responses(
        (status = 200, description = "Prescription submitted", body = StdResponse<PrescriptionEntity, String>)
    )
)]
async fn submit_prescription(
    State(state): State<AppState>,
    Extension(CustomerId(customer_id)): Extension<CustomerId>,
    Json(body): Json<SubmitPrescriptionReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.image_url.trim().is_empty() {
        return Err(AppError::BadRequest("Image URL is required".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let prescription = diesel::insert_into(prescriptions::table)
        .values(CreatePrescriptionEntity {
            customer_id,
            image_url: body.image_url,
            status: PRESCRIPTION_STATUS_PENDING.into(),
        })
        .returning(PrescriptionEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to submit prescription")?;

    Ok(StdResponse {
        data: Some(prescription),
        message: Some("Prescription submitted successfully"),
    })
}

/// The authenticated customer's prescriptions, newest first.
#[utoipa::path(
    get,
    path = "/my-prescriptions",
    tags = ["Prescriptions"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List my prescriptions", body = StdResponse<Vec<PrescriptionEntity>, String>)
    )
)]
async fn get_my_prescriptions(
    State(state): State<AppState>,
    Extension(CustomerId(customer_id)): Extension<CustomerId>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let prescriptions: Vec<PrescriptionEntity> = prescriptions::table
        .filter(prescriptions::customer_id.eq(customer_id))
        .order_by(prescriptions::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get my prescriptions")?;

    Ok(StdResponse {
        data: Some(prescriptions),
        message: Some("Get my prescriptions successfully"),
    })
}

#[derive(Deserialize, IntoParams)]
struct ListPrescriptionsQuery {
    /// PENDING, APPROVED or REJECTED; omit for all.
    status: Option<String>,
}

/// Review queue for pharmacists.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Prescriptions"],
    security(("bearerAuth" = [])),
    params(ListPrescriptionsQuery),
    responses(
        (status = 200, description = "List prescriptions", body = StdResponse<Vec<PrescriptionEntity>, String>)
    )
)]
async fn get_prescriptions(
    Query(query): Query<ListPrescriptionsQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut listing = prescriptions::table
        .order_by(prescriptions::created_at.asc())
        .into_boxed();
    if let Some(status) = query.status {
        listing = listing.filter(prescriptions::status.eq(status));
    }

    let prescriptions: Vec<PrescriptionEntity> = listing
        .get_results(conn)
        .await
        .context("Failed to get prescriptions")?;

    Ok(StdResponse {
        data: Some(prescriptions),
        message: Some("Get prescriptions successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct ReviewPrescriptionReq {
    approve: bool,
}

/// Approve or reject a pending prescription, recording the reviewer.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Prescriptions"],
    security(("bearerAuth" = [])),
    params(("id" = Uuid, Path, description = "Prescription ID")),
    request_body = ReviewPrescriptionReq,
    responses(
        (status = 200, description = "Prescription reviewed", body = StdResponse<PrescriptionEntity, String>),
        (status = 409, description = "Prescription already reviewed")
    )
)]
async fn review_prescription(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(StaffId(staff_id)): Extension<StaffId>,
    Json(body): Json<ReviewPrescriptionReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let next_status = if body.approve {
        PRESCRIPTION_STATUS_APPROVED
    } else {
        PRESCRIPTION_STATUS_REJECTED
    };

    let prescription = diesel::update(
        prescriptions::table
            .find(id)
            .filter(prescriptions::status.eq(PRESCRIPTION_STATUS_PENDING)),
    )
    .set((
        prescriptions::status.eq(next_status),
        prescriptions::reviewed_by.eq(staff_id),
        prescriptions::reviewed_at.eq(diesel::dsl::now),
    ))
    .returning(PrescriptionEntity::as_returning())
    .get_result(conn)
    .await
    .map_err(|err| match err {
        DieselError::NotFound => {
            AppError::Conflict("Prescription not found or already reviewed".into())
        }
        _ => AppError::Other(err.into()),
    })?;

    Ok(StdResponse {
        data: Some(prescription),
        message: Some("Prescription reviewed successfully"),
    })
}
