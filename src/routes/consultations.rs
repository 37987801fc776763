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

use crate::{
    core::{
        aliases::DieselError,
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware::{self, CustomerId, StaffId},
    },
    models::consultations::{
        CONSULTATION_STATUS_ASSIGNED, CONSULTATION_STATUS_CLOSED, CONSULTATION_STATUS_OPEN,
        ConsultationRequestEntity, CreateConsultationRequestEntity, MessageEntity,
    },
    schema::{consultation_requests, messages},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let customer = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_consultation))
        .routes(utoipa_axum::routes!(get_my_consultations))
        .routes(utoipa_axum::routes!(get_consultation_messages))
        .route_layer(axum::middleware::from_fn(
            middleware::customers_authorization,
        ));

    let staff = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_consultations))
        .routes(utoipa_axum::routes!(claim_consultation))
        .routes(utoipa_axum::routes!(close_consultation))
        .route_layer(axum::middleware::from_fn(middleware::staff_authorization));

    OpenApiRouter::new().nest("/consultations", customer.merge(staff))
}

#[derive(Deserialize, ToSchema)]
struct CreateConsultationReq {
    topic: String,
}

/// Open a consultation request with the pharmacy team.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Consultations"],
    security(("bearerAuth" = [])),
    request_body = CreateConsultationReq,
    responses(
        (status = 200, description = "Consultation opened", body = StdResponse<ConsultationRequestEntity, String>)
    )
)]
async fn create_consultation(
    State(state): State<AppState>,
    Extension(CustomerId(customer_id)): Extension<CustomerId>,
    Json(body): Json<CreateConsultationReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.topic.trim().is_empty() {
        return Err(AppError::BadRequest("Topic is required".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let consultation = diesel::insert_into(consultation_requests::table)
        .values(CreateConsultationRequestEntity {
            customer_id,
            topic: body.topic,
            status: CONSULTATION_STATUS_OPEN.into(),
        })
        .returning(ConsultationRequestEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to open consultation")?;

    Ok(StdResponse {
        data: Some(consultation),
        message: Some("Consultation opened successfully"),
    })
}

/// The authenticated customer's consultations, newest first.
#[utoipa::path(
    get,
    path = "/my-consultations",
    tags = ["Consultations"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List my consultations", body = StdResponse<Vec<ConsultationRequestEntity>, String>)
    )
)]
async fn get_my_consultations(
    State(state): State<AppState>,
    Extension(CustomerId(customer_id)): Extension<CustomerId>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let consultations: Vec<ConsultationRequestEntity> = consultation_requests::table
        .filter(consultation_requests::customer_id.eq(customer_id))
        .order_by(consultation_requests::updated_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get my consultations")?;

    Ok(StdResponse {
        data: Some(consultations),
        message: Some("Get my consultations successfully"),
    })
}

/// Message history for participants of a consultation.
#[utoipa::path(
    get,
    path = "/{id}/messages",
    tags = ["Consultations"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Consultation ID")),
    responses(
        (status = 200, description = "Message history", body = StdResponse<Vec<MessageEntity>, String>),
        (status = 403, description = "Not a participant")
    )
)]
async fn get_consultation_messages(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(CustomerId(user_id)): Extension<CustomerId>,
    staff: Option<Extension<StaffId>>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let consultation: ConsultationRequestEntity = consultation_requests::table
        .find(id)
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    let staff_id = staff.map(|Extension(StaffId(staff_id))| staff_id);
    let is_customer = consultation.customer_id == user_id;
    let is_assigned_staff = staff_id.is_some() && staff_id == consultation.staff_id;
    if !is_customer && !is_assigned_staff {
        return Err(AppError::ForbiddenResource(
            "Not a participant of this consultation".into(),
        ));
    }

    let history: Vec<MessageEntity> = messages::table
        .filter(messages::consultation_id.eq(id))
        .order_by(messages::sent_at.asc())
        .get_results(conn)
        .await
        .context("Failed to get messages")?;

    Ok(StdResponse {
        data: Some(history),
        message: Some("Get messages successfully"),
    })
}

#[derive(Deserialize, IntoParams)]
struct ListConsultationsQuery {
    /// OPEN, ASSIGNED or CLOSED; omit for all.
    status: Option<String>,
}

/// Consultation queue for staff.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Consultations"],
    security(("bearerAuth" = [])),
    params(ListConsultationsQuery),
    responses(
        (status = 200, description = "List consultations", body = StdResponse<Vec<ConsultationRequestEntity>, String>)
    )
)]
async fn get_consultations(
    Query(query): Query<ListConsultationsQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut listing = consultation_requests::table
        .order_by(consultation_requests::created_at.asc())
        .into_boxed();
    if let Some(status) = query.status {
        listing = listing.filter(consultation_requests::status.eq(status));
    }

    let consultations: Vec<ConsultationRequestEntity> = listing
        .get_results(conn)
        .await
        .context("Failed to get consultations")?;

    Ok(StdResponse {
        data: Some(consultations),
        message: Some("Get consultations successfully"),
    })
}

/// Claim an open consultation for the authenticated staff member.
#[utoipa::path(
    post,
    path = "/{id}/claim",
    tags = ["Consultations"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Consultation ID")),
    responses(
        (status = 200, description = "Consultation claimed", body = StdResponse<ConsultationRequestEntity, String>),
        (status = 409, description = "Consultation is not open")
    )
)]
async fn claim_consultation(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(StaffId(staff_id)): Extension<StaffId>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let consultation = diesel::update(
        consultation_requests::table
            .find(id)
            .filter(consultation_requests::status.eq(CONSULTATION_STATUS_OPEN)),
    )
    .set((
        consultation_requests::staff_id.eq(staff_id),
        consultation_requests::status.eq(CONSULTATION_STATUS_ASSIGNED),
    ))
    .returning(ConsultationRequestEntity::as_returning())
    .get_result(conn)
    .await
    .map_err(|err| match err {
        DieselError::NotFound => AppError::Conflict("Consultation is not open".into()),
        _ => AppError::Other(err.into()),
    })?;

    Ok(StdResponse {
        data: Some(consultation),
        message: Some("Consultation claimed successfully"),
    })
}

/// Close a consultation. Only the assigned staff member may close it.
#[utoipa::path(
    post,
    path = "/{id}/close",
    tags = ["Consultations"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Consultation ID")),
    responses(
        (status = 200, description = "Consultation closed", body = StdResponse<ConsultationRequestEntity, String>),
        (status = 409, description = "Consultation is not assigned to you")
    )
)]
async fn close_consultation(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(StaffId(staff_id)): Extension<StaffId>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let consultation = diesel::update(
        consultation_requests::table
            .find(id)
            .filter(consultation_requests::staff_id.eq(staff_id))
            .filter(consultation_requests::status.eq(CONSULTATION_STATUS_ASSIGNED)),
    )
    .set(consultation_requests::status.eq(CONSULTATION_STATUS_CLOSED))
    .returning(ConsultationRequestEntity::as_returning())
    .get_result(conn)
    .await
    .map_err(|err| match err {
        DieselError::NotFound => {
            AppError::Conflict("Consultation is not assigned to you".into())
        }
        _ => AppError::Other(err.into()),
    })?;

    Ok(StdResponse {
        data: Some(consultation),
        message: Some("Consultation closed successfully"),
    })
}
