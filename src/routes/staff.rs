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
        db::PooledConn,
        middleware,
    },
    models::users::{CreateStaffEntity, StaffEntity, UpdateStaffChangeset},
    schema::{branches, staff, users},
};

/// Staff management is itself staff-only.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/staff",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_staff_members))
            .routes(utoipa_axum::routes!(get_staff_member))
            .routes(utoipa_axum::routes!(create_staff_member))
            .routes(utoipa_axum::routes!(update_staff_member))
            .routes(utoipa_axum::routes!(delete_staff_member))
            .route_layer(axum::middleware::from_fn(middleware::staff_authorization)),
    )
}

#[derive(Deserialize, IntoParams)]
struct ListStaffQuery {
    include_inactive: Option<bool>,
    branch_id: Option<i32>,
}

/// List staff members.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Staff"],
    security(("bearerAuth" = [])),
    params(ListStaffQuery),
    responses(
        (status = 200, description = "List staff", body = StdResponse<Vec<StaffEntity>, String>)
    )
)]
async fn get_staff_members(
    Query(query): Query<ListStaffQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut listing = staff::table.order_by(staff::id.asc()).into_boxed();
    if !query.include_inactive.unwrap_or(false) {
        listing = listing.filter(staff::is_active.eq(true));
    }
    if let Some(branch_id) = query.branch_id {
        listing = listing.filter(staff::branch_id.eq(branch_id));
    }

    let staff_members: Vec<StaffEntity> = listing
        .get_results(conn)
        .await
        .context("Failed to get staff")?;

    Ok(StdResponse {
        data: Some(staff_members),
        message: Some("Get staff successfully"),
    })
}

#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Staff"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Staff ID")),
    responses(
        (status = 200, description = "Get staff member", body = StdResponse<StaffEntity, String>)
    )
)]
async fn get_staff_member(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let staff_member: StaffEntity =
        staff::table
            .find(id)
            .get_result(conn)
            .await
            .map_err(|err| match err {
                DieselError::NotFound => AppError::NotFound,
                _ => AppError::Other(err.into()),
            })?;

    Ok(StdResponse {
        data: Some(staff_member),
        message: Some("Get staff member successfully"),
    })
}

async fn ensure_branch_exists_if_set(
    conn: &mut PooledConn<'_>,
    branch_id: Option<i32>,
) -> Result<(), AppError> {
    if let Some(branch_id) = branch_id {
        let branch_count: i64 = branches::table
            .find(branch_id)
            .filter(branches::is_active.eq(true))
            .count()
            .get_result(conn)
            .await
            .context("Failed to check branch")?;
        if branch_count == 0 {
            return Err(AppError::BadRequest("Branch does not exist".into()));
        }
    }
    Ok(())
}

/// Elevate an existing user account to staff, optionally pinned to a branch.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Staff"],
    security(("bearerAuth" = [])),
    request_body = CreateStaffEntity,
    responses(
        (status = 200, description = "Staff member created", body = StdResponse<StaffEntity, String>),
        (status = 400, description = "Unknown user or branch"),
        (status = 409, description = "User is already staff")
    )
)]
async fn create_staff_member(
    State(state): State<AppState>,
    Json(body): Json<CreateStaffEntity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let user_count: i64 = users::table
        .find(body.user_id)
        .filter(users::is_active.eq(true))
        .count()
        .get_result(conn)
        .await
        .context("Failed to check user")?;
    if user_count == 0 {
        return Err(AppError::BadRequest("User does not exist".into()));
    }

    ensure_branch_exists_if_set(conn, body.branch_id).await?;

    let staff_member = diesel::insert_into(staff::table)
        .values(body)
        .returning(StaffEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Conflict("User is already a staff member".into())
            }
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(staff_member),
        message: Some("Staff member created successfully"),
    })
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Staff"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Staff ID")),
    request_body = UpdateStaffChangeset,
    responses(
        (status = 200, description = "Staff member updated", body = StdResponse<StaffEntity, String>)
    )
)]
async fn update_staff_member(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdateStaffChangeset>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    ensure_branch_exists_if_set(conn, body.branch_id).await?;

    let staff_member = diesel::update(staff::table.find(id))
        .set(body)
        .returning(StaffEntity::as_returning())
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
        data: Some(staff_member),
        message: Some("Staff member updated successfully"),
    })
}

/// Deactivate a staff member. Their customer account stays active.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Staff"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Staff ID")),
    responses(
        (status = 200, description = "Staff member deactivated", body = StdResponse<StaffEntity, String>)
    )
)]
async fn delete_staff_member(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let staff_member = diesel::update(staff::table.find(id))
        .set(staff::is_active.eq(false))
        .returning(StaffEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(staff_member),
        message: Some("Staff member deactivated successfully"),
    })
}
