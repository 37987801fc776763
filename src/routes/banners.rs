use anyhow::Context;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        aliases::DieselError,
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware,
    },
    models::catalog::{BannerEntity, CreateBannerEntity, UpdateBannerChangeset},
    schema::banners,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let public = OpenApiRouter::new().routes(utoipa_axum::routes!(get_banners));

    let staff = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_all_banners))
        .routes(utoipa_axum::routes!(create_banner))
        .routes(utoipa_axum::routes!(update_banner))
        .routes(utoipa_axum::routes!(delete_banner))
        .route_layer(axum::middleware::from_fn(middleware::staff_authorization));

    OpenApiRouter::new().nest("/banners", public.merge(staff))
}

/// Banners currently on display, ordered by position.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Banners"],
    responses(
        (status = 200, description = "Visible banners", body = StdResponse<Vec<BannerEntity>, String>)
    )
)]
async fn get_banners(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let banners: Vec<BannerEntity> = banners::table
        .filter(banners::is_active.eq(true))
        .order_by(banners::position.asc())
        .get_results(conn)
        .await
        .context("Failed to get banners")?;

    let now = Utc::now();
    let visible: Vec<BannerEntity> = banners
        .into_iter()
        .filter(|banner| banner.is_visible_at(now))
        .collect();

    Ok(StdResponse {
        data: Some(visible),
        message: Some("Get banners successfully"),
    })
}

/// Full banner listing for back-office management.
#[utoipa::path(
    get,
    path = "/all",
    tags = ["Banners"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "All banners", body = StdResponse<Vec<BannerEntity>, String>)
    )
)]
async fn get_all_banners(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let banners: Vec<BannerEntity> = banners::table
        .order_by(banners::position.asc())
        .get_results(conn)
        .await
        .context("Failed to get banners")?;

    Ok(StdResponse {
        data: Some(banners),
        message: Some("Get banners successfully"),
    })
}

#[utoipa::path(
    post,
    path = "/",
    tags = ["Banners"],
    security(("bearerAuth" = [])),
    request_body = CreateBannerEntity,
    responses(
        (status = 200, description = "Banner created", body = StdResponse<BannerEntity, String>)
    )
)]
async fn create_banner(
    State(state): State<AppState>,
    Json(body): Json<CreateBannerEntity>,
) -> Result<impl IntoResponse, AppError> {
    if let (Some(starts), Some(ends)) = (body.starts_at, body.ends_at)
        && ends <= starts
    {
        return Err(AppError::BadRequest(
            "Banner window must end after it starts".into(),
        ));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let banner = diesel::insert_into(banners::table)
        .values(body)
        .returning(BannerEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create banner")?;

    Ok(StdResponse {
        data: Some(banner),
        message: Some("Banner created successfully"),
    })
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Banners"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Banner ID")),
    request_body = UpdateBannerChangeset,
    responses(
        (status = 200, description = "Banner updated", body = StdResponse<BannerEntity, String>)
    )
)]
async fn update_banner(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdateBannerChangeset>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let banner = diesel::update(banners::table.find(id))
        .set(body)
        .returning(BannerEntity::as_returning())
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
        data: Some(banner),
        message: Some("Banner updated successfully"),
    })
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Banners"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Banner ID")),
    responses(
        (status = 200, description = "Banner deactivated", body = StdResponse<BannerEntity, String>)
    )
)]
async fn delete_banner(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let banner = diesel::update(banners::table.find(id))
        .set(banners::is_active.eq(false))
        .returning(BannerEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(banner),
        message: Some("Banner deactivated successfully"),
    })
}
