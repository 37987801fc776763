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
    models::catalog::{CategoryEntity, CreateCategoryEntity, UpdateCategoryChangeset},
    schema::categories,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let public = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_categories))
        .routes(utoipa_axum::routes!(get_category));

    let staff = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_category))
        .routes(utoipa_axum::routes!(update_category))
        .routes(utoipa_axum::routes!(delete_category))
        .route_layer(axum::middleware::from_fn(middleware::staff_authorization));

    OpenApiRouter::new().nest("/categories", public.merge(staff))
}

#[derive(Deserialize, IntoParams)]
struct ListCategoriesQuery {
    include_inactive: Option<bool>,
    /// Restrict to direct children of this category; omit for the full list.
    parent_id: Option<i32>,
}

/// List categories as a flat list; clients assemble the tree by `parent_id`.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Categories"],
    params(ListCategoriesQuery),
    responses(
        (status = 200, description = "List categories", body = StdResponse<Vec<CategoryEntity>, String>)
    )
)]
async fn get_categories(
    Query(query): Query<ListCategoriesQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut listing = categories::table
        .order_by(categories::name.asc())
        .into_boxed();
    if !query.include_inactive.unwrap_or(false) {
        listing = listing.filter(categories::is_active.eq(true));
    }
    if let Some(parent_id) = query.parent_id {
        listing = listing.filter(categories::parent_id.eq(parent_id));
    }

    let categories: Vec<CategoryEntity> = listing
        .get_results(conn)
        .await
        .context("Failed to get categories")?;

    Ok(StdResponse {
        data: Some(categories),
        message: Some("Get categories successfully"),
    })
}

#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Categories"],
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Get category", body = StdResponse<CategoryEntity, String>)
    )
)]
async fn get_category(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category: CategoryEntity =
        categories::table
            .find(id)
            .get_result(conn)
            .await
            .map_err(|err| match err {
                DieselError::NotFound => AppError::NotFound,
                _ => AppError::Other(err.into()),
            })?;

    Ok(StdResponse {
        data: Some(category),
        message: Some("Get category successfully"),
    })
}

async fn ensure_parent_exists(
    conn: &mut crate::core::db::PooledConn<'_>,
    parent_id: i32,
) -> Result<(), AppError> {
    let parent_count: i64 = categories::table
        .find(parent_id)
        .filter(categories::is_active.eq(true))
        .count()
        .get_result(conn)
        .await
        .context("Failed to check parent category")?;
    if parent_count == 0 {
        return Err(AppError::BadRequest("Parent category does not exist".into()));
    }
    Ok(())
}

/// Create a category, optionally under an existing parent.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Categories"],
    security(("bearerAuth" = [])),
    request_body = CreateCategoryEntity,
    responses(
        (status = 200, description = "Category created", body = StdResponse<CategoryEntity, String>),
        (status = 400, description = "Unknown parent category"),
        (status = 409, description = "Name already exists under this parent")
    )
)]
async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<CreateCategoryEntity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    if let Some(parent_id) = body.parent_id {
        ensure_parent_exists(conn, parent_id).await?;
    }

    let category = diesel::insert_into(categories::table)
        .values(body)
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Conflict("Category name already exists under this parent".into())
            }
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(category),
        message: Some("Category created successfully"),
    })
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Categories"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Category ID")),
    request_body = UpdateCategoryChangeset,
    responses(
        (status = 200, description = "Category updated", body = StdResponse<CategoryEntity, String>)
    )
)]
async fn update_category(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdateCategoryChangeset>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    if let Some(parent_id) = body.parent_id {
        if parent_id == id {
            return Err(AppError::BadRequest(
                "Category cannot be its own parent".into(),
            ));
        }
        ensure_parent_exists(conn, parent_id).await?;
    }

    let category = diesel::update(categories::table.find(id))
        .set(body)
        .returning(CategoryEntity::as_returning())
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
        data: Some(category),
        message: Some("Category updated successfully"),
    })
}

/// Deactivate a category.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Categories"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category deactivated", body = StdResponse<CategoryEntity, String>)
    )
)]
async fn delete_category(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category = diesel::update(categories::table.find(id))
        .set(categories::is_active.eq(false))
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(category),
        message: Some("Category deactivated successfully"),
    })
}
