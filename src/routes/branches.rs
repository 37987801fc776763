use anyhow::Context;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper, result::DatabaseErrorKind};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        aliases::DieselError,
        app_error::{AppError, StdResponse},
        app_state::AppState,
        db::PooledConn,
        middleware,
    },
    models::branches::{
        BranchEntity, BranchInventoryEntity, CreateBranchEntity, UpdateBranchChangeset,
        UpsertBranchInventoryEntity,
    },
    schema::{branch_inventory, branches, products},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let public = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_branches))
        .routes(utoipa_axum::routes!(get_branch));

    let staff = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_branch))
        .routes(utoipa_axum::routes!(update_branch))
        .routes(utoipa_axum::routes!(delete_branch))
        .routes(utoipa_axum::routes!(get_branch_inventory))
        .routes(utoipa_axum::routes!(set_branch_inventory))
        .routes(utoipa_axum::routes!(adjust_branch_inventory))
        .route_layer(axum::middleware::from_fn(middleware::staff_authorization));

    OpenApiRouter::new().nest("/branches", public.merge(staff))
}

#[derive(Deserialize, IntoParams)]
struct ListBranchesQuery {
    include_inactive: Option<bool>,
}

/// List pharmacy branches.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Branches"],
    params(ListBranchesQuery),
    responses(
        (status = 200, description = "List branches", body = StdResponse<Vec<BranchEntity>, String>)
    )
)]
async fn get_branches(
    Query(query): Query<ListBranchesQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut listing = branches::table.order_by(branches::name.asc()).into_boxed();
    if !query.include_inactive.unwrap_or(false) {
        listing = listing.filter(branches::is_active.eq(true));
    }

    let branches: Vec<BranchEntity> = listing
        .get_results(conn)
        .await
        .context("Failed to get branches")?;

    Ok(StdResponse {
        data: Some(branches),
        message: Some("Get branches successfully"),
    })
}

#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Branches"],
    params(("id" = i32, Path, description = "Branch ID")),
    responses(
        (status = 200, description = "Get branch", body = StdResponse<BranchEntity, String>)
    )
)]
async fn get_branch(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let branch: BranchEntity =
        branches::table
            .find(id)
            .get_result(conn)
            .await
            .map_err(|err| match err {
                DieselError::NotFound => AppError::NotFound,
                _ => AppError::Other(err.into()),
            })?;

    Ok(StdResponse {
        data: Some(branch),
        message: Some("Get branch successfully"),
    })
}

#[utoipa::path(
    post,
    path = "/",
    tags = ["Branches"],
    security(("bearerAuth" = [])),
    request_body = CreateBranchEntity,
    responses(
        (status = 200, description = "Branch created", body = StdResponse<BranchEntity, String>),
        (status = 409, description = "Name already exists")
    )
)]
async fn create_branch(
    State(state): State<AppState>,
    Json(body): Json<CreateBranchEntity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let branch = diesel::insert_into(branches::table)
        .values(body)
        .returning(BranchEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Conflict("Branch name already exists".into())
            }
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(branch),
        message: Some("Branch created successfully"),
    })
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Branches"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Branch ID")),
    request_body = UpdateBranchChangeset,
    responses(
        (status = 200, description = "Branch updated", body = StdResponse<BranchEntity, String>)
    )
)]
async fn update_branch(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdateBranchChangeset>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let branch = diesel::update(branches::table.find(id))
        .set(body)
        .returning(BranchEntity::as_returning())
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
        data: Some(branch),
        message: Some("Branch updated successfully"),
    })
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Branches"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Branch ID")),
    responses(
        (status = 200, description = "Branch deactivated", body = StdResponse<BranchEntity, String>)
    )
)]
async fn delete_branch(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let branch = diesel::update(branches::table.find(id))
        .set(branches::is_active.eq(false))
        .returning(BranchEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(branch),
        message: Some("Branch deactivated successfully"),
    })
}

async fn ensure_branch_exists(conn: &mut PooledConn<'_>, branch_id: i32) -> Result<(), AppError> {
    let branch_count: i64 = branches::table
        .find(branch_id)
        .count()
        .get_result(conn)
        .await
        .context("Failed to check branch")?;
    if branch_count == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

#[derive(Serialize, ToSchema)]
struct BranchInventoryLine {
    product_id: i32,
    sku: String,
    product_name: String,
    quantity: i32,
}

/// Stock listing for one branch.
#[utoipa::path(
    get,
    path = "/{id}/inventory",
    tags = ["Branches"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Branch ID")),
    responses(
        (status = 200, description = "Branch inventory", body = StdResponse<Vec<BranchInventoryLine>, String>)
    )
)]
async fn get_branch_inventory(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    ensure_branch_exists(conn, id).await?;

    let rows: Vec<(i32, String, String, i32)> = branch_inventory::table
        .inner_join(products::table)
        .filter(branch_inventory::branch_id.eq(id))
        .order_by(products::name.asc())
        .select((
            branch_inventory::product_id,
            products::sku,
            products::name,
            branch_inventory::quantity,
        ))
        .get_results(conn)
        .await
        .context("Failed to get branch inventory")?;

    let inventory = rows
        .into_iter()
        .map(|(product_id, sku, product_name, quantity)| BranchInventoryLine {
            product_id,
            sku,
            product_name,
            quantity,
        })
        .collect::<Vec<_>>();

    Ok(StdResponse {
        data: Some(inventory),
        message: Some("Get branch inventory successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct SetInventoryReq {
    quantity: i32,
}

/// Set the absolute stock level for a product at a branch.
#[utoipa::path(
    put,
    path = "/{id}/inventory/{product_id}",
    tags = ["Branches"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Branch ID"),
        ("product_id" = i32, Path, description = "Product ID")
    ),
    request_body = SetInventoryReq,
    responses(
        (status = 200, description = "Stock level set", body = StdResponse<BranchInventoryEntity, String>)
    )
)]
async fn set_branch_inventory(
    Path((id, product_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
    Json(body): Json<SetInventoryReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.quantity < 0 {
        return Err(AppError::BadRequest("Quantity cannot be negative".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    ensure_branch_exists(conn, id).await?;

    let product_count: i64 = products::table
        .find(product_id)
        .count()
        .get_result(conn)
        .await
        .context("Failed to check product")?;
    if product_count == 0 {
        return Err(AppError::BadRequest("Product does not exist".into()));
    }

    let line = diesel::insert_into(branch_inventory::table)
        .values(UpsertBranchInventoryEntity {
            branch_id: id,
            product_id,
            quantity: body.quantity,
        })
        .on_conflict((branch_inventory::branch_id, branch_inventory::product_id))
        .do_update()
        .set(branch_inventory::quantity.eq(body.quantity))
        .returning(BranchInventoryEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to set stock level")?;

    Ok(StdResponse {
        data: Some(line),
        message: Some("Stock level set successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct AdjustInventoryReq {
    /// Signed stock movement; negative values remove stock.
    delta: i32,
}

/// Apply a relative stock movement. Refused when it would drive the
/// quantity negative.
#[utoipa::path(
    post,
    path = "/{id}/inventory/{product_id}/adjust",
    tags = ["Branches"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Branch ID"),
        ("product_id" = i32, Path, description = "Product ID")
    ),
    request_body = AdjustInventoryReq,
    responses(
        (status = 200, description = "Stock adjusted", body = StdResponse<BranchInventoryEntity, String>),
        (status = 409, description = "Adjustment would drive stock negative")
    )
)]
async fn adjust_branch_inventory(
    Path((id, product_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
    Json(body): Json<AdjustInventoryReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let line_count: i64 = branch_inventory::table
        .find((id, product_id))
        .count()
        .get_result(conn)
        .await
        .context("Failed to check inventory line")?;
    if line_count == 0 {
        return Err(AppError::NotFound);
    }

    let line: BranchInventoryEntity = diesel::update(branch_inventory::table.find((id, product_id)))
        .filter(branch_inventory::quantity.ge(-body.delta))
        .set(branch_inventory::quantity.eq(branch_inventory::quantity + body.delta))
        .returning(BranchInventoryEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => {
                AppError::Conflict("Adjustment would drive stock negative".into())
            }
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(line),
        message: Some("Stock adjusted successfully"),
    })
}
