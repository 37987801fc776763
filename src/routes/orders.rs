use anyhow::Context;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::Deserialize;
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
    models::{
        branches::UpsertBranchInventoryEntity,
        orders::{OrderEntity, OrderItemEntity, OrderStatus},
    },
    schema::{branch_inventory, order_items, orders},
};

/// Defines the staff-facing order management routes (fulfilment).
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_orders))
            .routes(utoipa_axum::routes!(update_order_status))
            .route_layer(axum::middleware::from_fn(middleware::staff_authorization)),
    )
}

/// Return every reserved unit of an order to its branch. Inventory lines that
/// were removed in the meantime are recreated.
pub(crate) async fn restock_order_items(
    conn: &mut PooledConn<'_>,
    order: &OrderEntity,
) -> Result<(), AppError> {
    let items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .get_results(conn)
        .await
        .context("Failed to get order items")?;

    for item in items {
        diesel::insert_into(branch_inventory::table)
            .values(UpsertBranchInventoryEntity {
                branch_id: order.branch_id,
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .on_conflict((branch_inventory::branch_id, branch_inventory::product_id))
            .do_update()
            .set(branch_inventory::quantity.eq(branch_inventory::quantity + item.quantity))
            .execute(conn)
            .await
            .context("Failed to restock inventory")?;
    }

    Ok(())
}

#[derive(Deserialize, IntoParams)]
struct ListOrdersQuery {
    status: Option<String>,
    branch_id: Option<i32>,
}

/// List orders across all customers, optionally narrowed by status and branch.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(ListOrdersQuery),
    responses(
        (status = 200, description = "List orders", body = StdResponse<Vec<OrderEntity>, String>),
        (status = 400, description = "Unknown status filter")
    )
)]
async fn get_orders(
    Query(query): Query<ListOrdersQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut listing = orders::table
        .order_by(orders::created_at.desc())
        .into_boxed();
    if let Some(raw) = &query.status {
        let status = OrderStatus::parse(raw)
            .ok_or_else(|| AppError::BadRequest(format!("{raw} is not a valid order status")))?;
        listing = listing.filter(orders::status.eq(status.as_str()));
    }
    if let Some(branch_id) = query.branch_id {
        listing = listing.filter(orders::branch_id.eq(branch_id));
    }

    let orders: Vec<OrderEntity> = listing
        .get_results(conn)
        .await
        .context("Failed to get orders")?;

    Ok(StdResponse {
        data: Some(orders),
        message: Some("Get orders successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateOrderStatusReq {
    status: String,
}

/// Advance an order along its lifecycle. Cancelling restocks the branch in
/// the same transaction.
#[utoipa::path(
    patch,
    path = "/{id}/status",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    request_body = UpdateOrderStatusReq,
    responses(
        (status = 200, description = "Order status updated", body = StdResponse<OrderEntity, String>),
        (status = 400, description = "Unknown status"),
        (status = 409, description = "Transition not allowed from the current status")
    )
)]
async fn update_order_status(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdateOrderStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let next = OrderStatus::parse(&body.status)
        .ok_or_else(|| AppError::BadRequest(format!("{} is not a valid order status", body.status)))?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let updated_order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let order: OrderEntity = orders::table
                    .find(id)
                    .get_result(conn)
                    .await
                    .map_err(|err| match err {
                        DieselError::NotFound => AppError::NotFound,
                        _ => AppError::Other(err.into()),
                    })?;

                let current = OrderStatus::parse(&order.status).ok_or_else(|| {
                    AppError::Other(anyhow::anyhow!(
                        "Order {} carries unknown status {}",
                        order.id,
                        order.status
                    ))
                })?;
                if !current.can_transition_to(next) {
                    return Err(AppError::Conflict(format!(
                        "Cannot move order from {} to {}",
                        current.as_str(),
                        next.as_str()
                    )));
                }

                let updated_order: OrderEntity = if next == OrderStatus::Cancelled {
                    let cancelled = diesel::update(orders::table.find(id))
                        .set((
                            orders::status.eq(next.as_str()),
                            orders::deleted_at.eq(diesel::dsl::now),
                        ))
                        .returning(OrderEntity::as_returning())
                        .get_result(conn)
                        .await
                        .context("Failed to cancel order")?;
                    restock_order_items(conn, &cancelled).await?;
                    cancelled
                } else {
                    diesel::update(orders::table.find(id))
                        .set(orders::status.eq(next.as_str()))
                        .returning(OrderEntity::as_returning())
                        .get_result(conn)
                        .await
                        .context("Failed to update order status")?
                };

                Ok::<OrderEntity, AppError>(updated_order)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(updated_order),
        message: Some("Order status updated successfully"),
    })
}
