use std::collections::HashMap;

use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        aliases::DieselError,
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware::{self, CustomerId},
    },
    models::{
        carts::{CART_STATUS_CONVERTED, CART_STATUS_OPEN, CartEntity, CartItemEntity},
        orders::{
            CreateOrderEntity, CreateOrderItemEntity, OrderEntity, OrderItemEntity, OrderStatus,
            ShippingMethodEntity,
        },
        prescriptions::PRESCRIPTION_STATUS_APPROVED,
    },
    pricing::{self, PricedLine},
    routes::orders::restock_order_items,
    schema::{
        branch_inventory, branches, cart_items, carts, order_items, orders, payment_types,
        prescriptions, shipping_methods,
    },
};

use super::resolve_prices;

/// Defines all customer-facing order routes (placement, tracking, cancellation).
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/customers/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(place_order))
            .routes(utoipa_axum::routes!(get_my_orders))
            .routes(utoipa_axum::routes!(get_order))
            .routes(utoipa_axum::routes!(cancel_order))
            .route_layer(axum::middleware::from_fn(
                middleware::customers_authorization,
            )),
    )
}

#[derive(Deserialize, ToSchema)]
struct PlaceOrderReq {
    branch_id: i32,
    shipping_method_id: i32,
    payment_type_id: i32,
    delivery_address: Value,
}

/// Place an order from the customer's open cart. Pricing is snapshotted,
/// branch stock is reserved line by line, and the cart is converted; the whole
/// flow runs in one transaction so a failed reservation leaves nothing behind.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    request_body = PlaceOrderReq,
    responses(
        (status = 200, description = "Order placed", body = StdResponse<OrderEntity, String>),
        (status = 400, description = "Empty cart or unknown branch/shipping/payment reference"),
        (status = 403, description = "Cart needs an approved prescription on file"),
        (status = 409, description = "Insufficient stock at the chosen branch")
    )
)]
async fn place_order(
    State(state): State<AppState>,
    Extension(CustomerId(customer_id)): Extension<CustomerId>,
    Json(body): Json<PlaceOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let cart: CartEntity = carts::table
                    .filter(carts::customer_id.eq(customer_id))
                    .filter(carts::status.eq(CART_STATUS_OPEN))
                    .first(conn)
                    .await
                    .optional()
                    .context("Failed to get open cart")?
                    .ok_or_else(|| AppError::BadRequest("Cart is empty".into()))?;

                let items: Vec<CartItemEntity> = cart_items::table
                    .filter(cart_items::cart_id.eq(cart.id))
                    .get_results(conn)
                    .await
                    .context("Failed to get cart items")?;
                if items.is_empty() {
                    return Err(AppError::BadRequest("Cart is empty".into()));
                }

                let branch_count: i64 = branches::table
                    .find(body.branch_id)
                    .filter(branches::is_active.eq(true))
                    .count()
                    .get_result(conn)
                    .await
                    .context("Failed to check branch")?;
                if branch_count == 0 {
                    return Err(AppError::BadRequest("Branch does not exist".into()));
                }

                let shipping: ShippingMethodEntity = shipping_methods::table
                    .find(body.shipping_method_id)
                    .filter(shipping_methods::is_active.eq(true))
                    .first(conn)
                    .await
                    .optional()
                    .context("Failed to check shipping method")?
                    .ok_or_else(|| {
                        AppError::BadRequest("Shipping method does not exist".into())
                    })?;

                let payment_type_count: i64 = payment_types::table
                    .find(body.payment_type_id)
                    .filter(payment_types::is_active.eq(true))
                    .count()
                    .get_result(conn)
                    .await
                    .context("Failed to check payment type")?;
                if payment_type_count == 0 {
                    return Err(AppError::BadRequest("Payment type does not exist".into()));
                }

                let product_ids: Vec<i32> = items.iter().map(|item| item.product_id).collect();
                let prices = resolve_prices(conn, &product_ids).await?;

                let mut lines = Vec::with_capacity(items.len());
                let mut needs_prescription = false;
                for item in &items {
                    let price = prices.get(&item.product_id).ok_or_else(|| {
                        AppError::BadRequest(format!(
                            "Product {} no longer exists",
                            item.product_id
                        ))
                    })?;
                    if !price.is_active {
                        return Err(AppError::BadRequest(format!(
                            "{} is no longer available",
                            price.product_name
                        )));
                    }
                    needs_prescription |= price.requires_prescription;
                    lines.push(PricedLine {
                        product_id: item.product_id,
                        quantity: item.quantity,
                        unit_price: price.unit_price,
                        discount_percent: price.discount_percent,
                    });
                }

                if needs_prescription {
                    let approved: i64 = prescriptions::table
                        .filter(prescriptions::customer_id.eq(customer_id))
                        .filter(prescriptions::status.eq(PRESCRIPTION_STATUS_APPROVED))
                        .count()
                        .get_result(conn)
                        .await
                        .context("Failed to check prescriptions")?;
                    if approved == 0 {
                        return Err(AppError::ForbiddenResource(
                            "An approved prescription is required for items in this cart".into(),
                        ));
                    }
                }

                // Guarded decrement; zero rows affected means the branch does
                // not hold enough stock.
                for line in &lines {
                    let affected = diesel::update(
                        branch_inventory::table.find((body.branch_id, line.product_id)),
                    )
                    .filter(branch_inventory::quantity.ge(line.quantity))
                    .set(
                        branch_inventory::quantity
                            .eq(branch_inventory::quantity - line.quantity),
                    )
                    .execute(conn)
                    .await
                    .context("Failed to reserve stock")?;
                    if affected == 0 {
                        return Err(AppError::InsufficientStock {
                            product_id: line.product_id,
                        });
                    }
                }

                let totals = pricing::order_totals(&lines, shipping.fee);

                let order = diesel::insert_into(orders::table)
                    .values(CreateOrderEntity {
                        customer_id,
                        branch_id: body.branch_id,
                        cart_id: cart.id,
                        shipping_method_id: body.shipping_method_id,
                        payment_type_id: body.payment_type_id,
                        status: OrderStatus::Pending.as_str().into(),
                        subtotal: totals.subtotal,
                        discount_total: totals.discount_total,
                        shipping_fee: totals.shipping_fee,
                        grand_total: totals.grand_total,
                        delivery_address: body.delivery_address,
                    })
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to create order")?;

                let order_lines: Vec<CreateOrderItemEntity> = lines
                    .iter()
                    .map(|line| CreateOrderItemEntity {
                        order_id: order.id,
                        product_id: line.product_id,
                        quantity: line.quantity,
                        unit_price: line.unit_price,
                        discount_percent: line.discount_percent,
                    })
                    .collect();
                diesel::insert_into(order_items::table)
                    .values(order_lines)
                    .execute(conn)
                    .await
                    .context("Failed to snapshot order items")?;

                diesel::update(carts::table.find(cart.id))
                    .set(carts::status.eq(CART_STATUS_CONVERTED))
                    .execute(conn)
                    .await
                    .context("Failed to convert cart")?;

                Ok::<OrderEntity, AppError>(order)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Order placed successfully"),
    })
}

#[derive(Serialize, ToSchema)]
struct GetOrderRes {
    order: OrderEntity,
    order_items: Vec<OrderItemEntity>,
}

/// Fetch all orders belonging to the authenticated customer.
#[utoipa::path(
    get,
    path = "/my-orders",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List my orders", body = StdResponse<Vec<GetOrderRes>, String>)
    )
)]
async fn get_my_orders(
    State(state): State<AppState>,
    Extension(CustomerId(customer_id)): Extension<CustomerId>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let orders: Vec<OrderEntity> = orders::table
        .filter(orders::customer_id.eq(customer_id))
        .order_by(orders::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get my orders")?;

    let order_ids: Vec<i32> = orders.iter().map(|order| order.id).collect();
    let items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq_any(&order_ids))
        .get_results(conn)
        .await
        .context("Failed to get order items")?;

    let mut group: HashMap<i32, Vec<OrderItemEntity>> = HashMap::new();
    for item in items {
        group.entry(item.order_id).or_default().push(item);
    }

    let order_with_items: Vec<GetOrderRes> = orders
        .into_iter()
        .map(|order| GetOrderRes {
            order_items: group.remove(&order.id).unwrap_or_default(),
            order,
        })
        .collect();

    Ok(StdResponse {
        data: Some(order_with_items),
        message: Some("Get my orders successfully"),
    })
}

/// Fetch a specific order belonging to the authenticated customer.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<GetOrderRes, String>)
    )
)]
async fn get_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(CustomerId(customer_id)): Extension<CustomerId>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order: OrderEntity = orders::table
        .find(id)
        .filter(orders::customer_id.eq(customer_id))
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    let order_items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .get_results(conn)
        .await
        .context("Failed to get order items")?;

    Ok(StdResponse {
        data: Some(GetOrderRes { order, order_items }),
        message: Some("Get order successfully"),
    })
}

/// Cancel a pending order for the authenticated customer. The reserved branch
/// stock is returned in the same transaction.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to cancel")
    ),
    responses(
        (status = 200, description = "Cancelled order successfully", body = StdResponse<OrderEntity, String>),
        (status = 404, description = "No pending order with this id")
    )
)]
async fn cancel_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(CustomerId(customer_id)): Extension<CustomerId>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let cancelled_order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let cancelled_order: OrderEntity = diesel::update(orders::table.find(id))
                    .filter(orders::deleted_at.is_null())
                    .filter(orders::customer_id.eq(customer_id))
                    .filter(orders::status.eq(OrderStatus::Pending.as_str()))
                    .set((
                        orders::deleted_at.eq(diesel::dsl::now),
                        orders::status.eq(OrderStatus::Cancelled.as_str()),
                    ))
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .map_err(|_| AppError::NotFound)?;

                restock_order_items(conn, &cancelled_order).await?;

                Ok::<OrderEntity, AppError>(cancelled_order)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(cancelled_order),
        message: Some("Cancelled order successfully"),
    })
}
