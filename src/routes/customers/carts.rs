use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        aliases::DieselError,
        app_error::{AppError, StdResponse},
        app_state::AppState,
        db::PooledConn,
        middleware::{self, CustomerId},
    },
    models::carts::{CART_STATUS_OPEN, CartEntity, CartItemEntity, CreateCartEntity},
    pricing::PricedLine,
    schema::{cart_items, carts, products},
};

use super::resolve_prices;

/// Defines all customer-facing cart routes (CRUD operations + authorization).
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/customers/carts",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_my_cart))
            .routes(utoipa_axum::routes!(clear_cart))
            .routes(utoipa_axum::routes!(add_cart_item))
            .routes(utoipa_axum::routes!(update_cart_item))
            .routes(utoipa_axum::routes!(remove_cart_item))
            .route_layer(axum::middleware::from_fn(
                middleware::customers_authorization,
            )),
    )
}

/// Each customer has at most one OPEN cart; it is created on first touch.
pub(super) async fn get_or_create_open_cart(
    conn: &mut PooledConn<'_>,
    customer_id: i32,
) -> Result<CartEntity, AppError> {
    let existing: Option<CartEntity> = carts::table
        .filter(carts::customer_id.eq(customer_id))
        .filter(carts::status.eq(CART_STATUS_OPEN))
        .first(conn)
        .await
        .optional()
        .context("Failed to get open cart")?;

    if let Some(cart) = existing {
        return Ok(cart);
    }

    let cart = diesel::insert_into(carts::table)
        .values(CreateCartEntity { customer_id })
        .returning(CartEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create cart")?;

    Ok(cart)
}

#[derive(Serialize, ToSchema)]
struct CartLineRes {
    product_id: i32,
    product_name: String,
    quantity: i32,
    unit_price: f32,
    discount_percent: f32,
    line_total: f32,
}

#[derive(Serialize, ToSchema)]
struct GetCartRes {
    cart: CartEntity,
    cart_items: Vec<CartLineRes>,
    total_price: f32,
}

async fn priced_cart_response(
    conn: &mut PooledConn<'_>,
    cart: CartEntity,
) -> Result<GetCartRes, AppError> {
    let items: Vec<CartItemEntity> = cart_items::table
        .filter(cart_items::cart_id.eq(cart.id))
        .get_results(conn)
        .await
        .context("Failed to get cart items")?;

    let product_ids: Vec<i32> = items.iter().map(|item| item.product_id).collect();
    let prices = resolve_prices(conn, &product_ids).await?;

    let mut lines = Vec::with_capacity(items.len());
    let mut total_price = 0.0;
    for item in items {
        let Some(price) = prices.get(&item.product_id) else {
            continue;
        };
        let priced = PricedLine {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: price.unit_price,
            discount_percent: price.discount_percent,
        };
        total_price += priced.line_total();
        lines.push(CartLineRes {
            product_id: item.product_id,
            product_name: price.product_name.clone(),
            quantity: item.quantity,
            unit_price: price.unit_price,
            discount_percent: price.discount_percent,
            line_total: priced.line_total(),
        });
    }

    Ok(GetCartRes {
        cart,
        cart_items: lines,
        total_price,
    })
}

/// Fetch the customer's open cart with current prices and totals.
#[utoipa::path(
    get,
    path = "/my-cart",
    tags = ["Carts"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "The open cart", body = StdResponse<GetCartRes, String>)
    )
)]
async fn get_my_cart(
    State(state): State<AppState>,
    Extension(CustomerId(customer_id)): Extension<CustomerId>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let cart = get_or_create_open_cart(conn, customer_id).await?;
    let response = priced_cart_response(conn, cart).await?;

    Ok(StdResponse {
        data: Some(response),
        message: Some("Get cart successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct AddCartItemReq {
    product_id: i32,
    quantity: i32,
}

/// Add a product to the cart. Adding a product already in the cart merges by
/// summing quantities.
#[utoipa::path(
    post,
    path = "/items",
    tags = ["Carts"],
    security(("bearerAuth" = [])),
    request_body = AddCartItemReq,
    responses(
        (status = 200, description = "Item merged into cart", body = StdResponse<CartItemEntity, String>),
        (status = 400, description = "Unknown product or non-positive quantity")
    )
)]
async fn add_cart_item(
    State(state): State<AppState>,
    Extension(CustomerId(customer_id)): Extension<CustomerId>,
    Json(body): Json<AddCartItemReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.quantity <= 0 {
        return Err(AppError::BadRequest("Quantity must be positive".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product_count: i64 = products::table
        .find(body.product_id)
        .filter(products::is_active.eq(true))
        .count()
        .get_result(conn)
        .await
        .context("Failed to check product")?;
    if product_count == 0 {
        return Err(AppError::BadRequest("Product does not exist".into()));
    }

    let cart = get_or_create_open_cart(conn, customer_id).await?;

    let line = diesel::insert_into(cart_items::table)
        .values((
            cart_items::cart_id.eq(cart.id),
            cart_items::product_id.eq(body.product_id),
            cart_items::quantity.eq(body.quantity),
        ))
        .on_conflict((cart_items::cart_id, cart_items::product_id))
        .do_update()
        .set(cart_items::quantity.eq(cart_items::quantity + body.quantity))
        .returning(CartItemEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to merge cart item")?;

    diesel::update(carts::table.find(cart.id))
        .set(carts::updated_at.eq(diesel::dsl::now))
        .execute(conn)
        .await
        .context("Failed to update cart timestamp")?;

    Ok(StdResponse {
        data: Some(line),
        message: Some("Item added to cart successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateCartItemReq {
    quantity: i32,
}

/// Set a line's quantity; zero removes the line.
#[utoipa::path(
    patch,
    path = "/items/{product_id}",
    tags = ["Carts"],
    security(("bearerAuth" = [])),
    params(("product_id" = i32, Path, description = "Product ID")),
    request_body = UpdateCartItemReq,
    responses(
        (status = 200, description = "Line updated", body = StdResponse<Option<CartItemEntity>, String>)
    )
)]
async fn update_cart_item(
    Path(product_id): Path<i32>,
    State(state): State<AppState>,
    Extension(CustomerId(customer_id)): Extension<CustomerId>,
    Json(body): Json<UpdateCartItemReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.quantity < 0 {
        return Err(AppError::BadRequest("Quantity cannot be negative".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let cart = get_or_create_open_cart(conn, customer_id).await?;

    if body.quantity == 0 {
        let removed = diesel::delete(cart_items::table.find((cart.id, product_id)))
            .execute(conn)
            .await
            .context("Failed to remove cart line")?;
        if removed == 0 {
            return Err(AppError::NotFound);
        }

        return Ok(StdResponse {
            data: None,
            message: Some("Line removed successfully"),
        });
    }

    let line = diesel::update(cart_items::table.find((cart.id, product_id)))
        .set(cart_items::quantity.eq(body.quantity))
        .returning(CartItemEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(line),
        message: Some("Line updated successfully"),
    })
}

/// Remove one line from the cart.
#[utoipa::path(
    delete,
    path = "/items/{product_id}",
    tags = ["Carts"],
    security(("bearerAuth" = [])),
    params(("product_id" = i32, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Line removed", body = StdResponse<CartItemEntity, String>)
    )
)]
async fn remove_cart_item(
    Path(product_id): Path<i32>,
    State(state): State<AppState>,
    Extension(CustomerId(customer_id)): Extension<CustomerId>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let cart = get_or_create_open_cart(conn, customer_id).await?;

    let line = diesel::delete(cart_items::table.find((cart.id, product_id)))
        .returning(CartItemEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(line),
        message: Some("Line removed successfully"),
    })
}

/// Empty the open cart.
#[utoipa::path(
    delete,
    path = "/",
    tags = ["Carts"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Cart cleared", body = StdResponse<CartEntity, String>)
    )
)]
async fn clear_cart(
    State(state): State<AppState>,
    Extension(CustomerId(customer_id)): Extension<CustomerId>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let cart = get_or_create_open_cart(conn, customer_id).await?;

    diesel::delete(cart_items::table.filter(cart_items::cart_id.eq(cart.id)))
        .execute(conn)
        .await
        .context("Failed to clear cart")?;

    Ok(StdResponse {
        data: Some(cart),
        message: Some("Cart cleared successfully"),
    })
}
