use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        aliases::DieselError,
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware::{self, CustomerId},
    },
    models::reviews::{ReviewEntity, UpsertReviewEntity},
    schema::{products, reviews},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let public = OpenApiRouter::new().routes(utoipa_axum::routes!(get_reviews));

    let customer = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(upsert_review))
        .routes(utoipa_axum::routes!(delete_review))
        .route_layer(axum::middleware::from_fn(
            middleware::customers_authorization,
        ));

    OpenApiRouter::new().nest("/products/{id}/reviews", public.merge(customer))
}

/// Reviews for one product, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Reviews"],
    params(("id" = i32, Path, description = "Product ID")),
    responses(
        (status = 200, description = "List reviews", body = StdResponse<Vec<ReviewEntity>, String>)
    )
)]
async fn get_reviews(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let reviews: Vec<ReviewEntity> = reviews::table
        .filter(reviews::product_id.eq(id))
        .order_by(reviews::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get reviews")?;

    Ok(StdResponse {
        data: Some(reviews),
        message: Some("Get reviews successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpsertReviewReq {
    rating: i32,
    comment: Option<String>,
}

/// Leave a review. A second review for the same product replaces the first.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Reviews"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Product ID")),
    request_body = UpsertReviewReq,
    responses(
        (status = 200, description = "Review stored", body = StdResponse<ReviewEntity, String>),
        (status = 400, description = "Rating out of range")
    )
)]
async fn upsert_review(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(CustomerId(customer_id)): Extension<CustomerId>,
    Json(body): Json<UpsertReviewReq>,
) -> Result<impl IntoResponse, AppError> {
    if !(1..=5).contains(&body.rating) {
        return Err(AppError::BadRequest("Rating must be between 1 and 5".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product_count: i64 = products::table
        .find(id)
        .filter(products::is_active.eq(true))
        .count()
        .get_result(conn)
        .await
        .context("Failed to check product")?;
    if product_count == 0 {
        return Err(AppError::NotFound);
    }

    let review = diesel::insert_into(reviews::table)
        .values(UpsertReviewEntity {
            product_id: id,
            customer_id,
            rating: body.rating,
            comment: body.comment.clone(),
        })
        .on_conflict((reviews::product_id, reviews::customer_id))
        .do_update()
        .set((
            reviews::rating.eq(body.rating),
            reviews::comment.eq(body.comment),
            reviews::updated_at.eq(diesel::dsl::now),
        ))
        .returning(ReviewEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to store review")?;

    Ok(StdResponse {
        data: Some(review),
        message: Some("Review stored successfully"),
    })
}

/// Remove the authenticated customer's review of this product.
#[utoipa::path(
    delete,
    path = "/",
    tags = ["Reviews"],
    security(("bearerAuth" = [])),
    params(("id" = i32, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Review removed", body = StdResponse<ReviewEntity, String>)
    )
)]
async fn delete_review(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(CustomerId(customer_id)): Extension<CustomerId>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let review = diesel::delete(
        reviews::table
            .filter(reviews::product_id.eq(id))
            .filter(reviews::customer_id.eq(customer_id)),
    )
    .returning(ReviewEntity::as_returning())
    .get_result(conn)
    .await
    .map_err(|err| match err {
        DieselError::NotFound => AppError::NotFound,
        _ => AppError::Other(err.into()),
    })?;

    Ok(StdResponse {
        data: Some(review),
        message: Some("Review removed successfully"),
    })
}
