use anyhow::Context;
use axum::{Extension, Json, extract::State, response::IntoResponse};
use diesel::{
    ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper,
    result::DatabaseErrorKind,
};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        aliases::DieselError,
        app_error::{AppError, StdResponse},
        app_state::AppState,
        auth::{self, Role},
        middleware::{self, CustomerId},
    },
    models::users::{CreateUserEntity, UpdateProfileChangeset, UserEntity},
    schema::{staff, users},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let public = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(register))
        .routes(utoipa_axum::routes!(login));

    let protected = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_me))
        .routes(utoipa_axum::routes!(update_me))
        .route_layer(axum::middleware::from_fn(
            middleware::customers_authorization,
        ));

    OpenApiRouter::new().nest("/auth", public.merge(protected))
}

#[derive(Deserialize, ToSchema)]
struct RegisterReq {
    email: String,
    password: String,
    full_name: String,
    phone: Option<String>,
}

/// Register a new customer account.
#[utoipa::path(
    post,
    path = "/register",
    tags = ["Auth"],
    request_body = RegisterReq,
    responses(
        (status = 200, description = "Account created", body = StdResponse<UserEntity, String>),
        (status = 409, description = "Email already registered")
    )
)]
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterReq>,
) -> Result<impl IntoResponse, AppError> {
    if !body.email.contains('@') {
        return Err(AppError::BadRequest("Invalid email address".into()));
    }
    if body.password.len() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters".into(),
        ));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let password_hash = auth::hash_password(&body.password)?;

    let user = diesel::insert_into(users::table)
        .values(CreateUserEntity {
            email: body.email,
            password_hash,
            full_name: body.full_name,
            phone: body.phone,
        })
        .returning(UserEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Conflict("Email already registered".into())
            }
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(user),
        message: Some("Registered successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct LoginReq {
    email: String,
    password: String,
}

#[derive(Serialize, ToSchema)]
struct LoginRes {
    token: String,
    user: UserEntity,
}

/// Exchange credentials for a bearer token. The token carries the staff role
/// when the account has an active staff row.
#[utoipa::path(
    post,
    path = "/login",
    tags = ["Auth"],
    request_body = LoginReq,
    responses(
        (status = 200, description = "Logged in", body = StdResponse<LoginRes, String>),
        (status = 401, description = "Invalid credentials")
    )
)]
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let user: Option<UserEntity> = users::table
        .filter(users::email.eq(&body.email))
        .first(conn)
        .await
        .optional()
        .context("Failed to load user")?;

    let user = match user {
        Some(user) if user.is_active && auth::verify_password(&user.password_hash, &body.password) => {
            user
        }
        _ => return Err(AppError::Unauthorized),
    };

    let staff_id: Option<i32> = staff::table
        .filter(staff::user_id.eq(user.id))
        .filter(staff::is_active.eq(true))
        .select(staff::id)
        .first(conn)
        .await
        .optional()
        .context("Failed to load staff row")?;

    let role = if staff_id.is_some() {
        Role::Staff
    } else {
        Role::Customer
    };
    let token = auth::issue_token(user.id, role, staff_id)?;

    Ok(StdResponse {
        data: Some(LoginRes { token, user }),
        message: Some("Logged in successfully"),
    })
}

/// Fetch the authenticated user's profile.
#[utoipa::path(
    get,
    path = "/me",
    tags = ["Auth"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Current profile", body = StdResponse<UserEntity, String>)
    )
)]
async fn get_me(
    State(state): State<AppState>,
    Extension(CustomerId(user_id)): Extension<CustomerId>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let user: UserEntity = users::table
        .find(user_id)
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    Ok(StdResponse {
        data: Some(user),
        message: Some("Get profile successfully"),
    })
}

/// Update the authenticated user's profile.
#[utoipa::path(
    patch,
    path = "/me",
    tags = ["Auth"],
    security(("bearerAuth" = [])),
    request_body = UpdateProfileChangeset,
    responses(
        (status = 200, description = "Profile updated", body = StdResponse<UserEntity, String>)
    )
)]
async fn update_me(
    State(state): State<AppState>,
    Extension(CustomerId(user_id)): Extension<CustomerId>,
    Json(body): Json<UpdateProfileChangeset>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let user = diesel::update(users::table.find(user_id))
        .set(body)
        .returning(UserEntity::as_returning())
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
        data: Some(user),
        message: Some("Profile updated successfully"),
    })
}
