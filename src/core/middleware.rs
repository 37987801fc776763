use axum::{extract::Request, http::header, middleware::Next, response::Response};

use super::{
    app_error::AppError,
    auth::{self, Claims, Role},
};

/// Authenticated user id, injected by `customers_authorization`.
#[derive(Clone, Copy, Debug)]
pub struct CustomerId(pub i32);

/// Authenticated staff id, injected by `staff_authorization`.
#[derive(Clone, Copy, Debug)]
pub struct StaffId(pub i32);

fn bearer_claims(req: &Request) -> Result<Claims, AppError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::Unauthorized)?;
    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?;
    auth::verify_token(token).map_err(|_| AppError::Unauthorized)
}

/// Require a valid bearer token; any authenticated account may shop. Staff
/// tokens additionally expose their staff id for shared endpoints.
pub async fn customers_authorization(mut req: Request, next: Next) -> Result<Response, AppError> {
    let claims = bearer_claims(&req)?;
    req.extensions_mut().insert(CustomerId(claims.sub));
    if let (Role::Staff, Some(staff_id)) = (claims.role, claims.staff_id) {
        req.extensions_mut().insert(StaffId(staff_id));
    }
    Ok(next.run(req).await)
}

/// Require a token carrying the staff role.
pub async fn staff_authorization(mut req: Request, next: Next) -> Result<Response, AppError> {
    let claims = bearer_claims(&req)?;
    let staff_id = match (claims.role, claims.staff_id) {
        (Role::Staff, Some(id)) => id,
        _ => return Err(AppError::ForbiddenResource("Staff credentials required".into())),
    };
    req.extensions_mut().insert(StaffId(staff_id));
    req.extensions_mut().insert(CustomerId(claims.sub));
    Ok(next.run(req).await)
}
