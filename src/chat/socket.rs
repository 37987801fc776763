use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing,
};
use diesel::{QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::{
    core::{
        aliases::DieselError,
        app_error::AppError,
        app_state::AppState,
        auth::{self, Claims},
    },
    models::consultations::{
        CONSULTATION_STATUS_CLOSED, ConsultationRequestEntity, CreateMessageEntity, MessageEntity,
    },
    schema::{consultation_requests, messages},
};

/// Live chat ingress. Plain axum routes (no OpenAPI; WebSocket upgrades are
/// not representable there).
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/ws/consultations/{id}",
        routing::get(consultation_socket),
    )
}

#[derive(Deserialize)]
struct SocketAuthQuery {
    token: String,
}

/// Upgrade to a chat socket on one consultation. The bearer token travels as
/// a query parameter because WebSocket handshakes cannot carry headers from
/// browsers; it is verified before the upgrade completes.
async fn consultation_socket(
    Path(id): Path<i32>,
    Query(query): Query<SocketAuthQuery>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let claims = auth::verify_token(&query.token).map_err(|_| AppError::Unauthorized)?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let consultation: ConsultationRequestEntity = consultation_requests::table
        .find(id)
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    authorize_participant(&consultation, &claims)?;

    let sender_user_id = claims.sub;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, id, sender_user_id)))
}

/// Only the owning customer and the assigned staff member may join, and only
/// while the consultation is not closed.
fn authorize_participant(
    consultation: &ConsultationRequestEntity,
    claims: &Claims,
) -> Result<(), AppError> {
    if consultation.status == CONSULTATION_STATUS_CLOSED {
        return Err(AppError::ForbiddenResource(
            "Consultation is closed".into(),
        ));
    }
    let is_customer = consultation.customer_id == claims.sub;
    let is_assigned_staff =
        claims.staff_id.is_some() && claims.staff_id == consultation.staff_id;
    if !is_customer && !is_assigned_staff {
        return Err(AppError::ForbiddenResource(
            "Not a participant of this consultation".into(),
        ));
    }
    Ok(())
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    consultation_id: i32,
    sender_user_id: i32,
) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = state.chat.join(consultation_id).await;

    let mut forward_task = tokio::spawn(async move {
        while let Ok(payload) = rx.recv().await {
            if sink.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let mut receive_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = stream.next().await {
            let Message::Text(text) = frame else {
                continue;
            };
            let body = text.to_string();
            if body.trim().is_empty() {
                continue;
            }
            match store_message(&recv_state, consultation_id, sender_user_id, body).await {
                Ok(stored) => match serde_json::to_string(&stored) {
                    Ok(payload) => {
                        // Send only fails when every subscriber is gone.
                        let _ = tx.send(payload);
                    }
                    Err(err) => tracing::error!("Failed to serialize chat message: {err}"),
                },
                Err(err) => {
                    tracing::warn!(
                        "Dropping chat message on consultation {consultation_id}: {err:#}"
                    );
                }
            }
        }
    });

    tokio::select! {
        _ = &mut forward_task => receive_task.abort(),
        _ = &mut receive_task => forward_task.abort(),
    }

    state.chat.leave(consultation_id).await;
}

async fn store_message(
    state: &AppState,
    consultation_id: i32,
    sender_user_id: i32,
    body: String,
) -> Result<MessageEntity> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let stored = diesel::insert_into(messages::table)
        .values(CreateMessageEntity {
            consultation_id,
            sender_user_id,
            body,
        })
        .returning(MessageEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to store chat message")?;

    Ok(stored)
}
