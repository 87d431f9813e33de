//! HTTP adapter over the directory.
//!
//! Maps routes onto `Directory` calls and renders results and errors as JSON.
//! Request bodies are read as raw bytes so that an absent or wrong
//! `Content-Type` is treated like any other malformed record.

use crate::core::directory::Directory;
use crate::core::error::DirectoryError;
use crate::core::validate;
use crate::plugins::{groups, users};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::io;
use tokio::net::TcpListener;

type ApiResult = Result<(StatusCode, Json<Value>), DirectoryError>;

impl IntoResponse for DirectoryError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if self.is_caller_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "request rejected");
        } else {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(self.to_json())).into_response()
    }
}

pub fn router(directory: Directory) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:userid",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/groups", get(list_groups).post(create_group))
        .route(
            "/groups/:name",
            get(get_group).put(update_group).delete(delete_group),
        )
        .fallback(fallback)
        .with_state(directory)
}

/// Bind `addr` and serve until ctrl-c.
pub async fn serve(directory: Directory, addr: &str) -> Result<(), DirectoryError> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(directory))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot install ctrl-c handler");
    }
}

/// Run a store-bound call on the blocking pool; rusqlite is synchronous.
async fn blocking<F, T>(directory: &Directory, f: F) -> Result<T, DirectoryError>
where
    F: FnOnce(&Directory) -> Result<T, DirectoryError> + Send + 'static,
    T: Send + 'static,
{
    let directory = directory.clone();
    tokio::task::spawn_blocking(move || f(&directory))
        .await
        .map_err(|e| DirectoryError::IoError(io::Error::other(e)))?
}

fn message(text: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "message": text })))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn fallback() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}

async fn list_users(State(directory): State<Directory>) -> ApiResult {
    let userids = blocking(&directory, |d| d.list_users()).await?;
    Ok((StatusCode::OK, Json(json!({ "userids": userids }))))
}

async fn get_user(State(directory): State<Directory>, Path(userid): Path<String>) -> ApiResult {
    let record = blocking(&directory, move |d| d.get_user(&userid)).await?;
    Ok((StatusCode::OK, Json(json!(record))))
}

async fn create_user(State(directory): State<Directory>, body: Bytes) -> ApiResult {
    let candidate = validate::parse_body(&body)?;
    let record = blocking(&directory, move |d| d.create_user(&candidate)).await?;
    Ok((StatusCode::CREATED, Json(json!(record))))
}

async fn update_user(
    State(directory): State<Directory>,
    Path(userid): Path<String>,
    body: Bytes,
) -> ApiResult {
    // Existence is reported ahead of body problems.
    blocking(&directory, move |d| match validate::parse_body(&body) {
        Ok(candidate) => d.update_user(&userid, &candidate).map(|_| ()),
        Err(e) if d.has_user(&userid)? => Err(e),
        Err(_) => Err(DirectoryError::NotFound(format!("user '{}'", userid))),
    })
    .await?;
    Ok(message(users::MSG_USER_UPDATED))
}

async fn delete_user(State(directory): State<Directory>, Path(userid): Path<String>) -> ApiResult {
    blocking(&directory, move |d| d.delete_user(&userid)).await?;
    Ok(message(users::MSG_USER_DELETED))
}

async fn list_groups(State(directory): State<Directory>) -> ApiResult {
    let names = blocking(&directory, |d| d.list_groups()).await?;
    Ok((StatusCode::OK, Json(json!({ "groups": names }))))
}

async fn get_group(State(directory): State<Directory>, Path(name): Path<String>) -> ApiResult {
    let userids = blocking(&directory, move |d| d.get_group_members(&name)).await?;
    Ok((StatusCode::OK, Json(json!({ "userids": userids }))))
}

async fn create_group(State(directory): State<Directory>, body: Bytes) -> ApiResult {
    let candidate = validate::parse_body(&body)?;
    blocking(&directory, move |d| d.create_group(&candidate)).await?;
    Ok(message(groups::MSG_GROUP_CREATED))
}

async fn update_group(
    State(directory): State<Directory>,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult {
    blocking(&directory, move |d| match validate::parse_body(&body) {
        Ok(candidate) => d.replace_group_members(&name, &candidate).map(|_| ()),
        Err(e) if d.has_group(&name)? => Err(e),
        Err(_) => Err(DirectoryError::NotFound(format!("group '{}'", name))),
    })
    .await?;
    Ok(message(groups::MSG_GROUP_MEMBERS_UPDATED))
}

async fn delete_group(State(directory): State<Directory>, Path(name): Path<String>) -> ApiResult {
    blocking(&directory, move |d| d.delete_group(&name)).await?;
    Ok(message(groups::MSG_GROUP_DELETED))
}
