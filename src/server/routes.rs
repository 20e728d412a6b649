use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::headers::Cookie;
use axum_extra::TypedHeader;
use serde::Deserialize;
use serde_json::{json, Value};

use super::session::{
    expired_session_cookie, hash_password, session_cookie, session_token, verify_password,
};
use super::AppState;
use crate::bot;
use crate::error::ServiceError;

type ApiResult<T> = Result<T, ServiceError>;

/// Request cookies; absent when the request has no `Cookie` header.
type Cookies = Option<TypedHeader<Cookie>>;

fn request_token(cookies: &Cookies) -> Option<String> {
    session_token(cookies.as_ref().map(|TypedHeader(cookie)| cookie))
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl CredentialsRequest {
    /// Both fields, when both are present and non-empty.
    fn into_pair(self) -> Option<(String, String)> {
        match (self.username, self.password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    #[serde(default)]
    selected_item: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    #[serde(default)]
    items: Vec<String>,
    #[serde(default)]
    quantities: Vec<i64>,
}

fn current_user(state: &AppState, cookies: &Cookies) -> ApiResult<i64> {
    let unauthorized = || ServiceError::Unauthorized("Unauthorized".to_string());
    let token = request_token(cookies).ok_or_else(unauthorized)?;
    state.sessions().user_id(&token).ok_or_else(unauthorized)
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let (username, password) = req.into_pair().ok_or_else(|| {
        ServiceError::BadRequest("Username and password are required!".to_string())
    })?;

    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))??;

    let store = state.store();
    if store.find_user(&username)?.is_some() {
        return Err(ServiceError::BadRequest("Username already exists!".to_string()));
    }
    let user_id = store.insert_user(&username, &hash)?;
    tracing::info!("Registered user {} ({})", username, user_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Registration successful!" })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<Response> {
    let (username, password) = req.into_pair().ok_or_else(|| {
        ServiceError::BadRequest("Username and password are required.".to_string())
    })?;

    let user = state.store().find_user(&username)?;
    let invalid = || ServiceError::Unauthorized("Invalid username or password.".to_string());

    let Some(user) = user else {
        return Err(invalid());
    };

    let hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;
    if !valid {
        tracing::warn!("Failed login for {}", username);
        return Err(invalid());
    }

    let token = state.sessions().login(user.user_id);
    tracing::info!("User {} logged in", user.username);

    Ok((
        [(SET_COOKIE, session_cookie(&token))],
        Json(json!({ "message": "Login successful!" })),
    )
        .into_response())
}

pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> Response {
    if let Some(token) = request_token(&cookies) {
        state.sessions().logout(&token);
    }

    (
        [(SET_COOKIE, expired_session_cookie())],
        Json(json!({ "message": "Logged out." })),
    )
        .into_response()
}

pub async fn chat(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<Value>> {
    let message = req
        .message
        .ok_or_else(|| ServiceError::BadRequest("Message is required".to_string()))?;
    let token = request_token(&cookies);

    // Lock order: sessions, then store.
    let mut sessions = state.sessions();
    let cart = sessions.cart_mut(token.as_deref());
    let reply = bot::respond(&state.store(), cart, &message)?;

    Ok(Json(json!({ "reply": reply })))
}

pub async fn menu(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let names = state.store().item_names()?;
    Ok(Json(json!({ "unique_items": names })))
}

pub async fn recommend(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(req): Json<RecommendRequest>,
) -> ApiResult<Json<Value>> {
    current_user(&state, &cookies)?;
    match req.selected_item {
        Some(item) if !item.is_empty() => {}
        _ => return Err(ServiceError::BadRequest("Selected item is required".to_string())),
    }

    let recommendations = state.store().popular_items(5)?;
    Ok(Json(json!({ "recommendations": recommendations })))
}

pub async fn order(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(req): Json<OrderRequest>,
) -> ApiResult<Json<Value>> {
    let user_id = current_user(&state, &cookies)?;
    if req.items.is_empty() || req.quantities.is_empty() {
        return Err(ServiceError::BadRequest(
            "Items and quantities are required".to_string(),
        ));
    }

    let lines: Vec<(String, i64)> = req.items.into_iter().zip(req.quantities).collect();
    let total_cost = state.store().place_order(user_id, &lines).map_err(|e| {
        tracing::error!("Failed to save order: {}", e);
        ServiceError::Internal("Error saving the bill".to_string())
    })?;

    Ok(Json(json!({
        "message": "Order placed successfully!",
        "total_cost": total_cost,
    })))
}

pub async fn order_history(
    State(state): State<AppState>,
    cookies: Cookies,
) -> ApiResult<Json<Value>> {
    let user_id = current_user(&state, &cookies)?;
    let history = state.store().order_history(user_id)?;
    Ok(Json(json!({ "order_history": history })))
}

pub async fn latest_bill(
    State(state): State<AppState>,
    cookies: Cookies,
) -> ApiResult<Json<Value>> {
    let user_id = current_user(&state, &cookies)?;
    match state.store().latest_bill(user_id)? {
        Some(bill) => Ok(Json(json!(bill))),
        None => Err(ServiceError::NotFound("No bills found.".to_string())),
    }
}
