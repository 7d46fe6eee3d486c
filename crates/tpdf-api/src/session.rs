//! Anonymous session cookie middleware.
//!
//! Every request gets a live session: an incoming `sessionId` cookie is
//! validated against the ledger (which refreshes its expiry window), and a
//! missing or expired one is replaced with a fresh guest session, issued on
//! the response.

use axum::extract::{Request, State};
use axum::http::header::{HeaderValue, SET_COOKIE};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;

use crate::error::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "sessionId";

/// The caller's session id, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct SessionId(pub String);

pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let existing = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());

    let mut issued = None;
    let session_id = match existing {
        Some(id) if state.sessions.get_session(&id).await.is_some() => id,
        _ => {
            let user_tag = format!("guest_{}", chrono::Utc::now().timestamp_millis());
            match state.sessions.create_session(user_tag).await {
                Some(id) => {
                    issued = Some(id.clone());
                    id
                }
                None => {
                    return ApiError::internal("session store unavailable").into_response();
                }
            }
        }
    };

    request.extensions_mut().insert(SessionId(session_id));
    let mut response = next.run(request).await;

    if let Some(id) = issued {
        let cookie = format!("{}={}; Max-Age=86400; Path=/; HttpOnly", SESSION_COOKIE, id);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }

    response
}
