use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};

use crate::api::{ApiError, ApiResponse, Reply, RequestOptions};
use crate::error::AppError;
use crate::flash::{get_cookie_value, Flash, LOGIN_REQUIRED};
use crate::routes::redirect_with;
use crate::session::{self, ClientSession};
use crate::state::AppState;
use crate::views::{Chrome, NavView};

/// Per-request context: the restored client session (if any) and the pending flash.
/// Handlers receive it explicitly instead of consulting global state.
#[derive(Debug, Clone)]
pub struct Context {
    pub session: Option<ClientSession>,
    pub flash: Option<Flash>,
}

impl Context {
    pub fn signed_in(&self) -> bool {
        self.session.is_some()
    }

    pub fn username(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user.username.as_str())
    }

    /// Options for a backend call made on behalf of this visitor.
    pub fn options(&self) -> RequestOptions {
        RequestOptions::with_cookie(
            self.session
                .as_ref()
                .and_then(|s| s.backend_cookie.as_deref()),
        )
    }

    pub fn chrome(&self) -> Chrome {
        Chrome {
            nav: NavView::for_user(self.session.as_ref().map(|s| &s.user)),
            flash: self.flash.clone(),
        }
    }

    /// Fold backend cookies into the session, then read the reply envelope.
    pub fn settle<T: serde::de::DeserializeOwned>(
        &mut self,
        state: &AppState,
        result: Result<ApiResponse, ApiError>,
    ) -> Result<Reply<T>, ApiError> {
        let response = result?;
        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session::absorb_cookies(&state.db, session, &response.set_cookies) {
                tracing::warn!("Could not store backend cookies: {}", e);
            }
        }
        response.reply()
    }
}

impl FromRequestParts<AppState> for Context {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let flash = Flash::from_parts(parts);
        let session = match get_cookie_value(parts, &state.config.auth.cookie_name) {
            Some(token) if !token.is_empty() => session::restore(&state.db, token)?,
            _ => None,
        };
        Ok(Context { session, flash })
    }
}

/// Context of a visitor who must be signed in. Others are sent to the login page.
#[derive(Debug, Clone)]
pub struct SignedIn(pub Context);

impl FromRequestParts<AppState> for SignedIn {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let ctx = Context::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        if ctx.signed_in() {
            Ok(SignedIn(ctx))
        } else {
            Err(redirect_with("/login", Flash::error(LOGIN_REQUIRED)))
        }
    }
}
