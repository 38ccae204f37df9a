pub mod assets;
pub mod auth;
pub mod pages;
pub mod posts;
pub mod profile;

use askama::Template;
use axum::http::{header, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::{ApiError, Reply};
use crate::extractors::Context;
use crate::flash::{self, Flash};
use crate::routes::pages::Page;
use crate::state::AppState;

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        render(&self.0, StatusCode::OK)
    }
}

fn render<T: Template>(template: &T, status: StatusCode) -> Response {
    match template.render() {
        Ok(body) => (
            status,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Template render error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

/// Render a full page. A flash shown by this page is cleared.
pub fn page<T: Template>(ctx: &Context, template: T) -> Response {
    page_with_status(ctx, template, StatusCode::OK)
}

pub fn page_with_status<T: Template>(ctx: &Context, template: T, status: StatusCode) -> Response {
    let response = render(&template, status);
    if ctx.flash.is_some() {
        (AppendHeaders([(header::SET_COOKIE, flash::clear_cookie())]), response).into_response()
    } else {
        response
    }
}

/// 303 to `location`, carrying a one-shot message.
pub fn redirect_with(location: &str, message: Flash) -> Response {
    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, location.to_string()),
            (header::SET_COOKIE, message.cookie()),
        ],
    )
        .into_response()
}

pub fn redirect_to(location: &str) -> Response {
    (StatusCode::SEE_OTHER, [(header::LOCATION, location.to_string())]).into_response()
}

/// Map a backend outcome to the message the visitor sees: the server's own
/// message on application failures, `fallback` on transport or decode errors.
pub fn failure_message<T>(outcome: &Result<Reply<T>, ApiError>, fallback: &str) -> Option<String> {
    match outcome {
        Ok(Reply::Success(_)) => None,
        Ok(Reply::Failure(message)) => Some(message.clone()),
        Err(e) => {
            tracing::error!("Backend call failed: {}", e);
            Some(fallback.to_string())
        }
    }
}

/// The route table: page paths first, then the actions their forms and scripts call.
pub fn router() -> Router<AppState> {
    Router::new()
        // Pages
        .route(Page::Home.path(), get(posts::home))
        .route(Page::Login.path(), get(auth::login_page).post(auth::login))
        .route(Page::Signup.path(), get(auth::signup_page).post(auth::signup))
        .route(
            Page::ForgotPassword.path(),
            get(auth::forgot_password_page).post(auth::request_password_reset),
        )
        .route(
            Page::ResetPassword.path(),
            get(auth::reset_password_page).post(auth::reset_password),
        )
        .route(
            "/reset-password/",
            get(auth::reset_password_page).post(auth::reset_password),
        )
        .route(Page::VerifyEmail.path(), get(auth::verify_email))
        .route(Page::Profile.path(), get(profile::profile))
        .route(Page::UserPosts.path(), get(profile::user_posts))
        .route(
            Page::CreatePost.path(),
            get(posts::create_post_page).post(posts::create_post),
        )
        .route(Page::Explore.path(), get(profile::explore))
        .route(Page::Search.path(), get(profile::search))
        .route(Page::PostDetail.path(), get(posts::post_detail))
        // Actions
        .route("/logout", post(auth::logout))
        .route("/posts/{id}/like", post(posts::like))
        .route("/posts/{id}/dislike", post(posts::dislike))
        .route("/posts/{id}/repost", post(posts::repost))
        .route("/posts/{id}/comment", post(posts::comment))
        .route("/posts/{id}/preview/{kind}/{target}", get(posts::preview))
        .route("/posts/{id}/thread-box", get(posts::thread_box))
        .route("/assets/{*path}", get(assets::serve))
        .fallback(pages::not_found)
}

/// Full application with request tracing.
pub fn app(state: AppState) -> Router {
    router().layer(TraceLayer::new_for_http()).with_state(state)
}
