use askama::Template;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Form;
use serde::Deserialize;
use serde_json::json;

use crate::api::types::{Ack, LoginData};
use crate::api::{Payload, Reply};
use crate::error::AppResult;
use crate::extractors::Context;
use crate::flash::{Flash, SERVER_ERROR};
use crate::format::encode_component;
use crate::routes::pages::Page;
use crate::routes::{failure_message, page, redirect_with};
use crate::session;
use crate::state::AppState;
use crate::views::Chrome;

const PASSWORD_MISMATCH: &str = "رمز عبور و تکرار آن مطابقت ندارند";
const PASSWORD_TOO_SHORT: &str = "رمز عبور باید حداقل ۸ کاراکتر باشد";
const INVALID_RESET_LINK: &str = "لینک بازیابی معتبر نیست";
const MIN_PASSWORD_CHARS: usize = 8;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub chrome: Chrome,
}

#[derive(Template)]
#[template(path = "pages/signup.html")]
pub struct SignupTemplate {
    pub chrome: Chrome,
}

#[derive(Template)]
#[template(path = "pages/forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub chrome: Chrome,
}

#[derive(Template)]
#[template(path = "pages/reset_password.html")]
pub struct ResetPasswordTemplate {
    pub chrome: Chrome,
    pub token: String,
}

// -- Forms --

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember: Option<String>,
}

#[derive(Deserialize)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Deserialize)]
pub struct ForgotPasswordForm {
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[derive(Deserialize)]
pub struct ResetPasswordForm {
    #[serde(default)]
    pub token: String,
    pub password: String,
    pub password_confirm: String,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", name)
}

// -- Login --

/// GET /login
pub async fn login_page(ctx: Context) -> Response {
    page(&ctx, LoginTemplate { chrome: ctx.chrome() })
}

/// POST /login — on success the backend user is cached in a new client session.
pub async fn login(
    State(state): State<AppState>,
    ctx: Context,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let payload = json!({
        "username_or_email": form.email,
        "password": form.password,
        "remember": form.remember.is_some(),
    });

    let response = match state
        .api
        .post("/api/login/", Payload::Json(payload), ctx.options())
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Login request failed: {}", e);
            return Ok(redirect_with(Page::Login.path(), Flash::error(SERVER_ERROR)));
        }
    };

    match response.reply::<LoginData>() {
        Ok(Reply::Success(data)) => {
            let token = session::login(
                &state.db,
                &data.user,
                &response.set_cookies,
                state.config.auth.session_hours,
            )?;
            let cookie = session_cookie(
                &state.config.auth.cookie_name,
                &token,
                state.config.auth.session_hours,
            );
            Ok((
                AppendHeaders([(header::SET_COOKIE, cookie)]),
                redirect_with(Page::Home.path(), Flash::success("ورود موفقیت‌آمیز بود!")),
            )
                .into_response())
        }
        Ok(Reply::Failure(message)) => Ok(redirect_with(Page::Login.path(), Flash::error(message))),
        Err(e) => {
            tracing::error!("Login response unreadable: {}", e);
            Ok(redirect_with(Page::Login.path(), Flash::error(SERVER_ERROR)))
        }
    }
}

// -- Signup --

/// GET /signup
pub async fn signup_page(ctx: Context) -> Response {
    page(&ctx, SignupTemplate { chrome: ctx.chrome() })
}

/// POST /signup
pub async fn signup(
    State(state): State<AppState>,
    ctx: Context,
    Form(form): Form<SignupForm>,
) -> Response {
    if form.password != form.password_confirm {
        return redirect_with(Page::Signup.path(), Flash::error(PASSWORD_MISMATCH));
    }

    let payload = json!({
        "username": form.username,
        "email": form.email,
        "password": form.password,
        "password_confirm": form.password_confirm,
    });
    let result = state
        .api
        .post("/api/signup/", Payload::Json(payload), ctx.options())
        .await
        .and_then(|r| r.reply::<Ack>());

    match failure_message(&result, SERVER_ERROR) {
        None => redirect_with(
            Page::Login.path(),
            Flash::success("ثبت‌نام موفقیت‌آمیز بود. لطفا ایمیل خود را بررسی کنید."),
        ),
        Some(message) => redirect_with(Page::Signup.path(), Flash::error(message)),
    }
}

// -- Password reset --

/// GET /forgot-password
pub async fn forgot_password_page(ctx: Context) -> Response {
    page(&ctx, ForgotPasswordTemplate { chrome: ctx.chrome() })
}

/// POST /forgot-password
pub async fn request_password_reset(
    State(state): State<AppState>,
    ctx: Context,
    Form(form): Form<ForgotPasswordForm>,
) -> Response {
    let email = form.email.trim();
    if email.is_empty() {
        return redirect_with(
            Page::ForgotPassword.path(),
            Flash::error("لطفا ایمیل خود را وارد کنید"),
        );
    }

    let result = state
        .api
        .post(
            "/api/password-reset/request/",
            Payload::Json(json!({ "email": email })),
            ctx.options(),
        )
        .await
        .and_then(|r| r.reply::<Ack>());

    match failure_message(&result, SERVER_ERROR) {
        None => redirect_with(
            Page::Login.path(),
            Flash::success(
                "ایمیل بازیابی رمز عبور ارسال شد. لطفا صندوق ایمیل خود را بررسی کنید.",
            ),
        ),
        Some(message) => redirect_with(Page::ForgotPassword.path(), Flash::error(message)),
    }
}

/// GET /reset-password?token=... — the link mailed by the backend.
pub async fn reset_password_page(ctx: Context, Query(query): Query<TokenQuery>) -> Response {
    match query.token.filter(|t| !t.is_empty()) {
        Some(token) => page(
            &ctx,
            ResetPasswordTemplate {
                chrome: ctx.chrome(),
                token,
            },
        ),
        None => redirect_with(Page::Login.path(), Flash::error(INVALID_RESET_LINK)),
    }
}

/// POST /reset-password. Local checks run before any backend call.
pub async fn reset_password(
    State(state): State<AppState>,
    ctx: Context,
    Form(form): Form<ResetPasswordForm>,
) -> Response {
    let token = form.token.trim();
    if token.is_empty() {
        return redirect_with(Page::Login.path(), Flash::error(INVALID_RESET_LINK));
    }

    let retry = format!("{}?token={}", Page::ResetPassword.path(), encode_component(token));
    if form.password != form.password_confirm {
        return redirect_with(&retry, Flash::error(PASSWORD_MISMATCH));
    }
    if form.password.chars().count() < MIN_PASSWORD_CHARS {
        return redirect_with(&retry, Flash::error(PASSWORD_TOO_SHORT));
    }

    let endpoint = format!("/api/password-reset/{}/", encode_component(token));
    let payload = json!({
        "password": form.password,
        "password_confirm": form.password_confirm,
    });
    let result = state
        .api
        .post(&endpoint, Payload::Json(payload), ctx.options())
        .await
        .and_then(|r| r.reply::<Ack>());

    match failure_message(&result, SERVER_ERROR) {
        None => redirect_with(
            Page::Login.path(),
            Flash::success("رمز عبور با موفقیت تغییر کرد. اکنون می‌توانید وارد شوید."),
        ),
        Some(message) => redirect_with(&retry, Flash::error(message)),
    }
}

/// GET /verify-email?token=... — confirms the address, then sends the visitor to login.
pub async fn verify_email(
    State(state): State<AppState>,
    ctx: Context,
    Query(query): Query<TokenQuery>,
) -> Response {
    let Some(token) = query.token.filter(|t| !t.is_empty()) else {
        return redirect_with(Page::Login.path(), Flash::error("لینک تایید معتبر نیست"));
    };

    let endpoint = format!("/api/verify-email/{}/", encode_component(&token));
    let result = state
        .api
        .get(&endpoint, ctx.options())
        .await
        .and_then(|r| r.reply::<Ack>());

    match failure_message(&result, SERVER_ERROR) {
        None => redirect_with(
            Page::Login.path(),
            Flash::success("ایمیل شما تایید شد. اکنون می‌توانید وارد شوید."),
        ),
        Some(message) => redirect_with(Page::Login.path(), Flash::error(message)),
    }
}

// -- Logout --

/// POST /logout — the session survives only if the backend cannot be reached.
pub async fn logout(State(state): State<AppState>, ctx: Context) -> AppResult<Response> {
    if let Err(e) = state.api.post("/api/logout/", Payload::Empty, ctx.options()).await {
        tracing::error!("Logout request failed: {}", e);
        return Ok(redirect_with(Page::Home.path(), Flash::error("خطا در خروج")));
    }

    if let Some(session) = &ctx.session {
        session::logout(&state.db, &session.token)?;
        tracing::info!("Session ended for {}", session.user.username);
    }

    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            clear_session_cookie(&state.config.auth.cookie_name),
        )]),
        redirect_with(Page::Home.path(), Flash::success("خروج موفقیت‌آمیز بود")),
    )
        .into_response())
}
