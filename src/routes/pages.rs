use askama::Template;
use axum::http::{StatusCode, Uri};
use axum::response::Response;

use crate::extractors::Context;
use crate::routes::page_with_status;
use crate::views::Chrome;

/// Every page the frontend can show. Lookup by name is an exact match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Home,
    Login,
    Signup,
    ForgotPassword,
    ResetPassword,
    VerifyEmail,
    Profile,
    UserPosts,
    CreatePost,
    Explore,
    Search,
    PostDetail,
}

pub const PAGES: &[Page] = &[
    Page::Home,
    Page::Login,
    Page::Signup,
    Page::ForgotPassword,
    Page::ResetPassword,
    Page::VerifyEmail,
    Page::Profile,
    Page::UserPosts,
    Page::CreatePost,
    Page::Explore,
    Page::Search,
    Page::PostDetail,
];

impl Page {
    pub fn name(&self) -> &'static str {
        match self {
            Page::Home => "home",
            Page::Login => "login",
            Page::Signup => "signup",
            Page::ForgotPassword => "forgot-password",
            Page::ResetPassword => "reset-password",
            Page::VerifyEmail => "verify-email",
            Page::Profile => "profile",
            Page::UserPosts => "user-posts",
            Page::CreatePost => "create-post",
            Page::Explore => "explore",
            Page::Search => "search",
            Page::PostDetail => "post-detail",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Page::Home => "/",
            Page::Login => "/login",
            Page::Signup => "/signup",
            Page::ForgotPassword => "/forgot-password",
            Page::ResetPassword => "/reset-password",
            Page::VerifyEmail => "/verify-email",
            Page::Profile => "/profile",
            Page::UserPosts => "/user-posts",
            Page::CreatePost => "/create-post",
            Page::Explore => "/explore",
            Page::Search => "/search",
            Page::PostDetail => "/post-detail",
        }
    }

    pub fn from_name(name: &str) -> Option<Page> {
        PAGES.iter().copied().find(|page| page.name() == name)
    }
}

/// Validate a `back` target supplied by a form: only local page paths are
/// accepted, anything else falls back to the home page.
pub fn safe_back(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Page::Home.path().to_string();
    };
    if !raw.starts_with('/') || raw.starts_with("//") || raw.contains('\\') {
        return Page::Home.path().to_string();
    }

    let path = raw.split(['?', '#']).next().unwrap_or("/");
    let first = path.trim_start_matches('/');
    if first.is_empty() || Page::from_name(first).is_some() {
        raw.to_string()
    } else {
        Page::Home.path().to_string()
    }
}

#[derive(Template)]
#[template(path = "pages/not_found.html")]
pub struct NotFoundTemplate {
    pub chrome: Chrome,
    pub requested: String,
}

/// Fallback for unknown paths: a card with a way back home.
pub async fn not_found(ctx: Context, uri: Uri) -> Response {
    tracing::warn!("Page not found: {}", uri.path());
    page_with_status(
        &ctx,
        NotFoundTemplate {
            chrome: ctx.chrome(),
            requested: uri.path().to_string(),
        },
        StatusCode::NOT_FOUND,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_is_exact() {
        assert_eq!(Page::from_name("home"), Some(Page::Home));
        assert_eq!(Page::from_name("post-detail"), Some(Page::PostDetail));
        assert_eq!(Page::from_name("Home"), None);
        assert_eq!(Page::from_name("home "), None);
        assert_eq!(Page::from_name("settings"), None);
    }

    #[test]
    fn every_page_round_trips_through_its_name() {
        for page in PAGES {
            assert_eq!(Page::from_name(page.name()), Some(*page));
        }
    }

    #[test]
    fn paths_are_unique() {
        let mut paths: Vec<_> = PAGES.iter().map(|p| p.path()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), PAGES.len());
    }

    #[test]
    fn safe_back_accepts_local_pages() {
        assert_eq!(safe_back(Some("/explore?room=tech")), "/explore?room=tech");
        assert_eq!(safe_back(Some("/")), "/");
        assert_eq!(safe_back(Some("/?category=tech")), "/?category=tech");
        assert_eq!(safe_back(Some("/post-detail?id=4")), "/post-detail?id=4");
    }

    #[test]
    fn safe_back_rejects_foreign_targets() {
        assert_eq!(safe_back(None), "/");
        assert_eq!(safe_back(Some("https://evil.example/")), "/");
        assert_eq!(safe_back(Some("//evil.example/")), "/");
        assert_eq!(safe_back(Some("/admin")), "/");
    }
}
