use askama::Template;
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;

use crate::api::types::{CategoryPosts, ProfileData, User, UserPosts};
use crate::api::{ApiError, Reply};
use crate::extractors::Context;
use crate::flash::{Flash, LOGIN_REQUIRED};
use crate::format::encode_component;
use crate::routes::pages::Page;
use crate::routes::{page, redirect_to, redirect_with};
use crate::state::AppState;
use crate::views::{profile_href, room_href, Chrome, PostView, ProfileView, RenderContext};

const USER_NOT_FOUND: &str = "کاربر یافت نشد";

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub chrome: Chrome,
    pub profile: ProfileView,
    pub is_self: bool,
    pub posts: Vec<PostView>,
    pub total: usize,
    pub has_more: bool,
}

#[derive(Template)]
#[template(path = "pages/user_posts.html")]
pub struct UserPostsTemplate {
    pub chrome: Chrome,
    pub profile: ProfileView,
    pub posts: Vec<PostView>,
}

#[derive(Template)]
#[template(path = "pages/explore.html")]
pub struct ExploreTemplate {
    pub chrome: Chrome,
    pub room: Option<String>,
    pub posts: Vec<PostView>,
}

#[derive(Template)]
#[template(path = "pages/search.html")]
pub struct SearchTemplate {
    pub chrome: Chrome,
}

#[derive(Deserialize)]
pub struct UserQuery {
    pub user: Option<String>,
}

#[derive(Deserialize)]
pub struct RoomQuery {
    pub room: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub username: Option<String>,
}

/// A user's listing as shown on their pages.
struct Listing {
    owner: User,
    posts: Vec<PostView>,
}

enum Lookup {
    Found(Listing),
    Missing,
    Unreachable(ApiError),
}

/// The explicit `user` parameter, or the signed-in visitor when absent.
fn target_user(ctx: &Context, query: UserQuery) -> Option<String> {
    query
        .user
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .or_else(|| ctx.username().map(str::to_string))
}

async fn load_listing(state: &AppState, ctx: &mut Context, username: &str, back: String) -> Lookup {
    let endpoint = format!("/api/users/{}/posts/", encode_component(username));
    let result = state.api.get(&endpoint, ctx.options()).await;
    match ctx.settle::<UserPosts>(state, result) {
        Ok(Reply::Success(data)) => {
            let render = RenderContext::new(state.api.base_url(), back);
            Lookup::Found(Listing {
                owner: data.owner(username),
                posts: PostView::build_all(&data.posts, &render),
            })
        }
        Ok(Reply::Failure(message)) => {
            tracing::info!("User {} not found: {}", username, message);
            Lookup::Missing
        }
        // A 404 page from the backend is "no such user", not an outage.
        Err(ApiError::UnexpectedBody { status }) if status == 404 => Lookup::Missing,
        Err(e) => Lookup::Unreachable(e),
    }
}

/// GET /profile?user=NAME — header plus the first few posts.
pub async fn profile(
    State(state): State<AppState>,
    mut ctx: Context,
    Query(query): Query<UserQuery>,
) -> Response {
    let Some(username) = target_user(&ctx, query) else {
        return redirect_with(Page::Login.path(), Flash::error(LOGIN_REQUIRED));
    };
    let is_self = ctx.username() == Some(username.as_str());

    let listing = match load_listing(&state, &mut ctx, &username, profile_href(&username)).await {
        Lookup::Found(listing) => listing,
        Lookup::Missing => return redirect_with(Page::Home.path(), Flash::error(USER_NOT_FOUND)),
        Lookup::Unreachable(e) => {
            tracing::error!("Error loading profile {}: {}", username, e);
            return redirect_with(Page::Home.path(), Flash::error("خطا در بارگذاری پروفایل"));
        }
    };

    let mut owner = listing.owner;
    if is_self {
        let result = state.api.get("/api/profile/", ctx.options()).await;
        match ctx.settle::<ProfileData>(&state, result) {
            Ok(Reply::Success(data)) => owner.merge(data.user),
            Ok(Reply::Failure(message)) => tracing::warn!("Own profile refused: {}", message),
            Err(e) => tracing::warn!("Own profile unavailable: {}", e),
        }
    }

    let total = listing.posts.len();
    let mut posts = listing.posts;
    posts.truncate(state.config.posts.preview_limit);

    page(
        &ctx,
        ProfileTemplate {
            chrome: ctx.chrome(),
            profile: ProfileView::build(&owner, state.api.base_url()),
            is_self,
            has_more: total > posts.len(),
            posts,
            total,
        },
    )
}

/// GET /user-posts?user=NAME — every post of one user.
pub async fn user_posts(
    State(state): State<AppState>,
    mut ctx: Context,
    Query(query): Query<UserQuery>,
) -> Response {
    let Some(username) = target_user(&ctx, query) else {
        return redirect_with(Page::Login.path(), Flash::error(LOGIN_REQUIRED));
    };

    let back = format!("{}?user={}", Page::UserPosts.path(), encode_component(&username));
    match load_listing(&state, &mut ctx, &username, back).await {
        Lookup::Found(listing) => page(
            &ctx,
            UserPostsTemplate {
                chrome: ctx.chrome(),
                profile: ProfileView::build(&listing.owner, state.api.base_url()),
                posts: listing.posts,
            },
        ),
        Lookup::Missing => redirect_with(Page::Home.path(), Flash::error(USER_NOT_FOUND)),
        Lookup::Unreachable(e) => {
            tracing::error!("Error loading posts of {}: {}", username, e);
            redirect_with(Page::Home.path(), Flash::error("خطا در بارگذاری پست‌ها"))
        }
    }
}

/// GET /explore?room=NAME — one room's feed. Without a room only the picker is shown.
pub async fn explore(
    State(state): State<AppState>,
    mut ctx: Context,
    Query(query): Query<RoomQuery>,
) -> Response {
    let Some(room) = query.room.map(|r| r.trim().to_string()) else {
        return page(
            &ctx,
            ExploreTemplate {
                chrome: ctx.chrome(),
                room: None,
                posts: Vec::new(),
            },
        );
    };
    if room.is_empty() {
        return redirect_with(Page::Explore.path(), Flash::error("لطفا نام اتاق را وارد کنید"));
    }

    let endpoint = format!("/api/posts/category/{}/", encode_component(&room));
    let result = state.api.get(&endpoint, ctx.options()).await;
    let posts = match ctx.settle::<CategoryPosts>(&state, result) {
        Ok(Reply::Success(data)) => {
            let render = RenderContext::new(state.api.base_url(), room_href(&room));
            PostView::build_all(&data.posts, &render)
        }
        Ok(Reply::Failure(message)) => {
            return redirect_with(Page::Explore.path(), Flash::error(message));
        }
        Err(e) => {
            tracing::error!("Error loading room {}: {}", room, e);
            return redirect_with(Page::Explore.path(), Flash::error("خطا در بارگذاری اتاق"));
        }
    };

    page(
        &ctx,
        ExploreTemplate {
            chrome: ctx.chrome(),
            room: Some(room),
            posts,
        },
    )
}

/// GET /search?username=NAME — probes the user's posts and jumps to the profile.
pub async fn search(
    State(state): State<AppState>,
    mut ctx: Context,
    Query(query): Query<SearchQuery>,
) -> Response {
    let Some(username) = query.username.map(|u| u.trim().to_string()) else {
        return page(&ctx, SearchTemplate { chrome: ctx.chrome() });
    };
    if username.is_empty() {
        return redirect_with(Page::Search.path(), Flash::error("لطفا نام کاربری را وارد کنید"));
    }

    match load_listing(&state, &mut ctx, &username, profile_href(&username)).await {
        Lookup::Found(_) => redirect_to(&profile_href(&username)),
        Lookup::Missing => {
            redirect_with(Page::Search.path(), Flash::error("کاربری با این نام یافت نشد"))
        }
        Lookup::Unreachable(e) => {
            tracing::error!("Search for {} failed: {}", username, e);
            redirect_with(Page::Search.path(), Flash::error("خطا در جستجو"))
        }
    }
}
