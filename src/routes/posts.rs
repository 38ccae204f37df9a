use std::collections::HashMap;
use std::time::{Duration, Instant};

use askama::Template;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Deserialize;
use serde_json::json;

use crate::api::types::{Ack, CommentList, LikeData, PostData, PostList, ThreadData};
use crate::api::{
    ApiError, ApiResponse, FilePart, MultipartForm, Payload, Reply, RequestOptions,
};
use crate::error::{AppError, AppResult};
use crate::extractors::{Context, SignedIn};
use crate::flash::{Flash, SERVER_ERROR};
use crate::format::{encode_component, relative_time};
use crate::routes::pages::{safe_back, Page};
use crate::routes::{failure_message, page, redirect_to, redirect_with, Html};
use crate::state::AppState;
use crate::views::{
    Chrome, CommentView, LikeButton, PostView, PreviewBody, PreviewKind, PreviewSlot,
    RenderContext, ReplyLine, ThreadBox,
};

const POST_LOAD_ERROR: &str = "خطا در بارگذاری پست";
const FEED_LOAD_ERROR: &str = "خطا در بارگذاری پست‌ها";

/// Rooms offered as tabs above the home feed. The empty id is the full feed.
pub const ROOM_TABS: &[(&str, &str)] = &[("", "همه"), ("general", "عمومی"), ("tech", "تکنولوژی")];

// --- View structs ---

pub struct RoomTab {
    pub name: &'static str,
    pub href: String,
    pub active: bool,
}

fn room_tabs(selected: &str) -> Vec<RoomTab> {
    ROOM_TABS
        .iter()
        .map(|&(id, name)| RoomTab {
            name,
            href: if id.is_empty() {
                Page::Home.path().to_string()
            } else {
                format!("/?category={}", encode_component(id))
            },
            active: id == selected,
        })
        .collect()
}

/// Previews fetched recently, keyed by the referenced post id. Entries expire
/// so edits to the referenced post show up again.
#[derive(Default)]
pub struct PreviewCache {
    entries: HashMap<i64, (Instant, PreviewBody)>,
}

impl PreviewCache {
    const CAPACITY: usize = 512;
    const TTL: Duration = Duration::from_secs(60);

    pub fn get(&self, post_id: i64) -> Option<PreviewBody> {
        self.get_at(post_id, Instant::now())
    }

    pub fn insert(&mut self, post_id: i64, body: PreviewBody) {
        self.insert_at(post_id, body, Instant::now());
    }

    fn get_at(&self, post_id: i64, now: Instant) -> Option<PreviewBody> {
        self.entries
            .get(&post_id)
            .filter(|(stored, _)| now.saturating_duration_since(*stored) < Self::TTL)
            .map(|(_, body)| body.clone())
    }

    fn insert_at(&mut self, post_id: i64, body: PreviewBody, now: Instant) {
        if self.entries.len() >= Self::CAPACITY {
            self.entries
                .retain(|_, (stored, _)| now.saturating_duration_since(*stored) < Self::TTL);
        }
        if self.entries.len() >= Self::CAPACITY {
            self.entries.clear();
        }
        self.entries.insert(post_id, (now, body));
    }
}

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub chrome: Chrome,
    pub signed_in: bool,
    pub tabs: Vec<RoomTab>,
    pub posts: Vec<PostView>,
    pub load_error: Option<&'static str>,
}

#[derive(Template)]
#[template(path = "pages/create_post.html")]
pub struct CreatePostTemplate {
    pub chrome: Chrome,
    pub parent: Option<i64>,
    pub category: String,
    pub require_room: bool,
}

#[derive(Template)]
#[template(path = "pages/post_detail.html")]
pub struct PostDetailTemplate {
    pub chrome: Chrome,
    pub post: PostView,
    pub comments: Vec<CommentView>,
    pub replies: Vec<PostView>,
}

#[derive(Template)]
#[template(path = "components/like_button.html")]
pub struct LikeButtonTemplate {
    pub like: LikeButton,
}

#[derive(Template)]
#[template(path = "components/preview_slot.html")]
pub struct PreviewSlotTemplate {
    pub slot: PreviewSlot,
}

#[derive(Template)]
#[template(path = "components/thread_box.html")]
pub struct ThreadBoxTemplate {
    pub thread: ThreadBox,
}

// --- Forms ---

#[derive(Deserialize)]
pub struct HomeQuery {
    pub category: Option<String>,
}

#[derive(Deserialize)]
pub struct CreatePostQuery {
    pub parent: Option<i64>,
    pub category: Option<String>,
}

#[derive(Deserialize)]
pub struct DetailQuery {
    /// Kept as text so a malformed id lands on the error path instead of a 400.
    pub id: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct ActionForm {
    pub back: Option<String>,
    /// Set by the page script: answer with the changed fragment instead of a redirect.
    pub fragment: Option<String>,
}

#[derive(Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub content: String,
    pub back: Option<String>,
}

#[derive(Deserialize)]
pub struct ToggleQuery {
    #[serde(default)]
    pub open: bool,
    pub back: Option<String>,
}

/// Fields of the create-post form after the multipart body has been read.
#[derive(Debug, Default)]
pub struct NewPost {
    pub content: String,
    pub category: String,
    pub tags: String,
    pub mentions: String,
    pub parent: String,
    pub media: Vec<FilePart>,
}

impl NewPost {
    /// Local checks before anything is sent.
    pub fn validate(&self, require_room: bool) -> Result<(), &'static str> {
        if self.content.trim().is_empty() && self.media.is_empty() {
            return Err("لطفا محتوا یا فایل رسانه‌ای وارد کنید");
        }
        if require_room && self.category.trim().is_empty() {
            return Err("نام اتاق الزامی است");
        }
        Ok(())
    }

    /// The create form again, prefilled with the reply target and room.
    pub fn retry_href(&self) -> String {
        let mut query = Vec::new();
        if let Ok(parent) = self.parent.trim().parse::<i64>() {
            query.push(format!("parent={}", parent));
        }
        let room = self.category.trim();
        if !room.is_empty() {
            query.push(format!("category={}", encode_component(room)));
        }
        if query.is_empty() {
            Page::CreatePost.path().to_string()
        } else {
            format!("{}?{}", Page::CreatePost.path(), query.join("&"))
        }
    }

    pub fn into_form(self) -> MultipartForm {
        let mut form = MultipartForm::new()
            .text("content", self.content)
            .text("category", self.category.trim())
            .text("tags", self.tags)
            .text("mentions", self.mentions);
        if !self.parent.trim().is_empty() {
            form = form.text("parent", self.parent.trim());
        }
        for file in self.media {
            form = form.file(file);
        }
        form
    }

    async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut post = NewPost::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid form: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            if name == "media" {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?;
                // Browsers send an empty part when no file was chosen.
                if file_name.is_empty() && data.is_empty() {
                    continue;
                }
                post.media.push(FilePart {
                    field: "media".to_string(),
                    file_name,
                    content_type,
                    data,
                });
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Invalid form: {}", e)))?;
            match name.as_str() {
                "content" => post.content = value,
                "category" => post.category = value,
                "tags" => post.tags = value,
                "mentions" => post.mentions = value,
                "parent" => post.parent = value,
                _ => {}
            }
        }
        Ok(post)
    }
}

// --- Feed ---

/// GET / — the feed, optionally narrowed to one room tab.
pub async fn home(
    State(state): State<AppState>,
    mut ctx: Context,
    Query(query): Query<HomeQuery>,
) -> Response {
    let category = query.category.unwrap_or_default();
    let tabs = room_tabs(&category);

    if !ctx.signed_in() {
        return page(
            &ctx,
            HomeTemplate {
                chrome: ctx.chrome(),
                signed_in: false,
                tabs,
                posts: Vec::new(),
                load_error: None,
            },
        );
    }

    let (endpoint, back) = if category.is_empty() {
        ("/api/posts/".to_string(), Page::Home.path().to_string())
    } else {
        let encoded = encode_component(&category);
        (
            format!("/api/posts/category/{}/", encoded),
            format!("/?category={}", encoded),
        )
    };

    let result = state.api.get(&endpoint, ctx.options()).await;
    let (posts, load_error) = match ctx.settle::<PostList>(&state, result) {
        Ok(Reply::Success(list)) => {
            let render = RenderContext::new(state.api.base_url(), back);
            (PostView::build_all(&list.posts, &render), None)
        }
        Ok(Reply::Failure(message)) => {
            tracing::warn!("Feed refused: {}", message);
            (Vec::new(), None)
        }
        Err(e) => {
            tracing::error!("Error loading posts: {}", e);
            (Vec::new(), Some(FEED_LOAD_ERROR))
        }
    };

    page(
        &ctx,
        HomeTemplate {
            chrome: ctx.chrome(),
            signed_in: true,
            tabs,
            posts,
            load_error,
        },
    )
}

// --- Create ---

/// GET /create-post — `parent` and `category` prefill a reply.
pub async fn create_post_page(
    State(state): State<AppState>,
    SignedIn(ctx): SignedIn,
    Query(query): Query<CreatePostQuery>,
) -> Response {
    page(
        &ctx,
        CreatePostTemplate {
            chrome: ctx.chrome(),
            parent: query.parent,
            category: query.category.unwrap_or_default(),
            require_room: state.config.posts.require_room,
        },
    )
}

/// POST /create-post (multipart, with optional media files).
pub async fn create_post(
    State(state): State<AppState>,
    SignedIn(mut ctx): SignedIn,
    multipart: Multipart,
) -> AppResult<Response> {
    let new_post = NewPost::read(multipart).await?;
    let retry = new_post.retry_href();

    if let Err(message) = new_post.validate(state.config.posts.require_room) {
        return Ok(redirect_with(&retry, Flash::error(message)));
    }

    let result = state
        .api
        .post(
            "/api/posts/",
            Payload::Multipart(new_post.into_form()),
            ctx.options(),
        )
        .await;
    let outcome = ctx.settle::<Ack>(&state, result);

    Ok(match failure_message(&outcome, "خطا در ایجاد پست") {
        None => redirect_with(Page::Home.path(), Flash::success("پست با موفقیت ایجاد شد!")),
        Some(message) => redirect_with(&retry, Flash::error(message)),
    })
}

// --- Reactions ---

/// POST /posts/{id}/like — the script receives only this post's like button.
pub async fn like(
    State(state): State<AppState>,
    mut ctx: Context,
    Path(id): Path<i64>,
    Form(form): Form<ActionForm>,
) -> Response {
    let endpoint = format!("/api/posts/{}/like/", id);
    let result = state.api.post(&endpoint, Payload::Empty, ctx.options()).await;
    let outcome = ctx.settle::<LikeData>(&state, result);

    if form.fragment.is_some() {
        return match outcome {
            Ok(Reply::Success(data)) => Html(LikeButtonTemplate {
                like: LikeButton {
                    post_id: id,
                    count: data.likes_count,
                },
            })
            .into_response(),
            Ok(Reply::Failure(message)) => (StatusCode::CONFLICT, message).into_response(),
            Err(e) => {
                tracing::error!("Error liking post {}: {}", id, e);
                (StatusCode::BAD_GATEWAY, SERVER_ERROR).into_response()
            }
        };
    }

    let back = safe_back(form.back.as_deref());
    match failure_message(&outcome, SERVER_ERROR) {
        None => redirect_to(&back),
        Some(message) => redirect_with(&back, Flash::error(message)),
    }
}

/// POST /posts/{id}/dislike
pub async fn dislike(
    State(state): State<AppState>,
    ctx: Context,
    Path(id): Path<i64>,
    Form(form): Form<ActionForm>,
) -> Response {
    simple_action(&state, ctx, &format!("/api/posts/{}/dislike/", id), form).await
}

/// POST /posts/{id}/repost
pub async fn repost(
    State(state): State<AppState>,
    ctx: Context,
    Path(id): Path<i64>,
    Form(form): Form<ActionForm>,
) -> Response {
    simple_action(&state, ctx, &format!("/api/posts/{}/repost/", id), form).await
}

async fn simple_action(
    state: &AppState,
    mut ctx: Context,
    endpoint: &str,
    form: ActionForm,
) -> Response {
    let result = state.api.post(endpoint, Payload::Empty, ctx.options()).await;
    let outcome = ctx.settle::<Ack>(state, result);

    let back = safe_back(form.back.as_deref());
    match failure_message(&outcome, SERVER_ERROR) {
        None => redirect_to(&back),
        Some(message) => redirect_with(&back, Flash::error(message)),
    }
}

// --- Detail ---

/// GET /post-detail?id=N — the post, its comments and its direct replies.
pub async fn post_detail(
    State(state): State<AppState>,
    mut ctx: Context,
    Query(query): Query<DetailQuery>,
) -> Response {
    let Some(id) = query.id.and_then(|raw| raw.trim().parse::<i64>().ok()) else {
        return redirect_with(Page::Home.path(), Flash::error(POST_LOAD_ERROR));
    };

    let result = state.api.get(&format!("/api/posts/{}/", id), ctx.options()).await;
    let mut post = match ctx.settle::<PostData>(&state, result) {
        Ok(Reply::Success(data)) => data.post,
        Ok(Reply::Failure(message)) => {
            tracing::warn!("Post {} refused: {}", id, message);
            return redirect_with(Page::Home.path(), Flash::error(POST_LOAD_ERROR));
        }
        Err(e) => {
            tracing::error!("Error loading post detail {}: {}", id, e);
            return redirect_with(Page::Home.path(), Flash::error(POST_LOAD_ERROR));
        }
    };

    // Comments and replies may come inline; whatever is missing is fetched side by side.
    let inline_comments = post.comments.take();
    let inline_replies = post.replies.take();
    let options = ctx.options();
    let (comments_call, thread_call) = futures::future::join(
        fetch_if(
            inline_comments.is_none(),
            &state,
            format!("/api/posts/{}/comments/", id),
            options.clone(),
        ),
        fetch_if(
            inline_replies.is_none(),
            &state,
            format!("/api/posts/{}/thread/", id),
            options,
        ),
    )
    .await;

    let comments = match (inline_comments, comments_call) {
        (Some(comments), _) => comments,
        (None, Some(result)) => match ctx.settle::<CommentList>(&state, result) {
            Ok(Reply::Success(list)) => list.comments,
            Ok(Reply::Failure(message)) => {
                tracing::warn!("Comments for post {} refused: {}", id, message);
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("Comments for post {} unavailable: {}", id, e);
                Vec::new()
            }
        },
        (None, None) => Vec::new(),
    };

    let replies = match (inline_replies, thread_call) {
        (Some(replies), _) => replies,
        (None, Some(result)) => match ctx.settle::<ThreadData>(&state, result) {
            Ok(Reply::Success(data)) => data.thread.replies.unwrap_or_default(),
            Ok(Reply::Failure(message)) => {
                tracing::warn!("Thread of post {} refused: {}", id, message);
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("Thread of post {} unavailable: {}", id, e);
                Vec::new()
            }
        },
        (None, None) => Vec::new(),
    };

    let render = RenderContext::new(
        state.api.base_url(),
        format!("{}?id={}", Page::PostDetail.path(), id),
    );
    page(
        &ctx,
        PostDetailTemplate {
            chrome: ctx.chrome(),
            post: PostView::build(&post, &render),
            comments: comments
                .iter()
                .map(|c| CommentView::build(c, render.now))
                .collect(),
            replies: PostView::build_all(&replies, &render),
        },
    )
}

async fn fetch_if(
    needed: bool,
    state: &AppState,
    endpoint: String,
    options: RequestOptions,
) -> Option<Result<ApiResponse, ApiError>> {
    if needed {
        Some(state.api.get(&endpoint, options).await)
    } else {
        None
    }
}

/// POST /posts/{id}/comment — the detail page is reloaded as a whole afterwards.
pub async fn comment(
    State(state): State<AppState>,
    mut ctx: Context,
    Path(id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> Response {
    let detail = format!("{}?id={}", Page::PostDetail.path(), id);
    let back = match form.back.as_deref() {
        Some(raw) => safe_back(Some(raw)),
        None => detail,
    };

    let content = form.content.trim();
    if content.is_empty() {
        return redirect_with(&back, Flash::error("لطفا متن کامنت را وارد کنید"));
    }

    let result = state
        .api
        .post(
            &format!("/api/posts/{}/comment/", id),
            Payload::Json(json!({ "content": content })),
            ctx.options(),
        )
        .await;
    let outcome = ctx.settle::<Ack>(&state, result);

    match failure_message(&outcome, "خطا در ثبت کامنت") {
        None => redirect_with(&back, Flash::success("کامنت با موفقیت ثبت شد")),
        Some(message) => redirect_with(&back, Flash::error(message)),
    }
}

// --- Toggles ---

/// GET /posts/{id}/preview/{kind}/{target}?open=bool
///
/// Opening fills the slot with the referenced post (fetched once, then cached);
/// closing returns the same empty slot the card started with.
pub async fn preview(
    State(state): State<AppState>,
    mut ctx: Context,
    Path((id, kind, target)): Path<(i64, String, i64)>,
    Query(query): Query<ToggleQuery>,
) -> AppResult<Response> {
    let kind = PreviewKind::from_slug(&kind).ok_or(AppError::NotFound)?;
    let mut slot = PreviewSlot::collapsed(id, kind, target);

    if query.open {
        slot.preview = load_preview(&state, &mut ctx, target).await;
    }

    Ok(Html(PreviewSlotTemplate { slot }).into_response())
}

async fn load_preview(state: &AppState, ctx: &mut Context, target: i64) -> Option<PreviewBody> {
    if let Some(cached) = state.previews.lock().await.get(target) {
        return Some(cached);
    }

    let result = state
        .api
        .get(&format!("/api/posts/{}/", target), ctx.options())
        .await;
    match ctx.settle::<PostData>(state, result) {
        Ok(Reply::Success(data)) => {
            let body = PreviewBody {
                author: data.post.display_author().username().to_string(),
                content: data.post.content,
            };
            state.previews.lock().await.insert(target, body.clone());
            Some(body)
        }
        Ok(Reply::Failure(message)) => {
            tracing::warn!("Preview of post {} refused: {}", target, message);
            None
        }
        Err(e) => {
            tracing::error!("Error loading preview of post {}: {}", target, e);
            None
        }
    }
}

/// GET /posts/{id}/thread-box?open=bool — comment box plus direct replies.
pub async fn thread_box(
    State(state): State<AppState>,
    mut ctx: Context,
    Path(id): Path<i64>,
    Query(query): Query<ToggleQuery>,
) -> Response {
    let back = safe_back(query.back.as_deref());
    let mut thread = ThreadBox::collapsed(id, back);

    if query.open {
        thread.open = true;
        let result = state
            .api
            .get(&format!("/api/posts/{}/thread/", id), ctx.options())
            .await;
        if let Ok(Reply::Success(data)) = ctx.settle::<ThreadData>(&state, result) {
            let now = chrono::Utc::now();
            thread.replies = data
                .thread
                .replies
                .unwrap_or_default()
                .iter()
                .map(|r| ReplyLine {
                    author: r.display_author().username().to_string(),
                    content: r.content.clone(),
                    created: relative_time(&r.created_at, now),
                })
                .collect();
        }
    }

    Html(ThreadBoxTemplate { thread }).into_response()
}
