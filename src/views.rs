//! View models handed to the askama templates.
//!
//! Everything here is plain data; escaping happens in the templates.

use chrono::{DateTime, Utc};

use crate::api::types::{Comment, Post, User};
use crate::flash::Flash;
use crate::format::{encode_component, media_url, relative_time};

/// Inputs shared by every card on a page.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub api_base: String,
    pub now: DateTime<Utc>,
    /// Where action forms return to when scripting is off.
    pub back: String,
}

impl RenderContext {
    pub fn new(api_base: &str, back: impl Into<String>) -> Self {
        Self {
            api_base: api_base.to_string(),
            now: Utc::now(),
            back: back.into(),
        }
    }
}

/// Navigation bar state: either the auth buttons or the user menu is shown.
#[derive(Debug, Clone, Default)]
pub struct NavView {
    pub signed_in: bool,
    pub username: String,
    pub profile_href: String,
}

impl NavView {
    pub fn for_user(user: Option<&User>) -> Self {
        match user {
            Some(user) => Self {
                signed_in: true,
                username: user.username.clone(),
                profile_href: profile_href(&user.username),
            },
            None => Self::default(),
        }
    }
}

/// Parts of the layout common to all pages.
#[derive(Debug, Clone, Default)]
pub struct Chrome {
    pub nav: NavView,
    pub flash: Option<Flash>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    File,
}

impl MediaKind {
    /// Accepts both short kinds ("image") and MIME types ("image/png").
    pub fn classify(raw: &str) -> Self {
        let major = raw.split('/').next().unwrap_or("");
        match major {
            "image" => MediaKind::Image,
            "video" => MediaKind::Video,
            "audio" => MediaKind::Audio,
            _ => MediaKind::File,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaView {
    pub url: String,
    pub kind: MediaKind,
}

impl MediaView {
    pub fn is_image(&self) -> bool {
        self.kind == MediaKind::Image
    }
    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }
    pub fn is_audio(&self) -> bool {
        self.kind == MediaKind::Audio
    }
}

/// The like button of one card. Rendered alone when a like is toggled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeButton {
    pub post_id: i64,
    pub count: i64,
}

impl LikeButton {
    pub fn liked(&self) -> bool {
        self.count > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewKind {
    Parent,
    Original,
}

impl PreviewKind {
    pub fn slug(&self) -> &'static str {
        match self {
            PreviewKind::Parent => "parent",
            PreviewKind::Original => "original",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "parent" => Some(PreviewKind::Parent),
            "original" => Some(PreviewKind::Original),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PreviewKind::Parent => "↩️ ریپلای به",
            PreviewKind::Original => "🔄 ری‌پست از",
        }
    }

    pub fn heading(&self) -> &'static str {
        match self {
            PreviewKind::Parent => "پست والد",
            PreviewKind::Original => "پست اصلی",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewBody {
    pub author: String,
    pub content: String,
}

/// Provenance line with a lazily filled, collapsible preview of the referenced post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSlot {
    pub owner_id: i64,
    pub kind: PreviewKind,
    pub target_id: i64,
    pub preview: Option<PreviewBody>,
}

impl PreviewSlot {
    pub fn collapsed(owner_id: i64, kind: PreviewKind, target_id: i64) -> Self {
        Self {
            owner_id,
            kind,
            target_id,
            preview: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.preview.is_some()
    }

    pub fn dom_id(&self) -> String {
        format!("preview-{}-{}", self.owner_id, self.kind.slug())
    }

    /// URL that flips the slot to its other state.
    pub fn toggle_href(&self) -> String {
        format!(
            "/posts/{}/preview/{}/{}?open={}",
            self.owner_id,
            self.kind.slug(),
            self.target_id,
            !self.is_open()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine {
    pub author: String,
    pub content: String,
    pub created: String,
}

/// Inline comment box with the post's direct replies, collapsed until toggled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadBox {
    pub post_id: i64,
    pub open: bool,
    /// Page the comment form returns to.
    pub back: String,
    pub replies: Vec<ReplyLine>,
}

impl ThreadBox {
    pub fn collapsed(post_id: i64, back: impl Into<String>) -> Self {
        Self {
            post_id,
            open: false,
            back: back.into(),
            replies: Vec::new(),
        }
    }

    pub fn dom_id(&self) -> String {
        format!("thread-{}", self.post_id)
    }

    pub fn toggle_href(&self) -> String {
        format!(
            "/posts/{}/thread-box?open={}&back={}",
            self.post_id,
            !self.open,
            encode_component(&self.back)
        )
    }
}

#[derive(Debug, Clone)]
pub struct PostView {
    pub id: i64,
    pub author: String,
    pub author_href: String,
    pub avatar: Option<String>,
    pub created: String,
    pub content: String,
    pub media: Vec<MediaView>,
    pub tags: Vec<String>,
    pub mentions: Vec<String>,
    pub room: Option<String>,
    pub room_href: String,
    pub like: LikeButton,
    pub dislikes: i64,
    pub comments: i64,
    pub reposts: i64,
    pub replies: i64,
    pub repost_slot: Option<PreviewSlot>,
    pub reply_slot: Option<PreviewSlot>,
    pub thread: ThreadBox,
    pub detail_href: String,
    pub reply_href: String,
    pub back: String,
}

impl PostView {
    pub fn build(post: &Post, ctx: &RenderContext) -> Self {
        let author = post.display_author();
        let username = author.username().to_string();
        let room = post.room().map(str::to_string);

        let mut reply_href = format!("/create-post?parent={}", post.id);
        if let Some(room) = &room {
            reply_href.push_str("&category=");
            reply_href.push_str(&encode_component(room));
        }

        Self {
            id: post.id,
            author_href: profile_href(&username),
            avatar: author
                .profile_picture()
                .map(|pic| media_url(&ctx.api_base, pic)),
            author: username,
            created: relative_time(&post.created_at, ctx.now),
            content: post.content.clone(),
            media: post
                .media
                .iter()
                .filter(|m| !m.url.is_empty())
                .map(|m| MediaView {
                    url: media_url(&ctx.api_base, &m.url),
                    kind: MediaKind::classify(&m.kind),
                })
                .collect(),
            tags: post.tags.iter().filter(|t| !t.is_empty()).cloned().collect(),
            mentions: post.mentions.clone(),
            room_href: room.as_deref().map(room_href).unwrap_or_default(),
            room,
            like: LikeButton {
                post_id: post.id,
                count: post.likes_count,
            },
            dislikes: post.dislikes_count,
            comments: post.comments_count,
            reposts: post.reposts_count,
            replies: post.replies_count,
            repost_slot: post
                .original_post_id
                .map(|target| PreviewSlot::collapsed(post.id, PreviewKind::Original, target)),
            reply_slot: post
                .parent_id
                .map(|target| PreviewSlot::collapsed(post.id, PreviewKind::Parent, target)),
            thread: ThreadBox::collapsed(post.id, ctx.back.clone()),
            detail_href: format!("/post-detail?id={}", post.id),
            reply_href,
            back: ctx.back.clone(),
        }
    }

    pub fn build_all(posts: &[Post], ctx: &RenderContext) -> Vec<Self> {
        posts.iter().map(|p| Self::build(p, ctx)).collect()
    }

    /// Borrowed for the card template, which shares the component with the toggle endpoint.
    pub fn thread_box(&self) -> &ThreadBox {
        &self.thread
    }
}

#[derive(Debug, Clone)]
pub struct CommentView {
    pub author: String,
    pub author_href: String,
    pub created: String,
    pub content: String,
}

impl CommentView {
    pub fn build(comment: &Comment, now: DateTime<Utc>) -> Self {
        let author = comment.user.username().to_string();
        Self {
            author_href: profile_href(&author),
            author,
            created: relative_time(&comment.created_at, now),
            content: comment.content.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProfileView {
    pub username: String,
    pub display_name: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub href: String,
    pub all_posts_href: String,
}

impl ProfileView {
    pub fn build(user: &User, api_base: &str) -> Self {
        Self {
            username: user.username.clone(),
            display_name: user.display_name(),
            avatar: user
                .profile_picture
                .as_deref()
                .filter(|p| !p.is_empty())
                .map(|p| media_url(api_base, p)),
            bio: user.bio.clone().filter(|b| !b.is_empty()),
            href: profile_href(&user.username),
            all_posts_href: format!("/user-posts?user={}", encode_component(&user.username)),
        }
    }
}

pub fn profile_href(username: &str) -> String {
    format!("/profile?user={}", encode_component(username))
}

pub fn room_href(room: &str) -> String {
    format!("/explore?room={}", encode_component(room))
}
