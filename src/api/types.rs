use serde::{Deserialize, Serialize};

/// A user reference as the backend serializes it: a bare username, a nested
/// object carrying the avatar as well, or the numeric user key that some
/// serializers send next to a separate `author_info` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Author {
    Key(i64),
    Name(String),
    Info {
        username: String,
        #[serde(default)]
        profile_picture: Option<String>,
    },
}

impl Author {
    pub fn username(&self) -> &str {
        match self {
            Author::Key(_) => "",
            Author::Name(name) => name,
            Author::Info { username, .. } => username,
        }
    }

    pub fn profile_picture(&self) -> Option<&str> {
        match self {
            Author::Key(_) | Author::Name(_) => None,
            Author::Info {
                profile_picture, ..
            } => profile_picture.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub author: Author,
    /// Some deployments send the richer author object separately.
    #[serde(default)]
    pub author_info: Option<Author>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub likes_count: i64,
    #[serde(default)]
    pub dislikes_count: i64,
    #[serde(default)]
    pub comments_count: i64,
    #[serde(default)]
    pub reposts_count: i64,
    #[serde(default)]
    pub replies_count: i64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default)]
    pub media: Vec<Media>,
    #[serde(default)]
    pub is_repost: bool,
    #[serde(default)]
    pub original_post_id: Option<i64>,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub comments: Option<Vec<Comment>>,
    #[serde(default)]
    pub replies: Option<Vec<Post>>,
}

impl Post {
    /// The author reference to display, preferring `author_info` when present.
    pub fn display_author(&self) -> &Author {
        self.author_info.as_ref().unwrap_or(&self.author)
    }

    pub fn room(&self) -> Option<&str> {
        self.category.as_deref().filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub id: Option<i64>,
    pub user: Author,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

impl User {
    pub fn bare(username: &str) -> Self {
        Self {
            id: None,
            username: username.to_string(),
            email: None,
            first_name: None,
            last_name: None,
            bio: None,
            profile_picture: None,
        }
    }

    /// "First Last" when either part is set, otherwise the username.
    pub fn display_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        let full = format!("{} {}", first, last).trim().to_string();
        if full.is_empty() {
            self.username.clone()
        } else {
            full
        }
    }

    /// Overlay the non-empty fields of `richer` onto `self`.
    pub fn merge(&mut self, richer: User) {
        fn take(slot: &mut Option<String>, value: Option<String>) {
            if let Some(v) = value {
                *slot = Some(v);
            }
        }
        if !richer.username.is_empty() {
            self.username = richer.username;
        }
        if richer.id.is_some() {
            self.id = richer.id;
        }
        take(&mut self.email, richer.email);
        take(&mut self.first_name, richer.first_name);
        take(&mut self.last_name, richer.last_name);
        take(&mut self.bio, richer.bio);
        take(&mut self.profile_picture, richer.profile_picture);
    }
}

// -- Endpoint payloads (the `success`/`message` envelope is read separately) --

#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct ProfileData {
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct PostList {
    #[serde(default)]
    pub posts: Vec<Post>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryPosts {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub posts: Vec<Post>,
}

#[derive(Debug, Deserialize)]
pub struct UserPosts {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub posts: Vec<Post>,
}

impl UserPosts {
    /// Owner of the listing, falling back to the requested name.
    pub fn owner(&self, requested: &str) -> User {
        if let Some(user) = &self.user {
            return user.clone();
        }
        User::bare(self.username.as_deref().unwrap_or(requested))
    }
}

#[derive(Debug, Deserialize)]
pub struct PostData {
    pub post: Post,
}

#[derive(Debug, Deserialize)]
pub struct ThreadData {
    pub thread: Post,
}

#[derive(Debug, Deserialize)]
pub struct CommentList {
    #[serde(default)]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Deserialize)]
pub struct LikeData {
    pub likes_count: i64,
}

/// Envelope-only payload for calls whose body carries nothing else of interest.
#[derive(Debug, Deserialize)]
pub struct Ack {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn author_accepts_string_and_object() {
        let plain: Author = serde_json::from_value(json!("sara")).unwrap();
        assert_eq!(plain.username(), "sara");
        assert_eq!(plain.profile_picture(), None);

        let nested: Author = serde_json::from_value(json!({
            "username": "ali",
            "profile_picture": "/media/ali.png"
        }))
        .unwrap();
        assert_eq!(nested.username(), "ali");
        assert_eq!(nested.profile_picture(), Some("/media/ali.png"));
    }

    #[test]
    fn numeric_author_defers_to_author_info() {
        let post: Post = serde_json::from_value(json!({
            "id": 4,
            "author": 3,
            "author_info": {"username": "ali", "profile_picture": null}
        }))
        .unwrap();
        assert_eq!(post.author, Author::Key(3));
        assert_eq!(post.display_author().username(), "ali");
    }

    #[test]
    fn post_tolerates_missing_optional_sections() {
        let post: Post = serde_json::from_value(json!({
            "id": 3,
            "author": "sara",
            "content": "hi",
            "created_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(post.tags.is_empty());
        assert!(post.media.is_empty());
        assert_eq!(post.parent_id, None);
        assert_eq!(post.room(), None);
    }

    #[test]
    fn post_can_be_reply_and_repost() {
        let post: Post = serde_json::from_value(json!({
            "id": 9,
            "author": {"username": "ali", "profile_picture": null},
            "is_repost": true,
            "original_post_id": 2,
            "parent_id": 5,
            "category": ""
        }))
        .unwrap();
        assert_eq!(post.original_post_id, Some(2));
        assert_eq!(post.parent_id, Some(5));
        assert_eq!(post.room(), None);
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let mut user = User::bare("sara");
        assert_eq!(user.display_name(), "sara");
        user.first_name = Some("Sara".into());
        user.last_name = Some("".into());
        assert_eq!(user.display_name(), "Sara");
    }

    #[test]
    fn merge_overlays_richer_fields() {
        let mut user = User::bare("sara");
        let mut richer = User::bare("sara");
        richer.bio = Some("hello".into());
        richer.profile_picture = Some("/media/s.png".into());
        user.merge(richer);
        assert_eq!(user.bio.as_deref(), Some("hello"));
        assert_eq!(user.profile_picture.as_deref(), Some("/media/s.png"));
    }

    #[test]
    fn user_posts_owner_prefers_nested_user() {
        let data: UserPosts = serde_json::from_value(json!({
            "success": true,
            "username": "flat",
            "user": {"username": "nested", "bio": "b"},
            "posts": []
        }))
        .unwrap();
        assert_eq!(data.owner("asked").username, "nested");

        let flat: UserPosts =
            serde_json::from_value(json!({"success": true, "username": "flat"})).unwrap();
        assert_eq!(flat.owner("asked").username, "flat");
    }
}
