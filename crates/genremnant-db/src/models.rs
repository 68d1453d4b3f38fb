//! Database row types, decoded from result rows by column name.
//! Distinct from the genremnant-types API models so the wire shape can differ
//! from the storage shape (password hashes, snake_case columns).

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use genremnant_types::models::{
    Comment, ContributorRequest, Friendship, FriendshipStatus, Post, PostStatus, PostType, Reaction,
    ReactionType, RequestStatus, Role, Statistics, User, UserStatus,
};

#[derive(Debug, Clone, Deserialize)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: Role,
    pub status: UserStatus,
    pub contributor_request_status: Option<RequestStatus>,
    pub rejection_feedback: Option<String>,
    pub whatsapp: Option<String>,
    pub instagram: Option<String>,
    pub tiktok: Option<String>,
    pub facebook: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserRow {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            role: row.role,
            status: row.status,
            contributor_request_status: row.contributor_request_status,
            rejection_feedback: row.rejection_feedback,
            whatsapp: row.whatsapp,
            instagram: row.instagram,
            tiktok: row.tiktok,
            facebook: row.facebook,
            created_at: row.created_at,
            last_login_at: row.last_login_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostRow {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_name: Option<String>,
    pub post_type: PostType,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub status: PostStatus,
    pub rejection_feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            author_id: row.author_id,
            author_name: row.author_name,
            post_type: row.post_type,
            title: row.title,
            content: row.content,
            summary: row.summary,
            status: row.status,
            rejection_feedback: row.rejection_feedback,
            created_at: row.created_at,
            updated_at: row.updated_at,
            published_at: row.published_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentRow {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub user_name: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            post_id: row.post_id,
            user_id: row.user_id,
            user_name: row.user_name,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReactionRow {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub reaction_type: ReactionType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ReactionRow> for Reaction {
    fn from(row: ReactionRow) -> Self {
        Reaction {
            id: row.id,
            post_id: row.post_id,
            user_id: row.user_id,
            reaction_type: row.reaction_type,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FriendshipRow {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub addressee_id: Uuid,
    pub status: FriendshipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FriendshipRow> for Friendship {
    fn from(row: FriendshipRow) -> Self {
        Friendship {
            id: row.id,
            requester_id: row.requester_id,
            addressee_id: row.addressee_id,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContributorRequestRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub status: RequestStatus,
    pub requested_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub feedback: Option<String>,
}

impl From<ContributorRequestRow> for ContributorRequest {
    fn from(row: ContributorRequestRow) -> Self {
        ContributorRequest {
            id: row.id,
            user_id: row.user_id,
            user_email: row.user_email,
            user_name: row.user_name,
            status: row.status,
            requested_at: row.requested_at,
            reviewed_at: row.reviewed_at,
            reviewed_by: row.reviewed_by,
            feedback: row.feedback,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatisticsRow {
    pub total_users: i64,
    pub regular_users: i64,
    pub contributors: i64,
    pub admins: i64,
    pub suspended_users: i64,
    pub published_posts: i64,
    pub pending_posts: i64,
    pub total_comments: i64,
    pub total_reactions: i64,
}

impl From<StatisticsRow> for Statistics {
    fn from(row: StatisticsRow) -> Self {
        Statistics {
            total_users: row.total_users,
            regular_users: row.regular_users,
            contributors: row.contributors,
            admins: row.admins,
            suspended_users: row.suspended_users,
            published_posts: row.published_posts,
            pending_posts: row.pending_posts,
            total_comments: row.total_comments,
            total_reactions: row.total_reactions,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReactionCountRow {
    pub reaction_type: ReactionType,
    pub count: i64,
}

/// Fields a profile update may change; `None` leaves the column as is.
#[derive(Debug, Default, Clone)]
pub struct ProfileChanges {
    pub display_name: Option<String>,
    pub whatsapp: Option<String>,
    pub instagram: Option<String>,
    pub tiktok: Option<String>,
    pub facebook: Option<String>,
}

/// Partial post edit; `None` leaves the column as is.
#[derive(Debug, Default, Clone)]
pub struct PostChanges {
    pub post_type: Option<PostType>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
}

pub struct NewUser<'a> {
    pub email: &'a str,
    pub display_name: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
}

pub struct NewPost<'a> {
    pub author_id: Uuid,
    pub post_type: PostType,
    pub title: &'a str,
    pub content: &'a str,
    pub summary: Option<&'a str>,
}
