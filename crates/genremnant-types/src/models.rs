use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error returned when a stored or submitted string is not a known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// Declares a closed string enum stored as lowercase text in the database and
/// sent as the same text over JSON.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }
    };
}

string_enum!(Role, "role", {
    Regular => "regular",
    Contributor => "contributor",
    Admin => "admin",
});

string_enum!(UserStatus, "user status", {
    Active => "active",
    Suspended => "suspended",
    Inactive => "inactive",
});

string_enum!(
    /// Resolution state of a role-upgrade request.
    RequestStatus, "request status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

string_enum!(PostType, "post type", {
    Sermon => "sermon",
    DailyMotivation => "daily_motivation",
});

string_enum!(
    /// Moderation state. Only `Published` posts are publicly visible.
    PostStatus, "post status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Published => "published",
});

string_enum!(ReactionType, "reaction type", {
    Like => "like",
    Heart => "heart",
    Amen => "amen",
    Inspire => "inspire",
});

string_enum!(FriendshipStatus, "friendship status", {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
});

string_enum!(
    /// Social handles a user can attach to their profile.
    SocialChannel, "social channel", {
    Whatsapp => "whatsapp",
    Instagram => "instagram",
    Tiktok => "tiktok",
    Facebook => "facebook",
});

impl Role {
    /// Roles allowed to author posts.
    pub fn can_author(&self) -> bool {
        matches!(self, Role::Contributor | Role::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub status: UserStatus,
    pub contributor_request_status: Option<RequestStatus>,
    pub rejection_feedback: Option<String>,
    pub whatsapp: Option<String>,
    pub instagram: Option<String>,
    pub tiktok: Option<String>,
    pub facebook: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_name: Option<String>,
    #[serde(rename = "type")]
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

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub user_name: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub reaction_type: ReactionType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friendship {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub addressee_id: Uuid,
    pub status: FriendshipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributorRequest {
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

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
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
