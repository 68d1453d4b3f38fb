use chrono::{DateTime, Utc};
use uuid::Uuid;

use genremnant_types::models::{
    FriendshipStatus, PostStatus, ReactionType, RequestStatus, Role, SocialChannel, Statistics, UserStatus,
};

use crate::error::{DbError, Result};
use crate::models::{
    CommentRow, ContributorRequestRow, FriendshipRow, NewPost, NewUser, PostChanges, PostRow,
    ProfileChanges, ReactionCountRow, ReactionRow, StatisticsRow, UserRow,
};
use crate::{Database, now, params, timestamp};

const POST_SELECT: &str = "SELECT p.*, u.display_name AS author_name
     FROM posts p LEFT JOIN users u ON u.id = p.author_id";

const COMMENT_SELECT: &str = "SELECT c.*, u.display_name AS user_name
     FROM comments c LEFT JOIN users u ON u.id = c.user_id";

const REQUEST_SELECT: &str = "SELECT r.*, u.email AS user_email, u.display_name AS user_name
     FROM contributor_requests r LEFT JOIN users u ON u.id = r.user_id";

impl Database {
    // -- Users --

    pub async fn create_user(&self, user: NewUser<'_>) -> Result<UserRow> {
        let id = Uuid::new_v4();
        let ts = now();
        self.fetch_optional(
            "INSERT INTO users (id, email, display_name, password_hash, role, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             RETURNING *",
            params![id, user.email, user.display_name, user.password_hash, user.role, UserStatus::Active, ts],
        )
        .await?
        .ok_or(DbError::MissingRow("user"))
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.fetch_optional("SELECT * FROM users WHERE id = ?1", params![id]).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.fetch_optional("SELECT * FROM users WHERE email = ?1", params![email])
            .await
    }

    pub async fn record_login(&self, id: Uuid) -> Result<()> {
        self.execute("UPDATE users SET last_login_at = ?2 WHERE id = ?1", params![id, now()])
            .await?;
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<UserRow>> {
        self.fetch_all("SELECT * FROM users ORDER BY created_at DESC", params![])
            .await
    }

    /// Everyone except `id`, for friend discovery.
    pub async fn list_other_users(&self, id: Uuid) -> Result<Vec<UserRow>> {
        self.fetch_all(
            "SELECT * FROM users WHERE id != ?1 AND status = 'active' ORDER BY display_name",
            params![id],
        )
        .await
    }

    pub async fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> Result<Option<UserRow>> {
        self.fetch_optional(
            "UPDATE users SET
                display_name = COALESCE(?2, display_name),
                whatsapp = COALESCE(?3, whatsapp),
                instagram = COALESCE(?4, instagram),
                tiktok = COALESCE(?5, tiktok),
                facebook = COALESCE(?6, facebook),
                updated_at = ?7
             WHERE id = ?1
             RETURNING *",
            params![
                id,
                changes.display_name,
                changes.whatsapp,
                changes.instagram,
                changes.tiktok,
                changes.facebook,
                now()
            ],
        )
        .await
    }

    /// Set or clear one social handle.
    pub async fn set_social_handle(
        &self,
        id: Uuid,
        channel: SocialChannel,
        value: Option<&str>,
    ) -> Result<Option<UserRow>> {
        // Column name comes from a closed enum, never from input
        let sql = format!(
            "UPDATE users SET {} = ?2, updated_at = ?3 WHERE id = ?1 RETURNING *",
            channel.as_str()
        );
        self.fetch_optional(&sql, params![id, value, now()]).await
    }

    pub async fn set_user_role(&self, id: Uuid, role: Role) -> Result<Option<UserRow>> {
        self.fetch_optional(
            "UPDATE users SET role = ?2, updated_at = ?3 WHERE id = ?1 RETURNING *",
            params![id, role, now()],
        )
        .await
    }

    pub async fn set_user_status(&self, id: Uuid, status: UserStatus) -> Result<Option<UserRow>> {
        self.fetch_optional(
            "UPDATE users SET status = ?2, updated_at = ?3 WHERE id = ?1 RETURNING *",
            params![id, status, now()],
        )
        .await
    }

    /// Remove a user with everything they own. Returns false if no such user.
    pub async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let p = params![id];
        self.execute(
            "DELETE FROM comments
             WHERE user_id = ?1 OR post_id IN (SELECT id FROM posts WHERE author_id = ?1)",
            p.clone(),
        )
        .await?;
        self.execute(
            "DELETE FROM reactions
             WHERE user_id = ?1 OR post_id IN (SELECT id FROM posts WHERE author_id = ?1)",
            p.clone(),
        )
        .await?;
        self.execute(
            "DELETE FROM friendships WHERE requester_id = ?1 OR addressee_id = ?1",
            p.clone(),
        )
        .await?;
        self.execute("DELETE FROM contributor_requests WHERE user_id = ?1", p.clone())
            .await?;
        self.execute("DELETE FROM posts WHERE author_id = ?1", p.clone())
            .await?;
        let removed = self
            .execute("DELETE FROM users WHERE id = ?1 RETURNING id", p)
            .await?;
        Ok(removed > 0)
    }

    // -- Contributor requests --

    /// Open (or reopen) a pending role-upgrade request for `user_id`.
    pub async fn create_contributor_request(&self, user_id: Uuid) -> Result<()> {
        let ts = now();
        self.execute(
            "INSERT INTO contributor_requests (id, user_id, status, requested_at)
             VALUES (?1, ?2, 'pending', ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                status = 'pending',
                requested_at = excluded.requested_at,
                reviewed_at = NULL,
                reviewed_by = NULL,
                feedback = NULL",
            params![Uuid::new_v4(), user_id, ts],
        )
        .await?;
        self.execute(
            "UPDATE users SET contributor_request_status = 'pending', rejection_feedback = NULL, updated_at = ?2
             WHERE id = ?1",
            params![user_id, ts],
        )
        .await?;
        Ok(())
    }

    pub async fn pending_contributor_requests(&self) -> Result<Vec<ContributorRequestRow>> {
        let sql = format!("{} WHERE r.status = 'pending' ORDER BY r.requested_at ASC", REQUEST_SELECT);
        self.fetch_all(&sql, params![]).await
    }

    pub async fn approve_contributor(&self, user_id: Uuid, reviewer: Uuid) -> Result<Option<UserRow>> {
        let ts = now();
        let user = self
            .fetch_optional(
                "UPDATE users SET
                    role = ?2,
                    contributor_request_status = ?3,
                    rejection_feedback = NULL,
                    updated_at = ?4
                 WHERE id = ?1
                 RETURNING *",
                params![user_id, Role::Contributor, RequestStatus::Approved, ts],
            )
            .await?;
        if user.is_some() {
            self.review_contributor_request(user_id, reviewer, RequestStatus::Approved, None, &ts)
                .await?;
        }
        Ok(user)
    }

    pub async fn reject_contributor(
        &self,
        user_id: Uuid,
        reviewer: Uuid,
        feedback: Option<&str>,
    ) -> Result<Option<UserRow>> {
        let ts = now();
        let user = self
            .fetch_optional(
                "UPDATE users SET contributor_request_status = ?2, rejection_feedback = ?3, updated_at = ?4
                 WHERE id = ?1
                 RETURNING *",
                params![user_id, RequestStatus::Rejected, feedback, ts],
            )
            .await?;
        if user.is_some() {
            self.review_contributor_request(user_id, reviewer, RequestStatus::Rejected, feedback, &ts)
                .await?;
        }
        Ok(user)
    }

    async fn review_contributor_request(
        &self,
        user_id: Uuid,
        reviewer: Uuid,
        status: RequestStatus,
        feedback: Option<&str>,
        ts: &str,
    ) -> Result<()> {
        self.execute(
            "UPDATE contributor_requests SET status = ?2, reviewed_at = ?3, reviewed_by = ?4, feedback = ?5
             WHERE user_id = ?1",
            params![user_id, status, ts, reviewer, feedback],
        )
        .await?;
        Ok(())
    }

    // -- Posts --

    pub async fn create_post(&self, post: NewPost<'_>) -> Result<PostRow> {
        let id = Uuid::new_v4();
        let ts = now();
        self.execute(
            "INSERT INTO posts (id, author_id, post_type, title, content, summary, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             RETURNING id",
            params![
                id,
                post.author_id,
                post.post_type,
                post.title,
                post.content,
                post.summary,
                PostStatus::Pending,
                ts
            ],
        )
        .await?;
        self.get_post(id).await?.ok_or(DbError::MissingRow("post"))
    }

    /// Any post regardless of status.
    pub async fn get_post(&self, id: Uuid) -> Result<Option<PostRow>> {
        let sql = format!("{} WHERE p.id = ?1", POST_SELECT);
        self.fetch_optional(&sql, params![id]).await
    }

    pub async fn get_published_post(&self, id: Uuid) -> Result<Option<PostRow>> {
        let sql = format!("{} WHERE p.id = ?1 AND p.status = 'published'", POST_SELECT);
        self.fetch_optional(&sql, params![id]).await
    }

    pub async fn published_posts(&self) -> Result<Vec<PostRow>> {
        let sql = format!(
            "{} WHERE p.status = 'published' ORDER BY p.published_at DESC, p.created_at DESC",
            POST_SELECT
        );
        self.fetch_all(&sql, params![]).await
    }

    pub async fn search_published_posts(&self, term: &str) -> Result<Vec<PostRow>> {
        let sql = format!(
            "{} WHERE p.status = 'published'
               AND (p.title LIKE '%' || ?1 || '%' OR p.content LIKE '%' || ?1 || '%')
             ORDER BY p.published_at DESC",
            POST_SELECT
        );
        self.fetch_all(&sql, params![term]).await
    }

    pub async fn posts_by_author(&self, author_id: Uuid) -> Result<Vec<PostRow>> {
        let sql = format!("{} WHERE p.author_id = ?1 ORDER BY p.created_at DESC", POST_SELECT);
        self.fetch_all(&sql, params![author_id]).await
    }

    pub async fn pending_posts(&self) -> Result<Vec<PostRow>> {
        let sql = format!("{} WHERE p.status = 'pending' ORDER BY p.created_at ASC", POST_SELECT);
        self.fetch_all(&sql, params![]).await
    }

    pub async fn update_post(&self, id: Uuid, changes: &PostChanges) -> Result<Option<PostRow>> {
        let touched = self
            .execute(
                "UPDATE posts SET
                    post_type = COALESCE(?2, post_type),
                    title = COALESCE(?3, title),
                    content = COALESCE(?4, content),
                    summary = COALESCE(?5, summary),
                    updated_at = ?6
                 WHERE id = ?1
                 RETURNING id",
                params![id, changes.post_type, changes.title, changes.content, changes.summary, now()],
            )
            .await?;
        if touched == 0 {
            return Ok(None);
        }
        self.get_post(id).await
    }

    pub async fn approve_post(&self, id: Uuid) -> Result<Option<PostRow>> {
        let ts = now();
        let touched = self
            .execute(
                "UPDATE posts SET status = ?2, published_at = ?3, rejection_feedback = NULL, updated_at = ?3
                 WHERE id = ?1
                 RETURNING id",
                params![id, PostStatus::Published, ts],
            )
            .await?;
        if touched == 0 {
            return Ok(None);
        }
        self.get_post(id).await
    }

    pub async fn reject_post(&self, id: Uuid, feedback: Option<&str>) -> Result<Option<PostRow>> {
        let touched = self
            .execute(
                "UPDATE posts SET status = ?2, rejection_feedback = ?3, updated_at = ?4
                 WHERE id = ?1
                 RETURNING id",
                params![id, PostStatus::Rejected, feedback, now()],
            )
            .await?;
        if touched == 0 {
            return Ok(None);
        }
        self.get_post(id).await
    }

    /// Remove a post with its comments and reactions. Returns false if no such post.
    pub async fn delete_post(&self, id: Uuid) -> Result<bool> {
        self.execute("DELETE FROM comments WHERE post_id = ?1", params![id])
            .await?;
        self.execute("DELETE FROM reactions WHERE post_id = ?1", params![id])
            .await?;
        let removed = self
            .execute("DELETE FROM posts WHERE id = ?1 RETURNING id", params![id])
            .await?;
        Ok(removed > 0)
    }

    // -- Comments --

    pub async fn create_comment(&self, post_id: Uuid, user_id: Uuid, content: &str) -> Result<CommentRow> {
        let id = Uuid::new_v4();
        self.execute(
            "INSERT INTO comments (id, post_id, user_id, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             RETURNING id",
            params![id, post_id, user_id, content, now()],
        )
        .await?;
        self.get_comment(id).await?.ok_or(DbError::MissingRow("comment"))
    }

    pub async fn get_comment(&self, id: Uuid) -> Result<Option<CommentRow>> {
        let sql = format!("{} WHERE c.id = ?1", COMMENT_SELECT);
        self.fetch_optional(&sql, params![id]).await
    }

    /// Oldest first.
    pub async fn comments_for_post(&self, post_id: Uuid) -> Result<Vec<CommentRow>> {
        let sql = format!("{} WHERE c.post_id = ?1 ORDER BY c.created_at ASC", COMMENT_SELECT);
        self.fetch_all(&sql, params![post_id]).await
    }

    /// Comments on published posts whose text contains `term`.
    pub async fn search_comments(&self, term: &str) -> Result<Vec<CommentRow>> {
        let sql = format!(
            "{} JOIN posts p ON p.id = c.post_id
             WHERE p.status = 'published' AND c.content LIKE '%' || ?1 || '%'
             ORDER BY c.created_at DESC",
            COMMENT_SELECT
        );
        self.fetch_all(&sql, params![term]).await
    }

    pub async fn update_comment(&self, id: Uuid, content: &str) -> Result<Option<CommentRow>> {
        let touched = self
            .execute(
                "UPDATE comments SET content = ?2, updated_at = ?3 WHERE id = ?1 RETURNING id",
                params![id, content, now()],
            )
            .await?;
        if touched == 0 {
            return Ok(None);
        }
        self.get_comment(id).await
    }

    pub async fn delete_comment(&self, id: Uuid) -> Result<bool> {
        let removed = self
            .execute("DELETE FROM comments WHERE id = ?1 RETURNING id", params![id])
            .await?;
        Ok(removed > 0)
    }

    // -- Reactions --

    /// Set the caller's reaction on a post, replacing any previous type.
    /// Returns the stored reaction and whether it was newly created.
    pub async fn upsert_reaction(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        reaction_type: ReactionType,
    ) -> Result<(ReactionRow, bool)> {
        let id = Uuid::new_v4();
        let row: ReactionRow = self
            .fetch_optional(
                "INSERT INTO reactions (id, post_id, user_id, reaction_type, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(post_id, user_id) DO UPDATE SET
                    reaction_type = excluded.reaction_type,
                    updated_at = excluded.updated_at
                 RETURNING *",
                params![id, post_id, user_id, reaction_type, now()],
            )
            .await?
            .ok_or(DbError::MissingRow("reaction"))?;
        let created = row.id == id;
        Ok((row, created))
    }

    pub async fn get_user_reaction(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<ReactionRow>> {
        self.fetch_optional(
            "SELECT * FROM reactions WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
        )
        .await
    }

    pub async fn delete_reaction(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        let removed = self
            .execute(
                "DELETE FROM reactions WHERE post_id = ?1 AND user_id = ?2 RETURNING id",
                params![post_id, user_id],
            )
            .await?;
        Ok(removed > 0)
    }

    pub async fn reaction_counts(&self, post_id: Uuid) -> Result<Vec<(ReactionType, i64)>> {
        let rows: Vec<ReactionCountRow> = self
            .fetch_all(
                "SELECT reaction_type, COUNT(*) AS count FROM reactions
                 WHERE post_id = ?1 GROUP BY reaction_type",
                params![post_id],
            )
            .await?;
        Ok(rows.into_iter().map(|r| (r.reaction_type, r.count)).collect())
    }

    /// Reactions written after the cursor, oldest first.
    ///
    /// The cursor is the `(updated_at, id)` of the last row already seen, so rows
    /// sharing a timestamp are never split across pages and lost.
    pub async fn reactions_updated_since(
        &self,
        since: Option<DateTime<Utc>>,
        after: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<ReactionRow>> {
        let since = since.map(timestamp).unwrap_or_default();
        self.fetch_all(
            "SELECT * FROM reactions
             WHERE updated_at > ?1 OR (updated_at = ?1 AND ?2 IS NOT NULL AND id > ?2)
             ORDER BY updated_at ASC, id ASC
             LIMIT ?3",
            params![since, after, limit],
        )
        .await
    }

    // -- Friendships --

    /// Existing friendship row for the pair, in either direction.
    pub async fn friendship_between(&self, a: Uuid, b: Uuid) -> Result<Option<FriendshipRow>> {
        self.fetch_optional(
            "SELECT * FROM friendships
             WHERE (requester_id = ?1 AND addressee_id = ?2) OR (requester_id = ?2 AND addressee_id = ?1)",
            params![a, b],
        )
        .await
    }

    pub async fn create_friend_request(&self, requester: Uuid, addressee: Uuid) -> Result<FriendshipRow> {
        self.fetch_optional(
            "INSERT INTO friendships (id, requester_id, addressee_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             RETURNING *",
            params![Uuid::new_v4(), requester, addressee, FriendshipStatus::Pending, now()],
        )
        .await?
        .ok_or(DbError::MissingRow("friendship"))
    }

    /// Resolve a pending request sent by `requester` to `addressee`.
    pub async fn respond_friend_request(
        &self,
        requester: Uuid,
        addressee: Uuid,
        status: FriendshipStatus,
    ) -> Result<Option<FriendshipRow>> {
        self.fetch_optional(
            "UPDATE friendships SET status = ?3, updated_at = ?4
             WHERE requester_id = ?1 AND addressee_id = ?2 AND status = 'pending'
             RETURNING *",
            params![requester, addressee, status, now()],
        )
        .await
    }

    pub async fn friends_of(&self, user_id: Uuid) -> Result<Vec<UserRow>> {
        self.fetch_all(
            "SELECT u.* FROM users u
             JOIN friendships f
               ON (f.requester_id = ?1 AND f.addressee_id = u.id)
               OR (f.addressee_id = ?1 AND f.requester_id = u.id)
             WHERE f.status = 'accepted'
             ORDER BY u.display_name",
            params![user_id],
        )
        .await
    }

    /// Users who sent `user_id` a request still pending.
    pub async fn incoming_friend_requests(&self, user_id: Uuid) -> Result<Vec<UserRow>> {
        self.fetch_all(
            "SELECT u.* FROM users u
             JOIN friendships f ON f.requester_id = u.id
             WHERE f.addressee_id = ?1 AND f.status = 'pending'
             ORDER BY f.created_at DESC",
            params![user_id],
        )
        .await
    }

    pub async fn outgoing_friend_requests(&self, user_id: Uuid) -> Result<Vec<UserRow>> {
        self.fetch_all(
            "SELECT u.* FROM users u
             JOIN friendships f ON f.addressee_id = u.id
             WHERE f.requester_id = ?1 AND f.status = 'pending'
             ORDER BY f.created_at DESC",
            params![user_id],
        )
        .await
    }

    // -- Statistics --

    pub async fn statistics(&self) -> Result<Statistics> {
        let row: StatisticsRow = self
            .fetch_optional(
                "SELECT
                    (SELECT COUNT(*) FROM users) AS total_users,
                    (SELECT COUNT(*) FROM users WHERE role = 'regular') AS regular_users,
                    (SELECT COUNT(*) FROM users WHERE role = 'contributor') AS contributors,
                    (SELECT COUNT(*) FROM users WHERE role = 'admin') AS admins,
                    (SELECT COUNT(*) FROM users WHERE status = 'suspended') AS suspended_users,
                    (SELECT COUNT(*) FROM posts WHERE status = 'published') AS published_posts,
                    (SELECT COUNT(*) FROM posts WHERE status = 'pending') AS pending_posts,
                    (SELECT COUNT(*) FROM comments) AS total_comments,
                    (SELECT COUNT(*) FROM reactions) AS total_reactions",
                params![],
            )
            .await?
            .ok_or(DbError::MissingRow("statistics"))?;
        Ok(row.into())
    }
}
