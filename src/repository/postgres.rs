use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction, query_builder::QueryBuilder};
use std::collections::HashMap;

use super::Repository;
use crate::error::{RepoError, RepoResult};
use crate::models::{
    ActivityLog, AuditAction, AuthorSummary, Comment, CreateDocumentRequest,
    CreateOfficialRequest, CreatePostRequest, DocumentRequest, LogSortField, Media, MediaInput,
    NewComment, NewUser, Official, OfficialUpdate, Post, PostDetail, PostUpdate, RequestStatus,
    SortOrder, UpdateRequestStatus, User,
};

const POST_SELECT: &str = r#"
    SELECT p.id, p.title, p.content, p.primary_image_url, p.created_at, p.updated_at,
           p.author_id, u.username AS author_username, u.display_name AS author_display_name
    FROM posts p
    JOIN users u ON u.id = p.author_id
"#;

/// A post joined with its author's public fields.
#[derive(FromRow)]
struct PostRow {
    id: i64,
    title: String,
    content: String,
    primary_image_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    author_id: i64,
    author_username: String,
    author_display_name: Option<String>,
}

impl PostRow {
    fn into_parts(self) -> (Post, AuthorSummary) {
        let author = AuthorSummary {
            id: self.author_id,
            username: self.author_username,
            display_name: self.author_display_name,
        };
        let post = Post {
            id: self.id,
            title: self.title,
            content: self.content,
            primary_image_url: self.primary_image_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
            author_id: self.author_id,
        };
        (post, author)
    }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// All statements are parameterized; dynamic filters go through `QueryBuilder`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads media and comments for a page of posts with one query each.
    async fn attach_children(&self, rows: Vec<PostRow>) -> RepoResult<Vec<PostDetail>> {
        if rows.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();

        let media = sqlx::query_as::<_, Media>(
            "SELECT id, post_id, url, media_type FROM media WHERE post_id = ANY($1) ORDER BY id",
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let comments = sqlx::query_as::<_, Comment>(
            r#"SELECT id, post_id, content, author_name, created_at, is_inappropriate, flagged_reason
               FROM comments WHERE post_id = ANY($1) ORDER BY created_at ASC, id ASC"#,
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let mut media_by_post: HashMap<i64, Vec<Media>> = HashMap::new();
        for item in media {
            media_by_post.entry(item.post_id).or_default().push(item);
        }
        let mut comments_by_post: HashMap<i64, Vec<Comment>> = HashMap::new();
        for comment in comments {
            comments_by_post.entry(comment.post_id).or_default().push(comment);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let (post, author) = row.into_parts();
                let media = media_by_post.remove(&post.id).unwrap_or_default();
                let comments = comments_by_post.remove(&post.id).unwrap_or_default();
                PostDetail::assemble(post, author, media, comments)
            })
            .collect())
    }
}

async fn insert_media(
    tx: &mut Transaction<'_, Postgres>,
    post_id: i64,
    media: &[MediaInput],
) -> RepoResult<()> {
    for item in media {
        sqlx::query("INSERT INTO media (post_id, url, media_type) VALUES ($1, $2, $3)")
            .bind(post_id)
            .bind(&item.url)
            .bind(item.media_type)
            .execute(&mut **tx)
            .await
            .map_err(RepoError::from_sqlx)?;
    }
    Ok(())
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, username, email, display_name, hashed_password, is_admin, is_approved, created_at
               FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, username, email, display_name, hashed_password, is_admin, is_approved, created_at
               FROM users WHERE username = $1"#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn count_users(&self) -> RepoResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// create_user
    ///
    /// The first-admin bootstrap is decided inside the INSERT. The table lock serializes
    /// concurrent signups, so two registrations into an empty table cannot both see it
    /// empty under READ COMMITTED.
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, display_name, hashed_password, is_admin, is_approved)
            SELECT $1, $2, $3, $4, first_user.bootstrap, first_user.bootstrap
            FROM (SELECT NOT EXISTS (SELECT 1 FROM users) AS bootstrap) AS first_user
            RETURNING id, username, email, display_name, hashed_password, is_admin, is_approved, created_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.hashed_password)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        tx.commit().await?;
        Ok(created)
    }

    async fn list_pending_users(&self, offset: i64, limit: i64) -> RepoResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"SELECT id, username, email, display_name, hashed_password, is_admin, is_approved, created_at
               FROM users WHERE is_approved = false
               ORDER BY id ASC LIMIT $1 OFFSET $2"#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn approve_user(&self, id: i64) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"UPDATE users SET is_approved = true, is_admin = true WHERE id = $1
               RETURNING id, username, email, display_name, hashed_password, is_admin, is_approved, created_at"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    // --- POSTS & MEDIA ---

    async fn list_posts(&self, offset: i64, limit: i64) -> RepoResult<Vec<PostDetail>> {
        let sql = format!(
            "{} ORDER BY p.created_at DESC, p.id DESC LIMIT $1 OFFSET $2",
            POST_SELECT
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        self.attach_children(rows).await
    }

    async fn get_post(&self, id: i64) -> RepoResult<Option<PostDetail>> {
        let sql = format!("{} WHERE p.id = $1", POST_SELECT);
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.attach_children(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn create_post(&self, author_id: i64, req: CreatePostRequest) -> RepoResult<PostDetail> {
        let mut tx = self.pool.begin().await?;

        let post_id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO posts (title, content, primary_image_url, author_id)
               VALUES ($1, $2, $3, $4) RETURNING id"#,
        )
        .bind(&req.title)
        .bind(&req.content)
        .bind(&req.primary_image_url)
        .bind(author_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        insert_media(&mut tx, post_id, &req.media).await?;
        tx.commit().await?;

        self.get_post(post_id)
            .await?
            .ok_or(RepoError::Database(sqlx::Error::RowNotFound))
    }

    async fn update_post(&self, id: i64, update: PostUpdate) -> RepoResult<Option<PostDetail>> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Post>(
            r#"SELECT id, title, content, primary_image_url, created_at, updated_at, author_id
               FROM posts WHERE id = $1 FOR UPDATE"#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut post) = current else {
            return Ok(None);
        };
        update.merge_into(&mut post);

        sqlx::query(
            r#"UPDATE posts SET title = $2, content = $3, primary_image_url = $4, updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.primary_image_url)
        .execute(&mut *tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        if let Some(media) = &update.media {
            sqlx::query("DELETE FROM media WHERE post_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_media(&mut tx, id, media).await?;
        }

        tx.commit().await?;
        self.get_post(id).await
    }

    async fn delete_post(&self, id: i64) -> RepoResult<Option<PostDetail>> {
        let Some(existing) = self.get_post(id).await? else {
            return Ok(None);
        };

        // media and comments go with it via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(existing))
    }

    async fn get_media(&self, id: i64) -> RepoResult<Option<Media>> {
        let media = sqlx::query_as::<_, Media>(
            "SELECT id, post_id, url, media_type FROM media WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(media)
    }

    // --- COMMENTS ---

    async fn list_comments(
        &self,
        is_inappropriate: Option<bool>,
        offset: i64,
        limit: i64,
    ) -> RepoResult<Vec<Comment>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"SELECT id, post_id, content, author_name, created_at, is_inappropriate, flagged_reason
               FROM comments"#,
        );

        if let Some(flag) = is_inappropriate {
            builder.push(" WHERE is_inappropriate = ");
            builder.push_bind(flag);
        }

        builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let comments = builder
            .build_query_as::<Comment>()
            .fetch_all(&self.pool)
            .await?;
        Ok(comments)
    }

    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"SELECT id, post_id, content, author_name, created_at, is_inappropriate, flagged_reason
               FROM comments WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn create_comment(&self, comment: NewComment) -> RepoResult<Comment> {
        sqlx::query_as::<_, Comment>(
            r#"INSERT INTO comments (post_id, content, author_name, is_inappropriate, flagged_reason)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, post_id, content, author_name, created_at, is_inappropriate, flagged_reason"#,
        )
        .bind(comment.post_id)
        .bind(&comment.content)
        .bind(&comment.author_name)
        .bind(comment.is_inappropriate)
        .bind(&comment.flagged_reason)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    async fn set_comment_flag(
        &self,
        id: i64,
        is_inappropriate: bool,
        reason: Option<String>,
    ) -> RepoResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"UPDATE comments SET is_inappropriate = $2, flagged_reason = $3 WHERE id = $1
               RETURNING id, post_id, content, author_name, created_at, is_inappropriate, flagged_reason"#,
        )
        .bind(id)
        .bind(is_inappropriate)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"DELETE FROM comments WHERE id = $1
               RETURNING id, post_id, content, author_name, created_at, is_inappropriate, flagged_reason"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    // --- DOCUMENT REQUESTS ---

    async fn create_document_request(
        &self,
        req: &CreateDocumentRequest,
        token: &str,
    ) -> RepoResult<DocumentRequest> {
        sqlx::query_as::<_, DocumentRequest>(
            r#"
            INSERT INTO document_requests
                (requester_name, requester_age, date_of_birth, address, document_type, purpose, request_token)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, requester_name, requester_age, date_of_birth, address, document_type,
                      purpose, request_token, status, admin_message, created_at, updated_at
            "#,
        )
        .bind(&req.requester_name)
        .bind(req.requester_age)
        .bind(req.date_of_birth)
        .bind(&req.address)
        .bind(&req.document_type)
        .bind(&req.purpose)
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    async fn get_document_request(&self, id: i64) -> RepoResult<Option<DocumentRequest>> {
        let request = sqlx::query_as::<_, DocumentRequest>(
            r#"SELECT id, requester_name, requester_age, date_of_birth, address, document_type,
                      purpose, request_token, status, admin_message, created_at, updated_at
               FROM document_requests WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    async fn get_document_request_by_token(
        &self,
        token: &str,
    ) -> RepoResult<Option<DocumentRequest>> {
        let request = sqlx::query_as::<_, DocumentRequest>(
            r#"SELECT id, requester_name, requester_age, date_of_birth, address, document_type,
                      purpose, request_token, status, admin_message, created_at, updated_at
               FROM document_requests WHERE request_token = $1"#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    async fn list_document_requests(
        &self,
        status: Option<RequestStatus>,
        offset: i64,
        limit: i64,
    ) -> RepoResult<Vec<DocumentRequest>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"SELECT id, requester_name, requester_age, date_of_birth, address, document_type,
                      purpose, request_token, status, admin_message, created_at, updated_at
               FROM document_requests"#,
        );

        if let Some(status) = status {
            builder.push(" WHERE status = ");
            builder.push_bind(status);
        }

        builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let requests = builder
            .build_query_as::<DocumentRequest>()
            .fetch_all(&self.pool)
            .await?;
        Ok(requests)
    }

    /// update_document_request_status
    ///
    /// `admin_message` is only overwritten when the payload carries one.
    async fn update_document_request_status(
        &self,
        id: i64,
        update: &UpdateRequestStatus,
    ) -> RepoResult<Option<DocumentRequest>> {
        let request = sqlx::query_as::<_, DocumentRequest>(
            r#"
            UPDATE document_requests
            SET status = $2,
                admin_message = COALESCE($3, admin_message),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, requester_name, requester_age, date_of_birth, address, document_type,
                      purpose, request_token, status, admin_message, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(update.status)
        .bind(&update.admin_message)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    // --- ACTIVITY LOGS ---

    async fn create_activity_log(
        &self,
        user_id: i64,
        username: &str,
        action: AuditAction,
        details: Option<String>,
    ) -> RepoResult<ActivityLog> {
        sqlx::query_as::<_, ActivityLog>(
            r#"INSERT INTO activity_logs (user_id, username, action, details)
               VALUES ($1, $2, $3, $4)
               RETURNING id, timestamp, user_id, username, action, details"#,
        )
        .bind(user_id)
        .bind(username)
        .bind(action.as_str())
        .bind(details)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    async fn list_activity_logs(
        &self,
        offset: i64,
        limit: i64,
        sort_by: LogSortField,
        order: SortOrder,
    ) -> RepoResult<Vec<ActivityLog>> {
        // Column and direction come from closed enums, never from raw input.
        let column = match sort_by {
            LogSortField::Timestamp => "timestamp",
            LogSortField::User => "username",
            LogSortField::Action => "action",
        };
        let direction = match order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, timestamp, user_id, username, action, details FROM activity_logs",
        );
        builder.push(format!(" ORDER BY {} {}, id {} LIMIT ", column, direction, direction));
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let logs = builder
            .build_query_as::<ActivityLog>()
            .fetch_all(&self.pool)
            .await?;
        Ok(logs)
    }

    // --- OFFICIALS ---

    async fn list_officials(&self) -> RepoResult<Vec<Official>> {
        let officials = sqlx::query_as::<_, Official>(
            r#"SELECT id, name, position, photo_url, bio, contributions, created_at
               FROM officials ORDER BY id ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(officials)
    }

    async fn get_official(&self, id: i64) -> RepoResult<Option<Official>> {
        let official = sqlx::query_as::<_, Official>(
            r#"SELECT id, name, position, photo_url, bio, contributions, created_at
               FROM officials WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(official)
    }

    async fn create_official(&self, req: CreateOfficialRequest) -> RepoResult<Official> {
        sqlx::query_as::<_, Official>(
            r#"INSERT INTO officials (name, position, photo_url, bio, contributions)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, name, position, photo_url, bio, contributions, created_at"#,
        )
        .bind(&req.name)
        .bind(&req.position)
        .bind(&req.photo_url)
        .bind(&req.bio)
        .bind(&req.contributions)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    async fn update_official(&self, id: i64, update: OfficialUpdate) -> RepoResult<Option<Official>> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Official>(
            r#"SELECT id, name, position, photo_url, bio, contributions, created_at
               FROM officials WHERE id = $1 FOR UPDATE"#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut official) = current else {
            return Ok(None);
        };
        update.merge_into(&mut official);

        let updated = sqlx::query_as::<_, Official>(
            r#"UPDATE officials
               SET name = $2, position = $3, photo_url = $4, bio = $5, contributions = $6
               WHERE id = $1
               RETURNING id, name, position, photo_url, bio, contributions, created_at"#,
        )
        .bind(id)
        .bind(&official.name)
        .bind(&official.position)
        .bind(&official.photo_url)
        .bind(&official.bio)
        .bind(&official.contributions)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn delete_official(&self, id: i64) -> RepoResult<Option<Official>> {
        let official = sqlx::query_as::<_, Official>(
            r#"DELETE FROM officials WHERE id = $1
               RETURNING id, name, position, photo_url, bio, contributions, created_at"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(official)
    }
}
