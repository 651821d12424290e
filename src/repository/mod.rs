use async_trait::async_trait;
use std::sync::Arc;

use crate::error::RepoResult;
use crate::models::{
    ActivityLog, AuditAction, Comment, CreateDocumentRequest, CreateOfficialRequest,
    CreatePostRequest, DocumentRequest, LogSortField, Media, NewComment, NewUser, Official,
    OfficialUpdate, PostDetail, PostUpdate, RequestStatus, SortOrder, UpdateRequestStatus, User,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// Repository Trait
///
/// Abstract contract for all persistence operations, so handlers never know whether
/// they talk to Postgres or the in-memory store used by the tests.
///
/// Every write runs in its own transaction and hands back the reloaded row.
/// `Ok(None)` always means "no row with that key".
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    async fn count_users(&self) -> RepoResult<i64>;
    /// Inserts a user. When the table is empty at insert time the account is created
    /// as an approved admin; otherwise it starts unapproved and without admin rights.
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn list_pending_users(&self, offset: i64, limit: i64) -> RepoResult<Vec<User>>;
    /// Grants admin rights and approval in one step.
    async fn approve_user(&self, id: i64) -> RepoResult<Option<User>>;

    // --- Posts & Media ---
    /// Newest first, each with author, media and comments.
    async fn list_posts(&self, offset: i64, limit: i64) -> RepoResult<Vec<PostDetail>>;
    async fn get_post(&self, id: i64) -> RepoResult<Option<PostDetail>>;
    /// Writes the post and its media rows atomically.
    async fn create_post(&self, author_id: i64, req: CreatePostRequest) -> RepoResult<PostDetail>;
    /// Applies `PostUpdate::merge_into`; a present media list replaces the gallery.
    async fn update_post(&self, id: i64, update: PostUpdate) -> RepoResult<Option<PostDetail>>;
    /// Deletes the post (cascading to media and comments) and returns it as it was.
    async fn delete_post(&self, id: i64) -> RepoResult<Option<PostDetail>>;
    async fn get_media(&self, id: i64) -> RepoResult<Option<Media>>;

    // --- Comments ---
    /// Admin moderation queue, newest first, optionally filtered by flag.
    async fn list_comments(
        &self,
        is_inappropriate: Option<bool>,
        offset: i64,
        limit: i64,
    ) -> RepoResult<Vec<Comment>>;
    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>>;
    async fn create_comment(&self, comment: NewComment) -> RepoResult<Comment>;
    async fn set_comment_flag(
        &self,
        id: i64,
        is_inappropriate: bool,
        reason: Option<String>,
    ) -> RepoResult<Option<Comment>>;
    async fn delete_comment(&self, id: i64) -> RepoResult<Option<Comment>>;

    // --- Document Requests ---
    /// Fails with `RepoError::UniqueViolation` if `token` is already taken.
    async fn create_document_request(
        &self,
        req: &CreateDocumentRequest,
        token: &str,
    ) -> RepoResult<DocumentRequest>;
    async fn get_document_request(&self, id: i64) -> RepoResult<Option<DocumentRequest>>;
    async fn get_document_request_by_token(&self, token: &str)
    -> RepoResult<Option<DocumentRequest>>;
    async fn list_document_requests(
        &self,
        status: Option<RequestStatus>,
        offset: i64,
        limit: i64,
    ) -> RepoResult<Vec<DocumentRequest>>;
    async fn update_document_request_status(
        &self,
        id: i64,
        update: &UpdateRequestStatus,
    ) -> RepoResult<Option<DocumentRequest>>;

    // --- Activity Logs ---
    async fn create_activity_log(
        &self,
        user_id: i64,
        username: &str,
        action: AuditAction,
        details: Option<String>,
    ) -> RepoResult<ActivityLog>;
    async fn list_activity_logs(
        &self,
        offset: i64,
        limit: i64,
        sort_by: LogSortField,
        order: SortOrder,
    ) -> RepoResult<Vec<ActivityLog>>;

    // --- Officials ---
    async fn list_officials(&self) -> RepoResult<Vec<Official>>;
    async fn get_official(&self, id: i64) -> RepoResult<Option<Official>>;
    async fn create_official(&self, req: CreateOfficialRequest) -> RepoResult<Official>;
    async fn update_official(&self, id: i64, update: OfficialUpdate) -> RepoResult<Option<Official>>;
    async fn delete_official(&self, id: i64) -> RepoResult<Option<Official>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
