use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;

pub const DEFAULT_AUTHOR_NAME: &str = "Anonymous";
pub const AUTO_FLAG_REASON: &str = "Contains inappropriate language";
pub const MODERATOR_FLAG_REASON: &str = "Flagged by moderator";

const MIN_PASSWORD_LEN: usize = 8;
const MAX_TITLE_LEN: usize = 200;
const MAX_PAGE_SIZE: i64 = 100;

// --- Users ---

/// User
///
/// Canonical `users` row. Carries the password hash, so it never leaves the server;
/// responses use [`UserProfile`].
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub hashed_password: String,
    pub is_admin: bool,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// The "approved admin" predicate guarding every `/admin` route.
    pub fn is_approved_admin(&self) -> bool {
        self.is_admin && self.is_approved
    }
}

/// UserProfile
///
/// Public view of a user account (registration, pending list, `/users/me`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub is_admin: bool,
    pub is_approved: bool,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            is_admin: user.is_admin,
            is_approved: user.is_approved,
        }
    }
}

/// RegisterUserRequest
///
/// Input payload for admin signup (POST /register/).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl RegisterUserRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let username_len = self.username.trim().chars().count();
        if !(3..=50).contains(&username_len) {
            return Err(ApiError::Validation(
                "Username must be between 3 and 50 characters".to_string(),
            ));
        }
        if !self.email.contains('@') {
            return Err(ApiError::Validation("Email address is invalid".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

/// NewUser
///
/// Repository input for a registration that has already been validated and hashed.
/// Whether the account is bootstrapped as the first admin is decided at insert time.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub hashed_password: String,
}

/// LoginForm
///
/// Form-encoded credentials for POST /token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

// --- Posts & Media ---

/// MediaType
///
/// Stored as the Postgres enum `media_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[sqlx(type_name = "media_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum MediaType {
    #[default]
    Image,
    Video,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Media {
    pub id: i64,
    pub post_id: i64,
    pub url: String,
    pub media_type: MediaType,
}

/// MediaInput
///
/// A media attachment as submitted with a post, before it has an id.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct MediaInput {
    pub url: String,
    #[serde(default)]
    pub media_type: MediaType,
}

/// Post
///
/// Raw `posts` row. Handlers respond with [`PostDetail`], which adds the author,
/// media and comments.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, PartialEq)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub primary_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub author_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct AuthorSummary {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
}

/// PostDetail
///
/// Response shape for an announcement: the post with its author, media gallery
/// and comment thread.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct PostDetail {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub primary_image_url: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub updated_at: Option<DateTime<Utc>>,
    pub author: AuthorSummary,
    pub media: Vec<Media>,
    pub comments: Vec<Comment>,
}

impl PostDetail {
    pub fn assemble(post: Post, author: AuthorSummary, media: Vec<Media>, comments: Vec<Comment>) -> Self {
        Self {
            id: post.id,
            title: post.title,
            content: post.content,
            primary_image_url: post.primary_image_url,
            created_at: post.created_at,
            updated_at: post.updated_at,
            author,
            media,
            comments,
        }
    }
}

/// CreatePostRequest
///
/// Input payload for POST /admin/posts/. Media URLs come from the presigned upload flow.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub primary_image_url: Option<String>,
    #[serde(default)]
    pub media: Vec<MediaInput>,
}

impl CreatePostRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_title(&self.title)
    }
}

/// PostUpdate
///
/// Partial update payload for PUT /admin/posts/{id}. Absent fields leave the stored
/// value untouched; a present `media` list replaces the whole gallery.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_image_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<MediaInput>>,
}

impl PostUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        match &self.title {
            Some(title) => validate_title(title),
            None => Ok(()),
        }
    }

    /// Copies every present scalar field onto `post`. Media is handled by the
    /// repository since it lives in its own table.
    pub fn merge_into(&self, post: &mut Post) {
        if let Some(title) = &self.title {
            post.title = title.clone();
        }
        if let Some(content) = &self.content {
            post.content = content.clone();
        }
        if let Some(url) = &self.primary_image_url {
            post.primary_image_url = Some(url.clone());
        }
    }
}

fn validate_title(title: &str) -> Result<(), ApiError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::Validation("Title must not be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::Validation(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(())
}

// --- Comments ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub content: String,
    pub author_name: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub is_inappropriate: bool,
    pub flagged_reason: Option<String>,
}

/// CreateCommentRequest
///
/// Input payload for POST /posts/{id}/comments/. Anyone may comment; the author
/// name is free text and falls back to "Anonymous".
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub content: String,
    #[serde(default)]
    pub author_name: Option<String>,
}

impl CreateCommentRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.content.trim().is_empty() {
            return Err(ApiError::Validation("Comment must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn author_or_default(&self) -> String {
        match self.author_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => DEFAULT_AUTHOR_NAME.to_string(),
        }
    }
}

/// NewComment
///
/// Repository input; the moderation flag is already decided.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub content: String,
    pub author_name: String,
    pub is_inappropriate: bool,
    pub flagged_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct CommentFilter {
    /// Only comments whose moderation flag equals this value.
    pub is_inappropriate: Option<bool>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

// --- Document Requests ---

/// RequestStatus
///
/// Stored as the Postgres enum `request_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[sqlx(type_name = "request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Completed => "completed",
        }
    }
}

/// DocumentRequest
///
/// A resident's request for a barangay document. `request_token` is the only key
/// ever handed to the requester; the numeric id stays admin-side.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct DocumentRequest {
    pub id: i64,
    pub requester_name: String,
    pub requester_age: i32,
    #[ts(type = "string")]
    pub date_of_birth: NaiveDate,
    pub address: String,
    pub document_type: String,
    pub purpose: String,
    pub request_token: String,
    pub status: RequestStatus,
    pub admin_message: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateDocumentRequest {
    pub requester_name: String,
    pub requester_age: i32,
    #[ts(type = "string")]
    pub date_of_birth: NaiveDate,
    pub address: String,
    pub document_type: String,
    pub purpose: String,
}

impl CreateDocumentRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let required = [
            ("requester_name", &self.requester_name),
            ("address", &self.address),
            ("document_type", &self.document_type),
            ("purpose", &self.purpose),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ApiError::Validation(format!("{} must not be empty", field)));
            }
        }
        if self.requester_age <= 0 || self.requester_age > 150 {
            return Err(ApiError::Validation(
                "requester_age must be between 1 and 150".to_string(),
            ));
        }
        Ok(())
    }
}

/// RequestStatusView
///
/// What a requester sees when tracking by token. Deliberately omits the id and
/// personal details beyond the name.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct RequestStatusView {
    pub requester_name: String,
    pub document_type: String,
    pub status: RequestStatus,
    pub admin_message: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<DocumentRequest> for RequestStatusView {
    fn from(request: DocumentRequest) -> Self {
        Self {
            requester_name: request.requester_name,
            document_type: request.document_type,
            status: request.status,
            admin_message: request.admin_message,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateRequestStatus {
    pub status: RequestStatus,
    #[serde(default)]
    pub admin_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

// --- Activity Logs ---

/// AuditAction
///
/// Every privileged mutation writes one of these to `activity_logs.action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    AutoApprovedFirstAdmin,
    ApprovedAdmin,
    CreatedPost,
    UpdatedPost,
    DeletedPost,
    FlaggedComment,
    UnflaggedComment,
    DeletedComment,
    UpdatedRequestStatus,
    CreatedOfficial,
    UpdatedOfficial,
    DeletedOfficial,
    GeneratedUploadUrl,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::AutoApprovedFirstAdmin => "AUTO_APPROVED_FIRST_ADMIN",
            AuditAction::ApprovedAdmin => "APPROVED_ADMIN",
            AuditAction::CreatedPost => "CREATED_POST",
            AuditAction::UpdatedPost => "UPDATED_POST",
            AuditAction::DeletedPost => "DELETED_POST",
            AuditAction::FlaggedComment => "FLAGGED_COMMENT",
            AuditAction::UnflaggedComment => "UNFLAGGED_COMMENT",
            AuditAction::DeletedComment => "DELETED_COMMENT",
            AuditAction::UpdatedRequestStatus => "UPDATED_REQUEST_STATUS",
            AuditAction::CreatedOfficial => "CREATED_OFFICIAL",
            AuditAction::UpdatedOfficial => "UPDATED_OFFICIAL",
            AuditAction::DeletedOfficial => "DELETED_OFFICIAL",
            AuditAction::GeneratedUploadUrl => "GENERATED_UPLOAD_URL",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct ActivityLog {
    pub id: i64,
    #[ts(type = "string")]
    pub timestamp: DateTime<Utc>,
    pub user_id: i64,
    pub username: String,
    pub action: String,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogSortField {
    #[default]
    Timestamp,
    User,
    Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct LogQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<LogSortField>,
    pub sort_order: Option<SortOrder>,
}

// --- Officials ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Official {
    pub id: i64,
    pub name: String,
    pub position: String,
    pub photo_url: Option<String>,
    pub bio: Option<String>,
    pub contributions: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateOfficialRequest {
    pub name: String,
    pub position: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub contributions: Option<String>,
}

impl CreateOfficialRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() || self.position.trim().is_empty() {
            return Err(ApiError::Validation(
                "Name and position must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// OfficialUpdate
///
/// Partial update payload for PUT /admin/officials/{id}.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct OfficialUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contributions: Option<String>,
}

impl OfficialUpdate {
    pub fn merge_into(&self, official: &mut Official) {
        if let Some(name) = &self.name {
            official.name = name.clone();
        }
        if let Some(position) = &self.position {
            official.position = position.clone();
        }
        if let Some(photo_url) = &self.photo_url {
            official.photo_url = Some(photo_url.clone());
        }
        if let Some(bio) = &self.bio {
            official.bio = Some(bio.clone());
        }
        if let Some(contributions) = &self.contributions {
            official.contributions = Some(contributions.clone());
        }
    }
}

// --- Pagination & Uploads ---

/// Pagination
///
/// `skip`/`limit` query parameters shared by the list endpoints.
#[derive(Debug, Clone, Copy, Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    /// Resolves to `(offset, limit)`: negative offsets become 0 and the limit is
    /// clamped to `1..=100`.
    pub fn window(&self, default_limit: i64) -> (i64, i64) {
        page_window(self.skip, self.limit, default_limit)
    }
}

pub fn page_window(skip: Option<i64>, limit: Option<i64>, default_limit: i64) -> (i64, i64) {
    let offset = skip.unwrap_or(0).max(0);
    let limit = limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE);
    (offset, limit)
}

#[derive(Debug, Clone, Deserialize, Serialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct UploadUrlQuery {
    /// Original file name; only its extension is kept in the object key.
    pub file_name: String,
    /// MIME type the upload is pinned to. Guessed from the extension when absent.
    pub content_type: Option<String>,
}

/// UploadUrlResponse
///
/// Presigned PUT URL plus the public URL the object will be served from.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct UploadUrlResponse {
    pub signed_url: String,
    pub path: String,
    pub public_url: String,
}
