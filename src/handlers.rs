use crate::{
    AppState,
    auth::{self, AdminUser, AuthUser},
    error::{ApiError, RepoError},
    models::{
        AUTO_FLAG_REASON, ActivityLog, AuditAction, Comment, CommentFilter, CreateCommentRequest,
        CreateDocumentRequest, CreateOfficialRequest, CreatePostRequest, DocumentRequest,
        LogQuery, LoginForm, MODERATOR_FLAG_REASON, NewComment, NewUser, Official,
        OfficialUpdate, Pagination, PostDetail, PostUpdate, RegisterUserRequest, RequestFilter,
        RequestStatusView, TokenResponse, UpdateRequestStatus, UploadUrlQuery, UploadUrlResponse,
        UserProfile, page_window,
    },
    storage, tracking,
};
use axum::{
    Form, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

const DEFAULT_POST_PAGE: i64 = 10;
const DEFAULT_ADMIN_PAGE: i64 = 100;

/// Appends one entry to the audit trail. Runs after the mutation it describes, as its
/// own statement: if this fails the request is a 500 but the mutation stays.
async fn audit(
    state: &AppState,
    actor: &AuthUser,
    action: AuditAction,
    details: String,
) -> Result<ActivityLog, ApiError> {
    tracing::info!(
        user_id = actor.id,
        action = action.as_str(),
        "{}",
        details
    );
    let entry = state
        .repo
        .create_activity_log(actor.id, &actor.username, action, Some(details))
        .await?;
    Ok(entry)
}

// --- Accounts ---

/// register_user
///
/// [Public Route] Creates an admin account. The very first account is approved on the
/// spot; every later one waits in `/admin/pending`.
#[utoipa::path(
    post,
    path = "/register/",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Account created", body = UserProfile),
        (status = 400, description = "Invalid input or duplicate username/email")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    payload.validate()?;
    let username = payload.username.trim().to_string();

    if state.repo.get_user_by_username(&username).await?.is_some() {
        return Err(ApiError::Duplicate("Username already registered".to_string()));
    }

    let hashed_password = auth::hash_password(payload.password, state.config.bcrypt_cost).await?;

    let new_user = NewUser {
        username,
        email: payload.email.trim().to_string(),
        display_name: payload.display_name,
        hashed_password,
    };

    // The pre-check above races with concurrent signups; the constraint decides.
    let user = match state.repo.create_user(new_user).await {
        Ok(user) => user,
        Err(RepoError::UniqueViolation(constraint)) => {
            let message = if constraint.contains("email") {
                "Email already registered"
            } else {
                "Username already registered"
            };
            return Err(ApiError::Duplicate(message.to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    if user.is_approved_admin() {
        let actor = AuthUser::from(user.clone());
        audit(
            &state,
            &actor,
            AuditAction::AutoApprovedFirstAdmin,
            format!("first account {} approved automatically", user.username),
        )
        .await?;
    } else {
        tracing::info!(user_id = user.id, "registered account awaiting approval");
    }

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// login
///
/// [Public Route] Exchanges form-encoded credentials for a bearer token. Unknown users
/// and wrong passwords are indistinguishable to the caller.
#[utoipa::path(
    post,
    path = "/token",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Access token", body = TokenResponse),
        (status = 401, description = "Incorrect username or password"),
        (status = 403, description = "Account not approved")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Some(user) = state.repo.get_user_by_username(form.username.trim()).await? else {
        tracing::warn!("login refused: unknown username");
        return Err(ApiError::InvalidCredentials);
    };

    if !auth::verify_password(form.password, user.hashed_password.clone()).await? {
        tracing::warn!(user_id = user.id, "login refused: wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    if !user.is_approved {
        tracing::warn!(user_id = user.id, "login refused: account not approved");
        return Err(ApiError::Forbidden("Admin account is not approved"));
    }

    let access_token = auth::issue_token(
        &user.username,
        &state.config.jwt_secret,
        state.config.token_ttl_minutes,
    )?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

/// get_me
///
/// [Authenticated Route] Profile of the caller, approved or not.
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_me(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = state
        .repo
        .get_user(user.id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    get,
    path = "/admin/pending",
    params(Pagination),
    responses((status = 200, description = "Accounts awaiting approval", body = [UserProfile]))
)]
pub async fn list_pending_users(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let (offset, limit) = page.window(DEFAULT_ADMIN_PAGE);
    let users = state.repo.list_pending_users(offset, limit).await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

/// approve_user
///
/// [Admin Route] Grants admin rights and approval to a pending account.
#[utoipa::path(
    put,
    path = "/admin/approve/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Approved", body = UserProfile),
        (status = 404, description = "User not found")
    )
)]
pub async fn approve_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = state
        .repo
        .approve_user(id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    audit(
        &state,
        &admin,
        AuditAction::ApprovedAdmin,
        format!("approved user {} ({})", user.id, user.username),
    )
    .await?;

    Ok(Json(user.into()))
}

// --- Posts ---

#[utoipa::path(
    get,
    path = "/posts/",
    params(Pagination),
    responses((status = 200, description = "Announcements, newest first", body = [PostDetail]))
)]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<PostDetail>>, ApiError> {
    let (offset, limit) = page.window(DEFAULT_POST_PAGE);
    Ok(Json(state.repo.list_posts(offset, limit).await?))
}

#[utoipa::path(
    get,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "Announcement", body = PostDetail),
        (status = 404, description = "Post not found")
    )
)]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PostDetail>, ApiError> {
    let post = state
        .repo
        .get_post(id)
        .await?
        .ok_or(ApiError::NotFound("Post"))?;
    Ok(Json(post))
}

/// create_post
///
/// [Admin Route] Publishes an announcement together with its media gallery.
#[utoipa::path(
    post,
    path = "/admin/posts/",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = PostDetail),
        (status = 400, description = "Invalid title")
    )
)]
pub async fn create_post(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostDetail>), ApiError> {
    payload.validate()?;
    let post = state.repo.create_post(admin.id, payload).await?;

    audit(
        &state,
        &admin,
        AuditAction::CreatedPost,
        format!("post {}: {}", post.id, post.title),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

#[utoipa::path(
    put,
    path = "/admin/posts/{id}",
    params(("id" = i64, Path, description = "Post id")),
    request_body = PostUpdate,
    responses(
        (status = 200, description = "Updated", body = PostDetail),
        (status = 404, description = "Post not found")
    )
)]
pub async fn update_post(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<PostUpdate>,
) -> Result<Json<PostDetail>, ApiError> {
    payload.validate()?;
    let post = state
        .repo
        .update_post(id, payload)
        .await?
        .ok_or(ApiError::NotFound("Post"))?;

    audit(
        &state,
        &admin,
        AuditAction::UpdatedPost,
        format!("post {}: {}", post.id, post.title),
    )
    .await?;

    Ok(Json(post))
}

/// delete_post
///
/// [Admin Route] Removes an announcement with its comments and media, returning it as
/// it was just before deletion.
#[utoipa::path(
    delete,
    path = "/admin/posts/{id}",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "Deleted", body = PostDetail),
        (status = 404, description = "Post not found")
    )
)]
pub async fn delete_post(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PostDetail>, ApiError> {
    let post = state
        .repo
        .delete_post(id)
        .await?
        .ok_or(ApiError::NotFound("Post"))?;

    audit(
        &state,
        &admin,
        AuditAction::DeletedPost,
        format!("post {}: {}", post.id, post.title),
    )
    .await?;

    Ok(Json(post))
}

// --- Comments ---

#[utoipa::path(
    get,
    path = "/posts/{id}/comments/",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "Comments, oldest first", body = [Comment]),
        (status = 404, description = "Post not found")
    )
)]
pub async fn list_post_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let post = state
        .repo
        .get_post(post_id)
        .await?
        .ok_or(ApiError::NotFound("Post"))?;
    Ok(Json(post.comments))
}

/// add_comment
///
/// [Public Route] Anyone may comment. The text runs through the word filter once, here;
/// a match is stored flagged rather than rejected.
#[utoipa::path(
    post,
    path = "/posts/{id}/comments/",
    params(("id" = i64, Path, description = "Post id")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 400, description = "Empty comment"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn add_comment(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    payload.validate()?;

    if state.repo.get_post(post_id).await?.is_none() {
        return Err(ApiError::NotFound("Post"));
    }

    let is_inappropriate = state.moderation.is_inappropriate(&payload.content);
    if is_inappropriate {
        tracing::warn!(post_id, "comment flagged by word filter");
    }

    let comment = state
        .repo
        .create_comment(NewComment {
            post_id,
            author_name: payload.author_or_default(),
            content: payload.content,
            is_inappropriate,
            flagged_reason: is_inappropriate.then(|| AUTO_FLAG_REASON.to_string()),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    get,
    path = "/admin/comments/",
    params(CommentFilter),
    responses((status = 200, description = "Comments, newest first", body = [Comment]))
)]
pub async fn list_comments(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Query(filter): Query<CommentFilter>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let (offset, limit) = page_window(filter.skip, filter.limit, DEFAULT_ADMIN_PAGE);
    let comments = state
        .repo
        .list_comments(filter.is_inappropriate, offset, limit)
        .await?;
    Ok(Json(comments))
}

#[utoipa::path(
    patch,
    path = "/admin/comments/{id}/flag",
    params(("id" = i64, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Flagged", body = Comment),
        (status = 404, description = "Comment not found")
    )
)]
pub async fn flag_comment(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Comment>, ApiError> {
    let comment = state
        .repo
        .set_comment_flag(id, true, Some(MODERATOR_FLAG_REASON.to_string()))
        .await?
        .ok_or(ApiError::NotFound("Comment"))?;

    audit(
        &state,
        &admin,
        AuditAction::FlaggedComment,
        format!("comment {} on post {}", comment.id, comment.post_id),
    )
    .await?;

    Ok(Json(comment))
}

#[utoipa::path(
    patch,
    path = "/admin/comments/{id}/unflag",
    params(("id" = i64, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Unflagged", body = Comment),
        (status = 404, description = "Comment not found")
    )
)]
pub async fn unflag_comment(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Comment>, ApiError> {
    let comment = state
        .repo
        .set_comment_flag(id, false, None)
        .await?
        .ok_or(ApiError::NotFound("Comment"))?;

    audit(
        &state,
        &admin,
        AuditAction::UnflaggedComment,
        format!("comment {} on post {}", comment.id, comment.post_id),
    )
    .await?;

    Ok(Json(comment))
}

#[utoipa::path(
    delete,
    path = "/admin/comments/{id}",
    params(("id" = i64, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Deleted", body = Comment),
        (status = 404, description = "Comment not found")
    )
)]
pub async fn delete_comment(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Comment>, ApiError> {
    let comment = state
        .repo
        .delete_comment(id)
        .await?
        .ok_or(ApiError::NotFound("Comment"))?;

    audit(
        &state,
        &admin,
        AuditAction::DeletedComment,
        format!("comment {} on post {}", comment.id, comment.post_id),
    )
    .await?;

    Ok(Json(comment))
}

// --- Document Requests ---

/// create_document_request
///
/// [Public Route] Files a request for a barangay document. The response carries the
/// tracking token, which is the requester's only way back to it.
#[utoipa::path(
    post,
    path = "/document-requests/",
    request_body = CreateDocumentRequest,
    responses(
        (status = 201, description = "Request filed", body = DocumentRequest),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_document_request(
    State(state): State<AppState>,
    Json(payload): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<DocumentRequest>), ApiError> {
    payload.validate()?;
    let request = tracking::insert_with_fresh_token(
        state.repo.as_ref(),
        &payload,
        tracking::generate_request_token,
    )
    .await?;

    tracing::info!(request_id = request.id, "document request filed");
    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    get,
    path = "/document-requests/status/{token}",
    params(("token" = String, Path, description = "Tracking token")),
    responses(
        (status = 200, description = "Request status", body = RequestStatusView),
        (status = 404, description = "Unknown token")
    )
)]
pub async fn get_request_status(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<RequestStatusView>, ApiError> {
    if !tracking::is_well_formed(&token) {
        return Err(ApiError::NotFound("Document request"));
    }
    let request = state
        .repo
        .get_document_request_by_token(&token)
        .await?
        .ok_or(ApiError::NotFound("Document request"))?;
    Ok(Json(request.into()))
}

#[utoipa::path(
    get,
    path = "/admin/document-requests/",
    params(RequestFilter),
    responses((status = 200, description = "Requests, newest first", body = [DocumentRequest]))
)]
pub async fn list_document_requests(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Query(filter): Query<RequestFilter>,
) -> Result<Json<Vec<DocumentRequest>>, ApiError> {
    let (offset, limit) = page_window(filter.skip, filter.limit, DEFAULT_ADMIN_PAGE);
    let requests = state
        .repo
        .list_document_requests(filter.status, offset, limit)
        .await?;
    Ok(Json(requests))
}

#[utoipa::path(
    get,
    path = "/admin/document-requests/{id}",
    params(("id" = i64, Path, description = "Request id")),
    responses(
        (status = 200, description = "Request", body = DocumentRequest),
        (status = 404, description = "Request not found")
    )
)]
pub async fn get_document_request(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DocumentRequest>, ApiError> {
    let request = state
        .repo
        .get_document_request(id)
        .await?
        .ok_or(ApiError::NotFound("Document request"))?;
    Ok(Json(request))
}

/// update_request_status
///
/// [Admin Route] Moves a request to a new status, optionally leaving a message the
/// requester sees when tracking. Mounted for both PATCH and PUT.
#[utoipa::path(
    patch,
    path = "/admin/document-requests/{id}/status",
    params(("id" = i64, Path, description = "Request id")),
    request_body = UpdateRequestStatus,
    responses(
        (status = 200, description = "Updated", body = DocumentRequest),
        (status = 404, description = "Request not found")
    )
)]
pub async fn update_request_status(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateRequestStatus>,
) -> Result<Json<DocumentRequest>, ApiError> {
    let request = state
        .repo
        .update_document_request_status(id, &payload)
        .await?
        .ok_or(ApiError::NotFound("Document request"))?;

    audit(
        &state,
        &admin,
        AuditAction::UpdatedRequestStatus,
        format!("request {} set to {}", request.id, request.status.as_str()),
    )
    .await?;

    Ok(Json(request))
}

// --- Activity Logs ---

#[utoipa::path(
    get,
    path = "/admin/logs/",
    params(LogQuery),
    responses((status = 200, description = "Audit trail", body = [ActivityLog]))
)]
pub async fn list_activity_logs(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<ActivityLog>>, ApiError> {
    let (offset, limit) = page_window(query.skip, query.limit, DEFAULT_ADMIN_PAGE);
    let logs = state
        .repo
        .list_activity_logs(
            offset,
            limit,
            query.sort_by.unwrap_or_default(),
            query.sort_order.unwrap_or_default(),
        )
        .await?;
    Ok(Json(logs))
}

// --- Officials ---

#[utoipa::path(
    get,
    path = "/officials/",
    responses((status = 200, description = "Barangay officials", body = [Official]))
)]
pub async fn list_officials(State(state): State<AppState>) -> Result<Json<Vec<Official>>, ApiError> {
    Ok(Json(state.repo.list_officials().await?))
}

#[utoipa::path(
    get,
    path = "/officials/{id}",
    params(("id" = i64, Path, description = "Official id")),
    responses(
        (status = 200, description = "Official", body = Official),
        (status = 404, description = "Official not found")
    )
)]
pub async fn get_official(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Official>, ApiError> {
    let official = state
        .repo
        .get_official(id)
        .await?
        .ok_or(ApiError::NotFound("Official"))?;
    Ok(Json(official))
}

#[utoipa::path(
    post,
    path = "/admin/officials/",
    request_body = CreateOfficialRequest,
    responses(
        (status = 201, description = "Created", body = Official),
        (status = 400, description = "Missing name or position")
    )
)]
pub async fn create_official(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateOfficialRequest>,
) -> Result<(StatusCode, Json<Official>), ApiError> {
    payload.validate()?;
    let official = state.repo.create_official(payload).await?;

    audit(
        &state,
        &admin,
        AuditAction::CreatedOfficial,
        format!("official {}: {}", official.id, official.name),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(official)))
}

#[utoipa::path(
    put,
    path = "/admin/officials/{id}",
    params(("id" = i64, Path, description = "Official id")),
    request_body = OfficialUpdate,
    responses(
        (status = 200, description = "Updated", body = Official),
        (status = 404, description = "Official not found")
    )
)]
pub async fn update_official(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<OfficialUpdate>,
) -> Result<Json<Official>, ApiError> {
    let official = state
        .repo
        .update_official(id, payload)
        .await?
        .ok_or(ApiError::NotFound("Official"))?;

    audit(
        &state,
        &admin,
        AuditAction::UpdatedOfficial,
        format!("official {}: {}", official.id, official.name),
    )
    .await?;

    Ok(Json(official))
}

#[utoipa::path(
    delete,
    path = "/admin/officials/{id}",
    params(("id" = i64, Path, description = "Official id")),
    responses(
        (status = 200, description = "Deleted", body = Official),
        (status = 404, description = "Official not found")
    )
)]
pub async fn delete_official(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Official>, ApiError> {
    let official = state
        .repo
        .delete_official(id)
        .await?
        .ok_or(ApiError::NotFound("Official"))?;

    audit(
        &state,
        &admin,
        AuditAction::DeletedOfficial,
        format!("official {}: {}", official.id, official.name),
    )
    .await?;

    Ok(Json(official))
}

// --- Uploads ---

/// generate_upload_url
///
/// [Admin Route] Starts the media pipeline: the client PUTs the file straight to object
/// storage with the returned URL, then submits `public_url` with a post.
#[utoipa::path(
    post,
    path = "/admin/generate-upload-url",
    params(UploadUrlQuery),
    responses(
        (status = 200, description = "Presigned upload URL", body = UploadUrlResponse),
        (status = 500, description = "Storage provider error")
    )
)]
pub async fn generate_upload_url(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Query(query): Query<UploadUrlQuery>,
) -> Result<Json<UploadUrlResponse>, ApiError> {
    let path = storage::upload_key(admin.id, &query.file_name);
    let content_type = query
        .content_type
        .filter(|ct| !ct.trim().is_empty())
        .unwrap_or_else(|| storage::content_type_for(&query.file_name).to_string());

    let signed_url = state
        .storage
        .presign_upload(&path, &content_type)
        .await
        .map_err(ApiError::Storage)?;
    let public_url = state.storage.public_url(&path);

    audit(
        &state,
        &admin,
        AuditAction::GeneratedUploadUrl,
        format!("{} ({})", path, content_type),
    )
    .await?;

    Ok(Json(UploadUrlResponse {
        signed_url,
        path,
        public_url,
    }))
}
