use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::Repository;
use crate::error::{RepoError, RepoResult};
use crate::models::{
    ActivityLog, AuditAction, AuthorSummary, Comment, CreateDocumentRequest,
    CreateOfficialRequest, CreatePostRequest, DocumentRequest, LogSortField, Media, MediaInput,
    NewComment, NewUser, Official, OfficialUpdate, Post, PostDetail, PostUpdate, RequestStatus,
    SortOrder, UpdateRequestStatus, User,
};

#[derive(Default)]
struct Store {
    next_id: i64,
    users: Vec<User>,
    posts: Vec<Post>,
    media: Vec<Media>,
    comments: Vec<Comment>,
    requests: Vec<DocumentRequest>,
    logs: Vec<ActivityLog>,
    officials: Vec<Official>,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn detail(&self, post: &Post) -> PostDetail {
        let author = self
            .users
            .iter()
            .find(|user| user.id == post.author_id)
            .map(|user| AuthorSummary {
                id: user.id,
                username: user.username.clone(),
                display_name: user.display_name.clone(),
            })
            .unwrap_or_default();
        let media = self
            .media
            .iter()
            .filter(|item| item.post_id == post.id)
            .cloned()
            .collect();
        let comments = self
            .comments
            .iter()
            .filter(|comment| comment.post_id == post.id)
            .cloned()
            .collect();
        PostDetail::assemble(post.clone(), author, media, comments)
    }

    fn push_media(&mut self, post_id: i64, media: &[MediaInput]) {
        for item in media {
            let id = self.next_id();
            self.media.push(Media {
                id,
                post_id,
                url: item.url.clone(),
                media_type: item.media_type,
            });
        }
    }
}

fn window<T: Clone>(items: Vec<&T>, offset: i64, limit: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect()
}

/// InMemoryRepository
///
/// A `Repository` kept entirely in process memory. It mirrors the Postgres schema's
/// behavior that callers can observe: unique constraints surface as
/// `RepoError::UniqueViolation` with the same constraint names, deleting a post takes
/// its media and comments with it, and the first registered user is bootstrapped as
/// an approved admin. Used by the test suite and for running without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    // --- USERS ---

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        let store = self.store.lock().await;
        Ok(store.users.iter().find(|user| user.id == id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let store = self.store.lock().await;
        Ok(store
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn count_users(&self) -> RepoResult<i64> {
        let store = self.store.lock().await;
        Ok(store.users.len() as i64)
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut store = self.store.lock().await;

        if store.users.iter().any(|u| u.username == user.username) {
            return Err(RepoError::UniqueViolation("users_username_key".to_string()));
        }
        if store.users.iter().any(|u| u.email == user.email) {
            return Err(RepoError::UniqueViolation("users_email_key".to_string()));
        }

        let bootstrap = store.users.is_empty();
        let id = store.next_id();
        let created = User {
            id,
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            hashed_password: user.hashed_password,
            is_admin: bootstrap,
            is_approved: bootstrap,
            created_at: Utc::now(),
        };
        store.users.push(created.clone());
        Ok(created)
    }

    async fn list_pending_users(&self, offset: i64, limit: i64) -> RepoResult<Vec<User>> {
        let store = self.store.lock().await;
        let pending = store.users.iter().filter(|user| !user.is_approved).collect();
        Ok(window(pending, offset, limit))
    }

    async fn approve_user(&self, id: i64) -> RepoResult<Option<User>> {
        let mut store = self.store.lock().await;
        Ok(store.users.iter_mut().find(|user| user.id == id).map(|user| {
            user.is_approved = true;
            user.is_admin = true;
            user.clone()
        }))
    }

    // --- POSTS & MEDIA ---

    async fn list_posts(&self, offset: i64, limit: i64) -> RepoResult<Vec<PostDetail>> {
        let store = self.store.lock().await;
        let mut posts: Vec<&Post> = store.posts.iter().collect();
        posts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        let page: Vec<Post> = window(posts, offset, limit);
        Ok(page.iter().map(|post| store.detail(post)).collect())
    }

    async fn get_post(&self, id: i64) -> RepoResult<Option<PostDetail>> {
        let store = self.store.lock().await;
        Ok(store
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| store.detail(post)))
    }

    async fn create_post(&self, author_id: i64, req: CreatePostRequest) -> RepoResult<PostDetail> {
        let mut store = self.store.lock().await;
        let id = store.next_id();
        let post = Post {
            id,
            title: req.title,
            content: req.content,
            primary_image_url: req.primary_image_url,
            created_at: Utc::now(),
            updated_at: None,
            author_id,
        };
        store.posts.push(post.clone());
        store.push_media(id, &req.media);
        Ok(store.detail(&post))
    }

    async fn update_post(&self, id: i64, update: PostUpdate) -> RepoResult<Option<PostDetail>> {
        let mut store = self.store.lock().await;
        let Some(post) = store.posts.iter_mut().find(|post| post.id == id) else {
            return Ok(None);
        };
        update.merge_into(post);
        post.updated_at = Some(Utc::now());
        let post = post.clone();

        if let Some(media) = &update.media {
            store.media.retain(|item| item.post_id != id);
            store.push_media(id, media);
        }
        Ok(Some(store.detail(&post)))
    }

    async fn delete_post(&self, id: i64) -> RepoResult<Option<PostDetail>> {
        let mut store = self.store.lock().await;
        let Some(index) = store.posts.iter().position(|post| post.id == id) else {
            return Ok(None);
        };
        let detail = store.detail(&store.posts[index]);
        store.posts.remove(index);
        store.media.retain(|item| item.post_id != id);
        store.comments.retain(|comment| comment.post_id != id);
        Ok(Some(detail))
    }

    async fn get_media(&self, id: i64) -> RepoResult<Option<Media>> {
        let store = self.store.lock().await;
        Ok(store.media.iter().find(|item| item.id == id).cloned())
    }

    // --- COMMENTS ---

    async fn list_comments(
        &self,
        is_inappropriate: Option<bool>,
        offset: i64,
        limit: i64,
    ) -> RepoResult<Vec<Comment>> {
        let store = self.store.lock().await;
        let mut comments: Vec<&Comment> = store
            .comments
            .iter()
            .filter(|comment| is_inappropriate.is_none_or(|flag| comment.is_inappropriate == flag))
            .collect();
        comments.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(window(comments, offset, limit))
    }

    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>> {
        let store = self.store.lock().await;
        Ok(store.comments.iter().find(|comment| comment.id == id).cloned())
    }

    async fn create_comment(&self, comment: NewComment) -> RepoResult<Comment> {
        let mut store = self.store.lock().await;
        if !store.posts.iter().any(|post| post.id == comment.post_id) {
            return Err(RepoError::Database(sqlx::Error::RowNotFound));
        }
        let id = store.next_id();
        let created = Comment {
            id,
            post_id: comment.post_id,
            content: comment.content,
            author_name: comment.author_name,
            created_at: Utc::now(),
            is_inappropriate: comment.is_inappropriate,
            flagged_reason: comment.flagged_reason,
        };
        store.comments.push(created.clone());
        Ok(created)
    }

    async fn set_comment_flag(
        &self,
        id: i64,
        is_inappropriate: bool,
        reason: Option<String>,
    ) -> RepoResult<Option<Comment>> {
        let mut store = self.store.lock().await;
        Ok(store
            .comments
            .iter_mut()
            .find(|comment| comment.id == id)
            .map(|comment| {
                comment.is_inappropriate = is_inappropriate;
                comment.flagged_reason = reason;
                comment.clone()
            }))
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<Option<Comment>> {
        let mut store = self.store.lock().await;
        let index = store.comments.iter().position(|comment| comment.id == id);
        Ok(index.map(|index| store.comments.remove(index)))
    }

    // --- DOCUMENT REQUESTS ---

    async fn create_document_request(
        &self,
        req: &CreateDocumentRequest,
        token: &str,
    ) -> RepoResult<DocumentRequest> {
        let mut store = self.store.lock().await;
        if store.requests.iter().any(|r| r.request_token == token) {
            return Err(RepoError::UniqueViolation(
                "document_requests_token_key".to_string(),
            ));
        }
        let id = store.next_id();
        let created = DocumentRequest {
            id,
            requester_name: req.requester_name.clone(),
            requester_age: req.requester_age,
            date_of_birth: req.date_of_birth,
            address: req.address.clone(),
            document_type: req.document_type.clone(),
            purpose: req.purpose.clone(),
            request_token: token.to_string(),
            status: RequestStatus::Pending,
            admin_message: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        store.requests.push(created.clone());
        Ok(created)
    }

    async fn get_document_request(&self, id: i64) -> RepoResult<Option<DocumentRequest>> {
        let store = self.store.lock().await;
        Ok(store.requests.iter().find(|r| r.id == id).cloned())
    }

    async fn get_document_request_by_token(
        &self,
        token: &str,
    ) -> RepoResult<Option<DocumentRequest>> {
        let store = self.store.lock().await;
        Ok(store
            .requests
            .iter()
            .find(|r| r.request_token == token)
            .cloned())
    }

    async fn list_document_requests(
        &self,
        status: Option<RequestStatus>,
        offset: i64,
        limit: i64,
    ) -> RepoResult<Vec<DocumentRequest>> {
        let store = self.store.lock().await;
        let mut requests: Vec<&DocumentRequest> = store
            .requests
            .iter()
            .filter(|r| status.is_none_or(|status| r.status == status))
            .collect();
        requests.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(window(requests, offset, limit))
    }

    async fn update_document_request_status(
        &self,
        id: i64,
        update: &UpdateRequestStatus,
    ) -> RepoResult<Option<DocumentRequest>> {
        let mut store = self.store.lock().await;
        Ok(store.requests.iter_mut().find(|r| r.id == id).map(|r| {
            r.status = update.status;
            if let Some(message) = &update.admin_message {
                r.admin_message = Some(message.clone());
            }
            r.updated_at = Some(Utc::now());
            r.clone()
        }))
    }

    // --- ACTIVITY LOGS ---

    async fn create_activity_log(
        &self,
        user_id: i64,
        username: &str,
        action: AuditAction,
        details: Option<String>,
    ) -> RepoResult<ActivityLog> {
        let mut store = self.store.lock().await;
        let id = store.next_id();
        let log = ActivityLog {
            id,
            timestamp: Utc::now(),
            user_id,
            username: username.to_string(),
            action: action.as_str().to_string(),
            details,
        };
        store.logs.push(log.clone());
        Ok(log)
    }

    async fn list_activity_logs(
        &self,
        offset: i64,
        limit: i64,
        sort_by: LogSortField,
        order: SortOrder,
    ) -> RepoResult<Vec<ActivityLog>> {
        let store = self.store.lock().await;
        let mut logs: Vec<&ActivityLog> = store.logs.iter().collect();
        logs.sort_by(|a, b| {
            let primary = match sort_by {
                LogSortField::Timestamp => a.timestamp.cmp(&b.timestamp),
                LogSortField::User => a.username.cmp(&b.username),
                LogSortField::Action => a.action.cmp(&b.action),
            };
            let ordering = primary.then(a.id.cmp(&b.id));
            match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
        Ok(window(logs, offset, limit))
    }

    // --- OFFICIALS ---

    async fn list_officials(&self) -> RepoResult<Vec<Official>> {
        let store = self.store.lock().await;
        Ok(store.officials.clone())
    }

    async fn get_official(&self, id: i64) -> RepoResult<Option<Official>> {
        let store = self.store.lock().await;
        Ok(store.officials.iter().find(|o| o.id == id).cloned())
    }

    async fn create_official(&self, req: CreateOfficialRequest) -> RepoResult<Official> {
        let mut store = self.store.lock().await;
        let id = store.next_id();
        let official = Official {
            id,
            name: req.name,
            position: req.position,
            photo_url: req.photo_url,
            bio: req.bio,
            contributions: req.contributions,
            created_at: Utc::now(),
        };
        store.officials.push(official.clone());
        Ok(official)
    }

    async fn update_official(&self, id: i64, update: OfficialUpdate) -> RepoResult<Option<Official>> {
        let mut store = self.store.lock().await;
        Ok(store.officials.iter_mut().find(|o| o.id == id).map(|official| {
            update.merge_into(official);
            official.clone()
        }))
    }

    async fn delete_official(&self, id: i64) -> RepoResult<Option<Official>> {
        let mut store = self.store.lock().await;
        let index = store.officials.iter().position(|o| o.id == id);
        Ok(index.map(|index| store.officials.remove(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            display_name: None,
            hashed_password: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn only_first_user_is_bootstrapped() {
        let repo = InMemoryRepository::new();
        let first = repo.create_user(new_user("captain")).await.unwrap();
        let second = repo.create_user(new_user("kagawad")).await.unwrap();

        assert!(first.is_admin && first.is_approved);
        assert!(!second.is_admin && !second.is_approved);
    }

    #[tokio::test]
    async fn duplicate_email_names_its_constraint() {
        let repo = InMemoryRepository::new();
        repo.create_user(new_user("captain")).await.unwrap();

        let mut clash = new_user("other");
        clash.email = "captain@example.com".to_string();

        match repo.create_user(clash).await {
            Err(RepoError::UniqueViolation(c)) => assert_eq!(c, "users_email_key"),
            other => panic!("expected unique violation, got {:?}", other.map(|u| u.id)),
        }
    }

    #[tokio::test]
    async fn log_sorting_by_user_ascending() {
        let repo = InMemoryRepository::new();
        repo.create_activity_log(1, "zed", AuditAction::CreatedPost, None)
            .await
            .unwrap();
        repo.create_activity_log(2, "amy", AuditAction::DeletedPost, None)
            .await
            .unwrap();

        let logs = repo
            .list_activity_logs(0, 10, LogSortField::User, SortOrder::Asc)
            .await
            .unwrap();
        let names: Vec<&str> = logs.iter().map(|l| l.username.as_str()).collect();
        assert_eq!(names, vec!["amy", "zed"]);
        assert_eq!(logs[0].action.cmp(&"DELETED_POST".to_string()), Ordering::Equal);
    }
}
