//! Runs against a live Postgres. Every test truncates the schema first, so point
//! DATABASE_URL at a throwaway database:
//!
//! `DATABASE_URL=postgres://... cargo test --test repository_integration_tests -- --ignored`

use barangay_board::{
    error::RepoError,
    models::{
        AuditAction, CreateDocumentRequest, CreatePostRequest, LogSortField, MediaInput,
        MediaType, NewComment, NewUser, PostUpdate, RequestStatus, SortOrder,
        UpdateRequestStatus, User,
    },
    repository::{PostgresRepository, Repository},
};
use chrono::NaiveDate;
use serial_test::serial;
use sqlx::PgPool;

// --- Test Context and Setup ---

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        sqlx::query(
            "TRUNCATE activity_logs, comments, media, posts, document_requests, officials, users RESTART IDENTITY CASCADE",
        )
        .execute(&pool)
        .await
        .expect("Failed to reset tables.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

fn new_user(name: &str) -> NewUser {
    NewUser {
        username: name.to_string(),
        email: format!("{}@barangay.ph", name),
        display_name: Some(name.to_uppercase()),
        hashed_password: "$2b$04$notarealhashnotarealhashnotarealhashnotarealhas".to_string(),
    }
}

async fn seeded_admin(repo: &PostgresRepository) -> User {
    repo.create_user(new_user("captain")).await.unwrap()
}

fn document_request() -> CreateDocumentRequest {
    CreateDocumentRequest {
        requester_name: "Juan Dela Cruz".to_string(),
        requester_age: 34,
        date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
        address: "Purok 3".to_string(),
        document_type: "Barangay Clearance".to_string(),
        purpose: "Employment".to_string(),
    }
}

// --- Tests ---

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_first_user_bootstrap_and_uniqueness() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let first = repo.create_user(new_user("captain")).await.unwrap();
    let second = repo.create_user(new_user("kagawad")).await.unwrap();
    assert!(first.is_approved_admin());
    assert!(!second.is_admin && !second.is_approved);
    assert_eq!(repo.count_users().await.unwrap(), 2);

    match repo.create_user(new_user("captain")).await {
        Err(RepoError::UniqueViolation(constraint)) => {
            assert_eq!(constraint, "users_username_key")
        }
        other => panic!("expected unique violation, got {:?}", other.map(|u| u.id)),
    }

    let pending = repo.list_pending_users(0, 10).await.unwrap();
    assert_eq!(pending.len(), 1);

    let approved = repo.approve_user(second.id).await.unwrap().unwrap();
    assert!(approved.is_approved_admin());
    assert!(repo.list_pending_users(0, 10).await.unwrap().is_empty());
    assert!(repo.approve_user(9999).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_first_signups_bootstrap_one_admin() {
    let ctx = DbTestContext::setup().await;

    let signups: Vec<_> = ["captain", "kagawad", "secretary", "treasurer"]
        .into_iter()
        .map(|name| {
            let repo = ctx.repository();
            tokio::spawn(async move { repo.create_user(new_user(name)).await })
        })
        .collect();

    let mut admins = 0;
    for signup in signups {
        let user = signup.await.unwrap().unwrap();
        if user.is_approved_admin() {
            admins += 1;
        }
    }

    assert_eq!(admins, 1);
    assert_eq!(ctx.repository().count_users().await.unwrap(), 4);
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_post_lifecycle_and_cascade() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let admin = seeded_admin(&repo).await;

    let post = repo
        .create_post(
            admin.id,
            CreatePostRequest {
                title: "Clean-up drive".to_string(),
                content: "Saturday".to_string(),
                primary_image_url: None,
                media: vec![MediaInput {
                    url: "http://cdn/a.png".to_string(),
                    media_type: MediaType::Image,
                }],
            },
        )
        .await
        .unwrap();
    assert_eq!(post.author.username, "captain");
    assert_eq!(post.media.len(), 1);
    let media_id = post.media[0].id;

    let comment = repo
        .create_comment(NewComment {
            post_id: post.id,
            content: "Count me in".to_string(),
            author_name: "Maria".to_string(),
            is_inappropriate: false,
            flagged_reason: None,
        })
        .await
        .unwrap();

    let updated = repo
        .update_post(
            post.id,
            PostUpdate {
                content: Some("Sunday instead".to_string()),
                media: Some(vec![MediaInput {
                    url: "http://cdn/b.mp4".to_string(),
                    media_type: MediaType::Video,
                }]),
                ..PostUpdate::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.title, "Clean-up drive");
    assert_eq!(updated.content, "Sunday instead");
    assert!(updated.updated_at.is_some());
    assert_eq!(updated.media.len(), 1);
    assert_eq!(updated.media[0].media_type, MediaType::Video);
    assert!(repo.get_media(media_id).await.unwrap().is_none());
    let new_media_id = updated.media[0].id;

    let deleted = repo.delete_post(post.id).await.unwrap().unwrap();
    assert_eq!(deleted.comments.len(), 1);
    assert!(repo.get_post(post.id).await.unwrap().is_none());
    assert!(repo.get_comment(comment.id).await.unwrap().is_none());
    assert!(repo.get_media(new_media_id).await.unwrap().is_none());
    assert!(repo.delete_post(post.id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_comment_filter_and_flags() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let admin = seeded_admin(&repo).await;
    let post = repo
        .create_post(
            admin.id,
            CreatePostRequest {
                title: "Town hall".to_string(),
                ..CreatePostRequest::default()
            },
        )
        .await
        .unwrap();

    for (content, flagged) in [("fine", false), ("badword", true)] {
        repo.create_comment(NewComment {
            post_id: post.id,
            content: content.to_string(),
            author_name: "Anonymous".to_string(),
            is_inappropriate: flagged,
            flagged_reason: flagged.then(|| "Contains inappropriate language".to_string()),
        })
        .await
        .unwrap();
    }

    let flagged = repo.list_comments(Some(true), 0, 10).await.unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].content, "badword");
    assert_eq!(repo.list_comments(None, 0, 10).await.unwrap().len(), 2);

    let cleared = repo
        .set_comment_flag(flagged[0].id, false, None)
        .await
        .unwrap()
        .unwrap();
    assert!(!cleared.is_inappropriate);
    assert!(cleared.flagged_reason.is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_document_request_token_and_status() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let token = "c".repeat(64);

    let created = repo
        .create_document_request(&document_request(), &token)
        .await
        .unwrap();
    assert_eq!(created.status, RequestStatus::Pending);

    let found = repo
        .get_document_request_by_token(&token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, created.id);

    match repo.create_document_request(&document_request(), &token).await {
        Err(RepoError::UniqueViolation(constraint)) => {
            assert_eq!(constraint, "document_requests_token_key")
        }
        other => panic!("expected unique violation, got {:?}", other.map(|r| r.id)),
    }

    let updated = repo
        .update_document_request_status(
            created.id,
            &UpdateRequestStatus {
                status: RequestStatus::Rejected,
                admin_message: Some("Missing ID".to_string()),
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, RequestStatus::Rejected);
    assert_eq!(updated.admin_message.as_deref(), Some("Missing ID"));

    let rejected = repo
        .list_document_requests(Some(RequestStatus::Rejected), 0, 10)
        .await
        .unwrap();
    assert_eq!(rejected.len(), 1);
    assert!(
        repo.list_document_requests(Some(RequestStatus::Approved), 0, 10)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_activity_log_sorting() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let admin = seeded_admin(&repo).await;

    repo.create_activity_log(admin.id, "captain", AuditAction::DeletedPost, None)
        .await
        .unwrap();
    repo.create_activity_log(admin.id, "captain", AuditAction::CreatedPost, Some("post 1".to_string()))
        .await
        .unwrap();

    let by_action = repo
        .list_activity_logs(0, 10, LogSortField::Action, SortOrder::Asc)
        .await
        .unwrap();
    assert_eq!(by_action[0].action, "CREATED_POST");

    let newest = repo
        .list_activity_logs(0, 1, LogSortField::Timestamp, SortOrder::Desc)
        .await
        .unwrap();
    assert_eq!(newest.len(), 1);
    assert_eq!(newest[0].action, "CREATED_POST");
}
