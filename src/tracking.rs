use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::{ApiError, RepoError};
use crate::models::{CreateDocumentRequest, DocumentRequest};
use crate::repository::Repository;

/// Random bytes behind each document-request token.
pub const TOKEN_BYTES: usize = 32;

/// How many fresh tokens a create attempts before giving up on collisions.
pub const MAX_TOKEN_ATTEMPTS: usize = 3;

/// generate_request_token
///
/// Draws `TOKEN_BYTES` from the operating system CSPRNG and hex-encodes them, giving a
/// fixed-length, URL-safe token. This token is the only handle a requester has on
/// their request, so it must never be derived from the row id.
pub fn generate_request_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Cheap shape check applied before a token ever reaches the database.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_BYTES * 2 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// insert_with_fresh_token
///
/// Inserts `req` under a token drawn from `next_token`, drawing again whenever the
/// database reports the token as taken. Gives up after `MAX_TOKEN_ATTEMPTS`.
pub async fn insert_with_fresh_token<F>(
    repo: &dyn Repository,
    req: &CreateDocumentRequest,
    mut next_token: F,
) -> Result<DocumentRequest, ApiError>
where
    F: FnMut() -> String + Send,
{
    for attempt in 1..=MAX_TOKEN_ATTEMPTS {
        let token = next_token();
        match repo.create_document_request(req, &token).await {
            Ok(created) => return Ok(created),
            Err(RepoError::UniqueViolation(constraint)) if constraint.contains("token") => {
                tracing::warn!(attempt, "request token collision, drawing a new one");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(ApiError::Internal(
        "could not allocate a unique request token".to_string(),
    ))
}
