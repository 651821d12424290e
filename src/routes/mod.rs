/// Router Module Index
///
/// Routes are split by who may call them, so access control is applied per module
/// instead of per handler registration.

/// Open to anyone: the public board, comments, document requests, login and signup.
pub mod public;

/// Requires a valid session, approved or not.
pub mod authenticated;

/// Requires an approved admin. Every handler here takes the `AdminUser` extractor.
pub mod admin;
