#![forbid(unsafe_code)]

pub mod auth;
pub mod classify;
pub mod types;
pub mod validation;

pub use auth::AuthContext;
pub use classify::{classify, Bucket, Buckets, Deadline};
pub use validation::ValidationError;
