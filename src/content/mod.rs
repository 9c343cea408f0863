//! Posts and comments: storage access plus the enriched views built from it.

pub mod comments;
pub mod posts;

pub use posts::{FeedSort, NewPost};
