pub mod avatar;
pub mod repository;

pub use repository::{NewUser, ProfileUpdate};
