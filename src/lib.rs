// Library exports for Trackweave
// This allows integration tests and the binary to share the router and storage

pub mod auth;
pub mod config;
pub mod content;
pub mod db;
pub mod enrich;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod users;
pub mod validation;
pub mod votes;
