pub mod api;
pub mod auth;
pub mod candidate;
pub mod member;
pub mod ratification;
pub mod store;
