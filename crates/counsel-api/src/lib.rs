pub mod admin;
pub mod auth;
pub mod chat;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod verification;
