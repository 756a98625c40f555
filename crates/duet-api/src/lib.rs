pub mod auth;
pub mod chat;
pub mod error;
pub mod gallery;
pub mod media;
pub mod middleware;
pub mod notifications;
pub mod outbound;
pub mod requests;
pub mod state;
