// livedraft-client: optimistic real-time sync client for the LiveDraft apps.

pub mod api;
pub mod chat;
pub mod config;
pub mod connection;
pub mod optimistic;
pub mod presence;
pub mod reducer;
pub mod room;
pub mod session;
pub mod subscription;
pub mod transport;
