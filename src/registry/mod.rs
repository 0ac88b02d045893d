//! Registry access: bearer-token auth and the v2 HTTP client

pub mod auth;
pub mod client;

pub use client::RegistryClient;
