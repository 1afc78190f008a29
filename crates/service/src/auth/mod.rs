//! Auth module: three-layer architecture (domain, repository, service).
//!
//! Registration, login and the single active session live here. The service
//! doubles as the [`SessionProvider`](crate::session::SessionProvider) that
//! scopes expense access.

pub mod domain;
pub mod errors;
pub mod repository;
pub mod service;

pub use service::AuthService;
