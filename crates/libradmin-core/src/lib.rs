//! Core libradmin library: session, overdue notifications, API client and
//! the client-local stores they own.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;
pub mod overdue;
pub mod routes;
pub mod session;
pub mod storage;
pub mod validation;
