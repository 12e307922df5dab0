//! Folio admin server: reset lifecycle, reconciliation and the admin gate.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
