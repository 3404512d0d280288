//! # Postwave
//!
//! Platform connections for the Postwave dashboard: the platform catalog,
//! dual-origin (OAuth and API key) connection storage, OAuth return
//! reconciliation, connect/disconnect actions, the automation webhook and the
//! payment verification client, served over an axum API.

pub mod auth;
pub mod config;
pub mod controller;
pub mod crypto;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod oauth_return;
pub mod payments;
pub mod platforms;
pub mod redirect;
pub mod repositories;
pub mod seeds;
pub mod server;
pub mod store;
pub mod telemetry;
pub mod webhook;
pub use migration;
