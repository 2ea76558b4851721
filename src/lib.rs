//! Vitrine - Agency website backend
//!
//! Blog, project portfolio, client reviews through expiring links,
//! estimation and contact forms, and the back-office API behind them.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
