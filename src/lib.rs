// Library exports for the Elmosyar web frontend
// This allows integration tests to build the app against a stub backend

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod flash;
pub mod format;
pub mod routes;
pub mod session;
pub mod state;
pub mod views;
