//! HTTP API: routing, request/response mapping and bearer authentication.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
