//! Multi-tenant gym management backend.
//!
//! Owners run gyms on a subscription sold by the platform operator (OG);
//! staff, trainers and members work inside a single gym. Every request is
//! authenticated with a JWT bearer token and gated by role, gym ownership,
//! stored permissions and the gym's subscription status.

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod models;
pub mod services;

pub use errors::{AppError, AppResult};
