// Authentication and authorization

pub mod access;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;

pub use access::*;
pub use jwt::*;
pub use middleware::*;
pub use models::*;
pub use service::*;
