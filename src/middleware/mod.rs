// Middleware modules for the affiliate backend

pub mod auth;
pub mod auth_middleware;
pub mod cors;
pub mod webhook_auth;

pub use auth::AuthenticatedUser;
pub use auth_middleware::auth_middleware;
pub use cors::cors_layer;
pub use webhook_auth::webhook_auth_middleware;
