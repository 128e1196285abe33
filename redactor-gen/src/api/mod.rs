//! HTTP API handlers for redactor-gen

pub mod auth;
pub mod batch;
pub mod generate;
pub mod health;
pub mod upload;

pub use auth::auth_routes;
pub use batch::batch_routes;
pub use generate::generate_routes;
pub use health::health_routes;
pub use upload::upload_routes;
