pub mod commands;
pub mod queries;
pub mod routes;

pub use routes::jobs_routes;
