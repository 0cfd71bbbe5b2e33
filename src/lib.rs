pub mod config;
pub mod domain;
pub mod email_client;
pub mod lifecycle;
pub mod notification;
pub mod routes;
pub mod scheduler;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod templates;
