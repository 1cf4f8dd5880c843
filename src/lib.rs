pub mod auth;
pub mod config;
pub mod domain;
pub mod email_client;
pub mod rate_limit;
pub mod repository;
pub mod routes;
pub mod services;
pub mod startup;
pub mod telemetry;
pub mod tokens;
