pub mod api;
pub mod clients;
pub mod config;
pub mod coordinator;
pub mod models;
pub mod retry;
pub mod telemetry;
pub mod validator;
pub mod verifier;
