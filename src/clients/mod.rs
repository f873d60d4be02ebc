pub mod channel;
pub mod health;
pub mod http;
pub mod redis;
pub mod schema_store;
pub mod status_store;
pub mod stub;
