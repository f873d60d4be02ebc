pub mod attempt;
pub mod channel;
pub mod delivery;
pub mod error;
pub mod health;
pub mod request;
pub mod response;
pub mod result;
pub mod retry;
pub mod schema;
pub mod send;
pub mod status;
