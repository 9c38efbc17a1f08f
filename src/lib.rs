pub mod config;
pub mod error;
pub mod pool;
pub mod ticket;
pub mod transaction;
pub mod workers;
