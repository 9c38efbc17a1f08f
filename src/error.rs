use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TicketError {
    #[error("Event name not found: {0}")]
    EventNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Transaction sink failure: {0}")]
    SinkFailure(String),
}
