use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::TicketError;

/// Immutable configuration bundle for a simulation run: the global ticket
/// quota, vendor/customer rates, pool capacity and the event price list.
/// Replaced wholesale when the system is reconfigured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    total_tickets: u32,
    release_rate: u32,
    retrieval_rate: u32,
    max_capacity: u32,
    event_prices: HashMap<String, f64>,
}

impl PoolConfig {
    pub fn new(
        total_tickets: u32,
        release_rate: u32,
        retrieval_rate: u32,
        max_capacity: u32,
    ) -> Result<Self, TicketError> {
        if total_tickets == 0 {
            return Err(TicketError::InvalidConfiguration(
                "total ticket quota must be greater than zero".to_string(),
            ));
        }
        if release_rate == 0 {
            return Err(TicketError::InvalidConfiguration(
                "ticket release rate must be greater than zero".to_string(),
            ));
        }
        if retrieval_rate == 0 {
            return Err(TicketError::InvalidConfiguration(
                "customer retrieval rate must be greater than zero".to_string(),
            ));
        }
        if max_capacity < total_tickets {
            return Err(TicketError::InvalidConfiguration(format!(
                "max ticket capacity {max_capacity} is below the total ticket quota {total_tickets}"
            )));
        }

        Ok(PoolConfig {
            total_tickets,
            release_rate,
            retrieval_rate,
            max_capacity,
            event_prices: HashMap::new(),
        })
    }

    /// Registers an event and its fixed ticket price. Event names are unique.
    pub fn with_event(
        mut self,
        event_name: impl Into<String>,
        price: f64,
    ) -> Result<Self, TicketError> {
        let event_name = event_name.into();
        if price <= 0.0 {
            return Err(TicketError::InvalidConfiguration(format!(
                "ticket price for {event_name} must be greater than zero"
            )));
        }
        if self.event_prices.contains_key(&event_name) {
            return Err(TicketError::InvalidConfiguration(format!(
                "an event named {event_name} already exists"
            )));
        }
        self.event_prices.insert(event_name, price);
        Ok(self)
    }

    pub fn total_tickets(&self) -> u32 {
        self.total_tickets
    }

    pub fn release_rate(&self) -> u32 {
        self.release_rate
    }

    pub fn retrieval_rate(&self) -> u32 {
        self.retrieval_rate
    }

    pub fn max_capacity(&self) -> u32 {
        self.max_capacity
    }

    pub fn price(&self, event_name: &str) -> Result<f64, TicketError> {
        self.event_prices
            .get(event_name)
            .copied()
            .ok_or_else(|| TicketError::EventNotFound(event_name.to_string()))
    }

    pub fn event_names(&self) -> Vec<String> {
        self.event_prices.keys().cloned().collect()
    }
}
