use serde::{Deserialize, Serialize};

/// An unsold ticket sitting in the pool. Created by a vendor add, consumed
/// when a customer buys it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub event_name: String,
    pub price: f64,
    pub vendor_id: u32,
}

impl Ticket {
    pub fn new(event_name: String, price: f64, vendor_id: u32) -> Self {
        Ticket {
            event_name,
            price,
            vendor_id,
        }
    }
}
