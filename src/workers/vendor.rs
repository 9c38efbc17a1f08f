use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::sync::watch;
use tokio::time::sleep;

use crate::pool::{AddOutcome, TicketPool};
use crate::workers::draw_batch_size;

/// Producer worker bound to one event. Periodically releases a random batch
/// of tickets into the shared pool until the quota is exhausted or the pool
/// shuts down.
pub struct VendorWorker {
    pool: Arc<TicketPool>,
    vendor_id: u32,
    event_name: String,
    shutdown: watch::Receiver<bool>,
}

impl VendorWorker {
    pub fn new(
        pool: Arc<TicketPool>,
        vendor_id: u32,
        event_name: String,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        VendorWorker {
            pool,
            vendor_id,
            event_name,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let release_rate = self.pool.config().release_rate();
        // Inter-arrival spacing derived from the release rate, a lower bound
        // rather than a hard real-time guarantee.
        let pause = Duration::from_millis(30_000 / u64::from(release_rate));

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let count = draw_batch_size(release_rate);
            let price = match self.pool.event_price(&self.event_name) {
                Ok(price) => price,
                Err(e) => {
                    error!("Vendor {} terminating: {}", self.vendor_id, e);
                    break;
                }
            };

            let outcome = self
                .pool
                .add_tickets(&self.event_name, self.vendor_id, count, price)
                .await;
            if outcome == AddOutcome::QuotaExhausted {
                info!(
                    "Vendor {} reached the ticket quota and is terminating",
                    self.vendor_id
                );
                break;
            }

            tokio::select! {
                _ = sleep(pause) => {}
                _ = self.shutdown.changed() => break,
            }
        }
    }
}
