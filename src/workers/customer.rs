use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;

use crate::pool::TicketPool;

/// Consumer worker that repeatedly tries to buy a random batch of tickets
/// from the shared pool. Never holds the pool's critical section across its
/// sleep.
pub struct CustomerWorker {
    pool: Arc<TicketPool>,
    customer_id: u32,
    shutdown: watch::Receiver<bool>,
}

impl CustomerWorker {
    pub fn new(pool: Arc<TicketPool>, customer_id: u32, shutdown: watch::Receiver<bool>) -> Self {
        CustomerWorker {
            pool,
            customer_id,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let retrieval_rate = self.pool.config().retrieval_rate();
        let pause = Duration::from_millis(30_000 / u64::from(retrieval_rate));

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            self.pool.purchase_tickets(self.customer_id).await;

            tokio::select! {
                _ = sleep(pause) => {}
                _ = self.shutdown.changed() => break,
            }
        }
    }
}
