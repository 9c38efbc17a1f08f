use std::collections::VecDeque;
use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::{Mutex, Semaphore, watch};
use tokio::task::JoinHandle;

use crate::config::PoolConfig;
use crate::error::TicketError;
use crate::ticket::Ticket;
use crate::transaction::{TransactionRecord, TransactionSink};
use crate::workers;
use crate::workers::customer::CustomerWorker;
use crate::workers::vendor::VendorWorker;

/// Number of customer workers spawned per run.
const DEFAULT_CUSTOMER_WORKERS: u32 = 20;

/// Result of a vendor add attempt. `QuotaExhausted` tells the calling vendor
/// to terminate itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added(u32),
    QuotaExhausted,
}

/// All mutable pool state, owned exclusively by [`TicketPool`] and only ever
/// touched under its single lock.
struct PoolState {
    /// Unsold tickets, drained strictly FIFO.
    tickets: VecDeque<Ticket>,
    tickets_added: u32,
    tickets_sold: u32,
    current_count: u32,
    /// Counting "ticket available" signal: one permit released per ticket
    /// added, one acquired per purchase attempt. Closed on stop to wake
    /// blocked purchasers; replaced by reset.
    available: Arc<Semaphore>,
    /// Customers currently waiting to purchase, in arrival order.
    /// Informational, it does not gate purchase order.
    waiting: VecDeque<u32>,
    /// Latch so "customers waiting" is logged at most once per empty period.
    waiting_logged: bool,
    workers: Vec<JoinHandle<()>>,
    running: bool,
    stopped: bool,
}

impl PoolState {
    fn new() -> Self {
        PoolState {
            tickets: VecDeque::new(),
            tickets_added: 0,
            tickets_sold: 0,
            current_count: 0,
            available: Arc::new(Semaphore::new(0)),
            waiting: VecDeque::new(),
            waiting_logged: false,
            workers: Vec::new(),
            running: false,
            stopped: false,
        }
    }
}

/// The shared ticket marketplace. Vendors add tickets up to a global quota,
/// customers concurrently buy them, and the pool stops itself once the quota
/// is fully sold and the queue is empty.
pub struct TicketPool {
    config: PoolConfig,
    sink: Arc<dyn TransactionSink>,
    state: Mutex<PoolState>,
    shutdown: watch::Sender<bool>,
}

impl TicketPool {
    pub fn new(config: PoolConfig, sink: Arc<dyn TransactionSink>) -> Self {
        let (shutdown, _) = watch::channel(false);
        TicketPool {
            config,
            sink,
            state: Mutex::new(PoolState::new()),
            shutdown,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Fixed price for an event, with a warning when the name is unknown.
    pub fn event_price(&self, event_name: &str) -> Result<f64, TicketError> {
        match self.config.price(event_name) {
            Ok(price) => Ok(price),
            Err(e) => {
                warn!(
                    "{}. Available events: {:?}",
                    e,
                    self.config.event_names()
                );
                Err(e)
            }
        }
    }

    /// Adds up to `count` tickets for an event, clamped to the remaining
    /// global quota. Releases one availability permit per ticket added.
    pub async fn add_tickets(
        &self,
        event_name: &str,
        vendor_id: u32,
        count: u32,
        price: f64,
    ) -> AddOutcome {
        let mut state = self.state.lock().await;

        let total_tickets = self.config.total_tickets();
        if state.stopped || state.tickets_added >= total_tickets {
            return AddOutcome::QuotaExhausted;
        }

        let remaining = total_tickets - state.tickets_added;
        let to_add = count.min(remaining);

        for _ in 0..to_add {
            state
                .tickets
                .push_back(Ticket::new(event_name.to_string(), price, vendor_id));
        }
        state.available.add_permits(to_add as usize);
        state.tickets_added += to_add;
        state.current_count += to_add;
        state.waiting_logged = false;

        info!(
            "Vendor {} added {} ticket(s) for {} (price: ${:.2})",
            vendor_id, to_add, event_name, price
        );
        Self::log_status(&state);

        AddOutcome::Added(to_add)
    }

    /// Buys a random batch of tickets for one customer. Blocks until at least
    /// one ticket has been released or the pool stops.
    pub async fn purchase_tickets(&self, customer_id: u32) {
        let available = {
            let mut state = self.state.lock().await;
            if state.stopped {
                info!(
                    "System is stopped. Customer {} cannot purchase any tickets",
                    customer_id
                );
                return;
            }
            state.waiting.push_back(customer_id);
            Arc::clone(&state.available)
        };

        // Blocks until a ticket is released; a closed semaphore means the
        // pool stopped while we were waiting.
        let permit = match available.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                let mut state = self.state.lock().await;
                Self::remove_intent(&mut state, customer_id);
                return;
            }
        };
        permit.forget();

        let mut state = self.state.lock().await;
        Self::remove_intent(&mut state, customer_id);

        // Re-check under the lock so a stop between wake-up and here cannot
        // be missed; the consumed permit goes back.
        if state.stopped {
            state.available.add_permits(1);
            return;
        }

        if state.tickets.is_empty() {
            if !state.waiting_logged {
                info!("Customers are waiting for tickets to become available");
                state.waiting_logged = true;
            }
            return;
        }

        let requested = workers::draw_batch_size(self.config.retrieval_rate());
        let in_stock = state.tickets.len() as u32;
        let to_buy = if requested > in_stock {
            info!(
                "Customer {} requested {} ticket(s), but only {} available in the pool. \
                 Purchasing available tickets",
                customer_id, requested, in_stock
            );
            in_stock
        } else {
            requested
        };

        let mut total_price = 0.0;
        let mut event_names = Vec::with_capacity(to_buy as usize);
        for _ in 0..to_buy {
            let Some(ticket) = state.tickets.pop_front() else {
                break;
            };
            state.tickets_sold += 1;
            state.current_count -= 1;
            total_price += ticket.price;
            event_names.push(ticket.event_name.clone());

            let record = TransactionRecord::new(
                ticket.event_name,
                ticket.price,
                ticket.vendor_id,
                customer_id,
                1,
            );
            if let Err(e) = self.sink.record(record).await {
                error!(
                    "Failed to record transaction for customer {}: {}",
                    customer_id, e
                );
            }
        }

        info!(
            "Customer {} purchased {} ticket(s) for events: {} | total price: ${:.2}",
            customer_id,
            to_buy,
            event_names.join(", "),
            total_price
        );
        Self::log_status(&state);

        if state.tickets_sold >= self.config.total_tickets() && state.tickets.is_empty() {
            info!("All tickets have been sold and the ticket limit has been reached. Stopping the system");
            state.stopped = true;
            self.stop_locked(&mut state);
        }
    }

    /// Spawns one vendor per configured event and the default set of customer
    /// workers. No-op with a warning if already running.
    pub async fn start_ticket_handling(self: Arc<Self>) {
        self.start_workers(DEFAULT_CUSTOMER_WORKERS).await;
    }

    async fn start_workers(self: Arc<Self>, customer_count: u32) {
        let mut state = self.state.lock().await;
        if state.running {
            warn!("System is already running");
            return;
        }
        state.running = true;

        // Reap workers left over from a previous run.
        for handle in state.workers.drain(..) {
            handle.abort();
        }
        self.shutdown.send_replace(false);

        let mut event_names = self.config.event_names();
        event_names.sort();

        let mut handles = Vec::new();
        for (index, event_name) in event_names.into_iter().enumerate() {
            let vendor = VendorWorker::new(
                Arc::clone(&self),
                index as u32 + 1,
                event_name,
                self.shutdown.subscribe(),
            );
            handles.push(tokio::spawn(vendor.run()));
        }
        for customer_id in 1..=customer_count {
            let customer =
                CustomerWorker::new(Arc::clone(&self), customer_id, self.shutdown.subscribe());
            handles.push(tokio::spawn(customer.run()));
        }
        state.workers = handles;

        info!("System started. Vendors and customers are now active");
    }

    /// Stops all worker activity. No-op with a warning if not running.
    pub async fn stop_ticket_handling(&self) {
        let mut state = self.state.lock().await;
        self.stop_locked(&mut state);
    }

    /// Stop path shared by the public operation and the sell-out trigger
    /// inside `purchase_tickets`. Takes the already-held guard so the caller
    /// never reacquires the lock it is holding.
    fn stop_locked(&self, state: &mut PoolState) {
        if !state.running {
            warn!("System is not running");
            return;
        }
        state.running = false;

        info!("System stopped - total statistics:");
        info!("Total tickets added to pool: {}", state.tickets_added);
        info!("Total tickets sold: {}", state.tickets_sold);

        // Wake every purchaser blocked on the availability signal and tell
        // sleeping workers to exit at their next poll.
        state.available.close();
        let _ = self.shutdown.send(true);

        info!("System stopped. All operations halted");
    }

    /// Returns the pool to its initial state: empty queue, zero counters,
    /// fresh availability signal, cleared sale history. Safe to call on a
    /// never-started pool and idempotent.
    pub async fn reset_ticket_handling(&self) {
        let mut state = self.state.lock().await;
        if state.running {
            self.stop_locked(&mut state);
        }

        state.tickets.clear();
        state.tickets_added = 0;
        state.tickets_sold = 0;
        state.current_count = 0;
        state.available = Arc::new(Semaphore::new(0));
        state.waiting.clear();
        state.waiting_logged = false;
        for handle in state.workers.drain(..) {
            handle.abort();
        }
        state.running = false;
        state.stopped = false;
        self.shutdown.send_replace(false);

        if let Err(e) = self.sink.clear_history().await {
            error!("Failed to clear transaction history: {}", e);
        }
    }

    /// Resolves once the pool has been stopped, whether by sell-out or by an
    /// explicit stop.
    pub async fn wait_until_stopped(&self) {
        let mut rx = self.shutdown.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub async fn tickets_added(&self) -> u32 {
        self.state.lock().await.tickets_added
    }

    pub async fn tickets_sold(&self) -> u32 {
        self.state.lock().await.tickets_sold
    }

    pub async fn current_tickets(&self) -> u32 {
        self.state.lock().await.current_count
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }

    pub async fn is_stopped(&self) -> bool {
        self.state.lock().await.stopped
    }

    fn remove_intent(state: &mut PoolState, customer_id: u32) {
        if let Some(pos) = state.waiting.iter().position(|&id| id == customer_id) {
            state.waiting.remove(pos);
        }
    }

    fn log_status(state: &PoolState) {
        info!(
            "Ticket pool status - current tickets: {} | total added: {} | total sold: {}",
            state.current_count, state.tickets_added, state.tickets_sold
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::transaction::{InMemoryTransactionLog, MockTransactionSink};

    // Helper to build a single-event config with a generous capacity.
    fn test_config(total: u32, release_rate: u32, retrieval_rate: u32) -> PoolConfig {
        PoolConfig::new(total, release_rate, retrieval_rate, total * 10)
            .unwrap()
            .with_event("Rock Concert", 5.0)
            .unwrap()
    }

    fn test_pool(config: PoolConfig) -> (Arc<TicketPool>, Arc<InMemoryTransactionLog>) {
        let log = Arc::new(InMemoryTransactionLog::new());
        let pool = Arc::new(TicketPool::new(config, log.clone()));
        (pool, log)
    }

    async fn assert_counters(pool: &TicketPool, added: u32, sold: u32, current: u32) {
        assert_eq!(pool.tickets_added().await, added);
        assert_eq!(pool.tickets_sold().await, sold);
        assert_eq!(pool.current_tickets().await, current);

        let state = pool.state.lock().await;
        assert_eq!(state.tickets.len() as u32, current);
        assert_eq!(state.tickets_added - state.tickets_sold, current);
    }

    #[tokio::test]
    async fn test_add_clamps_to_remaining_quota() {
        let (pool, _) = test_pool(test_config(10, 5, 3));

        assert_eq!(
            pool.add_tickets("Rock Concert", 1, 7, 5.0).await,
            AddOutcome::Added(7)
        );
        // Only 3 remain under the quota, so a request for 7 adds exactly 3.
        assert_eq!(
            pool.add_tickets("Rock Concert", 1, 7, 5.0).await,
            AddOutcome::Added(3)
        );
        assert_counters(&pool, 10, 0, 10).await;

        assert_eq!(
            pool.add_tickets("Rock Concert", 1, 1, 5.0).await,
            AddOutcome::QuotaExhausted
        );
        assert_counters(&pool, 10, 0, 10).await;
    }

    #[tokio::test]
    async fn test_counters_stay_consistent_across_adds_and_purchases() {
        // Retrieval rate 1 makes every purchase take exactly one ticket.
        let (pool, _) = test_pool(test_config(10, 5, 1));

        pool.add_tickets("Rock Concert", 1, 5, 5.0).await;
        assert_counters(&pool, 5, 0, 5).await;

        pool.purchase_tickets(1).await;
        assert_counters(&pool, 5, 1, 4).await;

        pool.add_tickets("Rock Concert", 1, 2, 5.0).await;
        pool.purchase_tickets(2).await;
        assert_counters(&pool, 7, 2, 5).await;
    }

    #[tokio::test]
    async fn test_purchases_drain_in_fifo_order() {
        let config = PoolConfig::new(10, 5, 1, 100)
            .unwrap()
            .with_event("Rock Concert", 5.0)
            .unwrap()
            .with_event("Comedy Night", 25.5)
            .unwrap();
        let (pool, log) = test_pool(config);

        pool.add_tickets("Rock Concert", 1, 2, 5.0).await;
        pool.add_tickets("Comedy Night", 2, 1, 25.5).await;

        pool.purchase_tickets(1).await;
        pool.purchase_tickets(1).await;
        pool.purchase_tickets(1).await;

        let events: Vec<String> = log
            .records()
            .await
            .into_iter()
            .map(|r| r.event_name)
            .collect();
        assert_eq!(events, ["Rock Concert", "Rock Concert", "Comedy Night"]);
    }

    #[tokio::test]
    async fn test_stopped_pool_ignores_adds_and_purchases() {
        let (pool, log) = test_pool(test_config(2, 5, 1));

        pool.add_tickets("Rock Concert", 1, 2, 5.0).await;
        pool.purchase_tickets(1).await;
        pool.purchase_tickets(2).await;

        // Quota fully sold and queue empty: the pool stops itself.
        assert!(pool.is_stopped().await);
        assert_counters(&pool, 2, 2, 0).await;
        assert_eq!(log.records().await.len(), 2);

        assert_eq!(
            pool.add_tickets("Rock Concert", 1, 1, 5.0).await,
            AddOutcome::QuotaExhausted
        );
        pool.purchase_tickets(3).await;
        assert_counters(&pool, 2, 2, 0).await;
        assert_eq!(log.records().await.len(), 2);
    }

    #[tokio::test]
    async fn test_reset_restores_initial_state_and_is_idempotent() {
        let (pool, log) = test_pool(test_config(2, 5, 1));

        // Reset on a never-started pool is safe.
        pool.reset_ticket_handling().await;
        assert_counters(&pool, 0, 0, 0).await;

        pool.add_tickets("Rock Concert", 1, 2, 5.0).await;
        pool.purchase_tickets(1).await;
        pool.purchase_tickets(2).await;
        assert!(pool.is_stopped().await);

        pool.reset_ticket_handling().await;
        assert_counters(&pool, 0, 0, 0).await;
        assert!(!pool.is_stopped().await);
        assert!(!pool.is_running().await);
        assert!(log.records().await.is_empty());

        pool.reset_ticket_handling().await;
        assert_counters(&pool, 0, 0, 0).await;

        // The pool is usable again after a reset.
        assert_eq!(
            pool.add_tickets("Rock Concert", 1, 1, 5.0).await,
            AddOutcome::Added(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_purchase_blocks_until_tickets_are_added() {
        let (pool, _) = test_pool(test_config(10, 5, 1));

        let buyer = Arc::clone(&pool);
        let handle = tokio::spawn(async move { buyer.purchase_tickets(1).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished(), "purchase should block on empty pool");

        pool.add_tickets("Rock Concert", 1, 1, 5.0).await;
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("purchase should complete after an add")
            .unwrap();

        assert_counters(&pool, 1, 1, 0).await;
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_abort_purchase() {
        let mut sink = MockTransactionSink::new();
        sink.expect_record()
            .returning(|_| Err(TicketError::SinkFailure("transactions table is gone".into())));

        let pool = Arc::new(TicketPool::new(test_config(10, 5, 1), Arc::new(sink)));

        pool.add_tickets("Rock Concert", 1, 1, 5.0).await;
        pool.purchase_tickets(1).await;

        // The in-memory sale is authoritative even though recording failed.
        assert_counters(&pool, 1, 1, 0).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sellout_scenario_runs_to_completion() {
        // Quota 10, one $5 event, release rate 5, retrieval rate 3, one
        // vendor and one customer.
        let (pool, log) = test_pool(test_config(10, 5, 3));

        Arc::clone(&pool).start_workers(1).await;
        assert!(pool.is_running().await);

        timeout(Duration::from_secs(600), pool.wait_until_stopped())
            .await
            .expect("simulation should sell out in bounded time");

        assert!(pool.is_stopped().await);
        assert!(!pool.is_running().await);
        assert_counters(&pool, 10, 10, 0).await;

        let records = log.records().await;
        assert_eq!(records.len(), 10);
        assert!(records.iter().all(|r| r.quantity == 1));
        let total: f64 = records.iter().map(|r| r.price).sum();
        assert!((total - 50.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_vendors_and_customers_converge() {
        let config = PoolConfig::new(30, 4, 2, 300)
            .unwrap()
            .with_event("Rock Concert", 45.0)
            .unwrap()
            .with_event("Comedy Night", 25.5)
            .unwrap()
            .with_event("Jazz Festival", 60.0)
            .unwrap();
        let (pool, log) = test_pool(config);

        Arc::clone(&pool).start_ticket_handling().await;

        timeout(Duration::from_secs(600), pool.wait_until_stopped())
            .await
            .expect("simulation should sell out in bounded time");

        assert_counters(&pool, 30, 30, 0).await;
        assert_eq!(log.records().await.len(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_all_worker_activity() {
        let (pool, _) = test_pool(test_config(1000, 5, 3));

        Arc::clone(&pool).start_workers(2).await;

        // Let a few vendor iterations land.
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(pool.tickets_added().await > 0);

        pool.stop_ticket_handling().await;
        assert!(!pool.is_running().await);

        // A beat for in-flight operations to drain, then nothing moves.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let added = pool.tickets_added().await;
        let sold = pool.tickets_sold().await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(pool.tickets_added().await, added);
        assert_eq!(pool.tickets_sold().await, sold);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_keeps_a_single_worker_set() {
        let (pool, _) = test_pool(test_config(100, 5, 3));

        Arc::clone(&pool).start_workers(2).await;
        let worker_count = pool.state.lock().await.workers.len();

        Arc::clone(&pool).start_workers(2).await;
        assert_eq!(pool.state.lock().await.workers.len(), worker_count);
        assert!(pool.is_running().await);

        pool.stop_ticket_handling().await;
    }

    #[tokio::test]
    async fn test_stop_without_start_is_a_noop() {
        let (pool, _) = test_pool(test_config(10, 5, 3));
        pool.stop_ticket_handling().await;
        assert!(!pool.is_running().await);
        assert!(!pool.is_stopped().await);
    }
}
