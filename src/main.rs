use std::sync::Arc;

use ticket_pool::{
    config::PoolConfig,
    pool::TicketPool,
    transaction::InMemoryTransactionLog,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = PoolConfig::new(100, 5, 3, 500)?
        .with_event("Rock Concert", 45.0)?
        .with_event("Comedy Night", 25.5)?
        .with_event("Jazz Festival", 60.0)?;

    let transaction_log = Arc::new(InMemoryTransactionLog::new());
    let pool = Arc::new(TicketPool::new(config, transaction_log.clone()));

    Arc::clone(&pool).start_ticket_handling().await;
    pool.wait_until_stopped().await;

    println!(
        "Simulation finished: {} ticket(s) added, {} ticket(s) sold",
        pool.tickets_added().await,
        pool.tickets_sold().await
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&transaction_log.records().await)?
    );

    Ok(())
}
