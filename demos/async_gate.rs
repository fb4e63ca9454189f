use std::sync::Arc;
use std::time::Duration;

use portcullis::futures::AsyncRateGate;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 5 calls per 200ms, at most 2 in flight
    let gate = Arc::new(AsyncRateGate::new(
        Duration::ZERO,
        Duration::from_millis(200),
        5,
        2,
    ));
    let started = Instant::now();
    let mut tasks = tokio::task::JoinSet::new();
    for id in 0..12u32 {
        let gate = Arc::clone(&gate);
        tasks.spawn(async move {
            gate.execute(
                |id| async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    id
                },
                id,
            )
            .await
        });
    }
    while let Some(Ok(id)) = tasks.join_next().await {
        println!("request {id} done at {:?}", started.elapsed());
    }
    println!("tokens back in the pool: {}", gate.available_tokens());
}
