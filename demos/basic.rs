use std::time::{Duration, Instant};

use portcullis::RateGate;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let gate = RateGate::new(Duration::ZERO, Duration::from_secs(1), 2, 1);
    let started = Instant::now();
    for arg in 1..=3 {
        let out = gate.execute(|x| x, arg);
        println!("call {out} returned after {:?}", started.elapsed());
    }
    // the third call waited for the rest of the one second window
    assert!(started.elapsed() >= Duration::from_millis(990));
}
