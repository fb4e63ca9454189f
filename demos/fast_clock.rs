use std::time::Duration;

use portcullis::{FastClock, GateLimit, RateGate};

fn main() {
    let clock = quanta::Clock::new();
    // Updates at 1Khz
    let _quanta_thread = quanta::Upkeep::new_with_clock(Duration::from_millis(1), clock.clone())
        .start()
        .unwrap();
    let clock = FastClock::new(clock);
    let limit = GateLimit::new(Duration::from_millis(100), 10, 4);
    let gate = RateGate::with_clock(limit, clock);
    let started = std::time::Instant::now();
    let total: u64 = (0..25u64).map(|i| gate.execute(|x| x * 2, i)).sum();
    // 25 calls at 10 per window need at least two window edges
    println!("sum {total} after {:?}", started.elapsed());
    assert!(started.elapsed() >= Duration::from_millis(190));
}
