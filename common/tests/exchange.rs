mod support;

use std::sync::Barrier;
use std::thread;

use common::exchange::{ExchangePolicy, FrameExchange, PublishOutcome, SpectrumHandoff};
use common::{BandLevels, NUM_BAND, SPECTRUM_LEN};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use support::{StdDelay, init_logger};

type LevelExchange = FrameExchange<CriticalSectionRawMutex, BandLevels>;

fn frame(n: u8) -> BandLevels {
    [n; NUM_BAND]
}

#[test]
fn drop_policy_consumer_sees_only_last_of_a_burst() {
    init_logger();
    let exchange = LevelExchange::new([0; NUM_BAND], ExchangePolicy::DropFrames);
    let burst_done = Barrier::new(2);

    let seen = thread::scope(|s| {
        s.spawn(|| {
            let mut delay = StdDelay;
            for n in 1..=50 {
                exchange.publish(&frame(n), &mut delay);
            }
            burst_done.wait();
        });

        let consumer = s.spawn(|| {
            burst_done.wait();
            let mut seen = Vec::new();
            while let Some(levels) = exchange.try_take() {
                seen.push(levels);
            }
            seen
        });
        consumer.join().unwrap()
    });

    assert_eq!(seen, [frame(50)]);
    assert_eq!(exchange.published(), 50);
    assert_eq!(exchange.dropped(), 49);
}

#[test]
fn drop_policy_never_goes_backwards() {
    let exchange = LevelExchange::new([0; NUM_BAND], ExchangePolicy::DropFrames);

    let seen = thread::scope(|s| {
        s.spawn(|| {
            for n in 1..=200 {
                // the producer never waits under this policy
                exchange.try_publish(&frame(n)).unwrap();
                thread::yield_now();
            }
        });

        let consumer = s.spawn(|| {
            let mut delay = StdDelay;
            let mut seen = Vec::new();
            loop {
                let levels = exchange.take(&mut delay);
                seen.push(levels[0]);
                if levels[0] == 200 {
                    return seen;
                }
            }
        });
        consumer.join().unwrap()
    });

    assert!(seen.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(
        exchange.dropped() as usize,
        200 - seen.len(),
        "every frame is either seen or counted as dropped"
    );
}

#[test]
fn block_policy_delivers_every_frame_in_order() {
    let exchange = LevelExchange::new([0; NUM_BAND], ExchangePolicy::Block);

    let seen = thread::scope(|s| {
        s.spawn(|| {
            let mut delay = StdDelay;
            for n in 0..=255u8 {
                let outcome = exchange.publish(&frame(n), &mut delay);
                assert_eq!(outcome, PublishOutcome::Published);
            }
        });

        let consumer = s.spawn(|| {
            let mut delay = StdDelay;
            (0..256).map(|_| exchange.take(&mut delay)[0]).collect::<Vec<_>>()
        });
        consumer.join().unwrap()
    });

    assert_eq!(seen, (0..=255u8).collect::<Vec<_>>());
    assert_eq!(exchange.dropped(), 0);
    assert!(!exchange.is_ready());
}

#[test]
fn handoff_buffer_is_never_refilled_while_in_use() {
    const CYCLES: usize = 64;
    let handoff: SpectrumHandoff<CriticalSectionRawMutex, Box<[f32; SPECTRUM_LEN]>> =
        SpectrumHandoff::new();

    let seen = thread::scope(|s| {
        s.spawn(|| {
            let mut delay = StdDelay;
            let mut spectrum = Box::new([0.0f32; SPECTRUM_LEN]);
            for cycle in 0..CYCLES {
                spectrum.fill(cycle as f32);
                assert!(handoff.publish(spectrum).is_ok());
                spectrum = handoff.reclaim(&mut delay);
            }
        });

        let consumer = s.spawn(|| {
            let mut delay = StdDelay;
            let mut seen = Vec::new();
            for _ in 0..CYCLES {
                let spectrum = handoff.acquire(&mut delay);
                let first = spectrum[0];
                thread::yield_now();
                // a refill would show up as a torn buffer
                assert!(spectrum.iter().all(|&e| e == first));
                seen.push(first as usize);
                assert!(handoff.release(spectrum).is_ok());
            }
            seen
        });
        consumer.join().unwrap()
    });

    assert_eq!(seen, (0..CYCLES).collect::<Vec<_>>());
    assert!(!handoff.is_busy());
}
