use consumer_queue::{bounded, try_bounded, QueueError, Timeout};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_basic_push_pop() {
    let (mut tx, queue) = bounded(8);

    tx.push(42);
    assert_eq!(queue.pop(Timeout::Forever), Some(42));
}

#[test]
fn test_fifo_order() {
    let (mut tx, queue) = bounded(16);

    for i in 0..10 {
        tx.push(i);
    }

    for i in 0..10 {
        assert_eq!(queue.try_pop(), Some(i));
    }
}

#[test]
fn test_full_queue_drops_oldest() {
    let (mut tx, queue) = bounded(4);

    for i in 0..6 {
        tx.push(i);
    }

    assert_eq!(queue.available_count(), 4);
    assert_eq!(queue.evicted_count(), 2);
    let drained: Vec<_> = std::iter::from_fn(|| queue.try_pop()).collect();
    assert_eq!(drained, vec![2, 3, 4, 5]);
}

#[test]
fn test_scenario_capacity_three() {
    let (mut tx, queue) = bounded(3);

    for sample in ['A', 'B', 'C', 'D'] {
        tx.push(sample);
    }

    assert_eq!(queue.pop(Timeout::default()), Some('B'));
    assert_eq!(queue.pop(Timeout::default()), Some('C'));
    assert_eq!(queue.pop(Timeout::default()), Some('D'));

    let start = Instant::now();
    assert_eq!(queue.pop(Timeout::from_secs_f64(0.1)), None);
    assert!(start.elapsed() >= Duration::from_secs_f64(0.1));
}

#[test]
fn test_empty_queue() {
    let (_tx, queue) = bounded::<i32>(4);
    assert_eq!(queue.try_pop(), None);
    assert_eq!(queue.pop(Timeout::NonBlocking), None);
    assert_eq!(queue.pop(Timeout::from_secs_f64(0.0)), None);
    assert_eq!(queue.pop(Timeout::from_secs_f64(-3.0)), None);
}

#[test]
fn test_non_blocking_pop_returns_immediately() {
    let (_tx, queue) = bounded::<i32>(4);
    let start = Instant::now();
    assert_eq!(queue.pop(Timeout::NonBlocking), None);
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_capacity() {
    let (_tx, queue) = bounded::<i32>(1024);
    assert_eq!(queue.capacity(), 1024);
}

#[test]
fn test_len_and_empty() {
    let (mut tx, queue) = bounded(8);

    assert!(queue.is_empty());
    assert_eq!(queue.available_count(), 0);

    tx.push(1);
    tx.push(2);

    assert!(!queue.is_empty());
    assert_eq!(queue.available_count(), 2);
}

#[test]
fn test_flush() {
    let (mut tx, queue) = bounded(5);
    assert_eq!(queue.flush(), 0);

    for i in 0..3 {
        tx.push(i);
    }
    assert_eq!(queue.flush(), 3);
    assert!(queue.is_empty());
    assert_eq!(queue.flush(), 0);

    tx.push(7);
    assert_eq!(queue.try_pop(), Some(7));
}

#[test]
fn test_blocking_pop_wakes_on_push() {
    let (mut tx, queue) = bounded(4);
    let q_recv = queue.clone();

    let consumer = thread::spawn(move || q_recv.pop(Timeout::Forever));

    thread::sleep(Duration::from_millis(50));
    tx.push(99);

    assert_eq!(consumer.join().unwrap(), Some(99));
}

#[test]
fn test_timed_pop_receives_before_deadline() {
    let (mut tx, queue) = bounded(4);
    let q_recv = queue.clone();

    let consumer = thread::spawn(move || {
        let start = Instant::now();
        let got = q_recv.pop(Timeout::After(Duration::from_secs(10)));
        (got, start.elapsed())
    });

    thread::sleep(Duration::from_millis(20));
    tx.push("late");

    let (got, waited) = consumer.join().unwrap();
    assert_eq!(got, Some("late"));
    assert!(waited < Duration::from_secs(10));
}

#[test]
fn test_timeout_fidelity_with_several_waiters() {
    let (_tx, queue) = bounded::<u8>(2);
    let timeout = Duration::from_millis(80);

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let q = queue.clone();
            thread::spawn(move || {
                let start = Instant::now();
                let got = q.pop(Timeout::After(timeout));
                (got, start.elapsed())
            })
        })
        .collect();

    for h in handles {
        let (got, waited) = h.join().unwrap();
        assert_eq!(got, None);
        assert!(waited >= timeout);
    }
}

#[test]
fn test_spsc_threaded_with_eviction() {
    const MESSAGES: usize = 10_000;

    let (mut tx, queue) = bounded(16);
    let done = Arc::new(AtomicBool::new(false));
    let q_recv = queue.clone();
    let done_recv = done.clone();

    let producer = thread::spawn(move || {
        for i in 0..MESSAGES {
            tx.push(i);
        }
        done.store(true, Ordering::Release);
    });

    let consumer = thread::spawn(move || {
        let mut received = vec![];
        loop {
            match q_recv.pop(Timeout::After(Duration::from_millis(1))) {
                Some(val) => received.push(val),
                None if done_recv.load(Ordering::Acquire) && q_recv.is_empty() => break,
                None => {}
            }
        }
        received
    });

    producer.join().unwrap();
    let received = consumer.join().unwrap();

    assert!(received.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(received.len() as u64 + queue.evicted_count(), MESSAGES as u64);
    assert_eq!(received.last(), Some(&(MESSAGES - 1)));
}

#[test]
fn test_spmc_threaded_no_duplicates() {
    const CONSUMERS: usize = 4;
    const TOTAL_MESSAGES: usize = 1000;

    let (mut tx, queue) = bounded(10);
    let done = Arc::new(AtomicBool::new(false));
    let mut consumers = vec![];

    for _ in 0..CONSUMERS {
        let q = queue.clone();
        let done = done.clone();
        consumers.push(thread::spawn(move || {
            let mut received = vec![];
            loop {
                match q.pop(Timeout::After(Duration::from_millis(1))) {
                    Some(val) => received.push(val),
                    None if done.load(Ordering::Acquire) && q.is_empty() => break,
                    None => {}
                }
            }
            received
        }));
    }

    let producer = thread::spawn(move || {
        for i in 0..TOTAL_MESSAGES {
            tx.push(i);
        }
        done.store(true, Ordering::Release);
    });
    producer.join().unwrap();

    let mut seen = HashSet::new();
    let mut total = 0;
    for c in consumers {
        let received = c.join().unwrap();
        // each consumer claims in cursor order
        assert!(received.windows(2).all(|w| w[0] < w[1]));
        total += received.len();
        for val in received {
            assert!(seen.insert(val), "sample {val} delivered twice");
        }
    }

    assert_eq!(total as u64 + queue.evicted_count(), TOTAL_MESSAGES as u64);
}

#[test]
fn test_exactly_once_for_resident_samples() {
    const CONSUMERS: usize = 8;
    const RESIDENT: usize = 512;

    let (mut tx, queue) = bounded(RESIDENT);
    for i in 0..RESIDENT {
        tx.push(i);
    }

    let barrier = Arc::new(Barrier::new(CONSUMERS));
    let handles: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let q = queue.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                std::iter::from_fn(|| q.try_pop()).collect::<Vec<_>>()
            })
        })
        .collect();

    let mut all: Vec<usize> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    all.sort_unstable();
    assert_eq!(all, (0..RESIDENT).collect::<Vec<_>>());
    assert!(queue.is_empty());
}

#[test]
fn test_accounting_under_contention() {
    const CAPACITY: usize = 4;
    const MESSAGES: usize = 20_000;

    let (mut tx, queue) = bounded(CAPACITY);
    let done = Arc::new(AtomicBool::new(false));
    let popped = Arc::new(AtomicUsize::new(0));

    let consumers: Vec<_> = (0..2)
        .map(|_| {
            let q = queue.clone();
            let done = done.clone();
            let popped = popped.clone();
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    assert!(q.available_count() <= CAPACITY);
                    if q.try_pop().is_some() {
                        popped.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for i in 0..MESSAGES {
        tx.push(i);
    }
    done.store(true, Ordering::Release);

    for h in consumers {
        h.join().unwrap();
    }
    let remaining = queue.flush();
    assert!(remaining <= CAPACITY);
    assert_eq!(
        (popped.load(Ordering::Relaxed) + remaining) as u64 + queue.evicted_count(),
        MESSAGES as u64
    );
}

#[test]
fn test_drop_elements() {
    static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug)]
    struct DropCounter;

    impl Drop for DropCounter {
        fn drop(&mut self) {
            DROP_COUNT.fetch_add(1, Ordering::Relaxed);
        }
    }

    {
        let (mut tx, queue) = bounded(8);
        for _ in 0..12 {
            tx.push(DropCounter);
        }
        // four evicted on overflow
        assert_eq!(DROP_COUNT.load(Ordering::Relaxed), 4);
        drop(queue.try_pop());
        assert_eq!(DROP_COUNT.load(Ordering::Relaxed), 5);
    }

    assert_eq!(DROP_COUNT.load(Ordering::Relaxed), 12);
}

#[test]
fn test_shared_sample_handles() {
    let sample = Arc::new(vec![1.0f32, 2.0, 3.0]);
    let (mut tx, queue) = bounded(2);

    tx.push(sample.clone());
    tx.push(sample.clone());
    tx.push(sample.clone());
    assert_eq!(Arc::strong_count(&sample), 3);

    assert_eq!(queue.flush(), 2);
    assert_eq!(Arc::strong_count(&sample), 1);
}

#[test]
fn test_alternating_push_pop() {
    let (mut tx, queue) = bounded(4);

    for i in 0..100 {
        tx.push(i);
        assert_eq!(queue.try_pop(), Some(i));
    }
}

#[test]
fn test_wrap_around() {
    let (mut tx, queue) = bounded(8);

    for round in 0..10 {
        for i in 0..8 {
            tx.push(round * 100 + i);
        }
        for i in 0..8 {
            assert_eq!(queue.try_pop(), Some(round * 100 + i));
        }
    }
    assert_eq!(queue.evicted_count(), 0);
}

#[test]
fn test_capacity_one() {
    let (mut tx, queue) = bounded(1);

    for i in 0..5 {
        tx.push(i);
    }
    assert_eq!(queue.available_count(), 1);
    assert_eq!(queue.try_pop(), Some(4));
    assert_eq!(queue.try_pop(), None);
}

#[test]
fn test_capacity_one_threaded() {
    const MESSAGES: usize = 5000;

    let (mut tx, queue) = bounded(1);
    let done = Arc::new(AtomicBool::new(false));

    let consumers: Vec<_> = (0..2)
        .map(|_| {
            let q = queue.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut received = vec![];
                loop {
                    match q.try_pop() {
                        Some(val) => received.push(val),
                        None if done.load(Ordering::Acquire) && q.is_empty() => break,
                        None => std::hint::spin_loop(),
                    }
                }
                received
            })
        })
        .collect();

    for i in 0..MESSAGES {
        tx.push(i);
    }
    done.store(true, Ordering::Release);

    let mut seen = HashSet::new();
    for c in consumers {
        for val in c.join().unwrap() {
            assert!(seen.insert(val));
        }
    }
    assert_eq!(seen.len() as u64 + queue.evicted_count(), MESSAGES as u64);
}

#[test]
#[should_panic(expected = "capacity must be greater than 0")]
fn test_zero_capacity_panics() {
    let _pair = bounded::<i32>(0);
}

#[test]
fn test_try_bounded_reports_errors() {
    assert_eq!(
        try_bounded::<i32>(0).unwrap_err(),
        QueueError::ZeroCapacity
    );
    assert!(try_bounded::<i32>(3).is_ok());
}

#[test]
fn test_producer_handed_to_another_thread() {
    let (mut tx, queue) = bounded(8);
    tx.push(0);

    let tx = thread::spawn(move || {
        for i in 1..4 {
            tx.push(i);
        }
        tx
    })
    .join()
    .unwrap();

    let drained: Vec<_> = std::iter::from_fn(|| queue.try_pop()).collect();
    assert_eq!(drained, vec![0, 1, 2, 3]);
    drop(tx);
}
