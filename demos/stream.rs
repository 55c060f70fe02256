//! One producer streaming samples to a fast and a slow reader

use consumer_queue::{FanOut, Timeout};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug)]
struct Sample {
    seq: u32,
    values: [f32; 4],
}

fn main() {
    println!("consumer_queue - streaming example\n");

    let stream = FanOut::<Arc<Sample>>::new();

    // The fast reader keeps up; the slow one only has room for 4 samples and
    // loses the oldest whenever it falls behind.
    let fast = stream.new_reader(64).expect("valid capacity");
    let slow = stream.new_reader(4).expect("valid capacity");
    println!("readers registered: {}", stream.reader_count());

    let fast_reader = thread::spawn(move || {
        let mut received = 0;
        while let Some(sample) = fast.pop(Timeout::After(Duration::from_millis(200))) {
            received += 1;
            if sample.seq % 10 == 0 {
                println!("fast: sample {} {:?}", sample.seq, sample.values);
            }
        }
        received
    });

    let slow_reader = thread::spawn(move || {
        let mut received = vec![];
        while let Some(sample) = slow.pop(Timeout::from_secs_f64(0.2)) {
            received.push(sample.seq);
            thread::sleep(Duration::from_millis(15));
        }
        println!("slow: dropped {} samples", slow.evicted_count());
        received
    });

    for seq in 0..50u32 {
        let t = seq as f32;
        stream.push_sample(Arc::new(Sample {
            seq,
            values: [t.sin(), t.cos(), t * 0.5, -t],
        }));
        thread::sleep(Duration::from_millis(2));
    }
    println!("Producer finished!");

    let fast_count = fast_reader.join().unwrap();
    let slow_seen = slow_reader.join().unwrap();

    println!("fast reader received {fast_count} samples");
    println!("slow reader received {:?}", slow_seen);
    println!("readers still registered: {}", stream.reader_count());
}
