#![no_main]

use batch_distinct_counter::Sketch;
use libfuzzer_sys::fuzz_target;
use wyhash::wyhash;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // Split on a chunk boundary so both halves chunk the same way as the
    // whole input.
    let split_index = (wyhash(data, 0) as usize % (data.len() / 4 + 1)) * 4;
    let (first_half, second_half) = data.split_at(split_index);

    let mut first = Sketch::new();
    for chunk in first_half.chunks(4) {
        first.insert(&format!("{chunk:?}"));
        assert!(first.observed_buckets() <= 512);
    }

    let mut second = Sketch::new();
    for chunk in second_half.chunks(4) {
        second.insert(&format!("{chunk:?}"));
    }

    // Merging the halves must equal one pass over the whole input.
    let mut whole = Sketch::new();
    for chunk in data.chunks(4) {
        whole.insert(&format!("{chunk:?}"));
    }

    let mut merged = first.clone();
    merged.merge(&second);
    assert_eq!(merged, whole);
    let _ = merged.estimate();
});
