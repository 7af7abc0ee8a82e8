#![no_main]
use libfuzzer_sys::fuzz_target;
use resdelta::format::{DiffReader, ReadOptions, read_diffs};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must only ever produce errors, never panics or
    // unbounded allocations.
    let _ = read_diffs(data);

    let opts = ReadOptions {
        verify_checksum: false,
        ..Default::default()
    };
    if let Ok(reader) = DiffReader::with_options(data, opts) {
        for record in reader.take(1024) {
            if record.is_err() {
                break;
            }
        }
    }
});
