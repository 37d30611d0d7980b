#![no_main]

use combine_archive::container::{ContainerReader, HEADER_SIZE};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    if data.len() < HEADER_SIZE {
        return;
    }

    // Opening must never panic, only reject
    let mut reader = match ContainerReader::new(Cursor::new(data.to_vec())) {
        Ok(r) => r,
        Err(_) => return,
    };

    let paths: Vec<String> = reader.entries().iter().map(|e| e.path.clone()).collect();
    for path in &paths {
        let _ = reader.read_entry(path);
    }

    let _ = reader.entry_count();
    let _ = reader.get_entry("");
    let _ = reader.get_entry("../../../etc/passwd");
});
