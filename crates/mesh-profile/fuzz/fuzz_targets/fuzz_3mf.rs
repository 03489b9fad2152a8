#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Write;
use tempfile::NamedTempFile;

fuzz_target!(|data: &[u8]| {
    let mut file = match NamedTempFile::with_suffix(".3mf") {
        Ok(f) => f,
        Err(_) => return,
    };
    if file.write_all(data).is_err() {
        return;
    }

    // Arbitrary zip containers and model XML must never panic.
    let _ = mesh_profile::Mesh::load(file.path());
});
