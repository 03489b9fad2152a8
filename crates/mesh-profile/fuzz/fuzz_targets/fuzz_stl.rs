#![no_main]

use libfuzzer_sys::fuzz_target;
use mesh_profile::{FeatureParams, Mesh, extract_features};
use std::io::Write;
use tempfile::NamedTempFile;

fuzz_target!(|data: &[u8]| {
    let mut file = match NamedTempFile::with_suffix(".stl") {
        Ok(f) => f,
        Err(_) => return,
    };
    if file.write_all(data).is_err() {
        return;
    }

    // Loading may fail; anything that loads must extract without panicking.
    if let Ok(mesh) = Mesh::load(file.path()) {
        let _ = extract_features(&mesh, &FeatureParams::default());
    }
});
