#![no_main]

use libfuzzer_sys::fuzz_target;
use mesh_profile::{BuildPlate, Mesh};
use std::io::Write;
use tempfile::NamedTempFile;

fuzz_target!(|data: &[u8]| {
    let mut file = match NamedTempFile::with_suffix(".obj") {
        Ok(f) => f,
        Err(_) => return,
    };
    if file.write_all(data).is_err() {
        return;
    }

    if let Ok(mesh) = Mesh::load(file.path()) {
        let _ = mesh.solve_placement(&BuildPlate::default(), 5.0);
    }
});
