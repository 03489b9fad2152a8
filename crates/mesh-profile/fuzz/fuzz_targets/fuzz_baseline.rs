#![no_main]

use libfuzzer_sys::fuzz_target;
use mesh_profile::{Baseline, ConsumerVariant, ProfileRecord, SettingsTable};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(baseline) = Baseline::from_json_str(text) {
        for variant in ConsumerVariant::ALL {
            let table =
                SettingsTable::for_consumer(&baseline, &ProfileRecord::default(), "PLA", variant);
            let _ = table.to_json_pretty();
        }
    }
});
