#![no_main]
use libfuzzer_sys::fuzz_target;
use phdiff::ApplyOptions;
use phdiff::container::Prelude;

/// Declared sizes above this are skipped so runs stay within memory limits.
const MAX_DECLARED: u64 = 1 << 24;

fuzz_target!(|data: &[u8]| {
    // Apply must never panic on arbitrary patches, only return errors.
    let declared_ok = |patch: &[u8]| match Prelude::read_from(&mut &patch[..]) {
        Ok(p) => p.target_size <= MAX_DECLARED && p.raw_patch_size.unwrap_or(0) <= MAX_DECLARED,
        Err(_) => true,
    };

    if declared_ok(data) {
        let _ = phdiff::apply_patch_bytes(&[], data, &ApplyOptions::default());
    }

    // Also fuzz with a non-empty source.
    if data.len() >= 2 {
        let split = data.len() / 2;
        let (source, patch) = data.split_at(split);
        if declared_ok(patch) {
            let _ = phdiff::apply_patch_bytes(source, patch, &ApplyOptions::default());
        }
    }
});
