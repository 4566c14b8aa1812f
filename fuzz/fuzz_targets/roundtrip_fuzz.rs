#![no_main]
use libfuzzer_sys::fuzz_target;
use phdiff::{ApplyOptions, Compression, CreateOptions};

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    // First byte picks the codec, second the split and block size.
    let compression = Compression::ALL[data[0] as usize % Compression::ALL.len()];
    let payload = &data[2..];
    let split = data[1] as usize % (payload.len() + 1);
    let (source, target) = payload.split_at(split);

    let opts = CreateOptions {
        match_block_size: 4 + (data[1] as usize % 61),
        ..CreateOptions::with_compression(compression)
    };
    let patch = phdiff::create_patch_bytes(source, target, &opts).expect("create failed");
    let rebuilt =
        phdiff::apply_patch_bytes(source, &patch, &ApplyOptions::default()).expect("apply failed");
    assert_eq!(rebuilt, target);
});
