#![no_main]
use libfuzzer_sys::fuzz_target;
use phdiff::codec::CodecOptions;
use phdiff::container::Prelude;
use phdiff::format::varsize;

fuzz_target!(|data: &[u8]| {
    // VarSize decoding is consistent between slice and stream readers and
    // re-encodes to the bytes it consumed.
    if let Ok((value, len)) = varsize::read_i64(data) {
        let mut stream = data;
        assert_eq!(varsize::stream_read_i64(&mut stream).ok(), Some(value));
        assert_eq!(stream.len(), data.len() - len);
        if value != 0 && varsize::sizeof_i64(value) == len {
            assert_eq!(varsize::encode(value), &data[..len]);
        }
    }

    let _ = Prelude::read_from(&mut &data[..]);
    let _ = phdiff::patch_info_bytes(data, &CodecOptions::default());
});
