use phdiff::codec::CodecOptions;
use phdiff::container::{self, Prelude};
use phdiff::engine::EngineError;
use phdiff::format::{FORMAT_MATCH_BLOCKS, PatchHeader, header, varsize};
use phdiff::{
    ApplyOptions, Compression, CreateOptions, DeltaEngine, DeltaParams, apply_patch_bytes,
    patch_info_bytes,
};

#[derive(Debug)]
struct Vector {
    name: String,
    source: Vec<u8>,
    patch: Vec<u8>,
    target: Vec<u8>,
}

fn hex_to_bytes(s: &str) -> Vec<u8> {
    let s = s.trim();
    if s.is_empty() {
        return Vec::new();
    }
    assert!(
        s.len().is_multiple_of(2),
        "hex string must have even length"
    );
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

fn load_vectors() -> Vec<Vector> {
    let manifest = include_str!("vectors/manifest.tsv");
    manifest
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .map(|line| {
            let parts: Vec<_> = line.split('|').collect();
            assert_eq!(parts.len(), 4, "invalid vector row: {line}");
            Vector {
                name: parts[0].to_string(),
                source: hex_to_bytes(parts[1]),
                patch: hex_to_bytes(parts[2]),
                target: hex_to_bytes(parts[3]),
            }
        })
        .collect()
}

/// Hands back a fixed raw patch, whatever the inputs.
struct Fixed(Vec<u8>);

impl DeltaEngine for Fixed {
    fn compute_delta(
        &self,
        _source: &[u8],
        _target: &[u8],
        _params: &DeltaParams,
    ) -> Result<Vec<u8>, EngineError> {
        Ok(self.0.clone())
    }

    fn apply_delta(&self, _source: &[u8], _patch: &[u8]) -> Result<Vec<u8>, EngineError> {
        Ok(self.0.clone())
    }
}

#[test]
fn vectors_apply() {
    let vectors = load_vectors();
    assert!(vectors.len() >= 5);
    for v in vectors {
        let out = apply_patch_bytes(&v.source, &v.patch, &ApplyOptions::default())
            .unwrap_or_else(|e| panic!("{}: {e}", v.name));
        assert_eq!(out, v.target, "{}", v.name);
    }
}

#[test]
fn vectors_are_reproduced_byte_for_byte() {
    for v in load_vectors() {
        let prelude = Prelude::read_from(&mut &v.patch[..]).unwrap();
        let info = patch_info_bytes(&v.patch, &CodecOptions::default()).unwrap();
        assert_eq!(info.target_size, v.target.len() as u64, "{}", v.name);

        // For uncompressed payloads the payload is the raw patch itself.
        if prelude.compression != Compression::None {
            continue;
        }
        let payload_start = (info.patch_size - info.payload_size) as usize;
        let raw = v.patch[payload_start..].to_vec();

        let mut out = Vec::new();
        container::create_patch_with(
            &Fixed(raw),
            &v.source,
            &v.target,
            &mut out,
            &CreateOptions::with_compression(Compression::None),
        )
        .unwrap();
        assert_eq!(out, v.patch, "{}", v.name);
    }
}

#[test]
fn crle_vector_matches_encoder_output() {
    let raw = [0x00u8, 0x08, 0x61, 0x61, 0x61, 0x61, 0x61, 0x61, 0x61, 0x61, 0x00];
    assert_eq!(
        phdiff::codec::crle::encode(&raw),
        [0x00u8, 0x02, 0x00, 0x08, 0x01, 0x08, 0x61, 0x00, 0x01, 0x00]
    );
}

#[test]
fn header_byte_layout() {
    assert_eq!(FORMAT_MATCH_BLOCKS, 2);
    for compression in Compression::ALL {
        let byte = header::pack(FORMAT_MATCH_BLOCKS, compression.id()).unwrap();
        assert_eq!(byte, 0x20 | compression.id());
        assert_eq!(header::unpack(&[byte]).unwrap(), (2, compression.id()));
        assert_eq!(
            PatchHeader::from_byte(byte),
            PatchHeader::new(FORMAT_MATCH_BLOCKS, compression)
        );
    }
    assert_eq!(header::pack(7, 15).unwrap(), 0x7f);
    assert_eq!(header::pack(0, 0).unwrap(), 0x00);
    assert_eq!(header::unpack(&[0xff]).unwrap(), (7, 15));
    assert!(header::unpack(&[]).is_err());
    assert!(header::unpack(&[0x20, 0x00]).is_err());
    assert!(header::pack(8, 0).is_err());
    assert!(header::pack(0, 16).is_err());
}

#[test]
fn varsize_byte_layout() {
    let cases: [(i64, &[u8]); 12] = [
        (0, &[0x00]),
        (1, &[0x01]),
        (63, &[0x3f]),
        (64, &[0x80, 0x01]),
        (1000, &[0xa8, 0x0f]),
        (8191, &[0xbf, 0x7f]),
        (8192, &[0x80, 0x80, 0x01]),
        (-1, &[0x41]),
        (-63, &[0x7f]),
        (-64, &[0xc0, 0x01]),
        (
            i64::MAX,
            &[0xbf, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01],
        ),
        (
            -i64::MAX,
            &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01],
        ),
    ];
    for (value, bytes) in cases {
        assert_eq!(varsize::encode(value), bytes, "encode {value}");
        assert_eq!(varsize::sizeof_i64(value), bytes.len(), "sizeof {value}");
        assert_eq!(
            varsize::read_i64(bytes).unwrap(),
            (value, bytes.len()),
            "decode {value}"
        );
    }
}
