use std::process::Command;
use tempfile::tempdir;

fn bin() -> String {
    env!("CARGO_BIN_EXE_phdiff").to_string()
}

fn sample() -> (Vec<u8>, Vec<u8>) {
    let source: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    let mut target = source.clone();
    target[5000..5010].copy_from_slice(b"0123456789");
    target.extend_from_slice(b"appended tail");
    (source, target)
}

#[test]
fn cli_create_apply_roundtrip() {
    let dir = tempdir().unwrap();
    let from = dir.path().join("from.bin");
    let to = dir.path().join("to.bin");
    std::fs::write(&from, sample().0).unwrap();
    std::fs::write(&to, sample().1).unwrap();

    for compression in ["none", "lzma", "crle", "bz2", "heatshrink", "zstd", "lz4"] {
        let patch = dir.path().join(format!("{compression}.patch"));
        let output = dir.path().join(format!("{compression}.out"));

        let st = Command::new(bin())
            .args(["create", "--compression", compression])
            .arg(&from)
            .arg(&to)
            .arg(&patch)
            .status()
            .unwrap();
        assert!(st.success(), "{compression}");

        let st = Command::new(bin())
            .arg("apply")
            .arg(&from)
            .arg(&patch)
            .arg(&output)
            .status()
            .unwrap();
        assert!(st.success(), "{compression}");
        assert_eq!(
            std::fs::read(&output).unwrap(),
            std::fs::read(&to).unwrap(),
            "{compression}"
        );
    }
}

#[test]
fn cli_mmap_and_heatshrink_params() {
    let dir = tempdir().unwrap();
    let from = dir.path().join("from.bin");
    let to = dir.path().join("to.bin");
    let patch = dir.path().join("p.patch");
    let output = dir.path().join("out.bin");
    std::fs::write(&from, sample().0).unwrap();
    std::fs::write(&to, sample().1).unwrap();

    let st = Command::new(bin())
        .args([
            "create",
            "-c",
            "heatshrink",
            "--use-mmap",
            "--heatshrink-window-sz2",
            "10",
            "--heatshrink-lookahead-sz2",
            "5",
        ])
        .arg(&from)
        .arg(&to)
        .arg(&patch)
        .status()
        .unwrap();
    assert!(st.success());

    let st = Command::new(bin())
        .args([
            "apply",
            "--heatshrink-window-sz2",
            "10",
            "--heatshrink-lookahead-sz2",
            "5",
        ])
        .arg(&from)
        .arg(&patch)
        .arg(&output)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(std::fs::read(&output).unwrap(), sample().1);
}

#[test]
fn cli_refuses_to_overwrite_without_force() {
    let dir = tempdir().unwrap();
    let from = dir.path().join("from.bin");
    let to = dir.path().join("to.bin");
    let patch = dir.path().join("p.patch");
    std::fs::write(&from, b"old").unwrap();
    std::fs::write(&to, b"new").unwrap();
    std::fs::write(&patch, b"already here").unwrap();

    let out = Command::new(bin())
        .arg("create")
        .arg(&from)
        .arg(&to)
        .arg(&patch)
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("use -f to overwrite"));
    assert_eq!(std::fs::read(&patch).unwrap(), b"already here");

    let st = Command::new(bin())
        .arg("-f")
        .arg("create")
        .arg(&from)
        .arg(&to)
        .arg(&patch)
        .status()
        .unwrap();
    assert!(st.success());
}

#[test]
fn cli_info_prints_container_fields() {
    let dir = tempdir().unwrap();
    let from = dir.path().join("from.bin");
    let to = dir.path().join("to.bin");
    let patch = dir.path().join("p.patch");
    std::fs::write(&from, sample().0).unwrap();
    std::fs::write(&to, sample().1).unwrap();

    let st = Command::new(bin())
        .args(["create", "-c", "zstd"])
        .arg(&from)
        .arg(&to)
        .arg(&patch)
        .status()
        .unwrap();
    assert!(st.success());

    let out = Command::new(bin())
        .args(["--json", "info"])
        .arg(&patch)
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Type:               match-blocks"), "{stdout}");
    assert!(stdout.contains("Compression:        zstd"), "{stdout}");
    assert!(stdout.contains("Target size:        20013 bytes"), "{stdout}");

    let stderr = String::from_utf8_lossy(&out.stderr);
    let json: serde_json::Value = serde_json::from_str(stderr.trim()).unwrap();
    assert_eq!(json["command"], "info");
    assert_eq!(json["compression"], "zstd");
    assert_eq!(json["target_size"], 20013);
}

#[test]
fn cli_reports_unknown_compression() {
    let out = Command::new(bin())
        .args(["create", "-c", "gzip", "a", "b", "c"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("Expected compression bz2, crle, heatshrink, lz4, lzma, none or zstd, but got gzip."),
        "{stderr}"
    );
}

#[test]
fn cli_apply_of_corrupt_patch_fails() {
    let dir = tempdir().unwrap();
    let from = dir.path().join("from.bin");
    let patch = dir.path().join("bad.patch");
    let output = dir.path().join("out.bin");
    std::fs::write(&from, b"source").unwrap();
    std::fs::write(&patch, [0x2fu8, 0x05]).unwrap();

    let out = Command::new(bin())
        .arg("apply")
        .arg(&from)
        .arg(&patch)
        .arg(&output)
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.starts_with("phdiff: Expected compression none(0)"), "{stderr}");
    assert!(!output.exists());
}

#[test]
fn cli_failed_create_leaves_no_patch() {
    let dir = tempdir().unwrap();
    let from = dir.path().join("from.bin");
    let to = dir.path().join("to.bin");
    let patch = dir.path().join("p.patch");
    std::fs::write(&from, b"a").unwrap();
    std::fs::write(&to, b"b").unwrap();

    let out = Command::new(bin())
        .args(["create", "--match-block-size", "0"])
        .arg(&from)
        .arg(&to)
        .arg(&patch)
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(!patch.exists());

    // Nothing was left behind, so a retry needs no -f.
    let st = Command::new(bin())
        .arg("create")
        .arg(&from)
        .arg(&to)
        .arg(&patch)
        .status()
        .unwrap();
    assert!(st.success());
}

#[test]
fn cli_config_works() {
    let out = Command::new(bin()).arg("config").output().unwrap();
    assert!(out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("COMPRESSIONS=none,lzma,crle,bz2,heatshrink,zstd,lz4"));
}
