//! End-to-end extraction over local-file volumes.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use streamzip::zip::integrity::crc32;
use streamzip::{
    EntryStatus, ExtractError, ExtractOptions, Extractor, LocalFileSource, VolumeStream,
};
use tempfile::TempDir;

const LFH: [u8; 4] = *b"PK\x03\x04";
const CDFH: [u8; 4] = *b"PK\x01\x02";
/// Central directory bytes after its signature; never read by the extractor.
const CDFH_TAIL: usize = 42;

struct Entry<'a> {
    name: &'a [u8],
    method: u16,
    flags: u16,
    crc: u32,
    payload: Vec<u8>,
    uncompressed: u32,
}

impl<'a> Entry<'a> {
    fn stored(name: &'a str, data: &[u8]) -> Self {
        Self {
            name: name.as_bytes(),
            method: 0,
            flags: 0,
            crc: crc32(data),
            payload: data.to_vec(),
            uncompressed: data.len() as u32,
        }
    }

    fn deflated(name: &'a str, data: &[u8]) -> Self {
        let mut enc = flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::best());
        enc.write_all(data).unwrap();
        Self {
            name: name.as_bytes(),
            method: 8,
            flags: 0,
            crc: crc32(data),
            payload: enc.finish().unwrap(),
            uncompressed: data.len() as u32,
        }
    }

    fn directory(name: &'a str) -> Self {
        Self::stored(name, b"")
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = LFH.to_vec();
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.method.to_le_bytes());
        out.extend_from_slice(&0x6000u16.to_le_bytes());
        out.extend_from_slice(&0x5921u16.to_le_bytes());
        out.extend_from_slice(&self.crc.to_le_bytes());
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.uncompressed.to_le_bytes());
        out.extend_from_slice(&(self.name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(self.name);
        out.extend_from_slice(&self.payload);
        out
    }
}

fn archive(entries: &[Entry]) -> Vec<u8> {
    let mut out: Vec<u8> = entries.iter().flat_map(Entry::encode).collect();
    out.extend_from_slice(&CDFH);
    out.extend_from_slice(&[0u8; CDFH_TAIL]);
    out
}

/// Write each part as its own volume file and return their paths in order.
fn write_volumes(dir: &Path, parts: &[&[u8]]) -> Vec<String> {
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let path = dir.join(format!("game.zip.{:03}", i + 1));
            std::fs::write(&path, part).unwrap();
            path.to_string_lossy().into_owned()
        })
        .collect()
}

fn split_evenly(data: &[u8], size: usize) -> Vec<&[u8]> {
    data.chunks(size).collect()
}

struct Fixture {
    _tmp: TempDir,
    volumes_dir: PathBuf,
    out: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let volumes_dir = tmp.path().join("volumes");
        std::fs::create_dir(&volumes_dir).unwrap();
        let out = tmp.path().join("out");
        Self {
            _tmp: tmp,
            volumes_dir,
            out,
        }
    }

    fn stream(&self, parts: &[&[u8]]) -> VolumeStream {
        let locators = write_volumes(&self.volumes_dir, parts);
        VolumeStream::new(Arc::new(LocalFileSource), locators)
    }

    fn options(&self) -> ExtractOptions {
        ExtractOptions::new(&self.out)
    }
}

#[tokio::test]
async fn payload_split_across_two_volumes() {
    let fx = Fixture::new();
    let payload = b"0123456789";
    let record = Entry::stored("split.bin", payload).encode();
    let header_len = record.len() - payload.len();

    let first = record[..header_len + 3].to_vec();
    let mut second = record[header_len + 3..].to_vec();
    second.extend_from_slice(&CDFH);

    let report = Extractor::new(fx.options())
        .run(fx.stream(&[first.as_slice(), second.as_slice()]))
        .await
        .unwrap();

    assert_eq!(std::fs::read(fx.out.join("split.bin")).unwrap(), payload);
    assert_eq!(report.files(), 1);
    assert_eq!(report.volumes, 2);
    assert!(report.is_success());
}

#[tokio::test]
async fn deflated_entries_across_many_small_volumes() {
    let fx = Fixture::new();
    let big: Vec<u8> = (0..50_000u32).flat_map(|i| (i % 97).to_le_bytes()).collect();
    let data = archive(&[
        Entry::directory("GameData/"),
        Entry::deflated("GameData/level0.blk", &big),
        Entry::stored("config.ini", b"[General]\nchannel=1\n"),
        Entry::deflated("GameData/empty.txt", b""),
    ]);

    let report = Extractor::new(fx.options())
        .run(fx.stream(&split_evenly(&data, 1000)))
        .await
        .unwrap();

    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.directories(), 1);
    assert_eq!(report.files(), 3);
    assert_eq!(report.bytes_read, (data.len() - CDFH_TAIL) as u64);
    assert_eq!(std::fs::read(fx.out.join("GameData/level0.blk")).unwrap(), big);
    assert_eq!(
        std::fs::read(fx.out.join("config.ini")).unwrap(),
        b"[General]\nchannel=1\n"
    );
    assert!(std::fs::read(fx.out.join("GameData/empty.txt")).unwrap().is_empty());
    assert!(report.entries.iter().all(|e| e.status != EntryStatus::Unverified));
}

#[tokio::test]
async fn data_descriptor_entry_keeps_stream_in_sync() {
    let fx = Fixture::new();
    // sizes in the header, CRC only in the trailing descriptor
    let mut streamed = Entry::stored("a.bin", b"hello");
    streamed.flags = 1 << 3;
    streamed.crc = 0;
    let mut data = streamed.encode();
    data.extend_from_slice(b"PK\x07\x08");
    data.extend_from_slice(&crc32(b"hello").to_le_bytes());
    data.extend_from_slice(&5u32.to_le_bytes());
    data.extend_from_slice(&5u32.to_le_bytes());
    data.extend(archive(&[Entry::stored("b.bin", b"after")]));

    let report = Extractor::new(fx.options())
        .run(fx.stream(&split_evenly(&data, 7)))
        .await
        .unwrap();

    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.entries[0].status, EntryStatus::Verified);
    assert_eq!(std::fs::read(fx.out.join("a.bin")).unwrap(), b"hello");
    assert_eq!(std::fs::read(fx.out.join("b.bin")).unwrap(), b"after");
}

#[tokio::test]
async fn directory_marker_and_nested_file() {
    let fx = Fixture::new();
    let data = archive(&[
        Entry::directory("assets/"),
        Entry::stored("assets/data.bin", b"abc"),
        Entry::stored("fresh/sub/data.bin", b"def"),
    ]);

    let report = Extractor::new(fx.options())
        .run(fx.stream(&[data.as_slice()]))
        .await
        .unwrap();

    assert!(fx.out.join("assets").is_dir());
    assert_eq!(std::fs::read(fx.out.join("assets/data.bin")).unwrap(), b"abc");
    // parent created on demand, file still written in the same pass
    assert_eq!(std::fs::read(fx.out.join("fresh/sub/data.bin")).unwrap(), b"def");
    assert_eq!(report.entries[0].status, EntryStatus::Directory);
    assert_eq!(report.entries.len(), 3);
}

#[tokio::test]
async fn crc_mismatch_is_kept_and_marked() {
    let fx = Fixture::new();
    let mut bad = Entry::stored("bad.bin", b"hello");
    bad.crc = 0;
    let data = archive(&[bad, Entry::stored("good.bin", b"world")]);

    let report = Extractor::new(fx.options())
        .run(fx.stream(&[data.as_slice()]))
        .await
        .unwrap();

    assert!(!fx.out.join("bad.bin").exists());
    assert_eq!(
        std::fs::read(fx.out.join("bad.bin.crc-mismatch")).unwrap(),
        b"hello"
    );
    assert_eq!(std::fs::read(fx.out.join("good.bin")).unwrap(), b"world");
    assert_eq!(report.mismatches(), 1);
    assert!(!report.is_success());
    match &report.entries[0].status {
        EntryStatus::Mismatch(v) => {
            assert_eq!(v.expected_crc, 0);
            assert_eq!(v.actual_crc, 0x3610_a686);
        }
        other => panic!("expected mismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn rerun_replaces_the_other_name() {
    let fx = Fixture::new();
    std::fs::create_dir_all(&fx.out).unwrap();
    std::fs::write(fx.out.join("a.bin"), b"good copy from last run").unwrap();

    let mut bad = Entry::stored("a.bin", b"hello");
    bad.crc = 0;
    Extractor::new(fx.options())
        .run(fx.stream(&[archive(&[bad]).as_slice()]))
        .await
        .unwrap();
    assert!(!fx.out.join("a.bin").exists());
    assert!(fx.out.join("a.bin.crc-mismatch").exists());

    let good = Entry::stored("a.bin", b"hello");
    let report = Extractor::new(fx.options())
        .run(fx.stream(&[archive(&[good]).as_slice()]))
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(std::fs::read(fx.out.join("a.bin")).unwrap(), b"hello");
    assert!(!fx.out.join("a.bin.crc-mismatch").exists());
}

#[tokio::test]
async fn verification_can_be_disabled() {
    let fx = Fixture::new();
    let mut bad = Entry::stored("bad.bin", b"hello");
    bad.crc = 0;

    let mut options = fx.options();
    options.verify = false;
    let report = Extractor::new(options)
        .run(fx.stream(&[archive(&[bad]).as_slice()]))
        .await
        .unwrap();

    assert_eq!(std::fs::read(fx.out.join("bad.bin")).unwrap(), b"hello");
    assert_eq!(report.entries[0].status, EntryStatus::Unverified);
    assert!(report.is_success());
}

#[tokio::test]
async fn unsupported_codec_fails_entry_and_keeps_sync() {
    let fx = Fixture::new();
    let mut odd = Entry::stored("odd.bin", b"ppmd payload");
    odd.method = 98;
    let data = archive(&[odd, Entry::stored("after.bin", b"still here")]);

    let report = Extractor::new(fx.options())
        .run(fx.stream(&[data.as_slice()]))
        .await
        .unwrap();

    assert!(!fx.out.join("odd.bin").exists());
    assert_eq!(std::fs::read(fx.out.join("after.bin")).unwrap(), b"still here");
    assert_eq!(report.failures(), 1);
    match &report.entries[0].status {
        EntryStatus::Failed(reason) => assert!(reason.contains("98"), "{reason}"),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn fail_fast_aborts_on_entry_failure() {
    let fx = Fixture::new();
    let mut odd = Entry::stored("odd.bin", b"x");
    odd.method = 98;
    let data = archive(&[odd, Entry::stored("after.bin", b"y")]);

    let mut options = fx.options();
    options.fail_fast = true;
    let err = Extractor::new(options)
        .run(fx.stream(&[data.as_slice()]))
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractError::UnsupportedCodec(98)));
    assert!(!fx.out.join("after.bin").exists());
}

#[tokio::test]
async fn encrypted_entry_is_skipped() {
    let fx = Fixture::new();
    let mut secret = Entry::stored("secret.bin", b"ciphertext");
    secret.flags = 1;
    let data = archive(&[secret, Entry::stored("plain.bin", b"ok")]);

    let report = Extractor::new(fx.options())
        .run(fx.stream(&[data.as_slice()]))
        .await
        .unwrap();

    assert!(!fx.out.join("secret.bin").exists());
    assert_eq!(std::fs::read(fx.out.join("plain.bin")).unwrap(), b"ok");
    assert_eq!(report.failures(), 1);
}

#[tokio::test]
async fn traversal_name_is_rejected() {
    let fx = Fixture::new();
    let data = archive(&[
        Entry::stored("../escape.txt", b"nope"),
        Entry::stored("inside.txt", b"yes"),
    ]);

    let report = Extractor::new(fx.options())
        .run(fx.stream(&[data.as_slice()]))
        .await
        .unwrap();

    assert!(!fx.out.parent().unwrap().join("escape.txt").exists());
    assert_eq!(std::fs::read(fx.out.join("inside.txt")).unwrap(), b"yes");
    assert_eq!(report.failures(), 1);
}

#[tokio::test]
async fn truncated_stream_is_a_format_error() {
    let fx = Fixture::new();
    let mut data = Entry::stored("first.bin", b"complete").encode();
    let second = Entry::stored("second.bin", b"never finishes").encode();
    data.extend_from_slice(&second[..second.len() - 4]);
    let first_len = data.len() - (second.len() - 4);

    let err = Extractor::new(fx.options())
        .run(fx.stream(&split_evenly(&data, 16)))
        .await
        .unwrap_err();

    match err {
        ExtractError::Format { offset, reason } => {
            assert_eq!(offset, first_len as u64);
            assert!(reason.contains("second.bin"), "{reason}");
        }
        other => panic!("expected format error, got {other:?}"),
    }
    assert_eq!(std::fs::read(fx.out.join("first.bin")).unwrap(), b"complete");
    assert!(!fx.out.join("second.bin").exists());
}

#[tokio::test]
async fn garbage_between_entries_is_a_format_error() {
    let fx = Fixture::new();
    let mut data = Entry::stored("a.bin", b"a").encode();
    data.extend_from_slice(b"junk");

    let err = Extractor::new(fx.options())
        .run(fx.stream(&[data.as_slice()]))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::Format { .. }));
}

#[tokio::test]
async fn missing_volume_is_a_transport_error() {
    let fx = Fixture::new();
    let record = Entry::stored("a.bin", b"0123456789").encode();
    let mut locators = write_volumes(&fx.volumes_dir, &[&record[..20]]);
    locators.push(fx.volumes_dir.join("missing.002").to_string_lossy().into_owned());

    let err = Extractor::new(fx.options())
        .run(VolumeStream::new(Arc::new(LocalFileSource), locators))
        .await
        .unwrap_err();

    match err {
        ExtractError::Transport { locator, .. } => assert!(locator.ends_with("missing.002")),
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn stream_end_without_central_directory_completes() {
    let fx = Fixture::new();
    let data = Entry::stored("only.bin", b"data").encode();

    let report = Extractor::new(fx.options())
        .run(fx.stream(&[data.as_slice()]))
        .await
        .unwrap();
    assert_eq!(report.files(), 1);
    assert!(fx.out.join("only.bin").exists());
}

#[tokio::test]
async fn cancelled_run_writes_nothing() {
    let fx = Fixture::new();
    let data = archive(&[Entry::stored("a.bin", b"a")]);

    let extractor = Extractor::new(fx.options()).with_cancel_flag(Arc::new(AtomicBool::new(true)));
    let err = extractor.run(fx.stream(&[data.as_slice()])).await.unwrap_err();

    assert!(matches!(err, ExtractError::Cancelled));
    assert!(!fx.out.join("a.bin").exists());
}

#[tokio::test]
async fn gbk_names_are_decoded() {
    let fx = Fixture::new();
    let (name, _, _) = encoding_rs::GBK.encode("资源/数据.bin");
    let entry = Entry {
        name: &name,
        method: 0,
        flags: 0,
        crc: crc32(b"gbk"),
        payload: b"gbk".to_vec(),
        uncompressed: 3,
    };

    let report = Extractor::new(fx.options())
        .run(fx.stream(&[archive(&[entry]).as_slice()]))
        .await
        .unwrap();

    assert_eq!(report.entries[0].name, "资源/数据.bin");
    assert_eq!(std::fs::read(fx.out.join("资源").join("数据.bin")).unwrap(), b"gbk");
}
