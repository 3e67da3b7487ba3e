//! Shared fixtures for the storage integration tests

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};

/// Payloads of the entries in [`foreign_archive_bytes`]
pub const FOREIGN_PAYLOADS: [&[u8]; 3] = [b"hello", &[0x5A; 0x30], b"goodbye"];

/// Offset of each entry in [`foreign_archive_bytes`]
pub const FOREIGN_OFFSETS: [u32; 3] = [0x40, 0x80, 0x100];

/// Reserved space of each entry in [`foreign_archive_bytes`]
pub const FOREIGN_RESERVED: [u32; 3] = [0x40, 0x80, 0x20];

/// Offset of the metadata table in [`foreign_archive_bytes`]
pub const FOREIGN_METADATA: u32 = 0x120;

fn put_u16(data: &mut [u8], at: usize, value: u16) {
    data[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(data: &mut [u8], at: usize, value: u32) {
    data[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// An archive laid out the way a third-party tool might write it
///
/// Slots are 16-byte aligned rather than 2048, gaps are filled with 0xCC,
/// one name buffer has garbage after its terminator and the file ends with
/// padding after the metadata table.
pub fn foreign_archive_bytes() -> Vec<u8> {
    let mut data = vec![0xCC; 0x1C0];
    data[..4].copy_from_slice(b"AFS\0");
    put_u32(&mut data, 4, 3);

    for (id, payload) in FOREIGN_PAYLOADS.iter().enumerate() {
        let offset = FOREIGN_OFFSETS[id] as usize;
        put_u32(&mut data, 8 + id * 8, offset as u32);
        put_u32(&mut data, 12 + id * 8, payload.len() as u32);
        data[offset..offset + payload.len()].copy_from_slice(payload);
    }
    put_u32(&mut data, 8 + 3 * 8, FOREIGN_METADATA);
    put_u32(&mut data, 12 + 3 * 8, 0x90);

    let table = FOREIGN_METADATA as usize;
    data[table..table + 0x90].fill(0);

    // Entry 0: name with trailing garbage, a timestamp and its size
    data[table..table + 9].copy_from_slice(b"alpha.bin");
    data[table + 20] = 0xAB;
    for (i, field) in [2004u16, 3, 28, 14, 5, 59].into_iter().enumerate() {
        put_u16(&mut data, table + 0x20 + i * 2, field);
    }
    put_u32(&mut data, table + 0x2C, 5);

    // Entry 1: name only
    data[table + 0x30..table + 0x38].copy_from_slice(b"beta.bin");
    put_u32(&mut data, table + 0x5C, 0x30);

    // Entry 2: blank name, no size recorded

    data
}

/// Write [`foreign_archive_bytes`] to `dir` and return the path
pub fn write_foreign_archive(dir: &Path) -> PathBuf {
    let path = dir.join("foreign.afs");
    std::fs::write(&path, foreign_archive_bytes()).unwrap();
    path
}

/// An AFL file with the given names
pub fn afl_bytes(names: &[&str]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"AFL\0");
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&(-1i32).to_le_bytes());
    data.extend_from_slice(&(names.len() as u32).to_le_bytes());
    for name in names {
        let mut buffer = [0u8; 0x20];
        buffer[..name.len()].copy_from_slice(name.as_bytes());
        data.extend_from_slice(&buffer);
    }
    data
}

/// Install a test subscriber so `RUST_LOG` shows engine logs
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
