//! Fetches a deployment's `metadata` file straight from a remote's object
//! store over HTTP, without checking out the commit. Bypasses the
//! [`crate::repo::ObjectRepo`] abstraction and parses gvariant-encoded
//! commit/dirtree objects directly, since this is the one path that needs
//! to see inside them before anything is checked out locally.

use std::io::Read;

use flate2::read::DeflateDecoder;
use fn_error_context::context;
use gvariant::aligned_bytes::TryAsAligned;
use gvariant::{Marker, Structure};

use crate::error::{Result, StoreError};
use crate::fetch::load_uri;
use crate::gv::{gv_commit, gv_dirtree};

/// Fetch the single object `<checksum>.<object_type>` from `remote_url`'s
/// object store (e.g. `object_type` is `commit`, `dirtree`, or `filez`).
#[context("Fetching remote object {checksum}.{object_type}")]
pub fn fetch_remote_object(
    client: &reqwest::blocking::Client,
    remote_url: &str,
    checksum: &str,
    object_type: &str,
) -> Result<Vec<u8>> {
    if checksum.len() < 3 {
        return Err(StoreError::Failed(format!("malformed checksum {checksum:?}")));
    }
    let (part1, part2) = checksum.split_at(2);
    let url = format!("{}/objects/{part1}/{part2}.{object_type}", remote_url.trim_end_matches('/'));
    load_uri(client, &url)
}

/// Fetch and decompress the `metadata` file of `commit` as published by
/// `remote_url`, without checking out the commit's tree.
#[context("Fetching metadata for commit {commit}")]
pub fn fetch_metadata(
    client: &reqwest::blocking::Client,
    remote_url: &str,
    commit: &str,
) -> Result<Vec<u8>> {
    let commit_bytes = fetch_remote_object(client, remote_url, commit, "commit")?;
    let aligned = commit_bytes
        .try_as_aligned()
        .map_err(|e| anyhow::anyhow!("misaligned commit object: {e:?}"))?;
    let commit_variant = gv_commit!().cast(aligned);
    let commit = commit_variant.to_tuple();
    // Field 6 of the commit tuple is the root dirtree checksum.
    let root_checksum = hex::encode(commit.6);

    let dirtree_bytes = fetch_remote_object(client, remote_url, &root_checksum, "dirtree")?;
    let aligned = dirtree_bytes
        .try_as_aligned()
        .map_err(|e| anyhow::anyhow!("misaligned dirtree object: {e:?}"))?;
    let dirtree_variant = gv_dirtree!().cast(aligned);
    let (files, _dirs) = dirtree_variant.to_tuple();

    let mut file_checksum = None;
    for entry in files.iter() {
        let (name, csum) = entry.to_tuple();
        if name.to_str() == "metadata" {
            file_checksum = Some(hex::encode(csum));
            break;
        }
    }
    let file_checksum =
        file_checksum.ok_or_else(|| StoreError::NotFound("metadata file not present in tree".into()))?;

    let filez_bytes = fetch_remote_object(client, remote_url, &file_checksum, "filez")?;
    decompress_filez(&filez_bytes)
}

/// Decode a `.filez` object: a 4-byte big-endian header-size prefix, the
/// header itself plus 4 bytes of padding, then a raw-deflate payload.
fn decompress_filez(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 8 {
        return Err(StoreError::Failed("invalid filez header".into()));
    }
    let header_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let skip = header_size
        .checked_add(8)
        .ok_or_else(|| StoreError::Failed("header size overflow".into()))?;
    if skip > data.len() {
        return Err(StoreError::Failed(format!(
            "file header size {header_size} exceeds object size"
        )));
    }

    let mut decoder = DeflateDecoder::new(&data[skip..]);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_filez(payload: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(payload).unwrap();
        let compressed = encoder.finish().unwrap();

        let header_size: u32 = 0;
        let mut out = Vec::new();
        out.extend_from_slice(&header_size.to_be_bytes());
        out.extend_from_slice(&[0u8; 4]); // padding
        out.extend_from_slice(&compressed);
        out
    }

    #[test]
    fn test_decompress_filez_roundtrip() {
        let payload = b"[Application]\nname=org.example.Foo\n";
        let blob = make_filez(payload);
        let decoded = decompress_filez(&blob).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_decompress_filez_rejects_oversize_header() {
        let blob = vec![0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0];
        let err = decompress_filez(&blob).unwrap_err();
        assert!(matches!(err, StoreError::Failed(_)));
        assert!(err.to_string().contains("header size"));
    }

    #[test]
    fn test_decompress_filez_rejects_truncated_input() {
        let blob = vec![0, 0, 0, 0];
        let err = decompress_filez(&blob).unwrap_err();
        assert!(err.to_string().contains("invalid filez header"));
    }
}
