//! On-disk snapshot: `index.vec` (binary vectors) + `documents.json` (texts).
//!
//! `index.vec` layout, little-endian:
//!
//! ```text
//! magic "FQIX" | version u32 | dim u32 | count u64 | model_id_len u32 | model_id
//! | blake3(payload) [32] | payload: count * dim f32
//! ```
//!
//! Each write goes to a fresh generation directory (`snapshot-<n>/`) holding
//! both files. The `CURRENT` file names the live generation and is replaced
//! by an atomic rename once both files are synced, so a crash at any point
//! leaves either the previous or the new snapshot readable, never a mix.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use faqrag_core::{Error, Result};

pub const VECTORS_FILE: &str = "index.vec";
pub const DOCUMENTS_FILE: &str = "documents.json";
pub const CURRENT_FILE: &str = "CURRENT";

const MAGIC: &[u8; 4] = b"FQIX";
const VERSION: u32 = 1;
const GENERATION_PREFIX: &str = "snapshot-";

/// Fully validated snapshot contents.
#[derive(Debug)]
pub struct Snapshot {
    pub vectors: Vec<f32>,
    pub texts: Vec<String>,
}

pub fn write(dir: &Path, model_id: &str, dim: usize, vectors: &[f32], texts: &[String]) -> Result<()> {
    debug_assert_eq!(vectors.len(), dim * texts.len());
    fs::create_dir_all(dir)
        .map_err(|e| Error::Persistence(format!("create {}: {}", dir.display(), e)))?;

    let dim_field = checked_u32(dim, "dimension")?;
    let count_field = u64::try_from(texts.len()).map_err(|_| corrupt_write("count exceeds u64"))?;
    let id_len_field = checked_u32(model_id.len(), "model id length")?;

    let payload: Vec<u8> = vectors.iter().flat_map(|x| x.to_le_bytes()).collect();
    let mut encoded = Vec::with_capacity(64 + model_id.len() + payload.len());
    encoded.extend_from_slice(MAGIC);
    encoded.extend_from_slice(&VERSION.to_le_bytes());
    encoded.extend_from_slice(&dim_field.to_le_bytes());
    encoded.extend_from_slice(&count_field.to_le_bytes());
    encoded.extend_from_slice(&id_len_field.to_le_bytes());
    encoded.extend_from_slice(model_id.as_bytes());
    encoded.extend_from_slice(blake3::hash(&payload).as_bytes());
    encoded.extend_from_slice(&payload);

    let documents = serde_json::to_vec(texts).map_err(Error::persistence)?;

    // an unreadable pointer was already rejected on restore; start a new chain
    let previous = current_generation(dir).ok().flatten();
    let next = previous.as_deref().and_then(generation_number).map_or(1, |n| n + 1);
    let name = format!("{GENERATION_PREFIX}{next}");
    let generation = dir.join(&name);
    if generation.exists() {
        // left behind by a write that never reached the pointer swap
        fs::remove_dir_all(&generation).map_err(Error::persistence)?;
    }
    fs::create_dir_all(&generation).map_err(Error::persistence)?;

    persist_file(&generation, VECTORS_FILE, &encoded)?;
    persist_file(&generation, DOCUMENTS_FILE, &documents)?;
    persist_file(dir, CURRENT_FILE, name.as_bytes())?;

    if let Some(old) = previous.filter(|old| *old != name) {
        if let Err(e) = fs::remove_dir_all(dir.join(&old)) {
            tracing::warn!(generation = %old, error = %e, "could not remove superseded snapshot");
        }
    }
    Ok(())
}

/// `Ok(None)` when no snapshot exists; `Err` when one exists but is unusable.
pub fn read(dir: &Path, model_id: &str, dim: usize) -> Result<Option<Snapshot>> {
    let Some(generation) = live_dir(dir)? else {
        return Ok(None);
    };
    let vectors_path = generation.join(VECTORS_FILE);
    let documents_path = generation.join(DOCUMENTS_FILE);

    let raw = fs::read(&vectors_path)
        .map_err(|e| Error::Persistence(format!("read {}: {}", vectors_path.display(), e)))?;
    let documents = fs::read(&documents_path)
        .map_err(|e| Error::Persistence(format!("read {}: {}", documents_path.display(), e)))?;
    let texts: Vec<String> = serde_json::from_slice(&documents)
        .map_err(|e| Error::Persistence(format!("parse {}: {}", DOCUMENTS_FILE, e)))?;

    let mut buf = raw.as_slice();
    if take(&mut buf, 4)? != MAGIC {
        return Err(corrupt("bad magic"));
    }
    let version = read_u32(&mut buf)?;
    if version != VERSION {
        return Err(corrupt(&format!("unsupported version {}", version)));
    }
    let stored_dim = read_u32(&mut buf)? as usize;
    if stored_dim != dim {
        return Err(corrupt(&format!("dimension {} does not match embedder dimension {}", stored_dim, dim)));
    }
    let count = usize::try_from(read_u64(&mut buf)?).map_err(|_| corrupt("count overflow"))?;
    let id_len = read_u32(&mut buf)? as usize;
    let stored_id = std::str::from_utf8(take(&mut buf, id_len)?).map_err(|_| corrupt("model id is not UTF-8"))?;
    if stored_id != model_id {
        return Err(corrupt(&format!("built with model {} but embedder is {}", stored_id, model_id)));
    }
    let digest = take(&mut buf, 32)?;
    let payload_len = count
        .checked_mul(dim)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| corrupt("payload size overflow"))?;
    if buf.len() != payload_len {
        return Err(corrupt(&format!("payload is {} bytes, expected {}", buf.len(), payload_len)));
    }
    if blake3::hash(buf).as_bytes() != digest {
        return Err(corrupt("payload checksum mismatch"));
    }
    if texts.len() != count {
        return Err(corrupt(&format!("{} vectors but {} documents", count, texts.len())));
    }

    let vectors = buf
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(Some(Snapshot { vectors, texts }))
}

/// Directory of the generation `CURRENT` points at, if any.
pub fn live_dir(dir: &Path) -> Result<Option<PathBuf>> {
    Ok(current_generation(dir)?.map(|name| dir.join(name)))
}

fn current_generation(dir: &Path) -> Result<Option<String>> {
    let pointer = dir.join(CURRENT_FILE);
    if !pointer.exists() {
        return Ok(None);
    }
    let name = fs::read_to_string(&pointer)
        .map_err(|e| Error::Persistence(format!("read {}: {}", pointer.display(), e)))?;
    let name = name.trim();
    if generation_number(name).is_none() {
        return Err(corrupt(&format!("{} names no snapshot generation", CURRENT_FILE)));
    }
    Ok(Some(name.to_string()))
}

fn generation_number(name: &str) -> Option<u64> {
    name.strip_prefix(GENERATION_PREFIX)?.parse().ok()
}

/// Write `bytes` to a synced temp file in `dir`, then rename it to `name`.
fn persist_file(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(Error::persistence)?;
    tmp.write_all(bytes).map_err(Error::persistence)?;
    tmp.as_file().sync_all().map_err(Error::persistence)?;
    tmp.persist(dir.join(name))
        .map_err(|e| Error::Persistence(format!("rename {}: {}", name, e)))?;
    Ok(())
}

fn corrupt(msg: &str) -> Error {
    Error::Persistence(format!("corrupt snapshot: {}", msg))
}

fn checked_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| corrupt_write(&format!("{} {} exceeds u32", what, value)))
}

fn corrupt_write(msg: &str) -> Error {
    Error::Persistence(format!("cannot encode snapshot: {}", msg))
}

fn take<'a>(buf: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if buf.len() < n {
        return Err(corrupt("truncated header"));
    }
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

fn read_u32(buf: &mut &[u8]) -> Result<u32> {
    let b = take(buf, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_u64(buf: &mut &[u8]) -> Result<u64> {
    let b = take(buf, 8)?;
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(b);
    Ok(u64::from_le_bytes(bytes))
}
