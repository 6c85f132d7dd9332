//! Delta Log (C8, spec §4.8). Append-only local log retained for HOT-promotion
//! backfill. Framed records (`{u32 length, u8 codec, payload}`, codec 1 =
//! msgpack+zstd) in rotating segment files, grounded on the teacher's
//! `persistence::save_snapshot` file-write pattern generalized from a single
//! JSON snapshot to a rotating binary log.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::DeltaLogError;

const CODEC_MSGPACK_ZSTD: u8 = 1;
pub const DEFAULT_ROTATE_MAX_BYTES: u64 = 64 * 1024 * 1024;
pub const DEFAULT_ROTATE_MAX_AGE_SECONDS: i64 = 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeltaLogRecord {
    pub signature: String,
    pub mint: String,
    /// Carried so HOT-promotion backfill (spec §4.7) can reconstruct a
    /// SwapEvent from the summary alone, without re-reading C1.
    pub wallet: String,
    pub side: crate::model::Side,
    pub timestamp: i64,
    pub token_delta: f64,
    pub native_delta: f64,
}

struct OpenSegment {
    path: PathBuf,
    file: File,
    opened_at: i64,
    size_bytes: u64,
}

pub struct DeltaLog {
    dir: PathBuf,
    rotate_max_bytes: u64,
    rotate_max_age_seconds: i64,
    segment: Mutex<Option<OpenSegment>>,
}

impl DeltaLog {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, DeltaLogError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            rotate_max_bytes: DEFAULT_ROTATE_MAX_BYTES,
            rotate_max_age_seconds: DEFAULT_ROTATE_MAX_AGE_SECONDS,
            segment: Mutex::new(None),
        })
    }

    fn segment_filename(now: i64) -> String {
        let dt = chrono::DateTime::<Utc>::from_timestamp(now, 0).unwrap_or_else(Utc::now);
        format!("delta-{}.log", dt.format("%Y%m%d-%H%M%S"))
    }

    fn encode(record: &DeltaLogRecord) -> Result<Vec<u8>, DeltaLogError> {
        let msgpack = rmp_serde::to_vec(record).map_err(|e| DeltaLogError::Codec(e.to_string()))?;
        let compressed = zstd::encode_all(&msgpack[..], 0)?;
        let mut framed = Vec::with_capacity(compressed.len() + 5);
        framed.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
        framed.push(CODEC_MSGPACK_ZSTD);
        framed.extend_from_slice(&compressed);
        Ok(framed)
    }

    fn decode_frame(codec: u8, payload: &[u8]) -> Result<DeltaLogRecord, DeltaLogError> {
        if codec != CODEC_MSGPACK_ZSTD {
            return Err(DeltaLogError::Codec(format!("unknown codec {codec}")));
        }
        let msgpack = zstd::decode_all(payload)?;
        rmp_serde::from_slice(&msgpack).map_err(|e| DeltaLogError::Codec(e.to_string()))
    }

    fn ensure_segment(&self, now: i64, guard: &mut Option<OpenSegment>) -> Result<(), DeltaLogError> {
        let needs_rotation = match guard.as_ref() {
            None => true,
            Some(seg) => {
                seg.size_bytes >= self.rotate_max_bytes
                    || now - seg.opened_at >= self.rotate_max_age_seconds
            }
        };
        if needs_rotation {
            let path = self.dir.join(Self::segment_filename(now));
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            let size_bytes = file.metadata().map(|m| m.len()).unwrap_or(0);
            log::info!("📒 delta log: rotated to segment {}", path.display());
            *guard = Some(OpenSegment { path, file, opened_at: now, size_bytes });
        }
        Ok(())
    }

    pub fn append(&self, record: &DeltaLogRecord, now: i64) -> Result<(), DeltaLogError> {
        let framed = Self::encode(record)?;
        let mut guard = self.segment.lock().unwrap();
        self.ensure_segment(now, &mut guard)?;
        let seg = guard.as_mut().unwrap();
        seg.file.write_all(&framed)?;
        seg.file.flush()?;
        seg.size_bytes += framed.len() as u64;
        Ok(())
    }

    /// Range query across all segment files (the currently-open one included)
    /// by `(mint, since_timestamp)` (spec §4.8).
    pub fn range(&self, mint: &str, since_timestamp: i64) -> Result<Vec<DeltaLogRecord>, DeltaLogError> {
        let mut out = Vec::new();
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("log"))
            .collect();
        paths.sort();

        for path in paths {
            let mut bytes = Vec::new();
            File::open(&path)?.read_to_end(&mut bytes)?;
            let mut cursor = 0usize;
            while cursor + 5 <= bytes.len() {
                let len = u32::from_be_bytes(bytes[cursor..cursor + 4].try_into().unwrap()) as usize;
                let codec = bytes[cursor + 4];
                let start = cursor + 5;
                let end = start + len;
                if end > bytes.len() {
                    break;
                }
                let record = Self::decode_frame(codec, &bytes[start..end])?;
                if record.mint == mint && record.timestamp >= since_timestamp {
                    out.push(record);
                }
                cursor = end;
            }
        }
        Ok(out)
    }

    /// Deletes segments entirely older than `retention_seconds`, never
    /// touching the currently-open segment (spec §4.8).
    pub fn prune(&self, now: i64, retention_seconds: i64) -> Result<(), DeltaLogError> {
        let guard = self.segment.lock().unwrap();
        let open_path = guard.as_ref().map(|s| s.path.clone());
        drop(guard);

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if Some(&path) == open_path.as_ref() {
                continue;
            }
            if path.extension().and_then(|s| s.to_str()) != Some("log") {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            let modified_unix = modified
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            if now - modified_unix >= retention_seconds {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

/// Summarizes a swap into the compact record C8 persists.
pub fn summarize(event: &crate::model::SwapEvent) -> DeltaLogRecord {
    DeltaLogRecord {
        signature: event.signature.clone(),
        mint: event.base_mint.clone(),
        wallet: event.wallet.clone(),
        side: event.side,
        timestamp: event.timestamp,
        token_delta: event.base_amount,
        native_delta: event.quote_amount,
    }
}

impl DeltaLogRecord {
    /// Reconstructs the SwapEvent this record summarized, for backfill replay
    /// through C5 (spec §4.7). `confidence` is not preserved; backfill only
    /// needs what the counter store reads.
    pub fn to_swap_event(&self) -> crate::model::SwapEvent {
        crate::model::SwapEvent {
            signature: self.signature.clone(),
            slot: 0,
            side: self.side,
            base_mint: self.mint.clone(),
            quote_mint: crate::model::NATIVE_MINT.to_string(),
            base_amount: self.token_delta,
            quote_amount: self.native_delta,
            wallet: self.wallet.clone(),
            venue: None,
            confidence: 1.0,
            mcap_at_swap: None,
            timestamp: self.timestamp,
        }
    }
}
