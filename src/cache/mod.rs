//! Content-addressed on-disk cache for synthesized audio.
//!
//! Entries live as flat files named `<sha256-hex>.<ext>` under one cache
//! directory. Hits refresh the file's mtime so the recency-based prune keeps
//! frequently spoken messages around. Writes go through a temp file plus an
//! atomic rename, so concurrent readers never observe a half-written entry.
//!
//! A broken cache must never block synthesis: read and eviction failures
//! degrade to misses or skips, and only the backend's own errors reach the
//! caller.

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, warn};

use crate::tts::{Synthesizer, SynthesisParams, TtsError};

/// Bumped whenever the key serialization or digest algorithm changes;
/// old entries become orphans and age out through the prune pass.
pub const CACHE_VERSION: &str = "v1";

/// Resolves the platform default cache directory for this application.
pub fn default_cache_root() -> PathBuf {
    dirs_next::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("routine-notifier")
}

/// File extension for a backend encoding name. Unknown encodings fall back
/// to `.bin` rather than failing; the digest, not the extension, identifies
/// the entry.
pub fn ext_for_encoding(encoding: &str) -> &'static str {
    match encoding.to_ascii_uppercase().as_str() {
        "MP3" => ".mp3",
        "LINEAR16" => ".wav",
        "OGG_OPUS" => ".ogg",
        _ => ".bin",
    }
}

/// The tuple of synthesis parameters that decides whether two requests are
/// "the same" for caching purposes.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheKey {
    text: String,
    language_code: String,
    voice_name: Option<String>,
    speaking_rate: f64,
    pitch: f64,
    audio_encoding: String,
    version: &'static str,
}

impl CacheKey {
    pub fn new(text: &str, params: &SynthesisParams) -> Self {
        Self {
            text: text.to_string(),
            language_code: params.language_code.clone(),
            voice_name: params.voice_name.clone(),
            speaking_rate: params.speaking_rate,
            pitch: params.pitch,
            audio_encoding: params.audio_encoding.as_str().to_string(),
            version: CACHE_VERSION,
        }
    }

    pub fn encoding(&self) -> &str {
        &self.audio_encoding
    }

    /// SHA-256 over a canonical serialization of the key fields, rendered as
    /// lowercase hex. Floats are rounded to 6 decimals first so representation
    /// noise does not fragment the cache; an absent voice hashes as "".
    pub fn digest(&self) -> String {
        // Field names sorted so the serialization order is self-evidently stable.
        #[derive(Serialize)]
        struct Canonical<'a> {
            ae: String,
            lc: &'a str,
            pi: f64,
            sr: f64,
            t: &'a str,
            v: &'a str,
            vn: &'a str,
        }

        let payload = Canonical {
            ae: self.audio_encoding.to_ascii_uppercase(),
            lc: &self.language_code,
            pi: round6(self.pitch),
            sr: round6(self.speaking_rate),
            t: &self.text,
            v: self.version,
            vn: self.voice_name.as_deref().unwrap_or(""),
        };
        let canonical =
            serde_json::to_string(&payload).expect("cache key serialization should not fail");
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Full path of the cache entry for `key`, creating `cache_root` on demand.
#[allow(dead_code)]
pub fn cache_path_for(key: &CacheKey, cache_root: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(cache_root)?;
    Ok(entry_path(key, cache_root))
}

fn entry_path(key: &CacheKey, cache_root: &Path) -> PathBuf {
    let ext = ext_for_encoding(key.encoding());
    cache_root.join(format!("{}{}", key.digest(), ext))
}

/// Deletes the oldest entries until the directory fits in `max_bytes`.
///
/// Files are ranked by mtime, newest first; the running total is accumulated
/// and the first file that would exceed the bound, plus everything older, is
/// removed. `max_bytes == 0` means unlimited and a missing directory is
/// already-empty; both are no-ops. Best effort throughout: stat and unlink
/// failures are skipped, never raised.
pub fn prune_cache(cache_root: &Path, max_bytes: u64) {
    if max_bytes == 0 {
        return;
    }
    let entries = match std::fs::read_dir(cache_root) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    let mut files: Vec<(PathBuf, u64, SystemTime)> = Vec::new();
    for entry in entries.flatten() {
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        files.push((entry.path(), meta.len(), mtime));
    }
    files.sort_by(|a, b| b.2.cmp(&a.2));

    let mut total: u64 = 0;
    let mut cutting = false;
    let mut removed = 0usize;
    for (path, size, _) in files {
        if !cutting && total + size <= max_bytes {
            total += size;
            continue;
        }
        cutting = true;
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => debug!(path = %path.display(), error = %e, "Skipping eviction of cache entry"),
        }
    }
    if removed > 0 {
        debug!(removed, kept_bytes = total, "🧹 Pruned audio cache");
    }
}

/// Removes every regular file directly inside the cache root; the directory
/// itself persists. Returns the number of files removed.
pub fn clear_cache(cache_root: &Path) -> std::io::Result<usize> {
    let entries = match std::fs::read_dir(cache_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut removed = 0usize;
    for entry in entries.flatten() {
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false)
            && std::fs::remove_file(entry.path()).is_ok()
        {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Wraps a [`Synthesizer`] and caches audio bytes on disk.
///
/// When disabled, every request passes straight through to the inner backend
/// with zero filesystem interaction.
pub struct CachingSynthesizer {
    inner: Arc<dyn Synthesizer>,
    cache_root: PathBuf,
    enabled: bool,
    /// 0 means unlimited.
    max_size_bytes: u64,
}

impl CachingSynthesizer {
    pub fn new(
        inner: Arc<dyn Synthesizer>,
        cache_root: Option<PathBuf>,
        enabled: bool,
        max_size_bytes: u64,
    ) -> Self {
        Self {
            inner,
            cache_root: cache_root.unwrap_or_else(default_cache_root),
            enabled,
            max_size_bytes,
        }
    }

    fn read_entry(&self, path: &Path) -> Option<Vec<u8>> {
        if !path.exists() {
            return None;
        }
        match std::fs::read(path) {
            Ok(data) => {
                // Refresh mtime so the prune pass sees this entry as recent.
                // Failure only degrades eviction accuracy.
                if let Err(e) = filetime::set_file_mtime(path, filetime::FileTime::now()) {
                    debug!(path = %path.display(), error = %e, "Could not refresh cache entry mtime");
                }
                Some(data)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cache entry unreadable, regenerating");
                None
            }
        }
    }

    fn write_entry(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.cache_root)?;
        let mut tmp = tempfile::Builder::new()
            .prefix("rn-")
            .tempfile_in(&self.cache_root)?;
        tmp.write_all(data)?;
        // Atomic replace onto the final name; on failure the temp file is
        // removed when `PersistError` drops it.
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[async_trait]
impl Synthesizer for CachingSynthesizer {
    async fn synthesize(&self, text: &str, params: &SynthesisParams) -> Result<Vec<u8>, TtsError> {
        if !self.enabled {
            return self.inner.synthesize(text, params).await;
        }

        let key = CacheKey::new(text, params);
        let path = entry_path(&key, &self.cache_root);
        if let Some(data) = self.read_entry(&path) {
            debug!(entry = %path.display(), "🎯 Audio cache hit");
            return Ok(data);
        }

        let data = self.inner.synthesize(text, params).await?;

        // Last writer wins on a concurrent miss; both writers produce the
        // same bytes for the same key, so duplicate work is wasted, not wrong.
        match self.write_entry(&path, &data) {
            Ok(()) => {
                debug!(entry = %path.display(), bytes = data.len(), "💾 Cached synthesized audio");
                if self.max_size_bytes > 0 {
                    prune_cache(&self.cache_root, self.max_size_bytes);
                }
            }
            Err(e) => {
                // Surfaced for the operator, but a persistence failure must
                // never turn a successful synthesis into a failed request.
                error!(
                    cache_root = %self.cache_root.display(),
                    error = %e,
                    "Failed to persist cache entry; serving uncached audio"
                );
            }
        }

        Ok(data)
    }
}
