//! Platform audio playback for synthesized bytes.
//!
//! Writes the audio to a temp file and hands it to whichever CLI player is
//! installed. The temp file is intentionally kept on disk so players that
//! return before finishing (e.g. `open`) can still read it.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::tts::AudioEncoding;

/// Writes `audio` to a temp file and plays it with a platform player.
/// A missing player is not an error; the saved path is logged instead.
pub async fn play_audio_bytes(audio: &[u8], encoding: AudioEncoding) -> Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix("rn-play-")
        .suffix(encoding.extension())
        .tempfile()
        .context("failed to create temp audio file")?;
    tmp.write_all(audio)
        .context("failed to write temp audio file")?;
    let (_file, path) = tmp.keep().context("failed to keep temp audio file")?;

    play_file(&path, encoding).await
}

#[cfg(not(windows))]
async fn play_file(path: &Path, encoding: AudioEncoding) -> Result<()> {
    let Some((player, bin)) = choose_player(player_candidates(encoding)) else {
        info!("No suitable audio player found. Saved to {}", path.display());
        return Ok(());
    };

    let mut cmd = async_process::Command::new(&bin);
    if player == "ffplay" {
        cmd.arg("-nodisp").arg("-autoexit");
    }
    cmd.arg(path);

    debug!(player, file = %path.display(), "▶️ Playing audio");
    let status = cmd
        .status()
        .await
        .with_context(|| format!("failed to launch audio player {player}"))?;
    if !status.success() {
        // Mirrors check=False subprocess semantics: log, don't fail the loop.
        debug!(player, ?status, "Audio player exited non-zero");
    }
    Ok(())
}

#[cfg(windows)]
async fn play_file(path: &Path, _encoding: AudioEncoding) -> Result<()> {
    // Let the default file association handle it; returns immediately.
    async_process::Command::new("cmd")
        .args(["/C", "start", ""])
        .arg(path)
        .status()
        .await
        .context("failed to launch default audio handler")?;
    Ok(())
}

#[cfg(not(windows))]
fn player_candidates(encoding: AudioEncoding) -> &'static [&'static str] {
    if cfg!(target_os = "macos") {
        return &["afplay", "open"];
    }
    match encoding {
        AudioEncoding::Linear16 => &["aplay", "paplay", "ffplay"],
        AudioEncoding::Mp3 => &["mpg123", "ffplay", "paplay"],
        AudioEncoding::OggOpus => &["ffplay", "paplay"],
    }
}

/// First candidate found on PATH, with its resolved binary path.
#[cfg(not(windows))]
fn choose_player(candidates: &'static [&'static str]) -> Option<(&'static str, PathBuf)> {
    candidates
        .iter()
        .find_map(|name| find_in_path(name).map(|bin| (*name, bin)))
}

#[cfg(not(windows))]
fn find_in_path(bin: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(bin))
        .find(|candidate| candidate.exists())
}
