//! File-backed [`AudioPlayer`].
//!
//! Clips resolve to files under the configured asset directory. With the
//! `speaker` feature the file is decoded and played through `rodio` on a
//! blocking thread; without it the asset is only checked and logged.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use queuecall_core::config::AudioConfig;
use queuecall_core::{AudioPlayer, PlaybackError};
use queuecall_types::Clip;

/// Plays clips from disk.
#[derive(Debug, Clone)]
pub struct AssetPlayer {
    asset_dir: PathBuf,
    extension: String,
    ding_file: String,
    /// Bumped by [`AudioPlayer::stop`]; playback started under an older
    /// value ends early.
    generation: Arc<AtomicU64>,
}

impl AssetPlayer {
    /// Create a player for the assets described by `config`.
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            asset_dir: config.asset_dir.clone(),
            extension: config.extension.clone(),
            ding_file: config.ding_file.clone(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Path of the asset for `clip`.
    pub fn path_for(&self, clip: &Clip) -> PathBuf {
        self.asset_dir
            .join(clip.file_name(&self.extension, &self.ding_file))
    }

    /// Path of the asset for `clip`, if it exists. A recorded clip whose
    /// name is not a plain file name is reported missing.
    pub fn resolve(&self, clip: &Clip) -> Result<PathBuf, PlaybackError> {
        if !clip.is_plain_file() {
            return Err(PlaybackError::Missing(clip.to_string()));
        }
        let path = self.path_for(clip);
        if path.is_file() {
            Ok(path)
        } else {
            Err(PlaybackError::Missing(path.display().to_string()))
        }
    }
}

impl AudioPlayer for AssetPlayer {
    async fn play(&self, clip: &Clip) -> Result<(), PlaybackError> {
        let path = self.resolve(clip)?;
        let label = clip.to_string();
        let generation = Arc::clone(&self.generation);
        let started = generation.load(Ordering::SeqCst);
        tokio::task::spawn_blocking(move || render(&path, &label, &generation, started))
            .await
            .map_err(|e| PlaybackError::Device(e.to_string()))?
    }

    fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(feature = "speaker")]
fn render(
    path: &Path,
    clip: &str,
    generation: &AtomicU64,
    started: u64,
) -> Result<(), PlaybackError> {
    use std::fs::File;
    use std::io::BufReader;
    use std::time::Duration;

    use rodio::{Decoder, OutputStream, Sink};

    let (_stream, handle) =
        OutputStream::try_default().map_err(|e| PlaybackError::Device(e.to_string()))?;
    let file = File::open(path).map_err(|e| PlaybackError::Missing(format!("{}: {e}", path.display())))?;
    let source = Decoder::new(BufReader::new(file)).map_err(|e| PlaybackError::Decode {
        clip: clip.to_owned(),
        reason: e.to_string(),
    })?;
    let sink = Sink::try_new(&handle).map_err(|e| PlaybackError::Device(e.to_string()))?;
    sink.append(source);
    while !sink.empty() {
        if generation.load(Ordering::SeqCst) != started {
            sink.stop();
            tracing::debug!(clip, "playback stopped");
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    Ok(())
}

#[cfg(not(feature = "speaker"))]
fn render(
    path: &Path,
    clip: &str,
    _generation: &AtomicU64,
    _started: u64,
) -> Result<(), PlaybackError> {
    tracing::info!(clip, path = %path.display(), "clip (no audio output)");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> AudioConfig {
        AudioConfig {
            asset_dir: dir.to_path_buf(),
            extension: "mp3".to_owned(),
            ding_file: "ding.wav".to_owned(),
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("queuecall-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn clips_map_to_asset_names() {
        let player = AssetPlayer::new(&config(Path::new("/srv/audio")));
        assert_eq!(player.path_for(&Clip::Ding), PathBuf::from("/srv/audio/ding.wav"));
        assert_eq!(
            player.path_for(&Clip::TicketNumber(17)),
            PathBuf::from("/srv/audio/17.mp3")
        );
        assert_eq!(
            player.path_for(&Clip::ClinicNumber(3)),
            PathBuf::from("/srv/audio/clinic3.mp3")
        );
    }

    #[tokio::test]
    async fn missing_asset_is_reported() {
        let dir = scratch_dir("missing");
        let player = AssetPlayer::new(&config(&dir));
        let result = player.play(&Clip::TicketNumber(404)).await;
        assert!(matches!(result, Err(PlaybackError::Missing(p)) if p.ends_with("404.mp3")));
    }

    #[tokio::test]
    async fn recorded_clip_cannot_leave_the_asset_dir() {
        let dir = scratch_dir("escape");
        let outside = dir.parent().unwrap().join("queuecall-outside.mp3");
        std::fs::write(&outside, b"not really audio").unwrap();
        let player = AssetPlayer::new(&config(&dir));

        for name in [outside.display().to_string(), "../queuecall-outside.mp3".to_owned()] {
            let result = player.play(&Clip::Recorded(name.clone())).await;
            assert!(matches!(result, Err(PlaybackError::Missing(_))), "{name} resolved");
        }
    }

    #[cfg(not(feature = "speaker"))]
    #[tokio::test]
    async fn present_asset_plays_without_speaker() {
        let dir = scratch_dir("present");
        std::fs::write(dir.join("5.mp3"), b"not really audio").unwrap();
        let player = AssetPlayer::new(&config(&dir));
        assert!(player.play(&Clip::TicketNumber(5)).await.is_ok());
        player.stop();
    }
}
