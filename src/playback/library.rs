//! Music directory scanning and random track choice

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};

/// File extensions recognised as music
pub const AUDIO_EXTENSIONS: [&str; 3] = ["mp3", "wav", "ogg"];

/// Directory of tracks to pick from
pub struct TrackLibrary {
    dir: PathBuf,
    rng: StdRng,
}

impl TrackLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Library with a fixed seed, for reproducible picks
    pub fn with_seed(dir: impl Into<PathBuf>, seed: u64) -> Self {
        Self {
            dir: dir.into(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All audio files directly inside the directory, sorted by name
    ///
    /// The directory is re-read on every call so tracks can be added while
    /// running.
    pub fn scan(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut tracks: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_audio_extension(path))
            .collect();
        tracks.sort();
        Ok(tracks)
    }

    /// Pick a random track accepted by `playable`
    pub fn pick_where<F>(&mut self, playable: F) -> std::io::Result<Option<PathBuf>>
    where
        F: Fn(&Path) -> bool,
    {
        let candidates: Vec<PathBuf> = self
            .scan()?
            .into_iter()
            .filter(|path| playable(path))
            .collect();
        Ok(candidates.choose(&mut self.rng).cloned())
    }

    /// Pick a random audio file
    pub fn pick(&mut self) -> std::io::Result<Option<PathBuf>> {
        self.pick_where(|_| true)
    }
}

/// Case-insensitive extension check against [`AUDIO_EXTENSIONS`]
pub fn has_audio_extension(path: &Path) -> bool {
    extension_is(path, &AUDIO_EXTENSIONS)
}

/// Case-insensitive extension check
pub fn extension_is(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn library_with(files: &[&str]) -> (tempfile::TempDir, TrackLibrary) {
        let dir = tempfile::tempdir().unwrap();
        for name in files {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let library = TrackLibrary::with_seed(dir.path(), 7);
        (dir, library)
    }

    #[test]
    fn test_scan_filters_extensions() {
        let (_dir, library) = library_with(&["b.wav", "a.MP3", "notes.txt", "c.ogg", "cover.jpg"]);
        let names: Vec<String> = library
            .scan()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.MP3", "b.wav", "c.ogg"]);
    }

    #[test]
    fn test_pick_from_empty_directory() {
        let (_dir, mut library) = library_with(&["readme.txt"]);
        assert_eq!(library.pick().unwrap(), None);
    }

    #[test]
    fn test_pick_where_respects_filter() {
        let (_dir, mut library) = library_with(&["a.mp3", "b.wav", "c.ogg"]);
        for _ in 0..10 {
            let track = library
                .pick_where(|p| extension_is(p, &["wav"]))
                .unwrap()
                .unwrap();
            assert_eq!(track.file_name().unwrap(), "b.wav");
        }
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let mut library = TrackLibrary::new("/nonexistent/presence-player-music");
        assert!(library.pick().is_err());
    }
}
