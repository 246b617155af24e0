//! Library index: every playable file under the library directory, sorted
//! into the mixes and tunes pools by duration.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use lofty::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use randomsound_proto::config::ServerConfig;
use randomsound_proto::filter::Selection;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub ext: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct LibraryIndex {
    files: Vec<IndexedFile>,
    mixes: Vec<usize>,
    tunes: Vec<usize>,
    all: Vec<usize>,
    pub built_at: DateTime<Utc>,
}

impl LibraryIndex {
    /// Classify files whose tags were read.  Anything longer than the threshold is
    /// a mix.
    pub fn from_files(files: Vec<IndexedFile>, mix_threshold: Duration) -> Self {
        let mut mixes = Vec::new();
        let mut tunes = Vec::new();
        for (i, f) in files.iter().enumerate() {
            if f.duration > mix_threshold {
                mixes.push(i);
            } else {
                tunes.push(i);
            }
        }
        Self {
            all: (0..files.len()).collect(),
            files,
            mixes,
            tunes,
            built_at: Utc::now(),
        }
    }

    /// Walk the library and read tags on a blocking thread.
    pub async fn build(config: &ServerConfig) -> anyhow::Result<Self> {
        let config = config.clone();
        tokio::task::spawn_blocking(move || Self::scan(&config))
            .await
            .context("library scan panicked")?
    }

    pub fn scan(config: &ServerConfig) -> anyhow::Result<Self> {
        let root = &config.library_dir;
        if !root.is_dir() {
            anyhow::bail!("library directory {} does not exist", root.display());
        }
        info!("index: walking {}", root.display());

        let extensions: Vec<String> = config
            .extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        let max_duration = Duration::from_secs(config.max_duration_secs);

        let mut files = Vec::new();
        for path in walk(root) {
            if !has_extension(&path, &extensions) {
                continue;
            }
            match read_tags(&path) {
                Some(f) if f.duration > max_duration => {
                    debug!("index: skipping {} ({}s)", path.display(), f.duration.as_secs());
                }
                Some(f) => files.push(f),
                None => warn!("index: could not read {}", path.display()),
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let index = Self::from_files(files, Duration::from_secs(config.mix_threshold_secs));
        info!(
            "index: {} files ({} mixes, {} tunes)",
            index.len(),
            index.mixes.len(),
            index.tunes.len()
        );
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn pool_len(&self, selection: Selection) -> usize {
        self.pool(selection).len()
    }

    fn pool(&self, selection: Selection) -> &[usize] {
        match selection {
            Selection::Mixes => &self.mixes,
            Selection::Tunes => &self.tunes,
            Selection::All => &self.all,
        }
    }

    /// Uniform pick from the pool; `None` when it is empty.
    pub fn pick_random<R: Rng + ?Sized>(
        &self,
        selection: Selection,
        rng: &mut R,
    ) -> Option<&IndexedFile> {
        self.pool(selection)
            .choose(rng)
            .and_then(|&i| self.files.get(i))
    }
}

/// Every regular file below `root`.  Symlinks are not followed, so a link
/// cycle cannot index a file twice.
fn walk(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("index: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(DirEntry::into_path)
        .collect()
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Duration and tags via lofty.  `None` if the file can't be parsed.
fn read_tags(path: &Path) -> Option<IndexedFile> {
    let tagged = lofty::read_from_path(path).ok()?;
    let duration = tagged.properties().duration();
    let tag = tagged.primary_tag().or_else(|| tagged.first_tag());

    let text = |v: Option<Cow<'_, str>>| v.map(Cow::into_owned).unwrap_or_default();

    Some(IndexedFile {
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        ext: path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default(),
        title: text(tag.and_then(|t| t.title())),
        artist: text(tag.and_then(|t| t.artist())),
        album: text(tag.and_then(|t| t.album())),
        duration,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A mono 16-bit PCM WAV of silence, `secs` long at 8 kHz.
    pub(crate) fn write_wav(path: &Path, secs: u32) {
        let rate: u32 = 8000;
        let data_len = rate * 2 * secs;
        let mut b = Vec::with_capacity(44 + data_len as usize);
        b.extend_from_slice(b"RIFF");
        b.extend_from_slice(&(36 + data_len).to_le_bytes());
        b.extend_from_slice(b"WAVEfmt ");
        b.extend_from_slice(&16u32.to_le_bytes());
        b.extend_from_slice(&1u16.to_le_bytes()); // PCM
        b.extend_from_slice(&1u16.to_le_bytes()); // mono
        b.extend_from_slice(&rate.to_le_bytes());
        b.extend_from_slice(&(rate * 2).to_le_bytes());
        b.extend_from_slice(&2u16.to_le_bytes());
        b.extend_from_slice(&16u16.to_le_bytes());
        b.extend_from_slice(b"data");
        b.extend_from_slice(&data_len.to_le_bytes());
        b.resize(44 + data_len as usize, 0);
        std::fs::write(path, b).unwrap();
    }

    pub(crate) fn file(path: &Path, secs: u64) -> IndexedFile {
        IndexedFile {
            path: path.to_path_buf(),
            file_name: path.file_name().unwrap().to_string_lossy().to_string(),
            ext: "wav".to_string(),
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            duration: Duration::from_secs(secs),
        }
    }

    fn config(dir: &Path) -> ServerConfig {
        ServerConfig {
            library_dir: dir.to_path_buf(),
            mix_threshold_secs: 2,
            max_duration_secs: 5,
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_threshold_splits_pools() {
        let idx = LibraryIndex::from_files(
            vec![
                file(Path::new("/a.wav"), 60),
                file(Path::new("/b.wav"), 23 * 60),
                file(Path::new("/c.wav"), 23 * 60 + 1),
            ],
            Duration::from_secs(23 * 60),
        );
        assert_eq!(idx.pool_len(Selection::Tunes), 2);
        assert_eq!(idx.pool_len(Selection::Mixes), 1);
        assert_eq!(idx.pool_len(Selection::All), 3);

        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let pick = idx.pick_random(Selection::Mixes, &mut rng).unwrap();
            assert_eq!(pick.path, Path::new("/c.wav"));
        }
    }

    #[test]
    fn test_empty_pool_picks_nothing() {
        let idx = LibraryIndex::from_files(
            vec![file(Path::new("/a.wav"), 60)],
            Duration::from_secs(23 * 60),
        );
        assert!(idx
            .pick_random(Selection::Mixes, &mut rand::thread_rng())
            .is_none());
    }

    #[tokio::test]
    async fn test_scan_walks_and_classifies() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("deep").join("er");
        std::fs::create_dir_all(&nested).unwrap();

        write_wav(&dir.path().join("short.wav"), 1);
        write_wav(&nested.join("long.wav"), 3);
        write_wav(&dir.path().join("too-long.wav"), 6);
        std::fs::write(dir.path().join("broken.wav"), b"not audio").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let idx = LibraryIndex::build(&config(dir.path())).await.unwrap();
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.pool_len(Selection::Tunes), 1);
        assert_eq!(idx.pool_len(Selection::Mixes), 1);

        let mix = idx
            .pick_random(Selection::Mixes, &mut rand::thread_rng())
            .unwrap();
        assert_eq!(mix.file_name, "long.wav");
        assert_eq!(mix.ext, "wav");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_indexes_file_once() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("one.wav"), 1);
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let idx = LibraryIndex::scan(&config(dir.path())).unwrap();
        assert_eq!(idx.len(), 1);
        assert_eq!(walk(dir.path()).len(), 1);
    }

    #[test]
    fn test_missing_library_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LibraryIndex::scan(&config(&dir.path().join("nope"))).is_err());
    }
}
