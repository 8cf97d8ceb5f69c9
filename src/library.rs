//! Turning command line targets into tracks

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::domain::track::Track;

const MUSIC_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "m4a", "ogg", "aac"];

pub fn is_music_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MUSIC_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Recursively collects music files below `root`, sorted by path
pub fn scan_dir(root: &Path, follow_symlinks: bool) -> Vec<PathBuf> {
    let root_str = root.to_string_lossy();

    let mut paths = WalkDir::new(root)
        .follow_links(follow_symlinks)
        .into_iter()
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(err) => {
                log::warn!("error while scanning dir {root_str}, skipping an entry: {err}");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| is_music_file(p))
        .collect::<Vec<PathBuf>>();

    paths.sort();
    paths
}

/// A directory expands to the music files inside it, anything else is
/// taken as the URL of a single track.
pub fn resolve_target(target: &str, follow_symlinks: bool) -> anyhow::Result<Vec<Track>> {
    let path = Path::new(target);
    if !path.is_dir() {
        return Ok(vec![Track::from_url(target)?]);
    }

    let tracks = scan_dir(path, follow_symlinks)
        .into_iter()
        .map(|p| Track::from_url(p.to_string_lossy()))
        .collect::<Result<Vec<_>, _>>()?;

    if tracks.is_empty() {
        log::warn!("no music files found in {target}");
    }
    Ok(tracks)
}
