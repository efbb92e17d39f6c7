use std::fs;
use std::path::Path;

use walkdir::{DirEntry, WalkDir};

use super::IndexError;

/// Files larger than this are not indexed.
pub const MAX_FILE_SIZE: u64 = 1024 * 1024;

const SKIPPED_DIRS: &[&str] =
    &["target", "node_modules", "__pycache__", "dist", "build", "venv"];

const INDEXED_EXTENSIONS: &[&str] = &[
    "rs", "py", "pyi", "js", "jsx", "mjs", "ts", "tsx", "go", "java", "kt",
    "kts", "scala", "swift", "c", "h", "cc", "cpp", "hpp", "cs", "rb", "php",
    "lua", "zig", "ex", "exs", "erl", "hs", "ml", "clj", "dart", "r", "jl",
    "sh", "bash", "zsh", "fish", "ps1", "sql", "proto", "graphql", "html",
    "css", "scss", "vue", "svelte", "toml", "yaml", "yml", "json", "ini",
    "cfg", "md", "rst", "txt",
];

const INDEXED_FILE_NAMES: &[&str] =
    &["Makefile", "Dockerfile", "CMakeLists.txt", "Justfile", "Rakefile"];

/// A file worth indexing.
pub(crate) struct Candidate {
    /// Path relative to the root, with `/` separators.
    pub rel_path: String,
    pub abs_path: std::path::PathBuf,
    pub len: u64,
    pub modified: Option<std::time::SystemTime>,
}

/// Lists the indexable files under `root`.
///
/// Entries that can't be read are skipped, only a failure to read `root`
/// itself is an error.
pub(crate) fn candidates(root: &Path) -> Result<Vec<Candidate>, IndexError> {
    if !root.is_dir() {
        return Err(IndexError::NotADirectory(root.to_owned()));
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry));

    let mut found = vec![];
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(IndexError::Io {
                    path: root.to_owned(),
                    source: err.into(),
                });
            }
            Err(err) => {
                debug!("skipping unreadable entry: {err}");
                continue;
            }
        };
        if !entry.file_type().is_file() || !has_indexed_name(entry.path()) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if metadata.len() > MAX_FILE_SIZE {
            trace!("skipping large file {}", entry.path().display());
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        found.push(Candidate {
            rel_path: rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            abs_path: entry.path().to_owned(),
            len: metadata.len(),
            modified: metadata.modified().ok(),
        });
    }
    Ok(found)
}

/// Reads a candidate as text, or `None` for binary or non-UTF-8 content.
pub(crate) fn read_text(path: &Path) -> Option<String> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!("can't read {}: {err}", path.display());
            return None;
        }
    };
    if bytes.iter().take(8192).any(|&b| b == 0) {
        return None;
    }
    String::from_utf8(bytes).ok()
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

fn has_indexed_name(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str());
    if name.is_some_and(|name| INDEXED_FILE_NAMES.contains(&name)) {
        return true;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            INDEXED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        })
}
