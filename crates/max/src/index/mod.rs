//! A keyword index over the files of a project.
//!
//! [`LexicalIndex`] is the bundled [`CodeSearch`] backend. It keeps the chunks
//! of every indexable file in memory and re-reads only the files whose size
//! or modification time changed since the last scan, so each search sees the
//! project as it is on disk.

mod chunk;
mod scan;

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::{JoinError, spawn_blocking};

use crate::tools::{CodeSearch, SearchError, Snippet};
use chunk::Chunk;

pub use chunk::{CHUNK_OVERLAP, CHUNK_SIZE};
pub use scan::MAX_FILE_SIZE;

// Too common in questions to say anything about the code.
const STOP_WORDS: &[&str] = &[
    "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for",
    "from", "how", "in", "is", "it", "me", "of", "on", "or", "show", "that",
    "the", "this", "to", "what", "where", "which", "who", "why", "with",
];

// Added to the score for every query term found in the file path.
const PATH_MATCH_BONUS: usize = 2;

/// Error returned by [`LexicalIndex`].
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The project root is not a directory.
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    /// A directory could not be read.
    #[error("failed to read {}", path.display())]
    Io {
        /// The directory.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// The background scan panicked or was cancelled.
    #[error("index scan did not finish")]
    Task(#[from] JoinError),
}

/// Counts reported by [`LexicalIndex::refresh`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of indexed files.
    pub files: usize,
    /// Number of chunks across those files.
    pub chunks: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct Stamp {
    len: u64,
    modified: Option<SystemTime>,
}

struct FileEntry {
    stamp: Stamp,
    chunks: Vec<Chunk>,
}

#[derive(Default)]
struct IndexState {
    // Keyed by relative path, so iteration is in path order.
    files: BTreeMap<String, FileEntry>,
}

/// A keyword index over the files of a project directory.
#[derive(Clone)]
pub struct LexicalIndex {
    root: Arc<PathBuf>,
    state: Arc<Mutex<IndexState>>,
}

impl LexicalIndex {
    /// Creates an empty index of the directory `root`.
    ///
    /// Nothing is read until the first [`refresh`](Self::refresh) or search.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: Arc::new(root.into()),
            state: Default::default(),
        }
    }

    /// Returns the project root.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Brings the index up to date with the files on disk.
    pub async fn refresh(&self) -> Result<IndexStats, IndexError> {
        let root = Arc::clone(&self.root);
        let state = Arc::clone(&self.state);
        spawn_blocking(move || {
            let mut state = state.blocking_lock();
            state.refresh(&root)
        })
        .await?
    }
}

#[async_trait]
impl CodeSearch for LexicalIndex {
    async fn search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<Snippet>, SearchError> {
        let root = Arc::clone(&self.root);
        let state = Arc::clone(&self.state);
        let query = query.to_owned();
        let snippets = spawn_blocking(move || {
            let mut state = state.blocking_lock();
            state.refresh(&root)?;
            Ok::<_, IndexError>(state.search(&query, k))
        })
        .await
        .map_err(IndexError::from)??;
        Ok(snippets)
    }
}

impl IndexState {
    fn refresh(&mut self, root: &Path) -> Result<IndexStats, IndexError> {
        let candidates = scan::candidates(root)?;
        let mut seen = HashSet::with_capacity(candidates.len());
        let mut reread = 0;

        for candidate in candidates {
            let stamp = Stamp {
                len: candidate.len,
                modified: candidate.modified,
            };
            seen.insert(candidate.rel_path.clone());
            let unchanged = self
                .files
                .get(&candidate.rel_path)
                .is_some_and(|entry| entry.stamp == stamp);
            if unchanged {
                continue;
            }

            reread += 1;
            match scan::read_text(&candidate.abs_path) {
                Some(text) => {
                    let chunks = chunk::split(&text);
                    self.files
                        .insert(candidate.rel_path, FileEntry { stamp, chunks });
                }
                None => {
                    self.files.remove(&candidate.rel_path);
                }
            }
        }
        self.files.retain(|path, _| seen.contains(path));

        let stats = IndexStats {
            files: self.files.len(),
            chunks: self.files.values().map(|f| f.chunks.len()).sum(),
        };
        debug!(
            "index of {} has {} files, {} chunks ({reread} re-read)",
            root.display(),
            stats.files,
            stats.chunks
        );
        Ok(stats)
    }

    fn search(&self, query: &str, k: usize) -> Vec<Snippet> {
        let terms = query_terms(query);
        if terms.is_empty() || k == 0 {
            return vec![];
        }

        let mut scored = vec![];
        for (path, entry) in &self.files {
            let folded_path = path.to_lowercase();
            let path_bonus = terms
                .iter()
                .filter(|term| folded_path.contains(term.as_str()))
                .count()
                * PATH_MATCH_BONUS;
            for chunk in &entry.chunks {
                let hits: usize = terms
                    .iter()
                    .map(|term| chunk.folded.matches(term.as_str()).count())
                    .sum();
                if hits > 0 {
                    scored.push((hits + path_bonus, path, chunk));
                }
            }
        }

        // `files` iterates in path order and chunks in line order, so a
        // stable sort by score keeps ties ordered by path then line.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(k)
            .map(|(_, path, chunk)| Snippet {
                path: path.clone(),
                start_line: chunk.start_line,
                end_line: chunk.end_line,
                text: chunk.text.clone(),
            })
            .collect()
    }
}

/// Splits a query into lowercase search terms.
///
/// Terms are runs of alphanumeric characters at least two characters long,
/// common English words are dropped and duplicates are removed.
fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = vec![];
    for word in query.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
        if word.chars().count() < 2 || STOP_WORDS.contains(&word) {
            continue;
        }
        if !terms.iter().any(|term| term == word) {
            terms.push(word.to_owned());
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write(root: &Path, path: &str, content: &str) {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_query_terms() {
        assert_eq!(
            query_terms("Where is the HTTP router? router, x, http_server"),
            ["http", "router", "server"]
        );
        assert!(query_terms("is it a ?").is_empty());
    }

    #[tokio::test]
    async fn test_filters() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "src/lib.rs", "pub fn parse_config() {}");
        write(root, ".git/config.rs", "fn parse_config() {}");
        write(root, "target/debug/out.rs", "fn parse_config() {}");
        write(root, "node_modules/pkg/index.js", "parse_config()");
        write(root, "assets/logo.png", "parse_config");
        write(
            root,
            "big.txt",
            &"parse_config\n".repeat(MAX_FILE_SIZE as usize / 10),
        );

        let index = LexicalIndex::new(root);
        let stats = index.refresh().await.unwrap();
        assert_eq!(stats, IndexStats { files: 1, chunks: 1 });

        let hits = index.search("parse_config", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "src/lib.rs");
    }

    #[tokio::test]
    async fn test_ranking() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "b.rs", "// router\nfn route() {}");
        write(root, "a.rs", "// router\nfn other() {}");
        write(root, "src/router.rs", "struct Router; // router router");
        write(root, "unrelated.rs", "fn main() {}");

        let index = LexicalIndex::new(root);
        let hits = index.search("How does the router work?", 5).await.unwrap();
        let paths: Vec<_> = hits.iter().map(|hit| hit.path.as_str()).collect();
        // Most matches first, ties by path.
        assert_eq!(paths, ["src/router.rs", "a.rs", "b.rs"]);
        assert_eq!(hits[1].start_line, 1);
        assert_eq!(hits[1].end_line, 2);

        let hits = index.search("router", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_sees_changes_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "notes.md", "nothing yet");

        let index = LexicalIndex::new(root);
        assert!(index.search("tokenizer", 5).await.unwrap().is_empty());

        write(root, "src/tokenizer.rs", "pub struct Tokenizer;");
        let hits = index.search("tokenizer", 5).await.unwrap();
        assert_eq!(hits[0].path, "src/tokenizer.rs");

        fs::remove_file(root.join("src/tokenizer.rs")).unwrap();
        assert!(index.search("tokenizer", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let index = LexicalIndex::new(dir.path().join("missing"));
        assert!(matches!(
            index.refresh().await,
            Err(IndexError::NotADirectory(_))
        ));
    }
}
