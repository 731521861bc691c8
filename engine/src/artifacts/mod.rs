//! Artifact Extraction
//!
//! Agents emit files as fenced code blocks whose opening fence names the
//! file:
//!
//! ````text
//! ```python:main.py
//! ```javascript main.js
//! ```main.py
//! ````
//!
//! `ArtifactExtractor` finds those blocks and writes each body to
//! `<output_root>/<session_id>/<basename>`. Directory parts of the announced
//! name are discarded, and every write goes through a [`SessionGuard`], so
//! nothing lands outside the session directory.

use regex::Regex;
use sdk::errors::EngineError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::fs_guard::{validate_session_id, SessionGuard};

static FENCE_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Opening fence with optional language tags, a filename that carries an
/// extension, then the body up to the next closing fence.
fn fence_pattern() -> &'static Regex {
    FENCE_PATTERN.get_or_init(|| {
        Regex::new(r"(?s)(?:^|\n)```(?:[\w+\-.#]+[ \t:]+)*([\w\-./\\]+\.\w+)\r?\n(.*?)```")
            .expect("Invalid fence pattern")
    })
}

/// A file announced in agent output, before it is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock<'a> {
    /// Filename exactly as written on the fence
    pub filename: &'a str,
    pub body: &'a str,
}

/// A file written to the session directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArtifact {
    /// Basename only
    pub filename: String,
    pub absolute_path: PathBuf,
    /// Trimmed body as written
    pub content: String,
}

/// Every filename-annotated block in `content`, in order.
///
/// Blocks with a blank filename or body are dropped.
pub fn find_code_blocks(content: &str) -> Vec<CodeBlock<'_>> {
    fence_pattern()
        .captures_iter(content)
        .filter_map(|caps| {
            let filename = caps.get(1)?.as_str();
            let body = caps.get(2)?.as_str();
            if filename.trim().is_empty() || body.trim().is_empty() {
                return None;
            }
            Some(CodeBlock { filename, body })
        })
        .collect()
}

/// Last path segment, treating both `/` and `\` as separators
pub fn basename(filename: &str) -> &str {
    filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename)
}

/// Writes annotated code blocks into per-session directories
#[derive(Debug, Clone)]
pub struct ArtifactExtractor {
    output_root: PathBuf,
}

impl ArtifactExtractor {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Directory files for `session_id` are written to. Not created here.
    pub fn session_dir(&self, session_id: &str) -> Result<PathBuf, EngineError> {
        validate_session_id(session_id)?;
        Ok(self.output_root.join(session_id))
    }

    /// Extract and write every annotated block, returning the written paths
    /// in match order.
    pub fn extract_and_save(
        &self,
        content: &str,
        session_id: &str,
    ) -> Result<Vec<PathBuf>, EngineError> {
        Ok(self
            .extract_artifacts(content, session_id)?
            .into_iter()
            .map(|artifact| artifact.absolute_path)
            .collect())
    }

    /// Extract and write every annotated block.
    ///
    /// Only an invalid session id or an unusable session directory fails the
    /// call. Individual blocks that resolve outside the session or cannot be
    /// written are logged and skipped. Existing files are overwritten, so
    /// running twice on the same content yields the same files.
    pub fn extract_artifacts(
        &self,
        content: &str,
        session_id: &str,
    ) -> Result<Vec<ExtractedArtifact>, EngineError> {
        let blocks = find_code_blocks(content);
        let guard = SessionGuard::open(&self.output_root, session_id)?;
        debug!(
            "Found {} annotated blocks for session {}",
            blocks.len(),
            session_id
        );

        let mut written = Vec::with_capacity(blocks.len());
        for block in blocks {
            let filename = basename(block.filename);
            let path = match guard.resolve(filename) {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping artifact {:?}: {}", block.filename, e);
                    continue;
                }
            };

            let body = block.body.trim();
            if let Err(e) = fs::write(&path, body) {
                warn!("Failed to write artifact {}: {}", path.display(), e);
                continue;
            }

            info!("Saved artifact {}", path.display());
            written.push(ExtractedArtifact {
                filename: filename.to_string(),
                absolute_path: path,
                content: body.to_string(),
            });
        }

        Ok(written)
    }

    /// Files currently in the session directory, sorted by name.
    ///
    /// A session that has not written anything yet has no files.
    pub fn list_session_files(&self, session_id: &str) -> Result<Vec<PathBuf>, EngineError> {
        let dir = self.session_dir(session_id)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}
