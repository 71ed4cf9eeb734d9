//! Writes rendered documents into the engine's configuration tree.
//!
//! Each document goes through a temp-file-then-atomic-rename so a concurrent
//! reload never observes a half-written file. The operation is
//! all-or-nothing per tenant: on any single write failure every document
//! already replaced in this pass is restored from its snapshot, so the tree
//! holds either the previous set or the new set, never a mix.
//!
//! Mutual exclusion per destination path is the caller's responsibility (the
//! orchestrator serializes passes per tenant). Readers need no exclusion;
//! rename is atomic on the same filesystem.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::render::RenderedDocument;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Reading the previous contents failed before anything was written.
    #[error("failed to snapshot previous contents of {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to replace {path}: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Paths replaced by a successful publish, relative to the tree root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub written: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ArtifactPublisher {
    root: PathBuf,
}

impl ArtifactPublisher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Replace the tenant's documents atomically, rolling back on failure.
    pub fn publish(&self, documents: &[RenderedDocument]) -> Result<PublishReceipt, PublishError> {
        // Last-known-good snapshot per target, taken before anything moves.
        let mut replaced: Vec<(PathBuf, Option<Vec<u8>>)> = Vec::with_capacity(documents.len());

        for document in documents {
            let target = self.root.join(&document.relative_path);
            let previous = match fs::read(&target) {
                Ok(bytes) => Some(bytes),
                Err(err) if err.kind() == io::ErrorKind::NotFound => None,
                Err(source) => {
                    self.rollback(&replaced);
                    return Err(PublishError::Snapshot {
                        path: target,
                        source,
                    });
                }
            };

            if let Err(source) = replace_atomically(&target, document.contents.as_bytes()) {
                self.rollback(&replaced);
                return Err(PublishError::Replace {
                    path: target,
                    source,
                });
            }
            replaced.push((target, previous));
        }

        Ok(PublishReceipt {
            written: documents
                .iter()
                .map(|document| document.relative_path.clone())
                .collect(),
        })
    }

    /// Restore previously published bytes. Best-effort: a rollback failure
    /// is logged rather than allowed to mask the original error.
    fn rollback(&self, replaced: &[(PathBuf, Option<Vec<u8>>)]) {
        for (target, previous) in replaced.iter().rev() {
            let restored = match previous {
                Some(bytes) => replace_atomically(target, bytes),
                None => match fs::remove_file(target) {
                    Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
                    _ => Ok(()),
                },
            };
            if let Err(err) = restored {
                warn!(path = %target.display(), error = %err, "rollback of published document failed");
            }
        }
    }
}

/// Write to `<target>.tmp` in the same directory, then rename over the
/// target so readers see either the old or the new bytes.
fn replace_atomically(target: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let staged = staging_path(target);
    fs::write(&staged, bytes)?;
    match fs::rename(&staged, target) {
        Ok(()) => Ok(()),
        Err(err) => {
            // Do not leave the staging file behind on a failed rename.
            let _ = fs::remove_file(&staged);
            Err(err)
        }
    }
}

fn staging_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}
