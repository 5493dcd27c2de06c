//! Full-tree scanning and single-file reconciliation (made by FontLab https://www.fontlab.com/)

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::catalog::{Catalog, CategoryStatus, NewFontFile};
use crate::identity;
use crate::parse::FaceParser;

/// The only extensions ever considered for reconciliation.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["ttf", "otf", "ttc", "otc"];

/// Outcome of reconciling one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// A fresh file record and face set were written.
    Indexed,
    /// The stored size/mtime still match the on-disk stat; no work done.
    Unchanged,
    /// Unsupported extension, not a regular file, or unparseable container.
    Skipped,
}

/// Write path into the catalog: walks roots, reconciles files, and is also
/// the target the watcher bridge routes events into.
pub struct Scanner {
    catalog: Arc<Catalog>,
    parser: Arc<dyn FaceParser>,
    // In-flight guard, owned per instance rather than global.
    scanning: AtomicBool,
}

impl Scanner {
    pub fn new(catalog: Arc<Catalog>, parser: Arc<dyn FaceParser>) -> Self {
        Self {
            catalog,
            parser,
            scanning: AtomicBool::new(false),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Scan every `ok` category. At most one full scan runs at a time; a
    /// call while one is in flight is a no-op. Incremental watcher
    /// reconciliation may still run concurrently.
    pub fn scan_all(&self) {
        if self
            .scanning
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("full scan already in progress, ignoring");
            return;
        }
        let _guard = ScanGuard(&self.scanning);

        info!("starting full scan");
        for category in self.catalog.categories() {
            if category.status == CategoryStatus::Ok {
                self.scan_category(category.id, &category.path);
            }
        }
        info!("full scan complete");
    }

    /// Reconcile one category root. A missing root marks the category and
    /// leaves its previously indexed rows untouched (stale but queryable).
    pub fn scan_category(&self, category_id: Uuid, root: &Path) {
        if !root.is_dir() {
            warn!(root = %root.display(), "category root unavailable");
            self.catalog.set_category_status(
                category_id,
                CategoryStatus::Missing,
                Some("path not found"),
            );
            return;
        }
        if let Err(err) = fs::read_dir(root) {
            warn!(root = %root.display(), %err, "category root unreadable");
            self.catalog.set_category_status(
                category_id,
                CategoryStatus::Error,
                Some(&err.to_string()),
            );
            return;
        }
        self.catalog
            .set_category_status(category_id, CategoryStatus::Ok, None);

        let files: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) if entry.file_type().is_file() => Some(entry.into_path()),
                Ok(_) => None,
                Err(err) => {
                    // One unreadable subdirectory must not sink the scan.
                    warn!(%err, "skipping unreadable entry");
                    None
                }
            })
            .collect();

        files.par_iter().for_each(|path| {
            if let Err(err) = self.process_file(path, category_id, root) {
                warn!(path = %path.display(), %err, "failed to reconcile file");
            }
        });
    }

    /// The atomic reconciliation unit shared by full scans and watch events.
    ///
    /// I/O, hashing and parsing all happen before the catalog lock is taken;
    /// only the final replace touches shared state.
    pub fn process_file(
        &self,
        full_path: &Path,
        category_id: Uuid,
        root: &Path,
    ) -> Result<Reconciled> {
        let ext = match full_path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.to_ascii_lowercase(),
            None => return Ok(Reconciled::Skipped),
        };
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            return Ok(Reconciled::Skipped);
        }

        let meta = fs::metadata(full_path)
            .with_context(|| format!("stat {}", full_path.display()))?;
        if !meta.is_file() {
            return Ok(Reconciled::Skipped);
        }
        let mtime_ms = mtime_millis(&meta);

        // Fast path: an exact size + mtime match means no re-read, no
        // re-hash, no re-parse.
        if let Some(existing) = self.catalog.font_file_by_path(full_path) {
            if existing.size_bytes == meta.len() && existing.mtime_ms == mtime_ms {
                return Ok(Reconciled::Unchanged);
            }
        }

        let bytes = fs::read(full_path)
            .with_context(|| format!("reading {}", full_path.display()))?;
        let (content_hash, size_bytes) = identity::identify(&bytes);

        let mut faces = match self.parser.parse(&bytes) {
            Ok(faces) => faces,
            Err(err) => {
                warn!(path = %full_path.display(), %err, "skipping unparseable container");
                return Ok(Reconciled::Skipped);
            }
        };

        // A face with no usable family name falls back to the file stem so
        // it still shows up in family queries.
        let stem = full_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        for face in &mut faces {
            if face.family.trim().is_empty() {
                face.family = stem.clone();
            }
        }

        let rel_path = full_path
            .strip_prefix(root)
            .unwrap_or(full_path)
            .to_path_buf();

        self.catalog.replace_file(
            NewFontFile {
                category_id,
                full_path: full_path.to_path_buf(),
                rel_path,
                size_bytes,
                mtime_ms,
                content_hash,
            },
            faces,
        );

        Ok(Reconciled::Indexed)
    }
}

struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn mtime_millis(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
