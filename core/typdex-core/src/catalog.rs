//! Catalog store: records, relational invariants, snapshot persistence
//! (made by FontLab https://www.fontlab.com/)
//!
//! The catalog is the single source of truth shared by the scanner, the
//! watcher bridge, and the query engine. All state lives behind one lock;
//! every reconciliation mutation is a single short-lived write section, so
//! a reader can never observe a file whose faces are half-replaced.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::identity;
use crate::parse::FaceInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    Ok,
    Missing,
    Error,
}

/// A watched root directory contributing files to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub path: PathBuf,
    pub status: CategoryStatus,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One physical font-container file and its filesystem identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontFile {
    pub id: Uuid,
    pub category_id: Uuid,
    pub full_path: PathBuf,
    pub rel_path: PathBuf,
    pub filename: String,
    pub ext: String,
    pub size_bytes: u64,
    /// Modification time in milliseconds since the epoch; compared exactly
    /// against the on-disk stat for the fast-path skip.
    pub mtime_ms: i64,
    pub content_hash: String,
    /// Stable public key used to serve the file without exposing its path.
    pub url_key: String,
    /// Shared content hash when two or more live files carry identical bytes.
    pub duplicate_group: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One logical typographic face extracted from a [`FontFile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontFace {
    pub id: Uuid,
    pub font_file_id: Uuid,
    pub family: String,
    pub subfamily: String,
    pub postscript_name: Option<String>,
    pub weight: u16,
    pub italic: bool,
    pub width: Option<u16>,
    pub version: Option<String>,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Family,
    Face,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favorite {
    pub id: Uuid,
    pub target_kind: TargetKind,
    pub target_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionItem {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub target_kind: TargetKind,
    pub target_id: String,
    pub created_at: DateTime<Utc>,
}

/// Input for [`Catalog::replace_file`]; the scanner supplies what it read
/// from disk and the catalog derives the rest (filename, extension, URL key).
#[derive(Debug, Clone)]
pub struct NewFontFile {
    pub category_id: Uuid,
    pub full_path: PathBuf,
    pub rel_path: PathBuf,
    pub size_bytes: u64,
    pub mtime_ms: i64,
    pub content_hash: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct State {
    categories: Vec<Category>,
    font_files: Vec<FontFile>,
    font_faces: Vec<FontFace>,
    favorites: Vec<Favorite>,
    collection_items: Vec<CollectionItem>,
}

/// Summary counts, mainly for scan reporting.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CatalogStats {
    pub categories: usize,
    pub files: usize,
    pub faces: usize,
}

pub struct Catalog {
    state: RwLock<State>,
    snapshot_path: Option<PathBuf>,
}

impl Catalog {
    /// Open a catalog persisted as a JSON snapshot at `path`.
    ///
    /// A missing snapshot starts empty; an unreadable one is reported and
    /// replaced on the next write rather than aborting startup.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                warn!(path = %path.display(), %err, "unreadable catalog snapshot, starting empty");
                State::default()
            }),
            Err(_) => State::default(),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating catalog directory {}", parent.display()))?;
        }

        Ok(Self {
            state: RwLock::new(state),
            snapshot_path: Some(path),
        })
    }

    /// Ephemeral catalog with no snapshot, for tests and one-shot runs.
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(State::default()),
            snapshot_path: None,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().expect("catalog lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().expect("catalog lock poisoned")
    }

    // Persistence failures must not poison reconciliation; the snapshot is
    // rewritten on the next successful mutation anyway.
    fn persist(&self, state: &State) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        match serde_json::to_vec_pretty(state) {
            Ok(bytes) => {
                if let Err(err) = fs::write(path, bytes) {
                    warn!(path = %path.display(), %err, "failed to write catalog snapshot");
                }
            }
            Err(err) => warn!(%err, "failed to serialize catalog snapshot"),
        }
    }

    pub fn stats(&self) -> CatalogStats {
        let state = self.read();
        CatalogStats {
            categories: state.categories.len(),
            files: state.font_files.len(),
            faces: state.font_faces.len(),
        }
    }

    // --- categories ---

    /// Register a watched root. One record per distinct path: registering a
    /// path that is already watched returns the existing record untouched.
    pub fn add_category(&self, name: &str, path: impl AsRef<Path>) -> Category {
        let path = path.as_ref();
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        let mut state = self.write();
        if let Some(existing) = state.categories.iter().find(|c| c.path == canonical) {
            return existing.clone();
        }

        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            path: canonical,
            status: CategoryStatus::Ok,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        state.categories.push(category.clone());
        self.persist(&state);
        category
    }

    /// All categories, sorted by display name.
    pub fn categories(&self) -> Vec<Category> {
        let mut list = self.read().categories.clone();
        list.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        list
    }

    pub fn category(&self, id: Uuid) -> Option<Category> {
        self.read().categories.iter().find(|c| c.id == id).cloned()
    }

    pub fn set_category_status(
        &self,
        id: Uuid,
        status: CategoryStatus,
        last_error: Option<&str>,
    ) -> bool {
        let mut state = self.write();
        let Some(category) = state.categories.iter_mut().find(|c| c.id == id) else {
            return false;
        };
        category.status = status;
        category.last_error = last_error.map(str::to_string);
        category.updated_at = Utc::now();
        self.persist(&state);
        true
    }

    /// Delete a category and cascade to every file and face under it.
    pub fn delete_category(&self, id: Uuid) -> bool {
        let mut state = self.write();
        let before = state.categories.len();
        state.categories.retain(|c| c.id != id);
        if state.categories.len() == before {
            return false;
        }

        let doomed_files: Vec<FontFile> = state
            .font_files
            .iter()
            .filter(|f| f.category_id == id)
            .cloned()
            .collect();
        let doomed_ids: HashSet<Uuid> = doomed_files.iter().map(|f| f.id).collect();

        state.font_files.retain(|f| f.category_id != id);
        state
            .font_faces
            .retain(|face| !doomed_ids.contains(&face.font_file_id));
        for file in &doomed_files {
            refresh_duplicate_group(&mut state, &file.content_hash);
        }
        self.persist(&state);
        true
    }

    // --- font files & faces ---

    pub fn font_file_by_path(&self, path: &Path) -> Option<FontFile> {
        self.read()
            .font_files
            .iter()
            .find(|f| f.full_path == path)
            .cloned()
    }

    /// Resolve a public URL key back to its file record. The byte-streaming
    /// half of static serving lives outside the engine.
    pub fn font_file_by_url_key(&self, url_key: &str) -> Option<FontFile> {
        self.read()
            .font_files
            .iter()
            .find(|f| f.url_key == url_key)
            .cloned()
    }

    /// The atomic reconciliation unit: drop any stale record (and its faces)
    /// for this path, then insert the fresh record with its face set. Both
    /// halves happen under one write section so no query sees the gap.
    pub fn replace_file(&self, new: NewFontFile, faces: Vec<FaceInfo>) -> FontFile {
        let filename = new
            .full_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let ext = new
            .full_path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let url_key = identity::url_key_for(&new.content_hash, &filename);

        let mut state = self.write();

        let stale_hash = remove_file_at(&mut state, &new.full_path).map(|f| f.content_hash);

        let now = Utc::now();
        let record = FontFile {
            id: Uuid::new_v4(),
            category_id: new.category_id,
            full_path: new.full_path,
            rel_path: new.rel_path,
            filename,
            ext,
            size_bytes: new.size_bytes,
            mtime_ms: new.mtime_ms,
            content_hash: new.content_hash,
            url_key,
            duplicate_group: None,
            created_at: now,
        };

        for face in faces {
            state.font_faces.push(FontFace {
                id: Uuid::new_v4(),
                font_file_id: record.id,
                family: face.family,
                subfamily: face.subfamily,
                postscript_name: face.postscript_name,
                weight: face.weight,
                italic: face.italic,
                width: face.width,
                version: face.version,
                full_name: face.full_name,
                created_at: now,
            });
        }

        let hash = record.content_hash.clone();
        state.font_files.push(record.clone());
        refresh_duplicate_group(&mut state, &hash);
        if let Some(old_hash) = stale_hash.filter(|h| *h != hash) {
            refresh_duplicate_group(&mut state, &old_hash);
        }

        self.persist(&state);
        // Re-read so the returned record carries its duplicate_group.
        state
            .font_files
            .iter()
            .find(|f| f.id == record.id)
            .cloned()
            .unwrap_or(record)
    }

    /// Remove the file at `path` and its faces; used by watcher `remove`.
    pub fn delete_file_by_path(&self, path: &Path) -> bool {
        let mut state = self.write();
        let Some(removed) = remove_file_at(&mut state, path) else {
            return false;
        };
        refresh_duplicate_group(&mut state, &removed.content_hash);
        self.persist(&state);
        true
    }

    pub fn faces_of(&self, font_file_id: Uuid) -> Vec<FontFace> {
        self.read()
            .font_faces
            .iter()
            .filter(|face| face.font_file_id == font_file_id)
            .cloned()
            .collect()
    }

    /// Joined (face, file) snapshot the query engine folds over. Groupings
    /// are never cached across calls; every query recomputes from here.
    pub fn faces_with_files(&self) -> Vec<(FontFace, FontFile)> {
        let state = self.read();
        state
            .font_faces
            .iter()
            .filter_map(|face| {
                state
                    .font_files
                    .iter()
                    .find(|f| f.id == face.font_file_id)
                    .map(|file| (face.clone(), file.clone()))
            })
            .collect()
    }

    // --- favorites & collection membership ---

    /// Toggle a favorite mark; returns whether the target is favorited now.
    pub fn toggle_favorite(&self, kind: TargetKind, target_id: &str) -> bool {
        let mut state = self.write();
        let before = state.favorites.len();
        state
            .favorites
            .retain(|f| !(f.target_kind == kind && f.target_id == target_id));
        let is_favorite = if state.favorites.len() == before {
            state.favorites.push(Favorite {
                id: Uuid::new_v4(),
                target_kind: kind,
                target_id: target_id.to_string(),
                created_at: Utc::now(),
            });
            true
        } else {
            false
        };
        self.persist(&state);
        is_favorite
    }

    pub fn favorite_families(&self) -> HashSet<String> {
        self.read()
            .favorites
            .iter()
            .filter(|f| f.target_kind == TargetKind::Family)
            .map(|f| f.target_id.clone())
            .collect()
    }

    /// Add a membership row; adding an existing member is a no-op returning
    /// the row already present.
    pub fn add_collection_item(
        &self,
        collection_id: Uuid,
        kind: TargetKind,
        target_id: &str,
    ) -> CollectionItem {
        let mut state = self.write();
        if let Some(existing) = state.collection_items.iter().find(|i| {
            i.collection_id == collection_id && i.target_kind == kind && i.target_id == target_id
        }) {
            return existing.clone();
        }
        let item = CollectionItem {
            id: Uuid::new_v4(),
            collection_id,
            target_kind: kind,
            target_id: target_id.to_string(),
            created_at: Utc::now(),
        };
        state.collection_items.push(item.clone());
        self.persist(&state);
        item
    }

    pub fn remove_collection_item(
        &self,
        collection_id: Uuid,
        kind: TargetKind,
        target_id: &str,
    ) -> bool {
        let mut state = self.write();
        let before = state.collection_items.len();
        state.collection_items.retain(|i| {
            !(i.collection_id == collection_id
                && i.target_kind == kind
                && i.target_id == target_id)
        });
        let removed = state.collection_items.len() != before;
        if removed {
            self.persist(&state);
        }
        removed
    }

    /// Family names currently members of the given collection.
    pub fn collection_families(&self, collection_id: Uuid) -> HashSet<String> {
        self.read()
            .collection_items
            .iter()
            .filter(|i| i.collection_id == collection_id && i.target_kind == TargetKind::Family)
            .map(|i| i.target_id.clone())
            .collect()
    }

    /// Ids of collections containing the given family.
    pub fn collections_for_family(&self, family: &str) -> Vec<Uuid> {
        self.read()
            .collection_items
            .iter()
            .filter(|i| i.target_kind == TargetKind::Family && i.target_id == family)
            .map(|i| i.collection_id)
            .collect()
    }
}

fn remove_file_at(state: &mut State, path: &Path) -> Option<FontFile> {
    let idx = state.font_files.iter().position(|f| f.full_path == path)?;
    let removed = state.font_files.remove(idx);
    state
        .font_faces
        .retain(|face| face.font_file_id != removed.id);
    Some(removed)
}

// Keep duplicate_group consistent for one content hash: set on every file
// sharing the hash when at least two do, cleared on a sole survivor.
fn refresh_duplicate_group(state: &mut State, content_hash: &str) {
    let sharers = state
        .font_files
        .iter()
        .filter(|f| f.content_hash == content_hash)
        .count();
    let group = (sharers >= 2).then(|| content_hash.to_string());
    for file in state
        .font_files
        .iter_mut()
        .filter(|f| f.content_hash == content_hash)
    {
        file.duplicate_group = group.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_file(category_id: Uuid, path: &str, hash: &str) -> NewFontFile {
        NewFontFile {
            category_id,
            full_path: PathBuf::from(path),
            rel_path: PathBuf::from(Path::new(path).file_name().unwrap()),
            size_bytes: 10,
            mtime_ms: 1,
            content_hash: hash.to_string(),
        }
    }

    fn face(family: &str) -> FaceInfo {
        FaceInfo {
            family: family.to_string(),
            ..FaceInfo::default()
        }
    }

    #[test]
    fn add_category_is_idempotent_per_path() {
        let catalog = Catalog::in_memory();
        let a = catalog.add_category("Fonts", "/no/such/dir");
        let b = catalog.add_category("Fonts again", "/no/such/dir");

        assert_eq!(a.id, b.id);
        assert_eq!(catalog.categories().len(), 1);
    }

    #[test]
    fn delete_category_cascades_files_and_faces() {
        let catalog = Catalog::in_memory();
        let cat = catalog.add_category("Fonts", "/no/such/dir");
        let file = catalog.replace_file(new_file(cat.id, "/no/such/dir/a.ttf", "h1"), vec![face("A")]);

        assert!(catalog.delete_category(cat.id));
        assert!(catalog.font_file_by_path(Path::new("/no/such/dir/a.ttf")).is_none());
        assert!(catalog.faces_of(file.id).is_empty());
        assert!(catalog.faces_with_files().is_empty());
    }

    #[test]
    fn replace_file_swaps_record_and_faces() {
        let catalog = Catalog::in_memory();
        let cat = catalog.add_category("Fonts", "/no/such/dir");

        let first = catalog.replace_file(new_file(cat.id, "/no/such/dir/a.ttf", "h1"), vec![face("A")]);
        let old_faces: Vec<Uuid> = catalog.faces_of(first.id).iter().map(|f| f.id).collect();

        let second = catalog.replace_file(new_file(cat.id, "/no/such/dir/a.ttf", "h2"), vec![face("A")]);

        assert_ne!(first.id, second.id);
        assert!(catalog.faces_of(first.id).is_empty());
        let new_faces: Vec<Uuid> = catalog.faces_of(second.id).iter().map(|f| f.id).collect();
        assert_eq!(new_faces.len(), 1);
        assert!(old_faces.iter().all(|id| !new_faces.contains(id)));
    }

    #[test]
    fn duplicate_group_links_and_unlinks_identical_content() {
        let catalog = Catalog::in_memory();
        let cat = catalog.add_category("Fonts", "/no/such/dir");

        let a = catalog.replace_file(new_file(cat.id, "/no/such/dir/a.ttf", "same"), vec![]);
        assert_eq!(a.duplicate_group, None);

        let b = catalog.replace_file(new_file(cat.id, "/no/such/dir/b.ttf", "same"), vec![]);
        assert_eq!(b.duplicate_group.as_deref(), Some("same"));
        let a = catalog.font_file_by_path(Path::new("/no/such/dir/a.ttf")).unwrap();
        assert_eq!(a.duplicate_group.as_deref(), Some("same"));

        assert!(catalog.delete_file_by_path(Path::new("/no/such/dir/b.ttf")));
        let a = catalog.font_file_by_path(Path::new("/no/such/dir/a.ttf")).unwrap();
        assert_eq!(a.duplicate_group, None);
    }

    #[test]
    fn toggle_favorite_flips_membership() {
        let catalog = Catalog::in_memory();
        assert!(catalog.toggle_favorite(TargetKind::Family, "Inter"));
        assert!(catalog.favorite_families().contains("Inter"));
        assert!(!catalog.toggle_favorite(TargetKind::Family, "Inter"));
        assert!(catalog.favorite_families().is_empty());
    }

    #[test]
    fn collection_membership_round_trip() {
        let catalog = Catalog::in_memory();
        let coll = Uuid::new_v4();

        let item = catalog.add_collection_item(coll, TargetKind::Family, "Inter");
        let again = catalog.add_collection_item(coll, TargetKind::Family, "Inter");
        assert_eq!(item.id, again.id);

        assert!(catalog.collection_families(coll).contains("Inter"));
        assert_eq!(catalog.collections_for_family("Inter"), vec![coll]);

        assert!(catalog.remove_collection_item(coll, TargetKind::Family, "Inter"));
        assert!(catalog.collection_families(coll).is_empty());
    }

    #[test]
    fn snapshot_round_trips_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let snapshot = dir.path().join("catalog.json");

        let cat_id = {
            let catalog = Catalog::open(&snapshot).expect("open");
            let cat = catalog.add_category("Fonts", "/no/such/dir");
            catalog.replace_file(new_file(cat.id, "/no/such/dir/a.ttf", "h1"), vec![face("A")]);
            cat.id
        };

        let reopened = Catalog::open(&snapshot).expect("reopen");
        assert_eq!(reopened.category(cat_id).map(|c| c.name), Some("Fonts".to_string()));
        assert_eq!(reopened.stats().files, 1);
        assert_eq!(reopened.stats().faces, 1);
    }

    #[test]
    fn corrupt_snapshot_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let snapshot = dir.path().join("catalog.json");
        fs::write(&snapshot, b"{not json").expect("write");

        let catalog = Catalog::open(&snapshot).expect("open");
        assert_eq!(catalog.stats().files, 0);
    }
}
