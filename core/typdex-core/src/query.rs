//! Family-level search over the catalog (made by FontLab https://www.fontlab.com/)
//!
//! Families are a derived grouping key, a fold over `FontFace.family` at
//! query time, never a stored entity that could drift out of sync with the
//! face rows.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{Catalog, FontFace, FontFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Families ordered by their most recently indexed face, newest first.
    #[default]
    Recent,
    /// Case-insensitive ascending family name.
    NameAsc,
}

/// Typed, pre-validated search parameters; the transport layer that parses
/// them out of a request lives outside the engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Case-insensitive substring over family, subfamily and filename.
    pub q: Option<String>,
    pub category_id: Option<Uuid>,
    pub collection_id: Option<Uuid>,
    pub favorites: bool,
    /// Extension allow-list; empty means any.
    pub extensions: Vec<String>,
    pub italic: Option<bool>,
    pub weight_min: Option<u16>,
    pub weight_max: Option<u16>,
    pub sort: SortKey,
    pub limit: usize,
    pub offset: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            q: None,
            category_id: None,
            collection_id: None,
            favorites: false,
            extensions: Vec::new(),
            italic: None,
            weight_min: None,
            weight_max: None,
            sort: SortKey::default(),
            limit: 50,
            offset: 0,
        }
    }
}

/// One face joined to the file it was extracted from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceHit {
    #[serde(flatten)]
    pub face: FontFace,
    pub file: FontFile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyGroup {
    pub family: String,
    pub faces: Vec<FaceHit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub items: Vec<FamilyGroup>,
    /// Matching family count before pagination.
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyRecord {
    pub family: String,
    pub faces: Vec<FaceHit>,
    /// Ids of collections this family is a member of.
    pub collections: Vec<Uuid>,
}

/// Filter, group, sort and paginate the catalog into family aggregates.
pub fn search_fonts(catalog: &Catalog, params: &SearchParams) -> SearchResults {
    let mut rows: Vec<(FontFace, FontFile)> = catalog
        .faces_with_files()
        .into_iter()
        .filter(|(face, file)| face_matches(face, file, params))
        .collect();

    // Set-membership predicates: a family survives when any of its faces
    // passed the flat filter and the family name is in the requested set.
    if params.favorites {
        let favorites = catalog.favorite_families();
        rows.retain(|(face, _)| favorites.contains(&face.family));
    }
    if let Some(collection_id) = params.collection_id {
        let members = catalog.collection_families(collection_id);
        rows.retain(|(face, _)| members.contains(&face.family));
    }

    // Group by the exact family string, keeping first-seen order so the
    // recency sort's tie-break stays the natural grouping order.
    let mut families: Vec<FamilyGroup> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();
    for (face, file) in rows {
        let slot = *slots.entry(face.family.clone()).or_insert_with(|| {
            families.push(FamilyGroup {
                family: face.family.clone(),
                faces: Vec::new(),
            });
            families.len() - 1
        });
        families[slot].faces.push(FaceHit { face, file });
    }

    match params.sort {
        SortKey::NameAsc => {
            families.sort_by(|a, b| a.family.to_lowercase().cmp(&b.family.to_lowercase()));
        }
        // Stable sort: families sharing a newest-face instant keep their
        // grouping order, no secondary key.
        SortKey::Recent => {
            families.sort_by_key(|group| std::cmp::Reverse(newest_face(group)));
        }
    }

    let total = families.len();
    let items = families
        .into_iter()
        .skip(params.offset)
        .take(params.limit)
        .collect();

    SearchResults { items, total }
}

/// Exact-match family lookup across every file, with the collections the
/// family belongs to. `None` when no face carries the name.
pub fn font_family(catalog: &Catalog, family: &str) -> Option<FamilyRecord> {
    let faces: Vec<FaceHit> = catalog
        .faces_with_files()
        .into_iter()
        .filter(|(face, _)| face.family == family)
        .map(|(face, file)| FaceHit { face, file })
        .collect();

    if faces.is_empty() {
        return None;
    }

    Some(FamilyRecord {
        family: family.to_string(),
        faces,
        collections: catalog.collections_for_family(family),
    })
}

fn face_matches(face: &FontFace, file: &FontFile, params: &SearchParams) -> bool {
    if let Some(q) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let needle = q.to_lowercase();
        let hit = face.family.to_lowercase().contains(&needle)
            || face.subfamily.to_lowercase().contains(&needle)
            || file.filename.to_lowercase().contains(&needle);
        if !hit {
            return false;
        }
    }

    if let Some(category_id) = params.category_id {
        if file.category_id != category_id {
            return false;
        }
    }

    if !params.extensions.is_empty()
        && !params
            .extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(&file.ext))
    {
        return false;
    }

    if let Some(italic) = params.italic {
        if face.italic != italic {
            return false;
        }
    }

    if let Some(min) = params.weight_min {
        if face.weight < min {
            return false;
        }
    }
    if let Some(max) = params.weight_max {
        if face.weight > max {
            return false;
        }
    }

    true
}

fn newest_face(group: &FamilyGroup) -> DateTime<Utc> {
    group
        .faces
        .iter()
        .map(|hit| hit.face.created_at)
        .max()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
