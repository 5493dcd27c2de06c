#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use typdex_core::catalog::Catalog;
use typdex_core::parse::{FaceInfo, FaceParser, ParseError};
use typdex_core::scanner::Scanner;

/// Stand-in for real font containers: a tiny `key=value` line format with
/// `---` separating member faces, so a single file can act like a TTC
/// collection. Anything without a `family=` line is treated as malformed.
pub struct StubParser;

impl FaceParser for StubParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<FaceInfo>, ParseError> {
        let text =
            std::str::from_utf8(bytes).map_err(|_| ParseError("not utf-8".to_string()))?;

        let mut faces = Vec::new();
        for block in text.split("---") {
            let block = block.trim();
            if block.is_empty() {
                continue;
            }

            let mut face = FaceInfo::default();
            let mut saw_family = false;
            for line in block.lines() {
                let Some((key, value)) = line.split_once('=') else {
                    continue;
                };
                match key.trim() {
                    "family" => {
                        face.family = value.trim().to_string();
                        saw_family = true;
                    }
                    "subfamily" => face.subfamily = value.trim().to_string(),
                    "weight" => {
                        face.weight = value
                            .trim()
                            .parse()
                            .map_err(|_| ParseError("bad weight".to_string()))?;
                    }
                    "italic" => face.italic = value.trim() == "1",
                    _ => {}
                }
            }

            if !saw_family {
                return Err(ParseError("missing family".to_string()));
            }
            faces.push(face);
        }

        Ok(faces)
    }
}

/// Resolve symlinks the way the scanner sees paths (tempdirs are symlinked
/// on some platforms).
pub fn canon(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

pub fn scanner_with_stub() -> Arc<Scanner> {
    Arc::new(Scanner::new(
        Arc::new(Catalog::in_memory()),
        Arc::new(StubParser),
    ))
}

/// Write a single-face stub container under `dir`.
pub fn write_face(dir: &Path, name: &str, family: &str, subfamily: &str, weight: u16) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(
        &path,
        format!("family={family}\nsubfamily={subfamily}\nweight={weight}\n"),
    )
    .expect("write stub font");
    path
}

/// Write a multi-face stub container (collection semantics).
pub fn write_collection(dir: &Path, name: &str, families: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let body = families
        .iter()
        .map(|f| format!("family={f}\nsubfamily=Regular\nweight=400\n"))
        .collect::<Vec<_>>()
        .join("---\n");
    fs::write(&path, body).expect("write stub collection");
    path
}
