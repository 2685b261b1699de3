//! Raw document storage: bucketed page content plus JSON metadata sidecars.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Documents per bucket directory.
pub const BUCKET_SIZE: u64 = 1000;

const CONTENT_EXT: &str = ".txt";
const META_EXT: &str = ".meta.json";

/// Sidecar stored next to each raw page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub h1: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A raw content file found on disk and its sidecar, if one exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub content_path: PathBuf,
    pub meta_path: Option<PathBuf>,
}

pub struct RawPaths {
    pub root: PathBuf,
}

impl RawPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    /// `"{start:06}-{end:06}"` for the 1000-wide range holding `doc_number`.
    pub fn bucket_name(doc_number: u64) -> String {
        let start = (doc_number / BUCKET_SIZE) * BUCKET_SIZE;
        format!("{:06}-{:06}", start, start + BUCKET_SIZE - 1)
    }

    pub fn bucket_dir(&self, doc_number: u64) -> PathBuf {
        self.root.join(Self::bucket_name(doc_number))
    }

    pub fn content_path(&self, doc_number: u64) -> PathBuf {
        self.bucket_dir(doc_number).join(format!("{doc_number:06}{CONTENT_EXT}"))
    }

    pub fn meta_path(&self, doc_number: u64) -> PathBuf {
        self.bucket_dir(doc_number).join(format!("{doc_number:06}{META_EXT}"))
    }

    /// One past the highest numbered document already stored (1 when empty).
    pub fn next_doc_number(&self) -> u64 {
        let highest = self
            .list_documents()
            .iter()
            .filter_map(|d| doc_number_of(&d.content_path))
            .max()
            .unwrap_or(0);
        highest + 1
    }

    /// Write page content and its sidecar; returns the content path.
    pub fn save_document(&self, doc_number: u64, content: &str, meta: &DocMetadata) -> Result<PathBuf> {
        create_dir_all(self.bucket_dir(doc_number))
            .with_context(|| format!("creating bucket for document {doc_number}"))?;
        let content_path = self.content_path(doc_number);
        fs::write(&content_path, content)
            .with_context(|| format!("writing {}", content_path.display()))?;
        let json = serde_json::to_string_pretty(meta)?;
        fs::write(self.meta_path(doc_number), json)?;
        Ok(content_path)
    }

    /// Every raw content file below the root, sorted by path.
    pub fn list_documents(&self) -> Vec<RawDocument> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| is_content_file(p))
            .collect();
        files.sort();
        files
            .into_iter()
            .map(|content_path| {
                let meta = sidecar_path(&content_path);
                let meta_path = meta.is_file().then_some(meta);
                RawDocument { content_path, meta_path }
            })
            .collect()
    }
}

fn is_content_file(p: &Path) -> bool {
    p.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(CONTENT_EXT))
        .unwrap_or(false)
}

/// `000042.txt` -> `000042.meta.json`
pub fn sidecar_path(content_path: &Path) -> PathBuf {
    let name = content_path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let stem = name.strip_suffix(CONTENT_EXT).unwrap_or(name);
    content_path.with_file_name(format!("{stem}{META_EXT}"))
}

fn doc_number_of(content_path: &Path) -> Option<u64> {
    let name = content_path.file_name()?.to_str()?;
    name.strip_suffix(CONTENT_EXT)?.parse().ok()
}

/// Read a sidecar; missing or malformed files degrade to empty metadata.
pub fn load_metadata(path: Option<&Path>) -> DocMetadata {
    let Some(path) = path else { return DocMetadata::default() };
    match fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "malformed metadata sidecar");
            DocMetadata::default()
        }),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable metadata sidecar");
            DocMetadata::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn bucket_names_cover_thousand_wide_ranges() {
        assert_eq!(RawPaths::bucket_name(1), "000000-000999");
        assert_eq!(RawPaths::bucket_name(999), "000000-000999");
        assert_eq!(RawPaths::bucket_name(1000), "001000-001999");
        assert_eq!(RawPaths::bucket_name(123_456), "123000-123999");
    }

    #[test]
    fn numbering_continues_after_existing_documents() {
        let dir = tempdir().unwrap();
        let paths = RawPaths::new(dir.path());
        assert_eq!(paths.next_doc_number(), 1);
        let meta = DocMetadata { title: "t".into(), url: Some("http://a.com/".into()), ..Default::default() };
        paths.save_document(1, "<p>one</p>", &meta).unwrap();
        let p = paths.save_document(1000, "<p>k</p>", &meta).unwrap();
        assert!(p.ends_with("001000-001999/001000.txt"));
        assert_eq!(paths.next_doc_number(), 1001);

        let docs = paths.list_documents();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.meta_path.is_some()));
        assert_eq!(load_metadata(docs[0].meta_path.as_deref()), meta);
    }

    #[test]
    fn malformed_sidecar_is_empty_metadata() {
        let dir = tempdir().unwrap();
        let meta = dir.path().join("000001.meta.json");
        fs::write(&meta, "{not json").unwrap();
        assert_eq!(load_metadata(Some(&meta)), DocMetadata::default());
        assert_eq!(load_metadata(None), DocMetadata::default());
    }
}
