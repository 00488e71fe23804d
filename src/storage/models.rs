use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file's JSON metadata. Any shape is accepted as long as the top level is
/// an object.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// The whole catalog: sanitized file name -> metadata object.
///
/// This is the on-disk format of the catalog file, so the shape must stay a
/// flat JSON object keyed by file name.
pub type MetadataCatalog = BTreeMap<String, Metadata>;

/// Size and modification time of a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    pub name: String,
    pub size: u64,
    #[serde(rename = "mtime", with = "chrono::serde::ts_seconds")]
    pub modified_at: DateTime<Utc>,
}

/// A stored file's stats combined with its metadata, as returned by listing
/// and upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    #[serde(rename = "mtime", with = "chrono::serde::ts_seconds")]
    pub modified_at: DateTime<Utc>,
    pub download_url: String,
    pub metadata: Metadata,
}

impl FileDescriptor {
    pub fn new(stat: FileStat, metadata: Metadata) -> Self {
        let download_url = download_url(&stat.name);
        Self {
            name: stat.name,
            size: stat.size,
            modified_at: stat.modified_at,
            download_url,
            metadata,
        }
    }
}

/// Relative URL the transport layer serves a file's content from.
pub fn download_url(name: &str) -> String {
    format!("/api/files/{name}/download")
}
