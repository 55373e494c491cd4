//! Google Drive link parsing.
//!
//! Supports:
//! - https://drive.google.com/file/d/FILE_ID/view
//! - https://drive.google.com/drive/folders/FOLDER_ID
//! - https://drive.google.com/drive/u/0/folders/FOLDER_ID
//! - https://drive.google.com/open?id=ID
//! - https://drive.google.com/uc?id=ID&export=download
//! - a bare ID

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

use crate::error_code::{DomainError, DomainResult, ErrorCode};

/// A parsed Drive reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DriveLink {
    File(String),
    Folder(String),
    /// Bare id or `open?id=`; the kind is resolved from metadata.
    Unknown(String),
}

impl DriveLink {
    pub fn id(&self) -> &str {
        match self {
            DriveLink::File(id) | DriveLink::Folder(id) | DriveLink::Unknown(id) => id,
        }
    }
}

pub fn parse_drive_link(input: &str) -> DomainResult<DriveLink> {
    let input = input.trim();
    if input.is_empty() {
        return Err(invalid(input));
    }

    if !input.contains("://") {
        return validate_id(input).map(DriveLink::Unknown);
    }

    let url = Url::parse(input).map_err(|_| invalid(input))?;
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    if host != "drive.google.com" && host != "docs.google.com" {
        return Err(invalid(input));
    }

    if let Some(link) = from_path(&url) {
        return link;
    }

    let query_id = url
        .query_pairs()
        .find(|(k, _)| k == "id")
        .map(|(_, v)| v.into_owned());
    match (url.path(), query_id) {
        ("/open", Some(id)) => validate_id(&id).map(DriveLink::Unknown),
        ("/uc", Some(id)) => validate_id(&id).map(DriveLink::File),
        _ => Err(invalid(input)),
    }
}

fn from_path(url: &Url) -> Option<DomainResult<DriveLink>> {
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    for window in segments.windows(2) {
        match window {
            ["d", id] => return Some(validate_id(id).map(DriveLink::File)),
            ["folders", id] => return Some(validate_id(id).map(DriveLink::Folder)),
            _ => {}
        }
    }
    None
}

fn validate_id(id: &str) -> DomainResult<String> {
    let valid = id.len() >= 10
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(id.to_string())
    } else {
        Err(invalid(id))
    }
}

fn invalid(input: &str) -> DomainError {
    DomainError::new(ErrorCode::InvalidDriveLink, format!("not a Google Drive link: {input}"))
}

/// Drop repeated items by key, keeping the first occurrence.
pub fn dedupe_by_key<T, K, F>(items: Vec<T>, mut key: F) -> Vec<T>
where
    K: std::hash::Hash + Eq,
    F: FnMut(&T) -> K,
{
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(key(item))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "1AbCdEfGhIjKlMnOp_-xyz";

    #[test]
    fn parses_file_links() {
        let url = format!("https://drive.google.com/file/d/{ID}/view?usp=sharing");
        assert_eq!(parse_drive_link(&url).unwrap(), DriveLink::File(ID.into()));
        let url = format!("https://drive.google.com/uc?id={ID}&export=download");
        assert_eq!(parse_drive_link(&url).unwrap(), DriveLink::File(ID.into()));
    }

    #[test]
    fn parses_folder_links() {
        let url = format!("https://drive.google.com/drive/folders/{ID}");
        assert_eq!(parse_drive_link(&url).unwrap(), DriveLink::Folder(ID.into()));
        let url = format!("https://drive.google.com/drive/u/1/folders/{ID}?usp=drive_link");
        assert_eq!(parse_drive_link(&url).unwrap(), DriveLink::Folder(ID.into()));
    }

    #[test]
    fn parses_open_and_bare_ids() {
        let url = format!("https://drive.google.com/open?id={ID}");
        assert_eq!(parse_drive_link(&url).unwrap(), DriveLink::Unknown(ID.into()));
        assert_eq!(parse_drive_link(ID).unwrap(), DriveLink::Unknown(ID.into()));
    }

    #[test]
    fn rejects_other_links() {
        for bad in [
            "",
            "https://youtube.com/watch?v=abc",
            "https://drive.google.com/drive/my-drive",
            "short",
            "https://drive.google.com/file/d/bad id/view",
        ] {
            assert_eq!(parse_drive_link(bad).unwrap_err().code, ErrorCode::InvalidDriveLink, "{bad}");
        }
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let items = vec![("a", 1), ("b", 2), ("a", 3), ("c", 4), ("b", 5)];
        let out = dedupe_by_key(items, |(k, _)| *k);
        assert_eq!(out, vec![("a", 1), ("b", 2), ("c", 4)]);
    }
}
