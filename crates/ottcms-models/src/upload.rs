//! Multipart upload planning.
//!
//! Splits a file into parts that respect object-storage limits and checks
//! client-reported part lists before completion.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error_code::{DomainError, DomainResult, ErrorCode};

pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * MIB;

/// Part sizing limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartSizing {
    pub min_part_size: u64,
    pub max_part_size: u64,
    pub target_part_size: u64,
    pub max_parts: u32,
}

impl Default for PartSizing {
    fn default() -> Self {
        Self {
            min_part_size: 5 * MIB,
            max_part_size: 5 * GIB,
            target_part_size: 100 * MIB,
            max_parts: 10_000,
        }
    }
}

impl PartSizing {
    /// Load from environment, falling back to defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            min_part_size: env_u64("UPLOAD_MIN_PART_SIZE", d.min_part_size),
            max_part_size: env_u64("UPLOAD_MAX_PART_SIZE", d.max_part_size),
            target_part_size: env_u64("UPLOAD_TARGET_PART_SIZE", d.target_part_size),
            max_parts: std::env::var("UPLOAD_MAX_PARTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.max_parts),
        }
    }

    /// Reject limits that cannot produce a plan: `1 <= min <= target <= max`
    /// and at least one part.
    pub fn validate(&self) -> DomainResult<()> {
        let problem = if self.min_part_size == 0 {
            Some("minimum part size must be at least 1 byte".to_string())
        } else if self.min_part_size > self.max_part_size {
            Some(format!(
                "minimum part size {} exceeds maximum {}",
                self.min_part_size, self.max_part_size
            ))
        } else if !(self.min_part_size..=self.max_part_size).contains(&self.target_part_size) {
            Some(format!(
                "target part size {} outside {}..={}",
                self.target_part_size, self.min_part_size, self.max_part_size
            ))
        } else if self.max_parts == 0 {
            Some("part limit must be at least 1".to_string())
        } else {
            None
        };
        match problem {
            Some(detail) => Err(DomainError::new(ErrorCode::Internal, format!("part sizing: {detail}"))),
            None => Ok(()),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Result of [`plan_parts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartPlan {
    pub file_size: u64,
    pub part_size: u64,
    pub part_count: u32,
}

impl PartPlan {
    /// Size of a 1-based part.
    pub fn size_of(&self, part_number: u32) -> u64 {
        if part_number == 0 || part_number > self.part_count {
            return 0;
        }
        if part_number < self.part_count {
            self.part_size
        } else {
            self.file_size - self.part_size * u64::from(self.part_count - 1)
        }
    }

    /// `(part_number, size)` for every part.
    pub fn parts(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        (1..=self.part_count).map(move |n| (n, self.size_of(n)))
    }
}

pub fn plan_parts(file_size: u64, sizing: &PartSizing) -> DomainResult<PartPlan> {
    if file_size == 0 {
        return Err(DomainError::invalid_upload("file size must be greater than zero"));
    }
    sizing.validate()?;
    let max_parts = u64::from(sizing.max_parts);
    let needed = file_size.div_ceil(max_parts);
    let part_size = sizing
        .target_part_size
        .max(needed)
        .clamp(sizing.min_part_size, sizing.max_part_size);
    let part_count = file_size.div_ceil(part_size);
    if part_count > max_parts {
        return Err(DomainError::new(
            ErrorCode::FileTooLarge,
            format!("file of {file_size} bytes needs {part_count} parts, limit is {max_parts}"),
        ));
    }
    Ok(PartPlan {
        file_size,
        part_size,
        part_count: part_count as u32,
    })
}

/// Part reported by the client after uploading it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

/// Check a completion list and return it sorted by part number.
pub fn validate_completed_parts(mut parts: Vec<CompletedPart>, part_count: u32) -> DomainResult<Vec<CompletedPart>> {
    if parts.is_empty() {
        return Err(DomainError::invalid_upload("no parts supplied"));
    }
    let mut seen = HashSet::with_capacity(parts.len());
    for part in &parts {
        if part.part_number == 0 || part.part_number > part_count {
            return Err(DomainError::invalid_upload(format!(
                "part number {} outside 1..={part_count}",
                part.part_number
            )));
        }
        if part.etag.trim().is_empty() {
            return Err(DomainError::invalid_upload(format!("part {} has no etag", part.part_number)));
        }
        if !seen.insert(part.part_number) {
            return Err(DomainError::invalid_upload(format!("duplicate part number {}", part.part_number)));
        }
    }
    parts.sort_by_key(|p| p.part_number);
    Ok(parts)
}

/// Reduce a client file name to a safe storage key segment.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

pub fn raw_media_key(media_id: &str, file_name: &str) -> String {
    format!("raw-media/{}/{}", media_id, sanitize_file_name(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_gib_uses_target_part_size() {
        let plan = plan_parts(10 * GIB, &PartSizing::default()).unwrap();
        assert_eq!(plan.part_size, 100 * MIB);
        assert_eq!(plan.part_count, 103);
        assert!(plan.size_of(103) <= plan.part_size);
        let total: u64 = plan.parts().map(|(_, s)| s).sum();
        assert_eq!(total, 10 * GIB);
    }

    #[test]
    fn small_file_is_single_part() {
        let plan = plan_parts(1024, &PartSizing::default()).unwrap();
        assert_eq!(plan.part_count, 1);
        assert_eq!(plan.size_of(1), 1024);
        assert_eq!(plan.size_of(2), 0);
    }

    #[test]
    fn part_size_grows_to_respect_max_parts() {
        let sizing = PartSizing::default();
        let size = 2_000 * GIB;
        let plan = plan_parts(size, &sizing).unwrap();
        assert!(plan.part_count <= sizing.max_parts);
        assert!(plan.part_size >= sizing.min_part_size && plan.part_size <= sizing.max_part_size);
    }

    #[test]
    fn part_count_never_exceeds_max() {
        let sizing = PartSizing {
            min_part_size: 5 * MIB,
            max_part_size: 5 * GIB,
            target_part_size: 5 * MIB,
            max_parts: 20,
        };
        for size in [1, 5 * MIB, 99 * MIB + 7, 10 * GIB, 50 * GIB] {
            let plan = plan_parts(size, &sizing).unwrap();
            assert!(plan.part_count <= 20, "size {size}");
            for (n, s) in plan.parts() {
                if n < plan.part_count {
                    assert_eq!(s, plan.part_size);
                }
            }
        }
    }

    #[test]
    fn rejects_empty_and_oversized() {
        assert_eq!(plan_parts(0, &PartSizing::default()).unwrap_err().code, ErrorCode::InvalidUpload);
        let sizing = PartSizing {
            max_parts: 2,
            max_part_size: 10 * MIB,
            ..PartSizing::default()
        };
        assert_eq!(plan_parts(100 * MIB, &sizing).unwrap_err().code, ErrorCode::FileTooLarge);
    }

    #[test]
    fn inverted_limits_are_an_error_not_a_panic() {
        let inverted = PartSizing {
            min_part_size: 10 * MIB,
            max_part_size: 5 * MIB,
            target_part_size: 8 * MIB,
            max_parts: 100,
        };
        assert_eq!(inverted.validate().unwrap_err().code, ErrorCode::Internal);
        assert_eq!(plan_parts(GIB, &inverted).unwrap_err().code, ErrorCode::Internal);

        let bad = [
            PartSizing { min_part_size: 0, ..PartSizing::default() },
            PartSizing { target_part_size: GIB * 10, ..PartSizing::default() },
            PartSizing { target_part_size: MIB, ..PartSizing::default() },
            PartSizing { max_parts: 0, ..PartSizing::default() },
        ];
        for sizing in bad {
            assert!(sizing.validate().is_err(), "{sizing:?}");
            assert!(plan_parts(MIB, &sizing).is_err(), "{sizing:?}");
        }
        assert!(PartSizing::default().validate().is_ok());
    }

    #[test]
    fn completed_parts_are_validated_and_sorted() {
        let parts = vec![
            CompletedPart { part_number: 2, etag: "b".into() },
            CompletedPart { part_number: 1, etag: "a".into() },
        ];
        let sorted = validate_completed_parts(parts, 2).unwrap();
        assert_eq!(sorted[0].part_number, 1);

        let dup = vec![
            CompletedPart { part_number: 1, etag: "a".into() },
            CompletedPart { part_number: 1, etag: "a".into() },
        ];
        assert!(validate_completed_parts(dup, 2).is_err());
        let out_of_range = vec![CompletedPart { part_number: 3, etag: "c".into() }];
        assert!(validate_completed_parts(out_of_range, 2).is_err());
        assert!(validate_completed_parts(vec![], 2).is_err());
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("My Movie (final).mp4"), "My_Movie__final_.mp4");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name(".."), "file");
        assert_eq!(raw_media_key("m1", "a b.mov"), "raw-media/m1/a_b.mov");
    }
}
