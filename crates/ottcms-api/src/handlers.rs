//! Request handlers.

pub mod content;
pub mod drive;
pub mod health;
pub mod monetization;
pub mod posters;
pub mod transcoding;
pub mod uploads;

pub use content::*;
pub use drive::*;
pub use health::*;
pub use monetization::*;
pub use posters::*;
pub use transcoding::*;
pub use uploads::*;

use serde::Deserialize;

use ottcms_models::PageParams;

use crate::error::ApiResult;
use crate::security::check_id;

/// Query string accepted by list endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<String>,
}

impl ListQuery {
    pub fn params(&self) -> PageParams {
        PageParams {
            page: self.page,
            per_page: self.per_page,
        }
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Validate a raw path segment and wrap it in its id type.
pub(crate) fn path_id<T: From<String>>(kind: &str, raw: String) -> ApiResult<T> {
    check_id(kind, &raw)?;
    Ok(T::from(raw))
}
