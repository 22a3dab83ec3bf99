//! Query parameters for list and confirm endpoints.

use serde::Deserialize;

use avazon_types::avatar::{DEFAULT_PAGE_LIMIT, PageRequest};

/// `?page=&limit=&avatar_id=`
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub avatar_id: Option<String>,
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

impl ListQuery {
    pub fn page(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }

    pub fn avatar_id(&self) -> Option<&str> {
        self.avatar_id.as_deref()
    }
}

/// `?avatar_id=` naming the avatar to publish.
#[derive(Debug, Deserialize)]
pub struct AvatarIdQuery {
    pub avatar_id: String,
}

/// `?content_id=` naming the published music or video.
#[derive(Debug, Deserialize)]
pub struct ContentIdQuery {
    pub content_id: String,
}
