//! Post, snapshot and team-assignment types shared by the ledger and the
//! account-manager aggregator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Platform a post was published on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Tiktok,
    Instagram,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Tiktok => write!(f, "tiktok"),
            Platform::Instagram => write!(f, "instagram"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tiktok" => Ok(Platform::Tiktok),
            "instagram" => Ok(Platform::Instagram),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}

/// Admin-controlled review status of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostStatus::Pending => write!(f, "pending"),
            PostStatus::Approved => write!(f, "approved"),
            PostStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PostStatus::Pending),
            "approved" => Ok(PostStatus::Approved),
            "rejected" => Ok(PostStatus::Rejected),
            _ => Err(format!("Unknown post status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    UgcVideo,
    Slideshow,
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::UgcVideo => write!(f, "ugc_video"),
            ContentType::Slideshow => write!(f, "slideshow"),
        }
    }
}

impl std::str::FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ugc_video" => Ok(ContentType::UgcVideo),
            "slideshow" => Ok(ContentType::Slideshow),
            _ => Err(format!("Unknown content type: {}", s)),
        }
    }
}

/// A submitted post as seen by the ledger and the aggregator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: Uuid,
    pub submitted_by: Uuid,
    pub account_id: Option<Uuid>,
    pub platform: Platform,
    pub status: PostStatus,
    pub content_type: ContentType,
    pub created_at: DateTime<Utc>,
}

impl PostRecord {
    pub fn is_approved(&self) -> bool {
        self.status == PostStatus::Approved
    }
}

/// One fetched measurement of a post's raw cumulative counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSnapshot {
    pub post_id: Uuid,
    pub views: i64,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub comments: i64,
    pub fetched_at: DateTime<Utc>,
}

/// Account manager to team pairing with the accounts operated for that team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamAssignment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub team_name: String,
    pub tiktok_account_id: Option<Uuid>,
    pub instagram_account_id: Option<Uuid>,
}

impl TeamAssignment {
    /// Accounts whose posts belong to this team
    pub fn account_ids(&self) -> Vec<Uuid> {
        [self.tiktok_account_id, self.instagram_account_id]
            .into_iter()
            .flatten()
            .collect()
    }
}
