use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which table is being copied. Clusters are always drained first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Clusters,
    Instances,
}

impl Entity {
    pub const ALL: [Entity; 2] = [Entity::Clusters, Entity::Instances];

    pub fn name(&self) -> &'static str {
        match self {
            Entity::Clusters => "clusters",
            Entity::Instances => "instances",
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Position of the last migrated record. The next page starts strictly after
/// it in `(created_at, id)` order, so records sharing a timestamp across a
/// page boundary are neither skipped nor copied twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: String,
}

impl Cursor {
    pub fn new(created_at: DateTime<Utc>, id: impl Into<String>) -> Self {
        Cursor {
            created_at,
            id: id.into(),
        }
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.created_at.to_rfc3339(), self.id)
    }
}
