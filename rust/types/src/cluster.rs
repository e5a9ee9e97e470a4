use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registration unit that instances join.
///
/// `id` and `created_at` are never client supplied: the backend overwrites
/// both on create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub creator_ip: String,
    pub creator_user_agent: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Cluster {
    pub fn new(creator_ip: impl Into<String>, creator_user_agent: impl Into<String>) -> Self {
        Cluster {
            creator_ip: creator_ip.into(),
            creator_user_agent: creator_user_agent.into(),
            ..Default::default()
        }
    }
}
