//! NodeInfo documents
//!
//! Discovery document served at `/.well-known/nodeinfo` and the NodeInfo 2.0
//! document it points to.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::data::UsageStats;
use crate::error::AppError;

pub const NODEINFO_2_0_SCHEMA: &str = "http://nodeinfo.diaspora.software/ns/schema/2.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfoLinks {
    pub links: Vec<NodeInfoLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfoLink {
    pub rel: String,
    pub href: String,
}

/// NodeInfo 2.0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub version: String,
    pub software: NodeInfoSoftware,
    pub protocols: Vec<String>,
    pub services: NodeInfoServices,
    pub open_registrations: bool,
    pub usage: NodeInfoUsage,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfoSoftware {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeInfoServices {
    pub inbound: Vec<String>,
    pub outbound: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfoUsage {
    pub users: NodeInfoUsers,
    pub local_posts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfoUsers {
    pub total: i64,
}

/// Builds nodeinfo documents from instance usage numbers
pub struct NodeInfoSource {
    stats: Arc<dyn UsageStats>,
}

impl NodeInfoSource {
    pub fn new(stats: Arc<dyn UsageStats>) -> Self {
        Self { stats }
    }

    pub fn well_known(&self, base_url: &str) -> NodeInfoLinks {
        NodeInfoLinks {
            links: vec![NodeInfoLink {
                rel: NODEINFO_2_0_SCHEMA.to_string(),
                href: format!("{}/nodeinfo/2.0", base_url.trim_end_matches('/')),
            }],
        }
    }

    pub async fn document(&self) -> Result<NodeInfo, AppError> {
        Ok(NodeInfo {
            version: "2.0".to_string(),
            software: NodeInfoSoftware {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            protocols: vec!["activitypub".to_string()],
            services: NodeInfoServices::default(),
            open_registrations: false,
            usage: NodeInfoUsage {
                users: NodeInfoUsers {
                    total: self.stats.local_user_count().await?,
                },
                local_posts: self.stats.local_post_count().await?,
            },
            metadata: serde_json::Map::new(),
        })
    }
}
