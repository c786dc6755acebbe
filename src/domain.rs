use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MirrorError;

/// Remote-assigned NDEx network identifier.
///
/// Used verbatim as a URL path segment and as the object key, so it may not be
/// empty or contain `/` or whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NetworkId(String);

impl NetworkId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NetworkId {
    type Err = MirrorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid = !normalized.is_empty()
            && !normalized
                .chars()
                .any(|ch| ch == '/' || ch.is_whitespace() || ch.is_control());
        if !is_valid {
            return Err(MirrorError::InvalidNetworkId(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

impl TryFrom<String> for NetworkId {
    type Error = MirrorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NetworkId> for String {
    fn from(value: NetworkId) -> Self {
        value.0
    }
}

/// One manifest entry. Field order here is the on-disk field order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDescriptor {
    pub id: NetworkId,
    pub name: String,
    pub node_count: u64,
    pub edge_count: u64,
}

/// A single fetch-then-upload unit of work.
#[derive(Debug, Clone)]
pub struct TransferTask {
    pub index: usize,
    pub id: NetworkId,
    pub name: String,
}

impl TransferTask {
    pub fn new(index: usize, descriptor: &NetworkDescriptor) -> Self {
        Self {
            index,
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
        }
    }
}
