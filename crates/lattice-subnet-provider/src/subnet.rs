//! Subnet data as reported by the cloud and as persisted on node classes

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A key/value tag attached to a subnet
///
/// Tags without a value carry an empty string.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub struct Tag {
    /// Tag key
    pub key: String,
    /// Tag value
    #[serde(default)]
    pub value: String,
}

impl Tag {
    /// Create a tag
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A cloud subnet
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    /// Subnet ID (e.g., "subnet-0a1b2c3d"), unique within an account and region
    pub id: String,

    /// Availability zone the subnet lives in (e.g., "us-west-2a")
    pub availability_zone: String,

    /// Number of unused private IPv4 addresses
    pub available_ip_count: u64,

    /// Whether instances launched into this subnet get a public IPv4 address by default
    #[serde(default)]
    pub map_public_ip_on_launch: bool,

    /// Tags in the order the cloud reported them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

impl Subnet {
    /// Value of the first tag with the given key
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }
}

/// A subnet entry in a node class status
///
/// Written by the node class reconciler after a successful resolution;
/// read-only here.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct SubnetStatus {
    /// Subnet ID
    pub id: String,
    /// Availability zone
    pub zone: String,
}

impl From<&Subnet> for SubnetStatus {
    fn from(subnet: &Subnet) -> Self {
        Self {
            id: subnet.id.clone(),
            zone: subnet.availability_zone.clone(),
        }
    }
}

/// The subnet chosen for launches in one availability zone
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ZonalSubnet {
    /// Subnet ID
    pub id: String,
    /// Availability zone
    pub zone: String,
    /// Available IPs at selection time, including in-flight predictions
    pub available_ip_count: u64,
    /// Epoch of the in-flight reservation made for this offer; refunds only
    /// apply while the subnet's prediction still carries it
    #[serde(default)]
    pub reservation_epoch: u64,
}
