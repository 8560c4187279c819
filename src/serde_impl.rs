//! `serde` support, enabled by the `serde` feature.
//!
//! Nodes, groups and permissions travel as their signed text. A cluster is an
//! object `{"cluster": "-label", "children": [...]}`, and an entry accepts
//! either shape.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::cluster::PermissionCluster;
use crate::entry::PermissionEntry;
use crate::group::PermissionGroup;
use crate::node::PermissionNode;
use crate::permission::Permission;

macro_rules! serde_as_text {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Serialize for $ty {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.collect_str(self)
                }
            }

            impl<'de> Deserialize<'de> for $ty {
                fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                    let text = String::deserialize(deserializer)?;
                    text.parse().map_err(de::Error::custom)
                }
            }
        )*
    };
}

serde_as_text!(PermissionNode, PermissionGroup, Permission);

#[derive(Serialize)]
struct ClusterOut<'a> {
    cluster: String,
    children: &'a [Permission],
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ClusterRaw {
    cluster: String,
    #[serde(default)]
    children: Vec<Permission>,
}

impl ClusterRaw {
    fn into_cluster<E: de::Error>(self) -> Result<PermissionCluster, E> {
        let mut cluster = PermissionCluster::new(&self.cluster).map_err(E::custom)?;
        cluster.add_child(self.children).map_err(E::custom)?;
        Ok(cluster)
    }
}

impl Serialize for PermissionCluster {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ClusterOut {
            cluster: self.to_string(),
            children: self.children(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PermissionCluster {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ClusterRaw::deserialize(deserializer)?.into_cluster()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EntryRaw {
    Text(String),
    Cluster(ClusterRaw),
}

impl Serialize for PermissionEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PermissionEntry::Node(node) => node.serialize(serializer),
            PermissionEntry::Group(group) => group.serialize(serializer),
            PermissionEntry::Cluster(cluster) => cluster.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for PermissionEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match EntryRaw::deserialize(deserializer)? {
            EntryRaw::Text(text) => PermissionEntry::parse(&text).map_err(de::Error::custom),
            EntryRaw::Cluster(raw) => raw.into_cluster().map(PermissionEntry::Cluster),
        }
    }
}
