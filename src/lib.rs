//! Permnode: hierarchical permission nodes and the algebra over them.
//!
//! Permissions are dotted strings. A **node** such as `chat.kick` names one
//! right; a **group** such as `chat.*` covers everything beneath its prefix;
//! a leading `-` negates either. A **cluster** bundles nodes and groups under
//! one label and one sign. A [`PermissionCollection`] holds all three for a
//! single owner and keeps memoized, revision-stamped views over them.
//!
//! # Example
//!
//! ```
//! use permnode::{Outcome, Permission, PermissionCluster, PermissionCollection};
//!
//! let (mut bob, failed) = PermissionCollection::seeded("bob", vec!["chat.*", "-chat.ban.*"]);
//! assert!(failed.is_empty());
//!
//! let mut muted = PermissionCluster::new("-muted").unwrap();
//! muted.add_child("chat.say.global").unwrap();
//! bob.add(muted).unwrap();
//!
//! let check = |text: &str| bob.evaluate(&Permission::parse(text).unwrap());
//! assert_eq!(check("chat.say.local"), Outcome::Allow);
//! assert_eq!(check("chat.say.global"), Outcome::Deny);
//! assert_eq!(check("chat.ban.user"), Outcome::Deny);
//! assert_eq!(check("voice.join"), Outcome::Unknown);
//! ```

pub mod engine;

mod clean;
mod cluster;
mod collection;
mod entry;
mod error;
mod event;
mod group;
mod node;
mod outcome;
mod permission;

#[cfg(feature = "serde")]
mod serde_impl;

pub use cluster::{ChildInput, PermissionCluster};
pub use collection::PermissionCollection;
pub use engine::{Comparison, Kind, Side};
pub use entry::{EntryKind, Insertable, PermissionEntry, Removable, entry_order};
pub use error::{PermissionError, Result};
pub use event::{ChangeEvent, ChangeKind, ChangeListener, ListenerId};
pub use group::PermissionGroup;
pub use node::PermissionNode;
pub use outcome::Outcome;
pub use permission::Permission;
