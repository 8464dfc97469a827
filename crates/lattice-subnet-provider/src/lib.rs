//! Subnet provider for Lattice node provisioning
//!
//! Resolves subnet selector terms into the concrete subnets nodes may launch
//! into, and derives whether public IP assignment must be disabled at launch.
//!
//! # Resolution Model
//!
//! ```text
//! terms ──► per-term key ──► TermCache hit? ──yes──► cached subnets ─┐
//!                                  │                                 ├─► union by ID
//!                                  └─no─► SubnetClient ─► ID ∩ tags ─┘
//!                                               (result cached per term)
//! ```
//!
//! Terms combine with OR; the ID and tags inside one term combine with AND.
//! A tag key or value of `*` matches anything in that position.

#![deny(missing_docs)]

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
mod monitor;
pub mod provider;
pub mod selector;
pub mod subnet;
pub mod telemetry;

pub use cache::{CacheEntry, TermCache, DEFAULT_CACHE_TTL};
pub use client::{StaticSubnetClient, SubnetClient, SubnetFilter};
pub use config::{EnvSource, OsEnv, SubnetProviderConfig};
pub use error::{Error, Result};
pub use provider::SubnetProvider;
pub use selector::{
    tags_match, SelectorTermKey, SubnetSelectorTerm, TagConstraint, TagPattern, WILDCARD,
};
pub use subnet::{Subnet, SubnetStatus, Tag, ZonalSubnet};
pub use telemetry::{init_logging, LoggingConfig};
