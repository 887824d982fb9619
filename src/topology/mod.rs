//! Descriptor record families. Each module owns the typed records for one
//! slice of the topology and knows how to synthesize them into template
//! resources; cross-family references go through the logical-id constants
//! the modules export.

pub mod api;
pub mod compute;
pub mod containers;
pub mod database;
pub mod iam;
pub mod network;
pub mod observability;
pub mod routing;
pub mod security;
pub mod storage;
