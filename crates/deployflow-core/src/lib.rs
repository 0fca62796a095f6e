//! Deployflow Core
//!
//! Models a managed deployment twice and converts between the two shapes.
//!
//! - **Flat model** ([`Block`]): the user-facing attribute tree with repeated
//!   sub-blocks, addressed by dotted paths such as `apm.0.topology.0.zone_count`.
//! - **Wire model** ([`wire`]): the nested plan/topology/configuration payloads
//!   exchanged with the remote control plane.
//!
//! ```text
//!            expand_create / expand_update
//!   Block ─────────────────────────────────▶ DeploymentCreateRequest
//!     ▲                                      DeploymentUpdateRequest
//!     │         flatten_deployment
//!     └──────────────────────────────────── DeploymentGetResponse
//! ```

pub mod attr;
pub mod defaults;
pub mod error;
pub mod expand;
pub mod flatten;
pub mod kind;
pub mod memory;
pub mod schema;
pub mod wire;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-exports
pub use attr::{AttrPath, AttrValue, Block, Scalar, Segment};
pub use defaults::{ExpandDefaults, TopologyDefaults};
pub use error::{ModelError, Result};
pub use expand::{expand_create, expand_update, payload_overrides};
pub use flatten::{flatten_config, flatten_deployment, flatten_resources};
pub use kind::ComponentKind;
pub use memory::{memory_to_state, parse_memory};
