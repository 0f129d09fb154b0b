//! Virtual network and private link adapters.
//!
//! Two resource types share this crate because their lifecycles are
//! coupled: a private link exists inside a virtual network, and the
//! remote side refuses to delete a link while anything is still bound to
//! it. That refusal is transient (bindings drain on their own), which is
//! why private link deletes go through the retry executor.

pub mod private_link;
pub mod virtual_network;

pub use private_link::{PrivateLinkAdapter, PrivateLinkSpec, PrivateLinkState};
pub use virtual_network::{VirtualNetworkAdapter, VirtualNetworkSpec, VirtualNetworkState};
