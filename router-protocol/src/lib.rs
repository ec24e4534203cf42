//! Per-family wire-protocol identity: which HTTP paths a family's endpoints
//! live at, and the shared shape consumed by every model-listing response.

mod descriptor;
mod error;
mod tags;

pub use descriptor::{Descriptor, Family};
pub use error::ProtocolError;
pub use tags::{ModelDescriptor, tags};
