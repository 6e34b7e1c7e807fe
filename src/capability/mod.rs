//! Native conversion capability
//!
//! The actual NCM decryption lives in the external `libncmdump` shared library.
//! This module exposes it through the [`Capability`] trait:
//!
//! - [`NativeLibrary`]: the installed library, loaded with `libloading`
//!
//! Handles follow a strict construct / use / destroy lifecycle; destruction happens
//! in `Drop`, so it is paired with construction even when a dump fails.

mod native;
mod traits;

pub use native::NativeLibrary;
pub use traits::{Capability, CapabilityHandle};
