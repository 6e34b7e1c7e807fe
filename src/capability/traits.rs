//! Traits for the native conversion capability

use std::path::Path;

/// The external transform capability
///
/// Implementations wrap whatever actually decrypts NCM files. The batch runner only
/// ever goes through this trait, one item at a time.
///
/// # Examples
///
/// ```no_run
/// use ncmdump_sync::capability::{Capability, NativeLibrary};
/// use std::path::Path;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let library = NativeLibrary::new("./libncmdump.so".into());
/// if library.is_present() {
///     let mut handle = library.open(Path::new("song.ncm"))?;
///     let code = handle.dump(Path::new("out"))?;
///     println!("dump returned {}", code);
/// } // handle destroyed here
/// # Ok(())
/// # }
/// ```
pub trait Capability: Send + Sync {
    /// Human-readable name for logging
    fn name(&self) -> &'static str;

    /// Whether the capability can be invoked right now
    ///
    /// Checked at the start of every batch run and before every item, so a library
    /// installed after startup is picked up.
    fn is_present(&self) -> bool;

    /// Construct a handle for one input file
    ///
    /// The handle is destroyed when dropped, on every exit path.
    fn open(&self, input: &Path) -> crate::Result<Box<dyn CapabilityHandle + '_>>;
}

/// A live handle for one input file
pub trait CapabilityHandle {
    /// Write the converted output into `output_dir`; 0 means success
    fn dump(&mut self, output_dir: &Path) -> crate::Result<i32>;

    /// Repair tags and cover art of the written output
    fn fix_metadata(&mut self);
}
