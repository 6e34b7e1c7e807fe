//! `libncmdump` loaded as a shared library

use super::traits::{Capability, CapabilityHandle};
use crate::error::{Error, Result};
use libloading::Library;
use std::ffi::{CString, c_char, c_int, c_void};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

type CreateFn = unsafe extern "C" fn(path: *const c_char) -> *mut c_void;
type DumpFn = unsafe extern "C" fn(handle: *mut c_void, output_dir: *const c_char) -> c_int;
type FixMetadataFn = unsafe extern "C" fn(handle: *mut c_void);
type DestroyFn = unsafe extern "C" fn(handle: *mut c_void);

/// Resolved exports; the function pointers stay valid while `_library` is alive
struct LoadedLibrary {
    create: CreateFn,
    dump: DumpFn,
    fix_metadata: FixMetadataFn,
    destroy: DestroyFn,
    _library: Library,
}

impl LoadedLibrary {
    fn load(path: &Path) -> Result<Self> {
        let load_err = |e: libloading::Error| {
            Error::Other(format!(
                "failed to load native library '{}': {}",
                path.display(),
                e
            ))
        };

        // SAFETY: loading runs the library's initializers. The file passed install
        // validation and is only replaced through an atomic rename.
        let library = unsafe { Library::new(path) }.map_err(load_err)?;

        // SAFETY: the signatures match the exported C ABI of libncmdump.
        let (create, dump, fix_metadata, destroy) = unsafe {
            (
                *library
                    .get::<CreateFn>(b"CreateNeteaseCrypt\0")
                    .map_err(load_err)?,
                *library.get::<DumpFn>(b"Dump\0").map_err(load_err)?,
                *library
                    .get::<FixMetadataFn>(b"FixMetadata\0")
                    .map_err(load_err)?,
                *library
                    .get::<DestroyFn>(b"DestroyNeteaseCrypt\0")
                    .map_err(load_err)?,
            )
        };

        Ok(Self {
            create,
            dump,
            fix_metadata,
            destroy,
            _library: library,
        })
    }
}

/// The installed `libncmdump`, loaded on first use
///
/// The library stays loaded for the rest of the process once opened.
pub struct NativeLibrary {
    path: PathBuf,
    loaded: Mutex<Option<Arc<LoadedLibrary>>>,
}

impl NativeLibrary {
    /// Create a capability backed by the library at `path`
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            loaded: Mutex::new(None),
        }
    }

    /// Path of the library file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn library(&self) -> Result<Arc<LoadedLibrary>> {
        let mut guard = self
            .loaded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(library) = guard.as_ref() {
            return Ok(Arc::clone(library));
        }

        let library = Arc::new(LoadedLibrary::load(&self.path)?);
        info!(path = ?self.path, "native library loaded");
        *guard = Some(Arc::clone(&library));
        Ok(library)
    }
}

impl Capability for NativeLibrary {
    fn name(&self) -> &'static str {
        "libncmdump"
    }

    fn is_present(&self) -> bool {
        self.path.is_file()
    }

    fn open(&self, input: &Path) -> Result<Box<dyn CapabilityHandle + '_>> {
        let library = self.library()?;
        let input_c = path_to_cstring(input)?;

        // SAFETY: input_c is a valid NUL-terminated string for the duration of the call.
        let raw = unsafe { (library.create)(input_c.as_ptr()) };
        if raw.is_null() {
            return Err(Error::Other(format!(
                "native library could not open '{}'",
                input.display()
            )));
        }

        debug!(?input, "native handle created");
        Ok(Box::new(NativeHandle { library, raw }))
    }
}

/// A `NeteaseCrypt` instance; destroyed on drop
struct NativeHandle {
    library: Arc<LoadedLibrary>,
    raw: *mut c_void,
}

impl CapabilityHandle for NativeHandle {
    fn dump(&mut self, output_dir: &Path) -> Result<i32> {
        let output_c = path_to_cstring(output_dir)?;
        // SAFETY: raw came from create and has not been destroyed; output_c outlives the call.
        Ok(unsafe { (self.library.dump)(self.raw, output_c.as_ptr()) })
    }

    fn fix_metadata(&mut self) {
        // SAFETY: raw came from create and has not been destroyed.
        unsafe { (self.library.fix_metadata)(self.raw) }
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        // SAFETY: raw came from create and is destroyed exactly once, here.
        unsafe { (self.library.destroy)(self.raw) }
        debug!("native handle destroyed");
    }
}

// The library takes UTF-8 paths on every platform
fn path_to_cstring(path: &Path) -> Result<CString> {
    let text = path.to_str().ok_or_else(|| {
        Error::Other(format!("path is not valid UTF-8: {}", path.display()))
    })?;
    CString::new(text)
        .map_err(|_| Error::Other(format!("path contains a NUL byte: {}", path.display())))
}
