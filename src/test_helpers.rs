//! Shared test helpers: configs pointed at a mock release index, fixture archives,
//! and a scripted stand-in for the native library.

use crate::capability::{Capability, CapabilityHandle};
use crate::config::{BinaryFormat, Config};
use crate::update::validate::has_magic;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;

/// Config rooted at `install_dir` whose release endpoint lives on `server_uri`
pub(crate) fn test_config(install_dir: &Path, server_uri: &str) -> Config {
    let mut config = Config::default();
    config.install.install_dir = install_dir.to_path_buf();
    config.install.binary_name = "libncmdump.so".to_string();
    config.install.binary_format = BinaryFormat::Elf;
    config.release.endpoint = format!("{}/repos/taurusxin/ncmdump/releases/latest", server_uri);
    config.release.user_agent = "ncmdump-sync-test".to_string();
    config.release.request_timeout = Some(Duration::from_secs(5));
    config.release.download_timeout = Some(Duration::from_secs(5));
    config
}

/// Deterministic ELF-looking blob of `size` bytes
pub(crate) fn fake_binary(size: usize) -> Vec<u8> {
    let mut bytes = b"\x7fELF\x02\x01\x01".to_vec();
    bytes.resize(size.max(bytes.len()), 0xab);
    bytes.truncate(size);
    debug_assert!(size < 4 || has_magic(&bytes, BinaryFormat::Elf));
    bytes
}

/// Zip archive containing the given (name, content) entries
pub(crate) fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, content) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Temporary files left behind by the updater in `dir`
pub(crate) fn leftover_temp_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".ncmdump-sync-"))
        .map(|e| e.path())
        .collect()
}

/// Scripted capability that records its handle lifecycle
///
/// Successful dumps write `<stem>.mp3` into the output directory.
#[derive(Default)]
pub(crate) struct FakeCapability {
    present: AtomicBool,
    failing: Mutex<HashMap<String, i32>>,
    panicking: Mutex<HashSet<String>>,
    refused: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, Arc<Barrier>>>,
    presence_checks: AtomicUsize,
    opened: AtomicUsize,
    destroyed: AtomicUsize,
    metadata_fixes: AtomicUsize,
    dumps: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl FakeCapability {
    pub(crate) fn new() -> Arc<Self> {
        let fake = Self::default();
        fake.present.store(true, Ordering::SeqCst);
        Arc::new(fake)
    }

    pub(crate) fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::SeqCst);
    }

    /// Dumps of files with this name return `code`
    pub(crate) fn fail_with(&self, file_name: &str, code: i32) {
        self.failing
            .lock()
            .unwrap()
            .insert(file_name.to_string(), code);
    }

    /// Dumps of files with this name panic
    pub(crate) fn panic_on(&self, file_name: &str) {
        self.panicking.lock().unwrap().insert(file_name.to_string());
    }

    /// Opening files with this name fails
    pub(crate) fn refuse_open(&self, file_name: &str) {
        self.refused.lock().unwrap().insert(file_name.to_string());
    }

    /// Dumps of files with this name meet the returned barrier twice: once on
    /// entry and once more before they proceed
    pub(crate) fn gate(&self, file_name: &str) -> Arc<Barrier> {
        let barrier = Arc::new(Barrier::new(2));
        self.gates
            .lock()
            .unwrap()
            .insert(file_name.to_string(), Arc::clone(&barrier));
        barrier
    }

    pub(crate) fn presence_checks(&self) -> usize {
        self.presence_checks.load(Ordering::SeqCst)
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub(crate) fn metadata_fixes(&self) -> usize {
        self.metadata_fixes.load(Ordering::SeqCst)
    }

    /// (input, output_dir) of every dump, in call order
    pub(crate) fn dumps(&self) -> Vec<(PathBuf, PathBuf)> {
        self.dumps.lock().unwrap().clone()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl Capability for FakeCapability {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn is_present(&self) -> bool {
        self.presence_checks.fetch_add(1, Ordering::SeqCst);
        self.present.load(Ordering::SeqCst)
    }

    fn open(&self, input: &Path) -> crate::Result<Box<dyn CapabilityHandle + '_>> {
        let name = file_name(input);
        if self.refused.lock().unwrap().contains(&name) {
            return Err(crate::Error::Other(format!("cannot open {}", name)));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeHandle {
            owner: self,
            input: input.to_path_buf(),
        }))
    }
}

struct FakeHandle<'a> {
    owner: &'a FakeCapability,
    input: PathBuf,
}

impl CapabilityHandle for FakeHandle<'_> {
    fn dump(&mut self, output_dir: &Path) -> crate::Result<i32> {
        let name = file_name(&self.input);
        self.owner
            .dumps
            .lock()
            .unwrap()
            .push((self.input.clone(), output_dir.to_path_buf()));

        let gate = self.owner.gates.lock().unwrap().get(&name).cloned();
        if let Some(gate) = gate {
            gate.wait();
            gate.wait();
        }

        if self.owner.panicking.lock().unwrap().contains(&name) {
            panic!("fake capability asked to panic on {}", name);
        }
        if let Some(code) = self.owner.failing.lock().unwrap().get(&name) {
            return Ok(*code);
        }

        let stem = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        std::fs::write(output_dir.join(format!("{}.mp3", stem)), b"audio")?;
        Ok(0)
    }

    fn fix_metadata(&mut self) {
        self.owner.metadata_fixes.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for FakeHandle<'_> {
    fn drop(&mut self) {
        self.owner.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}
