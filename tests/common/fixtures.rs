//! Fixture builders: configs, fake library archives and a scripted capability

use ncmdump_sync::{BinaryFormat, Capability, CapabilityHandle, Config};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Release index path served by the mock server
pub const RELEASE_PATH: &str = "/repos/taurusxin/ncmdump/releases/latest";

/// Config installing into `dir` and querying `server_uri`
pub fn test_config(dir: &Path, server_uri: &str) -> Config {
    let mut config = Config::default();
    config.install.install_dir = dir.to_path_buf();
    config.install.binary_name = "libncmdump.so".to_string();
    config.install.binary_format = BinaryFormat::Elf;
    config.release.endpoint = format!("{}{}", server_uri, RELEASE_PATH);
    config.release.request_timeout = Some(Duration::from_secs(5));
    config.release.download_timeout = Some(Duration::from_secs(5));
    config
}

/// ELF-looking library body of `size` bytes
pub fn elf_binary(size: usize) -> Vec<u8> {
    let mut bytes = b"\x7fELF".to_vec();
    bytes.resize(size, 0);
    bytes
}

/// Zip archive with one entry
pub fn zip_archive(entry: &str, content: &[u8]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    zip.start_file(entry, zip::write::FileOptions::default())
        .unwrap();
    zip.write_all(content).unwrap();
    zip.finish().unwrap().into_inner()
}

/// Release index body with a single asset
pub fn release_json(tag: &str, asset_name: &str, download_url: &str) -> serde_json::Value {
    serde_json::json!({
        "tag_name": tag,
        "assets": [
            {"name": "ncmdump-cli.zip", "browser_download_url": format!("{}/cli", download_url)},
            {"name": asset_name, "browser_download_url": download_url},
        ]
    })
}

/// Create an input file named `name` in `dir`
pub fn ncm_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"CTENFDAM").unwrap();
    path
}

/// Capability that is present once `library` exists and writes `<stem>.mp3`
///
/// Files listed in `fail_codes` dump with that code instead.
pub struct ScriptedCapability {
    library: PathBuf,
    fail_codes: Mutex<HashMap<String, i32>>,
    destroyed: AtomicUsize,
}

impl ScriptedCapability {
    /// Capability gated on `library` existing
    pub fn new(library: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            library,
            fail_codes: Mutex::new(HashMap::new()),
            destroyed: AtomicUsize::new(0),
        })
    }

    /// Make dumps of `file_name` return `code`
    pub fn fail(&self, file_name: &str, code: i32) {
        self.fail_codes
            .lock()
            .unwrap()
            .insert(file_name.to_string(), code);
    }

    /// Handles destroyed so far
    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl Capability for ScriptedCapability {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn is_present(&self) -> bool {
        self.library.is_file()
    }

    fn open(&self, input: &Path) -> ncmdump_sync::Result<Box<dyn CapabilityHandle + '_>> {
        Ok(Box::new(ScriptedHandle {
            owner: self,
            input: input.to_path_buf(),
        }))
    }
}

struct ScriptedHandle<'a> {
    owner: &'a ScriptedCapability,
    input: PathBuf,
}

impl CapabilityHandle for ScriptedHandle<'_> {
    fn dump(&mut self, output_dir: &Path) -> ncmdump_sync::Result<i32> {
        let name = self
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(code) = self.owner.fail_codes.lock().unwrap().get(&name) {
            return Ok(*code);
        }
        let stem = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        std::fs::write(output_dir.join(format!("{}.mp3", stem)), b"ID3")?;
        Ok(0)
    }

    fn fix_metadata(&mut self) {}
}

impl Drop for ScriptedHandle<'_> {
    fn drop(&mut self) {
        self.owner.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}
