//! Configuration types for ncmdump-sync

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Executable format the downloaded library is expected to have
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryFormat {
    /// Windows PE (`MZ` header)
    Pe,
    /// Linux/BSD ELF
    Elf,
    /// macOS Mach-O (thin or fat)
    MachO,
}

impl Default for BinaryFormat {
    fn default() -> Self {
        if cfg!(target_os = "windows") {
            BinaryFormat::Pe
        } else if cfg!(target_os = "macos") {
            BinaryFormat::MachO
        } else {
            BinaryFormat::Elf
        }
    }
}

/// Where the active library and its version marker live
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Installation directory holding the binary and marker (default: ".")
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,

    /// File name of the active binary, also the entry looked up in the release archive
    #[serde(default = "default_binary_name")]
    pub binary_name: String,

    /// File name of the plain-text version marker
    #[serde(default = "default_marker_name")]
    pub marker_name: String,

    /// Directory for downloaded archives (default: the install directory)
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,

    /// Smallest binary accepted after extraction, in bytes (default: 1024)
    #[serde(default = "default_min_binary_size")]
    pub min_binary_size: u64,

    /// Expected executable format of the binary (default: the build target's)
    #[serde(default)]
    pub binary_format: BinaryFormat,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            install_dir: default_install_dir(),
            binary_name: default_binary_name(),
            marker_name: default_marker_name(),
            staging_dir: None,
            min_binary_size: default_min_binary_size(),
            binary_format: BinaryFormat::default(),
        }
    }
}

/// Release index location and asset selection
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReleaseConfig {
    /// "Latest release" endpoint of the release index
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Value sent in the User-Agent header
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Asset names must start with this prefix
    #[serde(default = "default_asset_prefix")]
    pub asset_prefix: String,

    /// Asset names must end with this suffix
    #[serde(default = "default_asset_suffix")]
    pub asset_suffix: String,

    /// Timeout for the release index query (None = wait forever)
    #[serde(default = "default_request_timeout", with = "optional_duration_serde")]
    pub request_timeout: Option<Duration>,

    /// Timeout for the archive download (None = wait forever)
    #[serde(default = "default_download_timeout", with = "optional_duration_serde")]
    pub download_timeout: Option<Duration>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            user_agent: default_user_agent(),
            asset_prefix: default_asset_prefix(),
            asset_suffix: default_asset_suffix(),
            request_timeout: default_request_timeout(),
            download_timeout: default_download_timeout(),
        }
    }
}

/// Batch conversion behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Extension picked up by directory scans, without the dot (default: "ncm")
    #[serde(default = "default_input_extension")]
    pub input_extension: String,

    /// Call the library's metadata fix-up after a successful dump (default: false)
    #[serde(default)]
    pub fix_metadata: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            input_extension: default_input_extension(),
            fix_metadata: false,
        }
    }
}

/// Main configuration for NcmConverter
///
/// Sub-configs are flattened, so the JSON form is a single flat object.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Installation layout and validation
    #[serde(flatten)]
    pub install: InstallConfig,

    /// Release index settings
    #[serde(flatten)]
    pub release: ReleaseConfig,

    /// Conversion settings
    #[serde(flatten)]
    pub conversion: ConversionConfig,

    /// Capacity of the event broadcast channel (default: 1000)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            install: InstallConfig::default(),
            release: ReleaseConfig::default(),
            conversion: ConversionConfig::default(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file; missing keys take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read config '{}': {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings that would otherwise fail deep inside an update or a run
    pub fn validate(&self) -> Result<()> {
        check_file_name("binary_name", &self.install.binary_name)?;
        check_file_name("marker_name", &self.install.marker_name)?;
        if self.install.binary_name == self.install.marker_name {
            return Err(Error::config(
                "marker_name",
                "marker and binary cannot share a file name",
            ));
        }
        if self.install.min_binary_size == 0 {
            return Err(Error::config("min_binary_size", "must be greater than zero"));
        }

        let endpoint = url::Url::parse(&self.release.endpoint)
            .map_err(|e| Error::config("endpoint", format!("invalid URL: {}", e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::config("endpoint", "must be an http(s) URL"));
        }
        if self.release.asset_suffix.is_empty() {
            return Err(Error::config("asset_suffix", "must not be empty"));
        }

        if self.input_extension().is_empty() {
            return Err(Error::config("input_extension", "must not be empty"));
        }
        if self.event_buffer == 0 {
            return Err(Error::config("event_buffer", "must be greater than zero"));
        }
        Ok(())
    }

    /// Path of the active binary
    pub fn binary_path(&self) -> PathBuf {
        self.install.install_dir.join(&self.install.binary_name)
    }

    /// Path of the version marker
    pub fn marker_path(&self) -> PathBuf {
        self.install.install_dir.join(&self.install.marker_name)
    }

    /// Directory for downloaded archives
    pub fn staging_dir(&self) -> &Path {
        self.install
            .staging_dir
            .as_deref()
            .unwrap_or(&self.install.install_dir)
    }

    /// Input extension without a leading dot
    pub fn input_extension(&self) -> &str {
        self.conversion.input_extension.trim_start_matches('.')
    }
}

fn check_file_name(key: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::config(key, "must not be empty"));
    }
    if Path::new(name).file_name().and_then(|n| n.to_str()) != Some(name) {
        return Err(Error::config(key, "must be a bare file name"));
    }
    Ok(())
}

fn default_install_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_binary_name() -> String {
    if cfg!(target_os = "windows") {
        "libncmdump.dll".to_string()
    } else if cfg!(target_os = "macos") {
        "libncmdump.dylib".to_string()
    } else {
        "libncmdump.so".to_string()
    }
}

fn default_marker_name() -> String {
    "lib_version.txt".to_string()
}

fn default_min_binary_size() -> u64 {
    1024
}

fn default_endpoint() -> String {
    "https://api.github.com/repos/taurusxin/ncmdump/releases/latest".to_string()
}

fn default_user_agent() -> String {
    concat!("ncmdump-sync/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_asset_prefix() -> String {
    "libncmdump-".to_string()
}

fn default_asset_suffix() -> String {
    ".zip".to_string()
}

fn default_request_timeout() -> Option<Duration> {
    Some(Duration::from_secs(30))
}

fn default_download_timeout() -> Option<Duration> {
    Some(Duration::from_secs(300))
}

fn default_input_extension() -> String {
    "ncm".to_string()
}

fn default_event_buffer() -> usize {
    1000
}

// Optional Duration serialization helper (whole seconds)
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
