//! Single-file conversion through the native capability

use crate::capability::Capability;
use crate::error::ConvertError;
use crate::types::ConversionOutcome;
use std::path::Path;
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

/// Converts one input file at a time; never returns an error, only outcomes
#[derive(Clone)]
pub struct ConversionWorker {
    capability: Arc<dyn Capability>,
    fix_metadata: bool,
}

impl std::fmt::Debug for ConversionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionWorker")
            .field("capability", &self.capability.name())
            .field("fix_metadata", &self.fix_metadata)
            .finish()
    }
}

impl ConversionWorker {
    /// Create a worker over the given capability
    pub fn new(capability: Arc<dyn Capability>, fix_metadata: bool) -> Self {
        Self {
            capability,
            fix_metadata,
        }
    }

    /// The capability this worker drives
    pub fn capability(&self) -> &Arc<dyn Capability> {
        &self.capability
    }

    /// Convert `input` into `output_dir`
    ///
    /// Preconditions are checked in order (input exists, capability present, output
    /// directory usable) and the first failure is returned without touching the
    /// capability further. A panic inside the native call is reported as
    /// [`ConvertError::TransformFailed`].
    pub async fn convert(&self, input: &Path, output_dir: &Path) -> ConversionOutcome {
        let display_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.display().to_string());

        let result = self.run(input, output_dir).await;
        let log_line = match &result {
            Ok(()) => {
                info!(?input, ?output_dir, "conversion succeeded");
                format!("Converted: {}", display_name)
            }
            Err(e) => {
                warn!(?input, ?output_dir, error = %e, "conversion failed");
                format!("Failed: {} ({})", display_name, e)
            }
        };

        let output_dir = match &result {
            Err(ConvertError::InputMissing { .. } | ConvertError::CapabilityMissing) => None,
            _ => Some(output_dir.to_path_buf()),
        };

        ConversionOutcome {
            input: input.to_path_buf(),
            output_dir,
            result,
            log_line,
        }
    }

    async fn run(&self, input: &Path, output_dir: &Path) -> Result<(), ConvertError> {
        let input_exists = tokio::fs::metadata(input)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !input_exists {
            return Err(ConvertError::InputMissing {
                path: input.to_path_buf(),
            });
        }

        if !self.capability.is_present() {
            return Err(ConvertError::CapabilityMissing);
        }

        if !tokio::fs::metadata(output_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            debug!(?output_dir, "creating output directory");
            tokio::fs::create_dir_all(output_dir)
                .await
                .map_err(|e| ConvertError::OutputDir {
                    path: output_dir.to_path_buf(),
                    reason: e.to_string(),
                })?;
        }

        let capability = Arc::clone(&self.capability);
        let input_owned = input.to_path_buf();
        let output_owned = output_dir.to_path_buf();
        let fix_metadata = self.fix_metadata;

        let code = spawn_blocking(move || {
            invoke(capability.as_ref(), &input_owned, &output_owned, fix_metadata)
        })
        .await
        .map_err(|e| ConvertError::TransformFailed {
            code: None,
            reason: format!("conversion task panicked: {}", e),
        })??;

        if code == 0 {
            Ok(())
        } else {
            Err(ConvertError::TransformFailed {
                code: Some(code),
                reason: "native dump reported an error".to_string(),
            })
        }
    }
}

// Handle is dropped (destroyed) on every path out of this function
fn invoke(
    capability: &dyn Capability,
    input: &Path,
    output_dir: &Path,
    fix_metadata: bool,
) -> Result<i32, ConvertError> {
    let failed = |e: crate::Error| ConvertError::TransformFailed {
        code: None,
        reason: e.to_string(),
    };

    let mut handle = capability.open(input).map_err(failed)?;
    let code = handle.dump(output_dir).map_err(failed)?;
    if code == 0 && fix_metadata {
        handle.fix_metadata();
    }
    Ok(code)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::FakeCapability;
    use tempfile::tempdir;

    fn worker(fake: &Arc<FakeCapability>) -> ConversionWorker {
        ConversionWorker::new(fake.clone(), true)
    }

    #[tokio::test]
    async fn missing_input_never_touches_capability() {
        let dir = tempdir().unwrap();
        let fake = FakeCapability::new();

        let outcome = worker(&fake)
            .convert(&dir.path().join("absent.ncm"), dir.path())
            .await;

        assert!(matches!(
            outcome.result,
            Err(ConvertError::InputMissing { .. })
        ));
        assert_eq!(fake.opened(), 0);
        assert_eq!(fake.presence_checks(), 0);
        assert_eq!(outcome.output_dir, None);
        assert!(outcome.log_line.contains("absent.ncm"));
    }

    #[tokio::test]
    async fn missing_capability_is_distinct_from_transform_failure() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("song.ncm");
        std::fs::write(&input, b"ncm").unwrap();
        let fake = FakeCapability::new();
        fake.set_present(false);

        let outcome = worker(&fake).convert(&input, dir.path()).await;

        assert_eq!(outcome.result, Err(ConvertError::CapabilityMissing));
        assert_eq!(fake.opened(), 0);
    }

    #[tokio::test]
    async fn output_dir_is_created() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("song.ncm");
        std::fs::write(&input, b"ncm").unwrap();
        let out = dir.path().join("converted").join("2024");
        let fake = FakeCapability::new();

        let outcome = worker(&fake).convert(&input, &out).await;

        assert!(outcome.is_success(), "{:?}", outcome.result);
        assert!(out.join("song.mp3").is_file());
        assert_eq!(outcome.output_dir.as_deref(), Some(out.as_path()));
        assert_eq!(outcome.log_line, "Converted: song.ncm");
        assert_eq!(fake.metadata_fixes(), 1);
    }

    #[tokio::test]
    async fn uncreatable_output_dir_is_reported() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("song.ncm");
        std::fs::write(&input, b"ncm").unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        let fake = FakeCapability::new();

        let outcome = worker(&fake).convert(&input, &blocker.join("out")).await;

        assert!(matches!(outcome.result, Err(ConvertError::OutputDir { .. })));
        assert_eq!(fake.opened(), 0);
    }

    #[tokio::test]
    async fn non_zero_code_is_transform_failure_and_handle_is_destroyed() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("broken.ncm");
        std::fs::write(&input, b"ncm").unwrap();
        let fake = FakeCapability::new();
        fake.fail_with("broken.ncm", 1);

        let outcome = worker(&fake).convert(&input, dir.path()).await;

        assert_eq!(
            outcome.error(),
            Some(&ConvertError::TransformFailed {
                code: Some(1),
                reason: "native dump reported an error".to_string(),
            })
        );
        assert_eq!(fake.opened(), 1);
        assert_eq!(fake.destroyed(), 1);
        assert_eq!(fake.metadata_fixes(), 0);
    }

    #[tokio::test]
    async fn panic_inside_capability_is_contained() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("evil.ncm");
        std::fs::write(&input, b"ncm").unwrap();
        let fake = FakeCapability::new();
        fake.panic_on("evil.ncm");

        let outcome = worker(&fake).convert(&input, dir.path()).await;

        assert!(matches!(
            outcome.result,
            Err(ConvertError::TransformFailed { code: None, .. })
        ));
        assert_eq!(fake.opened(), fake.destroyed());
    }

    #[tokio::test]
    async fn open_failure_is_transform_failure() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("unreadable.ncm");
        std::fs::write(&input, b"ncm").unwrap();
        let fake = FakeCapability::new();
        fake.refuse_open("unreadable.ncm");

        let outcome = worker(&fake).convert(&input, dir.path()).await;

        assert!(matches!(
            outcome.result,
            Err(ConvertError::TransformFailed { code: None, .. })
        ));
        assert_eq!(fake.destroyed(), 0);
    }

    #[tokio::test]
    async fn metadata_fix_can_be_disabled() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("song.ncm");
        std::fs::write(&input, b"ncm").unwrap();
        let fake = FakeCapability::new();

        let outcome = ConversionWorker::new(fake.clone(), false)
            .convert(&input, dir.path())
            .await;

        assert!(outcome.is_success());
        assert_eq!(fake.metadata_fixes(), 0);
    }
}
