use std::{
    fs,
    io::ErrorKind,
    panic::AssertUnwindSafe,
    path::{Path, PathBuf},
    time::Duration,
};

use futures::FutureExt;
use log::{debug, error, info, warn};

use super::{
    helpers::{remove_partial, target_path_for, verify_output},
    models::{ConversionOutcome, ConvertError, ConverterConfig, HostProfile},
    strategy::{build_strategies, Strategy},
};

/// Bounds for a single attempt.
pub const MIN_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1);
pub const MAX_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

impl HostProfile {
    /// Orders strategies for the host. A full desktop tries the office suite first,
    /// a managed host never tries it. Relative order is kept otherwise.
    pub fn arrange(self, strategies: Vec<Box<dyn Strategy>>) -> Vec<Box<dyn Strategy>> {
        match self {
            HostProfile::FullDesktop => {
                let (suite, rest): (Vec<_>, Vec<_>) = strategies
                    .into_iter()
                    .partition(|strategy| strategy.requires_desktop_suite());
                suite.into_iter().chain(rest).collect()
            }
            HostProfile::ManagedHost => strategies
                .into_iter()
                .filter(|strategy| {
                    let needs_suite = strategy.requires_desktop_suite();
                    if needs_suite {
                        debug!("Leaving out {} on a managed host", strategy.name());
                    }
                    !needs_suite
                })
                .collect(),
        }
    }
}

/// Tries conversion strategies one after another until one produces a PDF.
pub struct DocumentConverter {
    strategies: Vec<Box<dyn Strategy>>,
    timeout: Duration,
}

impl DocumentConverter {
    /// Strategies are tried exactly in the given order.
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self {
            strategies,
            timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_profile(strategies: Vec<Box<dyn Strategy>>, profile: HostProfile) -> Self {
        Self::new(profile.arrange(strategies))
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::with_profile(build_strategies(config), config.profile)
            .with_timeout(Duration::from_secs(config.timeout_secs))
    }

    /// Clamped to [`MIN_ATTEMPT_TIMEOUT`]..=[`MAX_ATTEMPT_TIMEOUT`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if timeout > MAX_ATTEMPT_TIMEOUT {
            warn!(
                "Timeout of {}s is too long, using {}s",
                timeout.as_secs(),
                MAX_ATTEMPT_TIMEOUT.as_secs()
            );
        } else if timeout < MIN_ATTEMPT_TIMEOUT {
            warn!(
                "Timeout of {}ms is too short, using {}s",
                timeout.as_millis(),
                MIN_ATTEMPT_TIMEOUT.as_secs()
            );
        }
        self.timeout = timeout.clamp(MIN_ATTEMPT_TIMEOUT, MAX_ATTEMPT_TIMEOUT);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    /// Converts `source` into the `.pdf` next to it. On error nothing is left at the target path.
    pub async fn convert(&self, source: &Path) -> Result<PathBuf, ConvertError> {
        if !source.is_file() {
            return Err(ConvertError::SourceNotFound(source.to_path_buf()));
        }
        let target = target_path_for(source);
        if target == source {
            return Err(ConvertError::SourceIsTarget(target));
        }
        remove_partial(&target);

        let total = self.strategies.len();
        for (i, strategy) in self.strategies.iter().enumerate() {
            let name = strategy.name();
            info!("Converter: trying {name} ({}/{total})", i + 1);

            let attempt = AssertUnwindSafe(strategy.attempt(source, &target)).catch_unwind();
            match tokio::time::timeout(self.timeout, attempt).await {
                Ok(Ok(ConversionOutcome::Success(path))) if path != target => warn!(
                    "Converter: {name} reported output at {} instead of {}, trying next",
                    path.display(),
                    target.display()
                ),
                Ok(Ok(ConversionOutcome::Success(path))) => match verify_output(&path) {
                    ConversionOutcome::Success(path) => {
                        info!("Converter: {name} produced {}", path.display());
                        return Ok(path);
                    }
                    _ => warn!("Converter: {name} reported success without output, trying next"),
                },
                Ok(Ok(ConversionOutcome::Unavailable)) => {
                    info!("Converter: {name} is unavailable, trying next")
                }
                Ok(Ok(ConversionOutcome::Failed(reason))) => {
                    warn!("Converter: {name} failed: {reason}, trying next")
                }
                Ok(Err(_)) => warn!("Converter: {name} panicked, trying next"),
                Err(_) => warn!(
                    "Converter: {name} timed out after {}s, trying next",
                    self.timeout.as_secs()
                ),
            }
            remove_partial(&target);
        }

        error!(
            "Converter: all {total} strategies failed for {}",
            source.display()
        );
        Err(ConvertError::AllStrategiesFailed { attempted: total })
    }
}

/// Deletes the files, logging instead of failing.
pub fn cleanup<P: AsRef<Path>>(paths: &[P]) {
    for path in paths {
        let path: &Path = path.as_ref();
        match fs::remove_file(path) {
            Ok(()) => debug!("Removed {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} is already gone", path.display())
            }
            Err(e) => warn!("Could not remove {}: {e}", path.display()),
        }
    }
}
