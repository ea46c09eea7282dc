use std::collections::BTreeMap;
use std::env;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};

static VERSION: OnceLock<String> = OnceLock::new();
static VERBOSE: AtomicBool = AtomicBool::new(false);
static ENV_FEATURES: OnceLock<BTreeMap<String, bool>> = OnceLock::new();

/// Record the compiler version once per process; later calls are ignored.
pub fn set_version(version: &str) {
    let _ = VERSION.set(version.to_string());
}

/// Version stamped into generated lock files.
pub fn version() -> &'static str {
    VERSION.get().map(String::as_str).unwrap_or(crate::VERSION)
}

pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::SeqCst);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// Feature flags from `GH_AW_FEATURES`, read once per process.
pub fn env_features() -> &'static BTreeMap<String, bool> {
    ENV_FEATURES.get_or_init(|| {
        env::var("GH_AW_FEATURES")
            .map(|raw| parse_feature_list(&raw))
            .unwrap_or_default()
    })
}

/// Parse `a,b=false, c=true` into flag states; bare names are enabled.
pub fn parse_feature_list(raw: &str) -> BTreeMap<String, bool> {
    let mut out = BTreeMap::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.split_once('=') {
            Some((name, value)) => {
                let enabled = !matches!(value.trim().to_lowercase().as_str(), "false" | "0" | "off");
                out.insert(name.trim().to_string(), enabled);
            }
            None => {
                out.insert(entry.to_string(), true);
            }
        }
    }
    out
}

/// Per-compile state shared across pipeline stages.
#[derive(Debug, Default)]
pub struct CompilerContext {
    warnings: AtomicUsize,
    messages: Mutex<Vec<String>>,
}

impl CompilerContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count and log a non-fatal problem.
    pub fn warn<T: Into<String>>(&self, message: T) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.warnings.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.load(Ordering::SeqCst)
    }

    pub fn warning_messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}
