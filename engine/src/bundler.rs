//! Module bundler adapter.
//!
//! Produces one self-contained ESM text from a schema-definition module. The
//! host framework's virtual content module is replaced by the
//! [shim](crate::shim), and the validation library stays external so that the
//! loaded module binds to the host project's installed copy.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::BundleError;
use crate::process::{ScriptRun, run_script};
use crate::shim::shim_source;

const BUNDLE_SCRIPT: &str = include_str!("js/bundle.mjs");

static UNRESOLVED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"Could not resolve "([^"]+)""#).expect("static regex must compile"));

/// ESM source text of a bundled schema module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundledModule {
    pub code: String,
    /// Entry file the bundle was built from.
    pub entry: PathBuf,
}

/// Turns an entry file into a [`BundledModule`].
pub trait Bundler: Send + Sync {
    fn bundle(&self, entry: &Path) -> Result<BundledModule, BundleError>;
}

/// [`Bundler`] that runs esbuild from the host project through node.
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
    node_binary: PathBuf,
    project_root: PathBuf,
    virtual_module: String,
    shim: String,
    externals: Vec<String>,
    timeout: std::time::Duration,
}

impl EsbuildBundler {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            node_binary: config.node_binary.clone(),
            project_root: config.project_root.clone(),
            virtual_module: config.virtual_module.clone(),
            shim: shim_source(&config.validation_library),
            externals: config.external_specifiers(),
            timeout: config.bundle_timeout(),
        }
    }
}

impl Bundler for EsbuildBundler {
    fn bundle(&self, entry: &Path) -> Result<BundledModule, BundleError> {
        std::fs::File::open(entry).map_err(|e| BundleError::unreadable(entry, &e))?;

        let resolve_dir = entry.parent().unwrap_or(&self.project_root);
        let request = serde_json::json!({
            "entry": entry.to_string_lossy(),
            "resolveDir": resolve_dir.to_string_lossy(),
            "virtualModule": self.virtual_module,
            "shimSource": self.shim,
            "externals": self.externals,
        });
        let output = run_script(&ScriptRun {
            node_binary: &self.node_binary,
            script: BUNDLE_SCRIPT,
            request: &request,
            cwd: &self.project_root,
            timeout: self.timeout,
        })
        .map_err(|failure| BundleError::Tool(failure.to_string()))?;

        let Some(reply) = output.reply() else {
            return Err(BundleError::Tool(format!(
                "bundle script exited with {} and no reply: {}",
                output.status,
                output.stderr_tail()
            )));
        };
        let code = parse_bundle_reply(reply)?;
        info!(
            entry = %entry.display(),
            bytes = code.len(),
            elapsed_ms = output.elapsed.as_millis() as u64,
            "Bundled schema definition"
        );
        Ok(BundledModule {
            code,
            entry: entry.to_path_buf(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct BundleReply {
    ok: bool,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    errors: Vec<BundleDiagnostic>,
}

#[derive(Debug, Clone, Deserialize)]
struct BundleDiagnostic {
    #[serde(default)]
    kind: Option<String>,
    text: String,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    line: Option<u64>,
    #[serde(default)]
    column: Option<u64>,
}

impl BundleDiagnostic {
    fn location(&self) -> Option<String> {
        let file = self.file.as_deref()?;
        Some(match (self.line, self.column) {
            (Some(line), Some(col)) => format!("{file}:{line}:{col}"),
            (Some(line), None) => format!("{file}:{line}"),
            _ => file.to_string(),
        })
    }
}

/// Parses the bundle script's reply into bundled code or a classified error.
pub fn parse_bundle_reply(reply: &str) -> Result<String, BundleError> {
    let reply: BundleReply = serde_json::from_str(reply)
        .map_err(|e| BundleError::Tool(format!("malformed bundle reply: {e}")))?;

    if reply.ok {
        return reply
            .code
            .ok_or_else(|| BundleError::Tool("bundle reply is missing code".to_string()));
    }

    let Some(first) = reply.errors.first() else {
        return Err(BundleError::Tool(
            "bundler failed without diagnostics".to_string(),
        ));
    };
    debug!(count = reply.errors.len(), first = %first.text, "Bundler reported errors");
    Err(classify_diagnostic(first))
}

fn classify_diagnostic(diag: &BundleDiagnostic) -> BundleError {
    if diag.kind.as_deref() == Some("tool") {
        return BundleError::Tool(diag.text.clone());
    }
    if let Some(caps) = UNRESOLVED_RE.captures(&diag.text) {
        return BundleError::UnresolvedImport {
            specifier: caps[1].to_string(),
            importer: diag.location(),
        };
    }
    BundleError::Syntax {
        message: diag.text.clone(),
        location: diag.location(),
    }
}
