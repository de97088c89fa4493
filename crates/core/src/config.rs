//! Build configuration exchanged with the orchestrating process.
//!
//! [`BuildOptions`] is the transport record (JSON, field names compatible
//! with the outer process). [`BuildOptions::resolve`] validates it and
//! fills in defaults, producing [`ResolvedOptions`] for the core.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Root used when the record does not name one.
pub const DEFAULT_GOPATH: &str = "/go";

/// Logical name of the source tree artifact when none is supplied.
pub const DEFAULT_SOURCE_NAME: &str = "source";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no target package specified")]
    MissingPackage,

    #[error("failed to parse build options: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Build options as received from the orchestrating process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Identity of the source tree artifact.
    #[serde(rename = "Source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Where the source tree is mounted on the local filesystem.
    #[serde(rename = "MountPath", default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<PathBuf>,
    /// Import path of the command package to build.
    #[serde(rename = "Pkg", default, skip_serializing_if = "Option::is_none")]
    pub pkg: Option<String>,
    #[serde(rename = "CgoEnabled", default)]
    pub cgo_enabled: bool,
    #[serde(rename = "BuildTags", default)]
    pub build_tags: Vec<String>,
    #[serde(rename = "GOARCH", default, skip_serializing_if = "Option::is_none")]
    pub goarch: Option<String>,
    #[serde(rename = "GOOS", default, skip_serializing_if = "Option::is_none")]
    pub goos: Option<String>,
    #[serde(rename = "GOPATH", default, skip_serializing_if = "Option::is_none")]
    pub gopath: Option<PathBuf>,
}

impl BuildOptions {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate and apply defaults.
    pub fn resolve(self) -> Result<ResolvedOptions, ConfigError> {
        let pkg = match self.pkg {
            Some(p) if !p.trim().is_empty() => p.trim().trim_matches('/').to_string(),
            _ => return Err(ConfigError::MissingPackage),
        };
        let gopath = non_empty_path(self.gopath).unwrap_or_else(|| PathBuf::from(DEFAULT_GOPATH));
        let mount_path = non_empty_path(self.mount_path).unwrap_or_else(|| gopath.clone());
        let platform = PlatformConfig {
            goos: non_empty(self.goos).unwrap_or_else(|| host_goos().to_string()),
            goarch: non_empty(self.goarch).unwrap_or_else(|| host_goarch().to_string()),
            build_tags: self.build_tags,
            cgo_enabled: self.cgo_enabled,
        };

        Ok(ResolvedOptions {
            source: non_empty(self.source).unwrap_or_else(|| DEFAULT_SOURCE_NAME.to_string()),
            mount_path,
            pkg,
            gopath,
            platform,
            toolchain: Toolchain::default(),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn non_empty_path(value: Option<PathBuf>) -> Option<PathBuf> {
    value.filter(|v| !v.as_os_str().is_empty())
}

/// Validated options with every default applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub source: String,
    pub mount_path: PathBuf,
    pub pkg: String,
    pub gopath: PathBuf,
    pub platform: PlatformConfig,
    pub toolchain: Toolchain,
}

impl ResolvedOptions {
    /// `<GOPATH>/src`, the fallback import root.
    pub fn src_root(&self) -> PathBuf {
        self.gopath.join("src")
    }
}

/// Target platform and build constraints handed to the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub goos: String,
    pub goarch: String,
    pub build_tags: Vec<String>,
    pub cgo_enabled: bool,
}

impl PlatformConfig {
    pub fn new(goos: impl Into<String>, goarch: impl Into<String>) -> Self {
        Self {
            goos: goos.into(),
            goarch: goarch.into(),
            build_tags: Vec::new(),
            cgo_enabled: false,
        }
    }

    pub fn with_cgo(mut self, enabled: bool) -> Self {
        self.cgo_enabled = enabled;
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.build_tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

/// Where the toolchain lives inside the build environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolchain {
    /// Image providing the Go toolchain.
    pub image: String,
    /// Directory holding `compile`, `asm`, `pack`, `link` and `cgo`.
    pub tool_dir: String,
    /// Runtime include directory passed to the assembler.
    pub include_dir: String,
    /// Packages installed on top of `image` for native compilation.
    pub native_packages: Vec<String>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            image: "docker.io/library/golang:1.11-alpine".to_string(),
            tool_dir: "/usr/local/go/pkg/tool/linux_amd64".to_string(),
            include_dir: "/usr/local/go/pkg/include".to_string(),
            native_packages: vec![
                "linux-headers".to_string(),
                "gcc".to_string(),
                "libc-dev".to_string(),
            ],
        }
    }
}

impl Toolchain {
    pub fn tool(&self, name: &str) -> String {
        format!("{}/{}", self.tool_dir.trim_end_matches('/'), name)
    }

    /// Environment shared by every toolchain operation.
    pub fn env(&self, platform: &PlatformConfig) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("CGO_ENABLED".to_string(), "0".to_string());
        env.insert("GOPATH".to_string(), DEFAULT_GOPATH.to_string());
        env.insert("GOOS".to_string(), platform.goos.clone());
        env.insert("GOARCH".to_string(), platform.goarch.clone());
        env.insert(
            "PATH".to_string(),
            "/usr/local/go/bin:/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin"
                .to_string(),
        );
        env
    }
}

/// Host operating system in toolchain naming.
pub fn host_goos() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// Host architecture in toolchain naming.
pub fn host_goarch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        other => other,
    }
}
