use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

const PROGRAM_PLACEHOLDER: &str = "{program}";

/// How programs under test are built and launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Toolchain {
    /// Build command; `{program}` is replaced with the program id.
    pub build: Vec<String>,
    /// Launch command; the mode flag is appended after it.
    pub run: Vec<String>,
    /// Suffix of every file the build leaves behind.
    pub artifact_suffix: String,
    /// Directory builds and invocations run in.
    pub work_dir: PathBuf,
    /// Extra classpath entries, passed as `-cp` to both commands.
    pub classpath: Vec<PathBuf>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            build: vec!["javac".into(), "{program}.java".into()],
            run: vec!["java".into(), "{program}".into()],
            artifact_suffix: ".class".into(),
            work_dir: PathBuf::from("."),
            classpath: Vec::new(),
        }
    }
}

impl Toolchain {
    pub fn build_command(&self, program: &str) -> Result<Vec<String>> {
        self.expand(&self.build, program)
    }

    pub fn run_command(&self, program: &str) -> Result<Vec<String>> {
        self.expand(&self.run, program)
    }

    /// Path of the primary artifact whose presence marks a compiled program.
    pub fn artifact_path(&self, program: &str) -> PathBuf {
        self.work_dir.join(format!("{program}{}", self.artifact_suffix))
    }

    /// Whether `file_name` belongs to the build output of `program`.
    pub fn is_artifact_of(&self, program: &str, file_name: &str) -> bool {
        file_name.starts_with(program) && file_name.ends_with(&self.artifact_suffix)
    }

    fn expand(&self, template: &[String], program: &str) -> Result<Vec<String>> {
        let mut argv: Vec<String> = template
            .iter()
            .map(|arg| arg.replace(PROGRAM_PLACEHOLDER, program))
            .collect();
        if argv.is_empty() {
            return Err(HarnessError::Config("empty command template".into()));
        }
        if !self.classpath.is_empty() {
            let joined = std::env::join_paths(&self.classpath)
                .map_err(|e| HarnessError::Config(format!("invalid classpath: {e}")))?;
            argv.splice(1..1, ["-cp".to_string(), joined.to_string_lossy().into_owned()]);
        }
        Ok(argv)
    }
}

/// Check applied to outputs longer than [`EqualityPolicy::diff_limit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LargeInputCheck {
    /// Whole-value equality, reported by digest only.
    #[default]
    Whole,
    /// Passes whenever the program produced some output.
    Lenient,
}

/// Size-dependent equality: inputs up to `diff_limit` bytes get a byte-level
/// comparison with a detailed report, larger ones fall back to `large`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualityPolicy {
    pub diff_limit: usize,
    pub large: LargeInputCheck,
}

impl Default for EqualityPolicy {
    fn default() -> Self {
        Self {
            diff_limit: 800,
            large: LargeInputCheck::Whole,
        }
    }
}

/// Runtime configuration for one test or benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub toolchain: Toolchain,
    pub equality: EqualityPolicy,
    /// Upper bound on a single invocation, in seconds.
    pub timeout_secs: Option<u64>,
    /// Registered encoded-file extension per program id, without the dot.
    pub extensions: BTreeMap<String, String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let mut extensions = BTreeMap::new();
        extensions.insert("MoveToFront".to_string(), "mtf".to_string());
        extensions.insert("BurrowsWheeler".to_string(), "bwt".to_string());
        Self {
            toolchain: Toolchain::default(),
            equality: EqualityPolicy::default(),
            timeout_secs: None,
            extensions,
        }
    }
}

impl HarnessConfig {
    /// Load a JSON config file; omitted fields keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| HarnessError::Config(format!("reading {}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| HarnessError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Encoded-file extension registered for `program`.
    pub fn extension_for(&self, program: &str) -> Result<&str> {
        self.extensions
            .get(program)
            .map(String::as_str)
            .ok_or_else(|| HarnessError::Config(format!("no extension registered for {program}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_toolchain_targets_java() {
        let tc = Toolchain::default();
        assert_eq!(tc.build_command("MoveToFront").unwrap(), ["javac", "MoveToFront.java"]);
        assert_eq!(tc.run_command("MoveToFront").unwrap(), ["java", "MoveToFront"]);
        assert_eq!(tc.artifact_path("MoveToFront"), Path::new("./MoveToFront.class"));
    }

    #[test]
    fn classpath_follows_first_token() {
        let tc = Toolchain {
            classpath: vec![PathBuf::from("a.jar"), PathBuf::from("b.jar")],
            ..Toolchain::default()
        };
        let argv = tc.run_command("Foo").unwrap();
        assert_eq!(argv[0], "java");
        assert_eq!(argv[1], "-cp");
        assert!(argv[2].contains("a.jar") && argv[2].contains("b.jar"));
        assert_eq!(argv[3], "Foo");
    }

    #[test]
    fn artifact_matching_includes_nested_classes() {
        let tc = Toolchain::default();
        assert!(tc.is_artifact_of("Foo", "Foo.class"));
        assert!(tc.is_artifact_of("Foo", "Foo$Node.class"));
        assert!(!tc.is_artifact_of("Foo", "Foo.java"));
        assert!(!tc.is_artifact_of("Foo", "Bar.class"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: HarnessConfig =
            serde_json::from_str(r#"{"equality": {"large": "lenient"}, "timeout_secs": 5}"#).unwrap();
        assert_eq!(cfg.equality.diff_limit, 800);
        assert_eq!(cfg.equality.large, LargeInputCheck::Lenient);
        assert_eq!(cfg.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(cfg.extension_for("MoveToFront").unwrap(), "mtf");
        assert!(cfg.extension_for("Nope").is_err());
    }
}
