#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use codecbench::{HarnessConfig, Toolchain};
use tempfile::TempDir;

/// rot13 in both directions, so it is its own inverse.
pub const ROT13: &str = r#"export LC_ALL=C
case "$1" in
  -|+) exec tr 'A-Za-z' 'N-ZA-Mn-za-m' ;;
  *) exit 64 ;;
esac
"#;

/// Encodes like rot13 but decodes by copying input unchanged.
pub const BROKEN_DECODER: &str = r#"export LC_ALL=C
case "$1" in
  -) exec tr 'A-Za-z' 'N-ZA-Mn-za-m' ;;
  +) exec cat ;;
  *) exit 64 ;;
esac
"#;

/// Encodes, but every decode exits with status 2.
pub const CRASHING_DECODER: &str = r#"export LC_ALL=C
case "$1" in
  -) exec tr 'A-Za-z' 'N-ZA-Mn-za-m' ;;
  *) cat > /dev/null; exit 2 ;;
esac
"#;

/// Work dir holding `<program>.sh` sources plus a corpus dir next to it.
pub struct Fixture {
    pub root: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("work")).unwrap();
        fs::create_dir(root.path().join("corpus")).unwrap();
        Self { root }
    }

    pub fn work_dir(&self) -> PathBuf {
        self.root.path().join("work")
    }

    pub fn corpus(&self) -> PathBuf {
        self.root.path().join("corpus")
    }

    pub fn program(&self, name: &str, script: &str) {
        fs::write(self.work_dir().join(format!("{name}.sh")), script).unwrap();
    }

    pub fn case(&self, name: &str, raw: &[u8], encoded: &[u8]) {
        fs::write(self.corpus().join(name), raw).unwrap();
        fs::write(self.corpus().join(format!("{name}.r13")), encoded).unwrap();
    }

    /// "Builds" by copying the script to `<program>.run`.
    pub fn toolchain(&self) -> Toolchain {
        Toolchain {
            build: vec!["cp".into(), "{program}.sh".into(), "{program}.run".into()],
            run: vec!["sh".into(), "{program}.run".into()],
            artifact_suffix: ".run".into(),
            work_dir: self.work_dir(),
            classpath: Vec::new(),
        }
    }

    pub fn config(&self) -> HarnessConfig {
        let mut config = HarnessConfig {
            toolchain: self.toolchain(),
            ..HarnessConfig::default()
        };
        config.extensions.insert("Rot".into(), "r13".into());
        config
    }

    pub fn artifacts(&self) -> Vec<PathBuf> {
        fs::read_dir(self.work_dir())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|e| e == "run"))
            .collect()
    }

    pub fn write_config(&self) -> PathBuf {
        let path = self.root.path().join("codecbench.json");
        fs::write(&path, serde_json::to_string(&self.config()).unwrap()).unwrap();
        path
    }
}

pub fn rot13(data: &[u8]) -> Vec<u8> {
    data.iter()
        .map(|&b| match b {
            b'a'..=b'z' => (b - b'a' + 13) % 26 + b'a',
            b'A'..=b'Z' => (b - b'A' + 13) % 26 + b'A',
            other => other,
        })
        .collect()
}
