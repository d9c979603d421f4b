//! ---
//! svctest_section: "05-test-driver"
//! svctest_subsection: "module"
//! svctest_type: "source"
//! svctest_scope: "code"
//! svctest_description: "Golden introspection fixtures on disk."
//! svctest_version: "v0.1.0"
//! svctest_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use svctest_config::FixtureConfig;
use tracing::debug;

use crate::{HarnessError, HarnessResult};

/// Numbered fixture files `<prefix><N>.<extension>` inside one directory.
#[derive(Debug, Clone)]
pub struct FixtureStore {
    directory: PathBuf,
    prefix: String,
    extension: String,
}

impl FixtureStore {
    pub fn new(
        directory: impl Into<PathBuf>,
        prefix: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
            extension: extension.into(),
        }
    }

    pub fn from_config(config: &FixtureConfig) -> Self {
        Self::new(&config.directory, &config.prefix, &config.extension)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of fixture `index` (1-based).
    pub fn path_for(&self, index: usize) -> PathBuf {
        let name = if self.extension.is_empty() {
            format!("{}{index}", self.prefix)
        } else {
            format!("{}{index}.{}", self.prefix, self.extension)
        };
        self.directory.join(name)
    }

    /// Overwrite fixture `index` with `document`.
    pub fn record(&self, index: usize, document: &str) -> HarnessResult<PathBuf> {
        let path = self.path_for(index);
        if !self.directory.as_os_str().is_empty() {
            fs::create_dir_all(&self.directory).map_err(|source| HarnessError::FixtureWrite {
                path: path.clone(),
                source,
            })?;
        }
        fs::write(&path, document).map_err(|source| HarnessError::FixtureWrite {
            path: path.clone(),
            source,
        })?;
        debug!(fixture = %path.display(), bytes = document.len(), "fixture written");
        Ok(path)
    }

    /// Compare `document`, introspected from `object_path`, with fixture
    /// `index`. Equality is byte-exact.
    pub fn verify(&self, index: usize, object_path: &str, document: &str) -> HarnessResult<()> {
        let path = self.path_for(index);
        let stored = fs::read(&path).map_err(|source| HarnessError::FixtureRead {
            path: path.clone(),
            source,
        })?;
        if stored == document.as_bytes() {
            return Ok(());
        }

        let stored = String::from_utf8_lossy(&stored);
        let (line, expected_line, actual_line) = first_difference(&stored, document);
        Err(HarnessError::FixtureMismatch {
            index,
            path: object_path.to_owned(),
            fixture: path,
            line,
            expected_line,
            actual_line,
        })
    }
}

const END_OF_DOCUMENT: &str = "<end of document>";

/// 1-based number and contents of the first line where the documents differ.
fn first_difference(expected: &str, actual: &str) -> (usize, String, String) {
    let mut expected_lines = expected.split('\n');
    let mut actual_lines = actual.split('\n');
    let mut line = 1;
    loop {
        match (expected_lines.next(), actual_lines.next()) {
            (Some(e), Some(a)) if e == a => line += 1,
            (None, None) => return (line, String::new(), String::new()),
            (e, a) => {
                return (
                    line,
                    e.unwrap_or(END_OF_DOCUMENT).to_owned(),
                    a.unwrap_or(END_OF_DOCUMENT).to_owned(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> FixtureStore {
        FixtureStore::new(dir, "introspection", "xml")
    }

    #[test]
    fn fixture_names_follow_index() {
        let store = FixtureStore::new(".", "introspection", "xml");
        assert_eq!(store.path_for(1), Path::new("./introspection1.xml"));
        assert_eq!(store.path_for(7), Path::new("./introspection7.xml"));
        let bare = FixtureStore::new("golden", "node", "");
        assert_eq!(bare.path_for(3), Path::new("golden/node3"));
    }

    #[test]
    fn record_overwrites_and_verify_accepts() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.record(2, "old contents that are longer").unwrap();
        let path = store.record(2, "<node/>\n").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "<node/>\n");
        store.verify(2, "/ServerObject", "<node/>\n").unwrap();
    }

    #[test]
    fn record_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir.path().join("nested").join("golden"));
        store.record(1, "<node/>").unwrap();
        assert!(store.path_for(1).exists());
    }

    #[test]
    fn mismatch_reports_first_differing_line() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store
            .record(4, "<node>\n  <interface name=\"a\"/>\n</node>\n")
            .unwrap();
        let err = store
            .verify(4, "/Not", "<node>\n  <interface name=\"b\"/>\n</node>\n")
            .unwrap_err();
        match err {
            HarnessError::FixtureMismatch {
                index,
                path,
                line,
                expected_line,
                actual_line,
                ..
            } => {
                assert_eq!(index, 4);
                assert_eq!(path, "/Not");
                assert_eq!(line, 2);
                assert_eq!(expected_line, "  <interface name=\"a\"/>");
                assert_eq!(actual_line, "  <interface name=\"b\"/>");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn trailing_newline_is_significant() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.record(1, "<node/>\n").unwrap();
        let err = store.verify(1, "/", "<node/>").unwrap_err();
        assert!(matches!(
            err,
            HarnessError::FixtureMismatch { line: 2, .. }
        ));
        assert!(err.to_string().contains(END_OF_DOCUMENT));
    }

    #[test]
    fn missing_fixture_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(dir.path()).verify(5, "/Not/A", "<node/>").unwrap_err();
        assert!(matches!(err, HarnessError::FixtureRead { .. }));
        assert!(err.to_string().contains("introspection5.xml"));
    }
}
