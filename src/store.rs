use std::path::PathBuf;

#[cfg(test)] use mockall::automock;
use rustc_hash::FxHashMap;
use tracing::warn;

/// Lookup of a measurement value by id. Absence and read errors are uniformly "not found" -
///  the protocol layer has exactly one answer for both.
#[cfg_attr(test, automock)]
pub trait MeasurementStore: Send + Sync {
    fn lookup(&self, measurement_id: u32) -> Option<f32>;
}

/// Line-oriented text file store: one measurement per line, id and value separated by
///  whitespace. The file is re-read on every lookup, so edits take effect without a server
///  restart.
pub struct LineFileStore {
    path: PathBuf,
}

impl LineFileStore {
    pub fn new(path: impl Into<PathBuf>) -> LineFileStore {
        LineFileStore { path: path.into() }
    }
}

impl MeasurementStore for LineFileStore {
    fn lookup(&self, measurement_id: u32) -> Option<f32> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!("error reading measurement file {:?}: {}", self.path, e);
                return None;
            }
        };

        for line in content.lines() {
            let mut tokens = line.split_whitespace();
            match tokens.next().and_then(|t| t.parse::<u32>().ok()) {
                Some(id) if id == measurement_id => {
                    return tokens.next().and_then(|t| t.parse::<f32>().ok());
                }
                _ => {}
            }
        }
        None
    }
}

/// In-memory store, mainly for tests and demo setups.
pub struct MemoryStore {
    values: FxHashMap<u32, f32>,
}

impl MemoryStore {
    pub fn new(values: impl IntoIterator<Item = (u32, f32)>) -> MemoryStore {
        MemoryStore {
            values: values.into_iter().collect(),
        }
    }
}

impl MeasurementStore for MemoryStore {
    fn lookup(&self, measurement_id: u32) -> Option<f32> {
        self.values.get(&measurement_id).copied()
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use rstest::rstest;

    use super::*;

    struct TempDataFile {
        path: PathBuf,
    }
    impl TempDataFile {
        fn new(name: &str, content: &str) -> TempDataFile {
            let path = std::env::temp_dir().join(format!("meterlink-{}-{}", std::process::id(), name));
            std::fs::write(&path, content).unwrap();
            TempDataFile { path }
        }
    }
    impl Drop for TempDataFile {
        fn drop(&mut self) {
            std::fs::remove_file(&self.path).ok();
        }
    }

    #[rstest]
    #[case::present(7, Some(72.5))]
    #[case::other_line(12, Some(80.0))]
    #[case::absent(99, None)]
    #[case::id_without_value(13, None)]
    fn test_line_file_store(#[case] id: u32, #[case] expected: Option<f32>) {
        let file = TempDataFile::new(&format!("store-{}", id), "7 72.5\n12 80\nnot a line\n13\n");
        let store = LineFileStore::new(&file.path);
        assert_eq!(store.lookup(id), expected);
    }

    #[rstest]
    fn test_line_file_store_missing_file() {
        let store = LineFileStore::new("/nonexistent/meterlink-data.txt");
        assert_eq!(store.lookup(7), None);
    }

    #[rstest]
    fn test_memory_store() {
        let store = MemoryStore::new([(7, 72.5)]);
        assert_eq!(store.lookup(7), Some(72.5));
        assert_eq!(store.lookup(8), None);
    }
}
