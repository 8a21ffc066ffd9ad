use crate::model::Document;
use std::path::Path;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed instance tree at JSON path {path}: {source}")]
    Malformed {
        path: String,
        source: serde_json::Error,
    },
}

/// Read an instance-tree dump from disk. Deserialization failures carry
/// the JSON path of the offending node in their message.
pub fn read_root(path: &Path) -> Result<Document> {
    log::debug!("Loading instance tree, path = {path:?}");

    let raw = std::fs::read_to_string(path)?;
    let de = &mut serde_json::Deserializer::from_str(&raw);

    let doc: Document = serde_path_to_error::deserialize(de).map_err(|err| {
        let path = err.path().to_string();
        Error::Malformed {
            path,
            source: err.into_inner(),
        }
    })?;

    log::debug!("Loaded {} top-level instance(s)", doc.instances.len());

    Ok(doc)
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write temp file");
        file
    }

    #[test]
    fn reads_a_valid_dump() {
        let file = write_temp(
            r#"{"instances": [{"name": "t", "fields": [{"name": "v", "value": {"s32": 1}}]}]}"#,
        );
        let doc = read_root(file.path()).expect("valid dump should read");
        assert_eq!(doc.instances.len(), 1);
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = read_root(Path::new("does/not/exist.json"));
        assert_matches!(result, Err(Error::Io(_)));
    }

    #[test]
    fn malformed_dump_reports_json_path() {
        let file = write_temp(
            r#"{"instances": [{"name": "t", "fields": [{"name": "v", "value": {"s32": "oops"}}]}]}"#,
        );
        let err = read_root(file.path()).expect_err("bad value must fail");

        assert_matches!(&err, Error::Malformed { path, .. } => {
            assert!(path.contains("instances[0].fields[0].value"), "path was {path}");
        });
    }
}
