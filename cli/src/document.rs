//! YAML or JSON document loading.

use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Error type for document loading.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read file: {0}")]
    ReadFile(#[from] io::Error),
    #[error("failed to parse YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("failed to parse JSON: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("failed to parse file (tried YAML and JSON)")]
    ParseFailed,
}

/// Loads a YAML or JSON file into the provided type.
pub fn load_document<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, DocumentError> {
    let data = fs::read(path.as_ref())?;
    parse_document(&data, path.as_ref())
}

/// Parses document data based on the file extension.
///
/// Unknown extensions are tried as YAML, then JSON.
pub fn parse_document<T: DeserializeOwned>(
    data: &[u8],
    path: impl AsRef<Path>,
) -> Result<T, DocumentError> {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_slice(data)?),
        Some("json") => Ok(serde_json::from_slice(data)?),
        _ => {
            if let Ok(v) = serde_yaml::from_slice(data) {
                return Ok(v);
            }
            if let Ok(v) = serde_json::from_slice(data) {
                return Ok(v);
            }
            Err(DocumentError::ParseFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Stop {
        name: String,
        minutes: u32,
    }

    #[test]
    fn test_load_yaml() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(file, "name: Multnomah Falls\nminutes: 45").unwrap();

        let stop: Stop = load_document(file.path()).unwrap();
        assert_eq!(stop.name, "Multnomah Falls");
        assert_eq!(stop.minutes, 45);
    }

    #[test]
    fn test_load_json() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        writeln!(file, r#"{{"name": "Crater Lake", "minutes": 90}}"#).unwrap();

        let stop: Stop = load_document(file.path()).unwrap();
        assert_eq!(stop.name, "Crater Lake");
    }

    #[test]
    fn test_parse_unknown_extension() {
        let data = b"name: Bend\nminutes: 20";
        let stop: Stop = parse_document(data, "stop.txt").unwrap();
        assert_eq!(stop.minutes, 20);
    }

    #[test]
    fn test_parse_invalid() {
        let data = b"invalid data {{{{";
        let result: Result<Stop, _> = parse_document(data, "stop.txt");
        assert!(matches!(result, Err(DocumentError::ParseFailed)));
    }

    #[test]
    fn test_missing_file() {
        let result: Result<Stop, _> = load_document("/nonexistent/stop.yaml");
        assert!(matches!(result, Err(DocumentError::ReadFile(_))));
    }
}
