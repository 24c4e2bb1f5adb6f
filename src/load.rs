//! Convenience loaders: file or reader → `serde_json::Value`.

use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(source: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(source);
    match serde_path_to_error::deserialize::<_, T>(de) {
        Ok(value) => Ok(value),
        Err(err) => {
            let path = err.path().to_string();
            Err(anyhow!("at JSON path {path} → {}", err.into_inner()))
        }
    }
}

/// Read and parse a JSON document from a file.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    from_str_with_path(&source).with_context(|| format!("failed to parse {}", path.display()))
}

/// Read and parse a JSON document from any reader (stdin, a pipe, ...).
pub fn load_from_reader(mut reader: impl Read) -> Result<Value> {
    let mut source = String::new();
    reader
        .read_to_string(&mut source)
        .context("failed to read input stream")?;
    from_str_with_path(&source).context("failed to parse input stream")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_round_trip() {
        let value = load_from_reader(r#"{"a": [1, 2]}"#.as_bytes()).unwrap();
        assert_eq!(value, serde_json::json!({"a": [1, 2]}));
    }

    #[test]
    fn parse_errors_carry_the_json_path() {
        #[derive(serde::Deserialize, Debug)]
        struct Wrapper {
            #[allow(dead_code)]
            count: u32,
        }

        let err = from_str_with_path::<Wrapper>(r#"{"count": "three"}"#).unwrap_err();
        assert!(err.to_string().contains("count"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_from_file("does/not/exist.json").unwrap_err();
        assert!(err.to_string().contains("does/not/exist.json"));
    }
}
