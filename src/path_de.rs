use serde::de::DeserializeOwned;

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, String> {
    let de = &mut serde_json::Deserializer::from_str(src);
    match serde_path_to_error::deserialize::<_, T>(de) {
        Ok(v) => Ok(v),
        Err(err) => {
            let path = err.path().to_string();
            Err(format!("at JSON path {path} → {}", err.into_inner()))
        }
    }
}

/// Read and deserialize a JSON file, naming the file and JSON path on error.
pub fn from_file_with_path<T: DeserializeOwned>(path: &std::path::Path) -> Result<T, String> {
    let src = std::fs::read_to_string(path)
        .map_err(|error| format!("failed to read {}: {error}", path.display()))?;
    from_str_with_path(&src).map_err(|error| format!("{}: {error}", path.display()))
}
