//! # Config Loader
//!
//! Localiza y carga archivos de configuración JSON para las capas del
//! transporte (mux, ICE, SCTP).
//!
//! ```no_run
//! use config_loader::{find_config_file, load_json};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, Default)]
//! #[serde(default)]
//! struct Mine {
//!     buffer_size: usize,
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let path = find_config_file("transport.json")?;
//!     let config: Mine = load_json(&path)?;
//!     println!("buffer = {}", config.buffer_size);
//!     Ok(())
//! }
//! ```

pub mod error;

pub use error::{ConfigError, Result};

use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Variable de entorno que apunta directamente al archivo de configuración.
pub const CONFIG_PATH_ENV: &str = "RTC_CONFIG_PATH";

/// Carga el contenido de un archivo de configuración.
///
/// No parsea ni valida el contenido.
pub fn load_config_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))
}

/// Parsea un documento JSON en `T`.
///
/// Los campos ausentes toman los valores de `#[serde(default)]` del tipo.
pub fn parse_json<T: DeserializeOwned>(content: &str) -> Result<T> {
    Ok(serde_json::from_str(content)?)
}

/// Carga y parsea un archivo JSON.
pub fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let content = load_config_file(path)?;
    parse_json(&content)
}

/// Busca un archivo de configuración en ubicaciones comunes.
///
/// Busca en el siguiente orden:
/// 1. Variable de entorno `RTC_CONFIG_PATH` (si existe)
/// 2. `./config/{filename}`
/// 3. `./{filename}`
pub fn find_config_file(filename: &str) -> Result<PathBuf> {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        let path_buf = PathBuf::from(&path);
        if path_buf.exists() {
            return Ok(path_buf);
        }
    }

    let candidates = [
        PathBuf::from("./config").join(filename),
        PathBuf::from("./").join(filename),
    ];

    candidates
        .into_iter()
        .find(|p| p.exists())
        .ok_or_else(|| {
            ConfigError::FileNotFound(format!(
                "No se encontró '{}'. Buscado en: {} env var, ./config/{}, ./{}",
                filename, CONFIG_PATH_ENV, filename, filename
            ))
        })
}

/// Busca, carga y parsea un archivo JSON en un solo paso.
pub fn find_and_load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = find_config_file(filename)?;
    load_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(default)]
    struct Sample {
        name: String,
        retries: u32,
    }

    impl Default for Sample {
        fn default() -> Self {
            Self {
                name: "default".to_string(),
                retries: 8,
            }
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = load_config_file("/path/that/does/not/exist.json");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_find_nonexistent_file() {
        let result = find_config_file("file_that_definitely_does_not_exist_12345.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_json_partial_document_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.json");
        fs::write(&path, r#"{ "retries": 3 }"#).unwrap();

        let sample: Sample = load_json(&path).unwrap();
        assert_eq!(
            sample,
            Sample {
                name: "default".to_string(),
                retries: 3
            }
        );
    }

    #[test]
    fn test_parse_json_reports_syntax_errors() {
        let result: Result<Sample> = parse_json("{ retries: ");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
