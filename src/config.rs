use crate::error::AppError;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::Level;

const ENV_PREFIX: &str = "ANIMAL_ID";
const CONFIG_PATH_VAR: &str = "ANIMAL_ID_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "config/default";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub model: ModelSettings,
    pub uploads: UploadSettings,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub path: PathBuf,
    pub labels_path: PathBuf,
    pub input_size: u32,
    pub layout: TensorLayout,
    pub normalization: Normalization,
    /// Set when the model emits raw logits rather than probabilities.
    pub apply_softmax: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub dir: PathBuf,
    /// Keep stored uploads on disk after the request completes.
    pub retain: bool,
}

/// Memory order of the model input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// [batch, height, width, channels]
    Nhwc,
    /// [batch, channels, height, width]
    Nchw,
}

/// Pixel value convention the model was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// RGB scaled to [-1, 1].
    MobileNet,
    /// BGR with ImageNet channel means subtracted, no scaling.
    Caffe,
    /// RGB scaled to [0, 1] then standardized with ImageNet mean/std.
    Torch,
    /// RGB scaled to [0, 1].
    Unit,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            model: ModelSettings::default(),
            uploads: UploadSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/mobilenet_v2.onnx"),
            labels_path: PathBuf::from("models/imagenet_labels.txt"),
            input_size: 224,
            layout: TensorLayout::Nhwc,
            normalization: Normalization::MobileNet,
            apply_softmax: true,
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
            retain: false,
        }
    }
}

impl Settings {
    /// Loads settings from `config/default.*`, the file named by
    /// `ANIMAL_ID_CONFIG` and `ANIMAL_ID__SECTION__KEY` environment
    /// variables, in increasing order of precedence.
    pub fn load() -> Result<Self, AppError> {
        let extra = std::env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from);
        Self::from_sources(extra.as_deref())
    }

    pub fn from_sources(extra_file: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false));
        if let Some(path) = extra_file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.server.port == 0 {
            return Err(AppError::InvalidConfig(
                "server.port must be greater than 0".to_string(),
            ));
        }

        if self.server.max_upload_bytes == 0 {
            return Err(AppError::InvalidConfig(
                "server.max_upload_bytes must be greater than 0".to_string(),
            ));
        }

        if self.model.input_size == 0 {
            return Err(AppError::InvalidConfig(
                "model.input_size must be greater than 0".to_string(),
            ));
        }

        if self.model.path.as_os_str().is_empty() || self.model.labels_path.as_os_str().is_empty()
        {
            return Err(AppError::InvalidConfig(
                "model.path and model.labels_path must be set".to_string(),
            ));
        }

        if self.uploads.dir.as_os_str().is_empty() {
            return Err(AppError::InvalidConfig("uploads.dir must be set".to_string()));
        }

        self.log_level()?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<Level, AppError> {
        Level::from_str(&self.log_level)
            .map_err(|_| AppError::InvalidConfig(format!("unknown log level '{}'", self.log_level)))
    }

    pub fn bind_address(&self) -> Result<SocketAddr, AppError> {
        let address = format!("{}:{}", self.server.host, self.server.port);
        address
            .parse()
            .map_err(|_| AppError::InvalidConfig(format!("invalid bind address '{}'", address)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.model.input_size, 224);
        assert_eq!(settings.model.layout, TensorLayout::Nhwc);
        assert_eq!(settings.bind_address().unwrap().port(), 5000);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "log_level = \"debug\"\n[server]\nport = 8080\n[model]\nlayout = \"nchw\"\nnormalization = \"torch\"\n[uploads]\nretain = true"
        )
        .unwrap();

        let settings = Settings::from_sources(Some(file.path())).unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.model.layout, TensorLayout::Nchw);
        assert_eq!(settings.model.normalization, Normalization::Torch);
        assert!(settings.uploads.retain);
        assert_eq!(settings.log_level().unwrap(), Level::DEBUG);
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut settings = Settings::default();
        settings.server.port = 0;
        assert!(matches!(settings.validate(), Err(AppError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let settings = Settings {
            log_level: "chatty".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }
}
