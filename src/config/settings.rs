use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use inpout_error::{GenericError, InpoutResult, StackError, StatusCode};
use serde::{Deserialize, Serialize};

use crate::{
    codec::{DecodeLimits, DEFAULT_MAX_DEPTH, DEFAULT_MAX_LEN},
    compression::{BlockSize, Compression, DEFAULT_LEVEL, LZ4_MAX_LEVEL},
    logging::LogFormat,
};

/// Имя файла настроек без расширения (ищется в текущем каталоге).
pub const CONFIG_FILE_NAME: &str = "inpout";

/// Префикс переменных окружения.
pub const ENV_PREFIX: &str = "INPOUT";

/// Настройки сохранения, загрузки и логирования.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Сжимать поток LZ4.
    pub compression: bool,
    /// Уровень сжатия LZ4 (0..=12).
    pub level: u32,
    /// Размер блока LZ4 в килобайтах: 64, 256, 1024 или 4096.
    pub block_size_kb: u32,
    pub max_depth: usize,
    pub max_len: u64,
    /// Директива фильтра логов (например, `warn` или `inpout=debug`).
    pub log_level: String,
    pub log_format: LogFormat,
    /// Каталог для файла логов с ежедневной ротацией; `None` - только stderr.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            compression: true,
            level: DEFAULT_LEVEL,
            block_size_kb: 64,
            max_depth: DEFAULT_MAX_DEPTH,
            max_len: DEFAULT_MAX_LEN,
            log_level: "warn".to_string(),
            log_format: LogFormat::Compact,
            log_dir: None,
        }
    }
}

impl Settings {
    /// Загружает настройки: умолчания, необязательный `inpout.toml`,
    /// затем `INPOUT_*` из окружения.
    pub fn load() -> InpoutResult<Self> {
        Self::build(None, None)
    }

    /// То же, что [`Settings::load`], но файл задаётся явно и обязателен.
    pub fn load_from(path: impl AsRef<Path>) -> InpoutResult<Self> {
        Self::build(Some(path.as_ref()), None)
    }

    fn build(
        file: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> InpoutResult<Self> {
        let defaults = Settings::default();
        let builder = Config::builder()
            // Значения по умолчанию
            .set_default("compression", defaults.compression)
            .and_then(|b| b.set_default("level", defaults.level as i64))
            .and_then(|b| b.set_default("block_size_kb", defaults.block_size_kb as i64))
            .and_then(|b| b.set_default("max_depth", defaults.max_depth as i64))
            .and_then(|b| b.set_default("max_len", defaults.max_len as i64))
            .and_then(|b| b.set_default("log_level", defaults.log_level.clone()))
            .and_then(|b| b.set_default("log_format", "compact"))
            .map_err(config_error)?;

        let builder = match file {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(CONFIG_FILE_NAME).required(false)),
        };

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .and_then(Config::try_deserialize)
            .map_err(config_error)?;

        settings.validate()?;
        Ok(settings)
    }

    /// Проверяет значения, которые не выражаются типами.
    pub fn validate(&self) -> InpoutResult<()> {
        if self.level > LZ4_MAX_LEVEL {
            return Err(invalid(format!(
                "level must be in 0..={LZ4_MAX_LEVEL}, got {}",
                self.level
            )));
        }
        if BlockSize::from_kb(self.block_size_kb).is_none() {
            return Err(invalid(format!(
                "block_size_kb must be one of 64, 256, 1024, 4096; got {}",
                self.block_size_kb
            )));
        }
        if self.max_depth == 0 {
            return Err(invalid("max_depth must be positive"));
        }
        if self
            .log_dir
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            return Err(invalid("log_dir must not be empty"));
        }
        Ok(())
    }

    /// Способ сжатия для записи.
    pub fn compression(&self) -> Compression {
        if !self.compression {
            return Compression::None;
        }
        Compression::Lz4 {
            level: self.level,
            block_size: BlockSize::from_kb(self.block_size_kb).unwrap_or_default(),
        }
    }

    pub fn limits(&self) -> DecodeLimits {
        DecodeLimits {
            max_depth: self.max_depth,
            max_len: self.max_len,
        }
    }
}

fn config_error(e: ConfigError) -> StackError {
    GenericError::new(StatusCode::ParseError, format!("Configuration error: {e}")).into()
}

fn invalid(message: impl Into<String>) -> StackError {
    GenericError::new(StatusCode::InvalidArgs, message).into()
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
