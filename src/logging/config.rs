use std::{fmt, path::PathBuf, str::FromStr};

use inpout_error::{GenericError, InpoutResult, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::Settings;

/// Формат вывода событий.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = GenericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(GenericError::new(
                StatusCode::InvalidArgs,
                format!("Unknown log format '{other}' (expected pretty, compact or json)"),
            )),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        };
        f.write_str(name)
    }
}

/// Настройки вывода в консоль (stderr).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_line_numbers: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: LogFormat::Compact,
            with_ansi: true,
            with_target: true,
            with_line_numbers: false,
        }
    }
}

/// Настройки файла с ежедневной ротацией.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileConfig {
    pub dir: PathBuf,
    /// Префикс имени файла; к нему добавляется дата.
    pub prefix: String,
}

/// Префикс файла логов по умолчанию.
pub const DEFAULT_LOG_PREFIX: &str = "inpout.log";

impl FileConfig {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: DEFAULT_LOG_PREFIX.to_string(),
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self::in_dir("logs")
    }
}

/// Конфигурация логирования.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Директива `EnvFilter`; `RUST_LOG` имеет приоритет.
    pub level: String,
    pub console: ConsoleConfig,
    /// `None` - файл не пишется.
    pub file: Option<FileConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            console: ConsoleConfig::default(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn build_filter_directive(&self) -> String {
        self.level.trim().to_string()
    }

    pub fn validate(&self) -> InpoutResult<()> {
        if self.build_filter_directive().is_empty() {
            return Err(GenericError::new(StatusCode::InvalidArgs, "Log level must not be empty").into());
        }
        if let Some(file) = &self.file {
            if file.prefix.is_empty() {
                return Err(GenericError::new(
                    StatusCode::InvalidArgs,
                    "Log file prefix must not be empty",
                )
                .into());
            }
        }
        Ok(())
    }

    /// Создаёт каталог для файла логов, если он нужен.
    pub fn ensure_log_dir(&self) -> InpoutResult<()> {
        if let Some(file) = &self.file {
            std::fs::create_dir_all(&file.dir)?;
        }
        Ok(())
    }
}

impl From<&Settings> for LoggingConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            level: settings.log_level.clone(),
            console: ConsoleConfig {
                format: settings.log_format,
                ..ConsoleConfig::default()
            },
            file: settings.log_dir.clone().map(FileConfig::in_dir),
        }
    }
}
