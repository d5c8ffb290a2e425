use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "serde")]
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Коды статуса для категоризации ошибок.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 2xxx: Ошибки данных и типов
/// - 5xxx: Хранилище / сжатие
/// - 6xxx: IO
/// - 8xxx: Формат (кодирование/декодирование)
#[cfg_attr(feature = "serde", derive(Serialize_repr, Deserialize_repr))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Unsupported = 1001,
    Unexpected = 1002,
    Internal = 1003,
    InvalidArgs = 1004,

    // === 2xxx: Ошибки данных ===
    NotFound = 2000,
    InvalidData = 2009,
    UnsupportedType = 2010,
    UnknownExtensionTag = 2011,
    ExtensionFailed = 2012,

    // === 5xxx: Хранилище ===
    CorruptedData = 5002,
    CompressionFailed = 5005,
    EmptyStream = 5008,

    // === 6xxx: IO ===
    Io = 6000,
    PermissionDenied = 6008,
    UnexpectedEof = 6007,

    // === 8xxx: Формат ===
    InvalidUtf8 = 8004,
    SizeLimit = 8007,
    DepthLimit = 8008,
    ParseError = 8009,
    EncodingError = 8010,
    DecodingError = 8011,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Возвращает `None`, если значение не соответствует ни одному варианту.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Ошибка вызывающей стороны: неверные аргументы или данные, которые
    /// нельзя закодировать.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgs | Self::UnsupportedType | Self::ExtensionFailed
        )
    }

    /// Ошибка формата потока (диапазон 8xxx).
    pub fn is_format_error(&self) -> bool {
        (8000..=8999).contains(&self.code())
    }

    /// Поток нельзя читать дальше: повреждённые или несовпадающие данные.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::Internal | Self::CorruptedData | Self::CompressionFailed
        )
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::NotFound | Self::EmptyStream => LogLevel::Debug,
            Self::InvalidArgs | Self::UnsupportedType | Self::UnknownExtensionTag => {
                LogLevel::Info
            }
            Self::Internal | Self::CorruptedData | Self::CompressionFailed => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }

    /// Код завершения процесса для CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::NotFound | Self::PermissionDenied | Self::Io => 2,
            Self::InvalidArgs => 64,
            _ => 1,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
