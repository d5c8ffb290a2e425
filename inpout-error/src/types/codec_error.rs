use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибки бинарного кодека (кодирование и декодирование значений).
///
/// Поле `offset` - позиция в декодируемом потоке, если она известна.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Значение расширения, чей Rust-тип не зарегистрирован.
    UnsupportedType { kind: String },

    /// В потоке встретился тег расширения без зарегистрированного декодера.
    UnknownExtensionTag { tag: i8, offset: Option<u64> },

    /// Тег вне допустимого для регистрации диапазона `0..=127`.
    InvalidTag { tag: i8 },

    /// Байты не образуют корректное значение.
    Malformed { reason: String, offset: Option<u64> },

    /// Поток закончился посреди значения.
    UnexpectedEof {
        context: String,
        offset: Option<u64>,
    },

    /// Объявленная длина превышает лимит декодера или формата.
    SizeLimit {
        what: String,
        size: u64,
        limit: u64,
        offset: Option<u64>,
    },

    /// Превышена глубина вложенности массивов/словарей/расширений.
    DepthLimit { limit: usize, offset: Option<u64> },

    /// После единственного значения остались байты.
    TrailingBytes { consumed: u64, total: u64 },

    /// Строка не является корректным UTF-8.
    InvalidUtf8 { offset: Option<u64> },

    /// Полезная нагрузка расширения не соответствует ожидаемой форме.
    ExtensionPayload { tag: i8, reason: String },
}

impl CodecError {
    pub fn unknown_tag(
        tag: i8,
        offset: Option<u64>,
    ) -> Self {
        Self::UnknownExtensionTag { tag, offset }
    }

    pub fn unexpected_eof(
        context: impl Into<String>,
        offset: u64,
    ) -> Self {
        Self::UnexpectedEof {
            context: context.into(),
            offset: Some(offset),
        }
    }

    pub fn malformed(
        reason: impl Into<String>,
        offset: u64,
    ) -> Self {
        Self::Malformed {
            reason: reason.into(),
            offset: Some(offset),
        }
    }

    pub fn extension_payload(
        tag: i8,
        reason: impl Into<String>,
    ) -> Self {
        Self::ExtensionPayload {
            tag,
            reason: reason.into(),
        }
    }

    /// Добавляет позицию в потоке, если её ещё нет.
    pub fn with_offset(
        mut self,
        offset: u64,
    ) -> Self {
        match &mut self {
            Self::UnknownExtensionTag { offset: o, .. }
            | Self::Malformed { offset: o, .. }
            | Self::UnexpectedEof { offset: o, .. }
            | Self::SizeLimit { offset: o, .. }
            | Self::DepthLimit { offset: o, .. }
            | Self::InvalidUtf8 { offset: o } => {
                o.get_or_insert(offset);
            }
            _ => {}
        }
        self
    }

    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::UnknownExtensionTag { offset, .. }
            | Self::Malformed { offset, .. }
            | Self::UnexpectedEof { offset, .. }
            | Self::SizeLimit { offset, .. }
            | Self::DepthLimit { offset, .. }
            | Self::InvalidUtf8 { offset } => *offset,
            _ => None,
        }
    }

    pub fn recovery_hint(&self) -> Option<&'static str> {
        match self {
            Self::UnsupportedType { .. } => {
                Some("Register an encoder for this type before saving")
            }
            Self::UnknownExtensionTag { .. } => {
                Some("Register a decoder for this tag before loading")
            }
            Self::UnexpectedEof { .. } => Some("File may be truncated"),
            Self::SizeLimit { .. } | Self::DepthLimit { .. } => {
                Some("Raise the decoder limits if the data is trusted")
            }
            Self::Malformed { .. } => {
                Some("Check that the compression flag matches how the file was written")
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for CodecError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::UnsupportedType { kind } => {
                write!(f, "Unsupported type: no encoder registered for {kind}")
            }
            Self::UnknownExtensionTag { tag, offset } => {
                write!(f, "Unknown extension tag {tag}")?;
                write_offset(f, *offset)
            }
            Self::InvalidTag { tag } => {
                write!(f, "Invalid extension tag {tag} (allowed: 0..=127)")
            }
            Self::Malformed { reason, offset } => {
                write!(f, "Malformed data: {reason}")?;
                write_offset(f, *offset)
            }
            Self::UnexpectedEof { context, offset } => {
                write!(f, "Unexpected end of data while reading {context}")?;
                write_offset(f, *offset)
            }
            Self::SizeLimit {
                what,
                size,
                limit,
                offset,
            } => {
                write!(f, "{what} length {size} exceeds limit {limit}")?;
                write_offset(f, *offset)
            }
            Self::DepthLimit { limit, offset } => {
                write!(f, "Nesting depth exceeds limit {limit}")?;
                write_offset(f, *offset)
            }
            Self::TrailingBytes { consumed, total } => {
                write!(
                    f,
                    "Trailing bytes: value ends at {consumed}, input has {total} bytes"
                )
            }
            Self::InvalidUtf8 { offset } => {
                write!(f, "String is not valid UTF-8")?;
                write_offset(f, *offset)
            }
            Self::ExtensionPayload { tag, reason } => {
                write!(f, "Bad payload for extension tag {tag}: {reason}")
            }
        }
    }
}

fn write_offset(
    f: &mut std::fmt::Formatter<'_>,
    offset: Option<u64>,
) -> std::fmt::Result {
    if let Some(o) = offset {
        write!(f, " [offset: 0x{o:X}]")?;
    }
    Ok(())
}

impl std::error::Error for CodecError {}

impl ErrorExt for CodecError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedType { .. } => StatusCode::UnsupportedType,
            Self::UnknownExtensionTag { .. } => StatusCode::UnknownExtensionTag,
            Self::InvalidTag { .. } => StatusCode::InvalidArgs,
            Self::Malformed { .. } => StatusCode::DecodingError,
            Self::UnexpectedEof { .. } => StatusCode::UnexpectedEof,
            Self::SizeLimit { .. } => StatusCode::SizeLimit,
            Self::DepthLimit { .. } => StatusCode::DepthLimit,
            Self::TrailingBytes { .. } => StatusCode::InvalidData,
            Self::InvalidUtf8 { .. } => StatusCode::InvalidUtf8,
            Self::ExtensionPayload { .. } => StatusCode::ExtensionFailed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn log_message(&self) -> String {
        let mut msg = format!("{self:?}");
        if let Some(hint) = self.recovery_hint() {
            msg.push_str(&format!(" | Hint: {hint}"));
        }
        msg
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", self.type_name()),
            ("status_code", self.status_code().to_string()),
        ];
        match self {
            Self::UnknownExtensionTag { tag, .. }
            | Self::InvalidTag { tag }
            | Self::ExtensionPayload { tag, .. } => {
                tags.push(("ext_tag", tag.to_string()));
            }
            Self::UnsupportedType { kind } => {
                tags.push(("kind", kind.clone()));
            }
            Self::SizeLimit { what, .. } => {
                tags.push(("limit_type", what.clone()));
            }
            _ => {}
        }
        tags
    }
}

impl From<CodecError> for std::io::Error {
    fn from(e: CodecError) -> Self {
        let kind = match &e {
            CodecError::UnexpectedEof { .. } => std::io::ErrorKind::UnexpectedEof,
            CodecError::InvalidTag { .. } | CodecError::UnsupportedType { .. } => {
                std::io::ErrorKind::InvalidInput
            }
            _ => std::io::ErrorKind::InvalidData,
        };
        std::io::Error::new(kind, e)
    }
}
