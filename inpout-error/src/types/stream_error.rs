use std::any::Any;

use crate::{io_status_code, ErrorExt, StatusCode};

/// Операция над файлом, на которой произошла IO-ошибка.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Open,
    Read,
    Write,
    Flush,
    Sync,
}

/// Ошибки файлового потока и адаптера сжатия.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Сжатый поток повреждён, обрезан или не является LZ4-кадром.
    CorruptStream {
        path: Option<String>,
        reason: String,
    },

    /// Ошибка операционной системы при работе с файлом.
    Io {
        path: String,
        op: IoOp,
        kind: std::io::ErrorKind,
        message: String,
    },

    /// Уровень сжатия вне допустимого диапазона.
    InvalidLevel { level: u32, max: u32 },

    /// Файл не содержит ни одного значения.
    EmptyStream { path: String },
}

impl StreamError {
    pub fn corrupt(
        path: Option<&str>,
        reason: impl Into<String>,
    ) -> Self {
        Self::CorruptStream {
            path: path.map(str::to_string),
            reason: reason.into(),
        }
    }

    pub fn io(
        path: impl Into<String>,
        op: IoOp,
        err: &std::io::Error,
    ) -> Self {
        Self::Io {
            path: path.into(),
            op,
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn recovery_hint(&self) -> Option<&'static str> {
        match self {
            Self::CorruptStream { .. } => Some(
                "File may be truncated, damaged, or written with a different compression setting",
            ),
            Self::InvalidLevel { .. } => Some("Use a compression level between 0 and 12"),
            _ => None,
        }
    }
}

impl std::fmt::Display for IoOp {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Read => "read",
            Self::Write => "write",
            Self::Flush => "flush",
            Self::Sync => "sync",
        };
        f.write_str(name)
    }
}

impl std::fmt::Display for StreamError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::CorruptStream { path, reason } => {
                write!(f, "Corrupt stream: {reason}")?;
                if let Some(p) = path {
                    write!(f, " [path: {p}]")?;
                }
                Ok(())
            }
            Self::Io {
                path,
                op,
                message,
                ..
            } => write!(f, "Failed to {op} {path}: {message}"),
            Self::InvalidLevel { level, max } => {
                write!(f, "Invalid compression level {level} (max: {max})")
            }
            Self::EmptyStream { path } => write!(f, "No value stored in {path}"),
        }
    }
}

impl std::error::Error for StreamError {}

impl ErrorExt for StreamError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::CorruptStream { .. } => StatusCode::CorruptedData,
            Self::Io { kind, .. } => io_status_code(*kind),
            Self::InvalidLevel { .. } => StatusCode::InvalidArgs,
            Self::EmptyStream { .. } => StatusCode::EmptyStream,
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
        if let Self::Io { op, .. } = self {
            tags.push(("io_op", op.to_string()));
        }
        tags
    }
}

/// Упаковывает ошибку в `io::Error`, чтобы вернуть её из `Read`/`Write`.
///
/// `From<io::Error> for StackError` извлекает её обратно.
impl From<StreamError> for std::io::Error {
    fn from(e: StreamError) -> Self {
        let kind = match &e {
            StreamError::CorruptStream { .. } => std::io::ErrorKind::InvalidData,
            StreamError::Io { kind, .. } => *kind,
            StreamError::InvalidLevel { .. } => std::io::ErrorKind::InvalidInput,
            StreamError::EmptyStream { .. } => std::io::ErrorKind::UnexpectedEof,
        };
        std::io::Error::new(kind, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет, что Io сохраняет статус по виду ошибки ОС.
    #[test]
    fn test_io_status_follows_kind() {
        let not_found = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = StreamError::io("missing.bin", IoOp::Open, &not_found);
        assert_eq!(err.status_code(), StatusCode::NotFound);
        assert_eq!(
            err.to_string(),
            "Failed to open missing.bin: gone"
        );

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err = StreamError::io("/root/x", IoOp::Write, &denied);
        assert_eq!(err.status_code(), StatusCode::PermissionDenied);
    }

    #[test]
    fn test_corrupt_display() {
        let err = StreamError::corrupt(Some("d.lz4"), "truncated frame");
        assert_eq!(
            err.to_string(),
            "Corrupt stream: truncated frame [path: d.lz4]"
        );
        assert!(err.status_code().is_critical());
    }

    #[test]
    fn test_metrics_tags_include_op() {
        let err = StreamError::io(
            "f",
            IoOp::Sync,
            &std::io::Error::other("eio"),
        );
        assert!(err
            .metrics_tags()
            .iter()
            .any(|(k, v)| *k == "io_op" && v == "sync"));
    }
}
