pub mod codec_error;
pub mod stream_error;

pub use codec_error::*;
pub use stream_error::*;

use crate::{ErrorExt, StatusCode};

/// Универсальная ошибка с кодом и сообщением.
#[derive(Debug, Clone)]
pub struct GenericError {
    code: StatusCode,
    message: String,
}

impl GenericError {
    pub fn new(
        code: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for GenericError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for GenericError {}

impl ErrorExt for GenericError {
    fn status_code(&self) -> StatusCode {
        self.code
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Код статуса для вида IO-ошибки.
pub fn io_status_code(kind: std::io::ErrorKind) -> StatusCode {
    match kind {
        std::io::ErrorKind::NotFound => StatusCode::NotFound,
        std::io::ErrorKind::PermissionDenied => StatusCode::PermissionDenied,
        std::io::ErrorKind::UnexpectedEof => StatusCode::UnexpectedEof,
        std::io::ErrorKind::InvalidData => StatusCode::InvalidData,
        _ => StatusCode::Io,
    }
}

/// Конвертация из std::io::Error.
///
/// Ошибки библиотеки, упакованные в `io::Error` (например, из `Read` у
/// распаковщика), извлекаются обратно с исходным типом.
impl From<std::io::Error> for crate::StackError {
    fn from(err: std::io::Error) -> Self {
        let code = io_status_code(err.kind());
        if err
            .get_ref()
            .is_some_and(|inner| inner.is::<StreamError>() || inner.is::<CodecError>())
        {
            let message = err.to_string();
            if let Some(inner) = err.into_inner() {
                let inner = match inner.downcast::<StreamError>() {
                    Ok(stream) => return crate::StackError::new(*stream),
                    Err(other) => other,
                };
                if let Ok(codec) = inner.downcast::<CodecError>() {
                    return crate::StackError::new(*codec);
                }
            }
            return crate::StackError::new(GenericError::new(code, message));
        }

        crate::StackError::new(GenericError::new(code, err.to_string()))
    }
}

impl From<std::str::Utf8Error> for crate::StackError {
    fn from(err: std::str::Utf8Error) -> Self {
        crate::StackError::new(GenericError::new(
            StatusCode::InvalidUtf8,
            format!("UTF-8 decoding failed: {err}"),
        ))
    }
}

impl From<std::string::FromUtf8Error> for crate::StackError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        crate::StackError::new(GenericError::new(
            StatusCode::InvalidUtf8,
            format!("UTF-8 conversion failed: {err}"),
        ))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
