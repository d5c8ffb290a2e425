use std::{any::Any, error::Error};

use crate::StatusCode;

/// Расширение для ошибок библиотеки (object-safe).
///
/// Даёт единый доступ к статус-коду, безопасному сообщению для пользователя,
/// подробному сообщению для логов и тегам для структурированных событий.
pub trait ErrorExt: Error + Send + Sync + 'static {
    /// По умолчанию [`StatusCode::Internal`].
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }

    /// Возвращает ошибку как [`Any`](std::any::Any) для downcast.
    fn as_any(&self) -> &dyn Any;

    /// Сообщение для конечного пользователя (CLI, вызывающий код).
    ///
    /// Для внутренних ошибок детали скрываются.
    fn client_message(&self) -> String {
        match self.status_code() {
            StatusCode::Unknown | StatusCode::Internal | StatusCode::Unexpected => {
                "Internal error".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Детализированное сообщение для логов.
    fn log_message(&self) -> String {
        format!("{self:?}")
    }

    /// Пары ключ–значение для полей `tracing`-событий.
    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        vec![
            ("error_type", self.type_name()),
            ("status_code", self.status_code().to_string()),
        ]
    }

    /// Короткое имя типа ошибки (без пути модулей).
    fn type_name(&self) -> String {
        std::any::type_name::<Self>()
            .split("::")
            .last()
            .unwrap_or("Unknown")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::{any::Any, error::Error, fmt};

    use super::*;

    // Ошибка без переопределения status_code (default = Internal).
    #[derive(Debug)]
    struct DefaultError(pub &'static str);

    impl fmt::Display for DefaultError {
        fn fmt(
            &self,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            write!(f, "DefaultError: {}", self.0)
        }
    }

    impl Error for DefaultError {}

    impl ErrorExt for DefaultError {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct MissingFile(pub &'static str);

    impl fmt::Display for MissingFile {
        fn fmt(
            &self,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            write!(f, "missing file: {}", self.0)
        }
    }

    impl Error for MissingFile {}

    impl ErrorExt for MissingFile {
        fn status_code(&self) -> StatusCode {
            StatusCode::NotFound
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Тест проверяет, что по умолчанию статус ошибки - `Internal`.
    #[test]
    fn test_default_status_code_is_internal() {
        assert_eq!(DefaultError("oops").status_code(), StatusCode::Internal);
    }

    /// Тест проверяет, что для внутренних ошибок детали не попадают в
    /// `client_message`.
    #[test]
    fn test_client_message_internal() {
        let e = DefaultError("sensitive");
        assert_eq!(e.client_message(), "Internal error");
    }

    /// Тест проверяет, что для остальных кодов `client_message` совпадает с
    /// `Display`.
    #[test]
    fn test_client_message_non_internal() {
        let e = MissingFile("data.bin");
        assert_eq!(e.client_message(), e.to_string());
    }

    /// Тест проверяет downcast через `as_any`.
    #[test]
    fn test_as_any_downcast() {
        let e = MissingFile("x");
        let down = e.as_any().downcast_ref::<MissingFile>();
        assert_eq!(down.map(|m| m.0), Some("x"));
    }

    /// Тест проверяет, что `metrics_tags` содержит тип ошибки и код.
    #[test]
    fn test_metrics_tags_contains_expected_pairs() {
        let tags = MissingFile("t").metrics_tags();
        assert!(tags
            .iter()
            .any(|(k, v)| *k == "error_type" && v == "MissingFile"));
        assert!(tags
            .iter()
            .any(|(k, v)| *k == "status_code" && *v == StatusCode::NotFound.to_string()));
    }
}
