/// Немедленно возвращает ошибку из функции.
///
/// Формы:
/// - `bail!(err)` - готовая ошибка или тип, конвертируемый в `StackError`;
/// - `bail!(code, "msg")` - `GenericError` с кодом и сообщением;
/// - `bail!(code, "fmt {}", arg)` - то же с форматированием.
///
/// ```ignore
/// use inpout_error::{bail, StatusCode};
///
/// fn check_level(level: u32) -> inpout_error::InpoutResult<()> {
///     if level > 12 {
///         bail!(StatusCode::InvalidArgs, "level {} is out of range", level);
///     }
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! bail {
    ($err:expr) => {
        return Err($crate::StackError::from($err))
    };
    ($code:expr, $msg:expr) => {
        return Err($crate::StackError::new(
            $crate::types::GenericError::new($code, $msg)
        ))
    };
    ($code:expr, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::StackError::new(
            $crate::types::GenericError::new($code, format!($fmt, $($arg)*))
        ))
    };
}

/// Проверяет условие и вызывает `bail!`, если оно ложно.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            $crate::bail!($err);
        }
    };
    ($cond:expr, $code:expr, $msg:expr) => {
        if !($cond) {
            $crate::bail!($code, $msg);
        }
    };
    ($cond:expr, $code:expr, $fmt:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($code, $fmt, $($arg)*);
        }
    };
}

/// Добавляет контекст к `Result`, превращая ошибку в `StackError`.
#[macro_export]
macro_rules! context {
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => Ok(val),
            Err(e) => Err($crate::StackError::from(e).context($msg)),
        }
    };
    ($result:expr, $fmt:expr, $($arg:tt)*) => {
        match $result {
            Ok(val) => Ok(val),
            Err(e) => Err($crate::StackError::from(e).context(format!($fmt, $($arg)*))),
        }
    };
}

/// Методы `.context(...)` и `.with_context(...)` для `Result`.
pub trait ResultExt<T> {
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>;

    /// Ленивый вариант: строка строится только при ошибке.
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<crate::StackError>,
{
    #[track_caller]
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
    {
        self.map_err(|e| e.into().context(ctx))
    }

    #[track_caller]
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.into().context(f()))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CodecError, GenericError, InpoutResult, StatusCode};

    #[test]
    fn test_bail_simple() {
        fn example() -> InpoutResult<()> {
            bail!(CodecError::InvalidTag { tag: -1 });
        }

        let err = example().unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidArgs);
    }

    #[test]
    fn test_bail_with_format() {
        fn example(level: u32) -> InpoutResult<()> {
            bail!(StatusCode::InvalidArgs, "Invalid level: {}", level);
        }

        let err = example(42).unwrap_err();
        assert!(err.to_string().contains("Invalid level: 42"));
    }

    #[test]
    fn test_ensure() {
        fn validate(depth: usize) -> InpoutResult<()> {
            ensure!(depth > 0, StatusCode::InvalidArgs, "depth must be positive");
            ensure!(
                depth <= 1024,
                StatusCode::InvalidArgs,
                "depth too large: {}",
                depth
            );
            Ok(())
        }

        assert!(validate(512).is_ok());
        assert!(validate(0).is_err());
        assert!(validate(4096).is_err());
    }

    #[test]
    fn test_result_ext() {
        fn inner() -> Result<(), GenericError> {
            Err(GenericError::new(StatusCode::Internal, "inner error"))
        }

        fn outer() -> InpoutResult<()> {
            inner().context("outer context")?;
            Ok(())
        }

        let err = outer().unwrap_err();
        assert_eq!(err.contexts().len(), 1);
        assert_eq!(err.contexts()[0].message, "outer context");
    }

    /// Тест проверяет, что ленивый контекст вычисляется только при ошибке.
    #[test]
    fn test_with_context_lazy() {
        let mut calls = 0;
        let ok: Result<(), GenericError> = Ok(());
        ok.with_context(|| {
            calls += 1;
            "never"
        })
        .unwrap();
        assert_eq!(calls, 0);

        let failed: Result<(), GenericError> =
            Err(GenericError::new(StatusCode::Io, "disk gone"));
        let err = failed
            .with_context(|| {
                calls += 1;
                "writing"
            })
            .unwrap_err();
        assert_eq!(calls, 1);
        assert_eq!(err.to_string(), "writing: disk gone");
    }

    #[test]
    fn test_context_macro() {
        let r: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ));
        let err = context!(r, "opening {}", "a.bin").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NotFound);
        assert!(err.to_string().starts_with("opening a.bin"));
    }
}
