use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling::daily};
use tracing_subscriber::{fmt, registry::LookupSpan, Layer};

use crate::logging::config::FileConfig;

/// Файловый слой с ежедневной ротацией.
///
/// Запись идёт через неблокирующий writer; возвращаемый guard нужно держать
/// до завершения программы, иначе хвост логов потеряется.
pub fn layer_with_config<S>(file: &FileConfig) -> (Box<dyn Layer<S> + Send + Sync>, WorkerGuard)
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let appender = daily(&file.dir, &file.prefix);
    let (writer, guard) = non_blocking(appender);

    let layer = fmt::layer().with_ansi(false).with_writer(writer);

    (Box::new(layer), guard)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;
    use tracing_subscriber::{prelude::*, registry::Registry};

    use super::*;

    /// Тест проверяет, что после сброса guard в каталоге появляется файл.
    #[test]
    fn test_file_layer_writes_into_dir() {
        let dir = tempdir().unwrap();
        let cfg = FileConfig {
            dir: dir.path().to_path_buf(),
            prefix: "test.log".to_string(),
        };

        let (layer, guard) = layer_with_config::<Registry>(&cfg);
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("written to file");
        });
        drop(guard);

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(!entries.is_empty());
    }
}
