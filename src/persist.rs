//! Фасад сохранения и загрузки.
//!
//! Связывает кодек с адаптером сжатия: одно значение или
//! последовательность значений в файле, сырой поток или LZ4.
//!
//! ```no_run
//! use inpout::{load_many, save_many, LoadOptions, SaveOptions, Value};
//!
//! let values = vec![Value::from(1), Value::from("a")];
//! save_many(&values, "data.mpk.lz4", &SaveOptions::default())?;
//! for value in load_many("data.mpk.lz4", &LoadOptions::default())? {
//!     println!("{}", value?);
//! }
//! # Ok::<(), inpout_error::StackError>(())
//! ```

use std::{borrow::Borrow, path::Path};

use inpout_error::{InpoutResult, ResultExt, StreamError};
use tracing::debug;

use crate::{
    codec::{Codec, DecodeLimits, Decoder},
    compression::{self, BlockSize, Compression, FileSource, WriterOptions, DEFAULT_LEVEL},
    config::Settings,
    Value,
};

/// Параметры сохранения.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Сжимать LZ4.
    pub compression: bool,
    /// Уровень сжатия; `None` - максимальный.
    pub level: Option<u32>,
    /// Дописать в конец файла вместо перезаписи.
    pub append: bool,
    pub block_size: BlockSize,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            compression: true,
            level: None,
            append: false,
            block_size: BlockSize::default(),
        }
    }
}

impl SaveOptions {
    /// Сырой поток без сжатия.
    pub fn raw() -> Self {
        Self {
            compression: false,
            ..Self::default()
        }
    }

    pub fn appending(mut self) -> Self {
        self.append = true;
        self
    }

    fn writer_options(&self) -> WriterOptions {
        let compression = if self.compression {
            Compression::Lz4 {
                level: self.level.unwrap_or(DEFAULT_LEVEL),
                block_size: self.block_size,
            }
        } else {
            Compression::None
        };
        WriterOptions {
            compression,
            append: self.append,
        }
    }
}

impl From<&Settings> for SaveOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            compression: settings.compression,
            level: Some(settings.level),
            append: false,
            block_size: BlockSize::from_kb(settings.block_size_kb).unwrap_or_default(),
        }
    }
}

/// Параметры загрузки.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Файл записан со сжатием LZ4.
    pub compression: bool,
    pub limits: DecodeLimits,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            compression: true,
            limits: DecodeLimits::default(),
        }
    }
}

impl LoadOptions {
    pub fn raw() -> Self {
        Self {
            compression: false,
            ..Self::default()
        }
    }

    fn compression(&self) -> Compression {
        if self.compression {
            Compression::lz4()
        } else {
            Compression::None
        }
    }
}

impl From<&Settings> for LoadOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            compression: settings.compression,
            limits: settings.limits(),
        }
    }
}

/// Сохраняет одно значение.
pub fn save_one(
    value: &Value,
    path: impl AsRef<Path>,
    options: &SaveOptions,
) -> InpoutResult<()> {
    save_many(std::iter::once(value), path, options)
        .map(|_| ())
        .context("save_one")
}

/// Сохраняет значения в порядке итерации одним потоком.
///
/// Возвращает число записанных значений. Если значение не удалось
/// закодировать, поток всё равно корректно закрывается: в файле остаются
/// значения, записанные до ошибки, а ошибка возвращается вызывающему.
pub fn save_many<I>(
    values: I,
    path: impl AsRef<Path>,
    options: &SaveOptions,
) -> InpoutResult<u64>
where
    I: IntoIterator,
    I::Item: Borrow<Value>,
{
    let path = path.as_ref();
    let writer_options = options.writer_options();
    let mut sink = compression::open_writer(path, &writer_options)?;
    let mut encoder = Codec::global().make_encoder();

    let written = values
        .into_iter()
        .enumerate()
        .try_for_each(|(i, value)| {
            encoder
                .encode_into(value.borrow(), &mut sink)
                .with_context(|| format!("writing value #{i} to {}", path.display()))
        });

    // Закрываем кадр в любом случае, чтобы уже записанное осталось читаемым.
    let finished = sink.finish();
    written?;
    finished?;

    debug!(
        path = %path.display(),
        compression = writer_options.compression.name(),
        append = options.append,
        values = encoder.values_written(),
        bytes = encoder.bytes_written(),
        "Values saved"
    );
    Ok(encoder.values_written())
}

/// Загружает первое значение из файла.
///
/// Пустой файл - ошибка `EmptyStream`.
pub fn load_one(
    path: impl AsRef<Path>,
    options: &LoadOptions,
) -> InpoutResult<Value> {
    let path = path.as_ref();
    let mut iter = load_many(path, options).context("load_one")?;
    match iter.next() {
        Some(value) => value.context("load_one: reading first value"),
        None => Err(StreamError::EmptyStream {
            path: path.display().to_string(),
        }
        .into()),
    }
}

/// Открывает файл и возвращает ленивый итератор значений.
///
/// Итератор конечный, не перезапускается и после первой ошибки больше
/// ничего не возвращает. Файл закрывается при удалении итератора.
pub fn load_many(
    path: impl AsRef<Path>,
    options: &LoadOptions,
) -> InpoutResult<ValueIter> {
    let path = path.as_ref();
    let source = compression::open_reader(path, &options.compression())?;
    let codec = Codec::global().with_limits(options.limits);

    debug!(
        path = %path.display(),
        compression = options.compression().name(),
        "Loading values"
    );
    Ok(ValueIter {
        decoder: codec.make_decoder(source),
        finished: false,
    })
}

/// Ленивый итератор значений из файла.
pub struct ValueIter {
    decoder: Decoder<FileSource>,
    finished: bool,
}

impl ValueIter {
    /// Сколько значений уже прочитано.
    pub fn values_read(&self) -> u64 {
        self.decoder.values_read()
    }

    pub fn path(&self) -> &Path {
        self.decoder.get_ref().path()
    }
}

impl Iterator for ValueIter {
    type Item = InpoutResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.decoder.next();
        if item.is_none() && !self.finished {
            self.finished = true;
            debug!(
                path = %self.path().display(),
                values = self.decoder.values_read(),
                "Finished loading values"
            );
        }
        item
    }
}

impl std::iter::FusedIterator for ValueIter {}

impl std::fmt::Debug for ValueIter {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ValueIter")
            .field("source", self.decoder.get_ref())
            .field("values_read", &self.decoder.values_read())
            .field("offset", &self.decoder.offset())
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
