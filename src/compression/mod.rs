//! Адаптер сжатия: открытие файлов потока с LZ4 или без.
//!
//! Запись идёт в LZ4-кадры (контрольные суммы блоков и содержимого
//! включены, связанные блоки). Дозапись добавляет новый кадр в конец файла, а чтение
//! проходит все кадры по порядку.

mod frame;
mod options;
mod sink;
mod source;

use std::path::Path;

use inpout_error::InpoutResult;

pub use options::{BlockSize, Compression, WriterOptions, DEFAULT_LEVEL, LZ4_MAX_LEVEL};
pub use sink::FileSink;
pub use source::FileSource;

/// Открывает файл на запись.
pub fn open_writer(
    path: impl AsRef<Path>,
    options: &WriterOptions,
) -> InpoutResult<FileSink> {
    FileSink::open(path.as_ref(), options)
}

/// Открывает файл на чтение.
///
/// Для `compression` важен только сам факт сжатия: уровень и размер блока
/// записаны в заголовке кадра.
pub fn open_reader(
    path: impl AsRef<Path>,
    compression: &Compression,
) -> InpoutResult<FileSource> {
    FileSource::open(path.as_ref(), compression)
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
