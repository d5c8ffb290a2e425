use std::{
    fs::{File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use inpout_error::{InpoutResult, IoOp, StreamError};
use tracing::{debug, error};

use super::{Compression, WriterOptions};

/// Размер буфера записи в файл.
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

enum SinkInner {
    Raw(BufWriter<File>),
    Lz4(lz4::Encoder<BufWriter<File>>),
}

/// Файл, открытый на запись: сырой или внутри LZ4-кадра.
///
/// Кадр закрывается в [`FileSink::finish`]; если до него дело не дошло,
/// это делает `Drop`.
pub struct FileSink {
    path: PathBuf,
    inner: Option<SinkInner>,
    bytes_in: u64,
}

impl FileSink {
    pub(crate) fn open(
        path: &Path,
        options: &WriterOptions,
    ) -> InpoutResult<Self> {
        options.compression.validate()?;

        let mut open = OpenOptions::new();
        open.create(true).write(true);
        if options.append {
            open.append(true);
        } else {
            open.truncate(true);
        }
        let file = open
            .open(path)
            .map_err(|e| StreamError::io(path.display().to_string(), IoOp::Open, &e))?;
        let writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

        let inner = match options.compression {
            Compression::None => SinkInner::Raw(writer),
            Compression::Lz4 { level, block_size } => {
                let encoder = lz4::EncoderBuilder::new()
                    .level(level)
                    .block_size(block_size.to_lz4())
                    .block_mode(lz4::BlockMode::Linked)
                    .block_checksum(lz4::liblz4::BlockChecksum::BlockChecksumEnabled)
                    .checksum(lz4::ContentChecksum::ChecksumEnabled)
                    .build(writer)
                    .map_err(|e| StreamError::io(path.display().to_string(), IoOp::Write, &e))?;
                SinkInner::Lz4(encoder)
            }
        };

        debug!(
            path = %path.display(),
            compression = options.compression.name(),
            append = options.append,
            "Opened stream for writing"
        );

        Ok(Self {
            path: path.to_path_buf(),
            inner: Some(inner),
            bytes_in: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Сколько байт потока (до сжатия) принято.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_in
    }

    /// Закрывает кадр, сбрасывает буфер и синхронизирует файл с диском.
    pub fn finish(mut self) -> InpoutResult<()> {
        self.finalize()
    }

    fn finalize(&mut self) -> InpoutResult<()> {
        let Some(inner) = self.inner.take() else {
            return Ok(());
        };
        let path = self.path.display().to_string();

        let mut writer = match inner {
            SinkInner::Raw(writer) => writer,
            SinkInner::Lz4(encoder) => {
                let (writer, result) = encoder.finish();
                result.map_err(|e| StreamError::io(path.as_str(), IoOp::Write, &e))?;
                writer
            }
        };
        writer
            .flush()
            .map_err(|e| StreamError::io(path.as_str(), IoOp::Flush, &e))?;
        let file = writer
            .into_inner()
            .map_err(|e| StreamError::io(path.as_str(), IoOp::Flush, e.error()))?;
        file.sync_all()
            .map_err(|e| StreamError::io(path.as_str(), IoOp::Sync, &e))?;

        debug!(path = %self.path.display(), bytes = self.bytes_in, "Stream finalized");
        Ok(())
    }

    fn closed_error(&self) -> io::Error {
        let e = io::Error::other("stream already finished");
        StreamError::io(self.path.display().to_string(), IoOp::Write, &e).into()
    }
}

impl Write for FileSink {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<usize> {
        let result = match self.inner.as_mut() {
            Some(SinkInner::Raw(w)) => w.write(buf),
            Some(SinkInner::Lz4(w)) => w.write(buf),
            None => return Err(self.closed_error()),
        };
        match result {
            Ok(n) => {
                self.bytes_in += n as u64;
                Ok(n)
            }
            Err(e) => Err(StreamError::io(self.path.display().to_string(), IoOp::Write, &e).into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = match self.inner.as_mut() {
            Some(SinkInner::Raw(w)) => w.flush(),
            Some(SinkInner::Lz4(w)) => w.flush(),
            None => return Ok(()),
        };
        result.map_err(|e| StreamError::io(self.path.display().to_string(), IoOp::Flush, &e).into())
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if self.inner.is_none() {
            return;
        }
        if let Err(e) = self.finalize() {
            error!(path = %self.path.display(), error = %e, "Failed to finalize stream on drop");
        }
    }
}

impl std::fmt::Debug for FileSink {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let state = match &self.inner {
            Some(SinkInner::Raw(_)) => "raw",
            Some(SinkInner::Lz4(_)) => "lz4",
            None => "finished",
        };
        f.debug_struct("FileSink")
            .field("path", &self.path)
            .field("state", &state)
            .field("bytes_in", &self.bytes_in)
            .finish()
    }
}
