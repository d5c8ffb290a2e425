use std::{
    fs::File,
    io::{self, BufRead, BufReader, Read},
    path::{Path, PathBuf},
};

use inpout_error::{InpoutResult, IoOp, StreamError};
use tracing::{debug, warn};

use super::{
    frame::{self, FrameReader},
    Compression,
};

/// Размер буфера чтения из файла.
const READ_BUFFER_SIZE: usize = 64 * 1024;

enum SourceInner {
    Raw(BufReader<File>),
    /// `None` - все кадры прочитаны.
    Lz4(Option<lz4::Decoder<FrameReader<BufReader<File>>>>),
}

/// Файл, открытый на чтение: сырой поток или последовательность LZ4-кадров.
///
/// После ошибки источник «отравлен»: все последующие чтения возвращают
/// конец потока.
pub struct FileSource {
    path: PathBuf,
    inner: SourceInner,
    poisoned: bool,
    bytes_out: u64,
}

impl FileSource {
    pub(crate) fn open(
        path: &Path,
        compression: &Compression,
    ) -> InpoutResult<Self> {
        let path_str = path.display().to_string();
        let file = File::open(path).map_err(|e| StreamError::io(path_str.as_str(), IoOp::Open, &e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
        let head = reader
            .fill_buf()
            .map_err(|e| StreamError::io(path_str.as_str(), IoOp::Read, &e))?;

        let inner = if compression.is_compressed() {
            if head.is_empty() {
                SourceInner::Lz4(None)
            } else {
                let decoder = lz4::Decoder::new(FrameReader::new(reader)).map_err(|e| {
                    StreamError::corrupt(Some(&path_str), format!("cannot start LZ4 decoder: {e}"))
                })?;
                SourceInner::Lz4(Some(decoder))
            }
        } else {
            if frame::is_frame_header(head) {
                return Err(StreamError::corrupt(
                    Some(&path_str),
                    "input looks like an LZ4 frame; open it with compression enabled",
                )
                .into());
            }
            SourceInner::Raw(reader)
        };

        debug!(path = %path_str, compression = compression.name(), "Opened stream for reading");

        Ok(Self {
            path: path.to_path_buf(),
            inner,
            poisoned: false,
            bytes_out: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Сколько байт потока (после распаковки) выдано.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_out
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Читает до `n` байт; меньше - только в конце потока.
    pub fn read_chunk(
        &mut self,
        n: usize,
    ) -> InpoutResult<Vec<u8>> {
        let mut chunk = Vec::with_capacity(n.min(READ_BUFFER_SIZE));
        self.by_ref().take(n as u64).read_to_end(&mut chunk)?;
        Ok(chunk)
    }

    /// Читает поток до конца.
    pub fn read_all(&mut self) -> InpoutResult<Vec<u8>> {
        let mut all = Vec::new();
        self.read_to_end(&mut all)?;
        Ok(all)
    }

    fn read_inner(
        &mut self,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        match &mut self.inner {
            SourceInner::Raw(reader) => reader.read(buf).map_err(|e| {
                StreamError::io(self.path.display().to_string(), IoOp::Read, &e).into()
            }),
            SourceInner::Lz4(slot) => read_frames(slot, buf, &self.path),
        }
    }
}

/// Читает из текущего кадра, переходя к следующему, если за концом кадра
/// есть ещё данные.
///
/// Границу кадра находит [`FrameReader`]: распаковщику никогда не
/// достаются байты следующего кадра.
fn read_frames(
    slot: &mut Option<lz4::Decoder<FrameReader<BufReader<File>>>>,
    buf: &mut [u8],
    path: &Path,
) -> io::Result<usize> {
    let corrupt = |reason: String| -> io::Error {
        StreamError::corrupt(Some(&path.display().to_string()), reason).into()
    };

    loop {
        let Some(decoder) = slot.as_mut() else {
            return Ok(0);
        };
        let n = decoder
            .read(buf)
            .map_err(|e| corrupt(format!("LZ4 decompression failed: {e}")))?;
        if n > 0 {
            return Ok(n);
        }

        // Кадр закончился либо закончились входные данные.
        let Some(decoder) = slot.take() else {
            return Ok(0);
        };
        let (mut frames, result) = decoder.finish();
        if result.is_err() || frames.is_truncated() {
            return Err(corrupt(
                "truncated LZ4 frame: input ended before the end of the frame".into(),
            ));
        }

        let more = frames.next_frame().map_err(|e| -> io::Error {
            StreamError::io(path.display().to_string(), IoOp::Read, &e).into()
        })?;
        if !more {
            return Ok(0);
        }
        let next = lz4::Decoder::new(frames)
            .map_err(|e| corrupt(format!("cannot start LZ4 decoder: {e}")))?;
        *slot = Some(next);
    }
}

impl Read for FileSource {
    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        if self.poisoned || buf.is_empty() {
            return Ok(0);
        }
        match self.read_inner(buf) {
            Ok(n) => {
                self.bytes_out += n as u64;
                Ok(n)
            }
            Err(e) => {
                self.poisoned = true;
                warn!(path = %self.path.display(), error = %e, "Stream source poisoned");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for FileSource {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let kind = match &self.inner {
            SourceInner::Raw(_) => "raw",
            SourceInner::Lz4(_) => "lz4",
        };
        f.debug_struct("FileSource")
            .field("path", &self.path)
            .field("kind", &kind)
            .field("poisoned", &self.poisoned)
            .field("bytes_out", &self.bytes_out)
            .finish()
    }
}
