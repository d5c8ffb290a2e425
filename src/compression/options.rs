use inpout_error::{InpoutResult, StreamError};
use serde::{Deserialize, Serialize};

/// Наибольший уровень сжатия LZ4 (режим HC).
pub const LZ4_MAX_LEVEL: u32 = 12;

/// Уровень по умолчанию: максимальное сжатие.
pub const DEFAULT_LEVEL: u32 = LZ4_MAX_LEVEL;

/// Максимальный размер блока внутри LZ4-кадра.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlockSize {
    #[default]
    Max64KB,
    Max256KB,
    Max1MB,
    Max4MB,
}

impl BlockSize {
    /// Подбирает размер блока по числу килобайт; поддерживаются только
    /// значения формата LZ4.
    pub fn from_kb(kb: u32) -> Option<Self> {
        match kb {
            64 => Some(Self::Max64KB),
            256 => Some(Self::Max256KB),
            1024 => Some(Self::Max1MB),
            4096 => Some(Self::Max4MB),
            _ => None,
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            Self::Max64KB => 64 * 1024,
            Self::Max256KB => 256 * 1024,
            Self::Max1MB => 1024 * 1024,
            Self::Max4MB => 4 * 1024 * 1024,
        }
    }

    pub(crate) fn to_lz4(self) -> lz4::BlockSize {
        match self {
            Self::Max64KB => lz4::BlockSize::Max64KB,
            Self::Max256KB => lz4::BlockSize::Max256KB,
            Self::Max1MB => lz4::BlockSize::Max1MB,
            Self::Max4MB => lz4::BlockSize::Max4MB,
        }
    }
}

/// Способ хранения потока в файле.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Поток MessagePack как есть.
    None,
    /// Поток внутри LZ4-кадров.
    Lz4 { level: u32, block_size: BlockSize },
}

impl Compression {
    /// LZ4 с уровнем и размером блока по умолчанию.
    pub fn lz4() -> Self {
        Self::Lz4 {
            level: DEFAULT_LEVEL,
            block_size: BlockSize::default(),
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Lz4 { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Lz4 { .. } => "lz4",
        }
    }

    /// Проверяет параметры до открытия файла.
    pub fn validate(&self) -> InpoutResult<()> {
        if let Self::Lz4 { level, .. } = *self {
            if level > LZ4_MAX_LEVEL {
                return Err(StreamError::InvalidLevel {
                    level,
                    max: LZ4_MAX_LEVEL,
                }
                .into());
            }
        }
        Ok(())
    }
}

impl Default for Compression {
    fn default() -> Self {
        Self::lz4()
    }
}

/// Параметры открытия файла на запись.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterOptions {
    pub compression: Compression,
    /// Дописывать в конец вместо перезаписи.
    pub append: bool,
}
