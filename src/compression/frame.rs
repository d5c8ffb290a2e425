//! Разбор структуры LZ4-кадра без распаковки.
//!
//! Распаковщик `lz4` может запросить у источника больше байт, чем осталось
//! до конца кадра, и тогда начало следующего кадра (после дозаписи)
//! теряется. [`FrameReader`] проходит по заголовкам блоков и отдаёт
//! распаковщику ровно один кадр, после чего сообщает конец потока.

use std::io::{self, BufRead, Read};

use xxhash_rust::xxh32::xxh32;

use crate::codec::LZ4_FRAME_MAGIC;

/// Магия + FLG + BD.
const PREFIX_LEN: usize = 6;
/// Старший бит размера блока: блок хранится несжатым.
const UNCOMPRESSED_BIT: u32 = 0x8000_0000;

const FLG_VERSION_MASK: u8 = 0xC0;
const FLG_VERSION_01: u8 = 0x40;
const FLG_BLOCK_CHECKSUM: u8 = 0x10;
const FLG_CONTENT_SIZE: u8 = 0x08;
const FLG_CONTENT_CHECKSUM: u8 = 0x04;
const FLG_RESERVED: u8 = 0x02;
const FLG_DICT_ID: u8 = 0x01;
const BD_RESERVED: u8 = 0x8F;

/// Флаги дескриптора кадра, влияющие на его длину.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameFlags {
    pub block_checksum: bool,
    pub content_checksum: bool,
}

/// Длина заголовка кадра (с магией и байтом контрольной суммы) по FLG.
fn header_len(flg: u8) -> usize {
    let mut len = PREFIX_LEN + 1;
    if flg & FLG_CONTENT_SIZE != 0 {
        len += 8;
    }
    if flg & FLG_DICT_ID != 0 {
        len += 4;
    }
    len
}

fn flags(flg: u8) -> FrameFlags {
    FrameFlags {
        block_checksum: flg & FLG_BLOCK_CHECKSUM != 0,
        content_checksum: flg & FLG_CONTENT_CHECKSUM != 0,
    }
}

/// Проверяет, что `head` начинается с корректного заголовка LZ4-кадра:
/// сигнатура, версия `01`, нулевые зарезервированные биты, допустимый
/// размер блока и совпадающая контрольная сумма заголовка.
///
/// Одной сигнатуры мало: сырой поток `[4, 34, 77, 24]` кодируется теми же
/// четырьмя байтами.
pub(crate) fn is_frame_header(head: &[u8]) -> bool {
    if head.len() < PREFIX_LEN + 1 || head[..4] != LZ4_FRAME_MAGIC {
        return false;
    }
    let (flg, bd) = (head[4], head[5]);
    if flg & FLG_VERSION_MASK != FLG_VERSION_01 || flg & FLG_RESERVED != 0 {
        return false;
    }
    if bd & BD_RESERVED != 0 || !(4..=7).contains(&(bd >> 4)) {
        return false;
    }
    let len = header_len(flg);
    if head.len() < len {
        return false;
    }
    let checksum = (xxh32(&head[4..len - 1], 0) >> 8) as u8;
    checksum == head[len - 1]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Ждём начала кадра.
    Header,
    /// Ждём заголовок следующего блока.
    BlockHeader,
    /// Кадр закончился (или вход оборвался).
    Done,
    /// Вход не похож на LZ4: отдаём как есть, распаковщик сам сообщит
    /// об ошибке.
    Passthrough,
}

/// Reader, ограничивающий вход распаковщика одним LZ4-кадром.
pub(crate) struct FrameReader<R> {
    inner: R,
    state: State,
    flags: FrameFlags,
    /// Прочитанные, но ещё не отданные байты заголовков.
    pending: Vec<u8>,
    pending_pos: usize,
    /// Байты тела блока (или хвоста кадра), которые можно отдавать как есть.
    remaining: u64,
    truncated: bool,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            state: State::Header,
            flags: FrameFlags {
                block_checksum: false,
                content_checksum: false,
            },
            pending: Vec::with_capacity(32),
            pending_pos: 0,
            remaining: 0,
            truncated: false,
        }
    }

    /// Вход закончился посреди кадра.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Готовит reader к следующему кадру и сообщает, есть ли ещё данные.
    pub fn next_frame(&mut self) -> io::Result<bool> {
        self.state = State::Header;
        self.pending.clear();
        self.pending_pos = 0;
        self.remaining = 0;
        self.truncated = false;
        Ok(!self.inner.fill_buf()?.is_empty())
    }

    /// Дочитывает в `pending` до `n` байт; `false` - вход закончился раньше.
    fn stage(
        &mut self,
        n: usize,
    ) -> io::Result<bool> {
        let start = self.pending.len();
        self.pending.resize(start + n, 0);
        let mut filled = 0;
        while filled < n {
            match self.inner.read(&mut self.pending[start + filled..]) {
                Ok(0) => break,
                Ok(k) => filled += k,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.pending.truncate(start + filled);
        Ok(filled == n)
    }

    fn cut_off(&mut self) {
        self.truncated = true;
        self.state = State::Done;
    }

    /// Разбирает следующий сегмент кадра.
    fn advance(&mut self) -> io::Result<()> {
        self.pending.clear();
        self.pending_pos = 0;
        match self.state {
            State::Header => {
                if !self.stage(PREFIX_LEN)? {
                    self.cut_off();
                    return Ok(());
                }
                if self.pending[..4] != LZ4_FRAME_MAGIC {
                    self.state = State::Passthrough;
                    return Ok(());
                }
                let flg = self.pending[4];
                self.flags = flags(flg);
                if !self.stage(header_len(flg) - PREFIX_LEN)? {
                    self.cut_off();
                    return Ok(());
                }
                self.state = State::BlockHeader;
            }
            State::BlockHeader => {
                if !self.stage(4)? {
                    self.cut_off();
                    return Ok(());
                }
                let size = u32::from_le_bytes([
                    self.pending[0],
                    self.pending[1],
                    self.pending[2],
                    self.pending[3],
                ]);
                if size == 0 {
                    // Конец кадра; дальше только контрольная сумма содержимого.
                    self.remaining = if self.flags.content_checksum { 4 } else { 0 };
                    self.state = State::Done;
                } else {
                    let checksum = if self.flags.block_checksum { 4 } else { 0 };
                    self.remaining = u64::from(size & !UNCOMPRESSED_BIT) + checksum;
                }
            }
            State::Done | State::Passthrough => {}
        }
        Ok(())
    }
}

impl<R: BufRead> Read for FrameReader<R> {
    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.pending_pos < self.pending.len() {
                let chunk = &self.pending[self.pending_pos..];
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                self.pending_pos += n;
                return Ok(n);
            }
            if self.remaining > 0 {
                let limit = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
                let n = self.inner.read(&mut buf[..limit])?;
                if n == 0 {
                    self.remaining = 0;
                    self.cut_off();
                    return Ok(0);
                }
                self.remaining -= n as u64;
                return Ok(n);
            }
            match self.state {
                State::Done => return Ok(0),
                State::Passthrough => return self.inner.read(buf),
                State::Header | State::BlockHeader => self.advance()?,
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::io::{BufReader, Cursor, Write};

    use super::*;

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut encoder = lz4::EncoderBuilder::new()
            .checksum(lz4::ContentChecksum::ChecksumEnabled)
            .build(Vec::new())
            .unwrap();
        encoder.write_all(payload).unwrap();
        let (out, result) = encoder.finish();
        result.unwrap();
        out
    }

    /// Тест проверяет, что заголовок настоящего кадра распознаётся, а
    /// совпадение одной сигнатуры - нет.
    #[test]
    fn test_is_frame_header() {
        let real = frame(b"hello");
        assert!(is_frame_header(&real));

        assert!(!is_frame_header(&[0x04, 0x22, 0x4D, 0x18]));
        assert!(!is_frame_header(&[0x04, 0x22, 0x4D, 0x18, 0x01, 0x02, 0x03]));

        let mut bad_checksum = real.clone();
        let hc = header_len(real[4]) - 1;
        bad_checksum[hc] ^= 0xFF;
        assert!(!is_frame_header(&bad_checksum));
    }

    /// Тест проверяет, что reader отдаёт ровно один кадр и оставляет
    /// следующий нетронутым.
    #[test]
    fn test_stops_at_frame_boundary() {
        let first = frame(&[1u8; 100_000]);
        let second = frame(b"second");
        let mut data = first.clone();
        data.extend_from_slice(&second);

        let mut reader = FrameReader::new(BufReader::new(Cursor::new(data)));
        let mut out = Vec::new();
        let mut byte = [0u8; 3];
        loop {
            let n = reader.read(&mut byte).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&byte[..n]);
        }
        assert_eq!(out, first);
        assert!(!reader.is_truncated());

        assert!(reader.next_frame().unwrap());
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, second);
        assert!(!reader.next_frame().unwrap());
    }

    #[test]
    fn test_truncated_frame_detected() {
        let mut data = frame(b"some payload");
        data.truncate(data.len() - 3);

        let mut reader = FrameReader::new(BufReader::new(Cursor::new(data)));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert!(reader.is_truncated());
    }
}
