//! Потоковые сессии кодека.
//!
//! [`Encoder`] пишет значения одно за другим в любой `Write`, [`Decoder`]
//! читает последовательность значений из `Read` до чистого конца потока.

use std::io::{Read, Write};

use inpout_error::InpoutResult;

use super::{decode, encode, Codec};
use crate::Value;

/// Потоковый энкодер с переиспользуемым буфером.
#[derive(Debug)]
pub struct Encoder {
    codec: Codec,
    scratch: Vec<u8>,
    values_written: u64,
    bytes_written: u64,
}

impl Encoder {
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            scratch: Vec::new(),
            values_written: 0,
            bytes_written: 0,
        }
    }

    /// Кодирует `value` и пишет его в `w`.
    ///
    /// Значение сначала целиком кодируется в буфер, поэтому при ошибке
    /// кодирования в `w` не попадает ни одного байта.
    pub fn encode_into<W: Write>(
        &mut self,
        value: &Value,
        w: &mut W,
    ) -> InpoutResult<()> {
        self.scratch.clear();
        encode::write_value(&mut self.scratch, value, &self.codec, 0)?;
        w.write_all(&self.scratch)?;
        self.values_written += 1;
        self.bytes_written += self.scratch.len() as u64;
        Ok(())
    }

    pub fn values_written(&self) -> u64 {
        self.values_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

/// Потоковый декодер.
///
/// После первой ошибки декодер «сплавлен»: дальнейшие вызовы возвращают
/// `None`.
pub struct Decoder<R> {
    src: decode::CountingReader<R>,
    codec: Codec,
    values_read: u64,
    done: bool,
}

impl<R: Read> Decoder<R> {
    pub fn new(
        reader: R,
        codec: Codec,
    ) -> Self {
        Self {
            src: decode::CountingReader::new(reader),
            codec,
            values_read: 0,
            done: false,
        }
    }

    /// Следующее значение; `Ok(None)` на чистом конце потока.
    pub fn next_value(&mut self) -> InpoutResult<Option<Value>> {
        if self.done {
            return Ok(None);
        }
        match decode::read_next(&mut self.src, &self.codec) {
            Ok(Some(value)) => {
                self.values_read += 1;
                Ok(Some(value))
            }
            Ok(None) => {
                self.done = true;
                Ok(None)
            }
            Err(e) => {
                self.done = true;
                Err(e)
            }
        }
    }

    pub fn values_read(&self) -> u64 {
        self.values_read
    }

    /// Смещение в байтах от начала потока.
    pub fn offset(&self) -> u64 {
        self.src.offset()
    }

    pub fn get_ref(&self) -> &R {
        self.src.get_ref()
    }

    pub fn into_inner(self) -> R {
        self.src.into_inner()
    }
}

impl<R: Read> Iterator for Decoder<R> {
    type Item = InpoutResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_value().transpose()
    }
}

impl<R: Read> std::iter::FusedIterator for Decoder<R> {}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
