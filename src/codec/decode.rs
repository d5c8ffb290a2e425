//! Чтение значений [`Value`] из MessagePack.
//!
//! Декодер читает поток побайтно через [`CountingReader`], поэтому знает
//! смещение каждой ошибки. Длины и глубина проверяются до выделения памяти.

use std::{
    collections::HashMap,
    io::{self, Read},
};

use byteorder::{BigEndian, ReadBytesExt};
use inpout_error::{CodecError, InpoutResult, ResultExt, StackError};
use rmp::Marker;

use super::Codec;
use crate::{value::fingerprint, Value};

/// Сколько байт или элементов выделять заранее, пока данные не прочитаны.
const PREALLOC_LIMIT: usize = 64 * 1024;

/// Reader, считающий прочитанные байты.
pub struct CountingReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    /// Количество байт, прочитанных с начала потока.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Читает один байт; `None` - чистый конец потока.
    fn try_read_byte(&mut self) -> InpoutResult<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(StackError::from(e)),
            }
        }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.offset += n as u64;
        Ok(n)
    }
}

/// Читает следующее значение. `Ok(None)` - поток закончился ровно на границе
/// значений.
pub(crate) fn read_next<R: Read>(
    src: &mut CountingReader<R>,
    codec: &Codec,
) -> InpoutResult<Option<Value>> {
    let start = src.offset();
    let Some(byte) = src.try_read_byte()? else {
        return Ok(None);
    };
    ValueReader { src, codec }
        .read_with_marker(byte, start, 0)
        .map(Some)
}

struct ValueReader<'a, R> {
    src: &'a mut CountingReader<R>,
    codec: &'a Codec,
}

impl<R: Read> ValueReader<'_, R> {
    fn read_value(
        &mut self,
        depth: usize,
    ) -> InpoutResult<Value> {
        let start = self.src.offset();
        let byte = self.src.try_read_byte()?.ok_or_else(|| {
            CodecError::unexpected_eof("value marker", start)
        })?;
        self.read_with_marker(byte, start, depth)
    }

    fn read_with_marker(
        &mut self,
        byte: u8,
        start: u64,
        depth: usize,
    ) -> InpoutResult<Value> {
        let value = match Marker::from_u8(byte) {
            Marker::FixPos(n) => Value::Int(n as i64),
            Marker::FixNeg(n) => Value::Int(n as i64),
            Marker::Null => Value::Nil,
            Marker::True => Value::Bool(true),
            Marker::False => Value::Bool(false),
            Marker::U8 => Value::Int(self.fixed("u8", |r| r.read_u8())? as i64),
            Marker::U16 => Value::Int(self.fixed("u16", |r| r.read_u16::<BigEndian>())? as i64),
            Marker::U32 => Value::Int(self.fixed("u32", |r| r.read_u32::<BigEndian>())? as i64),
            Marker::U64 => Value::from(self.fixed("u64", |r| r.read_u64::<BigEndian>())?),
            Marker::I8 => Value::Int(self.fixed("i8", |r| r.read_i8())? as i64),
            Marker::I16 => Value::Int(self.fixed("i16", |r| r.read_i16::<BigEndian>())? as i64),
            Marker::I32 => Value::Int(self.fixed("i32", |r| r.read_i32::<BigEndian>())? as i64),
            Marker::I64 => Value::Int(self.fixed("i64", |r| r.read_i64::<BigEndian>())?),
            Marker::F32 => Value::Float(self.fixed("f32", |r| r.read_f32::<BigEndian>())? as f64),
            Marker::F64 => Value::Float(self.fixed("f64", |r| r.read_f64::<BigEndian>())?),
            Marker::FixStr(len) => self.read_str(len as u64, start)?,
            Marker::Str8 => {
                let len = self.len8("str8 length")?;
                self.read_str(len, start)?
            }
            Marker::Str16 => {
                let len = self.len16("str16 length")?;
                self.read_str(len, start)?
            }
            Marker::Str32 => {
                let len = self.len32("str32 length")?;
                self.read_str(len, start)?
            }
            Marker::Bin8 => {
                let len = self.len8("bin8 length")?;
                Value::Bin(self.read_bytes(len, "binary", start)?)
            }
            Marker::Bin16 => {
                let len = self.len16("bin16 length")?;
                Value::Bin(self.read_bytes(len, "binary", start)?)
            }
            Marker::Bin32 => {
                let len = self.len32("bin32 length")?;
                Value::Bin(self.read_bytes(len, "binary", start)?)
            }
            Marker::FixArray(len) => self.read_array(len as u64, depth, start)?,
            Marker::Array16 => {
                let len = self.len16("array16 length")?;
                self.read_array(len, depth, start)?
            }
            Marker::Array32 => {
                let len = self.len32("array32 length")?;
                self.read_array(len, depth, start)?
            }
            Marker::FixMap(len) => self.read_map(len as u64, depth, start)?,
            Marker::Map16 => {
                let len = self.len16("map16 length")?;
                self.read_map(len, depth, start)?
            }
            Marker::Map32 => {
                let len = self.len32("map32 length")?;
                self.read_map(len, depth, start)?
            }
            Marker::FixExt1 => self.read_ext(1, depth, start)?,
            Marker::FixExt2 => self.read_ext(2, depth, start)?,
            Marker::FixExt4 => self.read_ext(4, depth, start)?,
            Marker::FixExt8 => self.read_ext(8, depth, start)?,
            Marker::FixExt16 => self.read_ext(16, depth, start)?,
            Marker::Ext8 => {
                let len = self.len8("ext8 length")?;
                self.read_ext(len, depth, start)?
            }
            Marker::Ext16 => {
                let len = self.len16("ext16 length")?;
                self.read_ext(len, depth, start)?
            }
            Marker::Ext32 => {
                let len = self.len32("ext32 length")?;
                self.read_ext(len, depth, start)?
            }
            Marker::Reserved => {
                return Err(CodecError::malformed(format!("reserved marker 0x{byte:02X}"), start).into())
            }
        };
        Ok(value)
    }

    /// Читает поле фиксированного размера, превращая EOF в ошибку кодека.
    fn fixed<T>(
        &mut self,
        what: &str,
        read: impl FnOnce(&mut CountingReader<R>) -> io::Result<T>,
    ) -> InpoutResult<T> {
        let at = self.src.offset();
        read(&mut *self.src).map_err(|e| map_read_error(e, what, at))
    }

    fn len8(
        &mut self,
        what: &str,
    ) -> InpoutResult<u64> {
        self.fixed(what, |r| r.read_u8()).map(u64::from)
    }

    fn len16(
        &mut self,
        what: &str,
    ) -> InpoutResult<u64> {
        self.fixed(what, |r| r.read_u16::<BigEndian>()).map(u64::from)
    }

    fn len32(
        &mut self,
        what: &str,
    ) -> InpoutResult<u64> {
        self.fixed(what, |r| r.read_u32::<BigEndian>()).map(u64::from)
    }

    fn check_len(
        &self,
        what: &str,
        len: u64,
        start: u64,
    ) -> InpoutResult<()> {
        let limit = self.codec.limits().max_len;
        if len > limit {
            return Err(CodecError::SizeLimit {
                what: what.to_string(),
                size: len,
                limit,
                offset: Some(start),
            }
            .into());
        }
        Ok(())
    }

    fn check_depth(
        &self,
        depth: usize,
        start: u64,
    ) -> InpoutResult<usize> {
        let limit = self.codec.limits().max_depth;
        if depth >= limit {
            return Err(CodecError::DepthLimit {
                limit,
                offset: Some(start),
            }
            .into());
        }
        Ok(depth + 1)
    }

    fn read_bytes(
        &mut self,
        len: u64,
        what: &str,
        start: u64,
    ) -> InpoutResult<Vec<u8>> {
        self.check_len(what, len, start)?;
        let mut buf = Vec::with_capacity((len as usize).min(PREALLOC_LIMIT));
        let got = (&mut *self.src)
            .take(len)
            .read_to_end(&mut buf)
            .map_err(|e| map_read_error(e, what, start))?;
        if (got as u64) < len {
            return Err(CodecError::unexpected_eof(format!("{what} body"), start).into());
        }
        Ok(buf)
    }

    fn read_str(
        &mut self,
        len: u64,
        start: u64,
    ) -> InpoutResult<Value> {
        let bytes = self.read_bytes(len, "string", start)?;
        String::from_utf8(bytes)
            .map(Value::Str)
            .map_err(|_| {
                CodecError::InvalidUtf8 {
                    offset: Some(start),
                }
                .into()
            })
    }

    fn read_array(
        &mut self,
        len: u64,
        depth: usize,
        start: u64,
    ) -> InpoutResult<Value> {
        self.check_len("array", len, start)?;
        let child_depth = self.check_depth(depth, start)?;
        let mut items = Vec::with_capacity((len as usize).min(PREALLOC_LIMIT));
        for _ in 0..len {
            items.push(self.read_value(child_depth)?);
        }
        Ok(Value::Array(items))
    }

    fn read_map(
        &mut self,
        len: u64,
        depth: usize,
        start: u64,
    ) -> InpoutResult<Value> {
        self.check_len("map", len, start)?;
        let child_depth = self.check_depth(depth, start)?;
        let mut pairs = MapBuilder::with_capacity((len as usize).min(PREALLOC_LIMIT));
        for _ in 0..len {
            let key = self.read_value(child_depth)?;
            let value = self.read_value(child_depth)?;
            pairs.insert(key, value);
        }
        Ok(Value::Map(pairs.finish()))
    }

    fn read_ext(
        &mut self,
        len: u64,
        depth: usize,
        start: u64,
    ) -> InpoutResult<Value> {
        let tag = self.fixed("extension tag", |r| r.read_i8())?;
        let payload = self.read_bytes(len, "extension payload", start)?;
        let child_depth = self.check_depth(depth, start)?;

        let decode = self
            .codec
            .registry()
            .decoder_for(tag)
            .ok_or_else(|| CodecError::unknown_tag(tag, Some(start)))?;
        let nested = self.codec.descend(child_depth);
        decode(&payload, &nested).with_context(|| format!("decoding extension {tag} at offset {start}"))
    }
}

fn map_read_error(
    e: io::Error,
    what: &str,
    at: u64,
) -> StackError {
    // Ошибки источника (например, повреждённый LZ4-кадр) приходят упакованными
    // в io::Error и передаются без изменений.
    if e.kind() == io::ErrorKind::UnexpectedEof && e.get_ref().is_none() {
        return CodecError::unexpected_eof(what, at).into();
    }
    StackError::from(e)
}

/// Собирает пары словаря; при повторе ключа побеждает последнее значение,
/// позиция остаётся от первого вхождения.
struct MapBuilder {
    pairs: Vec<(Value, Value)>,
    index: HashMap<u64, Vec<usize>>,
}

impl MapBuilder {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            pairs: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    fn insert(
        &mut self,
        key: Value,
        value: Value,
    ) {
        let slots = self.index.entry(fingerprint(&key)).or_default();
        if let Some(&i) = slots.iter().find(|&&i| self.pairs[i].0 == key) {
            self.pairs[i].1 = value;
            return;
        }
        slots.push(self.pairs.len());
        self.pairs.push((key, value));
    }

    fn finish(self) -> Vec<(Value, Value)> {
        self.pairs
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
