//! Бинарный кодек значений [`Value`] в формате MessagePack.
//!
//! ## Архитектура
//!
//! Кодек не хранит глобального состояния: при создании он получает снимок
//! [`TypeRegistry`] и использует его для всех операций. Расширения
//! записываются как `fixext`/`ext` с тегом из реестра.
//!
//! ```no_run
//! use inpout::{Codec, Value};
//!
//! let codec = Codec::global();
//! let bytes = codec.encode(&Value::from("hello"))?;
//! assert_eq!(codec.decode(&bytes)?, Value::from("hello"));
//! # Ok::<(), inpout_error::StackError>(())
//! ```
//!
//! ## Модули
//!
//! - [`markers`] - константы формата и LZ4-сигнатура
//! - [`encode`] - запись значений
//! - [`decode`] - чтение значений с лимитами
//! - [`streaming`] - потоковые сессии [`Encoder`] и [`Decoder`]
//! - [`registry`] - реестр типов расширений

pub mod decode;
pub mod encode;
pub mod markers;
pub mod registry;
pub mod streaming;

use std::{
    io::{Read, Write},
    sync::Arc,
};

use inpout_error::{CodecError, InpoutResult};

pub use markers::*;
pub use registry::{
    global, register_decoder, register_encoder, DecodeFn, EncodeFn, EncoderEntry, TypeRegistry,
};
pub use streaming::{Decoder, Encoder};

use crate::Value;

/// Максимальная глубина вложенности по умолчанию.
pub const DEFAULT_MAX_DEPTH: usize = 512;
/// Максимальная длина строки/бинарных данных/коллекции по умолчанию (512 МБ).
pub const DEFAULT_MAX_LEN: u64 = 512 * 1024 * 1024;

/// Ограничения, защищающие декодер от повреждённых или враждебных данных.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Сколько уровней массивов/словарей/расширений допускается под корнем.
    pub max_depth: usize,
    /// Максимальная объявленная длина (байты или число элементов).
    pub max_len: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_len: DEFAULT_MAX_LEN,
        }
    }
}

/// Кодек: снимок реестра плюс лимиты.
///
/// Дёшево клонируется (реестр разделяется через `Arc`).
#[derive(Clone)]
pub struct Codec {
    registry: Arc<TypeRegistry>,
    limits: DecodeLimits,
}

impl Codec {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            limits: DecodeLimits::default(),
        }
    }

    /// Кодек поверх текущего снимка глобального реестра.
    ///
    /// Регистрации, сделанные после создания кодека, им не видны.
    pub fn global() -> Self {
        Self::new(registry::global())
    }

    pub fn with_limits(
        mut self,
        limits: DecodeLimits,
    ) -> Self {
        self.limits = limits;
        self
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn limits(&self) -> DecodeLimits {
        self.limits
    }

    /// Кодирует одно значение в новый буфер.
    pub fn encode(
        &self,
        value: &Value,
    ) -> InpoutResult<Vec<u8>> {
        let mut out = Vec::new();
        encode::write_value(&mut out, value, self, 0)?;
        Ok(out)
    }

    /// Кодирует значение и записывает его в `w` одним вызовом `write_all`.
    ///
    /// Если кодирование не удалось, в `w` ничего не пишется.
    pub fn encode_into<W: Write>(
        &self,
        value: &Value,
        w: &mut W,
    ) -> InpoutResult<()> {
        let bytes = self.encode(value)?;
        w.write_all(&bytes)?;
        Ok(())
    }

    /// Декодирует ровно одно значение; лишние байты - ошибка.
    pub fn decode(
        &self,
        bytes: &[u8],
    ) -> InpoutResult<Value> {
        let mut src = decode::CountingReader::new(bytes);
        let value = decode::read_next(&mut src, self)?
            .ok_or_else(|| CodecError::unexpected_eof("value marker", 0))?;
        if src.offset() < bytes.len() as u64 {
            return Err(CodecError::TrailingBytes {
                consumed: src.offset(),
                total: bytes.len() as u64,
            }
            .into());
        }
        Ok(value)
    }

    /// Создаёт потоковый энкодер.
    pub fn make_encoder(&self) -> Encoder {
        Encoder::new(self.clone())
    }

    /// Создаёт потоковый декодер поверх `reader`.
    pub fn make_decoder<R: Read>(
        &self,
        reader: R,
    ) -> Decoder<R> {
        Decoder::new(reader, self.clone())
    }

    /// Кодек для полезной нагрузки расширения, вложенного на глубину `depth`.
    ///
    /// Оставшийся бюджет глубины переходит во вложенный вызов, поэтому
    /// цепочки расширений не обходят лимит.
    pub(crate) fn descend(
        &self,
        depth: usize,
    ) -> Codec {
        let mut nested = self.clone();
        nested.limits.max_depth = self.limits.max_depth.saturating_sub(depth);
        nested
    }
}

impl std::fmt::Debug for Codec {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Codec")
            .field("registry", &self.registry)
            .field("limits", &self.limits)
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use inpout_error::StatusCode;

    use super::*;
    use crate::ValueSet;

    fn codec() -> Codec {
        Codec::new(Arc::new(TypeRegistry::with_builtins()))
    }

    /// Тест проверяет round-trip для набора нативных значений.
    #[test]
    fn test_roundtrip_native() {
        let c = codec();
        let values = vec![
            Value::Nil,
            Value::Bool(true),
            Value::Int(-33),
            Value::Int(i64::MIN),
            Value::UInt(u64::MAX),
            Value::Float(-0.5),
            Value::from("привет"),
            Value::Bin(vec![0, 1, 2]),
            Value::Array(vec![Value::Nil, Value::Array(vec![])]),
            Value::map([("a", 1), ("b", 2)]),
        ];
        for v in values {
            let bytes = c.encode(&v).unwrap();
            assert_eq!(c.decode(&bytes).unwrap(), v, "value {v:?}");
        }
    }

    /// Тест проверяет сценарий [1, "a", {2, 3}] со встроенным множеством.
    #[test]
    fn test_roundtrip_list_with_set() {
        let c = codec();
        let set: ValueSet = [Value::Int(2), Value::Int(3)].into_iter().collect();
        let v = Value::Array(vec![Value::Int(1), "a".into(), Value::ext(set)]);

        let bytes = c.encode(&v).unwrap();
        assert_eq!(c.decode(&bytes).unwrap(), v);
    }

    /// Тест проверяет, что лишние байты после значения - ошибка.
    #[test]
    fn test_decode_trailing_bytes() {
        let err = codec().decode(&[0x01, 0x02]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CodecError>(),
            Some(CodecError::TrailingBytes {
                consumed: 1,
                total: 2
            })
        ));
    }

    #[test]
    fn test_decode_empty_input() {
        let err = codec().decode(&[]).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UnexpectedEof);
    }

    /// Тест проверяет, что encode_into ничего не пишет при ошибке.
    #[test]
    fn test_encode_into_is_all_or_nothing() {
        #[derive(Debug, Clone, PartialEq)]
        struct Unregistered;

        let c = codec();
        let mut out = Vec::new();
        let v = Value::Array(vec![Value::Int(1), Value::ext(Unregistered)]);
        let err = c.encode_into(&v, &mut out).unwrap_err();

        assert_eq!(err.status_code(), StatusCode::UnsupportedType);
        assert!(out.is_empty());
    }

    #[test]
    fn test_descend_reduces_depth_budget() {
        let c = codec().with_limits(DecodeLimits {
            max_depth: 4,
            max_len: 16,
        });
        assert_eq!(c.descend(3).limits().max_depth, 1);
        assert_eq!(c.descend(9).limits().max_depth, 0);
        assert_eq!(c.descend(9).limits().max_len, 16);
    }
}
