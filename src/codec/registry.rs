//! Реестр типов расширений.
//!
//! Связывает Rust-тип с тегом и функцией кодирования, а тег - с функцией
//! декодирования. Повторная регистрация заменяет прежнюю запись (побеждает
//! последняя) и сопровождается предупреждением в логе.
//!
//! Глобальный реестр хранится как неизменяемый снимок за `RwLock`: изменение
//! строит новую копию, а уже созданные [`Codec`] продолжают видеть свой
//! снимок.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    sync::Arc,
};

use inpout_error::{CodecError, InpoutResult};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::{is_valid_ext_tag, Codec};
use crate::{ExtensionValue, Value};

/// Функция кодирования расширения: значение → полезная нагрузка.
///
/// Аргумент гарантированно имеет тип, под который функция
/// зарегистрирована.
pub type EncodeFn = Arc<dyn Fn(&dyn Any, &Codec) -> InpoutResult<Vec<u8>> + Send + Sync>;

/// Функция декодирования: полезная нагрузка → значение.
pub type DecodeFn = Arc<dyn Fn(&[u8], &Codec) -> InpoutResult<Value> + Send + Sync>;

/// Запись о кодировщике типа.
#[derive(Clone)]
pub struct EncoderEntry {
    pub kind_name: &'static str,
    pub tag: i8,
    pub encode: EncodeFn,
}

/// Реестр расширений.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    encoders: HashMap<TypeId, EncoderEntry>,
    decoders: HashMap<i8, DecodeFn>,
}

impl TypeRegistry {
    /// Пустой реестр без встроенных расширений.
    pub fn new() -> Self {
        Self::default()
    }

    /// Реестр со встроенными расширениями (множество и метка времени).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::ext_types::register_builtins(&mut registry);
        registry
    }

    /// Регистрирует кодировщик для типа `T` с тегом `tag`.
    ///
    /// Полезная нагрузка, которую возвращает `encode`, должна быть
    /// полноценной закодированной последовательностью: декодер получит её
    /// как есть.
    pub fn register_encoder<T, F>(
        &mut self,
        tag: i8,
        encode: F,
    ) -> InpoutResult<()>
    where
        T: ExtensionValue,
        F: Fn(&T, &Codec) -> InpoutResult<Vec<u8>> + Send + Sync + 'static,
    {
        if !is_valid_ext_tag(tag) {
            return Err(CodecError::InvalidTag { tag }.into());
        }
        let kind_name = std::any::type_name::<T>();
        let erased: EncodeFn = Arc::new(move |value: &dyn Any, codec: &Codec| -> InpoutResult<Vec<u8>> {
            let value = value.downcast_ref::<T>().ok_or_else(|| CodecError::UnsupportedType {
                kind: kind_name.to_string(),
            })?;
            encode(value, codec)
        });

        let entry = EncoderEntry {
            kind_name,
            tag,
            encode: erased,
        };
        match self.encoders.insert(TypeId::of::<T>(), entry) {
            Some(previous) => warn!(
                kind = kind_name,
                old_tag = previous.tag,
                new_tag = tag,
                "Extension encoder replaced"
            ),
            None => debug!(kind = kind_name, tag, "Extension encoder registered"),
        }
        Ok(())
    }

    /// Регистрирует декодер для тега.
    pub fn register_decoder<F>(
        &mut self,
        tag: i8,
        decode: F,
    ) -> InpoutResult<()>
    where
        F: Fn(&[u8], &Codec) -> InpoutResult<Value> + Send + Sync + 'static,
    {
        if !is_valid_ext_tag(tag) {
            return Err(CodecError::InvalidTag { tag }.into());
        }
        if self.decoders.insert(tag, Arc::new(decode)).is_some() {
            warn!(tag, "Extension decoder replaced");
        } else {
            debug!(tag, "Extension decoder registered");
        }
        Ok(())
    }

    pub fn encoder_for(
        &self,
        kind: TypeId,
    ) -> Option<&EncoderEntry> {
        self.encoders.get(&kind)
    }

    pub fn decoder_for(
        &self,
        tag: i8,
    ) -> Option<&DecodeFn> {
        self.decoders.get(&tag)
    }

    pub fn contains_encoder<T: Any>(&self) -> bool {
        self.encoders.contains_key(&TypeId::of::<T>())
    }

    pub fn contains_decoder(
        &self,
        tag: i8,
    ) -> bool {
        self.decoders.contains_key(&tag)
    }

    /// Число зарегистрированных кодировщиков и декодеров.
    pub fn len(&self) -> (usize, usize) {
        (self.encoders.len(), self.decoders.len())
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty() && self.decoders.is_empty()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let mut encoders: Vec<(i8, &str)> = self
            .encoders
            .values()
            .map(|e| (e.tag, e.kind_name))
            .collect();
        encoders.sort_unstable();
        let mut decoders: Vec<i8> = self.decoders.keys().copied().collect();
        decoders.sort_unstable();

        f.debug_struct("TypeRegistry")
            .field("encoders", &encoders)
            .field("decoders", &decoders)
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Глобальный реестр
////////////////////////////////////////////////////////////////////////////////

static GLOBAL: Lazy<RwLock<Arc<TypeRegistry>>> =
    Lazy::new(|| RwLock::new(Arc::new(TypeRegistry::with_builtins())));

/// Текущий снимок глобального реестра.
pub fn global() -> Arc<TypeRegistry> {
    GLOBAL.read().clone()
}

/// Регистрирует кодировщик в глобальном реестре.
///
/// Предназначено для вызова при старте, до начала сохранения и загрузки.
pub fn register_encoder<T, F>(
    tag: i8,
    encode: F,
) -> InpoutResult<()>
where
    T: ExtensionValue,
    F: Fn(&T, &Codec) -> InpoutResult<Vec<u8>> + Send + Sync + 'static,
{
    update_global(|registry| registry.register_encoder::<T, F>(tag, encode))
}

/// Регистрирует декодер в глобальном реестре.
pub fn register_decoder<F>(
    tag: i8,
    decode: F,
) -> InpoutResult<()>
where
    F: Fn(&[u8], &Codec) -> InpoutResult<Value> + Send + Sync + 'static,
{
    update_global(|registry| registry.register_decoder(tag, decode))
}

fn update_global(
    change: impl FnOnce(&mut TypeRegistry) -> InpoutResult<()>
) -> InpoutResult<()> {
    let mut guard = GLOBAL.write();
    let mut next = TypeRegistry::clone(&guard);
    change(&mut next)?;
    *guard = Arc::new(next);
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use inpout_error::StatusCode;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Celsius(f64);

    fn encode_celsius(
        c: &Celsius,
        codec: &Codec,
    ) -> InpoutResult<Vec<u8>> {
        codec.encode(&Value::Float(c.0))
    }

    fn decode_celsius(
        payload: &[u8],
        codec: &Codec,
    ) -> InpoutResult<Value> {
        let v = codec.decode(payload)?;
        let f = v
            .as_f64()
            .ok_or_else(|| CodecError::extension_payload(10, "expected float"))?;
        Ok(Value::ext(Celsius(f)))
    }

    /// Тест проверяет регистрацию и round-trip пользовательского типа.
    #[test]
    fn test_register_and_roundtrip() {
        let mut registry = TypeRegistry::new();
        registry
            .register_encoder::<Celsius, _>(10, encode_celsius)
            .unwrap();
        registry.register_decoder(10, decode_celsius).unwrap();

        assert!(registry.contains_encoder::<Celsius>());
        assert!(registry.contains_decoder(10));
        assert_eq!(registry.len(), (1, 1));

        let codec = Codec::new(Arc::new(registry));
        let v = Value::ext(Celsius(21.5));
        let bytes = codec.encode(&v).unwrap();
        // fixext 8 не подходит: float64 занимает 9 байт, значит ext 8.
        assert_eq!(&bytes[..3], &[0xC7, 9, 10]);
        assert_eq!(codec.decode(&bytes).unwrap(), v);
    }

    /// Тест проверяет, что отрицательные теги отклоняются.
    #[test]
    fn test_negative_tag_rejected() {
        let mut registry = TypeRegistry::new();
        let err = registry
            .register_encoder::<Celsius, _>(-1, encode_celsius)
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidArgs);

        let err = registry.register_decoder(-128, decode_celsius).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CodecError>(),
            Some(CodecError::InvalidTag { tag: -128 })
        ));
        assert!(registry.is_empty());
    }

    /// Тест проверяет, что повторная регистрация заменяет прежнюю запись.
    #[test]
    fn test_reregistration_last_wins() {
        let mut registry = TypeRegistry::new();
        registry
            .register_encoder::<Celsius, _>(10, encode_celsius)
            .unwrap();
        registry
            .register_encoder::<Celsius, _>(11, encode_celsius)
            .unwrap();

        let entry = registry.encoder_for(TypeId::of::<Celsius>()).unwrap();
        assert_eq!(entry.tag, 11);
        assert_eq!(registry.len(), (1, 0));
    }

    /// Тест проверяет, что кодек вызывает функции из последней регистрации
    /// и для записи, и для чтения.
    #[test]
    fn test_reregistered_functions_are_used() {
        let mut registry = TypeRegistry::new();
        registry
            .register_encoder::<Celsius, _>(10, encode_celsius)
            .unwrap();
        registry
            .register_encoder::<Celsius, _>(10, |c: &Celsius, codec: &Codec| {
                codec.encode(&Value::from(format!("{}C", c.0)))
            })
            .unwrap();
        registry.register_decoder(10, decode_celsius).unwrap();
        registry
            .register_decoder(10, |_: &[u8], _: &Codec| Ok(Value::from("second")))
            .unwrap();

        let codec = Codec::new(Arc::new(registry));
        let bytes = codec.encode(&Value::ext(Celsius(3.0))).unwrap();
        let payload = codec.encode(&Value::from("3C")).unwrap();
        assert_eq!(bytes[bytes.len() - payload.len()..], payload[..]);

        assert_eq!(codec.decode(&bytes).unwrap(), Value::from("second"));
    }

    #[test]
    fn test_builtins_present() {
        let registry = TypeRegistry::with_builtins();
        assert!(registry.contains_encoder::<crate::ValueSet>());
        assert!(registry.contains_encoder::<chrono::DateTime<chrono::Utc>>());
        assert!(registry.contains_decoder(crate::codec::TAG_SET));
        assert!(registry.contains_decoder(crate::codec::TAG_TIMESTAMP));
    }

    /// Тест проверяет, что созданный ранее кодек не видит новых регистраций
    /// в глобальном реестре, а новый - видит.
    #[test]
    fn test_global_snapshot_isolation() {
        #[derive(Debug, Clone, PartialEq)]
        struct SnapshotMarker;

        let before = Codec::global();
        register_encoder::<SnapshotMarker, _>(55, |_, codec| codec.encode(&Value::Nil)).unwrap();
        let after = Codec::global();

        assert!(!before.registry().contains_encoder::<SnapshotMarker>());
        assert!(after.registry().contains_encoder::<SnapshotMarker>());
        assert!(global().contains_decoder(crate::codec::TAG_SET));
    }
}
