use std::{
    any::{Any, TypeId},
    collections::hash_map::DefaultHasher,
    fmt,
    hash::{Hash, Hasher},
};

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::ValueSet;

/// A value that can be written to and read back from a stream.
///
/// The native variants mirror the MessagePack data model. Everything else
/// travels as [`Value::Ext`]: an instance of a Rust type that has an encoder
/// registered in the [`TypeRegistry`](crate::TypeRegistry).
///
/// Round-trips are exact except for documented widening: unsigned integers
/// that fit in `i64` come back as [`Value::Int`], and float32 values found on
/// the wire come back as [`Value::Float`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Absence of a value (`nil`).
    Nil,
    Bool(bool),
    /// Any integer in `i64` range.
    Int(i64),
    /// Unsigned integers above `i64::MAX`.
    UInt(u64),
    Float(f64),
    /// UTF-8 text.
    Str(String),
    /// Raw bytes.
    Bin(Vec<u8>),
    Array(Vec<Value>),
    /// Key/value pairs in insertion order. Keys may be any value.
    Map(Vec<(Value, Value)>),
    /// An instance of a registered extension type.
    Ext(Extension),
}

/// Object-safe view of a Rust value that can live inside [`Value::Ext`].
///
/// Implemented automatically for every `Any + Debug + Clone + PartialEq +
/// Send + Sync` type.
pub trait ExtensionValue: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn clone_box(&self) -> Box<dyn ExtensionValue>;

    fn eq_dyn(
        &self,
        other: &dyn ExtensionValue,
    ) -> bool;

    fn type_name(&self) -> &'static str;
}

impl<T> ExtensionValue for T
where
    T: Any + fmt::Debug + Clone + PartialEq + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn ExtensionValue> {
        Box::new(self.clone())
    }

    fn eq_dyn(
        &self,
        other: &dyn ExtensionValue,
    ) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Type-erased holder for an extension instance.
///
/// The "kind" of an extension is its Rust type: the registry looks encoders
/// up by [`Extension::kind`].
pub struct Extension(Box<dyn ExtensionValue>);

impl Extension {
    pub fn new<T: ExtensionValue>(value: T) -> Self {
        // Re-wrapping an existing holder keeps the inner kind.
        if let Some(existing) = (&value as &dyn Any).downcast_ref::<Extension>() {
            return existing.clone();
        }
        Self(Box::new(value))
    }

    /// Rust type of the wrapped value.
    pub fn kind(&self) -> TypeId {
        self.0.as_any().type_id()
    }

    /// Full Rust type name, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        self.0.type_name()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.kind() == TypeId::of::<T>()
    }

    pub(crate) fn as_any(&self) -> &dyn Any {
        self.0.as_any()
    }
}

impl Clone for Extension {
    fn clone(&self) -> Self {
        Self(self.0.clone_box())
    }
}

impl PartialEq for Extension {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.0.eq_dyn(other.0.as_ref())
    }
}

impl fmt::Debug for Extension {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Value {
    /// Wraps any extension-capable Rust value.
    pub fn ext<T: ExtensionValue>(value: T) -> Self {
        Value::Ext(Extension::new(value))
    }

    /// Builds a map from pairs, keeping their order.
    pub fn map<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::UInt(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bin(_) => "bin",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Ext(e) => e.kind_name(),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(i) => u64::try_from(*i).ok(),
            Value::UInt(u) => Some(*u),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bin(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(pairs) => Some(pairs),
            _ => None,
        }
    }

    pub fn as_ext<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Ext(e) => e.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Looks up a key in a map value.
    pub fn get(
        &self,
        key: &Value,
    ) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Конверсии
////////////////////////////////////////////////////////////////////////////////

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(i64::from(v))
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::UInt(v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bin(v.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<Extension> for Value {
    fn from(v: Extension) -> Self {
        Value::Ext(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Nil, Into::into)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Отображение
////////////////////////////////////////////////////////////////////////////////

/// Compact form: `[1, "a", {2, 3}]`. The alternate form (`{:#}`) puts every
/// element of a non-empty collection on its own indented line.
impl fmt::Display for Value {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write_value(f, self, 0, f.alternate())
    }
}

const INDENT: &str = "  ";

fn write_value(
    f: &mut fmt::Formatter<'_>,
    v: &Value,
    level: usize,
    multiline: bool,
) -> fmt::Result {
    match v {
        Value::Nil => f.write_str("nil"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Int(i) => write!(f, "{i}"),
        Value::UInt(u) => write!(f, "{u}"),
        Value::Float(x) => write!(f, "{x:?}"),
        Value::Str(s) => write!(f, "{s:?}"),
        Value::Bin(b) => {
            f.write_str("b\"")?;
            for byte in b {
                write!(f, "\\x{byte:02x}")?;
            }
            f.write_str("\"")
        }
        Value::Array(items) => write_seq(f, items.iter(), ("[", "]"), level, multiline),
        Value::Map(pairs) => {
            if pairs.is_empty() {
                return f.write_str("{}");
            }
            f.write_str("{")?;
            for (i, (k, val)) in pairs.iter().enumerate() {
                write_separator(f, i, level + 1, multiline)?;
                write_value(f, k, level + 1, multiline)?;
                f.write_str(": ")?;
                write_value(f, val, level + 1, multiline)?;
            }
            write_closing(f, level, multiline)?;
            f.write_str("}")
        }
        Value::Ext(e) => {
            if let Some(set) = e.downcast_ref::<crate::ValueSet>() {
                if set.is_empty() {
                    return f.write_str("set()");
                }
                return write_seq(f, set.iter(), ("{", "}"), level, multiline);
            }
            if let Some(ts) = e.downcast_ref::<chrono::DateTime<chrono::Utc>>() {
                return write!(f, "{}", ts.to_rfc3339());
            }
            write!(f, "{e:?}")
        }
    }
}

fn write_seq<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl ExactSizeIterator<Item = &'a Value>,
    (open, close): (&str, &str),
    level: usize,
    multiline: bool,
) -> fmt::Result {
    let empty = items.len() == 0;
    f.write_str(open)?;
    for (i, item) in items.enumerate() {
        write_separator(f, i, level + 1, multiline)?;
        write_value(f, item, level + 1, multiline)?;
    }
    if !empty {
        write_closing(f, level, multiline)?;
    }
    f.write_str(close)
}

fn write_separator(
    f: &mut fmt::Formatter<'_>,
    index: usize,
    level: usize,
    multiline: bool,
) -> fmt::Result {
    if multiline {
        if index > 0 {
            f.write_str(",")?;
        }
        f.write_str("\n")?;
        for _ in 0..level {
            f.write_str(INDENT)?;
        }
        Ok(())
    } else if index > 0 {
        f.write_str(", ")
    } else {
        Ok(())
    }
}

fn write_closing(
    f: &mut fmt::Formatter<'_>,
    level: usize,
    multiline: bool,
) -> fmt::Result {
    if multiline {
        f.write_str(",\n")?;
        for _ in 0..level {
            f.write_str(INDENT)?;
        }
    }
    Ok(())
}

/// JSON view used by `inpout-pprint --output json`.
///
/// Maps with only string keys become objects; any other map becomes a list
/// of `[key, value]` pairs. Extensions become `{"$ext": <type>, "value": ...}`.
impl Serialize for Value {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match self {
            Value::Nil => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::UInt(u) => serializer.serialize_u64(*u),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Bin(b) => serializer.serialize_bytes(b),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(pairs) if pairs.iter().all(|(k, _)| k.as_str().is_some()) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (k, v) in pairs {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Map(pairs) => {
                let mut seq = serializer.serialize_seq(Some(pairs.len()))?;
                for (k, v) in pairs {
                    seq.serialize_element(&(k, v))?;
                }
                seq.end()
            }
            Value::Ext(e) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("$ext", e.kind_name())?;
                if let Some(set) = e.downcast_ref::<crate::ValueSet>() {
                    map.serialize_entry("value", set.as_slice())?;
                } else if let Some(ts) = e.downcast_ref::<chrono::DateTime<chrono::Utc>>() {
                    map.serialize_entry("value", &ts.to_rfc3339())?;
                } else {
                    map.serialize_entry("value", &format!("{e:?}"))?;
                }
                map.end()
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Хэширование
////////////////////////////////////////////////////////////////////////////////

/// Хэш, согласованный с `PartialEq` для `Value`: равные значения дают
/// равный отпечаток.
pub(crate) fn fingerprint(v: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    hash_value(v, &mut hasher);
    hasher.finish()
}

fn hash_value<H: Hasher>(
    v: &Value,
    h: &mut H,
) {
    std::mem::discriminant(v).hash(h);
    match v {
        Value::Nil => {}
        Value::Bool(b) => b.hash(h),
        Value::Int(i) => i.hash(h),
        Value::UInt(u) => u.hash(h),
        // 0.0 == -0.0, поэтому оба нуля хэшируются одинаково.
        Value::Float(f) => (if *f == 0.0 { 0 } else { f.to_bits() }).hash(h),
        Value::Str(s) => s.hash(h),
        Value::Bin(b) => b.hash(h),
        Value::Array(items) => {
            items.len().hash(h);
            for item in items {
                hash_value(item, h);
            }
        }
        Value::Map(pairs) => {
            pairs.len().hash(h);
            for (k, val) in pairs {
                hash_value(k, h);
                hash_value(val, h);
            }
        }
        Value::Ext(e) => {
            e.kind().hash(h);
            hash_extension(e, h);
        }
    }
}

/// Содержимое встроенных расширений. Для прочих типов хватает `kind()`:
/// их равенство задаёт пользовательский `PartialEq`.
fn hash_extension<H: Hasher>(
    e: &Extension,
    h: &mut H,
) {
    if let Some(ts) = e.downcast_ref::<DateTime<Utc>>() {
        ts.timestamp().hash(h);
        ts.timestamp_subsec_nanos().hash(h);
    } else if let Some(set) = e.downcast_ref::<ValueSet>() {
        // Сумма отпечатков не зависит от порядка элементов.
        let members = set
            .iter()
            .fold(0u64, |acc, member| acc.wrapping_add(fingerprint(member)));
        set.len().hash(h);
        members.hash(h);
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
