//! Множество значений (тег 127).
//!
//! На проводе множество - это расширение, полезная нагрузка которого
//! является закодированным массивом элементов.

use std::{collections::HashMap, fmt, slice};

use inpout_error::{CodecError, InpoutResult};

use crate::{
    codec::{encode, Codec, TAG_SET},
    value::fingerprint,
    Value,
};

/// Множество [`Value`] без повторов.
///
/// Хранит элементы в порядке вставки, но равенство от порядка не зависит.
#[derive(Clone, Default)]
pub struct ValueSet {
    items: Vec<Value>,
    index: HashMap<u64, Vec<usize>>,
}

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавляет элемент. Возвращает `false`, если он уже был.
    pub fn insert(
        &mut self,
        value: Value,
    ) -> bool {
        let slots = self.index.entry(fingerprint(&value)).or_default();
        if slots.iter().any(|&i| self.items[i] == value) {
            return false;
        }
        slots.push(self.items.len());
        self.items.push(value);
        true
    }

    pub fn contains(
        &self,
        value: &Value,
    ) -> bool {
        self.index
            .get(&fingerprint(value))
            .is_some_and(|slots| slots.iter().any(|&i| &self.items[i] == value))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.items
    }
}

impl PartialEq for ValueSet {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.len() == other.len() && self.iter().all(|v| other.contains(v))
    }
}

impl fmt::Debug for ValueSet {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_set().entries(self.items.iter()).finish()
    }
}

impl FromIterator<Value> for ValueSet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut set = ValueSet::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

impl<'a> IntoIterator for &'a ValueSet {
    type Item = &'a Value;
    type IntoIter = slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub(crate) fn encode_set(
    set: &ValueSet,
    codec: &Codec,
) -> InpoutResult<Vec<u8>> {
    let mut out = Vec::new();
    encode::write_array(&mut out, set.as_slice(), codec, 0)?;
    Ok(out)
}

pub(crate) fn decode_set(
    payload: &[u8],
    codec: &Codec,
) -> InpoutResult<Value> {
    match codec.decode(payload)? {
        Value::Array(items) => Ok(Value::ext(items.into_iter().collect::<ValueSet>())),
        other => Err(CodecError::extension_payload(
            TAG_SET,
            format!("expected array of members, found {}", other.kind_name()),
        )
        .into()),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
