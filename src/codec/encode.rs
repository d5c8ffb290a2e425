//! Запись значений [`Value`] в MessagePack.
//!
//! Целые числа, строки, бинарные данные и коллекции всегда получают самое
//! короткое представление. Числа с плавающей точкой пишутся как float64.

use byteorder::{BigEndian, WriteBytesExt};
use inpout_error::{CodecError, InpoutResult, ResultExt};
use rmp::Marker;

use super::{Codec, FIXCOLLECTION_MAX_LEN, FIXNEG_MIN, FIXPOS_MAX, FIXSTR_MAX_LEN, MAX_FORMAT_LEN};
use crate::Value;

/// Записывает `v` в конец `out`.
///
/// `depth` - уровень вложенности `v` относительно корня.
pub(crate) fn write_value(
    out: &mut Vec<u8>,
    v: &Value,
    codec: &Codec,
    depth: usize,
) -> InpoutResult<()> {
    match v {
        Value::Nil => out.write_u8(Marker::Null.to_u8())?,
        Value::Bool(true) => out.write_u8(Marker::True.to_u8())?,
        Value::Bool(false) => out.write_u8(Marker::False.to_u8())?,
        Value::Int(i) if *i >= 0 => write_uint(out, *i as u64)?,
        Value::Int(i) => write_negative(out, *i)?,
        Value::UInt(u) => write_uint(out, *u)?,
        Value::Float(f) => {
            out.write_u8(Marker::F64.to_u8())?;
            out.write_f64::<BigEndian>(*f)?;
        }
        Value::Str(s) => {
            write_str_header(out, s.len())?;
            out.extend_from_slice(s.as_bytes());
        }
        Value::Bin(b) => {
            write_bin_header(out, b.len())?;
            out.extend_from_slice(b);
        }
        Value::Array(items) => write_array(out, items, codec, depth)?,
        Value::Map(pairs) => {
            let child_depth = enter(codec, depth)?;
            write_map_header(out, pairs.len())?;
            for (k, val) in pairs {
                write_value(out, k, codec, child_depth)?;
                write_value(out, val, codec, child_depth)?;
            }
        }
        Value::Ext(ext) => {
            let entry = codec.registry().encoder_for(ext.kind()).ok_or_else(|| {
                CodecError::UnsupportedType {
                    kind: ext.kind_name().to_string(),
                }
            })?;
            let child_depth = enter(codec, depth)?;
            let nested = codec.descend(child_depth);
            let payload = (entry.encode)(ext.as_any(), &nested)
                .with_context(|| format!("encoding {} as extension {}", entry.kind_name, entry.tag))?;
            write_ext_header(out, payload.len(), entry.tag)?;
            out.extend_from_slice(&payload);
        }
    }
    Ok(())
}

/// Записывает массив из среза без построения промежуточного [`Value`].
pub(crate) fn write_array(
    out: &mut Vec<u8>,
    items: &[Value],
    codec: &Codec,
    depth: usize,
) -> InpoutResult<()> {
    let child_depth = enter(codec, depth)?;
    write_array_header(out, items.len())?;
    for item in items {
        write_value(out, item, codec, child_depth)?;
    }
    Ok(())
}

/// Проверяет, что можно спуститься на уровень ниже, и возвращает глубину
/// дочерних элементов.
fn enter(
    codec: &Codec,
    depth: usize,
) -> InpoutResult<usize> {
    let limit = codec.limits().max_depth;
    if depth >= limit {
        return Err(CodecError::DepthLimit {
            limit,
            offset: None,
        }
        .into());
    }
    Ok(depth + 1)
}

fn write_uint(
    out: &mut Vec<u8>,
    n: u64,
) -> InpoutResult<()> {
    if n <= FIXPOS_MAX {
        out.write_u8(Marker::FixPos(n as u8).to_u8())?;
    } else if n <= u8::MAX as u64 {
        out.write_u8(Marker::U8.to_u8())?;
        out.write_u8(n as u8)?;
    } else if n <= u16::MAX as u64 {
        out.write_u8(Marker::U16.to_u8())?;
        out.write_u16::<BigEndian>(n as u16)?;
    } else if n <= u32::MAX as u64 {
        out.write_u8(Marker::U32.to_u8())?;
        out.write_u32::<BigEndian>(n as u32)?;
    } else {
        out.write_u8(Marker::U64.to_u8())?;
        out.write_u64::<BigEndian>(n)?;
    }
    Ok(())
}

fn write_negative(
    out: &mut Vec<u8>,
    n: i64,
) -> InpoutResult<()> {
    if n >= FIXNEG_MIN {
        out.write_u8(Marker::FixNeg(n as i8).to_u8())?;
    } else if n >= i8::MIN as i64 {
        out.write_u8(Marker::I8.to_u8())?;
        out.write_i8(n as i8)?;
    } else if n >= i16::MIN as i64 {
        out.write_u8(Marker::I16.to_u8())?;
        out.write_i16::<BigEndian>(n as i16)?;
    } else if n >= i32::MIN as i64 {
        out.write_u8(Marker::I32.to_u8())?;
        out.write_i32::<BigEndian>(n as i32)?;
    } else {
        out.write_u8(Marker::I64.to_u8())?;
        out.write_i64::<BigEndian>(n)?;
    }
    Ok(())
}

fn check_len(
    what: &str,
    len: usize,
) -> InpoutResult<()> {
    if len > MAX_FORMAT_LEN {
        return Err(CodecError::SizeLimit {
            what: what.to_string(),
            size: len as u64,
            limit: MAX_FORMAT_LEN as u64,
            offset: None,
        }
        .into());
    }
    Ok(())
}

/// Пишет маркер с 8/16/32-битной длиной.
fn write_sized(
    out: &mut Vec<u8>,
    len: usize,
    markers: [Marker; 3],
) -> InpoutResult<()> {
    if len <= u8::MAX as usize {
        out.write_u8(markers[0].to_u8())?;
        out.write_u8(len as u8)?;
    } else if len <= u16::MAX as usize {
        out.write_u8(markers[1].to_u8())?;
        out.write_u16::<BigEndian>(len as u16)?;
    } else {
        out.write_u8(markers[2].to_u8())?;
        out.write_u32::<BigEndian>(len as u32)?;
    }
    Ok(())
}

fn write_str_header(
    out: &mut Vec<u8>,
    len: usize,
) -> InpoutResult<()> {
    check_len("string", len)?;
    if len <= FIXSTR_MAX_LEN {
        out.write_u8(Marker::FixStr(len as u8).to_u8())?;
        return Ok(());
    }
    write_sized(out, len, [Marker::Str8, Marker::Str16, Marker::Str32])
}

fn write_bin_header(
    out: &mut Vec<u8>,
    len: usize,
) -> InpoutResult<()> {
    check_len("binary", len)?;
    write_sized(out, len, [Marker::Bin8, Marker::Bin16, Marker::Bin32])
}

fn write_array_header(
    out: &mut Vec<u8>,
    len: usize,
) -> InpoutResult<()> {
    check_len("array", len)?;
    if len <= FIXCOLLECTION_MAX_LEN {
        out.write_u8(Marker::FixArray(len as u8).to_u8())?;
    } else if len <= u16::MAX as usize {
        out.write_u8(Marker::Array16.to_u8())?;
        out.write_u16::<BigEndian>(len as u16)?;
    } else {
        out.write_u8(Marker::Array32.to_u8())?;
        out.write_u32::<BigEndian>(len as u32)?;
    }
    Ok(())
}

fn write_map_header(
    out: &mut Vec<u8>,
    len: usize,
) -> InpoutResult<()> {
    check_len("map", len)?;
    if len <= FIXCOLLECTION_MAX_LEN {
        out.write_u8(Marker::FixMap(len as u8).to_u8())?;
    } else if len <= u16::MAX as usize {
        out.write_u8(Marker::Map16.to_u8())?;
        out.write_u16::<BigEndian>(len as u16)?;
    } else {
        out.write_u8(Marker::Map32.to_u8())?;
        out.write_u32::<BigEndian>(len as u32)?;
    }
    Ok(())
}

/// Пишет заголовок расширения: `fixext N` для длин 1/2/4/8/16, иначе
/// `ext 8/16/32`. Тег следует за длиной.
fn write_ext_header(
    out: &mut Vec<u8>,
    len: usize,
    tag: i8,
) -> InpoutResult<()> {
    check_len("extension payload", len)?;
    let fixed = match len {
        1 => Some(Marker::FixExt1),
        2 => Some(Marker::FixExt2),
        4 => Some(Marker::FixExt4),
        8 => Some(Marker::FixExt8),
        16 => Some(Marker::FixExt16),
        _ => None,
    };
    match fixed {
        Some(marker) => out.write_u8(marker.to_u8())?,
        None => write_sized(out, len, [Marker::Ext8, Marker::Ext16, Marker::Ext32])?,
    }
    out.write_i8(tag)?;
    Ok(())
}
