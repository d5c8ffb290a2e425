#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use inpout::{Codec, Value, ValueSet};

const MAX_DEPTH: usize = 6;

/// Строит произвольное Value ограниченной глубины.
fn arbitrary_value(
    u: &mut Unstructured<'_>,
    depth: usize,
) -> arbitrary::Result<Value> {
    let leaf_only = depth >= MAX_DEPTH;
    let choice = u.int_in_range(0..=if leaf_only { 6 } else { 9 })?;
    Ok(match choice {
        0 => Value::Nil,
        1 => Value::Bool(bool::arbitrary(u)?),
        2 => Value::Int(i64::arbitrary(u)?),
        3 => Value::UInt(u.int_in_range((i64::MAX as u64 + 1)..=u64::MAX)?),
        4 => {
            let f = f64::arbitrary(u)?;
            Value::Float(if f.is_nan() { 0.0 } else { f })
        }
        5 => Value::Str(String::arbitrary(u)?),
        6 => Value::Bin(Vec::<u8>::arbitrary(u)?),
        7 => {
            let len = u.int_in_range(0..=8)?;
            let items = (0..len)
                .map(|_| arbitrary_value(u, depth + 1))
                .collect::<arbitrary::Result<Vec<_>>>()?;
            Value::Array(items)
        }
        8 => {
            let len = u.int_in_range(0..=8)?;
            let mut pairs = Vec::with_capacity(len);
            for i in 0..len {
                // Ключи уникальны: повторы схлопываются при чтении.
                pairs.push((Value::Int(i as i64), arbitrary_value(u, depth + 1)?));
            }
            Value::Map(pairs)
        }
        _ => {
            let len = u.int_in_range(0..=8)?;
            let set = (0..len)
                .map(|_| arbitrary_value(u, MAX_DEPTH))
                .collect::<arbitrary::Result<ValueSet>>()?;
            Value::ext(set)
        }
    })
}

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);
    let Ok(value) = arbitrary_value(&mut u, 0) else {
        return;
    };

    let codec = Codec::global();
    let bytes = codec.encode(&value).expect("encoding must succeed");
    let decoded = codec.decode(&bytes).expect("decoding must succeed");
    assert_eq!(decoded, value);
});
