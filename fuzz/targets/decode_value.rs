#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use inpout::{Codec, DecodeLimits};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    data: Vec<u8>,
    max_depth: u8,
    max_len: u16,
}

fuzz_target!(|input: FuzzInput| {
    let codec = Codec::global().with_limits(DecodeLimits {
        max_depth: input.max_depth as usize,
        max_len: input.max_len as u64,
    });

    // Декодер не должен паниковать ни на каких данных.
    let Ok(value) = codec.decode(&input.data) else {
        return;
    };

    // Всё, что декодировалось, кодируется обратно в те же значения.
    let bytes = codec.encode(&value).expect("decoded value must encode");
    let again = codec.decode(&bytes).expect("re-encoded value must decode");
    assert_eq!(again, value);

    // Потоковый декодер принимает последовательность из двух копий.
    let mut twice = bytes.clone();
    twice.extend_from_slice(&bytes);
    let decoded: Vec<_> = codec.make_decoder(&twice[..]).collect();
    assert_eq!(decoded.len(), 2);
    assert!(decoded.iter().all(|v| v.as_ref().ok() == Some(&value)));
});
