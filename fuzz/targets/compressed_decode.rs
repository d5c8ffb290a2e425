#![no_main]

use std::{fs, path::PathBuf, sync::OnceLock};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use inpout::{load_many, DecodeLimits, LoadOptions};
use tempfile::TempDir;

#[derive(Debug, Arbitrary)]
struct CompressedFuzzInput {
    /// Повреждённый LZ4-кадр
    frame: Vec<u8>,
    /// Подставить ли корректную сигнатуру кадра
    with_magic: bool,
}

static DIR: OnceLock<TempDir> = OnceLock::new();

fn input_path() -> PathBuf {
    DIR.get_or_init(|| TempDir::new().expect("temp dir"))
        .path()
        .join("input.lz4")
}

fuzz_target!(|input: CompressedFuzzInput| {
    let mut data = Vec::with_capacity(input.frame.len() + 4);
    if input.with_magic {
        data.extend_from_slice(&[0x04, 0x22, 0x4D, 0x18]);
    }
    data.extend_from_slice(&input.frame);

    let path = input_path();
    fs::write(&path, &data).expect("write fuzz input");

    let options = LoadOptions {
        compression: true,
        limits: DecodeLimits {
            max_depth: 64,
            max_len: 1 << 16,
        },
    };

    // Ошибки ожидаемы, паника - нет. После ошибки итератор заканчивается.
    let Ok(mut values) = load_many(&path, &options) else {
        return;
    };
    while let Some(item) = values.next() {
        if item.is_err() {
            assert!(values.next().is_none());
            break;
        }
    }
});
