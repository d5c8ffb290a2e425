//! Интеграционные тесты фасада сохранения и загрузки.

use std::fs::{self, OpenOptions};

use chrono::{DateTime, TimeZone, Utc};
use inpout::{
    load_many, load_one, register_decoder, register_encoder, save_many, save_one, Codec,
    DecodeLimits, InpoutResult, LoadOptions, SaveOptions, StatusCode, Value, ValueSet,
};
use rstest::rstest;
use tempfile::tempdir;

fn sample_values() -> Vec<Value> {
    vec![
        Value::Int(1),
        Value::from("a"),
        Value::ext([Value::Int(2), Value::Int(3)].into_iter().collect::<ValueSet>()),
        Value::Nil,
        Value::map([("k", Value::Float(1.5))]),
        Value::Bin(vec![0, 1, 2]),
    ]
}

fn options(compression: bool) -> (SaveOptions, LoadOptions) {
    (
        SaveOptions {
            compression,
            ..SaveOptions::default()
        },
        LoadOptions {
            compression,
            ..LoadOptions::default()
        },
    )
}

fn load_all(
    path: &std::path::Path,
    options: &LoadOptions,
) -> InpoutResult<Vec<Value>> {
    load_many(path, options)?.collect()
}

fn truncate_by(
    path: &std::path::Path,
    n: u64,
) {
    let len = fs::metadata(path).unwrap().len();
    OpenOptions::new()
        .write(true)
        .open(path)
        .unwrap()
        .set_len(len - n)
        .unwrap();
}

////////////////////////////////////////////////////////////////////////////////
// Порядок и режимы
////////////////////////////////////////////////////////////////////////////////

/// Тест проверяет, что значения читаются в порядке записи.
#[rstest]
#[case::lz4(true)]
#[case::raw(false)]
fn test_order_preserved(#[case] compression: bool) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ordered.mpk");
    let (save, load) = options(compression);
    let values = sample_values();

    assert_eq!(save_many(&values, &path, &save).unwrap(), values.len() as u64);
    assert_eq!(load_all(&path, &load).unwrap(), values);
    assert_eq!(load_one(&path, &load).unwrap(), values[0]);
}

/// Тест проверяет, что файл без сжатия - обычный поток MessagePack.
#[test]
fn test_raw_file_is_plain_msgpack() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("plain.mpk");
    save_many([Value::Int(1), Value::from("a")], &path, &SaveOptions::raw()).unwrap();
    assert_eq!(fs::read(&path).unwrap(), vec![0x01, 0xA1, b'a']);
}

/// Тест проверяет сырой файл, чьи первые байты совпадают с сигнатурой
/// LZ4-кадра: он читается как обычный поток.
#[test]
fn test_raw_file_starting_with_lz4_magic() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("magic.mpk");
    let values = vec![Value::Int(4), Value::Int(34), Value::Int(77), Value::Int(24)];
    save_many(&values, &path, &SaveOptions::raw()).unwrap();
    assert_eq!(fs::read(&path).unwrap(), vec![0x04, 0x22, 0x4D, 0x18]);

    assert_eq!(load_all(&path, &LoadOptions::raw()).unwrap(), values);
}

/// Тест проверяет дозапись нескольких кадров подряд с большим первым
/// кадром: значения из всех кадров читаются по порядку.
#[test]
fn test_append_after_large_frame() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("large.lz4");
    let first: Vec<Value> = (0..20_000).map(|i| Value::from(format!("row-{i}"))).collect();
    save_many(&first, &path, &SaveOptions::default()).unwrap();
    save_one(&Value::from("tail"), &path, &SaveOptions::default().appending()).unwrap();

    let loaded = load_all(&path, &LoadOptions::default()).unwrap();
    assert_eq!(loaded.len(), first.len() + 1);
    assert_eq!(&loaded[..first.len()], &first[..]);
    assert_eq!(loaded.last(), Some(&Value::from("tail")));
}

/// Тест проверяет, что несовпадение режима сжатия обнаруживается в обе
/// стороны.
#[rstest]
#[case::lz4_read_as_raw(true)]
#[case::raw_read_as_lz4(false)]
fn test_mismatched_compression(#[case] written_compressed: bool) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mismatch.mpk");
    let (save, _) = options(written_compressed);
    let (_, load) = options(!written_compressed);
    save_many(&sample_values(), &path, &save).unwrap();

    let err = load_all(&path, &load).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::CorruptedData);
}

/// Тест проверяет дозапись в конец файла в обоих режимах.
#[rstest]
#[case::lz4(true)]
#[case::raw(false)]
fn test_append(#[case] compression: bool) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("appended.mpk");
    let (save, load) = options(compression);

    save_many([Value::Int(1), Value::Int(2)], &path, &save).unwrap();
    save_one(&Value::from("three"), &path, &save.appending()).unwrap();
    save_many([Value::Int(4)], &path, &save.appending()).unwrap();

    let loaded = load_all(&path, &load).unwrap();
    assert_eq!(
        loaded,
        vec![Value::Int(1), Value::Int(2), Value::from("three"), Value::Int(4)]
    );
}

/// Тест проверяет, что дозапись в отсутствующий файл создаёт его.
#[test]
fn test_append_creates_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fresh.mpk");
    save_one(&Value::Bool(true), &path, &SaveOptions::default().appending()).unwrap();
    assert_eq!(load_one(&path, &LoadOptions::default()).unwrap(), Value::Bool(true));
}

////////////////////////////////////////////////////////////////////////////////
// Повреждённые файлы
////////////////////////////////////////////////////////////////////////////////

/// Тест проверяет обрезанный сырой файл: целые значения читаются, затем
/// ошибка и конец итерации.
#[test]
fn test_truncated_raw_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("truncated.mpk");
    let values = [Value::from("alpha"), Value::from("beta"), Value::from("gamma")];
    save_many(&values, &path, &SaveOptions::raw()).unwrap();
    truncate_by(&path, 2);

    let mut iter = load_many(&path, &LoadOptions::raw()).unwrap();
    assert_eq!(iter.next().unwrap().unwrap(), values[0]);
    assert_eq!(iter.next().unwrap().unwrap(), values[1]);
    let err = iter.next().unwrap().unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UnexpectedEof);
    assert!(iter.next().is_none());
    assert_eq!(iter.values_read(), 2);
}

/// Тест проверяет, что обрезанный сжатый файл даёт ошибку, а не тихий
/// конец потока.
#[test]
fn test_truncated_lz4_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("truncated.lz4");
    let values: Vec<Value> = (0..500).map(|i| Value::from(format!("value-{i}"))).collect();
    save_many(&values, &path, &SaveOptions::default()).unwrap();
    truncate_by(&path, 6);

    let err = load_all(&path, &LoadOptions::default()).unwrap_err();
    assert!(matches!(
        err.status_code(),
        StatusCode::CorruptedData | StatusCode::UnexpectedEof
    ));
}

#[test]
fn test_missing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nope.mpk");
    let err = load_many(&path, &LoadOptions::default()).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::NotFound);
    let err = load_one(&path, &LoadOptions::default()).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::NotFound);
}

/// Тест проверяет, что лимит глубины из LoadOptions применяется к файлу.
#[test]
fn test_depth_limit_from_options() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("deep.mpk");
    let mut value = Value::Int(0);
    for _ in 0..6 {
        value = Value::Array(vec![value]);
    }
    save_one(&value, &path, &SaveOptions::default()).unwrap();

    let strict = LoadOptions {
        limits: DecodeLimits {
            max_depth: 3,
            ..DecodeLimits::default()
        },
        ..LoadOptions::default()
    };
    let err = load_one(&path, &strict).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::DepthLimit);
    assert_eq!(load_one(&path, &LoadOptions::default()).unwrap(), value);
}

////////////////////////////////////////////////////////////////////////////////
// Ресурсы
////////////////////////////////////////////////////////////////////////////////

/// Тест проверяет, что частично прочитанный итератор отпускает файл:
/// файл можно перезаписать и прочитать заново.
#[test]
fn test_dropped_iterator_releases_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reused.lz4");
    save_many(&sample_values(), &path, &SaveOptions::default()).unwrap();

    let mut iter = load_many(&path, &LoadOptions::default()).unwrap();
    assert_eq!(iter.next().unwrap().unwrap(), Value::Int(1));
    drop(iter);

    save_many([Value::from("new")], &path, &SaveOptions::default()).unwrap();
    assert_eq!(load_all(&path, &LoadOptions::default()).unwrap(), vec![Value::from("new")]);
}

////////////////////////////////////////////////////////////////////////////////
// Расширения
////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq)]
struct Point {
    x: i64,
    y: i64,
}

const POINT_TAG: i8 = 10;

/// Тест проверяет пользовательский тип, зарегистрированный в глобальном
/// реестре, через файловый фасад.
#[test]
fn test_custom_extension_via_global_registry() {
    register_encoder::<Point, _>(POINT_TAG, |p: &Point, codec: &Codec| {
        codec.encode(&Value::Array(vec![Value::Int(p.x), Value::Int(p.y)]))
    })
    .unwrap();
    register_decoder(POINT_TAG, |payload: &[u8], codec: &Codec| {
        let value = codec.decode(payload)?;
        let coords = value.as_array().unwrap_or_default();
        match coords {
            [x, y] => Ok(Value::ext(Point {
                x: x.as_i64().unwrap_or_default(),
                y: y.as_i64().unwrap_or_default(),
            })),
            _ => Ok(Value::Nil),
        }
    })
    .unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("points.lz4");
    let values = vec![
        Value::ext(Point { x: 1, y: -2 }),
        Value::Array(vec![Value::ext(Point { x: 3, y: 4 })]),
    ];
    save_many(&values, &path, &SaveOptions::default()).unwrap();

    let loaded = load_all(&path, &LoadOptions::default()).unwrap();
    assert_eq!(loaded, values);
    assert_eq!(loaded[0].as_ext::<Point>(), Some(&Point { x: 1, y: -2 }));
}

/// Тест проверяет неизвестный тип: ошибка UnsupportedType при записи.
#[test]
fn test_unregistered_type_fails_on_save() {
    #[derive(Debug, Clone, PartialEq)]
    struct Opaque;

    let dir = tempdir().unwrap();
    let path = dir.path().join("opaque.mpk");
    let err = save_one(&Value::ext(Opaque), &path, &SaveOptions::default()).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UnsupportedType);
}

/// Тест проверяет метку времени через файл: точность до микросекунд.
#[test]
fn test_timestamp_via_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ts.lz4");
    let ts: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 2, 29, 12, 30, 45).unwrap()
        + chrono::Duration::microseconds(123_456);
    save_one(&Value::ext(ts), &path, &SaveOptions::default()).unwrap();

    let loaded = load_one(&path, &LoadOptions::default()).unwrap();
    assert_eq!(loaded.as_ext::<DateTime<Utc>>(), Some(&ts));
}
