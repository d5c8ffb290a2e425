//! Константы формата MessagePack, которые кодек использует при выборе
//! самого короткого представления.
//!
//! Сами байты маркеров берутся из [`rmp::Marker`].

/// Наибольшее значение positive fixint.
pub const FIXPOS_MAX: u64 = 0x7F;
/// Наименьшее значение negative fixint.
pub const FIXNEG_MIN: i64 = -32;
/// Наибольшая длина fixstr.
pub const FIXSTR_MAX_LEN: usize = 31;
/// Наибольшее число элементов fixarray / пар fixmap.
pub const FIXCOLLECTION_MAX_LEN: usize = 15;
/// Наибольшая длина, которую формат может выразить (32 бита).
pub const MAX_FORMAT_LEN: usize = u32::MAX as usize;

/// Допустимый диапазон тегов расширений для регистрации.
///
/// Отрицательные теги зарезервированы форматом.
pub const MIN_EXT_TAG: i8 = 0;
pub const MAX_EXT_TAG: i8 = 127;

/// Тег встроенного расширения «множество».
pub const TAG_SET: i8 = 127;
/// Тег встроенного расширения «метка времени».
pub const TAG_TIMESTAMP: i8 = 126;

/// Сигнатура LZ4-кадра (little-endian `0x184D2204`).
pub const LZ4_FRAME_MAGIC: [u8; 4] = [0x04, 0x22, 0x4D, 0x18];

/// Проверяет, можно ли зарегистрировать тег.
pub fn is_valid_ext_tag(tag: i8) -> bool {
    (MIN_EXT_TAG..=MAX_EXT_TAG).contains(&tag)
}
