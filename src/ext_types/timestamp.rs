//! Метка времени UTC (тег 126).
//!
//! Полезная нагрузка: закодированный массив `[секунды, микросекунды]`.
//! Наносекунды ниже микросекунды при записи отбрасываются. Високосная
//! секунда хранится как у `chrono`: микросекунды от 1_000_000 до 1_999_999
//! в последней секунде минуты.

use chrono::{DateTime, Utc};
use inpout_error::{CodecError, InpoutResult};

use crate::{
    codec::{Codec, TAG_TIMESTAMP},
    Value,
};

pub(crate) fn encode_timestamp(
    ts: &DateTime<Utc>,
    codec: &Codec,
) -> InpoutResult<Vec<u8>> {
    let payload = Value::Array(vec![
        Value::Int(ts.timestamp()),
        Value::from(ts.timestamp_subsec_micros()),
    ]);
    codec.encode(&payload)
}

pub(crate) fn decode_timestamp(
    payload: &[u8],
    codec: &Codec,
) -> InpoutResult<Value> {
    let value = codec.decode(payload)?;
    let (secs, micros) = match value.as_array() {
        Some([secs, micros]) => (secs.as_i64(), micros.as_u64()),
        _ => (None, None),
    };
    let (Some(secs), Some(micros)) = (secs, micros) else {
        return Err(CodecError::extension_payload(
            TAG_TIMESTAMP,
            format!("expected [seconds, microseconds], found {value}"),
        )
        .into());
    };
    if micros >= 2_000_000 {
        return Err(CodecError::extension_payload(
            TAG_TIMESTAMP,
            format!("microseconds out of range: {micros}"),
        )
        .into());
    }
    let ts = DateTime::from_timestamp(secs, (micros as u32) * 1_000).ok_or_else(|| {
        CodecError::extension_payload(
            TAG_TIMESTAMP,
            format!("timestamp out of range: {secs}s {micros}us"),
        )
    })?;
    Ok(Value::ext(ts))
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, TimeZone};
    use inpout_error::StatusCode;

    use super::*;
    use crate::TypeRegistry;

    fn codec() -> Codec {
        Codec::new(Arc::new(TypeRegistry::with_builtins()))
    }

    #[test]
    fn test_roundtrip_micro_precision() {
        let ts = Utc.with_ymd_and_hms(2024, 2, 29, 12, 30, 45).unwrap()
            + chrono::Duration::microseconds(123_456);
        let v = Value::ext(ts);
        let c = codec();
        assert_eq!(c.decode(&c.encode(&v).unwrap()).unwrap(), v);
    }

    /// Тест проверяет отбрасывание наносекунд при записи.
    #[test]
    fn test_nanoseconds_truncated() {
        let ts = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        let c = codec();
        let decoded = c.decode(&c.encode(&Value::ext(ts)).unwrap()).unwrap();
        let back = decoded.as_ext::<DateTime<Utc>>().unwrap();
        assert_eq!(back.timestamp(), 1_700_000_000);
        assert_eq!(back.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn test_before_epoch() {
        let ts = DateTime::from_timestamp(-1, 500_000_000).unwrap();
        let c = codec();
        let decoded = c.decode(&c.encode(&Value::ext(ts)).unwrap()).unwrap();
        assert_eq!(decoded.as_ext::<DateTime<Utc>>(), Some(&ts));
    }

    #[test]
    fn test_wire_format() {
        let ts = DateTime::from_timestamp(1, 2_000).unwrap();
        let bytes = codec().encode(&Value::ext(ts)).unwrap();
        // [1, 2] = 0x92 0x01 0x02 → ext8 с тегом 126.
        assert_eq!(bytes, vec![0xC7, 3, 0x7E, 0x92, 0x01, 0x02]);
    }

    /// Тест проверяет отказ на некорректной полезной нагрузке.
    #[test]
    fn test_bad_payloads() {
        let c = codec();
        // одиночное число вместо массива
        let err = c.decode(&[0xD4, 0x7E, 0x01]).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::ExtensionFailed);

        // микросекунды >= 2 * 10^6
        let err = c.decode(&ext_payload(&c, 59, 2_000_000)).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::ExtensionFailed);

        // лишняя секунда не на границе минуты
        let err = c.decode(&ext_payload(&c, 0, 1_000_000)).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::ExtensionFailed);
    }

    fn ext_payload(
        c: &Codec,
        secs: i64,
        micros: i64,
    ) -> Vec<u8> {
        let mut payload = c
            .encode(&Value::Array(vec![Value::Int(secs), Value::Int(micros)]))
            .unwrap();
        let mut bytes = vec![0xC7, payload.len() as u8, 0x7E];
        bytes.append(&mut payload);
        bytes
    }

    /// Тест проверяет, что високосная секунда, которую удалось записать,
    /// читается обратно без потерь.
    #[test]
    fn test_leap_second_roundtrip() {
        let ts = NaiveDate::from_ymd_opt(2016, 12, 31)
            .unwrap()
            .and_hms_micro_opt(23, 59, 59, 1_500_000)
            .unwrap()
            .and_utc();
        assert!(ts.timestamp_subsec_nanos() >= 1_000_000_000);

        let v = Value::ext(ts);
        let c = codec();
        let decoded = c.decode(&c.encode(&v).unwrap()).unwrap();
        assert_eq!(decoded.as_ext::<DateTime<Utc>>(), Some(&ts));
    }
}
