//! Встроенные типы расширений: множество и метка времени.

pub mod set;
pub mod timestamp;

use chrono::{DateTime, Utc};
use inpout_error::InpoutResult;
use tracing::error;

pub use set::ValueSet;

use crate::codec::{TypeRegistry, TAG_SET, TAG_TIMESTAMP};

/// Регистрирует встроенные расширения в `registry`.
pub fn register_builtins(registry: &mut TypeRegistry) {
    if let Err(e) = try_register_builtins(registry) {
        error!(error = %e, "Failed to register built-in extensions");
    }
}

fn try_register_builtins(registry: &mut TypeRegistry) -> InpoutResult<()> {
    registry.register_encoder::<ValueSet, _>(TAG_SET, set::encode_set)?;
    registry.register_decoder(TAG_SET, set::decode_set)?;
    registry.register_encoder::<DateTime<Utc>, _>(TAG_TIMESTAMP, timestamp::encode_timestamp)?;
    registry.register_decoder(TAG_TIMESTAMP, timestamp::decode_timestamp)?;
    Ok(())
}
