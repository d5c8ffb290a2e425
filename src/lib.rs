/// MessagePack codec, streaming sessions and the extension type registry.
pub mod codec;
/// Settings loading (defaults, `inpout.toml`, `INPOUT_*` environment).
pub mod config;
/// File sinks and sources: raw or LZ4 frame streams.
pub mod compression;
/// Built-in extension types: set and timestamp.
pub mod ext_types;
/// Logging setup (filters, formats, sinks).
pub mod logging;
/// Save and load façade.
pub mod persist;
/// The value model.
pub mod value;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Codec, limits and registry.
pub use codec::{
    register_decoder, register_encoder, Codec, DecodeLimits, Decoder, Encoder, TypeRegistry,
};
/// Compression settings.
pub use compression::{BlockSize, Compression};
/// Settings.
pub use config::Settings;
/// Built-in extension types.
pub use ext_types::ValueSet;
/// Error types and result alias.
pub use inpout_error::{CodecError, InpoutResult, StackError, StatusCode, StreamError};
/// Save and load API.
pub use persist::{load_many, load_one, save_many, save_one, LoadOptions, SaveOptions, ValueIter};
/// Values.
pub use value::{Extension, ExtensionValue, Value};
