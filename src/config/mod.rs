//! Загрузка настроек: значения по умолчанию, файл `inpout.toml`,
//! переменные окружения `INPOUT_*`.

pub mod settings;

pub use settings::Settings;
