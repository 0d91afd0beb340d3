pub mod settings;

pub use settings::{
    AppSettings, IceSettings, Settings, TranscriptionSettings, TranslationSettings,
};
