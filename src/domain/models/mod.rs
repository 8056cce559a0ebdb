pub mod config;
pub mod dirty;
pub mod metadata;
pub mod options;

pub use config::{
    EngineConfig, LogFormat, LoggingConfig, ParseMode, ParserConfig, RotationPolicy, TraceConfig,
};
pub use dirty::DirtyFlag;
pub use metadata::Metadata;
pub use options::Options;
