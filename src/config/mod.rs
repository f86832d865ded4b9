mod settings;

pub use settings::{
    Config, ConfigError, InspectorSettings, RelaySettings, ServerSettings, EXAMPLE_CONFIG,
};
