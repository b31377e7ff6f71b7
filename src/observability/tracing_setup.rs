// observability/tracing_setup.rs - Log Subscriber Setup

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    fmt,
    layer::{Layered, SubscriberExt},
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer, Registry,
};

/// Log line layout
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingFormat {
    /// Multi-line, for reading conversations by eye
    Pretty,
    #[default]
    Compact,
    /// One JSON object per event
    Json,
}

/// `[logging]` section of the engine configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// `EnvFilter` directives, e.g. `"warn,fipa_acl_engine::protocol=trace"`
    pub level: String,
    pub format: TracingFormat,
    /// Terminal colors; ignored for JSON
    pub ansi: bool,
    /// Print file and line of each event
    pub source_location: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: "warn,fipa_acl_engine=info".into(),
            format: TracingFormat::Compact,
            ansi: true,
            source_location: false,
        }
    }
}

impl TracingConfig {
    /// Same layout, every engine event down to `debug`
    pub fn verbose(mut self) -> Self {
        self.level = "info,fipa_acl_engine=debug".into();
        self
    }
}

type FilteredRegistry = Layered<EnvFilter, Registry>;

fn output_layer(config: &TracingConfig) -> Box<dyn Layer<FilteredRegistry> + Send + Sync> {
    let base = fmt::layer()
        .with_file(config.source_location)
        .with_line_number(config.source_location);

    match config.format {
        TracingFormat::Pretty => base.pretty().with_ansi(config.ansi).boxed(),
        TracingFormat::Compact => base.compact().with_ansi(config.ansi).boxed(),
        TracingFormat::Json => base.json().with_ansi(false).boxed(),
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `config.level`. Fails if a subscriber is already set.
pub fn init_tracing(config: TracingConfig) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(output_layer(&config))
        .try_init()?;

    tracing::debug!(level = %config.level, format = ?config.format, "Tracing initialized");
    Ok(())
}
