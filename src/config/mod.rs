pub mod loader;
pub mod schema;

pub use loader::{discover, load, load_from_path, load_from_str, ConfigError};
pub use schema::{
    PatcherConfig, ProviderSettings, RewriteSettings, ValidationError, ValidationIssue,
};
