pub mod loader;
pub mod schema;

pub use loader::{load_from_path, load_from_str, load_or_default, ConfigError, PolicyFormat};
pub use schema::{ForbiddenPattern, PatternEntry, PolicyConfig, PolicyDocument};
