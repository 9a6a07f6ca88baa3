//! Layered configuration.
//!
//! Sources, lowest to highest priority, merged field by field:
//! 1. **Defaults** - `Config::default()`
//! 2. **Project** - `$CWD/eisenhower/config.yaml`
//! 3. **User** - `~/.eisenhower/config.yaml`
//! 4. **Environment** - variables listed below
//!
//! Command-line flags are applied on top by the binary.
//!
//! ## Environment Variables
//! - `EISENHOWER_CONFIG_PATH` - Explicit config file (replaces tiers 2 and 3)
//! - `EISENHOWER_PROJECT_DIR` - Project config dir (default: `./eisenhower`)
//! - `EISENHOWER_USER_DIR` - User config dir (default: `~/.eisenhower`)
//! - `EISENHOWER_DB_PATH` - Database path
//! - `EISENHOWER_HOST` - Bind address
//! - `PORT` - Listen port
//! - `EISENHOWER_STATIC_DIR` - Directory with the browser client
//! - `MOVE_DEBOUNCE_MS` - Move queue debounce window

mod loader;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier, deep_merge};
pub use types::*;
