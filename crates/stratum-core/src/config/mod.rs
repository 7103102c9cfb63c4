//! Declaration loading for stratum
//!
//! Turns configuration files into the ordered layer list the resolver
//! consumes:
//! - JSON, JSONC, YAML and TOML declaration files
//! - Auto-discovery by traversing up directories
//! - Declaration extension (`extends` field)
//! - JSON Schema generation via schemars
//!
//! ## Configuration Files
//!
//! Searched in this order in every directory:
//! - `.stratumrc.json`
//! - `.stratumrc.toml`
//! - `stratum.yaml` / `stratum.yml`
//! - `stratum.json` / `stratum.jsonc`
//!
//! ## Example Declaration
//!
//! ```yaml
//! extends: ["../shared/stratum.yaml"]
//! policies:
//!   no-restricted-syntax: append
//!   globals: merge
//! layers:
//!   - name: base
//!     files: ["**/*.{js,ts,tsx}"]
//!     settings:
//!       no-debugger: error
//!       no-console: [error, { allow: [warn, error, info] }]
//!   - name: web
//!     files: ["packages/web/**/*.{ts,tsx}"]
//!     settings:
//!       no-restricted-globals: "off"
//!   - ignores: ["**/dist/", "**/node_modules/"]
//! ```

mod declaration;
mod loader;

pub use declaration::{Declaration, LayerDeclaration};
pub use loader::{CONFIG_FILE_NAMES, ConfigLoader};
