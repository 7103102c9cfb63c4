//! Stratum Core
//!
//! Layered, pattern-scoped configuration resolution. An ordered list of
//! layers, each scoped to a set of path selectors, is folded into the
//! effective settings for one path. Later layers override earlier ones,
//! keys with an append policy accumulate, and ignore-layers veto a path
//! outright.
//!
//! ```
//! use stratum_core::{LayerResolver, LayerSpec, SettingValue, Severity};
//!
//! let resolver = LayerResolver::new(vec![
//!     LayerSpec::new(["**/*.ts"]).with_setting("severity", Severity::Warn),
//!     LayerSpec::new(["packages/web/**/*.tsx"]).with_setting("severity", Severity::Error),
//!     LayerSpec::ignore(["**/dist/**"]),
//! ])
//! .unwrap();
//!
//! let web = resolver.resolve("packages/web/App.tsx");
//! assert_eq!(
//!     web.effective().unwrap().get("severity"),
//!     Some(&SettingValue::Severity(Severity::Error))
//! );
//! assert!(resolver.resolve("packages/web/dist/bundle.ts").is_excluded());
//! ```

pub mod config;
pub mod error;
pub mod layer;
pub mod path;
pub mod policy;
pub mod resolver;
pub mod selector;
pub mod value;

// Declaration loading
pub use config::{ConfigLoader, Declaration, LayerDeclaration};
pub use error::{ErrorKind, Result, StratumError};
pub use layer::{Layer, LayerKind, LayerSpec, SelectorSet};
pub use path::normalize_path;
pub use policy::{MergePolicies, MergePolicy};
pub use resolver::{EffectiveConfig, Explanation, LayerMatch, LayerResolver, Resolution};
pub use selector::{GlobSelector, Selector};
pub use value::{SettingValue, Severity};

/// Initialize the tracing subscriber for logging
pub fn init_tracing() {
    init_tracing_with("stratum=info");
}

/// Initialize tracing with `default_directive` unless `RUST_LOG` is set.
/// Log lines go to stderr so stdout stays machine-readable.
pub fn init_tracing_with(default_directive: &str) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
