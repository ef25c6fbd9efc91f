//! External resource loading for clirack
//!
//! This crate provides the loader subsystem used by clirack commands:
//! - Locator parsing (`scheme://payload`)
//! - A registry dispatching locators to pluggable [`Loader`]s
//! - A per-target-directory freshness index so unchanged resources are not
//!   downloaded again
//! - Staging directories with atomic swap, and archive unpacking for loaders
//!   that download
//! - Caller-supplied path resolution after a load
//!
//! Network loaders live in their own crates (`clirack-loader-github`,
//! `clirack-loader-url`) and register themselves with a [`LoaderRegistry`].
//!
//! # Example
//!
//! ```ignore
//! use clirack_core::{LoaderConfig, LoaderRegistry, require_dir};
//!
//! let mut registry = LoaderRegistry::with_builtin_loaders(LoaderConfig::from_env()?);
//! clirack_loader_github::register(&mut registry)?;
//!
//! let meta = registry
//!     .load_with("github://corvis/esphome-packages", &require_dir("packages"))
//!     .await?;
//! println!("{}", meta.target_path().display());
//! ```

pub mod archive;
pub mod cache;
pub mod config;
mod error;
pub mod loader;
pub mod local;
pub mod locator;
pub mod lock;
pub mod meta;
pub mod registry;
pub mod resolver;
pub mod retry;
pub mod staging;

// Re-export error types at crate root
pub use error::{BoxError, Error, Result};

// Re-export main types
pub use archive::{ArchiveKind, unpack};
pub use cache::{CacheEntry, CacheIndex};
pub use config::{DuplicatePolicy, LoaderConfig};
pub use loader::{FetchContext, Loader, hash_suffix, sanitize_component};
pub use local::LocalLoader;
pub use lock::{KeyLock, LockTable};
pub use locator::ResourceLocator;
pub use meta::LoadedDataMeta;
pub use registry::LoaderRegistry;
pub use resolver::{PathResolver, require_dir, structure_error};
pub use retry::{RetryConfig, with_retry};
pub use staging::Staging;
