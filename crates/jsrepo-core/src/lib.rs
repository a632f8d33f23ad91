#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod build;
pub mod cache;
pub mod config;
pub mod error;
pub mod langs;
pub mod manifest;
pub mod pkg;
pub mod resolver;
pub mod transform;
pub mod version;

pub use build::{
    build, build_registry, BuildContext, BuildError, BuildOutput, CyclePolicy, Warning,
    WarningHandler,
};
pub use config::{RegistryConfig, CONFIG_FILE};
pub use error::Error;
pub use langs::{default_languages, resolve_dependencies, select_language, Language};
pub use manifest::{Manifest, ManifestError};
pub use pkg::{parse_package_name, RemoteDependency, VersionResolver, WorkspaceResolver};
pub use resolver::{resolve_imports, ResolveOptions, ResolvedImports};
pub use transform::{
    transform_imports, transform_imports_counted, TransformOptions, TransformOutput,
};
pub use version::VERSION;
