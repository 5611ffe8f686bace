//! Repro build layer
//!
//! Turns a testcase (id, revision, optional prebuilt archive, optional pinned
//! gn args) and a job definition into a path to the binary that reproduces
//! the crash. The binary is either unpacked from the testcase's prebuilt
//! archive or built from a local checkout after bringing it to the
//! testcase's commit.
//!
//! # Example
//!
//! ```no_run
//! use repro_build::{
//!     BinaryProvider, BuildOptions, HttpFetcher, PassthroughEditor, Provider, Services,
//!     SystemRunner, Testcase,
//! };
//! use repro_config::ConfigLoader;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # struct Yes;
//! # impl repro_build::Confirmer for Yes {
//! #     fn confirm(&self, _: &str) -> repro_build::BuildResult<bool> { Ok(true) }
//! # }
//! let config = ConfigLoader::new().load().unwrap();
//! let testcase = Testcase::from_file(Path::new("testcase.json")).unwrap();
//! let definition = config.catalog.get("linux_asan_d8").unwrap();
//! let services = Services::new(
//!     Arc::new(SystemRunner::new()),
//!     Arc::new(HttpFetcher::new().unwrap()),
//!     Arc::new(Yes),
//!     Arc::new(PassthroughEditor),
//! );
//!
//! let mut provider = Provider::select(
//!     &testcase,
//!     definition,
//!     &BuildOptions::default(),
//!     &config.dirs,
//!     &services,
//! )
//! .unwrap();
//! println!("{}", provider.binary_path().unwrap().display());
//! ```

pub mod archive;
pub mod checkout;
pub mod cleaner;
pub mod command;
pub mod error;
pub mod gn_args;
pub mod goma;
pub mod options;
pub mod providers;
pub mod revision;
pub mod testcase;
pub mod transform;

pub use checkout::{reconcile, CheckoutState, Confirmer, Git};
pub use cleaner::ThirdPartyCleaner;
pub use command::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use error::{BuildError, BuildResult};
pub use gn_args::{ArgsEditor, GnArgs, GnArgsComposer, PassthroughEditor};
pub use goma::GomaPolicy;
pub use options::{BuildMode, BuildOptions};
pub use providers::{
    resolve_binary_name, BinaryProvider, DownloadedBinary, Provider, Recipe, Services,
    SourceBuilder,
};
pub use revision::{Fetcher, HttpFetcher, RevisionStrategy};
pub use testcase::Testcase;
pub use transform::{OutputTransformer, Transform};
