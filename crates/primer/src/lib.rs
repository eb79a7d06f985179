//! # primer
//!
//! Prepares an application unit for its process manager.
//!
//! Persists the unit's environment to a shell-sourceable file, runs the
//! lifecycle hooks declared in the app descriptor, and turns a Procfile into
//! watcher sections of the supervisor's config.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use primer::{env, EchoSinkFactory, HookSequencer, HookSpec, ShellRunner};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> primer::Result<()> {
//! let overrides = env::EnvironmentMap::from([("PORT".to_string(), "8888".to_string())]);
//! let runner = ShellRunner::new(env::ambient(), "/home/application/current", "unit-agent");
//! let hooks = HookSpec {
//!     build: vec!["make assets".into()],
//!     ..HookSpec::default()
//! };
//!
//! HookSequencer::new(&runner, &EchoSinkFactory)
//!     .run_build_hooks(&hooks, &overrides)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod descriptor;
pub mod env;
pub mod envfile;
pub mod error;
pub mod hooks;
pub mod procfile;
pub mod runner;
pub mod sink;
pub mod time;
pub mod watchers;

pub use config::AgentConfig;
pub use descriptor::load_app_descriptor;
pub use env::EnvironmentMap;
pub use error::{Error, Phase, Result};
pub use hooks::{HookSequencer, HookSpec, RestartHooks, RestartPhase};
pub use procfile::{ProcessType, Procfile};
pub use runner::{CommandRunner, RunRequest, ShellRunner};
pub use sink::{EchoSink, EchoSinkFactory, OutputSink, SinkFactory, Stream, StreamSpec};
pub use watchers::{write_config, WatcherTemplate};
