//! # tether
//!
//! Ties asynchronous work to the lifecycle of the component that started it.
//!
//! ## Architecture
//!
//! ```text
//! LifecycleSource → resolver → TerminalSignal → Scope → bound consumer
//!                                                          ↑
//!                                   source → normalizer ───┘
//! ```
//!
//! A component owns a [`LifecycleSource`](lifecycle::LifecycleSource). Each
//! binding made through a [`Scope`](scope::Scope) samples the current event,
//! looks up the event that ends it, and disposes itself when that event
//! arrives or when its upstream finishes, whichever comes first.
//!
//! ## Quick Start
//!
//! ```bash
//! # Watch a simulated screen consume a bursty feed
//! RUST_LOG=tether=debug tether demo --window-ms 300
//!
//! # Show the resolved configuration
//! tether config
//! ```
//!
//! ## Modules
//!
//! - [`app`]: Error types and the uncaught error sink
//! - [`cli`]: Command-line interface for the demo binary
//! - [`config`]: TOML configuration
//! - [`lifecycle`]: Lifecycle events, sources and the end-signal resolver
//! - [`normalizer`]: Time-window rate normalizer for streams
//! - [`scope`]: Scope-bound consumers

/// Error types and the uncaught error sink.
///
/// [`ScopeError`](app::ScopeError) is the crate error. Errors no consumer can
/// take end up in an [`ErrorSink`](app::ErrorSink).
pub mod app;

/// Command-line interface using clap.
///
/// - `demo` - Simulate a screen consuming a bursty, rate-normalized feed
/// - `config` - Print the resolved configuration
pub mod cli;

/// Configuration management.
///
/// Loads from `~/.config/tether/config.toml`, creating a commented default.
pub mod config;

/// Lifecycle events and the end-signal resolver.
///
/// - [`ScreenEvent`](lifecycle::ScreenEvent) / [`ViewEvent`](lifecycle::ViewEvent): the two event sets
/// - [`LifecycleSource`](lifecycle::LifecycleSource): per-component event sequence
/// - [`TerminalSignal`](lifecycle::TerminalSignal): one-shot "scope ended" future
pub mod lifecycle;

/// Rate normalizer.
///
/// [`NormalizeExt::normalize`](normalizer::NormalizeExt::normalize) spaces a
/// stream out to one value per window without dropping any.
pub mod normalizer;

/// Scope-bound consumers for streams, single values, optional values and
/// completion-only work.
pub mod scope;
