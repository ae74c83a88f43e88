//! Scanlift Provider - obtaining a reachable scan engine
//!
//! Three backends implement the same five-step lifecycle
//! (provision, upload plan, monitor, download results, teardown):
//!
//! | Provider | Engine | Teardown |
//! |----------|--------|----------|
//! | [`LocalProvider`] | Named container on this machine, started on demand | Removes the container when `local.cleanup` is set |
//! | [`RemoteProvider`] | Already running engine at a known endpoint | Nothing |
//! | [`CloudProvider`] | Fresh instance provisioned with the infrastructure tool | Destroys the infrastructure and the session's key material |
//!
//! # Selection
//!
//! An explicit mode always wins. In `auto` mode the [`ProviderSelector`] asks the
//! [`CapabilityProbe`] in a fixed order: remote endpoint configured, then local container
//! runtime available, otherwise cloud.
//!
//! ```rust,ignore
//! use scanlift_provider::{DefaultProviderFactory, ProviderFactory, ProviderSelector, SystemProbe};
//!
//! let selector = ProviderSelector::new(Arc::new(SystemProbe::default()));
//! let kind = selector.select(&config).await;
//! let mut provider = DefaultProviderFactory::new().create(kind, &config, session_id)?;
//! let instance = provider.provision().await?;
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::factory::{DefaultProviderFactory, ProviderFactory};
pub use application::selector::ProviderSelector;
pub use domain::lifecycle::ProvisioningState;
pub use domain::probe::CapabilityProbe;
pub use domain::traits::ScanProvider;
pub use infrastructure::cloud::CloudProvider;
pub use infrastructure::local::LocalProvider;
pub use infrastructure::probe::SystemProbe;
pub use infrastructure::remote::RemoteProvider;
