//! Upstream side of solarsync: the Solar Manager cloud API.
//!
//! This crate talks to the metering API and turns its responses into the
//! shared [`solarsync_types`] model.
//!
//! # Features
//!
//! - **API boundary**: the [`MeteringApi`] trait, implemented over HTTP by
//!   [`HttpClient`] and in-process by [`MockApi`]
//! - **Device catalog**: [`DeviceCatalog`] resolves configured sites to their
//!   active sub-meters and display names
//! - **Chunked fetching**: [`ChunkedFetcher`] walks long time ranges in
//!   day-sized requests and yields a strictly ascending stream of readings
//!
//! # Quick Start
//!
//! ```no_run
//! use futures::TryStreamExt;
//! use solarsync_core::{ApiConfig, ChunkedFetcher, DeviceCatalog, HttpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ApiConfig {
//!     email: "user@example.com".to_string(),
//!     password: "secret".to_string(),
//!     site_ids: vec!["0123456789ABCDEF".to_string()],
//!     ..Default::default()
//! };
//! let client = HttpClient::new(&config)?;
//!
//! let (token, devices) = DeviceCatalog::new(&client, &config).sub_meters().await?;
//! let fetcher = ChunkedFetcher::new(&client, &token);
//! for device in &devices {
//!     let readings: Vec<_> = fetcher
//!         .fetch(&device.device_id, &device.site_id, 1_704_067_200, 1_704_153_600, 300)
//!         .try_collect()
//!         .await?;
//!     println!("{}: {} readings", device.display_name, readings.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod mock;

pub use api::{AccessToken, MeteringApi, RawSample};
pub use catalog::DeviceCatalog;
pub use client::HttpClient;
pub use config::{ApiConfig, ValidationError};
pub use error::{Error, Result};
pub use fetch::{ChunkedFetcher, SubWindows};
pub use mock::{MockApi, RangeCall};

pub use solarsync_types as types;
