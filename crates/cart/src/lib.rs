//! Tidepool shopping-cart subsystem.
//!
//! The one part of the storefront with real state-machine and consistency
//! concerns: the cart tracks shopper intent across two trust domains.
//! Anonymous sessions are owned by durable local storage; authenticated
//! sessions are owned by the remote cart service. The [`store::CartStore`]
//! hides which authority is active behind four logical mutations, mirrors
//! every change into a debounced local replica, and replaces its state
//! wholesale when an authentication transition pulls the remote cart.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tidepool_cart::persist::LocalCartStore;
//! use tidepool_cart::remote::CartClient;
//! use tidepool_cart::route::AuthState;
//! use tidepool_cart::storage::FileStore;
//! use tidepool_cart::store::CartStore;
//!
//! let config = tidepool_cart::config::CartConfig::from_env()?;
//! let storage = Arc::new(FileStore::new(&config.storage_dir)?);
//! let local = LocalCartStore::with_debounce(storage, config.debounce);
//! let mut cart = CartStore::new(CartClient::new(&config), local);
//!
//! cart.hydrate();
//! cart.start_session(&AuthState::Anonymous).await;
//! cart.add_item(&AuthState::Anonymous, variant_id, 1, snapshot).await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![cfg_attr(test, allow(unsafe_code))]

pub mod config;
pub mod persist;
pub mod remote;
pub mod route;
pub mod storage;
pub mod store;
pub mod sync;
pub mod types;
pub mod view;

pub use route::{AuthState, Route, route};
pub use store::CartStore;
pub use types::{CartLineItem, CartState, ProductInfo, ProductSnapshot, Totals};
