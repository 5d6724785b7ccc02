//! Remote cart service gateway.
//!
//! Translates logical cart operations into calls against the remote
//! cart service and normalizes its response shape into line items.
//! Every call is authenticated by a caller-supplied credential; the
//! mode resolver guarantees an anonymous session never reaches this
//! module.

mod conversions;

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tidepool_core::{AccessCredential, VariantId};
use tracing::instrument;

use crate::config::CartConfig;
use crate::types::CartLineItem;

use conversions::{WireCart, convert_cart};

/// Fallback shown when the service rejects a request without a message.
const GENERIC_FAILURE: &str = "Something went wrong updating your cart";

/// Errors from the remote cart service.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport-level failure (connection, TLS, timeout).
    #[error("cart service unreachable: {0}")]
    Http(#[from] reqwest::Error),

    /// The service rejected the request; carries the server-supplied
    /// message, or a generic one when the body had none.
    #[error("{0}")]
    Api(String),

    /// The service answered with a body the cart cannot decode.
    #[error("cart service response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Parameters of a mutation as echoed back by the service.
///
/// The store applies these confirmed values, never its own optimistic
/// guess.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub variant_id: VariantId,
    pub quantity: u32,
}

/// Async contract for the remote cart service.
pub trait RemoteCart {
    /// Fetch the full current remote line-item list.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the request fails or the response
    /// cannot be decoded.
    fn fetch(
        &self,
        credential: &AccessCredential,
    ) -> impl Future<Output = Result<Vec<CartLineItem>, GatewayError>>;

    /// Add `quantity` of a variant to the remote cart.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the service rejects the mutation.
    fn add(
        &self,
        credential: &AccessCredential,
        variant_id: &VariantId,
        quantity: u32,
    ) -> impl Future<Output = Result<Ack, GatewayError>>;

    /// Set a variant's quantity in the remote cart.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the service rejects the mutation.
    fn update(
        &self,
        credential: &AccessCredential,
        variant_id: &VariantId,
        quantity: u32,
    ) -> impl Future<Output = Result<Ack, GatewayError>>;

    /// Remove a variant from the remote cart.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the service rejects the mutation.
    fn remove(
        &self,
        credential: &AccessCredential,
        variant_id: &VariantId,
    ) -> impl Future<Output = Result<(), GatewayError>>;

    /// Empty the remote cart.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the service rejects the mutation.
    fn clear(
        &self,
        credential: &AccessCredential,
    ) -> impl Future<Output = Result<(), GatewayError>>;
}

// =============================================================================
// CartClient
// =============================================================================

/// HTTP client for the remote cart service.
#[derive(Clone)]
pub struct CartClient {
    inner: Arc<CartClientInner>,
}

struct CartClientInner {
    client: reqwest::Client,
    /// `{base}/cart`, no trailing slash.
    endpoint: String,
}

/// Error body shape used by the cart service.
#[derive(Debug, Deserialize)]
struct WireError {
    message: Option<String>,
}

impl CartClient {
    /// Create a new client for the configured cart service.
    #[must_use]
    pub fn new(config: &CartConfig) -> Self {
        let endpoint = format!("{}/cart", config.api_url.as_str().trim_end_matches('/'));
        Self {
            inner: Arc::new(CartClientInner {
                client: reqwest::Client::new(),
                endpoint,
            }),
        }
    }

    fn item_url(&self, variant_id: &VariantId) -> String {
        format!(
            "{}/items/{}",
            self.inner.endpoint,
            urlencoding::encode(variant_id.as_str())
        )
    }

    /// Send a request and surface non-success responses as [`GatewayError::Api`]
    /// carrying the server's message (or the generic fallback).
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        credential: &AccessCredential,
    ) -> Result<String, GatewayError> {
        let response = request.bearer_auth(credential.expose()).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        let message = serde_json::from_str::<WireError>(&body)
            .ok()
            .and_then(|err| err.message)
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| GENERIC_FAILURE.to_string());
        tracing::debug!(%status, %message, "cart service rejected request");
        Err(GatewayError::Api(message))
    }
}

impl RemoteCart for CartClient {
    #[instrument(skip(self, credential))]
    async fn fetch(&self, credential: &AccessCredential) -> Result<Vec<CartLineItem>, GatewayError> {
        let request = self.inner.client.get(&self.inner.endpoint);
        let body = self.send(request, credential).await?;
        let cart: WireCart = serde_json::from_str(&body)?;
        Ok(convert_cart(cart))
    }

    #[instrument(skip(self, credential), fields(variant = %variant_id))]
    async fn add(
        &self,
        credential: &AccessCredential,
        variant_id: &VariantId,
        quantity: u32,
    ) -> Result<Ack, GatewayError> {
        let request = self
            .inner
            .client
            .post(format!("{}/items", self.inner.endpoint))
            .json(&json!({ "variantId": variant_id, "quantity": quantity }));
        let body = self.send(request, credential).await?;
        Ok(serde_json::from_str(&body)?)
    }

    #[instrument(skip(self, credential), fields(variant = %variant_id))]
    async fn update(
        &self,
        credential: &AccessCredential,
        variant_id: &VariantId,
        quantity: u32,
    ) -> Result<Ack, GatewayError> {
        let request = self
            .inner
            .client
            .put(self.item_url(variant_id))
            .json(&json!({ "quantity": quantity }));
        let body = self.send(request, credential).await?;
        Ok(serde_json::from_str(&body)?)
    }

    #[instrument(skip(self, credential), fields(variant = %variant_id))]
    async fn remove(
        &self,
        credential: &AccessCredential,
        variant_id: &VariantId,
    ) -> Result<(), GatewayError> {
        let request = self.inner.client.delete(self.item_url(variant_id));
        self.send(request, credential).await?;
        Ok(())
    }

    #[instrument(skip(self, credential))]
    async fn clear(&self, credential: &AccessCredential) -> Result<(), GatewayError> {
        let request = self.inner.client.delete(&self.inner.endpoint);
        self.send(request, credential).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_displays_server_message() {
        let err = GatewayError::Api("Variant is out of stock".to_string());
        assert_eq!(err.to_string(), "Variant is out of stock");
    }

    #[test]
    fn test_item_url_percent_encodes_variant_ids() {
        let config = CartConfig {
            api_url: "https://api.tidepoolsupply.com/v1/".parse().unwrap(),
            storage_dir: "./data".into(),
            debounce: std::time::Duration::from_millis(300),
        };
        let client = CartClient::new(&config);
        assert_eq!(
            client.item_url(&VariantId::new("gid://tidepool/Variant/7")),
            "https://api.tidepoolsupply.com/v1/cart/items/gid%3A%2F%2Ftidepool%2FVariant%2F7"
        );
    }

    #[test]
    fn test_error_body_without_message_falls_back_to_generic() {
        let parsed = serde_json::from_str::<WireError>("{}")
            .ok()
            .and_then(|err| err.message)
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| GENERIC_FAILURE.to_string());
        assert_eq!(parsed, GENERIC_FAILURE);
    }
}
