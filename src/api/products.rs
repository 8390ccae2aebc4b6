//! Inventory products

use serde::{Deserialize, Serialize};

use super::{Listing, MessageResponse};
use crate::client::ApiClient;
use crate::error::Result;

const PRODUCTS_PATH: &str = "/products/";

/// A product as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Product ID
    pub id: i64,
    /// Display name
    pub product_name: String,
    /// Units in stock
    #[serde(default)]
    pub quantity: i64,
    /// Unit price as a decimal string (e.g. `"120.00"`)
    #[serde(default)]
    pub unit_price: String,
    /// Image URL
    #[serde(default, rename = "product_Img")]
    pub image: Option<String>,
    /// Stock keeping unit
    #[serde(default)]
    pub sku: Option<String>,
    /// Category ID
    #[serde(default)]
    pub category: Option<i64>,
}

impl Product {
    /// Unit price parsed as a number, if well-formed
    #[must_use]
    pub fn unit_price_value(&self) -> Option<f64> {
        self.unit_price.trim().parse().ok()
    }

    /// SKU, or the `SKU-{id}` placeholder when none is set
    #[must_use]
    pub fn display_sku(&self) -> String {
        self.sku
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("SKU-{}", self.id))
    }
}

/// Product service
#[derive(Debug, Clone, Copy)]
pub struct Products<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    /// Product service bound to this client
    #[must_use]
    pub fn products(&self) -> Products<'_> {
        Products { client: self }
    }
}

impl Products<'_> {
    /// All products visible to the current user
    ///
    /// # Errors
    ///
    /// Propagates request and decoding errors.
    pub async fn list(&self) -> Result<Vec<Product>> {
        let listing: Listing<Product> = self.client.get(PRODUCTS_PATH).await?;
        Ok(listing.into_items())
    }

    /// A single product
    ///
    /// # Errors
    ///
    /// Propagates request and decoding errors.
    pub async fn get(&self, id: i64) -> Result<Product> {
        self.client.get(&item_path(id)).await
    }

    /// Set the stock level of a product
    ///
    /// # Errors
    ///
    /// Propagates request and decoding errors.
    pub async fn update_quantity(&self, id: i64, quantity: i64) -> Result<serde_json::Value> {
        self.client
            .put(&item_path(id), &serde_json::json!({ "quantity": quantity }))
            .await
    }

    /// Delete a product
    ///
    /// # Errors
    ///
    /// Propagates request errors.
    pub async fn delete(&self, id: i64) -> Result<Option<MessageResponse>> {
        self.client.delete(&item_path(id)).await
    }
}

fn item_path(id: i64) -> String {
    format!("{PRODUCTS_PATH}?id={id}")
}
