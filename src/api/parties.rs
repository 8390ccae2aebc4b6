//! Customers and suppliers

use serde::{Deserialize, Serialize};

use super::{Listing, MessageResponse};
use crate::client::ApiClient;
use crate::error::Result;

const PARTIES_PATH: &str = "/parties/";

/// Party kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyCategory {
    /// Buys from the business
    Customer,
    /// Sells to the business
    Supplier,
}

impl PartyCategory {
    /// Wire name, as used in the `category_type` query parameter
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "Customer",
            Self::Supplier => "Supplier",
        }
    }
}

/// Preferred payment method of a customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Cash
    Cash,
    /// Credit card
    #[serde(rename = "Credit Card")]
    CreditCard,
    /// Bank transfer
    #[serde(rename = "Bank Transfer")]
    BankTransfer,
    /// UPI
    #[serde(rename = "UPI")]
    Upi,
}

/// Body for creating a party. Customer fields are ignored for suppliers.
#[derive(Debug, Clone, Serialize)]
pub struct PartyInput {
    /// Customer or supplier
    #[serde(rename = "Category_type")]
    pub category: PartyCategory,
    /// Display name
    pub name: String,
    /// Whether the party is active
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    /// Contact email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Contact phone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_no: Option<String>,
    /// Customer code
    #[serde(rename = "Customer_code", skip_serializing_if = "Option::is_none")]
    pub customer_code: Option<String>,
    /// Postal address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Opening balance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_balance: Option<f64>,
    /// Credit limit (the backend spells it `credit_limmit`)
    #[serde(rename = "credit_limmit", skip_serializing_if = "Option::is_none")]
    pub credit_limit: Option<f64>,
    /// Preferred payment method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_payment_method: Option<PaymentMethod>,
    /// Free-form notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Supplier code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl PartyInput {
    /// Minimal input: category and name only
    pub fn new(category: PartyCategory, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
            is_active: None,
            email: None,
            phone_no: None,
            customer_code: None,
            address: None,
            open_balance: None,
            credit_limit: None,
            preferred_payment_method: None,
            notes: None,
            code: None,
        }
    }
}

/// Party record without the customer/supplier details
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PartySummary {
    /// Party ID
    pub id: i64,
    /// `"Customer"` or `"Supplier"`
    #[serde(rename = "Category_type")]
    pub category: String,
    /// Whether the party is active
    #[serde(default)]
    pub is_active: bool,
    /// Last update timestamp
    #[serde(default)]
    pub is_updated_at: Option<String>,
}

/// Customer details
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Customer {
    /// Customer ID
    pub id: i64,
    /// Owning party ID
    pub party: i64,
    /// Display name
    pub name: String,
    /// Contact email
    #[serde(default)]
    pub email: Option<String>,
    /// Contact phone
    #[serde(default)]
    pub phone_no: Option<String>,
    /// Customer code
    #[serde(default, rename = "Customer_code")]
    pub customer_code: Option<String>,
    /// Postal address
    #[serde(default)]
    pub address: Option<String>,
    /// Opening balance as a decimal string
    #[serde(default)]
    pub open_balance: Option<String>,
    /// Credit limit as a decimal string
    #[serde(default, rename = "credit_limmit")]
    pub credit_limit: Option<String>,
    /// Loyalty points
    #[serde(default)]
    pub loyalty_points: i64,
    /// Free-form notes
    #[serde(default)]
    pub notes: Option<String>,
}

/// Supplier details
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Supplier {
    /// Supplier ID
    pub id: i64,
    /// Owning party ID
    pub party: i64,
    /// Display name
    pub name: String,
    /// Supplier code
    #[serde(default)]
    pub code: Option<String>,
}

/// Response to create/get/update
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PartyResponse {
    /// Server message
    #[serde(default)]
    pub message: String,
    /// Party record
    pub party: PartySummary,
    /// Present for customers
    #[serde(default)]
    pub customer: Option<Customer>,
    /// Present for suppliers
    #[serde(default)]
    pub supplier: Option<Supplier>,
}

/// Party service
#[derive(Debug, Clone, Copy)]
pub struct Parties<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    /// Party service bound to this client
    #[must_use]
    pub fn parties(&self) -> Parties<'_> {
        Parties { client: self }
    }
}

impl Parties<'_> {
    /// List parties, optionally restricted to one category
    ///
    /// # Errors
    ///
    /// Propagates request and decoding errors.
    pub async fn list(&self, category: Option<PartyCategory>) -> Result<Vec<PartySummary>> {
        let path = match category {
            Some(c) => format!("{PARTIES_PATH}?category_type={}", c.as_str()),
            None => PARTIES_PATH.to_string(),
        };
        let listing: Listing<PartySummary> = self.client.get(&path).await?;
        Ok(listing.into_items())
    }

    /// A single party with its details
    ///
    /// # Errors
    ///
    /// Propagates request and decoding errors.
    pub async fn get(&self, id: i64) -> Result<PartyResponse> {
        self.client.get(&item_path(id)).await
    }

    /// Create a customer or supplier
    ///
    /// # Errors
    ///
    /// Propagates request and decoding errors.
    pub async fn create(&self, input: &PartyInput) -> Result<PartyResponse> {
        self.client.post(PARTIES_PATH, input).await
    }

    /// Apply a partial update, e.g. `json!({"phone_no": "9800000000"})`
    ///
    /// # Errors
    ///
    /// Propagates request and decoding errors.
    pub async fn update<B>(&self, id: i64, patch: &B) -> Result<PartyResponse>
    where
        B: Serialize + ?Sized,
    {
        self.client.put(&item_path(id), patch).await
    }

    /// Delete a party
    ///
    /// # Errors
    ///
    /// Propagates request errors.
    pub async fn delete(&self, id: i64) -> Result<Option<MessageResponse>> {
        self.client.delete(&item_path(id)).await
    }
}

fn item_path(id: i64) -> String {
    format!("{PARTIES_PATH}?id={id}")
}
