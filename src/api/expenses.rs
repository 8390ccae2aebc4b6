//! Business expenses

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Listing, MessageResponse};
use crate::client::ApiClient;
use crate::error::Result;

const EXPENSES_PATH: &str = "/expenses/";

/// Expense category as accepted by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpenseCategory {
    /// Rent
    Rent,
    /// Utilities
    Utilities,
    /// Salary
    Salary,
    /// Stock purchases
    Inventory,
    /// Transport
    Transport,
    /// Food
    Food,
    /// Office supplies
    #[serde(rename = "Office Supplies")]
    OfficeSupplies,
    /// Phone
    Phone,
    /// Marketing
    Marketing,
    /// Anything else
    Other,
}

impl ExpenseCategory {
    /// Every category, in display order
    pub const ALL: [Self; 10] = [
        Self::Rent,
        Self::Utilities,
        Self::Salary,
        Self::Inventory,
        Self::Transport,
        Self::Food,
        Self::OfficeSupplies,
        Self::Phone,
        Self::Marketing,
        Self::Other,
    ];
}

/// An expense record
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Expense {
    /// Expense ID
    pub id: i64,
    /// Owning user ID
    #[serde(default)]
    pub user: Option<i64>,
    /// Category
    pub category: ExpenseCategory,
    /// Amount as a decimal string
    pub amount: String,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
    /// Day the expense was incurred
    pub date: NaiveDate,
    /// Whether the expense was essential
    #[serde(default)]
    pub is_necessary: bool,
}

/// Body for creating an expense
#[derive(Debug, Clone, Serialize)]
pub struct ExpenseInput {
    /// Category
    pub category: ExpenseCategory,
    /// Amount
    pub amount: f64,
    /// Free-form description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Day the expense was incurred (`YYYY-MM-DD`)
    pub date: NaiveDate,
    /// Whether the expense was essential
    pub is_necessary: bool,
}

/// Response to create and update
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExpenseResponse {
    /// Server message
    #[serde(default)]
    pub message: String,
    /// The stored record
    pub expense: Expense,
}

/// Expense service
#[derive(Debug, Clone, Copy)]
pub struct Expenses<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    /// Expense service bound to this client
    #[must_use]
    pub fn expenses(&self) -> Expenses<'_> {
        Expenses { client: self }
    }
}

impl Expenses<'_> {
    /// All expenses of the current user
    ///
    /// # Errors
    ///
    /// Propagates request and decoding errors.
    pub async fn list(&self) -> Result<Vec<Expense>> {
        let listing: Listing<Expense> = self.client.get(EXPENSES_PATH).await?;
        Ok(listing.into_items())
    }

    /// Record a new expense
    ///
    /// # Errors
    ///
    /// Propagates request and decoding errors.
    pub async fn create(&self, input: &ExpenseInput) -> Result<ExpenseResponse> {
        self.client.post(EXPENSES_PATH, input).await
    }

    /// Apply a partial update, e.g. `json!({"amount": 1500})`
    ///
    /// # Errors
    ///
    /// Propagates request and decoding errors.
    pub async fn update<B>(&self, id: i64, patch: &B) -> Result<ExpenseResponse>
    where
        B: Serialize + ?Sized,
    {
        self.client.put(&item_path(id), patch).await
    }

    /// Delete an expense
    ///
    /// # Errors
    ///
    /// Propagates request errors.
    pub async fn delete(&self, id: i64) -> Result<Option<MessageResponse>> {
        self.client.delete(&item_path(id)).await
    }
}

fn item_path(id: i64) -> String {
    format!("{EXPENSES_PATH}?id={id}")
}
