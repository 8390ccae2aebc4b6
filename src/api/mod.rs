//! Typed services for the Pasale REST resources
//!
//! Each service borrows an [`ApiClient`](crate::ApiClient) and so inherits
//! its bearer-token handling and refresh behavior.
//!
//! ```no_run
//! use pasale_client::{ApiClient, ClientConfig};
//!
//! # async fn example() -> pasale_client::Result<()> {
//! let client = ApiClient::new(ClientConfig::default())?;
//! for product in client.products().list().await? {
//!     println!("{} x{}", product.product_name, product.quantity);
//! }
//! # Ok(())
//! # }
//! ```

mod expenses;
mod parties;
mod products;

pub use expenses::{Expense, ExpenseCategory, ExpenseInput, ExpenseResponse, Expenses};
pub use parties::{
    Customer, Parties, PartyCategory, PartyInput, PartyResponse, PartySummary, PaymentMethod,
    Supplier,
};
pub use products::{Product, Products};

use serde::{Deserialize, Serialize};

/// Paginated list envelope used by list endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Total number of records across pages
    pub count: u64,
    /// URL of the next page
    #[serde(default)]
    pub next: Option<String>,
    /// URL of the previous page
    #[serde(default)]
    pub previous: Option<String>,
    /// Records on this page
    pub results: Vec<T>,
}

/// A list endpoint answer, in any of the shapes the backend uses
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    /// `{ count, next, previous, results }`
    Page(Page<T>),
    /// `{ data }`
    Wrapped {
        /// Records
        data: Vec<T>,
    },
    /// `[ ... ]`
    Items(Vec<T>),
}

impl<T> Listing<T> {
    /// The records, whichever shape the server used
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Page(page) => page.results,
            Self::Wrapped { data } => data,
            Self::Items(items) => items,
        }
    }
}

/// `{ "message": ... }` acknowledgement returned by deletes
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessageResponse {
    /// Server message
    #[serde(default)]
    pub message: String,
}
