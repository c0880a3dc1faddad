/// Shapes shared by the integration tests and benches
use dynaq_core::{Document, Shape, Table};
use std::collections::HashSet;

/// Orders keyed by id and creation date, with a customer index and a
/// local index on the order total.
#[derive(Debug, Clone, PartialEq, Shape)]
#[dynaq(table = "orders", rename_all = "camelCase")]
pub struct Order {
    #[dynaq(partition_key)]
    pub order_id: String,
    #[dynaq(sort_key, gsi_sort = "byCustomer")]
    pub created_at: String,
    #[dynaq(gsi_partition = "byCustomer")]
    pub customer_id: String,
    #[dynaq(lsi = "byTotal")]
    pub total: i64,
    pub tags: HashSet<String>,
    #[dynaq(nullable)]
    pub coupon: Option<String>,
    pub note: Option<String>,
    pub history: Vec<String>,
    pub shipping: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Document)]
pub struct Address {
    pub street: String,
    pub city: String,
}

/// Customers keyed by id alone
#[derive(Debug, Clone, PartialEq, Shape)]
#[dynaq(table = "customers")]
pub struct Customer {
    #[dynaq(partition_key)]
    pub id: String,
    pub name: String,
    #[dynaq(rename = "mail")]
    pub email: Option<String>,
    pub visits: u32,
    #[dynaq(skip)]
    pub session: Option<String>,
}

/// Projection of an order onto its total
#[derive(Debug, Clone, PartialEq, Document)]
#[dynaq(rename_all = "camelCase")]
pub struct OrderTotal {
    pub order_id: String,
    pub total: i64,
}

pub fn orders() -> Table<Order> {
    Table::compile().expect("Order shape compiles")
}

pub fn customers() -> Table<Customer> {
    Table::compile().expect("Customer shape compiles")
}

/// An order for customer `C1` with empty collections
pub fn order(id: &str, created: &str, total: i64) -> Order {
    Order {
        order_id: id.to_string(),
        created_at: created.to_string(),
        customer_id: "C1".to_string(),
        total,
        tags: HashSet::new(),
        coupon: None,
        note: None,
        history: Vec::new(),
        shipping: None,
    }
}

pub fn customer(id: &str, name: &str) -> Customer {
    Customer {
        id: id.to_string(),
        name: name.to_string(),
        email: None,
        visits: 0,
        session: None,
    }
}
