//! Shapes shared by the unit tests.

use crate::table::Table;
use crate::{Document, Shape};
use std::collections::HashSet;

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

pub fn orders() -> Table<Order> {
    Table::compile().unwrap()
}

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
