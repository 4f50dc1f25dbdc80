use serde::{Deserialize, Serialize};

use crate::utils::format_lodge_display;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrandLodge {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub abbreviation: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl GrandLodge {
    pub fn short_name(&self) -> &str {
        self.abbreviation
            .as_deref()
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lodge {
    pub id: String,
    pub grand_lodge_id: String,
    pub name: String,
    #[serde(default)]
    pub number: Option<i32>,
    #[serde(default)]
    pub district: Option<String>,
}

impl Lodge {
    pub fn display_name(&self) -> String {
        format_lodge_display(&self.name, self.number)
    }
}

/// A purchasable ticket package for the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketPackage {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    #[serde(default)]
    pub description: Option<String>,
}

impl TicketPackage {
    pub fn total_for(&self, ticket_count: u32) -> i64 {
        self.price_cents * i64::from(ticket_count)
    }
}
