/// Moscow Exchange ISS provider
pub mod client;
pub mod pages;
pub mod resolver;

pub use client::MoexClient;
pub use pages::{MoexPage, PageFetcher, PAGE_SIZE};
pub use resolver::SecurityResolver;

use serde::Deserialize;
use serde_json::Value;

/// ISS table block: `{"columns": [...], "data": [[...], ...]}`
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct IssTable {
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub data: Option<Vec<Vec<Value>>>,
}

impl IssTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .as_ref()?
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }
}
