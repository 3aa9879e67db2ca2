use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identity key of an output: `<transaction id>:<output index>`.
pub type UtxoKey = String;

/// An unspent transaction output sitting at one of the watched addresses.
///
/// Two records with the same [`UtxoRecord::key`] denote the same output regardless
/// of the remaining fields.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoRecord {
    pub transaction_id: String,
    pub output_index: u32,
    pub address: String,
    /// Value in the smallest unit of the asset (e.g. satoshi)
    pub amount: u64,
}

impl UtxoRecord {
    pub fn new(transaction_id: impl Into<String>, output_index: u32, address: impl Into<String>, amount: u64) -> Self {
        Self { transaction_id: transaction_id.into(), output_index, address: address.into(), amount }
    }

    pub fn key(&self) -> UtxoKey {
        format!("{}:{}", self.transaction_id, self.output_index)
    }
}

impl Display for UtxoRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} ({} at {})", self.transaction_id, self.output_index, self.amount, self.address)
    }
}

/// One address reported by the address source. Only `address` is consumed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub address: String,
    pub label: Option<String>,
}

impl AddressEntry {
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into(), label: None }
    }
}
