//! Address types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CommerceError;
use crate::ids::UserId;

/// A user's default delivery address, as the address book exposes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DefaultAddress {
    /// Recipient name.
    pub name: String,
    /// Recipient phone.
    pub phone: String,
    /// Street and house number.
    pub description: String,
    /// City name.
    pub city_name: String,
    /// Province name.
    pub province_name: String,
    /// Precomputed distance from the warehouse, in kilometres.
    pub distance_km: Option<f64>,
}

impl DefaultAddress {
    /// Flatten into the snapshot stored on a shipping record.
    pub fn snapshot(&self) -> AddressSnapshot {
        AddressSnapshot {
            name: self.name.clone(),
            phone: self.phone.clone(),
            description: self.description.clone(),
            city: self.city_name.clone(),
            province: self.province_name.clone(),
        }
    }
}

/// Delivery address copied onto a shipping record. Later edits to the
/// address book do not affect it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressSnapshot {
    pub name: String,
    pub phone: String,
    pub description: String,
    pub city: String,
    pub province: String,
}

impl AddressSnapshot {
    /// Format as single line.
    pub fn one_line(&self) -> String {
        [
            self.description.as_str(),
            self.city.as_str(),
            self.province.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// The address book.
#[async_trait]
pub trait AddressProvider: Send + Sync {
    /// The user's default address, if one is set.
    async fn default_address(&self, user_id: &UserId)
        -> Result<Option<DefaultAddress>, CommerceError>;
}
