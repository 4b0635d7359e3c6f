//! CLI configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use boxo_commerce::prelude::*;
use boxo_observability::LogConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File names searched for, in order, in each directory up to the root.
pub const CONFIG_NAMES: [&str; 3] = ["boxo.toml", ".boxo.toml", "boxo.json"];

/// CLI configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LogConfig,

    /// Checkout tunables.
    #[serde(default)]
    pub checkout: CheckoutSettings,

    /// Where state lives between invocations.
    #[serde(default)]
    pub store: StoreConfig,

    /// Data loaded into a fresh store.
    #[serde(default)]
    pub seed: SeedConfig,
}

impl CliConfig {
    /// Load config from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        if is_json(path) {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
        }
    }

    /// Save config to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            toml::to_string_pretty(self)?
        };

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Find the nearest config file at or above `start`.
    pub fn find(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            for name in &CONFIG_NAMES {
                let candidate = current.join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Problems that would make the config unusable, and ones that merely
    /// look suspicious.
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if let Err(e) = self.logging.config_filter() {
            errors.push(format!("logging.filter: {}", e));
        }

        let checkout = &self.checkout;
        if checkout.tracking_random_len == 0 {
            errors.push("checkout.tracking_random_len must be at least 1".to_string());
        } else if checkout.tracking_random_len < 6 {
            warnings.push(format!(
                "checkout.tracking_random_len = {} makes tracking number collisions likely",
                checkout.tracking_random_len
            ));
        }
        if checkout.tracking_attempts == 0 {
            errors.push("checkout.tracking_attempts must be at least 1".to_string());
        }
        let rates = &checkout.shipping;
        for (key, value) in [
            ("base", rates.base),
            ("rate_per_km", rates.rate_per_km),
            ("flat", rates.flat),
            ("scale", rates.scale),
        ] {
            if !value.is_finite() || value < 0.0 {
                errors.push(format!("checkout.shipping.{} must be a non-negative number", key));
            }
        }

        if self.store.state_file.as_os_str().is_empty() {
            errors.push("store.state_file is required".to_string());
        }

        for (i, book) in self.seed.books.iter().enumerate() {
            if book.id.trim().is_empty() {
                errors.push(format!("seed.books[{}].id is required", i));
            }
            if book.price < 0 || book.stock < 0 {
                errors.push(format!("seed.books[{}] has a negative price or stock", i));
            }
        }
        for (i, discount) in self.seed.discounts.iter().enumerate() {
            if let Err(e) = discount.to_discount() {
                errors.push(format!("seed.discounts[{}]: {}", i, e));
            }
            if discount.end_date < Utc::now() {
                warnings.push(format!(
                    "seed.discounts[{}] ({}) has already ended",
                    i, discount.code
                ));
            }
        }

        (errors, warnings)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "json")
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON snapshot of the store, relative to the config file.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// How long to wait for another boxo process to release the state.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_state_file() -> PathBuf {
    PathBuf::from(".boxo/state.json")
}

fn default_lock_timeout_ms() -> u64 {
    10_000
}

impl StoreConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Seed data for a fresh store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub books: Vec<SeedBook>,
    #[serde(default)]
    pub discounts: Vec<SeedDiscount>,
    #[serde(default)]
    pub addresses: Vec<SeedAddress>,
}

impl SeedConfig {
    /// Load every seed into the store.
    pub fn apply(&self, store: &MemoryStore) -> Result<()> {
        for book in &self.books {
            store.put_book(book.to_listing());
        }
        for discount in &self.discounts {
            store.put_discount(
                discount
                    .to_discount()
                    .with_context(|| format!("Invalid seed discount {}", discount.code))?,
            );
        }
        for address in &self.addresses {
            store.put_address(UserId::new(address.user.clone()), address.to_address());
        }
        Ok(())
    }
}

/// A book, priced in whole dong.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedBook {
    pub id: String,
    pub name: String,
    pub price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discounted_price: Option<i64>,
    pub stock: i64,
    #[serde(default)]
    pub image_url: String,
}

impl SeedBook {
    pub fn to_listing(&self) -> BookListing {
        BookListing {
            id: BookId::new(self.id.clone()),
            name: self.name.clone(),
            price: Money::from_dong(self.price),
            discounted_price: self.discounted_price.map(Money::from_dong),
            available_quantity: self.stock,
            primary_image_url: self.image_url.clone(),
        }
    }
}

/// A discount code. `kind` is `PERCENTAGE` or `FIXED`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedDiscount {
    pub code: String,
    #[serde(default)]
    pub name: String,
    pub kind: String,
    pub value: f64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub min_required_value: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub public: bool,
}

fn default_quantity() -> i64 {
    1
}

impl SeedDiscount {
    pub fn to_discount(&self) -> Result<Discount, CommerceError> {
        let kind = DiscountKind::from_parts(&self.kind, self.value)?;
        let name = if self.name.is_empty() {
            self.code.clone()
        } else {
            self.name.clone()
        };
        let discount = Discount::new(&self.code, name, kind, self.start_date, self.end_date)
            .with_quantity(self.quantity)
            .with_minimum(Money::from_dong(self.min_required_value));
        Ok(if self.public {
            discount.public()
        } else {
            discount
        })
    }
}

/// A user's default delivery address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAddress {
    pub user: String,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub description: String,
    pub city: String,
    pub province: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl SeedAddress {
    pub fn to_address(&self) -> DefaultAddress {
        DefaultAddress {
            name: self.name.clone(),
            phone: self.phone.clone(),
            description: self.description.clone(),
            city_name: self.city.clone(),
            province_name: self.province.clone(),
            distance_km: self.distance_km,
        }
    }
}

/// Generate a starter boxo.toml.
pub fn generate_default_config() -> String {
    let now = Utc::now();
    let start = now.format("%Y-%m-%dT00:00:00Z");
    let end = (now + chrono::Duration::days(90)).format("%Y-%m-%dT23:59:59Z");

    format!(
        r#"# Boxo checkout configuration

[logging]
level = "info"
format = "human"
# filter = "boxo_commerce::checkout=debug"

[checkout]
tracking_random_len = 8
tracking_attempts = 5
locale = "vi"
reconcile_interval_secs = 60
saga_stale_after_secs = 300

[checkout.shipping]
base = 10.0
rate_per_km = 0.3
flat = 60.0
scale = 1000.0

[store]
state_file = ".boxo/state.json"
lock_timeout_ms = 10000

[[seed.books]]
id = "dac-nhan-tam"
name = "Đắc Nhân Tâm"
price = 50000
stock = 20

[[seed.books]]
id = "nha-gia-kim"
name = "Nhà Giả Kim"
price = 80000
discounted_price = 69000
stock = 10

[[seed.discounts]]
code = "SAVE10"
name = "10% off orders over 50,000"
kind = "PERCENTAGE"
value = 10.0
quantity = 100
min_required_value = 50000
start_date = "{start}"
end_date = "{end}"
public = true

[[seed.addresses]]
user = "demo"
name = "Nguyen Van A"
phone = "0901234567"
description = "12 Le Loi"
city = "Quan 1"
province = "Ho Chi Minh"
distance_km = 5.0
"#,
        start = start,
        end = end,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_config_parses_and_validates() {
        let config: CliConfig = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.seed.books.len(), 2);
        assert_eq!(config.seed.discounts[0].code, "SAVE10");
        assert_eq!(config.checkout.tracking_random_len, 8);
        assert_eq!(config.store.state_file, PathBuf::from(".boxo/state.json"));

        let (errors, warnings) = config.validate();
        assert!(errors.is_empty(), "{:?}", errors);
        assert!(warnings.is_empty(), "{:?}", warnings);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CliConfig::default();
        config.checkout.tracking_random_len = 10;
        config.seed.books.push(SeedBook {
            id: "b-1".into(),
            name: "Book".into(),
            price: 42_000,
            discounted_price: None,
            stock: 3,
            image_url: String::new(),
        });

        for name in ["boxo.toml", "boxo.json"] {
            let path = dir.path().join(name);
            config.save(&path).unwrap();
            let loaded = CliConfig::load(&path).unwrap();
            assert_eq!(loaded.checkout.tracking_random_len, 10);
            assert_eq!(loaded.seed.books[0].price, 42_000);
        }
    }

    #[test]
    fn test_find_searches_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(".boxo.toml"), "").unwrap();

        let found = CliConfig::find(&nested).unwrap();
        assert_eq!(found, dir.path().join(".boxo.toml"));
    }

    #[test]
    fn test_validate_reports_bad_values() {
        let mut config = CliConfig::default();
        config.checkout.tracking_attempts = 0;
        config.checkout.shipping.flat = -1.0;
        config.seed.discounts.push(SeedDiscount {
            code: "WEIRD".into(),
            name: String::new(),
            kind: "BOGO".into(),
            value: 1.0,
            quantity: 1,
            min_required_value: 0,
            start_date: Utc::now(),
            end_date: Utc::now() + chrono::Duration::days(1),
            public: false,
        });

        let (errors, _) = config.validate();
        assert_eq!(errors.len(), 3, "{:?}", errors);
        assert!(errors[2].contains("Unexpected discount type"));
    }

    #[test]
    fn test_seeds_populate_store() {
        let config: CliConfig = toml::from_str(&generate_default_config()).unwrap();
        let store = MemoryStore::new();
        config.seed.apply(&store).unwrap();

        assert_eq!(store.stock_of(&BookId::new("nha-gia-kim")), Some(10));
        let state = store.snapshot();
        assert_eq!(state.discounts.len(), 1);
        assert!(state.addresses.contains_key(&UserId::new("demo")));
    }
}
