//! Book catalog and inventory.
//!
//! The catalog itself (authors, genres, publishers) is managed elsewhere; this
//! module only models what checkout needs: price, primary image and stock.

mod inventory;

pub use inventory::{BookListing, InventoryCatalog, StockReservation};
