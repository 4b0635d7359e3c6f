//! Shopping cart module.
//!
//! Contains the cart and its line items, and the service that mutates carts
//! against the inventory.

mod cart;
mod store;

pub use cart::{Cart, CartItem};
pub use store::CartStore;
