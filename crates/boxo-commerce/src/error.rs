//! Commerce error types.

use thiserror::Error;

use crate::checkout::CheckoutStep;

/// Broad classification of a [`CommerceError`].
///
/// Callers (controllers, the CLI) map these onto their own surface, e.g. an
/// HTTP status or an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request was well-formed but cannot be honoured in the current state
    /// of the cart, inventory, address book or payment records.
    Validation,
    /// A referenced entity does not exist.
    NotFound,
    /// An illegal state transition or an unrecognized stored value.
    State,
    /// A downstream collaborator (notification channel) failed.
    External,
    /// The backing store failed.
    Storage,
}

/// Errors that can occur in cart, checkout and fulfillment operations.
#[derive(Error, Debug)]
pub enum CommerceError {
    /// Generic validation failure with a user-facing message.
    #[error("{0}")]
    Validation(String),

    /// Requested quantity is larger than the stock on hand.
    #[error("Not enough quantity for {book_id}: requested {requested}, available {available}")]
    InsufficientInventory {
        book_id: String,
        requested: i64,
        available: i64,
    },

    /// Quantity must be at least one.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Entity lookup failed.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Illegal status transition.
    #[error("Invalid {entity} transition from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Discount record carries a type this build does not know.
    #[error("Unexpected discount type: {0}")]
    UnexpectedDiscountType(String),

    /// A freshly generated tracking number was already taken.
    #[error("Tracking number already in use: {0}")]
    DuplicateTrackingNumber(String),

    /// A checkout failed after it started mutating state. The partial order is
    /// left for reconciliation.
    #[error("Checkout of order {order_id} interrupted at {step}: {source}")]
    CheckoutInterrupted {
        order_id: String,
        step: CheckoutStep,
        #[source]
        source: Box<CommerceError>,
    },

    /// Notification delivery failed.
    #[error("Notification delivery failed: {0}")]
    External(String),

    /// Arithmetic overflow.
    #[error("Arithmetic overflow in money calculation")]
    Overflow,

    /// Storage backend error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CommerceError {
    /// Shorthand for a [`CommerceError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CommerceError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for a [`CommerceError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        CommerceError::Validation(message.into())
    }

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommerceError::Validation(_)
            | CommerceError::InsufficientInventory { .. }
            | CommerceError::InvalidQuantity(_)
            | CommerceError::Overflow => ErrorKind::Validation,
            CommerceError::NotFound { .. } => ErrorKind::NotFound,
            CommerceError::InvalidTransition { .. }
            | CommerceError::UnexpectedDiscountType(_)
            | CommerceError::DuplicateTrackingNumber(_) => ErrorKind::State,
            CommerceError::CheckoutInterrupted { source, .. } => source.kind(),
            CommerceError::External(_) => ErrorKind::External,
            CommerceError::Storage(_) | CommerceError::Serialization(_) => ErrorKind::Storage,
        }
    }
}

impl From<serde_json::Error> for CommerceError {
    fn from(e: serde_json::Error) -> Self {
        CommerceError::Serialization(e.to_string())
    }
}
