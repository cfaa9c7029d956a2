//! Checkout Metadata Codec
//!
//! Flattens cart, customer and project into the string map attached to a
//! payment session, and reads them back when the webhook arrives.
//!
//! Stripe caps every metadata value at 500 characters. Notes are cut to 450
//! and the serialized cart to 490 by plain character count, so a long cart
//! can come back as invalid JSON. `decode_cart` reports that as
//! [`PaymentError::Parse`] and callers must treat it as recoverable.

use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

use crate::cart::{Cart, CartItem, Customer, DeliveryAddress, Project};
use crate::error::{PaymentError, Result};

/// Gateway ceiling for any single value
pub const MAX_VALUE_CHARS: usize = 500;

/// Ceiling for `project_notes`
pub const MAX_NOTES_CHARS: usize = 450;

/// Ceiling for `cart_items`
pub const MAX_CART_CHARS: usize = 490;

/// Metadata keys attached to every session
pub mod keys {
    pub const CUSTOMER_FIRST_NAME: &str = "customer_first_name";
    pub const CUSTOMER_LAST_NAME: &str = "customer_last_name";
    pub const CUSTOMER_EMAIL: &str = "customer_email";
    pub const CUSTOMER_PHONE: &str = "customer_phone";
    pub const CUSTOMER_COMPANY: &str = "customer_company";
    pub const PROJECT_NAME: &str = "project_name";
    pub const DELIVERY_STREET: &str = "delivery_street";
    pub const DELIVERY_CITY: &str = "delivery_city";
    pub const DELIVERY_STATE: &str = "delivery_state";
    pub const DELIVERY_ZIP: &str = "delivery_zip";
    pub const DELIVERY_DATE: &str = "delivery_date";
    pub const PROJECT_NOTES: &str = "project_notes";
    pub const CART_ITEMS: &str = "cart_items";

    pub const ALL: [&str; 13] = [
        CUSTOMER_FIRST_NAME,
        CUSTOMER_LAST_NAME,
        CUSTOMER_EMAIL,
        CUSTOMER_PHONE,
        CUSTOMER_COMPANY,
        PROJECT_NAME,
        DELIVERY_STREET,
        DELIVERY_CITY,
        DELIVERY_STATE,
        DELIVERY_ZIP,
        DELIVERY_DATE,
        PROJECT_NOTES,
        CART_ITEMS,
    ];
}

/// Flat string map carried by the payment session
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckoutMetadata(HashMap<String, String>);

impl CheckoutMetadata {
    /// Value for `key`, or "" when absent
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map_or("", String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn into_inner(self) -> HashMap<String, String> {
        self.0
    }
}

impl From<HashMap<String, String>> for CheckoutMetadata {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

/// Compact cart line as stored in `cart_items`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredLine {
    item_code: String,
    name: String,
    quantity: u32,
    #[serde(serialize_with = "price_as_number")]
    price: Decimal,
}

/// JSON number as the storefront writes it: `1250`, `19.99`
fn price_as_number<S: Serializer>(
    price: &Decimal,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let price = price.normalize();
    match (price.scale(), price.to_i64(), price.to_f64()) {
        (0, Some(whole), _) => serializer.serialize_i64(whole),
        (_, _, Some(float)) => serializer.serialize_f64(float),
        _ => serializer.serialize_str(&price.to_string()),
    }
}

/// First `max` characters of `value`
pub fn truncate_chars(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

/// Serialize the cart without any size limit
pub fn serialize_cart(cart: &Cart) -> Result<String> {
    let lines: Vec<StoredLine> = cart
        .items()
        .iter()
        .map(|item| StoredLine {
            item_code: item.item_code.clone(),
            name: item.name.clone(),
            quantity: item.quantity,
            price: item.unit_price,
        })
        .collect();

    Ok(serde_json::to_string(&lines)?)
}

/// Build the session metadata for a checkout
pub fn encode(cart: &Cart, customer: &Customer, project: &Project) -> Result<CheckoutMetadata> {
    let mut metadata = CheckoutMetadata::default();
    let mut put = |key: &str, value: &str| {
        metadata.insert(key, truncate_chars(value, MAX_VALUE_CHARS));
    };

    let address = &project.delivery_address;
    put(keys::CUSTOMER_FIRST_NAME, &customer.first_name);
    put(keys::CUSTOMER_LAST_NAME, &customer.last_name);
    put(keys::CUSTOMER_EMAIL, &customer.email);
    put(keys::CUSTOMER_PHONE, &customer.phone);
    put(keys::CUSTOMER_COMPANY, customer.company.as_deref().unwrap_or_default());
    put(keys::PROJECT_NAME, &project.project_name);
    put(keys::DELIVERY_STREET, &address.street);
    put(keys::DELIVERY_CITY, &address.city);
    put(keys::DELIVERY_STATE, &address.state);
    put(keys::DELIVERY_ZIP, &address.zip);
    put(
        keys::DELIVERY_DATE,
        project.estimated_delivery_date.as_deref().unwrap_or_default(),
    );

    let notes = truncate_chars(&project.notes, MAX_NOTES_CHARS);
    if notes.len() < project.notes.len() {
        tracing::warn!(
            original_chars = project.notes.chars().count(),
            kept_chars = MAX_NOTES_CHARS,
            "Project notes truncated for checkout metadata"
        );
    }
    metadata.insert(keys::PROJECT_NOTES, notes);

    let serialized = serialize_cart(cart)?;
    let stored = truncate_chars(&serialized, MAX_CART_CHARS);
    if stored.len() < serialized.len() {
        tracing::warn!(
            items = cart.len(),
            serialized_chars = serialized.chars().count(),
            kept_chars = MAX_CART_CHARS,
            "Cart metadata truncated; it will not decode on the webhook side"
        );
    }
    metadata.insert(keys::CART_ITEMS, stored);

    Ok(metadata)
}

/// Rebuild the cart lines from `cart_items`
///
/// A missing key decodes to an empty list. Malformed text (usually from
/// truncation) is a [`PaymentError::Parse`].
pub fn decode_cart(metadata: &CheckoutMetadata) -> Result<Vec<CartItem>> {
    let raw = metadata.get(keys::CART_ITEMS);
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let lines: Vec<StoredLine> = serde_json::from_str(raw).map_err(|e| {
        PaymentError::Parse(format!(
            "cart_items is not valid ({} chars): {e}",
            raw.chars().count()
        ))
    })?;

    Ok(lines
        .into_iter()
        .map(|line| CartItem::new(line.item_code, line.name, line.price, line.quantity))
        .collect())
}

/// Customer fields as stored in the metadata
pub fn decode_customer(metadata: &CheckoutMetadata) -> Customer {
    let company = metadata.get(keys::CUSTOMER_COMPANY);
    Customer {
        first_name: metadata.get(keys::CUSTOMER_FIRST_NAME).into(),
        last_name: metadata.get(keys::CUSTOMER_LAST_NAME).into(),
        email: metadata.get(keys::CUSTOMER_EMAIL).into(),
        phone: metadata.get(keys::CUSTOMER_PHONE).into(),
        company: (!company.is_empty()).then(|| company.to_string()),
    }
}

/// Project fields as stored in the metadata (notes possibly truncated)
pub fn decode_project(metadata: &CheckoutMetadata) -> Project {
    let date = metadata.get(keys::DELIVERY_DATE);
    Project {
        project_name: metadata.get(keys::PROJECT_NAME).into(),
        delivery_address: DeliveryAddress {
            street: metadata.get(keys::DELIVERY_STREET).into(),
            city: metadata.get(keys::DELIVERY_CITY).into(),
            state: metadata.get(keys::DELIVERY_STATE).into(),
            zip: metadata.get(keys::DELIVERY_ZIP).into(),
        },
        estimated_delivery_date: (!date.is_empty()).then(|| date.to_string()),
        notes: metadata.get(keys::PROJECT_NOTES).into(),
    }
}
