//! Cart, Customer and Project Model
//!
//! Shapes posted by the storefront when the shopper starts checkout.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// A single cart line
///
/// Accepts both the flat form (`{itemCode, name, unitPrice, quantity}`) and the
/// storefront's nested form (`{product: {itemCode, name, price}, quantity}`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CartItemInput", rename_all = "camelCase")]
pub struct CartItem {
    /// Catalog item code (ERP item key)
    pub item_code: String,

    /// Display name
    pub name: String,

    /// Price per unit in major currency units
    pub unit_price: Decimal,

    /// Units ordered, must be at least 1
    pub quantity: u32,
}

impl CartItem {
    pub fn new(
        item_code: impl Into<String>,
        name: impl Into<String>,
        unit_price: Decimal,
        quantity: u32,
    ) -> Self {
        Self {
            item_code: item_code.into(),
            name: name.into(),
            unit_price,
            quantity,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CartItemInput {
    Nested { product: ProductInput, quantity: u32 },
    Flat(FlatItemInput),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductInput {
    #[serde(alias = "item_code")]
    item_code: String,
    #[serde(default)]
    name: String,
    #[serde(alias = "unitPrice")]
    price: Decimal,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlatItemInput {
    #[serde(alias = "item_code")]
    item_code: String,
    #[serde(default)]
    name: String,
    #[serde(alias = "price")]
    unit_price: Decimal,
    quantity: u32,
}

impl From<CartItemInput> for CartItem {
    fn from(input: CartItemInput) -> Self {
        match input {
            CartItemInput::Nested { product, quantity } => {
                Self::new(product.item_code, product.name, product.price, quantity)
            }
            CartItemInput::Flat(item) => {
                Self::new(item.item_code, item.name, item.unit_price, item.quantity)
            }
        }
    }
}

/// Ordered list of cart lines
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new(items: Vec<CartItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check the cart can be turned into a payment session
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(PaymentError::Validation("Cart is empty".into()));
        }

        for item in &self.items {
            if item.quantity == 0 {
                return Err(PaymentError::Validation(format!(
                    "Invalid quantity for {}",
                    item.item_code
                )));
            }
            if item.unit_price.is_sign_negative() {
                return Err(PaymentError::Validation(format!(
                    "Invalid price for {}",
                    item.item_code
                )));
            }
        }

        Ok(())
    }
}

impl From<Vec<CartItem>> for Cart {
    fn from(items: Vec<CartItem>) -> Self {
        Self::new(items)
    }
}

/// Buyer contact details
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Customer {
    pub first_name: String,
    pub last_name: String,
    /// Natural key for the ERP customer
    pub email: String,
    pub phone: String,
    pub company: Option<String>,
}

impl Customer {
    /// "First Last", trimmed
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl DeliveryAddress {
    /// Single-line form: "street, city, state zip"
    pub fn formatted(&self) -> String {
        format!("{}, {}, {} {}", self.street, self.city, self.state, self.zip)
    }
}

/// Construction project the order is delivered to
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    pub project_name: String,
    pub delivery_address: DeliveryAddress,
    /// `YYYY-MM-DD`; the ERP side picks a default when absent
    pub estimated_delivery_date: Option<String>,
    pub notes: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_flat_item_parsing() {
        let item: CartItem = serde_json::from_str(
            r#"{"itemCode":"SIPS-WALL-4X24","name":"SIP Wall Panel","unitPrice":1250,"quantity":2}"#,
        )
        .unwrap();
        assert_eq!(item, CartItem::new("SIPS-WALL-4X24", "SIP Wall Panel", dec!(1250), 2));
    }

    #[test]
    fn test_nested_item_parsing() {
        let item: CartItem = serde_json::from_str(
            r#"{"product":{"itemCode":"SIPS-ROOF-8X24","name":"SIP Roof Panel","price":1450},"quantity":3}"#,
        )
        .unwrap();
        assert_eq!(item.item_code, "SIPS-ROOF-8X24");
        assert_eq!(item.unit_price, dec!(1450));
        assert_eq!(item.quantity, 3);
    }

    #[test]
    fn test_empty_cart_rejected() {
        let err = Cart::default().validate().unwrap_err();
        assert!(matches!(err, PaymentError::Validation(ref m) if m == "Cart is empty"));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let cart = Cart::new(vec![CartItem::new("SPLINE-2X6", "Spline", dec!(5), 0)]);
        assert!(matches!(cart.validate(), Err(PaymentError::Validation(_))));
    }

    #[test]
    fn test_missing_customer_fields_default_empty() {
        let customer: Customer = serde_json::from_str(r#"{"email":"a@b.com"}"#).unwrap();
        assert_eq!(customer.first_name, "");
        assert_eq!(customer.company, None);
        assert_eq!(customer.display_name(), "");
    }

    #[test]
    fn test_address_formatting() {
        let address = DeliveryAddress {
            street: "12 Timber Rd".into(),
            city: "Bend".into(),
            state: "OR".into(),
            zip: "97701".into(),
        };
        assert_eq!(address.formatted(), "12 Timber Rd, Bend, OR 97701");
    }
}
