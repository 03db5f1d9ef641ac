//! Projection of stored orders into courier shipments.
//!
//! A stored order missing its shipping address, its customer or any line
//! item cannot be shipped. Other gaps fall back to defaults and are reported
//! as warnings alongside the mapped shipment.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ordersync_core::types::order_label;
use ordersync_core::{OrderId, RecordRef, Shipment};

const PICKUP_LOCATION: &str = "warehouse_name";
const ADDRESS_TYPE: &str = "home";
const SHIPPING_MODE: &str = "Surface";
const DEFAULT_ADDRESS: &str = "default";
const DEFAULT_ORDER_NAME: &str = "N/A";
const DEFAULT_PHONE: &str = "null";
const DEFAULT_QUANTITY: &str = "1";
const PACKAGE_HEIGHT: u32 = 100;
const PACKAGE_WIDTH: u32 = 100;

/// Result of mapping one order.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingOutcome {
    Mapped(Shipment),
    /// Mapped with defaults filled in; `details` names each one.
    Warning {
        shipment: Shipment,
        details: Vec<String>,
    },
    /// Required data is missing; nothing can be shipped.
    Failed { details: Vec<String> },
}

/// An order that failed or needed defaults, with the reasons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentIssue {
    pub id: OrderId,
    pub label: String,
    pub details: Vec<String>,
}

/// Outcome of a `ship` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentReport {
    /// Order names of the shipments inserted.
    pub saved: Vec<String>,
    /// Orders that already had a shipment.
    pub skipped: Vec<RecordRef>,
    pub failed: Vec<ShipmentIssue>,
    pub warnings: Vec<ShipmentIssue>,
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn present(value: &Value, key: &str) -> bool {
    value.get(key).is_some_and(|v| !v.is_null())
}

/// Leading digits of `zip`, e.g. `"560 001"` reads as 560.
fn parse_pin(zip: &str) -> Option<u32> {
    let digits: String = zip
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Amount given either as a decimal string or a JSON number.
fn parse_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn round_to_cents(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Map a stored order body to a shipment.
pub fn map_order(order: &Value) -> MappingOutcome {
    let mut errors = Vec::new();
    if !present(order, "shipping_address") {
        errors.push("missing `shipping_address`".to_string());
    }
    if !present(order, "customer") {
        errors.push("missing `customer`".to_string());
    }
    let first_item = order
        .get("line_items")
        .and_then(Value::as_array)
        .and_then(|items| items.first());
    let Some(item) = first_item else {
        errors.push("missing or empty `line_items`".to_string());
        return MappingOutcome::Failed { details: errors };
    };
    if !errors.is_empty() {
        return MappingOutcome::Failed { details: errors };
    }

    let address = &order["shipping_address"];
    let mut warnings = Vec::new();

    let name = non_empty_str(address, "name").unwrap_or_else(|| {
        warnings.push("missing `shipping_address.name`; using \"\"".to_string());
        ""
    });
    let order_name = non_empty_str(order, "name").unwrap_or_else(|| {
        warnings.push(format!("missing `name`; using \"{DEFAULT_ORDER_NAME}\""));
        DEFAULT_ORDER_NAME
    });
    let phone = non_empty_str(order, "phone")
        .or_else(|| non_empty_str(address, "phone"))
        .unwrap_or_else(|| {
            warnings.push(format!("missing `phone`; using \"{DEFAULT_PHONE}\""));
            DEFAULT_PHONE
        });
    let street = non_empty_str(address, "address1").unwrap_or_else(|| {
        warnings.push(format!(
            "missing `shipping_address.address1`; using \"{DEFAULT_ADDRESS}\""
        ));
        DEFAULT_ADDRESS
    });
    let pin = match non_empty_str(address, "zip") {
        None => {
            warnings.push("missing `shipping_address.zip`; using 0".to_string());
            0
        }
        Some(zip) => parse_pin(zip).unwrap_or_else(|| {
            warnings.push(format!("invalid `shipping_address.zip` {zip:?}; using 0"));
            0
        }),
    };
    let weight = match item.get("grams").and_then(Value::as_f64) {
        Some(grams) if grams > 0.0 => round_to_cents(grams / 1000.0),
        _ => {
            warnings.push("missing line item `grams`; using weight 0".to_string());
            0.0
        }
    };
    let total_amount = match order.get("total_price").filter(|v| !v.is_null()) {
        None => 0.0,
        Some(raw) => parse_amount(raw).unwrap_or_else(|| {
            warnings.push(format!("invalid `total_price` {raw}; using 0"));
            0.0
        }),
    };
    let prepaid = order.get("financial_status").and_then(Value::as_str) == Some("paid");
    let quantity = match item.get("quantity").and_then(Value::as_u64) {
        Some(q) if q > 0 => q.to_string(),
        _ => {
            warnings.push(format!(
                "missing line item `quantity`; using \"{DEFAULT_QUANTITY}\""
            ));
            DEFAULT_QUANTITY.to_string()
        }
    };

    let text = |value: &Value, key: &str| non_empty_str(value, key).unwrap_or_default().to_string();
    let shipment = Shipment {
        name: name.to_string(),
        order: order_name.to_string(),
        phone: vec![phone.to_string()],
        add: street.to_string(),
        pin,
        pickup_location: PICKUP_LOCATION.to_string(),
        address_type: ADDRESS_TYPE.to_string(),
        ewbn: String::new(),
        hsn_code: text(item, "sku"),
        shipping_mode: SHIPPING_MODE.to_string(),
        seller_inv: String::new(),
        city: text(address, "city"),
        weight,
        return_name: String::new(),
        return_address: String::new(),
        return_city: String::new(),
        return_phone: vec![String::new()],
        return_state: String::new(),
        return_country: String::new(),
        return_pin: 0,
        seller_name: text(item, "vendor"),
        fragile_shipment: false,
        shipment_height: PACKAGE_HEIGHT,
        shipment_width: PACKAGE_WIDTH,
        shipment_length: 0,
        cod_amount: if prepaid { 0.0 } else { total_amount },
        products_desc: text(item, "title"),
        state: text(address, "province"),
        dangerous_good: false,
        waybill: String::new(),
        total_amount,
        seller_add: String::new(),
        country: text(address, "country"),
        plastic_packaging: false,
        quantity,
    };

    if warnings.is_empty() {
        MappingOutcome::Mapped(shipment)
    } else {
        MappingOutcome::Warning {
            shipment,
            details: warnings,
        }
    }
}

/// Label used to look up an order's existing shipment.
pub(crate) fn shipment_key(order: &Value) -> String {
    let label = order_label(order);
    if label.is_empty() {
        DEFAULT_ORDER_NAME.to_string()
    } else {
        label
    }
}
