//! Declared field schema.
//!
//! A [`FieldSchema`] lists every field that takes part in differencing and
//! tags it as a scalar, a nested object (with its own sub-schema) or a
//! collection. Fields not declared here are never compared.

use crate::types::STORAGE_METADATA_KEYS;

/// Element type of a [`FieldKind::Collection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    /// Strings, numbers, or untyped values.
    Scalar,
    /// Objects governed by a sub-schema.
    Nested(FieldSchema),
}

/// How a declared field is compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar,
    Nested(FieldSchema),
    Collection(ElementKind),
}

/// Ordered set of declared fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSchema {
    fields: Vec<(String, FieldKind)>,
}

impl FieldSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name` with `kind`. Redeclaring a name replaces its kind in
    /// place; storage metadata keys (`_id`, `__v`) are never declared.
    pub fn field(mut self, name: &str, kind: FieldKind) -> Self {
        if STORAGE_METADATA_KEYS.contains(&name) {
            return self;
        }
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = kind,
            None => self.fields.push((name.to_owned(), kind)),
        }
        self
    }

    pub fn scalar(self, name: &str) -> Self {
        self.field(name, FieldKind::Scalar)
    }

    pub fn scalars(self, names: &[&str]) -> Self {
        names.iter().fold(self, |schema, name| schema.scalar(name))
    }

    pub fn nested(self, name: &str, sub: FieldSchema) -> Self {
        self.field(name, FieldKind::Nested(sub))
    }

    pub fn collection(self, name: &str) -> Self {
        self.field(name, FieldKind::Collection(ElementKind::Scalar))
    }

    pub fn collection_of(self, name: &str, sub: FieldSchema) -> Self {
        self.field(name, FieldKind::Collection(ElementKind::Nested(sub)))
    }

    /// Declared fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldKind)> {
        self.fields.iter().map(|(name, kind)| (name.as_str(), kind))
    }

    pub fn get(&self, name: &str) -> Option<&FieldKind> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, kind)| kind)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Order schema
// ---------------------------------------------------------------------------

fn money() -> FieldSchema {
    FieldSchema::new().scalars(&["amount", "currency_code"])
}

fn price_set() -> FieldSchema {
    FieldSchema::new()
        .nested("shop_money", money())
        .nested("presentment_money", money())
}

fn client_details() -> FieldSchema {
    FieldSchema::new().scalars(&[
        "accept_language",
        "browser_height",
        "browser_ip",
        "browser_width",
        "session_hash",
        "user_agent",
    ])
}

fn address() -> FieldSchema {
    FieldSchema::new().scalars(&[
        "first_name",
        "address1",
        "phone",
        "city",
        "zip",
        "province",
        "country",
        "last_name",
        "address2",
        "company",
        "latitude",
        "longitude",
        "name",
        "country_code",
        "province_code",
    ])
}

fn tax_line() -> FieldSchema {
    FieldSchema::new()
        .scalars(&["price", "rate", "title"])
        .nested("price_set", price_set())
        .scalar("channel_liable")
}

fn marketing_consent() -> FieldSchema {
    FieldSchema::new().scalars(&[
        "state",
        "opt_in_level",
        "consent_updated_at",
        "consent_collected_from",
    ])
}

fn customer() -> FieldSchema {
    FieldSchema::new()
        .scalars(&[
            "id",
            "created_at",
            "updated_at",
            "first_name",
            "last_name",
            "state",
            "note",
            "verified_email",
            "multipass_identifier",
            "tax_exempt",
        ])
        .nested("email_marketing_consent", marketing_consent())
        .nested("sms_marketing_consent", marketing_consent())
        .scalars(&["tags", "email", "phone", "currency"])
        .collection("tax_exemptions")
        .scalar("admin_graphql_api_id")
        .nested("default_address", address())
}

fn line_item() -> FieldSchema {
    FieldSchema::new()
        .scalars(&["id", "admin_graphql_api_id"])
        .collection("attributed_staffs")
        .scalars(&[
            "current_quantity",
            "fulfillable_quantity",
            "fulfillment_service",
            "fulfillment_status",
            "gift_card",
            "grams",
            "name",
            "price",
        ])
        .nested("price_set", price_set())
        .scalars(&["product_exists", "product_id"])
        .collection("properties")
        .scalars(&[
            "quantity",
            "requires_shipping",
            "sku",
            "taxable",
            "title",
            "total_discount",
        ])
        .nested("total_discount_set", price_set())
        .scalars(&[
            "variant_id",
            "variant_inventory_management",
            "variant_title",
            "vendor",
        ])
        .collection_of("tax_lines", tax_line())
        .collection("duties")
        .collection("discount_allocations")
}

fn refund_transaction() -> FieldSchema {
    FieldSchema::new().scalars(&[
        "id",
        "admin_graphql_api_id",
        "amount",
        "authorization",
        "created_at",
        "currency",
        "device_id",
        "error_code",
        "gateway",
        "kind",
        "location_id",
        "message",
        "order_id",
        "parent_id",
        "payment_id",
        "processed_at",
        "receipt",
        "source_name",
        "status",
        "test",
        "user_id",
    ])
}

fn refund_line_item() -> FieldSchema {
    FieldSchema::new()
        .scalars(&[
            "id",
            "line_item_id",
            "location_id",
            "quantity",
            "restock_type",
            "subtotal",
        ])
        .nested("subtotal_set", price_set())
        .scalar("total_tax")
        .nested("total_tax_set", price_set())
        .nested("line_item", line_item())
}

fn refund() -> FieldSchema {
    FieldSchema::new()
        .scalars(&[
            "id",
            "admin_graphql_api_id",
            "created_at",
            "note",
            "order_id",
            "processed_at",
            "restock",
        ])
        .nested("total_duties_set", price_set())
        .scalar("user_id")
        .collection("order_adjustments")
        .collection_of("transactions", refund_transaction())
        .collection_of("refund_line_items", refund_line_item())
        .collection("duties")
}

fn fulfillment() -> FieldSchema {
    FieldSchema::new()
        .scalars(&[
            "id",
            "admin_graphql_api_id",
            "created_at",
            "location_id",
            "name",
            "order_id",
            "origin_address",
            "receipt",
            "service",
            "shipment_status",
            "status",
            "tracking_company",
            "tracking_number",
        ])
        .collection("tracking_numbers")
        .scalar("tracking_url")
        .collection("tracking_urls")
        .scalar("updated_at")
        .collection_of("line_items", line_item())
}

/// The declared schema of a platform order document.
pub fn order_schema() -> FieldSchema {
    FieldSchema::new()
        .scalars(&[
            "id",
            "admin_graphql_api_id",
            "app_id",
            "browser_ip",
            "buyer_accepts_marketing",
            "cancel_reason",
            "cancelled_at",
            "cart_token",
            "checkout_id",
            "checkout_token",
        ])
        .nested("client_details", client_details())
        .scalars(&[
            "closed_at",
            "confirmation_number",
            "confirmed",
            "contact_email",
            "created_at",
            "currency",
            "current_subtotal_price",
        ])
        .nested("current_subtotal_price_set", price_set())
        .nested("current_total_additional_fees_set", price_set())
        .scalar("current_total_discounts")
        .nested("current_total_discounts_set", price_set())
        .nested("current_total_duties_set", price_set())
        .scalar("current_total_price")
        .nested("current_total_price_set", price_set())
        .scalar("current_total_tax")
        .nested("current_total_tax_set", price_set())
        .scalars(&["customer_locale", "device_id"])
        .collection("discount_codes")
        .scalars(&[
            "duties_included",
            "email",
            "estimated_taxes",
            "financial_status",
            "fulfillment_status",
            "landing_site",
            "landing_site_ref",
            "location_id",
            "merchant_business_entity_id",
            "merchant_of_record_app_id",
            "name",
            "note",
        ])
        .collection("note_attributes")
        .scalars(&["number", "order_number", "order_status_url"])
        .nested("original_total_additional_fees_set", price_set())
        .nested("original_total_duties_set", price_set())
        .collection("payment_gateway_names")
        .scalars(&[
            "phone",
            "po_number",
            "presentment_currency",
            "processed_at",
            "reference",
            "referring_site",
            "source_identifier",
            "source_name",
            "source_url",
            "subtotal_price",
        ])
        .nested("subtotal_price_set", price_set())
        .scalars(&["tags", "tax_exempt"])
        .collection_of("tax_lines", tax_line())
        .scalars(&["taxes_included", "test", "token"])
        .nested("total_cash_rounding_payment_adjustment_set", price_set())
        .nested("total_cash_rounding_refund_adjustment_set", price_set())
        .scalar("total_discounts")
        .nested("total_discounts_set", price_set())
        .scalar("total_line_items_price")
        .nested("total_line_items_price_set", price_set())
        .scalars(&["total_outstanding", "total_price"])
        .nested("total_price_set", price_set())
        .nested("total_shipping_price_set", price_set())
        .scalar("total_tax")
        .nested("total_tax_set", price_set())
        .scalars(&["total_tip_received", "total_weight", "updated_at", "user_id"])
        .nested("billing_address", address())
        .nested("customer", customer())
        .collection("discount_applications")
        .collection_of("fulfillments", fulfillment())
        .collection_of("line_items", line_item())
        .scalar("payment_terms")
        .collection_of("refunds", refund())
        .nested("shipping_address", address())
        .collection("shipping_lines")
}
