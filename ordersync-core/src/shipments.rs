//! Shipment documents and their persistence.
//!
//! Shipments live in a single JSON array at `<home>/.ordersync/shipments.json`,
//! rewritten atomically (`.tmp` + rename) on every insert batch.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, json_err, StoreError};
use crate::paths::{self, set_file_permissions};

/// Courier-facing projection of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub name: String,
    /// Order name, e.g. `"#1001"`. Unique per shipment.
    pub order: String,
    pub phone: Vec<String>,
    pub add: String,
    pub pin: u32,
    pub pickup_location: String,
    pub address_type: String,
    pub ewbn: String,
    pub hsn_code: String,
    pub shipping_mode: String,
    pub seller_inv: String,
    pub city: String,
    pub weight: f64,
    pub return_name: String,
    pub return_address: String,
    pub return_city: String,
    pub return_phone: Vec<String>,
    pub return_state: String,
    pub return_country: String,
    pub return_pin: u32,
    pub seller_name: String,
    pub fragile_shipment: bool,
    pub shipment_height: u32,
    pub shipment_width: u32,
    pub shipment_length: u32,
    pub cod_amount: f64,
    pub products_desc: String,
    pub state: String,
    pub dangerous_good: bool,
    pub waybill: String,
    pub total_amount: f64,
    pub seller_add: String,
    pub country: String,
    pub plastic_packaging: bool,
    pub quantity: String,
}

/// Shipment persistence seam.
pub trait ShipmentStore {
    fn find_by_order(&self, order: &str) -> Result<Option<Shipment>, StoreError>;
    /// Insert every shipment in one write. Returns how many were stored.
    fn insert_many(&mut self, shipments: Vec<Shipment>) -> Result<usize, StoreError>;
}

/// Single-file JSON array store.
#[derive(Debug, Clone)]
pub struct FileShipmentStore {
    path: PathBuf,
}

impl FileShipmentStore {
    pub fn open_at(home: &Path) -> Self {
        Self {
            path: paths::shipments_path(home),
        }
    }

    pub fn open() -> Result<Self, StoreError> {
        let home = dirs::home_dir().ok_or(StoreError::HomeNotFound)?;
        Ok(Self::open_at(&home))
    }

    #[cfg(test)]
    fn path(&self) -> &Path {
        &self.path
    }

    /// Every stored shipment; empty when the file does not exist yet.
    pub fn load(&self) -> Result<Vec<Shipment>, StoreError> {
        if !self.path.exists() {
            return Ok(vec![]);
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| io_err(&self.path, e))?;
        serde_json::from_str(&contents).map_err(|e| json_err(&self.path, e))
    }

    fn save(&self, shipments: &[Shipment]) -> Result<(), StoreError> {
        let Some(dir) = self.path.parent() else {
            return Err(io_err(
                &self.path,
                std::io::Error::other("invalid shipments path"),
            ));
        };
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        let json =
            serde_json::to_string_pretty(shipments).map_err(|e| json_err(&self.path, e))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        set_file_permissions(&tmp).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }
}

impl ShipmentStore for FileShipmentStore {
    fn find_by_order(&self, order: &str) -> Result<Option<Shipment>, StoreError> {
        Ok(self.load()?.into_iter().find(|s| s.order == order))
    }

    fn insert_many(&mut self, shipments: Vec<Shipment>) -> Result<usize, StoreError> {
        if shipments.is_empty() {
            return Ok(0);
        }
        let count = shipments.len();
        let mut all = self.load()?;
        all.extend(shipments);
        self.save(&all)?;
        Ok(count)
    }
}

/// In-process shipment store.
#[derive(Debug, Clone, Default)]
pub struct MemoryShipmentStore {
    pub shipments: Vec<Shipment>,
}

impl ShipmentStore for MemoryShipmentStore {
    fn find_by_order(&self, order: &str) -> Result<Option<Shipment>, StoreError> {
        Ok(self.shipments.iter().find(|s| s.order == order).cloned())
    }

    fn insert_many(&mut self, shipments: Vec<Shipment>) -> Result<usize, StoreError> {
        let count = shipments.len();
        self.shipments.extend(shipments);
        Ok(count)
    }
}

#[cfg(test)]
pub(crate) fn sample_shipment(order: &str) -> Shipment {
    Shipment {
        name: "Jane Doe".into(),
        order: order.into(),
        phone: vec!["555-0100".into()],
        add: "1 Main St".into(),
        pin: 560001,
        pickup_location: "warehouse_name".into(),
        address_type: "home".into(),
        ewbn: String::new(),
        hsn_code: "SKU-1".into(),
        shipping_mode: "Surface".into(),
        seller_inv: String::new(),
        city: "Bengaluru".into(),
        weight: 0.5,
        return_name: String::new(),
        return_address: String::new(),
        return_city: String::new(),
        return_phone: vec![String::new()],
        return_state: String::new(),
        return_country: String::new(),
        return_pin: 0,
        seller_name: "Acme".into(),
        fragile_shipment: false,
        shipment_height: 100,
        shipment_width: 100,
        shipment_length: 0,
        cod_amount: 0.0,
        products_desc: "Widget".into(),
        state: "KA".into(),
        dangerous_good: false,
        waybill: String::new(),
        total_amount: 10.0,
        seller_add: String::new(),
        country: "India".into(),
        plastic_packaging: false,
        quantity: "1".into(),
    }
}
