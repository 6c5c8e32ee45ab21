//! Built-in seed workbooks, keyed by device class, plus the footer-variant
//! table that `bill_type` selects from.

use once_cell::sync::Lazy;
use serde_json::{Value, json};

/// Device classes the seed workbooks are tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceClass {
    #[default]
    Desktop,
    Tablet,
    Phone,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Desktop => "desktop",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Phone => "phone",
        }
    }
}

/// Footer variants selectable via `bill_type`. The enum is open; unknown
/// values simply have no label.
pub const FOOTERS: &[(u32, &str)] = &[(1, "Invoice"), (2, "Receipt"), (3, "Estimate")];

/// Label for a bill type, if it is one of the built-in variants.
pub fn footer_label(bill_type: u32) -> Option<&'static str> {
    FOOTERS
        .iter()
        .find(|(id, _)| *id == bill_type)
        .map(|(_, label)| *label)
}

fn seed_workbook(rows: u32, columns: u32) -> Value {
    json!({
        "numsheets": 1,
        "currentid": "sheet1",
        "currentname": "sheet1",
        "sheetArr": {
            "sheet1": {
                "name": "sheet1",
                "sheetstr": {
                    "savestr": format!(
                        "version:1.5\ncell:A1:t:INVOICE\ncell:A3:t:Bill To\ncell:E3:t:Date\ncell:E4:t:Invoice No\ncell:A6:t:Description\ncell:D6:t:Qty\ncell:E6:t:Rate\ncell:F6:t:Amount\ncell:E{rows}:t:Total\nsheet:c:{columns}:r:{rows}\n"
                    ),
                },
            },
        },
        // Volatile view state; stripped before structural comparison.
        "editState": { "selection": "A1" },
    })
}

static DESKTOP_SEED: Lazy<Value> = Lazy::new(|| seed_workbook(40, 8));
static TABLET_SEED: Lazy<Value> = Lazy::new(|| seed_workbook(30, 6));
static PHONE_SEED: Lazy<Value> = Lazy::new(|| seed_workbook(24, 6));

/// Canonical seed workbook for a device class, for structural comparison.
pub fn seed_value(device: DeviceClass) -> &'static Value {
    match device {
        DeviceClass::Desktop => &DESKTOP_SEED,
        DeviceClass::Tablet => &TABLET_SEED,
        DeviceClass::Phone => &PHONE_SEED,
    }
}

/// Seed workbook serialized the way the engine emits content.
pub fn seed_raw(device: DeviceClass) -> String {
    seed_value(device).to_string()
}

/// Seed workbook percent-encoded the way the store holds content.
pub fn seed_content(device: DeviceClass) -> String {
    urlencoding::encode(&seed_raw(device)).into_owned()
}
