//! Header normalization and column alias resolution
//!
//! Toyota Way: Poka-Yoke (mistake proofing)
//! - Header variability is resolved once, here, at the loader boundary
//! - Lookup never renames: exports write the headers the user uploaded
//!
//! Resolution order for a canonical column is exact match first, then each
//! configured alternate in order. Case is preserved; `available_stock` does
//! not match `Available_Stock`.

use crate::{Error, Result};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical column names
pub mod columns {
    /// Product identifier
    pub const PRODUCT: &str = "Product";
    /// Category label
    pub const CATEGORY: &str = "Category";
    /// Units on hand
    pub const AVAILABLE_STOCK: &str = "Available_Stock";
    /// Cost per unit
    pub const UNIT_COST: &str = "Unit_Cost";
    /// Per-row reorder threshold
    pub const REORDER_LEVEL: &str = "Reorder_Level";
    /// Days since the supplier last delivered
    pub const DAYS_SINCE_LAST_DELIVERY: &str = "Days_Since_Last_Delivery";
    /// Observation date in history files
    pub const DATE: &str = "Date";
    /// Units sold in history files
    pub const UNITS_SOLD: &str = "Units_Sold";
    /// Derived line value written on export
    pub const TOTAL_VALUE: &str = "Total_Value";
}

/// Canonical column → accepted alternate headers
///
/// Deserializing merges into the defaults: a config naming one alternate
/// for `Unit_Cost` keeps every built-in alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Vec<String>>", into = "BTreeMap<String, Vec<String>>")]
pub struct ColumnAliases {
    map: BTreeMap<String, Vec<String>>,
}

impl Default for ColumnAliases {
    fn default() -> Self {
        let defaults: [(&str, &[&str]); 6] = [
            (
                columns::AVAILABLE_STOCK,
                &["Available Stock", "Current_Stock", "Stock Quantity", "Stock_Quantity"],
            ),
            (columns::UNIT_COST, &["Unit Cost"]),
            (columns::PRODUCT, &["Item", "Product_Name", "SKU"]),
            (columns::REORDER_LEVEL, &["Reorder Level"]),
            (columns::DAYS_SINCE_LAST_DELIVERY, &["Days Since Last Delivery"]),
            (columns::UNITS_SOLD, &["Units Sold"]),
        ];
        let map = defaults
            .iter()
            .map(|(canonical, alternates)| {
                (
                    (*canonical).to_string(),
                    alternates.iter().map(|a| (*a).to_string()).collect(),
                )
            })
            .collect();
        Self { map }
    }
}

impl From<BTreeMap<String, Vec<String>>> for ColumnAliases {
    fn from(overrides: BTreeMap<String, Vec<String>>) -> Self {
        let mut aliases = Self::default();
        for (canonical, alternates) in overrides {
            for alternate in alternates {
                aliases.insert(&canonical, &alternate);
            }
        }
        aliases
    }
}

impl From<ColumnAliases> for BTreeMap<String, Vec<String>> {
    fn from(aliases: ColumnAliases) -> Self {
        aliases.map
    }
}

impl ColumnAliases {
    /// Alias table with no alternates at all (exact matches only)
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }

    /// Register `alternate` for `canonical` (ignored if already present)
    pub fn insert(&mut self, canonical: &str, alternate: &str) {
        let alternate = alternate.trim();
        let entry = self.map.entry(canonical.to_string()).or_default();
        if !entry.iter().any(|a| a == alternate) {
            entry.push(alternate.to_string());
        }
    }

    /// Alternates registered for `canonical`, in resolution order
    #[must_use]
    pub fn alternates(&self, canonical: &str) -> &[String] {
        self.map.get(canonical).map_or(&[], Vec::as_slice)
    }
}

/// Trimmed, case-preserved header row of an uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    headers: Vec<String>,
}

impl Schema {
    /// Build a schema from raw header cells
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when the header row is empty or two headers
    /// collide after trimming
    pub fn from_headers<I, S>(raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let headers: Vec<String> = raw
            .into_iter()
            .map(|h| h.as_ref().trim().to_string())
            .collect();

        if headers.is_empty() || headers.iter().all(String::is_empty) {
            return Err(Error::Parse("missing header row".to_string()));
        }

        let mut seen = FxHashSet::default();
        for header in &headers {
            if !seen.insert(header.as_str()) {
                return Err(Error::Parse(format!("duplicate column '{header}' in header row")));
            }
        }

        Ok(Self { headers })
    }

    /// Headers in file order
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of columns
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Whether the schema has no columns (never true for a loaded file)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Position of the header that is exactly `name`
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Resolve a canonical column to a header position
    #[must_use]
    pub fn resolve(&self, canonical: &str, aliases: &ColumnAliases) -> Option<usize> {
        self.position(canonical).or_else(|| {
            aliases
                .alternates(canonical)
                .iter()
                .find_map(|alternate| self.position(alternate))
        })
    }

    /// Resolve a column that `feature` cannot work without
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingColumn`] naming the canonical column and the
    /// feature
    pub fn require(
        &self,
        canonical: &str,
        feature: &'static str,
        aliases: &ColumnAliases,
    ) -> Result<usize> {
        self.resolve(canonical, aliases)
            .ok_or_else(|| Error::MissingColumn {
                column: canonical.to_string(),
                feature,
            })
    }
}
