use serde::Deserialize;
use serde_json::Value;

use crate::model::{CatalogRecord, MalformedRecord, ProductBatch};

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawProduct {
    pub id: Option<i64>,
    pub code: Option<String>,
    pub style_code: Option<String>,
    pub name: Option<String>,
    pub stock_control: Option<Value>,
    #[serde(default)]
    pub product_options: Option<Vec<RawProductOption>>,
    pub brand: Option<String>,
    pub supplier_id: Option<i64>,
    pub description: Option<String>,
    pub modified_date: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawProductOption {
    pub supplier_code: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Validate one element of a `/v1/Products` response.
pub fn parse_product(position: usize, value: Value) -> Result<CatalogRecord, MalformedRecord> {
    let remote_id = value.get("id").and_then(Value::as_i64);
    let malformed = |reason: String| MalformedRecord {
        position,
        remote_id,
        reason,
    };

    if !value.is_object() {
        return Err(malformed(format!("expected an object, got {}", value)));
    }
    let raw: RawProduct = serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;

    let Some(id) = raw.id else {
        return Err(malformed("missing id".into()));
    };
    let style_code = raw.style_code.unwrap_or_default();
    let Some(code) = non_blank(raw.code).or_else(|| non_blank(Some(style_code.clone()))) else {
        return Err(malformed("neither code nor styleCode is set".into()));
    };

    let stock_control = match raw.stock_control {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    };
    let supplier_code = raw
        .product_options
        .and_then(|options| options.into_iter().next())
        .and_then(|first| first.supplier_code);

    Ok(CatalogRecord {
        code,
        remote_id: id,
        name: raw.name.unwrap_or_default(),
        style_code,
        stock_control,
        supplier_code,
        supplier_name: raw.brand.unwrap_or_default(),
        supplier_id: raw.supplier_id,
        description: raw.description.unwrap_or_default(),
        last_modified: raw.modified_date.unwrap_or_default(),
    })
}

/// Split a page of raw elements into records and rejects. `offset` keeps
/// positions unique across pages.
pub fn parse_products(values: Vec<Value>, offset: usize) -> ProductBatch {
    let mut batch = ProductBatch::default();
    for (i, value) in values.into_iter().enumerate() {
        match parse_product(offset + i, value) {
            Ok(record) => batch.records.push(record),
            Err(rejected) => batch.rejected.push(rejected),
        }
    }
    batch
}
