//! Summing totals across collections and republishing them in the summary block.

use anyhow::{anyhow, Context, Result};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::format::CurrencyFormat;
use crate::store::{query_all, DocumentStore, Record};

/// Where a collection keeps each record's total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalField {
    /// A plain number property.
    Number,
    /// A formula property evaluating to a number.
    Formula,
}

impl TotalField {
    fn read(self, record: &Record, property: &str) -> Option<f64> {
        match self {
            TotalField::Number => record.number(property),
            TotalField::Formula => record.formula_number(property),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalSource {
    pub collection_id: String,
    pub field: TotalField,
}

impl TotalSource {
    pub fn new(collection_id: impl Into<String>, field: TotalField) -> Self {
        Self {
            collection_id: collection_id.into(),
            field,
        }
    }
}

/// Sum the records' totals. Records without a readable total are skipped.
pub fn sum_totals(records: &[Record], field: TotalField, property: &str) -> Decimal {
    records
        .iter()
        .filter_map(|record| match field.read(record, property).and_then(Decimal::from_f64) {
            Some(total) => Some(total),
            None => {
                warn!(record_id = %record.id, property, "record has no readable total; skipping");
                None
            }
        })
        .sum()
}

/// Read every source collection again and add up all totals, rounded per `format`.
pub async fn calculate_total(
    store: &dyn DocumentStore,
    sources: &[TotalSource],
    property: &str,
    format: &CurrencyFormat,
) -> Result<Decimal> {
    info!("calculating total assets");
    let mut total = Decimal::ZERO;

    for source in sources {
        let records = query_all(store, &source.collection_id)
            .await
            .with_context(|| format!("Failed to query collection {}", source.collection_id))?;
        total += sum_totals(&records, source.field, property);
    }

    Ok(format.round(total))
}

/// The literal written into the summary segment, e.g. `": $1234.50"`.
pub fn summary_text(total: Decimal, format: &CurrencyFormat) -> String {
    format!(": {}", format.format(total))
}

/// Build the block patch that puts `text` into the second rich-text segment
/// of a callout, padding the segment list as needed.
pub fn callout_patch(block: &Value, text: &str) -> Result<Value> {
    let callout = block
        .get("callout")
        .filter(|c| c.is_object())
        .ok_or_else(|| anyhow!("Callout block not found in response"))?;

    let mut rich_text = callout
        .get("rich_text")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    while rich_text.len() < 2 {
        rich_text.push(json!({ "type": "text", "text": { "content": "" } }));
    }

    let segment = rich_text[1]
        .as_object_mut()
        .ok_or_else(|| anyhow!("Callout rich text segment is not an object"))?;
    let text_obj = segment
        .entry("text")
        .or_insert_with(|| json!({ "content": "" }));
    if !text_obj.is_object() {
        *text_obj = json!({ "content": "" });
    }
    text_obj["content"] = Value::String(text.to_string());

    Ok(json!({ "callout": { "rich_text": rich_text } }))
}

/// Rewrite the summary block's display segment with the formatted total.
pub async fn publish_total(
    store: &dyn DocumentStore,
    block_id: &str,
    total: Decimal,
    format: &CurrencyFormat,
) -> Result<()> {
    let block = store
        .fetch_block(block_id)
        .await
        .with_context(|| format!("Failed to read summary block {block_id}"))?;
    let patch = callout_patch(&block, &summary_text(total, format))?;

    info!(total = %total, "updating total assets");
    store
        .patch_block(block_id, &patch)
        .await
        .with_context(|| format!("Failed to update summary block {block_id}"))
}
