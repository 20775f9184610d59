//! Plot normalization.

use serde_json::{Map, Value};
use std::sync::LazyLock;

use super::{extract_summary, record_name, NormalizeContext, Overflow};
use crate::category::Category;
use crate::entity::Plot;
use crate::shape::{classify, list_records, RawRecord, RawShape};
use crate::text::{clean, derive_id};

const COLLECTION_KEYS: &[&str] = &["plots"];

const RECOGNIZED: &[&str] = &["plot_name", "name", "arc", "status"];

static EMPTY: LazyLock<Map<String, Value>> = LazyLock::new(Map::new);

pub fn normalize(doc: &Value, ctx: &NormalizeContext) -> Vec<Plot> {
    match classify(doc, COLLECTION_KEYS) {
        RawShape::CollectionMap { entries, .. } => entries
            .iter()
            .map(|(key, body)| match body {
                Value::Object(body) => normalize_record(
                    &RawRecord {
                        key: Some(key.as_str()),
                        group: None,
                        body,
                    },
                    ctx,
                ),
                text => text_only(key, text, ctx),
            })
            .collect(),
        RawShape::CollectionList { items, .. } | RawShape::BareList(items) => list_records(items, None)
            .iter()
            .map(|r| normalize_record(r, ctx))
            .collect(),
        RawShape::BareObject(body) if body.contains_key("plot_name") || body.contains_key("name") => {
            vec![normalize_record(&RawRecord::single(body), ctx)]
        }
        _ => Vec::new(),
    }
}

pub fn normalize_record(record: &RawRecord, ctx: &NormalizeContext) -> Plot {
    let body = record.body;
    let name = record_name(record, &["plot_name", "name"]);
    let summary = extract_summary(body);
    let summary_key = summary.as_ref().map(|(key, _)| *key);

    let (notes, attributes) = Overflow::collect(body, |key, _| {
        RECOGNIZED.contains(&key) || Some(key) == summary_key
    })
    .into_parts();

    Plot {
        id: derive_id(&name),
        arc: clean(record.get("arc")),
        status: clean(record.get("status")),
        summary: summary.map(|(_, text)| text),
        notes,
        attributes,
        source: ctx.source(Category::Plots, None),
        name,
    }
}

/// `"<plot name>": "<summary text>"` entries.
fn text_only(key: &str, text: &Value, ctx: &NormalizeContext) -> Plot {
    let record = RawRecord {
        key: Some(key),
        group: None,
        body: &EMPTY,
    };
    let mut plot = normalize_record(&record, ctx);
    plot.summary = clean(text);
    plot
}
