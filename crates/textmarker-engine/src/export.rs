/*!
 * Deterministic export of a highlight list.
 *
 * Both formats are pure functions of their inputs: two exports of an
 * unchanged list differ only through the `exported_at` value the caller
 * passes in.
 */

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::highlight::Highlight;

/// The palette the picker offers. Anything else exports as its raw value.
const PALETTE: &[(&str, &str)] = &[
    ("#ffff00", "Yellow"),
    ("#ffb3ba", "Pink"),
    ("#baffc9", "Green"),
    ("#bae1ff", "Blue"),
    ("#ffffba", "Light Yellow"),
    ("#ffdfba", "Orange"),
    ("#e0bbff", "Purple"),
    ("#ffd1dc", "Light Pink"),
];

/// Friendly name for a palette color, `None` for anything unrecognized.
pub fn color_name(value: &str) -> Option<&'static str> {
    let lowered = value.to_ascii_lowercase();
    PALETTE
        .iter()
        .find(|(hex, _)| *hex == lowered)
        .map(|(_, name)| *name)
}

fn human_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Render the highlight list as a Markdown document.
pub fn to_markdown(
    document_id: &str,
    highlights: &[Highlight],
    exported_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Highlights from {document_id}\n\n"));
    out.push_str(&format!("*Exported on {}*\n\n", human_timestamp(exported_at)));
    out.push_str("---\n\n");

    for (index, highlight) in highlights.iter().enumerate() {
        out.push_str(&format!("## Highlight {}\n\n", index + 1));
        for line in highlight.text.lines() {
            out.push_str(&format!("> {line}\n"));
        }
        if highlight.text.is_empty() {
            out.push_str(">\n");
        }
        out.push('\n');
        out.push_str(&format!(
            "*Highlighted on: {}*  \n",
            human_timestamp(highlight.timestamp)
        ));
        out.push_str(&format!(
            "*Color: {}*\n\n",
            color_name(&highlight.color).unwrap_or(&highlight.color)
        ));
        out.push_str("---\n\n");
    }

    out
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportDocument<'a> {
    document_id: &'a str,
    export_date: DateTime<Utc>,
    highlights: &'a [Highlight],
}

/// Render the highlight list as a pretty-printed JSON document with stable
/// field order.
pub fn to_json(
    document_id: &str,
    highlights: &[Highlight],
    exported_at: DateTime<Utc>,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&ExportDocument {
        document_id,
        export_date: exported_at,
        highlights,
    })
}
