use std::collections::BTreeMap;

use roxmltree::{Document, Node};
use serde_json::Value;

use super::FetchResult;

/// Result codes the open-data portals use for a successful call.
const SUCCESS_CODES: &[&str] = &["00", "000", "INFO-000"];

pub fn is_success_code(code: &str) -> bool {
    SUCCESS_CODES.contains(&code.trim())
}

pub fn parse_document(text: &str) -> FetchResult<Document<'_>> {
    Ok(Document::parse(text)?)
}

/// Header metadata of a data.go.kr style XML response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub result_code: Option<String>,
    pub result_msg: Option<String>,
    pub total_count: Option<usize>,
}

impl Envelope {
    pub fn is_error(&self) -> bool {
        self.result_code
            .as_deref()
            .map(|code| !is_success_code(code))
            .unwrap_or(false)
    }
}

pub fn envelope(doc: &Document<'_>) -> Envelope {
    let root = doc.root_element();
    let header = child(root, "header");
    let body = child(root, "body");
    Envelope {
        result_code: header.and_then(|h| child_text(h, "resultCode")),
        result_msg: header.and_then(|h| child_text(h, "resultMsg")),
        total_count: body
            .and_then(|b| child_text(b, "totalCount"))
            .and_then(|count| count.parse().ok()),
    }
}

/// The repeated `body/items/item` elements of a response document.
pub fn items<'a, 'input>(doc: &'a Document<'input>) -> Vec<Node<'a, 'input>> {
    let root = doc.root_element();
    child(root, "body")
        .and_then(|body| child(body, "items"))
        .map(|items| {
            items
                .children()
                .filter(|n| n.is_element() && n.tag_name().name() == "item")
                .collect()
        })
        .unwrap_or_default()
}

pub fn child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == tag)
}

/// Trimmed text of a direct child element; `None` when missing or empty.
pub fn child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn element_text(node: Node<'_, '_>) -> String {
    node.text().map(str::trim).unwrap_or_default().to_string()
}

/// Try each candidate tag exactly, then fall back to a case-insensitive substring
/// scan over every child tag of `item`.
pub fn find_text(item: Node<'_, '_>, candidates: &[&str]) -> String {
    for candidate in candidates {
        if let Some(value) = child_text(item, candidate) {
            return value;
        }
    }

    let lowered: Vec<String> = candidates.iter().map(|c| c.to_lowercase()).collect();
    for node in item.children().filter(|n| n.is_element()) {
        let tag = node.tag_name().name().to_lowercase();
        if lowered.iter().any(|candidate| tag.contains(candidate.as_str())) {
            return element_text(node);
        }
    }
    String::new()
}

/// Read `explicit` first and only then apply the alternate-name policy.
pub fn field(item: Node<'_, '_>, explicit: &str, alternates: &[&str]) -> String {
    child_text(item, explicit).unwrap_or_else(|| find_text(item, alternates))
}

pub fn text_or_empty(item: Node<'_, '_>, tag: &str) -> String {
    child_text(item, tag).unwrap_or_default()
}

/// Flatten every element named in `row_tags` that has element children into a
/// tag → text map, in document order.
pub fn collect_xml_rows(doc: &Document<'_>, row_tags: &[&str]) -> Vec<BTreeMap<String, String>> {
    doc.descendants()
        .filter(|n| n.is_element() && row_tags.contains(&n.tag_name().name()))
        .filter(|n| n.children().any(|c| c.is_element()))
        .map(|row| {
            row.children()
                .filter(|c| c.is_element())
                .map(|c| (c.tag_name().name().to_string(), element_text(c)))
                .collect()
        })
        .collect()
}

pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Recursively collect `(name, code)` pairs from objects carrying `code_key`;
/// the name is the first non-empty of `name_keys`.
pub fn collect_pairs(root: &Value, code_key: &str, name_keys: &[&str]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    collect_pairs_into(root, code_key, name_keys, &mut pairs);
    pairs
}

fn collect_pairs_into(
    value: &Value,
    code_key: &str,
    name_keys: &[&str],
    out: &mut Vec<(String, String)>,
) {
    match value {
        Value::Object(map) => {
            if let Some(code) = map.get(code_key) {
                let name = name_keys
                    .iter()
                    .filter_map(|key| map.get(*key))
                    .map(value_to_string)
                    .find(|name| !name.is_empty());
                if let Some(name) = name {
                    out.push((name, value_to_string(code)));
                }
            }
            for nested in map.values() {
                collect_pairs_into(nested, code_key, name_keys, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_pairs_into(item, code_key, name_keys, out);
            }
        }
        _ => {}
    }
}

/// Turn JSON row objects into flat string maps.
pub fn json_rows(rows: &[Value]) -> Vec<BTreeMap<String, String>> {
    rows.iter()
        .filter_map(Value::as_object)
        .map(|object| {
            object
                .iter()
                .map(|(key, value)| (key.clone(), value_to_string(value)))
                .collect()
        })
        .collect()
}

/// Scrape the cells of every `<tr>` in an HTML document. Tags inside cells are
/// stripped and the common entities decoded.
pub fn scrape_html_table(html: &str) -> Vec<Vec<String>> {
    let lower = html.to_ascii_lowercase();
    let mut rows = Vec::new();
    let mut cursor = 0;

    while let Some(start) = lower[cursor..].find("<tr") {
        let row_start = cursor + start;
        let row_end = lower[row_start..]
            .find("</tr")
            .map(|i| row_start + i)
            .unwrap_or(lower.len());
        let cells = scrape_cells(&html[row_start..row_end], &lower[row_start..row_end]);
        if !cells.is_empty() {
            rows.push(cells);
        }
        cursor = row_end.max(row_start + 3);
        if cursor >= lower.len() {
            break;
        }
    }
    rows
}

fn scrape_cells(row: &str, lower: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cursor = 0;
    loop {
        let td = lower[cursor..].find("<td");
        let th = lower[cursor..].find("<th");
        let open = match (td, th) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => break,
        };
        let tag_start = cursor + open;
        let Some(tag_close) = lower[tag_start..].find('>') else {
            break;
        };
        let content_start = tag_start + tag_close + 1;
        let content_end = ["</td", "</th", "<td", "<th"]
            .iter()
            .filter_map(|needle| lower[content_start..].find(needle))
            .min()
            .map(|i| content_start + i)
            .unwrap_or(lower.len());
        cells.push(clean_cell(&row[content_start..content_end]));
        cursor = content_end;
    }
    cells
}

fn clean_cell(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut in_tag = false;
    for ch in raw.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
