//! Flattening of the variable `EventData`/`UserData` payload subtrees into
//! dynamically-named string columns.
//!
//! Column naming rules:
//! - `<Data Name="X">v</Data>` under `EventData` becomes `Data_X`. A repeated
//!   name within one record is last-write-wins.
//! - Unnamed `<Data>` children become `Data_0`, `Data_1`, ... counting
//!   unnamed siblings only, restarting for every record.
//! - Every leaf under `UserData` becomes `UD_<path>`, the path being the tag
//!   names below the `UserData` element joined with `_`. Repeated keys get a
//!   positional `_2`, `_3`, ... suffix; element attributes are emitted as
//!   `UD_<path>_<attr>`.
//!
//! `EventData` (human-scannable summary), `UserData_Raw` (verbatim subtree
//! XML) and `Binary` (canonical uppercase hex) are always present, empty when
//! their source is absent.

use crate::flat_row::FlatRow;
use crate::xml_record::XmlNode;

use hashbrown::HashSet;
use log::debug;

/// Flattening a `UserData` path stops once the joined key grows past this
/// many characters; the skipped subtree remains visible in `UserData_Raw`.
pub const MAX_PATH_LEN: usize = 512;

/// Flattens the payload of one parsed event into `row`.
pub fn flatten_payload(event: &XmlNode, row: &mut FlatRow) {
    flatten_event_data(event, row);
    flatten_user_data(event, row);
    row.insert("Binary", canonical_binary_hex(event));
}

fn flatten_event_data(event: &XmlNode, row: &mut FlatRow) {
    let mut summary_parts: Vec<String> = Vec::new();
    let mut unnamed_idx = 0usize;

    if let Some(event_data) = event.find_child("EventData") {
        for child in &event_data.children {
            let value = child.text.trim();
            let name = child
                .attr("Name")
                .map(str::trim)
                .filter(|name| !name.is_empty());

            match name {
                Some(name) => {
                    summary_parts.push(format!("{name}={value}"));
                    row.insert(format!("Data_{name}"), value);
                }
                None => {
                    summary_parts.push(value.to_string());
                    row.insert(format!("Data_{unnamed_idx}"), value);
                    unnamed_idx += 1;
                }
            }
        }
    }

    row.insert("EventData", summary_parts.join(" | "));
}

fn flatten_user_data(event: &XmlNode, row: &mut FlatRow) {
    let user_data = match event.find_child("UserData") {
        Some(user_data) => user_data,
        None => {
            row.insert("UserData_Raw", "");
            return;
        }
    };

    enum Op<'a> {
        Visit { node: &'a XmlNode, path: String },
        Attrs { node: &'a XmlNode, path: String },
    }

    let mut used_keys: HashSet<String, ahash::RandomState> = HashSet::default();
    let mut stack: Vec<Op> = user_data
        .children
        .iter()
        .rev()
        .map(|child| Op::Visit {
            node: child,
            path: child.name.clone(),
        })
        .collect();

    while let Some(op) = stack.pop() {
        match op {
            Op::Visit { node, path } => {
                if path.len() > MAX_PATH_LEN {
                    debug!(
                        "user data path longer than {MAX_PATH_LEN} chars, \
                         leaving subtree in UserData_Raw only"
                    );
                    continue;
                }

                if node.children.is_empty() {
                    let key = claim_key(&mut used_keys, path);
                    row.insert(format!("UD_{key}"), node.text.trim());
                    emit_attrs(node, &key, &mut used_keys, row);
                } else {
                    // Attributes follow the subtree in document order, so the
                    // attr op goes on the stack before the children.
                    stack.push(Op::Attrs {
                        node,
                        path: path.clone(),
                    });
                    for child in node.children.iter().rev() {
                        stack.push(Op::Visit {
                            node: child,
                            path: format!("{}_{}", path, child.name),
                        });
                    }
                }
            }
            Op::Attrs { node, path } => emit_attrs(node, &path, &mut used_keys, row),
        }
    }

    row.insert("UserData_Raw", user_data.to_xml_string());
}

fn emit_attrs(
    node: &XmlNode,
    base: &str,
    used_keys: &mut HashSet<String, ahash::RandomState>,
    row: &mut FlatRow,
) {
    for (attr, value) in &node.attributes {
        let key = claim_key(used_keys, format!("{base}_{attr}"));
        row.insert(format!("UD_{key}"), value.trim());
    }
}

/// Reserves `key`, appending the first free positional suffix (`_2`, `_3`,
/// ...) when a sibling already took it.
fn claim_key(used_keys: &mut HashSet<String, ahash::RandomState>, key: String) -> String {
    if used_keys.insert(key.clone()) {
        return key;
    }

    let mut suffix = 2usize;
    loop {
        let candidate = format!("{key}_{suffix}");
        if used_keys.insert(candidate.clone()) {
            return candidate;
        }
        suffix += 1;
    }
}

/// The first `Binary` element anywhere in the record, re-encoded as canonical
/// uppercase hex. Content that is not valid hex is passed through trimmed.
fn canonical_binary_hex(event: &XmlNode) -> String {
    let text = match event.find_descendant("Binary") {
        Some(node) => node.text.trim(),
        None => return String::new(),
    };

    if !text.is_empty() && text.len() % 2 == 0 && text.bytes().all(|b| b.is_ascii_hexdigit()) {
        text.to_ascii_uppercase()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml_record::parse_record;
    use pretty_assertions::assert_eq;

    fn flatten(xml: &str) -> FlatRow {
        let event = parse_record(xml).unwrap();
        let mut row = FlatRow::new();
        flatten_payload(&event, &mut row);
        row
    }

    #[test]
    fn test_named_data_elements_become_data_columns() {
        let row = flatten(
            r#"<Event><EventData>
                 <Data Name="IpAddress">10.0.0.1</Data>
                 <Data Name="TargetUserName">alice</Data>
               </EventData></Event>"#,
        );

        assert_eq!(row.get("Data_IpAddress"), Some("10.0.0.1"));
        assert_eq!(row.get("Data_TargetUserName"), Some("alice"));
        assert_eq!(
            row.get("EventData"),
            Some("IpAddress=10.0.0.1 | TargetUserName=alice")
        );
    }

    #[test]
    fn test_repeated_name_is_last_write_wins() {
        let row = flatten(
            r#"<Event><EventData>
                 <Data Name="IpAddress">10.0.0.1</Data>
                 <Data Name="IpAddress">10.0.0.2</Data>
               </EventData></Event>"#,
        );

        assert_eq!(row.get("Data_IpAddress"), Some("10.0.0.2"));
        // Both occurrences stay visible in the summary.
        assert_eq!(
            row.get("EventData"),
            Some("IpAddress=10.0.0.1 | IpAddress=10.0.0.2")
        );
    }

    #[test]
    fn test_unnamed_data_elements_are_indexed_independently() {
        let row = flatten(
            r#"<Event><EventData>
                 <Data>a</Data>
                 <Data Name="Named">n</Data>
                 <Data>b</Data>
               </EventData></Event>"#,
        );

        assert_eq!(row.get("Data_0"), Some("a"));
        assert_eq!(row.get("Data_1"), Some("b"));
        assert_eq!(row.get("Data_Named"), Some("n"));
        assert_eq!(row.get("EventData"), Some("a | Named=n | b"));
    }

    #[test]
    fn test_empty_event_data_yields_empty_summary_and_no_data_columns() {
        let row = flatten("<Event><EventData></EventData></Event>");

        assert_eq!(row.get("EventData"), Some(""));
        assert!(!row.column_names().any(|name| name.starts_with("Data_")));
    }

    #[test]
    fn test_user_data_leaves_become_path_columns() {
        let row = flatten(
            r#"<Event><UserData>
                 <RuleInfo Action="Block">
                   <Name>Core Networking</Name>
                   <Profiles>Public</Profiles>
                 </RuleInfo>
               </UserData></Event>"#,
        );

        assert_eq!(row.get("UD_RuleInfo_Name"), Some("Core Networking"));
        assert_eq!(row.get("UD_RuleInfo_Profiles"), Some("Public"));
        assert_eq!(row.get("UD_RuleInfo_Action"), Some("Block"));
        assert_eq!(
            row.get("UserData_Raw"),
            Some(
                r#"<UserData><RuleInfo Action="Block"><Name>Core Networking</Name><Profiles>Public</Profiles></RuleInfo></UserData>"#
            )
        );
    }

    #[test]
    fn test_repeated_user_data_siblings_get_positional_suffixes() {
        let row = flatten(
            r#"<Event><UserData>
                 <Op><Item>first</Item><Item>second</Item><Item>third</Item></Op>
               </UserData></Event>"#,
        );

        assert_eq!(row.get("UD_Op_Item"), Some("first"));
        assert_eq!(row.get("UD_Op_Item_2"), Some("second"));
        assert_eq!(row.get("UD_Op_Item_3"), Some("third"));
    }

    #[test]
    fn test_absent_user_data_yields_empty_raw_and_no_ud_columns() {
        let row = flatten("<Event><EventData><Data Name=\"A\">1</Data></EventData></Event>");

        assert_eq!(row.get("UserData_Raw"), Some(""));
        assert!(!row.column_names().any(|name| name.starts_with("UD_")));
    }

    #[test]
    fn test_pathological_depth_is_bounded_by_path_length() {
        let depth = 200;
        let mut xml = String::from("<Event><UserData>");
        for _ in 0..depth {
            xml.push_str("<Nested>");
        }
        xml.push_str("leaf");
        for _ in 0..depth {
            xml.push_str("</Nested>");
        }
        xml.push_str("</UserData></Event>");

        let row = flatten(&xml);

        // The over-long path is dropped from the columns but the subtree is
        // still fully present in the raw serialization.
        assert!(!row.column_names().any(|name| name.len() > MAX_PATH_LEN + 3));
        assert!(row.get("UserData_Raw").unwrap().contains("leaf"));
    }

    #[test]
    fn test_binary_is_canonical_uppercase_hex() {
        let row = flatten("<Event><EventData><Binary>0a1b</Binary></EventData></Event>");
        assert_eq!(row.get("Binary"), Some("0A1B"));

        let row = flatten("<Event><EventData><Binary>0A1B</Binary></EventData></Event>");
        assert_eq!(row.get("Binary"), Some("0A1B"));
    }

    #[test]
    fn test_binary_that_is_not_hex_passes_through() {
        let row = flatten("<Event><EventData><Binary>xyz</Binary></EventData></Event>");
        assert_eq!(row.get("Binary"), Some("xyz"));
    }

    #[test]
    fn test_absent_binary_is_empty() {
        let row = flatten("<Event><EventData/></Event>");
        assert_eq!(row.get("Binary"), Some(""));
    }
}
