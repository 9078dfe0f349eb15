//! Pull-parses one record's XML rendition into an owned node tree.
//!
//! EVTX record XML is vendor-controlled and occasionally truncated mid-chunk,
//! so the parser is deliberately forgiving: end-name checks are relaxed and a
//! document that ends with open elements is unwound into a partial tree.
//! Only a document yielding no root element at all is rejected.

use crate::err::{Error, Result};

use log::debug;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// A single element in a parsed record: local tag name, attributes in
/// document order, child elements and accumulated text content.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub text: String,
}

impl XmlNode {
    /// Attribute lookup by local name, `None` when absent.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child with the given local name.
    pub fn find_child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First descendant with the given local name, depth-first in document
    /// order. Iterative, so arbitrarily deep payloads cannot blow the stack.
    pub fn find_descendant(&self, name: &str) -> Option<&XmlNode> {
        let mut stack: Vec<&XmlNode> = self.children.iter().rev().collect();

        while let Some(node) = stack.pop() {
            if node.name == name {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }

        None
    }

    /// Re-serializes this subtree to XML text. Attribute and text content are
    /// escaped; the original namespace declarations are not reconstructed.
    pub fn to_xml_string(&self) -> String {
        enum Op<'a> {
            Open(&'a XmlNode),
            Close(&'a str),
        }

        let mut out = String::new();
        let mut ops = vec![Op::Open(self)];

        while let Some(op) = ops.pop() {
            match op {
                Op::Open(node) => {
                    out.push('<');
                    out.push_str(&node.name);
                    for (key, value) in &node.attributes {
                        out.push(' ');
                        out.push_str(key);
                        out.push_str("=\"");
                        out.push_str(&escape(value.as_str()));
                        out.push('"');
                    }

                    if node.children.is_empty() && node.text.is_empty() {
                        out.push_str("/>");
                    } else {
                        out.push('>');
                        out.push_str(&escape(node.text.as_str()));
                        ops.push(Op::Close(&node.name));
                        for child in node.children.iter().rev() {
                            ops.push(Op::Open(child));
                        }
                    }
                }
                Op::Close(name) => {
                    out.push_str("</");
                    out.push_str(name);
                    out.push('>');
                }
            }
        }

        out
    }
}

fn node_from_start(tag: &BytesStart) -> XmlNode {
    let name = String::from_utf8_lossy(tag.local_name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attr in tag.attributes().with_checks(false).flatten() {
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        attributes.push((key, value));
    }

    XmlNode {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    }
}

fn attach(stack: &mut Vec<XmlNode>, root: &mut Option<XmlNode>, node: XmlNode) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    } else if root.is_none() {
        *root = Some(node);
    }
    // Trailing siblings after the root element are not part of a record,
    // drop them.
}

/// Parses one record's XML text into an [`XmlNode`] tree.
///
/// Truncated input produces a best-effort partial tree; input that produces
/// no root element is a [`Error::MalformedRecord`].
pub fn parse_record(xml: &str) -> Result<XmlNode> {
    let mut reader = Reader::from_str(xml);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.trim_text_start = true;
    config.trim_text_end = true;

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;
    let mut parse_error: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(tag)) => stack.push(node_from_start(&tag)),
            Ok(Event::Empty(tag)) => {
                let node = node_from_start(&tag);
                attach(&mut stack, &mut root, node);
            }
            Ok(Event::Text(text)) => {
                if let Some(top) = stack.last_mut() {
                    match text.unescape() {
                        Ok(value) => top.text.push_str(value.trim()),
                        Err(_) => top
                            .text
                            .push_str(String::from_utf8_lossy(&text).trim()),
                    }
                }
            }
            Ok(Event::CData(cdata)) => {
                if let Some(top) = stack.last_mut() {
                    top.text
                        .push_str(String::from_utf8_lossy(&cdata.into_inner()).trim());
                }
            }
            Ok(Event::End(_)) => {
                if let Some(node) = stack.pop() {
                    attach(&mut stack, &mut root, node);
                }
                if stack.is_empty() && root.is_some() {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            // Declarations, comments, processing instructions and doctypes
            // carry nothing a flat row needs.
            Ok(_) => {}
            Err(e) => {
                debug!(
                    "stopping record parse at position {}: {}",
                    reader.buffer_position(),
                    e
                );
                parse_error = Some(e.to_string());
                break;
            }
        }
    }

    // A truncated document leaves open elements behind; unwind them so the
    // caller still sees everything parsed so far.
    while let Some(node) = stack.pop() {
        attach(&mut stack, &mut root, node);
    }

    root.ok_or_else(|| {
        Error::malformed_record(
            parse_error.unwrap_or_else(|| "document contains no elements".to_string()),
        )
    })
}
