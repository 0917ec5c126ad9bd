//! XML model decoder
//!
//! Reads the first top-level `<Item>` of a `<roblox>` document. Each item's
//! class comes from its `class` attribute and its name from the `Name`
//! property; nested items become children.

use roxmltree::{Document, Node};

use crate::{DecodeError, ModelNode, NAME_PROPERTY};

/// Class of an item without a `class` attribute
const DEFAULT_CLASS: &str = "Folder";

/// Decode an XML model into its root instance
pub fn decode_xml(text: &str) -> Result<ModelNode, DecodeError> {
    let document = Document::parse(text).map_err(|e| DecodeError::Xml(e.to_string()))?;
    let root = document.root_element();
    if !root.has_tag_name("roblox") {
        return Err(DecodeError::Xml(format!("unexpected root element <{}>", root.tag_name().name())));
    }

    root.children()
        .find(|node| node.has_tag_name("Item"))
        .map(item)
        .ok_or(DecodeError::NoRoot)
}

fn item(node: Node) -> ModelNode {
    let class_name = node.attribute("class").unwrap_or(DEFAULT_CLASS).to_string();
    let name = item_name(node).unwrap_or_else(|| class_name.clone());
    let children = node
        .children()
        .filter(|child| child.has_tag_name("Item"))
        .map(item)
        .collect();

    ModelNode {
        name,
        class_name,
        children,
    }
}

/// Text of the `Name` property, whatever its value type tag
fn item_name(node: Node) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name("Properties"))?
        .children()
        .find(|property| property.is_element() && property.attribute("name") == Some(NAME_PROPERTY))
        .map(|property| property.text().unwrap_or_default().to_string())
}
