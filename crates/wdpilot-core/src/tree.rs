//! Typed snapshot of the accessibility tree.
//!
//! The page source returned by the server is an XML document whose element
//! names are platform class names and whose attributes carry the
//! accessibility properties. [`AxNode::parse`] turns it into an immutable tree;
//! every scan in this module is a pure function over that snapshot.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::element::{short_type, ElementSummary};
use crate::vocabulary::{
    BUTTON_LABEL_ATTRIBUTES, FUZZY_ATTRIBUTES, SUMMARY_ID_ATTRIBUTES, SUMMARY_TEXT_ATTRIBUTES,
};

/// Errors raised while parsing a page source.
#[derive(Error, Debug)]
pub enum TreeError {
    /// The document is not well-formed XML.
    #[error("malformed page source: {0}")]
    Malformed(String),

    /// The document has no root element.
    #[error("page source has no root element")]
    Empty,
}

/// One node of the accessibility tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AxNode {
    /// Element name (the platform class, e.g. `XCUIElementTypeButton`).
    pub tag: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Child nodes in document order.
    pub children: Vec<AxNode>,
}

impl AxNode {
    /// Parses an XML page source.
    pub fn parse(source: &str) -> Result<AxNode, TreeError> {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text(true);

        // Open elements; the bottom entry collects top-level nodes.
        let mut stack: Vec<AxNode> = vec![AxNode::default()];

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => stack.push(node_from(&start)?),
                Ok(Event::Empty(start)) => {
                    let node = node_from(&start)?;
                    attach(&mut stack, node)?;
                }
                Ok(Event::End(_)) => {
                    if stack.len() < 2 {
                        return Err(TreeError::Malformed("unbalanced closing tag".into()));
                    }
                    let node = stack.pop().ok_or(TreeError::Empty)?;
                    attach(&mut stack, node)?;
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(TreeError::Malformed(format!(
                        "at byte {}: {e}",
                        reader.error_position()
                    )))
                }
            }
        }

        if stack.len() != 1 {
            return Err(TreeError::Malformed("unclosed element".into()));
        }
        let mut document = stack.pop().ok_or(TreeError::Empty)?;
        if document.children.is_empty() {
            return Err(TreeError::Empty);
        }
        Ok(document.children.swap_remove(0))
    }

    /// Looks up an attribute; empty values count as absent.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, v)| k == name && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }

    /// First non-empty attribute among `names`, in that order.
    pub fn first_attr(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.attr(name))
    }

    /// Iterates the subtree rooted here in document (pre-) order.
    pub fn iter(&self) -> impl Iterator<Item = &AxNode> {
        let mut pending = vec![self];
        std::iter::from_fn(move || {
            let node = pending.pop()?;
            pending.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// True when the node's tag or `class` attribute is `class`.
    pub fn is_class(&self, class: &str) -> bool {
        self.tag == class || self.attr("class") == Some(class)
    }
}

fn node_from(start: &BytesStart<'_>) -> Result<AxNode, TreeError> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| TreeError::Malformed(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| TreeError::Malformed(e.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(AxNode {
        tag,
        attributes,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [AxNode], node: AxNode) -> Result<(), TreeError> {
    stack
        .last_mut()
        .ok_or(TreeError::Empty)?
        .children
        .push(node);
    Ok(())
}

/// Finds the first fuzzy-id match in document order.
///
/// For each node, the attributes in [`FUZZY_ATTRIBUTES`] are checked for a
/// case-insensitive substring match with `partial`. Returns the matched
/// attribute value.
pub fn find_like<'a>(root: &'a AxNode, partial: &str) -> Option<&'a str> {
    let needle = partial.to_lowercase();
    root.iter().find_map(|node| {
        FUZZY_ATTRIBUTES.iter().find_map(|name| {
            node.attr(name)
                .filter(|value| value.to_lowercase().contains(&needle))
        })
    })
}

/// Reduces a matched attribute value to the identifier that is re-resolved
/// through the normal locator: the segment after the last `/`.
///
/// This turns an Android resource id such as `com.app:id/login_button` into
/// `login_button`. It is a heuristic: values that legitimately contain `/`
/// (for example a label like `1/2`) lose their prefix.
pub fn reresolve_key(matched: &str) -> &str {
    matched.rsplit('/').next().unwrap_or(matched)
}

/// Labels of every button-typed node, in document order.
pub fn button_labels(root: &AxNode, button_class: &str) -> Vec<String> {
    root.iter()
        .filter(|node| node.is_class(button_class))
        .filter_map(|node| node.first_attr(BUTTON_LABEL_ATTRIBUTES))
        .map(str::to_string)
        .collect()
}

/// Summaries of up to `limit` nodes that carry an id or displayed text.
pub fn element_summaries(root: &AxNode, limit: usize) -> Vec<ElementSummary> {
    root.iter()
        .filter_map(|node| {
            let id = node.first_attr(SUMMARY_ID_ATTRIBUTES);
            let text = node.first_attr(SUMMARY_TEXT_ATTRIBUTES);
            if id.is_none() && text.is_none() {
                return None;
            }
            Some(ElementSummary {
                element_type: short_type(&node.tag).to_string(),
                id: id.map(str::to_string),
                text: text.map(str::to_string),
            })
        })
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const IOS_SOURCE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<XCUIElementTypeApplication type="XCUIElementTypeApplication" name="Demo" label="Demo">
  <XCUIElementTypeWindow>
    <XCUIElementTypeButton name="login_button" label="Log In" enabled="true"/>
    <XCUIElementTypeStaticText name="welcome" value="Hello &amp; welcome"/>
    <XCUIElementTypeOther>
      <XCUIElementTypeButton name="" label="" title="Settings"/>
    </XCUIElementTypeOther>
  </XCUIElementTypeWindow>
</XCUIElementTypeApplication>"#;

    const ANDROID_SOURCE: &str = r#"<hierarchy rotation="0">
  <android.widget.FrameLayout class="android.widget.FrameLayout">
    <android.widget.Button class="android.widget.Button" resource-id="com.example:id/submit_btn" text="Submit"/>
    <android.widget.TextView resource-id="com.example:id/status" content-desc="Status line" text="Ready"/>
  </android.widget.FrameLayout>
</hierarchy>"#;

    #[test]
    fn parse_builds_tree_in_document_order() {
        let root = AxNode::parse(IOS_SOURCE).unwrap();
        assert_eq!(root.tag, "XCUIElementTypeApplication");
        let tags: Vec<&str> = root.iter().map(|n| n.tag.as_str()).collect();
        assert_eq!(
            tags,
            vec![
                "XCUIElementTypeApplication",
                "XCUIElementTypeWindow",
                "XCUIElementTypeButton",
                "XCUIElementTypeStaticText",
                "XCUIElementTypeOther",
                "XCUIElementTypeButton",
            ]
        );
    }

    #[test]
    fn attribute_values_are_unescaped() {
        let root = AxNode::parse(IOS_SOURCE).unwrap();
        let text = root.iter().find(|n| n.attr("name") == Some("welcome")).unwrap();
        assert_eq!(text.attr("value"), Some("Hello & welcome"));
    }

    #[test]
    fn malformed_source_is_an_error() {
        assert!(AxNode::parse("<a><b></a>").is_err());
        assert!(AxNode::parse("").is_err());
        assert!(AxNode::parse("<a>").is_err());
    }

    #[test]
    fn find_like_is_case_insensitive_and_first_hit_wins() {
        let root = AxNode::parse(IOS_SOURCE).unwrap();
        assert_eq!(find_like(&root, "LOGIN"), Some("login_button"));
        assert_eq!(find_like(&root, "nothing-here"), None);
    }

    #[test]
    fn find_like_scans_android_resource_ids() {
        let root = AxNode::parse(ANDROID_SOURCE).unwrap();
        let hit = find_like(&root, "submit").unwrap();
        assert_eq!(hit, "com.example:id/submit_btn");
        assert_eq!(reresolve_key(hit), "submit_btn");
    }

    #[test]
    fn reresolve_key_heuristic_edge_cases() {
        assert_eq!(reresolve_key("plain"), "plain");
        assert_eq!(reresolve_key("a/b/c"), "c");
        // A trailing slash leaves nothing to resolve.
        assert_eq!(reresolve_key("pkg:id/"), "");
        // Labels containing '/' lose their prefix.
        assert_eq!(reresolve_key("Page 1/2"), "2");
    }

    #[test]
    fn button_labels_follow_priority() {
        let root = AxNode::parse(IOS_SOURCE).unwrap();
        assert_eq!(
            button_labels(&root, "XCUIElementTypeButton"),
            vec!["Log In".to_string(), "Settings".to_string()]
        );
        let android = AxNode::parse(ANDROID_SOURCE).unwrap();
        assert_eq!(button_labels(&android, "android.widget.Button"), vec!["Submit".to_string()]);
    }

    #[test]
    fn element_summaries_skip_anonymous_nodes_and_respect_limit() {
        let root = AxNode::parse(ANDROID_SOURCE).unwrap();
        let rows = element_summaries(&root, 50);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].element_type, "Button");
        assert_eq!(rows[0].id.as_deref(), Some("com.example:id/submit_btn"));
        assert_eq!(rows[1].text.as_deref(), Some("Ready"));

        assert_eq!(element_summaries(&root, 1).len(), 1);
    }
}
