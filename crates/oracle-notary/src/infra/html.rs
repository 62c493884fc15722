//! XPath evaluation over a fetched HTML/XHTML document. The XPath engine
//! itself is treated as an opaque selector parser; this module only wires
//! it up and renders the two result shapes `/notarize` can ask for.

use sxd_document::dom::{ChildOfElement, Element};
use sxd_document::parser;
use sxd_xpath::nodeset::Node;
use sxd_xpath::{Context, Factory};

use crate::domain::request::HtmlResultType;

/// Evaluate `selector` against `body` and render the first matched node
/// according to `result_type`. Returns `None` if the document fails to parse,
/// the XPath expression is malformed, or nothing matches — all three collapse
/// to [`crate::domain::extract::ExtractError::SelectorNoMatch`] at the call
/// site.
pub fn select(body: &str, selector: &str, result_type: HtmlResultType) -> Option<String> {
    let package = parser::parse(body).ok()?;
    let document = package.as_document();

    let factory = Factory::new();
    let xpath = factory.build(selector).ok()??;
    let context = Context::new();
    let value = xpath.evaluate(&context, document.root()).ok()?;

    let node = first_node(value)?;
    match result_type {
        HtmlResultType::Value => Some(text_content(&node)),
        HtmlResultType::Element => Some(render(&node)),
    }
}

/// Only nodeset-typed results carry a node to render; a string-typed XPath
/// result (e.g. `string(...)`) has none and is not supported by this
/// selector-matching path.
fn first_node(value: sxd_xpath::Value) -> Option<Node> {
    match value {
        sxd_xpath::Value::Nodeset(nodes) => nodes.document_order_first(),
        _ => None,
    }
}

/// XPath string-value of a node: the concatenation of all descendant text.
fn text_content(node: &Node) -> String {
    match node {
        Node::Element(el) => element_text(*el),
        Node::Text(text) => text.text().to_string(),
        Node::Attribute(attr) => attr.value().to_string(),
        Node::Root(_) | Node::Comment(_) | Node::ProcessingInstruction(_) => String::new(),
    }
}

fn element_text(el: Element) -> String {
    let mut out = String::new();
    for child in el.children() {
        match child {
            ChildOfElement::Element(child_el) => out.push_str(&element_text(child_el)),
            ChildOfElement::Text(text) => out.push_str(text.text()),
            ChildOfElement::Comment(_) | ChildOfElement::ProcessingInstruction(_) => {}
        }
    }
    out
}

/// Serialize the matched node's "outerHTML" equivalent: the element and its
/// full subtree, re-rendered as XML text.
fn render(node: &Node) -> String {
    match node {
        Node::Element(el) => render_element(*el),
        other => text_content(other),
    }
}

fn render_element(el: Element) -> String {
    let name = el.name().local_part().to_string();
    let mut out = format!("<{name}");
    for attr in el.attributes() {
        out.push(' ');
        out.push_str(attr.name().local_part());
        out.push_str("=\"");
        out.push_str(&attr.value().replace('"', "&quot;"));
        out.push('"');
    }
    out.push('>');
    for child in el.children() {
        match child {
            ChildOfElement::Element(child_el) => out.push_str(&render_element(child_el)),
            ChildOfElement::Text(text) => out.push_str(text.text()),
            ChildOfElement::Comment(_) | ChildOfElement::ProcessingInstruction(_) => {}
        }
    }
    out.push_str(&format!("</{name}>"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_value() {
        let body = "<html><body><p id=\"x\">hello</p></body></html>";
        let value = select(body, "//p[@id='x']", HtmlResultType::Value).unwrap();
        assert_eq!(value, "hello");
    }

    #[test]
    fn extracts_outer_html_for_element() {
        let body = "<html><body><p id=\"x\">hello</p></body></html>";
        let value = select(body, "//p[@id='x']", HtmlResultType::Element).unwrap();
        assert_eq!(value, "<p id=\"x\">hello</p>");
    }

    #[test]
    fn returns_none_when_selector_has_no_match() {
        let body = "<html><body></body></html>";
        assert!(select(body, "//missing", HtmlResultType::Value).is_none());
    }
}
