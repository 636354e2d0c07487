//! HTML fragment to well-formed XHTML.
//!
//! Rendered pages may carry raw HTML (`<br>`, `<img ...>`, unclosed
//! paragraphs). The fragment is parsed with html5ever the way a browser
//! reads it, then written back with XML rules so it can go into an EPUB
//! content document or through the PDF block extractor.

use std::borrow::Cow;
use std::cell::RefCell;

use html5ever::driver::ParseOpts;
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute, Namespace, QualName, local_name, ns, parse_document};

const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Elements written as `<name/>`.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Parse `html` as the body of a document and serialize it as XHTML.
///
/// `rewrite_href` sees the (unescaped) `href` of every `<a>` element and
/// may return a replacement. Comments are dropped.
pub fn to_xhtml(html: &str, rewrite_href: &dyn Fn(&str) -> Option<String>) -> String {
    let wrapped = format!("<!DOCTYPE html><html><head></head><body>{html}</body></html>");
    let tree = parse_document(TreeSinkImpl::default(), ParseOpts::default())
        .from_utf8()
        .one(wrapped.as_bytes());

    let mut out = String::with_capacity(html.len() + html.len() / 8);
    if let Some(body) = tree.find_element(NodeId::DOCUMENT, "body") {
        let writer = Writer { tree: &tree, rewrite_href };
        for &child in &tree.nodes[body.0].children {
            writer.node(child, &mut out, false);
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeId(usize);

impl NodeId {
    const DOCUMENT: NodeId = NodeId(0);
}

enum NodeData {
    Document,
    // Boxed so the name keeps its address while the arena grows
    Element {
        name: Box<QualName>,
        attrs: Vec<Attribute>,
    },
    Text(String),
    /// Comments, doctypes and processing instructions.
    Ignored,
}

struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena of parsed nodes. Nodes are never freed, only detached.
struct Tree {
    nodes: Vec<Node>,
}

impl Default for Tree {
    fn default() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }
}

impl Tree {
    fn alloc(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn append_text(&mut self, parent: NodeId, text: &str) {
        if let Some(&last) = self.nodes[parent.0].children.last()
            && let NodeData::Text(existing) = &mut self.nodes[last.0].data
        {
            existing.push_str(text);
            return;
        }
        let id = self.alloc(NodeData::Text(text.to_string()));
        self.append(parent, id);
    }

    fn insert_before(&mut self, sibling: NodeId, child: NodeOrText<NodeId>) {
        let Some(parent) = self.nodes[sibling.0].parent else {
            return;
        };
        let child = match child {
            NodeOrText::AppendNode(node) => {
                self.detach(node);
                node
            }
            NodeOrText::AppendText(text) => {
                let index = self.position(parent, sibling);
                if let Some(prev) = index.checked_sub(1).map(|i| self.nodes[parent.0].children[i])
                    && let NodeData::Text(existing) = &mut self.nodes[prev.0].data
                {
                    existing.push_str(&text);
                    return;
                }
                self.alloc(NodeData::Text(text.to_string()))
            }
        };
        let index = self.position(parent, sibling);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(index, child);
    }

    fn position(&self, parent: NodeId, child: NodeId) -> usize {
        self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == child)
            .unwrap_or(self.nodes[parent.0].children.len())
    }

    /// First element named `local` in document order.
    fn find_element(&self, from: NodeId, local: &str) -> Option<NodeId> {
        for &child in &self.nodes[from.0].children {
            if let NodeData::Element { name, .. } = &self.nodes[child.0].data
                && &*name.local == local
            {
                return Some(child);
            }
            if let Some(found) = self.find_element(child, local) {
                return Some(found);
            }
        }
        None
    }
}

/// html5ever sink building a [`Tree`].
///
/// The `TreeSink` methods take `&self`, hence the `RefCell`.
#[derive(Default)]
struct TreeSinkImpl {
    tree: RefCell<Tree>,
}

static EMPTY_NAME: QualName = QualName {
    prefix: None,
    ns: ns!(),
    local: local_name!(""),
};

impl TreeSink for TreeSinkImpl {
    type Handle = NodeId;
    type Output = Tree;
    type ElemName<'a>
        = &'a QualName
    where
        Self: 'a;

    fn finish(self) -> Tree {
        self.tree.into_inner()
    }

    fn parse_error(&self, _msg: Cow<'static, str>) {}

    fn get_document(&self) -> NodeId {
        NodeId::DOCUMENT
    }

    fn elem_name<'a>(&'a self, target: &'a NodeId) -> Self::ElemName<'a> {
        let tree = self.tree.borrow();
        match &tree.nodes[target.0].data {
            NodeData::Element { name, .. } => {
                let name: *const QualName = &**name;
                // SAFETY: the name lives in its own box, which is neither
                // moved nor dropped before the sink itself.
                unsafe { &*name }
            }
            _ => &EMPTY_NAME,
        }
    }

    fn create_element(&self, name: QualName, attrs: Vec<Attribute>, _flags: ElementFlags) -> NodeId {
        self.tree.borrow_mut().alloc(NodeData::Element {
            name: Box::new(name),
            attrs,
        })
    }

    fn create_comment(&self, _text: StrTendril) -> NodeId {
        self.tree.borrow_mut().alloc(NodeData::Ignored)
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> NodeId {
        self.tree.borrow_mut().alloc(NodeData::Ignored)
    }

    fn append(&self, parent: &NodeId, child: NodeOrText<NodeId>) {
        let mut tree = self.tree.borrow_mut();
        match child {
            NodeOrText::AppendNode(node) => tree.append(*parent, node),
            NodeOrText::AppendText(text) => tree.append_text(*parent, &text),
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &NodeId,
        prev_element: &NodeId,
        child: NodeOrText<NodeId>,
    ) {
        let has_parent = self.tree.borrow().nodes[element.0].parent.is_some();
        if has_parent {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(&self, _name: StrTendril, _public_id: StrTendril, _system_id: StrTendril) {}

    fn get_template_contents(&self, target: &NodeId) -> NodeId {
        *target
    }

    fn same_node(&self, x: &NodeId, y: &NodeId) -> bool {
        x == y
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn append_before_sibling(&self, sibling: &NodeId, new_node: NodeOrText<NodeId>) {
        self.tree.borrow_mut().insert_before(*sibling, new_node);
    }

    fn add_attrs_if_missing(&self, target: &NodeId, attrs: Vec<Attribute>) {
        let mut tree = self.tree.borrow_mut();
        if let NodeData::Element { attrs: existing, .. } = &mut tree.nodes[target.0].data {
            for attr in attrs {
                if !existing.iter().any(|a| a.name == attr.name) {
                    existing.push(attr);
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &NodeId) {
        self.tree.borrow_mut().detach(*target);
    }

    fn reparent_children(&self, node: &NodeId, new_parent: &NodeId) {
        let mut tree = self.tree.borrow_mut();
        let children = std::mem::take(&mut tree.nodes[node.0].children);
        for child in children {
            tree.nodes[child.0].parent = None;
            tree.append(*new_parent, child);
        }
    }
}

struct Writer<'a> {
    tree: &'a Tree,
    rewrite_href: &'a dyn Fn(&str) -> Option<String>,
}

impl Writer<'_> {
    /// `foreign` is true inside an SVG or MathML subtree.
    fn node(&self, id: NodeId, out: &mut String, foreign: bool) {
        let node = &self.tree.nodes[id.0];
        match &node.data {
            NodeData::Text(text) => escape_into(text, false, out),
            NodeData::Element { name, attrs } => self.element(name, attrs, &node.children, out, foreign),
            NodeData::Document | NodeData::Ignored => {}
        }
    }

    fn element(
        &self,
        name: &QualName,
        attrs: &[Attribute],
        children: &[NodeId],
        out: &mut String,
        foreign: bool,
    ) {
        let local: &str = &name.local;
        if !is_xml_name(local) {
            // Not representable; keep the content
            for &child in children {
                self.node(child, out, foreign);
            }
            return;
        }

        let is_html = name.ns == ns!(html);
        out.push('<');
        out.push_str(local);
        if !is_html && !foreign {
            out.push_str(" xmlns=\"");
            escape_into(&name.ns, true, out);
            out.push_str("\" xmlns:xlink=\"");
            out.push_str(XLINK_NS);
            out.push('"');
        }

        for attr in attrs {
            let Some(attr_name) = attribute_name(&attr.name) else {
                continue;
            };
            let mut value: Cow<'_, str> = Cow::Borrowed(&*attr.value);
            if is_html && local == "a" && attr_name == "href" {
                if let Some(rewritten) = (self.rewrite_href)(&attr.value) {
                    value = Cow::Owned(rewritten);
                }
            }
            out.push(' ');
            out.push_str(&attr_name);
            out.push_str("=\"");
            escape_into(&value, true, out);
            out.push('"');
        }

        if is_html && VOID_ELEMENTS.contains(&local) {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for &child in children {
            self.node(child, out, !is_html);
        }
        out.push_str("</");
        out.push_str(local);
        out.push('>');
    }
}

/// XML spelling of an attribute name, or `None` to drop it.
fn attribute_name(name: &QualName) -> Option<Cow<'_, str>> {
    let local: &str = &name.local;
    if !is_xml_name(local) || local.contains(':') {
        return None;
    }
    let namespace: &Namespace = &name.ns;
    if *namespace == ns!() {
        Some(Cow::Borrowed(local))
    } else if *namespace == ns!(xlink) {
        Some(Cow::Owned(format!("xlink:{local}")))
    } else if *namespace == ns!(xml) {
        Some(Cow::Owned(format!("xml:{local}")))
    } else {
        None
    }
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
}
