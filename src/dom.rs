use std::collections::HashMap;

use crate::{Error, Result};

/// Index of a node inside a [`Dom`] arena. Ids stay valid for the lifetime
/// of the document; removing a node only detaches it from the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub(crate) enum NodeType {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) node_type: NodeType,
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) tag_name: String,
    pub(crate) attrs: HashMap<String, String>,
}

/// Arena-backed document tree. The document node is always `NodeId(0)`.
#[derive(Debug, Clone)]
pub struct Dom {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    pub(crate) id_index: HashMap<String, NodeId>,
}

impl Dom {
    pub(crate) fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            node_type: NodeType::Document,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            id_index: HashMap::new(),
        }
    }

    pub(crate) fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: String,
        attrs: HashMap<String, String>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        if let Some(element_id) = attrs.get("id") {
            self.id_index.entry(element_id.clone()).or_insert(id);
        }
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            node_type: NodeType::Element(Element { tag_name, attrs }),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            node_type: NodeType::Text(text),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub(crate) fn element(&self, node: NodeId) -> Option<&Element> {
        match &self.nodes.get(node.0)?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(node.0)?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent
    }

    pub(crate) fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|element| element.tag_name.as_str())
    }

    pub fn attr(&self, node: NodeId, key: &str) -> Option<&str> {
        self.element(node)?.attrs.get(key).map(String::as_str)
    }

    pub(crate) fn classes(&self, node: NodeId) -> Vec<&str> {
        self.attr(node, "class")
            .map(|value| value.split_ascii_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.classes(node).contains(&class)
    }

    /// Whether the node is still reachable from the document root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == self.root {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Document-order walk of all connected element nodes.
    pub(crate) fn elements_in_document_order(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if self.element(node).is_some() {
                out.push(node);
            }
            for child in self.children(node).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    pub(crate) fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.parent(child) != Some(parent) {
            return Err(Error::Runtime(
                "remove_child target is not a direct child".into(),
            ));
        }
        self.nodes[parent.0].children.retain(|id| *id != child);
        self.nodes[child.0].parent = None;
        self.rebuild_id_index();
        Ok(())
    }

    /// Detach a node from the tree. Removing an already-detached node is a
    /// no-op, matching DOM `Element.remove()` semantics.
    pub fn remove_node(&mut self, node: NodeId) -> Result<()> {
        if node == self.root {
            return Err(Error::Runtime("cannot remove document root".into()));
        }
        let Some(parent) = self.parent(node) else {
            return Ok(());
        };
        self.remove_child(parent, node)
    }

    fn rebuild_id_index(&mut self) {
        self.id_index.clear();
        for node in self.elements_in_document_order() {
            if let Some(element_id) = self.attr(node, "id") {
                let element_id = element_id.to_string();
                self.id_index.entry(element_id).or_insert(node);
            }
        }
    }

    pub(crate) fn by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index.get(id).copied()
    }

    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].node_type {
            NodeType::Text(text) => out.push_str(text),
            _ => {
                for child in self.children(node) {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    pub fn style_get(&self, node: NodeId, key: &str) -> Result<String> {
        let element = self
            .element(node)
            .ok_or_else(|| Error::Runtime("style target is not an element".into()))?;
        let decls = parse_style_declarations(element.attrs.get("style").map(String::as_str));
        let key = key.to_ascii_lowercase();
        Ok(decls
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.clone())
            .unwrap_or_default())
    }

    pub fn style_set(&mut self, node: NodeId, key: &str, value: &str) -> Result<()> {
        let element = self
            .element_mut(node)
            .ok_or_else(|| Error::Runtime("style target is not an element".into()))?;
        let mut decls = parse_style_declarations(element.attrs.get("style").map(String::as_str));
        let key = key.to_ascii_lowercase();
        let value = value.trim().to_string();
        if let Some(pos) = decls.iter().position(|(name, _)| *name == key) {
            decls[pos].1 = value;
        } else {
            decls.push((key, value));
        }
        element
            .attrs
            .insert("style".to_string(), serialize_style_declarations(&decls));
        Ok(())
    }

    /// Short opening-tag rendering, used in assertion failure messages.
    pub(crate) fn dump_node(&self, node: NodeId) -> String {
        match &self.nodes[node.0].node_type {
            NodeType::Document => "#document".to_string(),
            NodeType::Text(text) => format!("#text {text:?}"),
            NodeType::Element(element) => {
                let mut out = format!("<{}", element.tag_name);
                let mut attrs = element.attrs.iter().collect::<Vec<_>>();
                attrs.sort();
                for (key, value) in attrs {
                    out.push_str(&format!(" {key}={value:?}"));
                }
                out.push('>');
                out
            }
        }
    }
}

/// Parse an inline `style` attribute into an ordered declaration list.
/// Splitting is quote- and paren-aware so values like
/// `cubic-bezier(0.4, 0, 0.2, 1)` stay intact.
pub(crate) fn parse_style_declarations(style_attr: Option<&str>) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let Some(style_attr) = style_attr else {
        return out;
    };

    let bytes = style_attr.as_bytes();
    let mut start = 0usize;
    let mut i = 0usize;
    let mut paren_depth = 0isize;
    let mut quote: Option<u8> = None;

    while i < bytes.len() {
        let ch = bytes[i];
        match (quote, ch) {
            (Some(q), _) if ch == q => quote = None,
            (Some(_), _) => {}
            (None, b'\'') | (None, b'"') => quote = Some(ch),
            (None, b'(') => paren_depth += 1,
            (None, b')') => paren_depth = paren_depth.saturating_sub(1),
            (None, b';') if paren_depth == 0 => {
                push_style_declaration(&style_attr[start..i], &mut out);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    push_style_declaration(&style_attr[start..], &mut out);

    out
}

fn push_style_declaration(raw_decl: &str, out: &mut Vec<(String, String)>) {
    let decl = raw_decl.trim();
    if decl.is_empty() {
        return;
    }
    let Some(colon) = decl.find(':') else {
        return;
    };
    let name = decl[..colon].trim().to_ascii_lowercase();
    if name.is_empty() {
        return;
    }
    let value = decl[colon + 1..].trim().to_string();
    if let Some(pos) = out.iter().position(|(existing, _)| existing == &name) {
        out[pos].1 = value;
    } else {
        out.push((name, value));
    }
}

pub(crate) fn serialize_style_declarations(decls: &[(String, String)]) -> String {
    let mut out = String::new();
    for (idx, (name, value)) in decls.iter().enumerate() {
        if idx > 0 {
            out.push(' ');
        }
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push(';');
    }
    out
}
