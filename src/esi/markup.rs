//! Markup tree used by the ESI processor.
//!
//! The document is parsed with `quick-xml` into an arena of nodes. Every
//! node keeps the exact source bytes it was parsed from, so serializing an
//! unmodified region reproduces the input byte-for-byte. Node IDs are arena
//! indices and stay valid while other nodes are replaced or removed.
//!
//! Parsing is lenient enough for HTML: end-tag names are not checked, an
//! end tag closes the nearest open element with the same name (elements
//! left open in between simply stay unclosed), and stray end tags are kept
//! as opaque nodes.

use std::fmt;

use bytes::{Bytes, BytesMut};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::directive::DirectiveKind;

/// Index of a node in a [`Document`].
pub type NodeId = usize;

/// The synthetic root every top-level node hangs off.
const ROOT: NodeId = 0;

/// Errors produced while parsing markup.
#[derive(Debug)]
pub enum MarkupError {
    /// The document is not well-formed enough to tokenize.
    Syntax {
        position: usize,
        source: quick_xml::Error,
    },
    /// Attributes of an ESI directive could not be read.
    Attribute {
        position: usize,
        source: quick_xml::events::attributes::AttrError,
    },
    /// An attribute value is not valid UTF-8 or contains a bad entity.
    AttributeValue { position: usize, message: String },
}

impl fmt::Display for MarkupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkupError::Syntax { position, source } => {
                write!(f, "markup syntax error at byte {}: {}", position, source)
            }
            MarkupError::Attribute { position, source } => {
                write!(f, "malformed attributes at byte {}: {}", position, source)
            }
            MarkupError::AttributeValue { position, message } => {
                write!(f, "invalid attribute value at byte {}: {}", position, message)
            }
        }
    }
}

impl std::error::Error for MarkupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MarkupError::Syntax { source, .. } => Some(source),
            MarkupError::Attribute { source, .. } => Some(source),
            MarkupError::AttributeValue { .. } => None,
        }
    }
}

#[derive(Debug)]
enum NodeKind {
    Root,
    /// Opaque source bytes: text, comments, CDATA, declarations, stray end tags.
    Raw(Bytes),
    Element {
        name: Bytes,
        open: Bytes,
        close: Option<Bytes>,
        directive: Option<DirectiveKind>,
        /// `src` attribute, only read for `esi:include`.
        src: Option<String>,
    },
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parsed markup document.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    source_len: usize,
}

impl Document {
    /// Parse `source` into a document tree.
    pub fn parse(source: Bytes) -> Result<Self, MarkupError> {
        let mut doc = Document {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
            source_len: source.len(),
        };

        let mut reader = Reader::from_reader(source.as_ref());
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        let mut buf = Vec::new();
        let mut open: Vec<NodeId> = vec![ROOT];

        loop {
            let start = reader.buffer_position() as usize;
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|source| MarkupError::Syntax {
                    position: start,
                    source,
                })?;
            let end = reader.buffer_position() as usize;
            let raw = source.slice(start..end);
            let parent = open.last().copied().unwrap_or(ROOT);

            match event {
                Event::Start(ref e) => {
                    let id = doc.push_element(parent, e, raw, start)?;
                    open.push(id);
                }
                Event::Empty(ref e) => {
                    doc.push_element(parent, e, raw, start)?;
                }
                Event::End(ref e) => {
                    let name = e.name();
                    let matching = open
                        .iter()
                        .rposition(|&id| doc.element_name(id) == Some(name.as_ref()));

                    match matching {
                        Some(pos) if pos > 0 => {
                            let id = open[pos];
                            open.truncate(pos);
                            if let NodeKind::Element { close, .. } = &mut doc.nodes[id].kind {
                                *close = Some(raw);
                            }
                        }
                        _ => {
                            doc.push(parent, NodeKind::Raw(raw));
                        }
                    }
                }
                Event::Eof => break,
                _ => {
                    doc.push(parent, NodeKind::Raw(raw));
                }
            }

            buf.clear();
        }

        Ok(doc)
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    fn push_element(
        &mut self,
        parent: NodeId,
        start: &BytesStart<'_>,
        raw: Bytes,
        position: usize,
    ) -> Result<NodeId, MarkupError> {
        let name = start.name();
        let directive = DirectiveKind::from_name(name.as_ref());

        let src = match directive {
            Some(DirectiveKind::Include) => read_src(start, position)?,
            _ => None,
        };

        Ok(self.push(
            parent,
            NodeKind::Element {
                name: Bytes::copy_from_slice(name.as_ref()),
                open: raw,
                close: None,
                directive,
                src,
            },
        ))
    }

    fn element_name(&self, id: NodeId) -> Option<&[u8]> {
        match &self.nodes[id].kind {
            NodeKind::Element { name, .. } => Some(name.as_ref()),
            _ => None,
        }
    }

    /// Directive kind of a node, if it is an ESI directive.
    pub fn directive(&self, id: NodeId) -> Option<DirectiveKind> {
        match &self.nodes[id].kind {
            NodeKind::Element { directive, .. } => *directive,
            _ => None,
        }
    }

    /// `src` attribute of an `esi:include` node.
    pub fn include_src(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element { src, .. } => src.as_deref(),
            _ => None,
        }
    }

    /// Find all attached directives of `kind` in document (pre-)order.
    ///
    /// The result is a snapshot: callers that mutate the tree while walking
    /// it should re-check [`is_attached`](Self::is_attached).
    pub fn find(&self, kind: DirectiveKind) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![ROOT];

        while let Some(id) = stack.pop() {
            if self.directive(id) == Some(kind) {
                found.push(id);
            }
            stack.extend(self.nodes[id].children.iter().rev());
        }

        found
    }

    /// Check whether `id` is still reachable from the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == ROOT {
                return true;
            }
            match self.nodes.get(current).and_then(|n| n.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Replace a node (and its whole subtree) with a text node.
    ///
    /// The text is inserted verbatim; it is not parsed for directives.
    pub fn replace_with_text(&mut self, id: NodeId, text: Bytes) -> NodeId {
        let Some(parent) = self.detach_parent(id) else {
            return id;
        };

        let replacement = self.nodes.len();
        self.nodes.push(Node {
            kind: NodeKind::Raw(text),
            parent: Some(parent),
            children: Vec::new(),
        });

        for child in self.nodes[parent].children.iter_mut() {
            if *child == id {
                *child = replacement;
            }
        }

        replacement
    }

    /// Remove a node and its whole subtree from the document.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.detach_parent(id) {
            self.nodes[parent].children.retain(|&child| child != id);
        }
    }

    fn detach_parent(&mut self, id: NodeId) -> Option<NodeId> {
        if id == ROOT {
            return None;
        }
        self.nodes.get_mut(id).and_then(|node| node.parent.take())
    }

    /// Serialize the document back to bytes.
    pub fn serialize(&self) -> Bytes {
        enum Step {
            Enter(NodeId),
            Close(NodeId),
        }

        let mut out = BytesMut::with_capacity(self.source_len);
        let mut stack = vec![Step::Enter(ROOT)];

        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(id) => {
                    let node = &self.nodes[id];
                    match &node.kind {
                        NodeKind::Root => {}
                        NodeKind::Raw(bytes) => out.extend_from_slice(bytes),
                        NodeKind::Element { open, .. } => out.extend_from_slice(open),
                    }
                    stack.push(Step::Close(id));
                    stack.extend(node.children.iter().rev().map(|&c| Step::Enter(c)));
                }
                Step::Close(id) => {
                    if let NodeKind::Element {
                        close: Some(close), ..
                    } = &self.nodes[id].kind
                    {
                        out.extend_from_slice(close);
                    }
                }
            }
        }

        out.freeze()
    }
}

/// Read and unescape the `src` attribute of a start tag.
fn read_src(start: &BytesStart<'_>, position: usize) -> Result<Option<String>, MarkupError> {
    for attr in start.html_attributes() {
        let attr = attr.map_err(|source| MarkupError::Attribute { position, source })?;
        if attr.key.as_ref() != b"src" {
            continue;
        }

        let value = std::str::from_utf8(&attr.value).map_err(|e| {
            MarkupError::AttributeValue {
                position,
                message: e.to_string(),
            }
        })?;
        let value = quick_xml::escape::unescape(value).map_err(|e| {
            MarkupError::AttributeValue {
                position,
                message: e.to_string(),
            }
        })?;

        return Ok(Some(value.into_owned()));
    }

    Ok(None)
}
