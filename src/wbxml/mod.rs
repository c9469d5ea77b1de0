//! WBXML wire codec
//!
//! ActiveSync frames every command and response as WBXML: a tokenized
//! binary XML stream where each element tag is a one-byte token scoped
//! to the active code page. This module is pure — bytes in, tree out —
//! with no network or business logic:
//!
//! - [`pages`] — code-page and tag-token tables
//! - [`Writer`] — encodes a command tree to wire bytes
//! - [`decode`] — parses wire bytes into a [`Node`] tree
//!
//! Higher layers (`proto`) project [`Node`] trees into typed responses.

pub mod pages;

mod decode;
mod encode;

pub use decode::decode;
pub use encode::Writer;

/// One element of a decoded WBXML document.
///
/// An element either has children or carries a scalar payload (inline
/// string or opaque bytes); ActiveSync never mixes the two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub page: u8,
    pub token: u8,
    pub children: Vec<Node>,
    pub text: Option<String>,
    pub opaque: Option<Vec<u8>>,
}

impl Node {
    #[must_use]
    pub const fn new(page: u8, token: u8) -> Self {
        Self {
            page,
            token,
            children: Vec::new(),
            text: None,
            opaque: None,
        }
    }

    /// Whether this node is the element `(page, token)`.
    #[must_use]
    pub fn is(&self, page: u8, token: u8) -> bool {
        self.page == page && self.token == token
    }

    /// First direct child matching `(page, token)`.
    #[must_use]
    pub fn find(&self, page: u8, token: u8) -> Option<&Self> {
        self.children.iter().find(|c| c.is(page, token))
    }

    /// All direct children matching `(page, token)`.
    pub fn find_all(&self, page: u8, token: u8) -> impl Iterator<Item = &Self> {
        self.children.iter().filter(move |c| c.is(page, token))
    }

    /// Scalar payload of this node, decoding opaque bytes as UTF-8.
    #[must_use]
    pub fn value(&self) -> Option<String> {
        self.text.clone().or_else(|| {
            self.opaque
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).into_owned())
        })
    }

    /// Scalar payload of the first child matching `(page, token)`.
    #[must_use]
    pub fn child_text(&self, page: u8, token: u8) -> Option<String> {
        self.find(page, token).and_then(Self::value)
    }

    /// Child payload parsed as an integer (ActiveSync status codes and
    /// counters are decimal strings on the wire).
    #[must_use]
    pub fn child_u32(&self, page: u8, token: u8) -> Option<u32> {
        self.child_text(page, token).and_then(|s| s.parse().ok())
    }
}
