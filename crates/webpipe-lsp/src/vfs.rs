//! Virtual File System for document management.
//!
//! The VFS holds the latest text and version of every open document.
//! Analyses live in the [`DocumentCache`](crate::db::DocumentCache), keyed
//! by the same URI and version.

use lsp_types::Uri;
use ropey::Rope;
use std::collections::HashMap;

/// A document in the virtual file system.
#[derive(Debug)]
pub struct Document {
    /// The document content as a rope.
    content: Rope,
    /// The version reported by the editor.
    version: i32,
}

impl Document {
    /// Create a new document with the given content.
    pub fn new(content: &str, version: i32) -> Self {
        Self {
            content: Rope::from_str(content),
            version,
        }
    }

    /// Get the document content as a string.
    pub fn text(&self) -> String {
        self.content.to_string()
    }

    /// Get the document version.
    pub const fn version(&self) -> i32 {
        self.version
    }

    /// Replace the document content.
    pub fn update(&mut self, content: &str, version: i32) {
        self.content = Rope::from_str(content);
        self.version = version;
    }
}

/// Virtual file system for managing open documents.
#[derive(Debug, Default)]
pub struct Vfs {
    /// Open documents indexed by URI.
    documents: HashMap<Uri, Document>,
}

#[allow(clippy::mutable_key_type)] // Uri is the document identity used by the protocol
impl Vfs {
    /// Create a new empty VFS.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a document in the VFS.
    pub fn open(&mut self, uri: Uri, content: &str, version: i32) {
        self.documents.insert(uri, Document::new(content, version));
    }

    /// Close a document in the VFS.
    pub fn close(&mut self, uri: &Uri) {
        self.documents.remove(uri);
    }

    /// Get a document by URI.
    pub fn get(&self, uri: &Uri) -> Option<&Document> {
        self.documents.get(uri)
    }

    /// Text and version of a document.
    pub fn snapshot(&self, uri: &Uri) -> Option<(String, i32)> {
        self.documents.get(uri).map(|d| (d.text(), d.version()))
    }

    /// Update a document's content. Unknown documents are opened.
    pub fn update(&mut self, uri: &Uri, content: &str, version: i32) {
        match self.documents.get_mut(uri) {
            Some(doc) => doc.update(content, version),
            None => self.open(uri.clone(), content, version),
        }
    }

    /// Get all open document URIs.
    pub fn uris(&self) -> impl Iterator<Item = &Uri> {
        self.documents.keys()
    }
}
