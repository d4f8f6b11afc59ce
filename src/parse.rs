use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use tree_sitter::{Node, Parser, Tree};

use crate::error::ParseFailure;

/// Read-only view of a source file's bytes.
pub struct SourceFile {
    mmap: Mmap,
}

impl SourceFile {
    /// Map a file for parsing. Empty files yield `None`.
    pub fn open(path: &Path) -> Result<Option<Self>> {
        let file =
            File::open(path).with_context(|| format!("Failed to open source: {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("Failed to stat source: {}", path.display()))?
            .len();
        if len == 0 {
            return Ok(None);
        }
        // SAFETY: The file is opened read-only and the map is dropped before the
        // scan finishes with this file.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to mmap source: {}", path.display()))?;
        if mmap.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(Self { mmap }))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }
}

/// A successfully parsed tree plus the bytes it points into.
pub struct SyntaxTree<'src> {
    tree: Tree,
    source: &'src [u8],
}

impl<'src> SyntaxTree<'src> {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// True when the file holds nothing but the opening tag or inline text.
    pub fn is_empty(&self) -> bool {
        let root = self.root();
        let mut cursor = root.walk();
        root.named_children(&mut cursor).all(|child| {
            matches!(
                child.kind(),
                "php_tag" | "text" | "text_interpolation" | "comment"
            )
        })
    }

    pub fn text(&self, node: &Node<'_>) -> String {
        String::from_utf8_lossy(&self.source[node.byte_range()]).into_owned()
    }
}

pub struct SourceParser {
    parser: Parser,
}

impl SourceParser {
    pub fn new() -> Result<Self, ParseFailure> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_php::LANGUAGE_PHP.into())
            .map_err(|e| ParseFailure::Language(e.to_string()))?;
        Ok(Self { parser })
    }

    /// Parse one file. Trees containing error or missing nodes are rejected
    /// so a broken file contributes nothing rather than partial matches.
    pub fn parse<'src>(&mut self, source: &'src [u8]) -> Result<SyntaxTree<'src>, ParseFailure> {
        let tree = self.parser.parse(source, None).ok_or(ParseFailure::NoTree)?;
        let root = tree.root_node();
        if root.has_error() {
            let line = first_error_line(root).unwrap_or(root.start_position().row) + 1;
            return Err(ParseFailure::Syntax { line });
        }
        Ok(SyntaxTree { tree, source })
    }
}

fn first_error_line(root: Node<'_>) -> Option<usize> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node.start_position().row);
        }
        if !node.has_error() {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}
