//! Single-pass matching of class declarations against target interfaces.
//!
//! One [`ImplementorFinder`] is shared by every worker of a scan. Each call to
//! [`ImplementorFinder::visit`] walks one file's tree with its own namespace
//! context, collects matches locally, and appends them to the shared index
//! under a single lock.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tree_sitter::Node;

use crate::error::DiscoveryError;
use crate::parse::SyntaxTree;

const NAMESPACE_DEFINITION: &str = "namespace_definition";
const CLASS_DECLARATION: &str = "class_declaration";
const INTERFACE_CLAUSE: &str = "class_interface_clause";

/// Target interface name -> fully-qualified implementor names.
///
/// Names are appended in completion order and duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImplementorIndex {
    entries: HashMap<String, Vec<String>>,
}

impl ImplementorIndex {
    pub fn implementors(&self, interface: &str) -> &[String] {
        self.entries
            .get(interface)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn total(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    fn ensure(&mut self, interface: &str) {
        self.entries.entry(interface.to_string()).or_default();
    }

    fn append(&mut self, interface: &str, class_name: String) {
        self.entries
            .entry(interface.to_string())
            .or_default()
            .push(class_name);
    }

    fn shrink(&mut self) {
        for list in self.entries.values_mut() {
            list.shrink_to_fit();
        }
        self.entries.shrink_to_fit();
    }
}

#[derive(Debug, Default)]
pub struct ImplementorFinder {
    targets: Vec<String>,
    index: Mutex<ImplementorIndex>,
}

impl ImplementorFinder {
    pub fn new(targets: &[String]) -> Self {
        let mut index = ImplementorIndex::default();
        for target in targets {
            index.ensure(target);
        }
        Self {
            targets: targets.to_vec(),
            index: Mutex::new(index),
        }
    }

    /// Single-interface shorthand for callers that only track one target.
    pub fn for_interface(interface: impl Into<String>) -> Self {
        Self::new(&[interface.into()])
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Walk one file and record every class implementing a target.
    ///
    /// Returns the number of (interface, class) pairs recorded.
    pub fn visit(&self, tree: &SyntaxTree<'_>) -> Result<usize, DiscoveryError> {
        let mut namespace = String::new();
        let mut found: Vec<(usize, String)> = Vec::new();

        let root = tree.root();
        let mut cursor = root.walk();
        'walk: loop {
            let node = cursor.node();
            match node.kind() {
                NAMESPACE_DEFINITION => namespace = namespace_name(tree, &node),
                CLASS_DECLARATION => self.enter_class(tree, &node, &namespace, &mut found)?,
                _ => {}
            }

            if cursor.goto_first_child() {
                continue;
            }
            while !cursor.goto_next_sibling() {
                if !cursor.goto_parent() {
                    break 'walk;
                }
            }
        }

        let recorded = found.len();
        if recorded > 0 {
            let mut index = self.lock();
            for (target, class_name) in found {
                index.append(&self.targets[target], class_name);
            }
        }
        Ok(recorded)
    }

    pub fn implementors(&self, interface: &str) -> Vec<String> {
        self.lock().implementors(interface).to_vec()
    }

    pub fn snapshot(&self) -> ImplementorIndex {
        self.lock().clone()
    }

    pub fn into_index(self) -> ImplementorIndex {
        self.index
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Release spare capacity held by the accumulated lists.
    pub fn reclaim(&self) {
        self.lock().shrink();
    }

    fn enter_class(
        &self,
        tree: &SyntaxTree<'_>,
        node: &Node<'_>,
        namespace: &str,
        found: &mut Vec<(usize, String)>,
    ) -> Result<(), DiscoveryError> {
        let Some(clause) = interface_clause(node) else {
            return Ok(());
        };
        let Some(name) = node.child_by_field_name("name") else {
            return Ok(());
        };
        if self.targets.is_empty() {
            return Err(DiscoveryError::EmptyInterfaceSet);
        }

        let class_name = format!("{namespace}\\{}", tree.text(&name));
        for implemented in implemented_names(tree, &clause) {
            for (idx, target) in self.targets.iter().enumerate() {
                if target.is_empty() {
                    return Err(DiscoveryError::EmptyInterfaceName);
                }
                if interface_matches(&implemented, target) {
                    found.push((idx, class_name.clone()));
                }
            }
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ImplementorIndex> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `implemented` matches when equal to `target` or when it ends in
/// `\<target>`.
pub fn interface_matches(implemented: &str, target: &str) -> bool {
    implemented == target
        || implemented
            .strip_suffix(target)
            .is_some_and(|prefix| prefix.ends_with('\\'))
}

fn namespace_name(tree: &SyntaxTree<'_>, node: &Node<'_>) -> String {
    node.child_by_field_name("name")
        .map(|name| strip_whitespace(&tree.text(&name)))
        .unwrap_or_default()
}

fn interface_clause<'tree>(node: &Node<'tree>) -> Option<Node<'tree>> {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .find(|child| child.kind() == INTERFACE_CLAUSE)
}

fn implemented_names(tree: &SyntaxTree<'_>, clause: &Node<'_>) -> Vec<String> {
    let mut cursor = clause.walk();
    clause
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .map(|child| {
            strip_whitespace(&tree.text(&child))
                .trim_start_matches('\\')
                .to_string()
        })
        .filter(|name| !name.is_empty())
        .collect()
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}
