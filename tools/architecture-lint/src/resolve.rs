//! Resolve the paths a source file names to what they point at.
//!
//! Paths are resolved against the module that names them: `self` and
//! `super` follow inline `mod` blocks, child modules declared in scope are
//! local, and names brought in by `use` carry their resolved target. Any
//! other multi-segment path is rooted in an external crate.

use std::collections::{BTreeMap, BTreeSet};

use camino::Utf8Path;
use syn::visit::{self, Visit};

/// Library name of the checked crate, as written in absolute paths.
pub(crate) const CRATE_NAME: &str = "divedesk";

/// Where a named path points.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Target {
    /// An item of this crate, as segments below `crate`.
    Local(Vec<String>),
    /// Something in another crate, by crate root.
    External(String),
}

/// One resolved path together with how the file wrote it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Reference {
    pub(crate) written: String,
    pub(crate) target: Target,
}

/// Module path of a file relative to `backend/src`.
///
/// `outbound/memory/mod.rs` is `outbound::memory`; `lib.rs` and `main.rs`
/// are the crate root.
pub(crate) fn module_of(relative: &Utf8Path) -> Vec<String> {
    let mut segments: Vec<String> = relative
        .parent()
        .map(|dir| dir.components().map(|part| part.as_str().to_owned()).collect())
        .unwrap_or_default();
    match relative.file_stem() {
        None | Some("mod" | "lib" | "main") => {}
        Some(stem) => segments.push(stem.to_owned()),
    }
    segments
}

/// Every path `file` names, resolved from `module`.
pub(crate) fn references(module: Vec<String>, file: &syn::File) -> BTreeSet<Reference> {
    let mut collector = Collector {
        module,
        scopes: Vec::new(),
        found: BTreeSet::new(),
    };
    collector.module_items(&file.items);
    collector.found
}

#[derive(Debug, Default)]
struct Scope {
    children: BTreeSet<String>,
    aliases: BTreeMap<String, Target>,
}

struct Collector {
    module: Vec<String>,
    scopes: Vec<Scope>,
    found: BTreeSet<Reference>,
}

impl Collector {
    fn module_items(&mut self, items: &[syn::Item]) {
        let mut scope = Scope::default();
        for item in items {
            if let syn::Item::Mod(declared) = item {
                scope.children.insert(declared.ident.to_string());
            }
        }
        self.scopes.push(scope);
        for item in items {
            if let syn::Item::Use(import) = item {
                self.bind_aliases(&import.tree, Vec::new());
            }
        }
        for item in items {
            self.visit_item(item);
        }
        self.scopes.pop();
    }

    fn bind_aliases(&mut self, tree: &syn::UseTree, mut prefix: Vec<String>) {
        match tree {
            syn::UseTree::Path(step) => {
                prefix.push(step.ident.to_string());
                self.bind_aliases(&step.tree, prefix);
            }
            syn::UseTree::Name(leaf) => {
                let name = leaf.ident.to_string();
                if name == "self" {
                    if let Some(last) = prefix.last().cloned() {
                        self.bind(last, &prefix);
                    }
                } else {
                    prefix.push(name.clone());
                    self.bind(name, &prefix);
                }
            }
            syn::UseTree::Rename(renamed) => {
                let original = renamed.ident.to_string();
                if original != "self" {
                    prefix.push(original);
                }
                self.bind(renamed.rename.to_string(), &prefix);
            }
            syn::UseTree::Group(group) => {
                for branch in &group.items {
                    self.bind_aliases(branch, prefix.clone());
                }
            }
            syn::UseTree::Glob(_) => {}
        }
    }

    fn bind(&mut self, name: String, path: &[String]) {
        let Some(target) = self.resolve(path) else {
            return;
        };
        if let Some(scope) = self.scopes.last_mut() {
            scope.aliases.insert(name, target);
        }
    }

    fn record_use(&mut self, tree: &syn::UseTree, mut prefix: Vec<String>) {
        match tree {
            syn::UseTree::Path(step) => {
                prefix.push(step.ident.to_string());
                self.record_use(&step.tree, prefix);
            }
            syn::UseTree::Name(leaf) => {
                if leaf.ident != "self" {
                    prefix.push(leaf.ident.to_string());
                }
                self.record(&prefix);
            }
            syn::UseTree::Rename(renamed) => {
                if renamed.ident != "self" {
                    prefix.push(renamed.ident.to_string());
                }
                self.record(&prefix);
            }
            syn::UseTree::Glob(_) => self.record(&prefix),
            syn::UseTree::Group(group) => {
                for branch in &group.items {
                    self.record_use(branch, prefix.clone());
                }
            }
        }
    }

    fn record(&mut self, segments: &[String]) {
        if let Some(target) = self.resolve(segments) {
            self.found.insert(Reference {
                written: segments.join("::"),
                target,
            });
        }
    }

    fn resolve(&self, segments: &[String]) -> Option<Target> {
        let (first, rest) = segments.split_first()?;
        match first.as_str() {
            "crate" | CRATE_NAME => Some(Target::Local(rest.to_vec())),
            "self" => Some(Target::Local(self.below_module(rest))),
            "super" => self.above_module(segments),
            "Self" => None,
            name => {
                let scope = self.scopes.last();
                if scope.is_some_and(|scope| scope.children.contains(name)) {
                    return Some(Target::Local(self.below_module(segments)));
                }
                if let Some(bound) = scope.and_then(|scope| scope.aliases.get(name)) {
                    return Some(match bound {
                        Target::Local(base) => {
                            Target::Local(base.iter().chain(rest).cloned().collect())
                        }
                        Target::External(root) => Target::External(root.clone()),
                    });
                }
                // A lone name is a local item, a prelude name or a generic.
                (!rest.is_empty()).then(|| Target::External(name.to_owned()))
            }
        }
    }

    fn below_module(&self, rest: &[String]) -> Vec<String> {
        self.module.iter().chain(rest).cloned().collect()
    }

    fn above_module(&self, segments: &[String]) -> Option<Target> {
        let mut base = self.module.clone();
        let mut remaining = segments;
        while let Some((head, tail)) = remaining.split_first() {
            if head != "super" {
                break;
            }
            base.pop()?;
            remaining = tail;
        }
        base.extend(remaining.iter().cloned());
        Some(Target::Local(base))
    }
}

impl<'ast> Visit<'ast> for Collector {
    fn visit_item_use(&mut self, node: &'ast syn::ItemUse) {
        self.record_use(&node.tree, Vec::new());
    }

    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        if let Some((_, items)) = &node.content {
            self.module.push(node.ident.to_string());
            self.module_items(items);
            self.module.pop();
        }
    }

    fn visit_path(&mut self, node: &'ast syn::Path) {
        let segments: Vec<String> = node
            .segments
            .iter()
            .map(|segment| segment.ident.to_string())
            .collect();
        self.record(&segments);
        visit::visit_path(self, node);
    }
}
