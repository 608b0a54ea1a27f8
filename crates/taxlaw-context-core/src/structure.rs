//! Outline construction from the flat element stream.
//!
//! Elements arrive in document order. A stack of open headings decides
//! each element's parent: anything at the same or a deeper level than the
//! incoming element is closed first. Only headings are ever pushed, so
//! paragraphs and list items attach to the nearest open heading and never
//! parent anything themselves.
//!
//! The tree is assembled in an index arena first. Page ranges are then
//! resolved with an explicit post-order walk and the owned
//! [`StructureNode`] tree is materialized last, so deeply nested legal
//! outlines never recurse on the call stack.

use crate::models::{ElementKind, PageRange, StructuralElement, StructureNode};

struct ArenaNode<'a> {
    element: &'a StructuralElement,
    parent: Option<usize>,
    next_sibling: Option<usize>,
    children: Vec<usize>,
    section_path: Vec<String>,
    page_range: PageRange,
}

/// Build the outline for `elements`, truncating section titles to
/// `section_title_chars` characters.
pub fn build_tree(elements: &[StructuralElement], section_title_chars: usize) -> Vec<StructureNode> {
    let mut arena: Vec<ArenaNode<'_>> = Vec::with_capacity(elements.len());
    let mut roots: Vec<usize> = Vec::new();
    let mut open: Vec<(usize, u8)> = Vec::new();

    for element in elements {
        while matches!(open.last(), Some(&(_, level)) if level >= element.level) {
            open.pop();
        }
        let parent = open.last().map(|&(idx, _)| idx);
        let mut section_path = parent
            .map(|p| arena[p].section_path.clone())
            .unwrap_or_default();
        if element.kind == ElementKind::Heading {
            section_path.push(section_title(&element.text, section_title_chars));
        }

        let idx = arena.len();
        arena.push(ArenaNode {
            element,
            parent,
            next_sibling: None,
            children: Vec::new(),
            section_path,
            page_range: PageRange::single(element.page_number),
        });
        let siblings = match parent {
            Some(p) => &mut arena[p].children,
            None => &mut roots,
        };
        let previous = siblings.last().copied();
        siblings.push(idx);
        if let Some(prev) = previous {
            arena[prev].next_sibling = Some(idx);
        }
        if element.kind == ElementKind::Heading {
            open.push((idx, element.level));
        }
    }

    assign_page_ranges(&mut arena, &roots);
    let tree = materialize(arena, &roots);

    tracing::debug!(roots = tree.len(), nodes = elements.len(), "outline built");
    tree
}

/// Resolve every node's `page_range` children-first.
///
/// A leaf runs up to the page before its next sibling starts (never
/// before its own page); the last sibling ends on its own page. An
/// internal node ends where its last child ends.
fn assign_page_ranges(arena: &mut [ArenaNode<'_>], roots: &[usize]) {
    let mut stack: Vec<(usize, bool)> = roots.iter().rev().map(|&r| (r, false)).collect();

    while let Some((idx, expanded)) = stack.pop() {
        if !expanded {
            stack.push((idx, true));
            for &child in arena[idx].children.iter().rev() {
                stack.push((child, false));
            }
            continue;
        }

        let own = arena[idx].element.page_number;
        let end = match arena[idx].children.last() {
            Some(&last) => arena[last].page_range.end.max(own),
            None => arena[idx]
                .next_sibling
                .map(|next| arena[next].element.page_number.saturating_sub(1).max(own))
                .unwrap_or(own),
        };
        arena[idx].page_range = PageRange { start: own, end };
    }
}

/// Convert the arena into owned nodes. Children always have larger arena
/// indices than their parent, so walking indices in reverse builds every
/// subtree before it is adopted.
fn materialize(arena: Vec<ArenaNode<'_>>, roots: &[usize]) -> Vec<StructureNode> {
    let mut built: Vec<Option<StructureNode>> = Vec::with_capacity(arena.len());
    built.resize_with(arena.len(), || None);

    for idx in (0..arena.len()).rev() {
        let node = &arena[idx];
        let children = node
            .children
            .iter()
            .filter_map(|&c| built[c].take())
            .collect();
        built[idx] = Some(StructureNode {
            id: node_id(idx),
            kind: node.element.kind,
            level: node.element.level,
            text: node.element.text.clone(),
            page_number: node.element.page_number,
            page_range: node.page_range,
            children,
            parent_id: node.parent.map(node_id),
            section_path: node.section_path.clone(),
            numbering: node.element.numbering.clone(),
        });
    }

    roots.iter().filter_map(|&r| built[r].take()).collect()
}

fn node_id(idx: usize) -> String {
    format!("node-{}", idx)
}

fn section_title(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or(text).trim();
    first_line.chars().take(max_chars).collect::<String>().trim_end().to_string()
}

/// Pre-order flattening of the outline, i.e. document order.
pub fn flatten(roots: &[StructureNode]) -> Vec<&StructureNode> {
    let mut out = Vec::new();
    let mut stack: Vec<&StructureNode> = roots.iter().rev().collect();
    while let Some(node) = stack.pop() {
        out.push(node);
        stack.extend(node.children.iter().rev());
    }
    out
}
