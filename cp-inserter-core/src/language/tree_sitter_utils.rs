use tree_sitter::Node;

pub fn find_child_by_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    let result = node
        .children(&mut cursor)
        .find(|child| child.kind() == kind);
    result
}

/// Text of a node, `None` if it is not valid UTF-8
pub fn node_text<'s>(node: Node<'_>, source: &'s [u8]) -> Option<&'s str> {
    node.utf8_text(source).ok()
}

/// Innermost declarator of a wrapping declarator node.
///
/// Pointer and function declarators name it in a `declarator` field;
/// reference and parenthesized declarators only have it as a named child.
pub fn inner_declarator(node: Node<'_>) -> Option<Node<'_>> {
    if let Some(inner) = node.child_by_field_name("declarator") {
        return Some(inner);
    }
    let mut cursor = node.walk();
    let mut found = None;
    for child in node.named_children(&mut cursor) {
        if child.kind() != "attribute_declaration" && child.kind() != "ms_call_modifier" {
            found = Some(child);
        }
    }
    found
}
