//! Shorthand publish names.
//!
//! `created_test` and `test_created` both name `<default>.TestCreated`.
//! Words are separated by `_` and matched case-insensitively.

use std::sync::Arc;

use crate::registry::TopicRegistry;
use crate::topic::Topic;

/// Resolve a shorthand name to a topic in `category`.
///
/// Tries the leading words as entity and the last word as action first,
/// then the first word as action and the remaining words as entity.
pub fn resolve_shorthand(
    registry: &TopicRegistry,
    category: &str,
    name: &str,
) -> Option<Arc<Topic>> {
    let words: Vec<&str> = name.split('_').collect();
    let (first, rest) = words.split_first()?;
    let (last, init) = words.split_last()?;

    registry
        .lookup(category, &pascal_case(init), &capitalize(last))
        .or_else(|| registry.lookup(category, &pascal_case(rest), &capitalize(first)))
}

/// The canonical `action_entity` shorthand for a topic, e.g. `created_test`
/// for `testing.TestCreated`.
pub fn shorthand_for(topic: &Topic) -> String {
    let mut name = topic.action().to_lowercase();
    for word in split_pascal(topic.entity()) {
        name.push('_');
        name.push_str(&word.to_lowercase());
    }
    name
}

fn pascal_case(words: &[&str]) -> String {
    words.iter().map(|word| capitalize(word)).collect()
}

// First character upper, the rest lower.
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn split_pascal(entity: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut start = 0;
    for (index, ch) in entity.char_indices().skip(1) {
        if ch.is_uppercase() {
            words.push(&entity[start..index]);
            start = index;
        }
    }
    if start < entity.len() {
        words.push(&entity[start..]);
    }
    words
}
