//! Property-based test generators.
//!
//! Strategies for `book` documents whose indexed fields are drawn from
//! small alphabets, so generated sets collide on index values often.

use crate::fixtures::book;
use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;
use serde_json::Value;

/// Categories a generated book may carry.
pub const CATEGORIES: [&str; 3] = ["thriller", "scifi", "poetry"];

/// Authors a generated book may carry.
pub const AUTHORS: [&str; 3] = ["Larsson", "Le Guin", "Lem"];

/// A generated book before it becomes a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSpec {
    /// Logical id.
    pub isbn: String,
    /// `category.name`.
    pub category: Option<String>,
    /// `author.name`.
    pub author: Option<String>,
    /// `rating`, a single digit so string order is numeric order.
    pub rating: Option<String>,
}

impl BookSpec {
    /// Builds the document.
    pub fn document(&self) -> Value {
        book(
            &self.isbn,
            self.category.as_deref(),
            self.author.as_deref(),
            self.rating.as_deref(),
        )
    }

    /// Same fields under another id.
    #[must_use]
    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = isbn.into();
        self
    }
}

/// Generates an optional category.
pub fn arb_category() -> impl Strategy<Value = Option<String>> {
    option::of(prop::sample::select(CATEGORIES.to_vec()).prop_map(str::to_owned))
}

/// Generates an optional author.
pub fn arb_author() -> impl Strategy<Value = Option<String>> {
    option::of(prop::sample::select(AUTHORS.to_vec()).prop_map(str::to_owned))
}

/// Generates an optional single-digit rating.
pub fn arb_rating() -> impl Strategy<Value = Option<String>> {
    option::of((0u8..10).prop_map(|r| r.to_string()))
}

/// Generates a book with the given id.
pub fn arb_book(isbn: impl Into<String>) -> impl Strategy<Value = BookSpec> {
    let isbn = isbn.into();
    (arb_category(), arb_author(), arb_rating()).prop_map(move |(category, author, rating)| {
        BookSpec {
            isbn: isbn.clone(),
            category,
            author,
            rating,
        }
    })
}

/// Generates up to `max` books with distinct ids.
pub fn arb_books(max: usize) -> impl Strategy<Value = Vec<BookSpec>> {
    vec(arb_book(""), 0..=max).prop_map(|books| {
        books
            .into_iter()
            .enumerate()
            .map(|(i, b)| b.with_isbn(format!("isbn-{i:03}")))
            .collect()
    })
}

/// Generates an old and a new image of the same book.
pub fn arb_update() -> impl Strategy<Value = (BookSpec, BookSpec)> {
    (arb_book("isbn-000"), arb_book("isbn-000"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    proptest! {
        #[test]
        fn books_have_distinct_ids(books in arb_books(20)) {
            let ids: HashSet<_> = books.iter().map(|b| b.isbn.clone()).collect();
            prop_assert_eq!(ids.len(), books.len());
        }

        #[test]
        fn update_keeps_id((old, new) in arb_update()) {
            prop_assert_eq!(old.isbn, new.isbn);
        }

        #[test]
        fn document_mirrors_spec(spec in arb_book("1")) {
            let doc = spec.document();
            prop_assert_eq!(doc["isbn"].as_str(), Some("1"));
            prop_assert_eq!(doc.get("rating").and_then(Value::as_str), spec.rating.as_deref());
        }
    }
}
