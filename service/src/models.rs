//! Rows persisted by the site.

use askama_escape::{escape, Html};
use chrono::NaiveDateTime;

/// HTML-escape text before it is stored.
#[must_use]
pub fn escape_html(text: &str) -> String {
    escape(text, Html).to_string()
}

/// A recorded site visit.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Visitor {
    pub pk: i32,
    pub country: Option<String>,
    pub browser: Option<String>,
    pub operating_system: Option<String>,
    pub date_visited: NaiveDateTime,
}

/// Visit details captured from a request, ready to store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVisitor {
    pub country: String,
    pub browser: String,
    pub operating_system: String,
}

/// A documentation article listed on the home page.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Document {
    pub pk: i32,
    pub title: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
}

impl Document {
    /// CSS class used to tag the document's category on the page.
    #[must_use]
    pub fn category_class(&self) -> &'static str {
        match self.category.as_deref() {
            Some("Azure Technical Overviews") => "is-info",
            Some("Azure Whitepapers") => "is-dark",
            Some("Azure Best Practices") => "is-warning",
            _ => "is-light",
        }
    }
}

/// A document row to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub title: String,
    pub url: String,
    pub category: String,
}
