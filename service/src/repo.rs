//! Repository for visitor and document persistence.
//!
//! Writes go through the `insert_visitor` and `insert_azure_document` stored
//! functions created by the migrations; reads are plain queries.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::{Document, NewDocument, NewVisitor};

/// Error types for repository operations
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait SiteRepo: Send + Sync {
    async fn save_visitor(&self, visitor: &NewVisitor) -> Result<(), RepoError>;

    async fn save_document(&self, document: &NewDocument) -> Result<(), RepoError>;

    async fn list_documents(&self) -> Result<Vec<Document>, RepoError>;

    async fn count_documents(&self) -> Result<i64, RepoError>;
}

/// `PostgreSQL` implementation of [`SiteRepo`].
#[derive(Clone)]
pub struct PgSiteRepo {
    pool: PgPool,
}

impl PgSiteRepo {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SiteRepo for PgSiteRepo {
    async fn save_visitor(&self, visitor: &NewVisitor) -> Result<(), RepoError> {
        sqlx::query("SELECT insert_visitor($1, $2, $3)")
            .bind(&visitor.country)
            .bind(&visitor.browser)
            .bind(&visitor.operating_system)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn save_document(&self, document: &NewDocument) -> Result<(), RepoError> {
        sqlx::query("SELECT insert_azure_document($1, $2, $3)")
            .bind(&document.title)
            .bind(&document.url)
            .bind(&document.category)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_documents(&self) -> Result<Vec<Document>, RepoError> {
        let documents = sqlx::query_as::<_, Document>(
            r"
            SELECT pk, title, url, category
            FROM azure_document
            ORDER BY pk
            ",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(documents)
    }

    async fn count_documents(&self) -> Result<i64, RepoError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM azure_document")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
pub mod mock {
    //! Mock implementation for unit testing.

    use super::{Document, NewDocument, NewVisitor, RepoError, SiteRepo};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// In-memory [`SiteRepo`] that records writes.
    ///
    /// Use `fail_visitor_writes` / `fail_document_reads` to simulate outages.
    #[derive(Default)]
    pub struct MockSiteRepo {
        visitors: Mutex<Vec<NewVisitor>>,
        documents: Mutex<Vec<Document>>,
        fail_visitor_writes: bool,
        fail_document_reads: bool,
    }

    impl MockSiteRepo {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed the repo with documents titled from `titles`.
        pub fn with_documents(titles: &[(&str, &str)]) -> Self {
            let repo = Self::new();
            for (title, category) in titles {
                repo.push_document(title, category);
            }
            repo
        }

        #[must_use]
        pub fn fail_visitor_writes(mut self) -> Self {
            self.fail_visitor_writes = true;
            self
        }

        #[must_use]
        pub fn fail_document_reads(mut self) -> Self {
            self.fail_document_reads = true;
            self
        }

        fn push_document(&self, title: &str, category: &str) {
            let mut documents = self.documents.lock().unwrap();
            let pk = i32::try_from(documents.len()).unwrap() + 1;
            documents.push(Document {
                pk,
                title: Some(title.to_string()),
                url: Some(format!("https://docs.example.com/{pk}")),
                category: Some(category.to_string()),
            });
        }

        /// Visitors saved so far.
        pub fn visitors(&self) -> Vec<NewVisitor> {
            self.visitors.lock().unwrap().clone()
        }

        /// Documents currently stored.
        pub fn documents(&self) -> Vec<Document> {
            self.documents.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SiteRepo for MockSiteRepo {
        async fn save_visitor(&self, visitor: &NewVisitor) -> Result<(), RepoError> {
            if self.fail_visitor_writes {
                return Err(RepoError::Database(sqlx::Error::PoolTimedOut));
            }
            self.visitors.lock().unwrap().push(visitor.clone());
            Ok(())
        }

        async fn save_document(&self, document: &NewDocument) -> Result<(), RepoError> {
            let mut documents = self.documents.lock().unwrap();
            let pk = i32::try_from(documents.len()).unwrap() + 1;
            documents.push(Document {
                pk,
                title: Some(document.title.clone()),
                url: Some(document.url.clone()),
                category: Some(document.category.clone()),
            });
            Ok(())
        }

        async fn list_documents(&self) -> Result<Vec<Document>, RepoError> {
            if self.fail_document_reads {
                return Err(RepoError::Database(sqlx::Error::PoolTimedOut));
            }
            Ok(self.documents.lock().unwrap().clone())
        }

        async fn count_documents(&self) -> Result<i64, RepoError> {
            Ok(i64::try_from(self.documents.lock().unwrap().len()).unwrap())
        }
    }
}
