//! Article resolution
//!
//! Raw text is split on commas, each segment trimmed and empty segments
//! dropped. Order and duplicates are kept; a duplicate token resolves to the
//! same article number.

use photosku_common::db::ArticleNumber;
use photosku_common::{Error, Result};
use tracing::error;

use super::Catalog;

/// `" 1.2345,6.7890 ,, "` -> `["1.2345", "6.7890"]`
pub fn parse_article_tokens(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

impl Catalog {
    /// Get-or-create every token, in order.
    ///
    /// The first failure aborts the call with [`Error::ArticleResolution`]
    /// naming the token; articles created before it are kept.
    pub async fn resolve(&self, tokens: &[String]) -> Result<Vec<ArticleNumber>> {
        let mut articles = Vec::with_capacity(tokens.len());
        for token in tokens {
            match self.entities.get_or_create_article(token).await {
                Ok(article) => articles.push(article),
                Err(e) => {
                    error!(token = %token, error = %e, "Failed to resolve article number");
                    return Err(Error::ArticleResolution {
                        token: token.clone(),
                        source: Box::new(e),
                    });
                }
            }
        }
        Ok(articles)
    }

    /// Lookup-only resolution used by search
    pub async fn lookup(&self, token: &str) -> Result<Option<ArticleNumber>> {
        self.entities.get_article_by_name(token).await
    }
}
