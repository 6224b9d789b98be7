//! List query parameters and their cache keys.

use std::fmt;

use cinesync_index::{SearchQuery, SearchRequest, SortKey};

use crate::error::ServiceError;
use crate::resource::Resource;

pub const MAX_PAGE_SIZE: u32 = 100;

/// What a list read selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criteria {
    All,
    /// Full-text query against the resource's search field.
    Search(String),
    /// Exact match on the resource's filter field.
    Filter(String),
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Search(text) => write!(f, "query={text}"),
            Self::Filter(value) => write!(f, "filter={value}"),
        }
    }
}

/// A validated page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    page: u32,
    size: u32,
    criteria: Criteria,
}

impl ListQuery {
    /// Pages start at 1; sizes are `1..=100`. Blank search text or filter
    /// values select everything.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidPage`] for out-of-range values.
    pub fn new(page: u32, size: u32, criteria: Criteria) -> Result<Self, ServiceError> {
        if page == 0 {
            return Err(ServiceError::InvalidPage("page numbers start at 1".into()));
        }
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(ServiceError::InvalidPage(format!(
                "page size {size} outside 1..={MAX_PAGE_SIZE}"
            )));
        }
        let criteria = match criteria {
            Criteria::Search(text) | Criteria::Filter(text) if text.trim().is_empty() => {
                Criteria::All
            }
            Criteria::Search(text) => Criteria::Search(text.trim().to_string()),
            Criteria::Filter(value) => Criteria::Filter(value.trim().to_string()),
            Criteria::All => Criteria::All,
        };
        Ok(Self {
            page,
            size,
            criteria,
        })
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[must_use]
    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    /// Offset of the first hit.
    #[must_use]
    pub fn from(&self) -> usize {
        (self.page as usize - 1) * self.size as usize
    }

    /// `{prefix}s:{page}:{size}:{criteria}`.
    #[must_use]
    pub fn cache_key(&self, prefix: &str) -> String {
        format!("{prefix}s:{}:{}:{}", self.page, self.size, self.criteria)
    }

    /// Index request for resource `R`: relevance then rank for text
    /// queries, rank alone otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::UnsupportedFilter`] when filtering a
    /// resource without a filter field.
    pub fn to_request<R: Resource>(&self) -> Result<SearchRequest, ServiceError> {
        let rank = SortKey::Field(R::RANK_FIELD.to_string());
        let (query, sort) = match &self.criteria {
            Criteria::All => (SearchQuery::MatchAll, vec![rank]),
            Criteria::Search(text) => (
                SearchQuery::Match {
                    field: R::SEARCH_FIELD.to_string(),
                    text: text.clone(),
                },
                vec![SortKey::Score, rank],
            ),
            Criteria::Filter(value) => {
                let (path, field) = R::FILTER
                    .ok_or(ServiceError::UnsupportedFilter { resource: R::NAME })?;
                (
                    SearchQuery::NestedTerm {
                        path: path.to_string(),
                        field: field.to_string(),
                        value: value.clone(),
                    },
                    vec![rank],
                )
            }
        };
        Ok(SearchRequest {
            query,
            sort,
            from: self.from(),
            size: self.size as usize,
        })
    }
}
