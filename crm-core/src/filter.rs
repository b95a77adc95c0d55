//! List filters and pagination

use crate::EntityId;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 500;

/// Query parameters shared by every list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct ListFilter {
    /// Only records owned by this profile
    #[cfg_attr(feature = "openapi", param(value_type = Option<String>, format = "uuid"))]
    pub owner_id: Option<EntityId>,
    /// Only records attached to this account
    #[cfg_attr(feature = "openapi", param(value_type = Option<String>, format = "uuid"))]
    pub account_id: Option<EntityId>,
    /// Status or stage, matched against the entity's status enum
    pub status: Option<String>,
    /// Case-insensitive substring over names, emails and companies
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListFilter {
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    /// Lowercased, trimmed search text, if any.
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    /// Whether any of `haystacks` contains the search term.
    pub fn matches_search<'a>(&self, haystacks: impl IntoIterator<Item = Option<&'a str>>) -> bool {
        match self.search_term() {
            None => true,
            Some(term) => haystacks
                .into_iter()
                .flatten()
                .any(|h| h.to_lowercase().contains(&term)),
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total matching records before pagination
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    /// Paginate an already filtered, ordered list.
    pub fn from_vec(all: Vec<T>, filter: &ListFilter) -> Self {
        let total = all.len() as i64;
        let limit = filter.effective_limit();
        let offset = filter.effective_offset();
        let items = all
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect();
        Self {
            items,
            total,
            limit,
            offset,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}
