//! Filter criteria for the item list and their request encoding.

use serde::{Deserialize, Serialize};
use stockroom_api_models::RecordId;

use crate::cache::{ITEMS_RESOURCE, QueryKey};

/// Criteria applied to `GET items/`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Location id.
    pub location: Option<RecordId>,
    /// Tag id.
    pub tag: Option<RecordId>,
    /// Group id.
    pub group: Option<RecordId>,
    /// Free-text name search.
    pub search: Option<String>,
}

impl FilterCriteria {
    /// Criteria with only a location set.
    #[must_use]
    pub fn by_location(location: RecordId) -> Self {
        Self {
            location: Some(location),
            ..Self::default()
        }
    }

    /// Trim the search text and treat blank values as unset.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            location: self.location.filter(|id| *id > 0),
            tag: self.tag.filter(|id| *id > 0),
            group: self.group.filter(|id| *id > 0),
            search: self
                .search
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
        }
    }

    /// Whether no criterion is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.location.is_none()
            && self.tag.is_none()
            && self.group.is_none()
            && self.search.is_none()
    }

    /// Request parameters in fixed order; unset fields are omitted.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(4);
        if let Some(location) = self.location {
            pairs.push(("location", location.to_string()));
        }
        if let Some(tag) = self.tag {
            pairs.push(("tag", tag.to_string()));
        }
        if let Some(group) = self.group {
            pairs.push(("group", group.to_string()));
        }
        if let Some(search) = &self.search {
            pairs.push(("name", search.clone()));
        }
        pairs
    }
}

/// Current list filters and their revision counter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterState {
    criteria: FilterCriteria,
    revision: u64,
}

impl FilterState {
    /// Active criteria.
    #[must_use]
    pub const fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// Bumped on every effective change.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Replace the criteria; returns whether anything changed.
    pub fn set(&mut self, criteria: FilterCriteria) -> bool {
        let criteria = criteria.normalized();
        if criteria == self.criteria {
            return false;
        }
        self.criteria = criteria;
        self.revision += 1;
        true
    }

    /// Change only the location.
    pub fn set_location(&mut self, location: Option<RecordId>) -> bool {
        self.set(FilterCriteria {
            location,
            ..self.criteria.clone()
        })
    }

    /// Change only the tag.
    pub fn set_tag(&mut self, tag: Option<RecordId>) -> bool {
        self.set(FilterCriteria {
            tag,
            ..self.criteria.clone()
        })
    }

    /// Change only the group.
    pub fn set_group(&mut self, group: Option<RecordId>) -> bool {
        self.set(FilterCriteria {
            group,
            ..self.criteria.clone()
        })
    }

    /// Change only the search text.
    pub fn set_search(&mut self, search: Option<String>) -> bool {
        self.set(FilterCriteria {
            search,
            ..self.criteria.clone()
        })
    }

    /// Reset every criterion.
    pub fn clear(&mut self) -> bool {
        self.set(FilterCriteria::default())
    }

    /// Cache key for the item list under the current criteria.
    #[must_use]
    pub fn key(&self) -> QueryKey {
        QueryKey::list(ITEMS_RESOURCE, &self.criteria)
    }
}
