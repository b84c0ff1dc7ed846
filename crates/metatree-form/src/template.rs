//! User templates: presentation overrides layered on the schema.
//!
//! A template is a flat map from category path (`dct:title`,
//! `dcat:contactPoint / vcard:fn`) to an override record, plus the ordered
//! list of tab names. Paths that the schema does not define are "local"
//! categories, fully described by their record.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::TemplateError;
use crate::schema::FieldKind;

pub const PATH_SEPARATOR: &str = " / ";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateRecord {
    pub label: Option<String>,
    pub field_kind: Option<FieldKind>,
    pub row_span: Option<usize>,
    pub help: Option<String>,
    pub default_value: Option<String>,
    pub placeholder: Option<String>,
    pub pattern: Option<String>,
    pub multiple: Option<bool>,
    pub mandatory: Option<bool>,
    pub order: Option<i64>,
    pub read_only: Option<bool>,
    pub tab: Option<String>,
    /// Literal datatype of a local category (`xsd:string` when absent).
    pub datatype: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Template {
    pub categories: BTreeMap<String, TemplateRecord>,
    pub tabs: Vec<String>,
}

/// Path text without the last segment; top-level categories share `""`.
fn parent_path(path: &str) -> &str {
    path.rsplit_once(PATH_SEPARATOR)
        .map(|(parent, _)| parent)
        .unwrap_or("")
}

impl Template {
    pub fn with_category(mut self, path: impl Into<String>, record: TemplateRecord) -> Self {
        self.categories.insert(path.into(), record);
        self
    }

    pub fn with_tabs<I, S>(mut self, tabs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tabs = tabs.into_iter().map(Into::into).collect();
        self
    }

    pub fn record(&self, path: &str) -> Option<&TemplateRecord> {
        self.categories.get(path)
    }

    /// Reject templates the builder cannot lay out: duplicate tab names, tab
    /// references to undeclared tabs, and two sibling categories of the same
    /// tab claiming the same order number.
    pub fn validate(&self) -> Result<(), TemplateError> {
        let mut tabs = BTreeSet::new();
        for tab in &self.tabs {
            if !tabs.insert(tab.as_str()) {
                return Err(TemplateError::DuplicateTab(tab.clone()));
            }
        }

        let mut orders: BTreeMap<(&str, Option<&str>, i64), &str> = BTreeMap::new();
        for (path, record) in &self.categories {
            if let Some(tab) = &record.tab {
                if !tabs.contains(tab.as_str()) {
                    return Err(TemplateError::UnknownTab {
                        path: path.clone(),
                        tab: tab.clone(),
                    });
                }
            }
            if let Some(order) = record.order {
                let slot = (parent_path(path), record.tab.as_deref(), order);
                if let Some(first) = orders.insert(slot, path) {
                    return Err(TemplateError::DuplicateOrder {
                        order,
                        first: first.to_string(),
                        second: path.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
