use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// A remote table and where its records land locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReference {
    pub base_id: String,
    pub table_id: String,
    pub view_id: Option<String>,
    pub target_folder_path: String,
    pub template_folder_path: Option<String>,
}

impl TableReference {
    pub fn new(ids: &TableIds, target_folder_path: impl Into<String>) -> Self {
        Self {
            base_id: ids.base_id.clone(),
            table_id: ids.table_id.clone(),
            view_id: Some(ids.view_id.clone()).filter(|view| !view.is_empty()),
            target_folder_path: target_folder_path.into(),
            template_folder_path: None,
        }
    }

    pub fn with_template_folder(mut self, path: impl Into<String>) -> Self {
        self.template_folder_path = Some(path.into()).filter(|path: &String| !path.is_empty());
        self
    }
}

/// Identifiers of a table as stored in settings and in the update-ids payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableIds {
    #[serde(rename = "baseID", default)]
    pub base_id: String,
    #[serde(rename = "tableID", default)]
    pub table_id: String,
    #[serde(rename = "viewID", default)]
    pub view_id: String,
}

impl TableIds {
    pub fn is_complete(&self) -> bool {
        !self.base_id.is_empty() && !self.table_id.is_empty()
    }
}

static AIRTABLE_URL: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"https?://airtable\.com/(app[^/]+)/(tbl[^/]+)(?:/(viw[^/?]+))?").unwrap()
});

/// Extract base, table and view ids from a shared Airtable URL.
pub fn extract_airtable_ids(url: &str) -> Option<TableIds> {
    let captures = AIRTABLE_URL.captures(url)?;
    let group = |i: usize| {
        captures
            .get(i)
            .map(|m| m.as_str().to_owned())
            .unwrap_or_default()
    };
    Some(TableIds {
        base_id: group(1),
        table_id: group(2),
        view_id: group(3),
    })
}
