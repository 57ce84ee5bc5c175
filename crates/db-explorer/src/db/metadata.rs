//! Schema descriptors and the two prompt views built from them.
//!
//! Descriptors serialize in a canonical key order (database: `name`, `tables`,
//! `description`; table: `name`, `description`, `columns`; column: `name`,
//! `type`, `description`). A description missing from the input deserializes
//! to `"N/A"`; an explicit `null` stays absent.

use crate::config::BackendKind;
use serde::{Deserialize, Serialize};

fn not_available() -> Option<String> {
    Some("N/A".to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Type name as reported by the backend.
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default = "not_available")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    #[serde(default = "not_available")]
    pub description: Option<String>,
    pub columns: Vec<ColumnDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseDescriptor {
    pub name: String,
    pub tables: Vec<TableDescriptor>,
    #[serde(default = "not_available")]
    pub description: Option<String>,
}

impl DatabaseDescriptor {
    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Serializes the tree in canonical key order.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_canonical_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl TableDescriptor {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Full nested view, used to prompt query generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullDescription {
    pub db_name: String,
    pub db_type: BackendKind,
    pub db_description: Option<String>,
    pub tables: Vec<FullTable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullTable {
    pub name: String,
    pub description: Option<String>,
    pub columns: Vec<FullColumn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullColumn {
    pub name: String,
    pub data_type: String,
    pub description: Option<String>,
}

/// Table-level view without columns, used to prompt the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortDescription {
    pub db_name: String,
    pub db_type: BackendKind,
    pub db_description: Option<String>,
    pub tables: Vec<ShortTable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortTable {
    pub name: String,
    pub description: Option<String>,
}

impl FullDescription {
    /// Builds the view; without metadata the table list is empty.
    pub fn new(db_name: &str, db_type: BackendKind, metadata: Option<&DatabaseDescriptor>) -> Self {
        let tables = metadata
            .map(|db| {
                db.tables
                    .iter()
                    .map(|table| FullTable {
                        name: table.name.clone(),
                        description: table.description.clone(),
                        columns: table
                            .columns
                            .iter()
                            .map(|column| FullColumn {
                                name: column.name.clone(),
                                data_type: column.data_type.clone(),
                                description: column.description.clone(),
                            })
                            .collect(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            db_name: db_name.to_string(),
            db_type,
            db_description: metadata.and_then(|db| db.description.clone()),
            tables,
        }
    }
}

impl ShortDescription {
    pub fn new(db_name: &str, db_type: BackendKind, metadata: Option<&DatabaseDescriptor>) -> Self {
        let tables = metadata
            .map(|db| {
                db.tables
                    .iter()
                    .map(|table| ShortTable {
                        name: table.name.clone(),
                        description: table.description.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            db_name: db_name.to_string(),
            db_type,
            db_description: metadata.and_then(|db| db.description.clone()),
            tables,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DatabaseDescriptor {
        DatabaseDescriptor {
            name: "sports".to_string(),
            tables: vec![
                TableDescriptor {
                    name: "players".to_string(),
                    description: Some("Registered players".to_string()),
                    columns: vec![
                        ColumnDescriptor {
                            name: "id".to_string(),
                            data_type: "INTEGER".to_string(),
                            description: None,
                        },
                        ColumnDescriptor {
                            name: "name".to_string(),
                            data_type: "TEXT".to_string(),
                            description: Some("Full name".to_string()),
                        },
                    ],
                },
                TableDescriptor {
                    name: "teams".to_string(),
                    description: None,
                    columns: vec![ColumnDescriptor {
                        name: "id".to_string(),
                        data_type: "INTEGER".to_string(),
                        description: None,
                    }],
                },
            ],
            description: None,
        }
    }

    #[test]
    fn test_canonical_round_trip() {
        let db = sample();
        let json = db.to_canonical_json().unwrap();
        assert_eq!(DatabaseDescriptor::from_canonical_json(&json).unwrap(), db);
    }

    #[test]
    fn test_canonical_key_order() {
        let json = serde_json::to_string(&sample()).unwrap();

        let db_name = json.find("\"name\":\"sports\"").unwrap();
        let tables = json.find("\"tables\"").unwrap();
        let db_description = json.rfind("\"description\"").unwrap();
        assert!(db_name < tables && tables < db_description);

        let column = r#"{"name":"id","type":"INTEGER","description":null}"#;
        assert!(json.contains(column), "unexpected column layout: {json}");

        let table = r#"{"name":"teams","description":null,"columns":["#;
        assert!(json.contains(table), "unexpected table layout: {json}");
    }

    #[test]
    fn test_missing_description_defaults_to_not_available() {
        let json = r#"{
            "name": "sports",
            "tables": [{"name": "players", "columns": [{"name": "id", "type": "INTEGER"}]}]
        }"#;
        let db = DatabaseDescriptor::from_canonical_json(json).unwrap();

        assert_eq!(db.description.as_deref(), Some("N/A"));
        assert_eq!(db.tables[0].description.as_deref(), Some("N/A"));
        assert_eq!(db.tables[0].columns[0].description.as_deref(), Some("N/A"));
    }

    #[test]
    fn test_explicit_null_description_stays_absent() {
        let json = r#"{"name": "sports", "tables": [], "description": null}"#;
        let db = DatabaseDescriptor::from_canonical_json(json).unwrap();
        assert!(db.description.is_none());
    }

    #[test]
    fn test_short_view_is_subset_of_full_view() {
        let db = sample();
        let full = FullDescription::new("sports", BackendKind::Sqlite, Some(&db));
        let short = ShortDescription::new("sports", BackendKind::Sqlite, Some(&db));

        assert_eq!(full.tables.len(), short.tables.len());
        for (f, s) in full.tables.iter().zip(&short.tables) {
            assert_eq!(f.name, s.name);
            assert_eq!(f.description, s.description);
        }
        assert_eq!(full.tables[0].columns[1].data_type, "TEXT");

        let short_json = serde_json::to_value(&short).unwrap();
        assert!(short_json["tables"][0].get("columns").is_none());
        assert_eq!(short_json["db_type"], "sqlite");
    }

    #[test]
    fn test_views_without_metadata_have_no_tables() {
        let full = FullDescription::new("sports", BackendKind::Postgres, None);
        assert!(full.tables.is_empty());
        assert!(full.db_description.is_none());
    }
}
