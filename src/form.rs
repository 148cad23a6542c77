use serde::Deserialize;

use crate::sheet::Row;

/// The seven logical fields on the challenge form. Each key knows the
/// spreadsheet column it is sourced from and the label the page renders
/// next to its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKey {
    CompanyName,
    Address,
    Ein,
    Sector,
    AutomationTool,
    AnnualSaving,
    ProjectDate,
}

impl FieldKey {
    /// Every field, in fill order.
    pub const ALL: [FieldKey; 7] = [
        FieldKey::CompanyName,
        FieldKey::Address,
        FieldKey::Ein,
        FieldKey::Sector,
        FieldKey::AutomationTool,
        FieldKey::AnnualSaving,
        FieldKey::ProjectDate,
    ];

    /// Spreadsheet column this field is read from.
    pub fn column(self) -> &'static str {
        match self {
            FieldKey::CompanyName => "company_name",
            FieldKey::Address => "company_address",
            FieldKey::Ein => "employer_identification_number",
            FieldKey::Sector => "sector",
            FieldKey::AutomationTool => "automation_tool",
            FieldKey::AnnualSaving => "annual_automation_saving",
            FieldKey::ProjectDate => "date_of_first_project",
        }
    }

    /// On-page label of this field's input.
    pub fn label(self) -> &'static str {
        match self {
            FieldKey::CompanyName => "Company Name",
            FieldKey::Address => "Address",
            FieldKey::Ein => "EIN",
            FieldKey::Sector => "Sector",
            FieldKey::AutomationTool => "Automation Tool",
            FieldKey::AnnualSaving => "Annual Saving",
            FieldKey::ProjectDate => "Date",
        }
    }
}

/// Values for one form submission, keyed by [`FieldKey`]. Always holds all
/// seven slots; an empty value means the field is skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFieldSet {
    values: [String; 7],
}

impl FormFieldSet {
    /// Map a spreadsheet row onto the seven fields. Columns the row lacks
    /// stay empty; columns outside the table are ignored.
    pub fn from_row(row: &Row) -> Self {
        let mut set = Self::default();
        for key in FieldKey::ALL {
            if let Some(value) = row.get(key.column()) {
                set.values[key as usize] = value.to_owned();
            }
        }
        set
    }

    pub fn get(&self, key: FieldKey) -> &str {
        &self.values[key as usize]
    }

    pub fn set(&mut self, key: FieldKey, value: impl Into<String>) {
        self.values[key as usize] = value.into();
    }

    /// All seven entries in fill order.
    pub fn entries(&self) -> impl Iterator<Item = (FieldKey, &str)> + '_ {
        FieldKey::ALL.iter().map(move |&key| (key, self.get(key)))
    }
}

/// A field found by scanning the live page. `label` is a best guess (`None`
/// when no nearby text resolved); `tabindex` is the attribute used to
/// re-select the input, since positional indices shift between scans.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiscoveredField {
    pub index: usize,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub tabindex: Option<String>,
    pub visible: bool,
}

/// First visible field whose resolved label exactly matches `label`.
/// Matching is strict string equality; unlabeled fields never match.
pub fn match_field<'a>(fields: &'a [DiscoveredField], label: &str) -> Option<&'a DiscoveredField> {
    fields
        .iter()
        .find(|f| f.visible && f.label.as_deref() == Some(label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn discovered(index: usize, label: Option<&str>, visible: bool) -> DiscoveredField {
        DiscoveredField {
            index,
            label: label.map(str::to_owned),
            tabindex: Some(index.to_string()),
            visible,
        }
    }

    #[test]
    fn key_table_is_complete_and_distinct() {
        assert_eq!(FieldKey::ALL.len(), 7);
        let labels: HashSet<_> = FieldKey::ALL.iter().map(|k| k.label()).collect();
        assert_eq!(labels.len(), 7);
        let columns: HashSet<_> = FieldKey::ALL.iter().map(|k| k.column()).collect();
        assert_eq!(columns.len(), 7);
    }

    #[test]
    fn key_table_matches_the_page_and_sheet_names() {
        assert_eq!(FieldKey::Ein.column(), "employer_identification_number");
        assert_eq!(FieldKey::Ein.label(), "EIN");
        assert_eq!(FieldKey::AnnualSaving.column(), "annual_automation_saving");
        assert_eq!(FieldKey::AnnualSaving.label(), "Annual Saving");
        assert_eq!(FieldKey::ProjectDate.column(), "date_of_first_project");
        assert_eq!(FieldKey::ProjectDate.label(), "Date");
    }

    #[test]
    fn from_row_fills_known_columns_and_ignores_the_rest() {
        let row = Row::from_cells([
            ("company_name".to_owned(), "Acme Corp".to_owned()),
            ("sector".to_owned(), "Energy".to_owned()),
            ("unrelated".to_owned(), "ignored".to_owned()),
        ]);
        let set = FormFieldSet::from_row(&row);
        assert_eq!(set.get(FieldKey::CompanyName), "Acme Corp");
        assert_eq!(set.get(FieldKey::Sector), "Energy");
        assert_eq!(set.get(FieldKey::Address), "");
    }

    #[test]
    fn entries_walk_every_key_in_fill_order() {
        let mut set = FormFieldSet::default();
        set.set(FieldKey::Ein, "12-3456789");
        let entries: Vec<_> = set.entries().collect();
        assert_eq!(entries.len(), 7);
        assert_eq!(entries[0].0, FieldKey::CompanyName);
        assert_eq!(entries[2], (FieldKey::Ein, "12-3456789"));
    }

    #[test]
    fn match_field_requires_visibility_and_exact_label() {
        let fields = vec![
            discovered(0, Some("Sector"), false),
            discovered(1, Some("Sector"), true),
            discovered(2, Some("Sector name"), true),
            discovered(3, None, true),
        ];
        let hit = match_field(&fields, "Sector").unwrap();
        assert_eq!(hit.index, 1);
        assert!(match_field(&fields, "Company Name").is_none());
        assert!(match_field(&fields, "sector").is_none());
    }

    #[test]
    fn discovery_payload_deserializes_with_nulls() {
        let json = r#"[
            {"index":0,"label":"Sector","tabindex":"40000","visible":true},
            {"index":1,"label":null,"tabindex":null,"visible":false}
        ]"#;
        let fields: Vec<DiscoveredField> = serde_json::from_str(json).unwrap();
        assert_eq!(fields[0].label.as_deref(), Some("Sector"));
        assert_eq!(fields[0].tabindex.as_deref(), Some("40000"));
        assert_eq!(fields[1].label, None);
        assert!(!fields[1].visible);
    }
}
