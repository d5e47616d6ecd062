use tracing::info;

use crate::models::ProductRecord;

/// Candidate grouping attributes, probed in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingField {
    ProductType,
    Collection,
    Tags,
}

pub const PROBE_ORDER: [GroupingField; 3] = [
    GroupingField::ProductType,
    GroupingField::Collection,
    GroupingField::Tags,
];

pub const DEFAULT_FIELD: GroupingField = GroupingField::ProductType;

impl GroupingField {
    pub fn name(&self) -> &'static str {
        match self {
            GroupingField::ProductType => "product_type",
            GroupingField::Collection => "collection",
            GroupingField::Tags => "tags",
        }
    }

    /// The record's value for this attribute. `collection` lives in the
    /// metafield map; the REST product payload has no such field of its own.
    pub fn value_of<'a>(&self, record: &'a ProductRecord) -> Option<&'a str> {
        match self {
            GroupingField::ProductType => record.product_type.as_deref(),
            GroupingField::Collection => record.metafields.get("collection").map(String::as_str),
            GroupingField::Tags => record.tags.as_deref(),
        }
    }
}

/// First attribute present and non-empty on every record wins; otherwise the
/// hardcoded default. Zero records also yield the default.
pub fn resolve_grouping_field(records: &[ProductRecord]) -> GroupingField {
    if records.is_empty() {
        return DEFAULT_FIELD;
    }
    for field in PROBE_ORDER {
        if records
            .iter()
            .all(|record| field.value_of(record).is_some_and(|v| !v.trim().is_empty()))
        {
            info!(
                target = "calliope.category",
                field = field.name(),
                "grouping field resolved",
            );
            return field;
        }
    }
    info!(
        target = "calliope.category",
        field = DEFAULT_FIELD.name(),
        "no consistent grouping field, using default",
    );
    DEFAULT_FIELD
}

/// Case-insensitive substring match on the resolved attribute. Records
/// lacking the attribute never match; an empty result is not an error.
pub fn filter_by_category(
    records: &[ProductRecord],
    field: GroupingField,
    category: &str,
) -> Vec<ProductRecord> {
    let needle = category.to_lowercase();
    records
        .iter()
        .filter(|record| {
            field
                .value_of(record)
                .is_some_and(|value| value.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(product_type: Option<&str>, tags: Option<&str>) -> ProductRecord {
        ProductRecord {
            id: 0,
            title: "Item".to_string(),
            description: String::new(),
            product_type: product_type.map(str::to_string),
            tags: tags.map(str::to_string),
            variants: Vec::new(),
            metafields: BTreeMap::new(),
            images: Vec::new(),
        }
    }

    #[test]
    fn tags_win_when_only_tags_cover_every_record() {
        let records = vec![
            record(None, Some("outdoor, camping")),
            record(Some("Furniture"), Some("indoor")),
        ];
        assert_eq!(resolve_grouping_field(&records), GroupingField::Tags);
    }

    #[test]
    fn product_type_wins_when_present_everywhere() {
        let records = vec![
            record(Some("Chairs"), None),
            record(Some("Tables"), Some("wood")),
        ];
        assert_eq!(resolve_grouping_field(&records), GroupingField::ProductType);
    }

    #[test]
    fn zero_records_fall_back_to_the_default() {
        assert_eq!(resolve_grouping_field(&[]), DEFAULT_FIELD);
    }

    #[test]
    fn no_consistent_field_falls_back_to_the_default() {
        let records = vec![record(Some("Chairs"), None), record(None, None)];
        assert_eq!(resolve_grouping_field(&records), DEFAULT_FIELD);
    }

    #[test]
    fn collection_is_read_from_the_metafield_map() {
        let mut with_collection = record(None, None);
        with_collection
            .metafields
            .insert("collection".to_string(), "Summer".to_string());
        let records = vec![with_collection];
        assert_eq!(resolve_grouping_field(&records), GroupingField::Collection);
    }

    #[test]
    fn filter_matches_case_insensitive_substrings() {
        let records = vec![
            record(Some("Paper Shredders"), None),
            record(Some("Safes"), None),
            record(None, None),
        ];
        let matched = filter_by_category(&records, GroupingField::ProductType, "shredder");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].product_type.as_deref(), Some("Paper Shredders"));

        let matched = filter_by_category(&records, GroupingField::ProductType, "SAFES");
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn filter_with_no_matches_is_empty_not_an_error() {
        let records = vec![record(Some("Chairs"), None)];
        assert!(filter_by_category(&records, GroupingField::ProductType, "desks").is_empty());
    }
}
