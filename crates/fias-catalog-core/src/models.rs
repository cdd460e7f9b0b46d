//! Catalog data model: address elements, houses, and listing envelopes.
//!
//! Address elements form the administrative hierarchy. Every real-world
//! object is a *lineage* of historical revisions sharing one `guid`; exactly
//! one revision per lineage is expected to be terminal (see
//! [`AddressElement::is_terminal`]).

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::schema::{column, MappedRow};

/// Administrative depth code of an address element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Region,
    District,
    City,
    IntracityArea,
    Settlement,
    Street,
    PlanningStructure,
    Territory,
    TerritoryStreet,
    /// A code the classifier uses that this catalog gives no meaning to.
    Other(i64),
}

impl Level {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Level::Region,
            3 => Level::District,
            4 => Level::City,
            5 => Level::IntracityArea,
            6 => Level::Settlement,
            7 => Level::Street,
            65 => Level::PlanningStructure,
            90 => Level::Territory,
            91 => Level::TerritoryStreet,
            other => Level::Other(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Level::Region => 1,
            Level::District => 3,
            Level::City => 4,
            Level::IntracityArea => 5,
            Level::Settlement => 6,
            Level::Street => 7,
            Level::PlanningStructure => 65,
            Level::Territory => 90,
            Level::TerritoryStreet => 91,
            Level::Other(code) => *code,
        }
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

/// Ownership kind of a house record (`eststatus`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum OwnershipKind {
    #[default]
    Undefined,
    Grounds,
    House,
    HouseAndGrounds,
}

impl OwnershipKind {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => OwnershipKind::Grounds,
            2 => OwnershipKind::House,
            3 => OwnershipKind::HouseAndGrounds,
            _ => OwnershipKind::Undefined,
        }
    }
}

/// Structure kind of a house record (`strstatus`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum StructureKind {
    #[default]
    Undefined,
    Building,
    Installation,
    Designation,
}

impl StructureKind {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => StructureKind::Building,
            2 => StructureKind::Installation,
            3 => StructureKind::Designation,
            _ => StructureKind::Undefined,
        }
    }
}

/// One historical revision of a node in the administrative hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressElement {
    /// Revision key (`aoid`).
    pub element_id: String,
    /// Lineage key shared by all revisions (`aoguid`).
    pub guid: String,
    pub parent_guid: Option<String>,
    pub level: Level,
    pub formal_name: String,
    pub short_type_name: String,
    pub official_name: Option<String>,
    pub region_code: Option<String>,
    pub postal_code: Option<String>,
    pub previous_revision_id: Option<String>,
    pub next_revision_id: Option<String>,
    /// 0 for the current revision of the chain.
    pub actuality_status: i64,
    pub lifecycle_status: i64,
    pub operation_status: i64,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub search_text: Option<String>,
    pub search_text_normalized: Option<String>,
    pub is_active: bool,
    pub house_count: i64,
}

impl AddressElement {
    /// Minimal element with defaults for every optional attribute.
    pub fn new(element_id: &str, guid: &str, level: Level, formal_name: &str, short: &str) -> Self {
        Self {
            element_id: element_id.to_string(),
            guid: guid.to_string(),
            parent_guid: None,
            level,
            formal_name: formal_name.to_string(),
            short_type_name: short.to_string(),
            official_name: None,
            region_code: None,
            postal_code: None,
            previous_revision_id: None,
            next_revision_id: None,
            actuality_status: 0,
            lifecycle_status: 1,
            operation_status: 1,
            valid_from: None,
            valid_to: None,
            search_text: None,
            search_text_normalized: None,
            is_active: true,
            house_count: 0,
        }
    }

    pub fn with_parent(mut self, parent_guid: &str) -> Self {
        self.parent_guid = Some(parent_guid.to_string());
        self
    }

    /// Terminal revision: current in its chain, or the chain ends here.
    pub fn is_terminal(&self) -> bool {
        self.actuality_status == 0
            || self
                .next_revision_id
                .as_deref()
                .map_or(true, |id| id.trim().is_empty())
    }

    /// Both denormalized search fields are populated.
    pub fn has_search_text(&self) -> bool {
        matches!(&self.search_text, Some(t) if !t.is_empty())
            && matches!(&self.search_text_normalized, Some(t) if !t.is_empty())
    }

    /// Build from an imported address-element row. Rows without `aoid` or
    /// `aoguid` cannot be addressed and yield `None`.
    pub fn from_row(row: &MappedRow) -> Option<Self> {
        let element_id = column(row, "aoid")?;
        let guid = column(row, "aoguid")?;
        let mut element = AddressElement::new(
            element_id,
            guid,
            Level::from_code(int_column(row, "aolevel").unwrap_or(0)),
            column(row, "formalname").unwrap_or_default(),
            column(row, "shortname").unwrap_or_default(),
        );
        element.parent_guid = column(row, "parentguid").map(str::to_string);
        element.official_name = column(row, "offname").map(str::to_string);
        element.region_code = column(row, "regioncode").map(str::to_string);
        element.postal_code = column(row, "postalcode").map(str::to_string);
        element.previous_revision_id = column(row, "previd").map(str::to_string);
        element.next_revision_id = column(row, "nextid").map(str::to_string);
        element.actuality_status = int_column(row, "currstatus").unwrap_or(0);
        element.lifecycle_status = int_column(row, "livestatus").unwrap_or(0);
        element.operation_status = int_column(row, "operstatus").unwrap_or(0);
        element.valid_from = column(row, "startdate").and_then(parse_date);
        element.valid_to = column(row, "enddate").and_then(parse_date);
        element.is_active = column(row, "actual").map_or(true, parse_flag);
        Some(element)
    }
}

/// A building or structure registered under an address element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct House {
    /// Revision key (`houseid`).
    pub house_record_id: String,
    /// Stable key across revisions (`houseguid`).
    pub house_guid: String,
    /// Guid of the containing address element.
    pub aoguid: String,
    pub house_number: String,
    pub building_number: String,
    pub structure_number: String,
    pub ownership_kind: OwnershipKind,
    pub structure_kind: StructureKind,
    pub postal_code: Option<String>,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    /// Guid the external registry uses for this building (`gisgkh_guid`).
    pub external_guid: Option<String>,
    /// Classifier guid an externally added record corresponds to.
    pub fias_house_guid: Option<String>,
    pub fias_house_id: Option<String>,
    pub is_from_external_registry: bool,
    pub is_active: bool,
}

impl House {
    pub fn new(house_record_id: &str, house_guid: &str, aoguid: &str, house_number: &str) -> Self {
        Self {
            house_record_id: house_record_id.to_string(),
            house_guid: house_guid.to_string(),
            aoguid: aoguid.to_string(),
            house_number: house_number.to_string(),
            building_number: String::new(),
            structure_number: String::new(),
            ownership_kind: OwnershipKind::House,
            structure_kind: StructureKind::Undefined,
            postal_code: None,
            valid_from: None,
            valid_to: None,
            external_guid: None,
            fias_house_guid: None,
            fias_house_id: None,
            is_from_external_registry: false,
            is_active: true,
        }
    }

    /// Valid on `date`: the record ends strictly after it. Records without
    /// an end date are open-ended.
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.valid_to.map_or(true, |end| end > date)
    }

    /// Not a duplicate for external-registry purposes.
    pub fn is_canonical(&self) -> bool {
        self.is_active
            && self
                .external_guid
                .as_deref()
                .map_or(true, |g| g.is_empty() || g == self.house_guid)
    }

    pub fn from_row(row: &MappedRow) -> Option<Self> {
        let mut house = House::new(
            column(row, "houseid")?,
            column(row, "houseguid")?,
            column(row, "aoguid").unwrap_or_default(),
            column(row, "housenum").unwrap_or_default(),
        );
        house.building_number = column(row, "buildnum").unwrap_or_default().to_string();
        house.structure_number = column(row, "strucnum").unwrap_or_default().to_string();
        house.ownership_kind = OwnershipKind::from_code(int_column(row, "eststatus").unwrap_or(0));
        house.structure_kind = StructureKind::from_code(int_column(row, "strstatus").unwrap_or(0));
        house.postal_code = column(row, "postalcode").map(str::to_string);
        house.valid_from = column(row, "startdate").and_then(parse_date);
        house.valid_to = column(row, "enddate").and_then(parse_date);
        house.external_guid = column(row, "gisgkh_guid").map(str::to_string);
        house.fias_house_guid = column(row, "fias_houseguid").map(str::to_string);
        house.fias_house_id = column(row, "fias_houseid").map(str::to_string);
        house.is_from_external_registry = column(row, "gisgkh").map_or(false, parse_flag);
        house.is_active = column(row, "actual").map_or(true, parse_flag);
        Some(house)
    }
}

/// Paged listing envelope returned by every listing operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub count_total: i64,
    pub offset: i64,
}

impl<T> Listing<T> {
    pub fn empty(offset: i64) -> Self {
        Self {
            items: Vec::new(),
            count_total: 0,
            offset,
        }
    }
}

fn int_column(row: &MappedRow, name: &str) -> Option<i64> {
    column(row, name).and_then(|v| v.trim().parse().ok())
}

/// Parse a stored date in ISO (`YYYY-MM-DD`) or compact (`YYYYMMDD`) form.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y%m%d"))
        .ok()
}

/// Interpret a stored boolean flag. Anything that is not an explicit
/// false value counts as true.
pub fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "f" | "false" | "n" | "no"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_codes_round_trip_known_values() {
        for code in [1, 3, 4, 5, 6, 7, 65, 90, 91] {
            assert_eq!(Level::from_code(code).code(), code);
        }
        assert_eq!(Level::from_code(35), Level::Other(35));
    }

    #[test]
    fn terminal_predicate() {
        let mut e = AddressElement::new("a1", "g1", Level::City, "Казань", "г");
        assert!(e.is_terminal());

        e.actuality_status = 51;
        e.next_revision_id = Some("a2".into());
        assert!(!e.is_terminal());

        e.next_revision_id = Some("  ".into());
        assert!(e.is_terminal());

        e.next_revision_id = Some("a2".into());
        e.actuality_status = 0;
        assert!(e.is_terminal());
    }

    #[test]
    fn element_from_row_reads_classifier_columns() {
        let row: MappedRow = vec![
            ("aoid", Some("id-1".into())),
            ("aoguid", Some("guid-1".into())),
            ("aolevel", Some("4".into())),
            ("formalname", Some("Казань".into())),
            ("shortname", Some("г".into())),
            ("parentguid", Some("guid-0".into())),
            ("currstatus", Some("0".into())),
            ("enddate", Some("20790606".into())),
        ];
        let e = AddressElement::from_row(&row).unwrap();
        assert_eq!(e.level, Level::City);
        assert_eq!(e.parent_guid.as_deref(), Some("guid-0"));
        assert_eq!(e.valid_to, NaiveDate::from_ymd_opt(2079, 6, 6));
        assert!(e.is_active);
    }

    #[test]
    fn element_from_row_requires_keys() {
        let row: MappedRow = vec![("formalname", Some("Казань".into()))];
        assert!(AddressElement::from_row(&row).is_none());
    }

    #[test]
    fn house_validity_is_exclusive_of_end_date() {
        let mut h = House::new("h1", "hg1", "s1", "1");
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert!(h.is_valid_on(today));
        h.valid_to = Some(today);
        assert!(!h.is_valid_on(today));
        h.valid_to = NaiveDate::from_ymd_opt(2024, 5, 2);
        assert!(h.is_valid_on(today));
    }

    #[test]
    fn canonical_house_rules() {
        let mut h = House::new("h1", "hg1", "s1", "1");
        assert!(h.is_canonical());
        h.external_guid = Some("hg1".into());
        assert!(h.is_canonical());
        h.external_guid = Some("other".into());
        assert!(!h.is_canonical());
        h.external_guid = None;
        h.is_active = false;
        assert!(!h.is_canonical());
    }
}
