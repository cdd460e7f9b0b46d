//! Import target schemas and the file-name patterns that select them.
//!
//! Each classifier extract carries one record type per file. The file name
//! decides the target table, and each table accepts a fixed whitelist of
//! lowercase column names. Columns outside the whitelist are dropped by the
//! importer.

use std::sync::LazyLock;

use regex::Regex;

/// One imported row: whitelisted column name and its decoded value.
///
/// Empty values are kept as `None`.
pub type MappedRow = Vec<(&'static str, Option<String>)>;

/// Look up a column in a mapped row.
pub fn column<'a>(row: &'a MappedRow, name: &str) -> Option<&'a str> {
    row.iter()
        .find(|(col, _)| *col == name)
        .and_then(|(_, value)| value.as_deref())
}

/// Which typed record a schema's rows materialize as, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    AddressElement,
    House,
    /// History deltas and lookup tables, stored but not queried.
    Auxiliary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetSchema {
    AddressElementDeltas,
    AddressElements,
    LandmarkDeltas,
    Landmarks,
    HouseDeltas,
    HouseIntervalDeltas,
    HouseIntervals,
    Houses,
    NormativeDocumentDeltas,
    NormativeDocuments,
    ActualityStatuses,
    CenterStatuses,
    EstateStatuses,
    HouseStateStatuses,
    OperationStatuses,
    IntervalStatuses,
    StructureStatuses,
    CurrentStatuses,
    ShortTypeNames,
}

const ADDROBJ_COLUMNS: &[&str] = &[
    "aoguid",
    "formalname",
    "regioncode",
    "autocode",
    "areacode",
    "citycode",
    "ctarcode",
    "placecode",
    "plancode",
    "streetcode",
    "extrcode",
    "sextcode",
    "offname",
    "postalcode",
    "ifnsfl",
    "terrifnsfl",
    "ifnsul",
    "terrifnsul",
    "okato",
    "oktmo",
    "updatedate",
    "shortname",
    "aolevel",
    "parentguid",
    "aoid",
    "previd",
    "nextid",
    "code",
    "plaincode",
    "actstatus",
    "livestatus",
    "centstatus",
    "operstatus",
    "currstatus",
    "startdate",
    "enddate",
    "normdoc",
    "cadnum",
    "divtype",
    "actual",
];

const HOUSE_COLUMNS: &[&str] = &[
    "postalcode",
    "regioncode",
    "ifnsfl",
    "terrifnsfl",
    "ifnsul",
    "terrifnsul",
    "okato",
    "oktmo",
    "updatedate",
    "housenum",
    "buildnum",
    "strucnum",
    "eststatus",
    "strstatus",
    "houseid",
    "houseguid",
    "aoguid",
    "startdate",
    "enddate",
    "statstatus",
    "normdoc",
    "counter",
    "cadnum",
    "divtype",
    "gisgkh",
    "gisgkh_guid",
    "fias_houseguid",
    "fias_houseid",
    "actual",
];

const LANDMARK_COLUMNS: &[&str] = &[
    "location",
    "postalcode",
    "ifnsfl",
    "terrifnsfl",
    "ifnsul",
    "terrifnsul",
    "okato",
    "oktmo",
    "updatedate",
    "landid",
    "landguid",
    "aoguid",
    "startdate",
    "enddate",
    "normdoc",
    "cadnum",
];

const HOUSEINT_COLUMNS: &[&str] = &[
    "postalcode",
    "ifnsfl",
    "terrifnsfl",
    "ifnsul",
    "terrifnsul",
    "okato",
    "oktmo",
    "updatedate",
    "intstart",
    "intend",
    "houseintid",
    "intguid",
    "aoguid",
    "startdate",
    "enddate",
    "intstatus",
    "normdoc",
    "counter",
];

const NORDOC_COLUMNS: &[&str] = &[
    "normdocid",
    "docname",
    "docdate",
    "docnum",
    "doctype",
    "docimgid",
];

const SOCRBASE_COLUMNS: &[&str] = &["level", "scname", "socrname", "kod_t_st"];

const DATE_COLUMNS: &[&str] = &["updatedate", "startdate", "enddate", "docdate"];

/// File-name patterns in match order. More specific names come first,
/// since `ADDROBJ.DBF` is also a suffix of `DADDROBJ.DBF`.
static PATTERNS: LazyLock<Vec<(Regex, TargetSchema)>> = LazyLock::new(|| {
    [
        (r"^.*DADDROBJ\.DBF$", TargetSchema::AddressElementDeltas),
        (r"^.*ADDROBJ\.DBF$", TargetSchema::AddressElements),
        (r"^.*DLANDMRK\.DBF$", TargetSchema::LandmarkDeltas),
        (r"^.*LANDMARK\.DBF$", TargetSchema::Landmarks),
        (r"^.*DHOUSE\.DBF$", TargetSchema::HouseDeltas),
        (r"^.*DHOUSINT\.DBF$", TargetSchema::HouseIntervalDeltas),
        (r"^.*HOUSEINT\.DBF$", TargetSchema::HouseIntervals),
        (r"^.*HOUSE\d\d\.DBF$", TargetSchema::Houses),
        (r"^.*DNORDOC\.DBF$", TargetSchema::NormativeDocumentDeltas),
        (r"^.*NORDOC\d\d\.DBF$", TargetSchema::NormativeDocuments),
        (r"^.*ACTSTAT\.DBF$", TargetSchema::ActualityStatuses),
        (r"^.*CENTERST\.DBF$", TargetSchema::CenterStatuses),
        (r"^.*ESTSTAT\.DBF$", TargetSchema::EstateStatuses),
        (r"^.*HSTSTAT\.DBF$", TargetSchema::HouseStateStatuses),
        (r"^.*OPERSTAT\.DBF$", TargetSchema::OperationStatuses),
        (r"^.*INTVSTAT\.DBF$", TargetSchema::IntervalStatuses),
        (r"^.*STRSTAT\.DBF$", TargetSchema::StructureStatuses),
        (r"^.*CURENTST\.DBF$", TargetSchema::CurrentStatuses),
        (r"^.*SOCRBASE\.DBF$", TargetSchema::ShortTypeNames),
    ]
    .into_iter()
    .map(|(pattern, schema)| (Regex::new(pattern).expect("static pattern"), schema))
    .collect()
});

impl TargetSchema {
    pub const ALL: [TargetSchema; 19] = [
        TargetSchema::AddressElementDeltas,
        TargetSchema::AddressElements,
        TargetSchema::LandmarkDeltas,
        TargetSchema::Landmarks,
        TargetSchema::HouseDeltas,
        TargetSchema::HouseIntervalDeltas,
        TargetSchema::HouseIntervals,
        TargetSchema::Houses,
        TargetSchema::NormativeDocumentDeltas,
        TargetSchema::NormativeDocuments,
        TargetSchema::ActualityStatuses,
        TargetSchema::CenterStatuses,
        TargetSchema::EstateStatuses,
        TargetSchema::HouseStateStatuses,
        TargetSchema::OperationStatuses,
        TargetSchema::IntervalStatuses,
        TargetSchema::StructureStatuses,
        TargetSchema::CurrentStatuses,
        TargetSchema::ShortTypeNames,
    ];

    /// Resolve a source file name to its target schema.
    pub fn for_file_name(name: &str) -> Option<TargetSchema> {
        PATTERNS
            .iter()
            .find(|(pattern, _)| pattern.is_match(name))
            .map(|(_, schema)| *schema)
    }

    pub fn table(&self) -> &'static str {
        match self {
            TargetSchema::AddressElementDeltas => "fias_daddrobj",
            TargetSchema::AddressElements => "fias_addrobj",
            TargetSchema::LandmarkDeltas => "fias_dlandmrk",
            TargetSchema::Landmarks => "fias_landmark",
            TargetSchema::HouseDeltas => "fias_dhouse",
            TargetSchema::HouseIntervalDeltas => "fias_dhousint",
            TargetSchema::HouseIntervals => "fias_houseint",
            TargetSchema::Houses => "fias_house",
            TargetSchema::NormativeDocumentDeltas => "fias_dnordoc",
            TargetSchema::NormativeDocuments => "fias_nordoc",
            TargetSchema::ActualityStatuses => "fias_actstat",
            TargetSchema::CenterStatuses => "fias_centerst",
            TargetSchema::EstateStatuses => "fias_eststat",
            TargetSchema::HouseStateStatuses => "fias_hststat",
            TargetSchema::OperationStatuses => "fias_operstat",
            TargetSchema::IntervalStatuses => "fias_intvstat",
            TargetSchema::StructureStatuses => "fias_strstat",
            TargetSchema::CurrentStatuses => "fias_curentst",
            TargetSchema::ShortTypeNames => "fias_socrbase",
        }
    }

    /// Accepted column names, lowercase.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            TargetSchema::AddressElementDeltas | TargetSchema::AddressElements => ADDROBJ_COLUMNS,
            TargetSchema::HouseDeltas | TargetSchema::Houses => HOUSE_COLUMNS,
            TargetSchema::LandmarkDeltas | TargetSchema::Landmarks => LANDMARK_COLUMNS,
            TargetSchema::HouseIntervalDeltas | TargetSchema::HouseIntervals => HOUSEINT_COLUMNS,
            TargetSchema::NormativeDocumentDeltas | TargetSchema::NormativeDocuments => {
                NORDOC_COLUMNS
            }
            TargetSchema::ActualityStatuses => &["actstatid", "name"],
            TargetSchema::CenterStatuses => &["centerstid", "name"],
            TargetSchema::EstateStatuses => &["eststatid", "name", "shortname"],
            TargetSchema::HouseStateStatuses => &["housestid", "name"],
            TargetSchema::OperationStatuses => &["operstatid", "name"],
            TargetSchema::IntervalStatuses => &["intvstatid", "name"],
            TargetSchema::StructureStatuses => &["strstatid", "name", "shortname"],
            TargetSchema::CurrentStatuses => &["curentstid", "name"],
            TargetSchema::ShortTypeNames => SOCRBASE_COLUMNS,
        }
    }

    /// The whitelisted spelling of `name`, if the schema accepts it.
    pub fn accepted_column(&self, name: &str) -> Option<&'static str> {
        self.columns().iter().copied().find(|col| *col == name)
    }

    pub fn is_date_column(column: &str) -> bool {
        DATE_COLUMNS.contains(&column)
    }

    pub fn record_kind(&self) -> RecordKind {
        match self {
            TargetSchema::AddressElements => RecordKind::AddressElement,
            TargetSchema::Houses => RecordKind::House,
            _ => RecordKind::Auxiliary,
        }
    }

    /// Whether the optional region-code pre-filter applies to this schema.
    pub fn accepts_region_filter(&self) -> bool {
        matches!(self, TargetSchema::AddressElements)
    }
}

impl std::fmt::Display for TargetSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}
