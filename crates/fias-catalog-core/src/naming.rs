//! Human-readable names for address elements and houses.

use crate::models::{AddressElement, House, Level, OwnershipKind, StructureKind};

/// "`formalName` `shortTypeName`", trimmed. This is the per-element part of
/// the search text.
pub fn label(element: &AddressElement) -> String {
    format!(
        "{} {}",
        element.formal_name.trim(),
        element.short_type_name.trim()
    )
    .trim()
    .to_string()
}

/// Name with the type abbreviation expanded where the language has a
/// customary long form; everything else falls back to [`label`] order.
pub fn display_name(element: &AddressElement) -> String {
    let name = element.formal_name.as_str();
    let expanded = match (element.level, element.short_type_name.as_str()) {
        (Level::Region, "обл") => Some(format!("{} область", name)),
        (Level::District, "р-н") => Some(format!("{} район", name)),
        (Level::City, "г") => Some(format!("город {}", name)),
        (Level::Settlement, "д") => Some(format!("деревня {}", name)),
        (Level::Settlement, "с") => Some(format!("село {}", name)),
        (Level::Settlement, "рп") => Some(format!("рабочий поселок {}", name)),
        _ => None,
    };
    expanded.unwrap_or_else(|| format!("{} {}", name, element.short_type_name))
}

fn ownership_prefix(kind: OwnershipKind) -> &'static str {
    match kind {
        OwnershipKind::Grounds => "владение",
        OwnershipKind::HouseAndGrounds => "домовладение",
        OwnershipKind::House | OwnershipKind::Undefined => "дом",
    }
}

fn structure_prefix(kind: StructureKind) -> &'static str {
    match kind {
        StructureKind::Installation => "сооружение",
        StructureKind::Designation => "литер",
        StructureKind::Building | StructureKind::Undefined => "строение",
    }
}

/// "дом 5, корп. 2, строение 1" style name; empty parts are omitted.
pub fn house_display_name(house: &House) -> String {
    let mut parts = vec![format!(
        "{} {}",
        ownership_prefix(house.ownership_kind),
        house.house_number.trim()
    )
    .trim()
    .to_string()];
    let building = house.building_number.trim();
    if !building.is_empty() {
        parts.push(format!("корп. {}", building));
    }
    let structure = house.structure_number.trim();
    if !structure.is_empty() {
        parts.push(format!(
            "{} {}",
            structure_prefix(house.structure_kind),
            structure
        ));
    }
    parts.join(", ")
}

/// Search text with the leading (region) part dropped.
pub fn without_region(search_text: &str) -> String {
    search_text
        .split(", ")
        .skip(1)
        .collect::<Vec<_>>()
        .join(", ")
}
