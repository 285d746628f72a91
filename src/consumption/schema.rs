//! Canonical schema and column reconciliation.
//!
//! Every extract is mapped onto the same seven columns regardless of its
//! header spelling. Matching goes through [`match_key`], so accents, case and
//! surrounding whitespace never matter. Fields a file does not carry are
//! reported as absent and later materialised as all-missing columns.

use super::normalize::match_key;
use serde::Serialize;
use std::collections::HashMap;

pub const SECTION: &str = "Seccio_censal";
pub const DISTRICT: &str = "Districte";
pub const MUNICIPALITY: &str = "Municipi";
pub const DATE: &str = "Data";
pub const USAGE_RAW: &str = "Tipus_us";
pub const METERS: &str = "Numero_de_comptadors";
pub const CONSUMPTION: &str = "Consum_litres_per_dia";

/// Leaf usage category derived from [`USAGE_RAW`].
pub const USAGE: &str = "Us";
/// Display name joined from the district lookup.
pub const DISTRICT_NAME: &str = "Nom_districte";

/// How a canonical field is coerced during ingestion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    Text,
    Numeric,
    Date,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum CanonicalField {
    CensusSection,
    DistrictId,
    Municipality,
    ReadingDate,
    UsageTypeRaw,
    MeterCount,
    Consumption,
}

impl CanonicalField {
    /// Canonical insertion order.
    pub const ALL: [Self; 7] = [
        Self::CensusSection,
        Self::DistrictId,
        Self::Municipality,
        Self::ReadingDate,
        Self::UsageTypeRaw,
        Self::MeterCount,
        Self::Consumption,
    ];

    pub fn column_name(self) -> &'static str {
        match self {
            Self::CensusSection => SECTION,
            Self::DistrictId => DISTRICT,
            Self::Municipality => MUNICIPALITY,
            Self::ReadingDate => DATE,
            Self::UsageTypeRaw => USAGE_RAW,
            Self::MeterCount => METERS,
            Self::Consumption => CONSUMPTION,
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Self::CensusSection | Self::Municipality | Self::UsageTypeRaw => FieldKind::Text,
            Self::DistrictId | Self::MeterCount | Self::Consumption => FieldKind::Numeric,
            Self::ReadingDate => FieldKind::Date,
        }
    }

    /// Accepted header keys, most preferred first. The first entry is always
    /// the match key of the canonical name itself.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::CensusSection => &["seccio_censal", "seccion_censal", "census_section"],
            Self::DistrictId => &["districte", "distrito", "district_id"],
            Self::Municipality => &["municipi", "municipio", "municipality"],
            Self::ReadingDate => &["data", "fecha", "reading_date"],
            Self::UsageTypeRaw => &["tipus_us", "tipo_uso", "usage_type"],
            Self::MeterCount => &["numero_de_comptadors", "numero_de_contadores", "meter_count"],
            Self::Consumption => &[
                "consum_litres_per_dia",
                "consumo_litros_por_dia",
                "consumption_liters_per_day",
            ],
        }
    }
}

/// Column names of the canonical schema, in canonical order.
pub fn canonical_columns() -> Vec<&'static str> {
    CanonicalField::ALL
        .iter()
        .map(|field| field.column_name())
        .collect()
}

/// Source column chosen for each canonical field of one file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnMapping {
    entries: Vec<(CanonicalField, Option<String>)>,
}

impl ColumnMapping {
    /// Header in the source file backing `field`, if any.
    pub fn source(&self, field: CanonicalField) -> Option<&str> {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .and_then(|(_, source)| source.as_deref())
    }

    /// Canonical fields the file does not provide.
    pub fn absent(&self) -> Vec<CanonicalField> {
        self.entries
            .iter()
            .filter(|(_, source)| source.is_none())
            .map(|(field, _)| *field)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, Option<&str>)> + '_ {
        self.entries
            .iter()
            .map(|(field, source)| (*field, source.as_deref()))
    }
}

/// Alias key to canonical field, built once and reused for every file.
#[derive(Clone, Debug)]
pub struct AliasTable {
    by_alias: HashMap<&'static str, (CanonicalField, usize)>,
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::canonical()
    }
}

impl AliasTable {
    pub fn canonical() -> Self {
        let mut by_alias = HashMap::new();
        for field in CanonicalField::ALL {
            for (rank, alias) in field.aliases().iter().enumerate() {
                by_alias.entry(*alias).or_insert((field, rank));
            }
        }
        Self { by_alias }
    }

    /// Canonical field a header resolves to, with the alias rank it matched at.
    pub fn resolve(&self, header: &str) -> Option<(CanonicalField, usize)> {
        self.by_alias.get(match_key(header).as_str()).copied()
    }

    /// Maps `headers` onto the canonical schema. When several headers resolve to
    /// the same field the best-ranked alias wins, then the leftmost header.
    pub fn reconcile<S: AsRef<str>>(&self, headers: &[S]) -> ColumnMapping {
        let mut best: HashMap<CanonicalField, (usize, &str)> = HashMap::new();
        for header in headers {
            let header = header.as_ref();
            let Some((field, rank)) = self.resolve(header) else {
                continue;
            };
            match best.get(&field) {
                Some((current, _)) if *current <= rank => {}
                _ => {
                    best.insert(field, (rank, header));
                }
            }
        }

        let entries = CanonicalField::ALL
            .iter()
            .map(|field| {
                (
                    *field,
                    best.get(field).map(|(_, header)| (*header).to_owned()),
                )
            })
            .collect();
        ColumnMapping { entries }
    }
}

const LOOKUP_ID_ALIASES: [&str; 5] = ["id", "districte", "district", "codigo", "cod"];
const LOOKUP_NAME_ALIASES: [&str; 5] = ["nom", "nombre", "name", "districte_nom", "district_name"];

/// Id and name columns chosen for the district lookup file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupColumns {
    pub id: String,
    pub name: String,
}

fn find_alias<'a>(headers: &'a [String], aliases: &[&str]) -> Option<&'a str> {
    aliases.iter().find_map(|alias| {
        headers
            .iter()
            .find(|header| match_key(header) == *alias)
            .map(String::as_str)
    })
}

/// Looser reconciliation for the lookup table: the id and name concepts are
/// searched independently by alias, falling back to the first and second
/// columns respectively. A fallback only moves to the other of those two
/// columns when the alias match already took its slot. Fewer than two columns
/// means no usable lookup.
pub fn reconcile_lookup_columns(headers: &[String]) -> Option<LookupColumns> {
    let [first, second, ..] = headers else {
        return None;
    };
    let (first, second) = (first.as_str(), second.as_str());

    let id = find_alias(headers, &LOOKUP_ID_ALIASES);
    let name = find_alias(headers, &LOOKUP_NAME_ALIASES);

    let (id, name) = match (id, name) {
        (Some(id), Some(name)) => (id, name),
        (Some(id), None) => (id, if id == second { first } else { second }),
        (None, Some(name)) => (if name == first { second } else { first }, name),
        (None, None) => (first, second),
    };

    if id == name {
        return None;
    }

    Some(LookupColumns {
        id: id.to_owned(),
        name: name.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(headers: &[&str]) -> Vec<String> {
        headers.iter().map(|h| (*h).to_owned()).collect()
    }

    #[test]
    fn test_reconcile_tolerates_case_and_accents() {
        let table = AliasTable::canonical();
        let mapping = table.reconcile(&[
            "DISTRICTE",
            "data",
            "Tipus_Ús",
            "Secció_censal",
            "MUNICIPI",
            "Número_de_comptadors",
            "Consum_litres_per_dia",
        ]);

        assert!(mapping.absent().is_empty(), "all fields should resolve");
        assert_eq!(mapping.source(CanonicalField::DistrictId), Some("DISTRICTE"));
        assert_eq!(mapping.source(CanonicalField::UsageTypeRaw), Some("Tipus_Ús"));
        assert_eq!(mapping.source(CanonicalField::CensusSection), Some("Secció_censal"));
    }

    #[test]
    fn test_reconcile_reports_absent_fields() {
        let table = AliasTable::canonical();
        let mapping = table.reconcile(&["Data", "Consum_litres_per_dia", "extra"]);

        assert_eq!(
            mapping.absent(),
            vec![
                CanonicalField::CensusSection,
                CanonicalField::DistrictId,
                CanonicalField::Municipality,
                CanonicalField::UsageTypeRaw,
                CanonicalField::MeterCount,
            ]
        );
        let order: Vec<_> = mapping.iter().map(|(field, _)| field).collect();
        assert_eq!(order, CanonicalField::ALL.to_vec());
    }

    #[test]
    fn test_canonical_name_beats_synonym() {
        let table = AliasTable::canonical();
        let mapping = table.reconcile(&["Fecha", "Data"]);
        assert_eq!(mapping.source(CanonicalField::ReadingDate), Some("Data"));
    }

    #[test]
    fn test_duplicate_headers_keep_leftmost() {
        let table = AliasTable::canonical();
        let mapping = table.reconcile(&["data", "DATA"]);
        assert_eq!(mapping.source(CanonicalField::ReadingDate), Some("data"));
    }

    #[test]
    fn test_lookup_columns_by_alias() {
        let cols = reconcile_lookup_columns(&owned(&["Nom", "Codi", "ID"]));
        assert_eq!(
            cols,
            Some(LookupColumns {
                id: "ID".to_owned(),
                name: "Nom".to_owned()
            })
        );
    }

    #[test]
    fn test_lookup_columns_positional_fallback() {
        let cols = reconcile_lookup_columns(&owned(&["codi", "etiqueta"]));
        assert_eq!(
            cols,
            Some(LookupColumns {
                id: "codi".to_owned(),
                name: "etiqueta".to_owned()
            })
        );
    }

    #[test]
    fn test_lookup_name_falls_back_to_second_column() {
        let cols = reconcile_lookup_columns(&owned(&["codi", "etiqueta", "ID"]));
        assert_eq!(
            cols,
            Some(LookupColumns {
                id: "ID".to_owned(),
                name: "etiqueta".to_owned()
            })
        );
    }

    #[test]
    fn test_lookup_id_falls_back_to_first_column() {
        let cols = reconcile_lookup_columns(&owned(&["codi", "extra", "Nom"]));
        assert_eq!(
            cols,
            Some(LookupColumns {
                id: "codi".to_owned(),
                name: "Nom".to_owned()
            })
        );
    }

    #[test]
    fn test_lookup_name_fallback_avoids_id_column() {
        let cols = reconcile_lookup_columns(&owned(&["etiqueta", "Districte"]));
        assert_eq!(
            cols,
            Some(LookupColumns {
                id: "Districte".to_owned(),
                name: "etiqueta".to_owned()
            })
        );
    }

    #[test]
    fn test_lookup_needs_two_columns() {
        assert_eq!(reconcile_lookup_columns(&owned(&["id"])), None);
        assert_eq!(reconcile_lookup_columns(&[]), None);
    }
}
