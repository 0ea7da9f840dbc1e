//! Well identifiers and the well/condition mapping
//!
//! The plate is a fixed 4x6 grid: rows A-D, columns 1-6, 24 wells total.
//! The mapping from wells to conditions is built once from the experiment
//! config and is immutable afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ExperimentConfig;
use crate::error::{MeaError, Result};

/// A validated well identifier on the 4x6 plate (A1-D6).
///
/// Construction canonicalizes the raw string (trim, uppercase) and rejects
/// anything outside the grid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WellId(String);

impl WellId {
    pub fn parse(raw: &str) -> Result<Self> {
        let canonical = raw.trim().to_uppercase();
        let mut chars = canonical.chars();
        let row = chars.next();
        let col = chars.next();
        let valid = chars.next().is_none()
            && matches!(row, Some('A'..='D'))
            && matches!(col, Some('1'..='6'));
        if !valid {
            return Err(MeaError::InvalidWell {
                raw: raw.to_string(),
            });
        }
        Ok(WellId(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// All 24 wells in row-major order (A1..A6, B1..B6, ...).
    pub fn all() -> Vec<WellId> {
        let mut wells = Vec::with_capacity(24);
        for row in ['A', 'B', 'C', 'D'] {
            for col in 1..=6 {
                wells.push(WellId(format!("{}{}", row, col)));
            }
        }
        wells
    }
}

impl fmt::Display for WellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WellId {
    type Err = MeaError;

    fn from_str(s: &str) -> Result<Self> {
        WellId::parse(s)
    }
}

impl TryFrom<String> for WellId {
    type Error = MeaError;

    fn try_from(s: String) -> Result<Self> {
        WellId::parse(&s)
    }
}

impl From<WellId> for String {
    fn from(w: WellId) -> String {
        w.0
    }
}

/// Immutable bidirectional mapping between wells and conditions.
///
/// Built from the experiment config; construction fails if a well is
/// assigned to more than one condition or appears both in `ignore_wells`
/// and in a condition.
#[derive(Debug, Clone)]
pub struct WellConditionMap {
    well_to_condition: BTreeMap<WellId, String>,
    condition_to_color: BTreeMap<String, String>,
    ignored: BTreeSet<WellId>,
}

impl WellConditionMap {
    pub fn from_config(config: &ExperimentConfig) -> Result<Self> {
        let mut well_to_condition = BTreeMap::new();
        let mut condition_to_color = BTreeMap::new();

        for (name, spec) in &config.conditions {
            for raw in &spec.wells {
                let well = WellId::parse(raw)?;
                if let Some(first) = well_to_condition.get(&well) {
                    return Err(MeaError::DuplicateWellAssignment {
                        well: well.to_string(),
                        first: String::clone(first),
                        second: name.clone(),
                    });
                }
                well_to_condition.insert(well, name.clone());
            }
            condition_to_color.insert(name.clone(), spec.color.clone());
        }

        let mut ignored = BTreeSet::new();
        for raw in &config.ignore_wells {
            let well = WellId::parse(raw)?;
            if let Some(condition) = well_to_condition.get(&well) {
                return Err(MeaError::IgnoredWellConflict {
                    well: well.to_string(),
                    condition: condition.clone(),
                });
            }
            ignored.insert(well);
        }

        log::info!(
            "Created well mapping: {} wells across {} conditions ({} ignored)",
            well_to_condition.len(),
            condition_to_color.len(),
            ignored.len()
        );

        Ok(WellConditionMap {
            well_to_condition,
            condition_to_color,
            ignored,
        })
    }

    /// The condition a well is assigned to, if any. Unassigned wells are
    /// not implicitly any condition.
    pub fn condition_of(&self, well: &WellId) -> Option<&str> {
        self.well_to_condition.get(well).map(String::as_str)
    }

    /// The display color of a condition.
    pub fn color_of(&self, condition: &str) -> Option<&str> {
        self.condition_to_color.get(condition).map(String::as_str)
    }

    pub fn is_ignored(&self, well: &WellId) -> bool {
        self.ignored.contains(well)
    }

    pub fn well_to_condition(&self) -> &BTreeMap<WellId, String> {
        &self.well_to_condition
    }

    pub fn condition_to_color(&self) -> &BTreeMap<String, String> {
        &self.condition_to_color
    }

    pub fn ignored_wells(&self) -> &BTreeSet<WellId> {
        &self.ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConditionSpec;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn config_with(conditions: Vec<(&str, Vec<&str>)>, ignore: Vec<&str>) -> ExperimentConfig {
        let mut yaml = String::from("experiment:\n  plate_id: P1\n  data_dir: raw\nconditions:\n");
        for (name, wells) in &conditions {
            yaml.push_str(&format!(
                "  {}:\n    wells: [{}]\n    color: \"#000000\"\n",
                name,
                wells.join(", ")
            ));
        }
        if !ignore.is_empty() {
            yaml.push_str(&format!("ignore_wells: [{}]\n", ignore.join(", ")));
        }
        serde_yaml::from_str(&yaml).unwrap()
    }

    #[test]
    fn test_well_id_canonicalization() {
        assert_eq!(WellId::parse(" a1 ").unwrap().as_str(), "A1");
        assert_eq!(WellId::parse("d6").unwrap().as_str(), "D6");
    }

    #[test]
    fn test_well_id_rejects_outside_grid() {
        for raw in ["E1", "A7", "A0", "AA1", "A", "", "1A"] {
            assert!(WellId::parse(raw).is_err(), "should reject '{}'", raw);
        }
    }

    #[test]
    fn test_all_wells_count() {
        assert_eq!(WellId::all().len(), 24);
    }

    #[test]
    fn test_mapping_and_colors() {
        let config = config_with(
            vec![("Control", vec!["A1", "A2"]), ("Drug", vec!["B1"])],
            vec!["D6"],
        );
        let map = WellConditionMap::from_config(&config).unwrap();

        assert_eq!(
            map.condition_of(&WellId::parse("A1").unwrap()),
            Some("Control")
        );
        assert_eq!(map.condition_of(&WellId::parse("B1").unwrap()), Some("Drug"));
        assert_eq!(map.condition_of(&WellId::parse("C4").unwrap()), None);
        assert_eq!(map.color_of("Control"), Some("#000000"));
        assert!(map.is_ignored(&WellId::parse("d6").unwrap()));
    }

    #[test]
    fn test_duplicate_assignment_fails() {
        let config = config_with(
            vec![("Control", vec!["A1", "A2"]), ("Drug", vec!["A2", "B1"])],
            vec![],
        );
        let err = WellConditionMap::from_config(&config).unwrap_err();
        assert!(matches!(err, MeaError::DuplicateWellAssignment { .. }));
    }

    #[test]
    fn test_ignored_overlap_fails() {
        let config = config_with(vec![("Control", vec!["A1"])], vec!["A1"]);
        let err = WellConditionMap::from_config(&config).unwrap_err();
        assert!(matches!(err, MeaError::IgnoredWellConflict { .. }));
    }

    #[test]
    fn test_random_disjoint_partitions_are_injective() {
        // Any disjoint partition of the 24 wells must build, and the
        // resulting mapping must send each assigned well to exactly one
        // condition. Introducing a single overlap must fail construction.
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);

        for _ in 0..50 {
            let mut wells: Vec<WellId> = WellId::all();
            wells.shuffle(&mut rng);
            let k = rng.gen_range(2..=4);
            let per_group = wells.len() / k;

            let names = ["G1", "G2", "G3", "G4"];
            let mut conditions: Vec<(&str, Vec<String>)> = Vec::new();
            for (i, chunk) in wells.chunks(per_group).take(k).enumerate() {
                conditions.push((names[i], chunk.iter().map(|w| w.to_string()).collect()));
            }

            let config = config_with(
                conditions
                    .iter()
                    .map(|(n, ws)| (*n, ws.iter().map(String::as_str).collect()))
                    .collect(),
                vec![],
            );
            let map = WellConditionMap::from_config(&config).unwrap();

            let assigned: usize = conditions.iter().map(|(_, ws)| ws.len()).sum();
            assert_eq!(map.well_to_condition().len(), assigned);

            // Overlap: copy one well from the first group into the last.
            let mut overlapping = conditions.clone();
            let stolen = overlapping[0].1[0].clone();
            overlapping.last_mut().unwrap().1.push(stolen);
            let bad_config = config_with(
                overlapping
                    .iter()
                    .map(|(n, ws)| (*n, ws.iter().map(String::as_str).collect()))
                    .collect(),
                vec![],
            );
            assert!(WellConditionMap::from_config(&bad_config).is_err());
        }
    }
}
