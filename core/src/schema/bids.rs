use super::SchemaService;
use crate::error::{BidsmapError, Result};
use crate::types::IDENTITY_ENTITIES;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Canonical entity order with filename keys (BIDS 1.9)
const ENTITY_TABLE: &[(&str, &str)] = &[
    ("subject", "sub"),
    ("session", "ses"),
    ("sample", "sample"),
    ("task", "task"),
    ("tracksys", "tracksys"),
    ("acquisition", "acq"),
    ("ceagent", "ce"),
    ("staining", "stain"),
    ("tracer", "trc"),
    ("reconstruction", "rec"),
    ("direction", "dir"),
    ("run", "run"),
    ("modality", "mod"),
    ("echo", "echo"),
    ("flip", "flip"),
    ("inversion", "inv"),
    ("mtransfer", "mt"),
    ("part", "part"),
    ("processing", "proc"),
    ("hemisphere", "hemi"),
    ("space", "space"),
    ("split", "split"),
    ("recording", "recording"),
    ("chunk", "chunk"),
    ("segmentation", "seg"),
    ("resolution", "res"),
    ("density", "den"),
    ("label", "label"),
    ("description", "desc"),
];

/// One compiled-in file rule: datatype, suffixes, required, optional
type RuleRow = (
    &'static str,
    &'static [&'static str],
    &'static [&'static str],
    &'static [&'static str],
);

const FILE_RULES: &[RuleRow] = &[
    (
        "anat",
        &[
            "T1w", "T2w", "PDw", "T2starw", "FLAIR", "inplaneT1", "inplaneT2", "PDT2", "angio",
        ],
        &[],
        &[
            "task",
            "acquisition",
            "ceagent",
            "reconstruction",
            "run",
            "part",
            "chunk",
        ],
    ),
    (
        "anat",
        &[
            "T1map", "T2map", "T2starmap", "R1map", "R2map", "R2starmap", "PDmap", "MTRmap",
            "MTsat", "UNIT1", "T1rho", "MWFmap", "MTVmap", "Chimap", "S0map", "M0map",
        ],
        &[],
        &["task", "acquisition", "ceagent", "reconstruction", "run"],
    ),
    (
        "anat",
        &["MEGRE", "MESE"],
        &["echo"],
        &[
            "task",
            "acquisition",
            "ceagent",
            "reconstruction",
            "run",
            "part",
            "chunk",
        ],
    ),
    (
        "anat",
        &["MP2RAGE"],
        &["inversion"],
        &[
            "task",
            "acquisition",
            "ceagent",
            "reconstruction",
            "run",
            "echo",
            "flip",
            "part",
            "chunk",
        ],
    ),
    (
        "anat",
        &["VFA"],
        &["flip"],
        &[
            "task",
            "acquisition",
            "ceagent",
            "reconstruction",
            "run",
            "part",
            "chunk",
        ],
    ),
    (
        "anat",
        &["IRT1"],
        &["inversion"],
        &[
            "task",
            "acquisition",
            "ceagent",
            "reconstruction",
            "run",
            "part",
            "chunk",
        ],
    ),
    (
        "anat",
        &["MTR"],
        &["mtransfer"],
        &[
            "task",
            "acquisition",
            "ceagent",
            "reconstruction",
            "run",
            "part",
            "chunk",
        ],
    ),
    (
        "func",
        &["bold", "cbv", "sbref"],
        &["task"],
        &[
            "acquisition",
            "ceagent",
            "reconstruction",
            "direction",
            "run",
            "echo",
            "part",
            "chunk",
        ],
    ),
    (
        "dwi",
        &["dwi", "sbref"],
        &[],
        &[
            "acquisition",
            "reconstruction",
            "direction",
            "run",
            "part",
            "chunk",
        ],
    ),
    (
        "fmap",
        &[
            "phasediff",
            "phase1",
            "phase2",
            "magnitude1",
            "magnitude2",
            "magnitude",
            "fieldmap",
        ],
        &[],
        &["acquisition", "run", "chunk"],
    ),
    (
        "fmap",
        &["epi"],
        &["direction"],
        &["acquisition", "ceagent", "run", "chunk"],
    ),
    (
        "perf",
        &["asl", "m0scan"],
        &[],
        &["acquisition", "reconstruction", "direction", "run"],
    ),
];

/// Requirement level of an entity within a file rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementLevel {
    Required,
    Optional,
}

/// Entity definition: full name and filename key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    pub key: String,
}

/// Suffixes sharing one entity rule set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRule {
    pub suffixes: Vec<String>,
    pub entities: IndexMap<String, RequirementLevel>,
}

/// Serialised schema snapshot
///
/// ```json
/// {
///   "bids_version": "1.9.0",
///   "entities": [{"name": "subject", "key": "sub"}, ...],
///   "rules": {"anat": [{"suffixes": ["T1w"], "entities": {"run": "optional"}}]}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub bids_version: String,
    pub entities: Vec<EntityDef>,
    pub rules: IndexMap<String, Vec<FileRule>>,
}

/// In-memory BIDS naming rules
#[derive(Debug, Clone)]
pub struct BidsSchema {
    bids_version: String,
    order: Vec<String>,
    short_keys: HashMap<String, String>,
    rules: IndexMap<String, Vec<FileRule>>,
}

impl BidsSchema {
    /// Compiled-in BIDS 1.9 rules
    pub fn builtin() -> Self {
        let mut rules: IndexMap<String, Vec<FileRule>> = IndexMap::new();
        for (datatype, suffixes, required, optional) in FILE_RULES {
            let mut entities = IndexMap::new();
            for name in IDENTITY_ENTITIES {
                let level = if name == "subject" {
                    RequirementLevel::Required
                } else {
                    RequirementLevel::Optional
                };
                entities.insert(name.to_string(), level);
            }
            for name in *required {
                entities.insert(name.to_string(), RequirementLevel::Required);
            }
            for name in *optional {
                entities.insert(name.to_string(), RequirementLevel::Optional);
            }
            rules.entry(datatype.to_string()).or_default().push(FileRule {
                suffixes: suffixes.iter().map(|s| s.to_string()).collect(),
                entities,
            });
        }

        Self {
            bids_version: "1.9.0".to_string(),
            order: ENTITY_TABLE.iter().map(|(n, _)| n.to_string()).collect(),
            short_keys: ENTITY_TABLE
                .iter()
                .map(|(n, k)| (n.to_string(), k.to_string()))
                .collect(),
            rules,
        }
    }

    /// Builds a schema from a snapshot
    ///
    /// # Errors
    ///
    /// Fails when the snapshot has no entities, or a rule references an
    /// entity missing from the entity list.
    pub fn from_snapshot(snapshot: SchemaSnapshot) -> Result<Self> {
        if snapshot.entities.is_empty() {
            return Err(BidsmapError::SchemaError(
                "snapshot defines no entities".to_string(),
            ));
        }

        let order: Vec<String> = snapshot.entities.iter().map(|e| e.name.clone()).collect();
        for (datatype, rules) in &snapshot.rules {
            for rule in rules {
                if let Some(unknown) = rule.entities.keys().find(|n| !order.contains(n)) {
                    return Err(BidsmapError::SchemaError(format!(
                        "rule for {}/{:?} references unknown entity '{}'",
                        datatype, rule.suffixes, unknown
                    )));
                }
            }
        }

        Ok(Self {
            bids_version: snapshot.bids_version,
            short_keys: snapshot
                .entities
                .into_iter()
                .map(|e| (e.name, e.key))
                .collect(),
            order,
            rules: snapshot.rules,
        })
    }

    /// Parses a JSON snapshot
    pub fn from_json_str(text: &str) -> Result<Self> {
        let snapshot: SchemaSnapshot = serde_json::from_str(text)?;
        Self::from_snapshot(snapshot)
    }

    /// Loads a JSON snapshot from disk
    pub fn from_json_file(path: &Path) -> Result<Self> {
        debug!("Loading schema snapshot {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| {
            BidsmapError::SchemaError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    /// Exports the rules as a snapshot
    pub fn snapshot(&self) -> SchemaSnapshot {
        SchemaSnapshot {
            bids_version: self.bids_version.clone(),
            entities: self
                .order
                .iter()
                .map(|name| EntityDef {
                    name: name.clone(),
                    key: self.entity_short_key(name),
                })
                .collect(),
            rules: self.rules.clone(),
        }
    }

    /// Known datatypes, in rule order
    pub fn datatypes(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    fn rule_for(&self, datatype: &str, suffix: &str) -> Option<&FileRule> {
        self.rules
            .get(datatype)?
            .iter()
            .find(|rule| rule.suffixes.iter().any(|s| s == suffix))
    }

    fn entities_at(&self, datatype: &str, suffix: &str, level: Option<RequirementLevel>) -> Vec<String> {
        self.rule_for(datatype, suffix)
            .map(|rule| {
                rule.entities
                    .iter()
                    .filter(|(name, l)| {
                        !IDENTITY_ENTITIES.contains(&name.as_str())
                            && level.map_or(true, |wanted| **l == wanted)
                    })
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for BidsSchema {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SchemaService for BidsSchema {
    fn bids_version(&self) -> &str {
        &self.bids_version
    }

    fn entity_order(&self) -> &[String] {
        &self.order
    }

    fn entity_short_key(&self, name: &str) -> String {
        self.short_keys
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.chars().take(3).collect())
    }

    fn required_entities(&self, datatype: &str, suffix: &str) -> Vec<String> {
        self.entities_at(datatype, suffix, Some(RequirementLevel::Required))
    }

    fn allowed_entities(&self, datatype: &str, suffix: &str) -> Vec<String> {
        self.entities_at(datatype, suffix, None)
    }

    fn check_suffix(&self, datatype: &str, suffix: &str) -> std::result::Result<(), String> {
        match self.rules.get(datatype) {
            None => Err(format!("Unknown datatype: {}", datatype)),
            Some(rules) if rules.iter().any(|r| r.suffixes.iter().any(|s| s == suffix)) => Ok(()),
            Some(_) => Err(format!(
                "Invalid suffix '{}' for datatype '{}'",
                suffix, datatype
            )),
        }
    }
}
