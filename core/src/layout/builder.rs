use crate::schema::SchemaService;
use crate::types::{Entities, Record};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Planned location of one record, relative to the dataset root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedName {
    /// `sub-<id>[/ses-<id>]/<datatype>`
    pub directory: PathBuf,
    /// File name without extension, suffix included
    pub stem: String,
    /// Entities actually rendered, after any run injection
    pub entities: Entities,
}

impl PlannedName {
    /// File name for an extension given with its leading dot
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}{}", self.stem, extension)
    }

    /// Relative path for an extension given with its leading dot
    pub fn path(&self, extension: &str) -> PathBuf {
        self.directory.join(self.file_name(extension))
    }
}

/// Registry key: directory, filename without its run token, suffix
type CollisionKey = (PathBuf, String, String);

/// Computes collision-free BIDS directories and filenames
///
/// One builder is used for one dataset; it remembers every name it handed
/// out. The first record of a (directory, entities without run, suffix)
/// key keeps its name; every later one gets a `run` label one higher than
/// the number of records seen for that key, bumped further while the
/// resulting path is already taken.
pub struct LayoutBuilder<'a> {
    schema: &'a dyn SchemaService,
    counts: HashMap<CollisionKey, usize>,
    emitted: HashSet<PathBuf>,
}

impl<'a> LayoutBuilder<'a> {
    pub fn new(schema: &'a dyn SchemaService) -> Self {
        Self {
            schema,
            counts: HashMap::new(),
            emitted: HashSet::new(),
        }
    }

    /// Relative output directory
    pub fn directory(subject: &str, session: &str, datatype: &str) -> PathBuf {
        let mut dir = PathBuf::from(format!("sub-{}", subject));
        if !session.is_empty() {
            dir.push(format!("ses-{}", session));
        }
        dir.push(datatype);
        dir
    }

    /// Joined `<key>-<label>` tokens in canonical order
    ///
    /// Entities unknown to the schema follow the known ones, keyed by their
    /// short key fallback. Empty labels are skipped.
    pub fn entity_tokens(&self, subject: &str, session: &str, entities: &Entities) -> String {
        let mut tokens = vec![format!("{}-{}", self.schema.entity_short_key("subject"), subject)];
        if !session.is_empty() {
            tokens.push(format!(
                "{}-{}",
                self.schema.entity_short_key("session"),
                session
            ));
        }
        for (name, label) in entities.reordered(self.schema.entity_order()).iter() {
            if !label.is_empty() {
                tokens.push(format!("{}-{}", self.schema.entity_short_key(name), label));
            }
        }
        tokens.join("_")
    }

    /// Plans the name of one file set
    pub fn plan(
        &mut self,
        subject: &str,
        session: &str,
        datatype: &str,
        suffix: &str,
        entities: &Entities,
    ) -> PlannedName {
        let directory = Self::directory(subject, session, datatype);

        let mut without_run = entities.clone();
        without_run.remove("run");
        let key = (
            directory.clone(),
            self.entity_tokens(subject, session, &without_run),
            suffix.to_string(),
        );

        let count = self.counts.entry(key).or_insert(0);
        *count += 1;
        let mut run = *count;

        let mut rendered = entities.clone();
        if run > 1 {
            rendered.insert("run", format!("{:02}", run));
        }
        let mut stem = format!(
            "{}_{}",
            self.entity_tokens(subject, session, &rendered),
            suffix
        );

        while self.emitted.contains(&directory.join(&stem)) {
            run += 1;
            rendered.insert("run", format!("{:02}", run));
            stem = format!(
                "{}_{}",
                self.entity_tokens(subject, session, &rendered),
                suffix
            );
        }
        if run > 1 {
            debug!("{}/{} collides, using run {:02}", directory.display(), stem, run);
        }

        self.emitted.insert(directory.join(&stem));
        PlannedName {
            directory,
            stem,
            entities: rendered.reordered(self.schema.entity_order()),
        }
    }

    /// Plans a record; excluded and unclassified records get no name
    pub fn plan_record(&mut self, record: &Record) -> Option<PlannedName> {
        if !record.is_classified() {
            return None;
        }
        Some(self.plan(
            &record.subject,
            &record.session,
            &record.datatype,
            &record.suffix,
            &record.entities,
        ))
    }

    /// Plans every record in order with a fresh registry
    pub fn plan_all(
        schema: &'a dyn SchemaService,
        records: &[Record],
    ) -> Vec<Option<PlannedName>> {
        let mut builder = Self::new(schema);
        records.iter().map(|r| builder.plan_record(r)).collect()
    }

    /// True when a path (relative, extension-less) was already handed out
    pub fn is_emitted(&self, path: &Path) -> bool {
        self.emitted.contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::BidsSchema;

    fn entities(pairs: &[(&str, &str)]) -> Entities {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_directory() {
        assert_eq!(
            LayoutBuilder::directory("01", "", "anat"),
            PathBuf::from("sub-01/anat")
        );
        assert_eq!(
            LayoutBuilder::directory("01", "pre", "func"),
            PathBuf::from("sub-01/ses-pre/func")
        );
    }

    #[test]
    fn test_canonical_stem() {
        let schema = BidsSchema::builtin();
        let mut builder = LayoutBuilder::new(&schema);
        let planned = builder.plan(
            "01",
            "a",
            "func",
            "bold",
            &entities(&[("run", "01"), ("direction", "AP"), ("task", "rest")]),
        );
        assert_eq!(planned.stem, "sub-01_ses-a_task-rest_dir-AP_run-01_bold");
        assert_eq!(
            planned.path(".nii.gz"),
            PathBuf::from("sub-01/ses-a/func/sub-01_ses-a_task-rest_dir-AP_run-01_bold.nii.gz")
        );
    }

    #[test]
    fn test_collision_injects_run() {
        let schema = BidsSchema::builtin();
        let mut builder = LayoutBuilder::new(&schema);
        let task = entities(&[("task", "rest")]);
        let first = builder.plan("01", "", "func", "bold", &task);
        let second = builder.plan("01", "", "func", "bold", &task);
        let third = builder.plan("01", "", "func", "bold", &task);
        assert_eq!(first.stem, "sub-01_task-rest_bold");
        assert_eq!(second.stem, "sub-01_task-rest_run-02_bold");
        assert_eq!(third.stem, "sub-01_task-rest_run-03_bold");
        assert_eq!(second.entities.get("run"), Some("02"));
    }

    #[test]
    fn test_explicit_run_not_overwritten() {
        let schema = BidsSchema::builtin();
        let mut builder = LayoutBuilder::new(&schema);
        let explicit = builder.plan(
            "01",
            "",
            "func",
            "bold",
            &entities(&[("task", "rest"), ("run", "02")]),
        );
        let plain = builder.plan("01", "", "func", "bold", &entities(&[("task", "rest")]));
        assert_eq!(explicit.stem, "sub-01_task-rest_run-02_bold");
        assert_eq!(plain.stem, "sub-01_task-rest_run-03_bold");
    }

    #[test]
    fn test_distinct_keys_do_not_collide() {
        let schema = BidsSchema::builtin();
        let mut builder = LayoutBuilder::new(&schema);
        let a = builder.plan("01", "", "anat", "T1w", &Entities::new());
        let b = builder.plan("01", "", "anat", "T2w", &Entities::new());
        let c = builder.plan("02", "", "anat", "T1w", &Entities::new());
        assert_eq!(a.stem, "sub-01_T1w");
        assert_eq!(b.stem, "sub-01_T2w");
        assert_eq!(c.stem, "sub-02_T1w");
        assert!(builder.is_emitted(Path::new("sub-02/anat/sub-02_T1w")));
    }

    #[test]
    fn test_unknown_entity_uses_short_key_fallback() {
        let schema = BidsSchema::builtin();
        let builder = LayoutBuilder::new(&schema);
        let tokens = builder.entity_tokens("01", "", &entities(&[("custom", "x")]));
        assert_eq!(tokens, "sub-01_cus-x");
    }
}
