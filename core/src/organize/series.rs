use crate::types::Record;
use log::debug;
use std::collections::HashMap;

/// Characteristics that make two records the same series
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub series_description: String,
    pub protocol_name: String,
    /// `f64::to_bits` of the echo time
    pub echo_time: u64,
    /// `f64::to_bits` of the repetition time
    pub repetition_time: u64,
    pub num_volumes: usize,
    pub direction: String,
    pub image_type: Vec<String>,
}

impl SeriesKey {
    pub fn from_record(record: &Record) -> Self {
        Self {
            series_description: record.series_description.clone(),
            protocol_name: record.protocol_name.clone(),
            echo_time: record.echo_time.to_bits(),
            repetition_time: record.repetition_time.to_bits(),
            num_volumes: record.num_volumes,
            direction: record.direction.clone(),
            image_type: record.image_type.tags.clone(),
        }
    }
}

/// Groups records into unique series
pub struct SeriesDeduplicator;

impl SeriesDeduplicator {
    /// Assigns `series_index` in order of first appearance
    ///
    /// The first record with an unseen key gets the next index; later records
    /// with an equal key share it.
    pub fn assign(mut records: Vec<Record>) -> Vec<Record> {
        let mut seen: HashMap<SeriesKey, usize> = HashMap::new();
        for record in records.iter_mut() {
            let next = seen.len();
            record.series_index = *seen.entry(SeriesKey::from_record(record)).or_insert(next);
        }
        debug!(
            "Grouped {} records into {} series",
            records.len(),
            seen.len()
        );
        records
    }
}

/// One unique series: its representative record plus member positions
#[derive(Debug, Clone)]
pub struct SeriesView<'a> {
    pub series_index: usize,
    /// First record carrying this series index
    pub representative: &'a Record,
    /// Positions of every member in the record list
    pub object_indices: Vec<usize>,
}

impl<'a> SeriesView<'a> {
    /// Rebuilds the series views from records already carrying indices
    pub fn build(records: &'a [Record]) -> Vec<SeriesView<'a>> {
        let mut views: Vec<SeriesView<'a>> = Vec::new();
        let mut position: HashMap<usize, usize> = HashMap::new();
        for (idx, record) in records.iter().enumerate() {
            match position.get(&record.series_index) {
                Some(&p) => views[p].object_indices.push(idx),
                None => {
                    position.insert(record.series_index, views.len());
                    views.push(SeriesView {
                        series_index: record.series_index,
                        representative: record,
                        object_indices: vec![idx],
                    });
                }
            }
        }
        views.sort_by_key(|v| v.series_index);
        views
    }
}
