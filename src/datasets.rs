//! Loading rating datasets from delimited text files.
//!
//! Two layouts are supported: a log of `user,item,rating[,timestamp]` rows
//! and a dense user-by-item matrix where blank or `nan` cells carry no
//! rating. Raw identifiers of a log are compacted into dense indices.
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv;
use failure;
use ndarray::Array2;

use data::{Rating, Ratings};
use Timestamp;

/// Dataset error types.
#[derive(Debug, Fail)]
pub enum DatasetError {
    /// A row could not be parsed.
    #[fail(display = "Malformed row at line {}: {}", line, reason)]
    MalformedRow {
        /// 1-based line of the row.
        line: u64,
        /// What was wrong with it.
        reason: String,
    },
    /// The file holds no ratings.
    #[fail(display = "The dataset contains no ratings.")]
    EmptyDataset,
}

/// Layout of a rating log file.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogFormat {
    delimiter: u8,
    has_header: bool,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat {
            delimiter: b',',
            has_header: false,
        }
    }
}

impl LogFormat {
    /// Comma-delimited, no header.
    pub fn new() -> Self {
        LogFormat::default()
    }

    /// Set the field delimiter.
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Skip the first row of the file.
    pub fn has_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }
}

/// Bidirectional mapping between raw identifiers and dense indices.
///
/// Indices follow the sorted order of the raw identifiers: numerically if
/// every identifier is an integer, lexicographically otherwise.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IdMap {
    raw: Vec<String>,
    index: HashMap<String, usize>,
}

impl IdMap {
    fn from_raw<'a, I: IntoIterator<Item = &'a str>>(ids: I) -> Self {
        let mut raw: Vec<String> = ids.into_iter().map(|id| id.to_owned()).collect();

        // Ties on the parsed value are broken by spelling so that equal
        // strings end up adjacent before deduplication.
        if raw.iter().all(|id| id.parse::<i64>().is_ok()) {
            raw.sort_by(|x, y| {
                let key = |id: &str| id.parse::<i64>().unwrap_or(0);
                key(x).cmp(&key(y)).then_with(|| x.cmp(y))
            });
        } else {
            raw.sort();
        }
        raw.dedup();

        let index = raw
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect();

        IdMap { raw, index }
    }

    fn sequential(len: usize) -> Self {
        let ids: Vec<String> = (0..len).map(|idx| idx.to_string()).collect();

        IdMap::from_raw(ids.iter().map(|id| id.as_str()))
    }

    /// Number of distinct identifiers.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Dense index of a raw identifier.
    pub fn get(&self, raw: &str) -> Option<usize> {
        self.index.get(raw).cloned()
    }

    /// Raw identifier of a dense index.
    pub fn raw(&self, idx: usize) -> Option<&str> {
        self.raw.get(idx).map(|id| id.as_str())
    }
}

/// Ratings together with the identifier mappings they were built with.
#[derive(Clone, Debug)]
pub struct Dataset {
    /// The loaded triplets.
    pub ratings: Ratings,
    /// Raw user identifiers.
    pub users: IdMap,
    /// Raw item identifiers.
    pub items: IdMap,
}

struct RawRow {
    user: String,
    item: String,
    rating: f32,
    timestamp: Timestamp,
}

fn malformed(record: &csv::StringRecord, reason: String) -> DatasetError {
    DatasetError::MalformedRow {
        line: record.position().map_or(0, |position| position.line()),
        reason,
    }
}

fn parse_log_row(record: &csv::StringRecord) -> Result<RawRow, DatasetError> {
    if record.len() < 3 || record.len() > 4 {
        return Err(malformed(
            record,
            format!("expected 3 or 4 fields, found {}", record.len()),
        ));
    }

    let rating = record[2]
        .parse::<f32>()
        .map_err(|error| malformed(record, format!("invalid rating {:?}: {}", &record[2], error)))?;
    let timestamp = match record.get(3) {
        Some(value) => value.parse::<Timestamp>().map_err(|error| {
            malformed(record, format!("invalid timestamp {:?}: {}", value, error))
        })?,
        None => 0,
    };

    Ok(RawRow {
        user: record[0].to_owned(),
        item: record[1].to_owned(),
        rating,
        timestamp,
    })
}

/// Read a rating log from any reader.
pub fn read_log<R: Read>(reader: R, format: LogFormat) -> Result<Dataset, failure::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(format.delimiter)
        .has_headers(format.has_header)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;

        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        rows.push(parse_log_row(&record)?);
    }

    if rows.is_empty() {
        return Err(DatasetError::EmptyDataset.into());
    }

    let users = IdMap::from_raw(rows.iter().map(|row| row.user.as_str()));
    let items = IdMap::from_raw(rows.iter().map(|row| row.item.as_str()));

    let mut ratings = Ratings::new(users.len(), items.len());
    for row in &rows {
        if let (Some(user_id), Some(item_id)) = (users.get(&row.user), items.get(&row.item)) {
            ratings.push(Rating::new(user_id, item_id, row.rating, row.timestamp));
        }
    }

    info!(
        ratings = ratings.len(),
        users = users.len(),
        items = items.len(),
        "loaded rating log"
    );

    Ok(Dataset {
        ratings,
        users,
        items,
    })
}

/// Load a rating log file.
pub fn load_log<P: AsRef<Path>>(path: P, format: LogFormat) -> Result<Dataset, failure::Error> {
    read_log(File::open(path)?, format)
}

fn parse_cell(record: &csv::StringRecord, column: usize) -> Result<f32, DatasetError> {
    let value = &record[column];

    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        return Ok(::std::f32::NAN);
    }

    value
        .parse::<f32>()
        .map_err(|error| malformed(record, format!("invalid cell {:?}: {}", value, error)))
}

/// Read a dense rating matrix from any reader. Rows are users and columns
/// are items.
pub fn read_matrix<R: Read>(reader: R, delimiter: u8) -> Result<Dataset, failure::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut cells = Vec::new();
    let mut num_users = 0;
    let mut num_items = None;

    for record in reader.records() {
        let record = record?;

        match num_items {
            None => num_items = Some(record.len()),
            Some(expected) if expected != record.len() => {
                return Err(malformed(
                    &record,
                    format!("expected {} columns, found {}", expected, record.len()),
                ).into());
            }
            Some(_) => {}
        }

        for column in 0..record.len() {
            cells.push(parse_cell(&record, column)?);
        }
        num_users += 1;
    }

    let num_items = num_items.unwrap_or(0);
    let matrix = Array2::from_shape_vec((num_users, num_items), cells)?;
    let ratings = Ratings::from_matrix(&matrix);

    if ratings.is_empty() {
        return Err(DatasetError::EmptyDataset.into());
    }

    info!(
        ratings = ratings.len(),
        users = num_users,
        items = num_items,
        "loaded rating matrix"
    );

    Ok(Dataset {
        ratings,
        users: IdMap::sequential(num_users),
        items: IdMap::sequential(num_items),
    })
}

/// Load a dense rating matrix file.
pub fn load_matrix<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Dataset, failure::Error> {
    read_matrix(File::open(path)?, delimiter)
}
