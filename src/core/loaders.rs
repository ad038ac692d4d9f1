//! Data loaders for labeled drop coordinate CSV files.
//!
//! The input table has one row per observed drop with `Label`, `X` and `Y`
//! columns. Rows are grouped by label into deduplicated [`PointSet`]s.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use log::debug;
use thiserror::Error;

/// Accepted spellings of the label column header.
const LABEL_COLUMNS: &[&str] = &["Label", "label", "LABEL"];
/// Accepted spellings of the x column header. Some exporters leave a trailing comma.
const X_COLUMNS: &[&str] = &["X", "X,", "x", "x,"];
/// Accepted spellings of the y column header.
const Y_COLUMNS: &[&str] = &["Y", "Y,", "y", "y,"];

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),

    #[error("Row {row}: cannot parse coordinates ({x}, {y})")]
    ParseError { row: usize, x: String, y: String },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// A single observed drop position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Bit pattern used for exact coordinate identity. `-0.0` and `0.0` collapse.
    #[inline]
    fn key(&self) -> (u64, u64) {
        ((self.x + 0.0).to_bits(), (self.y + 0.0).to_bits())
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Drops belonging to one image label, without coordinate-identical duplicates.
///
/// Insertion order of the first occurrence of each point is preserved.
#[derive(Debug, Clone, Default)]
pub struct PointSet {
    label: String,
    points: Vec<Point>,
    seen: HashSet<(u64, u64)>,
}

impl PointSet {
    /// Creates an empty set for the given label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            points: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Builds a set from any iterator of points, dropping duplicates.
    pub fn from_points<I, P>(label: impl Into<String>, points: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Point>,
    {
        let mut set = Self::new(label);
        for point in points {
            set.push(point.into());
        }
        set
    }

    /// Adds a point. Returns `false` if an identical point was already present.
    pub fn push(&mut self, point: Point) -> bool {
        if !self.seen.insert(point.key()) {
            return false;
        }
        self.points.push(point);
        true
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A label requested by the caller, either backed by data or absent from the input.
#[derive(Debug, Clone, Copy)]
pub enum LabelGroup<'a> {
    Present(&'a PointSet),
    Absent(&'a str),
}

impl<'a> LabelGroup<'a> {
    pub fn label(&self) -> &'a str {
        match *self {
            LabelGroup::Present(set) => set.label(),
            LabelGroup::Absent(label) => label,
        }
    }
}

/// All point sets read from one input table, keyed by label.
#[derive(Debug, Clone, Default)]
pub struct DropTable {
    sets: BTreeMap<String, PointSet>,
    /// Rows read, including ones later dropped as duplicates.
    rows: usize,
}

impl DropTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a drop under `label`. Duplicate coordinates are ignored.
    pub fn insert(&mut self, label: &str, point: Point) {
        self.rows += 1;
        self.sets
            .entry(label.to_string())
            .or_insert_with(|| PointSet::new(label))
            .push(point);
    }

    pub fn get(&self, label: &str) -> Option<&PointSet> {
        self.sets.get(label)
    }

    /// Labels present in the table, sorted.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    pub fn sets(&self) -> impl Iterator<Item = &PointSet> {
        self.sets.values()
    }

    /// Number of distinct labels.
    #[inline]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Number of unique points across all labels.
    pub fn total_points(&self) -> usize {
        self.sets.values().map(PointSet::len).sum()
    }

    /// Number of data rows read, before deduplication.
    #[inline]
    pub fn rows_read(&self) -> usize {
        self.rows
    }

    /// Resolve the labels the caller expects into groups.
    ///
    /// An empty `expected` list selects every label in the table, in sorted
    /// order. Otherwise the expected order is kept and labels without data
    /// become [`LabelGroup::Absent`].
    pub fn groups<'a>(&'a self, expected: &'a [String]) -> Vec<LabelGroup<'a>> {
        if expected.is_empty() {
            return self.sets.values().map(LabelGroup::Present).collect();
        }

        expected
            .iter()
            .map(|label| match self.sets.get(label) {
                Some(set) if !set.is_empty() => LabelGroup::Present(set),
                _ => LabelGroup::Absent(label.as_str()),
            })
            .collect()
    }
}

/// Header positions for the three required columns, in alias priority order.
struct Columns {
    label: Vec<usize>,
    x: Vec<usize>,
    y: Vec<usize>,
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Result<Self> {
        let find = |aliases: &[&str]| -> Vec<usize> {
            aliases
                .iter()
                .filter_map(|alias| headers.iter().position(|h| h == *alias))
                .collect()
        };

        let columns = Self {
            label: find(LABEL_COLUMNS),
            x: find(X_COLUMNS),
            y: find(Y_COLUMNS),
        };

        let mut missing = Vec::new();
        if columns.label.is_empty() {
            missing.push("Label");
        }
        if columns.x.is_empty() {
            missing.push("X");
        }
        if columns.y.is_empty() {
            missing.push("Y");
        }
        if !missing.is_empty() {
            return Err(LoaderError::MissingColumns(missing.join(", ")));
        }

        Ok(columns)
    }
}

/// First non-empty value among the candidate columns.
fn field<'r>(record: &'r StringRecord, candidates: &[usize]) -> &'r str {
    candidates
        .iter()
        .filter_map(|&i| record.get(i))
        .find(|value| !value.is_empty())
        .unwrap_or("")
}

/// Read a drop table from any CSV source.
///
/// Rows with a blank label are skipped. Coordinates that fail to parse, or
/// parse to a non-finite value, abort the load with the 1-based data row number.
pub fn read_drop_csv<R: Read>(source: R) -> Result<DropTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    let columns = Columns::resolve(&headers)?;

    let mut table = DropTable::new();

    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        let row = idx + 1;

        let label = field(&record, &columns.label);
        if label.is_empty() {
            continue;
        }

        let x_raw = field(&record, &columns.x);
        let y_raw = field(&record, &columns.y);
        let (x, y) = match (x_raw.parse::<f64>(), y_raw.parse::<f64>()) {
            (Ok(x), Ok(y)) if x.is_finite() && y.is_finite() => (x, y),
            _ => {
                return Err(LoaderError::ParseError {
                    row,
                    x: x_raw.to_string(),
                    y: y_raw.to_string(),
                })
            }
        };

        table.insert(label, Point::new(x, y));
    }

    debug!(
        "Read {} rows into {} labels ({} unique points)",
        table.rows_read(),
        table.len(),
        table.total_points()
    );

    Ok(table)
}

/// Load a drop table from a CSV file with `Label`, `X`, `Y` columns.
///
/// # Errors
///
/// Returns an error if the file cannot be read, lacks a required column,
/// contains unparseable coordinates, or yields no labeled rows.
pub fn load_drop_csv<P: AsRef<Path>>(path: P) -> Result<DropTable> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let table = read_drop_csv(BufReader::new(file))?;

    if table.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_point_set_dedup() {
        let mut set = PointSet::new("A.tif");
        assert!(set.push(Point::new(1.0, 2.0)));
        assert!(set.push(Point::new(3.0, 4.0)));
        assert!(!set.push(Point::new(1.0, 2.0)));

        assert_eq!(set.len(), 2);
        assert_eq!(set.points()[0], Point::new(1.0, 2.0));
        assert_eq!(set.points()[1], Point::new(3.0, 4.0));
    }

    #[test]
    fn test_point_set_signed_zero_is_duplicate() {
        let set = PointSet::from_points("A.tif", [(0.0, 1.0), (-0.0, 1.0)]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_read_groups_by_label() -> Result<()> {
        let data = "Label,X,Y\nA.tif,1.0,2.0\nB.tif,3.0,4.0\nA.tif,5.0,6.0\nA.tif,1.0,2.0\n";
        let table = read_drop_csv(data.as_bytes())?;

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows_read(), 4);
        assert_eq!(table.total_points(), 3);
        assert_eq!(table.labels().collect::<Vec<_>>(), vec!["A.tif", "B.tif"]);
        assert_eq!(table.get("A.tif").map(PointSet::len), Some(2));

        Ok(())
    }

    #[test]
    fn test_read_header_aliases() -> Result<()> {
        let data = " label ,\"x,\",y\nC.tif, 1.5 ,2.5\n";
        let table = read_drop_csv(data.as_bytes())?;

        let set = table.get("C.tif").unwrap();
        assert_eq!(set.points(), &[Point::new(1.5, 2.5)]);

        Ok(())
    }

    #[test]
    fn test_read_skips_blank_labels() -> Result<()> {
        let data = "Label,X,Y\n,1.0,2.0\nA.tif,3.0,4.0\n";
        let table = read_drop_csv(data.as_bytes())?;

        assert_eq!(table.len(), 1);
        assert_eq!(table.total_points(), 1);

        Ok(())
    }

    #[test]
    fn test_read_reports_bad_row() {
        let data = "Label,X,Y\nA.tif,1.0,2.0\nA.tif,abc,2.0\n";
        let err = read_drop_csv(data.as_bytes()).unwrap_err();

        match err {
            LoaderError::ParseError { row, x, y } => {
                assert_eq!(row, 2);
                assert_eq!(x, "abc");
                assert_eq!(y, "2.0");
            }
            other => panic!("Expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_read_rejects_non_finite() {
        let data = "Label,X,Y\nA.tif,NaN,2.0\n";
        let err = read_drop_csv(data.as_bytes()).unwrap_err();
        assert!(matches!(err, LoaderError::ParseError { row: 1, .. }));
    }

    #[test]
    fn test_read_missing_columns() {
        let data = "Name,X\nA.tif,1.0\n";
        let err = read_drop_csv(data.as_bytes()).unwrap_err();

        match err {
            LoaderError::MissingColumns(cols) => assert_eq!(cols, "Label, Y"),
            other => panic!("Expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_groups_expected_labels() -> Result<()> {
        let data = "Label,X,Y\nA.tif,1.0,2.0\nA.tif,3.0,4.0\n";
        let table = read_drop_csv(data.as_bytes())?;

        let expected = vec!["T.tif".to_string(), "A.tif".to_string()];
        let groups = table.groups(&expected);

        assert_eq!(groups.len(), 2);
        assert!(matches!(groups[0], LabelGroup::Absent("T.tif")));
        match groups[1] {
            LabelGroup::Present(set) => assert_eq!(set.len(), 2),
            LabelGroup::Absent(_) => panic!("A.tif should be present"),
        }

        let all = table.groups(&[]);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].label(), "A.tif");

        Ok(())
    }

    #[test]
    fn test_load_drop_csv() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Label,X,Y").unwrap();
        writeln!(file, "A.tif,0.0,0.0").unwrap();
        writeln!(file, "A.tif,1.0,1.0").unwrap();
        file.flush().unwrap();

        let table = load_drop_csv(file.path())?;
        assert_eq!(table.total_points(), 2);

        Ok(())
    }

    #[test]
    fn test_load_drop_csv_empty() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Label,X,Y").unwrap();
        file.flush().unwrap();

        let result = load_drop_csv(file.path());
        assert!(matches!(result, Err(LoaderError::EmptyFile(_))));
    }
}
