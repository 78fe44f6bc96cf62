//! Dataset storage (Arrow/Parquet/CSV)
//!
//! The dataset is an external collaborator: it only has to hand the risk
//! deriver a fully materialized, null-free table. Everything is held as Arrow
//! record batches and materialized into [`RawRecord`]s on demand.
//!
//! Append-only: batches are loaded or appended in bulk, never updated row by row.

use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Numeric feature columns, in model-input order
pub const NUMERIC_COLUMNS: [&str; 6] = [
    "age",
    "bmi",
    "cholesterol",
    "systolic_bp",
    "daily_steps",
    "sleep_hours",
];

/// Boolean (0/1) feature columns, in model-input order
pub const BOOLEAN_COLUMNS: [&str; 3] = ["smoker", "alcohol", "family_history"];

/// All feature columns in the order of [`RawRecord::features`]
pub const FEATURE_COLUMNS: [&str; 9] = [
    "age",
    "bmi",
    "cholesterol",
    "systolic_bp",
    "daily_steps",
    "sleep_hours",
    "smoker",
    "alcohol",
    "family_history",
];

/// One subject row. All fields are required and non-null.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Age in years
    pub age: f64,
    /// Body mass index
    pub bmi: f64,
    /// Total cholesterol (mg/dL)
    pub cholesterol: f64,
    /// Systolic blood pressure (mmHg)
    pub systolic_bp: f64,
    /// Average daily step count
    pub daily_steps: f64,
    /// Average nightly sleep (hours)
    pub sleep_hours: f64,
    /// Current smoker
    pub smoker: bool,
    /// Regular alcohol consumption
    pub alcohol: bool,
    /// Family history of disease
    pub family_history: bool,
}

/// Plausible input ranges, inclusive. Taken from the prediction form schema.
const PLAUSIBLE_RANGES: [(&str, f64, f64); 6] = [
    ("age", 1.0, 120.0),
    ("bmi", 10.0, 60.0),
    ("cholesterol", 100.0, 400.0),
    ("systolic_bp", 70.0, 200.0),
    ("daily_steps", 0.0, 50_000.0),
    ("sleep_hours", 0.0, 24.0),
];

impl RawRecord {
    /// Feature vector in [`FEATURE_COLUMNS`] order, booleans as 0.0/1.0.
    #[must_use]
    pub fn features(&self) -> [f64; 9] {
        [
            self.age,
            self.bmi,
            self.cholesterol,
            self.systolic_bp,
            self.daily_steps,
            self.sleep_hours,
            f64::from(u8::from(self.smoker)),
            f64::from(u8::from(self.alcohol)),
            f64::from(u8::from(self.family_history)),
        ]
    }

    /// Numeric fields that fall outside their plausible range.
    #[must_use]
    pub fn out_of_range_fields(&self) -> Vec<&'static str> {
        let values = self.features();
        PLAUSIBLE_RANGES
            .iter()
            .zip(values.iter())
            .filter(|((_, lo, hi), v)| !(*lo..=*hi).contains(*v))
            .map(|((name, _, _), _)| *name)
            .collect()
    }
}

/// Build the model input matrix (rows = records, columns = [`FEATURE_COLUMNS`]).
#[must_use]
pub fn feature_matrix(records: &[RawRecord]) -> Array2<f64> {
    Array2::from_shape_fn((records.len(), FEATURE_COLUMNS.len()), |(i, j)| {
        records[i].features()[j]
    })
}

/// Columnar dataset backed by Arrow record batches
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    batches: Vec<RecordBatch>,
}

impl Dataset {
    /// Create a dataset from existing batches
    #[must_use]
    pub fn new(batches: Vec<RecordBatch>) -> Self {
        Self { batches }
    }

    /// Build a single-batch dataset from in-memory records
    ///
    /// # Errors
    /// Returns error if the Arrow batch cannot be assembled
    pub fn from_records(records: &[RawRecord]) -> Result<Self> {
        let mut fields = Vec::with_capacity(FEATURE_COLUMNS.len());
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(FEATURE_COLUMNS.len());

        for (j, name) in NUMERIC_COLUMNS.iter().enumerate() {
            fields.push(Field::new(*name, DataType::Float64, false));
            let values: Float64Array = records.iter().map(|r| Some(r.features()[j])).collect();
            columns.push(Arc::new(values));
        }
        for (j, name) in BOOLEAN_COLUMNS.iter().enumerate() {
            fields.push(Field::new(*name, DataType::Boolean, false));
            let offset = NUMERIC_COLUMNS.len() + j;
            let values: BooleanArray = records
                .iter()
                .map(|r| Some(r.features()[offset] > 0.5))
                .collect();
            columns.push(Arc::new(values));
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
        Ok(Self::new(vec![batch]))
    }

    /// Load table from Parquet file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let file = File::open(path.as_ref())
            .map_err(|e| Error::StorageError(format!("Failed to open Parquet file: {e}")))?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| Error::StorageError(format!("Failed to parse Parquet file: {e}")))?;

        let reader = builder
            .build()
            .map_err(|e| Error::StorageError(format!("Failed to create Parquet reader: {e}")))?;

        let mut batches = Vec::new();
        for batch in reader {
            let batch = batch
                .map_err(|e| Error::StorageError(format!("Failed to read record batch: {e}")))?;
            batches.push(batch);
        }

        Ok(Self { batches })
    }

    /// Load table from a CSV file with a header row, inferring column types
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        use arrow::csv::reader::Format;
        use arrow::csv::ReaderBuilder;
        use std::io::Seek;

        let mut file = File::open(path.as_ref())
            .map_err(|e| Error::StorageError(format!("Failed to open CSV file: {e}")))?;

        let (schema, _) = Format::default()
            .with_header(true)
            .infer_schema(&mut file, None)
            .map_err(|e| Error::StorageError(format!("Failed to infer CSV schema: {e}")))?;
        file.rewind()?;

        let reader = ReaderBuilder::new(Arc::new(schema))
            .with_header(true)
            .build(file)
            .map_err(|e| Error::StorageError(format!("Failed to create CSV reader: {e}")))?;

        let mut batches = Vec::new();
        for batch in reader {
            let batch = batch
                .map_err(|e| Error::StorageError(format!("Failed to read record batch: {e}")))?;
            batches.push(batch);
        }

        Ok(Self { batches })
    }

    /// Load by file extension (`.parquet` or `.csv`)
    ///
    /// # Errors
    /// Returns error for unknown extensions or unreadable files
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("parquet") => Self::load_parquet(path),
            Some("csv") => Self::load_csv(path),
            other => Err(Error::StorageError(format!(
                "Unsupported dataset extension {other:?} for {}",
                path.display()
            ))),
        }
    }

    /// Get all record batches
    #[must_use]
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Total number of rows across batches
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Append a batch (bulk load only)
    ///
    /// # Errors
    ///
    /// Returns error if batch schema doesn't match existing batches
    pub fn append_batch(&mut self, batch: RecordBatch) -> Result<()> {
        if let Some(first) = self.batches.first() {
            let existing_schema = first.schema();
            if batch.schema() != existing_schema {
                return Err(Error::StorageError(format!(
                    "Schema mismatch: expected {:?}, got {:?}",
                    existing_schema,
                    batch.schema()
                )));
            }
        }

        self.batches.push(batch);
        Ok(())
    }

    /// Materialize every row as a [`RawRecord`]
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] if a required column is missing, contains
    /// nulls, is not numeric, holds NaN or infinite values, or a boolean column holds values other than 0/1.
    pub fn records(&self) -> Result<Vec<RawRecord>> {
        let mut records = Vec::with_capacity(self.num_rows());

        for batch in &self.batches {
            let mut columns = Vec::with_capacity(FEATURE_COLUMNS.len());
            for name in FEATURE_COLUMNS {
                columns.push(numeric_column(batch, name)?);
            }

            for row in 0..batch.num_rows() {
                let flag = |j: usize| -> Result<bool> {
                    let value = columns[j].value(row);
                    if value == 0.0 {
                        Ok(false)
                    } else if (value - 1.0).abs() < f64::EPSILON {
                        Ok(true)
                    } else {
                        Err(Error::Data(format!(
                            "column '{}' must be 0/1, found {value} at row {row}",
                            FEATURE_COLUMNS[j]
                        )))
                    }
                };

                records.push(RawRecord {
                    age: columns[0].value(row),
                    bmi: columns[1].value(row),
                    cholesterol: columns[2].value(row),
                    systolic_bp: columns[3].value(row),
                    daily_steps: columns[4].value(row),
                    sleep_hours: columns[5].value(row),
                    smoker: flag(6)?,
                    alcohol: flag(7)?,
                    family_history: flag(8)?,
                });
            }
        }

        Ok(records)
    }
}

/// Extract a column as non-null Float64, casting integer/boolean/string columns.
fn numeric_column(batch: &RecordBatch, name: &str) -> Result<Float64Array> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| Error::Data(format!("missing required column '{name}'")))?;

    if column.null_count() > 0 {
        return Err(Error::Data(format!(
            "column '{name}' contains {} null values",
            column.null_count()
        )));
    }

    let cast = arrow::compute::cast(column, &DataType::Float64)
        .map_err(|e| Error::Data(format!("column '{name}' is not numeric: {e}")))?;

    // String casts turn unparseable cells into nulls
    if cast.null_count() > 0 {
        return Err(Error::Data(format!("column '{name}' is not numeric")));
    }

    let values = cast
        .as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| Error::Data(format!("column '{name}' is not numeric")))?;

    if let Some(row) = values.values().iter().position(|v| !v.is_finite()) {
        return Err(Error::Data(format!(
            "column '{name}' has non-finite values (row {row})"
        )));
    }
    Ok(values)
}
