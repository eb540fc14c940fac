use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::SettlementError;
use crate::record::PricePoint;

pub fn price_history_schema() -> Schema {
    Schema::new(vec![
        Field::new(
            "start_time",
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            false,
        ),
        Field::new("system_sell_price", DataType::Float64, false),
    ])
}

pub fn points_to_record_batch(points: &[PricePoint]) -> Result<RecordBatch, SettlementError> {
    let schema = Arc::new(price_history_schema());

    let timestamps: Vec<i64> = points
        .iter()
        .map(|p| p.start_time.timestamp_micros())
        .collect();
    let prices: Vec<f64> = points.iter().map(|p| p.system_sell_price).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC")),
        Arc::new(Float64Array::from(prices)),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

pub fn record_batch_to_points(batch: &RecordBatch) -> Result<Vec<PricePoint>, SettlementError> {
    let timestamps = batch
        .column(0)
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .ok_or_else(|| SettlementError::InvalidData("expected start_time column".into()))?;

    let prices = batch
        .column(1)
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| SettlementError::InvalidData("expected system_sell_price column".into()))?;

    let mut points = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let micros = timestamps.value(i);
        let start_time = DateTime::from_timestamp_micros(micros).ok_or_else(|| {
            SettlementError::InvalidData(format!("timestamp out of range: {micros}"))
        })?;

        points.push(PricePoint {
            start_time,
            system_sell_price: prices.value(i),
        });
    }

    Ok(points)
}

pub fn write_parquet(path: &Path, points: &[PricePoint]) -> Result<(), SettlementError> {
    let batch = points_to_record_batch(points)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let file = std::fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

pub fn read_parquet(path: &Path) -> Result<Vec<PricePoint>, SettlementError> {
    let file = std::fs::File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let reader = builder.build()?;

    let mut all_points = Vec::new();
    for batch in reader {
        let batch = batch?;
        let mut points = record_batch_to_points(&batch)?;
        all_points.append(&mut points);
    }

    Ok(all_points)
}
