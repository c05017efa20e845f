//! Row sinks for finalized clusters.

use crate::{Error, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tpcreco_core::cluster::ClusterRow;
use tpcreco_core::config::EnergyUnit;
use tpcreco_core::source::RowSink;

/// Output file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Comma-separated scalar columns, one row per cluster.
    Csv,
    /// One JSON object per cluster, hits included.
    JsonLines,
    /// Column datasets with a flattened hit table (requires the `hdf5` feature).
    Hdf5,
}

impl OutputFormat {
    /// Picks a format from a file extension.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "jsonl" | "ndjson" => Some(Self::JsonLines),
            "h5" | "hdf5" => Some(Self::Hdf5),
            _ => None,
        }
    }

    /// Default file extension.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::JsonLines => "jsonl",
            Self::Hdf5 => "h5",
        }
    }
}

/// Creates a file sink for the given format.
///
/// # Errors
/// Returns an error if the file cannot be created, or `InvalidFormat` for
/// HDF5 output when the crate was built without the `hdf5` feature.
pub fn create_sink<P: AsRef<Path>>(
    path: P,
    format: OutputFormat,
    unit: EnergyUnit,
) -> Result<Box<dyn RowSink + Send>> {
    match format {
        OutputFormat::Csv => Ok(Box::new(CsvRowSink::create(path, unit)?)),
        OutputFormat::JsonLines => Ok(Box::new(JsonLinesRowSink::create(path)?)),
        #[cfg(feature = "hdf5")]
        OutputFormat::Hdf5 => Ok(Box::new(crate::hdf5::Hdf5RowSink::create(
            path,
            crate::hdf5::RowWriteOptions::new(unit),
        )?)),
        #[cfg(not(feature = "hdf5"))]
        OutputFormat::Hdf5 => Err(Error::InvalidFormat(format!(
            "{}: HDF5 output requires the hdf5 feature",
            path.as_ref().display()
        ))),
    }
}

/// CSV writer for the scalar columns of each row.
///
/// Energy columns carry the unit in their header name. Secondary columns
/// are left empty for rows without an attributed secondary.
pub struct CsvRowSink<W: Write = BufWriter<File>> {
    writer: W,
    rows: u64,
}

impl CsvRowSink<BufWriter<File>> {
    /// Creates a CSV file and writes its header.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn create<P: AsRef<Path>>(path: P, unit: EnergyUnit) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), unit)
    }
}

impl<W: Write> CsvRowSink<W> {
    /// Wraps a writer and writes the header line.
    ///
    /// # Errors
    /// Returns an error if the header cannot be written.
    pub fn new(mut writer: W, unit: EnergyUnit) -> Result<Self> {
        let unit = unit.label();
        writeln!(
            writer,
            "eventID,rootID,hitCount,totalEnergyDeposit_{unit},pathLength,stepLengthSum,\
             ionPairs,particleLabel,particleName,maxGeneration,creatorType,creatorSubType,\
             contained,\
             startX,startY,startZ,startPx,startPy,startPz,startAzimuth,startInclination,\
             attributed,secondaryTrackID,secondaryPx,secondaryPy,secondaryPz,\
             secondaryKineticEnergy_{unit},secondaryPolarAngle,secondaryAzimuthalAngle,\
             candidateSecondaryCount"
        )?;
        Ok(Self { writer, rows: 0 })
    }

    /// Rows written so far.
    #[must_use]
    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Writes one row.
    ///
    /// # Errors
    /// Returns an error if the underlying writer fails.
    pub fn write_row(&mut self, row: &ClusterRow) -> Result<()> {
        let w = &mut self.writer;
        write!(
            w,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},",
            row.event_id,
            row.root_id,
            row.hit_count,
            row.total_energy_deposit,
            row.path_length,
            row.step_length_sum,
            row.ion_pairs,
            row.particle_label,
            row.particle_name,
            row.max_generation,
            row.creator_type,
            row.creator_sub_type,
            u8::from(row.contained),
        )?;
        let (p, m) = (row.start_position, row.start_momentum);
        write!(
            w,
            "{},{},{},{},{},{},{},{},",
            p.x, p.y, p.z, m.x, m.y, m.z, row.start_azimuth, row.start_inclination
        )?;
        match &row.secondary {
            Some(s) => write!(
                w,
                "1,{},{},{},{},{},{},{},",
                s.track_id,
                s.momentum.x,
                s.momentum.y,
                s.momentum.z,
                s.kinetic_energy,
                s.polar_angle,
                s.azimuthal_angle
            )?,
            None => write!(w, "0,,,,,,,,")?,
        }
        writeln!(w, "{}", row.candidate_secondary_count)?;
        self.rows += 1;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RowSink for CsvRowSink<W> {
    fn append(&mut self, row: &ClusterRow) -> tpcreco_core::Result<()> {
        self.write_row(row).map_err(Error::into_sink)
    }

    fn finish(&mut self) -> tpcreco_core::Result<()> {
        self.flush().map_err(Error::into_sink)
    }
}

/// JSON Lines writer: one complete row per line, hits included.
pub struct JsonLinesRowSink<W: Write = BufWriter<File>> {
    writer: W,
    rows: u64,
}

impl JsonLinesRowSink<BufWriter<File>> {
    /// Creates a JSON Lines file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonLinesRowSink<W> {
    /// Wraps a writer.
    pub fn new(writer: W) -> Self {
        Self { writer, rows: 0 }
    }

    /// Rows written so far.
    #[must_use]
    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Writes one row.
    ///
    /// # Errors
    /// Returns an error if encoding or writing fails.
    pub fn write_row(&mut self, row: &ClusterRow) -> Result<()> {
        serde_json::to_writer(&mut self.writer, row)?;
        self.writer.write_all(b"\n")?;
        self.rows += 1;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RowSink for JsonLinesRowSink<W> {
    fn append(&mut self, row: &ClusterRow) -> tpcreco_core::Result<()> {
        self.write_row(row).map_err(Error::into_sink)
    }

    fn finish(&mut self) -> tpcreco_core::Result<()> {
        self.flush().map_err(Error::into_sink)
    }
}
