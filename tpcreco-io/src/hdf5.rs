//! HDF5 row sink.
//!
//! Layout:
//! - `/clusters`: one entry per row in every dataset. `hit_index` is the
//!   offset of the row's first hit in `/hits`; a row owns `hit_count` hits.
//! - `/hits`: the time-ordered member hits of all rows, concatenated.
//!
//! Rows without an attributed secondary store `-1` as the secondary track
//! ID and NaN in its floating-point columns.

use crate::{Error, Result};
use hdf5::types::{H5Type, VarLenUnicode};
use hdf5::{Dataset, File, Group};
use ndarray::{s, ArrayView1};
use std::path::Path;
use std::str::FromStr;
use tpcreco_core::cluster::ClusterRow;
use tpcreco_core::config::EnergyUnit;
use tpcreco_core::source::RowSink;

/// Write configuration for the HDF5 sink.
#[derive(Clone, Debug)]
pub struct RowWriteOptions {
    pub energy_unit: EnergyUnit,
    /// Rows buffered before a flush; also the dataset chunk size.
    pub chunk_rows: usize,
    pub compression: Option<u8>,
    pub shuffle: bool,
}

impl RowWriteOptions {
    /// Default options for the given energy unit.
    #[must_use]
    pub fn new(energy_unit: EnergyUnit) -> Self {
        Self {
            energy_unit,
            chunk_rows: 10_000,
            compression: Some(1),
            shuffle: true,
        }
    }
}

/// A growable 1-D dataset with a write buffer.
struct Column<T> {
    dataset: Dataset,
    pending: Vec<T>,
}

impl<T: H5Type + Copy> Column<T> {
    fn create(group: &Group, name: &str, units: &str, options: &RowWriteOptions) -> Result<Self> {
        let dataset = create_extendable_dataset::<T>(group, name, options)?;
        set_dataset_units(&dataset, units)?;
        Ok(Self {
            dataset,
            pending: Vec::with_capacity(options.chunk_rows),
        })
    }

    fn push(&mut self, value: T) {
        self.pending.push(value);
    }
}

trait PendingColumn {
    fn flush_at(&mut self, offset: usize) -> Result<()>;
}

impl<T: H5Type + Copy> PendingColumn for Column<T> {
    fn flush_at(&mut self, offset: usize) -> Result<()> {
        append_slice(&self.dataset, offset, &self.pending)?;
        self.pending.clear();
        Ok(())
    }
}

struct ClusterColumns {
    event_id: Column<i32>,
    root_id: Column<i32>,
    hit_count: Column<u64>,
    hit_index: Column<u64>,
    total_energy_deposit: Column<f64>,
    path_length: Column<f64>,
    step_length_sum: Column<f64>,
    ion_pairs: Column<f64>,
    particle_label: Column<i32>,
    max_generation: Column<u32>,
    creator_type: Column<i32>,
    creator_sub_type: Column<i32>,
    contained: Column<u8>,
    start_position: [Column<f64>; 3],
    start_momentum: [Column<f64>; 3],
    start_azimuth: Column<f64>,
    start_inclination: Column<f64>,
    attributed: Column<u8>,
    secondary_track_id: Column<i32>,
    secondary_momentum: [Column<f64>; 3],
    secondary_kinetic_energy: Column<f64>,
    secondary_polar_angle: Column<f64>,
    secondary_azimuthal_angle: Column<f64>,
    candidate_secondary_count: Column<u64>,
}

fn xyz_columns(
    group: &Group,
    prefix: &str,
    units: &str,
    options: &RowWriteOptions,
) -> Result<[Column<f64>; 3]> {
    Ok([
        Column::create(group, &format!("{prefix}_x"), units, options)?,
        Column::create(group, &format!("{prefix}_y"), units, options)?,
        Column::create(group, &format!("{prefix}_z"), units, options)?,
    ])
}

impl ClusterColumns {
    fn new(group: &Group, options: &RowWriteOptions) -> Result<Self> {
        let energy = options.energy_unit.label();
        Ok(Self {
            event_id: Column::create(group, "event_id", "id", options)?,
            root_id: Column::create(group, "root_id", "id", options)?,
            hit_count: Column::create(group, "hit_count", "count", options)?,
            hit_index: Column::create(group, "hit_index", "index", options)?,
            total_energy_deposit: Column::create(group, "total_energy_deposit", energy, options)?,
            path_length: Column::create(group, "path_length", "mm", options)?,
            step_length_sum: Column::create(group, "step_length_sum", "mm", options)?,
            ion_pairs: Column::create(group, "ion_pairs", "count", options)?,
            particle_label: Column::create(group, "particle_label", "pdg", options)?,
            max_generation: Column::create(group, "max_generation", "count", options)?,
            creator_type: Column::create(group, "creator_type", "process", options)?,
            creator_sub_type: Column::create(group, "creator_sub_type", "process", options)?,
            contained: Column::create(group, "contained", "flag", options)?,
            start_position: xyz_columns(group, "start_position", "mm", options)?,
            start_momentum: xyz_columns(group, "start_momentum", "MeV/c", options)?,
            start_azimuth: Column::create(group, "start_azimuth", "rad", options)?,
            start_inclination: Column::create(group, "start_inclination", "rad", options)?,
            attributed: Column::create(group, "attributed", "flag", options)?,
            secondary_track_id: Column::create(group, "secondary_track_id", "id", options)?,
            secondary_momentum: xyz_columns(group, "secondary_momentum", "MeV/c", options)?,
            secondary_kinetic_energy: Column::create(
                group,
                "secondary_kinetic_energy",
                energy,
                options,
            )?,
            secondary_polar_angle: Column::create(group, "secondary_polar_angle", "rad", options)?,
            secondary_azimuthal_angle: Column::create(
                group,
                "secondary_azimuthal_angle",
                "rad",
                options,
            )?,
            candidate_secondary_count: Column::create(
                group,
                "candidate_secondary_count",
                "count",
                options,
            )?,
        })
    }

    fn push(&mut self, row: &ClusterRow, hit_index: u64) {
        self.event_id.push(row.event_id);
        self.root_id.push(row.root_id);
        self.hit_count.push(row.hit_count as u64);
        self.hit_index.push(hit_index);
        self.total_energy_deposit.push(row.total_energy_deposit);
        self.path_length.push(row.path_length);
        self.step_length_sum.push(row.step_length_sum);
        self.ion_pairs.push(row.ion_pairs);
        self.particle_label.push(row.particle_label);
        self.max_generation.push(row.max_generation);
        self.creator_type.push(row.creator_type);
        self.creator_sub_type.push(row.creator_sub_type);
        self.contained.push(u8::from(row.contained));
        push_xyz(
            &mut self.start_position,
            [row.start_position.x, row.start_position.y, row.start_position.z],
        );
        push_xyz(
            &mut self.start_momentum,
            [row.start_momentum.x, row.start_momentum.y, row.start_momentum.z],
        );
        self.start_azimuth.push(row.start_azimuth);
        self.start_inclination.push(row.start_inclination);
        self.attributed.push(u8::from(row.attributed));

        match &row.secondary {
            Some(secondary) => {
                let p = secondary.momentum;
                self.secondary_track_id.push(secondary.track_id);
                push_xyz(&mut self.secondary_momentum, [p.x, p.y, p.z]);
                self.secondary_kinetic_energy.push(secondary.kinetic_energy);
                self.secondary_polar_angle.push(secondary.polar_angle);
                self.secondary_azimuthal_angle.push(secondary.azimuthal_angle);
            }
            None => {
                self.secondary_track_id.push(-1);
                push_xyz(&mut self.secondary_momentum, [f64::NAN; 3]);
                self.secondary_kinetic_energy.push(f64::NAN);
                self.secondary_polar_angle.push(f64::NAN);
                self.secondary_azimuthal_angle.push(f64::NAN);
            }
        }
        self.candidate_secondary_count
            .push(row.candidate_secondary_count as u64);
    }

    fn pending(&self) -> usize {
        self.event_id.pending.len()
    }

    fn flush_at(&mut self, offset: usize) -> Result<()> {
        let [px, py, pz] = &mut self.start_position;
        let [mx, my, mz] = &mut self.start_momentum;
        let [sx, sy, sz] = &mut self.secondary_momentum;
        let columns: [&mut dyn PendingColumn; 30] = [
            &mut self.event_id,
            &mut self.root_id,
            &mut self.hit_count,
            &mut self.hit_index,
            &mut self.total_energy_deposit,
            &mut self.path_length,
            &mut self.step_length_sum,
            &mut self.ion_pairs,
            &mut self.particle_label,
            &mut self.max_generation,
            &mut self.creator_type,
            &mut self.creator_sub_type,
            &mut self.contained,
            px,
            py,
            pz,
            mx,
            my,
            mz,
            &mut self.start_azimuth,
            &mut self.start_inclination,
            &mut self.attributed,
            &mut self.secondary_track_id,
            sx,
            sy,
            sz,
            &mut self.secondary_kinetic_energy,
            &mut self.secondary_polar_angle,
            &mut self.secondary_azimuthal_angle,
            &mut self.candidate_secondary_count,
        ];
        for column in columns {
            column.flush_at(offset)?;
        }
        Ok(())
    }
}

fn push_xyz(columns: &mut [Column<f64>; 3], values: [f64; 3]) {
    for (column, value) in columns.iter_mut().zip(values) {
        column.push(value);
    }
}

struct HitColumns {
    track_id: Column<i32>,
    pdg: Column<i32>,
    position: [Column<f64>; 3],
    time: Column<f64>,
    momentum: [Column<f64>; 3],
    energy_deposit: Column<f64>,
    step_length: Column<f64>,
}

impl HitColumns {
    fn new(group: &Group, options: &RowWriteOptions) -> Result<Self> {
        Ok(Self {
            track_id: Column::create(group, "track_id", "id", options)?,
            pdg: Column::create(group, "pdg", "pdg", options)?,
            position: [
                Column::create(group, "x", "mm", options)?,
                Column::create(group, "y", "mm", options)?,
                Column::create(group, "z", "mm", options)?,
            ],
            time: Column::create(group, "t", "ns", options)?,
            momentum: [
                Column::create(group, "px", "MeV/c", options)?,
                Column::create(group, "py", "MeV/c", options)?,
                Column::create(group, "pz", "MeV/c", options)?,
            ],
            energy_deposit: Column::create(
                group,
                "energy_deposit",
                options.energy_unit.label(),
                options,
            )?,
            step_length: Column::create(group, "step_length", "mm", options)?,
        })
    }

    fn push(&mut self, row: &ClusterRow) {
        for hit in &row.hits {
            self.track_id.push(hit.track_id);
            self.pdg.push(hit.pdg);
            push_xyz(&mut self.position, [hit.position.x, hit.position.y, hit.position.z]);
            self.time.push(hit.time);
            push_xyz(&mut self.momentum, [hit.momentum.x, hit.momentum.y, hit.momentum.z]);
            self.energy_deposit.push(hit.energy_deposit);
            self.step_length.push(hit.step_length);
        }
    }

    fn pending(&self) -> usize {
        self.track_id.pending.len()
    }

    fn flush_at(&mut self, offset: usize) -> Result<()> {
        let [x, y, z] = &mut self.position;
        let [px, py, pz] = &mut self.momentum;
        let columns: [&mut dyn PendingColumn; 11] = [
            &mut self.track_id,
            &mut self.pdg,
            x,
            y,
            z,
            &mut self.time,
            px,
            py,
            pz,
            &mut self.energy_deposit,
            &mut self.step_length,
        ];
        for column in columns {
            column.flush_at(offset)?;
        }
        Ok(())
    }
}

/// Streaming HDF5 writer for cluster rows and their hits.
pub struct Hdf5RowSink {
    _file: File,
    clusters: ClusterColumns,
    hits: HitColumns,
    options: RowWriteOptions,
    rows_flushed: usize,
    hits_flushed: usize,
}

impl Hdf5RowSink {
    /// Creates a new HDF5 file with empty cluster and hit tables.
    ///
    /// # Errors
    /// Returns an error if the HDF5 file or datasets cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, options: RowWriteOptions) -> Result<Self> {
        if options.chunk_rows == 0 {
            return Err(Error::InvalidFormat("chunk_rows must be positive".to_string()));
        }
        let file = File::create(path)?;
        set_attr_str_file(&file, "tpcreco_format_version", "0.1")?;
        set_attr_str_file(&file, "energy_unit", options.energy_unit.label())?;

        let clusters = ClusterColumns::new(&file.create_group("clusters")?, &options)?;
        let hits = HitColumns::new(&file.create_group("hits")?, &options)?;
        Ok(Self {
            _file: file,
            clusters,
            hits,
            options,
            rows_flushed: 0,
            hits_flushed: 0,
        })
    }

    /// Buffers one row, flushing once a chunk is full.
    ///
    /// # Errors
    /// Returns an error if HDF5 I/O fails.
    pub fn write_row(&mut self, row: &ClusterRow) -> Result<()> {
        let hit_index = (self.hits_flushed + self.hits.pending()) as u64;
        self.clusters.push(row, hit_index);
        self.hits.push(row);
        if self.clusters.pending() >= self.options.chunk_rows {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes all buffered rows and hits.
    ///
    /// # Errors
    /// Returns an error if HDF5 I/O fails.
    pub fn flush(&mut self) -> Result<()> {
        let rows = self.clusters.pending();
        let hits = self.hits.pending();
        self.clusters.flush_at(self.rows_flushed)?;
        self.hits.flush_at(self.hits_flushed)?;
        self.rows_flushed += rows;
        self.hits_flushed += hits;
        Ok(())
    }
}

impl RowSink for Hdf5RowSink {
    fn append(&mut self, row: &ClusterRow) -> tpcreco_core::Result<()> {
        self.write_row(row).map_err(Error::into_sink)
    }

    fn finish(&mut self) -> tpcreco_core::Result<()> {
        self.flush().map_err(Error::into_sink)
    }
}

fn create_extendable_dataset<T: H5Type>(
    group: &Group,
    name: &str,
    options: &RowWriteOptions,
) -> Result<Dataset> {
    let mut builder = group
        .new_dataset::<T>()
        .shape((0..,))
        .chunk((options.chunk_rows,));

    if let Some(level) = options.compression {
        builder = builder.deflate(level);
    }

    if options.shuffle {
        builder = builder.shuffle();
    }

    Ok(builder.create(name)?)
}

fn append_slice<T: H5Type>(dataset: &Dataset, offset: usize, data: &[T]) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let new_len = offset + data.len();
    dataset.resize((new_len,))?;
    let view = ArrayView1::from(data);
    dataset.write_slice(view, s![offset..new_len])?;
    Ok(())
}

fn set_dataset_units(dataset: &Dataset, units: &str) -> Result<()> {
    let value = to_var_len_unicode(units)?;
    dataset
        .new_attr::<VarLenUnicode>()
        .create("units")?
        .write_scalar(&value)?;
    Ok(())
}

fn set_attr_str_file(file: &File, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    file.new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn to_var_len_unicode(value: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use tpcreco_core::cluster::{AttributedSecondary, HitPoint};
    use tpcreco_core::step::Vec3;

    fn row(root_id: i32, hits: usize, secondary: Option<AttributedSecondary>) -> ClusterRow {
        let hits: Vec<HitPoint> = (0..hits)
            .map(|i| HitPoint {
                track_id: root_id,
                pdg: 11,
                position: Vec3::new(0.0, 0.0, 51.4),
                time: f64::from(u32::try_from(i).unwrap()),
                momentum: Vec3::default(),
                energy_deposit: 0.5,
                step_length: 0.1,
            })
            .collect();
        ClusterRow {
            event_id: 0,
            root_id,
            hit_count: hits.len(),
            total_energy_deposit: 0.5 * hits.len() as f64,
            path_length: 0.0,
            step_length_sum: 0.1 * hits.len() as f64,
            ion_pairs: 0.0,
            particle_label: 11,
            particle_name: "e-".to_string(),
            max_generation: 0,
            creator_type: -1,
            creator_sub_type: -1,
            contained: true,
            start_position: Vec3::new(0.0, 0.0, 51.4),
            start_momentum: Vec3::default(),
            start_azimuth: 0.0,
            start_inclination: 0.0,
            attributed: secondary.is_some(),
            candidate_secondary_count: usize::from(secondary.is_some()),
            secondary,
            hits,
        }
    }

    #[test]
    fn test_hdf5_rows_and_hit_index() {
        let file = NamedTempFile::new().unwrap();
        let options = RowWriteOptions {
            chunk_rows: 2,
            ..RowWriteOptions::new(EnergyUnit::KeV)
        };
        let mut sink = Hdf5RowSink::create(file.path(), options).unwrap();

        let secondary = AttributedSecondary {
            track_id: 9,
            momentum: Vec3::new(0.0, 0.0, 0.1),
            kinetic_energy: 10.0,
            polar_angle: 0.0,
            azimuthal_angle: 0.0,
        };
        for (root, hits) in [(1, 3), (2, 1), (3, 2)] {
            let secondary = (root == 2).then_some(secondary);
            sink.append(&row(root, hits, secondary)).unwrap();
        }
        sink.finish().unwrap();
        drop(sink);

        let file = File::open(file.path()).unwrap();
        let clusters = file.group("clusters").unwrap();
        let roots: Vec<i32> = clusters.dataset("root_id").unwrap().read_raw().unwrap();
        let index: Vec<u64> = clusters.dataset("hit_index").unwrap().read_raw().unwrap();
        let secondary_ids: Vec<i32> = clusters
            .dataset("secondary_track_id")
            .unwrap()
            .read_raw()
            .unwrap();
        let kinetic: Vec<f64> = clusters
            .dataset("secondary_kinetic_energy")
            .unwrap()
            .read_raw()
            .unwrap();
        assert_eq!(roots, vec![1, 2, 3]);
        assert_eq!(index, vec![0, 3, 4]);
        let attributed: Vec<u8> = clusters.dataset("attributed").unwrap().read_raw().unwrap();
        assert_eq!(secondary_ids, vec![-1, 9, -1]);
        assert_eq!(attributed, vec![0, 1, 0]);
        assert!(kinetic[0].is_nan());
        assert!((kinetic[1] - 10.0).abs() < 1e-12);

        let hits = file.group("hits").unwrap();
        let tracks: Vec<i32> = hits.dataset("track_id").unwrap().read_raw().unwrap();
        assert_eq!(tracks, vec![1, 1, 1, 2, 3, 3]);
    }

    #[test]
    fn test_buffered_rows_kept_when_source_fails() {
        use std::io::Write;
        use tpcreco_algorithms::{run, ReconstructionConfig};

        let mut input = NamedTempFile::new().unwrap();
        writeln!(input, r#"{{"table":"steps","version":1}}"#).unwrap();
        writeln!(
            input,
            r#"{{"eventID":0,"steps":[{{"trackID":1,"parentID":0,"pdg":22,"position":[0,0,51.4],"t":0.0,"momentum":[0,0,0.06],"edep":1.0,"stepLen":0.5}}]}}"#
        )
        .unwrap();
        writeln!(input, "not json").unwrap();
        input.flush().unwrap();

        let output = NamedTempFile::new().unwrap();
        let mut source = crate::StepFileReader::open(input.path()).unwrap();
        let mut sink =
            Hdf5RowSink::create(output.path(), RowWriteOptions::new(EnergyUnit::MeV)).unwrap();
        let result = run(&mut source, &mut sink, &ReconstructionConfig::default());
        assert!(result.is_err());
        drop(sink);

        let file = File::open(output.path()).unwrap();
        let roots: Vec<i32> = file
            .group("clusters")
            .unwrap()
            .dataset("root_id")
            .unwrap()
            .read_raw()
            .unwrap();
        assert_eq!(roots, vec![1]);
    }
}
