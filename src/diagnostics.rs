//! The fixed-schema diagnostic bundle computed for each batch, and the
//! declarative table that drives its persistence and concatenation.

use crate::cell::compute_cell_diagnostics;
use crate::grid::{azimuthal_mass_average, azimuthal_mean};
use crate::reduction::{
    disk_mass_average, disk_radius, fourier_estimator, lubow_estimator, radial_disk_mass_average, total_mass,
};
use crate::trajectory::CompanionTrajectory;
use diagnostics_common::{Batch, GridGeometry};
use log::debug;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Mass fractions reported as disk radii.
pub const DISK_RADIUS_FRACTIONS: (f64, f64) = (0.90, 0.95);

/// Every diagnostic for one batch. Radial profiles are `(frames, num_radial)`,
/// disk scalars have one value per frame.
#[derive(Debug, Clone)]
pub struct DiagnosticBundle {
    /// Index of the first frame.
    pub start: usize,

    pub radial_ecc_mk: Array2<f64>,
    pub radial_peri_mk: Array2<f64>,
    pub radial_ecc_lubow: Array2<f64>,
    pub radial_peri_lubow: Array2<f64>,
    pub radial_ecc_fourier: Array2<f64>,
    pub radial_peri_fourier: Array2<f64>,
    pub radial_density: Array2<f64>,

    pub disk_ecc_mk: Array1<f64>,
    pub disk_peri_mk: Array1<f64>,
    pub disk_ecc_lubow: Array1<f64>,
    pub disk_peri_lubow: Array1<f64>,
    pub disk_ecc_fourier: Array1<f64>,
    pub disk_peri_fourier: Array1<f64>,
    pub total_mass: Array1<f64>,
    pub disk_radius_90: Array1<f64>,
    pub disk_radius_95: Array1<f64>,

    /// Present only when a companion trajectory is loaded.
    pub companion_radius: Option<Array1<f64>>,
    pub companion_angle: Option<Array1<f64>>,
}

/// Runs every estimator over one batch. The batch is only read.
pub fn compute_diagnostics(
    geometry: &GridGeometry,
    batch: &Batch,
    gm: f64,
    companion: Option<&CompanionTrajectory>,
) -> DiagnosticBundle {
    let density = batch.density.view();

    let cells = compute_cell_diagnostics(geometry, batch.v_radial.view(), batch.v_azimuthal.view(), gm);
    let radial_ecc_mk = azimuthal_mass_average(cells.eccentricity.view(), density);
    let radial_peri_mk = azimuthal_mass_average(cells.periastron.view(), density);
    let disk_ecc_mk = disk_mass_average(cells.eccentricity.view(), density, geometry);
    let disk_peri_mk = disk_mass_average(cells.periastron.view(), density, geometry);

    let radial_density = azimuthal_mean(density);
    let total_mass = total_mass(density, geometry);
    let disk_average = |profile: &Array2<f64>| {
        radial_disk_mass_average(profile.view(), radial_density.view(), geometry, total_mass.view())
    };

    let lubow = lubow_estimator(geometry, density, batch.v_azimuthal.view());
    let fourier = fourier_estimator(geometry, density);

    let (companion_radius, companion_angle) = match companion {
        Some(trajectory) => {
            let (radius, angle) = trajectory.window(batch.start, batch.end());
            (Some(radius), Some(angle))
        }
        None => (None, None),
    };

    debug!("Computed diagnostics for frames [{}, {})", batch.start, batch.end());

    DiagnosticBundle {
        start: batch.start,
        disk_ecc_lubow: disk_average(&lubow.eccentricity),
        disk_peri_lubow: disk_average(&lubow.periastron),
        disk_ecc_fourier: disk_average(&fourier.eccentricity),
        disk_peri_fourier: disk_average(&fourier.periastron),
        disk_radius_90: disk_radius(density, geometry, DISK_RADIUS_FRACTIONS.0),
        disk_radius_95: disk_radius(density, geometry, DISK_RADIUS_FRACTIONS.1),
        radial_ecc_mk,
        radial_peri_mk,
        radial_ecc_lubow: lubow.eccentricity,
        radial_peri_lubow: lubow.periastron,
        radial_ecc_fourier: fourier.eccentricity,
        radial_peri_fourier: fourier.periastron,
        radial_density,
        disk_ecc_mk,
        disk_peri_mk,
        total_mass,
        companion_radius,
        companion_angle,
    }
}

/// Shape of a diagnostic series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    Radial,
    Scalar,
}

/// Borrowed view of one diagnostic within a bundle.
#[derive(Debug, Clone, Copy)]
pub enum SeriesView<'a> {
    Radial(ArrayView2<'a, f64>),
    Scalar(ArrayView1<'a, f64>),
}

/// Table entry describing one persisted diagnostic.
#[derive(Clone, Copy)]
pub struct DiagnosticSpec {
    pub name: &'static str,
    pub kind: SeriesKind,
    pub plottable: bool,
    extract: fn(&DiagnosticBundle) -> Option<SeriesView<'_>>,
}

impl DiagnosticSpec {
    /// The bundle's series for this entry, or `None` if it was not computed.
    pub fn extract<'a>(&self, bundle: &'a DiagnosticBundle) -> Option<SeriesView<'a>> {
        (self.extract)(bundle)
    }
}

impl std::fmt::Debug for DiagnosticSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("plottable", &self.plottable)
            .finish()
    }
}

macro_rules! radial {
    ($name:literal, $field:ident) => {
        DiagnosticSpec {
            name: $name,
            kind: SeriesKind::Radial,
            plottable: true,
            extract: |b| Some(SeriesView::Radial(b.$field.view())),
        }
    };
}

macro_rules! scalar {
    ($name:literal, $field:ident) => {
        DiagnosticSpec {
            name: $name,
            kind: SeriesKind::Scalar,
            plottable: true,
            extract: |b| Some(SeriesView::Scalar(b.$field.view())),
        }
    };
}

/// Every diagnostic, in output order.
pub const DIAGNOSTICS: &[DiagnosticSpec] = &[
    radial!("radialEccMK", radial_ecc_mk),
    radial!("radialPeriMK", radial_peri_mk),
    radial!("radialEccLubow", radial_ecc_lubow),
    radial!("radialPeriLubow", radial_peri_lubow),
    radial!("radialEccFourier", radial_ecc_fourier),
    radial!("radialPeriFourier", radial_peri_fourier),
    radial!("radialDens", radial_density),
    scalar!("diskEccMK", disk_ecc_mk),
    scalar!("diskPeriMK", disk_peri_mk),
    scalar!("diskEccLubow", disk_ecc_lubow),
    scalar!("diskPeriLubow", disk_peri_lubow),
    scalar!("diskEccFourier", disk_ecc_fourier),
    scalar!("diskPeriFourier", disk_peri_fourier),
    scalar!("totalMass", total_mass),
    scalar!("diskRadius90", disk_radius_90),
    scalar!("diskRadius95", disk_radius_95),
    DiagnosticSpec {
        name: "companionRadius",
        kind: SeriesKind::Scalar,
        plottable: false,
        extract: |b| b.companion_radius.as_ref().map(|a| SeriesView::Scalar(a.view())),
    },
    DiagnosticSpec {
        name: "companionAngle",
        kind: SeriesKind::Scalar,
        plottable: false,
        extract: |b| b.companion_angle.as_ref().map(|a| SeriesView::Scalar(a.view())),
    },
];

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;
    use std::collections::HashSet;

    pub(crate) fn find_diagnostic(name: &str) -> Option<&'static DiagnosticSpec> {
        DIAGNOSTICS.iter().find(|spec| spec.name == name)
    }

    fn circular_batch(geometry: &GridGeometry, start: usize, frames: usize) -> Batch {
        let shape = (frames, geometry.num_radial(), geometry.num_theta());
        Batch {
            start,
            density: Array3::from_elem(shape, 1.0),
            v_radial: Array3::zeros(shape),
            v_azimuthal: Array3::from_shape_fn(shape, |(_, r, _)| geometry.radial_intervals[r].powf(-0.5)),
        }
    }

    #[test]
    fn test_table_names_are_unique() {
        let names: HashSet<_> = DIAGNOSTICS.iter().map(|spec| spec.name).collect();
        assert_eq!(names.len(), DIAGNOSTICS.len());
        assert_eq!(find_diagnostic("totalMass").map(|s| s.kind), Some(SeriesKind::Scalar));
        assert!(find_diagnostic("totalmass").is_none());
    }

    #[test]
    fn test_every_series_shares_the_time_axis() {
        let geometry = GridGeometry::from_edges(&[0.5, 0.7, 1.0, 1.5, 2.0], 16);
        let batch = circular_batch(&geometry, 10, 3);
        let bundle = compute_diagnostics(&geometry, &batch, 1.0, None);

        assert_eq!(bundle.start, 10);
        assert_eq!(bundle.total_mass.len(), 3);
        for spec in DIAGNOSTICS {
            match spec.extract(&bundle) {
                Some(SeriesView::Radial(view)) => {
                    assert_eq!(spec.kind, SeriesKind::Radial);
                    assert_eq!(view.dim(), (3, 4), "{}", spec.name);
                }
                Some(SeriesView::Scalar(view)) => {
                    assert_eq!(spec.kind, SeriesKind::Scalar);
                    assert_eq!(view.len(), 3, "{}", spec.name);
                }
                None => assert!(spec.name.starts_with("companion")),
            }
        }
    }

    #[test]
    fn test_circular_disk_estimators_vanish() {
        let geometry = GridGeometry::from_edges(&[0.5, 0.7, 1.0, 1.5, 2.0], 16);
        let batch = circular_batch(&geometry, 0, 2);
        let bundle = compute_diagnostics(&geometry, &batch, 1.0, None);

        for &e in bundle.disk_ecc_mk.iter().chain(bundle.disk_ecc_lubow.iter()).chain(bundle.disk_ecc_fourier.iter()) {
            assert_abs_diff_eq!(e, 0.0, epsilon = 1e-12);
        }
        for &e in bundle.radial_ecc_mk.iter().chain(bundle.radial_ecc_lubow.iter()) {
            assert_abs_diff_eq!(e, 0.0, epsilon = 1e-12);
        }
        assert!(bundle.disk_radius_90.iter().zip(bundle.disk_radius_95.iter()).all(|(a, b)| a <= b));
    }

    #[test]
    fn test_companion_window_follows_batch() {
        use crate::trajectory::TrajectoryRow;
        use diagnostics_common::Vec2;

        let geometry = GridGeometry::from_edges(&[0.5, 1.0, 2.0], 8);
        let rows: Vec<_> = (0..10)
            .map(|i| TrajectoryRow { time: i as f64, position: Vec2::new(1.0 + i as f64, 0.0) })
            .collect();
        let trajectory = CompanionTrajectory::from_rows(&rows, 1, 10).unwrap();

        let batch = circular_batch(&geometry, 4, 3);
        let bundle = compute_diagnostics(&geometry, &batch, 1.0, Some(&trajectory));
        let radius = bundle.companion_radius.unwrap();
        assert_eq!(radius.to_vec(), vec![5.0, 6.0, 7.0]);
    }
}
