//! Target scaling: maps model outputs from scaled space back to milliseconds

use crate::error::{PredictionError, Result};
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// A fitted scaler over the regression target.
///
/// Implementations must be immutable after construction; one instance is
/// shared by every request.
pub trait TargetScaler: Send + Sync {
    /// Number of columns the scaler was fit on.
    fn n_features(&self) -> usize;

    /// Forward transform, real units to scaled space.
    fn transform(&self, rows: ArrayView2<'_, f64>) -> Result<Array2<f64>>;

    /// Inverse transform, scaled space to real units.
    fn inverse_transform(&self, rows: ArrayView2<'_, f64>) -> Result<Array2<f64>>;
}

/// Scaler parameters exported by the training job.
///
/// Attribute names follow scikit-learn's fitted estimators so the export is
/// a straight dump of `mean_`/`scale_` or `data_min_`/`data_max_`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalerArtifact {
    /// `StandardScaler`: `x_scaled = (x - mean) / scale`
    Standard {
        mean: Vec<f64>,
        /// Absent when fit with `with_std=False`
        #[serde(default)]
        scale: Option<Vec<f64>>,
    },
    /// `MinMaxScaler`: maps `[data_min, data_max]` onto `feature_range`
    MinMax {
        data_min: Vec<f64>,
        data_max: Vec<f64>,
        #[serde(default = "default_feature_range")]
        feature_range: (f64, f64),
    },
}

fn default_feature_range() -> (f64, f64) {
    (0.0, 1.0)
}

/// Zero-width columns scale by 1, as scikit-learn's `_handle_zeros_in_scale`.
fn non_zero(scale: f64) -> f64 {
    if scale == 0.0 {
        1.0
    } else {
        scale
    }
}

impl ScalerArtifact {
    /// Identity scaler over one column. Handy for models trained on raw targets.
    pub fn identity() -> Self {
        ScalerArtifact::Standard {
            mean: vec![0.0],
            scale: Some(vec![1.0]),
        }
    }

    /// Check attribute lengths agree and all values are finite.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let check_finite = |name: &str, values: &[f64]| {
            if values.iter().all(|v| v.is_finite()) {
                Ok(())
            } else {
                Err(format!("{} contains non-finite values", name))
            }
        };

        match self {
            ScalerArtifact::Standard { mean, scale } => {
                if mean.is_empty() {
                    return Err("mean is empty".to_string());
                }
                check_finite("mean", mean)?;
                if let Some(scale) = scale {
                    if scale.len() != mean.len() {
                        return Err(format!(
                            "scale has {} entries, mean has {}",
                            scale.len(),
                            mean.len()
                        ));
                    }
                    check_finite("scale", scale)?;
                }
            }
            ScalerArtifact::MinMax {
                data_min,
                data_max,
                feature_range,
            } => {
                if data_min.is_empty() {
                    return Err("data_min is empty".to_string());
                }
                if data_min.len() != data_max.len() {
                    return Err(format!(
                        "data_max has {} entries, data_min has {}",
                        data_max.len(),
                        data_min.len()
                    ));
                }
                check_finite("data_min", data_min)?;
                check_finite("data_max", data_max)?;
                if !(feature_range.0 < feature_range.1) {
                    return Err(format!(
                        "feature_range ({}, {}) is not increasing",
                        feature_range.0, feature_range.1
                    ));
                }
            }
        }
        Ok(())
    }

    /// Per-column `(offset, factor)` such that `scaled = (x - offset) / factor`.
    fn affine(&self, column: usize) -> (f64, f64) {
        match self {
            ScalerArtifact::Standard { mean, scale } => {
                let factor = scale.as_ref().map(|s| non_zero(s[column])).unwrap_or(1.0);
                (mean[column], factor)
            }
            ScalerArtifact::MinMax {
                data_min,
                data_max,
                feature_range: (lo, hi),
            } => {
                // sklearn: scale_ = (hi - lo) / range, min_ = lo - data_min * scale_
                let scale = (hi - lo) / non_zero(data_max[column] - data_min[column]);
                let min = lo - data_min[column] * scale;
                (-min / scale, 1.0 / scale)
            }
        }
    }

    fn check_width(&self, rows: &ArrayView2<'_, f64>) -> Result<()> {
        if rows.ncols() != self.n_features() {
            return Err(PredictionError::Scaler(format!(
                "expected {} columns, got {}",
                self.n_features(),
                rows.ncols()
            )));
        }
        Ok(())
    }
}

impl TargetScaler for ScalerArtifact {
    fn n_features(&self) -> usize {
        match self {
            ScalerArtifact::Standard { mean, .. } => mean.len(),
            ScalerArtifact::MinMax { data_min, .. } => data_min.len(),
        }
    }

    fn transform(&self, rows: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.check_width(&rows)?;
        let mut out = rows.to_owned();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (offset, factor) = self.affine(j);
            column.mapv_inplace(|x| (x - offset) / factor);
        }
        Ok(out)
    }

    fn inverse_transform(&self, rows: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.check_width(&rows)?;
        let mut out = rows.to_owned();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (offset, factor) = self.affine(j);
            column.mapv_inplace(|x| x * factor + offset);
        }
        Ok(out)
    }
}

/// Inverse-scales single raw predictions into milliseconds.
pub struct OutputScaler {
    scaler: Box<dyn TargetScaler>,
}

impl std::fmt::Debug for OutputScaler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputScaler")
            .field("n_features", &self.scaler.n_features())
            .finish()
    }
}

impl OutputScaler {
    /// Wrap a fitted scaler. It must have been fit on exactly one column.
    pub fn new(scaler: Box<dyn TargetScaler>) -> Result<Self> {
        let width = scaler.n_features();
        if width != 1 {
            return Err(PredictionError::Scaler(format!(
                "target scaler was fit on {} columns, expected 1",
                width
            )));
        }
        Ok(Self { scaler })
    }

    /// Scaled-space model output to milliseconds.
    pub fn invert(&self, raw: f64) -> Result<f64> {
        let rows = Array2::from_elem((1, 1), raw);
        let inverted = self.scaler.inverse_transform(rows.view())?;
        let value = single_value(&inverted)?;

        if !value.is_finite() {
            return Err(PredictionError::Scaler(format!(
                "inverse transform of {} produced {}",
                raw, value
            )));
        }
        Ok(value)
    }

    /// Milliseconds to scaled space.
    pub fn forward(&self, value_ms: f64) -> Result<f64> {
        let rows = Array2::from_elem((1, 1), value_ms);
        let scaled = self.scaler.transform(rows.view())?;
        single_value(&scaled)
    }
}

fn single_value(rows: &Array2<f64>) -> Result<f64> {
    rows.iter().next().copied().ok_or_else(|| {
        PredictionError::Scaler("scaler returned an empty result".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn standard(mean: f64, scale: f64) -> OutputScaler {
        OutputScaler::new(Box::new(ScalerArtifact::Standard {
            mean: vec![mean],
            scale: Some(vec![scale]),
        }))
        .unwrap()
    }

    #[test]
    fn test_standard_inverse() {
        let scaler = standard(12_000.0, 4_000.0);
        assert_relative_eq!(scaler.invert(0.0).unwrap(), 12_000.0);
        assert_relative_eq!(scaler.invert(1.5).unwrap(), 18_000.0);
        assert_relative_eq!(scaler.invert(-2.0).unwrap(), 4_000.0);
    }

    #[test]
    fn test_standard_round_trip() {
        let scaler = standard(15_234.5, 9_876.25);
        for value in [0.0, 1.0, 12_000.0, 87_654.321, -5.0] {
            let scaled = scaler.forward(value).unwrap();
            assert_relative_eq!(scaler.invert(scaled).unwrap(), value, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_min_max_round_trip() {
        let scaler = OutputScaler::new(Box::new(ScalerArtifact::MinMax {
            data_min: vec![1_000.0],
            data_max: vec![600_000.0],
            feature_range: (0.0, 1.0),
        }))
        .unwrap();

        assert_relative_eq!(scaler.forward(1_000.0).unwrap(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(scaler.forward(600_000.0).unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(scaler.invert(0.5).unwrap(), 300_500.0, epsilon = 1e-6);

        for value in [1_000.0, 42_000.0, 599_999.0] {
            let scaled = scaler.forward(value).unwrap();
            assert_relative_eq!(scaler.invert(scaled).unwrap(), value, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_min_max_custom_range() {
        let artifact = ScalerArtifact::MinMax {
            data_min: vec![0.0],
            data_max: vec![100.0],
            feature_range: (-1.0, 1.0),
        };
        let scaler = OutputScaler::new(Box::new(artifact)).unwrap();
        assert_relative_eq!(scaler.forward(50.0).unwrap(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(scaler.invert(1.0).unwrap(), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_scale_treated_as_one() {
        let scaler = standard(10.0, 0.0);
        assert_relative_eq!(scaler.invert(2.0).unwrap(), 12.0);
    }

    #[test]
    fn test_without_std() {
        let scaler = OutputScaler::new(Box::new(ScalerArtifact::Standard {
            mean: vec![100.0],
            scale: None,
        }))
        .unwrap();
        assert_relative_eq!(scaler.invert(5.0).unwrap(), 105.0);
    }

    #[test]
    fn test_identity() {
        let scaler = OutputScaler::new(Box::new(ScalerArtifact::identity())).unwrap();
        assert_eq!(scaler.invert(21_118.0).unwrap(), 21_118.0);
    }

    #[test]
    fn test_rejects_multi_column_scaler() {
        let artifact = ScalerArtifact::Standard {
            mean: vec![0.0, 0.0],
            scale: Some(vec![1.0, 1.0]),
        };
        let err = OutputScaler::new(Box::new(artifact)).unwrap_err();
        assert!(matches!(err, PredictionError::Scaler(_)));
    }

    #[test]
    fn test_non_finite_output_is_an_error() {
        let scaler = standard(0.0, 1.0);
        assert!(matches!(
            scaler.invert(f64::NAN),
            Err(PredictionError::Scaler(_))
        ));
        assert!(matches!(
            scaler.invert(f64::INFINITY),
            Err(PredictionError::Scaler(_))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(ScalerArtifact::identity().validate().is_ok());

        let mismatched = ScalerArtifact::Standard {
            mean: vec![0.0],
            scale: Some(vec![1.0, 2.0]),
        };
        assert!(mismatched.validate().is_err());

        let inverted_range = ScalerArtifact::MinMax {
            data_min: vec![0.0],
            data_max: vec![1.0],
            feature_range: (1.0, 0.0),
        };
        assert!(inverted_range.validate().is_err());

        let empty = ScalerArtifact::Standard {
            mean: vec![],
            scale: None,
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_artifact_json_format() {
        let standard: ScalerArtifact =
            serde_json::from_str(r#"{"kind":"standard","mean":[12000.0],"scale":[4000.0]}"#)
                .unwrap();
        assert_eq!(standard.n_features(), 1);

        let min_max: ScalerArtifact =
            serde_json::from_str(r#"{"kind":"min_max","data_min":[0.0],"data_max":[9.0]}"#)
                .unwrap();
        assert_eq!(
            min_max,
            ScalerArtifact::MinMax {
                data_min: vec![0.0],
                data_max: vec![9.0],
                feature_range: (0.0, 1.0),
            }
        );
    }
}
