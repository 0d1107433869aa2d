use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum_macros::{EnumIter, EnumString};

/// Physical unit of the calibration object's radius.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    EnumString,
    EnumIter,
    strum_macros::Display,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    M,
    Dm,
    #[default]
    Cm,
    Mm,
}

#[derive(Debug, Clone, PartialEq, Display)]
pub enum ParamError {
    #[display(fmt = "Calibration radius must be a positive number, got {:?}", _0)]
    InvalidRadius(String),
    #[display(fmt = "Confidence threshold must be between 0 and 1, got {}", _0)]
    ConfidenceOutOfRange(f32),
    #[display(fmt = "IoU threshold must be between 0 and 1, got {}", _0)]
    IouOutOfRange(f32),
}

impl std::error::Error for ParamError {}

/// Optional knobs sent along with a prediction request.
///
/// `radius` is kept as the raw form input so the exact text typed by the user
/// is what reaches the backend once it has been validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadParams {
    pub radius: Option<String>,
    pub unit: Unit,
    pub conf: Option<f32>,
    pub iou: Option<f32>,
}

impl UploadParams {
    fn radius_input(&self) -> Option<&str> {
        self.radius
            .as_deref()
            .map(str::trim)
            .filter(|radius| !radius.is_empty())
    }

    /// True when no parameter would be sent and the bare route applies.
    pub fn is_empty(&self) -> bool {
        self.radius_input().is_none() && self.conf.is_none() && self.iou.is_none()
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        if let Some(radius) = self.radius_input() {
            match radius.parse::<f64>() {
                Ok(value) if value.is_finite() && value > 0.0 => {}
                _ => return Err(ParamError::InvalidRadius(radius.to_string())),
            }
        }
        if let Some(conf) = self.conf {
            if !(0.0..=1.0).contains(&conf) {
                return Err(ParamError::ConfidenceOutOfRange(conf));
            }
        }
        if let Some(iou) = self.iou {
            if !(0.0..=1.0).contains(&iou) {
                return Err(ParamError::IouOutOfRange(iou));
            }
        }
        Ok(())
    }

    /// Query-string pairs for the `/params` routes. The unit only travels
    /// with a radius since it has no meaning without calibration.
    pub fn query_pairs(&self) -> Result<Vec<(&'static str, String)>, ParamError> {
        self.validate()?;

        let mut pairs = Vec::new();
        if let Some(radius) = self.radius_input() {
            pairs.push(("real_radius", radius.to_string()));
            pairs.push(("unit", self.unit.to_string()));
        }
        if let Some(conf) = self.conf {
            pairs.push(("conf", conf.to_string()));
        }
        if let Some(iou) = self.iou {
            pairs.push(("iou", iou.to_string()));
        }
        Ok(pairs)
    }
}
