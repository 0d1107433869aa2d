use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ImageFormat;
use shared::PredictionResult;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Payload is not a PNG image: {0}")]
    Image(#[from] image::ImageError),
    #[error("Prediction has no overlaid image")]
    MissingOverlay,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A validated PNG with its dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CdfPoint {
    pub x: f64,
    pub y: f64,
}

/// Display-ready form of a prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrediction {
    pub overlay: DecodedImage,
    pub chart: Option<DecodedImage>,
    pub is_calibrated: bool,
    pub unit: Option<String>,
    pub cdf: Vec<CdfPoint>,
}

/// Paths of the artifacts written by [`RenderedPrediction::write_to`].
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenArtifacts {
    pub overlay: PathBuf,
    pub chart: Option<PathBuf>,
    pub cdf_csv: Option<PathBuf>,
}

pub fn decode_png(payload: &str) -> Result<DecodedImage, RenderError> {
    let encoded = payload.trim();
    let encoded = encoded.strip_prefix(DATA_URL_PREFIX).unwrap_or(encoded);
    let bytes = STANDARD.decode(encoded)?;
    let image = image::load_from_memory_with_format(&bytes, ImageFormat::Png)?;
    Ok(DecodedImage {
        width: image.width(),
        height: image.height(),
        bytes,
    })
}

/// Empirical CDF of particle sizes: sorted ascending, the i-th point sits at
/// `(i + 1) / n`. Non-finite values are ignored.
pub fn cumulative_distribution(values: &[f64]) -> Vec<CdfPoint> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len() as f64;
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, x)| CdfPoint {
            x,
            y: (i + 1) as f64 / n,
        })
        .collect()
}

pub fn calibration_message(is_calibrated: bool) -> &'static str {
    if is_calibrated {
        "This image contains a calibrated object."
    } else {
        "There is no calibrated object in this image."
    }
}

impl RenderedPrediction {
    pub fn from_result(result: &PredictionResult) -> Result<Self, RenderError> {
        if result.overlaid_image.trim().is_empty() {
            return Err(RenderError::MissingOverlay);
        }
        let overlay = decode_png(&result.overlaid_image)?;
        let chart = if result.cdf_chart.trim().is_empty() {
            None
        } else {
            Some(decode_png(&result.cdf_chart)?)
        };

        Ok(Self {
            overlay,
            chart,
            is_calibrated: result.is_calibrated,
            unit: result.unit.clone(),
            cdf: cumulative_distribution(&result.volumes),
        })
    }

    pub fn calibration_message(&self) -> &'static str {
        calibration_message(self.is_calibrated)
    }

    pub fn write_to(&self, dir: &Path, stem: &str) -> Result<WrittenArtifacts, RenderError> {
        fs::create_dir_all(dir)?;

        let overlay = dir.join(format!("{stem}_overlay.png"));
        fs::write(&overlay, &self.overlay.bytes)?;

        let chart = match &self.chart {
            Some(chart) => {
                let path = dir.join(format!("{stem}_cdf.png"));
                fs::write(&path, &chart.bytes)?;
                Some(path)
            }
            None => None,
        };

        let cdf_csv = if self.cdf.is_empty() {
            None
        } else {
            let path = dir.join(format!("{stem}_cdf.csv"));
            let mut file = fs::File::create(&path)?;
            writeln!(file, "size,cumulative_fraction")?;
            for point in &self.cdf {
                writeln!(file, "{},{}", point.x, point.y)?;
            }
            Some(path)
        };

        log::info!("Wrote prediction artifacts to {}", dir.display());
        Ok(WrittenArtifacts {
            overlay,
            chart,
            cdf_csv,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    pub(crate) fn png_base64(width: u32, height: u32) -> String {
        let image = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        STANDARD.encode(buffer.into_inner())
    }

    fn result(overlay: String, chart: String, volumes: Vec<f64>) -> PredictionResult {
        PredictionResult {
            overlaid_image: overlay,
            cdf_chart: chart,
            is_calibrated: true,
            message: None,
            unit: Some("cm".into()),
            conf: None,
            iou: None,
            volumes,
        }
    }

    #[test]
    fn decodes_png_with_and_without_data_url() {
        let payload = png_base64(4, 3);
        let plain = decode_png(&payload).unwrap();
        assert_eq!((plain.width, plain.height), (4, 3));

        let prefixed = decode_png(&format!("{DATA_URL_PREFIX}{payload}")).unwrap();
        assert_eq!(prefixed, plain);
    }

    #[test]
    fn rejects_non_png_payloads() {
        assert!(matches!(decode_png("%%%"), Err(RenderError::Base64(_))));
        let not_png = STANDARD.encode(b"just some bytes");
        assert!(matches!(decode_png(&not_png), Err(RenderError::Image(_))));
    }

    #[test]
    fn cdf_is_sorted_and_reaches_one() {
        let points = cumulative_distribution(&[3.0, f64::NAN, 1.0, 2.0, 2.0]);
        let xs: Vec<f64> = points.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.y).collect();
        assert_eq!(xs, vec![1.0, 2.0, 2.0, 3.0]);
        assert_eq!(ys, vec![0.25, 0.5, 0.75, 1.0]);
        assert!(cumulative_distribution(&[]).is_empty());
    }

    #[test]
    fn calibration_wording() {
        assert_eq!(
            calibration_message(true),
            "This image contains a calibrated object."
        );
        assert_eq!(
            calibration_message(false),
            "There is no calibrated object in this image."
        );
    }

    #[test]
    fn renders_and_writes_artifacts() {
        let rendered = RenderedPrediction::from_result(&result(
            png_base64(8, 8),
            png_base64(16, 9),
            vec![0.5, 0.1],
        ))
        .unwrap();
        assert_eq!(rendered.chart.as_ref().map(|c| c.width), Some(16));
        assert!(rendered.is_calibrated);

        let dir = tempfile::tempdir().unwrap();
        let written = rendered.write_to(dir.path(), "rock1").unwrap();
        assert!(written.overlay.ends_with("rock1_overlay.png"));
        assert!(written.chart.as_ref().unwrap().exists());

        let csv = fs::read_to_string(written.cdf_csv.unwrap()).unwrap();
        assert_eq!(csv, "size,cumulative_fraction\n0.1,0.5\n0.5,1\n");
    }

    #[test]
    fn chart_is_optional_but_overlay_is_not() {
        let rendered =
            RenderedPrediction::from_result(&result(png_base64(2, 2), String::new(), vec![]))
                .unwrap();
        assert!(rendered.chart.is_none());
        assert!(rendered.cdf.is_empty());

        let dir = tempfile::tempdir().unwrap();
        let written = rendered.write_to(dir.path(), "bare").unwrap();
        assert!(written.chart.is_none());
        assert!(written.cdf_csv.is_none());

        assert!(matches!(
            RenderedPrediction::from_result(&result(String::new(), String::new(), vec![])),
            Err(RenderError::MissingOverlay)
        ));
    }
}
