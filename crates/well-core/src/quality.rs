//! Frame quality gate: brightness, sharpness and contrast checks.
//!
//! Checks run in a fixed order and the first failing one decides the
//! verdict: a dark and blurry frame is reported dark.

use crate::types::Frame;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum metric values for a usable frame, on a 0–255 luma scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    pub brightness_min: f32,
    pub sharpness_min: f32,
    pub contrast_min: f32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            brightness_min: 30.0,
            sharpness_min: 30.0,
            contrast_min: 15.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityVerdict {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "escura")]
    Dark,
    #[serde(rename = "borrada")]
    Blurry,
    #[serde(rename = "baixo_contraste")]
    LowContrast,
}

impl QualityVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityVerdict::Ok => "ok",
            QualityVerdict::Dark => "escura",
            QualityVerdict::Blurry => "borrada",
            QualityVerdict::LowContrast => "baixo_contraste",
        }
    }

    pub fn is_ok(&self) -> bool {
        *self == QualityVerdict::Ok
    }
}

impl fmt::Display for QualityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Mean luma (0.0–255.0).
    pub brightness: f32,
    /// Variance of the 4-neighbour Laplacian response.
    pub sharpness: f32,
    /// Standard deviation of luma.
    pub contrast: f32,
    pub verdict: QualityVerdict,
}

/// Scores frames against fixed thresholds. Pure, no I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityGate {
    thresholds: QualityThresholds,
}

impl QualityGate {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn assess(&self, frame: &Frame) -> QualityReport {
        let (brightness, contrast) = mean_and_stddev(&frame.data);
        let sharpness = laplacian_variance(&frame.data, frame.width as usize, frame.height as usize);
        let verdict = self.verdict(brightness, sharpness, contrast);

        QualityReport {
            brightness,
            sharpness,
            contrast,
            verdict,
        }
    }

    fn verdict(&self, brightness: f32, sharpness: f32, contrast: f32) -> QualityVerdict {
        let t = &self.thresholds;
        if brightness < t.brightness_min {
            QualityVerdict::Dark
        } else if sharpness < t.sharpness_min {
            QualityVerdict::Blurry
        } else if contrast < t.contrast_min {
            QualityVerdict::LowContrast
        } else {
            QualityVerdict::Ok
        }
    }
}

fn mean_and_stddev(gray: &[u8]) -> (f32, f32) {
    if gray.is_empty() {
        return (0.0, 0.0);
    }
    let n = gray.len() as f64;
    let mean = gray.iter().map(|&p| p as f64).sum::<f64>() / n;
    let variance = gray
        .iter()
        .map(|&p| (p as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    (mean as f32, variance.sqrt() as f32)
}

/// Variance of the `[0 1 0; 1 -4 1; 0 1 0]` response with reflect-101 borders.
fn laplacian_variance(gray: &[u8], width: usize, height: usize) -> f32 {
    if width == 0 || height == 0 || gray.len() < width * height {
        return 0.0;
    }

    let reflect = |i: isize, len: usize| -> usize {
        if len == 1 {
            return 0;
        }
        let last = len as isize - 1;
        let r = if i < 0 {
            -i
        } else if i > last {
            2 * last - i
        } else {
            i
        };
        r as usize
    };
    let at = |x: isize, y: isize| -> f64 {
        gray[reflect(y, height) * width + reflect(x, width)] as f64
    };

    let n = (width * height) as f64;
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for y in 0..height as isize {
        for x in 0..width as isize {
            let response = at(x - 1, y) + at(x + 1, y) + at(x, y - 1) + at(x, y + 1) - 4.0 * at(x, y);
            sum += response;
            sum_sq += response * response;
        }
    }
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0) as f32
}
