//! Hand-off to the garment compositing collaborator.

use serde::{Deserialize, Serialize};

use crate::edit::ImageRef;

/// Where the design sits on the garment, as percentages of the print area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub x_percent: f64,
    pub y_percent: f64,
    pub size_percent: f64,
}

impl Placement {
    /// Build a placement; each value is clamped to `0..=100` and
    /// non-finite values become 0.
    pub fn new(x_percent: f64, y_percent: f64, size_percent: f64) -> Self {
        Self {
            x_percent: clamp_percent(x_percent),
            y_percent: clamp_percent(y_percent),
            size_percent: clamp_percent(size_percent),
        }
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::new(50.0, 50.0, 100.0)
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// A finished design ready to be rendered onto a garment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionRequest {
    pub image: ImageRef,
    /// Name of the selected position preset, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    pub placement: Placement,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_clamps() {
        let p = Placement::new(-5.0, 150.0, f64::NAN);
        assert_eq!(p, Placement { x_percent: 0.0, y_percent: 100.0, size_percent: 0.0 });
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let request = CompositionRequest {
            image: ImageRef::Url("https://cdn.example.com/final.png".to_string()),
            position: Some("front-center".to_string()),
            placement: Placement::new(50.0, 30.0, 80.0),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["image"], "https://cdn.example.com/final.png");
        assert_eq!(json["placement"]["sizePercent"], 80.0);
        assert_eq!(json["position"], "front-center");
    }
}
