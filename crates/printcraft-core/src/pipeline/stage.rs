//! Pipeline stages and the store keys they own.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One named step of the design pipeline.
///
/// The main path is `upload → style → convert → edit → color-reduce →
/// preview`. `before` is a side view of the conversion, entered from
/// `convert` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStage {
    #[default]
    Upload,
    Style,
    Convert,
    Before,
    Edit,
    ColorReduce,
    Preview,
}

impl PipelineStage {
    /// Every stage, in display order.
    pub const ALL: [PipelineStage; 7] = [
        PipelineStage::Upload,
        PipelineStage::Style,
        PipelineStage::Convert,
        PipelineStage::Before,
        PipelineStage::Edit,
        PipelineStage::ColorReduce,
        PipelineStage::Preview,
    ];

    /// The main path, without `before`.
    pub const MAIN_PATH: [PipelineStage; 6] = [
        PipelineStage::Upload,
        PipelineStage::Style,
        PipelineStage::Convert,
        PipelineStage::Edit,
        PipelineStage::ColorReduce,
        PipelineStage::Preview,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Style => "style",
            Self::Convert => "convert",
            Self::Before => "before",
            Self::Edit => "edit",
            Self::ColorReduce => "color-reduce",
            Self::Preview => "preview",
        }
    }

    /// Position in display order.
    pub fn rank(self) -> usize {
        self as usize
    }

    /// The stage a forward step leads to.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Upload => Some(Self::Style),
            Self::Style => Some(Self::Convert),
            Self::Convert | Self::Before => Some(Self::Edit),
            Self::Edit => Some(Self::ColorReduce),
            Self::ColorReduce => Some(Self::Preview),
            Self::Preview => None,
        }
    }

    /// The stage a backward step leads to.
    pub fn previous(self) -> Option<Self> {
        match self {
            Self::Upload => None,
            Self::Style => Some(Self::Upload),
            Self::Convert => Some(Self::Style),
            Self::Before | Self::Edit => Some(Self::Convert),
            Self::ColorReduce => Some(Self::Edit),
            Self::Preview => Some(Self::ColorReduce),
        }
    }

    /// Store key of the artifact this stage produces, if it produces one.
    pub fn artifact_key(self) -> Option<&'static str> {
        match self {
            Self::Upload => Some(keys::UPLOADED_IMAGE),
            Self::Style => Some(keys::SELECTED_STYLE),
            Self::Convert => Some(keys::CONVERTED_IMAGE),
            Self::Before => None,
            Self::Edit => Some(keys::EDITED_IMAGE),
            Self::ColorReduce => Some(keys::COLOR_REDUCED_IMAGE),
            Self::Preview => Some(keys::PREVIEW_IMAGE),
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s.trim())
            .ok_or_else(|| format!("unknown pipeline stage: {}", s))
    }
}

/// Keys used in the artifact store.
pub mod keys {
    pub const UPLOADED_IMAGE: &str = "uploadedImage";
    pub const SELECTED_STYLE: &str = "selectedStyle";
    pub const CONVERTED_IMAGE: &str = "convertedImage";
    pub const EDITED_IMAGE: &str = "editedImage";
    pub const COLOR_REDUCED_IMAGE: &str = "colorReducedImage";
    pub const PREVIEW_IMAGE: &str = "previewImage";
    pub const SELECTED_STAGE: &str = "selectedStage";
    pub const SELECTED_POSITION: &str = "selectedPosition";
    pub const ZOOM_LEVEL: &str = "zoomLevel";

    /// Every key the pipeline writes.
    pub const ALL: [&str; 9] = [
        UPLOADED_IMAGE,
        SELECTED_STYLE,
        CONVERTED_IMAGE,
        EDITED_IMAGE,
        COLOR_REDUCED_IMAGE,
        PREVIEW_IMAGE,
        SELECTED_STAGE,
        SELECTED_POSITION,
        ZOOM_LEVEL,
    ];

    /// Keys an in-progress order still depends on.
    pub const CART_LINKED: [&str; 2] = [PREVIEW_IMAGE, SELECTED_POSITION];
}
