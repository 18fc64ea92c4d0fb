//! Metric names.
//!
//! Per-ASIC and per-layer names are formatted once when the monitor is
//! built and indexed by ASIC or layer number afterwards.

use focalraw_core::pad::PAD_ASICS;

/// Timeframe status: 1 for a lost interval, 2 for a filled one.
pub const TF_ERROR: &str = "NumberOfTFerror";

/// Pad payload size in pad words.
pub const PAD_PAYLOAD_SIZE: &str = "PayloadSizePadGBT";

pub const PIXEL_PAGES_FEE: &str = "Pixel_PagesFee";
pub const PIXEL_TRIGGERS_HBF: &str = "Pixel_NumTriggerHBF";
pub const PIXEL_HITS_CHIP: &str = "Pixel_NumberHits";
pub const PIXEL_AVG_HITS_CHIP: &str = "Pixel_AverageNumberOfHitsChip";
pub const PIXEL_CHIP_IDS: &str = "Pixel_ChipIDsFEE";
pub const PIXEL_CHIP_IDS_FILLED: &str = "Pixel_ChipIDsFilledFEE";
pub const PIXEL_HITS_TRIGGER_ALL: &str = "Pixel_TotalNumberHitsTrigger";

/// Pixel layers per detector.
pub const PIXEL_LAYERS: usize = 2;

/// FEEs with a lane-vs-chip map.
pub const LANE_MAP_FEES: usize = 4;

/// Names of one pad ASIC.
#[derive(Debug, Clone)]
pub struct PadAsicMetrics {
    pub adc: String,
    pub toa: String,
    pub tot: String,
    pub hitmap: String,
    /// `(channel, name)` sorted by channel.
    pub projections: Vec<(usize, String)>,
}

impl PadAsicMetrics {
    #[must_use]
    pub fn new(asic: usize, projection_channels: &[usize]) -> Self {
        Self {
            adc: format!("PadADC_ASIC_{asic}"),
            toa: format!("PadTOA_ASIC_{asic}"),
            tot: format!("PadTOT_ASIC_{asic}"),
            hitmap: format!("HitmapPadASIC_{asic}"),
            projections: projection_channels
                .iter()
                .map(|&ch| (ch, format!("Pad_ProjADC_ASIC{asic}_Chan{ch}")))
                .collect(),
        }
    }

    /// Projection name of `channel`, if it is projected.
    #[must_use]
    pub fn projection(&self, channel: usize) -> Option<&str> {
        self.projections
            .binary_search_by_key(&channel, |(ch, _)| *ch)
            .ok()
            .map(|idx| self.projections[idx].1.as_str())
    }
}

/// Names for every pad ASIC.
#[must_use]
pub fn pad_metrics(projection_channels: &[usize]) -> Vec<PadAsicMetrics> {
    (0..PAD_ASICS)
        .map(|asic| PadAsicMetrics::new(asic, projection_channels))
        .collect()
}

/// Names of one pixel layer.
#[derive(Debug, Clone)]
pub struct PixelLayerMetrics {
    pub hit_profile: String,
    pub hitmap: String,
    pub hit_dist: String,
    pub segment_hitmap: String,
    pub segment_profile: String,
    pub hits_trigger: String,
}

impl PixelLayerMetrics {
    #[must_use]
    pub fn new(layer: usize) -> Self {
        Self {
            hit_profile: format!("Pixel_Hitprofile_{layer}"),
            hitmap: format!("Pixel_Hitmap_{layer}"),
            hit_dist: format!("Pixel_Hitdist_{layer}"),
            segment_hitmap: format!("Pixel_Segment_Hitmap_{layer}"),
            segment_profile: format!("Pixel_Segment_Hitprofile_{layer}"),
            hits_trigger: format!("Pixel_NumberHitsTrigger_{layer}"),
        }
    }
}

/// Names shared by all pixel FEEs.
#[derive(Debug, Clone)]
pub struct PixelMetrics {
    pub layers: [PixelLayerMetrics; PIXEL_LAYERS],
    pub lane_chip: [String; LANE_MAP_FEES],
}

impl Default for PixelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            layers: std::array::from_fn(PixelLayerMetrics::new),
            lane_chip: std::array::from_fn(|fee| format!("Pixel_LaneIDChipID_FEE{fee}")),
        }
    }

    /// Lane-vs-chip name of `fee`, if that FEE has one.
    #[must_use]
    pub fn lane_chip(&self, fee: usize) -> Option<&str> {
        self.lane_chip.get(fee).map(String::as_str)
    }
}
