//! Geometry and segment mapping.
//!
//! Translates `(chip, lane, link)` to a chip position in the layer and pixel
//! hits to coarse segments. Two closed mapping variants exist: inner-barrel
//! style staves (`IB`) and outer-barrel style half-staves (`OB`). A mapper is
//! built for exactly one of them.

use focalraw_core::PixelHit;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Pixel mapping variant, selected once at start-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MappingVariant {
    #[default]
    #[serde(rename = "IB")]
    Ib,
    #[serde(rename = "OB")]
    Ob,
}

impl MappingVariant {
    /// Static geometry of this variant.
    #[must_use]
    pub const fn geometry(self) -> SensorGeometry {
        match self {
            MappingVariant::Ib => IB_GEOMETRY,
            MappingVariant::Ob => OB_GEOMETRY,
        }
    }
}

impl fmt::Display for MappingVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingVariant::Ib => f.write_str("IB"),
            MappingVariant::Ob => f.write_str("OB"),
        }
    }
}

impl FromStr for MappingVariant {
    type Err = focalraw_core::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IB" => Ok(MappingVariant::Ib),
            "OB" => Ok(MappingVariant::Ob),
            other => Err(focalraw_core::Error::Config(format!(
                "unknown pixel layout '{other}' (expected IB or OB)"
            ))),
        }
    }
}

/// Sensor and segment constants of one mapping variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorGeometry {
    /// Pixel columns per chip.
    pub columns: u16,
    /// Pixel rows per chip.
    pub rows: u16,
    /// Pixel columns per segment.
    pub segment_columns: u16,
    /// Pixel rows per segment.
    pub segment_rows: u16,
    /// Chip columns in one layer.
    pub chip_columns: usize,
    /// Chip rows in one layer.
    pub chip_rows: usize,
}

impl SensorGeometry {
    /// Segments per chip as `(columns, rows)`.
    #[must_use]
    pub const fn segments_per_chip(&self) -> (usize, usize) {
        (
            (self.columns / self.segment_columns) as usize,
            (self.rows / self.segment_rows) as usize,
        )
    }

    /// Segments in one layer as `(columns, rows)`.
    #[must_use]
    pub const fn layer_segments(&self) -> (usize, usize) {
        let (c, r) = self.segments_per_chip();
        (c * self.chip_columns, r * self.chip_rows)
    }

    /// Chips in one layer.
    #[must_use]
    pub const fn chips(&self) -> usize {
        self.chip_columns * self.chip_rows
    }
}

const IB_GEOMETRY: SensorGeometry = SensorGeometry {
    columns: 1024,
    rows: 512,
    segment_columns: 64,
    segment_rows: 64,
    chip_columns: 3,
    chip_rows: 3,
};

const OB_GEOMETRY: SensorGeometry = SensorGeometry {
    columns: 1024,
    rows: 512,
    segment_columns: 128,
    segment_rows: 128,
    chip_columns: 7,
    chip_rows: 2,
};

const _: () = {
    assert!(IB_GEOMETRY.columns % IB_GEOMETRY.segment_columns == 0);
    assert!(IB_GEOMETRY.rows % IB_GEOMETRY.segment_rows == 0);
    assert!(OB_GEOMETRY.columns % OB_GEOMETRY.segment_columns == 0);
    assert!(OB_GEOMETRY.rows % OB_GEOMETRY.segment_rows == 0);
};

/// Segments per chip of `variant` as `(columns, rows)`.
#[must_use]
pub const fn segment_grid_shape(variant: MappingVariant) -> (usize, usize) {
    variant.geometry().segments_per_chip()
}

/// Placement of a chip in its layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipPosition {
    pub column: i32,
    pub row: i32,
    pub invert_column: bool,
    pub invert_row: bool,
}

impl ChipPosition {
    const fn upright(column: i32, row: i32) -> Self {
        Self {
            column,
            row,
            invert_column: false,
            invert_row: false,
        }
    }

    const fn rotated(column: i32, row: i32) -> Self {
        Self {
            column,
            row,
            invert_column: true,
            invert_row: true,
        }
    }

    /// Linear chip index inside a seven-column layer grid.
    #[must_use]
    pub const fn chip_index(&self) -> i32 {
        self.row * 7 + self.column
    }
}

/// Chip outside the geometry table of the active mapping.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid chip {chip_id} (lane {lane_id}) on link {link_id:#06x} for {variant} mapping")]
pub struct InvalidChip {
    pub chip_id: u8,
    pub lane_id: u8,
    pub link_id: u16,
    pub variant: MappingVariant,
}

/// Chip and segment mapper for one variant.
#[derive(Debug, Clone, Copy)]
pub struct PixelMapper {
    variant: MappingVariant,
}

impl PixelMapper {
    #[must_use]
    pub fn new(variant: MappingVariant) -> Self {
        log::info!("Using pixel layout: {variant}");
        Self { variant }
    }

    #[must_use]
    pub fn variant(&self) -> MappingVariant {
        self.variant
    }

    #[must_use]
    pub fn geometry(&self) -> SensorGeometry {
        self.variant.geometry()
    }

    /// Looks up the chip position.
    ///
    /// Every link of a run shares the same table; `link_id` and `lane_id`
    /// only label the error.
    ///
    /// # Errors
    /// Returns [`InvalidChip`] if `chip_id` is not in the table.
    pub fn position_of(
        &self,
        chip_id: u8,
        lane_id: u8,
        link_id: u16,
    ) -> Result<ChipPosition, InvalidChip> {
        let id = i32::from(chip_id);
        let position = match self.variant {
            MappingVariant::Ib => (0..=8).contains(&id).then(|| ChipPosition::upright(id / 3, id % 3)),
            MappingVariant::Ob => match id {
                0..=6 => Some(ChipPosition::upright(id, 0)),
                8..=14 => Some(ChipPosition::rotated(14 - id, 1)),
                _ => None,
            },
        };
        position.ok_or(InvalidChip {
            chip_id,
            lane_id,
            link_id,
            variant: self.variant,
        })
    }

    /// Segment of `hit` inside its chip.
    #[must_use]
    pub fn segment_of(&self, hit: PixelHit, position: ChipPosition) -> (usize, usize) {
        segment_of(hit, position, self.variant)
    }

    /// Segment of `hit` in layer coordinates.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn layer_segment_of(&self, hit: PixelHit, position: ChipPosition) -> (usize, usize) {
        let (per_col, per_row) = segment_grid_shape(self.variant);
        let (seg_col, seg_row) = self.segment_of(hit, position);
        (
            position.column.max(0) as usize * per_col + seg_col,
            position.row.max(0) as usize * per_row + seg_row,
        )
    }
}

/// Segment of `hit` inside its chip for `variant`.
///
/// Inverted axes are reflected as `size - raw` before division. The result
/// is clamped to the last segment, which a reflected zero would exceed.
#[must_use]
pub fn segment_of(hit: PixelHit, position: ChipPosition, variant: MappingVariant) -> (usize, usize) {
    let g = variant.geometry();
    let (per_col, per_row) = g.segments_per_chip();

    let col = if position.invert_column {
        g.columns.saturating_sub(hit.column)
    } else {
        hit.column
    };
    let row = if position.invert_row {
        g.rows.saturating_sub(hit.row)
    } else {
        hit.row
    };

    (
        usize::from(col / g.segment_columns).min(per_col - 1),
        usize::from(row / g.segment_rows).min(per_row - 1),
    )
}

/// Pad readout channel to pad cell mapping.
///
/// Channels 0..72 form a 9 x 8 grid, filled row by row. The remaining
/// regular channels have no cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct PadMapper;

impl PadMapper {
    pub const COLUMNS: usize = 9;
    pub const ROWS: usize = 8;

    /// `(column, row)` of `channel`, if it is a pad cell.
    #[must_use]
    pub fn cell_of(channel: usize) -> Option<(usize, usize)> {
        (channel < Self::COLUMNS * Self::ROWS)
            .then(|| (channel % Self::COLUMNS, channel / Self::COLUMNS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_grid_shape() {
        assert_eq!(segment_grid_shape(MappingVariant::Ib), (16, 8));
        assert_eq!(segment_grid_shape(MappingVariant::Ob), (8, 4));
        assert_eq!(MappingVariant::Ib.geometry().layer_segments(), (48, 24));
        assert_eq!(MappingVariant::Ob.geometry().layer_segments(), (56, 8));
        assert_eq!(MappingVariant::Ob.geometry().chips(), 14);
    }

    #[test]
    fn test_ib_positions() {
        let mapper = PixelMapper::new(MappingVariant::Ib);
        assert_eq!(
            mapper.position_of(3, 3, 0).unwrap(),
            ChipPosition {
                column: 1,
                row: 0,
                invert_column: false,
                invert_row: false
            }
        );
        assert_eq!(mapper.position_of(8, 8, 0).unwrap().column, 2);
        assert_eq!(mapper.position_of(8, 8, 0).unwrap().row, 2);
        let err = mapper.position_of(9, 9, 0x0101).unwrap_err();
        assert_eq!(err.chip_id, 9);
        assert_eq!(err.link_id, 0x0101);
    }

    #[test]
    fn test_ob_positions() {
        let mapper = PixelMapper::new(MappingVariant::Ob);
        assert_eq!(mapper.position_of(6, 0, 0).unwrap(), ChipPosition::upright(6, 0));
        assert_eq!(mapper.position_of(8, 0, 0).unwrap(), ChipPosition::rotated(6, 1));
        assert_eq!(mapper.position_of(14, 0, 0).unwrap(), ChipPosition::rotated(0, 1));
        assert!(mapper.position_of(7, 0, 0).is_err());
        assert!(mapper.position_of(15, 0, 0).is_err());
        assert!(mapper.position_of(99, 0, 0).is_err());
    }

    #[test]
    fn test_segment_of_upright() {
        let pos = ChipPosition::upright(1, 0);
        let a = segment_of(PixelHit::new(10, 20), pos, MappingVariant::Ib);
        let b = segment_of(PixelHit::new(10, 21), pos, MappingVariant::Ib);
        assert_eq!(a, (0, 0));
        assert_eq!(a, b);

        let mapper = PixelMapper::new(MappingVariant::Ib);
        assert_eq!(mapper.layer_segment_of(PixelHit::new(10, 20), pos), (16, 0));
        assert_eq!(mapper.layer_segment_of(PixelHit::new(1023, 511), pos), (31, 7));
    }

    #[test]
    fn test_segment_of_inverted_reflects_and_clamps() {
        let pos = ChipPosition::rotated(0, 1);
        // 1024 - 0 = 1024 -> 8, clamped to 7
        assert_eq!(
            segment_of(PixelHit::new(0, 0), pos, MappingVariant::Ob),
            (7, 3)
        );
        // 1024 - 1023 = 1 -> 0
        assert_eq!(
            segment_of(PixelHit::new(1023, 511), pos, MappingVariant::Ob),
            (0, 0)
        );
        // 1024 - 200 = 824 -> 6; 512 - 200 = 312 -> 2
        assert_eq!(
            segment_of(PixelHit::new(200, 200), pos, MappingVariant::Ob),
            (6, 2)
        );
    }

    #[test]
    fn test_segment_of_is_order_independent() {
        let pos = ChipPosition::rotated(2, 1);
        let hit = PixelHit::new(500, 300);
        let first = segment_of(hit, pos, MappingVariant::Ob);
        let _ = segment_of(PixelHit::new(1, 1), pos, MappingVariant::Ob);
        assert_eq!(segment_of(hit, pos, MappingVariant::Ob), first);
    }

    #[test]
    fn test_variant_parsing() {
        assert_eq!("IB".parse::<MappingVariant>().unwrap(), MappingVariant::Ib);
        assert_eq!("OB".parse::<MappingVariant>().unwrap(), MappingVariant::Ob);
        assert!("ML".parse::<MappingVariant>().is_err());
        let v: MappingVariant = serde_json::from_str("\"OB\"").unwrap();
        assert_eq!(v, MappingVariant::Ob);
        assert!(serde_json::from_str::<MappingVariant>("\"ib\"").is_err());
    }

    #[test]
    fn test_pad_cells() {
        assert_eq!(PadMapper::cell_of(0), Some((0, 0)));
        assert_eq!(PadMapper::cell_of(10), Some((1, 1)));
        assert_eq!(PadMapper::cell_of(71), Some((8, 7)));
        assert_eq!(PadMapper::cell_of(72), None);
    }
}
