//! Pixel trigger aggregation.
//!
//! Every payload of a pixel link is decoded into trigger groups. Per chip
//! the aggregator fills hit statistics, looks up the chip position and
//! buckets every hit into a layer segment. Segment counts are collected in
//! one scratch grid per layer, sized once from the mapping variant. The
//! non-zero cells and the hits per trigger are summed over the whole cycle
//! and flushed by [`PixelAggregator::end_cycle`].

use crate::metrics::{
    PixelMetrics, PIXEL_AVG_HITS_CHIP, PIXEL_CHIP_IDS, PIXEL_CHIP_IDS_FILLED, PIXEL_HITS_CHIP,
    PIXEL_HITS_TRIGGER_ALL, PIXEL_LAYERS, PIXEL_PAGES_FEE, PIXEL_TRIGGERS_HBF,
};
use focalraw_core::{MetricsSink, PixelTriggerGroup};
use focalraw_decode::{MappingVariant, PixelDecoder, PixelMapper};
use std::collections::{BTreeMap, BTreeSet};

/// Routing fields packed into a pixel link id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelLink {
    pub link_id: u16,
    pub fee: usize,
    pub branch: usize,
}

impl PixelLink {
    #[must_use]
    pub fn new(link_id: u16) -> Self {
        Self {
            link_id,
            fee: usize::from(link_id & 0xFF),
            branch: usize::from((link_id & 0x0F00) >> 8),
        }
    }

    /// FEE index used on aggregation axes.
    #[must_use]
    pub fn aggregation_fee(&self) -> usize {
        self.branch * 10 + self.fee
    }

    /// Pixel layer served by this FEE.
    #[must_use]
    pub fn layer(&self) -> usize {
        if self.fee < 2 {
            0
        } else {
            1
        }
    }
}

/// Counts from one pixel payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelPayloadStats {
    pub triggers: usize,
    pub chips: usize,
    pub hits: usize,
    pub invalid_chips: usize,
    pub decode_errors: usize,
}

/// Decodes pixel payloads and aggregates their trigger groups.
pub struct PixelAggregator {
    decoder: PixelDecoder,
    accumulator: Accumulator,
}

impl PixelAggregator {
    #[must_use]
    pub fn new(variant: MappingVariant) -> Self {
        let mapper = PixelMapper::new(variant);
        let (columns, rows) = mapper.geometry().layer_segments();
        log::debug!("pixel segment grid {columns} x {rows} per layer");
        Self {
            decoder: PixelDecoder::new(),
            accumulator: Accumulator {
                mapper,
                names: PixelMetrics::new(),
                segment_columns: columns,
                segments: std::array::from_fn(|_| vec![0; columns * rows]),
                hits_per_trigger: BTreeMap::new(),
                hits_per_trigger_layer: std::array::from_fn(|_| BTreeMap::new()),
                found: BTreeSet::new(),
                with_hits: BTreeSet::new(),
            },
        }
    }

    #[must_use]
    pub fn variant(&self) -> MappingVariant {
        self.accumulator.mapper.variant()
    }

    /// Clears the per-cycle scratch.
    pub fn begin_cycle(&mut self) {
        for grid in &mut self.accumulator.segments {
            grid.fill(0);
        }
        self.accumulator.hits_per_trigger.clear();
        for layer in &mut self.accumulator.hits_per_trigger_layer {
            layer.clear();
        }
        self.decoder.reset();
    }

    /// Flushes the segment counts and hits-per-trigger totals of the cycle.
    #[allow(clippy::cast_precision_loss)]
    pub fn end_cycle<S: MetricsSink + ?Sized>(&mut self, sink: &mut S) {
        let acc = &mut self.accumulator;
        for (layer, grid) in acc.segments.iter_mut().enumerate() {
            let name = &acc.names.layers[layer].segment_profile;
            for (idx, count) in grid.iter_mut().enumerate() {
                if *count > 0 {
                    let (seg_col, seg_row) = (idx % acc.segment_columns, idx / acc.segment_columns);
                    sink.fill_2d(name, seg_col as f64, seg_row as f64, f64::from(*count));
                    *count = 0;
                }
            }
        }
        for &hits in acc.hits_per_trigger.values() {
            sink.fill_scalar(PIXEL_HITS_TRIGGER_ALL, hits as f64);
        }
        for (layer, totals) in acc.hits_per_trigger_layer.iter().enumerate() {
            for &hits in totals.values() {
                sink.fill_scalar(&acc.names.layers[layer].hits_trigger, hits as f64);
            }
        }
        acc.hits_per_trigger.clear();
        for layer in &mut acc.hits_per_trigger_layer {
            layer.clear();
        }
    }

    /// Decodes one payload of `link_id` and aggregates its triggers.
    #[allow(clippy::cast_precision_loss)]
    pub fn process_payload<S: MetricsSink + ?Sized>(
        &mut self,
        link_id: u16,
        payload: &[u8],
        sink: &mut S,
    ) -> PixelPayloadStats {
        let link = PixelLink::new(link_id);
        let fee = link.aggregation_fee() as f64;
        sink.fill_scalar(PIXEL_PAGES_FEE, fee);

        let groups = self.decoder.decode(payload);
        sink.fill_2d(PIXEL_TRIGGERS_HBF, fee, groups.len() as f64, 1.0);

        let mut stats = PixelPayloadStats::default();
        for group in groups {
            self.accumulator.group(link, group, sink, &mut stats);
        }

        for error in self.decoder.errors() {
            log::error!("pixel decoding on link {link_id:#06x}: {error}");
        }
        stats.decode_errors = self.decoder.errors().len();
        stats
    }

    /// Aggregates already decoded trigger groups of `link_id`.
    pub fn process_groups<S: MetricsSink + ?Sized>(
        &mut self,
        link_id: u16,
        groups: &[PixelTriggerGroup],
        sink: &mut S,
    ) -> PixelPayloadStats {
        let link = PixelLink::new(link_id);
        let mut stats = PixelPayloadStats::default();
        for group in groups {
            self.accumulator.group(link, group, sink, &mut stats);
        }
        stats
    }
}

struct Accumulator {
    mapper: PixelMapper,
    names: PixelMetrics,
    segment_columns: usize,
    /// Segment counts of the cycle per layer, row-major.
    segments: [Vec<u32>; PIXEL_LAYERS],
    hits_per_trigger: BTreeMap<u32, usize>,
    hits_per_trigger_layer: [BTreeMap<u32, usize>; PIXEL_LAYERS],
    found: BTreeSet<u8>,
    with_hits: BTreeSet<u8>,
}

impl Accumulator {
    #[allow(clippy::cast_precision_loss)]
    fn group<S: MetricsSink + ?Sized>(
        &mut self,
        link: PixelLink,
        group: &PixelTriggerGroup,
        sink: &mut S,
        stats: &mut PixelPayloadStats,
    ) {
        let fee = link.aggregation_fee() as f64;
        let layer = link.layer();
        let layer_names = &self.names.layers[layer];
        let lane_chip = self.names.lane_chip(link.fee);

        self.found.clear();
        self.with_hits.clear();
        let mut group_hits = 0;

        for chip in &group.chips {
            let nhits = chip.hits.len();
            group_hits += nhits;
            sink.fill_scalar(PIXEL_HITS_CHIP, nhits as f64);
            sink.fill_2d(
                PIXEL_AVG_HITS_CHIP,
                fee,
                f64::from(chip.chip_id),
                nhits as f64,
            );
            if let Some(name) = lane_chip {
                sink.fill_2d(name, f64::from(chip.lane_id), f64::from(chip.chip_id), 1.0);
            }
            self.found.insert(chip.chip_id);
            if nhits > 0 {
                self.with_hits.insert(chip.chip_id);
            }

            let position = match self.mapper.position_of(chip.chip_id, chip.lane_id, link.link_id) {
                Ok(position) => position,
                Err(e) => {
                    log::error!("Error in chip index: {e}");
                    stats.invalid_chips += 1;
                    continue;
                }
            };

            let (col, row) = (f64::from(position.column), f64::from(position.row));
            sink.fill_2d(&layer_names.hit_profile, col, row, nhits as f64);
            sink.fill_2d(&layer_names.hitmap, col, row, nhits as f64);
            sink.fill_2d(
                &layer_names.hit_dist,
                f64::from(position.chip_index()),
                nhits as f64,
                1.0,
            );
            for &hit in &chip.hits {
                let (seg_col, seg_row) = self.mapper.layer_segment_of(hit, position);
                sink.fill_2d(
                    &layer_names.segment_hitmap,
                    seg_col as f64,
                    seg_row as f64,
                    1.0,
                );
                let cell = seg_row * self.segment_columns + seg_col;
                if let Some(count) = self.segments[layer].get_mut(cell) {
                    *count += 1;
                }
            }
        }

        for &chip_id in &self.found {
            sink.fill_2d(PIXEL_CHIP_IDS, fee, f64::from(chip_id), 1.0);
        }
        for &chip_id in &self.with_hits {
            sink.fill_2d(PIXEL_CHIP_IDS_FILLED, fee, f64::from(chip_id), 1.0);
        }

        *self.hits_per_trigger.entry(group.trigger_id).or_default() += group_hits;
        *self.hits_per_trigger_layer[layer]
            .entry(group.trigger_id)
            .or_default() += group_hits;

        stats.triggers += 1;
        stats.chips += group.chips.len();
        stats.hits += group_hits;
    }
}
