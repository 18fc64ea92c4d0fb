//! Pad event aggregation.

use crate::config::MonitorConfig;
use crate::metrics::{pad_metrics, PadAsicMetrics, PAD_PAYLOAD_SIZE};
use focalraw_core::{
    Calibration, LookupError, MetricsSink, PadChannelKind, PadChannelRecord, PadEvent,
};
use focalraw_decode::pad::split_events;
use focalraw_decode::{PadDecoder, PadMapper, WordKind};
use std::collections::HashSet;

/// Whether a channel with `tot` carries a valid ADC under `cut`.
///
/// Channels at or above the cut are saturated or out of window.
#[inline]
#[must_use]
pub fn adc_is_valid(tot: u16, cut: u16) -> bool {
    tot < cut
}

/// Counts from one pad payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PadPayloadStats {
    pub events: usize,
    /// Trailing bytes shorter than one event.
    pub leftover_bytes: usize,
}

/// Decodes pad payloads and forwards channel values to a sink.
#[derive(Debug)]
pub struct PadAggregator {
    tot_cut: u16,
    subtract_pedestals: bool,
    mask_bad_channels: bool,
    names: Vec<PadAsicMetrics>,
    decoder: PadDecoder,
    reported_pedestals: HashSet<(usize, usize)>,
    reported_status: HashSet<(usize, usize)>,
}

impl PadAggregator {
    /// Builds the aggregator. Corrections are only applied when both the
    /// toggle is set and `calibration` carries the matching table.
    #[must_use]
    pub fn new(config: &MonitorConfig, calibration: &Calibration) -> Self {
        Self {
            tot_cut: config.pad_tot_cut,
            subtract_pedestals: config.subtract_pad_pedestals && calibration.pedestals.is_some(),
            mask_bad_channels: config.mask_pad_bad_channels
                && calibration.channel_status.is_some(),
            names: pad_metrics(&config.projection_channels()),
            decoder: PadDecoder::new(),
            reported_pedestals: HashSet::new(),
            reported_status: HashSet::new(),
        }
    }

    /// Forgets which lookup misses were already reported.
    pub fn reset(&mut self) {
        self.reported_pedestals.clear();
        self.reported_status.clear();
    }

    /// Splits `payload` into events and aggregates each of them.
    #[allow(clippy::cast_precision_loss)]
    pub fn process_payload<S: MetricsSink + ?Sized>(
        &mut self,
        payload: &[u8],
        calibration: &Calibration,
        sink: &mut S,
    ) -> PadPayloadStats {
        let (words, _) = WordKind::Pad.count(payload.len());
        sink.fill_scalar(PAD_PAYLOAD_SIZE, words as f64);

        let (events, leftover_bytes) = split_events(payload);
        let mut stats = PadPayloadStats {
            events: 0,
            leftover_bytes,
        };
        for bytes in events {
            let event = match self.decoder.decode_event(bytes) {
                Ok(event) => event,
                Err(e) => {
                    log::error!("pad event decoding failed: {e}");
                    continue;
                }
            };
            Self::aggregate(
                event,
                &self.names,
                Corrections {
                    tot_cut: self.tot_cut,
                    subtract_pedestals: self.subtract_pedestals,
                    mask_bad_channels: self.mask_bad_channels,
                    calibration,
                    reported_pedestals: &mut self.reported_pedestals,
                    reported_status: &mut self.reported_status,
                },
                sink,
            );
            stats.events += 1;
        }

        if leftover_bytes > 0 {
            log::warn!(
                "pad payload of {} bytes ends with {leftover_bytes} bytes that do not form an event",
                payload.len()
            );
        }
        stats
    }

    /// Aggregates one decoded event.
    pub fn process_event<S: MetricsSink + ?Sized>(
        &mut self,
        event: &PadEvent,
        calibration: &Calibration,
        sink: &mut S,
    ) {
        Self::aggregate(
            event,
            &self.names,
            Corrections {
                tot_cut: self.tot_cut,
                subtract_pedestals: self.subtract_pedestals,
                mask_bad_channels: self.mask_bad_channels,
                calibration,
                reported_pedestals: &mut self.reported_pedestals,
                reported_status: &mut self.reported_status,
            },
            sink,
        );
    }

    fn aggregate<S: MetricsSink + ?Sized>(
        event: &PadEvent,
        names: &[PadAsicMetrics],
        mut corrections: Corrections<'_>,
        sink: &mut S,
    ) {
        for (asic, metrics) in event.asics.iter().zip(names) {
            for record in &asic.channels {
                match record.kind() {
                    PadChannelKind::Regular => {
                        corrections.regular_channel(asic.asic, record, metrics, sink);
                    }
                    PadChannelKind::CommonMode | PadChannelKind::Calibration => {
                        corrections.extra_channel(record, metrics, sink);
                    }
                }
            }
        }
    }
}

/// Per-event view of the correction settings and miss bookkeeping.
struct Corrections<'a> {
    tot_cut: u16,
    subtract_pedestals: bool,
    mask_bad_channels: bool,
    calibration: &'a Calibration,
    reported_pedestals: &'a mut HashSet<(usize, usize)>,
    reported_status: &'a mut HashSet<(usize, usize)>,
}

impl Corrections<'_> {
    fn is_masked(&mut self, asic: usize, channel: usize) -> bool {
        let Some(source) = self.calibration.channel_status.as_deref() else {
            return false;
        };
        match source.get_channel_status(asic, channel) {
            Ok(status) => status.is_masked(),
            Err(e) => {
                report_once(self.reported_status, asic, channel, "bad channel map", e);
                false
            }
        }
    }

    fn pedestal(&mut self, asic: usize, channel: usize) -> f64 {
        let Some(source) = self.calibration.pedestals.as_deref() else {
            return 0.0;
        };
        match source.get_pedestal(asic, channel) {
            Ok(value) => value,
            Err(e) => {
                report_once(self.reported_pedestals, asic, channel, "pedestal", e);
                0.0
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn regular_channel<S: MetricsSink + ?Sized>(
        &mut self,
        asic: usize,
        record: &PadChannelRecord,
        metrics: &PadAsicMetrics,
        sink: &mut S,
    ) {
        let channel = usize::from(record.channel_index);
        if self.mask_bad_channels && self.is_masked(asic, channel) {
            return;
        }

        let x = f64::from(record.channel_index);
        if adc_is_valid(record.tot, self.tot_cut) {
            let mut adc = f64::from(record.adc);
            if self.subtract_pedestals {
                adc -= self.pedestal(asic, channel);
            }
            sink.fill_2d(&metrics.adc, x, adc, 1.0);
            if let Some((col, row)) = PadMapper::cell_of(channel) {
                sink.fill_2d(&metrics.hitmap, col as f64, row as f64, adc);
            }
        }
        sink.fill_2d(&metrics.toa, x, f64::from(record.toa), 1.0);
        if record.has_signal() {
            sink.fill_2d(&metrics.tot, x, f64::from(record.tot), 1.0);
        }
        if let Some(name) = metrics.projection(channel) {
            sink.fill_scalar(name, f64::from(record.adc));
        }
    }

    /// Common-mode and calibration words: raw values, no corrections.
    fn extra_channel<S: MetricsSink + ?Sized>(
        &self,
        record: &PadChannelRecord,
        metrics: &PadAsicMetrics,
        sink: &mut S,
    ) {
        let x = f64::from(record.channel_index);
        if adc_is_valid(record.tot, self.tot_cut) {
            sink.fill_2d(&metrics.adc, x, f64::from(record.adc), 1.0);
        }
        sink.fill_2d(&metrics.toa, x, f64::from(record.toa), 1.0);
        if record.has_signal() {
            sink.fill_2d(&metrics.tot, x, f64::from(record.tot), 1.0);
        }
    }
}

fn report_once(
    reported: &mut HashSet<(usize, usize)>,
    asic: usize,
    channel: usize,
    table: &str,
    error: LookupError,
) {
    if reported.insert((asic, channel)) {
        log::error!("{table} lookup failed, using uncorrected value: {error}");
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use focalraw_core::pad::{PAD_ASICS, PAD_RECORDS_PER_ASIC};
    use focalraw_core::{
        ChannelStatus, PadAsicEvent, PadAsicHeader, PadBadChannelMap, PedestalTable,
        RecordingSink,
    };

    #[allow(clippy::cast_possible_truncation)]
    fn event_with(asic: usize, channel: u8, adc: u16, toa: u16, tot: u16) -> PadEvent {
        let asics = (0..PAD_ASICS)
            .map(|a| PadAsicEvent {
                asic: a,
                headers: [PadAsicHeader::default(); 2],
                channels: (0..PAD_RECORDS_PER_ASIC)
                    .map(|ch| {
                        let ch = ch as u8;
                        if a == asic && ch == channel {
                            PadChannelRecord::new(ch, adc, toa, tot)
                        } else {
                            PadChannelRecord::new(ch, 0, 0, 0)
                        }
                    })
                    .collect(),
            })
            .collect();
        PadEvent { asics }
    }

    #[test]
    fn test_adc_validity_predicate() {
        assert!(adc_is_valid(1, 50));
        assert!(!adc_is_valid(50, 50));
        assert!(!adc_is_valid(0, 0));
    }

    #[test]
    fn test_fills_per_regular_channel() {
        let config = MonitorConfig::new().with_pad_tot_cut(50);
        let calibration = Calibration::new();
        let mut pads = PadAggregator::new(&config, &calibration);
        let mut sink = RecordingSink::new();
        pads.process_event(&event_with(0, 5, 100, 200, 1), &calibration, &mut sink);

        // every record has TOT 0 < 50, so every channel fills ADC and TOA
        assert_eq!(sink.count("PadADC_ASIC_0"), PAD_RECORDS_PER_ASIC);
        assert_eq!(sink.count("PadTOA_ASIC_0"), PAD_RECORDS_PER_ASIC);
        assert_eq!(sink.points("PadTOT_ASIC_0"), vec![(5.0, 1.0, 1.0)]);
        assert!(sink.points("PadADC_ASIC_0").contains(&(5.0, 100.0, 1.0)));
        assert!(sink
            .points("HitmapPadASIC_0")
            .contains(&(5.0, 0.0, 100.0)));
        // 72 pad cells
        assert_eq!(sink.count("HitmapPadASIC_0"), 72);
        assert_eq!(sink.count("Pad_ProjADC_ASIC0_Chan14"), 1);
    }

    #[test]
    fn test_masked_channel_is_skipped() {
        let config = MonitorConfig::new().with_bad_channel_masking(true);
        let calibration = Calibration::new()
            .with_channel_status(PadBadChannelMap::new().with_status(1, 7, ChannelStatus::Bad));
        let mut pads = PadAggregator::new(&config, &calibration);
        let mut sink = RecordingSink::new();
        pads.process_event(&event_with(1, 7, 10, 20, 3), &calibration, &mut sink);

        assert!(sink.points("PadTOT_ASIC_1").is_empty());
        assert!(!sink
            .points("PadTOA_ASIC_1")
            .iter()
            .any(|&(x, _, _)| x == 7.0));
        // missing entries fail open
        assert!(sink
            .points("PadTOA_ASIC_1")
            .iter()
            .any(|&(x, _, _)| x == 8.0));
    }

    #[test]
    fn test_missing_pedestal_uses_raw_value() {
        let config = MonitorConfig::new().with_pedestal_subtraction(true);
        let calibration =
            Calibration::new().with_pedestals(PedestalTable::new().with_pedestal(0, 0, 1.0));
        let mut pads = PadAggregator::new(&config, &calibration);
        let mut sink = RecordingSink::new();
        let event = event_with(0, 5, 100, 0, 1);
        pads.process_event(&event, &calibration, &mut sink);
        pads.process_event(&event, &calibration, &mut sink);

        let ch5: Vec<_> = sink
            .points("PadADC_ASIC_0")
            .into_iter()
            .filter(|&(x, _, _)| x == 5.0)
            .collect();
        assert_eq!(ch5, vec![(5.0, 100.0, 1.0); 2]);
        assert!(pads.reported_pedestals.contains(&(0, 5)));
        assert!(!pads.reported_pedestals.contains(&(0, 0)));
    }

    #[test]
    fn test_toggle_without_table_is_inert() {
        let config = MonitorConfig::new()
            .with_pedestal_subtraction(true)
            .with_bad_channel_masking(true);
        let pads = PadAggregator::new(&config, &Calibration::new());
        assert!(!pads.subtract_pedestals);
        assert!(!pads.mask_bad_channels);
    }

    #[test]
    fn test_payload_word_count_and_leftover() {
        let config = MonitorConfig::new();
        let calibration = Calibration::new();
        let mut pads = PadAggregator::new(&config, &calibration);
        let mut sink = RecordingSink::new();
        let stats = pads.process_payload(&[0u8; 12], &calibration, &mut sink);
        assert_eq!(stats.events, 0);
        assert_eq!(stats.leftover_bytes, 12);
        assert_eq!(sink.scalars(PAD_PAYLOAD_SIZE), vec![3.0]);
    }
}
