//! Per-cycle pipeline orchestration.

use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::metrics::TF_ERROR;
use crate::pad::PadAggregator;
use crate::pixel::PixelAggregator;
use focalraw_core::{Calibration, MetricsSink};
use focalraw_io::{
    is_lost_interval, word_kind_of, CompletePayload, RawSource, Reassembler, PAD_LINK_ID,
};
use serde::Serialize;

/// Where the monitor is within a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum CyclePhase {
    #[default]
    Idle,
    Reassembling,
    Decoding,
    Aggregating,
}

/// Outcome of one processing cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    /// Cycle number since construction or the last reset, starting at 1.
    pub cycle: u64,
    /// A source had no payload; nothing was decoded.
    pub lost: bool,
    /// A source was structurally corrupted; the cycle was aborted.
    pub corrupted: bool,
    /// Completed trigger payloads of all links.
    pub payloads: usize,
    pub pad_payloads: usize,
    pub pad_events: usize,
    pub pad_leftover_bytes: usize,
    pub pixel_payloads: usize,
    pub pixel_triggers: usize,
    pub pixel_chips: usize,
    pub pixel_hits: usize,
    pub invalid_chips: usize,
    pub decode_errors: usize,
    /// Payloads not a whole number of words of their system.
    pub misaligned_payloads: usize,
    /// Payloads of a disabled system.
    pub skipped_payloads: usize,
    /// Bytes of unterminated triggers dropped at cycle end.
    pub dropped_bytes: usize,
}

/// Decoders and aggregators behind the reassembler.
struct Pipeline {
    calibration: Calibration,
    pads: Option<PadAggregator>,
    pixels: Option<PixelAggregator>,
}

impl Pipeline {
    fn dispatch<S: MetricsSink + ?Sized>(
        &mut self,
        payload: &CompletePayload<'_>,
        sink: &mut S,
        summary: &mut CycleSummary,
    ) {
        let link = payload.link_id;
        let kind = word_kind_of(link);
        let (words, rest) = kind.count(payload.bytes.len());
        log::debug!(
            "payload on link {link:#06x}: {} bytes, {words} {kind:?} words from {} page(s)",
            payload.bytes.len(),
            payload.pages
        );
        if rest != 0 {
            log::warn!(
                "payload on link {link:#06x} is not a whole number of {kind:?} words ({rest} bytes left over)"
            );
            summary.misaligned_payloads += 1;
        }
        summary.payloads += 1;

        if link == PAD_LINK_ID {
            let Some(pads) = self.pads.as_mut() else {
                summary.skipped_payloads += 1;
                return;
            };
            let stats = pads.process_payload(payload.bytes, &self.calibration, sink);
            summary.pad_payloads += 1;
            summary.pad_events += stats.events;
            summary.pad_leftover_bytes += stats.leftover_bytes;
        } else {
            let Some(pixels) = self.pixels.as_mut() else {
                summary.skipped_payloads += 1;
                return;
            };
            let stats = pixels.process_payload(link, payload.bytes, sink);
            summary.pixel_payloads += 1;
            summary.pixel_triggers += stats.triggers;
            summary.pixel_chips += stats.chips;
            summary.pixel_hits += stats.hits;
            summary.invalid_chips += stats.invalid_chips;
            summary.decode_errors += stats.decode_errors;
        }
    }
}

/// Structural problems abort the cycle as corruption of `source`.
fn source_error(source: &RawSource<'_>, error: focalraw_io::Error) -> Error {
    if error.is_structural() {
        Error::Corrupted {
            source_name: source.name.to_string(),
            source: error,
        }
    } else {
        Error::IoError(error)
    }
}

fn transition(phase: &mut CyclePhase, next: CyclePhase) {
    if *phase != next {
        log::trace!("cycle phase {phase:?} -> {next:?}");
        *phase = next;
    }
}

/// Raw data monitor.
///
/// Owns the reassembler and all aggregation scratch. Each call to
/// [`process_cycle`](Self::process_cycle) handles one set of sources and
/// leaves the monitor idle again, whatever the outcome.
pub struct RawMonitor {
    config: MonitorConfig,
    reassembler: Reassembler,
    pipeline: Pipeline,
    phase: CyclePhase,
    cycles: u64,
    last_summary: CycleSummary,
}

impl RawMonitor {
    /// Builds a monitor from a validated configuration.
    ///
    /// A correction toggle without its calibration table is logged and
    /// ignored.
    ///
    /// # Errors
    /// Returns [`Error::CoreError`] if the configuration is invalid.
    pub fn new(config: MonitorConfig, calibration: Calibration) -> Result<Self> {
        config.validate()?;

        log::info!(
            "Pads {}, pixels {}",
            if config.disable_pads { "disabled" } else { "enabled" },
            if config.disable_pixels { "disabled" } else { "enabled" }
        );
        log::info!("Pad TOT cut: {}", config.pad_tot_cut);
        if config.subtract_pad_pedestals {
            if calibration.pedestals.is_some() {
                log::info!("Pad pedestal subtraction enabled");
            } else {
                log::error!("No pedestal data found, pedestal subtraction not possible");
            }
        }
        if config.mask_pad_bad_channels {
            if calibration.channel_status.is_some() {
                log::info!("Pad bad channel masking enabled");
            } else {
                log::error!("No bad channel map found, masking not possible");
            }
        }

        let pads = (!config.disable_pads).then(|| PadAggregator::new(&config, &calibration));
        let pixels = (!config.disable_pixels).then(|| PixelAggregator::new(config.pixel_layout));

        Ok(Self {
            reassembler: Reassembler::new().with_debug(config.debug),
            pipeline: Pipeline {
                calibration,
                pads,
                pixels,
            },
            config,
            phase: CyclePhase::Idle,
            cycles: 0,
            last_summary: CycleSummary::default(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    #[must_use]
    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Summary of the most recent cycle, including an aborted one.
    #[must_use]
    pub fn last_summary(&self) -> &CycleSummary {
        &self.last_summary
    }

    /// Clears all per-run state.
    pub fn reset(&mut self) {
        log::info!("resetting monitor after {} cycle(s)", self.cycles);
        self.reassembler.reset();
        if let Some(pads) = self.pipeline.pads.as_mut() {
            pads.reset();
        }
        if let Some(pixels) = self.pipeline.pixels.as_mut() {
            pixels.begin_cycle();
        }
        self.phase = CyclePhase::Idle;
        self.cycles = 0;
        self.last_summary = CycleSummary::default();
    }

    /// Processes one cycle made of `sources`, filling `sink`.
    ///
    /// A lost interval is recorded in `sink` and returns normally with
    /// [`CycleSummary::lost`] set.
    ///
    /// # Errors
    /// Returns [`Error::Corrupted`] if a source cannot be walked. Metrics
    /// aggregated before the corrupted page have been flushed to `sink`,
    /// and [`last_summary`](Self::last_summary) holds the partial counts.
    pub fn process_cycle<S: MetricsSink + ?Sized>(
        &mut self,
        sources: &[RawSource<'_>],
        sink: &mut S,
    ) -> Result<CycleSummary> {
        self.cycles += 1;
        let mut summary = CycleSummary {
            cycle: self.cycles,
            ..CycleSummary::default()
        };
        self.begin_cycle();

        let outcome = match self.check_sources(sources) {
            Ok(true) => {
                log::warn!("cycle {}: interval lost, skipping decoding", self.cycles);
                sink.fill_scalar(TF_ERROR, 1.0);
                summary.lost = true;
                Ok(())
            }
            Ok(false) => {
                sink.fill_scalar(TF_ERROR, 2.0);
                self.run_sources(sources, sink, &mut summary)
            }
            Err(e) => Err(e),
        };

        summary.dropped_bytes = self.reassembler.finish();
        transition(&mut self.phase, CyclePhase::Aggregating);
        if !summary.lost {
            if let Some(pixels) = self.pipeline.pixels.as_mut() {
                pixels.end_cycle(sink);
            }
        }
        transition(&mut self.phase, CyclePhase::Idle);

        summary.corrupted = outcome.is_err();
        self.last_summary = summary.clone();
        match outcome {
            Ok(()) => {
                log::debug!("cycle {} done: {summary:?}", summary.cycle);
                Ok(summary)
            }
            Err(e) => {
                log::error!("{e}");
                Err(e)
            }
        }
    }

    fn begin_cycle(&mut self) {
        self.reassembler.reset();
        if let Some(pixels) = self.pipeline.pixels.as_mut() {
            pixels.begin_cycle();
        }
        transition(&mut self.phase, CyclePhase::Reassembling);
    }

    /// Lost-interval check over every source.
    fn check_sources(&self, sources: &[RawSource<'_>]) -> Result<bool> {
        for source in sources {
            let lost = is_lost_interval(std::slice::from_ref(source))
                .map_err(|e| source_error(source, e))?;
            if lost {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn run_sources<S: MetricsSink + ?Sized>(
        &mut self,
        sources: &[RawSource<'_>],
        sink: &mut S,
        summary: &mut CycleSummary,
    ) -> Result<()> {
        let Self {
            reassembler,
            pipeline,
            phase,
            ..
        } = self;

        for source in sources {
            log::debug!(
                "walking {} ({:?}, {} bytes)",
                source.name,
                source.kind,
                source.data.len()
            );
            let mut walker = reassembler.walk(source.data);
            loop {
                transition(phase, CyclePhase::Reassembling);
                let payload = match walker.next_payload() {
                    Ok(Some(payload)) => payload,
                    Ok(None) => break,
                    Err(e) => return Err(source_error(source, e)),
                };
                transition(phase, CyclePhase::Decoding);
                pipeline.dispatch(&payload, sink, summary);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use focalraw_core::RecordingSink;
    use focalraw_io::{RawPageHeader, TriggerFlags};

    fn trigger(out: &mut Vec<u8>, link: u16, payload: &[u8]) {
        RawPageHeader::new(link)
            .with_trigger(TriggerFlags::HB | TriggerFlags::SOT)
            .write_page(payload, out)
            .unwrap();
        RawPageHeader::new(link)
            .with_trigger(TriggerFlags::HB)
            .with_stop(true)
            .write_page(&[], out)
            .unwrap();
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MonitorConfig::new()
            .with_pads_disabled(true)
            .with_pixels_disabled(true);
        assert!(RawMonitor::new(config, Calibration::new()).is_err());
    }

    #[test]
    fn test_disabled_system_payloads_skipped() {
        let config = MonitorConfig::new().with_pixels_disabled(true);
        let mut monitor = RawMonitor::new(config, Calibration::new()).unwrap();
        let mut data = Vec::new();
        trigger(&mut data, 0x0001, &[0u8; 32]);

        let mut sink = RecordingSink::new();
        let summary = monitor
            .process_cycle(&[RawSource::direct("raw", &data)], &mut sink)
            .unwrap();
        assert_eq!(summary.payloads, 1);
        assert_eq!(summary.skipped_payloads, 1);
        assert_eq!(summary.pixel_payloads, 0);
        assert_eq!(sink.scalars(TF_ERROR), vec![2.0]);
        assert_eq!(monitor.phase(), CyclePhase::Idle);
    }

    #[test]
    fn test_misaligned_payload_counted() {
        let mut monitor = RawMonitor::new(MonitorConfig::new(), Calibration::new()).unwrap();
        let mut data = Vec::new();
        trigger(&mut data, PAD_LINK_ID, &[0u8; 6]);

        let mut sink = RecordingSink::new();
        let summary = monitor
            .process_cycle(&[RawSource::direct("raw", &data)], &mut sink)
            .unwrap();
        assert_eq!(summary.misaligned_payloads, 1);
        assert_eq!(summary.pad_events, 0);
        assert_eq!(summary.pad_leftover_bytes, 6);
    }

    #[test]
    fn test_cycle_numbering_and_reset() {
        let mut monitor = RawMonitor::new(MonitorConfig::new(), Calibration::new()).unwrap();
        let mut data = Vec::new();
        trigger(&mut data, 0x0001, &[0xFFu8; 16]);
        let mut sink = RecordingSink::new();
        for expected in 1..=3 {
            let summary = monitor
                .process_cycle(&[RawSource::direct("raw", &data)], &mut sink)
                .unwrap();
            assert_eq!(summary.cycle, expected);
        }
        monitor.reset();
        assert_eq!(monitor.last_summary().cycle, 0);
        let summary = monitor
            .process_cycle(&[RawSource::direct("raw", &data)], &mut sink)
            .unwrap();
        assert_eq!(summary.cycle, 1);
    }
}
