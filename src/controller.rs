/// Game loop
///
/// Drives the round state machine against a `ScreenCapture` and an
/// `InputInjector`. Everything runs on the calling thread; the only blocking
/// wait is the bounded check for operator activity after each round.
use crate::capture::ScreenCapture;
use crate::click::ClickDispatcher;
use crate::config::{Config, DetectionCategory};
use crate::error::{ControllerError, LocateError};
use crate::frame::{Frame, HsvImage};
use crate::geometry::{BBox, Point};
use crate::input::InputInjector;
use crate::state::{RoundState, RoundStateMachine, TransitionError};
use crate::templates::TemplateSet;
use crate::utils::{CycleTiming, SessionStats, Timer};
use crate::vision::{click_points, segment_hsv, SegmentationMode, TemplateMatcher};
use std::thread;
use std::time::Instant;

/// Screen boxes found while locating, fixed for the rest of the run
#[derive(Debug, Clone, Copy)]
struct Layout {
    anchor: BBox,
    play_area: BBox,
}

pub struct GameLoopController<C, I> {
    capture: C,
    dispatcher: ClickDispatcher<I>,
    matcher: TemplateMatcher,
    templates: TemplateSet,
    config: Config,
    /// Variant categories, hazards first
    categories: Vec<DetectionCategory>,
    machine: RoundStateMachine,
    layout: Option<Layout>,
    /// Centre of the round-end control, clicked to resume
    resume_target: Point,
    stats: SessionStats,
    round_cycles: u64,
    round_clicks: u64,
    started: Instant,
}

impl<C: ScreenCapture, I: InputInjector> GameLoopController<C, I> {
    pub fn new(config: Config, templates: TemplateSet, capture: C, injector: I) -> Self {
        let categories = config
            .variant
            .dispatch_order()
            .into_iter()
            .cloned()
            .collect();

        Self {
            capture,
            dispatcher: ClickDispatcher::new(injector),
            matcher: TemplateMatcher::new(config.matcher),
            templates,
            config,
            categories,
            machine: RoundStateMachine::new(),
            layout: None,
            resume_target: Point::ORIGIN,
            stats: SessionStats::new(),
            round_cycles: 0,
            round_clicks: 0,
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> RoundState {
        self.machine.state()
    }

    /// Game window box, once located (screen-absolute)
    pub fn anchor(&self) -> Option<BBox> {
        self.layout.map(|l| l.anchor)
    }

    /// Box where objects are detected, once located (screen-absolute)
    pub fn play_area(&self) -> Option<BBox> {
        self.layout.map(|l| l.play_area)
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Run until the operator stops the loop.
    ///
    /// Locate failures and input errors end the run early.
    pub fn run(mut self) -> Result<SessionStats, ControllerError> {
        tracing::info!(
            "Starting game loop (variant '{}', {:?} segmentation)",
            self.config.variant.name,
            self.config.segmentation_mode
        );

        while !self.step()?.is_terminal() {}
        Ok(self.stats)
    }

    /// Advance by one unit of work and return the resulting state.
    ///
    /// In `Active` that is one perception cycle; in `AwaitingResume` one
    /// bounded wait. Stepping a terminated loop does nothing.
    pub fn step(&mut self) -> Result<RoundState, ControllerError> {
        match self.machine.state() {
            RoundState::Locating => self.locate()?,
            RoundState::Active => self.play_cycle()?,
            RoundState::AwaitingResume => self.await_resume()?,
            RoundState::Terminated => {}
        }
        Ok(self.machine.state())
    }

    fn locate(&mut self) -> Result<(), ControllerError> {
        let screen = self
            .capture
            .grab(None)
            .ok_or(LocateError::CaptureUnavailable)?;
        let anchor = self
            .matcher
            .locate(
                &screen,
                &self.templates.anchor,
                self.config.anchor_similarity,
                self.capture.screen_origin(),
            )
            .ok_or(LocateError::AnchorNotFound {
                threshold: self.config.anchor_similarity,
            })?;
        tracing::info!("Game window found at {:?}", anchor);

        let window = self
            .capture
            .grab(Some(anchor))
            .ok_or(LocateError::CaptureUnavailable)?;
        let start = self
            .matcher
            .locate(
                &window,
                &self.templates.start,
                self.config.start_similarity,
                anchor.origin(),
            )
            .ok_or(LocateError::StartControlNotFound {
                threshold: self.config.start_similarity,
            })?;
        tracing::info!("Start control found at {:?}", start);

        let play_area = anchor
            .shrink(&self.config.play_area_margins)
            .filter(|area| !area.is_empty())
            .ok_or(LocateError::DegeneratePlayArea)?;
        tracing::info!("Play area: {:?}", play_area);

        self.layout = Some(Layout { anchor, play_area });
        self.dispatcher.click(start.center(), Point::ORIGIN)?;
        self.stats.clicks = self.dispatcher.clicks();

        self.machine.start()?;
        tracing::info!("{}", self.machine.state().description());
        Ok(())
    }

    fn play_cycle(&mut self) -> Result<(), ControllerError> {
        let Some(layout) = self.layout else {
            return Err(TransitionError {
                from: RoundState::Locating,
                to: RoundState::Active,
            }
            .into());
        };
        let cycle = Timer::start();
        let mut timing = CycleTiming::default();

        let timer = Timer::start();
        let window = self.capture.grab(Some(layout.anchor));
        timing.capture_us = timer.elapsed_us();

        match window {
            Some(window) => {
                let timer = Timer::start();
                let round_end = self.matcher.locate(
                    &window,
                    &self.templates.round_end,
                    self.config.round_end_similarity,
                    layout.anchor.origin(),
                );
                timing.match_us = timer.elapsed_us();

                if let Some(round_end) = round_end {
                    return self.finish_round(round_end);
                }
            }
            None => {
                self.stats.capture_misses += 1;
                tracing::debug!("No game window frame, round-end check skipped");
            }
        }

        let timer = Timer::start();
        let Some(frame) = self.capture.grab(Some(layout.play_area)) else {
            self.stats.capture_misses += 1;
            tracing::debug!("No play-area frame, skipping cycle");
            return Ok(());
        };
        timing.capture_us += timer.elapsed_us();

        let timer = Timer::start();
        let points = detect(&frame, &self.categories, self.config.segmentation_mode);
        timing.segment_us = timer.elapsed_us();

        let timer = Timer::start();
        let origin = layout.play_area.origin();
        for point in &points {
            self.dispatcher.click(*point, origin)?;
        }
        timing.click_us = timer.elapsed_us();

        self.stats.clicks = self.dispatcher.clicks();
        self.round_clicks += points.len() as u64;
        self.round_cycles += 1;
        timing.total_us = cycle.elapsed_us();
        self.stats.add_cycle(timing);
        Ok(())
    }

    fn finish_round(&mut self, round_end: BBox) -> Result<(), ControllerError> {
        self.stats.rounds += 1;
        tracing::info!(
            "Round {} finished: {} clicks over {} cycles",
            self.stats.rounds,
            self.round_clicks,
            self.round_cycles
        );
        self.round_clicks = 0;
        self.round_cycles = 0;
        self.resume_target = round_end.center();

        self.machine.round_ended()?;
        tracing::info!("{}", self.machine.state().description());
        Ok(())
    }

    fn await_resume(&mut self) -> Result<(), ControllerError> {
        let timeout = self.config.activity_timeout();
        let activity = self.dispatcher.injector_mut().await_activity(timeout)?;

        if let Some(event) = activity {
            tracing::info!("Operator activity ({:?}), stopping", event);
            self.machine.terminate()?;
            self.stats.report(self.started.elapsed());
            return Ok(());
        }

        self.dispatcher.click(self.resume_target, Point::ORIGIN)?;
        self.stats.clicks = self.dispatcher.clicks();
        thread::sleep(self.config.resume_delay());

        self.machine.resume()?;
        tracing::info!(
            "{} (round {})",
            self.machine.state().description(),
            self.stats.rounds + 1
        );
        Ok(())
    }
}

/// Click points for one play-area frame, category by category in dispatch order.
///
/// Overlapping detections from different categories are all clicked.
fn detect(
    frame: &Frame,
    categories: &[DetectionCategory],
    mode: SegmentationMode,
) -> Vec<Point> {
    let hsv = HsvImage::from_frame(frame);
    categories
        .iter()
        .flat_map(|category| {
            let regions = segment_hsv(&hsv, &category.ranges, mode);
            let points = click_points(&regions, category.min_area);
            tracing::trace!(
                "{}: {} regions, {} clickable",
                category.name,
                regions.len(),
                points.len()
            );
            points
        })
        .collect()
}
