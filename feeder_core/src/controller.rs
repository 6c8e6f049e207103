//! The feeding state machine (`FeedController`).
//!
//! Owns the only cross-tick state in the feeder: the active session, the
//! pending manual request, the auto-feed schedule and the last known weight.
//! Everything is advanced from `tick`, once per loop iteration; nothing here
//! blocks or reads the clock itself.
//!
//! Stop conditions are checked in a fixed order while feeding: cancel, then
//! the watchdog, then target reached. The watchdog does not depend on the
//! weight sensor, so a session is force-closed even while readings fail.
use std::time::Instant;

use feeder_traits::Actuator;

use crate::command::{AutoFeedUpdate, ManualFeedRequest};
use crate::config::{FeedCfg, WatchdogCfg};
use crate::hw_error::map_boxed;
use crate::load_cell::WeightReading;
use crate::scheduler::{AutoFeedConfig, AutoFeedScheduler, ScheduleDecision};
use crate::session::{FeedOrigin, FeedingSession};
use crate::status::{FeedEvent, FeedOutcome, FeedState, StopReason};
use crate::util::duration_ms;

pub struct FeedController<A> {
    actuator: A,
    cfg: FeedCfg,
    watchdog: WatchdogCfg,
    scheduler: AutoFeedScheduler,
    session: Option<FeedingSession>,
    pending_manual: Option<ManualFeedRequest>,
    cancel_requested: bool,
    last_weight: Option<f32>,
    last_outcome: Option<FeedOutcome>,
    /// Drive has been commanded and not yet stopped.
    driving: bool,
    /// Last drive command failed; retried every tick while feeding.
    drive_fault: bool,
    manual_deferral_noted: bool,
    schedule_deferral_noted: bool,
}

impl<A: Actuator> core::fmt::Debug for FeedController<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FeedController")
            .field("state", &self.state())
            .field("session", &self.session)
            .field("last_weight_g", &self.last_weight)
            .field("driving", &self.driving)
            .finish_non_exhaustive()
    }
}

impl<A: Actuator> FeedController<A> {
    pub fn new(actuator: A, cfg: FeedCfg, watchdog: WatchdogCfg, now: Instant) -> Self {
        Self {
            actuator,
            cfg,
            watchdog,
            scheduler: AutoFeedScheduler::new(now),
            session: None,
            pending_manual: None,
            cancel_requested: false,
            last_weight: None,
            last_outcome: None,
            driving: false,
            drive_fault: false,
            manual_deferral_noted: false,
            schedule_deferral_noted: false,
        }
    }

    pub fn state(&self) -> FeedState {
        if self.session.is_some() {
            FeedState::Feeding
        } else {
            FeedState::Idle
        }
    }

    pub fn session(&self) -> Option<&FeedingSession> {
        self.session.as_ref()
    }

    pub fn is_driving(&self) -> bool {
        self.driving
    }

    /// Weight from the most recent valid reading of the latest tick.
    pub fn last_weight(&self) -> Option<f32> {
        self.last_weight
    }

    pub fn last_outcome(&self) -> Option<FeedOutcome> {
        self.last_outcome
    }

    pub fn auto_feed(&self) -> &AutoFeedConfig {
        self.scheduler.config()
    }

    pub fn pending_manual(&self) -> Option<ManualFeedRequest> {
        self.pending_manual
    }

    pub fn feed_cfg(&self) -> &FeedCfg {
        &self.cfg
    }

    pub fn watchdog(&self) -> &WatchdogCfg {
        &self.watchdog
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    /// Queue a manual request for the next tick.
    ///
    /// While a session is running the request is discarded and a `Rejected`
    /// event returned; it is never merged into the running target. A newer
    /// request replaces a pending one (reported as `Withdrawn`) and is not
    /// affected by a cancel that arrived before it.
    pub fn request_manual_feed(&mut self, req: ManualFeedRequest) -> Option<FeedEvent> {
        if self.session.is_some() {
            tracing::warn!(requested_g = req.grams, "manual feed rejected: already feeding");
            return Some(FeedEvent::Rejected {
                requested_g: req.grams,
            });
        }
        self.cancel_requested = false;
        self.manual_deferral_noted = false;
        let prev = self.pending_manual.replace(req)?;
        tracing::info!(
            replaced_g = prev.grams,
            requested_g = req.grams,
            "pending manual feed replaced"
        );
        Some(FeedEvent::Withdrawn {
            requested_g: prev.grams,
            superseded_by: Some(req.grams),
        })
    }

    /// Ask for the running session (or a pending manual request) to be
    /// dropped at the next tick. Returns `false` if there is nothing to cancel.
    pub fn request_cancel(&mut self) -> bool {
        if self.session.is_none() && self.pending_manual.is_none() {
            tracing::debug!("cancel requested while idle; nothing to do");
            return false;
        }
        self.cancel_requested = true;
        true
    }

    pub fn configure_auto_feed(&mut self, update: &AutoFeedUpdate, now: Instant) -> FeedEvent {
        self.scheduler.reconfigure(update, now);
        self.schedule_deferral_noted = false;
        let cfg = self.scheduler.config();
        tracing::info!(
            enabled = cfg.enabled,
            interval_minutes = update.interval_minutes,
            target_g = cfg.target_g,
            "auto-feed reconfigured"
        );
        FeedEvent::Reconfigured {
            enabled: cfg.enabled,
            interval_minutes: update.interval_minutes,
            target_g: cfg.target_g,
        }
    }

    /// Advance the state machine with this tick's weight reading.
    pub fn tick(&mut self, now: Instant, reading: &WeightReading) -> Vec<FeedEvent> {
        self.last_weight = reading.known_grams();
        let mut events = Vec::new();

        if let Some(session) = &self.session {
            let reason = if self.cancel_requested {
                Some(StopReason::Cancelled)
            } else if session.elapsed(now) >= self.watchdog.timeout() {
                Some(StopReason::Watchdog)
            } else if self.last_weight.is_some_and(|w| w >= session.target_g()) {
                Some(StopReason::TargetReached)
            } else {
                None
            };
            match reason {
                Some(r) => events.extend(self.stop(now, r)),
                None if self.drive_fault => self.drive(),
                None => {}
            }
            return events;
        }

        if std::mem::take(&mut self.cancel_requested)
            && let Some(req) = self.pending_manual.take()
        {
            tracing::info!(requested_g = req.grams, "pending manual feed cancelled");
            self.manual_deferral_noted = false;
            events.push(FeedEvent::Withdrawn {
                requested_g: req.grams,
                superseded_by: None,
            });
        }

        if let Some(req) = self.pending_manual {
            let Some(w) = self.last_weight else {
                if !std::mem::replace(&mut self.manual_deferral_noted, true) {
                    tracing::warn!(requested_g = req.grams, "manual feed deferred: weight unknown");
                    events.push(FeedEvent::Deferred {
                        origin: FeedOrigin::Manual,
                    });
                }
                return events;
            };
            self.pending_manual = None;
            self.manual_deferral_noted = false;
            if req.grams <= 0.0 {
                tracing::info!(weight_g = w, "manual feed of 0 g skipped");
                self.last_outcome = Some(FeedOutcome::Skipped);
                events.push(FeedEvent::Skipped {
                    origin: FeedOrigin::Manual,
                    weight_g: w,
                    target_g: w,
                });
            } else {
                events.push(self.start(now, w + req.grams, w, FeedOrigin::Manual));
            }
            return events;
        }

        match self.scheduler.evaluate(now, self.last_weight) {
            ScheduleDecision::NotDue => {}
            ScheduleDecision::Feed { weight_g, target_g } => {
                self.schedule_deferral_noted = false;
                events.push(self.start(now, target_g, weight_g, FeedOrigin::Scheduled));
            }
            ScheduleDecision::Skip { weight_g, target_g } => {
                self.schedule_deferral_noted = false;
                tracing::info!(weight_g, target_g, "auto-feed skipped: sufficient stock");
                self.last_outcome = Some(FeedOutcome::Skipped);
                events.push(FeedEvent::Skipped {
                    origin: FeedOrigin::Scheduled,
                    weight_g,
                    target_g,
                });
            }
            ScheduleDecision::Deferred => {
                if !std::mem::replace(&mut self.schedule_deferral_noted, true) {
                    tracing::warn!("auto-feed deferred: weight unknown");
                    events.push(FeedEvent::Deferred {
                        origin: FeedOrigin::Scheduled,
                    });
                }
            }
        }
        events
    }

    /// Close the active session and stop the actuator.
    ///
    /// A no-op returning `None` when idle: no actuator command, no event.
    pub fn stop(&mut self, now: Instant, reason: StopReason) -> Option<FeedEvent> {
        let session = self.session.take()?;
        if let Err(e) = self.actuator.stop() {
            tracing::warn!(error = %map_boxed(&e), "actuator stop failed");
        }
        self.driving = false;
        self.drive_fault = false;
        self.cancel_requested = false;

        let outcome = FeedOutcome::from(reason);
        self.last_outcome = Some(outcome);
        let elapsed = session.elapsed(now);
        let elapsed_ms = duration_ms(elapsed);
        if outcome == FeedOutcome::Timeout {
            tracing::warn!(
                target_g = session.target_g(),
                weight_g = self.last_weight,
                elapsed_ms,
                "feed stopped by watchdog"
            );
        } else {
            tracing::info!(
                outcome = outcome.as_str(),
                target_g = session.target_g(),
                weight_g = self.last_weight,
                elapsed_ms,
                "feed end"
            );
        }
        Some(FeedEvent::Finished {
            outcome,
            origin: session.origin(),
            target_g: session.target_g(),
            weight_g: self.last_weight,
            elapsed,
        })
    }

    fn start(&mut self, now: Instant, target_g: f32, weight_g: f32, origin: FeedOrigin) -> FeedEvent {
        let session = FeedingSession::new(target_g, now, origin);
        let target_g = session.target_g();
        tracing::info!(target_g, weight_g, origin = origin.as_str(), "feed start");
        self.session = Some(session);
        self.cancel_requested = false;
        self.drive();
        FeedEvent::Started {
            origin,
            target_g,
            weight_g,
        }
    }

    fn drive(&mut self) {
        match self.actuator.set_drive(self.cfg.drive_level) {
            Ok(()) => self.drive_fault = false,
            Err(e) => {
                tracing::warn!(error = %map_boxed(&e), "actuator drive failed; retrying next tick");
                self.drive_fault = true;
            }
        }
        self.driving = true;
    }
}
