//! Subcommand bodies: `run`, `feed`, `self-check` and `health`.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use feeder_core::error::FeederError;
use feeder_core::{EventPayload, FeedEvent, FeedOutcome};
use serde_json::json;

use crate::backend::{self, Assembled};
use crate::bus;

/// Result of a `feed` invocation, carried back to `main` for printing and exit code.
#[derive(Debug, Clone)]
pub struct FeedReport {
    pub event: FeedEvent,
}

impl FeedReport {
    pub fn outcome(&self) -> Option<FeedOutcome> {
        match &self.event {
            FeedEvent::Finished { outcome, .. } => Some(*outcome),
            FeedEvent::Skipped { .. } => Some(FeedOutcome::Skipped),
            _ => None,
        }
    }

    /// 0 when the bowl reached its target, 4 on a watchdog stop, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self.outcome() {
            Some(FeedOutcome::Completed) => 0,
            Some(FeedOutcome::Timeout) => 4,
            _ => 1,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&EventPayload::from(&self.event))
            .unwrap_or_else(|_| json!({ "event": self.event.name() }).to_string())
    }

    pub fn to_text(&self) -> String {
        match &self.event {
            FeedEvent::Finished {
                outcome,
                target_g,
                weight_g,
                elapsed,
                ..
            } => {
                let w = weight_g.map_or_else(|| "unknown".to_string(), |w| format!("{w:.1} g"));
                format!(
                    "feed {}: bowl {w}, target {target_g:.1} g, {} ms",
                    outcome.as_str(),
                    elapsed.as_millis()
                )
            }
            FeedEvent::Skipped { weight_g, .. } => {
                format!("feed skipped: bowl already at {weight_g:.1} g")
            }
            other => format!("feed {}", other.name()),
        }
    }
}

fn is_terminal(ev: &FeedEvent) -> bool {
    matches!(
        ev,
        FeedEvent::Finished { .. } | FeedEvent::Skipped { .. } | FeedEvent::Rejected { .. }
    )
}

/// Run the loop with stdin/stdout standing in for the broker.
pub fn run(
    cfg: &feeder_config::Config,
    max_ticks: Option<u64>,
    shutdown: &Arc<AtomicBool>,
) -> eyre::Result<u64> {
    let Assembled {
        mut feeder,
        bus: handle,
        sim,
    } = backend::assemble(cfg)?;
    bus::spawn_stdin_reader(handle.clone())
        .map_err(|e| FeederError::Bus(format!("spawn stdin reader: {e}")))?;

    feeder.start();
    if let Some(sim) = &sim {
        sim.after_start();
    }
    bus::flush_to_stdout(&handle);
    tracing::info!(prefix = %cfg.topic_prefix(), "listening on stdin");

    let ticks = feeder.run_until(shutdown, max_ticks, |events| {
        if let Some(sim) = &sim {
            sim.observe(events);
        }
        bus::flush_to_stdout(&handle);
        false
    });

    feeder.shutdown();
    bus::flush_to_stdout(&handle);
    tracing::info!(ticks, "run finished");
    Ok(ticks)
}

/// Queue one manual feed and run until its session ends.
pub fn feed(
    cfg: &feeder_config::Config,
    grams: f32,
    max_ticks: Option<u64>,
    shutdown: &Arc<AtomicBool>,
) -> eyre::Result<FeedReport> {
    let Assembled {
        mut feeder,
        bus: handle,
        sim,
    } = backend::assemble(cfg)?;

    feeder.start();
    if let Some(sim) = &sim {
        sim.after_start();
    }
    let topic = feeder.topics().manual_feed.clone();
    handle.send(topic, json!({ "action": "feed", "grams": grams }).to_string());

    // Enough ticks for the watchdog to fire twice over, so a running session always ends.
    let limit = max_ticks.unwrap_or_else(|| {
        let per_watchdog = cfg.watchdog.timeout_ms / cfg.loop_cfg.tick_ms.max(1);
        per_watchdog.saturating_mul(2).saturating_add(10)
    });
    tracing::info!(grams, limit, "feed requested");

    let mut last = None;
    let ticks = feeder.run_until(shutdown, Some(limit), |events| {
        if let Some(sim) = &sim {
            sim.observe(events);
        }
        handle.drain();
        match events.iter().find(|e| is_terminal(e)) {
            Some(ev) => {
                last = Some(ev.clone());
                true
            }
            None => false,
        }
    });

    let cancelled = feeder.shutdown();
    handle.drain();
    match last.or(cancelled) {
        Some(event) => Ok(FeedReport { event }),
        None => Err(FeederError::State(format!("feed did not finish within {ticks} ticks")).into()),
    }
}

/// Boot the loop, take one tick and report what every sensor said.
pub fn self_check(cfg: &feeder_config::Config, json_mode: bool) -> eyre::Result<()> {
    let Assembled {
        mut feeder,
        bus: handle,
        sim,
    } = backend::assemble(cfg)?;
    feeder.start();
    if let Some(sim) = &sim {
        sim.after_start();
    }
    feeder.tick();
    let reading = feeder.last_reading();
    let published = handle.drain();
    feeder.shutdown();

    let topics = feeder.topics();
    let seen = |topic: &str| published.iter().any(|p| p.topic == topic);
    let climate = seen(&topics.climate);
    let level = seen(&topics.range);

    if !reading.valid {
        return Err(FeederError::Timeout.into());
    }
    if json_mode {
        println!(
            "{}",
            json!({
                "status": "ok",
                "weight_g": reading.grams,
                "raw": reading.raw,
                "zero_counts": feeder.load_cell().zero_counts(),
                "climate": climate,
                "storage_empty": level,
            })
        );
    } else {
        println!(
            "self-check ok: bowl {:.1} g (raw {}), climate {}, storage {}",
            reading.grams,
            reading.raw,
            if climate { "reporting" } else { "silent" },
            if level { "empty" } else { "ok" }
        );
    }
    Ok(())
}

/// Config loads and validates, and the loop assembles.
pub fn health(cfg: &feeder_config::Config, json_mode: bool) -> eyre::Result<()> {
    let Assembled { feeder, .. } = backend::assemble(cfg)?;
    tracing::debug!(prefix = %feeder.topics().heartbeat, "health check assembled loop");
    if json_mode {
        println!("{}", json!({ "status": "ok" }));
    } else {
        println!("ok");
    }
    Ok(())
}
