//! Device assembly: simulated bowl by default, GPIO with `--features hardware`.

use feeder_core::{ChannelHandle, FeedEvent, Feeder, MemoryChannel};
use feeder_hardware::SimulatedBowl;
use feeder_traits::{Actuator, WeightSource};

pub type DynScale = Box<dyn WeightSource + Send>;
pub type DynActuator = Box<dyn Actuator + Send>;
pub type CliFeeder = Feeder<DynScale, DynActuator, MemoryChannel>;

/// A built loop plus the handle that talks to its bus.
pub struct Assembled {
    pub feeder: CliFeeder,
    pub bus: ChannelHandle,
    pub sim: Option<SimHooks>,
}

/// Knobs for the simulated bowl, read from the environment.
///
/// - `FEEDER_SIM_RATE_G`: grams added per scale read at full drive (default 2.0)
/// - `FEEDER_SIM_START_G`: bowl weight after tare (default 0.0)
/// - `FEEDER_SIM_TIMEOUT`: when set, the scale stops answering once a feed starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimKnobs {
    pub rate_g: f32,
    pub start_g: f32,
    pub fail_after_start: bool,
}

impl Default for SimKnobs {
    fn default() -> Self {
        Self {
            rate_g: 2.0,
            start_g: 0.0,
            fail_after_start: false,
        }
    }
}

impl SimKnobs {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let num = |key: &str, default: f32| {
            get(key)
                .and_then(|v| v.trim().parse::<f32>().ok())
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(default)
        };
        Self {
            rate_g: num("FEEDER_SIM_RATE_G", d.rate_g),
            start_g: num("FEEDER_SIM_START_G", d.start_g),
            fail_after_start: get("FEEDER_SIM_TIMEOUT")
                .is_some_and(|v| !matches!(v.trim(), "" | "0" | "false")),
        }
    }
}

/// Handle on the simulated bowl so the CLI can stage the scenario the knobs ask for.
pub struct SimHooks {
    bowl: SimulatedBowl,
    knobs: SimKnobs,
}

impl SimHooks {
    /// Called after `Feeder::start`, so the tare sees an empty bowl.
    pub fn after_start(&self) {
        self.bowl.set_grams(self.knobs.start_g);
    }

    pub fn observe(&self, events: &[FeedEvent]) {
        if self.knobs.fail_after_start
            && events.iter().any(|e| matches!(e, FeedEvent::Started { .. }))
        {
            tracing::warn!("simulated scale going silent");
            self.bowl.set_fail_reads(true);
        }
    }
}

#[cfg(not(feature = "hardware"))]
pub fn assemble(cfg: &feeder_config::Config) -> eyre::Result<Assembled> {
    use feeder_core::memory_channel;
    use feeder_hardware::{SimulatedClimate, SimulatedLid, SimulatedRange};

    let knobs = SimKnobs::from_env();
    let bowl = SimulatedBowl::new(0.0, knobs.rate_g, cfg.load_cell.counts_per_gram);
    let (channel, bus) = memory_channel();
    let scale: DynScale = Box::new(bowl.scale());
    let motor: DynActuator = Box::new(bowl.motor());
    let feeder = Feeder::builder()
        .with_weight_source(scale)
        .with_actuator(motor)
        .with_channel(channel)
        .with_config(cfg)
        .with_climate_sensor(SimulatedClimate::default())
        .with_range_sensor(SimulatedRange {
            distance_mm: Some(80),
        })
        .with_lid_switch(SimulatedLid::default())
        .build()?;
    tracing::info!(rate_g = knobs.rate_g, start_g = knobs.start_g, "simulated backend");
    Ok(Assembled {
        feeder,
        bus,
        sim: Some(SimHooks { bowl, knobs }),
    })
}

#[cfg(feature = "hardware")]
pub fn assemble(cfg: &feeder_config::Config) -> eyre::Result<Assembled> {
    #[cfg(target_os = "linux")]
    {
        use eyre::WrapErr;
        use feeder_core::memory_channel;
        use feeder_hardware::hardware::{GpioLidSwitch, HardwareScale, PwmMotor};

        const PWM_FREQUENCY_HZ: f64 = 1_000.0;

        let pins = &cfg.pins;
        let dt = pins
            .hx711_dt
            .ok_or_else(|| eyre::eyre!("config pin missing: pins.hx711_dt"))?;
        let sck = pins
            .hx711_sck
            .ok_or_else(|| eyre::eyre!("config pin missing: pins.hx711_sck"))?;
        let pwm = pins
            .motor_pwm
            .ok_or_else(|| eyre::eyre!("config pin missing: pins.motor_pwm"))?;

        let scale: DynScale = Box::new(
            HardwareScale::new(dt, sck).wrap_err_with(|| format!("open hx711 (dt={dt}, sck={sck})"))?,
        );
        let motor: DynActuator = Box::new(
            PwmMotor::new(pwm, PWM_FREQUENCY_HZ).wrap_err_with(|| format!("open motor pins (pwm={pwm})"))?,
        );
        let (channel, bus) = memory_channel();
        let mut builder = Feeder::builder()
            .with_weight_source(scale)
            .with_actuator(motor)
            .with_channel(channel)
            .with_config(cfg);
        if let Some(pin) = pins.lid_switch {
            match GpioLidSwitch::new(pin) {
                Ok(lid) => builder = builder.with_lid_switch(lid),
                Err(e) => tracing::warn!(pin, error = %e, "lid switch unavailable; continuing without it"),
            }
        }
        let feeder = builder.build()?;
        tracing::info!(dt, sck, pwm, "gpio backend");
        Ok(Assembled {
            feeder,
            bus,
            sim: None,
        })
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = cfg;
        eyre::bail!("the hardware backend is only available on Linux")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn knobs(pairs: &[(&str, &str)]) -> SimKnobs {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        SimKnobs::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn knobs_default_when_unset() {
        assert_eq!(knobs(&[]), SimKnobs::default());
    }

    #[test]
    fn knobs_parse_and_reject_garbage() {
        let k = knobs(&[
            ("FEEDER_SIM_RATE_G", "0.5"),
            ("FEEDER_SIM_START_G", "-3"),
            ("FEEDER_SIM_TIMEOUT", "1"),
        ]);
        assert_eq!(k.rate_g, 0.5);
        assert_eq!(k.start_g, 0.0);
        assert!(k.fail_after_start);
        assert!(!knobs(&[("FEEDER_SIM_TIMEOUT", "0")]).fail_after_start);
    }
}
