//! Human-readable error descriptions and structured JSON error formatting.

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use feeder_core::error::{BuildError, FeederError};
    use feeder_hardware::error::HwError;

    // Typed matches first
    if let Some(BuildError::InvalidConfig(msg)) = err.downcast_ref::<BuildError>() {
        return format!(
            "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML, or a tick period too long for the watchdog.\nHow to fix: Edit the config file, then rerun. See etc/feeder_config.toml for a sample."
        );
    }

    if let Some(fe) = err.downcast_ref::<FeederError>() {
        return match fe {
            FeederError::Timeout => "What happened: Scale read timed out.\nLikely causes: HX711 not wired correctly, no power/ground, or timeout too low.\nHow to fix: Verify DT/SCK pins and power, and consider increasing timeouts.sensor_ms in the config.".to_string(),
            FeederError::HardwareFault(msg) | FeederError::Hardware(msg) => format!(
                "What happened: Hardware fault ({msg}).\nLikely causes: Loose wiring, missing GPIO permissions, or a failed sensor.\nHow to fix: Check the [pins] section and the wiring, then run `feeder self-check`."
            ),
            FeederError::Bus(msg) => format!(
                "What happened: Message bus failure ({msg}).\nLikely causes: The command reader or the output stream closed early.\nHow to fix: Keep stdin/stdout open for the lifetime of `feeder run`."
            ),
            // Fallback to generic for other domain errors
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(hw @ HwError::Gpio(_)) = err.downcast_ref::<HwError>() {
        return format!(
            "What happened: Failed to initialize hardware pins ({hw}).\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO."
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if (lower.contains("hx711") && lower.contains("timeout")) || lower.contains("datareadytimeout")
    {
        return "What happened: HX711 did not produce data within the configured timeout.\nLikely causes: Wrong DT/SCK pins, wiring/power issues, or timeout configured too low.\nHow to fix: Check [pins] in the config, verify 5V/GND, and raise timeouts.sensor_ms.".to_string();
    }

    if lower.contains("open hx711") || lower.contains("open motor pins") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.contains("pin missing") {
        return format!(
            "What happened: Configuration is incomplete ({msg}).\nLikely causes: The hardware backend needs [pins] hx711_dt, hx711_sck and motor_pwm.\nHow to fix: Add the missing pins to the TOML config and try again."
        );
    }

    if lower.starts_with("read config") {
        return format!(
            "What happened: Could not read the config file ({msg}).\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass --config <FILE> pointing at a readable TOML file."
        );
    }

    if lower.starts_with("parse config") {
        return format!(
            "What happened: The config file is not valid TOML for this program ({msg}).\nLikely causes: A typo, a value of the wrong type, or a misplaced section header.\nHow to fix: Compare against etc/feeder_config.toml and fix the reported line."
        );
    }

    if lower.contains("must be") || lower.contains("must not") || lower.contains("unreasonably") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: sensor timeouts are 4, everything else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use feeder_core::error::FeederError;
    match err.downcast_ref::<FeederError>() {
        Some(FeederError::Timeout) => 4,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    use feeder_core::error::{BuildError, FeederError};

    if err.downcast_ref::<BuildError>().is_some() {
        return "InvalidConfig";
    }
    match err.downcast_ref::<FeederError>() {
        Some(FeederError::Timeout) => "Timeout",
        Some(FeederError::Hardware(_) | FeederError::HardwareFault(_)) => "Hardware",
        Some(FeederError::Config(_)) => "InvalidConfig",
        Some(FeederError::State(_)) => "State",
        Some(FeederError::Bus(_)) => "Bus",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;
    json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}
