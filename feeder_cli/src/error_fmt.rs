//! Human-readable error descriptions and structured JSON error formatting.

use feeder_core::error::{BuildError, FeederError, RejectReason};

/// Stable name used in JSON output.
pub fn reason_name(e: &FeederError) -> &'static str {
    match e {
        FeederError::Rejected(RejectReason::Stale { .. }) => "Stale",
        FeederError::Rejected(RejectReason::FeedInProgress) => "FeedInProgress",
        FeederError::Rejected(RejectReason::InvalidRotationCount(_)) => "InvalidRotationCount",
        FeederError::Hardware(_) | FeederError::HardwareFault(_) => "Hardware",
        FeederError::Persistence(_) => "Persistence",
        FeederError::Io(_) => "Io",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSensor => {
                "What happened: No rotation sensor was provided to the feed controller.\nLikely causes: The sensor failed to initialize or was not wired into the builder.\nHow to fix: Ensure the sensor is created successfully and passed via with_sensor(...).".to_string()
            }
            BuildError::MissingMotor => {
                "What happened: No motor was provided to the feed controller.\nLikely causes: The motor relay failed to initialize or was not wired into the builder.\nHow to fix: Ensure the motor is created successfully and passed via with_motor(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(fe) = err.downcast_ref::<FeederError>() {
        return match fe {
            FeederError::Rejected(RejectReason::Stale { as_of, last_admitted }) => format!(
                "What happened: Trigger ignored as stale (asOf {as_of} is not newer than {last_admitted}).\nLikely causes: A retried or out-of-order trigger.\nHow to fix: Send a newer asOf, or omit it to use the current time."
            ),
            FeederError::Rejected(RejectReason::FeedInProgress) => {
                "What happened: A feed is already in progress.\nLikely causes: A second trigger arrived before the first feed finished.\nHow to fix: Wait for the current feed to complete, then trigger again.".to_string()
            }
            FeederError::Rejected(RejectReason::InvalidRotationCount(n)) => format!(
                "What happened: Invalid rotation count ({n}).\nLikely causes: Zero rotations, or more than rotation.max_rotations_per_feed.\nHow to fix: Request between 1 and the configured maximum."
            ),
            FeederError::Hardware(_) | FeederError::HardwareFault(_) => format!(
                "What happened: {fe}.\nLikely causes: Motor relay or sensor wiring, or GPIO permissions.\nHow to fix: Check [pins] in the config and the wiring, then rerun self-check."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = format!("{err:#}").to_ascii_lowercase();

    if lower.contains("open rotation sensor pin") || lower.contains("open motor pin") {
        return "What happened: Failed to initialize GPIO pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.contains("invalid configuration") || lower.contains("parse config") {
        return format!(
            "What happened: Configuration is invalid or incomplete ({err:#}).\nLikely causes: Missing [pins] (rotation_sensor, motor_power) or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("calibration csv must have header") {
        return "Invalid headers in calibration CSV. Expected 'duration_ms'.".to_string();
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

/// Stable exit codes for rejected triggers; everything else is 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<FeederError>() {
        Some(FeederError::Rejected(RejectReason::Stale { .. })) => 3,
        Some(FeederError::Rejected(RejectReason::FeedInProgress)) => 4,
        Some(FeederError::Rejected(RejectReason::InvalidRotationCount(_))) => 5,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = err
        .downcast_ref::<FeederError>()
        .map_or("Error", reason_name);
    json!({ "reason": reason, "message": humanize(err) }).to_string()
}
