//! Human-readable error descriptions and structured JSON error formatting.

use torque_core::SessionError;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(se) = err.downcast_ref::<SessionError>() {
        return match se {
            SessionError::InvalidProfile(msg) => format!(
                "What happened: The selected profile cannot be used ({msg}).\nLikely causes: Wrong --profile index, or a profile with no targets/ranges in the config or CSV.\nHow to fix: Run `torque profiles` to list valid indexes and check the profile's targets."
            ),
            SessionError::NoFeed(msg) => format!(
                "What happened: No sensor feed could be opened ({msg}).\nLikely causes: Meter not plugged in, wrong port path, or missing permission on the serial device.\nHow to fix: Check feed.connection (or --input), the cable, and that your user can read the port."
            ),
            SessionError::SessionBusy { command, state } => format!(
                "What happened: Cannot {command} while a session is {state}.\nLikely causes: A previous session is still running.\nHow to fix: Stop the running session first."
            ),
        };
    }

    // String-based heuristics for errors coming from config loading
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("profile csv must have headers") {
        return "Invalid headers in profile CSV. Expected 'max_rating,kind,unit,targets'.".to_string();
    }

    if lower.contains("invalid csv row") {
        return format!(
            "What happened: A profile CSV row could not be read ({msg}).\nLikely causes: Non-numeric rating or target, or an unknown tool kind.\nHow to fix: Fix the reported row; targets are ';'-separated numbers and kind is wrench or torque-multiplier."
        );
    }

    if lower.contains("config") || lower.contains("must be") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Out-of-range values or a typo in the TOML.\nHow to fix: Edit the config file and run `torque self-check`."
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

/// Stable exit codes for typed session errors; everything else is 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<SessionError>() {
        Some(SessionError::InvalidProfile(_)) => 3,
        Some(SessionError::NoFeed(_)) => 4,
        Some(SessionError::SessionBusy { .. }) => 5,
        None => 1,
    }
}

pub fn error_reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<SessionError>() {
        Some(SessionError::InvalidProfile(_)) => "InvalidProfile",
        Some(SessionError::NoFeed(_)) => "NoFeed",
        Some(SessionError::SessionBusy { .. }) => "SessionBusy",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    json!({
        "reason": error_reason_name(err),
        "message": humanize(err),
        "exit_code": exit_code_for_error(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use torque_core::SessionState;

    #[test]
    fn typed_errors_map_to_stable_codes() {
        let invalid = eyre::Report::new(SessionError::InvalidProfile("x".into()));
        let nofeed = eyre::Report::new(SessionError::NoFeed("x".into()));
        let busy = eyre::Report::new(SessionError::SessionBusy {
            command: "start",
            state: SessionState::Running,
        });
        assert_eq!(exit_code_for_error(&invalid), 3);
        assert_eq!(exit_code_for_error(&nofeed), 4);
        assert_eq!(exit_code_for_error(&busy), 5);
        assert_eq!(exit_code_for_error(&eyre::eyre!("other")), 1);
        assert!(humanize(&busy).contains("while a session is running"));
    }

    #[test]
    fn json_carries_reason_and_message() {
        let err = eyre::Report::new(SessionError::NoFeed("/dev/ttyUSB9".into()));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "NoFeed");
        assert_eq!(v["exit_code"], 4);
        assert!(v["message"].as_str().unwrap().contains("/dev/ttyUSB9"));
    }
}
