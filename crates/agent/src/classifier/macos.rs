//! macOS 탐지기 -- system.log / secure.log / unified log 렌더링 라인

use logwarden_core::event::{EventType, Severity, UNKNOWN_IP};

use super::linux::{GENERIC_FAILURE_PATTERN, SUDO_COMMAND_PATTERN, sudo_command};
use super::{Detector, Extracted, capture};

/// macOS 탐지기 목록
pub fn detectors() -> Result<Vec<Detector>, regex::Error> {
    Ok(vec![
        Detector::new(
            "failed-pwd",
            r"Failed password for (?:invalid user )?(?P<user>\S+) from (?P<ip>\S+)",
            EventType::LoginFail,
            Severity::MEDIUM,
            |caps, _| {
                Some(Extracted::new(
                    capture(caps, "user")?,
                    capture(caps, "ip").unwrap_or(UNKNOWN_IP),
                ))
            },
        )?,
        Detector::new(
            "invalid-user",
            r"Invalid user (?P<user>\S+) from (?P<ip>\S+)",
            EventType::LoginFail,
            Severity::MEDIUM,
            |caps, _| Some(Extracted::new(capture(caps, "user")?, capture(caps, "ip")?)),
        )?,
        Detector::new(
            "sudo-fail",
            r"(?P<user>\S+) : (authentication failure|sorry, you must have a tty to run sudo)",
            EventType::LoginFail,
            Severity::MEDIUM,
            |caps, _| Some(Extracted::user_only(capture(caps, "user")?)),
        )?
        .with_guard(|l| l.contains("sudo")),
        Detector::new(
            "sudo",
            SUDO_COMMAND_PATTERN,
            EventType::SudoEscalation,
            Severity::LOW,
            sudo_command,
        )?
        .with_guard(|l| l.contains("sudo")),
        Detector::new(
            "group-add",
            r"(?P<user>\w+) added to group",
            EventType::GroupAdd,
            Severity::MEDIUM,
            |caps, _| Some(Extracted::user_only(capture(caps, "user")?)),
        )?,
        Detector::new(
            "audit",
            r"kernel\[.*\]: \*\*\* AUDIT",
            EventType::CriticalError,
            Severity::HIGH,
            |_, _| Some(Extracted::user_only("system")),
        )?,
        Detector::new(
            "generic-err",
            GENERIC_FAILURE_PATTERN,
            EventType::SystemAlert,
            Severity::LOW,
            |_, _| Some(Extracted::user_only("system")),
        )?,
    ])
}
