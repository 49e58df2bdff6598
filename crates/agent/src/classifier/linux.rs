//! Linux 탐지기 -- auth.log / secure / syslog / 웹 서버 / 메일 서버 로그
//!
//! 평가 순서: SSH 실패 → 잘못된 사용자 → sudo 명령 → 웹 403 → 웹 공격 →
//! 메일 인증 실패 → OOM → 커널 경고 → systemd 실패 → docker 실패 → 일반 실패 어휘

use regex::Captures;

use logwarden_core::event::{EventType, Severity, UNKNOWN_IP, UNKNOWN_USER};

use super::{Detector, Extracted, capture};

/// 일반 실패 어휘 (Linux/macOS 공통 마지막 탐지기)
pub(crate) const GENERIC_FAILURE_PATTERN: &str =
    r"\b(error|failed|denied|permission denied|warning|critical|failure|problem|invalid)\b";

/// sudo 명령 라인 패턴 (Linux/macOS 공통)
pub(crate) const SUDO_COMMAND_PATTERN: &str =
    r"(?P<user>\S+) : TTY=\S+ ; PWD=\S+ ; USER=\S+ ; COMMAND=(?P<command>.*)";

const IPV4: &str = r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}";

/// Linux 탐지기 목록
pub fn detectors() -> Result<Vec<Detector>, regex::Error> {
    Ok(vec![
        Detector::new(
            "failed-pwd",
            r"Failed password for (?:invalid user )?(?P<user>\S+) from (?P<ip>\S+) port \d+",
            EventType::LoginFail,
            Severity::MEDIUM,
            user_and_ip,
        )?,
        Detector::new(
            "invalid-user",
            r"Invalid user (?P<user>\S+) from (?P<ip>\S+)",
            EventType::LoginFail,
            Severity::MEDIUM,
            user_and_ip,
        )?,
        Detector::new(
            "sudo",
            SUDO_COMMAND_PATTERN,
            EventType::SudoEscalation,
            Severity::LOW,
            sudo_command,
        )?
        .with_guard(|l| l.contains("sudo")),
        Detector::new(
            "web-403",
            &format!(
                r"(client denied by server configuration|access forbidden|Directory index forbidden|permission denied).*client: (?P<ip>{IPV4})"
            ),
            EventType::ConnectionBlocked,
            Severity::LOW,
            |caps, _| Some(Extracted::new("www-data", capture(caps, "ip")?)),
        )?,
        Detector::new(
            "web-attack",
            &format!(r"(UNION SELECT|SELECT.*FROM|<script>|eval\(|/etc/passwd|\.\./\.\.|%00).*?\b(?P<ip>{IPV4})"),
            EventType::WebAttack,
            Severity::HIGH,
            |caps, _| Some(Extracted::new(UNKNOWN_USER, capture(caps, "ip")?)),
        )?,
        Detector::new(
            "mail-fail",
            &format!(r"warning: .*\[(?P<ip>{IPV4})\]: SASL .* authentication failed"),
            EventType::LoginFail,
            Severity::MEDIUM,
            mail_user,
        )?
        .with_guard(is_mail_line),
        Detector::new(
            "mail-fail",
            &format!(r"auth-worker.*\(?,(?P<ip>{IPV4})\):.*password mismatch"),
            EventType::LoginFail,
            Severity::MEDIUM,
            mail_user,
        )?
        .with_guard(is_mail_line),
        Detector::new(
            "oom",
            r"(Out of memory: Kill(ed)? process|oom-killer)",
            EventType::CriticalError,
            Severity::CRITICAL,
            |_, _| Some(Extracted::user_only("system")),
        )?,
        Detector::new(
            "kernel-warn",
            r"kernel:.*(warn|error|crit|fail|bug|panic|corrupt)",
            EventType::SystemAlert,
            Severity::HIGH,
            |_, _| Some(Extracted::user_only("kernel")),
        )?,
        Detector::new(
            "systemd-fail",
            r"systemd.*(failed to start|error starting|unit.*failed|emergency mode)",
            EventType::SystemAlert,
            Severity::HIGH,
            |_, _| Some(Extracted::user_only("systemd")),
        )?,
        Detector::new(
            "docker-err",
            r"docker.*(error|failed|dead|exit code|panic)",
            EventType::SystemAlert,
            Severity::HIGH,
            |_, _| Some(Extracted::user_only("docker")),
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

fn user_and_ip(caps: &Captures<'_>, _line: &str) -> Option<Extracted> {
    Some(Extracted::new(
        capture(caps, "user")?,
        capture(caps, "ip").unwrap_or(UNKNOWN_IP),
    ))
}

/// 실제 명령 실행만 이벤트로 봅니다 (`COMMAND=` 뒤가 경로이거나 환경 변수 설정으로 시작하지 않음).
pub(crate) fn sudo_command(caps: &Captures<'_>, _line: &str) -> Option<Extracted> {
    let command = capture(caps, "command")?;
    let head: String = command.chars().take(5).collect();
    if command.contains('/') || !head.contains('=') {
        Some(Extracted::user_only(capture(caps, "user")?))
    } else {
        None
    }
}

fn mail_user(caps: &Captures<'_>, _line: &str) -> Option<Extracted> {
    Some(Extracted::new("mail-user", capture(caps, "ip")?))
}

fn is_mail_line(lowercase: &str) -> bool {
    lowercase.contains("postfix") || lowercase.contains("dovecot")
}
