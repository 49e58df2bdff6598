//! 알림 엔진과 구성 요소
//!
//! - [`engine`]: 주기 폴링, 조용한 시간 보류, 최대 한 번 전송
//! - [`dispatch`]: 전송 추상화와 Telegram/로그 구현
//! - [`message`]: 메시지 구성과 HTML 렌더링
//! - [`quiet_hours`]: 자정을 넘는 분 단위 구간
//! - [`clock`]: 주입 가능한 시계

pub mod clock;
pub mod dispatch;
pub mod engine;
pub mod message;
pub mod quiet_hours;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatch::{Dispatcher, LogDispatcher, TelegramDispatcher, dispatcher_from_config};
pub use engine::{AlertEngine, AlertEngineBuilder, CycleOutcome};
pub use message::AlertMessage;
pub use quiet_hours::QuietHours;
