//! # 時刻の供給
//!
//! レート制限はウィンドウの開始とリセット時刻をすべてここから得る。
//! 本番は [`SystemClock`]、テストは [`ManualClock`] を注入して
//! ウィンドウ境界をまたぐ動作を実時間を待たずに再現する。

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};

/// 現在時刻を提供するトレイト
pub trait Clock: Send + Sync {
   fn now(&self) -> DateTime<Utc>;
}

/// システム時刻
pub struct SystemClock;

impl Clock for SystemClock {
   fn now(&self) -> DateTime<Utc> {
      Utc::now()
   }
}

/// 明示的に進めたときだけ時刻が動く時計
///
/// `advance` を呼ばない限り同じ時刻を返し続けるので、固定時刻としても使える。
#[derive(Debug)]
pub struct ManualClock {
   now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
   pub fn new(start: DateTime<Utc>) -> Self {
      Self {
         now: Mutex::new(start),
      }
   }

   /// 時刻を `by` だけ進める
   pub fn advance(&self, by: Duration) {
      *self.now.lock().unwrap_or_else(PoisonError::into_inner) += by;
   }
}

impl Clock for ManualClock {
   fn now(&self) -> DateTime<Utc> {
      *self.now.lock().unwrap_or_else(PoisonError::into_inner)
   }
}

#[cfg(test)]
mod tests {
   use chrono::TimeZone;
   use pretty_assertions::assert_eq;

   use super::*;

   fn start() -> DateTime<Utc> {
      Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
   }

   #[test]
   fn test_system_clockは呼び出し時点の時刻を返す() {
      let before = Utc::now();
      let result = SystemClock.now();

      assert!(before <= result && result <= Utc::now());
   }

   #[test]
   fn test_manual_clockは進めない限り同じ時刻を返す() {
      let clock = ManualClock::new(start());

      assert_eq!(clock.now(), start());
      assert_eq!(clock.now(), start());
   }

   #[test]
   fn test_manual_clockはadvanceした分だけ進む() {
      let clock = ManualClock::new(start());

      clock.advance(Duration::minutes(15));
      clock.advance(Duration::seconds(1));

      assert_eq!(clock.now(), start() + Duration::seconds(15 * 60 + 1));
   }
}
