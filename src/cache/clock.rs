use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Source of "now" for freshness checks.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

pub fn system_clock() -> Arc<dyn Clock> {
  Arc::new(SystemClock)
}

#[cfg(test)]
pub mod testing {
  use super::*;
  use std::sync::Mutex;

  /// Clock that only moves when told to.
  pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
  }

  impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Arc<Self> {
      Arc::new(Self {
        now: Mutex::new(now),
      })
    }

    pub fn advance(&self, by: chrono::Duration) {
      let mut now = self.now.lock().unwrap();
      *now += by;
    }
  }

  impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
      *self.now.lock().unwrap()
    }
  }
}
