use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

/// Trailing-edge debounce: each `call` restarts the quiet period and
/// cancels the work scheduled by the previous call. Only the last call of a
/// burst runs, `delay` after it was made.
#[derive(Debug)]
pub struct Debouncer {
  delay: Duration,
  pending: Option<JoinHandle<()>>,
}

impl Debouncer {
  pub fn new(delay: Duration) -> Self {
    Self {
      delay,
      pending: None,
    }
  }

  pub fn delay(&self) -> Duration {
    self.delay
  }

  /// Schedule `work`, superseding anything not yet finished.
  pub fn call<F>(&mut self, work: F)
  where
    F: Future<Output = ()> + Send + 'static,
  {
    if self.cancel() {
      trace!("debounced call superseded");
    }
    let delay = self.delay;
    self.pending = Some(tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      work.await;
    }));
  }

  /// Drop scheduled work. Returns whether anything was still pending.
  pub fn cancel(&mut self) -> bool {
    match self.pending.take() {
      Some(handle) if !handle.is_finished() => {
        handle.abort();
        true
      }
      _ => false,
    }
  }

  pub fn is_pending(&self) -> bool {
    self.pending.as_ref().is_some_and(|h| !h.is_finished())
  }
}

impl Drop for Debouncer {
  fn drop(&mut self) {
    self.cancel();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  fn counting(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
    let counter = Arc::clone(counter);
    async move {
      counter.fetch_add(1, Ordering::SeqCst);
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_burst_runs_once_after_quiet_period() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut debouncer = Debouncer::new(Duration::from_millis(500));

    for _ in 0..5 {
      debouncer.call(counting(&counter));
      tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    // 100ms already elapsed since the last call
    tokio::time::sleep(Duration::from_millis(399)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(!debouncer.is_pending());
  }

  #[tokio::test(start_paused = true)]
  async fn test_separate_bursts_each_run() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut debouncer = Debouncer::new(Duration::from_millis(500));

    debouncer.call(counting(&counter));
    tokio::time::sleep(Duration::from_millis(600)).await;
    debouncer.call(counting(&counter));
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(counter.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_cancel_and_drop_stop_pending_work() {
    let counter = Arc::new(AtomicUsize::new(0));

    let mut debouncer = Debouncer::new(Duration::from_millis(500));
    debouncer.call(counting(&counter));
    assert!(debouncer.cancel());
    assert!(!debouncer.cancel());

    {
      let mut dropped = Debouncer::new(Duration::from_millis(500));
      dropped.call(counting(&counter));
    }

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 0);
  }
}
