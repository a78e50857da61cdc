//! The two-thread handoff between the driver context and the RTL-simulator
//! context.
//!
//! A metasimulated target has no FPGA clock of its own: every target cycle
//! it advances is driven explicitly by a rendezvous between whichever
//! thread runs the driver's [`crate::sim::Simulation::run`] loop and
//! whichever thread runs the RTL simulator's own eval loop. Exactly one of
//! the two is ever running target-visible work at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

/// A single-slot rendezvous between the driver thread and the RTL-simulator
/// thread.
///
/// `driver_flag` is true exactly when the driver side holds the token;
/// `rtlsim_flag` is true exactly when the RTL-simulator side holds it.
/// Exactly one is ever set (outside the brief transition inside
/// [`Rendezvous::do_tick`] / [`Rendezvous::to_sim`]).
#[derive(Debug)]
pub struct Rendezvous {
    driver_flag: Mutex<bool>,
    driver_cond: Condvar,
    rtlsim_flag: Mutex<bool>,
    rtlsim_cond: Condvar,
    finished: AtomicBool,
}

impl Rendezvous {
    /// Creates a rendezvous with the RTL-simulator side holding the token,
    /// matching a target that has not yet evaluated its first cycle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            driver_flag: Mutex::new(false),
            driver_cond: Condvar::new(),
            rtlsim_flag: Mutex::new(true),
            rtlsim_cond: Condvar::new(),
            finished: AtomicBool::new(false),
        }
    }

    /// Called from the driver thread: hands the token to the RTL-simulator
    /// side and blocks until it hands the token back.
    pub fn do_tick(&self) {
        *self.driver_flag.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = false;
        *self.rtlsim_flag.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = true;
        self.rtlsim_cond.notify_one();

        let mut guard = self.driver_flag.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        while !*guard {
            guard = self.driver_cond.wait(guard).unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Called from the RTL-simulator thread after it finishes evaluating
    /// one cycle: hands the token back to the driver side and blocks until
    /// the driver hands it back (or the run ends).
    pub fn to_sim(&self) {
        *self.rtlsim_flag.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = false;
        *self.driver_flag.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = true;
        self.driver_cond.notify_one();

        let mut guard = self.rtlsim_flag.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        while !*guard && !self.finished.load(Ordering::Acquire) {
            guard = self.rtlsim_cond.wait(guard).unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Ends the rendezvous: wakes a thread blocked in [`Rendezvous::to_sim`]
    /// even though the token was never handed back, so it can exit.
    pub fn end(&self) {
        self.finished.store(true, Ordering::Release);
        self.rtlsim_cond.notify_one();
    }
}

impl Default for Rendezvous {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn driver_and_rtlsim_threads_alternate_without_deadlock() {
        let rendezvous = Arc::new(Rendezvous::new());
        let counter = Arc::new(std::sync::atomic::AtomicU32::new(0));

        let rtl_rendezvous = rendezvous.clone();
        let rtl_counter = counter.clone();
        let rtl_thread = thread::spawn(move || {
            for _ in 0..50 {
                rtl_counter.fetch_add(1, Ordering::SeqCst);
                rtl_rendezvous.to_sim();
            }
        });

        for _ in 0..50 {
            rendezvous.do_tick();
        }
        rtl_thread.join().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn end_wakes_a_blocked_rtlsim_thread() {
        let rendezvous = Arc::new(Rendezvous::new());
        let waiter = rendezvous.clone();
        let handle = thread::spawn(move || {
            waiter.to_sim();
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        rendezvous.end();
        handle.join().unwrap();
    }
}
