//! The systematic scheduler: decides how many target cycles can be stepped
//! in one go without overrunning a periodic task or the `+max-cycles=`
//! bound, and runs whichever periodic tasks came due.

/// The largest step size the master bridge's step register can hold in one
/// write (`2^32 - 1`).
pub const MAX_MIDAS_STEP: u64 = (1u64 << 32) - 1;

/// A periodic piece of host-side work, e.g. "poll the UART bridge every
/// 10,000 target cycles."
#[derive(Debug, Clone)]
struct ScheduledTask {
    name: String,
    period: u64,
    next_due: u64,
}

/// Tracks target-cycle progress and the periodic tasks riding on it.
#[derive(Debug)]
pub struct Scheduler {
    default_step: u64,
    max_cycles: Option<u64>,
    tasks: Vec<ScheduledTask>,
    current_tcycle: u64,
}

impl Scheduler {
    /// Creates a scheduler that steps `default_step` cycles at a time
    /// unless a task or `max_cycles` forces a smaller step.
    #[must_use]
    pub const fn new(default_step: u64, max_cycles: Option<u64>) -> Self {
        Self {
            default_step,
            max_cycles,
            tasks: Vec::new(),
            current_tcycle: 0,
        }
    }

    /// Registers a task that comes due every `period` target cycles,
    /// starting at cycle `period`.
    pub fn add_task(&mut self, name: impl Into<String>, period: u64) {
        self.tasks.push(ScheduledTask {
            name: name.into(),
            period,
            next_due: period,
        });
    }

    /// Cycles elapsed so far.
    #[must_use]
    pub const fn current_tcycle(&self) -> u64 {
        self.current_tcycle
    }

    /// Computes the largest number of cycles that can be stepped before any
    /// task or the `max_cycles` bound comes due.
    ///
    /// # Panics
    /// Panics if the computed step size is zero or exceeds
    /// [`MAX_MIDAS_STEP`] — both indicate a task was scheduled with a
    /// non-positive period, or the simulation has already run past its
    /// `max_cycles` bound without stopping.
    #[must_use]
    pub fn get_largest_stepsize(&self) -> u64 {
        let mut step = self.default_step.min(MAX_MIDAS_STEP);
        if let Some(max) = self.max_cycles {
            step = step.min(max.saturating_sub(self.current_tcycle));
        }
        for task in &self.tasks {
            step = step.min(task.next_due.saturating_sub(self.current_tcycle));
        }
        assert!(step > 0, "scheduler computed a zero-cycle step");
        assert!(
            step <= MAX_MIDAS_STEP,
            "scheduler step {step} exceeds the master's step register width"
        );
        step
    }

    /// Advances the cycle counter by `cycles`, as if the master had just
    /// completed a step of that size.
    pub fn advance(&mut self, cycles: u64) {
        self.current_tcycle += cycles;
    }

    /// Returns the names of every task now due, and reschedules each for
    /// its next period.
    pub fn run_scheduled_tasks(&mut self) -> Vec<String> {
        let mut due = Vec::new();
        for task in &mut self.tasks {
            if task.next_due <= self.current_tcycle {
                due.push(task.name.clone());
                task.next_due += task.period;
            }
        }
        due
    }

    /// Whether the `max_cycles` bound (if any) has been reached.
    #[must_use]
    pub fn reached_max_cycles(&self) -> bool {
        self.max_cycles.is_some_and(|max| self.current_tcycle >= max)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn step_size_is_capped_by_next_due_task() {
        let mut sched = Scheduler::new(1_000_000, None);
        sched.add_task("uart-poll", 100);
        assert_eq!(sched.get_largest_stepsize(), 100);
    }

    #[test]
    fn step_size_is_capped_by_max_cycles() {
        let sched = Scheduler::new(1_000_000, Some(50));
        assert_eq!(sched.get_largest_stepsize(), 50);
    }

    #[test]
    fn due_tasks_reschedule_for_their_next_period() {
        let mut sched = Scheduler::new(1000, None);
        sched.add_task("poll", 100);
        sched.advance(100);
        let due = sched.run_scheduled_tasks();
        assert_eq!(due, vec!["poll".to_string()]);
        assert_eq!(sched.get_largest_stepsize(), 100);
    }

    #[test]
    #[should_panic(expected = "zero-cycle step")]
    fn zero_period_task_panics() {
        let mut sched = Scheduler::new(1000, None);
        sched.add_task("broken", 0);
        sched.get_largest_stepsize();
    }
}
