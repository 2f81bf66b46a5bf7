//! Fence based frame pacing.
//!
//! Each frame slot owns a fence and a target value. After the commands for a
//! slot are submitted the queue signals the slot's fence with the next target,
//! and before the slot's command allocator is reset again the CPU waits until
//! the GPU reports that target as completed. Waits are bounded so a lost
//! device surfaces as [`GpuTimeout`] instead of a hang.

use std::fmt;
use std::time::Duration;
use std::time::Instant;

use eyre::bail;
use tracing::debug;
use tracing::trace;

/// Number of swap chain buffers, and so of frames that may be in flight.
pub const FRAME_COUNT: usize = 2;

/// A GPU-to-CPU completion counter.
pub trait FrameFence {
    /// The highest value the GPU has reached.
    fn completed_value(&self) -> u64;

    /// Blocks until the fence signals at or past `value`.
    ///
    /// Returns `Ok(false)` if `timeout` elapsed first. `Ok(true)` only means the
    /// CPU was woken; callers re-check [`FrameFence::completed_value`].
    fn wait_for(&self, value: u64, timeout: Duration) -> eyre::Result<bool>;
}

/// Something that can enqueue a fence signal behind already submitted work.
pub trait FenceSignal<F: FrameFence> {
    fn signal(&self, fence: &F, value: u64) -> eyre::Result<()>;
}

/// What a timed out fence was guarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceUse {
    FrameSlot(usize),
    Uploads,
}

impl fmt::Display for FenceUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FenceUse::FrameSlot(slot) => write!(f, "frame slot {slot}"),
            FenceUse::Uploads => f.write_str("staged uploads"),
        }
    }
}

/// The GPU did not reach a fence value within the allowed time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuTimeout {
    pub fence_use: FenceUse,
    pub expected: u64,
    pub completed: u64,
    pub timeout: Duration,
}

impl fmt::Display for GpuTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GPU did not reach fence value {} for {} within {:?} (completed {})",
            self.expected, self.fence_use, self.timeout, self.completed
        )
    }
}

impl std::error::Error for GpuTimeout {}

/// Blocks until `fence` has completed `value`, or fails with [`GpuTimeout`]
/// once `timeout` has passed.
///
/// A wake is not trusted on its own: the completed value is read again after
/// every wait and the remaining time shrinks towards one deadline.
pub fn wait_for_value<F: FrameFence>(
    fence: &F,
    value: u64,
    timeout: Duration,
    fence_use: FenceUse,
) -> eyre::Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if fence.completed_value() >= value {
            return Ok(());
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() || !fence.wait_for(value, remaining)? {
            // The GPU may have finished between the last wait and the deadline.
            let completed = fence.completed_value();
            if completed >= value {
                return Ok(());
            }
            return Err(GpuTimeout {
                fence_use,
                expected: value,
                completed,
                timeout,
            }
            .into());
        }
        if fence.completed_value() >= value {
            return Ok(());
        }
        trace!(%fence_use, value, "Fence woke before reaching its value");
    }
}

pub struct FramePacer<F, const N: usize> {
    fences: [F; N],
    /// Last value signalled per slot. Only recorded once the signal was enqueued.
    targets: [u64; N],
    timeout: Duration,
}

impl<F: FrameFence, const N: usize> FramePacer<F, N> {
    /// Fences must start at zero, which every target starts at too.
    pub fn new(fences: [F; N], timeout: Duration) -> eyre::Result<Self> {
        if !(2..=3).contains(&N) {
            bail!("frame pacing supports double or triple buffering, not {N} slots");
        }
        Ok(Self {
            fences,
            targets: [0; N],
            timeout,
        })
    }

    pub fn target(&self, slot: usize) -> Option<u64> {
        self.targets.get(slot).copied()
    }

    pub fn fence(&self, slot: usize) -> Option<&F> {
        self.fences.get(slot)
    }

    fn check_slot(&self, slot: usize) -> eyre::Result<()> {
        if slot >= N {
            bail!("frame slot {slot} out of range for {N} slots");
        }
        Ok(())
    }

    /// Whether the GPU has finished everything submitted for `slot`.
    pub fn is_slot_ready(&self, slot: usize) -> eyre::Result<bool> {
        self.check_slot(slot)?;
        Ok(self.fences[slot].completed_value() >= self.targets[slot])
    }

    /// Blocks until `slot` can be reused.
    ///
    /// The command allocator and any per-frame buffers of `slot` must not be
    /// touched before this returns `Ok`.
    pub fn wait_for_slot(&self, slot: usize) -> eyre::Result<()> {
        self.check_slot(slot)?;
        let fence = &self.fences[slot];
        let expected = self.targets[slot];
        if fence.completed_value() >= expected {
            return Ok(());
        }

        debug!(slot, expected, "Waiting for GPU to release frame slot");
        wait_for_value(fence, expected, self.timeout, FenceUse::FrameSlot(slot))
    }

    /// Signals `slot`'s fence behind the work just submitted for it.
    ///
    /// Returns the value the slot must reach before it is reused.
    pub fn signal_slot<Q: FenceSignal<F>>(&mut self, queue: &Q, slot: usize) -> eyre::Result<u64> {
        self.check_slot(slot)?;
        let value = self.targets[slot] + 1;
        queue.signal(&self.fences[slot], value)?;
        self.targets[slot] = value;
        trace!(slot, value, "Signalled frame fence");
        Ok(value)
    }

    /// Waits for every slot, e.g. before releasing resources the GPU may still read.
    pub fn wait_for_idle<Q: FenceSignal<F>>(&mut self, queue: &Q) -> eyre::Result<()> {
        for slot in 0..N {
            self.signal_slot(queue, slot)?;
            self.wait_for_slot(slot)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::cell::RefCell;

    /// A fence whose GPU side either finishes as soon as someone waits, or never does.
    ///
    /// `early_wakes` wakes the waiter that many times before the GPU has done anything,
    /// the way a stale auto-reset event does.
    struct FakeFence {
        completed: Cell<u64>,
        signalled: Cell<u64>,
        waits: Cell<usize>,
        early_wakes: Cell<usize>,
        hung: bool,
    }

    impl FakeFence {
        fn new() -> Self {
            Self {
                completed: Cell::new(0),
                signalled: Cell::new(0),
                waits: Cell::new(0),
                early_wakes: Cell::new(0),
                hung: false,
            }
        }

        fn waking_early(times: usize) -> Self {
            Self {
                early_wakes: Cell::new(times),
                ..Self::new()
            }
        }

        fn hung() -> Self {
            Self {
                hung: true,
                ..Self::new()
            }
        }

        /// The GPU catches up with everything signalled so far.
        fn finish(&self) {
            self.completed.set(self.signalled.get());
        }
    }

    impl FrameFence for FakeFence {
        fn completed_value(&self) -> u64 {
            self.completed.get()
        }

        fn wait_for(&self, value: u64, _timeout: Duration) -> eyre::Result<bool> {
            self.waits.set(self.waits.get() + 1);
            if self.early_wakes.get() > 0 {
                self.early_wakes.set(self.early_wakes.get() - 1);
                return Ok(true);
            }
            if !self.hung {
                self.finish();
            }
            Ok(self.completed.get() >= value)
        }
    }

    #[derive(Default)]
    struct FakeQueue {
        signals: RefCell<Vec<u64>>,
    }

    impl FenceSignal<FakeFence> for FakeQueue {
        fn signal(&self, fence: &FakeFence, value: u64) -> eyre::Result<()> {
            fence.signalled.set(value);
            self.signals.borrow_mut().push(value);
            Ok(())
        }
    }

    struct FailingQueue;

    impl FenceSignal<FakeFence> for FailingQueue {
        fn signal(&self, _fence: &FakeFence, _value: u64) -> eyre::Result<()> {
            bail!("device removed")
        }
    }

    fn pacer<const N: usize>() -> FramePacer<FakeFence, N> {
        FramePacer::new(
            array_init::array_init(|_| FakeFence::new()),
            Duration::from_millis(100),
        )
        .unwrap()
    }

    #[test]
    fn fresh_slots_are_ready_without_waiting() {
        let pacer = pacer::<2>();
        for slot in 0..2 {
            assert!(pacer.is_slot_ready(slot).unwrap());
            pacer.wait_for_slot(slot).unwrap();
            assert_eq!(pacer.fence(slot).unwrap().waits.get(), 0);
        }
    }

    #[test]
    fn only_double_and_triple_buffering_are_accepted() {
        let single = FramePacer::<FakeFence, 1>::new([FakeFence::new()], Duration::from_secs(1));
        assert!(single.is_err());
        let quad = FramePacer::<FakeFence, 4>::new(
            array_init::array_init(|_| FakeFence::new()),
            Duration::from_secs(1),
        );
        assert!(quad.is_err());
    }

    #[test]
    fn signal_values_increase_per_slot_independently() {
        let mut pacer = pacer::<3>();
        let queue = FakeQueue::default();

        assert_eq!(pacer.signal_slot(&queue, 0).unwrap(), 1);
        assert_eq!(pacer.signal_slot(&queue, 0).unwrap(), 2);
        assert_eq!(pacer.signal_slot(&queue, 2).unwrap(), 1);
        assert_eq!(pacer.target(0), Some(2));
        assert_eq!(pacer.target(1), Some(0));
        assert_eq!(pacer.target(2), Some(1));
        assert_eq!(*queue.signals.borrow(), vec![1, 2, 1]);
    }

    #[test]
    fn reusing_a_busy_slot_waits_for_its_fence() {
        let mut pacer = pacer::<2>();
        let queue = FakeQueue::default();

        pacer.signal_slot(&queue, 0).unwrap();
        assert!(!pacer.is_slot_ready(0).unwrap());
        // The other slot is unaffected.
        assert!(pacer.is_slot_ready(1).unwrap());

        pacer.wait_for_slot(0).unwrap();
        assert_eq!(pacer.fence(0).unwrap().waits.get(), 1);
        assert!(pacer.is_slot_ready(0).unwrap());
    }

    #[test]
    fn finished_work_does_not_block() {
        let mut pacer = pacer::<2>();
        let queue = FakeQueue::default();

        pacer.signal_slot(&queue, 1).unwrap();
        pacer.fence(1).unwrap().finish();
        pacer.wait_for_slot(1).unwrap();
        assert_eq!(pacer.fence(1).unwrap().waits.get(), 0);
    }

    #[test]
    fn hung_gpu_surfaces_as_timeout() {
        let mut pacer = FramePacer::new(
            [FakeFence::new(), FakeFence::hung()],
            Duration::from_millis(5),
        )
        .unwrap();
        let queue = FakeQueue::default();

        pacer.signal_slot(&queue, 1).unwrap();
        let error = pacer.wait_for_slot(1).unwrap_err();
        let timeout = error.downcast_ref::<GpuTimeout>().unwrap();
        assert_eq!(
            *timeout,
            GpuTimeout {
                fence_use: FenceUse::FrameSlot(1),
                expected: 1,
                completed: 0,
                timeout: Duration::from_millis(5),
            }
        );
        assert!(error.to_string().contains("frame slot 1"));
    }

    #[test]
    fn early_wakes_do_not_release_the_slot() {
        let mut pacer = FramePacer::new(
            [FakeFence::waking_early(2), FakeFence::new()],
            Duration::from_secs(1),
        )
        .unwrap();
        let queue = FakeQueue::default();

        pacer.signal_slot(&queue, 0).unwrap();
        pacer.wait_for_slot(0).unwrap();

        // Two wakes with nothing completed, then the real one.
        assert_eq!(pacer.fence(0).unwrap().waits.get(), 3);
        assert!(pacer.is_slot_ready(0).unwrap());
    }

    #[test]
    fn endless_early_wakes_still_time_out() {
        let fence = FakeFence {
            hung: true,
            ..FakeFence::waking_early(usize::MAX)
        };
        fence.signalled.set(1);

        let error = wait_for_value(&fence, 1, Duration::from_millis(5), FenceUse::FrameSlot(0))
            .unwrap_err();
        let timeout = error.downcast_ref::<GpuTimeout>().unwrap();
        assert_eq!(timeout.completed, 0);
        assert_eq!(timeout.expected, 1);
        assert!(fence.waits.get() >= 1);
    }

    #[test]
    fn upload_timeouts_are_not_reported_as_frame_slots() {
        let fence = FakeFence::hung();
        let error =
            wait_for_value(&fence, 1, Duration::from_millis(5), FenceUse::Uploads).unwrap_err();
        let message = error.to_string();
        assert!(message.contains("staged uploads"));
        assert!(!message.contains("frame slot"));
    }

    #[test]
    fn failed_signal_does_not_advance_the_target() {
        let mut pacer = pacer::<2>();
        assert!(pacer.signal_slot(&FailingQueue, 0).is_err());
        assert_eq!(pacer.target(0), Some(0));
        pacer.wait_for_slot(0).unwrap();
    }

    #[test]
    fn out_of_range_slots_are_errors() {
        let mut pacer = pacer::<2>();
        let queue = FakeQueue::default();
        assert!(pacer.wait_for_slot(2).is_err());
        assert!(pacer.is_slot_ready(5).is_err());
        assert!(pacer.signal_slot(&queue, 2).is_err());
        assert!(queue.signals.borrow().is_empty());
    }

    #[test]
    fn wait_for_idle_drains_every_slot() {
        let mut pacer = pacer::<3>();
        let queue = FakeQueue::default();
        pacer.signal_slot(&queue, 0).unwrap();

        pacer.wait_for_idle(&queue).unwrap();

        for slot in 0..3 {
            assert!(pacer.is_slot_ready(slot).unwrap());
        }
        assert_eq!(pacer.target(0), Some(2));
        assert_eq!(pacer.target(1), Some(1));
        assert_eq!(pacer.target(2), Some(1));
    }

    #[test]
    fn rotating_triple_buffer_only_waits_on_the_slot_being_reused() {
        let mut pacer = pacer::<3>();
        let queue = FakeQueue::default();

        for frame in 0..9usize {
            let slot = frame % 3;
            pacer.wait_for_slot(slot).unwrap();
            pacer.signal_slot(&queue, slot).unwrap();
        }

        // Each slot was reused twice after its first frame, and the GPU was
        // behind every time because nothing completes until waited on.
        for slot in 0..3 {
            assert_eq!(pacer.fence(slot).unwrap().waits.get(), 2);
            assert_eq!(pacer.target(slot), Some(3));
        }
    }
}
