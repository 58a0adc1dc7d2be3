//! A simulated single-core RTOS for host tests
//!
//! Each task, and the interrupt handler, gets an OS thread, but only the one
//! holding the baton (`Sched::running`) ever makes progress, so the
//! benchmark sees a strictly single-core, priority-preemptive scheduler.
//! The clock only moves on a task switch, by a fixed cost, so every
//! correct measurement comes out as exactly that cost.
//!
//! The interrupt fires whenever it is enabled and no task is ready.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::config::{
    QUEUE_LENGTH, RECEIVER_INITIAL_PRIORITY, SEM_CNT_MAX, SENDER_INITIAL_PRIORITY,
};
use crate::console::Console;
use crate::harness::Harness;
use crate::isr::IsrDriver;
use crate::kernel::{InterruptSource, IsrKernel, Kernel, Primitive, Role, SignalError, Wake};
use crate::timer::CycleCounter;

/// Times the interrupt may fire after both tasks are done before we decide
/// it will never switch itself off
const IDLE_FIRE_LIMIT: u32 = 16;

const ROLES: [Role; 2] = [Role::Sender, Role::Receiver];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Cpu {
    Task(Role),
    Interrupt,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum TaskState {
    Ready,
    Blocked(Primitive),
    Done,
}

fn slot(role: Role) -> usize {
    match role {
        Role::Sender => 0,
        Role::Receiver => 1,
    }
}

fn other(role: Role) -> Role {
    match role {
        Role::Sender => Role::Receiver,
        Role::Receiver => Role::Sender,
    }
}

struct Sched {
    running: Option<Cpu>,
    state: [TaskState; 2],
    priority: [u8; 2],
    notification: Option<u32>,
    semaphore: u32,
    queue: VecDeque<u32>,
    irq_enabled: bool,
    clock: u16,
    switches: u32,
    irq_fires: u32,
    idle_fires: u32,
    isr_posts: [u32; 3],
    exited: [Option<u32>; 2],
    finished: bool,
    crashed: bool,
}

impl Sched {
    /// Highest priority ready task, the sender winning a tie
    fn best_ready(&self) -> Option<Role> {
        let mut best: Option<Role> = None;
        for role in ROLES {
            if self.state[slot(role)] != TaskState::Ready {
                continue;
            }
            match best {
                Some(current) if self.priority[slot(current)] >= self.priority[slot(role)] => {}
                _ => best = Some(role),
            }
        }
        best
    }

    fn any_blocked(&self) -> bool {
        self.state
            .iter()
            .any(|state| matches!(state, TaskState::Blocked(_)))
    }

    fn post(&mut self, primitive: Primitive, value: u32) -> Result<(), SignalError> {
        match primitive {
            Primitive::Notification => self.notification = Some(value),
            Primitive::Semaphore => {
                if self.semaphore >= SEM_CNT_MAX {
                    return Err(SignalError::Full);
                }
                self.semaphore += 1;
            }
            Primitive::MessageQueue => {
                if self.queue.len() >= QUEUE_LENGTH {
                    return Err(SignalError::Full);
                }
                self.queue.push_back(value);
            }
        }
        Ok(())
    }

    fn try_take(&mut self, primitive: Primitive) -> Option<u32> {
        match primitive {
            Primitive::Notification => self.notification.take(),
            Primitive::Semaphore if self.semaphore > 0 => {
                self.semaphore -= 1;
                Some(1)
            }
            Primitive::Semaphore => None,
            Primitive::MessageQueue => self.queue.pop_front(),
        }
    }

    /// Make whoever is blocked on `primitive` ready again
    fn wake(&mut self, primitive: Primitive) -> Option<Role> {
        let role = ROLES
            .into_iter()
            .find(|role| self.state[slot(*role)] == TaskState::Blocked(primitive))?;
        self.state[slot(role)] = TaskState::Ready;
        Some(role)
    }
}

/// The simulated processor, scheduler, kernel objects, counter and console
pub struct SimKernel {
    sched: Mutex<Sched>,
    turn: Condvar,
    cost: u16,
    output: Mutex<String>,
}

impl SimKernel {
    /// Make a kernel where every task switch costs `cost` counts
    pub fn new(cost: u16) -> SimKernel {
        let mut priority = [0; 2];
        priority[slot(Role::Sender)] = SENDER_INITIAL_PRIORITY;
        priority[slot(Role::Receiver)] = RECEIVER_INITIAL_PRIORITY;
        SimKernel {
            sched: Mutex::new(Sched {
                running: Some(Cpu::Task(Role::Sender)),
                state: [TaskState::Ready; 2],
                priority,
                notification: None,
                semaphore: 0,
                queue: VecDeque::new(),
                irq_enabled: false,
                clock: 0,
                switches: 0,
                irq_fires: 0,
                idle_fires: 0,
                isr_posts: [0; 3],
                exited: [None; 2],
                finished: false,
                crashed: false,
            }),
            turn: Condvar::new(),
            cost,
            output: Mutex::new(String::new()),
        }
    }

    /// Everything printed so far
    pub fn output(&self) -> String {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Is the interrupt enabled?
    pub fn irq_enabled(&self) -> bool {
        self.lock().irq_enabled
    }

    /// How many times the interrupt handler has run
    pub fn irq_fires(&self) -> u32 {
        self.lock().irq_fires
    }

    /// How many times the interrupt handler has signalled `primitive`
    pub fn isr_posts(&self, primitive: Primitive) -> u32 {
        self.lock().isr_posts[primitive.index()]
    }

    /// How many times the interrupt had fired when `role` ended, if it has
    pub fn fires_before_exit(&self, role: Role) -> Option<u32> {
        self.lock().exited[slot(role)]
    }

    /// How many task switches there have been
    pub fn switches(&self) -> u32 {
        self.lock().switches
    }

    fn lock(&self) -> MutexGuard<'_, Sched> {
        // A panicking thread has already flagged `crashed`
        self.sched.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block the calling thread until it holds the baton as `cpu`
    fn wait_turn<'a>(&'a self, mut s: MutexGuard<'a, Sched>, cpu: Cpu) -> MutexGuard<'a, Sched> {
        while s.running != Some(cpu) {
            if s.crashed {
                panic!("another simulated thread panicked");
            }
            s = self.turn.wait(s).unwrap_or_else(PoisonError::into_inner);
        }
        s
    }

    fn switch_to(&self, s: &mut Sched, next: Role) {
        s.running = Some(Cpu::Task(next));
        s.clock = s.clock.wrapping_add(self.cost);
        s.switches += 1;
        self.turn.notify_all();
    }

    /// The baton holder has given it up; pass it on
    fn reschedule(&self, s: &mut Sched) {
        s.running = None;
        if s.crashed {
            s.finished = true;
        } else if let Some(next) = s.best_ready() {
            self.switch_to(s, next);
            return;
        } else if s.irq_enabled {
            if !s.any_blocked() {
                s.idle_fires += 1;
                if s.idle_fires > IDLE_FIRE_LIMIT {
                    s.crashed = true;
                    self.turn.notify_all();
                    panic!("the interrupt never disabled itself");
                }
            }
            s.running = Some(Cpu::Interrupt);
        } else if s.any_blocked() {
            s.crashed = true;
            self.turn.notify_all();
            panic!("deadlock: a task is blocked and the interrupt is off");
        } else {
            s.finished = true;
        }
        self.turn.notify_all();
    }

    /// Hand over to a ready task that outranks `me`
    fn preempt<'a>(&'a self, mut s: MutexGuard<'a, Sched>, me: Role) -> MutexGuard<'a, Sched> {
        if let Some(best) = s.best_ready() {
            if best != me && s.priority[slot(best)] > s.priority[slot(me)] {
                self.switch_to(&mut s, best);
                s = self.wait_turn(s, Cpu::Task(me));
            }
        }
        s
    }

    fn enter(&self, me: Role) -> SimTask<'_> {
        drop(self.wait_turn(self.lock(), Cpu::Task(me)));
        SimTask { kernel: self, me }
    }

    /// Block until the interrupt fires, or return `false` once it never will
    fn wait_for_interrupt(&self) -> bool {
        let mut s = self.lock();
        loop {
            if s.running == Some(Cpu::Interrupt) {
                return true;
            }
            if s.finished {
                return false;
            }
            if s.crashed {
                panic!("another simulated thread panicked");
            }
            s = self.turn.wait(s).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn return_from_interrupt(&self) {
        let mut s = self.lock();
        s.irq_fires += 1;
        self.reschedule(&mut s);
    }

    fn post_from_isr(&self, primitive: Primitive, value: u32) -> Result<Wake, SignalError> {
        let mut s = self.lock();
        s.post(primitive, value)?;
        s.isr_posts[primitive.index()] += 1;
        // We only interrupt the idle loop, so anyone woken outranks it
        Ok(match s.wake(primitive) {
            Some(_) => Wake::HigherPriority,
            None => Wake::None,
        })
    }
}

impl IsrKernel for SimKernel {
    fn notify_from_isr(&self, value: u32) -> Result<Wake, SignalError> {
        self.post_from_isr(Primitive::Notification, value)
    }

    fn give_from_isr(&self) -> Result<Wake, SignalError> {
        self.post_from_isr(Primitive::Semaphore, 1)
    }

    fn send_from_isr(&self, message: u32) -> Result<Wake, SignalError> {
        self.post_from_isr(Primitive::MessageQueue, message)
    }

    fn yield_from_isr(&self, _wake: Wake) {
        // The switch happens when the handler returns
    }
}

impl InterruptSource for SimKernel {
    fn enable(&self) {
        self.lock().irq_enabled = true;
    }

    fn disable(&self) {
        self.lock().irq_enabled = false;
    }
}

impl CycleCounter for SimKernel {
    fn read(&self) -> u16 {
        self.lock().clock
    }
}

impl Console for SimKernel {
    fn write_str(&self, text: &str) {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(text);
    }
}

/// One simulated task's view of the kernel
///
/// Dropping it ends the task.
pub struct SimTask<'k> {
    kernel: &'k SimKernel,
    me: Role,
}

impl SimTask<'_> {
    fn block_on(&self, primitive: Primitive) -> u32 {
        let kernel = self.kernel;
        let mut s = kernel.lock();
        loop {
            if let Some(value) = s.try_take(primitive) {
                return value;
            }
            s.state[slot(self.me)] = TaskState::Blocked(primitive);
            kernel.reschedule(&mut s);
            s = kernel.wait_turn(s, Cpu::Task(self.me));
        }
    }

    fn post(&self, primitive: Primitive, value: u32) -> Result<(), SignalError> {
        let mut s = self.kernel.lock();
        s.post(primitive, value)?;
        s.wake(primitive);
        drop(self.kernel.preempt(s, self.me));
        Ok(())
    }
}

impl Kernel for SimTask<'_> {
    fn yield_now(&self) {
        let kernel = self.kernel;
        let mut s = kernel.lock();
        let next = other(self.me);
        if s.state[slot(next)] == TaskState::Ready
            && s.priority[slot(next)] >= s.priority[slot(self.me)]
        {
            kernel.switch_to(&mut s, next);
            drop(kernel.wait_turn(s, Cpu::Task(self.me)));
        }
    }

    fn set_priority(&self, role: Role, priority: u8) {
        let mut s = self.kernel.lock();
        let lowered_self = role == self.me && priority < s.priority[slot(role)];
        s.priority[slot(role)] = priority;
        if lowered_self {
            // Lowering yourself is a yield, even to an equal
            drop(s);
            self.yield_now();
        } else {
            drop(self.kernel.preempt(s, self.me));
        }
    }

    fn notify(&self, value: u32) -> Result<(), SignalError> {
        self.post(Primitive::Notification, value)
    }

    fn wait_notification(&self) -> u32 {
        self.block_on(Primitive::Notification)
    }

    fn give(&self) -> Result<(), SignalError> {
        self.post(Primitive::Semaphore, 1)
    }

    fn take(&self) {
        self.block_on(Primitive::Semaphore);
    }

    fn send(&self, message: u32) -> Result<(), SignalError> {
        self.post(Primitive::MessageQueue, message)
    }

    fn receive(&self) -> u32 {
        self.block_on(Primitive::MessageQueue)
    }
}

impl Drop for SimTask<'_> {
    fn drop(&mut self) {
        let mut s = self.kernel.lock();
        s.state[slot(self.me)] = TaskState::Done;
        s.exited[slot(self.me)] = Some(s.irq_fires);
        if std::thread::panicking() {
            s.crashed = true;
        }
        self.kernel.reschedule(&mut s);
    }
}

/// Run the whole benchmark on a simulated kernel
///
/// The sender task runs [`Harness::sender`], the interrupt runs an
/// [`IsrDriver`], and the receiver task runs `receiver`, whose result is
/// returned.
pub fn run<R, F>(kernel: &SimKernel, harness: &Harness<'_, SimKernel, SimKernel>, receiver: F) -> R
where
    F: FnOnce(&SimTask<'_>) -> R + Send,
    R: Send,
{
    let driver = IsrDriver::new();
    std::thread::scope(|scope| {
        scope.spawn(|| {
            let task = kernel.enter(Role::Sender);
            harness.sender(&task);
        });
        scope.spawn(|| {
            while kernel.wait_for_interrupt() {
                driver.on_interrupt(harness, kernel, kernel);
                kernel.return_from_interrupt();
            }
        });
        let handle = scope.spawn(|| {
            let task = kernel.enter(Role::Receiver);
            receiver(&task)
        });
        match handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    })
}

#[cfg(feature = "mem-pool")]
pub use self::pool::{FailOnRound, SimPool};

#[cfg(feature = "mem-pool")]
mod pool {
    use core::ptr::NonNull;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::mempool::Pool;

    #[derive(Debug, Clone, Copy)]
    struct Block {
        offset: usize,
        size: usize,
        free: bool,
    }

    struct Arena {
        memory: Box<[u64]>,
        blocks: Vec<Block>,
    }

    /// A first-fit allocator with coalescing, a bit like an RTOS heap
    pub struct SimPool {
        arena: Mutex<Arena>,
    }

    impl SimPool {
        /// Bookkeeping bytes taken from the pool by each allocation
        pub const HEADER: usize = 8;

        const ALIGN: usize = 8;

        /// Make a pool of `bytes` bytes, rounded down to a multiple of eight
        pub fn new(bytes: usize) -> SimPool {
            let words = bytes / Self::ALIGN;
            SimPool {
                arena: Mutex::new(Arena {
                    memory: vec![0u64; words].into_boxed_slice(),
                    blocks: vec![Block {
                        offset: 0,
                        size: words * Self::ALIGN,
                        free: true,
                    }],
                }),
            }
        }

        /// Number of allocations not yet freed
        pub fn live(&self) -> usize {
            let arena = self.arena.lock().unwrap();
            arena.blocks.iter().filter(|block| !block.free).count()
        }

        /// Total bytes in free blocks, headers included
        pub fn free_bytes(&self) -> usize {
            let arena = self.arena.lock().unwrap();
            arena
                .blocks
                .iter()
                .filter(|block| block.free)
                .map(|block| block.size)
                .sum()
        }
    }

    impl Pool for SimPool {
        fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
            let need = Self::HEADER + size.next_multiple_of(Self::ALIGN);
            let mut arena = self.arena.lock().unwrap();
            let idx = arena
                .blocks
                .iter()
                .position(|block| block.free && block.size >= need)?;
            let found = arena.blocks[idx];
            if found.size - need >= Self::HEADER + Self::ALIGN {
                arena.blocks[idx].size = need;
                arena.blocks.insert(
                    idx + 1,
                    Block {
                        offset: found.offset + need,
                        size: found.size - need,
                        free: true,
                    },
                );
            }
            arena.blocks[idx].free = false;
            let base = arena.memory.as_mut_ptr().cast::<u8>();
            // Safety: the block lies inside the arena
            NonNull::new(unsafe { base.add(found.offset + Self::HEADER) })
        }

        unsafe fn free(&self, ptr: NonNull<u8>) {
            let mut arena = self.arena.lock().unwrap();
            let base = arena.memory.as_ptr() as usize;
            let offset = ptr.as_ptr() as usize - base - Self::HEADER;
            let idx = arena
                .blocks
                .iter()
                .position(|block| block.offset == offset && !block.free)
                .expect("freed a pointer this pool does not own");
            arena.blocks[idx].free = true;
            if arena.blocks.get(idx + 1).is_some_and(|next| next.free) {
                let next = arena.blocks.remove(idx + 1);
                arena.blocks[idx].size += next.size;
            }
            if idx > 0 && arena.blocks[idx - 1].free {
                let this = arena.blocks.remove(idx);
                arena.blocks[idx - 1].size += this.size;
            }
        }
    }

    /// Wraps a pool so the large allocation fails in one chosen round
    pub struct FailOnRound {
        inner: SimPool,
        large: usize,
        round: u32,
        seen: AtomicU32,
    }

    impl FailOnRound {
        /// Fail the `round`th request for `large` bytes, counting from zero
        pub fn new(inner: SimPool, large: usize, round: u32) -> FailOnRound {
            FailOnRound {
                inner,
                large,
                round,
                seen: AtomicU32::new(0),
            }
        }
    }

    impl Pool for FailOnRound {
        fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
            if size == self.large && self.seen.fetch_add(1, Ordering::Relaxed) == self.round {
                return None;
            }
            self.inner.allocate(size)
        }

        unsafe fn free(&self, ptr: NonNull<u8>) {
            // Safety: the caller's promise covers the inner pool too
            unsafe { self.inner.free(ptr) }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn split_and_coalesce() {
            let pool = SimPool::new(1024);
            let a = pool.allocate(100).unwrap();
            let b = pool.allocate(200).unwrap();
            let c = pool.allocate(300).unwrap();
            assert_eq!(pool.live(), 3);
            unsafe {
                pool.free(b);
                pool.free(a);
                pool.free(c);
            }
            assert_eq!(pool.live(), 0);
            assert_eq!(pool.free_bytes(), 1024);
            // All one block again
            assert!(pool.allocate(1024 - SimPool::HEADER).is_some());
        }

        #[test]
        fn exhaustion() {
            let pool = SimPool::new(256);
            assert!(pool.allocate(256).is_none());
            let held = pool.allocate(200).unwrap();
            assert!(pool.allocate(64).is_none());
            unsafe { pool.free(held) };
            assert!(pool.allocate(64).is_some());
        }

        #[test]
        fn failing_round() {
            let pool = FailOnRound::new(SimPool::new(1024), 512, 1);
            let first = pool.allocate(512).unwrap();
            unsafe { pool.free(first) };
            assert!(pool.allocate(512).is_none());
            assert!(pool.allocate(512).is_some());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::rendezvous::RendezvousState;

    #[test]
    fn switches_cost_time() {
        let kernel = SimKernel::new(50);
        let state = RendezvousState::new();
        let harness = Harness::new(Config::new().rounds(3), &state, &kernel, &kernel);
        let switches = run(&kernel, &harness, |task| {
            let before = kernel.switches();
            task.yield_now();
            kernel.switches() - before
        });
        // Over to the sender and back again
        assert_eq!(switches, 2);
    }

    #[test]
    fn notification_overwrites() {
        let kernel = SimKernel::new(1);
        let mut s = kernel.lock();
        s.post(Primitive::Notification, 5).unwrap();
        s.post(Primitive::Notification, 6).unwrap();
        assert_eq!(s.try_take(Primitive::Notification), Some(6));
        assert_eq!(s.try_take(Primitive::Notification), None);
    }

    #[test]
    fn semaphore_saturates() {
        let kernel = SimKernel::new(1);
        let mut s = kernel.lock();
        for _ in 0..SEM_CNT_MAX {
            s.post(Primitive::Semaphore, 1).unwrap();
        }
        assert_eq!(s.post(Primitive::Semaphore, 1), Err(SignalError::Full));
        for _ in 0..QUEUE_LENGTH {
            s.post(Primitive::MessageQueue, 1).unwrap();
        }
        assert_eq!(s.post(Primitive::MessageQueue, 1), Err(SignalError::Full));
    }
}

// End of File
