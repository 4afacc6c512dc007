//! Timer Tick Source
//!
//! One hardware timer, one interrupt handler, one duty chosen before the timer
//! starts:
//! - **Tick mode**: the handler counts ticks for the engine's elapsed-time query
//! - **Mix mode**: the handler feeds the PSG slot mixer instead, and the tick
//!   counter stands still
//!
//! There is no switching afterwards. Running both duties at once would need a
//! second timer or a handler that does both in a fixed order.

use crate::mixer::{MixerHandle, PsgBus};
use crate::{AudioError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Interrupt vector the handler must be bound to
pub const TIMER_IRQ_VECTOR: u8 = 0x9;

/// Timer period of the reference build
pub const DEFAULT_TIMER_PERIOD: u16 = 1423;

/// Input clock of the hardware timer
pub const TIMER_CLOCK_HZ: u32 = 1_431_818;

/// Milliseconds per tick at the reference period (about 1006 Hz)
pub const DEFAULT_MS_PER_TICK: u32 = 1;

/// Interrupt rate for a timer period
pub fn timer_rate_hz(period: u16) -> u32 {
    TIMER_CLOCK_HZ / u32::from(period.max(1))
}

const IRQ_MASK_ALL: u8 = 0x7F;
const IRQ_MASK_TIMER_OPEN: u8 = 0x3F;
const IRQ_LEVEL_ALL: u8 = 8;

/// Interrupt controller and timer access
///
/// Implementations write straight to hardware; none of these calls can fail.
pub trait TimerBus: Send {
    /// Write the interrupt mask
    fn set_irq_mask(&mut self, mask: u8);

    /// Reset the timer
    fn init(&mut self);

    /// Set the timer period
    fn set_period(&mut self, period: u16);

    /// Start the timer, raising interrupts if `irq_enabled`
    fn start(&mut self, irq_enabled: bool);

    /// Set the CPU interrupt level
    fn set_irq_level(&mut self, level: u8);

    /// Enable CPU interrupt handling
    fn enable_irqs(&mut self);

    /// Acknowledge the timer interrupt
    fn ack_irq(&mut self);
}

/// Handler duty, chosen once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    /// Count ticks for elapsed time
    #[default]
    Tick,
    /// Feed the PSG slot mixer
    Mix,
}

/// Coarse monotonic tick count, shared between handler and main loop
#[derive(Debug, Default)]
pub struct TickCounter {
    ticks: AtomicU32,
}

impl TickCounter {
    /// Create a counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one tick
    #[inline]
    pub fn increment(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Current tick count
    pub fn get(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Back to zero
    pub fn reset(&self) {
        self.ticks.store(0, Ordering::Relaxed);
    }

    /// Elapsed milliseconds at `ms_per_tick` granularity, wrapping
    pub fn elapsed_ms(&self, ms_per_tick: u32) -> u32 {
        self.get().wrapping_mul(ms_per_tick)
    }
}

/// Timer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Not started
    Disabled,
    /// Running in a fixed mode
    Running(TimerMode),
}

/// Owns the one-time mode choice and the tick counter
#[derive(Debug)]
pub struct TickSource {
    state: TimerState,
    ticks: Arc<TickCounter>,
}

impl TickSource {
    /// Create a disabled tick source
    pub fn new() -> Self {
        TickSource {
            state: TimerState::Disabled,
            ticks: Arc::new(TickCounter::new()),
        }
    }

    /// Current state
    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Shared tick counter
    pub fn ticks(&self) -> &Arc<TickCounter> {
        &self.ticks
    }

    /// Program and start the timer in `mode`
    ///
    /// Returns the interrupt handler object, which the platform binds to
    /// [`TIMER_IRQ_VECTOR`] and which owns `bus` from then on. In tick mode the
    /// mixer is never touched. Fails if the timer is already running.
    pub fn arm<T: TimerBus, P: PsgBus>(
        &mut self,
        mode: TimerMode,
        period: u16,
        mut bus: T,
        mixer: &MixerHandle<P>,
    ) -> Result<TimerInterrupt<T, P>> {
        if let TimerState::Running(current) = self.state {
            return Err(AudioError::TimerAlreadyArmed(current));
        }
        if period == 0 {
            return Err(AudioError::Config("timer period must be non-zero".into()));
        }

        bus.set_irq_mask(IRQ_MASK_ALL);
        bus.set_irq_mask(IRQ_MASK_TIMER_OPEN);
        bus.init();
        bus.set_period(period);
        bus.start(true);
        self.ticks.reset();
        bus.set_irq_level(IRQ_LEVEL_ALL);
        bus.enable_irqs();

        self.state = TimerState::Running(mode);
        log::info!("timer armed in {mode:?} mode, period {period}");

        let duty = match mode {
            TimerMode::Tick => IrqDuty::Count(Arc::clone(&self.ticks)),
            TimerMode::Mix => IrqDuty::Mix(mixer.clone()),
        };
        Ok(TimerInterrupt { bus, duty })
    }
}

impl Default for TickSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
enum IrqDuty<P: PsgBus> {
    Count(Arc<TickCounter>),
    Mix(MixerHandle<P>),
}

/// Timer interrupt handler
///
/// `fire` acknowledges the interrupt, then performs the duty picked at arm
/// time. It never blocks and never allocates.
#[derive(Debug)]
pub struct TimerInterrupt<T: TimerBus, P: PsgBus> {
    bus: T,
    duty: IrqDuty<P>,
}

impl<T: TimerBus, P: PsgBus> TimerInterrupt<T, P> {
    /// Handle one timer interrupt
    #[inline]
    pub fn fire(&mut self) {
        self.bus.ack_irq();
        match &self.duty {
            IrqDuty::Count(ticks) => ticks.increment(),
            IrqDuty::Mix(mixer) => {
                mixer.irq_step();
            }
        }
    }

    /// Mode the handler was armed in
    pub fn mode(&self) -> TimerMode {
        match self.duty {
            IrqDuty::Count(_) => TimerMode::Tick,
            IrqDuty::Mix(_) => TimerMode::Mix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixer::HEADER_GUARD;
    use crate::{BusEvent, RecordingBus};

    fn mixer(bus: &RecordingBus) -> MixerHandle<RecordingBus> {
        MixerHandle::new(bus.clone(), 1)
    }

    #[test]
    fn test_arm_sequence() {
        let bus = RecordingBus::new();
        let mut source = TickSource::new();
        source
            .arm(TimerMode::Tick, DEFAULT_TIMER_PERIOD, bus.clone(), &mixer(&bus))
            .unwrap();

        assert_eq!(
            bus.events(),
            vec![
                BusEvent::IrqMask(0x7F),
                BusEvent::IrqMask(0x3F),
                BusEvent::TimerInit,
                BusEvent::TimerPeriod(1423),
                BusEvent::TimerStart { irq_enabled: true },
                BusEvent::IrqLevel(8),
                BusEvent::IrqEnable,
            ]
        );
        assert_eq!(source.state(), TimerState::Running(TimerMode::Tick));
    }

    #[test]
    fn test_mode_is_chosen_once() {
        let bus = RecordingBus::new();
        let mut source = TickSource::new();
        let m = mixer(&bus);
        source.arm(TimerMode::Tick, 100, bus.clone(), &m).unwrap();

        let err = source.arm(TimerMode::Mix, 100, bus.clone(), &m).unwrap_err();
        assert!(matches!(err, AudioError::TimerAlreadyArmed(TimerMode::Tick)));
    }

    #[test]
    fn test_zero_period_rejected() {
        let bus = RecordingBus::new();
        let mut source = TickSource::new();
        assert!(source.arm(TimerMode::Tick, 0, bus.clone(), &mixer(&bus)).is_err());
        assert_eq!(source.state(), TimerState::Disabled);
        assert!(bus.events().is_empty());
    }

    #[test]
    fn test_tick_mode_counts() {
        let bus = RecordingBus::new();
        let mut source = TickSource::new();
        let mut irq = source.arm(TimerMode::Tick, 100, bus.clone(), &mixer(&bus)).unwrap();
        bus.clear();

        for _ in 0..5 {
            irq.fire();
        }
        assert_eq!(source.ticks().get(), 5);
        assert_eq!(source.ticks().elapsed_ms(DEFAULT_MS_PER_TICK), 5);
        assert_eq!(bus.count(|e| *e == BusEvent::IrqAck), 5);
        assert_eq!(irq.mode(), TimerMode::Tick);
    }

    #[test]
    fn test_mix_mode_feeds_mixer_not_counter() {
        let bus = RecordingBus::new();
        let m = mixer(&bus);
        m.load(0, vec![4u8; HEADER_GUARD + 8]).unwrap();
        m.start(0, 2, false).unwrap();

        let mut source = TickSource::new();
        let mut irq = source.arm(TimerMode::Mix, 100, bus.clone(), &m).unwrap();
        bus.clear();

        irq.fire();
        irq.fire();

        assert_eq!(source.ticks().get(), 0);
        assert_eq!(
            bus.events(),
            vec![
                BusEvent::IrqAck,
                BusEvent::PsgSelect(2),
                BusEvent::PsgWaveform(4),
                BusEvent::IrqAck,
                BusEvent::PsgSelect(2),
                BusEvent::PsgWaveform(4),
            ]
        );
    }

    #[test]
    fn test_one_second_of_reference_ticks() {
        let bus = RecordingBus::new();
        let mut source = TickSource::new();
        let mut irq = source
            .arm(TimerMode::Tick, DEFAULT_TIMER_PERIOD, bus.clone(), &mixer(&bus))
            .unwrap();

        let rate = timer_rate_hz(DEFAULT_TIMER_PERIOD);
        assert_eq!(rate, 1006);
        for _ in 0..rate {
            irq.fire();
        }
        let ms = source.ticks().elapsed_ms(DEFAULT_MS_PER_TICK);
        assert!((950..=1050).contains(&ms), "one second reported as {ms} ms");
        assert_eq!(ms / 1000, 1);
        assert_eq!(timer_rate_hz(0), TIMER_CLOCK_HZ);
    }

    #[test]
    fn test_elapsed_wraps() {
        let counter = TickCounter::new();
        counter.ticks.store(u32::MAX, Ordering::Relaxed);
        assert_eq!(counter.elapsed_ms(2), u32::MAX.wrapping_mul(2));
        counter.increment();
        assert_eq!(counter.get(), 0);
    }
}
