//! Countdown engine implementation.
//!
//! The engine is a wall-clock state machine. It holds no thread and reads no
//! clock of its own - every operation takes `now_ms` (milliseconds since the
//! Unix epoch) and the caller ticks it periodically. Remaining time is always
//! recomputed from the absolute phase deadline rather than decremented, so a
//! countdown that slept through process suspension lands on the right value
//! at the next tick.
//!
//! ## Phase transitions
//!
//! ```text
//! Idle -> Active <-> Paused
//!           |  \
//!           v   `-> Idle (stop)
//!         Break -> Active (natural or skipped)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = CountdownEngine::new(20.0, 5.0);
//! engine.start(now_ms);
//! // Once per second:
//! engine.tick(now_ms); // Returns Some(Event) on a phase boundary
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Active,
    Paused,
    Break,
}

/// Absolute anchors for a countdown in flight.
///
/// Present exactly when the phase is Active, Paused or Break; Idle carries
/// none. The pair always travels together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseClock {
    /// When the current phase expires (epoch ms).
    pub end_ms: u64,
    /// Wall-clock time of the most recent observed tick (epoch ms).
    pub last_tick_ms: u64,
}

/// Core countdown engine.
///
/// Work and break lengths are fixed at construction; changing them means
/// building a new engine, which is how the front end applies configuration.
#[derive(Debug, Clone)]
pub struct CountdownEngine {
    phase: Phase,
    clock: Option<PhaseClock>,
    work_ms: u64,
    break_ms: u64,
}

impl CountdownEngine {
    /// Create an engine in `Idle` with the given durations in minutes.
    ///
    /// Durations are positive reals; fractional minutes are respected to the
    /// millisecond (2.5 minutes is 150 000 ms).
    pub fn new(work_minutes: f64, break_minutes: f64) -> Self {
        Self {
            phase: Phase::Idle,
            clock: None,
            work_ms: minutes_to_ms(work_minutes),
            break_ms: minutes_to_ms(break_minutes),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn work_ms(&self) -> u64 {
        self.work_ms
    }

    pub fn break_ms(&self) -> u64 {
        self.break_ms
    }

    pub fn clock(&self) -> Option<PhaseClock> {
        self.clock
    }

    /// Milliseconds left on the countdown as of the last tick.
    ///
    /// Idle shows the full work duration, the value a fresh start would count
    /// down from. Paused keeps reporting the value frozen at the last tick
    /// before the pause.
    pub fn remaining_ms(&self) -> u64 {
        match self.clock {
            Some(clock) => clock.end_ms.saturating_sub(clock.last_tick_ms),
            None => self.work_ms,
        }
    }

    pub fn remaining(&self) -> RemainingTime {
        RemainingTime::from_ms(self.remaining_ms())
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self, now_ms: u64) -> Event {
        Event::Snapshot {
            phase: self.phase,
            remaining_ms: self.remaining_ms(),
            display: self.remaining().to_string(),
            at: at(now_ms),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start, resume, or skip a break, depending on the current phase.
    ///
    /// - `Idle`: arms a fresh work countdown ending at `now + work`.
    /// - `Paused`: resumes by pushing the deadline forward by however long
    ///   the countdown sat paused, so the remaining time picks up where the
    ///   pause left it.
    /// - `Break`: abandons the rest of the break and arms a fresh work
    ///   countdown. No session completes here.
    /// - `Active`: no-op.
    pub fn start(&mut self, now_ms: u64) -> Option<Event> {
        match self.phase {
            Phase::Idle => {
                let end_ms = now_ms.saturating_add(self.work_ms);
                self.phase = Phase::Active;
                self.clock = Some(PhaseClock {
                    end_ms,
                    last_tick_ms: now_ms,
                });
                Some(Event::Started {
                    ends_at: at(end_ms),
                    at: at(now_ms),
                })
            }
            Phase::Paused => {
                let prior = self.clock?;
                // Pause left both anchors untouched, so the gap since the
                // last tick is exactly the paused interval.
                let end_ms =
                    prior.end_ms.saturating_add(now_ms.saturating_sub(prior.last_tick_ms));
                self.phase = Phase::Active;
                self.clock = Some(PhaseClock {
                    end_ms,
                    last_tick_ms: now_ms,
                });
                Some(Event::Resumed {
                    remaining_ms: end_ms.saturating_sub(now_ms),
                    ends_at: at(end_ms),
                    at: at(now_ms),
                })
            }
            Phase::Break => {
                let end_ms = now_ms.saturating_add(self.work_ms);
                self.phase = Phase::Active;
                self.clock = Some(PhaseClock {
                    end_ms,
                    last_tick_ms: now_ms,
                });
                Some(Event::BreakSkipped {
                    work_ends_at: at(end_ms),
                    at: at(now_ms),
                })
            }
            Phase::Active => None, // Already counting down.
        }
    }

    /// Freeze the countdown. Only valid from `Active`.
    ///
    /// Neither anchor moves; `start()` later reads the frozen gap to shift
    /// the deadline.
    pub fn pause(&mut self, now_ms: u64) -> Option<Event> {
        match self.phase {
            Phase::Active => {
                self.phase = Phase::Paused;
                Some(Event::Paused {
                    remaining_ms: self.remaining_ms(),
                    at: at(now_ms),
                })
            }
            _ => None,
        }
    }

    /// Abandon the countdown and return to `Idle`. Valid from `Active` and
    /// `Paused`; during a break the only exit is `start()`.
    pub fn stop(&mut self, now_ms: u64) -> Option<Event> {
        match self.phase {
            Phase::Active | Phase::Paused => {
                self.phase = Phase::Idle;
                self.clock = None;
                Some(Event::Stopped { at: at(now_ms) })
            }
            _ => None,
        }
    }

    /// Observe the clock. Call once per second while Active or Break.
    ///
    /// Records `now_ms` as the last tick; when `now_ms` has passed the phase
    /// deadline (strictly), flips into the opposite phase anchored at `now`.
    /// A tick landing exactly on the deadline shows 00:00 and flips on the
    /// next one.
    pub fn tick(&mut self, now_ms: u64) -> Option<Event> {
        match self.phase {
            Phase::Active => {
                let clock = self.clock?;
                if now_ms > clock.end_ms {
                    let end_ms = now_ms.saturating_add(self.break_ms);
                    self.phase = Phase::Break;
                    self.clock = Some(PhaseClock {
                        end_ms,
                        last_tick_ms: now_ms,
                    });
                    Some(Event::WorkCompleted {
                        break_ends_at: at(end_ms),
                        at: at(now_ms),
                    })
                } else {
                    self.clock = Some(PhaseClock {
                        last_tick_ms: now_ms,
                        ..clock
                    });
                    None
                }
            }
            Phase::Break => {
                let clock = self.clock?;
                if now_ms > clock.end_ms {
                    let end_ms = now_ms.saturating_add(self.work_ms);
                    self.phase = Phase::Active;
                    self.clock = Some(PhaseClock {
                        end_ms,
                        last_tick_ms: now_ms,
                    });
                    Some(Event::BreakCompleted {
                        work_ends_at: at(end_ms),
                        at: at(now_ms),
                    })
                } else {
                    self.clock = Some(PhaseClock {
                        last_tick_ms: now_ms,
                        ..clock
                    });
                    None
                }
            }
            Phase::Idle | Phase::Paused => None,
        }
    }
}

/// Remaining time decomposed for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemainingTime {
    pub minutes: u64,
    pub seconds: u64,
}

impl RemainingTime {
    /// Whole minutes, then leftover milliseconds rounded to the nearest
    /// second. A leftover that rounds up to 60 carries into the minutes
    /// place, so 5 min 59.7 s reads 06:00 rather than 05:60.
    pub fn from_ms(remaining_ms: u64) -> Self {
        let minutes = remaining_ms / 60_000;
        let seconds = ((remaining_ms % 60_000) as f64 / 1_000.0).round() as u64;
        if seconds == 60 {
            Self {
                minutes: minutes + 1,
                seconds: 0,
            }
        } else {
            Self { minutes, seconds }
        }
    }
}

impl fmt::Display for RemainingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes, self.seconds)
    }
}

fn minutes_to_ms(minutes: f64) -> u64 {
    (minutes * 60_000.0).round().max(0.0) as u64
}

fn at(epoch_ms: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(epoch_ms as i64).unwrap_or_default()
}
