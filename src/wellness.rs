// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Guided 4-7-8 breathing.
//!
//! One cycle is 19 one-second ticks: inhale for 4, hold for 7, exhale for 8.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub const INHALE_SECS: u64 = 4;
pub const HOLD_SECS: u64 = 7;
pub const EXHALE_SECS: u64 = 8;
pub const CYCLE_SECS: u64 = INHALE_SECS + HOLD_SECS + EXHALE_SECS;

/// Cycles run when none (or zero) is asked for.
pub const DEFAULT_CYCLES: u32 = 3;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreathPhase {
    Inhale,
    Hold,
    Exhale,
}

impl BreathPhase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Inhale => "Inhale",
            Self::Hold => "Hold",
            Self::Exhale => "Exhale",
        }
    }
}

/// The instruction for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreathStep {
    pub phase: BreathPhase,
    /// Seconds left in the phase, counting this one.
    pub remaining: u64,
}

impl BreathStep {
    /// Step at `tick` seconds since the exercise began.
    pub fn at(tick: u64) -> Self {
        let v = tick % CYCLE_SECS;
        if v < INHALE_SECS {
            Self {
                phase: BreathPhase::Inhale,
                remaining: INHALE_SECS - v,
            }
        } else if v < INHALE_SECS + HOLD_SECS {
            Self {
                phase: BreathPhase::Hold,
                remaining: INHALE_SECS + HOLD_SECS - v,
            }
        } else {
            Self {
                phase: BreathPhase::Exhale,
                remaining: CYCLE_SECS - v,
            }
        }
    }

    /// e.g. `"Hold... 7"`.
    pub fn label(&self) -> String {
        format!("{}... {}", self.phase.label(), self.remaining)
    }
}

/// Parse a requested cycle count. Missing, zero or unparsable gives
/// [`DEFAULT_CYCLES`].
pub fn cycles_or_default(arg: Option<&str>) -> u32 {
    arg.and_then(|c| c.trim().parse().ok())
        .filter(|&c| c > 0)
        .unwrap_or(DEFAULT_CYCLES)
}

/// How a breathing run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreathingOutcome {
    Completed { cycles: u32 },
    Cancelled { ticks: u64 },
}

/// Emit one step per second for `cycles` full cycles.
///
/// The first step is emitted immediately. Stops early when `cancel` fires.
pub async fn run_breathing<F>(cycles: u32, cancel: CancellationToken, mut on_step: F) -> BreathingOutcome
where
    F: FnMut(BreathStep),
{
    let total = u64::from(cycles) * CYCLE_SECS;
    tracing::debug!("BREATHING_STARTED | cycles={}", cycles);

    for tick in 0..total {
        if cancel.is_cancelled() {
            tracing::debug!("BREATHING_CANCELLED | ticks={}", tick);
            return BreathingOutcome::Cancelled { ticks: tick };
        }
        on_step(BreathStep::at(tick));

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("BREATHING_CANCELLED | ticks={}", tick + 1);
                return BreathingOutcome::Cancelled { ticks: tick + 1 };
            }
            _ = tokio::time::sleep(TICK) => {}
        }
    }

    tracing::debug!("BREATHING_COMPLETED | cycles={}", cycles);
    BreathingOutcome::Completed { cycles }
}
