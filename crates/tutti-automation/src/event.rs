//! Automation event types.

use std::sync::Arc;

/// A scheduling instruction for one parameter.
///
/// Times are in seconds on the owning context's clock.
#[derive(Debug, Clone, PartialEq)]
pub enum AutomationEvent {
    SetValue {
        value: f64,
        time: f64,
    },
    LinearRamp {
        value: f64,
        end_time: f64,
    },
    ExponentialRamp {
        value: f64,
        end_time: f64,
    },
    SetTarget {
        target: f64,
        time: f64,
        time_constant: f64,
    },
    SetValueCurve {
        values: Arc<[f64]>,
        time: f64,
        duration: f64,
    },
    CancelScheduled {
        time: f64,
    },
    CancelAndHold {
        time: f64,
    },
}

impl AutomationEvent {
    /// Ordering key: cancellation time for cancels, end time for ramps,
    /// start time otherwise.
    pub fn effective_time(&self) -> f64 {
        match self {
            Self::CancelScheduled { time } | Self::CancelAndHold { time } => *time,
            Self::LinearRamp { end_time, .. } | Self::ExponentialRamp { end_time, .. } => {
                *end_time
            }
            Self::SetValue { time, .. }
            | Self::SetTarget { time, .. }
            | Self::SetValueCurve { time, .. } => *time,
        }
    }

    pub fn is_cancel(&self) -> bool {
        matches!(self, Self::CancelScheduled { .. } | Self::CancelAndHold { .. })
    }
}

/// Kind of ramp, shared by scheduled and synthesized ramps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampKind {
    Linear,
    Exponential,
}

impl RampKind {
    /// Interpolate from `(t0, v0)` towards `value` reached at `end_time`.
    pub fn interpolate(self, time: f64, t0: f64, v0: f64, end_time: f64, value: f64) -> f64 {
        match self {
            RampKind::Linear => v0 + (time - t0) / (end_time - t0) * (value - v0),
            RampKind::Exponential => {
                if v0 == value {
                    value
                } else if (v0 > 0.0 && value > 0.0) || (v0 < 0.0 && value < 0.0) {
                    v0 * (value / v0).powf((time - t0) / (end_time - t0))
                } else {
                    0.0
                }
            }
        }
    }
}

/// An event as stored in a timeline.
///
/// Ramps remember the timeline's clock at insertion, which serves as their
/// origin when nothing precedes them. Cancellations are never stored.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduledEvent {
    SetValue {
        value: f64,
        time: f64,
    },
    Ramp {
        kind: RampKind,
        value: f64,
        end_time: f64,
        insert_time: f64,
    },
    SetTarget {
        target: f64,
        time: f64,
        time_constant: f64,
    },
    SetValueCurve {
        values: Arc<[f64]>,
        time: f64,
        duration: f64,
    },
}

impl ScheduledEvent {
    pub fn effective_time(&self) -> f64 {
        match self {
            Self::Ramp { end_time, .. } => *end_time,
            Self::SetValue { time, .. }
            | Self::SetTarget { time, .. }
            | Self::SetValueCurve { time, .. } => *time,
        }
    }

    pub fn is_ramp(&self) -> bool {
        matches!(self, Self::Ramp { .. })
    }

    /// End of a curve's span, `None` for other events.
    pub fn curve_end(&self) -> Option<f64> {
        match self {
            Self::SetValueCurve { time, duration, .. } => Some(time + duration),
            _ => None,
        }
    }

    /// Exponential approach of a set-target event, starting from `previous`.
    pub(crate) fn decay(time: f64, previous: f64, start: f64, target: f64, time_constant: f64) -> f64 {
        target + (previous - target) * ((start - time) / time_constant).exp()
    }
}

/// Sample `values` spread over `[start, start + duration]` at `time`.
pub(crate) fn curve_value(values: &[f64], start: f64, duration: f64, time: f64) -> f64 {
    let last = values.len() - 1;
    let position = (time - start) / duration * last as f64;
    let lower = position.floor();
    let upper = position.ceil();
    let (lo, hi) = (
        (lower.max(0.0) as usize).min(last),
        (upper.max(0.0) as usize).min(last),
    );
    if lo == hi {
        values[lo]
    } else {
        (1.0 - (position - lower)) * values[lo] + (1.0 - (upper - position)) * values[hi]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_effective_time() {
        assert_eq!(
            AutomationEvent::LinearRamp {
                value: 1.0,
                end_time: 2.0
            }
            .effective_time(),
            2.0
        );
        assert_eq!(AutomationEvent::CancelAndHold { time: 0.5 }.effective_time(), 0.5);
        assert!(AutomationEvent::CancelScheduled { time: 0.0 }.is_cancel());
        assert!(!AutomationEvent::SetValue {
            value: 0.0,
            time: 0.0
        }
        .is_cancel());
    }

    #[test]
    fn test_linear_interpolation() {
        assert_relative_eq!(RampKind::Linear.interpolate(1.5, 1.0, 0.0, 2.0, 4.0), 2.0);
    }

    #[test]
    fn test_exponential_interpolation() {
        assert_relative_eq!(
            RampKind::Exponential.interpolate(1.0, 0.0, 1.0, 2.0, 100.0),
            10.0,
            epsilon = 1e-9
        );
        // equal endpoints
        assert_eq!(RampKind::Exponential.interpolate(0.3, 0.0, 2.0, 1.0, 2.0), 2.0);
        // sign change collapses to zero
        assert_eq!(RampKind::Exponential.interpolate(0.5, 0.0, -1.0, 1.0, 1.0), 0.0);
    }

    #[test]
    fn test_curve_value_interpolates() {
        let values = [0.0, 10.0, 20.0];
        assert_relative_eq!(curve_value(&values, 1.0, 2.0, 1.0), 0.0);
        assert_relative_eq!(curve_value(&values, 1.0, 2.0, 1.5), 5.0);
        assert_relative_eq!(curve_value(&values, 1.0, 2.0, 2.0), 10.0);
        assert_relative_eq!(curve_value(&values, 1.0, 2.0, 3.0), 20.0);
    }
}
