//! Ordered event list for one parameter.

use crate::error::{AutomationError, Result};
use crate::event::{curve_value, AutomationEvent, RampKind, ScheduledEvent};
use std::sync::Arc;

/// Scheduled automation for a single parameter.
///
/// Events are kept sorted by their effective time (ties resolve in insertion
/// order). [`value_at`](Self::value_at) replays the schedule at any time.
///
/// # Example
///
/// ```ignore
/// let mut timeline = AutomationTimeline::new(1.0);
/// timeline.insert(AutomationEvent::SetValue { value: 0.0, time: 0.0 })?;
/// timeline.insert(AutomationEvent::LinearRamp { value: 10.0, end_time: 1.0 })?;
/// assert_eq!(timeline.value_at(0.5), 5.0);
/// ```
#[derive(Debug, Clone)]
pub struct AutomationTimeline {
    events: Vec<ScheduledEvent>,
    default_value: f64,
    current_time: f64,
}

impl AutomationTimeline {
    pub fn new(default_value: f64) -> Self {
        Self {
            events: Vec::new(),
            default_value,
            current_time: 0.0,
        }
    }

    pub fn default_value(&self) -> f64 {
        self.default_value
    }

    pub fn events(&self) -> &[ScheduledEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Clock value recorded as the insert time of subsequently added ramps.
    pub fn set_current_time(&mut self, time: f64) {
        self.current_time = time;
    }

    /// Schedule `event`.
    ///
    /// Fails with [`AutomationError::Overlap`] if the event would land inside
    /// a value curve (or a new curve would swallow a later event), and with
    /// [`AutomationError::InvalidTimeConstant`] for a set-target event whose
    /// time constant is not positive. Nothing is changed on failure.
    pub fn insert(&mut self, event: AutomationEvent) -> Result<()> {
        if let AutomationEvent::SetTarget { time_constant, .. } = &event {
            if !(time_constant.is_finite() && *time_constant > 0.0) {
                return Err(AutomationError::InvalidTimeConstant(*time_constant));
            }
        }
        let time = event.effective_time();
        let scheduled = match event {
            AutomationEvent::CancelScheduled { .. } => return self.cancel(time, false),
            AutomationEvent::CancelAndHold { .. } => return self.cancel(time, true),
            AutomationEvent::SetValue { value, time } => ScheduledEvent::SetValue { value, time },
            AutomationEvent::LinearRamp { value, end_time } => ScheduledEvent::Ramp {
                kind: RampKind::Linear,
                value,
                end_time,
                insert_time: self.current_time,
            },
            AutomationEvent::ExponentialRamp { value, end_time } => ScheduledEvent::Ramp {
                kind: RampKind::Exponential,
                value,
                end_time,
                insert_time: self.current_time,
            },
            AutomationEvent::SetTarget {
                target,
                time,
                time_constant,
            } => ScheduledEvent::SetTarget {
                target,
                time,
                time_constant,
            },
            AutomationEvent::SetValueCurve {
                values,
                time,
                duration,
            } => ScheduledEvent::SetValueCurve {
                values,
                time,
                duration,
            },
        };
        self.schedule(scheduled, time)
    }

    fn schedule(&mut self, event: ScheduledEvent, time: f64) -> Result<()> {
        let next = self.events.iter().position(|e| e.effective_time() > time);
        let previous = match next {
            None => self.events.last(),
            Some(index) => index.checked_sub(1).map(|i| &self.events[i]),
        };

        if previous
            .and_then(ScheduledEvent::curve_end)
            .is_some_and(|end| end > time)
        {
            return Err(AutomationError::Overlap { time });
        }

        match next {
            None => self.events.push(event),
            Some(index) => {
                if let ScheduledEvent::SetValueCurve { duration, .. } = &event {
                    if time + duration > self.events[index].effective_time() {
                        return Err(AutomationError::Overlap { time });
                    }
                }
                self.events.insert(index, event);
            }
        }
        Ok(())
    }

    fn cancel(&mut self, time: f64, hold: bool) -> Result<()> {
        let cut = self.events.iter().position(|e| match e.curve_end() {
            Some(end) if !hold => end >= time,
            _ => e.effective_time() >= time,
        });
        let kept = cut.unwrap_or(self.events.len());
        let removed = cut.map(|i| self.events[i].clone());
        let last_index = kept.checked_sub(1);
        let last = last_index.map(|i| self.events[i].clone());

        if !hold {
            self.events.truncate(kept);
            return Ok(());
        }

        let held_ramp = match &removed {
            Some(ScheduledEvent::Ramp {
                kind,
                value,
                end_time,
                insert_time,
            }) => {
                let (t0, v0) = match &last {
                    Some(ScheduledEvent::SetTarget { .. }) => {
                        return Err(AutomationError::TargetHold { time });
                    }
                    None => (*insert_time, self.default_value),
                    Some(ScheduledEvent::SetValueCurve {
                        values,
                        time: start,
                        duration,
                    }) => (start + duration, values[values.len() - 1]),
                    Some(ScheduledEvent::SetValue { value, time }) => (*time, *value),
                    Some(ScheduledEvent::Ramp {
                        value, end_time, ..
                    }) => (*end_time, *value),
                };
                Some(ScheduledEvent::Ramp {
                    kind: *kind,
                    value: kind.interpolate(time, t0, v0, *end_time, *value),
                    end_time: time,
                    insert_time: self.current_time,
                })
            }
            _ => None,
        };

        let held_target = match &last {
            Some(ScheduledEvent::SetTarget { .. }) => Some(ScheduledEvent::SetValue {
                value: self.value_at(time),
                time,
            }),
            _ => None,
        };

        self.events.truncate(kept);
        self.events.extend(held_ramp);
        self.events.extend(held_target);

        if let (
            Some(index),
            Some(ScheduledEvent::SetValueCurve {
                values,
                time: start,
                duration,
            }),
        ) = (last_index, &last)
        {
            if start + duration > time {
                self.events[index] = truncate_curve(values, *start, *duration, time);
            }
        }

        Ok(())
    }

    /// Drop history before `time`, keeping the event in effect at `time`.
    ///
    /// A set-target event left at the front is preceded by a synthesized
    /// set-value carrying the value it decays from.
    pub fn flush(&mut self, time: f64) {
        let Some(next) = self.events.iter().position(|e| e.effective_time() > time) else {
            return;
        };
        if next <= 1 {
            return;
        }

        let anchor = match &self.events[next - 1] {
            ScheduledEvent::SetTarget { time: start, .. } => Some(ScheduledEvent::SetValue {
                value: self.value_before(Some(next - 2), *start),
                time: *start,
            }),
            _ => None,
        };

        self.events.drain(..next - 1);
        if let Some(anchor) = anchor {
            self.events.insert(0, anchor);
        }
    }

    /// The scheduled value at `time`.
    pub fn value_at(&self, time: f64) -> f64 {
        if self.events.is_empty() {
            return self.default_value;
        }

        let next_index = self.events.iter().position(|e| e.effective_time() > time);
        let next = next_index.map(|i| &self.events[i]);
        let previous_index = next_index.unwrap_or(self.events.len()).checked_sub(1);
        let previous = previous_index.map(|i| &self.events[i]);
        let next_is_ramp = next.is_some_and(ScheduledEvent::is_ramp);

        match previous {
            Some(ScheduledEvent::SetTarget {
                target,
                time: start,
                time_constant,
            }) if !next_is_ramp
                || matches!(next, Some(ScheduledEvent::Ramp { insert_time, .. }) if *insert_time > time) =>
            {
                let from = self.value_before(previous_index.and_then(|i| i.checked_sub(1)), *start);
                return ScheduledEvent::decay(time, from, *start, *target, *time_constant);
            }
            Some(ScheduledEvent::SetValue { value, .. }) if !next_is_ramp => return *value,
            Some(ScheduledEvent::SetValueCurve {
                values,
                time: start,
                duration,
            }) if !next_is_ramp || start + duration > time => {
                return if time < start + duration {
                    curve_value(values, *start, *duration, time)
                } else {
                    values[values.len() - 1]
                };
            }
            Some(ScheduledEvent::Ramp { value, .. }) if !next_is_ramp => return *value,
            _ => {}
        }

        match next {
            Some(ScheduledEvent::Ramp {
                kind,
                value,
                end_time,
                insert_time,
            }) => {
                let (t0, v0) = self.ramp_origin(previous_index, *insert_time);
                kind.interpolate(time, t0, v0, *end_time, *value)
            }
            _ => self.default_value,
        }
    }

    /// Value left behind by the event at `index`, evaluated at `time` for
    /// set-target events.
    fn value_before(&self, index: Option<usize>, time: f64) -> f64 {
        match index.map(|i| (i, &self.events[i])) {
            None => self.default_value,
            Some((_, ScheduledEvent::SetValue { value, .. }))
            | Some((_, ScheduledEvent::Ramp { value, .. })) => *value,
            Some((_, ScheduledEvent::SetValueCurve { values, .. })) => values[values.len() - 1],
            Some((
                i,
                ScheduledEvent::SetTarget {
                    target,
                    time: start,
                    time_constant,
                },
            )) => {
                let from = self.value_before(i.checked_sub(1), *start);
                ScheduledEvent::decay(time, from, *start, *target, *time_constant)
            }
        }
    }

    /// Start point `(time, value)` of a ramp following the event at `index`.
    fn ramp_origin(&self, index: Option<usize>, insert_time: f64) -> (f64, f64) {
        match index.map(|i| (i, &self.events[i])) {
            None => (insert_time, self.default_value),
            Some((_, ScheduledEvent::Ramp { value, end_time, .. })) => (*end_time, *value),
            Some((_, ScheduledEvent::SetValue { value, time })) => (*time, *value),
            Some((
                _,
                ScheduledEvent::SetValueCurve {
                    values,
                    time,
                    duration,
                },
            )) => (time + duration, values[values.len() - 1]),
            Some((i, ScheduledEvent::SetTarget { time, .. })) => {
                (*time, self.value_before(i.checked_sub(1), *time))
            }
        }
    }
}

/// Shorten a curve to end at `time`, resampled so its last value is the
/// curve's value at `time`.
fn truncate_curve(values: &[f64], start: f64, duration: f64, time: f64) -> ScheduledEvent {
    let elapsed = time - start;
    let density = (values.len() - 1) as f64 / duration;
    let count = ((elapsed * density).ceil() as usize + 1).max(2);

    let resampled: Vec<f64> = (0..count)
        .map(|i| {
            let t = start + elapsed * i as f64 / (count - 1) as f64;
            curve_value(values, start, duration, t)
        })
        .collect();

    ScheduledEvent::SetValueCurve {
        values: Arc::from(resampled),
        time: start,
        duration: elapsed,
    }
}
