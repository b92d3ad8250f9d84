//! Arena of nodes and automatable parameters.
//!
//! Nodes and parameters live in slot vectors and are addressed by integer
//! handles. Connections that drive a parameter ("active inputs") are kept as
//! handle pairs in a side table, so no node ever holds a reference to another.

use crate::error::{AutomationError, Result};
use crate::event::AutomationEvent;
use crate::timeline::AutomationTimeline;
use std::sync::Arc;

/// Handle to a node in a [`ParamGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

/// Handle to a parameter in a [`ParamGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ParamId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Static description of a parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDescriptor {
    pub name: String,
    pub default_value: f64,
    pub min_value: f64,
    pub max_value: f64,
}

impl ParamDescriptor {
    pub fn new(name: impl Into<String>, default_value: f64) -> Self {
        Self {
            name: name.into(),
            default_value,
            min_value: f64::MIN,
            max_value: f64::MAX,
        }
    }

    pub fn with_range(mut self, min_value: f64, max_value: f64) -> Self {
        self.min_value = min_value;
        self.max_value = max_value;
        self
    }
}

/// An automatable value owned by one node.
#[derive(Debug, Clone)]
pub struct Param {
    node: NodeId,
    descriptor: ParamDescriptor,
    timeline: AutomationTimeline,
}

fn check_time(time: f64) -> Result<()> {
    if time.is_finite() && time >= 0.0 {
        Ok(())
    } else {
        Err(AutomationError::InvalidTime(time))
    }
}

fn check_value(value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AutomationError::InvalidValue(value))
    }
}

impl Param {
    fn new(node: NodeId, descriptor: ParamDescriptor) -> Self {
        let timeline = AutomationTimeline::new(descriptor.default_value);
        Self {
            node,
            descriptor,
            timeline,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn descriptor(&self) -> &ParamDescriptor {
        &self.descriptor
    }

    pub fn timeline(&self) -> &AutomationTimeline {
        &self.timeline
    }

    /// Scheduled value at `time`, clamped to the parameter's range.
    pub fn value_at(&self, time: f64) -> f64 {
        self.timeline
            .value_at(time)
            .clamp(self.descriptor.min_value, self.descriptor.max_value)
    }

    /// Set the value immediately, at the timeline's current time.
    pub fn set_value(&mut self, value: f64) -> Result<&mut Self> {
        let now = self.timeline.current_time();
        self.set_value_at_time(value, now)
    }

    pub fn set_value_at_time(&mut self, value: f64, time: f64) -> Result<&mut Self> {
        check_value(value)?;
        check_time(time)?;
        self.schedule(AutomationEvent::SetValue { value, time })
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f64, end_time: f64) -> Result<&mut Self> {
        check_value(value)?;
        check_time(end_time)?;
        self.schedule(AutomationEvent::LinearRamp { value, end_time })
    }

    /// Exponential ramps can't reach or cross zero.
    pub fn exponential_ramp_to_value_at_time(
        &mut self,
        value: f64,
        end_time: f64,
    ) -> Result<&mut Self> {
        check_value(value)?;
        if value == 0.0 {
            return Err(AutomationError::InvalidValue(value));
        }
        check_time(end_time)?;
        self.schedule(AutomationEvent::ExponentialRamp { value, end_time })
    }

    /// A zero time constant jumps straight to `target`.
    pub fn set_target_at_time(
        &mut self,
        target: f64,
        time: f64,
        time_constant: f64,
    ) -> Result<&mut Self> {
        check_value(target)?;
        check_time(time)?;
        if !(time_constant.is_finite() && time_constant >= 0.0) {
            return Err(AutomationError::InvalidTimeConstant(time_constant));
        }
        if time_constant == 0.0 {
            return self.schedule(AutomationEvent::SetValue {
                value: target,
                time,
            });
        }
        self.schedule(AutomationEvent::SetTarget {
            target,
            time,
            time_constant,
        })
    }

    pub fn set_value_curve_at_time(
        &mut self,
        values: &[f64],
        time: f64,
        duration: f64,
    ) -> Result<&mut Self> {
        if values.len() < 2 {
            return Err(AutomationError::CurveTooShort(values.len()));
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(AutomationError::InvalidValue(*bad));
        }
        check_time(time)?;
        if !(duration.is_finite() && duration > 0.0) {
            return Err(AutomationError::InvalidDuration(duration));
        }
        self.schedule(AutomationEvent::SetValueCurve {
            values: Arc::from(values),
            time,
            duration,
        })
    }

    pub fn cancel_scheduled_values(&mut self, cancel_time: f64) -> Result<&mut Self> {
        check_time(cancel_time)?;
        self.schedule(AutomationEvent::CancelScheduled { time: cancel_time })
    }

    pub fn cancel_and_hold_at_time(&mut self, cancel_time: f64) -> Result<&mut Self> {
        check_time(cancel_time)?;
        self.schedule(AutomationEvent::CancelAndHold { time: cancel_time })
    }

    /// Advance the clock and drop history before `time`.
    pub fn flush(&mut self, time: f64) {
        self.timeline.set_current_time(time);
        self.timeline.flush(time);
    }

    fn schedule(&mut self, event: AutomationEvent) -> Result<&mut Self> {
        self.timeline.insert(event)?;
        Ok(self)
    }
}

#[derive(Debug)]
struct NodeEntry {
    name: String,
    params: Vec<ParamId>,
}

/// Owns nodes, their parameters and the active-input table.
///
/// Handles are never reused, so a stale handle reports
/// [`AutomationError::UnknownNode`] / [`AutomationError::UnknownParam`]
/// instead of aliasing a newer entry.
#[derive(Debug, Default)]
pub struct ParamGraph {
    nodes: Vec<Option<NodeEntry>>,
    params: Vec<Option<Param>>,
    active_inputs: Vec<(NodeId, ParamId)>,
}

impl ParamGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(NodeEntry {
            name: name.into(),
            params: Vec::new(),
        }));
        id
    }

    pub fn node_name(&self, node: NodeId) -> Option<&str> {
        self.entry(node).ok().map(|entry| entry.name.as_str())
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.entry(node).is_ok()
    }

    pub fn node_params(&self, node: NodeId) -> Result<&[ParamId]> {
        self.entry(node).map(|entry| entry.params.as_slice())
    }

    /// Find a node's parameter by name.
    pub fn find_param(&self, node: NodeId, name: &str) -> Option<ParamId> {
        self.entry(node).ok()?.params.iter().copied().find(|id| {
            self.param(*id)
                .is_some_and(|param| param.descriptor.name == name)
        })
    }

    /// Remove a node together with its parameters and every connection
    /// touching either.
    pub fn remove_node(&mut self, node: NodeId) -> Result<()> {
        let entry = self
            .nodes
            .get_mut(node.index())
            .and_then(Option::take)
            .ok_or(AutomationError::UnknownNode(node))?;

        for param in &entry.params {
            self.params[param.index()] = None;
        }
        self.active_inputs
            .retain(|(from, to)| *from != node && !entry.params.contains(to));

        tracing::debug!(node = node.index(), name = %entry.name, "Removed automation node");
        Ok(())
    }

    pub fn add_param(&mut self, node: NodeId, descriptor: ParamDescriptor) -> Result<ParamId> {
        let id = ParamId(self.params.len() as u32);
        self.entry_mut(node)?.params.push(id);
        self.params.push(Some(Param::new(node, descriptor)));
        Ok(id)
    }

    pub fn param(&self, id: ParamId) -> Option<&Param> {
        self.params.get(id.index()).and_then(Option::as_ref)
    }

    pub fn param_mut(&mut self, id: ParamId) -> Result<&mut Param> {
        self.params
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(AutomationError::UnknownParam(id))
    }

    /// Mark `from` as driving `to`. Returns `false` if already connected.
    pub fn connect(&mut self, from: NodeId, to: ParamId) -> Result<bool> {
        self.entry(from)?;
        if self.param(to).is_none() {
            return Err(AutomationError::UnknownParam(to));
        }
        if self.active_inputs.contains(&(from, to)) {
            return Ok(false);
        }
        self.active_inputs.push((from, to));
        Ok(true)
    }

    /// Returns `false` if there was no such connection.
    pub fn disconnect(&mut self, from: NodeId, to: ParamId) -> bool {
        let before = self.active_inputs.len();
        self.active_inputs.retain(|edge| *edge != (from, to));
        self.active_inputs.len() != before
    }

    pub fn active_inputs(&self, param: ParamId) -> impl Iterator<Item = NodeId> + '_ {
        self.active_inputs
            .iter()
            .filter(move |(_, to)| *to == param)
            .map(|(from, _)| *from)
    }

    pub fn has_active_input(&self, param: ParamId) -> bool {
        self.active_inputs.iter().any(|(_, to)| *to == param)
    }

    /// Fill `out` with one value per frame starting at `start_time`.
    pub fn render(
        &self,
        param: ParamId,
        start_time: f64,
        sample_rate: f64,
        out: &mut [f32],
    ) -> Result<()> {
        let param = self.param(param).ok_or(AutomationError::UnknownParam(param))?;
        for (i, sample) in out.iter_mut().enumerate() {
            *sample = param.value_at(start_time + i as f64 / sample_rate) as f32;
        }
        Ok(())
    }

    /// Advance every parameter's clock to `time`, compacting history.
    pub fn flush(&mut self, time: f64) {
        for param in self.params.iter_mut().flatten() {
            param.flush(time);
        }
    }

    fn entry(&self, node: NodeId) -> Result<&NodeEntry> {
        self.nodes
            .get(node.index())
            .and_then(Option::as_ref)
            .ok_or(AutomationError::UnknownNode(node))
    }

    fn entry_mut(&mut self, node: NodeId) -> Result<&mut NodeEntry> {
        self.nodes
            .get_mut(node.index())
            .and_then(Option::as_mut)
            .ok_or(AutomationError::UnknownNode(node))
    }
}
