//! Per-axis accumulation of light sweeps.
//!
//! The solver owns two mappings, one per sweep axis, keyed by a channel id
//! (tracker, lighthouse, sensor: whatever the rule chooses). How a sweep
//! changes them is decided by an `UpdateRule`; the default `Unspecified`
//! rule leaves them untouched.

use std::collections::HashMap;

use crate::bag::Handler;
use crate::core::HandlerError;
use crate::msg::{Axis, ViveLight};

/// The two per-axis mappings.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisState<V> {
    horizontal: HashMap<String, V>,
    vertical: HashMap<String, V>,
}

impl<V> Default for AxisState<V> {
    fn default() -> Self {
        Self {
            horizontal: HashMap::new(),
            vertical: HashMap::new(),
        }
    }
}

impl<V> AxisState<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn axis(&self, axis: Axis) -> &HashMap<String, V> {
        match axis {
            Axis::Horizontal => &self.horizontal,
            Axis::Vertical => &self.vertical,
        }
    }

    pub fn axis_mut(&mut self, axis: Axis) -> &mut HashMap<String, V> {
        match axis {
            Axis::Horizontal => &mut self.horizontal,
            Axis::Vertical => &mut self.vertical,
        }
    }

    pub fn horizontal(&self) -> &HashMap<String, V> {
        &self.horizontal
    }

    pub fn vertical(&self) -> &HashMap<String, V> {
        &self.vertical
    }

    pub fn is_empty(&self) -> bool {
        self.horizontal.is_empty() && self.vertical.is_empty()
    }
}

/// How one light sweep updates the solver state.
pub trait UpdateRule {
    /// Value stored per channel.
    type Value;

    fn apply(&mut self, light: &ViveLight, state: &mut AxisState<Self::Value>) -> Result<(), HandlerError>;
}

/// No accumulation rule has been chosen; sweeps are accepted and dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unspecified;

impl UpdateRule for Unspecified {
    type Value = ();

    fn apply(&mut self, _light: &ViveLight, _state: &mut AxisState<()>) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Stateful consumer of `ViveLight` records.
///
/// Usable directly as a `BagReader::read` handler for any context type;
/// the context is passed through untouched.
pub struct Solver<R: UpdateRule = Unspecified> {
    state: AxisState<R::Value>,
    rule: R,
}

impl Solver<Unspecified> {
    pub fn new() -> Self {
        Self::with_rule(Unspecified)
    }
}

impl Default for Solver<Unspecified> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: UpdateRule> Solver<R> {
    pub fn with_rule(rule: R) -> Self {
        Self {
            state: AxisState::new(),
            rule,
        }
    }

    /// Feed one sweep to the rule. `ctx` is opaque to the solver.
    pub fn update<C: ?Sized>(&mut self, light: &ViveLight, _ctx: &mut C) -> Result<(), HandlerError> {
        self.rule.apply(light, &mut self.state)
    }

    pub fn state(&self) -> &AxisState<R::Value> {
        &self.state
    }

    pub fn horizontal(&self) -> &HashMap<String, R::Value> {
        self.state.horizontal()
    }

    pub fn vertical(&self) -> &HashMap<String, R::Value> {
        self.state.vertical()
    }

    pub fn axis(&self, axis: Axis) -> &HashMap<String, R::Value> {
        self.state.axis(axis)
    }

    pub fn rule(&self) -> &R {
        &self.rule
    }

    pub fn into_state(self) -> AxisState<R::Value> {
        self.state
    }
}

impl<R: UpdateRule, C: ?Sized> Handler<ViveLight, C> for Solver<R> {
    fn handle(&mut self, msg: ViveLight, ctx: &mut C) -> Result<(), HandlerError> {
        self.update(&msg, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::{Header, LightSample};

    fn sweep(lighthouse: &str, axis: Axis, sensors: &[u16]) -> ViveLight {
        ViveLight {
            header: Header::new(0, "LHR-1"),
            lighthouse: lighthouse.to_string(),
            axis,
            samples: sensors
                .iter()
                .map(|&sensor| LightSample::from_ticks(sensor, 200_000, 500))
                .collect(),
        }
    }

    /// Counts samples per lighthouse on the sweep's axis.
    struct CountSamples;

    impl UpdateRule for CountSamples {
        type Value = usize;

        fn apply(&mut self, light: &ViveLight, state: &mut AxisState<usize>) -> Result<(), HandlerError> {
            *state.axis_mut(light.axis).entry(light.lighthouse.clone()).or_default() += light.samples.len();
            Ok(())
        }
    }

    #[test]
    fn new_solver_starts_empty() {
        let solver = Solver::new();
        assert!(solver.horizontal().is_empty());
        assert!(solver.vertical().is_empty());
    }

    #[test]
    fn unspecified_rule_has_no_effect() {
        let mut solver = Solver::new();
        solver.update(&sweep("LHB-A", Axis::Horizontal, &[1, 2]), &mut ()).unwrap();
        solver.handle(sweep("LHB-A", Axis::Vertical, &[3]), &mut 5u32).unwrap();
        assert!(solver.state().is_empty());
    }

    #[test]
    fn rule_updates_the_swept_axis_only() {
        let mut solver = Solver::with_rule(CountSamples);
        solver.update(&sweep("LHB-A", Axis::Horizontal, &[1, 2]), &mut ()).unwrap();
        solver.update(&sweep("LHB-A", Axis::Horizontal, &[3]), &mut ()).unwrap();
        solver.update(&sweep("LHB-B", Axis::Vertical, &[4]), &mut ()).unwrap();

        assert_eq!(solver.horizontal().get("LHB-A"), Some(&3));
        assert_eq!(solver.horizontal().get("LHB-B"), None);
        assert_eq!(solver.axis(Axis::Vertical).get("LHB-B"), Some(&1));
    }

    #[test]
    fn rule_errors_propagate() {
        struct Reject;
        impl UpdateRule for Reject {
            type Value = ();
            fn apply(&mut self, _: &ViveLight, _: &mut AxisState<()>) -> Result<(), HandlerError> {
                Err("sweep rejected".into())
            }
        }

        let mut solver = Solver::with_rule(Reject);
        let err = solver.update(&sweep("LHB-A", Axis::Horizontal, &[1]), &mut ()).unwrap_err();
        assert_eq!(err.to_string(), "sweep rejected");
    }
}
