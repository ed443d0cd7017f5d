//! Host-side registry of plugin UI controls.
//!
//! Plugins never own control state. They register a slider or checkbox while
//! being created and get back a [`ControlHandle`]; the UI writes new values
//! through the registry and the plugin polls them once per frame.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{BobError, RegistrationError, Result};

/// Opaque identifier of a registered control.
///
/// The integer form is what crosses the module boundary. Ids are handed out
/// in increasing order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ControlHandle(i32);

impl ControlHandle {
    /// Sentinel used by raw bindings to signal a failed registration.
    pub const INVALID: ControlHandle = ControlHandle(-1);

    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for ControlHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifies one created plugin instance inside the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ControlKind {
    FloatSlider { min: f32, max: f32 },
    Checkbox,
}

impl ControlKind {
    fn type_name(&self) -> &'static str {
        match self {
            ControlKind::FloatSlider { .. } => "float slider",
            ControlKind::Checkbox => "checkbox",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ControlValue {
    Float(f32),
    Bool(bool),
}

/// Snapshot of one control, as shown by the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlInfo {
    pub handle: ControlHandle,
    pub name: String,
    pub kind: ControlKind,
    pub value: ControlValue,
}

#[derive(Debug)]
struct Control {
    owner: InstanceId,
    name: String,
    kind: ControlKind,
    value: ControlValue,
    updated: bool,
}

/// Every live control of every live instance.
#[derive(Debug)]
pub struct ControlRegistry {
    capacity: usize,
    next_handle: i32,
    controls: BTreeMap<ControlHandle, Control>,
}

impl ControlRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_handle: 0,
            controls: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn register_float_slider(
        &mut self,
        owner: InstanceId,
        name: &str,
        min: f32,
        max: f32,
        default: f32,
    ) -> Result<ControlHandle> {
        let valid_range = min.is_finite() && max.is_finite() && min <= max;
        if !valid_range || !(min..=max).contains(&default) {
            return Err(RegistrationError::InvalidRange {
                name: name.to_string(),
                min,
                max,
                default,
            }
            .into());
        }

        self.insert(
            owner,
            name,
            ControlKind::FloatSlider { min, max },
            ControlValue::Float(default),
        )
    }

    pub fn register_checkbox(
        &mut self,
        owner: InstanceId,
        name: &str,
        default: bool,
    ) -> Result<ControlHandle> {
        self.insert(owner, name, ControlKind::Checkbox, ControlValue::Bool(default))
    }

    fn insert(
        &mut self,
        owner: InstanceId,
        name: &str,
        kind: ControlKind,
        value: ControlValue,
    ) -> Result<ControlHandle> {
        if name.trim().is_empty() {
            return Err(RegistrationError::EmptyName.into());
        }
        if self.controls.len() >= self.capacity || self.next_handle == i32::MAX {
            return Err(RegistrationError::Exhausted {
                capacity: self.capacity,
            }
            .into());
        }
        if self
            .controls
            .values()
            .any(|control| control.owner == owner && control.name == name)
        {
            return Err(RegistrationError::DuplicateName(name.to_string()).into());
        }

        let handle = ControlHandle(self.next_handle);
        self.next_handle += 1;
        self.controls.insert(
            handle,
            Control {
                owner,
                name: name.to_string(),
                kind,
                value,
                updated: false,
            },
        );
        tracing::debug!(%handle, name, ?kind, "registered control");
        Ok(handle)
    }

    /// Edge-triggered change query on behalf of `owner`; clears the flag.
    pub fn take_updated(&mut self, owner: InstanceId, handle: ControlHandle) -> Result<bool> {
        let control = self.lookup_mut(owner, handle)?;
        Ok(std::mem::take(&mut control.updated))
    }

    pub fn float_value(&self, owner: InstanceId, handle: ControlHandle) -> Result<f32> {
        let control = self.lookup(owner, handle)?;
        match control.value {
            ControlValue::Float(value) => Ok(value),
            ControlValue::Bool(_) => Err(mismatch(handle, "float slider", control)),
        }
    }

    pub fn bool_value(&self, owner: InstanceId, handle: ControlHandle) -> Result<bool> {
        let control = self.lookup(owner, handle)?;
        match control.value {
            ControlValue::Bool(value) => Ok(value),
            ControlValue::Float(_) => Err(mismatch(handle, "checkbox", control)),
        }
    }

    /// UI-side write of a slider; the value is clamped into the slider range.
    pub fn set_float(&mut self, handle: ControlHandle, value: f32) -> Result<()> {
        let control = self.lookup_any_mut(handle)?;
        let ControlKind::FloatSlider { min, max } = control.kind else {
            return Err(mismatch(handle, "float slider", control));
        };
        if !value.is_finite() {
            return Err(BobError::InvalidInput("slider values must be finite"));
        }
        let value = ControlValue::Float(value.clamp(min, max));
        if control.value != value {
            control.value = value;
            control.updated = true;
        }
        Ok(())
    }

    /// UI-side write of a checkbox.
    pub fn set_bool(&mut self, handle: ControlHandle, value: bool) -> Result<()> {
        let control = self.lookup_any_mut(handle)?;
        if control.kind != ControlKind::Checkbox {
            return Err(mismatch(handle, "checkbox", control));
        }
        let value = ControlValue::Bool(value);
        if control.value != value {
            control.value = value;
            control.updated = true;
        }
        Ok(())
    }

    /// Controls registered by `owner`, in registration order.
    pub fn controls_of(&self, owner: InstanceId) -> Vec<ControlInfo> {
        self.controls
            .iter()
            .filter(|(_, control)| control.owner == owner)
            .map(|(handle, control)| ControlInfo {
                handle: *handle,
                name: control.name.clone(),
                kind: control.kind,
                value: control.value,
            })
            .collect()
    }

    /// Finds a control of `owner` by name.
    pub fn find(&self, owner: InstanceId, name: &str) -> Option<ControlHandle> {
        self.controls
            .iter()
            .find(|(_, control)| control.owner == owner && control.name == name)
            .map(|(handle, _)| *handle)
    }

    /// Drops every control of `owner`; their handles become stale at once.
    pub fn release(&mut self, owner: InstanceId) -> usize {
        let before = self.controls.len();
        self.controls.retain(|_, control| control.owner != owner);
        let released = before - self.controls.len();
        tracing::debug!(?owner, released, "released controls");
        released
    }

    fn lookup(&self, owner: InstanceId, handle: ControlHandle) -> Result<&Control> {
        let control = self.lookup_any(handle)?;
        if control.owner != owner {
            return Err(BobError::ForeignHandle(handle));
        }
        Ok(control)
    }

    fn lookup_mut(&mut self, owner: InstanceId, handle: ControlHandle) -> Result<&mut Control> {
        let control = self.lookup_any_mut(handle)?;
        if control.owner != owner {
            return Err(BobError::ForeignHandle(handle));
        }
        Ok(control)
    }

    fn lookup_any(&self, handle: ControlHandle) -> Result<&Control> {
        match self.controls.get(&handle) {
            Some(control) => Ok(control),
            None => Err(self.missing(handle)),
        }
    }

    fn lookup_any_mut(&mut self, handle: ControlHandle) -> Result<&mut Control> {
        let missing = self.missing(handle);
        self.controls.get_mut(&handle).ok_or(missing)
    }

    fn missing(&self, handle: ControlHandle) -> BobError {
        if handle.is_valid() && handle.0 < self.next_handle {
            BobError::StaleHandle(handle)
        } else {
            BobError::UnknownHandle(handle)
        }
    }
}

impl Default for ControlRegistry {
    fn default() -> Self {
        Self::new(64)
    }
}

fn mismatch(handle: ControlHandle, requested: &'static str, control: &Control) -> BobError {
    BobError::ControlTypeMismatch {
        handle,
        requested,
        actual: control.kind.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: InstanceId = InstanceId(1);
    const B: InstanceId = InstanceId(2);

    #[test]
    fn slider_round_trip_is_edge_triggered() {
        let mut registry = ControlRegistry::default();
        let handle = registry.register_float_slider(A, "x", 0.0, 1.0, 0.5).unwrap();

        assert_eq!(registry.float_value(A, handle).unwrap(), 0.5);
        assert!(!registry.take_updated(A, handle).unwrap());

        registry.set_float(handle, 0.75).unwrap();
        assert!(registry.take_updated(A, handle).unwrap());
        assert!(!registry.take_updated(A, handle).unwrap());
        assert_eq!(registry.float_value(A, handle).unwrap(), 0.75);
    }

    #[test]
    fn rewriting_the_same_value_is_not_a_change() {
        let mut registry = ControlRegistry::default();
        let handle = registry.register_checkbox(A, "Red", false).unwrap();
        registry.set_bool(handle, false).unwrap();
        assert!(!registry.take_updated(A, handle).unwrap());
    }

    #[test]
    fn slider_writes_are_clamped() {
        let mut registry = ControlRegistry::default();
        let handle = registry.register_float_slider(A, "gain", -1.0, 1.0, 0.0).unwrap();
        registry.set_float(handle, 4.0).unwrap();
        assert_eq!(registry.float_value(A, handle).unwrap(), 1.0);
        assert!(registry.set_float(handle, f32::NAN).is_err());
    }

    #[test]
    fn wrong_accessor_is_a_checked_error() {
        let mut registry = ControlRegistry::default();
        let slider = registry.register_float_slider(A, "x", 0.0, 1.0, 0.5).unwrap();
        let checkbox = registry.register_checkbox(A, "y", true).unwrap();

        assert!(matches!(
            registry.bool_value(A, slider),
            Err(BobError::ControlTypeMismatch { .. })
        ));
        assert!(matches!(
            registry.float_value(A, checkbox),
            Err(BobError::ControlTypeMismatch { .. })
        ));
        assert!(registry.set_bool(slider, true).is_err());
        assert!(registry.set_float(checkbox, 0.1).is_err());
    }

    #[test]
    fn rejects_bad_registrations() {
        let mut registry = ControlRegistry::new(2);
        assert!(matches!(
            registry.register_checkbox(A, "  ", false),
            Err(BobError::Registration(RegistrationError::EmptyName))
        ));
        assert!(matches!(
            registry.register_float_slider(A, "x", 1.0, 0.0, 0.5),
            Err(BobError::Registration(RegistrationError::InvalidRange { .. }))
        ));
        assert!(registry.register_float_slider(A, "x", 0.0, 1.0, 2.0).is_err());
        assert!(registry.register_float_slider(A, "x", 0.0, f32::INFINITY, 0.0).is_err());

        registry.register_checkbox(A, "Red", false).unwrap();
        assert!(matches!(
            registry.register_checkbox(A, "Red", true),
            Err(BobError::Registration(RegistrationError::DuplicateName(_)))
        ));
        // Same name in another instance is fine.
        registry.register_checkbox(B, "Red", false).unwrap();
        assert!(matches!(
            registry.register_checkbox(A, "Green", false),
            Err(BobError::Registration(RegistrationError::Exhausted { capacity: 2 }))
        ));
    }

    #[test]
    fn handles_are_scoped_to_their_instance() {
        let mut registry = ControlRegistry::default();
        let handle = registry.register_checkbox(A, "Red", false).unwrap();
        assert!(matches!(
            registry.bool_value(B, handle),
            Err(BobError::ForeignHandle(_))
        ));
    }

    #[test]
    fn released_handles_are_stale_and_never_reused() {
        let mut registry = ControlRegistry::default();
        let old = registry.register_checkbox(A, "Red", false).unwrap();
        assert_eq!(registry.release(A), 1);

        assert!(matches!(registry.bool_value(A, old), Err(BobError::StaleHandle(_))));
        assert!(matches!(registry.set_bool(old, true), Err(BobError::StaleHandle(_))));

        let new = registry.register_checkbox(B, "Red", false).unwrap();
        assert_ne!(old, new);
        assert!(matches!(
            registry.take_updated(A, ControlHandle::from_raw(99)),
            Err(BobError::UnknownHandle(_))
        ));
        assert!(matches!(
            registry.bool_value(A, ControlHandle::INVALID),
            Err(BobError::UnknownHandle(_))
        ));
    }

    #[test]
    fn lists_controls_per_instance() {
        let mut registry = ControlRegistry::default();
        registry.register_checkbox(A, "Red", false).unwrap();
        registry.register_float_slider(A, "Gain", 0.0, 2.0, 1.0).unwrap();
        registry.register_checkbox(B, "Other", true).unwrap();

        let names: Vec<_> = registry.controls_of(A).into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["Red", "Gain"]);
        assert!(registry.find(A, "Gain").is_some());
        assert!(registry.find(A, "Other").is_none());
    }
}
