//! Tunable scene parameters for a UI layer.
//!
//! A scene describes its knobs as a [`ControlPanel`]: sliders for `f32`
//! fields, toggles for `bool` fields, and buttons for one-shot actions. A UI
//! reads the panel, draws whatever widgets it likes, and writes values back
//! through [`Controls::set_control`] or fires actions through
//! [`Scene::trigger`](crate::scene::Scene::trigger).
//!
//! Most implementations are derived:
//!
//! ```ignore
//! #[derive(Controls)]
//! #[controls(title = "Dark Matter Flow")]
//! struct FlowParams {
//!     #[control(label = "Flow Intensity", min = 0.0, max = 3.0, step = 0.1)]
//!     flow_intensity: f32,
//!     #[control(label = "Paused")]
//!     paused: bool,
//! }
//! ```

use thiserror::Error;

/// Widget shape of a control.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlKind {
    Slider { min: f32, max: f32, step: f32 },
    Toggle,
    Button,
}

/// A value written to or read from a control.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlValue {
    Number(f32),
    Toggle(bool),
}

impl ControlValue {
    pub fn as_f32(self) -> Option<f32> {
        match self {
            ControlValue::Number(v) => Some(v),
            ControlValue::Toggle(_) => None,
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            ControlValue::Toggle(v) => Some(v),
            ControlValue::Number(_) => None,
        }
    }
}

impl From<f32> for ControlValue {
    fn from(v: f32) -> Self {
        ControlValue::Number(v)
    }
}

impl From<bool> for ControlValue {
    fn from(v: bool) -> Self {
        ControlValue::Toggle(v)
    }
}

/// One control and its current value. Buttons have no value.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: ControlKind,
    pub value: Option<ControlValue>,
}

/// Ordered description of a scene's controls.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ControlPanel {
    pub title: &'static str,
    pub controls: Vec<ControlSpec>,
}

impl ControlPanel {
    pub fn new(title: &'static str) -> Self {
        Self {
            title,
            controls: Vec::new(),
        }
    }

    /// Append a button that fires the scene action `name`.
    pub fn with_button(mut self, name: &'static str, label: &'static str) -> Self {
        self.controls.push(ControlSpec {
            name,
            label,
            kind: ControlKind::Button,
            value: None,
        });
        self
    }

    pub fn get(&self, name: &str) -> Option<&ControlSpec> {
        self.controls.iter().find(|c| c.name == name)
    }

    /// Names of all buttons, in order.
    pub fn actions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.controls
            .iter()
            .filter(|c| c.kind == ControlKind::Button)
            .map(|c| c.name)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ControlError {
    #[error("no control named '{0}'")]
    Unknown(String),

    #[error("control '{name}' expects a {expected} value")]
    TypeMismatch { name: String, expected: &'static str },
}

/// Something with tunable controls.
pub trait Controls {
    fn control_panel(&self) -> ControlPanel;

    /// Write a value. Slider values are clamped into range.
    fn set_control(&mut self, name: &str, value: ControlValue) -> Result<(), ControlError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buttons_are_actions() {
        let panel = ControlPanel::new("Quantum")
            .with_button("excite", "Excite State")
            .with_button("relax", "Relax State");
        assert_eq!(panel.actions().collect::<Vec<_>>(), ["excite", "relax"]);
        assert_eq!(panel.get("relax").unwrap().label, "Relax State");
        assert!(panel.get("collapse").is_none());
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(ControlValue::from(0.5).as_f32(), Some(0.5));
        assert_eq!(ControlValue::from(true).as_f32(), None);
        assert_eq!(ControlValue::from(true).as_bool(), Some(true));
    }
}
