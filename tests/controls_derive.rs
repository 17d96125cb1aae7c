//! Integration tests for `#[derive(Controls)]`.
//!
//! These use the derived implementations the way a UI layer would: read the
//! panel, write values back, and check what changed.

use stardrift::controls::{ControlError, ControlKind, ControlValue};
use stardrift::Controls;

#[derive(Controls, Clone, Copy, Debug, PartialEq)]
#[controls(title = "Nebula")]
struct NebulaParams {
    #[control(label = "Density", min = 0.0, max = 2.0, step = 0.1)]
    density: f32,
    #[control(label = "Drift", min = -1.0, max = 1.0)]
    drift: f32,
    #[control(label = "Pulse")]
    pulse: bool,
    // not exposed
    elapsed: f32,
}

impl Default for NebulaParams {
    fn default() -> Self {
        Self {
            density: 1.0,
            drift: 0.0,
            pulse: false,
            elapsed: 0.0,
        }
    }
}

#[derive(Controls, Default)]
struct Untitled {
    #[control(min = 0.0, max = 1.0)]
    gain: f32,
}

// ============================================================================
// Panel
// ============================================================================

#[test]
fn test_panel_lists_annotated_fields_in_order() {
    let panel = NebulaParams::default().control_panel();
    assert_eq!(panel.title, "Nebula");

    let names: Vec<&str> = panel.controls.iter().map(|c| c.name).collect();
    assert_eq!(names, ["density", "drift", "pulse"]);
    assert!(panel.get("elapsed").is_none());
    assert_eq!(panel.actions().count(), 0);
}

#[test]
fn test_panel_reports_kinds_and_values() {
    let params = NebulaParams {
        density: 1.5,
        pulse: true,
        ..NebulaParams::default()
    };
    let panel = params.control_panel();

    let density = panel.get("density").unwrap();
    assert_eq!(density.label, "Density");
    assert_eq!(
        density.kind,
        ControlKind::Slider {
            min: 0.0,
            max: 2.0,
            step: 0.1
        }
    );
    assert_eq!(density.value, Some(ControlValue::Number(1.5)));

    let drift = panel.get("drift").unwrap();
    assert!(matches!(drift.kind, ControlKind::Slider { step, .. } if step == 0.01));

    let pulse = panel.get("pulse").unwrap();
    assert_eq!(pulse.kind, ControlKind::Toggle);
    assert_eq!(pulse.value, Some(ControlValue::Toggle(true)));
}

#[test]
fn test_defaults_for_title_and_label() {
    let panel = Untitled::default().control_panel();
    assert_eq!(panel.title, "Untitled");
    assert_eq!(panel.get("gain").unwrap().label, "gain");
}

// ============================================================================
// Writing values
// ============================================================================

#[test]
fn test_set_control_writes_fields() {
    let mut params = NebulaParams::default();
    params.set_control("density", ControlValue::Number(0.4)).unwrap();
    params.set_control("pulse", ControlValue::Toggle(true)).unwrap();
    assert_eq!(params.density, 0.4);
    assert!(params.pulse);
    assert_eq!(params.elapsed, 0.0);
}

#[test]
fn test_slider_values_are_clamped() {
    let mut params = NebulaParams::default();
    params.set_control("density", ControlValue::Number(9.0)).unwrap();
    assert_eq!(params.density, 2.0);
    params.set_control("drift", ControlValue::Number(-3.0)).unwrap();
    assert_eq!(params.drift, -1.0);
}

#[test]
fn test_wrong_kind_is_rejected() {
    let mut params = NebulaParams::default();
    let before = params;

    let err = params
        .set_control("density", ControlValue::Toggle(true))
        .unwrap_err();
    assert!(matches!(err, ControlError::TypeMismatch { expected: "number", .. }));

    let err = params
        .set_control("pulse", ControlValue::Number(1.0))
        .unwrap_err();
    assert!(matches!(err, ControlError::TypeMismatch { expected: "toggle", .. }));
    assert_eq!(params, before);
}

#[test]
fn test_unknown_and_hidden_fields_are_rejected() {
    let mut params = NebulaParams::default();
    assert_eq!(
        params.set_control("elapsed", ControlValue::Number(1.0)),
        Err(ControlError::Unknown("elapsed".to_string()))
    );
    assert!(params.set_control("nope", ControlValue::Toggle(false)).is_err());
}
