//! Derive macros for stardrift.
//!
//! This crate provides one derive macro:
//!
//! - [`Controls`] - Exposes a struct's tunable fields as a control panel
//!
//! # Usage
//!
//! The macro is re-exported from the main `stardrift` crate. You don't need
//! to add this crate directly:
//!
//! ```ignore
//! use stardrift::prelude::*;
//!
//! #[derive(Controls)]
//! #[controls(title = "Galaxy")]
//! struct GalaxyParams {
//!     #[control(label = "Rotation Speed", min = 0.0, max = 2.0, step = 0.05)]
//!     rotation_speed: f32,
//!     #[control(label = "Orbit Camera")]
//!     orbit_camera: bool,
//!     // not exposed
//!     elapsed: f32,
//! }
//! ```
//!
//! # Field Attributes
//!
//! | Attribute | Applies to | Default |
//! |-----------|------------|---------|
//! | `label = "..."` | any | the field name |
//! | `min = ..` | `f32` | required, an `f32` expression |
//! | `max = ..` | `f32` | required |
//! | `step = ..` | `f32` | `0.01` |
//!
//! `f32` fields become sliders and `bool` fields become toggles. Fields
//! without `#[control]` are left alone.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Expr, Fields, Ident, LitStr, Type};

/// Derive `stardrift::controls::Controls` for a struct.
///
/// # Generated Items
///
/// - `control_panel()` listing every annotated field with its current value
/// - `set_control(name, value)` writing back, clamping slider values into
///   `min..=max` and rejecting values of the wrong kind
///
/// # Errors
///
/// Compilation fails if:
/// - Applied to anything other than a struct with named fields
/// - An annotated field is neither `f32` nor `bool`
/// - An `f32` field is missing `min` or `max`
#[proc_macro_derive(Controls, attributes(control, controls))]
pub fn derive_controls(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

enum FieldKind {
    Slider { min: Expr, max: Expr, step: Expr },
    Toggle,
}

struct ControlField {
    ident: Ident,
    label: LitStr,
    kind: FieldKind,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Controls derive only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Controls derive only supports structs",
            ))
        }
    };

    let mut title = LitStr::new(&name.to_string(), name.span());
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("controls")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("title") {
                title = meta.value()?.parse()?;
                Ok(())
            } else {
                Err(meta.error("expected `title = \"...\"`"))
            }
        })?;
    }

    let mut controls = Vec::new();
    for field in fields {
        let Some(attr) = field.attrs.iter().find(|a| a.path().is_ident("control")) else {
            continue;
        };
        let Some(ident) = field.ident.clone() else {
            continue;
        };

        let mut label = LitStr::new(&ident.to_string(), ident.span());
        let mut min = None;
        let mut max = None;
        let mut step = None;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("label") {
                label = meta.value()?.parse()?;
            } else if meta.path.is_ident("min") {
                min = Some(meta.value()?.parse::<Expr>()?);
            } else if meta.path.is_ident("max") {
                max = Some(meta.value()?.parse::<Expr>()?);
            } else if meta.path.is_ident("step") {
                step = Some(meta.value()?.parse::<Expr>()?);
            } else {
                return Err(meta.error("expected one of `label`, `min`, `max`, `step`"));
            }
            Ok(())
        })?;

        let kind = match type_name(&field.ty).as_deref() {
            Some("f32") => {
                let (Some(min), Some(max)) = (min, max) else {
                    return Err(syn::Error::new_spanned(
                        &ident,
                        "f32 controls need both `min` and `max`",
                    ));
                };
                let step = step.unwrap_or_else(|| syn::parse_quote!(0.01));
                FieldKind::Slider { min, max, step }
            }
            Some("bool") => FieldKind::Toggle,
            _ => {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "Controls fields must be `f32` or `bool`",
                ))
            }
        };

        controls.push(ControlField { ident, label, kind });
    }

    let specs = controls.iter().map(|c| {
        let ident = &c.ident;
        let name = ident.to_string();
        let label = &c.label;
        match &c.kind {
            FieldKind::Slider { min, max, step } => quote! {
                stardrift::controls::ControlSpec {
                    name: #name,
                    label: #label,
                    kind: stardrift::controls::ControlKind::Slider {
                        min: #min,
                        max: #max,
                        step: #step,
                    },
                    value: Some(stardrift::controls::ControlValue::Number(self.#ident)),
                }
            },
            FieldKind::Toggle => quote! {
                stardrift::controls::ControlSpec {
                    name: #name,
                    label: #label,
                    kind: stardrift::controls::ControlKind::Toggle,
                    value: Some(stardrift::controls::ControlValue::Toggle(self.#ident)),
                }
            },
        }
    });

    let setters = controls.iter().map(|c| {
        let ident = &c.ident;
        let name = ident.to_string();
        match &c.kind {
            FieldKind::Slider { min, max, .. } => quote! {
                #name => match value {
                    stardrift::controls::ControlValue::Number(v) => {
                        self.#ident = v.clamp(#min, #max);
                        Ok(())
                    }
                    _ => Err(stardrift::controls::ControlError::TypeMismatch {
                        name: name.to_string(),
                        expected: "number",
                    }),
                }
            },
            FieldKind::Toggle => quote! {
                #name => match value {
                    stardrift::controls::ControlValue::Toggle(v) => {
                        self.#ident = v;
                        Ok(())
                    }
                    _ => Err(stardrift::controls::ControlError::TypeMismatch {
                        name: name.to_string(),
                        expected: "toggle",
                    }),
                }
            },
        }
    });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics stardrift::controls::Controls for #name #ty_generics #where_clause {
            fn control_panel(&self) -> stardrift::controls::ControlPanel {
                stardrift::controls::ControlPanel {
                    title: #title,
                    controls: vec![#(#specs),*],
                }
            }

            fn set_control(
                &mut self,
                name: &str,
                value: stardrift::controls::ControlValue,
            ) -> Result<(), stardrift::controls::ControlError> {
                let _ = &value;
                match name {
                    #(#setters,)*
                    _ => Err(stardrift::controls::ControlError::Unknown(name.to_string())),
                }
            }
        }
    })
}

/// Last path segment of a plain type, e.g. `f32` for `core::primitive::f32`.
fn type_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(path) => path.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}
