//! Named parameters for custom post-processing passes.
//!
//! A [`ParamSet`] is an ordered list of `name -> value` pairs. Order matters:
//! the GPU backend packs the set into a uniform buffer in insertion order,
//! using std140-style alignment.
//!
//! ```ignore
//! let mut lensing = ParamSet::new();
//! lensing.set("center", Vec2::new(0.5, 0.5));
//! lensing.set("radius", 0.15);
//! post.set_custom_pass_params("lensing", &lensing);
//! ```

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Supported parameter value types.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    F32(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
}

impl ParamValue {
    /// Byte size without trailing padding.
    pub fn byte_size(&self) -> usize {
        match self {
            ParamValue::F32(_) => 4,
            ParamValue::Vec2(_) => 8,
            ParamValue::Vec3(_) => 12,
            ParamValue::Vec4(_) => 16,
        }
    }

    /// std140 alignment.
    pub fn alignment(&self) -> usize {
        match self {
            ParamValue::F32(_) => 4,
            ParamValue::Vec2(_) => 8,
            ParamValue::Vec3(_) | ParamValue::Vec4(_) => 16,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ParamValue::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<Vec2> {
        match self {
            ParamValue::Vec2(v) => Some(*v),
            _ => None,
        }
    }

    fn write_bytes(&self, buf: &mut Vec<u8>) {
        match self {
            ParamValue::F32(v) => buf.extend_from_slice(bytemuck::bytes_of(v)),
            ParamValue::Vec2(v) => buf.extend_from_slice(bytemuck::bytes_of(v)),
            ParamValue::Vec3(v) => buf.extend_from_slice(bytemuck::bytes_of(v)),
            ParamValue::Vec4(v) => buf.extend_from_slice(bytemuck::bytes_of(v)),
        }
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::F32(v)
    }
}

impl From<Vec2> for ParamValue {
    fn from(v: Vec2) -> Self {
        ParamValue::Vec2(v)
    }
}

impl From<Vec3> for ParamValue {
    fn from(v: Vec3) -> Self {
        ParamValue::Vec3(v)
    }
}

impl From<Vec4> for ParamValue {
    fn from(v: Vec4) -> Self {
        ParamValue::Vec4(v)
    }
}

/// Ordered, named parameter values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamSet {
    values: Vec<(String, ParamValue)>,
    indices: HashMap<String, usize>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set`](Self::set).
    pub fn with<V: Into<ParamValue>>(mut self, name: &str, value: V) -> Self {
        self.set(name, value);
        self
    }

    /// Add or overwrite a value. New names go to the end.
    pub fn set<V: Into<ParamValue>>(&mut self, name: &str, value: V) {
        let value = value.into();
        if let Some(&idx) = self.indices.get(name) {
            self.values[idx].1 = value;
        } else {
            self.indices.insert(name.to_string(), self.values.len());
            self.values.push((name.to_string(), value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.indices.get(name).map(|&idx| &self.values[idx].1)
    }

    pub fn get_f32(&self, name: &str) -> Option<f32> {
        self.get(name).and_then(ParamValue::as_f32)
    }

    pub fn get_vec2(&self, name: &str) -> Option<Vec2> {
        self.get(name).and_then(ParamValue::as_vec2)
    }

    /// Overwrite or append every value of `other`.
    pub fn merge(&mut self, other: &ParamSet) {
        for (name, value) in other.iter() {
            self.set(name, *value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Pack into a uniform-buffer byte layout, padded to 16 bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for (_, value) in &self.values {
            let align = value.alignment();
            buf.resize(buf.len().next_multiple_of(align), 0);
            value.write_bytes(&mut buf);
        }
        let padded = buf.len().next_multiple_of(16).max(16);
        buf.resize(padded, 0);
        buf
    }
}

impl Serialize for ParamSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ParamSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<(String, ParamValue)>::deserialize(deserializer)?;
        let mut set = ParamSet::new();
        for (name, value) in values {
            set.set(&name, value);
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overwrites_in_place() {
        let mut p = ParamSet::new();
        p.set("a", 1.0);
        p.set("b", Vec2::ONE);
        p.set("a", 2.0);
        assert_eq!(p.len(), 2);
        assert_eq!(p.get_f32("a"), Some(2.0));
        let names: Vec<_> = p.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_typed_getters() {
        let p = ParamSet::new().with("center", Vec2::new(0.5, 0.5));
        assert_eq!(p.get_vec2("center"), Some(Vec2::new(0.5, 0.5)));
        assert_eq!(p.get_f32("center"), None);
        assert_eq!(p.get_f32("missing"), None);
    }

    #[test]
    fn test_merge() {
        let mut base = ParamSet::new().with("radius", 0.15).with("strength", 0.1);
        base.merge(&ParamSet::new().with("strength", 0.4).with("spin", 1.0));
        assert_eq!(base.get_f32("radius"), Some(0.15));
        assert_eq!(base.get_f32("strength"), Some(0.4));
        assert_eq!(base.get_f32("spin"), Some(1.0));
    }

    #[test]
    fn test_byte_layout() {
        let p = ParamSet::new()
            .with("center", Vec2::new(0.5, 0.25))
            .with("radius", 0.15)
            .with("tint", Vec3::ONE);
        let bytes = p.to_bytes();
        // vec2 at 0, f32 at 8, vec3 aligned to 16
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[8..12], &0.15f32.to_le_bytes());
        assert_eq!(&bytes[16..20], &1.0f32.to_le_bytes());
        assert_eq!(ParamSet::new().to_bytes().len(), 16);
    }

    #[test]
    fn test_json_keeps_order() {
        let p = ParamSet::new().with("z", 1.0).with("a", 2.0);
        let json = serde_json::to_string(&p).unwrap();
        let back: ParamSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
