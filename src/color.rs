//! Color helpers for scenes.

use glam::Vec3;

/// Convert a `0xRRGGBB` value to linear-ish RGB in `0.0..=1.0`.
pub fn hex(rgb: u32) -> Vec3 {
    Vec3::new(
        ((rgb >> 16) & 0xff) as f32 / 255.0,
        ((rgb >> 8) & 0xff) as f32 / 255.0,
        (rgb & 0xff) as f32 / 255.0,
    )
}

/// HSL to RGB. Hue wraps, saturation and lightness are clamped.
pub fn hsl(hue: f32, saturation: f32, lightness: f32) -> Vec3 {
    let h = hue.rem_euclid(1.0);
    let s = saturation.clamp(0.0, 1.0);
    let l = lightness.clamp(0.0, 1.0);
    if s == 0.0 {
        return Vec3::splat(l);
    }

    let q = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    Vec3::new(
        hue_to_channel(p, q, h + 1.0 / 3.0),
        hue_to_channel(p, q, h),
        hue_to_channel(p, q, h - 1.0 / 3.0),
    )
}

fn hue_to_channel(p: f32, q: f32, t: f32) -> f32 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * 6.0 * (2.0 / 3.0 - t)
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < 1e-5
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex(0xffffff), Vec3::ONE);
        assert_eq!(hex(0xff0000), Vec3::X);
        assert!(close(hex(0x4b0082), Vec3::new(75.0 / 255.0, 0.0, 130.0 / 255.0)));
    }

    #[test]
    fn test_hsl_primaries() {
        assert!(close(hsl(0.0, 1.0, 0.5), Vec3::X));
        assert!(close(hsl(1.0 / 3.0, 1.0, 0.5), Vec3::Y));
        assert!(close(hsl(2.0 / 3.0, 1.0, 0.5), Vec3::Z));
        assert!(close(hsl(1.0, 1.0, 0.5), Vec3::X));
    }

    #[test]
    fn test_hsl_grey() {
        assert_eq!(hsl(0.3, 0.0, 0.25), Vec3::splat(0.25));
    }
}
