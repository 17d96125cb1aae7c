//! Scalar noise fields sampled by flow-driven scenes.
//!
//! [`NoiseField`] is the only thing scenes depend on; [`ValueNoise`] is a
//! seeded 4D lattice noise (three spatial axes plus time) with quintic
//! smoothing, cheap enough to sample several times per particle per frame.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// A continuous scalar field over space and time, roughly in `-1.0..=1.0`.
pub trait NoiseField {
    fn sample(&self, x: f32, y: f32, z: f32, t: f32) -> f32;
}

impl<N: NoiseField + ?Sized> NoiseField for std::rc::Rc<N> {
    fn sample(&self, x: f32, y: f32, z: f32, t: f32) -> f32 {
        (**self).sample(x, y, z, t)
    }
}

/// Seeded 4D value noise.
#[derive(Clone, Debug)]
pub struct ValueNoise {
    perm: [u8; 512],
    values: [f32; 256],
}

impl ValueNoise {
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut table: [u8; 256] = std::array::from_fn(|i| i as u8);
        table.shuffle(&mut rng);
        let perm = std::array::from_fn(|i| table[i & 255]);
        let values = std::array::from_fn(|_| rng.gen_range(-1.0..=1.0));
        Self { perm, values }
    }

    #[inline]
    fn hash(&self, lattice: [i32; 4]) -> usize {
        let mut h = 0usize;
        for coord in lattice.iter().rev() {
            h = self.perm[h + (coord & 255) as usize] as usize;
        }
        h
    }
}

impl Default for ValueNoise {
    fn default() -> Self {
        Self::new(0x5eed)
    }
}

#[inline]
fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

impl NoiseField for ValueNoise {
    fn sample(&self, x: f32, y: f32, z: f32, t: f32) -> f32 {
        let p = [x, y, z, t];
        let cell = p.map(f32::floor);
        let weight: [f32; 4] = std::array::from_fn(|axis| fade(p[axis] - cell[axis]));

        let mut sum = 0.0;
        for corner in 0..16u32 {
            let mut w = 1.0;
            let mut lattice = [0i32; 4];
            for axis in 0..4 {
                let bit = (corner >> axis) & 1;
                lattice[axis] = cell[axis] as i32 + bit as i32;
                w *= if bit == 1 { weight[axis] } else { 1.0 - weight[axis] };
            }
            sum += w * self.values[self.hash(lattice)];
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_field() {
        let a = ValueNoise::new(7);
        let b = ValueNoise::new(7);
        for i in 0..32 {
            let x = i as f32 * 0.37;
            assert_eq!(a.sample(x, -x, 1.5, 0.2), b.sample(x, -x, 1.5, 0.2));
        }
    }

    #[test]
    fn test_range_and_continuity() {
        let noise = ValueNoise::default();
        let mut prev = noise.sample(0.0, 0.0, 0.0, 0.0);
        for i in 1..2000 {
            let x = i as f32 * 0.001;
            let v = noise.sample(x, 0.3, -2.0, 0.0);
            assert!((-1.0..=1.0).contains(&v));
            assert!((v - prev).abs() < 0.05);
            prev = v;
        }
    }

    #[test]
    fn test_lattice_points_hit_table() {
        let noise = ValueNoise::new(3);
        let v = noise.sample(2.0, 5.0, -1.0, 4.0);
        assert!(noise.values.contains(&v));
    }

    #[test]
    fn test_varies_over_time() {
        let noise = ValueNoise::new(11);
        let samples: Vec<f32> = (0..8).map(|t| noise.sample(0.5, 0.5, 0.5, t as f32 * 0.7)).collect();
        assert!(samples.windows(2).any(|w| w[0] != w[1]));
    }
}
