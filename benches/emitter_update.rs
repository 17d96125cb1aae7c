//! Benchmarks for the CPU side of a frame.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec3;

use stardrift::emitter::ParticleEmitter;
use stardrift::lifecycle::SceneLifecycleController;
use stardrift::post_process::PostProcessSettings;
use stardrift::render::HeadlessRenderer;
use stardrift::scenes::{self, GalaxyScene};
use stardrift::trails::{TrailManager, TrailOptions};

fn bench_emitter_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("emitter_update");

    for count in [1_000usize, 10_000, 100_000] {
        let mut render = HeadlessRenderer::new();
        let mut emitter = ParticleEmitter::with_seed(count, 7, &mut render).unwrap();
        emitter.set_update_rule(|p, dt| {
            let r = p.position.length().max(0.1);
            let angle = 0.5 / r.sqrt() * dt;
            let (s, c) = angle.sin_cos();
            p.position = Vec3::new(
                p.position.x * c - p.position.z * s,
                p.position.y,
                p.position.x * s + p.position.z * c,
            );
        });

        group.bench_with_input(BenchmarkId::new("update", count), &count, |b, _| {
            b.iter(|| emitter.update(black_box(1.0 / 60.0)))
        });

        group.bench_with_input(BenchmarkId::new("update_flush", count), &count, |b, _| {
            b.iter(|| {
                emitter.update(black_box(1.0 / 60.0));
                emitter.flush(&mut render).unwrap();
            })
        });
    }

    group.finish();
}

fn bench_trails(c: &mut Criterion) {
    let mut render = HeadlessRenderer::new();
    let mut trails = TrailManager::new();
    for i in 0..8 {
        trails
            .create_trail(
                format!("trail_{}", i),
                TrailOptions::default().with_fade_out(true),
                &mut render,
            )
            .unwrap();
    }

    let mut t = 0.0f32;
    c.bench_function("trails_add_and_flush", |b| {
        b.iter(|| {
            t += 0.01;
            for i in 0..8 {
                let point = Vec3::new(t.sin(), i as f32, t.cos());
                trails.update_trail(&format!("trail_{}", i), point);
            }
            trails.flush(&mut render).unwrap();
        })
    });
}

fn bench_scene_switch(c: &mut Criterion) {
    let mut controller =
        SceneLifecycleController::new(HeadlessRenderer::new(), PostProcessSettings::default());
    controller
        .register(scenes::GALAXY, Box::new(GalaxyScene::with_particle_count(10_000)))
        .unwrap();
    controller
        .register(
            scenes::DARK_MATTER_FLOW,
            Box::new(scenes::DarkMatterFlowScene::with_particle_count(10_000)),
        )
        .unwrap();

    c.bench_function("scene_switch", |b| {
        b.iter(|| {
            controller.next_scene().unwrap();
            controller.update(1.0 / 60.0).unwrap();
        })
    });
}

criterion_group!(benches, bench_emitter_update, bench_trails, bench_scene_switch);
criterion_main!(benches);
