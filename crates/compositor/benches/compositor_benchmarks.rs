//! Compositor benchmarks.

use common::color::{BlendMethod, Color};
use common::geometry::{Point, Rect};
use compositor::layers::{BlurLayer, CircleLayer, RectangleLayer, ZoomLayer};
use compositor::{Canvas, Layer, LayerRef, RenderConfig, Renderer};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use render::{NullProgress, RendDesc, Surface};
use std::sync::Arc;

fn stack(depth: usize) -> Canvas {
    let mut canvas = Canvas::new();
    for i in 0..depth {
        let offset = (i % 7) as f64 * 0.1;
        let layer: LayerRef = if i % 5 == 4 {
            Arc::new(ZoomLayer::new(Point::ZERO, 0.01))
        } else {
            let mut rect =
                RectangleLayer::new(Rect::new(-1.0 + offset, -1.0, 1.0, 1.0 - offset), Color::RED);
            rect.set_param("amount", 0.5.into()).ok();
            rect.set_param("blend_method", BlendMethod::Screen.into()).ok();
            Arc::new(rect)
        };
        canvas.push_back(layer);
    }
    canvas
}

/// Benchmark point sampling through deep stacks.
fn bench_get_color(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_color");

    for depth in [10, 100, 1000].iter() {
        let canvas = stack(*depth);
        group.bench_with_input(BenchmarkId::new("depth", depth), depth, |b, _| {
            b.iter(|| black_box(canvas.get_color(black_box(Point::new(0.25, 0.25)))))
        });
    }

    group.finish();
}

/// Benchmark full-frame rendering.
fn bench_render(c: &mut Criterion) {
    let mut canvas = Canvas::new();
    canvas.push_back(Arc::new(BlurLayer::new(0.05)));
    canvas.push_back(Arc::new(CircleLayer::new(Point::ZERO, 1.0, Color::GREEN)));
    canvas.push_back(Arc::new(RectangleLayer::new(Rect::new(-2.0, -1.0, 1.0, 2.0), Color::BLUE)));
    let desc = RendDesc::new(256, 256, Point::new(-2.0, 2.0), Point::new(2.0, -2.0));

    let mut group = c.benchmark_group("render");

    group.bench_function("untiled", |b| {
        b.iter(|| {
            let mut surface = Surface::for_desc(&desc);
            canvas.render(&mut surface, 3, &desc, &NullProgress).ok();
            black_box(surface)
        })
    });

    for tile_size in [32, 64, 128].iter() {
        let renderer = match Renderer::new(RenderConfig::new().with_tile_size(*tile_size)) {
            Ok(renderer) => renderer,
            Err(_) => continue,
        };
        group.bench_with_input(BenchmarkId::new("tiled", tile_size), tile_size, |b, _| {
            b.iter(|| black_box(renderer.render(&canvas, &desc, &NullProgress).ok()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_get_color, bench_render);
criterion_main!(benches);
