//! Drawing relay plumbing: stroke batching on the way out, replay and undo
//! on the way in.
//!
//! Pointer samples accumulate in a [`StrokeBuffer`] and ship as a batch at a
//! fixed size or on pen-up, whichever comes first. Flood fills are never
//! batched: they travel immediately as a single zero-size sentinel stroke
//! and are replayed by re-running the identical fill algorithm on the
//! receiving side, so no pixel data ever crosses the wire. Undo is a relayed
//! control event: every client keeps its own bounded ring of raster
//! snapshots and pops one on receipt.
//!
//! The rendering surface itself is a collaborator behind [`DrawingSurface`];
//! [`Raster`] is the reference implementation used by tests and the headless
//! binaries.

use std::collections::VecDeque;

use shared::protocol::{Stroke, StrokeBatch};
use shared::{now_millis, STROKE_BATCH_SIZE, UNDO_HISTORY_LIMIT};

/// Background color of a fresh canvas.
pub const CANVAS_BACKGROUND: u32 = 0x00ff_ffff;

/// A relayed drawing event, decoded from the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawingEvent {
    /// The drawer put the pen down.
    Start,
    /// A single stroke, or the flood-fill sentinel.
    Stroke(Stroke),
    /// A buffered run of strokes.
    Batch(StrokeBatch),
    /// Pop one snapshot from the undo history.
    Undo,
}

/// Accumulates local pointer samples into wire batches.
#[derive(Debug, Default)]
pub struct StrokeBuffer {
    pending: Vec<Stroke>,
}

impl StrokeBuffer {
    pub fn new() -> Self {
        StrokeBuffer::default()
    }

    /// Adds a sample; returns a batch once the size threshold is reached.
    pub fn push(&mut self, stroke: Stroke) -> Option<StrokeBatch> {
        self.pending.push(stroke);
        if self.pending.len() >= STROKE_BATCH_SIZE {
            self.flush()
        } else {
            None
        }
    }

    /// Drains whatever is pending (pen-up path); `None` when empty.
    pub fn flush(&mut self) -> Option<StrokeBatch> {
        if self.pending.is_empty() {
            return None;
        }
        Some(StrokeBatch {
            strokes: std::mem::take(&mut self.pending),
            captured_at_ms: now_millis(),
        })
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// The narrow interface to the rendering collaborator.
pub trait DrawingSurface {
    fn apply_stroke(&mut self, stroke: &Stroke);
    fn flood_fill(&mut self, x: i32, y: i32, color: u32);
    fn snapshot(&self) -> Vec<u32>;
    fn restore(&mut self, snapshot: &[u32]);
}

/// Reference pixel-grid surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: i32,
    height: i32,
    pixels: Vec<u32>,
}

impl Raster {
    pub fn new(width: i32, height: i32) -> Self {
        Raster {
            width,
            height,
            pixels: vec![CANVAS_BACKGROUND; (width * height) as usize],
        }
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<u32> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[(y * self.width + x) as usize])
    }

    fn set(&mut self, x: i32, y: i32, color: u32) {
        if x >= 0 && y >= 0 && x < self.width && y < self.height {
            self.pixels[(y * self.width + x) as usize] = color;
        }
    }

    /// Stamps a square brush of the given size along the segment.
    fn draw_line(&mut self, from: (i32, i32), to: (i32, i32), color: u32, size: u32) {
        let radius = (size / 2) as i32;
        let dx = to.0 - from.0;
        let dy = to.1 - from.1;
        let steps = dx.abs().max(dy.abs()).max(1);

        for step in 0..=steps {
            let x = from.0 + dx * step / steps;
            let y = from.1 + dy * step / steps;
            for oy in -radius..=radius {
                for ox in -radius..=radius {
                    self.set(x + ox, y + oy, color);
                }
            }
        }
    }
}

impl DrawingSurface for Raster {
    fn apply_stroke(&mut self, stroke: &Stroke) {
        let color = if stroke.is_eraser {
            CANVAS_BACKGROUND
        } else {
            stroke.color
        };
        self.draw_line(
            (stroke.last_x, stroke.last_y),
            (stroke.x, stroke.y),
            color,
            stroke.size.max(1),
        );
    }

    /// Scanline flood fill; identical on every peer so a relayed fill origin
    /// reproduces the same pixels everywhere.
    fn flood_fill(&mut self, x: i32, y: i32, color: u32) {
        let Some(target) = self.pixel(x, y) else {
            return;
        };
        if target == color {
            return;
        }

        let mut stack = vec![(x, y)];
        while let Some((x, y)) = stack.pop() {
            let mut cx = x;
            while self.pixel(cx, y) == Some(target) {
                cx -= 1;
            }
            cx += 1;

            let mut span_above = false;
            let mut span_below = false;
            while self.pixel(cx, y) == Some(target) {
                self.set(cx, y, color);

                if self.pixel(cx, y - 1) == Some(target) {
                    if !span_above {
                        stack.push((cx, y - 1));
                        span_above = true;
                    }
                } else {
                    span_above = false;
                }

                if self.pixel(cx, y + 1) == Some(target) {
                    if !span_below {
                        stack.push((cx, y + 1));
                        span_below = true;
                    }
                } else {
                    span_below = false;
                }

                cx += 1;
            }
        }
    }

    fn snapshot(&self) -> Vec<u32> {
        self.pixels.clone()
    }

    fn restore(&mut self, snapshot: &[u32]) {
        if snapshot.len() == self.pixels.len() {
            self.pixels.copy_from_slice(snapshot);
        }
    }
}

/// Replays relayed drawing events against a surface and keeps the bounded
/// undo history of raster snapshots.
pub struct CanvasRelay<S: DrawingSurface> {
    surface: S,
    history: VecDeque<Vec<u32>>,
}

impl<S: DrawingSurface> CanvasRelay<S> {
    pub fn new(surface: S) -> Self {
        CanvasRelay {
            surface,
            history: VecDeque::new(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn history_depth(&self) -> usize {
        self.history.len()
    }

    pub fn apply(&mut self, event: &DrawingEvent) {
        match event {
            DrawingEvent::Start => self.begin_stroke(),
            DrawingEvent::Stroke(stroke) => self.apply_stroke(stroke),
            DrawingEvent::Batch(batch) => {
                for stroke in &batch.strokes {
                    self.apply_stroke(stroke);
                }
            }
            DrawingEvent::Undo => self.undo(),
        }
    }

    /// Pushes an undo snapshot, evicting the oldest past the ring limit.
    pub fn begin_stroke(&mut self) {
        self.history.push_back(self.surface.snapshot());
        while self.history.len() > UNDO_HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    /// Restores the most recent snapshot, if any.
    pub fn undo(&mut self) {
        if let Some(snapshot) = self.history.pop_back() {
            self.surface.restore(&snapshot);
        }
    }

    fn apply_stroke(&mut self, stroke: &Stroke) {
        if stroke.is_fill() {
            self.surface.flood_fill(stroke.x, stroke.y, stroke.color);
        } else {
            self.surface.apply_stroke(stroke);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(i: i32) -> Stroke {
        Stroke {
            x: i,
            y: i,
            last_x: i - 1,
            last_y: i - 1,
            color: 0,
            size: 2,
            is_eraser: false,
        }
    }

    #[test]
    fn buffer_flushes_at_threshold() {
        let mut buffer = StrokeBuffer::new();
        for i in 0..4 {
            assert!(buffer.push(sample(i)).is_none());
        }
        let batch = buffer.push(sample(4)).expect("fifth sample flushes");
        assert_eq!(batch.strokes.len(), STROKE_BATCH_SIZE);
        assert!(buffer.is_empty());
    }

    #[test]
    fn buffer_flushes_remainder_on_pen_up() {
        let mut buffer = StrokeBuffer::new();
        buffer.push(sample(0));
        buffer.push(sample(1));

        let batch = buffer.flush().expect("partial batch on pen-up");
        assert_eq!(batch.strokes.len(), 2);
        assert!(buffer.flush().is_none());
    }

    #[test]
    fn buffer_preserves_sample_order() {
        let mut buffer = StrokeBuffer::new();
        for i in 0..3 {
            buffer.push(sample(i));
        }
        let batch = buffer.flush().unwrap();
        let xs: Vec<i32> = batch.strokes.iter().map(|s| s.x).collect();
        assert_eq!(xs, vec![0, 1, 2]);
    }

    #[test]
    fn stroke_paints_pixels() {
        let mut raster = Raster::new(20, 20);
        raster.apply_stroke(&Stroke {
            x: 10,
            y: 10,
            last_x: 5,
            last_y: 10,
            color: 0x00ff_0000,
            size: 1,
            is_eraser: false,
        });

        for x in 5..=10 {
            assert_eq!(raster.pixel(x, 10), Some(0x00ff_0000));
        }
        assert_eq!(raster.pixel(4, 10), Some(CANVAS_BACKGROUND));
    }

    #[test]
    fn eraser_restores_background() {
        let mut raster = Raster::new(20, 20);
        raster.apply_stroke(&Stroke {
            x: 10,
            y: 10,
            last_x: 5,
            last_y: 10,
            color: 0x00ff_0000,
            size: 1,
            is_eraser: false,
        });
        raster.apply_stroke(&Stroke {
            x: 10,
            y: 10,
            last_x: 5,
            last_y: 10,
            color: 0x0000_00ff,
            size: 1,
            is_eraser: true,
        });

        for x in 5..=10 {
            assert_eq!(raster.pixel(x, 10), Some(CANVAS_BACKGROUND));
        }
    }

    #[test]
    fn strokes_clip_at_the_edges() {
        let mut raster = Raster::new(10, 10);
        raster.apply_stroke(&Stroke {
            x: 15,
            y: 5,
            last_x: -5,
            last_y: 5,
            color: 0x1,
            size: 3,
            is_eraser: false,
        });
        assert_eq!(raster.pixel(0, 5), Some(0x1));
        assert_eq!(raster.pixel(9, 5), Some(0x1));
    }

    #[test]
    fn flood_fill_stays_inside_boundary() {
        let mut raster = Raster::new(12, 12);
        // A vertical wall at x=6 splits the canvas.
        for y in 0..12 {
            raster.set(6, y, 0x00_0000);
        }

        raster.flood_fill(2, 2, 0x00ff_0000);

        assert_eq!(raster.pixel(0, 0), Some(0x00ff_0000));
        assert_eq!(raster.pixel(5, 11), Some(0x00ff_0000));
        assert_eq!(raster.pixel(6, 5), Some(0x00_0000));
        assert_eq!(raster.pixel(7, 5), Some(CANVAS_BACKGROUND));
        assert_eq!(raster.pixel(11, 11), Some(CANVAS_BACKGROUND));
    }

    #[test]
    fn flood_fill_is_noop_on_same_color_or_out_of_bounds() {
        let mut raster = Raster::new(4, 4);
        let before = raster.snapshot();
        raster.flood_fill(1, 1, CANVAS_BACKGROUND);
        raster.flood_fill(-1, 0, 0x1);
        raster.flood_fill(99, 99, 0x1);
        assert_eq!(raster.snapshot(), before);
    }

    #[test]
    fn relayed_fill_reproduces_identical_pixels() {
        let wall = |raster: &mut Raster| {
            for y in 0..16 {
                raster.set(8, y, 0x00_0000);
            }
        };

        let mut drawer = Raster::new(16, 16);
        wall(&mut drawer);
        let mut viewer = Raster::new(16, 16);
        wall(&mut viewer);

        // The drawer fills locally and the sentinel stroke replays the same
        // fill remotely.
        drawer.flood_fill(3, 3, 0x0000_ff00);
        let sentinel = Stroke::fill(3, 3, 0x0000_ff00);
        let mut relay = CanvasRelay::new(viewer);
        relay.apply(&DrawingEvent::Stroke(sentinel));

        assert_eq!(relay.surface(), &drawer);
    }

    #[test]
    fn undo_restores_previous_snapshot() {
        let mut relay = CanvasRelay::new(Raster::new(8, 8));

        relay.apply(&DrawingEvent::Start);
        relay.apply(&DrawingEvent::Stroke(Stroke {
            x: 4,
            y: 4,
            last_x: 1,
            last_y: 4,
            color: 0xff,
            size: 1,
            is_eraser: false,
        }));
        assert_eq!(relay.surface().pixel(2, 4), Some(0xff));

        relay.apply(&DrawingEvent::Undo);
        assert_eq!(relay.surface().pixel(2, 4), Some(CANVAS_BACKGROUND));
    }

    #[test]
    fn undo_history_is_bounded() {
        let mut relay = CanvasRelay::new(Raster::new(4, 4));
        for _ in 0..50 {
            relay.apply(&DrawingEvent::Start);
        }
        assert_eq!(relay.history_depth(), UNDO_HISTORY_LIMIT);
    }

    #[test]
    fn undo_with_empty_history_is_noop() {
        let mut relay = CanvasRelay::new(Raster::new(4, 4));
        let before = relay.surface().snapshot();
        relay.apply(&DrawingEvent::Undo);
        assert_eq!(relay.surface().snapshot(), before);
    }

    #[test]
    fn batch_applies_all_strokes() {
        let mut relay = CanvasRelay::new(Raster::new(32, 32));
        let batch = StrokeBatch {
            strokes: (1..=5)
                .map(|i| Stroke {
                    x: i * 5,
                    y: 16,
                    last_x: (i - 1) * 5,
                    last_y: 16,
                    color: 0xab,
                    size: 1,
                    is_eraser: false,
                })
                .collect(),
            captured_at_ms: 0,
        };

        relay.apply(&DrawingEvent::Batch(batch));
        for x in 0..=25 {
            assert_eq!(relay.surface().pixel(x, 16), Some(0xab));
        }
    }
}
