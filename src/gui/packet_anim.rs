//! Transient packet animations for newly observed relay edges.
//!
//! A `PacketAnimation` is a plain value: `advanced()` returns the next frame's
//! state instead of mutating hidden instance fields. The queue is bounded and
//! compacted once per reconciliation pass so the draw loop stays
//! allocation-free.

use std::collections::VecDeque;

use egui::{Color32, Pos2};
use rand::Rng;

/// Hard cap on simultaneously drawn packets.
pub const MAX_ACTIVE_PACKETS: usize = 64;

/// Per-packet speed range, in progress-per-frame. Drawn once at creation and
/// fixed thereafter.
const SPEED_RANGE: std::ops::Range<f32> = 0.015..0.045;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketAnimation {
    pub from: Pos2,
    pub to: Pos2,
    pub progress: f32,
    pub speed: f32,
    pub color: Color32,
}

impl PacketAnimation {
    pub fn new(from: Pos2, to: Pos2, color: Color32) -> Self {
        Self {
            from,
            to,
            progress: 0.0,
            speed: rand::rng().random_range(SPEED_RANGE),
            color,
        }
    }

    /// Next frame's state; clamps at the end of the edge.
    pub fn advanced(self) -> Self {
        Self {
            progress: (self.progress + self.speed).min(1.0),
            ..self
        }
    }

    pub fn is_done(&self) -> bool {
        self.progress >= 1.0
    }

    /// Current position along the edge.
    pub fn position(&self) -> Pos2 {
        self.from + (self.to - self.from) * self.progress
    }
}

#[derive(Debug)]
pub struct PacketQueue {
    packets: VecDeque<PacketAnimation>,
    cap: usize,
}

impl Default for PacketQueue {
    fn default() -> Self {
        Self::with_cap(MAX_ACTIVE_PACKETS)
    }
}

impl PacketQueue {
    pub fn with_cap(cap: usize) -> Self {
        Self {
            packets: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Append a packet, dropping the oldest entries first when the cap is
    /// exceeded — insertion order, regardless of their progress.
    pub fn push(&mut self, packet: PacketAnimation) {
        while self.packets.len() >= self.cap {
            self.packets.pop_front();
        }
        self.packets.push_back(packet);
    }

    /// Remove finished packets. Called once per reconciliation pass, not per
    /// frame.
    pub fn compact(&mut self) {
        self.packets.retain(|p| !p.is_done());
    }

    /// Draw-pass iteration; the renderer advances each packet in place while
    /// painting it.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PacketAnimation> {
        self.packets.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(progress: f32) -> PacketAnimation {
        PacketAnimation {
            from: Pos2::new(0.0, 0.0),
            to: Pos2::new(100.0, 0.0),
            progress,
            speed: 0.02,
            color: Color32::RED,
        }
    }

    #[test]
    fn test_queue_bound_keeps_most_recent() {
        let mut queue = PacketQueue::with_cap(4);
        for i in 0..10 {
            queue.push(PacketAnimation {
                from: Pos2::new(i as f32, 0.0),
                ..packet(0.0)
            });
        }
        assert_eq!(queue.len(), 4);
        let origins: Vec<f32> = queue.iter_mut().map(|p| p.from.x).collect();
        assert_eq!(origins, vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_advanced_is_pure_and_clamped() {
        let original = packet(0.5);
        let next = original.advanced();
        assert_eq!(original.progress, 0.5);
        assert!((next.progress - 0.52).abs() < f32::EPSILON);
        assert_eq!(next.speed, original.speed);

        let near_end = packet(0.999).advanced();
        assert_eq!(near_end.progress, 1.0);
        assert!(near_end.is_done());
    }

    #[test]
    fn test_compact_removes_done_only() {
        let mut queue = PacketQueue::with_cap(8);
        queue.push(packet(1.0));
        queue.push(packet(0.3));
        queue.push(packet(1.0));
        queue.compact();
        assert_eq!(queue.len(), 1);
        assert!(queue.iter_mut().all(|p| !p.is_done()));
    }

    #[test]
    fn test_speed_drawn_from_bounded_range() {
        for _ in 0..50 {
            let p = PacketAnimation::new(Pos2::ZERO, Pos2::new(1.0, 1.0), Color32::WHITE);
            assert!(SPEED_RANGE.contains(&p.speed));
        }
    }

    #[test]
    fn test_position_interpolates() {
        let p = packet(0.25);
        assert_eq!(p.position(), Pos2::new(25.0, 0.0));
    }
}
