use kurbo::{Point, Rect};

use crate::{
    assets::decode::{fit_height, fit_width},
    roster::Roster,
    script::NARRATOR,
};

pub const CANVAS_WIDTH: u32 = 1080;
pub const CANVAS_HEIGHT: u32 = 1920;

pub const BALLOON_WIDTH_RATIO: f64 = 0.9;
/// Every sprite is normalized to this height before slot fitting.
pub const CHARACTER_HEIGHT: u32 = 900;
/// Vertical gap between the balloon and the character row.
pub const STACK_GAP: u32 = 50;
pub const SLOT_FILL_RATIO: f64 = 0.95;
pub const DIMMED_OPACITY: f32 = 0.5;
/// Characters per wrapped balloon line.
pub const WRAP_COLUMNS: usize = 30;

/// Geometry shared by every frame of one script pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageLayout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub balloon: Rect,
    pub character_top: f64,
    pub character_height: u32,
}

impl StageLayout {
    /// Stack the (already scaled) balloon, the gap and the character row, and center the
    /// stack vertically.
    pub fn new(
        canvas_width: u32,
        canvas_height: u32,
        balloon_size: (u32, u32),
        character_height: u32,
    ) -> Self {
        let (bw, bh) = balloon_size;
        let stack = i64::from(bh) + i64::from(STACK_GAP) + i64::from(character_height);
        let balloon_y = (i64::from(canvas_height) - stack).div_euclid(2);
        let balloon_x = (i64::from(canvas_width) - i64::from(bw)).div_euclid(2);
        let balloon = Rect::new(
            balloon_x as f64,
            balloon_y as f64,
            (balloon_x + i64::from(bw)) as f64,
            (balloon_y + i64::from(bh)) as f64,
        );
        Self {
            canvas_width,
            canvas_height,
            balloon,
            character_top: balloon.y1 + f64::from(STACK_GAP),
            character_height,
        }
    }

    /// Scaled balloon size for a canvas: 90% of the width, aspect preserved.
    pub fn balloon_size_for(canvas_width: u32, source: (u32, u32)) -> (u32, u32) {
        let target = (f64::from(canvas_width) * BALLOON_WIDTH_RATIO) as u32;
        fit_width(source.0, source.1, target)
    }

    /// Sprite size after normalizing to the character height.
    pub fn normalized_sprite_size(&self, source: (u32, u32)) -> (u32, u32) {
        fit_height(source.0, source.1, self.character_height)
    }

    pub fn slot_width(&self, count: usize) -> u32 {
        if count == 0 {
            return self.canvas_width;
        }
        self.canvas_width / count as u32
    }

    pub fn slot(&self, index: usize, count: usize) -> Rect {
        let w = f64::from(self.slot_width(count));
        let x0 = w * index as f64;
        Rect::new(x0, 0.0, x0 + w, f64::from(self.canvas_height))
    }

    /// Shrink a normalized sprite so it fits in 95% of a slot.
    pub fn fit_to_slot(&self, count: usize, sprite: (u32, u32)) -> (u32, u32) {
        let max_w = (f64::from(self.slot_width(count)) * SLOT_FILL_RATIO) as u32;
        if sprite.0 > max_w {
            fit_width(sprite.0, sprite.1, max_w)
        } else {
            sprite
        }
    }

    /// Top-left corner of a sprite centered in its slot on the character row.
    pub fn sprite_origin(&self, index: usize, count: usize, sprite: (u32, u32)) -> (i64, i64) {
        let slot_w = i64::from(self.slot_width(count));
        let center_x = index as i64 * slot_w + slot_w / 2;
        (center_x - i64::from(sprite.0) / 2, self.character_top as i64)
    }

    pub fn balloon_origin(&self) -> (i64, i64) {
        (self.balloon.x0 as i64, self.balloon.y0 as i64)
    }

    pub fn balloon_center(&self) -> Point {
        self.balloon.center()
    }

    /// Top-left corner that centers a `block` on the balloon center.
    pub fn text_origin(&self, block: (u32, u32)) -> (i64, i64) {
        center_origin(self.balloon_center(), block)
    }
}

/// Top-left corner placing a block of `size` with its center at `center`.
pub fn center_origin(center: Point, size: (u32, u32)) -> (i64, i64) {
    (
        (center.x - f64::from(size.0) / 2.0).round() as i64,
        (center.y - f64::from(size.1) / 2.0).round() as i64,
    )
}

/// Alpha for a roster member on a line: the resolved speaker is fully opaque, everyone
/// else (and everyone on narrator lines) is dimmed.
pub fn member_opacity(speaker: &str, speaking_key: Option<&str>, member: &str) -> f32 {
    if speaker == NARRATOR {
        return DIMMED_OPACITY;
    }
    if speaking_key == Some(member) {
        1.0
    } else {
        DIMMED_OPACITY
    }
}

/// Where and how one roster member is drawn on a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SpritePlacement {
    pub key: String,
    pub slot: usize,
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
    pub opacity: f32,
}

/// Character layer plan for one line.
///
/// `sprite_sizes` holds the slot-fitted size of each roster member in roster order; members
/// without a sprite keep their slot but are not drawn.
pub fn plan_stage(
    layout: &StageLayout,
    roster: &Roster,
    sprite_sizes: &[Option<(u32, u32)>],
    speaker: &str,
    speaking_key: Option<&str>,
) -> Vec<SpritePlacement> {
    let count = roster.len();
    roster
        .members()
        .iter()
        .enumerate()
        .filter_map(|(slot, key)| {
            let (w, h) = sprite_sizes.get(slot).copied().flatten()?;
            let (x, y) = layout.sprite_origin(slot, count, (w, h));
            Some(SpritePlacement {
                key: key.clone(),
                slot,
                x,
                y,
                width: w,
                height: h,
                opacity: member_opacity(speaker, speaking_key, key),
            })
        })
        .collect()
}
