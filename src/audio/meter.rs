use std::collections::VecDeque;

/// Number of bars in the rolling display
pub const METER_WIDTH: usize = 64;

/// Lowest level reported, keeps a bar visible at rest
pub const METER_FLOOR: u8 = 8;

pub const METER_CEIL: u8 = 100;

/// Map a float sample onto the unsigned byte scale of an analyser tap (midpoint 128)
fn to_byte(sample: f32) -> u8 {
    let scaled = (128.0 * (1.0 + sample)).floor();
    if scaled.is_nan() {
        return 128;
    }
    scaled.clamp(0.0, 255.0) as u8
}

/// Level of one block: mean absolute deviation from the byte midpoint, clamped to [8, 100]
pub fn block_level(samples: &[f32]) -> u8 {
    if samples.is_empty() {
        return METER_FLOOR;
    }

    let sum: u64 = samples
        .iter()
        .map(|&s| u64::from((i16::from(to_byte(s)) - 128).unsigned_abs()))
        .sum();
    let energy = sum / samples.len() as u64;

    energy.clamp(u64::from(METER_FLOOR), u64::from(METER_CEIL)) as u8
}

/// Fixed-width rolling window of levels for live visualization
#[derive(Debug, Clone)]
pub struct LevelMeter {
    levels: VecDeque<u8>,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self {
            levels: std::iter::repeat(METER_FLOOR).take(METER_WIDTH).collect(),
        }
    }

    /// Push the level of the most recent block, dropping the oldest entry
    pub fn tick(&mut self, block: &[f32]) -> u8 {
        let level = block_level(block);
        self.levels.pop_front();
        self.levels.push_back(level);
        level
    }

    pub fn reset(&mut self) {
        self.levels.iter_mut().for_each(|l| *l = METER_FLOOR);
    }

    pub fn levels(&self) -> Vec<u8> {
        self.levels.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// One-line bar rendering, one glyph per entry
    pub fn render(&self) -> String {
        const GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
        self.levels
            .iter()
            .map(|&l| {
                let idx = (usize::from(l) * GLYPHS.len()).saturating_sub(1) / usize::from(METER_CEIL);
                GLYPHS[idx.min(GLYPHS.len() - 1)]
            })
            .collect()
    }
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new()
    }
}
