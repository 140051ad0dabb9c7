//! Dot-accurate BG/window fetcher, sprite fetcher, and the FIFO renderer
//! state machine that drives them (spec §4.7, SPEC_FULL §11.4). Grounded
//! in the teacher's `ppu/background_fetcher.rs` (BG fetch state machine,
//! dummy-fetch convention) and in `gb-core/ppu/sprite_fetcher.rs` (the
//! sibling crate's sprite-fetch step timing, since this teacher's own
//! `sprite_fetcher.rs` was not present in the retrieved copy); both are
//! generalized here for CGB tile/OBJ attributes.

use arrayvec::ArrayVec;

use crate::lcd::fifos::{BackgroundAttributes, Fifos, RenderedPixel};
use crate::lcd::sprites::ObjectAttribute;
use crate::lcd::window::WindowCheck;

#[derive(Clone, Copy, Default)]
pub struct TileAttributes {
    pub palette: u8,
    pub vram_bank: u8,
    pub x_flip: bool,
    pub y_flip: bool,
    pub priority: bool,
}

impl TileAttributes {
    pub fn from_byte(byte: u8) -> Self {
        Self {
            palette: byte & 0x07,
            vram_bank: (byte >> 3) & 1,
            x_flip: byte & 0x20 != 0,
            y_flip: byte & 0x40 != 0,
            priority: byte & 0x80 != 0,
        }
    }
}

/// Everything the BG/window fetcher needs to read one tile row; the
/// caller (the LCD module) resolves which map/scroll pair applies
/// (background vs. window) before calling `tick`.
#[derive(Clone, Copy)]
pub struct BgFetchContext<'a> {
    pub tile_map: &'a [u8; 1024],
    pub tile_attrs: Option<&'a [u8; 1024]>,
    pub tile_data: [&'a [u8; 0x1800]; 2],
    pub scx: u8,
    pub scy: u8,
    pub y: u8,
    pub signed_addressing: bool,
    pub is_cgb: bool,
    /// Set for exactly the tick on which LCDC.4 was toggled, to reproduce
    /// the CGB tile-data-change glitch (spec §4.7 step 2).
    pub apply_tile_id_glitch: bool,
}

fn tile_row(tile_data: &[u8; 0x1800], index: u8, signed_addressing: bool, line: u8) -> [u8; 2] {
    let base = if signed_addressing {
        0x1000usize.wrapping_add_signed(isize::from(index as i8) * 16)
    } else {
        usize::from(index) * 16
    };
    let row = usize::from(line) * 2;
    [tile_data[base + row], tile_data[base + row + 1]]
}

#[derive(Clone, Copy)]
enum BgStep {
    FetchTileId,
    FetchLow {
        tile_id: u8,
        attrs: TileAttributes,
    },
    FetchHigh {
        tile_id: u8,
        attrs: TileAttributes,
        low: u8,
    },
    Ready {
        low: u8,
        high: u8,
        attrs: TileAttributes,
    },
}

impl Default for BgStep {
    fn default() -> Self {
        BgStep::FetchTileId
    }
}

/// Background/window pixel fetcher. Each step is held for two T4 ticks,
/// tracked via `half`, mirroring the teacher's two-calls-per-step cadence
/// (its `Option<u8>` scy field toggling between `None`/`Some`).
#[derive(Clone, Default)]
pub struct BgFetcher {
    step: BgStep,
    half: bool,
    /// Tile column counter; column 0 is the initial dummy fetch.
    pub tile_x: u8,
    pub sprite_fetch_allowed: bool,
}

impl BgFetcher {
    pub fn restart(&mut self, start_x: u8) {
        self.step = BgStep::FetchTileId;
        self.half = false;
        self.tile_x = start_x;
        self.sprite_fetch_allowed = false;
    }

    /// Advances the fetcher by one T4 tick. Returns `true` if a tile was
    /// just latched into the background FIFO this tick.
    pub fn tick(&mut self, fifos: &mut Fifos, ctx: &BgFetchContext<'_>) -> bool {
        if let BgStep::Ready { low, high, attrs } = self.step {
            if !fifos.is_background_empty() {
                return false;
            }
            let (low, high) = if ctx.is_cgb && attrs.x_flip {
                (low.reverse_bits(), high.reverse_bits())
            } else {
                (low, high)
            };
            fifos.replace_background(
                [low, high],
                BackgroundAttributes {
                    palette: attrs.palette,
                    priority: attrs.priority,
                },
            );
            self.sprite_fetch_allowed = false;
            self.step = BgStep::FetchTileId;
            self.half = false;
            return true;
        }

        match self.step {
            BgStep::FetchTileId => {
                let col = u16::from(self.tile_x.max(1).wrapping_sub(1)) + u16::from(ctx.scx / 8);
                let row = u16::from(ctx.y.wrapping_add(ctx.scy) / 8);
                let address = usize::from((col & 0x1f) + 32 * row);
                let tile_id = ctx.tile_map[address];
                let attrs = ctx
                    .tile_attrs
                    .map(|a| TileAttributes::from_byte(a[address]))
                    .unwrap_or_default();
                if !self.half {
                    self.half = true;
                } else {
                    self.step = BgStep::FetchLow { tile_id, attrs };
                    self.half = false;
                }
            }
            BgStep::FetchLow { tile_id, attrs } => {
                if !self.half {
                    self.half = true;
                } else {
                    let line = ctx.y.wrapping_add(ctx.scy) % 8;
                    let line = if attrs.y_flip { 7 - line } else { line };
                    let bank = if ctx.is_cgb {
                        usize::from(attrs.vram_bank)
                    } else {
                        0
                    };
                    let low = tile_row(ctx.tile_data[bank], tile_id, ctx.signed_addressing, line)[0];
                    self.step = BgStep::FetchHigh { tile_id, attrs, low };
                    self.half = false;
                }
            }
            BgStep::FetchHigh { tile_id, attrs, low } => {
                if !self.half {
                    self.half = true;
                } else {
                    self.sprite_fetch_allowed = true;
                    let tile_id = if ctx.is_cgb && ctx.apply_tile_id_glitch {
                        tile_id.reverse_bits()
                    } else {
                        tile_id
                    };
                    let line = ctx.y.wrapping_add(ctx.scy) % 8;
                    let line = if attrs.y_flip { 7 - line } else { line };
                    let bank = if ctx.is_cgb {
                        usize::from(attrs.vram_bank)
                    } else {
                        0
                    };
                    let high = tile_row(ctx.tile_data[bank], tile_id, ctx.signed_addressing, line)[1];
                    self.tile_x += 1;
                    self.step = BgStep::Ready { low, high, attrs };
                    self.half = false;
                }
            }
            BgStep::Ready { .. } => unreachable!(),
        }
        false
    }
}

/// The window's tile map/attribute plane, supplied alongside `BgFetchContext`
/// so the renderer can switch the fetch target without rebuilding the rest
/// of the (identical) tile-data/addressing-mode fields.
#[derive(Clone, Copy)]
pub struct WindowFetchSource<'a> {
    pub tile_map: &'a [u8; 1024],
    pub tile_attrs: Option<&'a [u8; 1024]>,
}

/// Per-T4-tick inputs for the sprite fetcher.
pub struct SpriteFetchContext<'a> {
    pub tile_data: [&'a [u8; 0x1000]; 2],
    pub line: u8,
    pub tall: bool,
    pub is_cgb: bool,
    pub obj_enabled: bool,
}

fn object_tile_row(ctx: &SpriteFetchContext<'_>, obj: ObjectAttribute) -> [u8; 2] {
    let tile_index = if ctx.tall {
        let use_bottom = (ctx.line.wrapping_add(16).wrapping_sub(obj.y) >= 8) != obj.y_flip();
        (obj.tile & 0xfe) | u8::from(use_bottom)
    } else {
        obj.tile
    };
    let mut y = ctx.line.wrapping_add(16).wrapping_sub(obj.y) % 8;
    if obj.y_flip() {
        y = 7 - y;
    }
    let bank = if ctx.is_cgb {
        usize::from(obj.cgb_vram_bank())
    } else {
        0
    };
    let base = usize::from(tile_index) * 16;
    let row = usize::from(y) * 2;
    [ctx.tile_data[bank][base + row], ctx.tile_data[bank][base + row + 1]]
}

#[derive(Clone, Copy)]
enum SpriteStep {
    FetchLow { delay: u8 },
    FetchHigh { one_dot_delay: bool, low: u8 },
}

impl Default for SpriteStep {
    fn default() -> Self {
        SpriteStep::FetchLow { delay: 0 }
    }
}

/// Sprite pixel fetcher; pauses and reprioritizes the BG fetcher while
/// active (spec §4.7 step 3).
#[derive(Clone, Default)]
pub struct SpriteFetch {
    step: SpriteStep,
}

impl SpriteFetch {
    /// Called once per T4 while a sprite fetch is in progress (6 ticks
    /// total: 2 for each of tile-low/tile-high/finalize). Returns `true`
    /// once the sprite has been merged into the sprite FIFO.
    pub fn tick(&mut self, fifos: &mut Fifos, obj: ObjectAttribute, ctx: &SpriteFetchContext<'_>) -> bool {
        use SpriteStep::*;
        self.step = match self.step {
            FetchLow { delay: 3 } => FetchHigh {
                one_dot_delay: false,
                low: object_tile_row(ctx, obj)[0],
            },
            FetchLow { delay } => FetchLow { delay: delay + 1 },
            FetchHigh { one_dot_delay: false, low } => FetchHigh {
                one_dot_delay: true,
                low,
            },
            FetchHigh { one_dot_delay: true, low } => {
                let high = object_tile_row(ctx, obj)[1];
                let palette = if ctx.is_cgb {
                    obj.cgb_palette()
                } else {
                    u8::from(obj.dmg_palette_is_obp1())
                };
                let tile = if obj.x_flip() {
                    [low.reverse_bits(), high.reverse_bits()]
                } else {
                    [low, high]
                };
                fifos.load_sprite(tile, obj.bg_priority(), palette);
                self.step = FetchLow { delay: 0 };
                return true;
            }
        };
        false
    }
}

/// Drives one scanline's worth of mode-3 FIFO rendering (spec §4.7).
pub struct FifoRenderer {
    bg: BgFetcher,
    sprite: SpriteFetch,
    fifos: Fifos,
    pub objects: ArrayVec<ObjectAttribute, 10>,
    sprite_in_progress: Option<ObjectAttribute>,
    align_remaining: u8,
    window_setup_remaining: u8,
    x_pos: u16,
    shifted: u16,
    window_active: bool,
    /// Internal window line counter value latched at window activation;
    /// fed to the BG fetcher's `y` in place of `line` while active.
    window_line: u8,
    pub scanline: ArrayVec<RenderedPixel, 160>,
}

impl FifoRenderer {
    pub fn new(objects: ArrayVec<ObjectAttribute, 10>, scx: u8) -> Self {
        let mut bg = BgFetcher::default();
        bg.restart(0);
        Self {
            bg,
            sprite: SpriteFetch::default(),
            fifos: Fifos::default(),
            objects,
            sprite_in_progress: None,
            align_remaining: scx % 8,
            window_setup_remaining: 0,
            x_pos: 0,
            shifted: 0,
            window_active: false,
            window_line: 0,
            scanline: ArrayVec::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.scanline.is_full()
    }

    /// One T4 tick. `bg_ctx` must already reflect whether BG or window
    /// tiles are being fetched (the LCD module switches `bg_ctx`'s map and
    /// `y`/`scy`/`scx` when `activate_window` fires).
    pub fn tick(
        &mut self,
        bg_ctx: &BgFetchContext<'_>,
        win_source: WindowFetchSource<'_>,
        sprite_ctx: &SpriteFetchContext<'_>,
        wx: u8,
        window_check: &mut WindowCheck,
        lcdc: u8,
        is_dmg_wx0_glitch_pending: &mut bool,
    ) {
        if self.is_finished() {
            return;
        }

        if self.align_remaining > 0 {
            self.align_remaining -= 1;
            return;
        }

        // The active fetch target: the window replaces tile map/attrs and
        // uses its own line counter with no scroll applied, once activated
        // (spec §4.7 step 4).
        let active_ctx = if self.window_active {
            BgFetchContext {
                tile_map: win_source.tile_map,
                tile_attrs: win_source.tile_attrs,
                tile_data: bg_ctx.tile_data,
                scx: 0,
                scy: 0,
                y: self.window_line,
                signed_addressing: bg_ctx.signed_addressing,
                is_cgb: bg_ctx.is_cgb,
                apply_tile_id_glitch: bg_ctx.apply_tile_id_glitch,
            }
        } else {
            *bg_ctx
        };

        if self.window_setup_remaining > 0 {
            self.window_setup_remaining -= 1;
            self.bg.tick(&mut self.fifos, &active_ctx);
            return;
        }

        let cursor = i32::from(self.shifted);
        let wx_threshold = if bg_ctx.is_cgb { i32::from(wx) } else { i32::from(wx) + 1 };
        if !self.window_active && window_check.is_enabled_and_matched(lcdc) && cursor == wx_threshold {
            self.window_active = true;
            self.window_line = window_check.mark_window_used();
            self.fifos.reset_background();
            self.bg.restart(1);
            self.window_setup_remaining = if bg_ctx.is_cgb { 6 } else { 7 };
            if wx == 0 && bg_ctx.scx & 7 != 0 {
                *is_dmg_wx0_glitch_pending = true;
            }
            return;
        }

        if let Some(obj) = self.sprite_in_progress {
            if self.sprite.tick(&mut self.fifos, obj, sprite_ctx) {
                self.sprite_in_progress = None;
            }
            return;
        }

        if sprite_ctx.obj_enabled && self.bg.sprite_fetch_allowed && !self.fifos.is_background_empty() {
            if let Some(pos) = self
                .objects
                .iter()
                .position(|o| i32::from(o.x) == self.x_pos as i32)
            {
                self.sprite_in_progress = Some(self.objects.remove(pos));
                return;
            }
        }

        let latched = self.bg.tick(&mut self.fifos, &active_ctx);
        let _ = latched;

        if self.fifos.is_background_empty() {
            return;
        }

        if cursor >= 0 {
            let pixel = self.fifos.render_pixel(lcdc & 0x01 != 0 || bg_ctx.is_cgb);
            if self.scanline.try_push(pixel).is_err() {
                return;
            }
            self.x_pos += 1;
        }
        self.fifos.shift();
        self.shifted += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_map() -> [u8; 1024] {
        [0; 1024]
    }

    fn empty_tiles() -> [u8; 0x1800] {
        [0; 0x1800]
    }

    #[test]
    fn bg_fetch_reaches_ready_after_six_ticks() {
        let map = empty_map();
        let tiles = empty_tiles();
        let ctx = BgFetchContext {
            tile_map: &map,
            tile_attrs: None,
            tile_data: [&tiles, &tiles],
            scx: 0,
            scy: 0,
            y: 0,
            signed_addressing: false,
            is_cgb: false,
            apply_tile_id_glitch: false,
        };
        let mut bg = BgFetcher::default();
        bg.restart(0);
        let mut fifos = Fifos::default();
        let mut latched_at = None;
        for i in 0..6 {
            if bg.tick(&mut fifos, &ctx) {
                latched_at = Some(i);
            }
        }
        assert_eq!(latched_at, Some(5));
    }

    #[test]
    fn renderer_emits_160_pixels_eventually() {
        let map = empty_map();
        let tiles = empty_tiles();
        let bg_ctx = BgFetchContext {
            tile_map: &map,
            tile_attrs: None,
            tile_data: [&tiles, &tiles],
            scx: 0,
            scy: 0,
            y: 0,
            signed_addressing: false,
            is_cgb: false,
            apply_tile_id_glitch: false,
        };
        let empty_obj_tiles = [0u8; 0x1000];
        let sprite_ctx = SpriteFetchContext {
            tile_data: [&empty_obj_tiles, &empty_obj_tiles],
            line: 0,
            tall: false,
            is_cgb: false,
            obj_enabled: false,
        };
        let mut window_check = WindowCheck::new(true);
        let win_source = WindowFetchSource {
            tile_map: &map,
            tile_attrs: None,
        };
        let mut renderer = FifoRenderer::new(ArrayVec::new(), 0);
        let mut glitch = false;
        let mut guard = 0;
        while !renderer.is_finished() && guard < 10_000 {
            renderer.tick(&bg_ctx, win_source, &sprite_ctx, 167, &mut window_check, 0, &mut glitch);
            guard += 1;
        }
        assert!(renderer.is_finished());
        assert_eq!(renderer.scanline.len(), 160);
    }
}
