//! Capture regions of the form `width:height:left:top`.
//!
//! Sizes are a pixel count or one of `d` (three quarters of the shorter
//! side), `w` (full width), `h` (full height), `f` (fit to the code frame).
//! Offsets are a pixel count from the start, `-n` to leave `n` pixels
//! before the far edge, or `c` to centre. Sizes default to `f:f` and offsets
//! to `c:c` unless both values of the pair are given.

use std::fmt;
use std::str::FromStr;

use crate::error::{IoError, IoResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionSize {
    Pixels(u32),
    Default,
    Width,
    Height,
    Fit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionOffset {
    Start(u32),
    End(u32),
    Centre,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub width: RegionSize,
    pub height: RegionSize,
    pub left: RegionOffset,
    pub top: RegionOffset,
}

/// A resolved rectangle in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for Region {
    fn default() -> Self {
        Self {
            width: RegionSize::Fit,
            height: RegionSize::Fit,
            left: RegionOffset::Centre,
            top: RegionOffset::Centre,
        }
    }
}

impl Region {
    /// Resolves against a `screen_w × screen_h` frame. `fit` is the side of
    /// the code frame in pixels.
    pub fn resolve(&self, screen_w: u32, screen_h: u32, fit: u32) -> IoResult<Rect> {
        let size = |s: RegionSize| match s {
            RegionSize::Pixels(n) => n,
            RegionSize::Default => screen_w.min(screen_h) * 3 / 4,
            RegionSize::Width => screen_w,
            RegionSize::Height => screen_h,
            RegionSize::Fit => fit,
        };
        let width = size(self.width);
        let height = size(self.height);
        let x = resolve_offset(self.left, screen_w, width)?;
        let y = resolve_offset(self.top, screen_h, height)?;
        if width == 0 || height == 0 {
            return Err(IoError::region(format!("empty {width}x{height} region")));
        }
        let fits = |start: u32, len: u32, limit: u32| {
            start.checked_add(len).is_some_and(|end| end <= limit)
        };
        if !fits(x, width, screen_w) || !fits(y, height, screen_h) {
            return Err(IoError::region(format!(
                "{width}x{height}+{x}+{y} exceeds {screen_w}x{screen_h} frame"
            )));
        }
        Ok(Rect {
            x,
            y,
            width,
            height,
        })
    }
}

fn resolve_offset(offset: RegionOffset, screen: u32, window: u32) -> IoResult<u32> {
    let space = screen
        .checked_sub(window)
        .ok_or_else(|| IoError::region(format!("{window} pixels do not fit in {screen}")))?;
    match offset {
        RegionOffset::Start(n) => Ok(n),
        RegionOffset::End(n) => space
            .checked_sub(n)
            .ok_or_else(|| IoError::region(format!("offset -{n} leaves the frame"))),
        RegionOffset::Centre => Ok(space / 2),
    }
}

fn parse_size(s: &str) -> IoResult<RegionSize> {
    Ok(match s {
        "d" => RegionSize::Default,
        "w" => RegionSize::Width,
        "h" => RegionSize::Height,
        "f" => RegionSize::Fit,
        _ => RegionSize::Pixels(
            s.parse()
                .map_err(|_| IoError::region(format!("bad size `{s}`")))?,
        ),
    })
}

fn parse_offset(s: &str) -> IoResult<RegionOffset> {
    let bad = || IoError::region(format!("bad offset `{s}`"));
    Ok(match s {
        "c" => RegionOffset::Centre,
        _ => match s.strip_prefix('-') {
            Some(n) => RegionOffset::End(n.parse().map_err(|_| bad())?),
            None => RegionOffset::Start(s.parse().map_err(|_| bad())?),
        },
    })
}

impl FromStr for Region {
    type Err = IoError;

    fn from_str(s: &str) -> IoResult<Self> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        if parts.len() > 4 {
            return Err(IoError::region(format!("`{s}` has more than four fields")));
        }
        let field = |i: usize| parts.get(i).copied().filter(|p| !p.is_empty());

        let mut region = Region::default();
        if let (Some(w), Some(h)) = (field(0), field(1)) {
            region.width = parse_size(w)?;
            region.height = parse_size(h)?;
        }
        if let (Some(l), Some(t)) = (field(2), field(3)) {
            region.left = parse_offset(l)?;
            region.top = parse_offset(t)?;
        }
        Ok(region)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = |s: RegionSize| match s {
            RegionSize::Pixels(n) => n.to_string(),
            RegionSize::Default => "d".into(),
            RegionSize::Width => "w".into(),
            RegionSize::Height => "h".into(),
            RegionSize::Fit => "f".into(),
        };
        let offset = |o: RegionOffset| match o {
            RegionOffset::Start(n) => n.to_string(),
            RegionOffset::End(n) => format!("-{n}"),
            RegionOffset::Centre => "c".into(),
        };
        write!(
            f,
            "{}:{}:{}:{}",
            size(self.width),
            size(self.height),
            offset(self.left),
            offset(self.top)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_fits_and_centres() {
        let region: Region = "".parse().expect("parse");
        assert_eq!(region, Region::default());
        let rect = region.resolve(1920, 1080, 300).expect("resolve");
        assert_eq!(
            rect,
            Rect {
                x: 810,
                y: 390,
                width: 300,
                height: 300
            }
        );
    }

    #[test]
    fn named_sizes_resolve_against_screen() {
        let region: Region = "d:h:0:0".parse().expect("parse");
        let rect = region.resolve(1600, 1200, 0).expect("resolve");
        assert_eq!((rect.width, rect.height), (900, 1200));
    }

    #[test]
    fn negative_offsets_count_from_far_edge() {
        let region: Region = "100:50:-10:-0".parse().expect("parse");
        let rect = region.resolve(400, 300, 0).expect("resolve");
        assert_eq!((rect.x, rect.y), (290, 250));
    }

    #[test]
    fn half_given_pairs_fall_back_to_defaults() {
        let region: Region = "640::12".parse().expect("parse");
        assert_eq!(region, Region::default());
    }

    #[test]
    fn rejects_garbage_and_overflow() {
        assert!("abc:10".parse::<Region>().is_err());
        assert!("10:10:x:0".parse::<Region>().is_err());
        assert!("1:2:3:4:5".parse::<Region>().is_err());
        let region: Region = "500:10:0:0".parse().expect("parse");
        assert!(region.resolve(400, 300, 0).is_err());
        let region: Region = "100:10:350:0".parse().expect("parse");
        assert!(region.resolve(400, 300, 0).is_err());
    }

    #[test]
    fn display_round_trips_text_form() {
        let text = "w:240:-5:c";
        assert_eq!(text.parse::<Region>().expect("parse").to_string(), text);
    }
}
