// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! [`Color`], [`ColorDepth`], [`Attributes`], and [`Style`].

/// A cell color: the terminal's configured default, one of the 256 indexed
/// palette entries, or a 24-bit value.
///
/// The 16 named primaries are indices `0..=15`; associated constants are
/// provided for the common ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Color {
    /// Whatever the terminal's default foreground/background is.
    #[default]
    Default,
    /// Palette index 0..=255.
    Indexed(u8),
    /// 24-bit color; downgraded at render time when unsupported.
    Rgb(u8, u8, u8),
}

impl Color {
    pub const BLACK: Color = Color::Indexed(0);
    pub const RED: Color = Color::Indexed(1);
    pub const GREEN: Color = Color::Indexed(2);
    pub const YELLOW: Color = Color::Indexed(3);
    pub const BLUE: Color = Color::Indexed(4);
    pub const MAGENTA: Color = Color::Indexed(5);
    pub const CYAN: Color = Color::Indexed(6);
    pub const WHITE: Color = Color::Indexed(7);
    pub const BRIGHT_BLACK: Color = Color::Indexed(8);
    pub const BRIGHT_RED: Color = Color::Indexed(9);
    pub const BRIGHT_GREEN: Color = Color::Indexed(10);
    pub const BRIGHT_YELLOW: Color = Color::Indexed(11);
    pub const BRIGHT_BLUE: Color = Color::Indexed(12);
    pub const BRIGHT_MAGENTA: Color = Color::Indexed(13);
    pub const BRIGHT_CYAN: Color = Color::Indexed(14);
    pub const BRIGHT_WHITE: Color = Color::Indexed(15);

    #[must_use]
    pub fn is_default(&self) -> bool { matches!(self, Color::Default) }
}

/// How much color the terminal on the other end can display.
///
/// Detected once at backend init from `$TERM` / `$COLORTERM`; see
/// [`crate::backend::capabilities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ColorDepth {
    /// No color at all.
    Mono,
    /// The 8/16 basic ANSI colors.
    Basic8,
    /// The 256-entry indexed palette.
    Color256,
    /// 24-bit direct color.
    TrueColor,
}

/// Text attribute bitset: bold, dim, italic, underline, blink, reverse,
/// strikethrough.
///
/// Kept as a bare `u8` mask rather than one field per attribute so cell
/// comparison in the diff renderer is a single integer compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Attributes(u8);

impl Attributes {
    pub const NONE: Attributes = Attributes(0);
    pub const BOLD: Attributes = Attributes(1 << 0);
    pub const DIM: Attributes = Attributes(1 << 1);
    pub const ITALIC: Attributes = Attributes(1 << 2);
    pub const UNDERLINE: Attributes = Attributes(1 << 3);
    pub const BLINK: Attributes = Attributes(1 << 4);
    pub const REVERSE: Attributes = Attributes(1 << 5);
    pub const STRIKETHROUGH: Attributes = Attributes(1 << 6);

    #[must_use]
    pub fn is_empty(&self) -> bool { self.0 == 0 }

    #[must_use]
    pub fn contains(&self, other: Attributes) -> bool { self.0 & other.0 == other.0 }

    pub fn insert(&mut self, other: Attributes) { self.0 |= other.0; }

    pub fn remove(&mut self, other: Attributes) { self.0 &= !other.0; }

    /// Attributes present in `self` but not in `other`.
    #[must_use]
    pub fn difference(&self, other: Attributes) -> Attributes {
        Attributes(self.0 & !other.0)
    }
}

impl std::ops::BitOr for Attributes {
    type Output = Attributes;
    fn bitor(self, rhs: Attributes) -> Attributes { Attributes(self.0 | rhs.0) }
}

impl std::ops::BitOrAssign for Attributes {
    fn bitor_assign(&mut self, rhs: Attributes) { self.0 |= rhs.0; }
}

/// Foreground, background, and attributes bundled for [`print`].
///
/// [`print`]: crate::buffer::CellBuffer::print
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
    pub attrs: Attributes,
}

impl Style {
    #[must_use]
    pub fn fg(color: Color) -> Self {
        Self {
            fg: color,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn attribute_set_operations() {
        let mut attrs = Attributes::BOLD | Attributes::UNDERLINE;
        assert!(attrs.contains(Attributes::BOLD));
        assert!(!attrs.contains(Attributes::DIM));

        attrs.remove(Attributes::BOLD);
        assert!(!attrs.contains(Attributes::BOLD));
        assert!(attrs.contains(Attributes::UNDERLINE));

        assert_eq!(
            (Attributes::BOLD | Attributes::DIM).difference(Attributes::DIM),
            Attributes::BOLD
        );
    }

    #[test]
    fn color_depth_orders_by_capability() {
        assert!(ColorDepth::Mono < ColorDepth::Basic8);
        assert!(ColorDepth::Color256 < ColorDepth::TrueColor);
    }
}
