//! The flap alphabet: the ordered set of glyphs each module can show.
//!
//! The authoritative alphabet lives in the display firmware and is learned
//! at runtime from a `GeneralState` frame. Until then a seeded default is
//! used so the daemon can render before the hardware reports in. The table
//! is owned by the protocol engine and shared read-only through
//! [`AlphabetHandle`].

use std::sync::{Arc, RwLock};

/// The seeded default character set, matching the stock firmware order.
/// Index 0 is the blank flap.
const DEFAULT_GLYPHS: &[char] = &[
    ' ', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', //
    'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', //
    'Z', 'g', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'r', //
    '.', '?', '-', '$', '\'', '#', ':', 'd', ',', '!', '@', '&', 'w',
];

struct Inner {
    glyphs: Vec<char>,
    learned: bool,
}

/// Shared read-mostly handle to the alphabet table.
#[derive(Clone)]
pub struct AlphabetHandle {
    inner: Arc<RwLock<Inner>>,
}

impl AlphabetHandle {
    /// A handle seeded with the default character set, not yet learned.
    pub fn seeded() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                glyphs: DEFAULT_GLYPHS.to_vec(),
                learned: false,
            })),
        }
    }

    /// A handle over an explicit character set, marked learned. Test helper
    /// and mock seed.
    pub fn fixed(glyphs: impl IntoIterator<Item = char>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                glyphs: glyphs.into_iter().collect(),
                learned: true,
            })),
        }
    }

    /// Adopt a character set reported by the hardware. Only the first report
    /// wins; later ones are ignored. Returns whether the set was adopted.
    pub fn adopt(&self, glyphs: impl IntoIterator<Item = char>) -> bool {
        let mut inner = self.inner.write().expect("alphabet lock poisoned");
        if inner.learned {
            return false;
        }
        let glyphs: Vec<char> = glyphs.into_iter().collect();
        if glyphs.is_empty() {
            return false;
        }
        inner.glyphs = glyphs;
        inner.learned = true;
        true
    }

    /// Whether the hardware has supplied the character set.
    pub fn is_learned(&self) -> bool {
        self.inner.read().expect("alphabet lock poisoned").learned
    }

    /// Number of flaps per module.
    pub fn len(&self) -> usize {
        self.inner.read().expect("alphabet lock poisoned").glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flap index for a glyph. Unknown glyphs map to 0 (blank).
    pub fn index(&self, c: char) -> usize {
        let inner = self.inner.read().expect("alphabet lock poisoned");
        inner.glyphs.iter().position(|&g| g == c).unwrap_or(0)
    }

    /// Glyph at a flap index, blank if out of range.
    pub fn glyph(&self, index: usize) -> char {
        let inner = self.inner.read().expect("alphabet lock poisoned");
        inner.glyphs.get(index).copied().unwrap_or(' ')
    }

    /// Forward flap distance from `a` to `b`, wrapping past the last flap.
    pub fn distance(&self, a: char, b: char) -> usize {
        let inner = self.inner.read().expect("alphabet lock poisoned");
        let pos = |c| inner.glyphs.iter().position(|&g| g == c).unwrap_or(0);
        let (a, b) = (pos(a), pos(b));
        if b < a {
            inner.glyphs.len() - a + b
        } else {
            b - a
        }
    }

    /// Snapshot of the current glyph table.
    pub fn glyphs(&self) -> Vec<char> {
        self.inner.read().expect("alphabet lock poisoned").glyphs.clone()
    }

    /// Render a sequence of flap indices as a string.
    pub fn render(&self, indices: impl IntoIterator<Item = u32>) -> String {
        let inner = self.inner.read().expect("alphabet lock poisoned");
        indices
            .into_iter()
            .map(|i| inner.glyphs.get(i as usize).copied().unwrap_or(' '))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_is_index_zero() {
        let alphabet = AlphabetHandle::seeded();
        assert_eq!(alphabet.index(' '), 0);
        assert_eq!(alphabet.glyph(0), ' ');
    }

    #[test]
    fn test_unknown_glyph_maps_to_blank() {
        let alphabet = AlphabetHandle::seeded();
        assert_eq!(alphabet.index('~'), 0);
    }

    #[test]
    fn test_simple_distance() {
        let alphabet = AlphabetHandle::fixed("ABCDEF".chars());
        assert_eq!(alphabet.distance('A', 'B'), 1);
    }

    #[test]
    fn test_wraparound_distance() {
        let alphabet = AlphabetHandle::fixed("ABCDEF".chars());
        assert_eq!(alphabet.distance('F', 'A'), 1);
    }

    #[test]
    fn test_adopt_only_once() {
        let alphabet = AlphabetHandle::seeded();
        assert!(alphabet.adopt(" AB".chars()));
        assert!(alphabet.is_learned());
        assert!(!alphabet.adopt(" XY".chars()));
        assert_eq!(alphabet.glyph(1), 'A');
    }

    #[test]
    fn test_adopt_rejects_empty() {
        let alphabet = AlphabetHandle::seeded();
        assert!(!alphabet.adopt(std::iter::empty()));
        assert!(!alphabet.is_learned());
    }

    #[test]
    fn test_render() {
        let alphabet = AlphabetHandle::seeded();
        let indices = ['H', 'E', 'L', 'L', 'O'].map(|c| alphabet.index(c) as u32);
        assert_eq!(alphabet.render(indices), "HELLO");
    }

    #[test]
    fn test_render_out_of_range_is_blank() {
        let alphabet = AlphabetHandle::fixed(" AB".chars());
        assert_eq!(alphabet.render([1, 99]), "A ");
    }
}
