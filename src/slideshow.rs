//! Wish slideshow pagination

use crate::wishes::{Wish, validate_wishes};

/// Which wish is on screen
pub struct Slideshow {
    slides: Vec<Wish>,
    current: usize,
}

impl Slideshow {
    /// An empty list is replaced by the built-in wishes
    pub fn new(wishes: Vec<Wish>) -> Self {
        Self {
            slides: validate_wishes(wishes),
            current: 0,
        }
    }

    pub fn current(&self) -> &Wish {
        &self.slides[self.current]
    }

    pub fn index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    /// Advance, wrapping to the first slide
    pub fn next(&mut self) {
        self.current = (self.current + 1) % self.slides.len();
    }

    /// Step back, wrapping to the last slide
    pub fn previous(&mut self) {
        self.current = match self.current {
            0 => self.slides.len() - 1,
            n => n - 1,
        };
    }

    /// Out-of-range indices are ignored
    pub fn go_to(&mut self, index: usize) {
        if index < self.slides.len() {
            self.current = index;
        }
    }

    pub fn first(&mut self) {
        self.go_to(0);
    }

    pub fn last(&mut self) {
        self.go_to(self.slides.len() - 1);
    }

    /// "3 / 6" style position text
    pub fn indicator(&self) -> String {
        format!("{} / {}", self.index() + 1, self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wishes::default_wishes;

    #[test]
    fn test_navigation_wraps() {
        let mut show = Slideshow::new(default_wishes());
        assert_eq!(show.len(), 6);

        show.previous();
        assert_eq!(show.index(), 5);
        show.next();
        assert_eq!(show.index(), 0);
        show.next();
        assert_eq!(show.indicator(), "2 / 6");
    }

    #[test]
    fn test_go_to_ignores_out_of_range() {
        let mut show = Slideshow::new(default_wishes());
        show.go_to(3);
        show.go_to(17);
        assert_eq!(show.index(), 3);

        show.last();
        assert_eq!(show.index(), 5);
        show.first();
        assert_eq!(show.current().header_image.as_deref(), Some("img/IMG_1438.HEIC"));
    }

    #[test]
    fn test_empty_list_uses_defaults() {
        let show = Slideshow::new(Vec::new());
        assert_eq!(show.len(), 6);
    }
}
