//! Braille loading spinner, advanced once per UI tick.

const SPINNER_FRAMES: &[&str] = &["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

#[derive(Debug, Default)]
pub struct Spinner {
    frame: usize,
}

impl Spinner {
    pub fn tick(&mut self) {
        self.frame = (self.frame + 1) % SPINNER_FRAMES.len();
    }

    pub fn reset(&mut self) {
        self.frame = 0;
    }

    pub fn glyph(&self) -> &'static str {
        SPINNER_FRAMES[self.frame % SPINNER_FRAMES.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_cycles() {
        let mut s = Spinner::default();
        let first = s.glyph();
        for _ in 0..SPINNER_FRAMES.len() {
            s.tick();
        }
        assert_eq!(s.glyph(), first);
        s.tick();
        assert_ne!(s.glyph(), first);
        s.reset();
        assert_eq!(s.glyph(), first);
    }
}
