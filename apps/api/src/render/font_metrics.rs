//! Helvetica glyph widths for line wrapping in rendered documents.
//!
//! Widths are in em units (1/1000 of the AFM values for the standard Type 1
//! Helvetica). The table covers ASCII 0x20..=0x7E; index = (char as usize) - 32.
//! Anything outside that range is measured at `average_char_width`, which is
//! close enough for the Latin-1 punctuation and accented letters a résumé carries.

/// Static character-width table for one font.
pub struct FontMetricTable {
    widths: [f32; 95],
    /// Fallback width for non-ASCII characters (codepoints > 0x7E).
    pub average_char_width: f32,
    pub space_width: f32,
}

impl FontMetricTable {
    /// Measures the rendered width of a string in em units.
    pub fn measure_str(&self, s: &str) -> f32 {
        s.chars()
            .map(|c| {
                let code = c as usize;
                if (32..=126).contains(&code) {
                    self.widths[code - 32]
                } else {
                    self.average_char_width
                }
            })
            .sum()
    }

    /// Width of `s` in points at `font_size_pt`.
    pub fn width_pt(&self, s: &str, font_size_pt: f32) -> f32 {
        self.measure_str(s) * font_size_pt
    }

    /// Greedy word wrap of a single paragraph to `max_width_pt`.
    ///
    /// Runs of whitespace collapse to one space. A word wider than the line is
    /// broken between characters. Returns no lines for a blank paragraph.
    pub fn wrap(&self, paragraph: &str, font_size_pt: f32, max_width_pt: f32) -> Vec<String> {
        let max_width = max_width_pt / font_size_pt;
        let mut lines = Vec::new();
        let mut current = String::new();
        let mut current_width = 0.0_f32;

        for word in paragraph.split_whitespace() {
            let word_w = self.measure_str(word);
            let space_w = if current.is_empty() { 0.0 } else { self.space_width };

            if current_width + space_w + word_w <= max_width {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
                current_width += space_w + word_w;
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0.0;
            }

            if word_w <= max_width {
                current.push_str(word);
                current_width = word_w;
            } else {
                for c in word.chars() {
                    let char_w = self.measure_str(c.encode_utf8(&mut [0; 4]));
                    if current_width + char_w > max_width && !current.is_empty() {
                        lines.push(std::mem::take(&mut current));
                        current_width = 0.0;
                    }
                    current.push(c);
                    current_width += char_w;
                }
            }
        }

        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }
}

/// Helvetica, the PDF standard Type 1 sans-serif used for all rendered documents.
pub static HELVETICA: FontMetricTable = FontMetricTable {
    #[rustfmt::skip]
    widths: [
        // sp     !      "      #      $      %      &      '      (      )      *      +      ,      -      .      /
        0.278, 0.278, 0.355, 0.556, 0.556, 0.889, 0.667, 0.191, 0.333, 0.333, 0.389, 0.584, 0.278, 0.333, 0.278, 0.278,
        // 0      1      2      3      4      5      6      7      8      9
        0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556,
        // :      ;      <      =      >      ?      @
        0.278, 0.278, 0.584, 0.584, 0.584, 0.556, 1.015,
        // A      B      C      D      E      F      G      H      I      J      K      L      M
        0.667, 0.667, 0.722, 0.722, 0.667, 0.611, 0.778, 0.722, 0.278, 0.500, 0.667, 0.556, 0.833,
        // N      O      P      Q      R      S      T      U      V      W      X      Y      Z
        0.722, 0.778, 0.667, 0.778, 0.722, 0.667, 0.611, 0.722, 0.667, 0.944, 0.667, 0.667, 0.611,
        // [      \      ]      ^      _      `
        0.278, 0.278, 0.278, 0.469, 0.556, 0.333,
        // a      b      c      d      e      f      g      h      i      j      k      l      m
        0.556, 0.556, 0.500, 0.556, 0.556, 0.278, 0.556, 0.556, 0.222, 0.222, 0.500, 0.222, 0.833,
        // n      o      p      q      r      s      t      u      v      w      x      y      z
        0.556, 0.556, 0.556, 0.556, 0.333, 0.500, 0.278, 0.556, 0.500, 0.722, 0.500, 0.500, 0.500,
        // {      |      }      ~
        0.334, 0.260, 0.334, 0.584,
    ],
    average_char_width: 0.556,
    space_width: 0.278,
};
