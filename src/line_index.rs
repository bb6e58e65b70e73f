use crate::span::Position;

/// Byte offsets of line starts, used to turn offsets into positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let bytes = source.as_bytes();
        let mut line_starts = vec![0];
        let mut pos = 0;
        while let Some(idx) = memchr::memchr2(b'\n', b'\r', &bytes[pos..]) {
            let at = pos + idx;
            if bytes[at] == b'\r' && bytes.get(at + 1) == Some(&b'\n') {
                pos = at + 2;
            } else {
                pos = at + 1;
            }
            line_starts.push(pos);
        }
        Self { line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// 1-based line containing `offset`.
    pub fn line(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|&start| start <= offset).max(1)
    }

    pub fn line_start(&self, line: usize) -> usize {
        self.line_starts[line - 1]
    }

    pub fn position(&self, source: &str, offset: usize) -> Position {
        let line = self.line(offset);
        let start = self.line_start(line);
        let column = source[start..offset].chars().count();
        Position::new(line, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_across_line_endings() {
        let src = "a\nbc\r\nd\re";
        let index = LineIndex::new(src);
        assert_eq!(index.line_count(), 4);
        assert_eq!(index.position(src, 0), Position::new(1, 0));
        assert_eq!(index.position(src, 3), Position::new(2, 1));
        assert_eq!(index.position(src, 6), Position::new(3, 0));
        assert_eq!(index.position(src, 8), Position::new(4, 0));
    }

    #[test]
    fn columns_count_characters() {
        let src = "é=1";
        let index = LineIndex::new(src);
        assert_eq!(index.position(src, 2), Position::new(1, 1));
    }
}
