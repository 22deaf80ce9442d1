/// One object's worth of attribute lines, with its position in the input
/// stream for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub index: usize,
    pub lines: Vec<String>,
}

/// Splits a stream of dump lines into per-object blocks.
///
/// Blocks end at a blank line or at the literal separator marker; runs of
/// separators collapse so no empty block is ever produced. A line without the
/// key/value delimiter is folded into the previous attribute line (wrapped
/// captures); with nothing to continue it is dropped and counted in
/// `orphan_lines`.
pub struct BlockSplitter<I> {
    lines: I,
    delimiter: String,
    separator: String,
    next_index: usize,
    started: bool,
    pub orphan_lines: usize,
}

impl<I: Iterator<Item = String>> BlockSplitter<I> {
    pub fn new(lines: I, delimiter: &str, separator: &str) -> Self {
        Self {
            lines,
            delimiter: delimiter.to_string(),
            separator: separator.to_string(),
            next_index: 0,
            started: false,
            orphan_lines: 0,
        }
    }
}

impl<I: Iterator<Item = String>> Iterator for BlockSplitter<I> {
    type Item = RawBlock;

    fn next(&mut self) -> Option<RawBlock> {
        let mut current: Vec<String> = Vec::new();
        for line in self.lines.by_ref() {
            let mut line = line;
            if !self.started {
                // Exports from Windows tooling often lead with a UTF-8 BOM.
                if let Some(stripped) = line.strip_prefix('\u{feff}') {
                    line = stripped.to_string();
                }
                self.started = true;
            }
            // Escaped DN characters add nothing at this layer.
            if line.contains('\\') {
                line = line.replace('\\', "");
            }
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed == self.separator {
                if current.is_empty() {
                    continue;
                }
                let index = self.next_index;
                self.next_index += 1;
                return Some(RawBlock {
                    index,
                    lines: current,
                });
            }
            if trimmed.contains(self.delimiter.as_str()) {
                current.push(trimmed.to_string());
            } else if let Some(last) = current.last_mut() {
                last.push(' ');
                last.push_str(trimmed);
            } else {
                self.orphan_lines += 1;
                log::warn!("dropping orphan line with no attribute to continue: {trimmed}");
            }
        }
        if current.is_empty() {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;
        Some(RawBlock {
            index,
            lines: current,
        })
    }
}
