//! Edit buffer over an immutable module source.
//!
//! Edits are `(byte range, replacement)` pairs recorded in any order and
//! applied once by [`RewriteBuffer::finish`], which also produces a source map
//! from the output back to the original source (through the input map when
//! there is one). Untouched text keeps its mappings; replacement text is
//! emitted as generated code with no original position.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sourcemap::{SourceMap, SourceMapBuilder};
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error("edit {start}..{end} is outside of the {len} byte source")]
    OutOfBounds { start: usize, end: usize, len: usize },

    #[error("edit boundary {0} is not on a character boundary")]
    NotCharBoundary(usize),

    #[error("edit {start}..{end} overlaps an earlier edit")]
    Overlap { start: usize, end: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    range: Range<usize>,
    text: String,
}

/// Rewritten source plus its map.
#[derive(Debug)]
pub struct Rewritten {
    pub code: String,
    pub map: SourceMap,
    /// Number of edits applied.
    pub replacements: usize,
}

impl Rewritten {
    pub fn map_json(&self) -> Result<String, sourcemap::Error> {
        let mut buf = Vec::new();
        self.map.to_writer(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// `//# sourceMappingURL=data:...` comment carrying the map inline.
    pub fn inline_map_comment(&self) -> Result<String, sourcemap::Error> {
        let json = self.map_json()?;
        Ok(format!(
            "//# sourceMappingURL=data:application/json;charset=utf-8;base64,{}",
            STANDARD.encode(json)
        ))
    }
}

pub struct RewriteBuffer<'a> {
    source: &'a str,
    name: &'a str,
    input_map: Option<&'a SourceMap>,
    sources_content: bool,
    // sorted by start, pairwise disjoint
    edits: Vec<Edit>,
}

impl<'a> RewriteBuffer<'a> {
    /// Buffer over `source`, which is reported in the map under `name`.
    pub fn new(source: &'a str, name: &'a str) -> Self {
        Self {
            source,
            name,
            input_map: None,
            sources_content: true,
            edits: Vec::new(),
        }
    }

    /// Map the output through `map`, the map of `source` itself.
    pub fn with_input_map(mut self, map: &'a SourceMap) -> Self {
        self.input_map = Some(map);
        self
    }

    /// Whether the original text is embedded as `sourcesContent` when there is
    /// no input map.
    pub fn with_sources_content(mut self, enabled: bool) -> Self {
        self.sources_content = enabled;
        self
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Records that `range` of the original text becomes `text`.
    pub fn replace(&mut self, range: Range<usize>, text: impl Into<String>) -> Result<(), RewriteError> {
        let Range { start, end } = range;
        if start > end || end > self.source.len() {
            return Err(RewriteError::OutOfBounds {
                start,
                end,
                len: self.source.len(),
            });
        }
        for offset in [start, end] {
            if !self.source.is_char_boundary(offset) {
                return Err(RewriteError::NotCharBoundary(offset));
            }
        }

        let idx = self.edits.partition_point(|e| e.range.start < start);
        let clashes_prev = idx > 0 && self.edits[idx - 1].range.end > start;
        let clashes_next = self
            .edits
            .get(idx)
            .is_some_and(|next| next.range.start < end || next.range.start == start);
        if clashes_prev || clashes_next {
            return Err(RewriteError::Overlap { start, end });
        }

        self.edits.insert(
            idx,
            Edit {
                range: start..end,
                text: text.into(),
            },
        );
        Ok(())
    }

    /// Applies every edit and builds the output map.
    pub fn finish(self) -> Rewritten {
        let lines = LineIndex::new(self.source);
        let mut out = MapWriter::new(self.name);
        let anchors = match self.input_map {
            Some(map) => out.carry_input(map, &lines),
            None => out.identity(self.name, self.source, self.sources_content, &lines),
        };

        let mut code = String::with_capacity(self.source.len());
        let mut cursor = 0;
        for edit in &self.edits {
            out.original(&mut code, self.source, cursor..edit.range.start, &anchors, &lines);
            out.generated(&mut code, &edit.text);
            cursor = edit.range.end;
        }
        out.original(&mut code, self.source, cursor..self.source.len(), &anchors, &lines);

        Rewritten {
            code,
            map: out.builder.into_sourcemap(),
            replacements: self.edits.len(),
        }
    }
}

// -----------------------------------------------------------------------------
// Positions
// -----------------------------------------------------------------------------

/// Byte offset ↔ (line, UTF-16 column) conversion for one text.
struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(text: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset) - 1
    }

    fn position(&self, offset: usize) -> (u32, u32) {
        let line = self.line_of(offset);
        let col = utf16_len(&self.text[self.starts[line]..offset]);
        (line as u32, col)
    }

    fn offset(&self, line: u32, col: u32) -> Option<usize> {
        let start = *self.starts.get(line as usize)?;
        let end = self
            .starts
            .get(line as usize + 1)
            .map(|s| s - 1)
            .unwrap_or(self.text.len());
        let mut units = 0u32;
        for (i, ch) in self.text[start..end].char_indices() {
            if units >= col {
                return (units == col).then_some(start + i);
            }
            units += ch.len_utf16() as u32;
        }
        (units == col).then_some(end)
    }
}

fn utf16_len(s: &str) -> u32 {
    s.chars().map(|c| c.len_utf16() as u32).sum()
}

/// A mapped position of the input text.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    offset: usize,
    line: u32,
    col: u32,
    /// (source id, line, column) in the output map's numbering.
    src: Option<(u32, u32, u32)>,
    name: Option<u32>,
}

// -----------------------------------------------------------------------------
// Map writer
// -----------------------------------------------------------------------------

struct MapWriter {
    builder: SourceMapBuilder,
    line: u32,
    col: u32,
}

impl MapWriter {
    fn new(file: &str) -> Self {
        Self {
            builder: SourceMapBuilder::new(Some(file)),
            line: 0,
            col: 0,
        }
    }

    /// The source is its own original: one anchor per line start.
    fn identity(&mut self, name: &str, source: &str, contents: bool, lines: &LineIndex) -> Vec<Anchor> {
        let id = self.builder.add_source(name);
        if contents {
            self.builder.set_source_contents(id, Some(source));
        }
        lines
            .starts
            .iter()
            .enumerate()
            .map(|(line, &offset)| Anchor {
                offset,
                line: line as u32,
                col: 0,
                src: Some((id, line as u32, 0)),
                name: None,
            })
            .collect()
    }

    /// Registers the input map's sources and names, and returns its tokens as
    /// anchors into the input text.
    fn carry_input(&mut self, map: &SourceMap, lines: &LineIndex) -> Vec<Anchor> {
        let sources: Vec<u32> = (0..map.get_source_count())
            .map(|i| {
                let id = self.builder.add_source(map.get_source(i).unwrap_or_default());
                self.builder.set_source_contents(id, map.get_source_contents(i));
                id
            })
            .collect();
        let names: Vec<u32> = (0..map.get_name_count())
            .map(|i| self.builder.add_name(map.get_name(i).unwrap_or_default()))
            .collect();

        let mut anchors: Vec<Anchor> = map
            .tokens()
            .filter_map(|token| {
                let raw = token.get_raw_token();
                let offset = lines.offset(raw.dst_line, raw.dst_col)?;
                let src = sources
                    .get(raw.src_id as usize)
                    .map(|&id| (id, raw.src_line, raw.src_col));
                Some(Anchor {
                    offset,
                    line: raw.dst_line,
                    col: raw.dst_col,
                    src,
                    name: names.get(raw.name_id as usize).copied(),
                })
            })
            .collect();
        anchors.sort_by_key(|a| a.offset);
        anchors
    }

    fn add(&mut self, src: Option<(u32, u32, u32)>, name: Option<u32>) {
        match src {
            Some((id, line, col)) => {
                self.builder
                    .add_raw(self.line, self.col, line, col, Some(id), name, false);
            }
            None => {
                self.builder.add_raw(self.line, self.col, 0, 0, None, None, false);
            }
        }
    }

    fn advance(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.line += 1;
                self.col = 0;
            } else {
                self.col += ch.len_utf16() as u32;
            }
        }
    }

    /// Copies `source[range]` and re-emits the anchors inside it.
    fn original(
        &mut self,
        code: &mut String,
        source: &str,
        range: Range<usize>,
        anchors: &[Anchor],
        lines: &LineIndex,
    ) {
        if range.is_empty() {
            return;
        }
        let first = anchors.partition_point(|a| a.offset < range.start);

        // Resuming mid-line: continue the mapping that covers the start.
        if anchors.get(first).map(|a| a.offset) != Some(range.start) {
            let (line, col) = lines.position(range.start);
            if let Some(cover) = first
                .checked_sub(1)
                .map(|i| anchors[i])
                .filter(|a| a.line == line)
            {
                let src = cover
                    .src
                    .map(|(id, l, c)| (id, l, c + (col - cover.col)));
                self.add(src, cover.name);
            }
        }

        let mut pos = range.start;
        for anchor in anchors[first..].iter().take_while(|a| a.offset < range.end) {
            self.advance(&source[pos..anchor.offset]);
            pos = anchor.offset;
            self.add(anchor.src, anchor.name);
        }
        self.advance(&source[pos..range.end]);
        code.push_str(&source[range]);
    }

    fn generated(&mut self, code: &mut String, text: &str) {
        if text.is_empty() {
            return;
        }
        self.add(None, None);
        self.advance(text);
        code.push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = "const a = 1;\nconst b = require('bindings')('x');\nconst c = 3;\n";

    fn src_pos(map: &SourceMap, line: u32, col: u32) -> Option<(u32, u32)> {
        map.lookup_token(line, col)
            .filter(|t| t.get_dst_line() == line && t.has_source())
            .map(|t| (t.get_src_line(), t.get_src_col()))
    }

    #[test]
    fn pass_through_without_edits() {
        let buffer = RewriteBuffer::new(SRC, "index.js");
        assert!(buffer.is_empty());
        let out = buffer.finish();
        assert_eq!(out.code, SRC);
        assert_eq!(out.replacements, 0);
        for line in 0..3 {
            assert_eq!(src_pos(&out.map, line, 0), Some((line, 0)));
        }
        assert_eq!(out.map.get_source(0), Some("index.js"));
        assert_eq!(out.map.get_source_contents(0), Some(SRC));
    }

    #[test]
    fn replaces_range_and_maps_surroundings() {
        let start = SRC.find("require").unwrap();
        let end = SRC.find(");\nconst c").unwrap() + 1;
        let mut buffer = RewriteBuffer::new(SRC, "index.js");
        buffer.replace(start..end, "require('./x.node')").unwrap();
        let out = buffer.finish();

        assert_eq!(
            out.code,
            "const a = 1;\nconst b = require('./x.node');\nconst c = 3;\n"
        );
        assert_eq!(src_pos(&out.map, 0, 0), Some((0, 0)));
        assert_eq!(src_pos(&out.map, 1, 0), Some((1, 0)));
        assert_eq!(src_pos(&out.map, 2, 0), Some((2, 0)));

        // The replacement itself is generated code.
        let token = out.map.lookup_token(1, 12).unwrap();
        assert!(!token.has_source());

        // Text after the replacement resumes at its original column.
        let resume = out.map.lookup_token(1, 29).unwrap();
        assert_eq!((resume.get_src_line(), resume.get_src_col()), (1, (end - 13) as u32));
    }

    #[test]
    fn edits_compose_in_any_order() {
        let src = "f(A); g(B); h(C);";
        let mut buffer = RewriteBuffer::new(src, "m.js");
        buffer.replace(12..16, "hh").unwrap();
        buffer.replace(0..4, "ff").unwrap();
        buffer.replace(6..10, "").unwrap();
        assert_eq!(buffer.finish().code, "ff; ; hh;");
    }

    #[test]
    fn rejects_bad_edits() {
        let mut buffer = RewriteBuffer::new("abcdef", "m.js");
        buffer.replace(1..3, "x").unwrap();
        assert_eq!(
            buffer.replace(2..4, "y"),
            Err(RewriteError::Overlap { start: 2, end: 4 })
        );
        assert_eq!(
            buffer.replace(0..2, "y"),
            Err(RewriteError::Overlap { start: 0, end: 2 })
        );
        assert_eq!(
            buffer.replace(1..1, "y"),
            Err(RewriteError::Overlap { start: 1, end: 1 })
        );
        assert!(buffer.replace(3..4, "z").is_ok());
        assert_eq!(
            buffer.replace(5..9, "z"),
            Err(RewriteError::OutOfBounds { start: 5, end: 9, len: 6 })
        );

        let mut buffer = RewriteBuffer::new("é", "m.js");
        assert_eq!(buffer.replace(1..2, ""), Err(RewriteError::NotCharBoundary(1)));
    }

    #[test]
    fn multi_line_edit_shifts_following_lines() {
        let src = "a(\n1,\n2);\nkeep();\n";
        let mut buffer = RewriteBuffer::new(src, "m.js");
        buffer.replace(0..8, "b()").unwrap();
        let out = buffer.finish();
        assert_eq!(out.code, "b();\nkeep();\n");
        assert_eq!(src_pos(&out.map, 1, 0), Some((3, 0)));
    }

    #[test]
    fn carries_input_map_through() {
        let src = "var x = require('bindings')('a');\nvar y = 2;\n";
        let mut builder = SourceMapBuilder::new(Some("bundle.js"));
        let id = builder.add_source("orig.ts");
        builder.set_source_contents(id, Some("// original"));
        builder.add_raw(0, 0, 10, 0, Some(id), None, false);
        builder.add_raw(0, 8, 10, 12, Some(id), None, false);
        builder.add_raw(1, 0, 11, 4, Some(id), None, false);
        let input = builder.into_sourcemap();

        let mut buffer = RewriteBuffer::new(src, "bundle.js").with_input_map(&input);
        buffer.replace(8..32, "require('./a.node')").unwrap();
        let out = buffer.finish();

        assert_eq!(out.code, "var x = require('./a.node');\nvar y = 2;\n");
        assert_eq!(out.map.get_source(0), Some("orig.ts"));
        assert_eq!(out.map.get_source_contents(0), Some("// original"));
        assert_eq!(src_pos(&out.map, 0, 0), Some((10, 0)));
        assert_eq!(src_pos(&out.map, 1, 0), Some((11, 4)));
        assert!(!out.map.lookup_token(0, 8).unwrap().has_source());
    }

    #[test]
    fn utf16_columns() {
        let src = "const s = '😀'; require('bindings')('x');";
        let start = src.find("require").unwrap();
        let mut buffer = RewriteBuffer::new(src, "m.js");
        buffer.replace(start..src.len() - 1, "X").unwrap();
        let out = buffer.finish();
        assert_eq!(out.code, "const s = '😀'; X;");
        // 😀 is two UTF-16 units, so the edit starts at column 16.
        let token = out.map.lookup_token(0, 16).unwrap();
        assert_eq!(token.get_dst_col(), 16);
        assert!(!token.has_source());
    }

    #[test]
    fn inline_comment_is_base64_json() {
        let out = RewriteBuffer::new("x;\n", "m.js").finish();
        let comment = out.inline_map_comment().unwrap();
        let encoded = comment
            .strip_prefix("//# sourceMappingURL=data:application/json;charset=utf-8;base64,")
            .unwrap();
        let decoded = STANDARD.decode(encoded).unwrap();
        let map = SourceMap::from_slice(&decoded).unwrap();
        assert_eq!(map.get_source(0), Some("m.js"));
    }

    #[test]
    fn line_index_round_trips_offsets() {
        let text = "ab\n😀c\n";
        let lines = LineIndex::new(text);
        assert_eq!(lines.position(3), (1, 0));
        assert_eq!(lines.position(7), (1, 2));
        assert_eq!(lines.offset(1, 2), Some(7));
        assert_eq!(lines.offset(1, 1), None);
        assert_eq!(lines.offset(9, 0), None);
    }
}
