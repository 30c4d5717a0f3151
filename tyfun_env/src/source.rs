use std::io;
use std::io::Read;
use std::fs;
use std::str;
use std::path::Path;
use std::collections::hash_map::{self, HashMap};
use loc::{Unit, Pos, Span};
use loc::{unit_from_u32, pos_from_u32, span_from_u32};

/// An iterator over the spans of every line in a file,
/// in the order they appear.
#[derive(Clone)]
pub struct SourceLineSpans<'a> {
    slice: &'a [u32],
    unit: Unit,
}

impl<'a> Iterator for SourceLineSpans<'a> {
    type Item = Span;

    fn next(&mut self) -> Option<Span> {
        if let Some((&p, newslice)) = self.slice.split_first() {
            if let Some(&q) = newslice.first() {
                self.slice = newslice;
                return Some(span_from_u32(self.unit, p, q));
            }
        }
        None
    }
}

impl<'a> DoubleEndedIterator for SourceLineSpans<'a> {
    fn next_back(&mut self) -> Option<Span> {
        if let Some((&q, newslice)) = self.slice.split_last() {
            if let Some(&p) = newslice.last() {
                self.slice = newslice;
                return Some(span_from_u32(self.unit, p, q));
            }
        }
        None
    }
}

/// A single source file. The contents are always UTF-8.
pub struct SourceFile {
    path: String, // not PathBuf since it is solely for reporting
    data: String,
    unit: Unit,
    lineoffs: Vec<u32>,
}

impl SourceFile {
    // a line break is `\r`, `\n` or `\r\n`; the BOM, if any, is skipped
    fn calculate_lineoffs(data: &str) -> Vec<u32> {
        let end = data.len() as u32;
        let begin = if data.as_bytes().starts_with(b"\xef\xbb\xbf") { 3 } else { 0 };

        let mut off = begin;
        let mut lineoffs = vec![off];
        let mut it = data[begin as usize..].bytes();
        let mut next = it.next();
        loop {
            match next {
                Some(b'\r') => {
                    off += 1;
                    next = it.next();
                    if next == Some(b'\n') {
                        off += 1;
                        next = it.next();
                    }
                    lineoffs.push(off);
                }
                Some(b'\n') => {
                    off += 1;
                    next = it.next();
                    lineoffs.push(off);
                }
                Some(_) => {
                    off += 1;
                    next = it.next();
                }
                None => break,
            }
        }

        lineoffs.push(end);
        lineoffs
    }

    pub fn from_file(path: &Path) -> io::Result<SourceFile> {
        let mut f = fs::File::open(path)?;
        let mut data = String::new();
        f.read_to_string(&mut data)?;
        Ok(SourceFile::from_string(path.display().to_string(), data))
    }

    pub fn from_string(path: String, data: String) -> SourceFile {
        let lineoffs = SourceFile::calculate_lineoffs(&data);
        SourceFile { path: path, data: data, unit: Unit::dummy(), lineoffs: lineoffs }
    }

    fn set_unit(&mut self, unit: Unit) {
        assert!(!unit.is_dummy() && self.unit.is_dummy());
        self.unit = unit;
    }

    pub fn path(&self) -> &str { &self.path }

    pub fn span(&self) -> Span {
        span_from_u32(self.unit, *self.lineoffs.first().unwrap(), *self.lineoffs.last().unwrap())
    }

    pub fn data(&self) -> &str { &self.data }

    pub fn line_spans(&self) -> SourceLineSpans {
        assert!(!self.lineoffs.is_empty());
        SourceLineSpans { slice: &self.lineoffs, unit: self.unit }
    }

    /// Returns a zero-based line number and the span of that line.
    pub fn line_from_pos(&self, pos: Pos) -> Option<(usize, Span)> {
        let unit = pos.unit();
        let pos = pos.to_usize() as u32;
        if unit.is_dummy() || unit != self.unit {
            return None;
        }

        let lineoffs = &self.lineoffs[..self.lineoffs.len() - 1];
        let i = match lineoffs.binary_search(&pos) {
            Ok(i) => i,
            Err(0) => return None, // pos < span.begin()
            Err(i) => i - 1,
        };
        let begin = self.lineoffs[i];
        assert!(begin <= pos);
        let end = self.lineoffs[i + 1];
        if end < pos { return None; } // pos > span.end(), allowing past-the-end
        Some((i, span_from_u32(unit, begin, end)))
    }

    /// Returns the first line number, spans for every covered line, and the last line number.
    pub fn lines_from_span(&self, span: Span) -> Option<(usize, SourceLineSpans, usize)> {
        let unit = span.unit();
        if unit.is_dummy() || unit != self.unit {
            return None;
        }

        let (begin, _) = self.line_from_pos(span.begin())?;
        let (end, _) = self.line_from_pos(span.end())?;
        let spans = SourceLineSpans { slice: &self.lineoffs[begin..(end + 2)], unit: unit };
        Some((begin, spans, end))
    }
}

/// A set of registered source files, each with a distinct unit.
pub struct Source {
    files: HashMap<Unit, SourceFile>,
    next_unit: u32,
}

impl Source {
    pub fn new() -> Source {
        Source { files: HashMap::new(), next_unit: 1 }
    }

    /// Registers a file and returns the span of its entire contents.
    pub fn add(&mut self, mut file: SourceFile) -> Span {
        let unit = unit_from_u32(self.next_unit);
        assert!(unit.is_source_dependent());
        file.set_unit(unit);
        let span = file.span();
        self.files.insert(unit, file);
        self.next_unit += 1;
        span
    }

    pub fn files(&self) -> hash_map::Values<Unit, SourceFile> {
        self.files.values()
    }

    pub fn get_file(&self, unit: Unit) -> Option<&SourceFile> {
        self.files.get(&unit)
    }

    pub fn slice_from_span(&self, span: Span) -> Option<&str> {
        if let Some(file) = self.files.get(&span.unit()) {
            file.data.get(span.begin().to_usize()..span.end().to_usize())
        } else {
            None
        }
    }
}

#[test]
fn test_source_file() {
    let mut source = Source::new();
    let filespan = source.add(SourceFile::from_string("foo".into(),
                                                      "hello\nworld\r\n\ra\n\nxyz".into()));
    let unit = filespan.unit();
    let mk_pos = |pos| pos_from_u32(unit, pos);
    let mk_span = |begin, end| span_from_u32(unit, begin, end);

    let f = source.get_file(unit).unwrap();
    assert_eq!(f.span(), mk_span(0, 20));
    assert_eq!(f.line_spans().collect::<Vec<_>>(),
               vec![mk_span(0, 6), mk_span(6, 13), mk_span(13, 14), mk_span(14, 16),
                    mk_span(16, 17), mk_span(17, 20)]);
    assert_eq!(f.line_from_pos(mk_pos(0)), Some((0, mk_span(0, 6))));
    assert_eq!(f.line_from_pos(mk_pos(5)), Some((0, mk_span(0, 6))));
    assert_eq!(f.line_from_pos(mk_pos(6)), Some((1, mk_span(6, 13))));
    assert_eq!(f.line_from_pos(mk_pos(20)), Some((5, mk_span(17, 20)))); // allow past-the-end
    assert_eq!(f.line_from_pos(mk_pos(21)), None);

    let tr = |(begin, spans, end): (usize, SourceLineSpans, usize)| {
        (begin, spans.collect::<Vec<Span>>(), end)
    };
    assert_eq!(f.lines_from_span(mk_span(0, 3)).map(&tr),
               Some((0, vec![mk_span(0, 6)], 0)));
    assert_eq!(f.lines_from_span(mk_span(4, 14)).map(&tr),
               Some((0, vec![mk_span(0, 6), mk_span(6, 13), mk_span(13, 14), mk_span(14, 16)],
                     3)));

    assert_eq!(source.slice_from_span(mk_span(6, 11)), Some("world"));

    // an empty file still has one (empty) line
    let filespan = source.add(SourceFile::from_string("bar".into(), "".into()));
    let f = source.get_file(filespan.unit()).unwrap();
    assert_eq!(f.line_spans().count(), 1);
}
