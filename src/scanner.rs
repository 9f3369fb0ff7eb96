//! Locates `require('<idiom>')(...)` call expressions in module source.
//!
//! The call head is found with a regex; the argument list is then walked with
//! a depth counter so nested parentheses of any depth are captured whole.
//! Quotes, template literals and comments are skipped while counting.

use std::ops::Range;

use crate::idiom::Idiom;

/// One located call expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite<'a> {
    /// Byte range of the whole call, `require(` through the final `)`.
    pub span: Range<usize>,
    /// Text strictly between the argument list's own parentheses.
    pub argument: &'a str,
}

/// Lazy left-to-right sequence of call sites of one idiom.
#[derive(Debug, Clone)]
pub struct CallSites<'a> {
    source: &'a str,
    idiom: Idiom,
    cursor: usize,
}

impl<'a> CallSites<'a> {
    pub fn new(source: &'a str, idiom: Idiom) -> Self {
        Self {
            source,
            idiom,
            cursor: 0,
        }
    }

    /// Start over from the beginning of the source.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

impl<'a> Iterator for CallSites<'a> {
    type Item = CallSite<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let head = self.idiom.call_head();
        while self.cursor <= self.source.len() {
            let m = head.find_at(self.source, self.cursor)?;
            let args_start = m.end();
            match matching_paren(self.source, args_start) {
                Some(close) => {
                    self.cursor = close + 1;
                    return Some(CallSite {
                        span: m.start()..close + 1,
                        argument: &self.source[args_start..close],
                    });
                }
                // Unbalanced: not a call we can rewrite, keep looking after the head.
                None => self.cursor = m.end(),
            }
        }
        None
    }
}

/// Finds the `)` closing an argument list whose `(` ends just before `from`.
fn matching_paren(source: &str, from: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut depth = 1usize;
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            quote @ (b'\'' | b'"' | b'`') => i = skip_string(bytes, i + 1, quote)?,
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = bytes[i..].iter().position(|&b| b == b'\n').map(|p| i + p)?;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = source[i + 2..].find("*/").map(|p| i + 2 + p + 1)?;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Returns the index of the closing quote.
pub(crate) fn skip_string(bytes: &[u8], mut i: usize, quote: u8) -> Option<usize> {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b if b == quote => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arguments(source: &str, idiom: Idiom) -> Vec<&str> {
        CallSites::new(source, idiom).map(|c| c.argument).collect()
    }

    #[test]
    fn finds_simple_call() {
        let src = "const b = require('bindings')({ bindings: 'addon' });";
        let sites: Vec<_> = CallSites::new(src, Idiom::Bindings).collect();
        assert_eq!(sites.len(), 1);
        assert_eq!(&src[sites[0].span.clone()], "require('bindings')({ bindings: 'addon' })");
        assert_eq!(sites[0].argument, "{ bindings: 'addon' }");
    }

    #[test]
    fn captures_nested_parens() {
        let src = "require('bindings')({ bindings: path.join(__dirname, 'x'), y: (1) })";
        assert_eq!(
            arguments(src, Idiom::Bindings),
            vec!["{ bindings: path.join(__dirname, 'x'), y: (1) }"]
        );
    }

    #[test]
    fn captures_deep_nesting() {
        let src = "require('node-gyp-build')(path.resolve(path.join((__dirname), ('..'))))";
        assert_eq!(
            arguments(src, Idiom::NodeGypBuild),
            vec!["path.resolve(path.join((__dirname), ('..')))"]
        );
    }

    #[test]
    fn ignores_parens_in_strings_and_comments() {
        let src = "require('bindings')('a)b' /* ) */ + \"(\" + `)`) // )\n;";
        assert_eq!(
            arguments(src, Idiom::Bindings),
            vec!["'a)b' /* ) */ + \"(\" + `)`"]
        );
        let src = "require('bindings')('x' // )\n)";
        assert_eq!(arguments(src, Idiom::Bindings), vec!["'x' // )\n"]);
    }

    #[test]
    fn skips_uncalled_and_indirect_forms() {
        let src = "const b = require('bindings'); const c = b('addon'); require('bindings');";
        assert!(arguments(src, Idiom::Bindings).is_empty());
    }

    #[test]
    fn skips_unbalanced_call_and_continues() {
        // The first argument list never closes; the second call still matches.
        let src = "require('bindings')('a'\nrequire('bindings')('b')";
        assert_eq!(arguments(src, Idiom::Bindings), vec!["'b'"]);

        let src = "require('bindings')(('a')\n;require('bindings')('b')";
        assert_eq!(arguments(src, Idiom::Bindings), vec!["'b'"]);
    }

    #[test]
    fn yields_every_match_in_order_and_restarts() {
        let src = "a = require('node-gyp-build')(__dirname);\nb = require(\"node-gyp-build\")('..');";
        let mut sites = CallSites::new(src, Idiom::NodeGypBuild);
        let first: Vec<_> = sites.by_ref().map(|c| c.span).collect();
        assert_eq!(first.len(), 2);
        assert!(first[0].end <= first[1].start);
        sites.reset();
        assert_eq!(sites.map(|c| c.span).collect::<Vec<_>>(), first);
    }

    #[test]
    fn empty_argument_list() {
        assert_eq!(arguments("require('bindings')()", Idiom::Bindings), vec![""]);
    }

    #[test]
    fn idioms_do_not_match_each_other() {
        let src = "require('bindings')('x'); require('node-gyp-build')(__dirname)";
        assert_eq!(arguments(src, Idiom::Bindings), vec!["'x'"]);
        assert_eq!(arguments(src, Idiom::NodeGypBuild), vec!["__dirname"]);
    }
}
