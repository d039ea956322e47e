//! Static import extraction from Python source text.
//!
//! The scan is line oriented and never evaluates the source. Comments and
//! string literals (including triple-quoted blocks) are blanked before
//! statements are matched, and any clause that does not parse as a dotted
//! module path contributes nothing.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use airseal_core::SourceFile;
use regex::Regex;

static IMPORT_STMT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^import\s+(.+)$").expect("import pattern is valid"));

static FROM_STMT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^from\s+(\.*)\s*(\S*)\s+import(?:\s|\(|\*|$)").expect("from pattern is valid")
});

/// `try: import x`, `if TYPE_CHECKING: import y`, ...
static COMPOUND_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:try|else|finally|(?:except|if|elif|while|with)\b[^:]*)\s*:\s*(\S.*)$")
        .expect("compound pattern is valid")
});

static DOTTED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("dotted name pattern is valid")
});

/// Deduplicated set of top-level module names. Iterates in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSet(BTreeSet<String>);

impl ImportSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ImportSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Extract the top-level modules a source file imports.
///
/// An import of the file's own module stem is a self-reference and is
/// dropped.
pub fn extract_imports(source: &SourceFile) -> ImportSet {
    let mut imports = scan_imports(source.text());
    if imports.remove(source.module_stem()) {
        tracing::debug!(module = source.module_stem(), "dropped self-import");
    }
    tracing::debug!(
        filename = source.filename(),
        count = imports.len(),
        "imports extracted"
    );
    imports
}

/// Scan raw source text for `import` and `from ... import` statements.
pub fn scan_imports(text: &str) -> ImportSet {
    let mut imports = ImportSet::new();
    for line in logical_lines(text) {
        for statement in line.split(';') {
            scan_statement(statement.trim(), &mut imports);
        }
    }
    imports
}

fn scan_statement(statement: &str, imports: &mut ImportSet) {
    let statement = COMPOUND_PREFIX
        .captures(statement)
        .and_then(|caps| caps.get(1))
        .map_or(statement, |m| m.as_str());

    if let Some(caps) = IMPORT_STMT.captures(statement) {
        let clauses = caps.get(1).map_or("", |m| m.as_str());
        for clause in clauses.split(',') {
            if let Some(module) = import_clause_module(clause) {
                insert_top_level(module, imports);
            }
        }
        return;
    }

    if let Some(caps) = FROM_STMT.captures(statement) {
        let dots = caps.get(1).map_or("", |m| m.as_str());
        let module = caps.get(2).map_or("", |m| m.as_str());
        // Relative imports point into the local project.
        if dots.is_empty() && DOTTED_NAME.is_match(module) {
            insert_top_level(module, imports);
        }
    }
}

/// `a.b` or `a.b as c`; anything else is not a module clause.
fn import_clause_module(clause: &str) -> Option<&str> {
    let tokens: Vec<&str> = clause.split_whitespace().collect();
    let module = match tokens.as_slice() {
        [module] => *module,
        [module, "as", alias] if DOTTED_NAME.is_match(alias) && !alias.contains('.') => *module,
        _ => return None,
    };
    DOTTED_NAME.is_match(module).then_some(module)
}

fn insert_top_level(module: &str, imports: &mut ImportSet) {
    if let Some(top) = module.split('.').next().filter(|t| !t.is_empty()) {
        imports.insert(top);
    }
}

/// Physical lines reduced to code, with backslash continuations joined.
fn logical_lines(text: &str) -> Vec<String> {
    let mut scanner = LineScanner::default();
    let mut lines = Vec::new();
    let mut pending = String::new();

    for physical in text.lines() {
        let code = scanner.code(physical);
        if let Some(joined) = code.trim_end().strip_suffix('\\') {
            pending.push_str(joined);
            pending.push(' ');
            continue;
        }
        pending.push_str(&code);
        lines.push(std::mem::take(&mut pending));
    }

    if !pending.is_empty() {
        lines.push(pending);
    }
    lines
}

/// Tracks triple-quoted strings that span physical lines.
#[derive(Default)]
struct LineScanner {
    open_triple: Option<&'static str>,
}

impl LineScanner {
    /// Code portion of one physical line: comments dropped, string
    /// literals replaced by a single space.
    fn code(&mut self, line: &str) -> String {
        let mut out = String::with_capacity(line.len());
        let mut rest = line;
        loop {
            if let Some(delim) = self.open_triple {
                match rest.find(delim) {
                    Some(end) => {
                        rest = &rest[end + delim.len()..];
                        self.open_triple = None;
                        out.push(' ');
                    }
                    None => return out,
                }
            }
            match self.code_segment(rest, &mut out) {
                Some(after_open) => rest = after_open,
                None => return out,
            }
        }
    }

    /// Copies code from `text` into `out` until the line ends (`None`) or a
    /// triple-quoted string opens (`Some(remainder)`).
    fn code_segment<'l>(&mut self, text: &'l str, out: &mut String) -> Option<&'l str> {
        let mut chars = text.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '#' => return None,
                '"' | '\'' => {
                    let triple = if c == '"' { "\"\"\"" } else { "'''" };
                    if text[i..].starts_with(triple) {
                        self.open_triple = Some(triple);
                        out.push(' ');
                        return Some(&text[i + triple.len()..]);
                    }

                    let mut closed = false;
                    while let Some((_, s)) = chars.next() {
                        if s == '\\' {
                            chars.next();
                        } else if s == c {
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return None;
                    }
                    out.push(' ');
                }
                _ => out.push(c),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(text: &str) -> Vec<String> {
        scan_imports(text).iter().map(str::to_owned).collect()
    }

    #[test]
    fn plain_and_dotted_imports() {
        let src = "import os\nimport numpy.linalg\nimport a.b.c\n";
        assert_eq!(names(src), vec!["a", "numpy", "os"]);
    }

    #[test]
    fn comma_separated_with_aliases() {
        let src = "import numpy as np, pandas as pd, sys\n";
        assert_eq!(names(src), vec!["numpy", "pandas", "sys"]);
    }

    #[test]
    fn from_imports() {
        let src = "from sklearn.model_selection import train_test_split\n\
                   from requests import (\n    get,\n    post,\n)\n\
                   from yaml import*\n";
        assert_eq!(names(src), vec!["requests", "sklearn", "yaml"]);
    }

    #[test]
    fn relative_imports_contribute_nothing() {
        let src = "from . import sibling\nfrom .pkg import thing\nfrom ..up import x\n";
        assert!(names(src).is_empty());
    }

    #[test]
    fn indented_and_compound_imports() {
        let src = "def f():\n    import flask\n\
                   try:\n    import ujson as json\nexcept ImportError:\n    import json\n\
                   if TYPE_CHECKING: import mypy_extensions\n\
                   try: import orjson\nexcept ImportError: import simplejson\n";
        assert_eq!(
            names(src),
            vec!["flask", "json", "mypy_extensions", "orjson", "simplejson", "ujson"]
        );
    }

    #[test]
    fn semicolon_separated_statements() {
        assert_eq!(names("import os; import toml; x = 1\n"), vec!["os", "toml"]);
    }

    #[test]
    fn backslash_continuation() {
        let src = "import numpy, \\\n    scipy\n";
        assert_eq!(names(src), vec!["numpy", "scipy"]);
    }

    #[test]
    fn comments_are_ignored() {
        let src = "# import fake_one\nimport real  # import fake_two\n";
        assert_eq!(names(src), vec!["real"]);
    }

    #[test]
    fn docstrings_and_strings_are_ignored() {
        let src = r#""""Module docs.

import not_a_dep
from also_not import x
"""
import yes_dep
message = "import nope"
other = 'from nada import y'
single = '''import inline'''
"#;
        assert_eq!(names(src), vec!["yes_dep"]);
    }

    #[test]
    fn unparseable_lines_contribute_nothing() {
        let src = "import\nimport 3d\nimport a b c\nfrom import x\nimport ok\nimport (paren)\nimport good as 1bad\n";
        assert_eq!(names(src), vec!["ok"]);
    }

    #[test]
    fn identifiers_that_start_with_keywords_are_not_statements() {
        let src = "important = 1\nfrom_date = 2\nimports = []\n";
        assert!(names(src).is_empty());
    }

    #[test]
    fn unterminated_string_does_not_abort_scan() {
        let src = "x = \"unterminated\nimport after\n";
        assert_eq!(names(src), vec!["after"]);
    }

    #[test]
    fn duplicates_collapse() {
        let src = "import numpy\nimport numpy as np\nfrom numpy import array\n";
        assert_eq!(names(src), vec!["numpy"]);
    }

    #[test]
    fn self_import_is_dropped() {
        let source =
            SourceFile::from_bytes("helpers.py", b"import helpers\nimport attr\n".to_vec()).unwrap();
        let imports = extract_imports(&source);
        assert!(!imports.contains("helpers"));
        assert!(imports.contains("attr"));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn never_panics(text in "\\PC{0,200}") {
                let _ = scan_imports(&text);
            }

            #[test]
            fn every_name_is_a_top_level_identifier(text in "(import|from|as|[a-z._ ,;#'\"\\\\\n]){0,60}") {
                for name in scan_imports(&text).iter() {
                    prop_assert!(!name.contains('.'));
                    prop_assert!(DOTTED_NAME.is_match(name), "bad name {:?}", name);
                }
            }
        }
    }
}
