//! Regex-driven structural scanner for JS/TS-family sources.
//!
//! A real parser is deliberately not used here: review context only needs
//! declaration names, line spans and import targets, and a line-oriented
//! scan with a small comment state machine (normal / line comment / block
//! comment) gets all three. The walk is bounded by the file's line count,
//! so unbalanced braces degrade to a clamped span instead of hanging.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Kind of a scanned top-level declaration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DeclarationKind {
    Class,
    Interface,
    TypeAlias,
    Enum,
    Function,
    Const,
    Var,
    Namespace,
}

impl DeclarationKind {
    fn from_keyword(kw: &str) -> Option<Self> {
        match kw {
            "class" => Some(Self::Class),
            "interface" => Some(Self::Interface),
            "type" => Some(Self::TypeAlias),
            "enum" => Some(Self::Enum),
            "function" => Some(Self::Function),
            "const" => Some(Self::Const),
            "var" | "let" => Some(Self::Var),
            "namespace" => Some(Self::Namespace),
            _ => None,
        }
    }
}

/// Inclusive 1-indexed line range of a declaration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineSpan {
    pub start_line: u32,
    pub end_line: u32,
}

/// A named top-level construct with its line span and the import targets
/// textually referenced inside that span.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclarationKind,
    pub name: String,
    pub exported: bool,
    pub span: LineSpan,
    pub dependencies: Vec<String>,
}

/// One source line after comment stripping.
struct ScanLine {
    /// Line text with block-comment regions removed; empty for comment-only lines.
    text: String,
    /// True when the raw line held nothing but comment.
    comment_only: bool,
}

/// Extracts top-level declarations with spans and per-span import references.
///
/// A file with zero declarations yields an empty vector, not an error.
pub fn extract_declarations(content: &str) -> Vec<Declaration> {
    let decl_re = Regex::new(
        r"^\s*(?:export\s+)?(?:default\s+)?(?:declare\s+)?(?:abstract\s+)?(?:async\s+)?(class|interface|type|enum|function|const|var|let|namespace)\s+([A-Za-z_$][A-Za-z0-9_$]*)",
    )
    .unwrap();

    let imports = extract_imports(content);
    let raw_lines: Vec<&str> = content.lines().collect();
    let scan = preprocess(&raw_lines);

    // Depth at the start of each line, so only depth-0 matches count as
    // top-level declarations and nested keywords stay invisible.
    let mut depth_before = vec![0i32; scan.len()];
    let mut depth = 0i32;
    for (i, line) in scan.iter().enumerate() {
        depth_before[i] = depth;
        depth += brace_delta(&line.text);
    }

    let mut out = Vec::new();
    for (i, line) in scan.iter().enumerate() {
        if line.comment_only || depth_before[i] != 0 {
            continue;
        }
        let Some(caps) = decl_re.captures(&line.text) else {
            continue;
        };
        let Some(kind) = DeclarationKind::from_keyword(&caps[1]) else {
            continue;
        };

        let end = find_declaration_end(&scan, i);
        let span_text = raw_lines[i..=end].join("\n");
        let dependencies = imports
            .iter()
            .filter(|t| span_text.contains(t.as_str()))
            .cloned()
            .collect();

        out.push(Declaration {
            kind,
            name: caps[2].to_string(),
            exported: line.text.trim_start().starts_with("export"),
            span: LineSpan {
                start_line: (i + 1) as u32,
                end_line: (end + 1) as u32,
            },
            dependencies,
        });
    }
    out
}

/// Extracts resolved import targets in statement order, de-duplicated.
///
/// All clause shapes match (default, named, namespace, bare side-effect
/// imports); statements importing through a vendored path are dropped.
pub fn extract_imports(content: &str) -> Vec<String> {
    let import_re = Regex::new(r#"(?m)^\s*import\s+(?:[^'"]*?\s+from\s+)?['"]([^'"]+)['"]"#).unwrap();

    let mut out: Vec<String> = Vec::new();
    for caps in import_re.captures_iter(content) {
        let raw = &caps[1];
        if raw.contains("node_modules") {
            continue;
        }
        let resolved = resolve_import_path(raw);
        if !out.contains(&resolved) {
            out.push(resolved);
        }
    }
    out
}

/// Normalizes a raw import path to its target identifier.
///
/// Relative paths stay verbatim; scoped packages keep scope + name; plain
/// packages reduce to the package name.
pub fn resolve_import_path(raw: &str) -> String {
    if raw.starts_with('.') {
        return raw.to_string();
    }
    let mut segments = raw.split('/');
    let first = segments.next().unwrap_or(raw);
    if raw.starts_with('@') {
        match segments.next() {
            Some(second) => format!("{first}/{second}"),
            None => first.to_string(),
        }
    } else {
        first.to_string()
    }
}

/// Strips comments line-by-line, carrying block-comment state across lines.
fn preprocess(raw_lines: &[&str]) -> Vec<ScanLine> {
    let mut out = Vec::with_capacity(raw_lines.len());
    let mut in_block = false;

    for raw in raw_lines {
        let mut text = String::new();
        let mut rest = *raw;
        loop {
            if in_block {
                match rest.find("*/") {
                    Some(pos) => {
                        rest = &rest[pos + 2..];
                        in_block = false;
                    }
                    None => break,
                }
            } else {
                match rest.find("/*") {
                    Some(pos) => {
                        text.push_str(&rest[..pos]);
                        rest = &rest[pos + 2..];
                        in_block = true;
                    }
                    None => {
                        text.push_str(rest);
                        break;
                    }
                }
            }
        }

        let mut comment_only = text.trim().is_empty() && !raw.trim().is_empty();
        if text.trim_start().starts_with("//") {
            comment_only = true;
            text.clear();
        }
        out.push(ScanLine { text, comment_only });
    }
    out
}

fn brace_delta(text: &str) -> i32 {
    let opens = text.matches('{').count() as i32;
    let closes = text.matches('}').count() as i32;
    opens - closes
}

/// Walks forward from `start` counting brace depth; the declaration ends on
/// the first non-comment line where depth is back to zero and no `{` opens.
/// Files that never converge end at their last line.
fn find_declaration_end(scan: &[ScanLine], start: usize) -> usize {
    let mut depth = 0i32;
    for (j, line) in scan.iter().enumerate().skip(start) {
        if line.comment_only {
            continue;
        }
        depth += brace_delta(&line.text);
        if depth <= 0 && !line.text.contains('{') {
            return j;
        }
    }
    scan.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_exported_function_span() {
        let src = "\
// greeting helper

export function greet(name: string): string {
  if (!name) {
    return 'hi';
  }
}";
        let decls = extract_declarations(src);
        assert_eq!(decls.len(), 1);
        let d = &decls[0];
        assert_eq!(d.kind, DeclarationKind::Function);
        assert_eq!(d.name, "greet");
        assert!(d.exported);
        assert_eq!(d.span, LineSpan { start_line: 3, end_line: 7 });
        assert!(d.dependencies.is_empty());
    }

    #[test]
    fn braceless_const_ends_on_its_own_line() {
        let src = "const VERSION = '1.2.3';\n";
        let decls = extract_declarations(src);
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].kind, DeclarationKind::Const);
        assert_eq!(decls[0].name, "VERSION");
        assert!(!decls[0].exported);
        assert_eq!(decls[0].span, LineSpan { start_line: 1, end_line: 1 });
    }

    #[test]
    fn nested_declarations_are_not_reported() {
        let src = "\
export class Store {
  load() {
    const cached = 1;
    return cached;
  }
}";
        let decls = extract_declarations(src);
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "Store");
        assert_eq!(decls[0].span, LineSpan { start_line: 1, end_line: 6 });
    }

    #[test]
    fn braces_inside_comments_do_not_count() {
        let src = "\
export function parse(input: string) {
  // { this never closes
  /* neither do these: {{{
     still comment } */
  return input.length;
}
const AFTER = 2;";
        let decls = extract_declarations(src);
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].name, "parse");
        assert_eq!(decls[0].span, LineSpan { start_line: 1, end_line: 6 });
        assert_eq!(decls[1].name, "AFTER");
        assert_eq!(decls[1].span, LineSpan { start_line: 7, end_line: 7 });
    }

    #[test]
    fn unbalanced_braces_clamp_to_file_end() {
        let src = "\
function broken() {
  if (x) {
  return 1;
}";
        let decls = extract_declarations(src);
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].span, LineSpan { start_line: 1, end_line: 4 });
    }

    #[test]
    fn let_scans_as_var_kind() {
        let src = "let counter = 0;\nvar legacy = 1;\n";
        let decls = extract_declarations(src);
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].kind, DeclarationKind::Var);
        assert_eq!(decls[0].name, "counter");
        assert_eq!(decls[1].kind, DeclarationKind::Var);
    }

    #[test]
    fn interface_and_type_alias_kinds() {
        let src = "\
export interface Config {
  retries: number;
}
type Mode = 'strict' | 'tolerant';";
        let decls = extract_declarations(src);
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].kind, DeclarationKind::Interface);
        assert!(decls[0].exported);
        assert_eq!(decls[1].kind, DeclarationKind::TypeAlias);
        assert!(!decls[1].exported);
    }

    #[test]
    fn no_declarations_is_empty_not_error() {
        assert!(extract_declarations("").is_empty());
        assert!(extract_declarations("1 + 1;\n").is_empty());
    }

    #[test]
    fn reexport_span_references_import_target() {
        let src = "\
import { helper } from './utils';

export const util = './utils';
";
        let decls = extract_declarations(src);
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].dependencies, vec!["./utils".to_string()]);
    }

    #[test]
    fn import_shapes_and_resolution() {
        let src = "\
import def from './utils';
import { a, b } from '@scope/pkg/sub';
import * as ns from 'lodash/fp';
import 'reflect-metadata';
";
        let targets = extract_imports(src);
        assert_eq!(
            targets,
            vec![
                "./utils".to_string(),
                "@scope/pkg".to_string(),
                "lodash".to_string(),
                "reflect-metadata".to_string(),
            ]
        );
    }

    #[test]
    fn multiline_named_import_matches() {
        let src = "import {\n  first,\n  second,\n} from './many';\n";
        assert_eq!(extract_imports(src), vec!["./many".to_string()]);
    }

    #[test]
    fn duplicate_targets_collapse() {
        let src = "import { a } from './x';\nimport { b } from './x';\n";
        assert_eq!(extract_imports(src), vec!["./x".to_string()]);
    }

    #[test]
    fn vendored_imports_are_excluded() {
        let src = "import hack from '../node_modules/leftpad';\nimport ok from './fine';\n";
        assert_eq!(extract_imports(src), vec!["./fine".to_string()]);
    }

    #[test]
    fn relative_paths_resolve_verbatim() {
        assert_eq!(resolve_import_path("./utils"), "./utils");
        assert_eq!(resolve_import_path("../deep/mod"), "../deep/mod");
        assert_eq!(resolve_import_path("@scope/pkg/sub/dir"), "@scope/pkg");
        assert_eq!(resolve_import_path("lodash/fp"), "lodash");
        assert_eq!(resolve_import_path("react"), "react");
    }
}
