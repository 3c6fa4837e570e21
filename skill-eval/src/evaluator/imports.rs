//! Structural import extraction.
//!
//! Imports are compared as declared `(module, name)` pairs rather than as text,
//! so `from a import B, C` declares the same names as two separate statements
//! and a parenthesized multi-line import is read as one declaration list.

use crate::criteria::Language;
use std::collections::BTreeSet;
use std::fmt;

/// One declared import.
///
/// `name` is `None` for whole-module imports (`import os`, `using System.Text;`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImportDecl {
    pub module: String,
    pub name: Option<String>,
}

impl ImportDecl {
    pub fn module(module: impl Into<String>) -> Self {
        Self { module: module.into(), name: None }
    }

    pub fn named(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self { module: module.into(), name: Some(name.into()) }
    }
}

impl fmt::Display for ImportDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "from {} import {}", self.module, name),
            None => write!(f, "import {}", self.module),
        }
    }
}

/// Imports and remaining lines of a code fragment.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImportScan {
    /// Declared imports in source order, de-duplicated
    pub imports: Vec<ImportDecl>,
    /// `(1-based line number, raw line)` for every line that is not part of an import
    pub other_lines: Vec<(usize, String)>,
}

impl ImportScan {
    pub fn declared(&self) -> BTreeSet<ImportDecl> {
        self.imports.iter().cloned().collect()
    }

    fn push_import(&mut self, decl: ImportDecl) {
        if !self.imports.contains(&decl) {
            self.imports.push(decl);
        }
    }
}

/// Split `code` into its import declarations and everything else.
pub fn scan_imports(code: &str, language: &Language) -> ImportScan {
    let mut scan = ImportScan::default();
    let lines: Vec<&str> = code.lines().collect();
    let mut open_string: Option<&'static str> = None;
    let mut i = 0;

    while i < lines.len() {
        let trimmed = lines[i].trim();
        if *language == Language::Python && open_string.is_some() {
            open_string = python_string_state(lines[i], open_string);
            scan.other_lines.push((i + 1, lines[i].to_string()));
            i += 1;
            continue;
        }

        let statement = match language {
            Language::Python => python_statement(&lines, i),
            Language::TypeScript | Language::JavaScript => ecmascript_statement(&lines, i),
            Language::Java | Language::CSharp => {
                single_line_statement(trimmed, language).map(|decls| (decls, 1))
            }
            Language::Other(_) => None,
        };

        match statement {
            Some((decls, consumed)) => {
                for decl in decls {
                    scan.push_import(decl);
                }
                i += consumed.max(1);
            }
            None => {
                if *language == Language::Python {
                    open_string = python_string_state(lines[i], None);
                }
                scan.other_lines.push((i + 1, lines[i].to_string()));
                i += 1;
            }
        }
    }

    scan
}

/// Declarations of a single import statement such as a forbidden import from a rule.
///
/// Returns an empty list when `statement` is not an import in `language`.
pub fn parse_import_statement(statement: &str, language: &Language) -> Vec<ImportDecl> {
    scan_imports(statement, language).imports
}

fn python_statement(lines: &[&str], start: usize) -> Option<(Vec<ImportDecl>, usize)> {
    let first = strip_python_comment(lines[start]).trim();

    if let Some(rest) = first.strip_prefix("from ") {
        let (module, names) = rest.split_once(" import ")?;
        let module = module.trim();
        if module.is_empty() {
            return None;
        }

        let mut names = names.trim().to_string();
        let mut consumed = 1;
        let continues =
            |n: &str| (n.starts_with('(') && !n.contains(')')) || n.ends_with('\\');
        while continues(&names) && start + consumed < lines.len() {
            names = names.trim_end_matches('\\').to_string();
            names.push(' ');
            names.push_str(strip_python_comment(lines[start + consumed]).trim());
            consumed += 1;
        }

        let names = names.trim_start_matches('(').trim_end_matches(')');
        let decls = names
            .split(',')
            .filter_map(|n| n.split_whitespace().next())
            .map(|n| ImportDecl::named(module, n.trim_matches(['(', ')', '\\'])))
            .filter(|d| d.name.as_deref().is_some_and(|n| !n.is_empty()))
            .collect();
        return Some((decls, consumed));
    }

    if let Some(rest) = first.strip_prefix("import ") {
        let decls = rest
            .split(',')
            .filter_map(|m| m.split_whitespace().next())
            .map(ImportDecl::module)
            .collect::<Vec<_>>();
        if decls.is_empty() {
            return None;
        }
        return Some((decls, 1));
    }

    None
}

/// Triple-quoted string still open at the end of `line`, given the one open at its start.
fn python_string_state(line: &str, mut open: Option<&'static str>) -> Option<&'static str> {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let rest = &bytes[i..];
        match open {
            Some(delim) => {
                if bytes[i] == b'\\' {
                    i += 2;
                    continue;
                }
                if rest.starts_with(delim.as_bytes()) {
                    open = None;
                    i += delim.len();
                    continue;
                }
            }
            None => {
                if bytes[i] == b'#' {
                    break;
                }
                let opened = ["\"\"\"", "'''"].into_iter().find(|d| rest.starts_with(d.as_bytes()));
                if let Some(delim) = opened {
                    open = Some(delim);
                    i += delim.len();
                    continue;
                }
                if matches!(bytes[i], b'"' | b'\'') {
                    // Single-quoted literal: skip to its closing quote on this line.
                    let quote = bytes[i];
                    i += 1;
                    while i < bytes.len() && bytes[i] != quote {
                        i += if bytes[i] == b'\\' { 2 } else { 1 };
                    }
                }
            }
        }
        i += 1;
    }
    open
}

fn strip_python_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn ecmascript_statement(lines: &[&str], start: usize) -> Option<(Vec<ImportDecl>, usize)> {
    let first = lines[start].trim();
    if !first.starts_with("import ") && !first.starts_with("import{") {
        return None;
    }

    // `import {\n A,\n B\n} from 'm';` spans lines until the module specifier.
    let mut statement = first.to_string();
    let mut consumed = 1;
    while !has_module_specifier(&statement) && start + consumed < lines.len() {
        statement.push(' ');
        statement.push_str(lines[start + consumed].trim());
        consumed += 1;
    }

    let body = statement.trim_start_matches("import").trim().trim_end_matches(';').trim();
    let body = body.strip_prefix("type ").unwrap_or(body).trim();

    // Side-effect import: `import 'polyfill';`
    if let Some(module) = quoted(body) {
        return Some((vec![ImportDecl::module(module)], consumed));
    }

    let (clause, specifier) = body.rsplit_once(" from ")?;
    let module = quoted(specifier)?;
    let mut decls = Vec::new();

    let (outside, braced) = match (clause.find('{'), clause.rfind('}')) {
        (Some(open), Some(close)) if open < close => {
            (format!("{}{}", &clause[..open], &clause[close + 1..]), Some(&clause[open + 1..close]))
        }
        _ => (clause.to_string(), None),
    };

    for part in outside.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if part.starts_with('*') {
            decls.push(ImportDecl::named(&module, "*"));
        } else if let Some(default) = part.split_whitespace().next() {
            decls.push(ImportDecl::named(&module, default));
        }
    }

    if let Some(braced) = braced {
        for part in braced.split(',').map(str::trim) {
            let part = part.strip_prefix("type ").unwrap_or(part);
            if let Some(name) = part.split_whitespace().next() {
                decls.push(ImportDecl::named(&module, name));
            }
        }
    }

    Some((decls, consumed))
}

fn has_module_specifier(statement: &str) -> bool {
    let body = statement.trim_start_matches("import").trim();
    body.starts_with(['\'', '"'])
        || body.rsplit_once(" from ").is_some_and(|(_, s)| quoted(s).is_some())
}

fn quoted(text: &str) -> Option<String> {
    let text = text.trim().trim_end_matches(';').trim();
    let quote = text.chars().next().filter(|c| matches!(c, '\'' | '"' | '`'))?;
    let inner = text[1..].split(quote).next()?;
    text[1..].contains(quote).then(|| inner.to_string())
}

fn single_line_statement(line: &str, language: &Language) -> Option<Vec<ImportDecl>> {
    let keyword = match language {
        Language::Java => "import ",
        Language::CSharp => "using ",
        _ => return None,
    };
    let rest = line.strip_prefix(keyword)?.trim();
    let rest = rest.strip_suffix(';')?.trim();
    let rest = rest.strip_prefix("static ").unwrap_or(rest).trim();

    // C# alias form: `using Json = System.Text.Json;`
    let target = match rest.split_once('=') {
        Some((alias, target)) if is_path(alias.trim()) => target.trim(),
        Some(_) => return None,
        None => rest,
    };

    // `using var x = ...;` and `using (...)` are statements, not directives.
    if !is_path(target) {
        return None;
    }

    Some(vec![ImportDecl::module(target)])
}

fn is_path(text: &str) -> bool {
    !text.is_empty()
        && !text.contains(char::is_whitespace)
        && text.chars().all(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '*'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decls(code: &str, language: Language) -> Vec<ImportDecl> {
        scan_imports(code, &language).imports
    }

    #[test]
    fn python_from_import_declares_each_name() {
        let code = "from azure.cosmos import CosmosClient, PartitionKey as PK";
        let found = decls(code, Language::Python);
        assert_eq!(
            found,
            vec![
                ImportDecl::named("azure.cosmos", "CosmosClient"),
                ImportDecl::named("azure.cosmos", "PartitionKey"),
            ]
        );
    }

    #[test]
    fn python_parenthesized_multiline_import() {
        let code = "from azure.ai.agents.models import (\n    FunctionTool,  # tools\n    ToolSet,\n)\nclient = make()";
        let scan = scan_imports(code, &Language::Python);
        assert_eq!(
            scan.imports,
            vec![
                ImportDecl::named("azure.ai.agents.models", "FunctionTool"),
                ImportDecl::named("azure.ai.agents.models", "ToolSet"),
            ]
        );
        assert_eq!(scan.other_lines, vec![(5, "client = make()".to_string())]);
    }

    #[test]
    fn python_plain_and_indented_imports() {
        let code = "import os, sys\ntry:\n    import json\nexcept ImportError:\n    pass";
        let found = decls(code, Language::Python);
        assert_eq!(
            found,
            vec![ImportDecl::module("os"), ImportDecl::module("sys"), ImportDecl::module("json")]
        );
    }

    #[test]
    fn python_from_text_in_strings_is_not_an_import() {
        assert!(decls("message = 'from here import there'", Language::Python).is_empty());
    }

    #[test]
    fn python_imports_inside_docstrings_are_ignored() {
        let code = "def make():\n    \"\"\"Do not use:\n\n    from azure.cosmos.aio import CosmosClient\n    from azure.identity import DefaultAzureCredential\n    \"\"\"\n    from azure.cosmos import CosmosClient\n    return CosmosClient(url)";
        let scan = scan_imports(code, &Language::Python);
        assert_eq!(scan.imports, vec![ImportDecl::named("azure.cosmos", "CosmosClient")]);
        assert!(scan.other_lines.iter().any(|(n, l)| *n == 4 && l.contains("azure.cosmos.aio")));
    }

    #[test]
    fn python_single_line_docstring_does_not_open_a_string() {
        let code = "'''Module docstring.'''\nx = \"'''\"\nimport os";
        assert_eq!(decls(code, Language::Python), vec![ImportDecl::module("os")]);
    }

    #[test]
    fn typescript_named_default_and_star_imports() {
        let code = "import Client, { AzureKeyCredential, type Options as O } from \"@azure/ai\";\nimport * as fs from 'fs';\nimport 'reflect-metadata';";
        let found = decls(code, Language::TypeScript);
        assert_eq!(
            found,
            vec![
                ImportDecl::named("@azure/ai", "Client"),
                ImportDecl::named("@azure/ai", "AzureKeyCredential"),
                ImportDecl::named("@azure/ai", "Options"),
                ImportDecl::named("fs", "*"),
                ImportDecl::module("reflect-metadata"),
            ]
        );
    }

    #[test]
    fn typescript_multiline_braces() {
        let code = "import {\n  BlobServiceClient,\n  ContainerClient,\n} from '@azure/storage-blob';\nconst x = 1;";
        let scan = scan_imports(code, &Language::TypeScript);
        assert_eq!(scan.imports.len(), 2);
        assert_eq!(scan.other_lines, vec![(5, "const x = 1;".to_string())]);
    }

    #[test]
    fn csharp_using_directives_only() {
        let code = "using Azure.Identity;\nusing static System.Math;\nusing Json = System.Text.Json;\nusing var client = new HttpClient();\nusing (var s = Open()) { }";
        let scan = scan_imports(code, &Language::CSharp);
        assert_eq!(
            scan.imports,
            vec![
                ImportDecl::module("Azure.Identity"),
                ImportDecl::module("System.Math"),
                ImportDecl::module("System.Text.Json"),
            ]
        );
        assert_eq!(scan.other_lines.len(), 2);
    }

    #[test]
    fn java_imports() {
        let code = "import com.azure.core.credential.TokenCredential;\nimport java.util.*;";
        let found = decls(code, Language::Java);
        assert_eq!(
            found,
            vec![
                ImportDecl::module("com.azure.core.credential.TokenCredential"),
                ImportDecl::module("java.util.*"),
            ]
        );
    }

    #[test]
    fn parses_single_forbidden_statement() {
        let found =
            parse_import_statement("from azure.cosmos.aio import CosmosClient", &Language::Python);
        assert_eq!(found, vec![ImportDecl::named("azure.cosmos.aio", "CosmosClient")]);
        assert!(parse_import_statement("client.close()", &Language::Python).is_empty());
    }

    #[test]
    fn display_is_canonical() {
        assert_eq!(ImportDecl::named("a.b", "C").to_string(), "from a.b import C");
        assert_eq!(ImportDecl::module("os").to_string(), "import os");
    }
}
