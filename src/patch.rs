use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::ast::{ParseError, SourceAst};
use crate::error::PatchConflict;
use crate::source::{GeneratedFile, GeneratedSource};
use crate::span::SourceSpan;
use crate::variant::{Base, Gene, Operation};

/// Apply a single textual replacement to `code` based on `span`.
///
/// The `span` offsets are byte indices into `code`.
pub fn apply_span_patch(code: &str, span: &SourceSpan, replacement: &str) -> String {
    debug_assert!(
        span.end <= code.len(),
        "span [{}, {}) is out of bounds for code length {}",
        span.start,
        span.end,
        code.len()
    );

    let mut out =
        String::with_capacity(code.len() + replacement.len().saturating_sub(span.len()));
    out.push_str(&code[..span.start]);
    out.push_str(replacement);
    out.push_str(&code[span.end..]);
    out
}

/// An edit produced text that no longer parses.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("syntax error in {file:?} after base {base}: {error}")]
pub struct InvalidSource {
    pub file: PathBuf,
    pub base: usize,
    pub error: ParseError,
}

/// Generated program plus the bases that could not be applied.
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    pub source: GeneratedSource,

    /// Index into the gene and the reason it was skipped.
    pub skipped: Vec<(usize, PatchConflict)>,
}

enum BaseError {
    Conflict(PatchConflict),
    Syntax(ParseError),
}

impl From<PatchConflict> for BaseError {
    fn from(conflict: PatchConflict) -> Self {
        BaseError::Conflict(conflict)
    }
}

/// Apply every base of `gene` to `original`.
///
/// Each base resolves against the text the bases before it produced. A base
/// whose statement is gone, changed or moved is skipped.
pub fn apply_gene(original: &GeneratedSource, gene: &Gene) -> Result<PatchOutcome, InvalidSource> {
    let mut edited: BTreeMap<PathBuf, SourceAst> = BTreeMap::new();
    let mut skipped = Vec::new();

    for (i, base) in gene.bases().iter().enumerate() {
        match apply_base(original, &mut edited, base) {
            Ok(()) => {}
            Err(BaseError::Conflict(conflict)) => {
                tracing::debug!(stage = "patch", base = i, %conflict, "skipping base");
                skipped.push((i, conflict));
            }
            Err(BaseError::Syntax(error)) => {
                return Err(InvalidSource {
                    file: base.location.file.clone(),
                    base: i,
                    error,
                });
            }
        }
    }

    let mut source = original.clone();
    for (_, ast) in edited {
        source = source.with_file(GeneratedFile::from_ast(ast));
    }
    Ok(PatchOutcome { source, skipped })
}

fn apply_base(
    original: &GeneratedSource,
    edited: &mut BTreeMap<PathBuf, SourceAst>,
    base: &Base,
) -> Result<(), BaseError> {
    let location = &base.location;
    if base.operation == Operation::NoOp {
        return Ok(());
    }

    let ast = match edited.get(&location.file) {
        Some(ast) => ast,
        None => original
            .file(&location.file)
            .and_then(|f| f.ast())
            .ok_or_else(|| PatchConflict::UnknownFile(location.file.clone()))?,
    };

    let stmt = ast
        .resolve(&location.path)
        .ok_or_else(|| PatchConflict::Unresolved {
            file: location.file.clone(),
            path: location.path.clone(),
        })?;
    if stmt.kind != location.kind || ast.text_of(stmt) != location.text {
        return Err(PatchConflict::Modified {
            file: location.file.clone(),
            path: location.path.clone(),
        }
        .into());
    }
    // A base is taken against the program its earlier bases produced; a path
    // that lands on an equal statement elsewhere came from another lineage.
    if stmt.lines != location.lines {
        return Err(PatchConflict::Moved {
            file: location.file.clone(),
            path: location.path.clone(),
            expected: location.lines.start,
            found: stmt.lines.start,
        }
        .into());
    }

    let in_list = ast
        .parent_kind(&location.path)
        .is_none_or(|kind| kind.holds_statement_list())
        && !ast.text()[..stmt.span.start].trim_end().ends_with("->");

    let replacement = match (&base.operation, in_list) {
        (Operation::Delete, true) => String::new(),
        (Operation::Delete, false) => "{}".to_string(),
        (Operation::Insert { donor }, true) => format!("{} {}", donor.text, location.text),
        (Operation::Insert { donor }, false) => format!("{{ {} {} }}", donor.text, location.text),
        (Operation::Replace { donor }, true) => donor.text.clone(),
        (Operation::Replace { donor }, false) => format!("{{ {} }}", donor.text),
        (Operation::NoOp, _) => return Ok(()),
    };

    let text = apply_span_patch(ast.text(), &stmt.span, &replacement);
    let reparsed = SourceAst::parse(location.file.clone(), text).map_err(BaseError::Syntax)?;
    edited.insert(location.file.clone(), reparsed);
    Ok(())
}
