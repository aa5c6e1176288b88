//! Layer compression.
//!
//! A [`CompressorBackend`] is picked once per build from the parsed
//! [`OptimizeSetting`]. All bundled backends parse with oxc, optionally
//! drop console calls, run the oxc minifier and print with oxc codegen.

use std::fmt;

use oxc_allocator::{Allocator, Vec as ArenaVec};
use oxc_ast::ast::{Expression, Program, Statement};
use oxc_ast_visit::{VisitMut, walk_mut};
use oxc_codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc_minifier::{
    CompressOptions as MinifierCompressOptions, MangleOptions, Minifier, MinifierOptions,
};
use oxc_parser::Parser;
use oxc_span::SourceType;

use strata_config::{OptimizeMode, OptimizeSetting, StripConsole};

use crate::diagnostics::Diagnostics;

/// Per-call knobs handed to a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressOptions {
    /// Keep one statement per line instead of collapsing whitespace.
    pub keep_lines: bool,
    pub strip_console: StripConsole,
}

impl CompressOptions {
    pub fn new(keep_lines: bool, strip_console: StripConsole) -> Self {
        Self {
            keep_lines,
            strip_console,
        }
    }
}

/// A JavaScript compressor.
pub trait CompressorBackend: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn compress(
        &self,
        source: &str,
        filename_hint: &str,
        options: &CompressOptions,
    ) -> anyhow::Result<String>;
}

/// Backend for a parsed optimize switch, `None` when optimization is off.
pub fn backend_for(setting: OptimizeSetting) -> Option<Box<dyn CompressorBackend>> {
    match setting.mode {
        OptimizeMode::None => None,
        OptimizeMode::Comments => Some(Box::new(CommentsBackend)),
        OptimizeMode::Minify => Some(Box::new(MinifyBackend)),
        OptimizeMode::Optimizing => Some(Box::new(OptimizingCompilerBackend)),
    }
}

/// Removes `console.<method>(...)` expression statements.
struct ConsoleStripper {
    level: StripConsole,
    removed: usize,
}

impl ConsoleStripper {
    fn is_stripped(&self, stmt: &Statement<'_>) -> bool {
        let Statement::ExpressionStatement(expr) = stmt else {
            return false;
        };
        let Expression::CallExpression(call) = &expr.expression else {
            return false;
        };
        let Expression::StaticMemberExpression(member) = &call.callee else {
            return false;
        };
        let Expression::Identifier(object) = &member.object else {
            return false;
        };
        object.name.as_str() == "console" && self.level.strips(member.property.name.as_str())
    }
}

impl<'a> VisitMut<'a> for ConsoleStripper {
    fn visit_statements(&mut self, stmts: &mut ArenaVec<'a, Statement<'a>>) {
        let before = stmts.len();
        stmts.retain(|stmt| !self.is_stripped(stmt));
        self.removed += before - stmts.len();
        walk_mut::walk_statements(self, stmts);
    }
}

fn strip_console(program: &mut Program<'_>, level: StripConsole) -> usize {
    if level == StripConsole::None {
        return 0;
    }
    let mut stripper = ConsoleStripper { level, removed: 0 };
    stripper.visit_program(program);
    stripper.removed
}

/// Shared parse, strip, minify, print pipeline.
fn run_oxc(
    source: &str,
    filename: &str,
    options: &CompressOptions,
    minifier: Option<MinifierOptions>,
    minify_output: bool,
) -> anyhow::Result<String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::cjs()).parse();
    if ret.panicked || !ret.errors.is_empty() {
        let messages: Vec<String> = ret.errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("Failed to parse {}: {}", filename, messages.join("; "));
    }
    let mut program = ret.program;

    let removed = strip_console(&mut program, options.strip_console);
    if removed > 0 {
        tracing::debug!(file = %filename, removed, "stripped console calls");
    }

    let scoping = minifier.and_then(|opts| Minifier::new(opts).minify(&allocator, &mut program).scoping);

    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: minify_output,
            comments: CommentOptions::disabled(),
            ..Default::default()
        })
        .with_scoping(scoping)
        .build(&program)
        .code;
    Ok(code)
}

/// Comment removal only.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentsBackend;

impl CompressorBackend for CommentsBackend {
    fn name(&self) -> &'static str {
        "comments"
    }

    fn compress(&self, source: &str, filename_hint: &str, options: &CompressOptions) -> anyhow::Result<String> {
        let code = run_oxc(source, filename_hint, options, None, false)?;
        // Bundles are evaluated as bare object expressions.
        if filename_hint.contains("/nls/") {
            let trimmed = code.trim_end();
            if let Some(stripped) = trimmed.strip_suffix(';') {
                return Ok(stripped.to_string());
            }
        }
        Ok(code)
    }
}

/// Identifier mangling and whitespace removal.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinifyBackend;

impl CompressorBackend for MinifyBackend {
    fn name(&self) -> &'static str {
        "shrinksafe"
    }

    fn compress(&self, source: &str, filename_hint: &str, options: &CompressOptions) -> anyhow::Result<String> {
        let minifier = MinifierOptions {
            mangle: Some(MangleOptions::default()),
            compress: None,
        };
        run_oxc(source, filename_hint, options, Some(minifier), !options.keep_lines)
    }
}

/// Full compression plus mangling.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizingCompilerBackend;

impl CompressorBackend for OptimizingCompilerBackend {
    fn name(&self) -> &'static str {
        "closure"
    }

    fn compress(&self, source: &str, filename_hint: &str, options: &CompressOptions) -> anyhow::Result<String> {
        let minifier = MinifierOptions {
            mangle: Some(MangleOptions::default()),
            compress: Some(MinifierCompressOptions::default()),
        };
        run_oxc(source, filename_hint, options, Some(minifier), !options.keep_lines)
    }
}

/// Compress `code`, falling back to the input on failure.
pub fn optimize(
    code: &str,
    filename: &str,
    backend: &dyn CompressorBackend,
    options: &CompressOptions,
    diagnostics: &Diagnostics,
) -> String {
    diagnostics.log("optimize", ["file", filename, "backend", backend.name()]);
    match backend.compress(code, filename, options) {
        Ok(out) => {
            diagnostics.log("optimizeDone", ["file", filename]);
            out
        }
        Err(e) => {
            let message = format!("{e:#}");
            diagnostics.log_optimizer_output(&format!("{filename}: {message}\n"));
            diagnostics.log("optimizeFailedWrite", ["file", filename, "error", message.as_str()]);
            code.to_string()
        }
    }
}
