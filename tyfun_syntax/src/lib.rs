//! Lexer and parser for the sandboxed dialect in which type functions are written.
//!
//! The dialect is Lua 5.1 with a single extension, the top-level statement
//! `type function NAME(...) ... end`. Everything else (goto, integer division,
//! bitwise operators) is absent, matching the runtime the evaluator provides.

#[macro_use] extern crate log;
extern crate tyfun_env;
#[macro_use] extern crate tyfun_diag;

pub use lex::{Tok, Punct, Keyword, Lexer};
pub use ast::{Name, Str, Seq, Var, FuncBody, Ex, Exp, UnOp, BinOp, St, Stmt, Block, Chunk};
pub use parser::{Parser, ParseResult};

mod message;
pub mod lex;
pub mod ast;
pub mod parser;

use tyfun_env::{Source, Span};
use tyfun_diag::{Result, Report, Reporter};

/// Parses the entire span (typically a whole file) into a chunk.
pub fn parse_chunk(source: &Source, span: Span, report: &Report) -> Result<Chunk> {
    if let Some(data) = source.slice_from_span(span) {
        info!("parsing chunk {:#?}", span);
        let lexer = lex::Lexer::new(data, span.begin(), report);
        parser::Parser::new(lexer, report).into_chunk()
    } else {
        report.fatal(span, message::NoFileForSpan {}).done()
    }
}

#[cfg(test)]
mod tests {
    use tyfun_env::{Source, SourceFile};
    use tyfun_diag::{CollectedReport, Locale, Report};
    use super::parse_chunk;

    fn test(s: &str) -> String {
        let mut source = Source::new();
        let span = source.add(SourceFile::from_string("<test>".into(), s.into()));
        let report = CollectedReport::new(Locale::dummy());
        match parse_chunk(&source, span, &report as &Report) {
            Ok(chunk) => format!("{:?}", chunk.block.base),
            Err(_) => String::from("parse error"),
        }
    }

    #[test]
    fn test_parse_stmts() {
        assert_eq!(test("do break end; break"), "[Do([Break]), Break]");
        assert_eq!(test("local a, b"), "[Local([`a`, `b`], [])]");
        assert_eq!(test("local a = 1, 2"), "[Local([`a`], [1.0, 2.0])]");
        assert_eq!(test("a, b.c = f()"),
                   "[Assign([`a`, (`b`)[\"c\"]], [`f`()])]");
        assert_eq!(test("while true do end"), "[While(true, [])]");
        assert_eq!(test("repeat until false"), "[Repeat([], false)]");
        assert_eq!(test("if a then elseif b then else end"),
                   "[If((`a` => []), (`b` => []), [])]");
        assert_eq!(test("for i = 1, 10, 2 do end"),
                   "[For(`i`, 1.0, 10.0, Some(2.0), [])]");
        assert_eq!(test("for k, v in pairs(t) do end"),
                   "[ForIn([`k`, `v`], [`pairs`(`t`)], [])]");
        assert_eq!(test("local function r(p, ...) end"),
                   "[LocalFunc(`r`, Func([`p`, ...], []))]");
        assert_eq!(test("return 1, 2"), "[Return([1.0, 2.0])]");
    }

    #[test]
    fn test_parse_exps() {
        assert_eq!(test("f()"), "[Void(`f`())]");
        assert_eq!(test("f(3+4*5)"), "[Void(`f`((3.0 + (4.0 * 5.0))))]");
        assert_eq!(test("f((3+4)*5)"), "[Void(`f`(((3.0 + 4.0) * 5.0)))]");
        assert_eq!(test("f(2^3^4)"), "[Void(`f`((2.0 ^ (3.0 ^ 4.0))))]");
        assert_eq!(test("f(not a == b)"), "[Void(`f`(((not `a`) == `b`)))]");
        assert_eq!(test("f'oo'"), "[Void(`f`(\"oo\"))]");
        assert_eq!(test("f{a=1, [3]=4, 5}"),
                   "[Void(`f`(Table([(Some(\"a\"), 1.0), (Some(3.0), 4.0), (None, 5.0)])))]");
        assert_eq!(test("t:m(1)"), "[Void(`t`:`m`(1.0))]");
        assert_eq!(test("f(a .. b .. c)"),
                   "[Void(`f`((`a` .. (`b` .. `c`))))]");
        assert_eq!(test("--[[comment]] f() --"), "[Void(`f`())]");
    }

    #[test]
    fn test_parse_type_func() {
        assert_eq!(test("type function Id(t) return t end"),
                   "[TypeFunc(`Id`, Func([`t`], [Return([`t`])]))]");
        // `type` is an ordinary name unless followed by `function NAME`
        assert_eq!(test("type = 1"), "[Assign([`type`], [1.0])]");
        assert_eq!(test("local t = type(x)"), "[Local([`t`], [`type`(`x`)])]");
        assert_eq!(test("type function f(t) end local x = 1"),
                   "[TypeFunc(`f`, Func([`t`], [])), Local([`x`], [1.0])]");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(test("local"), "parse error");
        assert_eq!(test("f("), "parse error");
        assert_eq!(test("do end end"), "parse error");
        assert_eq!(test("return 1 return 2"), "parse error");
    }
}
