//! The parser.
//!
//! The grammar is Lua 5.1 plus one extension: a top-level statement
//! `type function NAME(...) ... end` declaring a type function.
//! `type` is not a keyword, so the parser uses a second lookahead token
//! to distinguish the declaration from an ordinary use of a `type` variable.

use std::iter;
use std::fmt;

use tyfun_env::{Pos, Span, Spanned, WithLoc};
use tyfun_diag as diag;
use tyfun_diag::{Stop, Report, Reporter, Localize, Locale};
use lex::{Tok, Punct, Keyword};
use ast::{Name, Str, Seq, Var, FuncBody, Ex, Exp, UnOp, BinOp, St, Stmt, Block, Chunk};
use message as m;

pub struct Parser<'a, T> {
    iter: iter::Fuse<T>,

    // the lookahead stream (in this order, followed by `self.iter`)
    lookahead: Option<Spanned<Tok>>,
    lookahead2: Option<Spanned<Tok>>,

    // the spans for the most recently read tokens
    last_span: Span,
    last_span2: Span,

    // zero before `parse_block` is first entered, used to confine `type function`
    block_depth: usize,

    report: &'a Report,
}

pub type ParseResult<T> = diag::Result<T>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct EOF; // a placeholder arg to `expect`

impl Localize for EOF {
    fn fmt_localized(&self, f: &mut fmt::Formatter, locale: Locale) -> fmt::Result {
        match &locale[..] {
            "ko" => write!(f, "파일의 끝"),
            _ => write!(f, "the end of file"),
        }
    }
}

trait Expectable: Localize {
    fn check_token(&self, tok: &Tok) -> bool;
}

impl Expectable for Punct {
    fn check_token(&self, tok: &Tok) -> bool { tok == &Tok::Punct(*self) }
}

impl Expectable for Keyword {
    fn check_token(&self, tok: &Tok) -> bool { tok == &Tok::Keyword(*self) }
}

impl Expectable for EOF {
    fn check_token(&self, tok: &Tok) -> bool { tok == &Tok::EOF }
}

impl<'a, T: Iterator<Item=Spanned<Tok>>> Parser<'a, T> {
    pub fn new(iter: T, report: &'a Report) -> Parser<'a, T> {
        let mut parser = Parser {
            iter: iter.fuse(),
            lookahead: None,
            lookahead2: None,
            last_span: Span::dummy(),
            last_span2: Span::dummy(),
            block_depth: 0,
            report: report,
        };
        // read the first token and fill the last_span
        let first = parser._next().expect("lexer gave no token");
        parser.last_span = first.span.begin().into();
        parser.lookahead = Some(first);
        parser
    }

    fn _next(&mut self) -> Option<Spanned<Tok>> {
        self.iter.next()
    }

    fn _read(&mut self) -> Spanned<Tok> {
        let next = self.lookahead.take().or_else(|| self.lookahead2.take())
                                        .or_else(|| self._next());
        next.expect("Parser::read tried to read past EOF")
    }

    fn read(&mut self) -> ParseResult<Spanned<Tok>> {
        let next = self._read();
        if next.base == Tok::Error {
            // the lexer has issued an error already
            Err(Stop)
        } else {
            self.last_span2 = self.last_span;
            self.last_span = next.span;
            Ok(next)
        }
    }

    fn _unread(&mut self, tok: Spanned<Tok>) {
        assert!(self.lookahead.is_none() || self.lookahead2.is_none(),
                "at most two lookahead tokens are supported");
        if let Some(tok) = self.lookahead.take() {
            self.lookahead2 = Some(tok);
        }
        self.lookahead = Some(tok);
    }

    fn unread(&mut self, tok: Spanned<Tok>) {
        self._unread(tok);
        self.last_span = self.last_span2;
        self.last_span2 = Span::dummy();
    }

    fn peek<'b>(&'b mut self) -> &'b Spanned<Tok> {
        if self.lookahead.is_none() {
            // do not use `self.read()`; it may fail on an error token, but we can delay that
            let tok = self._read();
            self._unread(tok);
        }
        self.lookahead.as_ref().expect("lookahead disappeared")
    }

    fn expect<Exp: Expectable>(&mut self, exp: Exp) -> ParseResult<()> {
        let read = self.read()?;
        if !exp.check_token(&read.base) {
            self.report.fatal(read.span, m::ExpectFailed { expected: &exp, read: &read.base })
                       .done()
        } else {
            Ok(())
        }
    }

    fn lookahead<Exp: Expectable>(&mut self, exp: Exp) -> bool {
        exp.check_token(self.peek())
    }

    fn may_expect<Exp: Expectable>(&mut self, exp: Exp) -> bool {
        if self.lookahead(exp) {
            let next = self._read();
            self.last_span2 = self.last_span;
            self.last_span = next.span;
            true
        } else {
            false
        }
    }

    fn pos(&mut self) -> Pos {
        self.peek().span.begin()
    }

    fn last_pos(&self) -> Pos {
        assert!(!self.last_span.is_dummy(), "Parser::last_pos has lost prior span information");
        self.last_span.end()
    }

    fn try_parse_name(&mut self) -> ParseResult<Option<Spanned<Name>>> {
        let tok = self.read()?;
        if let Tok::Name(name) = tok.base {
            let name: Name = name.into();
            Ok(Some(name.with_loc(tok.span)))
        } else {
            self.unread(tok);
            Ok(None)
        }
    }

    fn parse_name(&mut self) -> ParseResult<Spanned<Name>> {
        let tok = self.read()?;
        if let Tok::Name(name) = tok.base {
            let name: Name = name.into();
            Ok(name.with_loc(tok.span))
        } else {
            self.report.fatal(tok.span, m::NoName { read: &tok.base }).done()
        }
    }

    fn parse_block(&mut self) -> ParseResult<Spanned<Block>> {
        self.block_depth += 1;

        let begin = self.pos();
        let mut stmts = Vec::new();
        while let Some(stmt) = self.try_parse_stmt()? {
            self.may_expect(Punct::Semicolon);

            // if the statement is the final one, stop parsing
            let last = match *stmt.base {
                St::Return(..) | St::Break => true,
                _ => false,
            };

            stmts.push(stmt);
            if last {
                if !(self.lookahead(Keyword::End) || self.lookahead(Keyword::Else) ||
                     self.lookahead(Keyword::Elseif) || self.lookahead(Keyword::Until) ||
                     self.lookahead(EOF)) {
                    let span = self.peek().span;
                    self.report.error(span, m::NoStmtAfterReturnOrBreak {}).done()?;
                }
                break;
            }
        }

        self.block_depth -= 1;
        Ok(stmts.with_loc(begin..self.last_pos()))
    }

    // `type` is a contextual keyword; `type function NAME` only counts as a declaration
    // when both following tokens match, otherwise `type` is an ordinary name.
    fn try_parse_type_func(&mut self) -> ParseResult<Option<Spanned<Stmt>>> {
        let is_decl = match self.peek().base {
            Tok::Name(ref name) if name == "type" => true,
            _ => false,
        };
        if !is_decl {
            return Ok(None);
        }

        let begin = self.pos();
        let tok = self.read()?;
        if !self.lookahead(Keyword::Function) {
            self.unread(tok);
            return Ok(None);
        }
        self.read()?; // `function`

        let name = match self.try_parse_name()? {
            Some(name) => name,
            None => {
                let tok = self.read()?;
                return self.report.fatal(tok.span, m::NoTypeFuncName { read: &tok.base })
                                  .done();
            }
        };
        if self.block_depth > 1 {
            self.report.error(begin..self.last_pos(), m::TypeFuncNotAtTopLevel {}).done()?;
        }
        let body = self.parse_func_body()?;
        let stmt = Box::new(St::TypeFunc(name, body));
        Ok(Some(stmt.with_loc(begin..self.last_pos())))
    }

    fn try_parse_stmt(&mut self) -> ParseResult<Option<Spanned<Stmt>>> {
        if let Some(stmt) = self.try_parse_type_func()? {
            return Ok(Some(stmt));
        }

        let begin = self.pos();

        let stmt = match self.read()? {
            Spanned { base: Tok::Keyword(Keyword::Do), .. } => {
                let block = self.parse_block()?;
                self.expect(Keyword::End)?;
                Box::new(St::Do(block))
            }

            Spanned { base: Tok::Keyword(Keyword::While), .. } => {
                let cond = self.parse_exp()?;
                self.expect(Keyword::Do)?;
                let block = self.parse_block()?;
                self.expect(Keyword::End)?;
                Box::new(St::While(cond, block))
            }

            Spanned { base: Tok::Keyword(Keyword::Repeat), .. } => {
                let block = self.parse_block()?;
                self.expect(Keyword::Until)?;
                let cond = self.parse_exp()?;
                Box::new(St::Repeat(block, cond))
            }

            Spanned { base: Tok::Keyword(Keyword::If), .. } => {
                let mut blocks = Vec::new();
                let mut case_begin = begin;
                let cond = self.parse_exp()?;
                self.expect(Keyword::Then)?;
                let block = self.parse_block()?;
                blocks.push((cond, block).with_loc(case_begin..self.last_pos()));
                while self.lookahead(Keyword::Elseif) {
                    case_begin = self.pos();
                    self.read()?;
                    let cond = self.parse_exp()?;
                    self.expect(Keyword::Then)?;
                    let block = self.parse_block()?;
                    blocks.push((cond, block).with_loc(case_begin..self.last_pos()));
                }
                let lastblock = if self.may_expect(Keyword::Else) {
                    Some(self.parse_block()?)
                } else {
                    None
                };
                self.expect(Keyword::End)?;
                Box::new(St::If(blocks, lastblock))
            }

            Spanned { base: Tok::Keyword(Keyword::For), .. } => {
                let name = self.parse_name()?;
                match self.read()? {
                    // for NAME "=" ...
                    Spanned { base: Tok::Punct(Punct::Eq), .. } => {
                        let start = self.parse_exp()?;
                        self.expect(Punct::Comma)?;
                        let end = self.parse_exp()?;
                        let step = if self.may_expect(Punct::Comma) {
                            Some(self.parse_exp()?)
                        } else {
                            None
                        };
                        self.expect(Keyword::Do)?;
                        let block = self.parse_block()?;
                        self.expect(Keyword::End)?;
                        Box::new(St::For(name, start, end, step, block))
                    }

                    // for NAME in ...
                    Spanned { base: Tok::Keyword(Keyword::In), .. } => {
                        let span = name.span;
                        self.parse_stmt_for_in(vec![name].with_loc(span))?
                    }

                    // for NAME "," ... in ...
                    Spanned { base: Tok::Punct(Punct::Comma), .. } => {
                        let mut span = name.span;
                        let mut names = vec![name];
                        self.scan_namelist(|name| {
                            span |= name.span;
                            names.push(name);
                        })?;
                        self.expect(Keyword::In)?;
                        self.parse_stmt_for_in(names.with_loc(span))?
                    }

                    tok => {
                        return self.report.fatal(tok.span,
                                                 m::ExpectFailed { expected: &Keyword::In,
                                                                   read: &tok.base })
                                          .done();
                    }
                }
            }

            Spanned { base: Tok::Keyword(Keyword::Function), .. } => {
                // `function NAME() ... end` desugars to an assignment
                let name = self.parse_name()?;
                let body = self.parse_func_body()?;
                let var = Var::Name(name.clone()).with_loc(name.span);
                let exp = Box::new(Ex::Func(body)).with_loc(begin..self.last_pos());
                Box::new(St::Assign(vec![var].with_loc(name.span),
                                    vec![exp].with_loc(begin..self.last_pos())))
            }

            Spanned { base: Tok::Keyword(Keyword::Local), .. } => {
                match self.read()? {
                    // local function ...
                    Spanned { base: Tok::Keyword(Keyword::Function), .. } => {
                        let name = self.parse_name()?;
                        let body = self.parse_func_body()?;
                        Box::new(St::LocalFunc(name, body))
                    }

                    // local NAME ...
                    tok @ Spanned { base: Tok::Name(_), .. } => {
                        self.unread(tok);

                        let mut namespan = Span::dummy();
                        let mut names = Vec::new();
                        self.scan_namelist(|name| {
                            namespan |= name.span;
                            names.push(name);
                        })?;

                        let mut expspan = Span::dummy();
                        let mut exps = Vec::new();
                        if self.may_expect(Punct::Eq) {
                            self.scan_explist(|exp| {
                                expspan |= exp.span;
                                exps.push(exp);
                            })?;
                        }
                        Box::new(St::Local(names.with_loc(namespan), exps.with_loc(expspan)))
                    }

                    tok => {
                        return self.report.fatal(tok.span, m::NoName { read: &tok.base })
                                          .done();
                    }
                }
            }

            Spanned { base: Tok::Keyword(Keyword::Return), .. } => {
                let mut span = Span::dummy();
                let mut exps = Vec::new();
                self.try_scan_explist(|exp| {
                    span |= exp.span;
                    exps.push(exp);
                })?;
                Box::new(St::Return(exps.with_loc(span)))
            }

            Spanned { base: Tok::Keyword(Keyword::Break), .. } => {
                Box::new(St::Break)
            }

            tok => {
                self.unread(tok);

                if let Some(exp) = self.try_parse_prefix_exp()? {
                    // prefixexp consumes pretty much everything.
                    // it might be a single statement as whole,
                    // or the beginning of `varlist "=" explist`.
                    match self.convert_prefix_exp_to_var(exp) {
                        // var {"," var} "=" explist
                        Ok(var) => {
                            let mut lhsspan = var.span;
                            let mut lhs = vec![var];
                            while self.may_expect(Punct::Comma) {
                                let var = self.parse_var()?;
                                lhsspan |= var.span;
                                lhs.push(var);
                            }
                            self.expect(Punct::Eq)?;

                            let mut rhsspan = Span::dummy();
                            let mut rhs = Vec::new();
                            self.scan_explist(|exp| {
                                rhsspan |= exp.span;
                                rhs.push(exp);
                            })?;

                            Box::new(St::Assign(lhs.with_loc(lhsspan), rhs.with_loc(rhsspan)))
                        }

                        // prefixexp
                        Err(exp) => {
                            Box::new(St::Void(exp))
                        }
                    }
                } else {
                    return Ok(None);
                }
            }
        };

        Ok(Some(stmt.with_loc(begin..self.last_pos())))
    }

    fn parse_stmt_for_in(&mut self, names: Spanned<Vec<Spanned<Name>>>) -> ParseResult<Stmt> {
        let mut span = Span::dummy();
        let mut exps = Vec::new();
        self.scan_explist(|exp| {
            span |= exp.span;
            exps.push(exp);
        })?;
        self.expect(Keyword::Do)?;
        let block = self.parse_block()?;
        self.expect(Keyword::End)?;
        Ok(Box::new(St::ForIn(names, exps.with_loc(span), block)))
    }

    fn parse_func_body(&mut self) -> ParseResult<FuncBody> {
        let paramsbegin = self.pos();
        let mut params = Seq::empty();

        self.expect(Punct::LParen)?;
        match self.read()? {
            Spanned { base: Tok::Punct(Punct::DotDotDot), span } => {
                params.tail = Some(().with_loc(span));
            }
            Spanned { base: Tok::Name(name0), span } => {
                let name0: Name = name0.into();
                params.head.push(name0.with_loc(span));
                while self.may_expect(Punct::Comma) {
                    let tok = self.read()?;
                    if let Tok::Punct(Punct::DotDotDot) = tok.base {
                        params.tail = Some(().with_loc(tok.span));
                        break;
                    }
                    self.unread(tok);
                    params.head.push(self.parse_name()?);
                }
            }
            tok @ Spanned { base: Tok::Punct(Punct::RParen), .. } => {
                self.unread(tok);
            }
            tok => {
                return self.report.fatal(tok.span, m::NoName { read: &tok.base }).done();
            }
        }
        self.expect(Punct::RParen)?;
        let params = params.with_loc(paramsbegin..self.last_pos());

        let block = self.parse_block()?;
        self.expect(Keyword::End)?;

        Ok(FuncBody { params: params, block: block })
    }

    fn parse_table(&mut self) -> ParseResult<Vec<(Option<Spanned<Exp>>, Spanned<Exp>)>> {
        let mut fields = Vec::new();

        self.expect(Punct::LBrace)?;
        loop {
            let key;
            let value;
            match self.read()? {
                Spanned { base: Tok::Punct(Punct::RBrace), .. } => break,

                Spanned { base: Tok::Punct(Punct::LBracket), .. } => {
                    key = Some(self.parse_exp()?);
                    self.expect(Punct::RBracket)?;
                    self.expect(Punct::Eq)?;
                    value = self.parse_exp()?;
                }

                tok => {
                    self.unread(tok);

                    // it is hard to disambiguate `NAME "=" exp` and `exp`,
                    // so parse `exp` first and check if it's a `NAME` followed by `=`.
                    let exp = self.parse_exp()?;
                    let name_or_exp = if self.lookahead(Punct::Eq) {
                        let span = exp.span;
                        match *exp.base {
                            Ex::Var(name) => Ok(name),
                            exp => Err(Box::new(exp).with_loc(span)),
                        }
                    } else {
                        Err(exp)
                    };
                    match name_or_exp {
                        Ok(name) => {
                            let s: Str = name.base.into();
                            key = Some(Box::new(Ex::Str(s)).with_loc(name.span));
                            self.expect(Punct::Eq)?;
                            value = self.parse_exp()?;
                        }
                        Err(exp) => {
                            key = None;
                            value = exp;
                        }
                    }
                }
            }

            fields.push((key, value));

            match self.read()? {
                Spanned { base: Tok::Punct(Punct::Comma), .. } |
                Spanned { base: Tok::Punct(Punct::Semicolon), .. } => {}
                Spanned { base: Tok::Punct(Punct::RBrace), .. } => break,
                tok => {
                    return self.report.fatal(tok.span, m::NoTableSep { read: &tok.base })
                                      .done();
                }
            }
        }

        Ok(fields)
    }

    fn try_parse_args(&mut self) -> ParseResult<Option<Spanned<Vec<Spanned<Exp>>>>> {
        let begin = self.pos();
        match self.read()? {
            Spanned { base: Tok::Punct(Punct::LParen), .. } => {
                let mut args = Vec::new();
                self.try_scan_explist(|exp| args.push(exp))?;
                self.expect(Punct::RParen)?;
                Ok(Some(args.with_loc(begin..self.last_pos())))
            }
            Spanned { base: Tok::Str(s), span } => {
                let arg = Box::new(Ex::Str(Str::from(s))).with_loc(span);
                Ok(Some(vec![arg].with_loc(span)))
            }
            tok @ Spanned { base: Tok::Punct(Punct::LBrace), .. } => {
                self.unread(tok);
                let exp = Box::new(Ex::Table(self.parse_table()?));
                let span = Span::from(begin..self.last_pos());
                Ok(Some(vec![exp.with_loc(span)].with_loc(span)))
            }
            tok => {
                self.unread(tok);
                Ok(None)
            }
        }
    }

    fn try_parse_prefix_exp(&mut self) -> ParseResult<Option<Spanned<Exp>>> {
        // any prefixexp starts with name or parenthesized exp
        let mut exp;
        let begin = self.pos();
        match self.read()? {
            Spanned { base: Tok::Punct(Punct::LParen), .. } => {
                exp = self.parse_exp()?;
                self.expect(Punct::RParen)?;
            }
            Spanned { base: Tok::Name(name), span } => {
                let name: Name = name.into();
                exp = Box::new(Ex::Var(name.with_loc(span))).with_loc(span);
            }
            tok => {
                self.unread(tok);
                return Ok(None);
            }
        }

        // parse any postfix attachments
        loop {
            match self.read()? {
                // prefixexp "." ...
                Spanned { base: Tok::Punct(Punct::Dot), .. } => {
                    let tok = self.read()?;
                    if let Tok::Name(name) = tok.base {
                        let name = Box::new(Ex::Str(Str::from(name))).with_loc(tok.span);
                        let span = begin..self.last_pos();
                        exp = Box::new(Ex::Index(exp, name)).with_loc(span);
                    } else {
                        return self.report.fatal(tok.span, m::NoName { read: &tok.base })
                                          .done();
                    }
                }

                // prefixexp "[" ...
                Spanned { base: Tok::Punct(Punct::LBracket), .. } => {
                    let exp2 = self.parse_exp()?;
                    self.expect(Punct::RBracket)?;
                    let span = begin..self.last_pos();
                    exp = Box::new(Ex::Index(exp, exp2)).with_loc(span);
                }

                // prefixexp ":" NAME ...
                Spanned { base: Tok::Punct(Punct::Colon), .. } => {
                    let name = self.parse_name()?;
                    if let Some(args) = self.try_parse_args()? {
                        let span = begin..self.last_pos();
                        exp = Box::new(Ex::MethodCall(exp, name, args)).with_loc(span);
                    } else {
                        let tok = self.read()?;
                        return self.report.fatal(tok.span, m::NoFuncArgs { read: &tok.base })
                                          .done();
                    }
                }

                // prefixexp STR
                // prefixexp "("
                // prefixexp "{"
                tok => {
                    self.unread(tok);
                    if let Some(args) = self.try_parse_args()? {
                        let span = begin..self.last_pos();
                        exp = Box::new(Ex::FuncCall(exp, args)).with_loc(span);
                        continue;
                    }
                    break;
                }
            }
        }
        Ok(Some(exp))
    }

    fn convert_prefix_exp_to_var(&self, exp: Spanned<Exp>) -> Result<Spanned<Var>, Spanned<Exp>> {
        let span = exp.span;
        let base = *exp.base;
        match base {
            Ex::Var(name) => Ok(Var::Name(name).with_loc(span)),
            Ex::Index(e1, e2) => Ok(Var::Index(e1, e2).with_loc(span)),
            base => Err(Box::new(base).with_loc(span)),
        }
    }

    fn try_parse_atomic_exp(&mut self) -> ParseResult<Option<Spanned<Exp>>> {
        let begin = self.pos();

        match self.read()? {
            Spanned { base: Tok::Keyword(Keyword::Nil), span } =>
                Ok(Some(Box::new(Ex::Nil).with_loc(span))),
            Spanned { base: Tok::Keyword(Keyword::False), span } =>
                Ok(Some(Box::new(Ex::False).with_loc(span))),
            Spanned { base: Tok::Keyword(Keyword::True), span } =>
                Ok(Some(Box::new(Ex::True).with_loc(span))),
            Spanned { base: Tok::Num(v), span } =>
                Ok(Some(Box::new(Ex::Num(v)).with_loc(span))),
            Spanned { base: Tok::Str(s), span } =>
                Ok(Some(Box::new(Ex::Str(s.into())).with_loc(span))),
            Spanned { base: Tok::Punct(Punct::DotDotDot), span } =>
                Ok(Some(Box::new(Ex::Varargs).with_loc(span))),

            Spanned { base: Tok::Keyword(Keyword::Function), .. } => {
                let body = self.parse_func_body()?;
                Ok(Some(Box::new(Ex::Func(body)).with_loc(begin..self.last_pos())))
            }

            tok @ Spanned { base: Tok::Punct(Punct::LBrace), .. } => {
                self.unread(tok);
                let table = self.parse_table()?;
                Ok(Some(Box::new(Ex::Table(table)).with_loc(begin..self.last_pos())))
            }

            tok => {
                self.unread(tok);
                self.try_parse_prefix_exp()
            }
        }
    }

    fn try_parse_prefix_unary_exp<Term, Op>(&mut self,
                                            mut check_op: Op,
                                            mut try_parse_term: Term)
            -> ParseResult<Option<Spanned<Exp>>>
            where Term: FnMut(&mut Self) -> ParseResult<Option<Spanned<Exp>>>,
                  Op: FnMut(&Tok) -> Option<UnOp> {
        let mut ops = Vec::new();
        while let Some(op) = check_op(self.peek()) {
            let opspan = self.read()?.span;
            ops.push(op.with_loc(opspan));
        }
        if let Some(exp) = try_parse_term(self)? {
            let mut exp = exp;
            while let Some(op) = ops.pop() {
                let span = op.span | exp.span;
                exp = Box::new(Ex::Un(op, exp)).with_loc(span);
            }
            Ok(Some(exp))
        } else if ops.is_empty() {
            Ok(None)
        } else {
            let tok = self.read()?;
            self.report.fatal(tok.span, m::NoExp { read: &tok.base }).done()
        }
    }

    fn try_parse_left_assoc_binary_exp<Term, Op>(&mut self,
                                                 mut check_op: Op,
                                                 mut try_parse_term: Term)
            -> ParseResult<Option<Spanned<Exp>>>
            where Term: FnMut(&mut Self) -> ParseResult<Option<Spanned<Exp>>>,
                  Op: FnMut(&Tok) -> Option<BinOp> {
        if let Some(exp) = try_parse_term(self)? {
            let mut exp = exp;
            while let Some(op) = check_op(self.peek()) {
                let opspan = self.read()?.span;
                let exp2 = match try_parse_term(self)? {
                    Some(exp2) => exp2,
                    None => {
                        let tok = self.read()?;
                        return self.report.fatal(tok.span, m::NoExp { read: &tok.base })
                                          .done();
                    }
                };
                let span = exp.span | opspan | exp2.span;
                exp = Box::new(Ex::Bin(exp, op.with_loc(opspan), exp2)).with_loc(span);
            }
            Ok(Some(exp))
        } else {
            Ok(None)
        }
    }

    fn try_parse_right_assoc_binary_exp<Term, Op>(&mut self,
                                                  mut check_op: Op,
                                                  mut try_parse_term: Term)
            -> ParseResult<Option<Spanned<Exp>>>
            where Term: FnMut(&mut Self) -> ParseResult<Option<Spanned<Exp>>>,
                  Op: FnMut(&Tok) -> Option<BinOp> {
        if let Some(exp) = try_parse_term(self)? {
            // store the terms and process in the reverse order
            // e.g. <exp:terms[0].0> <op:terms[0].1> <exp:terms[1].0> ... <exp:last_exp>
            let mut exp = exp;
            let mut terms = vec![];
            while let Some(op) = check_op(self.peek()) {
                let opspan = self.read()?.span;
                terms.push((exp, op.with_loc(opspan)));
                exp = match try_parse_term(self)? {
                    Some(exp) => exp,
                    None => {
                        let tok = self.read()?;
                        return self.report.fatal(tok.span, m::NoExp { read: &tok.base })
                                          .done();
                    }
                };
            }
            while let Some((exp1, op)) = terms.pop() {
                let span = exp1.span | op.span | exp.span;
                exp = Box::new(Ex::Bin(exp1, op, exp)).with_loc(span);
            }
            Ok(Some(exp))
        } else {
            Ok(None)
        }
    }

    fn try_parse_exp(&mut self) -> ParseResult<Option<Spanned<Exp>>> {
        macro_rules! make_check_ops {
            ($($name:ident: $ty:ident { $($tokty:ident::$tok:ident => $op:ident),+ $(,)* };)*) => (
                $(
                    fn $name(tok: &Tok) -> Option<$ty> {
                        match *tok {
                            $(Tok::$tokty($tokty::$tok) => Some($ty::$op),)*
                            _ => None,
                        }
                    }
                )*
            )
        }

        make_check_ops! {
            check_pow_op: BinOp {
                Punct::Caret => Pow,
            };
            check_un_op: UnOp {
                Keyword::Not => Not,
                Punct::Hash => Len,
                Punct::Dash => Neg,
            };
            check_mul_op: BinOp {
                Punct::Star => Mul,
                Punct::Slash => Div,
                Punct::Percent => Mod,
            };
            check_add_op: BinOp {
                Punct::Plus => Add,
                Punct::Dash => Sub,
            };
            check_cat_op: BinOp {
                Punct::DotDot => Cat,
            };
            check_comp_op: BinOp {
                Punct::Lt => Lt,
                Punct::Gt => Gt,
                Punct::LtEq => Le,
                Punct::GtEq => Ge,
                Punct::TildeEq => Ne,
                Punct::EqEq => Eq,
            };
            check_and_op: BinOp {
                Keyword::And => And,
            };
            check_or_op: BinOp {
                Keyword::Or => Or,
            };
        }

        let parser = self;
        parser.try_parse_left_assoc_binary_exp(check_or_op, |parser|
            parser.try_parse_left_assoc_binary_exp(check_and_op, |parser|
                parser.try_parse_left_assoc_binary_exp(check_comp_op, |parser|
                    parser.try_parse_right_assoc_binary_exp(check_cat_op, |parser|
                        parser.try_parse_left_assoc_binary_exp(check_add_op, |parser|
                            parser.try_parse_left_assoc_binary_exp(check_mul_op, |parser|
                                parser.try_parse_prefix_unary_exp(check_un_op, |parser|
                                    parser.try_parse_right_assoc_binary_exp(check_pow_op, |parser|
                                        parser.try_parse_atomic_exp()))))))))
    }

    fn parse_exp(&mut self) -> ParseResult<Spanned<Exp>> {
        if let Some(exp) = self.try_parse_exp()? {
            Ok(exp)
        } else {
            let tok = self.read()?;
            self.report.fatal(tok.span, m::NoExp { read: &tok.base }).done()
        }
    }

    fn parse_var(&mut self) -> ParseResult<Spanned<Var>> {
        if let Some(exp) = self.try_parse_prefix_exp()? {
            match self.convert_prefix_exp_to_var(exp) {
                Ok(var) => Ok(var),
                Err(exp) => self.report.fatal(exp.span, m::NoVarButCall {}).done(),
            }
        } else {
            let tok = self.read()?;
            self.report.fatal(tok.span, m::NoVar { read: &tok.base }).done()
        }
    }

    fn scan_namelist<F>(&mut self, mut f: F) -> ParseResult<()>
            where F: FnMut(Spanned<Name>) {
        f(self.parse_name()?);
        while self.may_expect(Punct::Comma) {
            f(self.parse_name()?);
        }
        Ok(())
    }

    fn scan_explist<F>(&mut self, mut f: F) -> ParseResult<()>
            where F: FnMut(Spanned<Exp>) {
        f(self.parse_exp()?);
        while self.may_expect(Punct::Comma) {
            f(self.parse_exp()?);
        }
        Ok(())
    }

    fn try_scan_explist<F>(&mut self, mut f: F) -> ParseResult<bool>
            where F: FnMut(Spanned<Exp>) {
        if let Some(exp) = self.try_parse_exp()? {
            f(exp);
            while self.may_expect(Punct::Comma) {
                f(self.parse_exp()?);
            }
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn into_chunk(mut self) -> ParseResult<Chunk> {
        let block = self.parse_block()?;
        self.expect(EOF)?;
        Ok(Chunk { block: block })
    }
}
