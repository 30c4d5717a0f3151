use std::fmt;
use std::ops;
use tyfun_env::Spanned;

fn format_escaped(f: &mut fmt::Formatter, s: &str) -> fmt::Result {
    for c in s.chars() {
        match c {
            '\t' => write!(f, "\\t")?,
            '\n' => write!(f, "\\n")?,
            '\r' => write!(f, "\\r")?,
            '"' | '\'' | '`' | '\\' => write!(f, "\\{}", c)?,
            '\x20'..='\x7e' => write!(f, "{}", c)?,
            _ => write!(f, "\\u{{{:x}}}", c as u32)?,
        }
    }
    Ok(())
}

/// An identifier. Prints as `` `name` `` in the debugging output.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(String);

impl Name {
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<String> for Name {
    fn from(s: String) -> Name { Name(s) }
}

impl<'a> From<&'a str> for Name {
    fn from(s: &'a str) -> Name { Name(s.to_owned()) }
}

impl ops::Deref for Name {
    type Target = str;
    fn deref(&self) -> &str { &self.0 }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !f.sign_minus() { write!(f, "`")?; }
        format_escaped(f, &self.0)?;
        if !f.sign_minus() { write!(f, "`")?; }
        Ok(())
    }
}

/// A string literal. Prints as `"string"` in the debugging output.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Str(String);

impl Str {
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<String> for Str {
    fn from(s: String) -> Str { Str(s) }
}

impl<'a> From<&'a str> for Str {
    fn from(s: &'a str) -> Str { Str(s.to_owned()) }
}

impl From<Name> for Str {
    fn from(Name(n): Name) -> Str { Str(n) }
}

impl From<Str> for Name {
    fn from(Str(s): Str) -> Name { Name(s) }
}

impl ops::Deref for Str {
    type Target = str;
    fn deref(&self) -> &str { &self.0 }
}

impl fmt::Display for Str {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Debug for Str {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !f.sign_minus() { write!(f, "\"")?; }
        format_escaped(f, &self.0)?;
        if !f.sign_minus() { write!(f, "\"")?; }
        Ok(())
    }
}

/// A sequence of items, possibly terminated by an item of a different type.
///
/// Mostly used for parameter lists, where the tail is the span of `...` if any.
#[derive(Clone, PartialEq)]
pub struct Seq<Head, Tail = Head> {
    pub head: Vec<Head>,
    pub tail: Option<Tail>,
}

impl<Head, Tail> Seq<Head, Tail> {
    pub fn empty() -> Seq<Head, Tail> {
        Seq { head: Vec::new(), tail: None }
    }
}

impl<Head: fmt::Debug, Tail: fmt::Debug> fmt::Debug for Seq<Head, Tail> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !f.sign_minus() { write!(f, "[")?; }
        let mut first = true;
        for e in &self.head {
            if first { first = false; } else { write!(f, ", ")?; }
            write!(f, "{:?}", *e)?;
        }
        if let Some(ref e) = self.tail {
            if !first { write!(f, ", ")?; }
            write!(f, "{:?}...", *e)?;
        }
        if !f.sign_minus() { write!(f, "]")?; }
        Ok(())
    }
}

/// An assignment target.
#[derive(Clone, PartialEq)]
pub enum Var {
    Name(Spanned<Name>),
    Index(Spanned<Exp>, Spanned<Exp>),
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Var::Name(ref name) => write!(f, "{:?}", name),
            Var::Index(ref lhs, ref rhs) => write!(f, "({:?})[{:?}]", lhs, rhs),
        }
    }
}

/// A function literal: the parameter list (the tail is the span of `...`) and the body.
#[derive(Clone, PartialEq)]
pub struct FuncBody {
    pub params: Spanned<Seq<Spanned<Name>, Spanned<()>>>,
    pub block: Spanned<Block>,
}

impl fmt::Debug for FuncBody {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Func([")?;
        let mut first = true;
        for p in &self.params.head {
            if first { first = false; } else { write!(f, ", ")?; }
            write!(f, "{:?}", p)?;
        }
        if self.params.tail.is_some() {
            if !first { write!(f, ", ")?; }
            write!(f, "...")?;
        }
        write!(f, "], {:?})", self.block)
    }
}

#[derive(Clone, PartialEq)]
pub enum Ex {
    // literals
    Nil,
    False,
    True,
    Num(f64),
    Str(Str),
    Varargs,
    Func(FuncBody),
    Table(Vec<(Option<Spanned<Exp>>, Spanned<Exp>)>),

    // expressions
    Var(Spanned<Name>),
    FuncCall(Spanned<Exp>, Spanned<Vec<Spanned<Exp>>>),
    MethodCall(Spanned<Exp>, Spanned<Name>, Spanned<Vec<Spanned<Exp>>>),
    Index(Spanned<Exp>, Spanned<Exp>),
    Un(Spanned<UnOp>, Spanned<Exp>),
    Bin(Spanned<Exp>, Spanned<BinOp>, Spanned<Exp>),
}

impl fmt::Debug for Ex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Ex::Nil => write!(f, "nil"),
            Ex::False => write!(f, "false"),
            Ex::True => write!(f, "true"),
            Ex::Num(v) => write!(f, "{:?}", v),
            Ex::Str(ref s) => write!(f, "{:?}", *s),
            Ex::Varargs => write!(f, "..."),
            Ex::Func(ref body) => write!(f, "{:?}", *body),
            Ex::Table(ref fs) => write!(f, "Table({:?})", *fs),

            Ex::Var(ref n) => write!(f, "{:?}", *n),
            Ex::FuncCall(ref e, ref args) => {
                write!(f, "{:?}(", *e)?;
                let mut first = true;
                for arg in &args.base {
                    if first { first = false; } else { write!(f, ", ")?; }
                    write!(f, "{:?}", arg)?;
                }
                write!(f, ")")
            }
            Ex::MethodCall(ref e, ref n, ref args) => {
                write!(f, "{:?}:{:?}(", *e, *n)?;
                let mut first = true;
                for arg in &args.base {
                    if first { first = false; } else { write!(f, ", ")?; }
                    write!(f, "{:?}", arg)?;
                }
                write!(f, ")")
            }
            Ex::Index(ref e, ref i) => write!(f, "{:?}[{:?}]", *e, *i),
            Ex::Un(op, ref e) => write!(f, "({} {:?})", op.symbol(), *e),
            Ex::Bin(ref l, op, ref r) => write!(f, "({:?} {} {:?})", *l, op.symbol(), *r),
        }
    }
}

pub type Exp = Box<Ex>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    Len,
}

impl UnOp {
    pub fn symbol(&self) -> &'static str {
        match *self {
            UnOp::Neg => "-",
            UnOp::Not => "not",
            UnOp::Len => "#",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Mod,
    Cat,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match *self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Pow => "^",
            BinOp::Mod => "%",
            BinOp::Cat => "..",
            BinOp::Lt  => "<",
            BinOp::Le  => "<=",
            BinOp::Gt  => ">",
            BinOp::Ge  => ">=",
            BinOp::Eq  => "==",
            BinOp::Ne  => "~=",
            BinOp::And => "and",
            BinOp::Or  => "or",
        }
    }
}

#[derive(Clone, PartialEq)]
pub enum St {
    Void(Spanned<Exp>), // technically only calls are valid here, but checked later
    Assign(Spanned<Vec<Spanned<Var>>>, Spanned<Vec<Spanned<Exp>>>),
    Do(Spanned<Block>),
    While(Spanned<Exp>, Spanned<Block>),
    Repeat(Spanned<Block>, Spanned<Exp>),
    If(Vec<Spanned<(Spanned<Exp>, Spanned<Block>)>>, Option<Spanned<Block>>),
    For(Spanned<Name>, Spanned<Exp>, Spanned<Exp>, Option<Spanned<Exp>>, Spanned<Block>),
    ForIn(Spanned<Vec<Spanned<Name>>>, Spanned<Vec<Spanned<Exp>>>, Spanned<Block>),
    LocalFunc(Spanned<Name>, FuncBody),
    Local(Spanned<Vec<Spanned<Name>>>, Spanned<Vec<Spanned<Exp>>>),
    Return(Spanned<Vec<Spanned<Exp>>>),
    Break,

    /// A `type function NAME(...) ... end` declaration, only valid at the top level.
    TypeFunc(Spanned<Name>, FuncBody),
}

impl fmt::Debug for St {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            St::Void(ref e) => write!(f, "Void({:?})", e),
            St::Assign(ref l, ref r) => write!(f, "Assign({:?}, {:?})", l, r),
            St::Do(ref b) => write!(f, "Do({:?})", b),
            St::While(ref e, ref b) => write!(f, "While({:?}, {:?})", e, b),
            St::Repeat(ref b, ref e) => write!(f, "Repeat({:?}, {:?})", b, e),
            St::If(ref cases, ref else_) => {
                write!(f, "If(")?;
                let mut first = true;
                for &Spanned { base: (ref e, ref b), .. } in cases {
                    if first { first = false; } else { write!(f, ", ")?; }
                    write!(f, "({:?} => {:?})", e, b)?;
                }
                if let Some(ref b) = *else_ {
                    if !first { write!(f, ", ")?; }
                    write!(f, "{:?}", b)?;
                }
                write!(f, ")")
            }
            St::For(ref i, ref start, ref end, ref step, ref b) =>
                write!(f, "For({:?}, {:?}, {:?}, {:?}, {:?})", i, start, end, step, b),
            St::ForIn(ref ii, ref ee, ref b) =>
                write!(f, "ForIn({:?}, {:?}, {:?})", ii, ee, b),
            St::LocalFunc(ref i, ref body) => write!(f, "LocalFunc({:?}, {:?})", i, body),
            St::Local(ref ii, ref ee) => write!(f, "Local({:?}, {:?})", ii, ee),
            St::Return(ref ee) => write!(f, "Return({:?})", ee),
            St::Break => write!(f, "Break"),
            St::TypeFunc(ref i, ref body) => write!(f, "TypeFunc({:?}, {:?})", i, body),
        }
    }
}

pub type Stmt = Box<St>;
pub type Block = Vec<Spanned<Stmt>>;

/// A parsed script: type function declarations interleaved with query statements.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    pub block: Spanned<Block>,
}
