//! 抽象構文木（AST）
//!
//! 目的:
//! - 構文解析結果をツリー評価器とバイトコード変換の両方で共用できる表現に落とし込む。
//!
//! 設計ノート:
//! - 関数定義は `Rc` で共有し、クロージャ生成のたびに複製しない。
//! - 分割代入の左辺は `Pattern` に正規化する（代入式の左辺も同様）。
//! - `--dump-ast` のため全ノードが `Serialize` を実装する。

use std::rc::Rc;

use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub is_module: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

#[derive(Clone, Debug, Serialize)]
pub struct VarDeclarator {
    pub target: Pattern,
    pub init: Option<Expr>,
}

#[derive(Clone, Debug, Serialize)]
pub enum ForInit {
    Var {
        kind: VarKind,
        decls: Vec<VarDeclarator>,
    },
    Expr(Expr),
}

/// `for (x of ...)` / `for (const x in ...)` の左辺。
#[derive(Clone, Debug, Serialize)]
pub enum ForHead {
    Var { kind: VarKind, target: Pattern },
    Target(Pattern),
}

#[derive(Clone, Debug, Serialize)]
pub struct SwitchCase {
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CatchClause {
    pub param: Option<Pattern>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, Serialize)]
pub enum Stmt {
    Var {
        kind: VarKind,
        decls: Vec<VarDeclarator>,
    },
    Function(Rc<FunctionDef>),
    Return(Option<Expr>),
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        test: Expr,
    },
    For {
        init: Option<ForInit>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForIn {
        head: ForHead,
        object: Expr,
        body: Box<Stmt>,
    },
    ForOf {
        head: ForHead,
        iterable: Expr,
        body: Box<Stmt>,
    },
    Break(Option<String>),
    Continue(Option<String>),
    Labeled {
        label: String,
        body: Box<Stmt>,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
    Throw(Expr),
    Try {
        block: Vec<Stmt>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Stmt>>,
    },
    Block(Vec<Stmt>),
    Empty,
    Debugger,
    Expr(Expr),
    Import {
        bindings: Vec<String>,
        source: String,
    },
    Export(Box<Stmt>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FunctionFlavor {
    Normal,
    Generator,
    Async,
    AsyncGenerator,
}

#[derive(Clone, Debug, Serialize)]
pub struct Param {
    pub target: Pattern,
    pub default: Option<Expr>,
    pub rest: bool,
}

#[derive(Clone, Debug, Serialize)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    /// 式本体のアロー関数。
    Expr(Box<Expr>),
}

#[derive(Clone, Debug, Serialize)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: FunctionBody,
    pub flavor: FunctionFlavor,
    pub is_arrow: bool,
}

#[derive(Clone, Debug, Serialize)]
pub enum PropKey {
    Name(String),
    Computed(Box<Expr>),
}

#[derive(Clone, Debug, Serialize)]
pub enum PropDef {
    KeyValue(PropKey, Expr),
    Shorthand(String),
    Method(PropKey, Rc<FunctionDef>),
    Getter(PropKey, Rc<FunctionDef>),
    Setter(PropKey, Rc<FunctionDef>),
    Spread(Expr),
}

#[derive(Clone, Debug, Serialize)]
pub enum ArrayElement {
    Hole,
    Item(Expr),
    Spread(Expr),
}

#[derive(Clone, Debug, Serialize)]
pub enum Argument {
    Item(Expr),
    Spread(Expr),
}

#[derive(Clone, Debug, Serialize)]
pub enum MemberProp {
    Name(String),
    Computed(Box<Expr>),
}

#[derive(Clone, Debug, Serialize)]
pub struct PatternElement {
    pub target: Pattern,
    pub default: Option<Expr>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ObjectPatternProp {
    pub key: PropKey,
    pub target: Pattern,
    pub default: Option<Expr>,
}

/// 束縛・代入の左辺。
#[derive(Clone, Debug, Serialize)]
pub enum Pattern {
    Ident(String),
    /// `a.b = ...` のような代入先（宣言には現れない）。
    Member(Box<Expr>),
    Object {
        props: Vec<ObjectPatternProp>,
        rest: Option<Box<Pattern>>,
    },
    Array {
        elements: Vec<Option<PatternElement>>,
        rest: Option<Box<Pattern>>,
    },
}

impl Pattern {
    /// パターンが導入する束縛名を出現順に集める。
    pub fn bound_names(&self, out: &mut Vec<String>) {
        match self {
            Pattern::Ident(name) => out.push(name.clone()),
            Pattern::Member(_) => {}
            Pattern::Object { props, rest } => {
                for prop in props {
                    prop.target.bound_names(out);
                }
                if let Some(rest) = rest {
                    rest.bound_names(out);
                }
            }
            Pattern::Array { elements, rest } => {
                for element in elements.iter().flatten() {
                    element.target.bound_names(out);
                }
                if let Some(rest) = rest {
                    rest.bound_names(out);
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
    BitNot,
    Typeof,
    Void,
    Delete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    In,
    Instanceof,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Exp => "**",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::In => "in",
            BinaryOp::Instanceof => "instanceof",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AssignOp {
    Assign,
    /// `+=` などの複合代入。
    Compound(BinaryOp),
    /// `&&=` などの論理代入。
    Logical(LogicalOp),
}

// 式ノード
#[derive(Clone, Debug, Serialize)]
pub enum Expr {
    Number(f64),
    BigInt(String),
    String(String),
    Template {
        quasis: Vec<String>,
        exprs: Vec<Expr>,
    },
    Regex {
        pattern: String,
        flags: String,
    },
    Bool(bool),
    Null,
    Ident(String),
    This,
    Array(Vec<ArrayElement>),
    Object(Vec<PropDef>),
    Function(Rc<FunctionDef>),
    Member {
        object: Box<Expr>,
        property: MemberProp,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Argument>,
        optional: bool,
    },
    /// `?.` を含む連鎖全体。途中で短絡すれば `undefined`。
    OptionalChain(Box<Expr>),
    New {
        callee: Box<Expr>,
        args: Vec<Argument>,
    },
    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Pattern>,
        value: Box<Expr>,
    },
    Sequence(Vec<Expr>),
    Await(Box<Expr>),
    Yield {
        arg: Option<Box<Expr>>,
        delegate: bool,
    },
}
