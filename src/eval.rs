//! Sandboxed evaluation of a captured call argument.
//!
//! The argument is parsed with swc and folded by a small tree-walking
//! interpreter. The only names in scope are the ones a CommonJS module sees
//! for its own location: `__dirname`, `__filename` and `path`. There are no
//! loops, user functions or host objects, so evaluation always terminates;
//! a step budget and a depth limit bound the work on hostile input.

use serde_json::{Map, Number, Value as Json};
use std::path::Path;
use swc_core::{
    common::{sync::Lrc, FileName, SourceMap},
    ecma::{
        ast::*,
        parser::{parse_file_as_expr, Syntax},
    },
};
use thiserror::Error;

use crate::jspath;
use crate::scanner::skip_string;

/// Deepest AST walk the evaluator performs.
const MAX_DEPTH: usize = 256;

/// Deepest bracket/operator nesting handed to the parser. swc parses
/// recursively and a stack overflow aborts the process, so deeper text is
/// refused before parsing.
const MAX_NESTING: usize = 32;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("SyntaxError: {0}")]
    Syntax(String),

    #[error("ReferenceError: {0} is not defined")]
    Unbound(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("unsupported expression: {0}")]
    Unsupported(&'static str),

    #[error("evaluation exceeded its budget of {0} steps")]
    BudgetExhausted(usize),

    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),
}

type Result<T> = std::result::Result<T, EvalError>;

// -----------------------------------------------------------------------------
// Resolution context
// -----------------------------------------------------------------------------

/// The bindings visible to an evaluated argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionContext {
    dirname: String,
    filename: String,
}

impl ResolutionContext {
    pub fn new(module_file: &Path) -> Self {
        let filename = module_file.to_string_lossy().replace('\\', "/");
        let dirname = jspath::dirname(&filename);
        Self { dirname, filename }
    }

    /// `__dirname`
    pub fn dirname(&self) -> &str {
        &self.dirname
    }

    /// `__filename`
    pub fn filename(&self) -> &str {
        &self.filename
    }
}

// -----------------------------------------------------------------------------
// Values
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum JsValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<JsValue>),
    Object(Vec<(String, JsValue)>),
    /// The `path` capability itself.
    PathModule,
}

impl JsValue {
    fn truthy(&self) -> bool {
        match self {
            JsValue::Undefined | JsValue::Null => false,
            JsValue::Bool(b) => *b,
            JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
            JsValue::String(s) => !s.is_empty(),
            JsValue::Array(_) | JsValue::Object(_) | JsValue::PathModule => true,
        }
    }

    fn type_of(&self) -> &'static str {
        match self {
            JsValue::Undefined => "undefined",
            JsValue::Bool(_) => "boolean",
            JsValue::Number(_) => "number",
            JsValue::String(_) => "string",
            JsValue::Null | JsValue::Array(_) | JsValue::Object(_) | JsValue::PathModule => {
                "object"
            }
        }
    }

    fn is_nullish(&self) -> bool {
        matches!(self, JsValue::Undefined | JsValue::Null)
    }

    fn is_primitive(&self) -> bool {
        !matches!(
            self,
            JsValue::Array(_) | JsValue::Object(_) | JsValue::PathModule
        )
    }

    fn to_js_string(&self) -> String {
        match self {
            JsValue::Undefined => "undefined".into(),
            JsValue::Null => "null".into(),
            JsValue::Bool(b) => b.to_string(),
            JsValue::Number(n) => number_to_string(*n),
            JsValue::String(s) => s.clone(),
            JsValue::Array(items) => items
                .iter()
                .map(|v| {
                    if v.is_nullish() {
                        String::new()
                    } else {
                        v.to_js_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            JsValue::Object(_) | JsValue::PathModule => "[object Object]".into(),
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            JsValue::Undefined => f64::NAN,
            JsValue::Null => 0.0,
            JsValue::Bool(b) => f64::from(u8::from(*b)),
            JsValue::Number(n) => *n,
            JsValue::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    0.0
                } else {
                    s.parse().unwrap_or(f64::NAN)
                }
            }
            JsValue::Array(_) | JsValue::Object(_) | JsValue::PathModule => {
                JsValue::String(self.to_js_string()).to_number()
            }
        }
    }

    fn strict_eq(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Number(a), JsValue::Number(b)) => a == b,
            (JsValue::PathModule, JsValue::PathModule) => true,
            // Composite values are fresh on every evaluation, so never identical.
            (a, b) if a.is_primitive() && b.is_primitive() => a == b,
            _ => false,
        }
    }

    fn loose_eq(&self, other: &JsValue) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (JsValue::Number(_), JsValue::String(_))
            | (JsValue::String(_), JsValue::Number(_))
            | (JsValue::Bool(_), _)
            | (_, JsValue::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_eq(other),
        }
    }

    fn into_json(self) -> Result<Json> {
        Ok(match self {
            JsValue::Undefined | JsValue::Null => Json::Null,
            JsValue::Bool(b) => Json::Bool(b),
            JsValue::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
                Json::Number(Number::from(n as i64))
            }
            JsValue::Number(n) => Number::from_f64(n).map(Json::Number).unwrap_or(Json::Null),
            JsValue::String(s) => Json::String(s),
            JsValue::Array(items) => Json::Array(
                items
                    .into_iter()
                    .map(JsValue::into_json)
                    .collect::<Result<_>>()?,
            ),
            JsValue::Object(fields) => {
                let mut map = Map::new();
                for (key, value) in fields {
                    map.insert(key, value.into_json()?);
                }
                Json::Object(map)
            }
            JsValue::PathModule => {
                return Err(EvalError::Type(
                    "the path module cannot be passed as an argument".into(),
                ))
            }
        })
    }
}

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// `Number.prototype.toString()` for radix 10.
fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".into();
    }
    if n.is_infinite() {
        return String::from(if n > 0.0 { "Infinity" } else { "-Infinity" });
    }
    if n == 0.0 {
        return "0".into();
    }
    let abs = n.abs();
    if (1e-6..1e21).contains(&abs) {
        return format!("{n}");
    }
    // Rust renders `1e21` / `1e-7`; JS wants an explicit sign on the exponent.
    let exp = format!("{n:e}");
    match exp.split_once('e') {
        Some((mantissa, power)) if !power.starts_with('-') => format!("{mantissa}e+{power}"),
        _ => exp,
    }
}

fn set_field(fields: &mut Vec<(String, JsValue)>, key: String, value: JsValue) {
    match fields.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = value,
        None => fields.push((key, value)),
    }
}

// -----------------------------------------------------------------------------
// Evaluator
// -----------------------------------------------------------------------------

/// Evaluates argument text against one module's [`ResolutionContext`].
pub struct Evaluator<'c> {
    ctx: &'c ResolutionContext,
    budget: usize,
    steps: usize,
}

/// Shorthand for a single evaluation with a fresh budget.
pub fn evaluate(text: &str, ctx: &ResolutionContext, budget: usize) -> Result<Json> {
    Evaluator::new(ctx, budget).evaluate(text)
}

impl<'c> Evaluator<'c> {
    pub fn new(ctx: &'c ResolutionContext, budget: usize) -> Self {
        Self {
            ctx,
            budget,
            steps: 0,
        }
    }

    /// Evaluates `text` as one expression. Empty text is `undefined`, the
    /// value of calling the idiom with no argument.
    pub fn evaluate(&mut self, text: &str) -> Result<Json> {
        self.steps = 0;
        if text.trim().is_empty() {
            return Ok(Json::Null);
        }
        check_nesting(text)?;
        let expr = parse(text)?;
        self.eval(&expr, 0)?.into_json()
    }

    fn lookup(&self, name: &str) -> Option<JsValue> {
        Some(match name {
            "__dirname" => JsValue::String(self.ctx.dirname.clone()),
            "__filename" => JsValue::String(self.ctx.filename.clone()),
            "path" => JsValue::PathModule,
            "undefined" => JsValue::Undefined,
            "NaN" => JsValue::Number(f64::NAN),
            "Infinity" => JsValue::Number(f64::INFINITY),
            _ => return None,
        })
    }

    fn eval(&mut self, expr: &Expr, depth: usize) -> Result<JsValue> {
        if depth > MAX_DEPTH {
            return Err(EvalError::TooDeep(MAX_DEPTH));
        }
        self.steps += 1;
        if self.steps > self.budget {
            return Err(EvalError::BudgetExhausted(self.budget));
        }
        let depth = depth + 1;

        match expr {
            Expr::Lit(lit) => eval_lit(lit),
            Expr::Ident(i) => self
                .lookup(&i.sym)
                .ok_or_else(|| EvalError::Unbound(i.sym.to_string())),
            Expr::Paren(p) => self.eval(&p.expr, depth),
            Expr::Seq(s) => {
                let mut last = JsValue::Undefined;
                for e in &s.exprs {
                    last = self.eval(e, depth)?;
                }
                Ok(last)
            }
            Expr::Tpl(t) => {
                let mut out = String::new();
                for (idx, quasi) in t.quasis.iter().enumerate() {
                    match &quasi.cooked {
                        Some(cooked) => out.push_str(cooked),
                        None => out.push_str(&quasi.raw),
                    }
                    if let Some(e) = t.exprs.get(idx) {
                        out.push_str(&self.eval(e, depth)?.to_js_string());
                    }
                }
                Ok(JsValue::String(out))
            }
            Expr::Array(a) => {
                let mut items = Vec::with_capacity(a.elems.len());
                for el in &a.elems {
                    match el {
                        None => items.push(JsValue::Undefined),
                        Some(el) if el.spread.is_some() => match self.eval(&el.expr, depth)? {
                            JsValue::Array(inner) => items.extend(inner),
                            JsValue::String(s) => {
                                items.extend(s.chars().map(|c| JsValue::String(c.to_string())))
                            }
                            other => {
                                return Err(EvalError::Type(format!(
                                    "{} is not iterable",
                                    other.to_js_string()
                                )))
                            }
                        },
                        Some(el) => items.push(self.eval(&el.expr, depth)?),
                    }
                }
                Ok(JsValue::Array(items))
            }
            Expr::Object(o) => self.eval_object(o, depth),
            Expr::Member(m) => {
                let obj = self.eval(&m.obj, depth)?;
                let key = self.member_key(&m.prop, depth)?;
                get_property(obj, &key)
            }
            Expr::Unary(u) => self.eval_unary(u, depth),
            Expr::Bin(b) => self.eval_bin(b, depth),
            Expr::Cond(c) => {
                if self.eval(&c.test, depth)?.truthy() {
                    self.eval(&c.cons, depth)
                } else {
                    self.eval(&c.alt, depth)
                }
            }
            Expr::Call(c) => self.eval_call(c, depth),
            Expr::Fn(_) | Expr::Arrow(_) | Expr::Class(_) => Err(EvalError::Unsupported("function")),
            Expr::Assign(_) | Expr::Update(_) => Err(EvalError::Unsupported("assignment")),
            Expr::New(_) => Err(EvalError::Unsupported("constructor call")),
            Expr::This(_) => Err(EvalError::Unsupported("this")),
            Expr::Await(_) | Expr::Yield(_) => Err(EvalError::Unsupported("await/yield")),
            Expr::TaggedTpl(_) => Err(EvalError::Unsupported("tagged template")),
            Expr::OptChain(_) => Err(EvalError::Unsupported("optional chaining")),
            _ => Err(EvalError::Unsupported("expression")),
        }
    }

    fn eval_object(&mut self, o: &ObjectLit, depth: usize) -> Result<JsValue> {
        let mut fields = Vec::with_capacity(o.props.len());
        for prop in &o.props {
            match prop {
                PropOrSpread::Spread(s) => match self.eval(&s.expr, depth)? {
                    JsValue::Object(inner) => {
                        for (k, v) in inner {
                            set_field(&mut fields, k, v);
                        }
                    }
                    JsValue::Array(inner) => {
                        for (idx, v) in inner.into_iter().enumerate() {
                            set_field(&mut fields, idx.to_string(), v);
                        }
                    }
                    JsValue::String(s) => {
                        for (idx, unit) in s.encode_utf16().enumerate() {
                            let ch = String::from_utf16_lossy(&[unit]);
                            set_field(&mut fields, idx.to_string(), JsValue::String(ch));
                        }
                    }
                    JsValue::PathModule => {
                        return Err(EvalError::Unsupported("spreading the path module"))
                    }
                    // other primitives have no own enumerable properties
                    _ => {}
                },
                PropOrSpread::Prop(p) => match &**p {
                    Prop::KeyValue(kv) => {
                        let key = self.prop_name(&kv.key, depth)?;
                        let value = self.eval(&kv.value, depth)?;
                        set_field(&mut fields, key, value);
                    }
                    Prop::Shorthand(i) => {
                        let value = self
                            .lookup(&i.sym)
                            .ok_or_else(|| EvalError::Unbound(i.sym.to_string()))?;
                        set_field(&mut fields, i.sym.to_string(), value);
                    }
                    _ => return Err(EvalError::Unsupported("object method or accessor")),
                },
            }
        }
        Ok(JsValue::Object(fields))
    }

    fn prop_name(&mut self, key: &PropName, depth: usize) -> Result<String> {
        Ok(match key {
            PropName::Ident(i) => i.sym.to_string(),
            PropName::Str(s) => s.value.to_string(),
            PropName::Num(n) => number_to_string(n.value),
            PropName::Computed(c) => self.eval(&c.expr, depth)?.to_js_string(),
            PropName::BigInt(_) => return Err(EvalError::Unsupported("bigint key")),
        })
    }

    fn member_key(&mut self, prop: &MemberProp, depth: usize) -> Result<String> {
        match prop {
            MemberProp::Ident(i) => Ok(i.sym.to_string()),
            MemberProp::Computed(c) => Ok(self.eval(&c.expr, depth)?.to_js_string()),
            MemberProp::PrivateName(_) => Err(EvalError::Unsupported("private name")),
        }
    }

    fn eval_unary(&mut self, u: &UnaryExpr, depth: usize) -> Result<JsValue> {
        if u.op == UnaryOp::TypeOf {
            // typeof tolerates unbound names
            if let Expr::Ident(i) = &*u.arg {
                if self.lookup(&i.sym).is_none() {
                    return Ok(JsValue::String("undefined".into()));
                }
            }
        }
        let arg = self.eval(&u.arg, depth)?;
        Ok(match u.op {
            UnaryOp::Bang => JsValue::Bool(!arg.truthy()),
            UnaryOp::Minus => JsValue::Number(-arg.to_number()),
            UnaryOp::Plus => JsValue::Number(arg.to_number()),
            UnaryOp::TypeOf => JsValue::String(arg.type_of().into()),
            UnaryOp::Void => JsValue::Undefined,
            _ => return Err(EvalError::Unsupported("unary operator")),
        })
    }

    fn eval_bin(&mut self, b: &BinExpr, depth: usize) -> Result<JsValue> {
        match b.op {
            BinaryOp::LogicalAnd => {
                let left = self.eval(&b.left, depth)?;
                return if left.truthy() { self.eval(&b.right, depth) } else { Ok(left) };
            }
            BinaryOp::LogicalOr => {
                let left = self.eval(&b.left, depth)?;
                return if left.truthy() { Ok(left) } else { self.eval(&b.right, depth) };
            }
            BinaryOp::NullishCoalescing => {
                let left = self.eval(&b.left, depth)?;
                return if left.is_nullish() { self.eval(&b.right, depth) } else { Ok(left) };
            }
            _ => {}
        }

        let left = self.eval(&b.left, depth)?;
        let right = self.eval(&b.right, depth)?;
        Ok(match b.op {
            BinaryOp::Add => {
                let stringy = |v: &JsValue| !v.is_primitive() || matches!(v, JsValue::String(_));
                if stringy(&left) || stringy(&right) {
                    JsValue::String(left.to_js_string() + right.to_js_string().as_str())
                } else {
                    JsValue::Number(left.to_number() + right.to_number())
                }
            }
            BinaryOp::Sub => JsValue::Number(left.to_number() - right.to_number()),
            BinaryOp::Mul => JsValue::Number(left.to_number() * right.to_number()),
            BinaryOp::Div => JsValue::Number(left.to_number() / right.to_number()),
            BinaryOp::Mod => JsValue::Number(left.to_number() % right.to_number()),
            BinaryOp::EqEqEq => JsValue::Bool(left.strict_eq(&right)),
            BinaryOp::NotEqEq => JsValue::Bool(!left.strict_eq(&right)),
            BinaryOp::EqEq => JsValue::Bool(left.loose_eq(&right)),
            BinaryOp::NotEq => JsValue::Bool(!left.loose_eq(&right)),
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                JsValue::Bool(compare(b.op, &left, &right))
            }
            _ => return Err(EvalError::Unsupported("binary operator")),
        })
    }

    fn eval_call(&mut self, c: &CallExpr, depth: usize) -> Result<JsValue> {
        let Callee::Expr(callee) = &c.callee else {
            return Err(EvalError::Unsupported("super or import call"));
        };
        let Expr::Member(m) = &**callee else {
            return Err(EvalError::Type(format!(
                "{} is not a function",
                callee_label(callee)
            )));
        };
        let target = self.eval(&m.obj, depth)?;
        let name = self.member_key(&m.prop, depth)?;
        if target != JsValue::PathModule {
            return Err(EvalError::Type(format!(
                "{}.{name} is not a function",
                callee_label(&m.obj)
            )));
        }

        let mut args = Vec::with_capacity(c.args.len());
        for arg in &c.args {
            if arg.spread.is_some() {
                match self.eval(&arg.expr, depth)? {
                    JsValue::Array(items) => args.extend(items),
                    _ => return Err(EvalError::Unsupported("spread of a non-array argument")),
                }
            } else {
                args.push(self.eval(&arg.expr, depth)?);
            }
        }
        self.call_path(&name, args)
    }

    fn call_path(&self, name: &str, args: Vec<JsValue>) -> Result<JsValue> {
        let strings = |args: Vec<JsValue>| -> Result<Vec<String>> {
            args.into_iter()
                .map(|a| match a {
                    JsValue::String(s) => Ok(s),
                    other => Err(EvalError::Type(format!(
                        "The \"path\" argument of path.{name} must be of type string. Received {}",
                        other.type_of()
                    ))),
                })
                .collect()
        };
        let first = |args: Vec<JsValue>| -> Result<String> {
            Ok(strings(args)?.into_iter().next().unwrap_or_default())
        };
        let cwd = self.ctx.dirname.as_str();

        Ok(match name {
            "join" => JsValue::String(jspath::join(&strings(args)?)),
            "resolve" => JsValue::String(jspath::resolve(cwd, &strings(args)?)),
            "normalize" => JsValue::String(jspath::normalize(&first(args)?)),
            "dirname" => JsValue::String(jspath::dirname(&first(args)?)),
            "extname" => JsValue::String(jspath::extname(&first(args)?)),
            "isAbsolute" => JsValue::Bool(jspath::is_absolute(&first(args)?)),
            "basename" => {
                let mut parts = strings(args)?.into_iter();
                let path = parts.next().unwrap_or_default();
                let ext = parts.next();
                JsValue::String(jspath::basename(&path, ext.as_deref()))
            }
            "relative" => {
                let mut parts = strings(args)?.into_iter();
                let from = parts.next().unwrap_or_default();
                let to = parts.next().unwrap_or_default();
                JsValue::String(jspath::relative(cwd, &from, &to))
            }
            _ => return Err(EvalError::Type(format!("path.{name} is not a function"))),
        })
    }
}

fn parse(text: &str) -> Result<Box<Expr>> {
    let cm: Lrc<SourceMap> = Default::default();
    // Parenthesised so trailing tokens are a syntax error; the newlines keep a
    // trailing line comment from swallowing the closing paren.
    let fm = cm.new_source_file(FileName::Anon.into(), format!("(\n{text}\n)"));
    let mut recovered = Vec::new();
    let expr = parse_file_as_expr(
        &fm,
        Syntax::Es(Default::default()),
        EsVersion::EsNext,
        None,
        &mut recovered,
    )
    .map_err(|e| EvalError::Syntax(e.kind().msg().into_owned()))?;
    if let Some(e) = recovered.into_iter().next() {
        return Err(EvalError::Syntax(e.kind().msg().into_owned()));
    }
    Ok(expr)
}

/// Rejects text nesting deeper than [`MAX_NESTING`] without parsing it.
///
/// Open brackets and template substitutions count one level each; so does
/// every right-recursive operator (`?`, `=>`, `**`, assignments) and every
/// prefix operator stacked in front of one operand.
fn check_nesting(text: &str) -> Result<()> {
    let bytes = text.as_bytes();
    let mut open: Vec<u8> = Vec::new();
    let mut branches = 0usize;
    let mut run = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if open.last() == Some(&b'`') {
            match b {
                b'\\' => i += 1,
                b'`' => {
                    open.pop();
                }
                b'$' if bytes.get(i + 1) == Some(&b'{') => {
                    open.push(b'{');
                    i += 1;
                }
                _ => {}
            }
        } else {
            match b {
                b'\'' | b'"' => {
                    i = skip_string(bytes, i + 1, b).unwrap_or(bytes.len());
                    run = 0;
                }
                b'/' if bytes.get(i + 1) == Some(&b'/') => {
                    i = bytes[i..]
                        .iter()
                        .position(|&c| c == b'\n')
                        .map_or(bytes.len(), |p| i + p);
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    i = text[i + 2..]
                        .find("*/")
                        .map_or(bytes.len(), |p| i + 2 + p + 1);
                }
                b'`' | b'(' | b'[' | b'{' => {
                    open.push(b);
                    run = 0;
                }
                b')' | b']' | b'}' => {
                    open.pop();
                    run = 0;
                }
                b'/' => run += 1,
                _ if is_operator_byte(b) => {
                    let end = bytes[i..]
                        .iter()
                        .position(|&c| !is_operator_byte(c))
                        .map_or(bytes.len(), |p| i + p);
                    let op = &text[i..end];
                    if is_right_recursive(op) {
                        branches += 1;
                    } else {
                        run += op.len();
                    }
                    i = end - 1;
                }
                _ if b.is_ascii_alphabetic() || b == b'_' || b == b'$' => {
                    let end = bytes[i..]
                        .iter()
                        .position(|&c| !(c.is_ascii_alphanumeric() || c == b'_' || c == b'$'))
                        .map_or(bytes.len(), |p| i + p);
                    match &text[i..end] {
                        "typeof" | "void" | "delete" | "new" | "await" | "yield" => run += 1,
                        _ => run = 0,
                    }
                    i = end - 1;
                }
                _ if b.is_ascii_whitespace() => {}
                _ => run = 0,
            }
        }
        if open.len() + branches + run > MAX_NESTING {
            return Err(EvalError::TooDeep(MAX_NESTING));
        }
        i += 1;
    }
    Ok(())
}

fn is_operator_byte(b: u8) -> bool {
    b"!~+-*%<>=&|^?:".contains(&b)
}

fn is_right_recursive(op: &str) -> bool {
    (op.starts_with('?') && !op.starts_with("??"))
        || op.contains("=>")
        || op.contains("**")
        || (op.ends_with('=') && !matches!(op, "==" | "===" | "!=" | "!==" | "<=" | ">="))
}

fn eval_lit(lit: &Lit) -> Result<JsValue> {
    Ok(match lit {
        Lit::Str(s) => JsValue::String(s.value.to_string()),
        Lit::Num(n) => JsValue::Number(n.value),
        Lit::Bool(b) => JsValue::Bool(b.value),
        Lit::Null(_) => JsValue::Null,
        Lit::Regex(_) => return Err(EvalError::Unsupported("regular expression")),
        _ => return Err(EvalError::Unsupported("literal")),
    })
}

fn get_property(obj: JsValue, key: &str) -> Result<JsValue> {
    Ok(match obj {
        JsValue::Undefined | JsValue::Null => {
            return Err(EvalError::Type(format!(
                "Cannot read properties of {} (reading '{key}')",
                obj.to_js_string()
            )))
        }
        JsValue::Object(fields) => fields
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .unwrap_or(JsValue::Undefined),
        JsValue::Array(items) => match key {
            "length" => JsValue::Number(items.len() as f64),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|idx| items.into_iter().nth(idx))
                .unwrap_or(JsValue::Undefined),
        },
        JsValue::String(s) => match key {
            "length" => JsValue::Number(s.encode_utf16().count() as f64),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|idx| s.encode_utf16().nth(idx))
                .map(|unit| JsValue::String(String::from_utf16_lossy(&[unit])))
                .unwrap_or(JsValue::Undefined),
        },
        JsValue::PathModule => match key {
            "sep" => JsValue::String(jspath::SEP.into()),
            "delimiter" => JsValue::String(jspath::DELIMITER.into()),
            "posix" => JsValue::PathModule,
            _ => {
                return Err(EvalError::Unsupported(
                    "path functions can only be called directly",
                ))
            }
        },
        _ => JsValue::Undefined,
    })
}

fn compare(op: BinaryOp, left: &JsValue, right: &JsValue) -> bool {
    if let (JsValue::String(a), JsValue::String(b)) = (left, right) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::LtEq => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        };
    }
    let (a, b) = (left.to_number(), right.to_number());
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::LtEq => a <= b,
        BinaryOp::Gt => a > b,
        _ => a >= b,
    }
}

fn callee_label(expr: &Expr) -> String {
    match expr {
        Expr::Ident(i) => i.sym.to_string(),
        Expr::Member(m) => match &m.prop {
            MemberProp::Ident(p) => format!("{}.{}", callee_label(&m.obj), p.sym),
            _ => format!("{}[...]", callee_label(&m.obj)),
        },
        _ => "expression".into(),
    }
}
