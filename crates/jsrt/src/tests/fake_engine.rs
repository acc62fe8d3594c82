//! An in-memory [`NativeEngine`] for tests.
//!
//! Handles are plain counters, reference counts are tracked per handle and
//! never free anything, so tests can assert exact counts after the fact.
//! Scripts are single expressions over a tiny grammar: number and string
//! literals, `true`/`false`/`null`/`undefined`, `[a, b]`, `({})`, global
//! identifiers and `+`, optionally prefixed with `throw`. Anything else fails
//! to compile with a script exception that carries message, line, column and
//! source like the real engine's.
//!
//! Every context's global object has the `ScriptEngine*Version` functions and
//! a native `square(x)`.

use crate::engine::{
    JsRuntimeAttributes, JsRuntimeVersion, JsValueType, Native, NativeEngine, RawHandle,
};
use crate::error::JsErrorCode;
use jsrt_variant::{HostArray, HostValue, Variant};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub(crate) const MAJOR_VERSION: u32 = 11;
pub(crate) const MINOR_VERSION: u32 = 0;
pub(crate) const BUILD_VERSION: u32 = 16384;

#[derive(Debug, Clone)]
enum Expr {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    Undefined,
    Array(Vec<Expr>),
    Object,
    Ident(String),
    Add(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone)]
struct Program {
    throws: bool,
    body: Expr,
}

#[derive(Debug, Clone, Copy)]
enum Builtin {
    Version(u32),
    Square,
}

#[derive(Debug, Clone)]
enum Function {
    Script(Program),
    Native(Builtin),
}

#[derive(Debug, Clone, Default)]
struct Object {
    error: bool,
    properties: Vec<(String, RawHandle)>,
    prototype: RawHandle,
}

impl Object {
    fn get(&self, name: &str) -> Option<RawHandle> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| *value)
    }

    fn set(&mut self, name: &str, value: RawHandle) {
        match self.properties.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.properties.push((name.to_owned(), value)),
        }
    }
}

#[derive(Debug, Clone)]
enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(Object),
    Array(Vec<RawHandle>),
    Function(Function),
}

#[derive(Debug)]
struct Runtime {
    attributes: JsRuntimeAttributes,
    disabled: bool,
    disposed: bool,
    memory_limit: isize,
}

#[derive(Debug, Clone, Copy)]
struct Context {
    runtime: RawHandle,
    global: RawHandle,
    object_prototype: RawHandle,
    undefined: RawHandle,
    null: RawHandle,
    true_value: RawHandle,
    false_value: RawHandle,
}

#[derive(Debug)]
enum Entry {
    Runtime(Runtime),
    Context(Context),
    PropertyId(String),
    Value(Value),
}

#[derive(Debug)]
struct Slot {
    refs: u32,
    entry: Entry,
}

#[derive(Debug, Default)]
struct State {
    next: usize,
    slots: HashMap<RawHandle, Slot>,
    property_ids: HashMap<String, RawHandle>,
    current: RawHandle,
    exception: RawHandle,
    parses: usize,
    runs: usize,
}

#[derive(Debug, Default)]
pub(crate) struct FakeEngine {
    state: Mutex<State>,
}

impl FakeEngine {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Engine reference count of `handle`; zero for unknown handles.
    pub(crate) fn refs(&self, handle: RawHandle) -> u32 {
        self.state().slots.get(&handle).map_or(0, |slot| slot.refs)
    }

    /// Sum of all reference counts the host holds.
    pub(crate) fn total_refs(&self) -> u32 {
        self.state().slots.values().map(|slot| slot.refs).sum()
    }

    pub(crate) fn current(&self) -> RawHandle {
        self.state().current
    }

    /// How many times a script was compiled.
    pub(crate) fn parse_count(&self) -> usize {
        self.state().parses
    }

    /// How many times `run_script` was called.
    pub(crate) fn run_count(&self) -> usize {
        self.state().runs
    }

    pub(crate) fn is_runtime_disposed(&self, runtime: RawHandle) -> bool {
        matches!(
            self.state().slots.get(&runtime),
            Some(Slot { entry: Entry::Runtime(Runtime { disposed: true, .. }), .. })
        )
    }

    pub(crate) fn has_pending_exception(&self) -> bool {
        self.state().exception != 0
    }
}

impl State {
    fn alloc(&mut self, entry: Entry) -> RawHandle {
        self.next += 1;
        let handle = 0x1000 + self.next * 0x10;
        self.slots.insert(handle, Slot { refs: 0, entry });
        handle
    }

    fn alloc_value(&mut self, value: Value) -> RawHandle {
        self.alloc(Entry::Value(value))
    }

    fn value(&self, handle: RawHandle) -> Native<&Value> {
        match self.slots.get(&handle) {
            Some(Slot { entry: Entry::Value(value), .. }) => Ok(value),
            _ => Err(JsErrorCode::INVALID_ARGUMENT),
        }
    }

    fn value_mut(&mut self, handle: RawHandle) -> Native<&mut Value> {
        match self.slots.get_mut(&handle) {
            Some(Slot { entry: Entry::Value(value), .. }) => Ok(value),
            _ => Err(JsErrorCode::INVALID_ARGUMENT),
        }
    }

    fn runtime(&self, handle: RawHandle) -> Native<&Runtime> {
        match self.slots.get(&handle) {
            Some(Slot { entry: Entry::Runtime(runtime), .. }) if !runtime.disposed => Ok(runtime),
            _ => Err(JsErrorCode::INVALID_ARGUMENT),
        }
    }

    fn runtime_mut(&mut self, handle: RawHandle) -> Native<&mut Runtime> {
        match self.slots.get_mut(&handle) {
            Some(Slot { entry: Entry::Runtime(runtime), .. }) if !runtime.disposed => Ok(runtime),
            _ => Err(JsErrorCode::INVALID_ARGUMENT),
        }
    }

    fn context_of(&self, handle: RawHandle) -> Native<Context> {
        match self.slots.get(&handle) {
            Some(Slot { entry: Entry::Context(context), .. }) => Ok(*context),
            _ => Err(JsErrorCode::INVALID_ARGUMENT),
        }
    }

    fn context(&self) -> Native<Context> {
        match self.current {
            0 => Err(JsErrorCode::NO_CURRENT_CONTEXT),
            current => self.context_of(current),
        }
    }

    fn ensure_enabled(&self) -> Native<Context> {
        let context = self.context()?;
        if self.runtime(context.runtime)?.disabled {
            return Err(JsErrorCode::IN_DISABLED_STATE);
        }
        Ok(context)
    }

    /// Stores a pending exception object and returns `code`.
    fn throw(
        &mut self,
        code: JsErrorCode,
        message: &str,
        position: Option<(i32, i32)>,
        source: &str,
    ) -> JsErrorCode {
        let prototype = self.context().map_or(0, |c| c.object_prototype);
        let mut error = Object {
            error: true,
            properties: Vec::new(),
            prototype,
        };
        let message = self.alloc_value(Value::String(message.to_owned()));
        error.set("message", message);
        if let Some((line, column)) = position {
            let line = self.alloc_value(Value::Number(f64::from(line)));
            let column = self.alloc_value(Value::Number(f64::from(column)));
            let source = self.alloc_value(Value::String(source.to_owned()));
            error.set("line", line);
            error.set("column", column);
            error.set("source", source);
        }
        self.exception = self.alloc_value(Value::Object(error));
        code
    }

    fn type_error(&mut self, message: &str) -> JsErrorCode {
        self.throw(JsErrorCode::SCRIPT_EXCEPTION, message, None, "")
    }

    fn compile(&mut self, script: &str) -> Native<Program> {
        compile(script).map_err(|offset| {
            let (line, column) = position(script, offset);
            self.throw(
                JsErrorCode::SCRIPT_COMPILE,
                "Syntax error",
                Some((line, column)),
                script,
            )
        })
    }

    fn run(&mut self, program: &Program) -> Native<RawHandle> {
        let result = self.evaluate(&program.body)?;
        if program.throws {
            let message = self.to_string(result)?;
            return Err(self.throw(JsErrorCode::SCRIPT_EXCEPTION, &message, None, ""));
        }
        Ok(result)
    }

    fn evaluate(&mut self, expr: &Expr) -> Native<RawHandle> {
        let context = self.context()?;
        Ok(match expr {
            Expr::Number(n) => self.alloc_value(Value::Number(*n)),
            Expr::String(s) => self.alloc_value(Value::String(s.clone())),
            Expr::Bool(true) => context.true_value,
            Expr::Bool(false) => context.false_value,
            Expr::Null => context.null,
            Expr::Undefined => context.undefined,
            Expr::Object => self.alloc_value(Value::Object(Object {
                prototype: context.object_prototype,
                ..Object::default()
            })),
            Expr::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| self.evaluate(item))
                    .collect::<Native<Vec<_>>>()?;
                self.alloc_value(Value::Array(items))
            }
            Expr::Ident(name) => {
                let found = match self.value(context.global)? {
                    Value::Object(global) => global.get(name),
                    _ => None,
                };
                match found {
                    Some(value) => value,
                    None => return Err(self.type_error(&format!("'{name}' is undefined"))),
                }
            }
            Expr::Add(lhs, rhs) => {
                let lhs = self.evaluate(lhs)?;
                let rhs = self.evaluate(rhs)?;
                let sum = match (self.value(lhs)?, self.value(rhs)?) {
                    (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
                    _ => Value::String(self.to_string(lhs)? + &self.to_string(rhs)?),
                };
                self.alloc_value(sum)
            }
        })
    }

    fn to_string(&self, handle: RawHandle) -> Native<String> {
        Ok(match self.value(handle)? {
            Value::Undefined => "undefined".to_owned(),
            Value::Null => "null".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| self.to_string(*item))
                .collect::<Native<Vec<_>>>()?
                .join(","),
            Value::Object(object) if object.error => match object.get("message") {
                Some(message) => format!("Error: {}", self.to_string(message)?),
                None => "Error".to_owned(),
            },
            Value::Object(_) => "[object Object]".to_owned(),
            Value::Function(_) => "function() { [native code] }".to_owned(),
        })
    }

    fn property_name(&self, property_id: RawHandle) -> Native<String> {
        match self.slots.get(&property_id) {
            Some(Slot { entry: Entry::PropertyId(name), .. }) => Ok(name.clone()),
            _ => Err(JsErrorCode::INVALID_ARGUMENT),
        }
    }

    fn get(&mut self, object: RawHandle, name: &str) -> Native<RawHandle> {
        let context = self.context()?;
        if let Value::Array(items) = self.value(object)?
            && name == "length"
        {
            let length = items.len() as f64;
            return Ok(self.alloc_value(Value::Number(length)));
        }
        let found = match self.value(object)? {
            Value::Object(object) => object.get(name),
            Value::Array(items) => name.parse::<usize>().ok().and_then(|i| items.get(i).copied()),
            Value::Function(_) => None,
            _ => return Err(JsErrorCode::ARGUMENT_NOT_OBJECT),
        };
        Ok(found.unwrap_or(context.undefined))
    }

    fn set(&mut self, object: RawHandle, name: &str, value: RawHandle) -> Native<()> {
        let undefined = self.context()?.undefined;
        match self.value_mut(object)? {
            Value::Object(object) => object.set(name, value),
            Value::Array(items) => {
                let index: usize = name.parse().map_err(|_| JsErrorCode::INVALID_ARGUMENT)?;
                if index >= items.len() {
                    items.resize(index + 1, undefined);
                }
                items[index] = value;
            }
            _ => return Err(JsErrorCode::ARGUMENT_NOT_OBJECT),
        }
        Ok(())
    }

    fn call(&mut self, function: RawHandle, arguments: &[RawHandle]) -> Native<RawHandle> {
        self.ensure_enabled()?;
        if arguments.is_empty() {
            return Err(JsErrorCode::INVALID_ARGUMENT);
        }
        let Value::Function(function) = self.value(function)?.clone() else {
            return Err(self.type_error("Function expected"));
        };
        match function {
            Function::Script(program) => self.run(&program),
            Function::Native(Builtin::Version(version)) => {
                Ok(self.alloc_value(Value::Number(f64::from(version))))
            }
            Function::Native(Builtin::Square) => {
                let x = match arguments.get(1).map(|a| self.value(*a)).transpose()? {
                    Some(Value::Number(x)) => *x,
                    _ => f64::NAN,
                };
                Ok(self.alloc_value(Value::Number(x * x)))
            }
        }
    }

    fn to_variant(&self, handle: RawHandle) -> Native<HostValue> {
        Ok(match self.value(handle)? {
            Value::Undefined => HostValue::Empty,
            Value::Null => HostValue::Null,
            Value::Bool(b) => HostValue::Bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() <= f64::from(i32::MAX) => {
                HostValue::I32(*n as i32)
            }
            Value::Number(n) => HostValue::F64(*n),
            Value::String(s) => HostValue::String(s.clone()),
            Value::Array(items) => HostValue::Array(HostArray::Variant(
                items
                    .iter()
                    .map(|item| self.to_variant(*item))
                    .collect::<Native<Vec<_>>>()?,
            )),
            Value::Object(_) | Value::Function(_) => return Err(JsErrorCode::NOT_IMPLEMENTED),
        })
    }

    fn from_host(&mut self, value: &HostValue) -> Native<RawHandle> {
        let context = self.context()?;
        let value = match value {
            HostValue::Empty => return Ok(context.undefined),
            HostValue::Null => return Ok(context.null),
            HostValue::Bool(true) => return Ok(context.true_value),
            HostValue::Bool(false) => return Ok(context.false_value),
            HostValue::I8(v) => Value::Number(f64::from(*v)),
            HostValue::U8(v) => Value::Number(f64::from(*v)),
            HostValue::I16(v) => Value::Number(f64::from(*v)),
            HostValue::U16(v) => Value::Number(f64::from(*v)),
            HostValue::I32(v) => Value::Number(f64::from(*v)),
            HostValue::U32(v) => Value::Number(f64::from(*v)),
            HostValue::I64(v) => Value::Number(*v as f64),
            HostValue::U64(v) => Value::Number(*v as f64),
            HostValue::F32(v) => Value::Number(f64::from(*v)),
            HostValue::F64(v) => Value::Number(*v),
            HostValue::String(s) => Value::String(s.clone()),
            HostValue::Array(HostArray::Variant(items)) => {
                let items = items
                    .iter()
                    .map(|item| self.from_host(item))
                    .collect::<Native<Vec<_>>>()?;
                Value::Array(items)
            }
            HostValue::Array(array) => {
                let items = array_items(array)?
                    .iter()
                    .map(|item| self.from_host(item))
                    .collect::<Native<Vec<_>>>()?;
                Value::Array(items)
            }
            _ => return Err(JsErrorCode::NOT_IMPLEMENTED),
        };
        Ok(self.alloc_value(value))
    }
}

fn array_items(array: &HostArray) -> Native<Vec<HostValue>> {
    Ok(match array {
        HostArray::Bool(v) => v.iter().copied().map(HostValue::Bool).collect(),
        HostArray::I32(v) => v.iter().copied().map(HostValue::I32).collect(),
        HostArray::F64(v) => v.iter().copied().map(HostValue::F64).collect(),
        HostArray::String(v) => v.iter().cloned().map(HostValue::String).collect(),
        _ => return Err(JsErrorCode::NOT_IMPLEMENTED),
    })
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Zero-based line and column of a byte offset.
fn position(script: &str, offset: usize) -> (i32, i32) {
    let before = &script[..offset.min(script.len())];
    let line = before.matches('\n').count();
    let column = before.len() - before.rfind('\n').map_or(0, |i| i + 1);
    (line as i32, column as i32)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    String(String),
    Ident(String),
    Punct(char),
}

/// Tokens with their byte offsets; the error is the offset of the first
/// character that cannot start a token.
fn tokenize(script: &str) -> Result<Vec<(usize, Token)>, usize> {
    let mut tokens = Vec::new();
    let mut chars = script.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() {
            let mut end = start;
            while let Some(&(i, d)) = chars.peek() {
                if !(d.is_ascii_digit() || d == '.') {
                    break;
                }
                end = i + d.len_utf8();
                chars.next();
            }
            let number = script[start..end].parse().map_err(|_| start)?;
            tokens.push((start, Token::Number(number)));
        } else if c == '\'' || c == '"' {
            chars.next();
            let mut text = String::new();
            loop {
                match chars.next() {
                    Some((_, q)) if q == c => break,
                    Some((_, ch)) => text.push(ch),
                    None => return Err(script.len()),
                }
            }
            tokens.push((start, Token::String(text)));
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            let mut ident = String::new();
            while let Some(&(_, ch)) = chars.peek() {
                if !(ch.is_alphanumeric() || ch == '_' || ch == '$') {
                    break;
                }
                ident.push(ch);
                chars.next();
            }
            tokens.push((start, Token::Ident(ident)));
        } else if "+,[](){};".contains(c) {
            tokens.push((start, Token::Punct(c)));
            chars.next();
        } else {
            return Err(start);
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(o, _)| *o)
    }

    fn next(&mut self) -> Result<Token, usize> {
        let token = self.peek().cloned().ok_or(self.end)?;
        self.pos += 1;
        Ok(token)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(&Token::Punct(c)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), usize> {
        if self.eat(c) { Ok(()) } else { Err(self.offset()) }
    }

    fn expr(&mut self) -> Result<Expr, usize> {
        let mut lhs = self.term()?;
        while self.eat('+') {
            let rhs = self.term()?;
            lhs = Expr::Add(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, usize> {
        let offset = self.offset();
        Ok(match self.next()? {
            Token::Number(n) => Expr::Number(n),
            Token::String(s) => Expr::String(s),
            Token::Ident(ident) => match ident.as_str() {
                "true" => Expr::Bool(true),
                "false" => Expr::Bool(false),
                "null" => Expr::Null,
                "undefined" => Expr::Undefined,
                "throw" => return Err(offset),
                _ => Expr::Ident(ident),
            },
            Token::Punct('[') => {
                let mut items = Vec::new();
                if !self.eat(']') {
                    loop {
                        items.push(self.expr()?);
                        if self.eat(']') {
                            break;
                        }
                        self.expect(',')?;
                    }
                }
                Expr::Array(items)
            }
            Token::Punct('(') if self.eat('{') => {
                self.expect('}')?;
                self.expect(')')?;
                Expr::Object
            }
            Token::Punct('(') => {
                let inner = self.expr()?;
                self.expect(')')?;
                inner
            }
            Token::Punct(_) => return Err(offset),
        })
    }
}

fn compile(script: &str) -> Result<Program, usize> {
    let mut parser = Parser {
        tokens: tokenize(script)?,
        pos: 0,
        end: script.len(),
    };
    let throws = parser.peek() == Some(&Token::Ident("throw".to_owned()));
    if throws {
        parser.pos += 1;
    }
    let body = if parser.peek().is_none() && !throws {
        Expr::Undefined
    } else {
        parser.expr()?
    };
    parser.eat(';');
    if parser.peek().is_some() {
        return Err(parser.offset());
    }
    Ok(Program { throws, body })
}

impl NativeEngine for FakeEngine {
    fn create_runtime(
        &self,
        attributes: JsRuntimeAttributes,
        _version: JsRuntimeVersion,
    ) -> Native<RawHandle> {
        Ok(self.state().alloc(Entry::Runtime(Runtime {
            attributes,
            disabled: false,
            disposed: false,
            memory_limit: -1,
        })))
    }

    fn dispose_runtime(&self, runtime: RawHandle) -> Native<()> {
        let mut state = self.state();
        if let Ok(context) = state.context()
            && context.runtime == runtime
        {
            return Err(JsErrorCode::RUNTIME_IN_USE);
        }
        state.runtime_mut(runtime)?.disposed = true;
        Ok(())
    }

    fn collect_garbage(&self, runtime: RawHandle) -> Native<()> {
        self.state().runtime(runtime).map(|_| ())
    }

    fn runtime_memory_usage(&self, runtime: RawHandle) -> Native<usize> {
        let state = self.state();
        state.runtime(runtime)?;
        Ok(state.slots.len() * 64)
    }

    fn runtime_memory_limit(&self, runtime: RawHandle) -> Native<isize> {
        Ok(self.state().runtime(runtime)?.memory_limit)
    }

    fn set_runtime_memory_limit(&self, runtime: RawHandle, limit: isize) -> Native<()> {
        self.state().runtime_mut(runtime)?.memory_limit = limit;
        Ok(())
    }

    fn disable_runtime_execution(&self, runtime: RawHandle) -> Native<()> {
        let mut state = self.state();
        let runtime = state.runtime_mut(runtime)?;
        if !runtime
            .attributes
            .contains(JsRuntimeAttributes::ALLOW_SCRIPT_INTERRUPT)
        {
            return Err(JsErrorCode::CANNOT_DISABLE_EXECUTION);
        }
        runtime.disabled = true;
        Ok(())
    }

    fn enable_runtime_execution(&self, runtime: RawHandle) -> Native<()> {
        self.state().runtime_mut(runtime)?.disabled = false;
        Ok(())
    }

    fn is_runtime_execution_disabled(&self, runtime: RawHandle) -> Native<bool> {
        Ok(self.state().runtime(runtime)?.disabled)
    }

    fn idle(&self) -> Native<u32> {
        let state = self.state();
        let context = state.context()?;
        if !state
            .runtime(context.runtime)?
            .attributes
            .contains(JsRuntimeAttributes::ENABLE_IDLE_PROCESSING)
        {
            return Err(JsErrorCode::IDLE_NOT_ENABLED);
        }
        Ok(1000)
    }

    fn create_context(&self, runtime: RawHandle) -> Native<RawHandle> {
        let mut state = self.state();
        state.runtime(runtime)?;
        let null = state.alloc_value(Value::Null);
        let object_prototype = state.alloc_value(Value::Object(Object {
            prototype: null,
            ..Object::default()
        }));
        let mut global = Object {
            prototype: object_prototype,
            ..Object::default()
        };
        for (name, builtin) in [
            ("ScriptEngineMajorVersion", Builtin::Version(MAJOR_VERSION)),
            ("ScriptEngineMinorVersion", Builtin::Version(MINOR_VERSION)),
            ("ScriptEngineBuildVersion", Builtin::Version(BUILD_VERSION)),
            ("square", Builtin::Square),
        ] {
            let function = state.alloc_value(Value::Function(Function::Native(builtin)));
            global.set(name, function);
        }
        let context = Context {
            runtime,
            global: state.alloc_value(Value::Object(global)),
            object_prototype,
            undefined: state.alloc_value(Value::Undefined),
            null,
            true_value: state.alloc_value(Value::Bool(true)),
            false_value: state.alloc_value(Value::Bool(false)),
        };
        Ok(state.alloc(Entry::Context(context)))
    }

    fn context_runtime(&self, context: RawHandle) -> Native<RawHandle> {
        Ok(self.state().context_of(context)?.runtime)
    }

    fn current_context(&self) -> Native<RawHandle> {
        Ok(self.state().current)
    }

    fn set_current_context(&self, context: RawHandle) -> Native<()> {
        let mut state = self.state();
        if context != 0 {
            let runtime = state.context_of(context)?.runtime;
            state.runtime(runtime)?;
        }
        state.current = context;
        Ok(())
    }

    fn parse_script(
        &self,
        script: &str,
        _source_context: usize,
        _source_url: &str,
    ) -> Native<RawHandle> {
        let mut state = self.state();
        state.ensure_enabled()?;
        state.parses += 1;
        let program = state.compile(script)?;
        Ok(state.alloc_value(Value::Function(Function::Script(program))))
    }

    fn run_script(
        &self,
        script: &str,
        _source_context: usize,
        _source_url: &str,
    ) -> Native<RawHandle> {
        let mut state = self.state();
        state.ensure_enabled()?;
        state.runs += 1;
        state.parses += 1;
        let program = state.compile(script)?;
        state.run(&program)
    }

    fn property_id(&self, name: &str) -> Native<RawHandle> {
        let mut state = self.state();
        if let Some(id) = state.property_ids.get(name) {
            return Ok(*id);
        }
        let id = state.alloc(Entry::PropertyId(name.to_owned()));
        state.property_ids.insert(name.to_owned(), id);
        Ok(id)
    }

    fn get_property(&self, object: RawHandle, property_id: RawHandle) -> Native<RawHandle> {
        let mut state = self.state();
        let name = state.property_name(property_id)?;
        state.get(object, &name)
    }

    fn set_property(
        &self,
        object: RawHandle,
        property_id: RawHandle,
        value: RawHandle,
        _use_strict_rules: bool,
    ) -> Native<()> {
        let mut state = self.state();
        let name = state.property_name(property_id)?;
        state.value(value)?;
        state.set(object, &name, value)
    }

    fn get_indexed_property(&self, object: RawHandle, index: RawHandle) -> Native<RawHandle> {
        let mut state = self.state();
        let key = state.to_string(index)?;
        state.get(object, &key)
    }

    fn set_indexed_property(
        &self,
        object: RawHandle,
        index: RawHandle,
        value: RawHandle,
    ) -> Native<()> {
        let mut state = self.state();
        let key = state.to_string(index)?;
        state.value(value)?;
        state.set(object, &key, value)
    }

    fn own_property_names(&self, object: RawHandle) -> Native<RawHandle> {
        let mut state = self.state();
        let names: Vec<String> = match state.value(object)? {
            Value::Object(object) => object.properties.iter().map(|(k, _)| k.clone()).collect(),
            Value::Array(items) => (0..items.len())
                .map(|i| i.to_string())
                .chain(["length".to_owned()])
                .collect(),
            _ => return Err(JsErrorCode::ARGUMENT_NOT_OBJECT),
        };
        let names = names
            .into_iter()
            .map(|name| state.alloc_value(Value::String(name)))
            .collect();
        Ok(state.alloc_value(Value::Array(names)))
    }

    fn own_property_descriptor(
        &self,
        object: RawHandle,
        property_id: RawHandle,
    ) -> Native<RawHandle> {
        let mut state = self.state();
        let context = state.context()?;
        let name = state.property_name(property_id)?;
        let found = match state.value(object)? {
            Value::Object(object) => object.get(&name),
            _ => return Err(JsErrorCode::ARGUMENT_NOT_OBJECT),
        };
        let Some(value) = found else {
            return Ok(context.undefined);
        };
        let mut descriptor = Object {
            prototype: context.object_prototype,
            ..Object::default()
        };
        descriptor.set("value", value);
        for flag in ["writable", "enumerable", "configurable"] {
            descriptor.set(flag, context.true_value);
        }
        Ok(state.alloc_value(Value::Object(descriptor)))
    }

    fn prototype(&self, object: RawHandle) -> Native<RawHandle> {
        let state = self.state();
        let context = state.context()?;
        match state.value(object)? {
            Value::Object(object) => Ok(object.prototype),
            Value::Array(_) | Value::Function(_) => Ok(context.object_prototype),
            _ => Err(JsErrorCode::ARGUMENT_NOT_OBJECT),
        }
    }

    fn call_function(&self, function: RawHandle, arguments: &[RawHandle]) -> Native<RawHandle> {
        self.state().call(function, arguments)
    }

    fn value_type(&self, value: RawHandle) -> Native<JsValueType> {
        Ok(match self.state().value(value)? {
            Value::Undefined => JsValueType::Undefined,
            Value::Null => JsValueType::Null,
            Value::Bool(_) => JsValueType::Boolean,
            Value::Number(_) => JsValueType::Number,
            Value::String(_) => JsValueType::String,
            Value::Object(object) if object.error => JsValueType::Error,
            Value::Object(_) => JsValueType::Object,
            Value::Array(_) => JsValueType::Array,
            Value::Function(_) => JsValueType::Function,
        })
    }

    fn value_to_variant(&self, value: RawHandle) -> Native<Variant> {
        let host = self.state().to_variant(value)?;
        Variant::from_host(&host).map_err(|_| JsErrorCode::INVALID_ARGUMENT)
    }

    fn variant_to_value(&self, variant: &Variant) -> Native<RawHandle> {
        let host = variant.to_host().map_err(|_| JsErrorCode::INVALID_ARGUMENT)?;
        self.state().from_host(&host)
    }

    fn convert_value_to_string(&self, value: RawHandle) -> Native<RawHandle> {
        let mut state = self.state();
        state.context()?;
        let text = state.to_string(value)?;
        Ok(state.alloc_value(Value::String(text)))
    }

    fn global_object(&self) -> Native<RawHandle> {
        Ok(self.state().context()?.global)
    }

    fn undefined_value(&self) -> Native<RawHandle> {
        Ok(self.state().context()?.undefined)
    }

    fn null_value(&self) -> Native<RawHandle> {
        Ok(self.state().context()?.null)
    }

    fn true_value(&self) -> Native<RawHandle> {
        Ok(self.state().context()?.true_value)
    }

    fn false_value(&self) -> Native<RawHandle> {
        Ok(self.state().context()?.false_value)
    }

    fn get_and_clear_exception(&self) -> Native<RawHandle> {
        Ok(std::mem::take(&mut self.state().exception))
    }

    fn add_ref(&self, handle: RawHandle) -> Native<u32> {
        let mut state = self.state();
        let slot = state
            .slots
            .get_mut(&handle)
            .ok_or(JsErrorCode::INVALID_ARGUMENT)?;
        slot.refs += 1;
        Ok(slot.refs)
    }

    fn release(&self, handle: RawHandle) -> Native<u32> {
        let mut state = self.state();
        let slot = state
            .slots
            .get_mut(&handle)
            .ok_or(JsErrorCode::INVALID_ARGUMENT)?;
        slot.refs = slot
            .refs
            .checked_sub(1)
            .ok_or(JsErrorCode::INVALID_ARGUMENT)?;
        Ok(slot.refs)
    }
}
