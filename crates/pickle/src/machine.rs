use crate::cursor::Cursor;
use crate::error::{LoadError, Result};
use crate::graph::{Opaque, Slot, TypeRef, Value};
use crate::literal;
use crate::opcode::{self as op, HIGHEST_PROTOCOL};
use crate::resolve::{self, Call};
use std::collections::HashMap;

/// Output of a completed run
pub struct Loaded {
    pub root: Value,
    pub slots: Vec<Slot>,
    pub protocol: u8,
}

/// Pickle virtual machine.
///
/// Executes only the data-building subset of the format: every callable the
/// stream names is handed to [`crate::resolve`], which either rebuilds a
/// known data type natively or records an [`Opaque`] placeholder.
pub struct Machine<'a> {
    cur: Cursor<'a>,
    stack: Vec<Value>,
    marks: Vec<usize>,
    memo: HashMap<u64, Value>,
    pub(crate) slots: Vec<Slot>,
    protocol: u8,
    /// Offset of the opcode being executed
    at: usize,
}

impl<'a> Machine<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            cur: Cursor::new(bytes),
            stack: Vec::new(),
            marks: Vec::new(),
            memo: HashMap::new(),
            slots: Vec::new(),
            protocol: 0,
            at: 0,
        }
    }

    pub fn run(mut self) -> Result<Loaded> {
        loop {
            self.at = self.cur.position();
            let code = self.cur.u8()?;
            if code == op::STOP {
                let root = self.pop(code)?;
                return Ok(Loaded {
                    root,
                    slots: self.slots,
                    protocol: self.protocol,
                });
            }
            self.step(code)?;
        }
    }

    fn step(&mut self, code: u8) -> Result<()> {
        match code {
            op::PROTO => {
                let version = self.cur.u8()?;
                if version > HIGHEST_PROTOCOL {
                    return Err(LoadError::UnsupportedProtocol(version));
                }
                self.protocol = version;
            }
            op::FRAME => {
                // Frames only batch reads; the whole input is already in memory.
                self.cur.u64_le()?;
            }
            op::MARK => self.marks.push(self.stack.len()),
            op::POP => {
                if self.stack.len() > self.fence() {
                    self.stack.pop();
                } else {
                    self.pop_mark(code)?;
                }
            }
            op::POP_MARK => {
                self.pop_mark(code)?;
            }
            op::DUP => {
                let top = self.peek(code)?.clone();
                self.stack.push(top);
            }

            // Scalars
            op::NONE => self.stack.push(Value::None),
            op::NEWTRUE => self.stack.push(Value::Bool(true)),
            op::NEWFALSE => self.stack.push(Value::Bool(false)),
            op::INT => {
                let line = self.text_line()?;
                let value = match line.as_str() {
                    "00" => Value::Bool(false),
                    "01" => Value::Bool(true),
                    other => literal::parse_int(other)
                        .ok_or_else(|| self.malformed(format!("invalid INT literal {other:?}")))?,
                };
                self.stack.push(value);
            }
            op::BININT => {
                let v = self.cur.i32_le()?;
                self.stack.push(Value::Int(i64::from(v)));
            }
            op::BININT1 => {
                let v = self.cur.u8()?;
                self.stack.push(Value::Int(i64::from(v)));
            }
            op::BININT2 => {
                let v = self.cur.u16_le()?;
                self.stack.push(Value::Int(i64::from(v)));
            }
            op::LONG => {
                let line = self.text_line()?;
                let value = literal::parse_int(&line)
                    .ok_or_else(|| self.malformed(format!("invalid LONG literal {line:?}")))?;
                self.stack.push(value);
            }
            op::LONG1 => {
                let n = self.cur.u8()?;
                let bytes = self.cur.take(usize::from(n))?;
                self.stack.push(literal::decode_long(bytes));
            }
            op::LONG4 => {
                let n = self.signed_len()?;
                let bytes = self.cur.take(n)?;
                self.stack.push(literal::decode_long(bytes));
            }
            op::FLOAT => {
                let line = self.text_line()?;
                let value: f64 = line
                    .trim()
                    .parse()
                    .map_err(|_| self.malformed(format!("invalid FLOAT literal {line:?}")))?;
                self.stack.push(Value::Float(value));
            }
            op::BINFLOAT => {
                let v = self.cur.f64_be()?;
                self.stack.push(Value::Float(v));
            }

            // Text and bytes
            op::STRING => {
                let line = self.cur.line()?;
                let text = literal::unquote_string(line)
                    .ok_or_else(|| self.malformed("the STRING opcode argument must be quoted"))?;
                self.stack.push(Value::str(text));
            }
            op::BINSTRING => {
                let n = self.signed_len()?;
                let bytes = self.cur.take(n)?;
                self.stack.push(Value::str(literal::latin1(bytes)));
            }
            op::SHORT_BINSTRING => {
                let n = self.cur.u8()?;
                let bytes = self.cur.take(usize::from(n))?;
                self.stack.push(Value::str(literal::latin1(bytes)));
            }
            op::UNICODE => {
                let line = self.cur.line()?;
                self.stack.push(Value::str(literal::raw_unicode_escape(line)));
            }
            op::SHORT_BINUNICODE => {
                let n = self.cur.u8()?;
                let bytes = self.cur.take(usize::from(n))?;
                self.push_utf8(bytes);
            }
            op::BINUNICODE => {
                let n = self.cur.u32_le()?;
                let bytes = self.cur.take_u64_len(u64::from(n))?;
                self.push_utf8(bytes);
            }
            op::BINUNICODE8 => {
                let n = self.cur.u64_le()?;
                let bytes = self.cur.take_u64_len(n)?;
                self.push_utf8(bytes);
            }
            op::SHORT_BINBYTES => {
                let n = self.cur.u8()?;
                let bytes = self.cur.take(usize::from(n))?;
                self.stack.push(Value::bytes(bytes));
            }
            op::BINBYTES => {
                let n = self.cur.u32_le()?;
                let bytes = self.cur.take_u64_len(u64::from(n))?;
                self.stack.push(Value::bytes(bytes));
            }
            op::BINBYTES8 | op::BYTEARRAY8 => {
                let n = self.cur.u64_le()?;
                let bytes = self.cur.take_u64_len(n)?;
                self.stack.push(Value::bytes(bytes));
            }

            // Containers
            op::EMPTY_LIST => self.push_slot(Slot::List(Vec::new())),
            op::EMPTY_DICT => self.push_slot(Slot::Dict(Vec::new())),
            op::EMPTY_SET => self.push_slot(Slot::Set(Vec::new())),
            op::EMPTY_TUPLE => self.push_slot(Slot::Tuple(Vec::new())),
            op::LIST => {
                let items = self.pop_mark(code)?;
                self.push_slot(Slot::List(items));
            }
            op::TUPLE => {
                let items = self.pop_mark(code)?;
                self.push_slot(Slot::Tuple(items));
            }
            op::TUPLE1 | op::TUPLE2 | op::TUPLE3 => {
                let n = usize::from(code - op::TUPLE1) + 1;
                if self.stack.len() < self.fence() + n {
                    return Err(self.underflow(code));
                }
                let items = self.stack.split_off(self.stack.len() - n);
                self.push_slot(Slot::Tuple(items));
            }
            op::DICT => {
                let items = self.pop_mark(code)?;
                let entries = self.pairs(items)?;
                self.push_slot(Slot::Dict(entries));
            }
            op::FROZENSET => {
                let items = self.pop_mark(code)?;
                self.push_slot(Slot::FrozenSet(items));
            }
            op::APPEND => {
                let value = self.pop(code)?;
                self.append(code, vec![value])?;
            }
            op::APPENDS => {
                let items = self.pop_mark(code)?;
                self.append(code, items)?;
            }
            op::SETITEM => {
                let value = self.pop(code)?;
                let key = self.pop(code)?;
                self.set_items(code, vec![(key, value)])?;
            }
            op::SETITEMS => {
                let items = self.pop_mark(code)?;
                let entries = self.pairs(items)?;
                self.set_items(code, entries)?;
            }
            op::ADDITEMS => {
                let items = self.pop_mark(code)?;
                self.add_items(code, items)?;
            }

            // Memo
            op::PUT => {
                let key = self.memo_key_line()?;
                self.put(code, key)?;
            }
            op::BINPUT => {
                let key = self.cur.u8()?;
                self.put(code, u64::from(key))?;
            }
            op::LONG_BINPUT => {
                let key = self.cur.u32_le()?;
                self.put(code, u64::from(key))?;
            }
            op::MEMOIZE => {
                let key = self.memo.len() as u64;
                self.put(code, key)?;
            }
            op::GET => {
                let key = self.memo_key_line()?;
                self.get(key)?;
            }
            op::BINGET => {
                let key = self.cur.u8()?;
                self.get(u64::from(key))?;
            }
            op::LONG_BINGET => {
                let key = self.cur.u32_le()?;
                self.get(u64::from(key))?;
            }

            // Types and construction
            op::GLOBAL => {
                let module = self.text_line()?;
                let name = self.text_line()?;
                self.push_slot(Slot::Global(resolve::type_ref(&module, &name)));
            }
            op::STACK_GLOBAL => {
                let name = self.pop(code)?;
                let module = self.pop(code)?;
                let (Value::Str(module), Value::Str(name)) = (module, name) else {
                    return Err(self.malformed("STACK_GLOBAL requires str"));
                };
                self.push_slot(Slot::Global(resolve::type_ref(&module, &name)));
            }
            op::EXT1 | op::EXT2 | op::EXT4 => {
                let ext = match code {
                    op::EXT1 => u32::from(self.cur.u8()?),
                    op::EXT2 => u32::from(self.cur.u16_le()?),
                    _ => self.cur.u32_le()?,
                };
                log::debug!("extension code {ext} has no registry; using placeholder type");
                self.push_slot(Slot::Global(TypeRef::new("copyreg.extension", ext.to_string())));
            }
            op::REDUCE => {
                let args = self.pop(code)?;
                let callable = self.pop(code)?;
                let args = self.argument_list(args);
                let value = self.construct(callable, args, None, Call::Reduce);
                self.stack.push(value);
            }
            op::NEWOBJ => {
                let args = self.pop(code)?;
                let cls = self.pop(code)?;
                let args = self.argument_list(args);
                let value = self.construct(cls, args, None, Call::New);
                self.stack.push(value);
            }
            op::NEWOBJ_EX => {
                let kwargs = self.pop(code)?;
                let args = self.pop(code)?;
                let cls = self.pop(code)?;
                let args = self.argument_list(args);
                let value = self.construct(cls, args, Some(kwargs), Call::New);
                self.stack.push(value);
            }
            op::INST => {
                let module = self.text_line()?;
                let name = self.text_line()?;
                let args = self.pop_mark(code)?;
                let cls = self.alloc(Slot::Global(resolve::type_ref(&module, &name)));
                let value = self.construct(cls, args, None, Call::Reduce);
                self.stack.push(value);
            }
            op::OBJ => {
                let mut items = self.pop_mark(code)?;
                if items.is_empty() {
                    return Err(self.underflow(code));
                }
                let cls = items.remove(0);
                let value = self.construct(cls, items, None, Call::Reduce);
                self.stack.push(value);
            }
            op::BUILD => {
                let state = self.pop(code)?;
                let target = self.peek(code)?.clone();
                self.build(target, state);
            }

            // Out-of-band references
            op::PERSID => {
                let pid = self.text_line()?;
                self.push_placeholder(TypeRef::new("pickle", "persistent_id"), Value::str(pid));
            }
            op::BINPERSID => {
                let pid = self.pop(code)?;
                self.push_placeholder(TypeRef::new("pickle", "persistent_id"), pid);
            }
            op::NEXT_BUFFER => {
                self.push_slot(Slot::Object(Opaque {
                    type_ref: TypeRef::new("pickle", "PickleBuffer"),
                    ..Opaque::default()
                }));
            }
            op::READONLY_BUFFER => {
                self.peek(code)?;
            }

            _ => {
                return Err(LoadError::UnknownOpcode {
                    opcode: code,
                    offset: self.at,
                })
            }
        }
        Ok(())
    }

    // ---- stack helpers ----

    /// Stack height at the innermost open MARK
    fn fence(&self) -> usize {
        self.marks.last().copied().unwrap_or(0)
    }

    fn pop(&mut self, code: u8) -> Result<Value> {
        if self.stack.len() <= self.fence() {
            return Err(self.underflow(code));
        }
        self.stack.pop().ok_or_else(|| self.underflow(code))
    }

    fn peek(&self, code: u8) -> Result<&Value> {
        if self.stack.len() <= self.fence() {
            return Err(self.underflow(code));
        }
        self.stack.last().ok_or_else(|| self.underflow(code))
    }

    fn pop_mark(&mut self, code: u8) -> Result<Vec<Value>> {
        let mark = self.marks.pop().ok_or(LoadError::MarkNotFound {
            opcode: op::name(code),
            offset: self.at,
        })?;
        Ok(self.stack.split_off(mark.min(self.stack.len())))
    }

    pub(crate) fn alloc(&mut self, slot: Slot) -> Value {
        self.slots.push(slot);
        Value::Ref(self.slots.len() - 1)
    }

    fn push_slot(&mut self, slot: Slot) {
        let value = self.alloc(slot);
        self.stack.push(value);
    }

    fn push_placeholder(&mut self, type_ref: TypeRef, arg: Value) {
        log::debug!("substituting placeholder for out-of-band reference {type_ref}");
        self.push_slot(Slot::Object(Opaque {
            type_ref,
            args: vec![arg],
            ..Opaque::default()
        }));
    }

    fn push_utf8(&mut self, bytes: &[u8]) {
        let text = match std::str::from_utf8(bytes) {
            Ok(text) => Value::str(text),
            Err(_) => {
                log::debug!("invalid UTF-8 in string at offset {}; decoding lossily", self.at);
                Value::str(String::from_utf8_lossy(bytes).into_owned())
            }
        };
        self.stack.push(text);
    }

    // ---- operand helpers ----

    fn text_line(&mut self) -> Result<String> {
        let line = self.cur.line()?;
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        Ok(String::from_utf8_lossy(line).into_owned())
    }

    fn memo_key_line(&mut self) -> Result<u64> {
        let line = self.text_line()?;
        line.trim()
            .parse()
            .map_err(|_| self.malformed(format!("invalid memo key {line:?}")))
    }

    fn signed_len(&mut self) -> Result<usize> {
        let n = self.cur.i32_le()?;
        usize::try_from(n).map_err(|_| self.malformed(format!("negative byte count {n}")))
    }

    fn pairs(&self, items: Vec<Value>) -> Result<Vec<(Value, Value)>> {
        if items.len() % 2 != 0 {
            return Err(self.malformed("odd number of items for dict"));
        }
        let mut entries = Vec::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
            entries.push((k, v));
        }
        Ok(entries)
    }

    /// Positional arguments carried by a REDUCE/NEWOBJ argument value
    fn argument_list(&self, args: Value) -> Vec<Value> {
        match &args {
            Value::Ref(id) => match self.slots.get(*id) {
                Some(Slot::Tuple(items) | Slot::List(items)) => items.clone(),
                _ => vec![args],
            },
            Value::None => Vec::new(),
            _ => vec![args],
        }
    }

    // ---- memo ----

    fn put(&mut self, code: u8, key: u64) -> Result<()> {
        let top = self.peek(code)?.clone();
        self.memo.insert(key, top);
        Ok(())
    }

    fn get(&mut self, key: u64) -> Result<()> {
        let value = self.memo.get(&key).cloned().ok_or(LoadError::MemoMissing {
            key,
            offset: self.at,
        })?;
        self.stack.push(value);
        Ok(())
    }

    // ---- mutation ----

    fn target_slot(&mut self, code: u8) -> Result<&mut Slot> {
        let target = self.peek(code)?.clone();
        let at = self.at;
        match target {
            Value::Ref(id) => self
                .slots
                .get_mut(id)
                .ok_or_else(|| LoadError::malformed(at, "dangling reference")),
            other => Err(LoadError::malformed(
                at,
                format!("{} onto a non-container {other:?}", op::name(code)),
            )),
        }
    }

    fn append(&mut self, code: u8, items: Vec<Value>) -> Result<()> {
        let at = self.at;
        match self.target_slot(code)? {
            Slot::List(list) => list.extend(items),
            Slot::Set(set) => set.extend(items),
            Slot::Object(obj) => obj.items.extend(items),
            _ => return Err(LoadError::malformed(at, format!("{} onto an immutable value", op::name(code)))),
        }
        Ok(())
    }

    fn set_items(&mut self, code: u8, entries: Vec<(Value, Value)>) -> Result<()> {
        let at = self.at;
        match self.target_slot(code)? {
            Slot::Dict(dict) => dict.extend(entries),
            Slot::Object(obj) => obj.entries.extend(entries),
            _ => return Err(LoadError::malformed(at, format!("{} onto a non-mapping", op::name(code)))),
        }
        Ok(())
    }

    fn add_items(&mut self, code: u8, items: Vec<Value>) -> Result<()> {
        let at = self.at;
        match self.target_slot(code)? {
            Slot::Set(set) => set.extend(items),
            Slot::Object(obj) => obj.items.extend(items),
            _ => return Err(LoadError::malformed(at, "ADDITEMS onto a non-set")),
        }
        Ok(())
    }

    /// Attach BUILD state. Only placeholders take state; anything else keeps
    /// its rebuilt value and the state is dropped.
    fn build(&mut self, target: Value, state: Value) {
        if let Value::Ref(id) = target {
            if let Some(Slot::Object(obj)) = self.slots.get_mut(id) {
                if state != Value::None {
                    obj.states.push(state);
                }
                return;
            }
        }
        log::debug!("ignoring BUILD state for rebuilt value at offset {}", self.at);
    }

    // ---- errors ----

    fn underflow(&self, code: u8) -> LoadError {
        LoadError::StackUnderflow {
            opcode: op::name(code),
            offset: self.at,
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> LoadError {
        LoadError::malformed(self.at, reason)
    }
}
