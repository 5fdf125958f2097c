//! Constructor dispatch for REDUCE, NEWOBJ, INST and OBJ.
//!
//! Only data-only standard-library types are rebuilt, and only when their
//! arguments have the expected shape. Every other callable produces an
//! [`Opaque`] placeholder that records its arguments.

use crate::graph::{Opaque, Slot, TypeRef, Value};
use crate::machine::Machine;

/// How a callable was invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    /// `callable(*args)` (REDUCE, INST, OBJ)
    Reduce,
    /// `cls.__new__(cls, *args)` (NEWOBJ, NEWOBJ_EX)
    New,
}

/// Canonical type reference, mapping legacy module names.
pub fn type_ref(module: &str, name: &str) -> TypeRef {
    let module = match module {
        "__builtin__" => "builtins",
        "copy_reg" => "copyreg",
        other => other,
    };
    TypeRef::new(module, name)
}

impl Machine<'_> {
    pub(crate) fn construct(
        &mut self,
        callable: Value,
        args: Vec<Value>,
        kwargs: Option<Value>,
        call: Call,
    ) -> Value {
        let type_ref = self.type_of(&callable);
        let (type_ref, args, kwargs, call) = match self.unwrap_helper(&type_ref, &args) {
            Some((cls, inner_args, inner_kwargs)) => {
                let inner = self.type_of(&cls);
                if is_copyreg_helper(&inner) {
                    // Helpers only ever wrap a class; a helper wrapping a
                    // helper is left unevaluated.
                    log::debug!("substituting placeholder for nested {inner} call");
                    return self.placeholder(inner, inner_args, inner_kwargs);
                }
                (inner, inner_args, inner_kwargs.or(kwargs), Call::New)
            }
            None => (type_ref, args, kwargs, call),
        };

        if let Some(value) = self.native(&type_ref, &args, call) {
            return value;
        }

        log::debug!("substituting placeholder for {type_ref}");
        self.placeholder(type_ref, args, kwargs)
    }

    fn type_of(&self, callable: &Value) -> TypeRef {
        match callable {
            Value::Ref(id) => match self.slots.get(*id) {
                Some(Slot::Global(type_ref)) => type_ref.clone(),
                Some(Slot::Object(obj)) => obj.type_ref.clone(),
                _ => TypeRef::new("", "unknown"),
            },
            _ => TypeRef::new("", "unknown"),
        }
    }

    /// Class, arguments and keyword arguments behind one `copyreg` helper
    /// call, or `None` when the callable is not a helper.
    fn unwrap_helper(
        &self,
        type_ref: &TypeRef,
        args: &[Value],
    ) -> Option<(Value, Vec<Value>, Option<Value>)> {
        if type_ref.module != "copyreg" {
            return None;
        }
        match (type_ref.name.as_str(), args) {
            ("__newobj__", [cls, rest @ ..]) => Some((cls.clone(), rest.to_vec(), None)),
            ("__newobj_ex__", [cls, inner, kwargs]) => {
                Some((cls.clone(), self.items_of(inner), Some(kwargs.clone())))
            }
            // (cls, base, state): the base initializer never runs for plain
            // objects, so only the class matters.
            ("_reconstructor", [cls, ..]) => Some((cls.clone(), Vec::new(), None)),
            _ => None,
        }
    }

    fn placeholder(&mut self, type_ref: TypeRef, args: Vec<Value>, kwargs: Option<Value>) -> Value {
        self.alloc(Slot::Object(Opaque {
            type_ref,
            args,
            kwargs,
            ..Opaque::default()
        }))
    }

    /// Rebuild an allowlisted type, or `None` when the callable is not
    /// allowlisted or its arguments do not fit.
    fn native(&mut self, type_ref: &TypeRef, args: &[Value], call: Call) -> Option<Value> {
        let module = type_ref.module.as_str();
        let name = type_ref.name.as_str();
        match (module, name) {
            ("builtins", "list") => {
                let items = self.iterable_arg(args)?;
                Some(self.alloc(Slot::List(items)))
            }
            ("builtins", "tuple") => {
                let items = self.iterable_arg(args)?;
                Some(self.alloc(Slot::Tuple(items)))
            }
            ("builtins", "set") => {
                let items = self.iterable_arg(args)?;
                Some(self.alloc(Slot::Set(items)))
            }
            ("builtins", "frozenset") => {
                let items = self.iterable_arg(args)?;
                Some(self.alloc(Slot::FrozenSet(items)))
            }
            ("builtins", "dict") | ("collections", "OrderedDict") => {
                let entries = self.mapping_arg(args.first())?;
                Some(self.alloc(Slot::Dict(entries)))
            }
            ("collections", "defaultdict") => {
                // defaultdict(default_factory, mapping); the factory is dropped.
                let entries = self.mapping_arg(args.get(1))?;
                Some(self.alloc(Slot::Dict(entries)))
            }
            ("builtins", "bytes" | "bytearray") => bytes_of(args),
            ("_codecs", "encode") => match args {
                [Value::Str(text)] => Some(Value::bytes(encode(text, "utf-8")?)),
                [Value::Str(text), Value::Str(encoding)] => {
                    Some(Value::bytes(encode(text, encoding)?))
                }
                _ => None,
            },
            ("builtins", "str") if call == Call::Reduce => match args {
                [] => Some(Value::str("")),
                [Value::Str(s)] => Some(Value::Str(s.clone())),
                [Value::Int(i)] => Some(Value::str(i.to_string())),
                [Value::BigInt(s)] => Some(Value::Str(s.clone())),
                _ => None,
            },
            ("builtins", "int") if call == Call::Reduce => match args {
                [] => Some(Value::Int(0)),
                [Value::Int(i)] => Some(Value::Int(*i)),
                [Value::Bool(b)] => Some(Value::Int(i64::from(*b))),
                [Value::Str(s)] => crate::literal::parse_int(s),
                _ => None,
            },
            ("builtins", "float") if call == Call::Reduce => match args {
                [] => Some(Value::Float(0.0)),
                [Value::Float(f)] => Some(Value::Float(*f)),
                [Value::Int(i)] => Some(Value::Float(*i as f64)),
                [Value::Str(s)] => s.trim().parse().ok().map(Value::Float),
                _ => None,
            },
            ("builtins", "getattr") => match args {
                [Value::Ref(id), Value::Str(attr)] => {
                    let member = match self.slots.get(*id)? {
                        Slot::Global(owner) => {
                            TypeRef::new(owner.module.clone(), format!("{}.{attr}", owner.name))
                        }
                        _ => return None,
                    };
                    log::debug!("substituting placeholder for member {member}");
                    Some(self.alloc(Slot::Object(Opaque {
                        type_ref: member,
                        ..Opaque::default()
                    })))
                }
                _ => None,
            },
            (m, n) if m == "pathlib" || m.starts_with("pathlib.") => {
                let sep = match n {
                    "Path" | "PosixPath" | "PurePath" | "PurePosixPath" => '/',
                    "WindowsPath" | "PureWindowsPath" => '\\',
                    _ => return None,
                };
                let mut parts = Vec::with_capacity(args.len());
                for arg in args {
                    match arg {
                        Value::Str(part) => parts.push(&**part),
                        _ => return None,
                    }
                }
                Some(Value::str(join_path(&parts, sep)))
            }
            _ => None,
        }
    }

    /// Elements of the single iterable argument (empty when called bare)
    fn iterable_arg(&self, args: &[Value]) -> Option<Vec<Value>> {
        match args {
            [] => Some(Vec::new()),
            [arg] => match arg {
                Value::Ref(id) => match self.slots.get(*id)? {
                    Slot::List(items)
                    | Slot::Tuple(items)
                    | Slot::Set(items)
                    | Slot::FrozenSet(items) => Some(items.clone()),
                    Slot::Dict(entries) => Some(entries.iter().map(|(k, _)| k.clone()).collect()),
                    Slot::Object(_) | Slot::Global(_) => None,
                },
                Value::Str(s) => Some(s.chars().map(|c| Value::str(c.to_string())).collect()),
                Value::Bytes(b) => Some(b.iter().map(|&b| Value::Int(i64::from(b))).collect()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Entries of a mapping argument, or of a sequence of key/value pairs
    fn mapping_arg(&self, arg: Option<&Value>) -> Option<Vec<(Value, Value)>> {
        let Some(arg) = arg else {
            return Some(Vec::new());
        };
        let Value::Ref(id) = arg else {
            return if *arg == Value::None { Some(Vec::new()) } else { None };
        };
        match self.slots.get(*id)? {
            Slot::Dict(entries) => Some(entries.clone()),
            Slot::List(items) | Slot::Tuple(items) => items
                .iter()
                .map(|pair| match self.items_of(pair).as_slice() {
                    [k, v] => Some((k.clone(), v.clone())),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    /// Positional items of a tuple or list value
    fn items_of(&self, value: &Value) -> Vec<Value> {
        match value {
            Value::Ref(id) => match self.slots.get(*id) {
                Some(Slot::Tuple(items) | Slot::List(items)) => items.clone(),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }
}

fn is_copyreg_helper(type_ref: &TypeRef) -> bool {
    type_ref.module == "copyreg"
        && matches!(
            type_ref.name.as_str(),
            "__newobj__" | "__newobj_ex__" | "_reconstructor"
        )
}

fn bytes_of(args: &[Value]) -> Option<Value> {
    match args {
        [] => Some(Value::bytes(Vec::new())),
        [bytes @ Value::Bytes(_)] => Some(bytes.clone()),
        [Value::Str(text), Value::Str(encoding)] => encode(text, encoding).map(Value::bytes),
        _ => None,
    }
}

/// Encode text the way `str.encode` does for the codecs pickle emits.
fn encode(text: &str, encoding: &str) -> Option<Vec<u8>> {
    match encoding.to_ascii_lowercase().replace('_', "-").as_str() {
        "latin1" | "latin-1" | "iso-8859-1" | "iso8859-1" | "l1" => text
            .chars()
            .map(|c| u8::try_from(u32::from(c)).ok())
            .collect(),
        "utf-8" | "utf8" | "ascii" => Some(text.as_bytes().to_vec()),
        _ => None,
    }
}

/// Join path segments; an absolute segment restarts the path.
fn join_path(parts: &[&str], sep: char) -> String {
    let mut out = String::new();
    for part in parts {
        if part.is_empty() {
            continue;
        }
        let absolute = part.starts_with('/')
            || (sep == '\\' && (part.starts_with('\\') || part.get(1..2) == Some(":")));
        if absolute || out.is_empty() {
            out = (*part).to_string();
        } else {
            if !out.ends_with(sep) {
                out.push(sep);
            }
            out.push_str(part);
        }
    }
    if out.is_empty() {
        out.push('.');
    }
    out
}
