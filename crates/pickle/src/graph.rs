use crate::config::LoaderConfig;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Index of a container or object inside [`ObjectGraph`]
pub type SlotId = usize;

/// A stack value produced by the unpickler.
///
/// Scalars are stored inline; text and byte payloads are reference-counted
/// so memo back-references and DUP never copy them. Everything that can be
/// mutated after it is memoized (lists, dicts, sets, objects) lives in an
/// arena slot and is referenced by index, so memo back-references share one
/// slot and cycles never duplicate data.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    /// Integer outside the `i64` range, as decimal text (or a size summary
    /// for operands too large to convert)
    BigInt(Arc<str>),
    Float(f64),
    Str(Arc<str>),
    Bytes(Arc<[u8]>),
    Ref(SlotId),
}

impl Value {
    pub fn str(text: impl Into<Arc<str>>) -> Self {
        Self::Str(text.into())
    }

    pub fn bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Bytes(bytes.into())
    }
}

/// Arena entry
#[derive(Debug, Clone)]
pub enum Slot {
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Set(Vec<Value>),
    FrozenSet(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    Object(Opaque),
    /// A class or function reference that was never called
    Global(TypeRef),
}

/// Fully qualified name of a type referenced by the artifact
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeRef {
    pub module: String,
    pub name: String,
}

impl TypeRef {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.module.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.module, self.name)
        }
    }
}

/// Placeholder for an object whose type was not rebuilt.
///
/// Accepts any constructor arguments and records every state attached to
/// it, so downstream code can still read its field set.
#[derive(Debug, Clone, Default)]
pub struct Opaque {
    pub type_ref: TypeRef,
    /// Positional constructor arguments
    pub args: Vec<Value>,
    /// Keyword arguments from NEWOBJ_EX
    pub kwargs: Option<Value>,
    /// States attached by BUILD, oldest first
    pub states: Vec<Value>,
    /// Items appended to the object (list subclasses)
    pub items: Vec<Value>,
    /// Entries assigned to the object (dict subclasses)
    pub entries: Vec<(Value, Value)>,
}

/// Loaded artifact: an arena of slots plus the value STOP returned
#[derive(Debug, Clone)]
pub struct ObjectGraph {
    pub(crate) slots: Vec<Slot>,
    pub(crate) root: Value,
    pub(crate) config: LoaderConfig,
    pub(crate) protocol: u8,
}

impl ObjectGraph {
    /// The top-level value of the artifact
    #[must_use]
    pub fn root(&self) -> RawNode<'_> {
        RawNode {
            graph: self,
            value: &self.root,
        }
    }

    /// Highest protocol announced by a PROTO opcode (0 when absent)
    #[must_use]
    pub const fn protocol(&self) -> u8 {
        self.protocol
    }

    /// Number of containers and objects in the arena
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub const fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub(crate) fn slot(&self, id: SlotId) -> Option<&Slot> {
        self.slots.get(id)
    }

    pub(crate) fn node<'g>(&'g self, value: &'g Value) -> RawNode<'g> {
        RawNode { graph: self, value }
    }
}

/// Coarse classification of a [`RawNode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Null,
    Scalar,
    Sequence,
    Mapping,
    Object,
}

/// Borrowed scalar payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar<'g> {
    Bool(bool),
    Int(i64),
    BigInt(&'g str),
    Float(f64),
    Str(&'g str),
    Bytes(&'g [u8]),
}

/// Read-only view of one value inside an [`ObjectGraph`]
#[derive(Clone, Copy)]
pub struct RawNode<'g> {
    graph: &'g ObjectGraph,
    value: &'g Value,
}

impl fmt::Debug for RawNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawNode").field(&self.display()).finish()
    }
}

impl<'g> RawNode<'g> {
    #[must_use]
    pub const fn graph(&self) -> &'g ObjectGraph {
        self.graph
    }

    #[must_use]
    pub const fn value(&self) -> &'g Value {
        self.value
    }

    fn slot(&self) -> Option<&'g Slot> {
        match self.value {
            Value::Ref(id) => self.graph.slot(*id),
            _ => None,
        }
    }

    /// Arena index, for containers and objects
    #[must_use]
    pub fn slot_id(&self) -> Option<SlotId> {
        match self.value {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        match self.value {
            Value::None => Shape::Null,
            Value::Ref(_) => match self.slot() {
                Some(Slot::List(_) | Slot::Tuple(_) | Slot::Set(_) | Slot::FrozenSet(_)) => {
                    Shape::Sequence
                }
                Some(Slot::Dict(_)) => Shape::Mapping,
                Some(Slot::Object(_) | Slot::Global(_)) => Shape::Object,
                None => Shape::Null,
            },
            _ => Shape::Scalar,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.shape() == Shape::Null
    }

    #[must_use]
    pub fn is_mapping(&self) -> bool {
        self.shape() == Shape::Mapping
    }

    #[must_use]
    pub fn scalar(&self) -> Option<Scalar<'g>> {
        match self.value {
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Int(i) => Some(Scalar::Int(*i)),
            Value::BigInt(s) => Some(Scalar::BigInt(&**s)),
            Value::Float(f) => Some(Scalar::Float(*f)),
            Value::Str(s) => Some(Scalar::Str(&**s)),
            Value::Bytes(b) => Some(Scalar::Bytes(&**b)),
            Value::None | Value::Ref(_) => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&'g str> {
        match self.value {
            Value::Str(s) => Some(&**s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self.value {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// True for text and byte-string scalars
    #[must_use]
    pub fn is_text_like(&self) -> bool {
        matches!(self.value, Value::Str(_) | Value::Bytes(_))
    }

    /// Elements of a list, tuple, set or frozenset, in stream order
    #[must_use]
    pub fn sequence(&self) -> Option<impl Iterator<Item = RawNode<'g>> + 'g> {
        let graph = self.graph;
        let items = match self.slot()? {
            Slot::List(items) | Slot::Tuple(items) | Slot::Set(items) | Slot::FrozenSet(items) => {
                items
            }
            _ => return None,
        };
        Some(items.iter().map(move |value| graph.node(value)))
    }

    /// Entries of a dict, in insertion order
    #[must_use]
    pub fn entries(&self) -> Option<impl Iterator<Item = (RawNode<'g>, RawNode<'g>)> + 'g> {
        let graph = self.graph;
        match self.slot()? {
            Slot::Dict(entries) => Some(
                entries
                    .iter()
                    .map(move |(k, v)| (graph.node(k), graph.node(v))),
            ),
            _ => None,
        }
    }

    /// The placeholder behind an object node
    #[must_use]
    pub fn object(&self) -> Option<&'g Opaque> {
        match self.slot()? {
            Slot::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Constructor arguments recorded on an object placeholder
    pub fn args(&self) -> impl Iterator<Item = RawNode<'g>> + 'g {
        let graph = self.graph;
        let args: &'g [Value] = self.object().map_or(&[], |obj| obj.args.as_slice());
        args.iter().map(move |value| graph.node(value))
    }

    /// Referenced type of an object or bare global
    #[must_use]
    pub fn type_ref(&self) -> Option<&'g TypeRef> {
        match self.slot()? {
            Slot::Object(obj) => Some(&obj.type_ref),
            Slot::Global(type_ref) => Some(type_ref),
            _ => None,
        }
    }

    /// Look up a string key: dict entries, or entries assigned to an object.
    ///
    /// Later duplicates win, matching dict assignment order.
    #[must_use]
    pub fn get_key(&self, key: &str) -> Option<RawNode<'g>> {
        let entries = match self.slot()? {
            Slot::Dict(entries) => entries,
            Slot::Object(obj) => &obj.entries,
            _ => return None,
        };
        find_entry(entries, key).map(|value| self.graph.node(value))
    }

    /// Look up an attribute recovered from an object's attached state.
    ///
    /// A dict state contributes its keys, a `(dict, slots)` pair contributes
    /// both halves, and any other state is exposed as the `state` attribute.
    /// The most recent BUILD wins.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<RawNode<'g>> {
        let obj = self.object()?;
        obj.states
            .iter()
            .rev()
            .find_map(|state| self.state_field(state, name))
            .map(|value| self.graph.node(value))
    }

    fn state_field(&self, state: &'g Value, name: &str) -> Option<&'g Value> {
        let slot = match state {
            Value::None => return None,
            Value::Ref(id) => self.graph.slot(*id),
            _ => None,
        };
        match slot {
            Some(Slot::Dict(entries)) => find_entry(entries, name),
            Some(Slot::Tuple(parts)) if parts.len() == 2 && parts.iter().all(|p| self.is_dict_or_none(p)) => {
                parts.iter().rev().find_map(|part| match part {
                    Value::Ref(id) => match self.graph.slot(*id) {
                        Some(Slot::Dict(entries)) => find_entry(entries, name),
                        _ => None,
                    },
                    _ => None,
                })
            }
            _ => (name == "state").then_some(state),
        }
    }

    fn is_dict_or_none(&self, value: &Value) -> bool {
        match value {
            Value::None => true,
            Value::Ref(id) => matches!(self.graph.slot(*id), Some(Slot::Dict(_))),
            _ => false,
        }
    }

    /// All recovered attribute names and values of an object, later states
    /// overriding earlier ones.
    #[must_use]
    pub fn attributes(&self) -> Vec<(String, RawNode<'g>)> {
        let Some(obj) = self.object() else {
            return Vec::new();
        };
        let mut fields: Vec<(String, RawNode<'g>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut upsert = |key: String, value: &'g Value| {
            let node = self.graph.node(value);
            match index.get(&key) {
                Some(&at) => fields[at].1 = node,
                None => {
                    index.insert(key.clone(), fields.len());
                    fields.push((key, node));
                }
            }
        };
        for state in &obj.states {
            let dicts: Vec<&'g Vec<(Value, Value)>> = match state {
                Value::None => continue,
                Value::Ref(id) => match self.graph.slot(*id) {
                    Some(Slot::Dict(entries)) => vec![entries],
                    Some(Slot::Tuple(parts))
                        if parts.len() == 2 && parts.iter().all(|p| self.is_dict_or_none(p)) =>
                    {
                        parts
                            .iter()
                            .filter_map(|part| match part {
                                Value::Ref(id) => match self.graph.slot(*id) {
                                    Some(Slot::Dict(entries)) => Some(entries),
                                    _ => None,
                                },
                                _ => None,
                            })
                            .collect()
                    }
                    _ => {
                        upsert("state".to_string(), state);
                        continue;
                    }
                },
                _ => {
                    upsert("state".to_string(), state);
                    continue;
                }
            };
            for entries in dicts {
                for (key, value) in entries {
                    if let Value::Str(key) = key {
                        upsert(key.to_string(), value);
                    }
                }
            }
        }
        fields
    }
}

fn find_entry<'g>(entries: &'g [(Value, Value)], key: &str) -> Option<&'g Value> {
    entries
        .iter()
        .rev()
        .find(|(k, _)| matches!(k, Value::Str(s) if &**s == key))
        .map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(slots: Vec<Slot>, root: Value) -> ObjectGraph {
        ObjectGraph {
            slots,
            root,
            config: LoaderConfig::default(),
            protocol: 4,
        }
    }

    fn s(text: &str) -> Value {
        Value::str(text)
    }

    #[test]
    fn dict_lookup_uses_last_duplicate() {
        let g = graph(
            vec![Slot::Dict(vec![(s("a"), Value::Int(1)), (s("a"), Value::Int(2))])],
            Value::Ref(0),
        );
        let root = g.root();
        assert_eq!(root.shape(), Shape::Mapping);
        assert_eq!(root.get_key("a").and_then(|n| n.as_int()), Some(2));
        assert!(root.get_key("b").is_none());
        assert!(root.get_attr("a").is_none());
    }

    #[test]
    fn object_attributes_merge_dict_and_slot_states() {
        let g = graph(
            vec![
                Slot::Object(Opaque {
                    type_ref: TypeRef::new("pkg", "Thing"),
                    states: vec![Value::Ref(1), Value::Ref(2)],
                    ..Opaque::default()
                }),
                Slot::Dict(vec![(s("name"), s("old")), (s("kind"), Value::Int(5))]),
                Slot::Tuple(vec![Value::None, Value::Ref(3)]),
                Slot::Dict(vec![(s("name"), s("new"))]),
            ],
            Value::Ref(0),
        );
        let root = g.root();
        assert_eq!(root.shape(), Shape::Object);
        assert_eq!(root.get_attr("name").and_then(|n| n.as_str()), Some("new"));
        assert_eq!(root.get_attr("kind").and_then(|n| n.as_int()), Some(5));
        let names: Vec<String> = root.attributes().into_iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["name".to_string(), "kind".to_string()]);
    }

    #[test]
    fn scalar_state_is_exposed_as_state_attribute() {
        let g = graph(
            vec![Slot::Object(Opaque {
                type_ref: TypeRef::new("pkg", "Token"),
                states: vec![s("payload")],
                ..Opaque::default()
            })],
            Value::Ref(0),
        );
        let root = g.root();
        assert_eq!(root.get_attr("state").and_then(|n| n.as_str()), Some("payload"));
        assert!(root.get_attr("name").is_none());
    }

    #[test]
    fn sequences_iterate_in_order() {
        let g = graph(
            vec![Slot::Tuple(vec![s("x"), Value::Int(3)])],
            Value::Ref(0),
        );
        let items: Vec<_> = g.root().sequence().unwrap().collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_text_like());
        assert_eq!(items[1].as_int(), Some(3));
    }
}
