//! Document object model: the values the arena stores and the slots
//! containers hold.
//!
//! Containers never own their children. A slot holds a [`Value`], which is
//! either an inline scalar or a [`Value::Ref`] to another arena object. That
//! indirection is what lets the engine retarget an edge without moving data.

use core::fmt;
use core::hash::{Hash, Hasher};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::io::{self, Read};
use std::rc::Rc;

slotmap::new_key_type! {
    /// Generational arena key identifying one object in an [`ObjectGraph`].
    ///
    /// Ids are ordered; the engine uses that order to break hash ties so
    /// bucketing is total and repeatable for a given graph.
    ///
    /// [`ObjectGraph`]: crate::graph::ObjectGraph
    pub struct ObjectId;
}

/// Dictionary key. Cheap to clone so references can carry it.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(Rc<str>);

impl Name {
    pub fn new(s: &str) -> Self {
        Name(Rc::from(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::new(s)
    }
}

/// Leaf value. Never merged and never a discovery key.
#[derive(Clone, Debug)]
pub enum Scalar {
    Null,
    Bool(bool),
    Integer(i64),
    /// Compared and hashed by bit pattern.
    Real(f64),
    Name(Name),
    String(Vec<u8>),
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => true,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Integer(a), Scalar::Integer(b)) => a == b,
            (Scalar::Real(a), Scalar::Real(b)) => a.to_bits() == b.to_bits(),
            (Scalar::Name(a), Scalar::Name(b)) => a == b,
            (Scalar::String(a), Scalar::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Scalar::Null => {}
            Scalar::Bool(b) => b.hash(state),
            Scalar::Integer(i) => i.hash(state),
            Scalar::Real(r) => r.to_bits().hash(state),
            Scalar::Name(n) => n.hash(state),
            Scalar::String(s) => s.hash(state),
        }
    }
}

/// Contents of one container slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    Scalar(Scalar),
    Ref(ObjectId),
}

impl Value {
    pub const NULL: Value = Value::Scalar(Scalar::Null);

    pub fn name(s: &str) -> Self {
        Value::Scalar(Scalar::Name(Name::new(s)))
    }

    pub fn as_ref_id(&self) -> Option<ObjectId> {
        match self {
            Value::Ref(id) => Some(*id),
            Value::Scalar(_) => None,
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Ref(id)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Scalar(Scalar::Integer(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Scalar(Scalar::Bool(b))
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Scalar(Scalar::Real(r))
    }
}

/// Key-ordered mapping of names to slot values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dictionary {
    entries: BTreeMap<Name, Value>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Name) -> Option<&Value> {
        self.entries.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &Name) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    pub fn contains_key(&self, key: &Name) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace; returns the previous value for `key`.
    pub fn insert(&mut self, key: impl Into<Name>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &Name) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn keys(&self) -> btree_map::Keys<'_, Name, Value> {
        self.entries.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Name, Value> {
        self.entries.iter()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<Name>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }
}

impl<K: Into<Name>, V: Into<Value>> FromIterator<(K, V)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Supplies the raw bytes of a stream that is not held in memory.
///
/// The returned reader is dropped as soon as hashing finishes, so any
/// underlying handle is closed deterministically.
pub trait PayloadSource {
    fn open(&self) -> io::Result<Box<dyn Read + '_>>;
}

/// Raw (still encoded) stream content.
#[derive(Clone)]
pub enum Payload {
    Bytes(Vec<u8>),
    Source(Rc<dyn PayloadSource>),
}

impl Payload {
    /// Open a sequential reader over the raw bytes.
    pub fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        match self {
            Payload::Bytes(bytes) => Ok(Box::new(bytes.as_slice())),
            Payload::Source(source) => source.open(),
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Payload::Source(_) => f.write_str("Source(..)"),
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

/// A dictionary that also owns an opaque payload.
#[derive(Clone, Debug)]
pub struct Stream {
    pub dict: Dictionary,
    pub payload: Payload,
}

impl Stream {
    pub fn new(dict: Dictionary, payload: impl Into<Payload>) -> Self {
        Self {
            dict,
            payload: payload.into(),
        }
    }
}

/// An object stored in the arena.
#[derive(Clone, Debug)]
pub enum Object {
    /// An indirect scalar (e.g. a length stored as its own object).
    Scalar(Scalar),
    Array(Vec<Value>),
    Dictionary(Dictionary),
    Stream(Stream),
    /// Pure indirection to another object.
    Alias(ObjectId),
}

impl Object {
    pub fn kind(&self) -> Kind {
        match self {
            Object::Scalar(_) => Kind::Scalar,
            Object::Array(_) => Kind::Array,
            Object::Dictionary(_) => Kind::Dictionary,
            Object::Stream(_) => Kind::Stream,
            Object::Alias(_) => Kind::Alias,
        }
    }

    /// Dictionary view of a dictionary or stream.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub(crate) fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&mut s.dict),
            _ => None,
        }
    }
}

impl From<Dictionary> for Object {
    fn from(d: Dictionary) -> Self {
        Object::Dictionary(d)
    }
}

impl From<Stream> for Object {
    fn from(s: Stream) -> Self {
        Object::Stream(s)
    }
}

impl From<Vec<Value>> for Object {
    fn from(items: Vec<Value>) -> Self {
        Object::Array(items)
    }
}

impl From<Scalar> for Object {
    fn from(s: Scalar) -> Self {
        Object::Scalar(s)
    }
}

/// Capability dispatch over [`Object`] variants.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Scalar,
    Array,
    Dictionary,
    Stream,
    Alias,
}

impl Kind {
    /// Arrays, dictionaries and streams: the only kinds that are hashed,
    /// compared and merged.
    pub fn is_composite(self) -> bool {
        matches!(self, Kind::Array | Kind::Dictionary | Kind::Stream)
    }
}
