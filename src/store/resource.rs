//! Resource views
//!
//! A [`Resource`] is a read-only view of one node in the collections
//! tree, carrying its full `/`-separated name and the offset of its
//! underlying object in the overlaid buffer.

use bytes::Bytes;

use crate::codec::reader::{read_bytes, read_object, read_str};
use crate::delta::DeltaReader;
use crate::core::Result;
use crate::store::{CHILD_PREFIX, DATA_KEY, KIND_KEY, META_PREFIX};
use crate::value::{KeyInterner, Value};

/// Resource type marker stored under the `kind` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// A directory of child resources
    Directory,
    /// An unstructured byte payload
    Unstructured,
    /// A structured JSON payload
    Json,
}

impl Kind {
    /// The integer code stored on the wire.
    pub fn code(self) -> i64 {
        match self {
            Kind::Directory => 0,
            Kind::Unstructured => 1,
            Kind::Json => 2,
        }
    }

    /// Decode a stored integer code.
    pub fn from_code(code: i64) -> Option<Kind> {
        match code {
            0 => Some(Kind::Directory),
            1 => Some(Kind::Unstructured),
            2 => Some(Kind::Json),
            _ => None,
        }
    }
}

/// Read-only view of one resource node.
pub struct Resource<'a> {
    reader: DeltaReader<'a>,
    name: String,
    off: i32,
    max_depth: usize,
}

impl<'a> Resource<'a> {
    pub(crate) fn new(
        reader: DeltaReader<'a>,
        name: String,
        off: i32,
        max_depth: usize,
    ) -> Self {
        Self { reader, name, off, max_depth }
    }

    /// Full `/`-separated resource name (empty for the root).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Offset of the resource's object in the overlaid buffer.
    pub fn offset(&self) -> i32 {
        self.off
    }

    /// The resource type. A node without a `kind` marker is a directory.
    pub fn kind(&self) -> Result<Kind> {
        let view = read_object(&self.reader, self.off)?;
        match view.value_offset(KIND_KEY.as_bytes())? {
            None => Ok(Kind::Directory),
            Some(off) => {
                let mut interner = KeyInterner::new();
                let code =
                    Value::decode_with_depth(&self.reader, off, &mut interner, self.max_depth)?
                        .as_i64()
                        .unwrap_or(-1);
                Ok(Kind::from_code(code).unwrap_or(Kind::Directory))
            }
        }
    }

    /// Decode the JSON payload of a `JSON` resource; `None` when the
    /// resource carries no `data`.
    pub fn json(&self) -> Result<Option<serde_json::Value>> {
        match self.data_offset()? {
            None => Ok(None),
            Some(off) => {
                let mut interner = KeyInterner::new();
                let value =
                    Value::decode_with_depth(&self.reader, off, &mut interner, self.max_depth)?;
                Ok(Some(value.to_json()?))
            }
        }
    }

    /// The raw payload of an unstructured resource.
    pub fn blob(&self) -> Result<Option<Bytes>> {
        match self.data_offset()? {
            None => Ok(None),
            Some(off) => Ok(Some(Bytes::copy_from_slice(read_bytes(&self.reader, off)?))),
        }
    }

    /// Decode the payload into an engine value.
    pub fn value(&self, interner: &mut KeyInterner) -> Result<Option<Value>> {
        match self.data_offset()? {
            None => Ok(None),
            Some(off) => Ok(Some(Value::decode_with_depth(
                &self.reader,
                off,
                interner,
                self.max_depth,
            )?)),
        }
    }

    /// A metadata value by key.
    pub fn meta(&self, key: &str) -> Result<Option<String>> {
        let view = read_object(&self.reader, self.off)?;
        let full = format!("{META_PREFIX}{key}");
        match view.value_offset(full.as_bytes())? {
            None => Ok(None),
            Some(off) => Ok(Some(read_str(&self.reader, off)?.to_string())),
        }
    }

    /// Child resource names, in ascending order.
    pub fn children(&self) -> Result<Vec<String>> {
        let view = read_object(&self.reader, self.off)?;
        let mut out = Vec::new();
        for name in view.names()? {
            if let Some(child) = name.strip_prefix(CHILD_PREFIX.as_bytes()) {
                out.push(String::from_utf8_lossy(child).into_owned());
            }
        }
        Ok(out)
    }

    fn data_offset(&self) -> Result<Option<i32>> {
        let view = read_object(&self.reader, self.off)?;
        view.value_offset(DATA_KEY.as_bytes())
    }
}
