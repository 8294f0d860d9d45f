//! Named-uniform interface backed by a reflected std140 block.
//!
//! Every program owns one uniform block (group 0, binding 0) assembled from the
//! loose `uniform` declarations of its sources. Names resolve to offsets through
//! naga reflection; each name is resolved once per program and the result
//! (including "does not exist") is cached, so a typo is reported a single time
//! instead of failing silently on every frame.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::error::UniformError;

const STD140_COLUMN_STRIDE: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Float,
    Int,
    Uint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformShape {
    Scalar(ScalarType),
    Vector(ScalarType, u8),
    Matrix { columns: u8, rows: u8 },
}

impl UniformShape {
    fn describe(&self) -> String {
        match self {
            UniformShape::Scalar(ScalarType::Float) => "float".into(),
            UniformShape::Scalar(ScalarType::Int) => "int".into(),
            UniformShape::Scalar(ScalarType::Uint) => "uint".into(),
            UniformShape::Vector(ScalarType::Float, n) => format!("vec{n}"),
            UniformShape::Vector(ScalarType::Int, n) => format!("ivec{n}"),
            UniformShape::Vector(ScalarType::Uint, n) => format!("uvec{n}"),
            UniformShape::Matrix { columns, rows } if columns == rows => format!("mat{columns}"),
            UniformShape::Matrix { columns, rows } => format!("mat{columns}x{rows}"),
        }
    }
}

/// Location of one uniform inside the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    pub offset: u32,
    pub shape: UniformShape,
    /// Element count and stride for arrays.
    pub array: Option<(u32, u32)>,
}

/// Reflected layout of a program's uniform block and sampler slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformLayout {
    size: u32,
    slots: BTreeMap<String, UniformSlot>,
    samplers: Vec<String>,
}

impl UniformLayout {
    pub fn new(size: u32, slots: BTreeMap<String, UniformSlot>, samplers: Vec<String>) -> Self {
        Self {
            size,
            slots,
            samplers,
        }
    }

    /// Block size in bytes, rounded up to 16 and never zero.
    pub fn size(&self) -> u32 {
        self.size.max(16).div_ceil(16) * 16
    }

    pub fn slot(&self, name: &str) -> Option<&UniformSlot> {
        self.slots.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn samplers(&self) -> &[String] {
        &self.samplers
    }

    pub fn sampler_index(&self, name: &str) -> Option<usize> {
        self.samplers.iter().position(|sampler| sampler == name)
    }
}

/// A value that can be written into a uniform slot.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Int(i32),
    Uint(u32),
    Mat4([[f32; 4]; 4]),
    FloatArray(Vec<f32>),
    IntArray(Vec<i32>),
    Vec2Array(Vec<[f32; 2]>),
    Vec4Array(Vec<[f32; 4]>),
}

impl UniformValue {
    fn shape(&self) -> UniformShape {
        match self {
            UniformValue::Float(_) | UniformValue::FloatArray(_) => {
                UniformShape::Scalar(ScalarType::Float)
            }
            UniformValue::Vec2(_) | UniformValue::Vec2Array(_) => {
                UniformShape::Vector(ScalarType::Float, 2)
            }
            UniformValue::Vec3(_) => UniformShape::Vector(ScalarType::Float, 3),
            UniformValue::Vec4(_) | UniformValue::Vec4Array(_) => {
                UniformShape::Vector(ScalarType::Float, 4)
            }
            UniformValue::Int(_) | UniformValue::IntArray(_) => {
                UniformShape::Scalar(ScalarType::Int)
            }
            UniformValue::Uint(_) => UniformShape::Scalar(ScalarType::Uint),
            UniformValue::Mat4(_) => UniformShape::Matrix {
                columns: 4,
                rows: 4,
            },
        }
    }

    fn is_array(&self) -> bool {
        matches!(
            self,
            UniformValue::FloatArray(_)
                | UniformValue::IntArray(_)
                | UniformValue::Vec2Array(_)
                | UniformValue::Vec4Array(_)
        )
    }

    /// Flattens the value into per-element lists of 32-bit words; matrix
    /// elements list their columns back to back.
    fn elements(&self) -> Vec<Vec<[u8; 4]>> {
        fn words(values: &[f32]) -> Vec<[u8; 4]> {
            values.iter().map(|v| v.to_ne_bytes()).collect()
        }
        match self {
            UniformValue::Float(v) => vec![words(&[*v])],
            UniformValue::Vec2(v) => vec![words(v)],
            UniformValue::Vec3(v) => vec![words(v)],
            UniformValue::Vec4(v) => vec![words(v)],
            UniformValue::Int(v) => vec![vec![v.to_ne_bytes()]],
            UniformValue::Uint(v) => vec![vec![v.to_ne_bytes()]],
            UniformValue::Mat4(m) => vec![m.iter().flat_map(|column| words(column)).collect()],
            UniformValue::FloatArray(values) => values.iter().map(|v| words(&[*v])).collect(),
            UniformValue::IntArray(values) => {
                values.iter().map(|v| vec![v.to_ne_bytes()]).collect()
            }
            UniformValue::Vec2Array(values) => values.iter().map(|v| words(v)).collect(),
            UniformValue::Vec4Array(values) => values.iter().map(|v| words(v)).collect(),
        }
    }

    fn sampler_unit(&self) -> Option<u32> {
        match *self {
            UniformValue::Int(unit) if unit >= 0 => Some(unit as u32),
            UniformValue::Uint(unit) => Some(unit),
            _ => None,
        }
    }
}

macro_rules! uniform_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for UniformValue {
            fn from(value: $ty) -> Self {
                UniformValue::$variant(value)
            }
        })*
    };
}

uniform_from! {
    f32 => Float,
    [f32; 2] => Vec2,
    [f32; 3] => Vec3,
    [f32; 4] => Vec4,
    i32 => Int,
    u32 => Uint,
    [[f32; 4]; 4] => Mat4,
    Vec<f32> => FloatArray,
    Vec<i32> => IntArray,
    Vec<[f32; 2]> => Vec2Array,
    Vec<[f32; 4]> => Vec4Array,
}

/// Narrowed to `f32`; GLSL uniforms here are single precision.
impl From<f64> for UniformValue {
    fn from(value: f64) -> Self {
        UniformValue::Float(value as f32)
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        UniformValue::Int(value as i32)
    }
}

impl From<(f32, f32)> for UniformValue {
    fn from((x, y): (f32, f32)) -> Self {
        UniformValue::Vec2([x, y])
    }
}

impl From<&[f32]> for UniformValue {
    fn from(values: &[f32]) -> Self {
        UniformValue::FloatArray(values.to_vec())
    }
}

impl From<&[i32]> for UniformValue {
    fn from(values: &[i32]) -> Self {
        UniformValue::IntArray(values.to_vec())
    }
}

impl From<&[[f32; 2]]> for UniformValue {
    fn from(values: &[[f32; 2]]) -> Self {
        UniformValue::Vec2Array(values.to_vec())
    }
}

impl From<&[[f32; 4]]> for UniformValue {
    fn from(values: &[[f32; 4]]) -> Self {
        UniformValue::Vec4Array(values.to_vec())
    }
}

/// A reusable bundle of uniform assignments (rule sets, per-frame values,
/// camera parameters) layered onto any program with [`UniformState::apply`].
pub trait UniformGroup {
    fn apply_to(&self, uniforms: &mut UniformState);
}

impl<F> UniformGroup for F
where
    F: Fn(&mut UniformState),
{
    fn apply_to(&self, uniforms: &mut UniformState) {
        self(uniforms)
    }
}

#[derive(Debug, Clone, Copy)]
enum Resolution {
    Value(UniformSlot),
    Sampler(usize),
    Missing,
}

/// CPU-side uniform values of one program plus the per-name resolution cache.
#[derive(Debug, Clone)]
pub struct UniformState {
    label: String,
    layout: Arc<UniformLayout>,
    data: Vec<u8>,
    sampler_units: Vec<u32>,
    resolved: HashMap<String, Resolution>,
    reported: HashSet<String>,
}

impl UniformState {
    pub fn new(label: impl Into<String>, layout: Arc<UniformLayout>) -> Self {
        let sampler_units = (0..layout.samplers().len() as u32).collect();
        Self {
            label: label.into(),
            data: vec![0; layout.size() as usize],
            layout,
            sampler_units,
            resolved: HashMap::new(),
            reported: HashSet::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    /// Sets a uniform by name. Setting an integer on a sampler name selects
    /// the texture unit that sampler reads from.
    pub fn uniform(&mut self, name: &str, value: impl Into<UniformValue>) -> &mut Self {
        let value = value.into();
        match self.resolve(name) {
            Resolution::Value(slot) => self.write(name, &slot, &value),
            Resolution::Sampler(index) => match value.sampler_unit() {
                Some(unit) => self.sampler_units[index] = unit,
                None => self.report(name, "sampler uniforms only accept a texture unit"),
            },
            Resolution::Missing => self.report(name, "uniform does not resolve to a location"),
        }
        self
    }

    /// Like [`UniformState::uniform`], but names the program does not declare
    /// are skipped without being recorded as missing. Used by shared groups
    /// whose members only some programs read.
    pub fn optional_uniform(&mut self, name: &str, value: impl Into<UniformValue>) -> &mut Self {
        if self.layout.slot(name).is_some() || self.layout.sampler_index(name).is_some() {
            self.uniform(name, value);
        }
        self
    }

    /// Binds a sampler name to a texture unit.
    pub fn sampler(&mut self, name: &str, unit: u32) -> &mut Self {
        self.uniform(name, unit)
    }

    pub fn apply<G>(&mut self, group: &G) -> &mut Self
    where
        G: UniformGroup + ?Sized,
    {
        group.apply_to(self);
        self
    }

    /// True when `name` is a uniform or sampler of this program.
    pub fn resolves(&mut self, name: &str) -> bool {
        !matches!(self.resolve(name), Resolution::Missing)
    }

    /// Names that were set at least once but do not exist in the program.
    pub fn missing_uniforms(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .resolved
            .iter()
            .filter(|(_, resolution)| matches!(resolution, Resolution::Missing))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Checks that every expected name resolves in this program.
    pub fn validate_uniforms(&mut self, expected: &[&str]) -> Result<(), UniformError> {
        let names: Vec<String> = expected
            .iter()
            .filter(|name| !self.resolves(name))
            .map(|name| name.to_string())
            .collect();
        if names.is_empty() {
            Ok(())
        } else {
            Err(UniformError::Unresolved {
                program: self.label.clone(),
                names,
            })
        }
    }

    pub fn sampler_unit(&self, index: usize) -> Option<u32> {
        self.sampler_units.get(index).copied()
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn resolve(&mut self, name: &str) -> Resolution {
        if let Some(resolution) = self.resolved.get(name) {
            return *resolution;
        }
        let resolution = if let Some(slot) = self.layout.slot(name) {
            Resolution::Value(*slot)
        } else if let Some(index) = self.layout.sampler_index(name) {
            Resolution::Sampler(index)
        } else {
            Resolution::Missing
        };
        self.resolved.insert(name.to_string(), resolution);
        resolution
    }

    fn write(&mut self, name: &str, slot: &UniformSlot, value: &UniformValue) {
        if value.shape() != slot.shape || value.is_array() != slot.array.is_some() {
            let expected = match slot.array {
                Some((len, _)) => format!("{}[{len}]", slot.shape.describe()),
                None => slot.shape.describe(),
            };
            self.report(name, &format!("value does not match declared type {expected}"));
            return;
        }

        let (len, stride) = slot.array.unwrap_or((1, 0));
        let elements = value.elements();
        if elements.len() > len as usize {
            self.report(name, "array value is longer than the declared array");
        }

        let rows = match slot.shape {
            UniformShape::Matrix { rows, .. } => rows as usize,
            _ => usize::MAX,
        };
        for (index, element) in elements.iter().take(len as usize).enumerate() {
            let base = (slot.offset + index as u32 * stride) as usize;
            for (word_index, word) in element.iter().enumerate() {
                let within = if rows == usize::MAX {
                    word_index * 4
                } else {
                    (word_index / rows) * STD140_COLUMN_STRIDE as usize + (word_index % rows) * 4
                };
                let at = base + within;
                if let Some(target) = self.data.get_mut(at..at + 4) {
                    target.copy_from_slice(word);
                }
            }
        }
    }

    fn report(&mut self, name: &str, problem: &str) {
        if self.reported.insert(name.to_string()) {
            tracing::warn!(program = %self.label, uniform = name, "{problem}");
        }
    }
}
