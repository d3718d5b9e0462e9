use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialFlags {
    SWrap = 0x0000_0001,
    TWrap = 0x0000_0002,
    Translucent = 0x0000_0004,
    Additive = 0x0000_0008,
    Subtractive = 0x0000_0010,
    SelfIlluminating = 0x0000_0020,
    NeverEnvMap = 0x0000_0040,
    NoMipMap = 0x0000_0080,
    MipMapZeroBorder = 0x0000_0100,
    IflMaterial = 0x0800_0000,
    IflFrame = 0x1000_0000,
    DetailMap = 0x2000_0000,
    BumpMap = 0x4000_0000,
    ReflectanceMap = 0x8000_0000,
}

impl MaterialFlags {
    pub const AUXILIARY_MASK: u32 = 0xF000_0000;

    const ALL: [Self; 14] = [
        Self::SWrap,
        Self::TWrap,
        Self::Translucent,
        Self::Additive,
        Self::Subtractive,
        Self::SelfIlluminating,
        Self::NeverEnvMap,
        Self::NoMipMap,
        Self::MipMapZeroBorder,
        Self::IflMaterial,
        Self::IflFrame,
        Self::DetailMap,
        Self::BumpMap,
        Self::ReflectanceMap,
    ];

    /// Get all flags present in the bitfield
    pub fn from_bits(bits: u32) -> Vec<Self> {
        Self::ALL
            .iter()
            .copied()
            .filter(|f| bits & *f as u32 != 0)
            .collect()
    }

    pub fn to_bits(flags: &[Self]) -> u32 {
        flags.iter().fold(0, |bits, f| bits | *f as u32)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SWrap => "SWrap",
            Self::TWrap => "TWrap",
            Self::Translucent => "Translucent",
            Self::Additive => "Additive",
            Self::Subtractive => "Subtractive",
            Self::SelfIlluminating => "SelfIlluminating",
            Self::NeverEnvMap => "NeverEnvMap",
            Self::NoMipMap => "NoMipMap",
            Self::MipMapZeroBorder => "MipMapZeroBorder",
            Self::IflMaterial => "IFLMaterial",
            Self::IflFrame => "IFLFrame",
            Self::DetailMap => "DetailMap",
            Self::BumpMap => "BumpMap",
            Self::ReflectanceMap => "ReflectanceMap",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String, // texture name, not in the shape string table
    pub flags: u32,
    pub reflectance: i32, // -1 means none
    pub bump: i32,        // -1 means none
    pub detail: i32,      // -1 means none
    pub detail_scale: f32,
    pub reflection: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            flags: 0,
            reflectance: -1,
            bump: -1,
            detail: -1,
            detail_scale: 1.0,
            reflection: 0.0,
        }
    }
}

impl Material {
    pub fn new(name: impl Into<String>, flags: u32) -> Self {
        Self {
            name: name.into(),
            flags,
            ..Self::default()
        }
    }

    pub fn has_flag(&self, flag: MaterialFlags) -> bool {
        self.flags & flag as u32 != 0
    }

    pub fn is_translucent(&self) -> bool {
        self.has_flag(MaterialFlags::Translucent)
    }

    /// Referenced auxiliary entries as `(kind, index)`.
    pub fn auxiliary(&self) -> impl Iterator<Item = (&'static str, i32)> {
        [
            ("reflectance", self.reflectance),
            ("bump", self.bump),
            ("detail", self.detail),
        ]
        .into_iter()
        .filter(|(_, i)| *i >= 0)
    }
}

/// Materials stored in the file trailer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialList {
    pub materials: Vec<Material>,
}

impl MaterialList {
    pub const VERSION: u8 = 1;

    pub fn add(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.materials.iter().position(|m| m.name == name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn get(&self, index: usize) -> Option<&Material> {
        self.materials.get(index)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Material> {
        self.materials.iter()
    }
}
