use std::fmt;

/// Opaque capability identifying one host-owned collection while it is exposed.
///
/// A handle is a slot index plus the generation the slot had when the handle was
/// minted. When a slot is recycled its generation moves on, so an old handle can
/// never silently address the new occupant: the registry reports it as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Generation assigned to a freshly created slot.
    ///
    /// Starting at 1 keeps every live handle's raw form non-zero, leaving zero as
    /// the boundary's "no handle" sentinel.
    pub const FIRST_GENERATION: u32 = 1;

    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot index.
    #[must_use]
    pub fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation the slot had when this handle was minted.
    #[must_use]
    pub fn generation(self) -> u32 {
        self.generation
    }

    /// Packs the handle into the form passed across the C boundary.
    #[must_use]
    pub fn to_raw(self) -> RawHandle {
        RawHandle((u64::from(self.generation) << 32) | u64::from(self.index))
    }

    /// Unpacks a raw handle, returning `None` for the null sentinel.
    ///
    /// A non-null raw value always decodes; whether it names a live collection is
    /// for the registry to decide.
    #[must_use]
    pub fn from_raw(raw: RawHandle) -> Option<Self> {
        if raw.is_null() {
            return None;
        }
        #[expect(clippy::cast_possible_truncation, reason = "both halves are 32 bits by construction")]
        let handle = Self {
            index: raw.0 as u32,
            generation: (raw.0 >> 32) as u32,
        };
        Some(handle)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Fixed-size handle representation exchanged with foreign code.
///
/// The foreign side treats this as an opaque 64-bit token. Zero never names a
/// live collection and is used as the failure sentinel for `create`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawHandle(pub u64);

impl RawHandle {
    /// The "no handle" sentinel.
    pub const NULL: Self = Self(0);

    /// Returns `true` for the null sentinel.
    #[must_use]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl From<Handle> for RawHandle {
    fn from(handle: Handle) -> Self {
        handle.to_raw()
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
